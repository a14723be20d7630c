use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;

use super::builder::RequestBuilder;
use super::{AgentError, AgentRequest};
use crate::auth::TokenProvider;
use crate::config::AgentConfig;

/// Options for [`AgentClient::send_direct`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectOptions {
    /// Return the best-effort text content instead of the JSON envelope.
    pub raw: bool,
}

/// HTTP client for the agent service's `/agent/run` endpoint.
///
/// Responses are returned as the raw body text; interpreting them is up to
/// the caller (see [`super::reply::AgentReply`]).
#[derive(Clone)]
pub struct AgentClient {
    http: Client,
    config: AgentConfig,
    builder: RequestBuilder,
    tokens: Option<Arc<dyn TokenProvider>>,
}

impl AgentClient {
    pub fn new(config: AgentConfig) -> Result<Self, AgentError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            builder: RequestBuilder::new(&config),
            config,
            tokens: None,
        })
    }

    pub fn with_token_provider(mut self, tokens: Arc<dyn TokenProvider>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Post a fully built request and return the response body.
    pub async fn send(&self, request: &AgentRequest) -> Result<String, AgentError> {
        let url = self.config.endpoint()?;
        self.post(&url, request).await
    }

    /// Attachment-free fast path.
    pub async fn send_direct(
        &self,
        message: &str,
        session_id: Option<&str>,
        options: DirectOptions,
    ) -> Result<String, AgentError> {
        let url = self.config.endpoint()?;
        let request = self.builder.direct(message, session_id)?;
        let body = self.post(&url, &request).await?;

        if !options.raw {
            return Ok(body);
        }
        match serde_json::from_str::<Value>(&body) {
            Ok(value) => Ok(extract_content(&value)),
            Err(_) => Ok(body),
        }
    }

    async fn post(&self, url: &str, request: &AgentRequest) -> Result<String, AgentError> {
        tracing::info!(
            url = %url,
            session_id = request.session_id.as_deref().unwrap_or("-"),
            attachments = request.attachments.len(),
            "sending agent request"
        );

        let mut req = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .json(request);

        if let Some(token) = self.tokens.as_ref().and_then(|t| t.get_token()) {
            req = req.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        let resp = req.send().await.map_err(|e| self.transport_error(e))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            tracing::error!(status, body = %body, "agent request failed");
            return Err(AgentError::Api { status, body });
        }

        let body = resp.text().await.map_err(|e| self.transport_error(e))?;
        tracing::info!(bytes = body.len(), "agent request succeeded");
        Ok(body)
    }

    fn transport_error(&self, err: reqwest::Error) -> AgentError {
        if err.is_timeout() {
            tracing::error!(timeout = ?self.config.timeout, "agent request timed out");
            AgentError::Timeout(self.config.timeout)
        } else {
            tracing::error!(error = %err, "agent request could not be sent");
            AgentError::Http(err)
        }
    }
}

/// Best-effort text from an agent response: `content`, then `response`,
/// then `message`, else the whole object as JSON.
pub fn extract_content(value: &Value) -> String {
    ["content", "response", "message"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::builder::RequestBuilder;
    use crate::agent::Correlation;
    use crate::auth::StaticToken;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> AgentClient {
        AgentClient::new(AgentConfig::default().with_base_url(server.uri())).unwrap()
    }

    #[test]
    fn test_extract_content_fallbacks() {
        assert_eq!(extract_content(&json!({"content": "hello"})), "hello");
        assert_eq!(extract_content(&json!({"response": "r", "message": "m"})), "r");
        assert_eq!(extract_content(&json!({"message": "m"})), "m");
        assert_eq!(extract_content(&json!({"foo": "bar"})), r#"{"foo":"bar"}"#);
        assert_eq!(extract_content(&json!({"content": 3})), r#"{"content":3}"#);
    }

    #[tokio::test]
    async fn test_send_posts_json_and_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/agent/run"))
            .and(header("content-type", "application/json"))
            .and(body_partial_json(json!({
                "message": "hi",
                "session_id": "s-1",
                "execution_mode": "sync",
                "with_tts": false
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .expect(1)
            .mount(&server)
            .await;

        let request = RequestBuilder::new(&AgentConfig::default())
            .multi_file("hi", vec![], Correlation::session("s-1"))
            .await
            .unwrap();
        let body = client_for(&server).send(&request).await.unwrap();
        assert_eq!(
            serde_json::from_str::<Value>(&body).unwrap(),
            json!({"success": true})
        );
    }

    #[tokio::test]
    async fn test_missing_base_url_makes_no_calls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = AgentClient::new(AgentConfig::default()).unwrap();
        let err = client
            .send_direct("hello", None, DirectOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Config(_)));

        let request = RequestBuilder::new(&AgentConfig::default())
            .direct("hello", None)
            .unwrap();
        assert!(matches!(
            client.send(&request).await,
            Err(AgentError::Config(_))
        ));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_success_status_carries_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/agent/run"))
            .respond_with(ResponseTemplate::new(503).set_body_string("agent down"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .send_direct("hello", None, DirectOptions::default())
            .await
            .unwrap_err();
        match err {
            AgentError::Api { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "agent down");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_slow_agent_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/agent/run"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"content": "late"}))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let config = AgentConfig::default()
            .with_base_url(server.uri())
            .with_timeout(Duration::from_millis(200));
        let err = AgentClient::new(config)
            .unwrap()
            .send_direct("hello", None, DirectOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Timeout(d) if d == Duration::from_millis(200)));
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_send_direct_raw_extracts_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"message": "a"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"content": "hello"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"message": "b"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"foo": "bar"})))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let raw = DirectOptions { raw: true };
        assert_eq!(client.send_direct("a", None, raw).await.unwrap(), "hello");
        assert_eq!(
            client.send_direct("b", None, raw).await.unwrap(),
            r#"{"foo":"bar"}"#
        );
    }

    #[tokio::test]
    async fn test_blank_direct_prompt_never_hits_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = client_for(&server)
            .send_direct("", Some("s-1"), DirectOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Validation(_)));
    }

    #[tokio::test]
    async fn test_bearer_token_is_attached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer tok-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"content": "ok"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).with_token_provider(Arc::new(StaticToken::new("tok-123")));
        let body = client
            .send_direct("hello", None, DirectOptions { raw: true })
            .await
            .unwrap();
        assert_eq!(body, "ok");
    }
}
