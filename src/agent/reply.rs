use serde::Deserialize;
use serde_json::Value;

use super::client::extract_content;

#[derive(Deserialize)]
struct Envelope {
    success: Option<bool>,
    output: Option<Output>,
    failure: Option<Failure>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct Output {
    content: String,
    session_id: Option<String>,
}

#[derive(Deserialize)]
struct Failure {
    server: Option<String>,
    prompt: Option<String>,
}

/// What the conversation should show for an agent response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentReply {
    Content {
        text: String,
        session_id: Option<String>,
    },
    Failure(String),
}

impl AgentReply {
    /// Interpret either the `{success, output, failure, error}` envelope or a
    /// bare object. Non-JSON bodies are taken as plain text.
    pub fn parse(body: &str) -> Self {
        let Ok(value) = serde_json::from_str::<Value>(body) else {
            return AgentReply::Content {
                text: body.to_string(),
                session_id: None,
            };
        };

        if let Ok(envelope) = serde_json::from_value::<Envelope>(value.clone()) {
            if envelope.success == Some(false) {
                let reason = envelope
                    .failure
                    .and_then(|f| f.server.or(f.prompt))
                    .or(envelope.error)
                    .unwrap_or_else(|| "agent request failed".to_string());
                return AgentReply::Failure(reason);
            }
            if let Some(output) = envelope.output {
                return AgentReply::Content {
                    text: output.content,
                    session_id: output.session_id,
                };
            }
        }

        AgentReply::Content {
            text: extract_content(&value),
            session_id: value
                .get("session_id")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }
}
