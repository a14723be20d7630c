use futures::future::join_all;
use serde_json::Value;
use std::future::Future;

use super::attachment::{self, Attachment, AttachmentError, AttachmentKind, FileInput};
use super::{AgentError, AgentRequest, Correlation, ExecutionMode, Metadata, ValidationErrors};
use crate::config::AgentConfig;

/// One part of a submitted form.
#[derive(Debug, Clone)]
pub enum FormField {
    Text { name: String, value: String },
    /// A file input; `None` when the user left the slot empty.
    File { name: String, file: Option<FileInput> },
}

impl FormField {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        FormField::Text {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn file(name: impl Into<String>, file: Option<FileInput>) -> Self {
        FormField::File {
            name: name.into(),
            file,
        }
    }
}

/// Turns caller input into validated [`AgentRequest`]s.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    source: String,
    max_attachment_bytes: u64,
}

impl RequestBuilder {
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            source: config.source.clone(),
            max_attachment_bytes: config.max_attachment_bytes,
        }
    }

    /// Message plus at most one image. A non-image file in the slot is dropped.
    pub async fn simple(
        &self,
        message: &str,
        image: Option<FileInput>,
        ids: Correlation,
    ) -> Result<AgentRequest, AgentError> {
        let image = image.filter(|file| {
            let keep = !file.is_empty() && file.kind() == AttachmentKind::Image;
            if !keep {
                tracing::debug!(filename = %file.name, mime = %file.content_type, "dropping image slot");
            }
            keep
        });
        let attachments = self.encode_files(image.into_iter().collect()).await?;
        self.finish(message, attachments, ids)
    }

    /// Message plus any number of files, encoded concurrently, kept in input order.
    pub async fn multi_file(
        &self,
        message: &str,
        files: Vec<FileInput>,
        ids: Correlation,
    ) -> Result<AgentRequest, AgentError> {
        let attachments = self.encode_files(files).await?;
        self.finish(message, attachments, ids)
    }

    /// Build from raw form fields. `message` may be empty here.
    pub async fn from_form(&self, fields: Vec<FormField>) -> Result<AgentRequest, AgentError> {
        let mut message = String::new();
        let mut ids = Correlation::default();
        let mut files = Vec::new();

        for field in fields {
            match field {
                FormField::Text { name, value } => match name.as_str() {
                    "message" | "prompt" => message = value,
                    "customer_id" => ids.customer_id = non_blank(value),
                    "session_id" => ids.session_id = non_blank(value),
                    other => tracing::debug!(field = other, "ignoring unknown form field"),
                },
                FormField::File { file: Some(file), .. } => files.push(file),
                FormField::File { name, file: None } => {
                    tracing::debug!(field = %name, "skipping empty file field")
                }
            }
        }

        let attachments = self.encode_files(files).await?;
        self.finish(&message, attachments, ids)
    }

    /// Attachment-free request. The prompt must carry text.
    pub fn direct(&self, prompt: &str, session_id: Option<&str>) -> Result<AgentRequest, AgentError> {
        let mut errors = ValidationErrors::default();
        if prompt.trim().is_empty() {
            errors.add("prompt", "must not be empty");
        }
        if session_id.is_some_and(|id| id.trim().is_empty()) {
            errors.add("session_id", "must not be blank when provided");
        }
        errors.into_result()?;

        let ids = Correlation {
            customer_id: None,
            session_id: session_id.map(str::to_string),
        };
        self.finish(prompt, Vec::new(), ids)
    }

    async fn encode_files(&self, files: Vec<FileInput>) -> Result<Vec<Attachment>, AgentError> {
        let limit = self.max_attachment_bytes;
        encode_in_order(files, |file| async move { attachment::encode(&file, limit).await }).await
    }

    fn finish(
        &self,
        message: &str,
        attachments: Vec<Attachment>,
        ids: Correlation,
    ) -> Result<AgentRequest, AgentError> {
        let mut metadata = Metadata::new();
        metadata.insert(
            "timestamp".into(),
            Value::String(chrono::Utc::now().to_rfc3339()),
        );
        metadata.insert("source".into(), Value::String(self.source.clone()));

        Ok(AgentRequest {
            message: message.to_string(),
            attachments,
            customer_id: ids.customer_id,
            session_id: ids.session_id,
            execution_mode: ExecutionMode::Sync,
            with_tts: false,
            metadata,
        })
    }
}

/// Fan out `encode` over the non-empty files and collect results in input order.
/// Empty files, and files that turn out empty once read, are dropped.
async fn encode_in_order<F, Fut>(files: Vec<FileInput>, encode: F) -> Result<Vec<Attachment>, AgentError>
where
    F: Fn(FileInput) -> Fut,
    Fut: Future<Output = Result<Attachment, AttachmentError>>,
{
    let pending = files
        .into_iter()
        .filter(|file| {
            if file.is_empty() {
                tracing::debug!(filename = %file.name, "dropping zero-byte file");
            }
            !file.is_empty()
        })
        .map(encode);

    // join_all yields outputs in the order the futures were supplied.
    let mut attachments = Vec::new();
    for result in join_all(pending).await {
        match result {
            Ok(attachment) => attachments.push(attachment),
            Err(AttachmentError::Empty { name }) => {
                tracing::debug!(filename = %name, "dropping file that read as empty")
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(attachments)
}

fn non_blank(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::attachment::{decode_data_uri, AttachmentPayload};
    use std::time::Duration;

    fn builder() -> RequestBuilder {
        RequestBuilder::new(&AgentConfig::default())
    }

    fn file(name: &str, mime: &str, bytes: &[u8]) -> FileInput {
        FileInput::from_bytes(name, Some(mime), bytes.to_vec())
    }

    #[tokio::test]
    async fn test_order_survives_out_of_order_completion() {
        let files: Vec<FileInput> = (0..5)
            .map(|i| file(&format!("f{i}.txt"), "text/plain", format!("body {i}").as_bytes()))
            .collect();

        // Earlier files finish last.
        let attachments = encode_in_order(files, |file| async move {
            let index: u64 = file.name[1..2].parse().unwrap();
            tokio::time::sleep(Duration::from_millis((5 - index) * 20)).await;
            attachment::encode(&file, 1024).await
        })
        .await
        .unwrap();

        let names: Vec<&str> = attachments.iter().map(|a| a.filename.as_str()).collect();
        assert_eq!(names, ["f0.txt", "f1.txt", "f2.txt", "f3.txt", "f4.txt"]);
    }

    #[tokio::test]
    async fn test_multi_file_drops_zero_byte_entries() {
        let files = vec![
            file("a.png", "image/png", b"png"),
            file("empty.txt", "text/plain", b""),
            file("b.mp3", "audio/mpeg", b"mp3"),
            file("also-empty.bin", "application/octet-stream", b""),
        ];
        let request = builder()
            .multi_file("look", files, Correlation::session("s-1"))
            .await
            .unwrap();

        assert_eq!(request.attachments.len(), 2);
        assert_eq!(request.attachments[0].filename, "a.png");
        assert_eq!(request.attachments[0].kind, AttachmentKind::Image);
        assert_eq!(request.attachments[1].kind, AttachmentKind::Audio);
        assert_eq!(request.session_id.as_deref(), Some("s-1"));
    }

    #[tokio::test]
    async fn test_simple_stamps_fixed_fields() {
        let request = builder()
            .simple("hello", Some(file("cat.jpg", "image/jpeg", b"jpg")), Correlation::default())
            .await
            .unwrap();

        assert_eq!(request.attachments.len(), 1);
        assert_eq!(request.execution_mode, ExecutionMode::Sync);
        assert!(!request.with_tts);
        assert_eq!(request.metadata["source"], "chat-ui");
        let stamp = request.metadata["timestamp"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(stamp).is_ok());

        let AttachmentPayload::Data(uri) = &request.attachments[0].payload else {
            panic!("expected inline data");
        };
        assert_eq!(decode_data_uri(uri).unwrap().1, b"jpg");
    }

    #[tokio::test]
    async fn test_simple_drops_non_image() {
        let request = builder()
            .simple("hello", Some(file("notes.txt", "text/plain", b"x")), Correlation::default())
            .await
            .unwrap();
        assert!(request.attachments.is_empty());
    }

    #[tokio::test]
    async fn test_form_allows_empty_message_with_attachment() {
        let fields = vec![
            FormField::text("message", ""),
            FormField::text("customer_id", "cust-9"),
            FormField::text("session_id", "  "),
            FormField::file("upload", Some(file("report.csv", "text/csv", b"a,b\n1,2"))),
            FormField::file("optional", None),
            FormField::file("blank", Some(file("blank.csv", "text/csv", b""))),
        ];
        let request = builder().from_form(fields).await.unwrap();

        assert_eq!(request.message, "");
        assert_eq!(request.customer_id.as_deref(), Some("cust-9"));
        assert_eq!(request.session_id, None);
        assert_eq!(request.attachments.len(), 1);
        assert_eq!(request.attachments[0].filename, "report.csv");
    }

    #[tokio::test]
    async fn test_oversized_file_fails_the_build() {
        let config = AgentConfig::default().with_max_attachment_bytes(2);
        let err = RequestBuilder::new(&config)
            .multi_file("x", vec![file("big.bin", "application/octet-stream", b"abc")], Correlation::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Attachment(AttachmentError::TooLarge { .. })));
    }

    #[test]
    fn test_direct_rejects_blank_prompt() {
        let err = builder().direct("   ", Some("s-1")).unwrap_err();
        let AgentError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert!(errors.field("prompt").is_some());
        assert!(errors.field("session_id").is_none());
    }

    #[test]
    fn test_direct_builds_attachment_free_request() {
        let request = builder().direct("summarise", Some("s-2")).unwrap();
        assert_eq!(request.message, "summarise");
        assert!(request.attachments.is_empty());
        assert_eq!(request.session_id.as_deref(), Some("s-2"));
    }
}
