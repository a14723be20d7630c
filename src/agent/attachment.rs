use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::Metadata;

const DEFAULT_MIME: &str = "application/octet-stream";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    Video,
    File,
    Audio,
}

impl AttachmentKind {
    /// Classify by declared MIME type. Anything unrecognised is a plain file.
    pub fn classify(content_type: &str) -> Self {
        let mime = content_type.trim().to_ascii_lowercase();
        if mime.starts_with("image/") {
            AttachmentKind::Image
        } else if mime.starts_with("video/") {
            AttachmentKind::Video
        } else if mime.starts_with("audio/") {
            AttachmentKind::Audio
        } else {
            AttachmentKind::File
        }
    }
}

/// Either the inline data URI or a reference to where the bytes live.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentPayload {
    Data(String),
    Url(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attachment {
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    #[serde(flatten)]
    pub payload: AttachmentPayload,
    pub filename: String,
    pub content_type: String,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Seconds, for video and audio.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
}

impl Attachment {
    /// Attachment that points at an already uploaded artifact.
    pub fn from_url(
        url: impl Into<String>,
        filename: impl Into<String>,
        content_type: impl Into<String>,
        size: u64,
    ) -> Self {
        let content_type = content_type.into();
        Self {
            kind: AttachmentKind::classify(&content_type),
            payload: AttachmentPayload::Url(url.into()),
            filename: filename.into(),
            content_type,
            size,
            metadata: None,
            alt_text: None,
            width: None,
            height: None,
            duration: None,
            transcript: None,
        }
    }

    pub fn with_alt_text(mut self, alt_text: impl Into<String>) -> Self {
        self.alt_text = Some(alt_text.into());
        self
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Copy of the attachment without its inline bytes, for keeping in chat history.
    pub fn descriptor(&self) -> serde_json::Value {
        let mut value = serde_json::json!({
            "type": self.kind,
            "filename": self.filename,
            "content_type": self.content_type,
            "size": self.size,
        });
        if let AttachmentPayload::Url(url) = &self.payload {
            value["url"] = serde_json::Value::String(url.clone());
        }
        value
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AttachmentError {
    #[error("failed to read {name}: {source}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{name} is empty")]
    Empty { name: String },
    #[error("{name} is {size} bytes, limit is {limit}")]
    TooLarge { name: String, size: u64, limit: u64 },
    #[error("malformed data URI: {0}")]
    MalformedDataUri(String),
}

#[derive(Debug, Clone)]
enum FileSource {
    Bytes(Vec<u8>),
    Path(PathBuf),
}

/// A user-supplied file before encoding.
#[derive(Debug, Clone)]
pub struct FileInput {
    pub name: String,
    pub content_type: String,
    /// Declared size in bytes.
    pub size: u64,
    source: FileSource,
}

impl FileInput {
    pub fn from_bytes(
        name: impl Into<String>,
        content_type: Option<&str>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.unwrap_or(DEFAULT_MIME).to_string(),
            size: bytes.len() as u64,
            source: FileSource::Bytes(bytes),
        }
    }

    /// Reference a file on disk. Only the metadata is read here.
    pub async fn open(path: impl AsRef<Path>, content_type: Option<&str>) -> Result<Self, AttachmentError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|source| AttachmentError::Read {
                name: name.clone(),
                source,
            })?;
        Ok(Self {
            name,
            content_type: content_type.unwrap_or(DEFAULT_MIME).to_string(),
            size: meta.len(),
            source: FileSource::Path(path.to_path_buf()),
        })
    }

    pub fn kind(&self) -> AttachmentKind {
        AttachmentKind::classify(&self.content_type)
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub async fn read_bytes(&self) -> Result<Vec<u8>, AttachmentError> {
        match &self.source {
            FileSource::Bytes(bytes) => Ok(bytes.clone()),
            FileSource::Path(path) => {
                tokio::fs::read(path)
                    .await
                    .map_err(|source| AttachmentError::Read {
                        name: self.name.clone(),
                        source,
                    })
            }
        }
    }
}

/// Read a file and inline it as a `data:<mime>;base64,<data>` attachment.
pub async fn encode(file: &FileInput, max_bytes: u64) -> Result<Attachment, AttachmentError> {
    check_size(&file.name, file.size, max_bytes)?;
    let bytes = file.read_bytes().await?;
    let size = bytes.len() as u64;
    if size == 0 {
        return Err(AttachmentError::Empty {
            name: file.name.clone(),
        });
    }
    check_size(&file.name, size, max_bytes)?;

    let data = base64::engine::general_purpose::STANDARD.encode(&bytes);
    tracing::debug!(filename = %file.name, mime = %file.content_type, size, "encoded attachment");

    Ok(Attachment {
        kind: file.kind(),
        payload: AttachmentPayload::Data(format!("data:{};base64,{}", file.content_type, data)),
        filename: file.name.clone(),
        content_type: file.content_type.clone(),
        size,
        metadata: None,
        alt_text: None,
        width: None,
        height: None,
        duration: None,
        transcript: None,
    })
}

fn check_size(name: &str, size: u64, limit: u64) -> Result<(), AttachmentError> {
    if size > limit {
        return Err(AttachmentError::TooLarge {
            name: name.to_string(),
            size,
            limit,
        });
    }
    Ok(())
}

/// Split a base64 data URI back into its MIME type and raw bytes.
pub fn decode_data_uri(uri: &str) -> Result<(String, Vec<u8>), AttachmentError> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| AttachmentError::MalformedDataUri("missing data: prefix".into()))?;
    let (header, data) = rest
        .split_once(',')
        .ok_or_else(|| AttachmentError::MalformedDataUri("missing comma".into()))?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| AttachmentError::MalformedDataUri("not base64 encoded".into()))?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(|e| AttachmentError::MalformedDataUri(e.to_string()))?;
    Ok((mime.to_string(), bytes))
}
