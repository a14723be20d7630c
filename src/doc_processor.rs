use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::path::Path;

use crate::agent::FileInput;
use crate::store::documents::DocumentError;

const MAX_SAMPLE_ROWS: usize = 10;
const MAX_TEXT_PREVIEW: usize = 1000;
const HEX_PREVIEW_BYTES: usize = 100;

/// Performs content extraction for an uploaded document.
#[async_trait]
pub trait DocumentProcessor: Send + Sync {
    async fn process(&self, file: &FileInput) -> Result<Value, DocumentError>;
}

/// Summarizes documents in-process without calling any service.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalProcessor;

#[async_trait]
impl DocumentProcessor for LocalProcessor {
    async fn process(&self, file: &FileInput) -> Result<Value, DocumentError> {
        let bytes = file
            .read_bytes()
            .await
            .map_err(|e| DocumentError::Processing(e.to_string()))?;
        summarize(&file.name, &bytes)
    }
}

/// Build the `processed_data` summary for a document
pub fn summarize(filename: &str, bytes: &[u8]) -> Result<Value, DocumentError> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "txt" | "log" => Ok(summarize_text(bytes)),
        "json" => summarize_json(bytes),
        "csv" => summarize_csv(bytes),
        _ => Ok(summarize_binary(&ext, bytes)),
    }
}

fn decode(bytes: &[u8]) -> (String, &'static str) {
    match std::str::from_utf8(bytes) {
        Ok(text) => (text.to_string(), "utf-8"),
        // Latin-1 maps every byte to the code point of the same value.
        Err(_) => (bytes.iter().map(|&b| b as char).collect(), "latin-1"),
    }
}

fn summarize_text(bytes: &[u8]) -> Value {
    let (text, encoding) = decode(bytes);
    let lines: Vec<&str> = text.split('\n').collect();
    let preview: String = text.chars().take(MAX_TEXT_PREVIEW).collect();

    json!({
        "data_type": "text",
        "summary": {
            "total_lines": lines.len(),
            "total_characters": text.chars().count(),
            "total_words": text.split_whitespace().count(),
            "encoding_used": encoding,
        },
        "sample_data": {
            "preview": preview,
            "first_lines": lines.iter().take(MAX_SAMPLE_ROWS).collect::<Vec<_>>(),
        }
    })
}

fn summarize_json(bytes: &[u8]) -> Result<Value, DocumentError> {
    let (text, _) = decode(bytes);
    let data: Value = serde_json::from_str(&text)
        .map_err(|e| DocumentError::Processing(format!("Invalid JSON format: {}", e)))?;

    let (structure_type, size, keys, sample) = match &data {
        Value::Array(items) => (
            "list",
            items.len(),
            Value::Null,
            Value::Array(items.iter().take(MAX_SAMPLE_ROWS).cloned().collect()),
        ),
        Value::Object(map) => (
            "dict",
            map.len(),
            json!(map.keys().collect::<Vec<_>>()),
            Value::Object(
                map.iter()
                    .take(MAX_SAMPLE_ROWS)
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect::<Map<_, _>>(),
            ),
        ),
        other => ("scalar", 1, Value::Null, other.clone()),
    };

    Ok(json!({
        "data_type": "json",
        "summary": {
            "structure_type": structure_type,
            "size": size,
            "keys": keys,
        },
        "sample_data": sample,
    }))
}

fn csv_error(e: csv::Error) -> DocumentError {
    DocumentError::Processing(format!("Invalid CSV format: {}", e))
}

fn summarize_csv(bytes: &[u8]) -> Result<Value, DocumentError> {
    let (text, _) = decode(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let columns: Vec<String> = reader
        .headers()
        .map_err(csv_error)?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = 0usize;
    let mut sample = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        rows += 1;
        if sample.len() < MAX_SAMPLE_ROWS {
            sample.push(Value::Object(
                columns
                    .iter()
                    .zip(record.iter())
                    .map(|(col, val)| (col.clone(), Value::String(val.to_string())))
                    .collect(),
            ));
        }
    }

    Ok(json!({
        "data_type": "tabular",
        "summary": {
            "rows": rows,
            "columns": columns.len(),
            "column_names": columns,
        },
        "sample_data": sample,
    }))
}

fn summarize_binary(ext: &str, bytes: &[u8]) -> Value {
    let hex: String = bytes
        .iter()
        .take(HEX_PREVIEW_BYTES)
        .map(|b| format!("{:02x}", b))
        .collect();
    let size_mb = (bytes.len() as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0;

    json!({
        "data_type": "binary",
        "summary": {
            "file_extension": if ext.is_empty() { String::new() } else { format!(".{}", ext) },
            "size_bytes": bytes.len(),
            "size_mb": size_mb,
        },
        "sample_data": {
            "hex_preview": hex,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_summary() {
        let summary = summarize("notes.txt", b"alpha beta\ngamma").unwrap();
        assert_eq!(summary["data_type"], "text");
        assert_eq!(summary["summary"]["total_lines"], 2);
        assert_eq!(summary["summary"]["total_words"], 3);
        assert_eq!(summary["summary"]["encoding_used"], "utf-8");
        assert_eq!(summary["sample_data"]["first_lines"][1], "gamma");
    }

    #[test]
    fn test_latin1_fallback() {
        let summary = summarize("old.log", &[b'c', b'a', b'f', 0xe9]).unwrap();
        assert_eq!(summary["summary"]["encoding_used"], "latin-1");
        assert_eq!(summary["sample_data"]["preview"], "café");
    }

    #[test]
    fn test_json_summary() {
        let summary = summarize("data.json", br#"{"a": 1, "b": [1, 2]}"#).unwrap();
        assert_eq!(summary["summary"]["structure_type"], "dict");
        assert_eq!(summary["summary"]["size"], 2);
        assert_eq!(summary["summary"]["keys"], json!(["a", "b"]));

        let list = summarize("rows.json", b"[1, 2, 3]").unwrap();
        assert_eq!(list["summary"]["structure_type"], "list");
        assert_eq!(list["sample_data"], json!([1, 2, 3]));
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(matches!(
            summarize("bad.json", b"{oops"),
            Err(DocumentError::Processing(_))
        ));
    }

    #[test]
    fn test_csv_summary() {
        let csv = b"region,revenue\n\"North, East\",10\nSouth,\"2\"\"0\"\n";
        let summary = summarize("sales.csv", csv).unwrap();
        assert_eq!(summary["summary"]["rows"], 2);
        assert_eq!(summary["summary"]["column_names"], json!(["region", "revenue"]));
        assert_eq!(summary["sample_data"][0]["region"], "North, East");
        assert_eq!(summary["sample_data"][1]["revenue"], "2\"0");
    }

    #[test]
    fn test_csv_quoted_newline_stays_in_one_row() {
        let csv = b"name,note\nA,\"line one\nline two\"\n\nB,x\n";
        let summary = summarize("notes.csv", csv).unwrap();
        assert_eq!(summary["summary"]["rows"], 2);
        assert_eq!(summary["sample_data"][0]["note"], "line one\nline two");
        assert_eq!(summary["sample_data"][1]["name"], "B");
    }

    #[test]
    fn test_unknown_extension_is_binary() {
        let summary = summarize("photo.png", &[0x89, 0x50, 0x4e, 0x47]).unwrap();
        assert_eq!(summary["data_type"], "binary");
        assert_eq!(summary["summary"]["file_extension"], ".png");
        assert_eq!(summary["sample_data"]["hex_preview"], "89504e47");
    }

    #[tokio::test]
    async fn test_local_processor_reads_input() {
        let file = FileInput::from_bytes("a.txt", Some("text/plain"), b"one two".to_vec());
        let summary = LocalProcessor.process(&file).await.unwrap();
        assert_eq!(summary["summary"]["total_words"], 2);
    }
}
