//! Input validation: reduce the raw task payload to well-formed file entries.
//!
//! The task layer hands us whatever JSON the client submitted. Only a missing
//! or empty top-level list is fatal; an individual entry without a name or
//! without a string payload is dropped with a warning so the remaining files
//! can still be merged.

use crate::error::{ConsolidateError, SkipReason};
use crate::output::{FileOutcome, FileReport};
use crate::pipeline::format::FileFormat;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Standard alphabet, padding optional. Browsers and some SDKs strip `=`.
const TRANSPORT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// One submitted document before processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputFile {
    /// Original file name; only its extension is interpreted.
    pub file_name: String,
    /// Base64 of the raw file bytes.
    pub file_data: String,
}

impl InputFile {
    pub fn new(file_name: impl Into<String>, file_data: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            file_data: file_data.into(),
        }
    }

    /// Build an entry from raw bytes, applying the transport encoding.
    pub fn from_bytes(file_name: impl Into<String>, bytes: &[u8]) -> Self {
        Self::new(file_name, STANDARD.encode(bytes))
    }

    /// Format derived from the file name's extension.
    pub fn format(&self) -> FileFormat {
        FileFormat::from_name(&self.file_name)
    }

    /// Reverse the transport encoding.
    ///
    /// Accepts a `data:<mime>;base64,` prefix, line-wrapped payloads and
    /// missing padding.
    pub fn decode_payload(&self) -> Result<Vec<u8>, SkipReason> {
        let mut data = self.file_data.trim();
        if data.starts_with("data:") {
            if let Some(pos) = data.find(";base64,") {
                data = &data[pos + ";base64,".len()..];
            }
        }

        let decoded = if data.bytes().any(|b| b.is_ascii_whitespace()) {
            let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
            TRANSPORT.decode(compact)
        } else {
            TRANSPORT.decode(data)
        };
        let bytes = decoded.map_err(|e| SkipReason::TransportDecode {
            detail: e.to_string(),
        })?;

        if bytes.is_empty() {
            return Err(SkipReason::TransportDecode {
                detail: "payload decodes to zero bytes".into(),
            });
        }
        Ok(bytes)
    }
}

/// A file that passed validation, tagged with its position in the input list.
#[derive(Debug, Clone)]
pub struct ValidatedFile {
    /// 0-based index in the original list.
    pub index: usize,
    pub file: InputFile,
}

/// Result of validation: the usable entries plus reports for dropped ones.
#[derive(Debug, Clone, Default)]
pub struct ValidatedBatch {
    /// Number of entries in the submitted list.
    pub total: usize,
    /// Surviving entries, in input order.
    pub files: Vec<ValidatedFile>,
    /// Reports for entries dropped during validation, in input order.
    pub rejected: Vec<FileReport>,
}

/// Validate a raw JSON file list.
///
/// # Errors
/// [`ConsolidateError::InvalidInput`] when `raw` is not an array or is empty.
pub fn validate_files(raw: &Value) -> Result<ValidatedBatch, ConsolidateError> {
    let items = match raw {
        Value::Array(items) => items,
        Value::Null => {
            return Err(ConsolidateError::InvalidInput {
                reason: "file list is missing".into(),
            })
        }
        other => {
            return Err(ConsolidateError::InvalidInput {
                reason: format!("file list must be an array, got {}", json_kind(other)),
            })
        }
    };
    if items.is_empty() {
        return Err(ConsolidateError::InvalidInput {
            reason: "file list is empty".into(),
        });
    }

    let mut batch = ValidatedBatch {
        total: items.len(),
        ..Default::default()
    };

    for (index, item) in items.iter().enumerate() {
        match check_entry(item) {
            Ok(file) => batch.files.push(ValidatedFile { index, file }),
            Err((name, detail)) => reject(&mut batch, index, name, detail),
        }
    }

    debug!(
        "Validated {}/{} file entries",
        batch.files.len(),
        batch.total
    );
    Ok(batch)
}

/// Validate an already-deserialised list with the same rules as
/// [`validate_files`].
pub fn validate_entries(entries: Vec<InputFile>) -> Result<ValidatedBatch, ConsolidateError> {
    if entries.is_empty() {
        return Err(ConsolidateError::InvalidInput {
            reason: "file list is empty".into(),
        });
    }

    let mut batch = ValidatedBatch {
        total: entries.len(),
        ..Default::default()
    };

    for (index, file) in entries.into_iter().enumerate() {
        if file.file_name.trim().is_empty() {
            reject(&mut batch, index, String::new(), "missing fileName".into());
        } else if file.file_data.trim().is_empty() {
            let name = file.file_name.clone();
            reject(&mut batch, index, name, "missing fileData".into());
        } else {
            batch.files.push(ValidatedFile { index, file });
        }
    }

    Ok(batch)
}

fn reject(batch: &mut ValidatedBatch, index: usize, file_name: String, detail: String) {
    warn!(
        "Dropping file entry #{} ({}): {}",
        index + 1,
        if file_name.is_empty() { "<unnamed>" } else { &file_name },
        detail
    );
    batch.rejected.push(FileReport {
        index,
        file_name,
        outcome: FileOutcome::Skipped {
            reason: SkipReason::Invalid { detail },
        },
    });
}

/// Returns the entry, or the best-known name plus a rejection message.
fn check_entry(item: &Value) -> Result<InputFile, (String, String)> {
    let obj = item
        .as_object()
        .ok_or_else(|| (String::new(), format!("entry is {}, not an object", json_kind(item))))?;

    let name = match obj.get("fileName") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        _ => return Err((String::new(), "missing fileName".into())),
    };

    match obj.get("fileData") {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(InputFile::new(name, s.clone())),
        Some(Value::String(_)) | None | Some(Value::Null) => Err((name, "missing fileData".into())),
        Some(other) => Err((
            name,
            format!("fileData must be a string, got {}", json_kind(other)),
        )),
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn non_list_is_fatal() {
        for raw in [json!(null), json!({"fileName": "a.png"}), json!("a.png"), json!(3)] {
            let err = validate_files(&raw).unwrap_err();
            assert!(matches!(err, ConsolidateError::InvalidInput { .. }), "{raw}");
        }
    }

    #[test]
    fn empty_list_is_fatal() {
        let err = validate_files(&json!([])).unwrap_err();
        assert!(err.to_string().contains("empty"));
        assert!(validate_entries(Vec::new()).is_err());
    }

    #[test]
    fn malformed_entries_are_dropped_not_fatal() {
        let raw = json!([
            {"fileName": "a.png", "fileData": "AAAA"},
            {"fileName": "", "fileData": "AAAA"},
            {"fileName": "c.pdf"},
            {"fileName": "d.pdf", "fileData": 42},
            {"fileName": "e.jpg", "fileData": ""},
            "not-an-object",
            {"fileName": "g.jpg", "fileData": "BBBB"}
        ]);
        let batch = validate_files(&raw).unwrap();
        assert_eq!(batch.total, 7);
        let kept: Vec<usize> = batch.files.iter().map(|f| f.index).collect();
        assert_eq!(kept, vec![0, 6]);
        let dropped: Vec<usize> = batch.rejected.iter().map(|r| r.index).collect();
        assert_eq!(dropped, vec![1, 2, 3, 4, 5]);
        assert_eq!(batch.rejected[1].file_name, "c.pdf");
        assert!(matches!(
            &batch.rejected[2].outcome,
            FileOutcome::Skipped { reason: SkipReason::Invalid { detail } } if detail.contains("string")
        ));
    }

    #[test]
    fn all_entries_malformed_still_returns_batch() {
        let batch = validate_files(&json!([{"fileName": "a.png"}])).unwrap();
        assert!(batch.files.is_empty());
        assert_eq!(batch.rejected.len(), 1);
    }

    #[test]
    fn typed_entries_follow_same_rules() {
        let batch = validate_entries(vec![
            InputFile::new("a.png", "AAAA"),
            InputFile::new("  ", "AAAA"),
            InputFile::new("c.pdf", ""),
        ])
        .unwrap();
        assert_eq!(batch.files.len(), 1);
        assert_eq!(batch.rejected.len(), 2);
    }

    #[test]
    fn wire_names_are_camel_case() {
        let f: InputFile =
            serde_json::from_value(json!({"fileName": "x.pdf", "fileData": "AA=="})).unwrap();
        assert_eq!(f.file_name, "x.pdf");
        assert_eq!(f.format(), FileFormat::Pdf);
    }

    #[test]
    fn decode_payload_variants() {
        let plain = InputFile::from_bytes("a.bin", b"hello world");
        assert_eq!(plain.decode_payload().unwrap(), b"hello world");

        let uri = InputFile::new("a.png", "data:image/png;base64,aGVsbG8=");
        assert_eq!(uri.decode_payload().unwrap(), b"hello");

        let unpadded = InputFile::new("a.png", "aGVsbG8");
        assert_eq!(unpadded.decode_payload().unwrap(), b"hello");

        let wrapped = InputFile::new("a.png", "aGVs\r\nbG8=\n");
        assert_eq!(wrapped.decode_payload().unwrap(), b"hello");
    }

    #[test]
    fn decode_payload_rejects_garbage() {
        let bad = InputFile::new("a.png", "!!not base64!!");
        assert!(matches!(
            bad.decode_payload(),
            Err(SkipReason::TransportDecode { .. })
        ));
    }
}
