use kube::api::DynamicObject;
use serde_json::Value;

use super::ApplyError;

/// Split a multi-document YAML stream on `---` lines.
///
/// Slices borrow from `content`. The separator line and the newline before it
/// belong to no document.
pub fn split_documents(content: &[u8]) -> Vec<&[u8]> {
    let mut documents = Vec::new();
    let mut start = 0;
    let mut line_start = 0;

    loop {
        let line_end = content[line_start..]
            .iter()
            .position(|b| *b == b'\n')
            .map(|p| line_start + p)
            .unwrap_or(content.len());
        let line = &content[line_start..line_end];
        let line = line.strip_suffix(b"\r").unwrap_or(line);

        if line == b"---" {
            let end = if line_start > start {
                line_start - 1
            } else {
                line_start
            };
            documents.push(&content[start..end]);
            start = (line_end + 1).min(content.len());
        }

        if line_end >= content.len() {
            break;
        }
        line_start = line_end + 1;
    }

    documents.push(&content[start..]);
    documents
}

/// Whether a document holds nothing but whitespace and comments.
pub fn is_blank(document: &[u8]) -> bool {
    String::from_utf8_lossy(document).lines().all(|line| {
        let line = line.trim();
        line.is_empty() || line.starts_with('#')
    })
}

/// Decode one YAML document. `Ok(None)` stands for an empty document.
pub fn decode_document(document: &[u8]) -> Result<Option<DynamicObject>, ApplyError> {
    if is_blank(document) {
        return Ok(None);
    }

    let value: Value =
        serde_yaml::from_slice(document).map_err(|e| ApplyError::Decode(e.to_string()))?;

    match &value {
        Value::Null => return Ok(None),
        Value::Object(_) => {}
        _ => return Err(ApplyError::Decode("document is not a mapping".into())),
    }

    for field in ["apiVersion", "kind"] {
        if !value.get(field).map(Value::is_string).unwrap_or(false) {
            return Err(ApplyError::Decode(format!("missing field '{field}'")));
        }
    }

    let has_name = value
        .pointer("/metadata/name")
        .and_then(Value::as_str)
        .map(|n| !n.is_empty())
        .unwrap_or(false);
    if !has_name {
        return Err(ApplyError::Decode("missing field 'metadata.name'".into()));
    }

    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| ApplyError::Decode(e.to_string()))
}
