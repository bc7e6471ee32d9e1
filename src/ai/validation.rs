//! Model Output Validation
//!
//! Turns the text returned by the completion endpoint into a
//! `GeneratedDocument`:
//! - Strips a surrounding markdown code fence, if the model added one
//! - Decodes the remaining text as the document JSON shape

use crate::types::{GeneratedDocument, LlmError};

const FENCE: &str = "```";

/// Strip a fenced code block wrapper and surrounding whitespace.
///
/// The opening fence line (with an optional language tag) is dropped and the
/// text is cut at the last closing fence. Unfenced text is returned trimmed.
pub fn strip_code_fence(content: &str) -> String {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix(FENCE) else {
        return trimmed.to_string();
    };

    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    let body = match body.rfind(FENCE) {
        Some(end) => &body[..end],
        None => body,
    };

    body.trim().to_string()
}

/// Decode model output into a document.
///
/// Anything that is not a JSON object of the document shape is a parse error
/// for the batch.
pub fn decode_document(raw: &str) -> Result<GeneratedDocument, LlmError> {
    GeneratedDocument::from_json(raw)
        .map_err(|e| LlmError::parse(format!("model output is not a valid document: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ErrorCategory;

    #[test]
    fn test_strip_json_fence() {
        let content = "```json\n{\"scenario\":\"s\"}\n```";
        assert_eq!(strip_code_fence(content), "{\"scenario\":\"s\"}");
    }

    #[test]
    fn test_strip_bare_fence_with_whitespace() {
        let content = "  \n```\n{\"a\":1}\n```\n  ";
        assert_eq!(strip_code_fence(content), "{\"a\":1}");
    }

    #[test]
    fn test_unfenced_text_is_trimmed_only() {
        assert_eq!(strip_code_fence("  {\"a\":1}\n"), "{\"a\":1}");
        assert_eq!(strip_code_fence("plain `code` text"), "plain `code` text");
    }

    #[test]
    fn test_fence_without_closing() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn test_inner_text_kept_verbatim() {
        let content = "```json\n{\n  \"a\": \"x\"\n}\n```";
        assert_eq!(strip_code_fence(content), "{\n  \"a\": \"x\"\n}");
    }

    #[test]
    fn test_decode_document() {
        let doc = decode_document(r#"{"scenario":"s","call_chain":[],"endpoints":[]}"#).unwrap();
        assert_eq!(doc.scenario, "s");

        let err = decode_document("I could not find any API calls.").unwrap_err();
        assert_eq!(err.category, ErrorCategory::Parse);
        assert!(!err.is_retryable());
    }
}
