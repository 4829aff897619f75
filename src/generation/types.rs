//! JSON shapes of the generateContent endpoint.
//!
//! Requests are serialized verbatim. Responses are only read far enough to find
//! `candidates[0].content.parts[0].text` and, on failure, `error.message`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Part {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role: Some(role),
            parts: vec![Part { text: text.into() }],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<serde_json::Value>,
}

/// Body of one generateContent call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

impl GenerationRequest {
    /// Single user turn, no system instruction.
    pub fn prompt(text: impl Into<String>) -> Self {
        Self {
            contents: vec![Content::text(Role::User, text)],
            ..Default::default()
        }
    }

    pub fn with_system_instruction(mut self, text: impl Into<String>) -> Self {
        self.system_instruction = Some(Content::text(Role::System, text));
        self
    }

    /// Constrain the output to JSON matching `schema`.
    pub fn with_json_schema(mut self, schema: serde_json::Value) -> Self {
        self.generation_config = Some(GenerationConfig {
            response_mime_type: Some("application/json".to_string()),
            response_schema: Some(schema),
        });
        self
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Text of the first part of the first candidate, if present and non-empty.
    pub(crate) fn into_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

const MAX_ERROR_PREVIEW_CHARS: usize = 200;

/// Human-readable message for a failed response body.
///
/// Prefers `error.message` from a JSON error envelope, falls back to the raw body
/// (trimmed and truncated), and finally to the status's canonical reason.
pub(crate) fn error_message(status: u16, body: &[u8]) -> String {
    if let Ok(envelope) = serde_json::from_slice::<ErrorEnvelope>(body) {
        let message = envelope.error.message.trim();
        if !message.is_empty() {
            return message.to_string();
        }
    }

    let raw = String::from_utf8_lossy(body);
    let raw = raw.trim();
    if !raw.is_empty() {
        return raw.chars().take(MAX_ERROR_PREVIEW_CHARS).collect();
    }

    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("unknown error")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_in_camel_case() {
        let req = GenerationRequest::prompt("hi")
            .with_system_instruction("be brief")
            .with_json_schema(serde_json::json!({"type": "OBJECT"}));
        let v = serde_json::to_value(&req).unwrap();

        assert_eq!(v["contents"][0]["role"], "user");
        assert_eq!(v["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(v["systemInstruction"]["role"], "system");
        assert_eq!(v["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(v["generationConfig"]["responseSchema"]["type"], "OBJECT");
    }

    #[test]
    fn optional_fields_are_omitted() {
        let v = serde_json::to_value(GenerationRequest::prompt("hi")).unwrap();
        assert!(v.get("systemInstruction").is_none());
        assert!(v.get("generationConfig").is_none());
    }

    #[test]
    fn extracts_first_part_text() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"one"},{"text":"two"}]}}]}"#;
        let resp: GenerateContentResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.into_text().as_deref(), Some("one"));
    }

    #[test]
    fn missing_or_empty_text_yields_none() {
        for body in [
            r#"{}"#,
            r#"{"candidates":[]}"#,
            r#"{"candidates":[{"finishReason":"SAFETY"}]}"#,
            r#"{"candidates":[{"content":{"parts":[]}}]}"#,
            r#"{"candidates":[{"content":{"parts":[{"text":""}]}}]}"#,
        ] {
            let resp: GenerateContentResponse = serde_json::from_str(body).unwrap();
            assert!(resp.into_text().is_none(), "{body}");
        }
    }

    #[test]
    fn error_message_prefers_envelope() {
        let body = br#"{"error":{"code":400,"message":"Invalid JSON payload","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(error_message(400, body), "Invalid JSON payload");
    }

    #[test]
    fn error_message_falls_back_to_raw_text() {
        assert_eq!(error_message(400, b"  <html>bad gateway</html>\n"), "<html>bad gateway</html>");
        let long = "x".repeat(500);
        assert_eq!(error_message(400, long.as_bytes()).len(), MAX_ERROR_PREVIEW_CHARS);
    }

    #[test]
    fn error_message_falls_back_to_reason_phrase() {
        assert_eq!(error_message(404, b""), "Not Found");
    }
}
