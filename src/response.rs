use rmcp::model::{CallToolResult, Content};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// How a client should read `content`: prose for the assistant, a JSON
/// array of `ProjectMatch` for the matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Json,
}

/// What the CollabNest tools hand back to the portal. Generation failures
/// land here with `status: "error"` and a sanitized message, never as an
/// MCP-level error.
#[derive(Debug, Serialize)]
pub struct ToolResponse {
    pub status: Status,
    pub content: String,
    pub content_type: ContentType,
    pub metadata: ToolMetadata,
}

#[derive(Debug, Serialize)]
pub struct ToolMetadata {
    pub tool_name: String,
    /// Model named in the endpoint, reported even when the call failed.
    pub model_used: String,
    /// Wall time of the whole tool call, retries and backoff included.
    #[serde(serialize_with = "finite_or_zero")]
    pub duration_seconds: f64,
}

fn finite_or_zero<S: serde::Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(if v.is_finite() { *v } else { 0.0 })
}

impl ToolResponse {
    pub fn success(content: String, metadata: ToolMetadata) -> Self {
        Self::new(Status::Success, content, ContentType::Text, metadata)
    }

    pub fn json(content: String, metadata: ToolMetadata) -> Self {
        Self::new(Status::Success, content, ContentType::Json, metadata)
    }

    pub fn error(message: String, metadata: ToolMetadata) -> Self {
        Self::new(Status::Error, message, ContentType::Text, metadata)
    }

    fn new(
        status: Status,
        content: String,
        content_type: ContentType,
        metadata: ToolMetadata,
    ) -> Self {
        Self {
            status,
            content,
            content_type,
            metadata,
        }
    }

    /// Wrap the serialized envelope as the single text item of a successful
    /// tool result.
    pub fn into_call_tool_result(self) -> CallToolResult {
        let text = serde_json::to_string(&self).unwrap_or_else(|e| {
            serde_json::json!({
                "status": Status::Error,
                "content": format!("could not encode {} response: {e}", self.metadata.tool_name),
                "content_type": ContentType::Text,
                "metadata": {},
            })
            .to_string()
        });
        CallToolResult::success(vec![Content::text(text)])
    }
}
