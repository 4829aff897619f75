use std::sync::Arc;
use std::time::Instant;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Implementation, ServerCapabilities, ServerInfo};
use rmcp::{ErrorData as McpError, ServerHandler, tool, tool_handler, tool_router};

use crate::config::{API_KEY_VAR, Config};
use crate::generation::{CompletionClient, HttpTransport};
use crate::response::{ToolMetadata, ToolResponse};
use crate::tools::assistant::{self, ChatRequest};
use crate::tools::matcher::{self, MatchRequest};

#[derive(Clone)]
pub struct CollabNestServer {
    client: Option<Arc<CompletionClient>>,
    model: String,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl CollabNestServer {
    pub fn new(config: Config) -> Self {
        let client = match config.api_key {
            Some(api_key) => {
                match HttpTransport::with_timeout(config.endpoint, api_key, config.request_timeout)
                {
                    Ok(transport) => Some(Arc::new(CompletionClient::with_transport(
                        transport,
                        config.retry,
                    ))),
                    Err(e) => {
                        tracing::error!("failed to build HTTP client: {e}");
                        None
                    }
                }
            }
            None => None,
        };

        Self {
            client,
            model: config.model,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        name = "assistant",
        description = "Ask the CollabNest assistant. Pass the conversation so far in `history` (oldest first) and the student's new `message`.",
        annotations(read_only_hint = true)
    )]
    pub async fn assistant(
        &self,
        Parameters(req): Parameters<ChatRequest>,
    ) -> Result<CallToolResult, McpError> {
        req.validate()
            .map_err(|msg| McpError::invalid_params(msg, None))?;

        let start = Instant::now();
        let Some(client) = self.client.as_deref() else {
            return Ok(self.missing_key("assistant", start));
        };

        let response = match assistant::reply(client, &req).await {
            Ok(text) => ToolResponse::success(text, self.metadata("assistant", start)),
            Err(e) => {
                tracing::warn!(
                    status = ?e.status(),
                    retryable = e.is_retryable(),
                    "assistant query failed: {e}"
                );
                ToolResponse::error(e.user_message(), self.metadata("assistant", start))
            }
        };

        Ok(response.into_call_tool_result())
    }

    #[tool(
        name = "match_projects",
        description = "Rank project postings for a student profile. Returns a JSON array of {projectId, title, score (0-100), reason}, best first.",
        annotations(read_only_hint = true)
    )]
    pub async fn match_projects(
        &self,
        Parameters(req): Parameters<MatchRequest>,
    ) -> Result<CallToolResult, McpError> {
        req.validate()
            .map_err(|msg| McpError::invalid_params(msg, None))?;

        let start = Instant::now();
        let Some(client) = self.client.as_deref() else {
            return Ok(self.missing_key("match_projects", start));
        };

        let response = match matcher::match_projects(client, &req).await {
            Ok(matches) => {
                let json = serde_json::to_string(&matches)
                    .map_err(|e| McpError::internal_error(e.to_string(), None))?;
                ToolResponse::json(json, self.metadata("match_projects", start))
            }
            Err(e) => {
                tracing::warn!(
                    status = ?e.status(),
                    retryable = e.is_retryable(),
                    "match_projects query failed: {e}"
                );
                ToolResponse::error(e.user_message(), self.metadata("match_projects", start))
            }
        };

        Ok(response.into_call_tool_result())
    }
}

impl CollabNestServer {
    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    fn metadata(&self, tool_name: &str, start: Instant) -> ToolMetadata {
        ToolMetadata {
            tool_name: tool_name.to_string(),
            model_used: self.model.clone(),
            duration_seconds: start.elapsed().as_secs_f64(),
        }
    }

    fn missing_key(&self, tool_name: &str, start: Instant) -> CallToolResult {
        ToolResponse::error(
            format!("{API_KEY_VAR} is not set; the generation service is unavailable"),
            self.metadata(tool_name, start),
        )
        .into_call_tool_result()
    }
}

#[tool_handler]
impl ServerHandler for CollabNestServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "collabnest".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(
                "CollabNest AI tools for a university collaboration portal.\n\n\
                 - `assistant`: conversational help for students. Send prior turns in `history`.\n\
                 - `match_projects`: rank project postings against a student's skills and interests.\n\n\
                 Rate limits and server errors are retried with backoff; an error envelope means \
                 the request failed for good."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
