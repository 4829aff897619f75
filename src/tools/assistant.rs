use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::GenerationError;
use crate::generation::{CompletionClient, Content, GenerationRequest, Role, Transport};

/// Largest accepted message, in bytes.
pub const MAX_MESSAGE_BYTES: usize = 32 * 1024;

/// Turns beyond this are dropped from the front of the history.
pub const MAX_HISTORY_TURNS: usize = 50;

pub const SYSTEM_INSTRUCTION: &str = "You are the CollabNest assistant, a friendly guide for \
university students using CollabNest to share achievements, find collaborators and join \
projects. Answer concisely. When it helps, point the student to concrete next steps in the \
portal such as updating their profile skills, posting a project or messaging a teammate.";

#[derive(Debug, Clone, Copy, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    /// The assistant's own earlier replies. Also accepts "assistant".
    #[serde(alias = "assistant")]
    Model,
}

impl From<TurnRole> for Role {
    fn from(role: TurnRole) -> Self {
        match role {
            TurnRole::User => Role::User,
            TurnRole::Model => Role::Model,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub text: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ChatRequest {
    /// The student's new message.
    pub message: String,
    /// Earlier turns of the conversation, oldest first. Only the most recent 50 are sent.
    pub history: Option<Vec<ChatTurn>>,
}

impl ChatRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.message.trim().is_empty() {
            return Err("message must not be empty".to_string());
        }
        if self.message.len() > MAX_MESSAGE_BYTES {
            return Err(format!(
                "message is {} bytes, limit is {MAX_MESSAGE_BYTES}",
                self.message.len()
            ));
        }
        Ok(())
    }

    pub fn to_generation_request(&self) -> GenerationRequest {
        let history = self.history.as_deref().unwrap_or_default();
        let skip = history.len().saturating_sub(MAX_HISTORY_TURNS);

        let mut contents: Vec<Content> = history[skip..]
            .iter()
            .filter(|turn| !turn.text.trim().is_empty())
            .map(|turn| Content::text(turn.role.into(), turn.text.as_str()))
            .collect();
        contents.push(Content::text(Role::User, self.message.trim()));

        GenerationRequest {
            contents,
            ..Default::default()
        }
        .with_system_instruction(SYSTEM_INSTRUCTION)
    }
}

/// Ask the assistant for its next reply.
pub async fn reply<T: Transport>(
    client: &CompletionClient<T>,
    req: &ChatRequest,
) -> Result<String, GenerationError> {
    let text = client.generate(&req.to_generation_request()).await?;
    Ok(text.trim().to_string())
}
