//! Per-request model sessions.
//!
//! [`SessionBuilder`] assembles the ordered message list for one streamed
//! exchange: the fixed memory policy, the caller's optional system prompt,
//! prior turns, and the tool registry.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{GatewayError, GatewayResult};
use crate::tools::ToolRegistry;

/// Always the first message of every session.
pub const MEMORY_POLICY: &str = "You have tools memory_search and memory_add. \
Save memories only when they are durable and beneficial: stable preferences, long-term goals, \
biographical details shared explicitly, or dated anchors/todos. Avoid secrets or ephemeral facts. \
Use memory_add sparingly (max a few per session). Include type/category/date when appropriate.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// One prior turn as supplied by the caller. Roles other than `user` and
/// `assistant` are dropped when the session is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub role: String,
    pub content: String,
}

/// A bound conversation plus tool context, owned by a single stream.
#[derive(Debug, Clone)]
pub struct Session {
    model: String,
    messages: Vec<Message>,
    tools: Arc<ToolRegistry>,
}

impl Session {
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn push_user(&mut self, query: impl Into<String>) {
        self.messages.push(Message::user(query));
    }
}

#[derive(Debug, Clone)]
pub struct SessionBuilder {
    registry: Arc<ToolRegistry>,
    model: String,
    credential: Option<String>,
    credential_required: bool,
}

impl SessionBuilder {
    /// Builder for a remote backend; `build` fails while `credential` is `None`.
    pub fn new(registry: Arc<ToolRegistry>, model: impl Into<String>, credential: Option<String>) -> Self {
        Self {
            registry,
            model: model.into(),
            credential: credential.filter(|c| !c.trim().is_empty()),
            credential_required: true,
        }
    }

    /// Builder for offline backends that need no credential.
    pub fn offline(registry: Arc<ToolRegistry>, model: impl Into<String>) -> Self {
        Self {
            registry,
            model: model.into(),
            credential: None,
            credential_required: false,
        }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Fails with [`GatewayError::Configuration`] when a required credential is absent.
    pub fn check_credential(&self) -> GatewayResult<()> {
        if self.credential_required && self.credential.is_none() {
            return Err(GatewayError::Configuration(
                "no model backend credential configured".into(),
            ));
        }
        Ok(())
    }

    pub fn build(&self, system_prompt: Option<&str>, history: &[HistoryTurn]) -> GatewayResult<Session> {
        self.check_credential()?;

        let mut messages = Vec::with_capacity(history.len() + 3);
        messages.push(Message::system(MEMORY_POLICY));

        if let Some(prompt) = system_prompt.filter(|p| !p.trim().is_empty()) {
            messages.push(Message::system(prompt));
        }

        for turn in history {
            match turn.role.as_str() {
                "user" => messages.push(Message::user(&turn.content)),
                "assistant" => messages.push(Message::assistant(&turn.content)),
                other => tracing::debug!(role = other, "dropping history turn with unsupported role"),
            }
        }

        Ok(Session {
            model: self.model.clone(),
            messages,
            tools: Arc::clone(&self.registry),
        })
    }
}
