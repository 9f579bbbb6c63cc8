//! Offline backend that replays a fixed script.
//!
//! Used by the `scripted` provider (echoing the last user message back) and
//! by tests that need deterministic chunk sequences.

use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;

use super::{Chunk, ChunkStream, ModelBackend, Usage};
use crate::error::{GatewayError, GatewayResult};
use crate::session::{Role, Session};

#[derive(Debug, Clone)]
pub enum ScriptStep {
    Chunk(Chunk),
    /// Fail the stream at this point.
    Fail(String),
}

#[derive(Debug, Clone)]
enum Script {
    Steps(Vec<ScriptStep>),
    /// Refuse to open the stream at all.
    Refuse(String),
    /// Echo the last user message word by word.
    Echo,
}

#[derive(Debug, Clone)]
pub struct ScriptedBackend {
    script: Script,
    delay: Option<Duration>,
}

impl ScriptedBackend {
    pub fn new(chunks: Vec<Chunk>) -> Self {
        Self::from_steps(chunks.into_iter().map(ScriptStep::Chunk).collect())
    }

    pub fn from_steps(steps: Vec<ScriptStep>) -> Self {
        Self {
            script: Script::Steps(steps),
            delay: None,
        }
    }

    pub fn refusing(message: impl Into<String>) -> Self {
        Self {
            script: Script::Refuse(message.into()),
            delay: None,
        }
    }

    pub fn echo() -> Self {
        Self {
            script: Script::Echo,
            delay: None,
        }
    }

    /// Sleep before each step, to make concurrent streams overlap.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn echo_steps(session: &Session) -> Vec<ScriptStep> {
        let last_user = session
            .messages()
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();

        let words: Vec<&str> = last_user.split_inclusive(' ').collect();
        let mut steps: Vec<ScriptStep> = words
            .iter()
            .map(|w| ScriptStep::Chunk(Chunk::text(*w)))
            .collect();
        let completion = words.len() as u64;
        steps.push(ScriptStep::Chunk(Chunk::default().with_usage(Usage {
            completion_tokens: completion,
            prompt_tokens: 0,
            total_tokens: completion,
            reasoning_tokens: 0,
        })));
        steps
    }
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "echo"
    }

    async fn stream(&self, session: &Session) -> GatewayResult<ChunkStream> {
        let steps = match &self.script {
            Script::Steps(steps) => steps.clone(),
            Script::Refuse(message) => return Err(GatewayError::Backend(message.clone())),
            Script::Echo => Self::echo_steps(session),
        };
        let delay = self.delay;

        let stream = futures::stream::iter(steps).then(move |step| async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            match step {
                ScriptStep::Chunk(chunk) => Ok(chunk),
                ScriptStep::Fail(message) => Err(GatewayError::Backend(message)),
            }
        });
        Ok(Box::pin(stream))
    }
}
