//! MockProvider - deterministic LLM responses for tests and offline runs
//!
//! Each call to `complete` pops the next scripted behavior. When the script
//! is exhausted the default behavior is used.

use crate::provider::{LlmError, LlmProvider, LlmResult};
use crate::types::{LlmRequest, LlmResponse};
use std::time::Duration;
use tokio::sync::Mutex;

/// Mock behavior configuration
#[derive(Clone, Debug)]
pub enum MockBehavior {
    /// Return a text response
    Text(String),
    /// Fail the call
    Error(String),
    /// Wait, then behave as the inner behavior
    Delayed(Duration, Box<MockBehavior>),
    /// Never complete (exercises caller timeouts)
    Hang,
}

pub struct MockProvider {
    behaviors: Mutex<Vec<MockBehavior>>,
    default_behavior: MockBehavior,
    requests: Mutex<Vec<LlmRequest>>,
}

impl MockProvider {
    /// Create a mock that always returns the same behavior
    pub fn constant(behavior: MockBehavior) -> Self {
        Self {
            behaviors: Mutex::new(Vec::new()),
            default_behavior: behavior,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock with a sequence of behaviors (consumed in order)
    pub fn sequence(behaviors: Vec<MockBehavior>) -> Self {
        Self {
            behaviors: Mutex::new(behaviors),
            default_behavior: MockBehavior::Text("(mock: sequence exhausted)".into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Shorthand for a constant text reply
    pub fn text(reply: impl Into<String>) -> Self {
        Self::constant(MockBehavior::Text(reply.into()))
    }

    /// Get the number of calls made
    pub async fn call_count(&self) -> usize {
        self.requests.lock().await.len()
    }

    /// Requests received so far, in call order
    pub async fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().await.clone()
    }

    async fn next_behavior(&self) -> MockBehavior {
        let mut behaviors = self.behaviors.lock().await;
        if behaviors.is_empty() {
            self.default_behavior.clone()
        } else {
            behaviors.remove(0)
        }
    }
}

#[async_trait::async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str { "mock" }

    async fn complete(&self, request: LlmRequest) -> LlmResult<LlmResponse> {
        self.requests.lock().await.push(request);
        let mut behavior = self.next_behavior().await;
        loop {
            match behavior {
                MockBehavior::Text(text) => return Ok(LlmResponse::text(text)),
                MockBehavior::Error(msg) => return Err(LlmError::RequestFailed(msg)),
                MockBehavior::Delayed(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    behavior = *inner;
                }
                MockBehavior::Hang => return std::future::pending().await,
            }
        }
    }
}
