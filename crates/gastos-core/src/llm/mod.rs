//! Extraction model clients.

mod openai;

pub use openai::OpenAiClient;

use std::sync::Mutex;

use crate::error::LlmError;
use crate::invoice::ExtractionPrompt;

/// One request/response call to a chat-completion service.
///
/// Implementations do not retry; failures surface to the caller.
pub trait CompletionClient: Send + Sync {
    /// Send the prompt and return the raw text of the answer.
    fn complete(&self, prompt: &ExtractionPrompt) -> Result<String, LlmError>;
}

impl<T: CompletionClient + ?Sized> CompletionClient for Box<T> {
    fn complete(&self, prompt: &ExtractionPrompt) -> Result<String, LlmError> {
        (**self).complete(prompt)
    }
}

impl<T: CompletionClient + ?Sized> CompletionClient for std::sync::Arc<T> {
    fn complete(&self, prompt: &ExtractionPrompt) -> Result<String, LlmError> {
        (**self).complete(prompt)
    }
}

/// Canned client for tests: replays a fixed answer and records every prompt.
pub struct MockCompletionClient {
    response: Result<String, String>,
    prompts: Mutex<Vec<ExtractionPrompt>>,
}

impl MockCompletionClient {
    pub fn new(response: &str) -> Self {
        Self {
            response: Ok(response.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// A client whose every call fails with a connection error.
    pub fn unreachable(base_url: &str) -> Self {
        Self {
            response: Err(base_url.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts received so far.
    pub fn prompts(&self) -> Vec<ExtractionPrompt> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

impl CompletionClient for MockCompletionClient {
    fn complete(&self, prompt: &ExtractionPrompt) -> Result<String, LlmError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.clone());
        }

        self.response
            .clone()
            .map_err(LlmError::Connection)
    }
}
