//! LLM client with an optional single-hop fallback

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use semlayer_connectors::WarehouseSession;

use crate::error::LlmError;
use crate::prompt::full_prompt;
use crate::provider::ProviderKind;

/// One provider's completion capability.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    fn provider(&self) -> ProviderKind;

    /// Complete the full prompt (template plus context) and return the text.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;

    /// Hand over the open warehouse session. Only Cortex needs it.
    fn bind_session(&mut self, _session: Arc<dyn WarehouseSession>) {}
}

/// Description generator used by the model assembler.
pub struct LlmClient {
    primary: Box<dyn CompletionBackend>,
    fallback: Option<Box<dyn CompletionBackend>>,
}

impl fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmClient")
            .field("provider", &self.provider())
            .field("fallback", &self.fallback_provider())
            .finish()
    }
}

impl LlmClient {
    pub fn new(primary: Box<dyn CompletionBackend>) -> Self {
        Self {
            primary,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Box<dyn CompletionBackend>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn provider(&self) -> ProviderKind {
        self.primary.provider()
    }

    pub fn fallback_provider(&self) -> Option<ProviderKind> {
        self.fallback.as_ref().map(|f| f.provider())
    }

    /// Bind the warehouse session to every Cortex backend of this client.
    pub fn bind_session(&mut self, session: Arc<dyn WarehouseSession>) {
        self.primary.bind_session(session.clone());
        if let Some(fallback) = self.fallback.as_mut() {
            fallback.bind_session(session);
        }
    }

    /// Generate a description for `context` using `prompt`.
    ///
    /// Never fails. A primary failure is retried once on the fallback, if one
    /// is configured, and whatever the fallback returns is used as-is. Any
    /// remaining failure becomes `Error generating description: <error>`.
    pub async fn generate_description(&self, context: &str, prompt: &str) -> String {
        let text = full_prompt(prompt, context);

        let err = match self.primary.complete(&text).await {
            Ok(description) => return description,
            Err(e) => e,
        };
        warn!(
            "Error generating description with {}: {}",
            self.primary.provider(),
            err
        );

        let Some(fallback) = &self.fallback else {
            return placeholder(&err);
        };

        info!("Falling back to {} for description", fallback.provider());
        match fallback.complete(&text).await {
            Ok(description) => description,
            Err(e) => {
                warn!(
                    "Error generating description with {}: {}",
                    fallback.provider(),
                    e
                );
                placeholder(&e)
            }
        }
    }
}

fn placeholder(err: &LlmError) -> String {
    format!("Error generating description: {}", err)
}
