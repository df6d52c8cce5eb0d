//! Snowflake Cortex completion over the bound warehouse session.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use semlayer_connectors::sql::quote_literal;
use semlayer_connectors::{ConnectorError, WarehouseSession};

use crate::client::CompletionBackend;
use crate::error::LlmError;
use crate::prompt::truncate_chars;
use crate::provider::ProviderKind;

/// Longest prompt submitted to `CORTEX.COMPLETE`, in characters.
pub const MAX_PROMPT_CHARS: usize = 10_000;

const SET_STATEMENT_TIMEOUT: &str = "ALTER SESSION SET STATEMENT_TIMEOUT_IN_SECONDS = 60";
const RESET_STATEMENT_TIMEOUT: &str = "ALTER SESSION SET STATEMENT_TIMEOUT_IN_SECONDS = 0";

pub struct CortexBackend {
    model: String,
    session: Option<Arc<dyn WarehouseSession>>,
}

impl CortexBackend {
    pub fn new(model: impl Into<String>) -> Self {
        let model = model.into();
        info!("Initialized Cortex LLM client with model: {}", model);
        Self {
            model,
            session: None,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn run(
        &self,
        session: &dyn WarehouseSession,
        sql: &str,
    ) -> Result<Option<String>, ConnectorError> {
        session.query(SET_STATEMENT_TIMEOUT).await?;
        let result = session.query(sql).await?;
        Ok(result.scalar().map(str::to_string))
    }
}

#[async_trait]
impl CompletionBackend for CortexBackend {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Cortex
    }

    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let session = self.session.as_deref().ok_or(LlmError::NoSession)?;

        let chars = prompt.chars().count();
        let prompt = if chars > MAX_PROMPT_CHARS {
            warn!(
                "Trimming prompt from {} to {} characters",
                chars, MAX_PROMPT_CHARS
            );
            truncate_chars(prompt, MAX_PROMPT_CHARS)
        } else {
            prompt
        };

        let sql = format!(
            "SELECT SNOWFLAKE.CORTEX.COMPLETE({}, {})",
            quote_literal(&self.model),
            quote_literal(prompt)
        );
        let outcome = self.run(session, &sql).await;

        if let Err(e) = session.query(RESET_STATEMENT_TIMEOUT).await {
            warn!("Failed to reset statement timeout: {}", e);
        }

        let text = outcome?
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(LlmError::EmptyResponse("cortex"))?;
        debug!("Cortex returned {} characters", text.len());
        Ok(text)
    }

    fn bind_session(&mut self, session: Arc<dyn WarehouseSession>) {
        self.session = Some(session);
        info!("Bound Cortex LLM client to the Snowflake session");
    }
}
