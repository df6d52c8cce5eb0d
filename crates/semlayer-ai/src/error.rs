//! Errors from a single completion call.
//!
//! These never reach callers of `LlmClient::generate_description`; they are
//! turned into placeholder text there.

use thiserror::Error;

use semlayer_connectors::ConnectorError;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("No Snowflake session bound to Cortex client")]
    NoSession,

    #[error("{provider} API error ({status}): {body}")]
    Api {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("empty response from {0}")]
    EmptyResponse(&'static str),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Warehouse(#[from] ConnectorError),
}
