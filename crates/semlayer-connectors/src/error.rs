//! Typed errors for the connectors crate.

use semlayer_core::SemlayerError;
use thiserror::Error;

/// Errors that can occur while talking to the warehouse.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Failed to establish a session.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The warehouse rejected the credentials.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The private key file could not be read or parsed.
    #[error("invalid private key: {0}")]
    InvalidKey(String),

    /// A statement was rejected or failed during execution.
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// The requested table does not exist or has no visible columns.
    #[error("table not found: {0}")]
    TableNotFound(String),

    /// The response did not have the expected shape.
    #[error("unexpected response: {0}")]
    Protocol(String),

    #[error("session is closed")]
    Closed,

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl From<ConnectorError> for SemlayerError {
    fn from(e: ConnectorError) -> Self {
        match e {
            ConnectorError::ConnectionFailed(_)
            | ConnectorError::AuthFailed(_)
            | ConnectorError::InvalidKey(_) => SemlayerError::connection(e),
            _ => SemlayerError::database(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_errors_map_to_connection() {
        let err: SemlayerError = ConnectorError::AuthFailed("bad password".to_string()).into();
        assert!(matches!(err, SemlayerError::Connection(_)));
        assert!(err.to_string().contains("bad password"));
    }

    #[test]
    fn test_query_errors_map_to_database() {
        let err: SemlayerError = ConnectorError::QueryFailed("syntax".to_string()).into();
        assert!(matches!(err, SemlayerError::Database(_)));

        let err: SemlayerError = ConnectorError::TableNotFound("DB.S.T".to_string()).into();
        assert!(matches!(err, SemlayerError::Database(_)));
    }
}
