//! Semlayer Connectors - warehouse access for schema introspection
//!
//! This crate provides:
//! - The `WarehouseSession` trait shared by introspection and in-database completion
//! - A Snowflake session over the REST session protocol (password, key-pair,
//!   OAuth token and federated authenticators)
//! - Schema introspection of fully-qualified base tables
//! - A scripted in-memory session for tests (`testing` feature)

pub mod auth;
pub mod error;
pub mod introspect;
pub mod session;
pub mod snowflake;
pub mod sql;

#[cfg(any(test, feature = "testing"))]
pub mod scripted;

pub use error::ConnectorError;
pub use introspect::{introspect_tables, ColumnInfo, TableSchema};
pub use session::{QueryResult, WarehouseSession};
pub use snowflake::SnowflakeSession;

#[cfg(any(test, feature = "testing"))]
pub use scripted::ScriptedSession;
