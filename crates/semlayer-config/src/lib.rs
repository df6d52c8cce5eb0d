//! Semlayer Config - configuration for semantic model generation
//!
//! Configuration is read from YAML or JSON (or built in memory), checked for
//! required fields, normalized from the legacy LLM keys and deserialized into
//! typed sections.

pub mod auth;
pub mod loader;
pub mod schema;
pub mod validation;

pub use auth::AuthMode;
pub use loader::{config_from_value, load_config, normalize_legacy_llm};
pub use schema::{Config, LlmConfig, OutputConfig, SemanticModelConfig, SnowflakeConfig};
