//! Semlayer AI - LLM-generated descriptions for semantic models
//!
//! This crate provides:
//! - One completion backend per provider (Snowflake Cortex, OpenAI,
//!   Azure OpenAI, Anthropic)
//! - `LlmClient`, which never fails: provider errors become placeholder text,
//!   after at most one hop to a configured fallback provider
//! - A factory building the client from configuration and the environment
//! - Prompt templates and context builders for tables and columns

pub mod anthropic;
pub mod client;
pub mod cortex;
pub mod error;
pub mod factory;
pub mod openai;
pub mod prompt;
pub mod provider;

pub use client::{CompletionBackend, LlmClient};
pub use error::LlmError;
pub use factory::build_llm_client;
pub use provider::{EnvSource, ProcessEnv, ProviderKind};
