//! Semlayer Generator - semantic model generation entry points
//!
//! This crate ties the pipeline together: load configuration, open the
//! warehouse session, introspect the base tables, ask the LLM for
//! descriptions and serialize the model as YAML.

pub mod assembler;
pub mod store;

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use semlayer_ai::{build_llm_client, EnvSource, LlmClient, ProcessEnv};
use semlayer_config::{load_config, Config};
use semlayer_connectors::{introspect_tables, SnowflakeSession, WarehouseSession};
use semlayer_core::{Result, SemlayerError};

pub use assembler::{classify_column, ColumnKind, ModelAssembler};
pub use store::{load_semantic_model_from_file, load_semantic_model_from_str, save_semantic_model};

/// Generate the semantic model YAML for `config`.
///
/// Opens a Snowflake session for the run and closes it afterwards, whether
/// generation succeeded or not. API keys missing from the configuration are
/// read from the process environment.
pub async fn generate_semantic_model(config: &Config) -> Result<String> {
    generate_semantic_model_with_env(config, &ProcessEnv).await
}

/// Like [`generate_semantic_model`], with environment lookups from `env`.
pub async fn generate_semantic_model_with_env(
    config: &Config,
    env: &dyn EnvSource,
) -> Result<String> {
    check_base_tables(config)?;
    let llm = build_client(config, env)?;

    let session: Arc<dyn WarehouseSession> =
        Arc::new(SnowflakeSession::connect(&config.snowflake).await?);

    run_and_close(config, session, llm).await
}

/// Generate over `session` and close it afterwards, whether generation
/// succeeded or not. A failed close is logged and otherwise ignored.
pub async fn generate_and_close(
    config: &Config,
    session: Arc<dyn WarehouseSession>,
) -> Result<String> {
    let llm = match check_base_tables(config).and_then(|_| build_client(config, &ProcessEnv)) {
        Ok(llm) => llm,
        Err(e) => {
            close_quietly(session.as_ref()).await;
            return Err(e);
        }
    };
    run_and_close(config, session, llm).await
}

/// Generate over a session owned by the caller. The session is left open.
pub async fn generate_with_session(
    config: &Config,
    session: Arc<dyn WarehouseSession>,
) -> Result<String> {
    check_base_tables(config)?;
    let llm = build_client(config, &ProcessEnv)?;
    let yaml = run(config, session, llm).await?;
    write_output(config, &yaml)?;
    Ok(yaml)
}

/// Load the configuration file at `path` and generate from it.
pub async fn generate_from_file(path: impl AsRef<Path>) -> Result<String> {
    let config = load_config(path)?;
    generate_semantic_model(&config).await
}

async fn run_and_close(
    config: &Config,
    session: Arc<dyn WarehouseSession>,
    llm: Option<LlmClient>,
) -> Result<String> {
    let outcome = run(config, session.clone(), llm).await;
    close_quietly(session.as_ref()).await;

    let yaml = outcome?;
    write_output(config, &yaml)?;
    Ok(yaml)
}

async fn close_quietly(session: &dyn WarehouseSession) {
    if let Err(e) = session.close().await {
        warn!("Failed to close warehouse session: {}", e);
    }
}

fn check_base_tables(config: &Config) -> Result<()> {
    if config.semantic_model.base_tables.is_empty() {
        return Err(SemlayerError::InvalidConfig(
            "semantic_model.base_tables must list at least one table".to_string(),
        ));
    }
    Ok(())
}

fn build_client(config: &Config, env: &dyn EnvSource) -> Result<Option<LlmClient>> {
    let Some(llm) = &config.llm else {
        info!("No LLM configured, descriptions will be omitted");
        return Ok(None);
    };
    let client = build_llm_client(llm, env)?;
    info!("Using {} for descriptions", client.provider());
    Ok(Some(client))
}

async fn run(
    config: &Config,
    session: Arc<dyn WarehouseSession>,
    mut llm: Option<LlmClient>,
) -> Result<String> {
    if let Some(client) = llm.as_mut() {
        client.bind_session(session.clone());
    }

    let model_cfg = &config.semantic_model;
    let tables = introspect_tables(
        session.as_ref(),
        &model_cfg.base_tables,
        model_cfg.n_sample_values,
    )
    .await?;

    let model = ModelAssembler::new(llm.as_ref())
        .assemble(&model_cfg.name, &tables, model_cfg.allow_joins)
        .await;
    info!(
        "Generated semantic model '{}' with {} tables",
        model.name,
        model.tables.len()
    );
    model.to_yaml()
}

fn write_output(config: &Config, yaml: &str) -> Result<()> {
    if let Some(output) = &config.output {
        save_semantic_model(yaml, &output.path, &output.filename)?;
    }
    Ok(())
}
