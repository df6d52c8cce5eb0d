//! Semlayer CLI - generate and inspect semantic models

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use semlayer_config::load_config;
use semlayer_core::SemanticModel;
use semlayer_generator::{generate_semantic_model, load_semantic_model_from_file};
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "semlayer")]
#[command(about = "Generate semantic model YAML from Snowflake schemas")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a semantic model from a configuration file
    Generate {
        /// Path to the YAML or JSON configuration
        #[arg(short, long)]
        config: PathBuf,

        /// Write the model here instead of printing it
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a semantic model YAML file
    Validate {
        /// Path to the semantic model YAML
        file: PathBuf,
    },

    /// Print the normalized configuration with secrets masked
    ShowConfig {
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so generated YAML can be piped.
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Generate { config, output } => generate(&config, output.as_deref()).await?,
        Commands::Validate { file } => validate(&file)?,
        Commands::ShowConfig { config } => show_config(&config)?,
    }

    Ok(())
}

async fn generate(config_path: &Path, output: Option<&Path>) -> Result<()> {
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(config_path)?;
    let yaml = generate_semantic_model(&config).await?;

    match output {
        Some(path) => {
            std::fs::write(path, &yaml)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Saved semantic model to {}", path.display());
        }
        None => print!("{}", yaml),
    }
    Ok(())
}

fn validate(path: &Path) -> Result<()> {
    info!("Validating semantic model: {:?}", path);
    let model = load_semantic_model_from_file(path)
        .with_context(|| format!("{} is not a valid semantic model", path.display()))?;
    println!("{}", summary(&model));
    Ok(())
}

fn show_config(path: &Path) -> Result<()> {
    let config = load_config(path)?;
    print!("{}", config.redacted().to_yaml_string()?);
    Ok(())
}

fn summary(model: &SemanticModel) -> String {
    let mut out = format!("Semantic model '{}' is valid\n", model.name);
    out.push_str(&format!("  Tables: {}\n", model.tables.len()));
    for table in &model.tables {
        out.push_str(&format!(
            "    - {} ({}.{}.{}): {} dimensions, {} time dimensions, {} measures\n",
            table.name,
            table.base_table.database,
            table.base_table.schema,
            table.base_table.table,
            table.dimensions.len(),
            table.time_dimensions.len(),
            table.measures.len()
        ));
    }
    if !model.relationships.is_empty() {
        out.push_str(&format!("  Relationships: {}\n", model.relationships.len()));
    }
    out
}
