//! Typed configuration sections

use serde::{Deserialize, Serialize};

use semlayer_core::Result;

pub const DEFAULT_PROVIDER: &str = "cortex";
pub const DEFAULT_MODEL: &str = "llama3-8b";
pub const DEFAULT_TEMPERATURE: f32 = 0.2;
pub const DEFAULT_SAMPLE_VALUES: usize = 3;
pub const DEFAULT_OUTPUT_FILENAME: &str = "semantic_model.yaml";

const REDACTED: &str = "********";

/// Top-level configuration for one generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub snowflake: SnowflakeConfig,

    pub semantic_model: SemanticModelConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm: Option<LlmConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputConfig>,
}

/// Warehouse connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnowflakeConfig {
    pub account: String,
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warehouse: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    /// PKCS#8 PEM private key used for key-pair authentication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_passphrase: Option<String>,
    /// OAuth bearer token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Federated authenticator (e.g. an Okta URL, `username_password_mfa`, `oauth`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticator: Option<String>,
    /// One-time MFA passcode sent with password logins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passcode: Option<String>,
    /// Overrides `https://<account>.snowflakecomputing.com`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

/// Model generation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SemanticModelConfig {
    pub name: String,
    /// Fully-qualified `DATABASE.SCHEMA.TABLE` names, in output order.
    pub base_tables: Vec<String>,
    #[serde(default = "default_sample_values")]
    pub n_sample_values: usize,
    #[serde(default)]
    pub allow_joins: bool,
}

/// LLM provider settings for description generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    /// One of `cortex`, `openai`, `azure_openai`, `anthropic`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure_deployment_name: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_model: Option<String>,
}

/// Where to write the generated document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    pub path: String,
    #[serde(default = "default_output_filename")]
    pub filename: String,
}

fn default_provider() -> String {
    DEFAULT_PROVIDER.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

fn default_sample_values() -> usize {
    DEFAULT_SAMPLE_VALUES
}

fn default_output_filename() -> String {
    DEFAULT_OUTPUT_FILENAME.to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: None,
            api_endpoint: None,
            api_version: None,
            azure_deployment_name: None,
            temperature: default_temperature(),
            max_tokens: None,
            fallback_provider: None,
            fallback_api_key: None,
            fallback_model: None,
        }
    }
}

impl SnowflakeConfig {
    /// Minimal settings; every optional field unset.
    pub fn new(account: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            user: user.into(),
            password: None,
            role: None,
            warehouse: None,
            database: None,
            schema: None,
            private_key_path: None,
            private_key_passphrase: None,
            token: None,
            authenticator: None,
            passcode: None,
            host: None,
        }
    }
}

impl SemanticModelConfig {
    pub fn new(name: impl Into<String>, base_tables: Vec<String>) -> Self {
        Self {
            name: name.into(),
            base_tables,
            n_sample_values: DEFAULT_SAMPLE_VALUES,
            allow_joins: false,
        }
    }
}

impl Config {
    /// Serialize the normalized configuration, omitting unset optional fields.
    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Copy with every secret replaced by a mask, for display.
    pub fn redacted(&self) -> Self {
        let mask = |v: &Option<String>| v.as_ref().map(|_| REDACTED.to_string());

        let mut copy = self.clone();
        copy.snowflake.password = mask(&self.snowflake.password);
        copy.snowflake.private_key_passphrase = mask(&self.snowflake.private_key_passphrase);
        copy.snowflake.token = mask(&self.snowflake.token);
        copy.snowflake.passcode = mask(&self.snowflake.passcode);
        if let Some(llm) = copy.llm.as_mut() {
            llm.api_key = mask(&llm.api_key);
            llm.fallback_api_key = mask(&llm.fallback_api_key);
        }
        copy
    }
}
