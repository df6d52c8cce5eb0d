//! Provider tags and environment lookups

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use semlayer_core::SemlayerError;

/// The LLM providers a client can be built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// `SNOWFLAKE.CORTEX.COMPLETE` over the open warehouse session.
    Cortex,
    OpenAi,
    AzureOpenAi,
    Anthropic,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Cortex => "cortex",
            ProviderKind::OpenAi => "openai",
            ProviderKind::AzureOpenAi => "azure_openai",
            ProviderKind::Anthropic => "anthropic",
        }
    }

    /// Environment variable holding the API key, for hosted providers.
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            ProviderKind::Cortex => None,
            ProviderKind::OpenAi => Some("OPENAI_API_KEY"),
            ProviderKind::AzureOpenAi => Some("AZURE_OPENAI_API_KEY"),
            ProviderKind::Anthropic => Some("ANTHROPIC_API_KEY"),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = SemlayerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cortex" => Ok(ProviderKind::Cortex),
            "openai" => Ok(ProviderKind::OpenAi),
            "azure_openai" => Ok(ProviderKind::AzureOpenAi),
            "anthropic" => Ok(ProviderKind::Anthropic),
            other => Err(SemlayerError::UnsupportedProvider(other.to_string())),
        }
    }
}

pub const AZURE_ENDPOINT_ENV: &str = "AZURE_OPENAI_ENDPOINT";

/// Source of environment variables used when building LLM clients.
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

/// The process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// The first non-empty of a configured value and an environment variable.
pub(crate) fn config_or_env(
    configured: Option<&str>,
    env: &dyn EnvSource,
    key: &str,
) -> Option<String> {
    configured
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| env.var(key).filter(|v| !v.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_providers() {
        for tag in ["cortex", "openai", "azure_openai", "anthropic"] {
            let kind: ProviderKind = tag.parse().unwrap();
            assert_eq!(kind.as_str(), tag);
        }
    }

    #[test]
    fn test_parse_unknown_provider() {
        match "bard".parse::<ProviderKind>() {
            Err(SemlayerError::UnsupportedProvider(tag)) => assert_eq!(tag, "bard"),
            other => panic!("expected UnsupportedProvider, got {other:?}"),
        }
    }

    #[test]
    fn test_config_value_wins_over_env() {
        let env = HashMap::from([("OPENAI_API_KEY".to_string(), "from-env".to_string())]);
        assert_eq!(
            config_or_env(Some("from-config"), &env, "OPENAI_API_KEY").as_deref(),
            Some("from-config")
        );
        assert_eq!(
            config_or_env(Some(""), &env, "OPENAI_API_KEY").as_deref(),
            Some("from-env")
        );
        assert_eq!(config_or_env(None, &env, "ANTHROPIC_API_KEY"), None);
    }
}
