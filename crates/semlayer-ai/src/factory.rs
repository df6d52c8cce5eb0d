//! Build an `LlmClient` from configuration

use tracing::{info, warn};

use semlayer_config::LlmConfig;
use semlayer_core::{Result, SemlayerError};

use crate::anthropic::AnthropicBackend;
use crate::client::{CompletionBackend, LlmClient};
use crate::cortex::CortexBackend;
use crate::openai::{OpenAiBackend, OpenAiTarget, DEFAULT_AZURE_API_VERSION, OPENAI_BASE_URL};
use crate::provider::{config_or_env, EnvSource, ProviderKind, AZURE_ENDPOINT_ENV};

/// Settings for one backend, taken from the primary or the fallback fields.
struct BackendSettings<'a> {
    model: &'a str,
    api_key: Option<&'a str>,
    api_endpoint: Option<&'a str>,
    api_version: Option<&'a str>,
    azure_deployment_name: Option<&'a str>,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl<'a> BackendSettings<'a> {
    fn primary(cfg: &'a LlmConfig) -> Self {
        Self {
            model: &cfg.model,
            api_key: cfg.api_key.as_deref(),
            api_endpoint: cfg.api_endpoint.as_deref(),
            api_version: cfg.api_version.as_deref(),
            azure_deployment_name: cfg.azure_deployment_name.as_deref(),
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
        }
    }

    fn fallback(cfg: &'a LlmConfig, kind: ProviderKind) -> Self {
        // The endpoint override only carries over to an Azure fallback.
        let api_endpoint = match kind {
            ProviderKind::AzureOpenAi => cfg.api_endpoint.as_deref(),
            _ => None,
        };
        Self {
            model: cfg.fallback_model.as_deref().unwrap_or(&cfg.model),
            api_key: cfg.fallback_api_key.as_deref(),
            api_endpoint,
            api_version: cfg.api_version.as_deref(),
            azure_deployment_name: cfg.azure_deployment_name.as_deref(),
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
        }
    }
}

/// Build the client for `cfg.provider`, plus its fallback if one is configured.
///
/// Hosted providers without an API key fail here, before any network call.
/// An unrecognized fallback tag is logged and ignored.
pub fn build_llm_client(cfg: &LlmConfig, env: &dyn EnvSource) -> Result<LlmClient> {
    let kind: ProviderKind = cfg.provider.parse()?;
    let mut client = LlmClient::new(build_backend(kind, &BackendSettings::primary(cfg), env)?);

    let fallback = cfg
        .fallback_provider
        .as_deref()
        .filter(|tag| !tag.is_empty() && *tag != cfg.provider);
    if let Some(tag) = fallback {
        match tag.parse::<ProviderKind>() {
            Ok(fallback_kind) => {
                let settings = BackendSettings::fallback(cfg, fallback_kind);
                client = client.with_fallback(build_backend(fallback_kind, &settings, env)?);
                info!("Configured {} as fallback for {}", fallback_kind, kind);
            }
            Err(_) => warn!("Unsupported fallback LLM provider: {}", tag),
        }
    }

    Ok(client)
}

fn build_backend(
    kind: ProviderKind,
    settings: &BackendSettings<'_>,
    env: &dyn EnvSource,
) -> Result<Box<dyn CompletionBackend>> {
    let backend: Box<dyn CompletionBackend> = match kind {
        ProviderKind::Cortex => Box::new(CortexBackend::new(settings.model)),
        ProviderKind::OpenAi => {
            let api_key = require_api_key(kind, settings, env)?;
            let base_url = settings.api_endpoint.unwrap_or(OPENAI_BASE_URL).to_string();
            Box::new(OpenAiBackend::new(
                OpenAiTarget::Direct { base_url },
                api_key,
                settings.model.to_string(),
                settings.temperature,
                settings.max_tokens,
            ))
        }
        ProviderKind::AzureOpenAi => {
            let api_key = require_api_key(kind, settings, env)?;
            let endpoint = config_or_env(settings.api_endpoint, env, AZURE_ENDPOINT_ENV)
                .ok_or_else(|| {
                    SemlayerError::MissingCredential(format!(
                        "Azure OpenAI endpoint must be set in llm.api_endpoint or {}",
                        AZURE_ENDPOINT_ENV
                    ))
                })?;
            let deployment = settings
                .azure_deployment_name
                .filter(|d| !d.is_empty())
                .ok_or_else(|| SemlayerError::MissingField("llm.azure_deployment_name".into()))?
                .to_string();
            let api_version = settings
                .api_version
                .unwrap_or(DEFAULT_AZURE_API_VERSION)
                .to_string();
            Box::new(OpenAiBackend::new(
                OpenAiTarget::Azure {
                    endpoint,
                    deployment,
                    api_version,
                },
                api_key,
                settings.model.to_string(),
                settings.temperature,
                settings.max_tokens,
            ))
        }
        ProviderKind::Anthropic => {
            let api_key = require_api_key(kind, settings, env)?;
            Box::new(AnthropicBackend::new(
                settings.api_endpoint.map(str::to_string),
                api_key,
                settings.model.to_string(),
                settings.temperature,
                settings.max_tokens,
            ))
        }
    };
    Ok(backend)
}

fn require_api_key(
    kind: ProviderKind,
    settings: &BackendSettings<'_>,
    env: &dyn EnvSource,
) -> Result<String> {
    let var = kind.api_key_env().unwrap_or_default();
    config_or_env(settings.api_key, env, var).ok_or_else(|| {
        SemlayerError::MissingCredential(format!(
            "{} API key must be set in the llm config or {}",
            kind, var
        ))
    })
}
