//! OpenAI chat completions, direct or through an Azure OpenAI deployment

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::client::CompletionBackend;
use crate::error::LlmError;
use crate::prompt::SYSTEM_PROMPT;
use crate::provider::ProviderKind;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_AZURE_API_VERSION: &str = "2023-05-15";
pub const DEFAULT_MAX_TOKENS: u32 = 500;

/// Where requests go and how they are authenticated.
#[derive(Debug, Clone)]
pub enum OpenAiTarget {
    Direct {
        base_url: String,
    },
    Azure {
        endpoint: String,
        deployment: String,
        api_version: String,
    },
}

#[derive(Debug, Clone)]
pub struct OpenAiBackend {
    http: reqwest::Client,
    target: OpenAiTarget,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatContent,
}

#[derive(Deserialize)]
struct ChatContent {
    content: Option<String>,
}

impl OpenAiBackend {
    pub fn new(
        target: OpenAiTarget,
        api_key: String,
        model: String,
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Self {
        match &target {
            OpenAiTarget::Direct { .. } => {
                info!("Initialized OpenAI client with model: {}", model)
            }
            OpenAiTarget::Azure { deployment, .. } => {
                info!("Initialized Azure OpenAI client with deployment: {}", deployment)
            }
        }
        Self {
            http: reqwest::Client::new(),
            target,
            api_key,
            model,
            temperature,
            max_tokens: max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        }
    }

    fn url(&self) -> String {
        match &self.target {
            OpenAiTarget::Direct { base_url } => {
                format!("{}/v1/chat/completions", base_url.trim_end_matches('/'))
            }
            OpenAiTarget::Azure {
                endpoint,
                deployment,
                api_version,
            } => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                endpoint.trim_end_matches('/'),
                deployment,
                api_version
            ),
        }
    }

    fn provider_name(&self) -> &'static str {
        self.provider().as_str()
    }
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    fn provider(&self) -> ProviderKind {
        match self.target {
            OpenAiTarget::Direct { .. } => ProviderKind::OpenAi,
            OpenAiTarget::Azure { .. } => ProviderKind::AzureOpenAi,
        }
    }

    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        // Azure routes on the deployment in the URL, not on the model field.
        let model = match self.target {
            OpenAiTarget::Direct { .. } => Some(self.model.as_str()),
            OpenAiTarget::Azure { .. } => None,
        };
        let request = ChatRequest {
            model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        debug!("Calling {} with model: {}", self.provider_name(), self.model);

        let builder = self.http.post(self.url()).json(&request);
        let builder = match self.target {
            OpenAiTarget::Direct { .. } => builder.bearer_auth(&self.api_key),
            OpenAiTarget::Azure { .. } => builder.header("api-key", &self.api_key),
        };
        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await?;
            return Err(LlmError::Api {
                provider: self.provider_name(),
                status,
                body,
            });
        }

        let response: ChatResponse = response.json().await?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(LlmError::EmptyResponse(self.provider_name()))
    }
}
