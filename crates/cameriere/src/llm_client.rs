//! Generation backends.
//!
//! A closed set of variants selected from configuration at startup: local
//! inference through Ollama, any OpenAI-compatible chat completions server,
//! or canned replies for tests and offline runs. All of them expose the same
//! contract: role-tagged messages plus generation parameters in, reply text
//! out, failures surfaced uniformly as `WaiterError::Generation`.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use cameriere_common::config::{LlmConfig, ProviderKind};
use cameriere_common::llm::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, OllamaChatRequest,
    OllamaChatResponse, OllamaOptions,
};
use cameriere_common::WaiterError;
use tracing::{info, warn};

/// How long Ollama keeps the model loaded after the last request.
const DEFAULT_KEEP_ALIVE: &str = "5m";

pub enum LlmBackend {
    Ollama(OllamaClient),
    OpenaiCompatible(OpenAiClient),
    Scripted(ScriptedBackend),
}

impl LlmBackend {
    /// Build the backend named by the configuration.
    pub fn from_config(config: &LlmConfig) -> Result<Self, WaiterError> {
        let backend = match config.provider {
            ProviderKind::Ollama => Self::Ollama(OllamaClient::new(config)?),
            ProviderKind::OpenaiCompatible => Self::OpenaiCompatible(OpenAiClient::new(config)?),
            ProviderKind::Scripted => Self::Scripted(ScriptedBackend::default()),
        };
        Ok(backend)
    }

    /// Generate the waiter's reply for the given message history.
    pub async fn generate(
        &self,
        messages: &[ChatMessage],
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, WaiterError> {
        match self {
            Self::Ollama(client) => client.generate(messages, max_tokens, temperature).await,
            Self::OpenaiCompatible(client) => {
                client.generate(messages, max_tokens, temperature).await
            }
            Self::Scripted(backend) => backend.next(),
        }
    }

    /// Cheap reachability probe, used only for startup hints.
    pub async fn is_available(&self) -> bool {
        match self {
            Self::Ollama(client) => client.is_available().await,
            Self::OpenaiCompatible(client) => client.is_available().await,
            Self::Scripted(_) => true,
        }
    }
}

fn build_http_client(timeout_secs: u64) -> Result<reqwest::Client, WaiterError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| WaiterError::Generation(format!("failed to build HTTP client: {e}")))
}

/// Client for the Ollama chat API.
pub struct OllamaClient {
    http: reqwest::Client,
    model: String,
    base_url: String,
    keep_alive: String,
}

impl OllamaClient {
    pub fn new(config: &LlmConfig) -> Result<Self, WaiterError> {
        Ok(Self {
            http: build_http_client(config.request_timeout_secs)?,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            keep_alive: DEFAULT_KEEP_ALIVE.to_string(),
        })
    }

    async fn generate(
        &self,
        messages: &[ChatMessage],
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, WaiterError> {
        let url = format!("{}/api/chat", self.base_url);
        let request = OllamaChatRequest {
            model: self.model.clone(),
            messages: messages.to_vec(),
            stream: false,
            options: OllamaOptions {
                temperature,
                num_predict: max_tokens,
            },
            keep_alive: Some(self.keep_alive.clone()),
        };

        info!("[>]  LLM CALL [{}] ({} messages)", self.model, messages.len());

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| WaiterError::Generation(format!("Ollama request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("[-]  Ollama error {}: {}", status, body);
            return Err(WaiterError::Generation(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let chat: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| WaiterError::Generation(format!("invalid Ollama response: {e}")))?;

        info!("[<]  LLM RESPONSE ({} chars)", chat.message.content.len());
        Ok(chat.message.content)
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        self.http.get(&url).send().await.is_ok()
    }
}

/// Client for OpenAI-compatible chat completion servers (vLLM, LM Studio,
/// OpenAI itself).
pub struct OpenAiClient {
    http: reqwest::Client,
    model: String,
    base_url: String,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(config: &LlmConfig) -> Result<Self, WaiterError> {
        Ok(Self {
            http: build_http_client(config.request_timeout_secs)?,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            // Local servers accept any key.
            api_key: config.api_key.clone().unwrap_or_else(|| "dummy".to_string()),
        })
    }

    async fn generate(
        &self,
        messages: &[ChatMessage],
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, WaiterError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: messages.to_vec(),
            max_tokens,
            temperature,
        };

        info!("[>]  LLM CALL [{}] ({} messages)", self.model, messages.len());

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| WaiterError::Generation(format!("chat completions request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("[-]  Provider error {}: {}", status, body);
            return Err(WaiterError::Generation(format!(
                "provider returned {status}: {body}"
            )));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| WaiterError::Generation(format!("invalid completion response: {e}")))?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| WaiterError::Generation("provider returned no choices".to_string()))
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/models", self.base_url);
        self.http
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .is_ok()
    }
}

/// One step of a scripted conversation.
#[derive(Debug, Clone)]
pub enum ScriptedStep {
    Reply(String),
    Fail(String),
}

/// Canned backend: replays a fixed script, then a fallback line. Used by the
/// integration tests and by offline demo runs.
pub struct ScriptedBackend {
    steps: Mutex<VecDeque<ScriptedStep>>,
    fallback: String,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl ScriptedBackend {
    pub fn new(steps: Vec<ScriptedStep>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            fallback: "Benvenuto! Sono il cameriere virtuale, cosa posso portarle?".to_string(),
        }
    }

    fn next(&self) -> Result<String, WaiterError> {
        let step = match self.steps.lock() {
            Ok(mut queue) => queue.pop_front(),
            Err(_) => None,
        };
        match step {
            Some(ScriptedStep::Reply(text)) => Ok(text),
            Some(ScriptedStep::Fail(reason)) => Err(WaiterError::Generation(reason)),
            None => Ok(self.fallback.clone()),
        }
    }
}
