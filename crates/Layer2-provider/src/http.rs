//! HTTP semantic judge
//!
//! Sends the command plus context to an external judgment service and parses the
//! structured reply. A hard timeout is enforced on both the client and the call.

use crate::error::{from_http_status, from_reqwest};
use crate::protocol::{ChatRequest, ChatResponse, DirectRequest, DirectResponse};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use warden_foundation::{
    JudgeConfig, JudgeContext, JudgeError, JudgeProtocol, RiskVerdict, SemanticJudge,
};

const DEFAULT_TIMEOUT_MS: u64 = 10_000;
const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";

/// Live judge over HTTP
pub struct HttpJudge {
    client: Client,
    endpoint: String,
    protocol: JudgeProtocol,
    api_key: Option<String>,
    model: String,
    timeout: Duration,
}

impl HttpJudge {
    /// Create a judge for the given endpoint
    pub fn new(endpoint: impl Into<String>, protocol: JudgeProtocol) -> Result<Self, JudgeError> {
        let endpoint = endpoint.into();
        if endpoint.trim().is_empty() {
            return Err(JudgeError::NotConfigured("endpoint is empty".to_string()));
        }

        let timeout = Duration::from_millis(DEFAULT_TIMEOUT_MS);
        Ok(Self {
            client: build_client(timeout)?,
            endpoint: normalize_endpoint(&endpoint, protocol),
            protocol,
            api_key: None,
            model: "moonshot-v1-8k".to_string(),
            timeout,
        })
    }

    /// Build from configuration
    ///
    /// The chat protocol needs an API key in the configured env var.
    pub fn from_config(config: &JudgeConfig) -> Result<Self, JudgeError> {
        let api_key = config.api_key();
        if config.protocol == JudgeProtocol::ChatCompletions && api_key.is_none() {
            return Err(JudgeError::NotConfigured(format!(
                "{} is not set",
                config.api_key_env
            )));
        }

        let mut judge = Self::new(&config.endpoint, config.protocol)?
            .with_model(&config.model)
            .with_timeout(config.timeout())?;
        judge.api_key = api_key;
        Ok(judge)
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set custom timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, JudgeError> {
        self.client = build_client(timeout)?;
        self.timeout = timeout;
        Ok(self)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn request(&self, command: &str, context: &JudgeContext) -> Result<RiskVerdict, JudgeError> {
        let builder = self.client.post(&self.endpoint);
        let builder = match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        };

        let builder = match self.protocol {
            JudgeProtocol::Direct => builder.json(&DirectRequest { command, context }),
            JudgeProtocol::ChatCompletions => {
                builder.json(&ChatRequest::new(&self.model, command, context))
            }
        };

        let response = builder
            .send()
            .await
            .map_err(|e| from_reqwest(e, self.timeout))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(from_http_status(status.as_u16(), &body));
        }

        match self.protocol {
            JudgeProtocol::Direct => response
                .json::<DirectResponse>()
                .await
                .map_err(|e| JudgeError::InvalidResponse(e.to_string()))?
                .into_verdict(),
            JudgeProtocol::ChatCompletions => response
                .json::<ChatResponse>()
                .await
                .map_err(|e| JudgeError::InvalidResponse(e.to_string()))?
                .into_verdict(),
        }
    }
}

#[async_trait]
impl SemanticJudge for HttpJudge {
    fn name(&self) -> &str {
        match self.protocol {
            JudgeProtocol::Direct => "http",
            JudgeProtocol::ChatCompletions => "chat-completions",
        }
    }

    async fn judge(&self, command: &str, context: &JudgeContext) -> Result<RiskVerdict, JudgeError> {
        debug!("[judge] Requesting verdict from {}", self.endpoint);

        match tokio::time::timeout(self.timeout, self.request(command, context)).await {
            Ok(result) => result,
            Err(_) => Err(JudgeError::Timeout(self.timeout.as_millis() as u64)),
        }
    }
}

fn build_client(timeout: Duration) -> Result<Client, JudgeError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| JudgeError::NotConfigured(format!("Failed to create HTTP client: {}", e)))
}

/// For the chat protocol an API base like `https://api.moonshot.cn/v1` gets the
/// `/chat/completions` path appended.
fn normalize_endpoint(endpoint: &str, protocol: JudgeProtocol) -> String {
    let endpoint = endpoint.trim().trim_end_matches('/');
    match protocol {
        JudgeProtocol::ChatCompletions if !endpoint.ends_with(CHAT_COMPLETIONS_PATH) => {
            format!("{}{}", endpoint, CHAT_COMPLETIONS_PATH)
        }
        _ => endpoint.to_string(),
    }
}
