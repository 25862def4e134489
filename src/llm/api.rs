//! OpenAI-compatible streaming backend.
//!
//! Works against any server implementing the chat completions API with
//! `stream: true` (Groq, OpenAI, X.AI, Ollama, vLLM, llama.cpp server, ...).

use crate::config::ModelConfig;
use crate::error::{Result, VoiceError};
use crate::llm::sse::{DONE_SENTINEL, RecordParser};
use crate::llm::{ChatMessage, ModelStream};
use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Model-stream collaborator backed by an OpenAI-compatible HTTP API.
pub struct ApiModelStream {
    config: ModelConfig,
    client: reqwest::Client,
}

impl ApiModelStream {
    /// Create a new API-backed model stream.
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            config: config.clone(),
            client: reqwest::Client::new(),
        }
    }

    fn completions_url(&self) -> String {
        let base = self
            .config
            .api_url
            .strip_suffix("/v1")
            .unwrap_or(&self.config.api_url);
        let base = base.trim_end_matches('/');
        format!("{base}/v1/chat/completions")
    }
}

#[async_trait]
impl ModelStream for ApiModelStream {
    async fn stream_reply(
        &self,
        history: &[ChatMessage],
        delta_tx: mpsc::Sender<String>,
    ) -> Result<()> {
        let body = serde_json::json!({
            "model": self.config.api_model,
            "messages": history,
            "stream": true,
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        });

        let mut request = self.client.post(self.completions_url()).json(&body);
        if !self.config.api_key.is_empty() {
            request = request.bearer_auth(&self.config.api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| VoiceError::Stream(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VoiceError::Stream(format!(
                "API returned {status}: {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let mut byte_stream = response.bytes_stream();
        let mut parser = RecordParser::new();

        while let Some(chunk) = byte_stream.next().await {
            let chunk = chunk.map_err(|e| VoiceError::Stream(format!("read error: {e}")))?;
            for payload in parser.push(&chunk) {
                if payload == DONE_SENTINEL {
                    return Ok(());
                }
                match serde_json::from_str::<serde_json::Value>(&payload) {
                    Ok(record) => {
                        if let Some(delta) = record["choices"][0]["delta"]["content"].as_str()
                            && !delta.is_empty()
                            && delta_tx.send(delta.to_owned()).await.is_err()
                        {
                            // Receiver dropped: the turn was cancelled.
                            debug!("delta receiver dropped, abandoning stream");
                            return Ok(());
                        }
                    }
                    // Malformed records are local damage; keep streaming.
                    Err(e) => warn!("skipping malformed stream record: {e}"),
                }
            }
        }

        Ok(())
    }
}
