use crate::domain::ports::SlipExtractor;
use crate::domain::slip::SlipRecord;
use crate::error::{ExtractError, Result, SettleError};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

/// The fixed extraction instruction sent with every slip image. The model
/// must answer with a single JSON object of exactly this key set and null
/// for anything it cannot read.
const EXTRACTION_PROMPT: &str = "\
You are reading a photo of a bank transfer slip. Respond with a single JSON \
object and nothing else, using exactly these keys: bank_name, amount, \
transaction_date, transaction_time, sender, receiver, reference_id, channel. \
amount is a number. transaction_date uses YYYY-MM-DD. transaction_time uses \
HH:mm. Use null for any field you cannot read with confidence. Never guess.";

#[derive(Debug, Clone)]
pub struct VisionConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

impl VisionConfig {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
}

/// Slip extractor backed by an OpenAI-style vision chat-completions
/// endpoint. The call is bounded by the configured timeout; expiry surfaces
/// as [`ExtractError::Timeout`].
pub struct OpenAiVisionExtractor {
    client: reqwest::Client,
    config: VisionConfig,
}

impl OpenAiVisionExtractor {
    pub fn new(config: VisionConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SettleError::Internal(Box::new(e)))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl SlipExtractor for OpenAiVisionExtractor {
    async fn extract(&self, image: &[u8]) -> std::result::Result<SlipRecord, ExtractError> {
        let data_url = format!("data:image/jpeg;base64,{}", BASE64.encode(image));
        let request = json!({
            "model": self.config.model,
            "temperature": 0,
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "text", "text": EXTRACTION_PROMPT},
                    {"type": "image_url", "image_url": {"url": data_url}}
                ]
            }]
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ExtractError::Timeout
                } else {
                    ExtractError::Backend(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExtractError::Backend(format!(
                "inference endpoint returned {status}"
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ExtractError::Backend(e.to_string()))?;
        let content = completion_content(&body)?;
        debug!(bytes = content.len(), "received extraction output");
        SlipRecord::parse(content)
    }
}

/// Pulls the assistant text out of a chat-completions response body.
fn completion_content(body: &Value) -> std::result::Result<&str, ExtractError> {
    body.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            ExtractError::Malformed("response carried no message content".to_string())
        })
}
