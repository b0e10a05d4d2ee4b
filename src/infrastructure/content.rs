use crate::domain::ports::MessageContent;
use crate::error::{Result, SettleError};
use async_trait::async_trait;

/// Fetches raw message content (slip image bytes) from the chat platform's
/// content API.
pub struct ChatContentClient {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl ChatContentClient {
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            access_token: access_token.into(),
        }
    }
}

#[async_trait]
impl MessageContent for ChatContentClient {
    async fn fetch(&self, message_id: &str) -> Result<Vec<u8>> {
        let url = format!("{}/v2/bot/message/{message_id}/content", self.base_url);
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| SettleError::Internal(Box::new(e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SettleError::Store(format!(
                "content API returned {status} for message {message_id}"
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SettleError::Internal(Box::new(e)))?;
        Ok(bytes.to_vec())
    }
}
