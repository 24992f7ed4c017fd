use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

/// One row of the conversation log.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationEntry {
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub user_id: String,
    pub channel: String,
    pub question: String,
    pub response: String,
    pub order_status: bool,
    pub orders_count: usize,
}

/// Best-effort sink for conversation rows (a spreadsheet web-app endpoint in
/// production). Failures never reach the caller.
#[derive(Clone)]
pub struct ConversationLogger {
    http: reqwest::Client,
    url: Option<String>,
    timeout: Duration,
}

impl ConversationLogger {
    pub fn new(url: Option<String>, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
            timeout,
        }
    }

    pub fn disabled() -> Self {
        Self::new(None, Duration::from_secs(8))
    }

    /// Fire and forget: spawns the upload and returns immediately.
    pub fn log(&self, entry: ConversationEntry) {
        let Some(url) = self.url.clone() else {
            return;
        };
        let logger = self.clone();
        tokio::spawn(async move {
            if let Err(err) = logger.send(&url, &entry).await {
                warn!(session_id = %entry.session_id, error = %err, "conversation log failed");
            }
        });
    }

    async fn send(&self, url: &str, entry: &ConversationEntry) -> Result<(), String> {
        let response = self
            .http
            .post(url)
            .timeout(self.timeout)
            .json(entry)
            .send()
            .await
            .map_err(|err| err.to_string())?;
        if !response.status().is_success() {
            return Err(format!("log endpoint returned {}", response.status()));
        }
        debug!(session_id = %entry.session_id, "conversation logged");
        Ok(())
    }
}
