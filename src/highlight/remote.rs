//! Remote highlighting service client.
//!
//! The service takes a form-encoded `[crayon]`-wrapped snippet and returns
//! rendered markup. It is treated as unreliable: requests are retried a
//! bounded number of times with exponential backoff, and exhaustion surfaces
//! a terminal error for the calling document instead of looping forever.

use crate::error::{BlogconvError, Result};
use reqwest::Client;
use std::time::Duration;

/// Language label submitted when a fence declares none.
const DEFAULT_LANG: &str = "text";

pub struct RemoteHighlighter {
    client: Client,
    api_url: String,
    max_retries: usize,
}

impl RemoteHighlighter {
    /// Create a client for the highlighting service endpoint.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created (should not happen in
    /// normal operation).
    pub fn new(api_url: String, max_retries: usize, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_url,
            max_retries,
        }
    }

    /// Submit one fenced block and return the rendered markup.
    pub async fn highlight(&self, code: &str, lang: Option<&str>) -> Result<String> {
        let lang = lang.unwrap_or(DEFAULT_LANG);
        let payload = format!("[crayon lang={lang}]\n{code}\n[/crayon]\n");

        let mut attempt = 0;
        let mut delay = Duration::from_secs(1);

        loop {
            match self.post(&payload).await {
                Ok(markup) => return Ok(markup),
                Err(e) if attempt < self.max_retries => {
                    log::warn!(
                        "Highlight retry {}/{} after error: {}",
                        attempt + 1,
                        self.max_retries,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2; // Exponential backoff
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn post(&self, payload: &str) -> Result<String> {
        let response = self
            .client
            .post(&self.api_url)
            .form(&[("code", payload)])
            .send()
            .await
            .map_err(|e| BlogconvError::Highlight(format!("Network error: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(BlogconvError::Highlight(format!(
                "Highlight service error {status}: {body}"
            )));
        }

        response
            .text()
            .await
            .map_err(|e| BlogconvError::Highlight(format!("Failed to read response: {e}")))
    }
}
