use crate::config::toml_config::CommerceConfig;
use crate::domain::model::SubmissionRecord;
use crate::domain::ports::SubmissionClient;
use crate::utils::error::{CheckoutError, Result, SubmissionFailureKind};
use crate::utils::retry::RetryPolicy;
use crate::utils::validation::{validate_required_field, validate_url};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;

/// 把訂單紀錄 POST 到 webhook；失敗時依策略重試
pub struct WebhookSubmissionClient {
    client: Client,
    endpoint: String,
    headers: HashMap<String, String>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl WebhookSubmissionClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            headers: HashMap::new(),
            timeout,
            retry,
        }
    }

    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    pub fn from_config(config: &CommerceConfig) -> Result<Self> {
        let endpoint = validate_required_field(
            "submission.endpoint",
            &config.submission_endpoint().map(str::to_string),
        )?
        .clone();
        validate_url("submission.endpoint", &endpoint)?;

        Ok(Self::new(endpoint, config.submission_timeout(), config.retry_policy())
            .with_headers(config.submission_headers()))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// 單次嘗試；失敗時回傳分類與細節
    async fn attempt(
        &self,
        record: &SubmissionRecord,
    ) -> std::result::Result<(), (SubmissionFailureKind, String)> {
        // 構建請求
        let mut request = self.client.post(&self.endpoint).json(record).timeout(self.timeout);

        // 添加自定義標頭
        for (key, value) in &self.headers {
            request = request.header(key, value);
        }

        let response = request.send().await.map_err(|e| {
            let kind = if e.is_timeout() {
                SubmissionFailureKind::Timeout
            } else {
                SubmissionFailureKind::Network
            };
            (kind, e.to_string())
        })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err((
                SubmissionFailureKind::from_status(status.as_u16()),
                format!("Webhook responded with status: {}", status),
            ))
        }
    }
}

#[async_trait]
impl SubmissionClient for WebhookSubmissionClient {
    async fn submit(&self, record: &SubmissionRecord) -> Result<()> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            tracing::debug!("📡 Submitting order to {} (attempt {})", self.endpoint, attempt);

            match self.attempt(record).await {
                Ok(()) => {
                    tracing::info!("✅ Order submitted after {} attempt(s)", attempt);
                    return Ok(());
                }
                Err((kind, detail)) if kind.is_retryable() && self.retry.should_retry(attempt) => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        "🔁 Submission attempt {} failed ({}): {}. Retrying in {:?}",
                        attempt,
                        kind,
                        detail,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err((kind, detail)) => {
                    tracing::error!(
                        "❌ Submission failed ({}) after {} attempt(s): {}",
                        kind,
                        attempt,
                        detail
                    );
                    return Err(CheckoutError::SubmissionError {
                        kind,
                        attempts: attempt,
                        detail,
                    });
                }
            }
        }
    }
}
