use crate::config::toml_config::CommerceConfig;
use crate::core::checkout_url::build_checkout_url;
use crate::core::pricing::PricingEngine;
use crate::core::region::{RegionRoute, RegionRouter};
use crate::core::store::SelectionStore;
use crate::domain::model::{PriceBreakdown, SelectionDelta, SubmissionRecord};
use crate::domain::ports::{KeyValueStorage, Navigator, PhotoUploader, SubmissionClient};
use crate::utils::error::{CheckoutError, Result};
use crate::utils::validation::{validate_email, validate_non_empty_string, validate_photo_url};
use std::future::Future;
use std::time::Duration;
use url::Url;

/// 交接前準備好的所有資料
#[derive(Debug, Clone)]
pub struct PreparedCheckout {
    pub route: RegionRoute,
    pub pricing: PriceBreakdown,
    pub record: SubmissionRecord,
    pub url: Url,
}

/// 結帳交接：提交訂單 → 導向結帳頁 → 清除 session
pub struct CheckoutHandoff<C: SubmissionClient, N: Navigator> {
    client: C,
    navigator: N,
    timeout: Duration,
}

impl<C: SubmissionClient, N: Navigator> CheckoutHandoff<C, N> {
    pub fn new(client: C, navigator: N, timeout: Duration) -> Self {
        Self {
            client,
            navigator,
            timeout,
        }
    }

    pub fn from_config(client: C, navigator: N, config: &CommerceConfig) -> Self {
        Self::new(client, navigator, config.handoff_timeout())
    }

    pub fn navigator(&self) -> &N {
        &self.navigator
    }

    /// 被放棄的外部呼叫不能無限期掛著
    async fn bounded<T, F>(&self, step: &str, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.timeout, future).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!("⏱️ Hand-off step '{}' timed out after {:?}", step, self.timeout);
                Err(CheckoutError::HandoffTimeoutError {
                    step: step.to_string(),
                    seconds: self.timeout.as_secs(),
                })
            }
        }
    }

    /// 驗證聯絡資料、決定供應商與端點、組出提交紀錄與網址；不產生任何副作用
    pub fn prepare<S: KeyValueStorage>(&self, store: &SelectionStore<S>) -> Result<PreparedCheckout> {
        let config = store.config();
        let selection = store.selection();

        validate_non_empty_string("name", selection.contact.name.as_deref().unwrap_or_default())?;
        validate_email("email", selection.contact.email.as_deref().unwrap_or_default())?;

        let route = RegionRouter::new(config).route(&selection.region)?;
        let pricing = PricingEngine::new(config).price_selection(&selection)?;
        let attribution = store.attribution();
        let url = build_checkout_url(config, &route, &selection, &attribution)?;
        let record = SubmissionRecord::new(&selection, &pricing, &attribution, chrono::Utc::now());

        Ok(PreparedCheckout {
            route,
            pricing,
            record,
            url,
        })
    }

    /// 任何一步失敗都保留 session，讓使用者可以重試
    pub async fn complete<S: KeyValueStorage>(&self, store: &SelectionStore<S>) -> Result<Url> {
        let prepared = self.prepare(store)?;
        tracing::info!(
            "🚀 Starting hand-off to {} ({} {})",
            prepared.route.provider,
            prepared.pricing.total,
            prepared.pricing.currency
        );

        self.bounded("submission", self.client.submit(&prepared.record)).await?;
        self.navigator.navigate(&prepared.url)?;

        // 導向已發出即清除，不等待供應商確認
        store.clear()?;
        Ok(prepared.url)
    }

    /// 上傳照片並掛到指定的孩子；回傳的 URL 只檢查 scheme
    pub async fn upload_photo<S, U>(
        &self,
        store: &SelectionStore<S>,
        uploader: &U,
        child_index: usize,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<String>
    where
        S: KeyValueStorage,
        U: PhotoUploader,
    {
        let url = self.bounded("photo-upload", uploader.upload(file_name, bytes)).await?;
        validate_photo_url("photoUrl", &url)?;
        store.save(SelectionDelta::new().attach_photo(child_index, url.clone()))?;
        tracing::info!("📷 Photo attached to child {}", child_index);
        Ok(url)
    }
}
