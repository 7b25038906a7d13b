use crate::domain::ports::Navigator;
use crate::utils::error::{CheckoutError, Result};
use std::sync::Mutex;
use url::Url;

/// 記錄導向目標而不真正開啟瀏覽器；CLI 與測試使用
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visited: Mutex<Vec<Url>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visited(&self) -> Vec<Url> {
        self.visited.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn last(&self) -> Option<Url> {
        self.visited().pop()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, url: &Url) -> Result<()> {
        tracing::info!("🧭 Redirecting to {}", url);
        let mut visited = self.visited.lock().map_err(|_| CheckoutError::NavigationError {
            message: "Navigator lock poisoned".to_string(),
        })?;
        visited.push(url.clone());
        Ok(())
    }
}
