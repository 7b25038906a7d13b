use crate::config::toml_config::CommerceConfig;
use crate::domain::catalog::{AddOnFlags, AddOnSelection, EndpointId};
use crate::utils::error::{CheckoutError, Result};

/// 加購組合 → 端點 id，總是有結果且不會碰撞
pub fn resolve_endpoint(add_ons: &AddOnSelection) -> EndpointId {
    EndpointId::resolve(add_ons.flags())
}

/// 直接從原始 id 解析；套裝出現時優先，其餘 id 忽略
pub fn resolve_endpoint_ids<I, S>(ids: I) -> EndpointId
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    EndpointId::resolve(AddOnFlags::from_ids(ids))
}

/// 把端點 id 對到供應商預先建立的結帳路徑
#[derive(Debug, Clone)]
pub struct EndpointResolver<'a> {
    config: &'a CommerceConfig,
}

impl<'a> EndpointResolver<'a> {
    pub fn new(config: &'a CommerceConfig) -> Self {
        Self { config }
    }

    /// 找不到對應路徑時直接失敗，絕不退回 base（會收錯錢）
    pub fn endpoint_path(&self, provider: &str, endpoint: EndpointId) -> Result<&'a str> {
        let provider_config = self.config.provider(provider)?;
        match provider_config.endpoint_path(endpoint) {
            Some(path) => Ok(path),
            None => {
                tracing::error!(
                    "🚨 Provider '{}' has no checkout endpoint for '{}'",
                    provider,
                    endpoint
                );
                Err(CheckoutError::MissingEndpointError {
                    provider: provider.to_string(),
                    endpoint: endpoint.to_string(),
                })
            }
        }
    }

    pub fn resolve(&self, provider: &str, add_ons: &AddOnSelection) -> Result<(EndpointId, &'a str)> {
        let endpoint = resolve_endpoint(add_ons);
        let path = self.endpoint_path(provider, endpoint)?;
        tracing::debug!("🔀 {:?} resolved to {} ({}) on {}", add_ons.ids(), endpoint, path, provider);
        Ok((endpoint, path))
    }
}
