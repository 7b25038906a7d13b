use crate::config::toml_config::{normalize_locale, CommerceConfig};
use crate::utils::error::Result;
use serde::Serialize;

/// 某個 locale 對應的供應商、幣別與結帳網址
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionRoute {
    pub locale: String,
    pub provider: String,
    pub currency: String,
    pub base_url: String,
}

/// 以 locale 查表選擇結帳供應商；沒對應到的 locale 走國際預設供應商
#[derive(Debug, Clone)]
pub struct RegionRouter<'a> {
    config: &'a CommerceConfig,
}

impl<'a> RegionRouter<'a> {
    pub fn new(config: &'a CommerceConfig) -> Self {
        Self { config }
    }

    /// 完整標籤優先（pt-br），再退到主標籤（pt），最後用預設供應商
    pub fn provider_for(&self, locale: &str) -> &'a str {
        let normalized = normalize_locale(locale);
        let primary = normalized.split('-').next().unwrap_or_default();

        self.config
            .regions
            .locales
            .get(&normalized)
            .or_else(|| self.config.regions.locales.get(primary))
            .map(String::as_str)
            .unwrap_or(self.config.regions.default_provider.as_str())
    }

    pub fn route(&self, locale: &str) -> Result<RegionRoute> {
        let provider = self.provider_for(locale);
        let provider_config = self.config.provider(provider)?;

        let route = RegionRoute {
            locale: locale.to_string(),
            provider: provider.to_string(),
            currency: provider_config.currency.clone(),
            base_url: provider_config.base_url.clone(),
        };
        tracing::debug!(
            "🌍 Locale '{}' routed to {} ({})",
            locale,
            route.provider,
            route.currency
        );
        Ok(route)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_portuguese_routes_to_hotmart() {
        let config = CommerceConfig::builtin().unwrap();
        let router = RegionRouter::new(&config);

        let route = router.route("pt").unwrap();
        assert_eq!(route.provider, "hotmart");
        assert_eq!(route.currency, "BRL");
        assert_eq!(route.base_url, "https://pay.hotmart.com");

        assert_eq!(router.provider_for("pt-BR"), "hotmart");
        assert_eq!(router.provider_for("PT_pt"), "hotmart");
        assert_eq!(router.provider_for("pt-AO"), "hotmart");
    }

    #[test]
    fn test_mixed_case_locale_keys_still_route() {
        let content = include_str!("../../config/commerce.toml").replace(
            "pt = \"hotmart\"\npt-br = \"hotmart\"\npt-pt = \"hotmart\"",
            "\"PT_br\" = \"hotmart\"",
        );
        let config = CommerceConfig::from_toml_str(&content).unwrap();
        assert!(crate::utils::validation::Validate::validate(&config).is_ok());

        let router = RegionRouter::new(&config);
        assert_eq!(router.provider_for("pt-BR"), "hotmart");
        assert_eq!(router.provider_for("pt_br"), "hotmart");
        assert_eq!(router.route("pt-br").unwrap().currency, "BRL");
        assert_eq!(router.provider_for("pt"), "stripe");
    }

    #[test]
    fn test_unmapped_locale_uses_international_default() {
        let config = CommerceConfig::builtin().unwrap();
        let router = RegionRouter::new(&config);

        assert_eq!(router.provider_for("en"), "stripe");
        assert_eq!(router.provider_for("de-CH"), "stripe");
        assert_eq!(router.provider_for(""), "stripe");
        assert_eq!(router.route("fr").unwrap().currency, "USD");
    }
}
