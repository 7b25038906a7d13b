use crate::domain::catalog::{AddOn, EndpointId};
use crate::utils::error::{CheckoutError, Result};
use crate::utils::retry::RetryPolicy;
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_positive_number, validate_price,
    validate_url, Validate,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;

/// 內建預設設定
const BUILTIN_CONFIG: &str = include_str!("../../config/commerce.toml");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommerceConfig {
    pub product: ProductConfig,
    pub store: Option<StoreConfig>,
    pub submission: Option<SubmissionConfig>,
    pub handoff: Option<HandoffConfig>,
    pub regions: RegionsConfig,
    pub providers: HashMap<String, ProviderConfig>,
    pub price_tables: HashMap<String, PriceTable>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductConfig {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionConfig {
    pub endpoint: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub retry_attempts: Option<u32>,
    pub retry_base_delay_ms: Option<u64>,
    pub retry_max_delay_ms: Option<u64>,
    pub headers: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffConfig {
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionsConfig {
    pub default_provider: String,
    /// key 一律以 `normalize_locale` 的形式保存
    #[serde(default)]
    pub locales: HashMap<String, String>,
}

/// locale 標籤的標準形式：小寫、以 `-` 分隔
pub fn normalize_locale(locale: &str) -> String {
    locale.trim().to_ascii_lowercase().replace('_', "-")
}

impl RegionsConfig {
    /// 把設定檔裡的 locale key 轉成標準形式；正規化後撞名且指向不同供應商時拒絕
    fn normalize_keys(&mut self) -> Result<()> {
        let mut normalized: HashMap<String, String> = HashMap::with_capacity(self.locales.len());
        for (locale, provider) in self.locales.drain() {
            let key = normalize_locale(&locale);
            match normalized.get(&key) {
                Some(existing) if existing != &provider => {
                    return Err(CheckoutError::ConfigValidationError {
                        field: format!("regions.locales.{}", locale),
                        message: format!(
                            "Locale '{}' maps to both '{}' and '{}'",
                            key, existing, provider
                        ),
                    });
                }
                _ => {
                    normalized.insert(key, provider);
                }
            }
        }
        self.locales = normalized;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub base_url: String,
    pub currency: String,
    #[serde(default)]
    pub params: QueryParamNames,
    /// endpoint id → 供應商端的結帳路徑
    #[serde(default)]
    pub endpoints: BTreeMap<String, String>,
}

impl ProviderConfig {
    pub fn endpoint_path(&self, endpoint: EndpointId) -> Option<&str> {
        self.endpoints
            .get(endpoint.as_str())
            .map(String::as_str)
            .filter(|p| !p.trim().is_empty())
    }

    pub fn missing_endpoints(&self) -> Vec<EndpointId> {
        EndpointId::ALL
            .iter()
            .copied()
            .filter(|id| self.endpoint_path(*id).is_none())
            .collect()
    }
}

/// 供應商端的客戶參數名稱
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryParamNames {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub tax_id: String,
}

impl Default for QueryParamNames {
    fn default() -> Self {
        Self {
            name: "name".to_string(),
            email: "email".to_string(),
            phone: "phone".to_string(),
            tax_id: "tax_id".to_string(),
        }
    }
}

/// 單一幣別的靜態價格表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceTable {
    /// 依人數 1/2/3 排列
    pub base_prices: Vec<Decimal>,
    pub add_ons: BTreeMap<String, Decimal>,
    pub bundle_price: Decimal,
    pub bundle_savings: Decimal,
    pub photo_price: Decimal,
}

impl PriceTable {
    pub fn base_price(&self, recipient_count: u8) -> Decimal {
        let index = usize::from(recipient_count.saturating_sub(1));
        self.base_prices
            .get(index)
            .or_else(|| self.base_prices.last())
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    pub fn add_on_price(&self, add_on: AddOn) -> Decimal {
        if add_on.is_bundle() {
            return self.bundle_price;
        }
        self.add_ons.get(add_on.id()).copied().unwrap_or(Decimal::ZERO)
    }

    /// 個別項目原價合計，用來顯示套裝的原價
    pub fn individual_total(&self) -> Decimal {
        AddOn::INDIVIDUALS.iter().map(|a| self.add_on_price(*a)).sum()
    }

    fn validate_table(&self, currency: &str) -> Result<()> {
        if self.base_prices.len() != 3 {
            return Err(CheckoutError::InvalidConfigValueError {
                field: format!("price_tables.{}.base_prices", currency),
                value: self.base_prices.len().to_string(),
                reason: "Exactly three base prices (1, 2 and 3 recipients) are required".to_string(),
            });
        }
        for (index, price) in self.base_prices.iter().enumerate() {
            validate_price(&format!("price_tables.{}.base_prices[{}]", currency, index), *price)?;
        }
        for add_on in AddOn::INDIVIDUALS {
            let price = self.add_ons.get(add_on.id()).ok_or_else(|| CheckoutError::MissingConfigError {
                field: format!("price_tables.{}.add_ons.{}", currency, add_on.id()),
            })?;
            validate_price(&format!("price_tables.{}.add_ons.{}", currency, add_on.id()), *price)?;
        }
        for key in self.add_ons.keys() {
            match key.parse::<AddOn>() {
                Ok(add_on) if !add_on.is_bundle() => {}
                _ => {
                    return Err(CheckoutError::InvalidConfigValueError {
                        field: format!("price_tables.{}.add_ons", currency),
                        value: key.clone(),
                        reason: "Only individual catalog add-ons can be priced here".to_string(),
                    })
                }
            }
        }
        validate_price(&format!("price_tables.{}.bundle_price", currency), self.bundle_price)?;
        validate_price(&format!("price_tables.{}.bundle_savings", currency), self.bundle_savings)?;
        validate_price(&format!("price_tables.{}.photo_price", currency), self.photo_price)?;

        // 折扣不能大於套裝本身，否則總價可能變成負數
        if self.bundle_savings > self.bundle_price {
            return Err(CheckoutError::ConfigValidationError {
                field: format!("price_tables.{}.bundle_savings", currency),
                message: format!(
                    "Bundle savings {} exceed bundle price {}",
                    self.bundle_savings, self.bundle_price
                ),
            });
        }
        Ok(())
    }
}

impl CommerceConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(CheckoutError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        // 處理環境變數替換
        let processed_content = Self::substitute_env_vars(content)?;

        let mut config: Self =
            toml::from_str(&processed_content).map_err(|e| CheckoutError::ConfigValidationError {
                field: "toml_parsing".to_string(),
                message: format!("TOML parsing error: {}", e),
            })?;
        config.regions.normalize_keys()?;
        Ok(config)
    }

    /// 內建的預設配置（兩個供應商、兩張價格表）
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_CONFIG)
    }

    /// 替換環境變數 (例如 ${WEBHOOK_TOKEN})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| CheckoutError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validate_non_empty_string("product.id", &self.product.id)?;

        if let Some(store) = &self.store {
            validate_path("store.path", &store.path)?;
        }

        if let Some(submission) = &self.submission {
            if let Some(endpoint) = &submission.endpoint {
                validate_url("submission.endpoint", endpoint)?;
            }
            if let Some(attempts) = submission.retry_attempts {
                validate_positive_number("submission.retry_attempts", u64::from(attempts), 1)?;
            }
            if let Some(timeout) = submission.timeout_seconds {
                validate_positive_number("submission.timeout_seconds", timeout, 1)?;
            }
        }

        if let Some(timeout) = self.handoff.as_ref().and_then(|h| h.timeout_seconds) {
            validate_positive_number("handoff.timeout_seconds", timeout, 1)?;
        }

        // 交接時限比重試全部跑完還短時，最後幾次重試會被截斷成逾時
        let budget = self.submission_budget();
        if self.handoff_timeout() < budget {
            tracing::warn!(
                "⚠️ handoff.timeout_seconds ({:?}) is shorter than the worst-case submission retry budget ({:?})",
                self.handoff_timeout(),
                budget
            );
        }

        for (currency, table) in &self.price_tables {
            table.validate_table(currency)?;
        }

        for (name, provider) in &self.providers {
            validate_url(&format!("providers.{}.base_url", name), &provider.base_url)?;
            if !self.price_tables.contains_key(&provider.currency) {
                return Err(CheckoutError::ConfigValidationError {
                    field: format!("providers.{}.currency", name),
                    message: format!("No price table for currency '{}'", provider.currency),
                });
            }
            for (key, path) in &provider.endpoints {
                key.parse::<EndpointId>().map_err(|_| CheckoutError::InvalidConfigValueError {
                    field: format!("providers.{}.endpoints", name),
                    value: key.clone(),
                    reason: "Unknown endpoint id".to_string(),
                })?;
                validate_endpoint_path(&format!("providers.{}.endpoints.{}", name, key), path)?;
            }
            // 缺少端點在解析時才會失敗，這裡先提醒
            let missing = provider.missing_endpoints();
            if !missing.is_empty() {
                tracing::warn!(
                    "⚠️ Provider '{}' is missing checkout endpoints: {}",
                    name,
                    missing.iter().map(|e| e.as_str()).collect::<Vec<_>>().join(", ")
                );
            }
        }

        if !self.providers.contains_key(&self.regions.default_provider) {
            return Err(CheckoutError::ConfigValidationError {
                field: "regions.default_provider".to_string(),
                message: format!("Unknown provider '{}'", self.regions.default_provider),
            });
        }
        for (locale, provider) in &self.regions.locales {
            if !self.providers.contains_key(provider) {
                return Err(CheckoutError::ConfigValidationError {
                    field: format!("regions.locales.{}", locale),
                    message: format!("Unknown provider '{}'", provider),
                });
            }
        }

        Ok(())
    }

    pub fn provider(&self, name: &str) -> Result<&ProviderConfig> {
        self.providers
            .get(name)
            .ok_or_else(|| CheckoutError::MissingConfigError {
                field: format!("providers.{}", name),
            })
    }

    pub fn price_table(&self, currency: &str) -> Result<&PriceTable> {
        self.price_tables
            .get(currency)
            .ok_or_else(|| CheckoutError::MissingConfigError {
                field: format!("price_tables.{}", currency),
            })
    }

    /// 取得 session 檔案路徑
    pub fn store_path(&self) -> Option<&str> {
        self.store.as_ref().map(|s| s.path.as_str())
    }

    pub fn submission_endpoint(&self) -> Option<&str> {
        self.submission.as_ref().and_then(|s| s.endpoint.as_deref())
    }

    /// 所有嘗試都逾時、每次退避都取到上限時的總耗時
    pub fn submission_budget(&self) -> Duration {
        let retry = self.retry_policy();
        self.submission_timeout() * retry.max_attempts + retry.worst_case_delay()
    }

    pub fn submission_timeout(&self) -> Duration {
        Duration::from_secs(
            self.submission
                .as_ref()
                .and_then(|s| s.timeout_seconds)
                .unwrap_or(10),
        )
    }

    pub fn submission_headers(&self) -> HashMap<String, String> {
        self.submission
            .as_ref()
            .and_then(|s| s.headers.clone())
            .unwrap_or_default()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let defaults = RetryPolicy::default();
        match &self.submission {
            Some(s) => RetryPolicy::new(
                s.retry_attempts.unwrap_or(defaults.max_attempts),
                s.retry_base_delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.base_delay),
                s.retry_max_delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.max_delay),
            ),
            None => defaults,
        }
    }

    pub fn handoff_timeout(&self) -> Duration {
        Duration::from_secs(
            self.handoff
                .as_ref()
                .and_then(|h| h.timeout_seconds)
                .unwrap_or(45),
        )
    }
}

/// 端點路徑是供應商的不透明 id，只能放在 URL 路徑裡
fn validate_endpoint_path(field_name: &str, path: &str) -> Result<()> {
    if path.contains(['?', '#']) {
        return Err(CheckoutError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Endpoint paths cannot carry a query string or fragment".to_string(),
        });
    }
    Ok(())
}

impl Validate for CommerceConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
