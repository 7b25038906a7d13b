use crate::domain::catalog::{AddOnSelection, EndpointId};
use crate::utils::error::{CheckoutError, Result};
use crate::utils::validation::validate_photo_url;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

pub const MIN_RECIPIENTS: u8 = 1;
pub const MAX_RECIPIENTS: u8 = 3;
pub const DEFAULT_LOCALE: &str = "en";

/// 聯絡資料，精靈過程中可能只填了一部分
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub tax_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Child {
    pub name: String,
    #[serde(default)]
    pub photo_urls: Vec<String>,
}

impl Child {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            photo_urls: Vec::new(),
        }
    }
}

/// 目前這個訂購 session 的所有選擇
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub recipient_count: u8,
    pub add_ons: AddOnSelection,
    pub photo_count: u32,
    pub contact: Contact,
    pub region: String,
    #[serde(default)]
    pub children: Vec<Child>,
    #[serde(default)]
    pub message: Option<String>,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            recipient_count: MIN_RECIPIENTS,
            add_ons: AddOnSelection::empty(),
            photo_count: 0,
            contact: Contact::default(),
            region: DEFAULT_LOCALE.to_string(),
            children: Vec::new(),
            message: None,
        }
    }
}

/// 超出範圍的人數直接夾到 [1, 3]，不回報錯誤
pub fn clamp_recipient_count(value: i64) -> u8 {
    let clamped = value.clamp(MIN_RECIPIENTS as i64, MAX_RECIPIENTS as i64) as u8;
    if clamped as i64 != value {
        tracing::debug!("👥 Recipient count {} clamped to {}", value, clamped);
    }
    clamped
}

/// 空字串視為未填
fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// 把上傳完成的照片掛到第幾個孩子
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoAttachment {
    pub child_index: usize,
    pub url: String,
}

/// 精靈步驟送進來的部分更新
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionDelta {
    pub recipient_count: Option<i64>,
    pub add_on_ids: Option<Vec<String>>,
    pub photo_count: Option<u32>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub tax_id: Option<String>,
    pub region: Option<String>,
    pub children: Option<Vec<Child>>,
    pub message: Option<String>,
    pub photo: Option<PhotoAttachment>,
}

impl SelectionDelta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recipients(mut self, count: i64) -> Self {
        self.recipient_count = Some(count);
        self
    }

    pub fn add_ons<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_on_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn photos(mut self, count: u32) -> Self {
        self.photo_count = Some(count);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn tax_id(mut self, tax_id: impl Into<String>) -> Self {
        self.tax_id = Some(tax_id.into());
        self
    }

    pub fn region(mut self, locale: impl Into<String>) -> Self {
        self.region = Some(locale.into());
        self
    }

    pub fn children(mut self, children: Vec<Child>) -> Self {
        self.children = Some(children);
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn attach_photo(mut self, child_index: usize, url: impl Into<String>) -> Self {
        self.photo = Some(PhotoAttachment {
            child_index,
            url: url.into(),
        });
        self
    }
}

impl Selection {
    /// 合併部分更新；任何欄位驗證失敗時整筆不套用
    pub fn merged(&self, delta: SelectionDelta) -> Result<Selection> {
        let mut next = self.clone();

        if let Some(count) = delta.recipient_count {
            next.recipient_count = clamp_recipient_count(count);
        }
        if let Some(ids) = delta.add_on_ids {
            next.add_ons = AddOnSelection::parse(&ids)?;
        }
        if let Some(count) = delta.photo_count {
            next.photo_count = count;
        }
        if let Some(name) = delta.name {
            next.contact.name = non_empty(name);
        }
        if let Some(email) = delta.email {
            next.contact.email = non_empty(email);
        }
        if let Some(phone) = delta.phone {
            next.contact.phone = non_empty(phone);
        }
        if let Some(tax_id) = delta.tax_id {
            next.contact.tax_id = non_empty(tax_id);
        }
        if let Some(region) = delta.region.and_then(non_empty) {
            next.region = region.to_ascii_lowercase();
        }
        if let Some(children) = delta.children {
            for (index, child) in children.iter().enumerate() {
                for url in &child.photo_urls {
                    validate_photo_url(&format!("children[{}].photoUrls", index), url)?;
                }
            }
            next.children = children;
        }
        if let Some(message) = delta.message {
            next.message = non_empty(message);
        }
        if let Some(photo) = delta.photo {
            let field = format!("children[{}].photoUrls", photo.child_index);
            validate_photo_url(&field, &photo.url)?;
            let child = next
                .children
                .get_mut(photo.child_index)
                .ok_or_else(|| CheckoutError::ValidationError {
                    field: field.clone(),
                    message: format!("No child at index {}", photo.child_index),
                })?;
            child.photo_urls.push(photo.url);
        }

        Ok(next)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub id: String,
    pub label: String,
    pub unit_price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
}

impl LineItem {
    /// 單價乘數量，沒有數量時視為 1
    pub fn amount(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity.unwrap_or(1))
    }
}

/// 價格明細，由選擇推導而來，永遠不直接編輯
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    pub line_items: Vec<LineItem>,
    pub base_price: Decimal,
    pub add_on_total: Decimal,
    pub photo_total: Decimal,
    pub bundle_discount: Decimal,
    pub subtotal: Decimal,
    pub total: Decimal,
    pub currency: String,
}

/// 每個 session 只擷取一次的行銷追蹤參數，只增不改
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributionSnapshot {
    entries: BTreeMap<String, serde_json::Value>,
}

impl AttributionSnapshot {
    pub const TRACKED_KEYS: [&'static str; 10] = [
        "utm_source",
        "utm_medium",
        "utm_campaign",
        "utm_term",
        "utm_content",
        "gclid",
        "fbclid",
        "src",
        "sck",
        "xcod",
    ];

    pub fn new() -> Self {
        Self::default()
    }

    /// 從到達頁 URL 擷取追蹤參數；同一個 key 重複時取第一個
    pub fn capture_from_url(url: &Url) -> Self {
        let mut snapshot = Self::new();
        for (key, value) in url.query_pairs() {
            if Self::TRACKED_KEYS.contains(&&*key) && !value.is_empty() {
                snapshot
                    .entries
                    .entry(key.into_owned())
                    .or_insert_with(|| serde_json::Value::String(value.into_owned()));
            }
        }
        snapshot
    }

    pub fn from_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, serde_json::Value)>,
        K: Into<String>,
    {
        Self {
            entries: entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// 只補上尚未存在的 key，回傳新增了幾個
    pub fn fill_absent(&mut self, other: &AttributionSnapshot) -> usize {
        let mut added = 0;
        for (key, value) in &other.entries {
            if !self.entries.contains_key(key) {
                self.entries.insert(key.clone(), value.clone());
                added += 1;
            }
        }
        added
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 可放進 URL 的參數：非字串或空字串的值直接略過
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .filter_map(|(key, value)| match value {
                serde_json::Value::String(s) if !s.trim().is_empty() => {
                    Some((key.clone(), s.clone()))
                }
                _ => None,
            })
            .collect()
    }
}

/// 某個供應商的端點對應結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointMapping {
    pub product_id: String,
    pub provider: String,
    pub selected_add_on_ids: Vec<String>,
    pub resolved_endpoint_id: EndpointId,
    pub endpoint_path: String,
    pub attribution_params: Vec<(String, String)>,
    pub customer_params: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionMetadata {
    pub submitted_at: String,
    pub locale: String,
    pub recipient_count: u8,
    pub child_count: usize,
    pub photo_count: u32,
    pub total: Decimal,
    pub currency: String,
}

/// 送給提交協作者的扁平紀錄
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRecord {
    pub contact: Contact,
    pub children: Vec<Child>,
    pub message: Option<String>,
    pub add_on_ids: Vec<String>,
    pub attribution: AttributionSnapshot,
    pub metadata: SubmissionMetadata,
}

impl SubmissionRecord {
    pub fn new(
        selection: &Selection,
        pricing: &PriceBreakdown,
        attribution: &AttributionSnapshot,
        submitted_at: chrono::DateTime<chrono::Utc>,
    ) -> Self {
        Self {
            contact: selection.contact.clone(),
            children: selection.children.clone(),
            message: selection.message.clone(),
            add_on_ids: selection.add_ons.ids(),
            attribution: attribution.clone(),
            metadata: SubmissionMetadata {
                submitted_at: submitted_at.to_rfc3339(),
                locale: selection.region.clone(),
                recipient_count: selection.recipient_count,
                child_count: selection.children.len(),
                photo_count: selection.photo_count,
                total: pricing.total,
                currency: pricing.currency.clone(),
            },
        }
    }
}
