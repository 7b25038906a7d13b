use crate::config::toml_config::CommerceConfig;
use crate::core::notifier::{ChangeNotifier, SubscriptionId};
use crate::core::pricing::PricingEngine;
use crate::domain::model::{AttributionSnapshot, PriceBreakdown, Selection, SelectionDelta};
use crate::domain::ports::KeyValueStorage;
use crate::utils::error::{CheckoutError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

pub const SELECTION_KEY: &str = "selection";
pub const PRICING_KEY: &str = "pricing";
pub const CURRENT_STEP_KEY: &str = "current-step";
pub const ATTRIBUTION_KEY: &str = "attribution";

/// 所有持久化紀錄共用的 schema 版本
pub const SCHEMA_VERSION: u32 = 1;

const ALL_KEYS: [&str; 4] = [SELECTION_KEY, PRICING_KEY, CURRENT_STEP_KEY, ATTRIBUTION_KEY];

#[derive(Serialize, Deserialize)]
struct Versioned<T> {
    version: u32,
    data: T,
}

fn encode<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(&Versioned {
        version: SCHEMA_VERSION,
        data: value,
    })?)
}

/// 版本不符的紀錄視為不存在
fn decode<T: DeserializeOwned>(key: &str, raw: &str) -> Result<Option<T>> {
    let envelope: Versioned<serde_json::Value> = serde_json::from_str(raw)?;
    if envelope.version != SCHEMA_VERSION {
        tracing::warn!(
            "⚠️ Ignoring '{}' record with schema version {} (expected {})",
            key,
            envelope.version,
            SCHEMA_VERSION
        );
        return Ok(None);
    }
    Ok(Some(serde_json::from_value(envelope.data)?))
}

/// 精靈的選擇與價格明細存放處。
///
/// `save()` 在回傳前同步重新計價並一起寫入，之後才發出變更通知，
/// 因此任何讀取者都不會看到與選擇不一致的價格。
pub struct SelectionStore<S: KeyValueStorage> {
    storage: Mutex<S>,
    config: Arc<CommerceConfig>,
    notifier: ChangeNotifier,
}

impl<S: KeyValueStorage> SelectionStore<S> {
    pub fn new(storage: S, config: Arc<CommerceConfig>) -> Self {
        Self {
            storage: Mutex::new(storage),
            config,
            notifier: ChangeNotifier::new(),
        }
    }

    pub fn config(&self) -> &CommerceConfig {
        &self.config
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.notifier.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id)
    }

    fn lock(&self) -> Result<MutexGuard<'_, S>> {
        self.storage.lock().map_err(|_| CheckoutError::PersistenceError {
            key: "*".to_string(),
            message: "Storage lock poisoned".to_string(),
        })
    }

    fn read_record<T: DeserializeOwned>(storage: &S, key: &str) -> Result<Option<T>> {
        match storage.read(key)? {
            Some(raw) => decode(key, &raw),
            None => Ok(None),
        }
    }

    /// 讀取失敗時記錄並回傳預設值，不讓精靈中斷
    fn read_or_default<T: DeserializeOwned + Default>(storage: &S, key: &str) -> T {
        match Self::read_record(storage, key) {
            Ok(Some(value)) => value,
            Ok(None) => T::default(),
            Err(e) => {
                tracing::warn!("⚠️ Failed to read '{}', using empty default: {}", key, e);
                T::default()
            }
        }
    }

    /// 目前的選擇；從未寫入或讀取失敗時回傳空白選擇
    pub fn selection(&self) -> Selection {
        match self.lock() {
            Ok(storage) => Self::read_or_default(&storage, SELECTION_KEY),
            Err(e) => {
                tracing::warn!("⚠️ {}", e);
                Selection::default()
            }
        }
    }

    /// 合併部分更新、重新計價、一起寫入，最後通知訂閱者
    pub fn save(&self, delta: SelectionDelta) -> Result<PriceBreakdown> {
        let pricing = {
            let mut storage = self.lock()?;
            let current: Selection = Self::read_or_default(&storage, SELECTION_KEY);
            let next = current.merged(delta)?;
            let pricing = PricingEngine::new(&self.config).price_selection(&next)?;

            storage
                .write_batch(&[(SELECTION_KEY, encode(&next)?), (PRICING_KEY, encode(&pricing)?)])
                .map_err(|e| {
                    tracing::error!("❌ Failed to persist selection: {}", e);
                    e
                })?;

            tracing::debug!("💾 Selection saved, total {} {}", pricing.total, pricing.currency);
            pricing
        };

        self.notifier.notify();
        Ok(pricing)
    }

    /// 最近一次計算的價格明細；沒有時回傳 None（畫面不顯示摘要）
    pub fn current_pricing(&self) -> Option<PriceBreakdown> {
        let storage = match self.lock() {
            Ok(storage) => storage,
            Err(e) => {
                tracing::warn!("⚠️ {}", e);
                return None;
            }
        };

        match Self::read_record::<PriceBreakdown>(&storage, PRICING_KEY) {
            Ok(Some(pricing)) => Some(pricing),
            Ok(None) | Err(_) => {
                // 價格紀錄遺失或損壞但選擇還在時，直接從選擇重算
                let selection = Self::read_record::<Selection>(&storage, SELECTION_KEY).ok().flatten()?;
                match PricingEngine::new(&self.config).price_selection(&selection) {
                    Ok(pricing) => Some(pricing),
                    Err(e) => {
                        tracing::warn!("⚠️ Could not recompute pricing: {}", e);
                        None
                    }
                }
            }
        }
    }

    pub fn current_step(&self) -> u32 {
        match self.lock() {
            Ok(storage) => Self::read_or_default(&storage, CURRENT_STEP_KEY),
            Err(_) => 0,
        }
    }

    pub fn set_current_step(&self, step: u32) -> Result<()> {
        {
            let mut storage = self.lock()?;
            storage.write_batch(&[(CURRENT_STEP_KEY, encode(&step)?)])?;
        }
        self.notifier.notify();
        Ok(())
    }

    pub fn attribution(&self) -> AttributionSnapshot {
        match self.lock() {
            Ok(storage) => Self::read_or_default(&storage, ATTRIBUTION_KEY),
            Err(_) => AttributionSnapshot::default(),
        }
    }

    /// 只補上還沒有的追蹤參數，回傳新增數量
    pub fn capture_attribution(&self, captured: &AttributionSnapshot) -> Result<usize> {
        let mut storage = self.lock()?;
        let mut snapshot: AttributionSnapshot = Self::read_or_default(&storage, ATTRIBUTION_KEY);
        let added = snapshot.fill_absent(captured);
        if added > 0 {
            storage.write_batch(&[(ATTRIBUTION_KEY, encode(&snapshot)?)])?;
            tracing::info!("🏷️ Captured {} attribution key(s)", added);
        }
        Ok(added)
    }

    /// 一次移除所有 key
    pub fn clear(&self) -> Result<()> {
        {
            let mut storage = self.lock()?;
            storage.remove_batch(&ALL_KEYS)?;
        }
        tracing::info!("🧹 Session cleared");
        self.notifier.notify();
        Ok(())
    }
}

impl<S: KeyValueStorage> std::fmt::Debug for SelectionStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectionStore")
            .field("notifier", &self.notifier)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::MemoryStorage;
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn store() -> SelectionStore<MemoryStorage> {
        SelectionStore::new(MemoryStorage::new(), Arc::new(CommerceConfig::builtin().unwrap()))
    }

    /// 讀寫都失敗的儲存體
    struct BrokenStorage;

    impl KeyValueStorage for BrokenStorage {
        fn read(&self, key: &str) -> Result<Option<String>> {
            Err(CheckoutError::PersistenceError {
                key: key.to_string(),
                message: "quota exceeded".to_string(),
            })
        }

        fn write_batch(&mut self, entries: &[(&str, String)]) -> Result<()> {
            Err(CheckoutError::PersistenceError {
                key: entries.first().map(|(k, _)| k.to_string()).unwrap_or_default(),
                message: "quota exceeded".to_string(),
            })
        }

        fn remove_batch(&mut self, _keys: &[&str]) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_untouched_store_has_defaults() {
        let store = store();
        assert_eq!(store.selection(), Selection::default());
        assert_eq!(store.current_pricing(), None);
        assert_eq!(store.current_step(), 0);
        assert!(store.attribution().is_empty());
    }

    #[test]
    fn test_save_merges_and_recomputes() {
        let store = store();
        store.save(SelectionDelta::new().region("pt").recipients(2)).unwrap();
        let pricing = store
            .save(SelectionDelta::new().add_ons(["4k-quality", "fast-delivery"]))
            .unwrap();

        assert_eq!(pricing.total, Decimal::new(8399, 2));
        assert_eq!(store.current_pricing(), Some(pricing));
        assert_eq!(store.selection().recipient_count, 2);
    }

    #[test]
    fn test_invalid_delta_leaves_store_untouched() {
        let store = store();
        store.save(SelectionDelta::new().recipients(3)).unwrap();
        let before = store.current_pricing();

        assert!(store.save(SelectionDelta::new().add_ons(["mystery"])).is_err());
        assert_eq!(store.current_pricing(), before);
        assert_eq!(store.selection().recipient_count, 3);
    }

    #[test]
    fn test_subscribers_see_fresh_pricing() {
        let store = Arc::new(store());
        let observed = Arc::new(Mutex::new(Vec::new()));

        let weak = Arc::downgrade(&store);
        let sink = Arc::clone(&observed);
        store.subscribe(move || {
            if let Some(store) = weak.upgrade() {
                let total = store.current_pricing().map(|p| p.total);
                sink.lock().unwrap().push(total);
            }
        });

        store.save(SelectionDelta::new().photos(1)).unwrap();
        store.save(SelectionDelta::new().photos(3)).unwrap();

        let observed = observed.lock().unwrap();
        let expected_first = store.config().price_table("USD").unwrap().base_price(1) + Decimal::new(499, 2);
        assert_eq!(observed[0], Some(expected_first));
        assert_eq!(observed[1], store.current_pricing().map(|p| p.total));
    }

    #[test]
    fn test_clear_matches_fresh_store() {
        let store = store();
        store.save(SelectionDelta::new().add_ons(["combo-addons"]).name("Ana")).unwrap();
        store.set_current_step(4).unwrap();
        store
            .capture_attribution(&AttributionSnapshot::from_entries([(
                "utm_source",
                serde_json::json!("ig"),
            )]))
            .unwrap();

        store.clear().unwrap();

        let fresh = self::store();
        assert_eq!(store.current_pricing(), fresh.current_pricing());
        assert_eq!(store.selection(), fresh.selection());
        assert_eq!(store.current_step(), 0);
        assert!(store.attribution().is_empty());
    }

    #[test]
    fn test_clear_notifies() {
        let store = store();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        store.subscribe(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        store.clear().unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_attribution_is_append_only() {
        let store = store();
        let first = AttributionSnapshot::from_entries([("utm_source", serde_json::json!("ig"))]);
        let second = AttributionSnapshot::from_entries([
            ("utm_source", serde_json::json!("fb")),
            ("utm_medium", serde_json::json!("social")),
        ]);

        assert_eq!(store.capture_attribution(&first).unwrap(), 1);
        assert_eq!(store.capture_attribution(&second).unwrap(), 1);
        assert_eq!(store.capture_attribution(&second).unwrap(), 0);
        assert_eq!(store.attribution().get("utm_source"), Some(&serde_json::json!("ig")));
    }

    #[test]
    fn test_unknown_schema_version_is_ignored() {
        let mut storage = MemoryStorage::new();
        storage
            .write_batch(&[(SELECTION_KEY, r#"{"version":99,"data":{"recipientCount":3}}"#.to_string())])
            .unwrap();
        let store = SelectionStore::new(storage, Arc::new(CommerceConfig::builtin().unwrap()));

        assert_eq!(store.selection(), Selection::default());
    }

    #[test]
    fn test_missing_pricing_record_is_recomputed() {
        let mut storage = MemoryStorage::new();
        let selection = Selection::default()
            .merged(SelectionDelta::new().region("pt").recipients(2))
            .unwrap();
        storage
            .write_batch(&[(SELECTION_KEY, encode(&selection).unwrap())])
            .unwrap();
        let store = SelectionStore::new(storage, Arc::new(CommerceConfig::builtin().unwrap()));

        let pricing = store.current_pricing().unwrap();
        assert_eq!(pricing.base_price, Decimal::new(5999, 2));
    }

    #[test]
    fn test_broken_storage_degrades_reads_and_surfaces_writes() {
        let store = SelectionStore::new(BrokenStorage, Arc::new(CommerceConfig::builtin().unwrap()));

        assert_eq!(store.selection(), Selection::default());
        assert_eq!(store.current_pricing(), None);

        let err = store.save(SelectionDelta::new().recipients(2)).unwrap_err();
        assert!(matches!(err, CheckoutError::PersistenceError { .. }));
    }
}
