use anyhow::Result;
use funnel_checkout::core::store::{PRICING_KEY, SELECTION_KEY};
use funnel_checkout::domain::ports::KeyValueStorage;
use funnel_checkout::{CommerceConfig, FileStorage, SelectionDelta, SelectionStore};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

fn open_store(path: &std::path::Path) -> Result<SelectionStore<FileStorage>> {
    let storage = FileStorage::open(path)?;
    Ok(SelectionStore::new(storage, Arc::new(CommerceConfig::builtin()?)))
}

/// 重新開啟後可以從上次的步驟繼續
#[test]
fn test_session_survives_reopen() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("wizard").join("session.json");

    {
        let store = open_store(&path)?;
        store.save(SelectionDelta::new().region("pt").recipients(3).photos(2))?;
        store.set_current_step(3)?;
    }

    let store = open_store(&path)?;
    let selection = store.selection();
    assert_eq!(selection.recipient_count, 3);
    assert_eq!(selection.region, "pt");
    assert_eq!(store.current_step(), 3);

    let pricing = store.current_pricing().expect("pricing persisted");
    assert_eq!(pricing.currency, "BRL");
    assert_eq!(pricing.base_price, Decimal::new(6999, 2));
    assert_eq!(pricing.photo_total, Decimal::new(998, 2));
    assert_eq!(pricing.total, Decimal::new(7997, 2));
    Ok(())
}

#[test]
fn test_selection_and_pricing_are_written_together() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("session.json");

    let store = open_store(&path)?;
    store.save(SelectionDelta::new().add_ons(["bonus-scene"]))?;

    let storage = FileStorage::open(&path)?;
    let selection = storage.read(SELECTION_KEY)?.expect("selection record");
    let pricing = storage.read(PRICING_KEY)?.expect("pricing record");

    let selection: serde_json::Value = serde_json::from_str(&selection)?;
    let pricing: serde_json::Value = serde_json::from_str(&pricing)?;
    assert_eq!(selection["version"], 1);
    assert_eq!(selection["data"]["addOns"], serde_json::json!(["bonus-scene"]));
    assert_eq!(pricing["version"], 1);
    assert_eq!(pricing["data"]["currency"], "USD");
    Ok(())
}

#[test]
fn test_corrupt_session_file_starts_empty() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("session.json");
    std::fs::write(&path, "{ not json")?;

    let store = open_store(&path)?;
    assert_eq!(store.current_pricing(), None);
    assert_eq!(store.selection().recipient_count, 1);

    store.save(SelectionDelta::new().recipients(2))?;
    assert_eq!(open_store(&path)?.selection().recipient_count, 2);
    Ok(())
}

#[test]
fn test_rejected_delta_does_not_touch_file() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("session.json");

    let store = open_store(&path)?;
    store.save(SelectionDelta::new().recipients(2))?;
    let before = std::fs::read_to_string(&path)?;

    assert!(store
        .save(SelectionDelta::new().recipients(3).add_ons(["4k-quality", "glitter"]))
        .is_err());
    assert_eq!(std::fs::read_to_string(&path)?, before);
    Ok(())
}

#[test]
fn test_clear_removes_every_key_and_notifies() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("session.json");

    let store = open_store(&path)?;
    let notified = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&notified);
    let id = store.subscribe(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    store.save(SelectionDelta::new().add_ons(["combo-addons"]).name("Ana"))?;
    store.set_current_step(5)?;
    store.clear()?;
    assert_eq!(notified.load(Ordering::SeqCst), 3);

    assert!(store.unsubscribe(id));
    store.save(SelectionDelta::new().photos(1))?;
    assert_eq!(notified.load(Ordering::SeqCst), 3);

    store.clear()?;
    let storage = FileStorage::open(&path)?;
    assert!(storage.read(SELECTION_KEY)?.is_none());
    assert!(storage.read(PRICING_KEY)?.is_none());
    Ok(())
}
