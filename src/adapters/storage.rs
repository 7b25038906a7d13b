use crate::domain::ports::KeyValueStorage;
use crate::utils::error::{CheckoutError, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// 純記憶體儲存，測試與單次執行用
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: BTreeMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn write_batch(&mut self, entries: &[(&str, String)]) -> Result<()> {
        for (key, value) in entries {
            self.entries.insert((*key).to_string(), value.clone());
        }
        Ok(())
    }

    fn remove_batch(&mut self, keys: &[&str]) -> Result<()> {
        for key in keys {
            self.entries.remove(*key);
        }
        Ok(())
    }
}

/// 以單一 JSON 檔保存 session，重新載入後仍在。
/// 每次寫入先寫暫存檔再 rename，失敗時記憶體內容不變。
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStorage {
    /// 開啟 session 檔；檔案損壞時記錄警告並從空白開始
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let content = fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                match serde_json::from_str(&content) {
                    Ok(entries) => entries,
                    Err(e) => {
                        tracing::warn!(
                            "⚠️ Session file {} is unreadable, starting empty: {}",
                            path.display(),
                            e
                        );
                        BTreeMap::new()
                    }
                }
            }
        } else {
            BTreeMap::new()
        };

        tracing::debug!("📂 Session file {} opened with {} key(s)", path.display(), entries.len());
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let data = serde_json::to_string_pretty(entries)?;
        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, data)?;
        fs::rename(&tmp_path, &self.path).map_err(|e| CheckoutError::PersistenceError {
            key: self.path.display().to_string(),
            message: e.to_string(),
        })
    }
}

impl KeyValueStorage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn write_batch(&mut self, entries: &[(&str, String)]) -> Result<()> {
        let mut next = self.entries.clone();
        for (key, value) in entries {
            next.insert((*key).to_string(), value.clone());
        }
        self.persist(&next)?;
        self.entries = next;
        Ok(())
    }

    fn remove_batch(&mut self, keys: &[&str]) -> Result<()> {
        let mut next = self.entries.clone();
        for key in keys {
            next.remove(*key);
        }
        self.persist(&next)?;
        self.entries = next;
        Ok(())
    }
}
