use crate::domain::model::SubmissionRecord;
use crate::utils::error::Result;
use async_trait::async_trait;
use url::Url;

/// 以 session 為範圍的鍵值儲存；每次呼叫都是同步完成的
pub trait KeyValueStorage: Send {
    fn read(&self, key: &str) -> Result<Option<String>>;

    /// 一次寫入多個 key，要嘛全部成功要嘛全部不變
    fn write_batch(&mut self, entries: &[(&str, String)]) -> Result<()>;

    /// 一次移除多個 key
    fn remove_batch(&mut self, keys: &[&str]) -> Result<()>;
}

/// 訂單提交協作者（webhook）；重試由實作自行負責
#[async_trait]
pub trait SubmissionClient: Send + Sync {
    async fn submit(&self, record: &SubmissionRecord) -> Result<()>;
}

/// 照片上傳協作者，回傳外部託管的 URL
#[async_trait]
pub trait PhotoUploader: Send + Sync {
    async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<String>;
}

/// 發出導向結帳頁的動作
pub trait Navigator: Send + Sync {
    fn navigate(&self, url: &Url) -> Result<()>;
}
