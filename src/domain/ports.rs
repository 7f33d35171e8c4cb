use crate::domain::model::{MappedRecord, StoreRow};
use crate::domain::query::{Filter, Query};
use crate::utils::error::Result;
use async_trait::async_trait;

/// 讀取使用者選擇的匯入檔案
pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
}

/// 後端資料庫的最小能力：查詢、計數、批次新增、刪除
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn query(&self, table: &str, query: &Query) -> Result<Vec<StoreRow>>;

    /// 只回傳筆數，不取回資料
    async fn count(&self, table: &str, filter: &Filter) -> Result<u64>;

    /// 回傳資料庫實際寫入的列
    async fn insert(&self, table: &str, records: &[MappedRecord]) -> Result<Vec<StoreRow>>;

    async fn delete(&self, table: &str, filter: &Filter) -> Result<()>;
}

#[async_trait]
impl<T: RecordStore + ?Sized> RecordStore for std::sync::Arc<T> {
    async fn query(&self, table: &str, query: &Query) -> Result<Vec<StoreRow>> {
        (**self).query(table, query).await
    }

    async fn count(&self, table: &str, filter: &Filter) -> Result<u64> {
        (**self).count(table, filter).await
    }

    async fn insert(&self, table: &str, records: &[MappedRecord]) -> Result<Vec<StoreRow>> {
        (**self).insert(table, records).await
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<()> {
        (**self).delete(table, filter).await
    }
}
