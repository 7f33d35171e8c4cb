use crate::domain::ports::RecordStore;
use crate::domain::query::{Filter, Query, SortOrder};
use crate::domain::target::ImportTarget;
use crate::utils::error::Result;
use serde::Serialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct PurgeSettings {
    pub batch_size: usize,
    /// 分批刪除的最大輪數
    pub max_attempts: usize,
    pub pause: Duration,
    pub id_column: String,
}

impl Default for PurgeSettings {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_attempts: 3,
            pause: Duration::from_millis(50),
            id_column: "id".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    pub table: String,
    pub initial: u64,
    pub deleted: u64,
    pub remaining: u64,
    pub attempts: usize,
    pub stopped: bool,
}

/// 清空資料表：先整表刪除，失敗或有殘留時改為分批刪除，分批也失敗時逐筆刪除。
pub struct TablePurger<'a, S: RecordStore + ?Sized> {
    store: &'a S,
    settings: &'a PurgeSettings,
}

impl<'a, S: RecordStore + ?Sized> TablePurger<'a, S> {
    pub fn new(store: &'a S, settings: &'a PurgeSettings) -> Self {
        Self { store, settings }
    }

    /// 先清空相依資料表，再清空目標資料表
    pub async fn purge_target(
        &self,
        target: &ImportTarget,
        cancel: &CancellationToken,
    ) -> Result<Vec<PurgeReport>> {
        let mut reports = Vec::new();
        for table in target.dependents.iter().chain(std::iter::once(&target.table)) {
            if cancel.is_cancelled() {
                tracing::info!("🛑 Purge stopped before '{}'", table);
                break;
            }
            reports.push(self.purge_table(table, cancel).await?);
        }
        Ok(reports)
    }

    pub async fn purge_table(&self, table: &str, cancel: &CancellationToken) -> Result<PurgeReport> {
        let all = Filter::new();
        let initial = self.store.count(table, &all).await?;
        tracing::info!("🗑️ Purging '{}' ({} rows)", table, initial);

        if initial == 0 {
            return Ok(PurgeReport {
                table: table.to_string(),
                initial,
                deleted: 0,
                remaining: 0,
                attempts: 0,
                stopped: false,
            });
        }

        let every_row = Filter::new().neq(&self.settings.id_column, 0);
        let mut attempts = 0;
        match self.store.delete(table, &every_row).await {
            Ok(()) => {
                let left = self.store.count(table, &all).await?;
                if left > 0 {
                    tracing::warn!("Bulk delete left {} rows in '{}'; deleting in batches", left, table);
                    attempts = self.delete_in_batches(table, left, cancel).await;
                }
            }
            Err(e) => {
                tracing::warn!("Bulk delete on '{}' failed ({}); deleting in batches", table, e);
                attempts = self.delete_in_batches(table, initial, cancel).await;
            }
        }

        let remaining = self.store.count(table, &all).await?;
        let report = PurgeReport {
            table: table.to_string(),
            initial,
            deleted: initial.saturating_sub(remaining),
            remaining,
            attempts,
            stopped: cancel.is_cancelled(),
        };
        if report.remaining > 0 {
            tracing::warn!(
                "⚠️ Partial purge of '{}': {} of {} rows deleted, {} remaining",
                table,
                report.deleted,
                initial,
                remaining
            );
        }
        Ok(report)
    }

    /// 回傳執行的輪數
    async fn delete_in_batches(&self, table: &str, total: u64, cancel: &CancellationToken) -> usize {
        let id = &self.settings.id_column;
        let mut deleted: u64 = 0;
        let mut attempts = 0;

        while deleted < total && attempts < self.settings.max_attempts && !cancel.is_cancelled() {
            attempts += 1;

            let query = Query::new()
                .select([id.as_str()])
                .order_by(id, SortOrder::Ascending)
                .limit(self.settings.batch_size.max(1));
            let ids: Vec<serde_json::Value> = match self.store.query(table, &query).await {
                Ok(rows) => rows.into_iter().filter_map(|mut r| r.remove(id)).collect(),
                Err(e) => {
                    tracing::error!("Error fetching ids from '{}': {}", table, e);
                    tokio::time::sleep(self.settings.pause * 4).await;
                    continue;
                }
            };
            if ids.is_empty() {
                break;
            }

            let batch_len = ids.len() as u64;
            match self
                .store
                .delete(table, &Filter::new().in_list(id, ids.clone()))
                .await
            {
                Ok(()) => deleted += batch_len,
                Err(e) => {
                    tracing::error!("Error deleting batch from '{}': {}; retrying row by row", table, e);
                    for value in ids {
                        if cancel.is_cancelled() {
                            break;
                        }
                        match self.store.delete(table, &Filter::new().eq(id, value)).await {
                            Ok(()) => deleted += 1,
                            Err(e) => tracing::debug!("Row delete failed in '{}': {}", table, e),
                        }
                    }
                }
            }
            tracing::debug!("Deleted {}/{} rows from '{}'", deleted, total, table);

            tokio::time::sleep(self.settings.pause).await;
        }

        attempts
    }
}
