use crate::core::mapper::{ColumnMapper, DEFAULT_IMPORT_DATE_FIELD};
use crate::core::observer::ImportObserver;
use crate::core::reconciler::{DuplicateCheckPolicy, DuplicateReconciler};
use crate::core::report::{refresh_rates, ImportProgress};
use crate::domain::model::{BatchOutcome, ImportStats, ImportSummary, RawRow, RunState};
use crate::domain::ports::RecordStore;
use crate::domain::target::ImportTarget;
use crate::utils::error::Result;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_BATCH_SIZE: usize = 500;

/// 匯入流程參數
#[derive(Debug, Clone)]
pub struct ImportSettings {
    pub batch_size: usize,
    pub chunk_size: usize,
    pub batch_pause: Duration,
    pub chunk_pause: Duration,
    pub delimiter: u8,
    pub import_date_field: String,
    pub duplicate_policy: DuplicateCheckPolicy,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            chunk_size: crate::core::loader::DEFAULT_CHUNK_SIZE,
            batch_pause: Duration::from_millis(10),
            chunk_pause: Duration::from_millis(1),
            delimiter: crate::core::parser::DEFAULT_DELIMITER,
            import_date_field: DEFAULT_IMPORT_DATE_FIELD.to_string(),
            duplicate_policy: DuplicateCheckPolicy::default(),
        }
    }
}

/// 一次匯入執行：持有資料列緩衝區與計數器，逐批次推進。
///
/// 狀態：`Idle → Running → {Completed | Stopped | Failed}`。
/// 取消只在批次之間檢查；已寫入的資料不會回復。
pub struct ImportSession<'a, S: RecordStore + ?Sized> {
    store: &'a S,
    target: &'a ImportTarget,
    settings: &'a ImportSettings,
    mapper: ColumnMapper,
    rows: Vec<RawRow>,
    cursor: usize,
    state: RunState,
    stats: ImportStats,
    started: Option<Instant>,
}

impl<'a, S: RecordStore + ?Sized> ImportSession<'a, S> {
    pub fn new(
        store: &'a S,
        target: &'a ImportTarget,
        settings: &'a ImportSettings,
        rows: Vec<RawRow>,
    ) -> Self {
        let mapper = ColumnMapper::for_today(target, &settings.import_date_field);
        Self::with_mapper(store, target, settings, rows, mapper)
    }

    pub fn with_mapper(
        store: &'a S,
        target: &'a ImportTarget,
        settings: &'a ImportSettings,
        rows: Vec<RawRow>,
        mapper: ColumnMapper,
    ) -> Self {
        let stats = ImportStats {
            total: rows.len(),
            ..Default::default()
        };
        Self {
            store,
            target,
            settings,
            mapper,
            rows,
            cursor: 0,
            state: RunState::Idle,
            stats,
            started: None,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn stats(&self) -> &ImportStats {
        &self.stats
    }

    pub fn progress(&self) -> ImportProgress {
        ImportProgress::from_stats(&self.stats)
    }

    /// 緩衝區內的資料列數；只有成功寫入至少一筆後才會清空
    pub fn buffered_rows(&self) -> usize {
        self.rows.len()
    }

    /// 取回緩衝區，讓呼叫端在沒有寫入任何資料時可以重試
    pub fn into_rows(self) -> Vec<RawRow> {
        self.rows
    }

    pub fn summary(&self) -> ImportSummary {
        ImportSummary {
            table: self.target.table.clone(),
            state: self.state,
            stats: self.stats,
        }
    }

    /// 推進一步：處理下一個批次，或進入結束狀態。
    pub async fn step(&mut self, cancel: &CancellationToken) -> Result<RunState> {
        match self.state {
            RunState::Idle => {
                self.state = RunState::Running;
                self.started = Some(Instant::now());
                tracing::info!(
                    "🚀 Importing {} rows into '{}' in batches of {}",
                    self.stats.total,
                    self.target.table,
                    self.settings.batch_size
                );
            }
            RunState::Running => {}
            terminal => return Ok(terminal),
        }

        if self.cursor >= self.rows.len() {
            self.state = RunState::Completed;
            return Ok(self.state);
        }
        if cancel.is_cancelled() {
            tracing::info!(
                "🛑 Import stopped after processing {} rows",
                self.stats.processed
            );
            self.state = RunState::Stopped;
            return Ok(self.state);
        }

        if let Err(e) = self.process_next_batch().await {
            tracing::error!("❌ Import into '{}' aborted: {}", self.target.table, e);
            self.state = RunState::Failed;
            return Err(e);
        }

        if self.cursor >= self.rows.len() {
            self.state = RunState::Completed;
        }
        Ok(self.state)
    }

    /// 執行到結束 (完成、停止或失敗)。成功寫入至少一筆時清空緩衝區並通知。
    pub async fn run<O>(&mut self, cancel: &CancellationToken, observer: &mut O) -> Result<ImportSummary>
    where
        O: ImportObserver + ?Sized,
    {
        // 已結束的執行不再重跑，也不再通知
        if self.state.is_terminal() {
            return Ok(self.summary());
        }

        loop {
            let before = self.stats.processed;
            let state = self.step(cancel).await?;
            if self.stats.processed != before {
                observer.on_batch(&self.progress());
            }
            if state.is_terminal() {
                break;
            }
            tokio::time::sleep(self.settings.batch_pause).await;
        }

        let summary = self.summary();
        tracing::info!(
            "✅ Import {}: {} imported, {} failed, {} duplicates skipped in {}",
            summary.state,
            summary.stats.success,
            summary.stats.failed,
            summary.stats.duplicates,
            self.progress().elapsed
        );

        if summary.stats.success > 0 {
            self.rows.clear();
            self.cursor = 0;
            observer.on_import_complete(&summary);
        }
        Ok(summary)
    }

    async fn process_next_batch(&mut self) -> Result<()> {
        let end = (self.cursor + self.settings.batch_size.max(1)).min(self.rows.len());
        let batch_len = end - self.cursor;

        let records = self.mapper.map_batch(&self.rows[self.cursor..end]);

        let target = self.target;
        let reconciler = DuplicateReconciler::new(
            self.store,
            &target.table,
            target.natural_key.as_ref(),
            self.settings.duplicate_policy,
        );
        match reconciler.reconcile(records).await {
            Ok(outcome) => self.commit(outcome).await?,
            Err(e) if e.is_store_rejection() => {
                tracing::error!(
                    "Error checking duplicates for batch at row {}: {}",
                    self.cursor,
                    e
                );
                self.stats.failed += batch_len;
            }
            Err(e) => return Err(e),
        }

        self.stats.processed += batch_len;
        self.cursor = end;
        let elapsed = self
            .started
            .map(|s| s.elapsed().as_secs_f64())
            .unwrap_or_default();
        refresh_rates(&mut self.stats, elapsed);

        tracing::debug!(
            "Batch done: {}/{} processed",
            self.stats.processed,
            self.stats.total
        );
        Ok(())
    }

    async fn commit(&mut self, outcome: BatchOutcome) -> Result<()> {
        self.stats.duplicates += outcome.duplicates.len();
        if outcome.unique.is_empty() {
            return Ok(());
        }

        let requested = outcome.unique.len();
        let (store, table) = (self.store, &self.target.table);
        match store.insert(table, &outcome.unique).await {
            Ok(inserted) => {
                let accepted = inserted.len().min(requested);
                if accepted < requested {
                    tracing::warn!(
                        "⚠️ Store accepted {} of {} rows in '{}'",
                        accepted,
                        requested,
                        self.target.table
                    );
                }
                self.stats.success += accepted;
                self.stats.failed += requested - accepted;
                Ok(())
            }
            Err(e) if e.is_store_rejection() => {
                tracing::error!("Error saving batch to {}: {}", self.target.table, e);
                self.stats.failed += requested;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
