use crate::core::driver::{ImportSession, ImportSettings};
use crate::core::loader::load_in_chunks;
use crate::core::mapper::ColumnMapper;
use crate::core::observer::ImportObserver;
use crate::core::parser::{decode_text, DelimitedParser};
use crate::core::purge::{PurgeReport, PurgeSettings, TablePurger};
use crate::domain::model::{ImportSummary, MappedRecord, RawRow};
use crate::domain::ports::{RecordStore, Storage};
use crate::domain::query::Filter;
use crate::domain::target::ImportTarget;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;
use tokio_util::sync::CancellationToken;

/// 串接 讀檔 → 解析 → 分段載入 → 批次寫入，以及清空/計數
pub struct ImportEngine<St: Storage, R: RecordStore> {
    storage: St,
    store: R,
    settings: ImportSettings,
    purge_settings: PurgeSettings,
    monitor: SystemMonitor,
}

impl<St: Storage, R: RecordStore> ImportEngine<St, R> {
    pub fn new(storage: St, store: R, settings: ImportSettings, purge_settings: PurgeSettings) -> Self {
        Self::new_with_monitoring(storage, store, settings, purge_settings, false)
    }

    pub fn new_with_monitoring(
        storage: St,
        store: R,
        settings: ImportSettings,
        purge_settings: PurgeSettings,
        monitor_enabled: bool,
    ) -> Self {
        Self {
            storage,
            store,
            settings,
            purge_settings,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    pub fn store(&self) -> &R {
        &self.store
    }

    /// 讀取並解析檔案，回傳載入完成的資料列 (取消時回傳 `Cancelled`)
    pub async fn load_file<O>(
        &self,
        path: &str,
        target: &ImportTarget,
        cancel: &CancellationToken,
        observer: &mut O,
    ) -> Result<Vec<RawRow>>
    where
        O: ImportObserver + ?Sized,
    {
        tracing::info!("📥 Reading {} for target '{}'", path, target.name);
        let bytes = self.storage.read_file(path).await?;
        let text = decode_text(&bytes);

        let parsed =
            DelimitedParser::new(self.settings.delimiter).parse(&text, &target.required_columns)?;
        self.monitor.log_stats("Parse");

        let rows = load_in_chunks(
            parsed.rows,
            self.settings.chunk_size,
            self.settings.chunk_pause,
            cancel,
            |pct| observer.on_load_progress(pct),
        )
        .await?;
        self.monitor.log_stats("Load");
        Ok(rows)
    }

    /// 轉換前幾列但不寫入
    pub fn preview(&self, rows: &[RawRow], target: &ImportTarget, limit: usize) -> Vec<MappedRecord> {
        let mapper = ColumnMapper::for_today(target, &self.settings.import_date_field);
        mapper.map_batch(&rows[..limit.min(rows.len())])
    }

    /// 寫入緩衝區。至少成功一筆時 `rows` 會被清空，否則原樣留給呼叫端重試。
    pub async fn commit<O>(
        &self,
        rows: &mut Vec<RawRow>,
        target: &ImportTarget,
        cancel: &CancellationToken,
        observer: &mut O,
    ) -> Result<ImportSummary>
    where
        O: ImportObserver + ?Sized,
    {
        let mut session =
            ImportSession::new(&self.store, target, &self.settings, std::mem::take(rows));
        let summary = session.run(cancel, observer).await;
        *rows = session.into_rows();
        self.monitor.log_stats("Commit");
        self.monitor.log_final_stats();
        summary
    }

    pub async fn purge<O>(
        &self,
        target: &ImportTarget,
        cancel: &CancellationToken,
        observer: &mut O,
    ) -> Result<Vec<PurgeReport>>
    where
        O: ImportObserver + ?Sized,
    {
        let purger = TablePurger::new(&self.store, &self.purge_settings);
        let reports = purger.purge_target(target, cancel).await?;
        self.monitor.log_final_stats();
        observer.on_purge_complete(&reports);
        Ok(reports)
    }

    pub async fn count(&self, target: &ImportTarget) -> Result<u64> {
        self.store.count(&target.table, &Filter::new()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;
    use crate::core::observer::NoopObserver;
    use crate::utils::error::ImportError;
    use std::collections::HashMap;
    use std::time::Duration;

    #[derive(Default)]
    struct MockStorage {
        files: HashMap<String, Vec<u8>>,
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            self.files.get(path).cloned().ok_or_else(|| {
                ImportError::IoError(std::io::Error::new(std::io::ErrorKind::NotFound, path.to_string()))
            })
        }
    }

    fn engine(content: &str) -> ImportEngine<MockStorage, MemoryStore> {
        let mut storage = MockStorage::default();
        storage
            .files
            .insert("recibidas.csv".to_string(), content.as_bytes().to_vec());
        let settings = ImportSettings {
            batch_pause: Duration::ZERO,
            chunk_pause: Duration::ZERO,
            ..Default::default()
        };
        ImportEngine::new(storage, MemoryStore::new(), settings, PurgeSettings::default())
    }

    const RECIBIDAS: &str = "\u{feff}DOCUMENTO;NUMERO;CLIENTE;CODIGO_INCIDENCIA;FECHA\n\
        D1;100;C1;R1;15/01/2024\n\
        D2;101;C2;R1;2024-01-16\n";

    #[tokio::test]
    async fn test_load_commit_count() {
        let engine = engine(RECIBIDAS);
        let target = ImportTarget::incidencias_recibidas();
        let cancel = CancellationToken::new();
        let mut observer = NoopObserver;

        let mut rows = engine
            .load_file("recibidas.csv", &target, &cancel, &mut observer)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("DOCUMENTO"), Some("D1"));

        let summary = engine.commit(&mut rows, &target, &cancel, &mut observer).await.unwrap();
        assert_eq!(summary.stats.success, 2);
        assert_eq!(engine.count(&target).await.unwrap(), 2);
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_commit_without_successes_hands_rows_back() {
        let engine = engine(RECIBIDAS);
        let target = ImportTarget::incidencias_recibidas();
        let cancel = CancellationToken::new();
        let mut observer = NoopObserver;

        let mut rows = engine
            .load_file("recibidas.csv", &target, &cancel, &mut observer)
            .await
            .unwrap();
        engine.store().fail_next_inserts(1);

        let summary = engine.commit(&mut rows, &target, &cancel, &mut observer).await.unwrap();
        assert_eq!(summary.stats.success, 0);
        assert_eq!(summary.stats.failed, 2);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get("DOCUMENTO"), Some("D2"));

        // 重試同一個緩衝區
        let retry = engine.commit(&mut rows, &target, &cancel, &mut observer).await.unwrap();
        assert_eq!(retry.stats.success, 2);
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_missing_columns_rejected() {
        let engine = engine("NUMERO;CLIENTE\n1;C1\n");
        let target = ImportTarget::incidencias_recibidas();

        let err = engine
            .load_file("recibidas.csv", &target, &CancellationToken::new(), &mut NoopObserver)
            .await
            .unwrap_err();
        match err {
            ImportError::MissingColumns { columns } => {
                assert_eq!(columns, vec!["DOCUMENTO", "CODIGO_INCIDENCIA"]);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_preview_maps_without_writing() {
        let engine = engine(RECIBIDAS);
        let target = ImportTarget::incidencias_recibidas();
        let rows = engine
            .load_file("recibidas.csv", &target, &CancellationToken::new(), &mut NoopObserver)
            .await
            .unwrap();

        let preview = engine.preview(&rows, &target, 1);
        assert_eq!(preview.len(), 1);
        assert_eq!(engine.store().insert_calls(), 0);
    }

    #[tokio::test]
    async fn test_purge_reports_each_table() {
        let engine = engine(RECIBIDAS);
        let target = ImportTarget::incidencias_recibidas();
        engine
            .store()
            .seed("incidencias_recibidas", vec![serde_json::json!({"numero": "1"})]);

        let reports = engine
            .purge(&target, &CancellationToken::new(), &mut NoopObserver)
            .await
            .unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(engine.count(&target).await.unwrap(), 0);
    }
}
