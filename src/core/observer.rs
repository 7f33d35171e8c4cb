use crate::core::purge::PurgeReport;
use crate::core::report::ImportProgress;
use crate::domain::model::ImportSummary;

/// 匯入/清除過程的通知介面，預設全部不做事
pub trait ImportObserver: Send {
    fn on_load_progress(&mut self, _percent: u8) {}

    fn on_batch(&mut self, _progress: &ImportProgress) {}

    /// 只在至少寫入一筆後觸發一次，讓相依的畫面/報表重新整理
    fn on_import_complete(&mut self, _summary: &ImportSummary) {}

    fn on_purge_complete(&mut self, _reports: &[PurgeReport]) {}
}

#[derive(Debug, Default)]
pub struct NoopObserver;

impl ImportObserver for NoopObserver {}

/// 以 tracing 輸出進度
#[derive(Debug, Default)]
pub struct LoggingObserver {
    last_load_percent: Option<u8>,
}

impl ImportObserver for LoggingObserver {
    fn on_load_progress(&mut self, percent: u8) {
        // 每 10% 記錄一次
        let bucket = percent / 10;
        if self.last_load_percent.map(|p| p / 10) != Some(bucket) {
            tracing::info!("📥 Loading file... {}%", percent);
            self.last_load_percent = Some(percent);
        }
    }

    fn on_batch(&mut self, progress: &ImportProgress) {
        tracing::info!(
            "🚀 {}% - {}/{} processed, {} ok, {} failed, {} duplicates, {:.0} rows/s, ETA {}",
            progress.percent,
            progress.stats.processed,
            progress.stats.total,
            progress.stats.success,
            progress.stats.failed,
            progress.stats.duplicates,
            progress.stats.speed,
            progress.eta
        );
    }

    fn on_import_complete(&mut self, summary: &ImportSummary) {
        tracing::info!(
            "🔄 Import into '{}' committed {} rows; dependent views should refresh",
            summary.table,
            summary.stats.success
        );
    }

    fn on_purge_complete(&mut self, reports: &[PurgeReport]) {
        for report in reports {
            tracing::info!(
                "🗑️ '{}': deleted {} of {}, {} remaining",
                report.table,
                report.deleted,
                report.initial,
                report.remaining
            );
        }
    }
}
