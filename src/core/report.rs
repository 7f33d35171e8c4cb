use crate::domain::model::ImportStats;
use serde::Serialize;

/// 由計數器推導出的進度資訊，沒有自己的狀態
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportProgress {
    pub percent: u8,
    pub elapsed: String,
    pub eta: String,
    pub success_pct: f64,
    pub failed_pct: f64,
    pub duplicate_pct: f64,
    pub stats: ImportStats,
}

impl ImportProgress {
    pub fn from_stats(stats: &ImportStats) -> Self {
        Self {
            percent: percent_complete(stats.processed, stats.total),
            elapsed: format_duration(stats.elapsed_seconds.round() as u64),
            eta: format_duration(stats.eta_seconds),
            success_pct: percent_of(stats.success, stats.total),
            failed_pct: percent_of(stats.failed, stats.total),
            duplicate_pct: percent_of(stats.duplicates, stats.total),
            stats: *stats,
        }
    }
}

/// `"{m}m {s}s"`，不足一分鐘時為 `"{s}s"`
pub fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else {
        format!("{}m {}s", seconds / 60, seconds % 60)
    }
}

pub fn percent_of(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

pub fn percent_complete(processed: usize, total: usize) -> u8 {
    percent_of(processed, total).round().min(100.0) as u8
}

/// 依已處理筆數與經過時間重新計算速度與剩餘時間
pub fn refresh_rates(stats: &mut ImportStats, elapsed_seconds: f64) {
    stats.elapsed_seconds = elapsed_seconds;
    stats.speed = if elapsed_seconds > 0.0 {
        stats.processed as f64 / elapsed_seconds
    } else {
        0.0
    };
    let remaining = stats.total.saturating_sub(stats.processed);
    stats.eta_seconds = if stats.speed > 0.0 {
        (remaining as f64 / stats.speed).round() as u64
    } else {
        0
    };
}
