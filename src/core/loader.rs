use crate::domain::model::RawRow;
use crate::utils::error::{ImportError, Result};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// 每次 `step` 的結果
#[derive(Debug)]
pub enum LoadStep {
    /// 已處理完一個 chunk，附上目前百分比 (0-100)
    Progress(u8),
    /// 全部載入完成
    Done(Vec<RawRow>),
}

/// 分段載入解析後的資料列，每個 chunk 之間讓出執行權並檢查取消旗標。
#[derive(Debug)]
pub struct ChunkedLoader {
    pending: std::vec::IntoIter<RawRow>,
    loaded: Vec<RawRow>,
    total: usize,
    chunk_size: usize,
}

impl ChunkedLoader {
    pub fn new(rows: Vec<RawRow>, chunk_size: usize) -> Self {
        let total = rows.len();
        Self {
            pending: rows.into_iter(),
            loaded: Vec::with_capacity(total),
            total,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn consumed(&self) -> usize {
        self.loaded.len()
    }

    /// 處理下一個 chunk。取消時回傳 `Cancelled`，已載入的資料全部丟棄。
    pub fn step(&mut self, cancel: &CancellationToken) -> Result<LoadStep> {
        if self.loaded.len() >= self.total {
            return Ok(LoadStep::Done(std::mem::take(&mut self.loaded)));
        }
        if cancel.is_cancelled() {
            self.loaded.clear();
            return Err(ImportError::Cancelled);
        }

        self.loaded.extend(self.pending.by_ref().take(self.chunk_size));
        Ok(LoadStep::Progress(self.percent()))
    }

    fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        let pct = (self.loaded.len() as f64 / self.total as f64 * 100.0).round();
        pct.min(100.0) as u8
    }
}

/// 以 chunk 為單位載入，並在每個 chunk 後短暫讓出執行權
pub async fn load_in_chunks<F>(
    rows: Vec<RawRow>,
    chunk_size: usize,
    pause: Duration,
    cancel: &CancellationToken,
    mut on_progress: F,
) -> Result<Vec<RawRow>>
where
    F: FnMut(u8),
{
    let mut loader = ChunkedLoader::new(rows, chunk_size);
    tracing::debug!(
        "Loading {} rows in chunks of {}",
        loader.total(),
        chunk_size
    );

    loop {
        match loader.step(cancel)? {
            LoadStep::Progress(pct) => {
                tracing::debug!("Loaded {}/{} rows ({}%)", loader.consumed(), loader.total(), pct);
                on_progress(pct);
                if pause.is_zero() {
                    tokio::task::yield_now().await;
                } else {
                    tokio::time::sleep(pause).await;
                }
            }
            LoadStep::Done(rows) => return Ok(rows),
        }
    }
}
