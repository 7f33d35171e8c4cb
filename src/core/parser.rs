use crate::domain::model::RawRow;
use crate::utils::error::{ImportError, Result};
use csv::{ReaderBuilder, StringRecord, Terminator, Trim};
use tracing::{debug, info};

pub const DEFAULT_DELIMITER: u8 = b';';

/// 檔頭 + 資料列
#[derive(Debug, Clone, Default)]
pub struct ParsedFile {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

/// 以固定分隔字元切割的文字檔解析器。不處理引號，引號照原樣保留。
#[derive(Debug, Clone, Copy)]
pub struct DelimitedParser {
    delimiter: u8,
}

impl Default for DelimitedParser {
    fn default() -> Self {
        Self::new(DEFAULT_DELIMITER)
    }
}

impl DelimitedParser {
    pub fn new(delimiter: u8) -> Self {
        Self { delimiter }
    }

    /// 第一行為檔頭；缺少任何必要欄位時整個解析失敗。
    pub fn parse(&self, text: &str, required_columns: &[String]) -> Result<ParsedFile> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .delimiter(self.delimiter)
            .flexible(true)
            .quoting(false)
            .trim(Trim::All)
            // 只有 \n 換行；\r\n 的 \r 由 trim 去掉，單獨的 \r 留在欄位內
            .terminator(Terminator::Any(b'\n'))
            .from_reader(text.as_bytes());

        let mut records = reader.records();

        let headers: Vec<String> = match records.next() {
            Some(header) => header?.iter().map(str::to_string).collect(),
            None => Vec::new(),
        };
        debug!("Headers: {:?}", headers);

        let missing: Vec<String> = required_columns
            .iter()
            .filter(|required| !headers.iter().any(|h| h == *required))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(ImportError::MissingColumns { columns: missing });
        }

        let mut rows = Vec::new();
        for record in records {
            let record = record?;
            if is_blank(&record) {
                continue;
            }
            rows.push(zip_row(&headers, &record));
        }

        info!("Parsed {} rows with {} columns", rows.len(), headers.len());
        Ok(ParsedFile { headers, rows })
    }
}

/// 以 UTF-8 解碼 (無效位元組以替代字元取代) 並去掉 BOM
pub fn decode_text(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    match text.strip_prefix('\u{feff}') {
        Some(stripped) => stripped.to_string(),
        None => text.into_owned(),
    }
}

fn is_blank(record: &StringRecord) -> bool {
    record.len() == 1 && record.get(0).is_some_and(str::is_empty)
}

// 多出的欄位捨棄，不足的補空字串
fn zip_row(headers: &[String], record: &StringRecord) -> RawRow {
    headers
        .iter()
        .enumerate()
        .map(|(i, header)| (header.as_str(), record.get(i).unwrap_or("")))
        .collect()
}
