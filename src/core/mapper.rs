use crate::core::dates::normalize_date;
use crate::domain::model::{FieldValue, MappedRecord, RawRow};
use crate::domain::target::{FieldKind, ImportTarget};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

pub const DEFAULT_IMPORT_DATE_FIELD: &str = "fecha_importacion";

static INTEGER_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?[0-9]+").expect("integer prefix is a valid regex"));
static DECIMAL_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(?:[0-9]+\.?[0-9]*|\.[0-9]+)(?:[eE][+-]?[0-9]+)?")
        .expect("decimal prefix is a valid regex")
});

#[derive(Debug, Clone)]
struct MappedColumn {
    source: String,
    field: String,
    kind: FieldKind,
}

/// 將原始列依對照表轉成目標記錄，並加上匯入日期欄位。
#[derive(Debug, Clone)]
pub struct ColumnMapper {
    columns: Vec<MappedColumn>,
    import_date_field: String,
    import_date: String,
}

impl ColumnMapper {
    pub fn new(target: &ImportTarget, import_date_field: &str, import_date: NaiveDate) -> Self {
        let columns = target
            .columns
            .iter()
            .map(|spec| MappedColumn {
                source: spec.source.clone(),
                field: spec.field.clone(),
                kind: FieldKind::classify(&spec.field),
            })
            .collect();

        Self {
            columns,
            import_date_field: import_date_field.to_string(),
            import_date: import_date.format("%Y-%m-%d").to_string(),
        }
    }

    /// 以今天 (UTC) 作為匯入日期
    pub fn for_today(target: &ImportTarget, import_date_field: &str) -> Self {
        Self::new(target, import_date_field, chrono::Utc::now().date_naive())
    }

    pub fn map(&self, row: &RawRow) -> MappedRecord {
        let mut record = MappedRecord::new();
        for column in &self.columns {
            let value = row.get(&column.source).unwrap_or("").trim();
            record.set(column.field.clone(), coerce(value, column.kind));
        }
        record.set(
            self.import_date_field.clone(),
            FieldValue::Date(self.import_date.clone()),
        );
        record
    }

    pub fn map_batch(&self, rows: &[RawRow]) -> Vec<MappedRecord> {
        rows.iter().map(|row| self.map(row)).collect()
    }
}

/// 轉換失敗一律變成 null (布林則為 false)，不回傳錯誤
pub fn coerce(value: &str, kind: FieldKind) -> FieldValue {
    match kind {
        FieldKind::Date => normalize_date(value)
            .map(FieldValue::Date)
            .unwrap_or(FieldValue::Null),
        FieldKind::Integer => parse_integer(value)
            .map(FieldValue::Integer)
            .unwrap_or(FieldValue::Null),
        FieldKind::Decimal => parse_decimal(value)
            .map(FieldValue::Decimal)
            .unwrap_or(FieldValue::Null),
        FieldKind::Boolean => FieldValue::Boolean(parse_flag(value)),
        FieldKind::Text => {
            if value.is_empty() {
                FieldValue::Null
            } else {
                FieldValue::Text(value.to_string())
            }
        }
    }
}

/// 取開頭的整數部分：`"12abc"` → 12、`"3.7"` → 3
pub fn parse_integer(value: &str) -> Option<i64> {
    INTEGER_PREFIX.find(value)?.as_str().parse().ok()
}

/// 取開頭的小數部分：`"12.5 €"` → 12.5、`"1,5"` → 1.0
pub fn parse_decimal(value: &str) -> Option<f64> {
    let parsed: f64 = DECIMAL_PREFIX.find(value)?.as_str().parse().ok()?;
    parsed.is_finite().then_some(parsed)
}

pub fn parse_flag(value: &str) -> bool {
    let lower = value.to_lowercase();
    lower == "true" || lower == "1" || lower == "sí"
}
