use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;

/// 資料庫回傳的一列資料
pub type StoreRow = serde_json::Map<String, serde_json::Value>;

/// 解析後的原始列：來源欄位名稱 → 原始字串 (依檔頭順序)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RawRow {
    values: IndexMap<String, String>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.values.insert(column.into(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.values.get(column).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// 轉換後的欄位值
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    /// `YYYY-MM-DD` 或 `YYYY-MM-DD HH:mm:ss`
    Date(String),
    Text(String),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// 比對自然鍵時使用的文字形式；空值回傳 None
    pub fn key_text(&self) -> Option<String> {
        match self {
            FieldValue::Null => None,
            FieldValue::Boolean(b) => Some(b.to_string()),
            FieldValue::Integer(i) => Some(i.to_string()),
            FieldValue::Decimal(d) => Some(d.to_string()),
            FieldValue::Date(s) | FieldValue::Text(s) => {
                if s.is_empty() {
                    None
                } else {
                    Some(s.clone())
                }
            }
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Null => serde_json::Value::Null,
            FieldValue::Boolean(b) => serde_json::Value::Bool(*b),
            FieldValue::Integer(i) => serde_json::Value::from(*i),
            FieldValue::Decimal(d) => serde_json::Number::from_f64(*d)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            FieldValue::Date(s) | FieldValue::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.key_text() {
            Some(text) => f.write_str(&text),
            None => f.write_str("null"),
        }
    }
}

/// 依欄位對照表產生的目標記錄
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MappedRecord {
    fields: IndexMap<String, FieldValue>,
}

impl MappedRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field: impl Into<String>, value: FieldValue) {
        self.fields.insert(field.into(), value);
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn to_row(&self) -> StoreRow {
        self.fields
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect()
    }
}

/// 單一批次的重複檢查結果
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub unique: Vec<MappedRecord>,
    pub duplicates: Vec<MappedRecord>,
}

impl BatchOutcome {
    pub fn all_unique(records: Vec<MappedRecord>) -> Self {
        Self {
            unique: records,
            duplicates: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.unique.len() + self.duplicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 匯入執行的狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Stopped,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Stopped | RunState::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Completed => "completed",
            RunState::Stopped => "stopped",
            RunState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// 匯入計數器
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ImportStats {
    pub total: usize,
    pub processed: usize,
    pub success: usize,
    pub failed: usize,
    pub duplicates: usize,
    /// rows/sec
    pub speed: f64,
    pub elapsed_seconds: f64,
    pub eta_seconds: u64,
}

/// 執行結束後的摘要
#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub table: String,
    pub state: RunState,
    pub stats: ImportStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_value_serializes_untagged() {
        let mut record = MappedRecord::new();
        record.set("numero", FieldValue::Text("123".into()));
        record.set("cantidad", FieldValue::Integer(4));
        record.set("coste", FieldValue::Decimal(12.5));
        record.set("resuelto", FieldValue::Boolean(true));
        record.set("fecha", FieldValue::Date("2024-01-15".into()));
        record.set("solucion", FieldValue::Null);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "numero": "123",
                "cantidad": 4,
                "coste": 12.5,
                "resuelto": true,
                "fecha": "2024-01-15",
                "solucion": null
            })
        );
        assert_eq!(serde_json::Value::Object(record.to_row()), json);
    }

    #[test]
    fn test_key_text_skips_empty() {
        assert_eq!(FieldValue::Null.key_text(), None);
        assert_eq!(FieldValue::Text(String::new()).key_text(), None);
        assert_eq!(FieldValue::Integer(7).key_text().as_deref(), Some("7"));
    }

    #[test]
    fn test_raw_row_keeps_header_order() {
        let row: RawRow = [("b", "2"), ("a", "1")].into_iter().collect();
        assert_eq!(row.columns().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(row.get("a"), Some("1"));
        assert_eq!(row.get("c"), None);
    }
}
