use crate::domain::model::{BatchOutcome, MappedRecord, StoreRow};
use crate::domain::ports::RecordStore;
use crate::domain::query::{Filter, Query};
use crate::domain::target::NaturalKey;
use crate::utils::error::{ImportError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// 重複檢查查詢失敗時的處理方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateCheckPolicy {
    /// 整批視為失敗，不寫入
    #[default]
    FailClosed,
    /// 視為沒有既有資料，整批寫入
    FailOpen,
}

/// 自然鍵的值 (依鍵欄位順序)
pub type KeyTuple = Vec<String>;

/// 依自然鍵將一批記錄分成「已存在」與「新資料」。
///
/// 資料庫查詢對每個鍵欄位各用一個 IN 條件，可能多撈出交叉組合的候選列；
/// 最終分組一律以記憶體中的完整鍵比對為準。
pub struct DuplicateReconciler<'a, S: RecordStore + ?Sized> {
    store: &'a S,
    table: &'a str,
    key: Option<&'a NaturalKey>,
    policy: DuplicateCheckPolicy,
}

impl<'a, S: RecordStore + ?Sized> DuplicateReconciler<'a, S> {
    pub fn new(
        store: &'a S,
        table: &'a str,
        key: Option<&'a NaturalKey>,
        policy: DuplicateCheckPolicy,
    ) -> Self {
        Self {
            store,
            table,
            key,
            policy,
        }
    }

    pub async fn reconcile(&self, batch: Vec<MappedRecord>) -> Result<BatchOutcome> {
        let Some(key) = self.key else {
            return Ok(BatchOutcome::all_unique(batch));
        };

        let Some(filter) = candidate_filter(key, &batch) else {
            tracing::debug!("No natural key values in batch; skipping duplicate query");
            return Ok(BatchOutcome::all_unique(batch));
        };

        let query = Query::new().select(key.fields().iter().cloned()).filter(filter);
        let existing_rows = match self.store.query(self.table, &query).await {
            Ok(rows) => rows,
            Err(e) => match self.policy {
                DuplicateCheckPolicy::FailOpen => {
                    tracing::warn!(
                        "⚠️ Duplicate check on '{}' failed, treating {} records as new: {}",
                        self.table,
                        batch.len(),
                        e
                    );
                    return Ok(BatchOutcome::all_unique(batch));
                }
                DuplicateCheckPolicy::FailClosed => {
                    return Err(ImportError::DuplicateCheckFailed {
                        table: self.table.to_string(),
                        message: e.to_string(),
                    });
                }
            },
        };

        let existing: HashSet<KeyTuple> = existing_rows
            .iter()
            .filter_map(|row| row_key(key, row))
            .collect();
        tracing::debug!(
            "{} candidate rows, {} distinct existing keys in '{}'",
            existing_rows.len(),
            existing.len(),
            self.table
        );

        Ok(partition(key, batch, &existing))
    }
}

/// 每個鍵欄位的值集合各成一個 IN 條件；任一欄位沒有值時回傳 None
fn candidate_filter(key: &NaturalKey, batch: &[MappedRecord]) -> Option<Filter> {
    let mut filter = Filter::new();
    for field in key.fields() {
        let mut seen = HashSet::new();
        let values: Vec<serde_json::Value> = batch
            .iter()
            .filter_map(|record| {
                let value = record.get(field)?;
                let text = value.key_text()?;
                seen.insert(text).then(|| value.to_json())
            })
            .collect();
        if values.is_empty() {
            return None;
        }
        filter = filter.in_list(field, values);
    }
    Some(filter)
}

pub fn partition(
    key: &NaturalKey,
    batch: Vec<MappedRecord>,
    existing: &HashSet<KeyTuple>,
) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();
    for record in batch {
        let is_duplicate = record_key(key, &record).is_some_and(|k| existing.contains(&k));
        if is_duplicate {
            outcome.duplicates.push(record);
        } else {
            outcome.unique.push(record);
        }
    }
    outcome
}

/// 缺少任一鍵值的記錄沒有鍵，永遠不會被視為重複
pub fn record_key(key: &NaturalKey, record: &MappedRecord) -> Option<KeyTuple> {
    key.fields()
        .iter()
        .map(|field| record.get(field)?.key_text())
        .collect()
}

fn row_key(key: &NaturalKey, row: &StoreRow) -> Option<KeyTuple> {
    key.fields()
        .iter()
        .map(|field| json_key_text(row.get(field)?))
        .collect()
}

fn json_key_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Some(i.to_string()),
            None => n.as_f64().map(|f| f.to_string()),
        },
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;
    use crate::domain::model::FieldValue;
    use serde_json::json;

    fn record(numero: &str, clase: &str) -> MappedRecord {
        let mut r = MappedRecord::new();
        r.set("numero", FieldValue::Text(numero.into()));
        r.set("clase_incidencia", FieldValue::Text(clase.into()));
        r
    }

    fn key() -> NaturalKey {
        NaturalKey::pair("numero", "clase_incidencia")
    }

    #[tokio::test]
    async fn test_partition_exact_pairs() {
        let store = MemoryStore::new();
        store.seed(
            "incidencias",
            vec![
                json!({"numero": "1", "clase_incidencia": "A"}),
                json!({"numero": "2", "clase_incidencia": "B"}),
            ],
        );

        let key = key();
        let reconciler = DuplicateReconciler::new(
            &store,
            "incidencias",
            Some(&key),
            DuplicateCheckPolicy::FailClosed,
        );
        // ("1","B") 與 ("2","A") 會被 IN 條件撈到候選列，但不是真正的重複
        let batch = vec![
            record("1", "A"),
            record("1", "B"),
            record("2", "A"),
            record("2", "B"),
            record("3", "C"),
        ];
        let outcome = reconciler.reconcile(batch).await.unwrap();

        assert_eq!(outcome.duplicates.len(), 2);
        assert_eq!(outcome.unique.len(), 3);
        let unique_keys: Vec<_> = outcome
            .unique
            .iter()
            .map(|r| record_key(&key, r).unwrap())
            .collect();
        assert!(unique_keys.contains(&vec!["1".to_string(), "B".to_string()]));
        assert!(unique_keys.contains(&vec!["2".to_string(), "A".to_string()]));
    }

    #[tokio::test]
    async fn test_records_without_key_are_unique() {
        let store = MemoryStore::new();
        store.seed("incidencias", vec![json!({"numero": "1", "clase_incidencia": "A"})]);

        let key = key();
        let reconciler = DuplicateReconciler::new(
            &store,
            "incidencias",
            Some(&key),
            DuplicateCheckPolicy::FailClosed,
        );
        let mut missing = MappedRecord::new();
        missing.set("numero", FieldValue::Text("1".into()));
        missing.set("clase_incidencia", FieldValue::Null);

        let outcome = reconciler
            .reconcile(vec![missing, record("1", "A")])
            .await
            .unwrap();
        assert_eq!(outcome.unique.len(), 1);
        assert_eq!(outcome.duplicates.len(), 1);
    }

    #[tokio::test]
    async fn test_no_key_values_skips_query() {
        let store = MemoryStore::new();
        store.fail_next_queries(1);

        let key = key();
        let reconciler = DuplicateReconciler::new(
            &store,
            "incidencias",
            Some(&key),
            DuplicateCheckPolicy::FailClosed,
        );
        let mut r = MappedRecord::new();
        r.set("numero", FieldValue::Null);
        let outcome = reconciler.reconcile(vec![r]).await.unwrap();
        assert_eq!(outcome.unique.len(), 1);
        assert_eq!(store.query_calls(), 0);
    }

    #[tokio::test]
    async fn test_query_failure_policy() {
        let store = MemoryStore::new();
        let key = key();

        store.fail_next_queries(1);
        let closed = DuplicateReconciler::new(
            &store,
            "incidencias",
            Some(&key),
            DuplicateCheckPolicy::FailClosed,
        );
        let err = closed.reconcile(vec![record("1", "A")]).await.unwrap_err();
        assert!(matches!(err, ImportError::DuplicateCheckFailed { .. }));

        store.fail_next_queries(1);
        let open = DuplicateReconciler::new(
            &store,
            "incidencias",
            Some(&key),
            DuplicateCheckPolicy::FailOpen,
        );
        let outcome = open.reconcile(vec![record("1", "A")]).await.unwrap();
        assert_eq!(outcome.unique.len(), 1);
    }

    #[tokio::test]
    async fn test_target_without_natural_key() {
        let store = MemoryStore::new();
        let reconciler =
            DuplicateReconciler::new(&store, "otra", None, DuplicateCheckPolicy::FailClosed);
        let outcome = reconciler.reconcile(vec![record("1", "A")]).await.unwrap();
        assert_eq!(outcome.unique.len(), 1);
        assert_eq!(store.query_calls(), 0);
    }

    #[test]
    fn test_numeric_keys_match_store_numbers() {
        let key = NaturalKey::single("numero");
        let row = json!({"numero": 42}).as_object().cloned().unwrap();
        let mut r = MappedRecord::new();
        r.set("numero", FieldValue::Integer(42));
        assert_eq!(row_key(&key, &row), record_key(&key, &r));
    }
}
