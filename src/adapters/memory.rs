use crate::domain::model::{MappedRecord, StoreRow};
use crate::domain::ports::RecordStore;
use crate::domain::query::{Condition, Filter, Query, SortOrder};
use crate::utils::error::{ImportError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Faults {
    queries: usize,
    inserts: usize,
    deletes: usize,
    dropped_on_insert: usize,
}

#[derive(Debug, Default)]
struct Inner {
    tables: HashMap<String, Vec<StoreRow>>,
    next_id: u64,
    faults: Faults,
    query_calls: usize,
    insert_calls: usize,
}

/// 記憶體中的資料庫，條件語意與 REST 後端一致；可注入錯誤以便測試。
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 直接放入資料列 (非物件的值會被忽略)，沒有 id 的列會自動編號
    pub fn seed(&self, table: &str, rows: Vec<Value>) {
        let mut inner = self.lock();
        for row in rows {
            if let Value::Object(row) = row {
                let row = inner.with_id(row);
                inner.tables.entry(table.to_string()).or_default().push(row);
            }
        }
    }

    pub fn rows(&self, table: &str) -> Vec<StoreRow> {
        self.lock().tables.get(table).cloned().unwrap_or_default()
    }

    pub fn fail_next_queries(&self, n: usize) {
        self.lock().faults.queries = n;
    }

    pub fn fail_next_inserts(&self, n: usize) {
        self.lock().faults.inserts = n;
    }

    pub fn fail_next_deletes(&self, n: usize) {
        self.lock().faults.deletes = n;
    }

    /// 下一次 insert 靜默丟掉最後 n 筆 (不寫入也不回傳)
    pub fn drop_from_next_insert(&self, n: usize) {
        self.lock().faults.dropped_on_insert = n;
    }

    pub fn query_calls(&self) -> usize {
        self.lock().query_calls
    }

    pub fn insert_calls(&self) -> usize {
        self.lock().insert_calls
    }
}

impl Inner {
    fn with_id(&mut self, mut row: StoreRow) -> StoreRow {
        if !row.contains_key("id") {
            self.next_id += 1;
            row.insert("id".to_string(), Value::from(self.next_id));
        }
        row
    }

    fn matching<'a>(&'a self, table: &str, filter: &'a Filter) -> impl Iterator<Item = &'a StoreRow> {
        self.tables
            .get(table)
            .into_iter()
            .flatten()
            .filter(move |row| matches_filter(row, filter))
    }
}

fn injected(table: &str) -> ImportError {
    ImportError::store(table, Some(503), "injected failure")
}

fn take_fault(counter: &mut usize) -> bool {
    if *counter > 0 {
        *counter -= 1;
        true
    } else {
        false
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn query(&self, table: &str, query: &Query) -> Result<Vec<StoreRow>> {
        let mut inner = self.lock();
        inner.query_calls += 1;
        if take_fault(&mut inner.faults.queries) {
            return Err(injected(table));
        }

        let mut rows: Vec<StoreRow> = inner.matching(table, &query.filter).cloned().collect();
        if let Some((column, order)) = &query.order_by {
            rows.sort_by(|a, b| {
                let ord = compare_opt(a.get(column), b.get(column));
                match order {
                    SortOrder::Ascending => ord,
                    SortOrder::Descending => ord.reverse(),
                }
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        if !query.select.is_empty() && query.select.iter().all(|c| c != "*") {
            rows = rows
                .into_iter()
                .map(|row| {
                    row.into_iter()
                        .filter(|(k, _)| query.select.contains(k))
                        .collect()
                })
                .collect();
        }
        Ok(rows)
    }

    async fn count(&self, table: &str, filter: &Filter) -> Result<u64> {
        let mut inner = self.lock();
        inner.query_calls += 1;
        if take_fault(&mut inner.faults.queries) {
            return Err(injected(table));
        }
        Ok(inner.matching(table, filter).count() as u64)
    }

    async fn insert(&self, table: &str, records: &[MappedRecord]) -> Result<Vec<StoreRow>> {
        let mut inner = self.lock();
        inner.insert_calls += 1;
        if take_fault(&mut inner.faults.inserts) {
            return Err(injected(table));
        }

        let dropped = std::mem::take(&mut inner.faults.dropped_on_insert);
        let keep = records.len().saturating_sub(dropped);
        let inserted: Vec<StoreRow> = records[..keep]
            .iter()
            .map(|record| inner.with_id(record.to_row()))
            .collect();
        inner
            .tables
            .entry(table.to_string())
            .or_default()
            .extend(inserted.iter().cloned());
        Ok(inserted)
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<()> {
        let mut inner = self.lock();
        if take_fault(&mut inner.faults.deletes) {
            return Err(injected(table));
        }
        if let Some(rows) = inner.tables.get_mut(table) {
            rows.retain(|row| !matches_filter(row, filter));
        }
        Ok(())
    }
}

pub fn matches_filter(row: &StoreRow, filter: &Filter) -> bool {
    filter.conditions.iter().all(|c| matches_condition(row, c))
}

fn matches_condition(row: &StoreRow, condition: &Condition) -> bool {
    let value = row.get(condition.column()).unwrap_or(&Value::Null);
    let cmp = |other: &Value| compare(value, other);
    match condition {
        Condition::Eq(_, v) => cmp(v) == Some(Ordering::Equal),
        Condition::Neq(_, v) => matches!(cmp(v), Some(o) if o != Ordering::Equal),
        Condition::Gt(_, v) => cmp(v) == Some(Ordering::Greater),
        Condition::Gte(_, v) => matches!(cmp(v), Some(Ordering::Greater | Ordering::Equal)),
        Condition::Lt(_, v) => cmp(v) == Some(Ordering::Less),
        Condition::Lte(_, v) => matches!(cmp(v), Some(Ordering::Less | Ordering::Equal)),
        Condition::In(_, values) => values.iter().any(|v| cmp(v) == Some(Ordering::Equal)),
        Condition::IsNull(_) => value.is_null(),
        Condition::NotNull(_) => !value.is_null(),
    }
}

/// 與 SQL 相同：NULL 與任何值比較都不成立
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => {
            let x = as_number(a)?;
            let y = as_number(b)?;
            x.partial_cmp(&y)
        }
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn compare_opt(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => compare(a, b).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_in_filters_are_independent() {
        let store = MemoryStore::new();
        store.seed(
            "t",
            vec![
                json!({"numero": "1", "clase": "A"}),
                json!({"numero": "2", "clase": "B"}),
                json!({"numero": "3", "clase": "C"}),
            ],
        );

        let query = Query::new()
            .select(["numero", "clase"])
            .filter(Filter::new().in_list("numero", ["1", "2"]).in_list("clase", ["B", "A"]));
        let rows = store.query("t", &query).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| !r.contains_key("id")));
    }

    #[tokio::test]
    async fn test_comparisons_and_nulls() {
        let store = MemoryStore::new();
        store.seed(
            "t",
            vec![
                json!({"coste": 10.5, "fecha": "2024-01-01"}),
                json!({"coste": 3, "fecha": null}),
                json!({"coste": null, "fecha": "2024-06-01"}),
            ],
        );

        let count = |f: Filter| {
            let store = &store;
            async move { store.count("t", &f).await.unwrap() }
        };
        assert_eq!(count(Filter::new().gt("coste", 5)).await, 1);
        assert_eq!(count(Filter::new().lte("coste", 10.5)).await, 2);
        assert_eq!(count(Filter::new().is_null("fecha")).await, 1);
        assert_eq!(count(Filter::new().not_null("coste")).await, 2);
        assert_eq!(count(Filter::new().gte("fecha", "2024-03-01")).await, 1);
        assert_eq!(count(Filter::new().neq("coste", 3)).await, 1);
        assert_eq!(count(Filter::new().lt("coste", 4).eq("fecha", Value::Null)).await, 0);
    }

    #[tokio::test]
    async fn test_insert_assigns_ids_and_order_limit() {
        let store = MemoryStore::new();
        let mut record = MappedRecord::new();
        record.set("numero", crate::domain::model::FieldValue::Text("9".into()));
        let inserted = store.insert("t", &[record.clone(), record]).await.unwrap();
        assert_eq!(inserted.len(), 2);

        let query = Query::new()
            .select(["id"])
            .order_by("id", SortOrder::Descending)
            .limit(1);
        let rows = store.query("t", &query).await.unwrap();
        assert_eq!(rows, vec![json!({"id": 2}).as_object().cloned().unwrap()]);
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed() {
        let store = MemoryStore::new();
        store.fail_next_inserts(1);
        assert!(store.insert("t", &[MappedRecord::new()]).await.is_err());
        assert!(store.insert("t", &[MappedRecord::new()]).await.is_ok());
        assert_eq!(store.insert_calls(), 2);
    }
}
