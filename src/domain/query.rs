use serde_json::Value;

/// 單一欄位條件，多個條件之間為 AND
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(String, Value),
    Neq(String, Value),
    Gt(String, Value),
    Gte(String, Value),
    Lt(String, Value),
    Lte(String, Value),
    In(String, Vec<Value>),
    IsNull(String),
    NotNull(String),
}

impl Condition {
    pub fn column(&self) -> &str {
        match self {
            Condition::Eq(c, _)
            | Condition::Neq(c, _)
            | Condition::Gt(c, _)
            | Condition::Gte(c, _)
            | Condition::Lt(c, _)
            | Condition::Lte(c, _)
            | Condition::In(c, _)
            | Condition::IsNull(c)
            | Condition::NotNull(c) => c,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.conditions
            .push(Condition::Eq(column.to_string(), value.into()));
        self
    }

    pub fn neq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.conditions
            .push(Condition::Neq(column.to_string(), value.into()));
        self
    }

    pub fn gt(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.conditions
            .push(Condition::Gt(column.to_string(), value.into()));
        self
    }

    pub fn gte(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.conditions
            .push(Condition::Gte(column.to_string(), value.into()));
        self
    }

    pub fn lt(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.conditions
            .push(Condition::Lt(column.to_string(), value.into()));
        self
    }

    pub fn lte(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.conditions
            .push(Condition::Lte(column.to_string(), value.into()));
        self
    }

    pub fn in_list<I, V>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.conditions.push(Condition::In(
            column.to_string(),
            values.into_iter().map(Into::into).collect(),
        ));
        self
    }

    pub fn is_null(mut self, column: &str) -> Self {
        self.conditions.push(Condition::IsNull(column.to_string()));
        self
    }

    pub fn not_null(mut self, column: &str) -> Self {
        self.conditions.push(Condition::NotNull(column.to_string()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// 查詢：選取欄位 + 條件 + 排序 + 筆數上限
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// 空白代表全部欄位
    pub select: Vec<String>,
    pub filter: Filter,
    pub order_by: Option<(String, SortOrder)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn order_by(mut self, column: &str, order: SortOrder) -> Self {
        self.order_by = Some((column.to_string(), order));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_builder_keeps_order() {
        let filter = Filter::new()
            .in_list("numero", ["1", "2"])
            .in_list("clase_incidencia", ["A"])
            .neq("id", 0);

        assert_eq!(filter.conditions.len(), 3);
        assert_eq!(filter.conditions[0].column(), "numero");
        assert_eq!(
            filter.conditions[2],
            Condition::Neq("id".to_string(), Value::from(0))
        );
    }

    #[test]
    fn test_query_builder() {
        let query = Query::new()
            .select(["id"])
            .order_by("id", SortOrder::Ascending)
            .limit(1000);
        assert_eq!(query.select, vec!["id".to_string()]);
        assert_eq!(query.limit, Some(1000));
        assert!(query.filter.is_empty());
    }
}
