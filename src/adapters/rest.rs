use crate::config::StoreConfig;
use crate::domain::model::{MappedRecord, StoreRow};
use crate::domain::ports::RecordStore;
use crate::domain::query::{Condition, Filter, Query, SortOrder};
use crate::utils::error::{ImportError, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// PostgREST 相容的 HTTP 資料庫
#[derive(Debug, Clone)]
pub struct RestStore {
    client: Client,
    base: Url,
    api_key: String,
    timeout: Option<Duration>,
}

impl RestStore {
    pub fn new(
        url: &str,
        schema_path: &str,
        api_key: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let root = format!(
            "{}/{}/",
            url.trim_end_matches('/'),
            schema_path.trim_matches('/')
        );
        let base = Url::parse(&root).map_err(|e| ImportError::InvalidConfigValueError {
            field: "store.url".to_string(),
            value: url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client: Client::new(),
            base,
            api_key: api_key.into(),
            timeout,
        })
    }

    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        Self::new(
            &config.url,
            &config.schema_path,
            config.api_key.clone(),
            config.timeout_seconds.map(Duration::from_secs),
        )
    }

    pub fn endpoint(&self, table: &str) -> Result<Url> {
        self.base.join(table).map_err(|e| ImportError::ConfigError {
            message: format!("invalid table name '{}': {}", table, e),
        })
    }

    fn request(&self, method: Method, table: &str) -> Result<RequestBuilder> {
        let mut request = self
            .client
            .request(method, self.endpoint(table)?)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key));

        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }
        Ok(request)
    }

    async fn check(table: &str, response: Response) -> Result<Response> {
        let status = response.status();
        tracing::debug!("📡 {}: store response status: {}", table, status);
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ImportError::store(table, Some(status.as_u16()), body))
    }
}

/// 將查詢轉為 PostgREST 的 query string 參數
pub fn query_params(query: &Query) -> Vec<(String, String)> {
    let mut params = Vec::new();
    if !query.select.is_empty() {
        params.push(("select".to_string(), query.select.join(",")));
    }
    params.extend(filter_params(&query.filter));
    if let Some((column, order)) = &query.order_by {
        let dir = match order {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        };
        params.push(("order".to_string(), format!("{}.{}", column, dir)));
    }
    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }
    params
}

pub fn filter_params(filter: &Filter) -> Vec<(String, String)> {
    filter
        .conditions
        .iter()
        .map(|c| (c.column().to_string(), condition_value(c)))
        .collect()
}

fn condition_value(condition: &Condition) -> String {
    let op = |name: &str, v: &Value| match v {
        Value::Null if name == "eq" => "is.null".to_string(),
        Value::Null if name == "neq" => "not.is.null".to_string(),
        _ => format!("{}.{}", name, scalar(v)),
    };
    match condition {
        Condition::Eq(_, v) => op("eq", v),
        Condition::Neq(_, v) => op("neq", v),
        Condition::Gt(_, v) => op("gt", v),
        Condition::Gte(_, v) => op("gte", v),
        Condition::Lt(_, v) => op("lt", v),
        Condition::Lte(_, v) => op("lte", v),
        Condition::In(_, values) => {
            let items: Vec<String> = values.iter().map(list_item).collect();
            format!("in.({})", items.join(","))
        }
        Condition::IsNull(_) => "is.null".to_string(),
        Condition::NotNull(_) => "not.is.null".to_string(),
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// 清單內的字串一律加雙引號，避免逗號與括號被誤判
fn list_item(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
        other => other.to_string(),
    }
}

/// `Content-Range: 0-24/3573` 或 `*/0`
pub fn parse_content_range(header: &str) -> Option<u64> {
    header.rsplit_once('/')?.1.trim().parse().ok()
}

#[async_trait]
impl RecordStore for RestStore {
    async fn query(&self, table: &str, query: &Query) -> Result<Vec<StoreRow>> {
        let response = self
            .request(Method::GET, table)?
            .query(&query_params(query))
            .send()
            .await?;
        let response = Self::check(table, response).await?;
        Ok(response.json().await?)
    }

    async fn count(&self, table: &str, filter: &Filter) -> Result<u64> {
        let mut params = vec![("select".to_string(), "*".to_string())];
        params.extend(filter_params(filter));

        let response = self
            .request(Method::HEAD, table)?
            .header("Prefer", "count=exact")
            .query(&params)
            .send()
            .await?;
        let response = Self::check(table, response).await?;

        response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range)
            .ok_or_else(|| ImportError::store(table, None, "missing or invalid Content-Range header"))
    }

    async fn insert(&self, table: &str, records: &[MappedRecord]) -> Result<Vec<StoreRow>> {
        let response = self
            .request(Method::POST, table)?
            .header("Prefer", "return=representation")
            .json(records)
            .send()
            .await?;
        let response = Self::check(table, response).await?;
        Ok(response.json().await?)
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<()> {
        let response = self
            .request(Method::DELETE, table)?
            .query(&filter_params(filter))
            .send()
            .await?;
        Self::check(table, response).await?;
        Ok(())
    }
}
