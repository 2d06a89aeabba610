//! Document store backed by a hosted Postgres/pgvector database.
//!
//! Similarity search goes through an RPC function; counts and id lookups use
//! the REST gateway directly.

use super::store::{DocumentStore, Result, StoreError};
use super::types::{DocumentRow, SearchParams};
use crate::config::StoreConfig;
use crate::supabase::SupabaseClient;
use async_trait::async_trait;
use reqwest::header::CONTENT_RANGE;
use reqwest::{Method, Response};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct SupabaseStore {
    client: SupabaseClient,
    match_function: String,
    filter_param: String,
    documents_table: String,
    jurisdiction_column: String,
}

impl SupabaseStore {
    pub fn new(client: SupabaseClient, config: &StoreConfig) -> Self {
        Self {
            client,
            match_function: config.match_function.clone(),
            filter_param: config.filter_param.clone(),
            documents_table: config.documents_table.clone(),
            jurisdiction_column: config.jurisdiction_column.clone(),
        }
    }

    fn search_body(&self, params: &SearchParams) -> Value {
        let mut body = Map::new();
        body.insert("query_embedding".to_string(), json!(params.embedding));
        body.insert("match_threshold".to_string(), json!(params.threshold));
        body.insert("match_count".to_string(), json!(params.limit));
        if let Some(jurisdiction) = &params.jurisdiction {
            body.insert(self.filter_param.clone(), json!(jurisdiction));
        }
        Value::Object(body)
    }

    /// Column list for id lookups; the jurisdiction column is aliased to `county`.
    fn select_columns(&self) -> String {
        format!(
            "id,title,chapter,section,content,filename,county:{}",
            self.jurisdiction_column
        )
    }
}

#[async_trait]
impl DocumentStore for SupabaseStore {
    async fn search(&self, params: &SearchParams) -> Result<Vec<DocumentRow>> {
        let url = self.client.rest_url(&format!("rpc/{}", self.match_function));

        let response = self
            .client
            .request(Method::POST, &url)
            .json(&self.search_body(params))
            .send()
            .await?;
        let response = check_status(response, "similarity search").await?;

        let rows: Vec<DocumentRow> = response
            .json()
            .await
            .map_err(|e| StoreError::Malformed(e.to_string()))?;
        debug!(rows = rows.len(), "Similarity search returned");
        Ok(rows)
    }

    async fn count(&self, jurisdiction: Option<&str>) -> Result<usize> {
        let url = self.client.rest_url(&self.documents_table);

        let mut query = vec![("select".to_string(), "id".to_string())];
        if let Some(label) = jurisdiction {
            query.push((self.jurisdiction_column.clone(), format!("eq.{}", label)));
        }

        let response = self
            .client
            .request(Method::HEAD, &url)
            .query(&query)
            .header("Prefer", "count=exact")
            .send()
            .await?;
        let response = check_status(response, "document count").await?;

        let range = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| StoreError::Malformed("missing Content-Range header".to_string()))?;
        parse_content_range_total(range)
    }

    async fn fetch_by_ids(&self, ids: &[String]) -> Result<Vec<DocumentRow>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let url = self.client.rest_url(&self.documents_table);

        let response = self
            .client
            .request(Method::GET, &url)
            .query(&[
                ("select", self.select_columns()),
                ("id", in_filter(ids)),
            ])
            .send()
            .await?;
        let response = check_status(response, "document fetch").await?;

        response
            .json()
            .await
            .map_err(|e| StoreError::Malformed(e.to_string()))
    }
}

async fn check_status(response: Response, operation: &str) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    warn!(%status, %body, operation, "Document store returned an error");
    Err(StoreError::Api(format!("{} failed with status {}", operation, status)))
}

/// Builds a PostgREST `in.(...)` filter, quoting each value.
fn in_filter(ids: &[String]) -> String {
    let quoted = ids
        .iter()
        .map(|id| format!("\"{}\"", id.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect::<Vec<_>>()
        .join(",");
    format!("in.({})", quoted)
}

/// Extracts the total from `Content-Range: 0-9/42` or `*/0`.
fn parse_content_range_total(range: &str) -> Result<usize> {
    range
        .rsplit_once('/')
        .and_then(|(_, total)| total.trim().parse::<usize>().ok())
        .ok_or_else(|| StoreError::Malformed(format!("unparseable Content-Range '{}'", range)))
}
