//! Thin HTTP client for a hosted Supabase project.
//!
//! Shared by the embedder (edge functions) and the document store (REST
//! gateway and RPC). Built once from [`StoreConfig`] and cloned cheaply.

use crate::config::StoreConfig;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, RequestBuilder};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SupabaseClient {
    base_url: String,
    api_key: String,
    http_client: reqwest::Client,
}

impl SupabaseClient {
    pub fn new(config: &StoreConfig) -> reqwest::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            http_client,
        })
    }

    /// URL of an edge function.
    pub fn function_url(&self, name: &str) -> String {
        format!("{}/functions/v1/{}", self.base_url, name)
    }

    /// URL of a table or RPC under the REST gateway.
    pub fn rest_url(&self, path: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Starts a request carrying the project's API key.
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http_client.request(method, url).headers(self.auth_headers())
    }

    fn auth_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&self.api_key) {
            headers.insert("apikey", value);
        }
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", self.api_key)) {
            headers.insert(AUTHORIZATION, value);
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> SupabaseClient {
        let config = StoreConfig {
            url: "https://project.supabase.co/".to_string(),
            api_key: "anon".to_string(),
            ..StoreConfig::default()
        };
        SupabaseClient::new(&config).unwrap()
    }

    #[test]
    fn test_urls() {
        let client = client();
        assert_eq!(
            client.function_url("generate-embeddings"),
            "https://project.supabase.co/functions/v1/generate-embeddings"
        );
        assert_eq!(
            client.rest_url("/rpc/match_documents"),
            "https://project.supabase.co/rest/v1/rpc/match_documents"
        );
    }

    #[test]
    fn test_auth_headers() {
        let headers = client().auth_headers();
        assert_eq!(headers.get("apikey").unwrap(), "anon");
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer anon");
    }
}
