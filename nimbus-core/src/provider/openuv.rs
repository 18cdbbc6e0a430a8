use async_trait::async_trait;
use reqwest::Client;

use crate::{error::FetchResult, model::ProviderQuery, payload::UvPayload};

use super::{ProviderId, UvIndexSource, fetch_json};

pub const DEFAULT_BASE_URL: &str = "https://api.openuv.io";

#[derive(Debug, Clone)]
pub struct OpenUvClient {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenUvClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: String, base_url: impl Into<String>) -> Self {
        Self {
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }
}

#[async_trait]
impl UvIndexSource for OpenUvClient {
    async fn uv_index(&self, query: &ProviderQuery) -> FetchResult<UvPayload> {
        let url = format!("{}/api/v1/uv", self.base_url);
        let lat = query.coordinates.lat.to_string();
        let lng = query.coordinates.lon.to_string();

        tracing::debug!(location = %query.location, "requesting uv index");

        // OpenUV takes the key as a header, not a query parameter.
        let request = self
            .http
            .get(url)
            .header("x-access-token", self.api_key.as_str())
            .query(&[("lat", lat.as_str()), ("lng", lng.as_str())]);

        fetch_json(ProviderId::OpenUv, request).await
    }
}
