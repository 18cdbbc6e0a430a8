use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::{
    error::{AggregationError, FetchResult},
    model::ProviderQuery,
    payload::{AirQualityPayload, AqiData},
};

use super::{AirQualitySource, ProviderId, fetch_json, truncate_body};

pub const DEFAULT_BASE_URL: &str = "https://api.waqi.info";

/// World Air Quality Index client, addressed by city station slug.
#[derive(Debug, Clone)]
pub struct WaqiClient {
    token: String,
    base_url: String,
    http: Client,
}

impl WaqiClient {
    pub fn new(token: String) -> Self {
        Self::with_base_url(token, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(token: String, base_url: impl Into<String>) -> Self {
        Self {
            token,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }
}

/// `data` is an object on success, `null` when empty and a message string
/// when `status` is "error".
#[derive(Debug, Deserialize)]
struct WaqiEnvelope {
    status: String,
    data: serde_json::Value,
}

/// Feed slug for a city: lower-cased, spaces replaced by dashes.
pub fn station_slug(city: &str) -> String {
    city.trim().to_lowercase().replace(' ', "-")
}

#[async_trait]
impl AirQualitySource for WaqiClient {
    async fn air_quality(&self, query: &ProviderQuery) -> FetchResult<AirQualityPayload> {
        let slug = station_slug(query.location.city());
        if slug.is_empty() || slug.contains(['/', '?', '#']) {
            return Err(AggregationError::invalid_request(
                ProviderId::Waqi,
                format!("cannot build a station slug from '{}'", query.location.city()),
            ));
        }

        let url = format!("{}/feed/{}/", self.base_url, slug);

        tracing::debug!(location = %query.location, slug, "requesting air quality");

        let request = self.http.get(url).query(&[("token", self.token.as_str())]);
        let envelope: WaqiEnvelope = fetch_json(ProviderId::Waqi, request).await?;

        if envelope.status != "ok" {
            let message = match &envelope.data {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return Err(AggregationError::ProviderRejected {
                provider: ProviderId::Waqi,
                status: 200,
                body: truncate_body(&format!("feed status \"{}\": {}", envelope.status, message)),
            });
        }

        let data = match envelope.data {
            serde_json::Value::Null => None,
            value => Some(
                serde_json::from_value::<AqiData>(value)
                    .map_err(|err| AggregationError::malformed(ProviderId::Waqi, err))?,
            ),
        };

        Ok(AirQualityPayload {
            status: envelope.status,
            data,
        })
    }
}
