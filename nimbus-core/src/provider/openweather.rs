use async_trait::async_trait;
use reqwest::Client;

use crate::{
    error::FetchResult,
    model::ProviderQuery,
    payload::{GeoMatch, WeatherPayload},
};

use super::{CurrentWeatherSource, Geocoder, ProviderId, fetch_json};

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";

/// OpenWeatherMap client: current weather and direct geocoding share one key.
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherClient {
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
impl CurrentWeatherSource for OpenWeatherClient {
    async fn current_weather(&self, query: &ProviderQuery) -> FetchResult<WeatherPayload> {
        let url = format!("{}/data/2.5/weather", self.base_url);
        let lat = query.coordinates.lat.to_string();
        let lon = query.coordinates.lon.to_string();

        tracing::debug!(location = %query.location, "requesting current weather");

        let request = self.http.get(url).query(&[
            ("lat", lat.as_str()),
            ("lon", lon.as_str()),
            ("appid", self.api_key.as_str()),
            ("units", "metric"),
        ]);

        fetch_json(ProviderId::OpenWeather, request).await
    }
}

#[async_trait]
impl Geocoder for OpenWeatherClient {
    async fn geocode(&self, query: &str, limit: u8) -> FetchResult<Vec<GeoMatch>> {
        let url = format!("{}/geo/1.0/direct", self.base_url);
        let limit = limit.to_string();

        tracing::debug!(query, "geocoding");

        let request = self.http.get(url).query(&[
            ("q", query),
            ("limit", limit.as_str()),
            ("appid", self.api_key.as_str()),
        ]);

        fetch_json(ProviderId::OpenWeather, request).await
    }
}
