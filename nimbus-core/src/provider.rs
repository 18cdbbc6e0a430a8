use crate::{
    error::{AggregationError, FetchResult},
    model::ProviderQuery,
    payload::{AirQualityPayload, GeoMatch, UvPayload, WeatherPayload},
};
use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use std::{convert::TryFrom, fmt::Debug};

pub mod gemini;
pub mod openuv;
pub mod openweather;
pub mod waqi;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    OpenWeather,
    OpenUv,
    Waqi,
    Gemini,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenWeather => "openweather",
            ProviderId::OpenUv => "openuv",
            ProviderId::Waqi => "waqi",
            ProviderId::Gemini => "gemini",
        }
    }

    /// Environment variable that overrides the configured key.
    pub fn key_env_var(&self) -> &'static str {
        match self {
            ProviderId::OpenWeather => "OPENWEATHER_API_KEY",
            ProviderId::OpenUv => "OPENUV_API_KEY",
            ProviderId::Waqi => "WAQI_API_KEY",
            ProviderId::Gemini => "GEMINI_API_KEY",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[
            ProviderId::OpenWeather,
            ProviderId::OpenUv,
            ProviderId::Waqi,
            ProviderId::Gemini,
        ]
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "openweather" => Ok(ProviderId::OpenWeather),
            "openuv" => Ok(ProviderId::OpenUv),
            "waqi" => Ok(ProviderId::Waqi),
            "gemini" => Ok(ProviderId::Gemini),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: openweather, openuv, waqi, gemini."
            )),
        }
    }
}

/// Resolves a free-text place query to coordinates.
#[async_trait]
pub trait Geocoder: Send + Sync + Debug {
    async fn geocode(&self, query: &str, limit: u8) -> FetchResult<Vec<GeoMatch>>;
}

#[async_trait]
pub trait CurrentWeatherSource: Send + Sync + Debug {
    async fn current_weather(&self, query: &ProviderQuery) -> FetchResult<WeatherPayload>;
}

#[async_trait]
pub trait UvIndexSource: Send + Sync + Debug {
    async fn uv_index(&self, query: &ProviderQuery) -> FetchResult<UvPayload>;
}

#[async_trait]
pub trait AirQualitySource: Send + Sync + Debug {
    async fn air_quality(&self, query: &ProviderQuery) -> FetchResult<AirQualityPayload>;
}

/// Send `request` and return the body of a 2xx response.
pub(crate) async fn fetch_body(provider: ProviderId, request: RequestBuilder) -> FetchResult<String> {
    let res = request.send().await.map_err(|err| {
        if err.is_builder() {
            AggregationError::invalid_request(provider, err)
        } else {
            AggregationError::unreachable(provider, err)
        }
    })?;

    let status = res.status();
    let body = res
        .text()
        .await
        .map_err(|err| AggregationError::unreachable(provider, err))?;

    tracing::debug!(%provider, %status, bytes = body.len(), "provider responded");

    if !status.is_success() {
        return Err(AggregationError::ProviderRejected {
            provider,
            status: status.as_u16(),
            body: truncate_body(&body),
        });
    }

    Ok(body)
}

pub(crate) async fn fetch_json<T: DeserializeOwned>(
    provider: ProviderId,
    request: RequestBuilder,
) -> FetchResult<T> {
    let body = fetch_body(provider, request).await?;
    serde_json::from_str(&body).map_err(|err| AggregationError::malformed(provider, err))
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() > MAX {
        format!("{}...", body.chars().take(MAX).collect::<String>())
    } else {
        body.to_string()
    }
}
