//! One aggregation cycle: geocode, fan out to the data providers, join.

use std::{future::Future, sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    error::{AggregationError, FetchResult},
    model::{Coordinates, Location, ProviderQuery, WeatherSnapshot},
    provider::{
        AirQualitySource, CurrentWeatherSource, Geocoder, ProviderId, UvIndexSource,
        openuv::OpenUvClient, openweather::OpenWeatherClient, waqi::WaqiClient,
    },
};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct Aggregator {
    geocoder: Arc<dyn Geocoder>,
    weather: Arc<dyn CurrentWeatherSource>,
    uv: Option<Arc<dyn UvIndexSource>>,
    air: Arc<dyn AirQualitySource>,
    timeout: Duration,
}

impl Aggregator {
    /// `uv` may be `None`, in which case snapshots carry no UV reading.
    pub fn new(
        geocoder: Arc<dyn Geocoder>,
        weather: Arc<dyn CurrentWeatherSource>,
        uv: Option<Arc<dyn UvIndexSource>>,
        air: Arc<dyn AirQualitySource>,
    ) -> Self {
        Self {
            geocoder,
            weather,
            uv,
            air,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Bound applied to every individual provider call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Wire up the HTTP clients from configured keys.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let openweather = Arc::new(OpenWeatherClient::new(
            config.require_api_key(ProviderId::OpenWeather)?,
        ));
        let waqi = Arc::new(WaqiClient::new(config.require_api_key(ProviderId::Waqi)?));
        let uv = config
            .api_key(ProviderId::OpenUv)
            .map(|key| Arc::new(OpenUvClient::new(key)) as Arc<dyn UvIndexSource>);

        if uv.is_none() {
            tracing::info!("no OpenUV key configured, UV readings will be skipped");
        }

        Ok(Self::new(openweather.clone(), openweather, uv, waqi).with_timeout(config.timeout()))
    }

    /// Resolve `location` to coordinates; the first geocoding match wins.
    pub async fn resolve(&self, location: &Location) -> FetchResult<Coordinates> {
        let query = location.display_name();
        let matches = self
            .bounded(ProviderId::OpenWeather, self.geocoder.geocode(&query, 1))
            .await?;

        let first = matches
            .into_iter()
            .next()
            .ok_or(AggregationError::LocationNotFound { query })?;

        tracing::debug!(%location, lat = first.lat, lon = first.lon, "resolved coordinates");

        Ok(Coordinates {
            lat: first.lat,
            lon: first.lon,
        })
    }

    /// Run one full cycle for `location`. Either every provider succeeds and
    /// a snapshot is returned, or the first failure is.
    pub async fn aggregate(
        &self,
        location: &Location,
        cancel: &CancellationToken,
    ) -> FetchResult<WeatherSnapshot> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(%location, "aggregation cancelled");
                Err(AggregationError::Cancelled)
            }
            result = self.run_cycle(location) => result,
        }
    }

    async fn run_cycle(&self, location: &Location) -> FetchResult<WeatherSnapshot> {
        let coordinates = self.resolve(location).await?;
        let query = ProviderQuery {
            location: location.clone(),
            coordinates,
        };

        let weather = self.bounded(ProviderId::OpenWeather, self.weather.current_weather(&query));
        let uv = async {
            match &self.uv {
                Some(uv) => self
                    .bounded(ProviderId::OpenUv, uv.uv_index(&query))
                    .await
                    .map(Some),
                None => Ok(None),
            }
        };
        let air = self.bounded(ProviderId::Waqi, self.air.air_quality(&query));

        let (weather, uv, air) = tokio::try_join!(weather, uv, air).inspect_err(|err| {
            tracing::warn!(%location, error = %err, "aggregation failed");
        })?;

        if air.data.is_none() {
            tracing::info!(%location, "air quality station returned no data");
        }

        Ok(WeatherSnapshot::merge(query, weather, uv, air))
    }

    async fn bounded<T>(
        &self,
        provider: ProviderId,
        call: impl Future<Output = FetchResult<T>>,
    ) -> FetchResult<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(AggregationError::unreachable(
                provider,
                format!("timed out after {:?}", self.timeout),
            )),
        }
    }
}
