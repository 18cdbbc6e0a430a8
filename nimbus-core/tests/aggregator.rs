//! Aggregation cycle and store behaviour against in-process mock providers.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use nimbus_core::{
    AggregationError, Aggregator, AqiLevel, FetchResult, Location, ProviderId, RefreshOutcome,
    Theme, WeatherStore,
    model::ProviderQuery,
    payload::{
        AirQualityPayload, AqiCity, AqiData, ConditionEntry, GeoMatch, MainReadings, UvPayload,
        UvResult, WeatherPayload,
    },
    provider::{AirQualitySource, CurrentWeatherSource, Geocoder, UvIndexSource},
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct MockProviders {
    log: Mutex<Vec<(&'static str, String, Instant)>>,
    fail: Mutex<Option<(&'static str, AggregationError)>>,
    geocode_empty: bool,
    aqi_null: bool,
    delay: Duration,
    slow_city: Option<(String, Duration)>,
}

impl MockProviders {
    async fn enter(&self, call: &'static str, city: &str) -> FetchResult<()> {
        self.log
            .lock()
            .unwrap()
            .push((call, city.to_string(), Instant::now()));

        let delay = match &self.slow_city {
            Some((slow, delay)) if slow == city => *delay,
            _ => self.delay,
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let failure = self.fail.lock().unwrap().clone();
        match failure {
            Some((name, err)) if name == call => Err(err),
            _ => Ok(()),
        }
    }

    fn fail_on(&self, call: &'static str, err: AggregationError) {
        *self.fail.lock().unwrap() = Some((call, err));
    }

    fn count(&self, call: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _, _)| *name == call)
            .count()
    }

    fn starts(&self, city: &str) -> Vec<(&'static str, Instant)> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, c, _)| *name != "geocode" && c == city)
            .map(|(name, _, at)| (*name, *at))
            .collect()
    }
}

#[async_trait]
impl Geocoder for MockProviders {
    async fn geocode(&self, query: &str, _limit: u8) -> FetchResult<Vec<GeoMatch>> {
        let city = query.split(',').next().unwrap_or_default().to_string();
        self.enter("geocode", &city).await?;
        if self.geocode_empty {
            return Ok(Vec::new());
        }
        Ok(vec![GeoMatch {
            name: city,
            country: "CA".into(),
            state: None,
            lat: 48.4284,
            lon: -123.3656,
        }])
    }
}

#[async_trait]
impl CurrentWeatherSource for MockProviders {
    async fn current_weather(&self, query: &ProviderQuery) -> FetchResult<WeatherPayload> {
        self.enter("weather", query.location.city()).await?;
        Ok(WeatherPayload {
            main: MainReadings {
                temp: 15.3,
                feels_like: 14.0,
                humidity: 82,
            },
            weather: vec![ConditionEntry {
                main: "Rain".into(),
                description: "light rain".into(),
                icon: "10d".into(),
            }],
            name: query.location.city().to_string(),
        })
    }
}

#[async_trait]
impl UvIndexSource for MockProviders {
    async fn uv_index(&self, query: &ProviderQuery) -> FetchResult<UvPayload> {
        self.enter("uv", query.location.city()).await?;
        Ok(UvPayload {
            result: UvResult {
                uv: 3.2,
                uv_max: 5.6,
                uv_max_time: "2024-06-01T20:14:32.000Z".into(),
            },
        })
    }
}

#[async_trait]
impl AirQualitySource for MockProviders {
    async fn air_quality(&self, query: &ProviderQuery) -> FetchResult<AirQualityPayload> {
        self.enter("air", query.location.city()).await?;
        let data = (!self.aqi_null).then(|| AqiData {
            aqi: 42,
            city: AqiCity {
                name: format!("{} station", query.location.city()),
            },
        });
        Ok(AirQualityPayload {
            status: "ok".into(),
            data,
        })
    }
}

fn aggregator(mock: &Arc<MockProviders>) -> Aggregator {
    let uv: Arc<dyn UvIndexSource> = mock.clone();
    Aggregator::new(mock.clone(), mock.clone(), Some(uv), mock.clone())
}

fn victoria() -> Location {
    Location::new("Victoria", "CA").unwrap()
}

fn vancouver() -> Location {
    Location::new("Vancouver", "CA").unwrap()
}

#[tokio::test]
async fn worked_example_is_merged_field_for_field() {
    let mock = Arc::new(MockProviders::default());

    let snapshot = aggregator(&mock)
        .aggregate(&victoria(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(snapshot.location, victoria());
    assert_eq!(snapshot.display_name(), "Victoria,CA");
    assert_eq!(snapshot.reported_name, "Victoria");
    assert_eq!(snapshot.coordinates.lat, 48.4284);
    assert_eq!(snapshot.temperature_c, 15.3);
    assert_eq!(snapshot.feels_like_c, 14.0);
    assert_eq!(snapshot.humidity_pct, 82);
    assert_eq!(snapshot.condition_code(), Some("10d"));
    assert_eq!(snapshot.description(), Some("light rain"));

    let uv = snapshot.uv.as_ref().unwrap();
    assert_eq!(uv.index, 3.2);
    assert_eq!(uv.max, 5.6);

    let air = snapshot.air_quality.as_ref().unwrap();
    assert_eq!(air.aqi, 42);
    assert_eq!(air.level, AqiLevel::Good);
    assert_eq!(air.level.label(), "Good");
    assert_eq!(air.station, "Victoria station");

    assert_eq!(Theme::for_snapshot(&snapshot), Theme::Rain);
}

#[tokio::test]
async fn any_required_provider_failure_fails_the_whole_cycle() {
    let failures = [
        (
            "weather",
            AggregationError::ProviderRejected {
                provider: ProviderId::OpenWeather,
                status: 401,
                body: "Invalid API key".into(),
            },
        ),
        (
            "uv",
            AggregationError::unreachable(ProviderId::OpenUv, "connection refused"),
        ),
        (
            "air",
            AggregationError::malformed(ProviderId::Waqi, "missing field `aqi`"),
        ),
    ];

    for (call, err) in failures {
        let mock = Arc::new(MockProviders::default());
        mock.fail_on(call, err.clone());

        let result = aggregator(&mock)
            .aggregate(&victoria(), &CancellationToken::new())
            .await;

        assert_eq!(result.unwrap_err(), err, "failing provider: {call}");
    }
}

#[tokio::test]
async fn null_air_quality_data_is_absent_not_an_error() {
    let mock = Arc::new(MockProviders {
        aqi_null: true,
        ..Default::default()
    });

    let snapshot = aggregator(&mock)
        .aggregate(&victoria(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(snapshot.air_quality.is_none());
    assert!(snapshot.uv.is_some());
}

#[tokio::test]
async fn unknown_location_fails_before_any_provider_call() {
    let mock = Arc::new(MockProviders {
        geocode_empty: true,
        ..Default::default()
    });

    let err = aggregator(&mock)
        .aggregate(&Location::new("Atlantis", "XX").unwrap(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        AggregationError::LocationNotFound {
            query: "Atlantis,XX".into()
        }
    );
    assert_eq!(mock.count("weather"), 0);
    assert_eq!(mock.count("uv"), 0);
    assert_eq!(mock.count("air"), 0);
}

#[tokio::test]
async fn skipped_uv_provider_leaves_uv_absent() {
    let mock = Arc::new(MockProviders::default());
    let aggregator = Aggregator::new(mock.clone(), mock.clone(), None, mock.clone());

    let snapshot = aggregator
        .aggregate(&victoria(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(snapshot.uv.is_none());
    assert!(snapshot.air_quality.is_some());
    assert_eq!(mock.count("uv"), 0);
}

#[tokio::test(start_paused = true)]
async fn provider_calls_start_together_and_latency_is_the_slowest_one() {
    let mock = Arc::new(MockProviders {
        delay: Duration::from_millis(100),
        ..Default::default()
    });

    let started = Instant::now();
    aggregator(&mock)
        .aggregate(&victoria(), &CancellationToken::new())
        .await
        .unwrap();
    let elapsed = started.elapsed();

    // geocode (100ms) + one concurrent round (100ms), not geocode + 3 x 100ms
    assert!(elapsed < Duration::from_millis(250), "elapsed {elapsed:?}");

    let starts = mock.starts("Victoria");
    assert_eq!(starts.len(), 3);
    let first = starts.iter().map(|(_, at)| *at).min().unwrap();
    let last = starts.iter().map(|(_, at)| *at).max().unwrap();
    assert!(last - first < Duration::from_millis(1), "starts {starts:?}");
}

#[tokio::test(start_paused = true)]
async fn slow_provider_times_out_as_unreachable() {
    let mock = Arc::new(MockProviders {
        slow_city: Some(("Victoria".into(), Duration::from_secs(30))),
        ..Default::default()
    });

    let err = aggregator(&mock)
        .with_timeout(Duration::from_secs(2))
        .aggregate(&victoria(), &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        AggregationError::ProviderUnreachable { reason, .. } => {
            assert!(reason.contains("timed out"), "reason {reason}")
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn cancelled_token_stops_the_cycle() {
    let mock = Arc::new(MockProviders::default());
    let token = CancellationToken::new();
    token.cancel();

    let err = aggregator(&mock)
        .aggregate(&victoria(), &token)
        .await
        .unwrap_err();

    assert_eq!(err, AggregationError::Cancelled);
}

#[tokio::test]
async fn refresh_without_active_location_does_nothing() {
    let mock = Arc::new(MockProviders::default());
    let store = WeatherStore::new(aggregator(&mock));

    assert!(matches!(store.refresh().await, RefreshOutcome::NoActiveLocation));
    assert_eq!(mock.count("geocode"), 0);
}

#[tokio::test]
async fn refresh_publishes_snapshot_and_theme_to_subscribers() {
    let mock = Arc::new(MockProviders::default());
    let store = WeatherStore::new(aggregator(&mock));
    let mut rx = store.subscribe();

    store.set_active_location(victoria());
    let outcome = store.refresh().await;
    assert!(matches!(outcome, RefreshOutcome::Fetched(_)));

    assert!(rx.has_changed().unwrap());
    let state = rx.borrow_and_update().clone();
    assert_eq!(state.active, Some(victoria()));
    assert_eq!(state.theme, Theme::Rain);
    assert!(!state.loading);
    assert!(state.last_error.is_none());
    assert!(state.shows_active_location());
    assert_eq!(state.snapshot.unwrap().humidity_pct, 82);
}

#[tokio::test]
async fn repeated_refresh_for_the_same_location_is_suppressed() {
    let mock = Arc::new(MockProviders::default());
    let store = WeatherStore::new(aggregator(&mock));

    store.set_active_location(victoria());
    assert!(matches!(store.refresh().await, RefreshOutcome::Fetched(_)));
    assert!(matches!(store.refresh().await, RefreshOutcome::AlreadyCurrent(_)));

    // Re-selecting the same place is not an invalidation.
    assert!(!store.set_active_location(victoria()));
    assert!(matches!(store.refresh().await, RefreshOutcome::AlreadyCurrent(_)));

    for call in ["geocode", "weather", "uv", "air"] {
        assert_eq!(mock.count(call), 1, "calls to {call}");
    }
}

#[tokio::test]
async fn invalidate_allows_a_new_fetch() {
    let mock = Arc::new(MockProviders::default());
    let store = WeatherStore::new(aggregator(&mock));

    store.set_active_location(victoria());
    store.refresh().await;
    store.invalidate();
    assert!(matches!(store.refresh().await, RefreshOutcome::Fetched(_)));

    assert_eq!(mock.count("weather"), 2);
}

#[tokio::test]
async fn failure_keeps_the_previous_snapshot_visible() {
    let mock = Arc::new(MockProviders::default());
    let store = WeatherStore::new(aggregator(&mock));

    store.set_active_location(victoria());
    store.refresh().await;

    store.invalidate();
    mock.fail_on(
        "air",
        AggregationError::unreachable(ProviderId::Waqi, "dns failure"),
    );
    let outcome = store.refresh().await;
    assert!(matches!(outcome, RefreshOutcome::Failed(_)));

    let state = store.state();
    assert!(state.snapshot.is_some());
    assert_eq!(state.theme, Theme::Rain);
    assert!(!state.loading);
    assert!(state.last_error.unwrap().contains("waqi"));

    // The failed cycle did not make the old snapshot current again.
    mock.fail.lock().unwrap().take();
    assert!(matches!(store.refresh().await, RefreshOutcome::Fetched(_)));
}

#[tokio::test]
async fn first_failure_leaves_generic_theme_and_no_snapshot() {
    let mock = Arc::new(MockProviders::default());
    mock.fail_on(
        "weather",
        AggregationError::malformed(ProviderId::OpenWeather, "expected value"),
    );
    let store = WeatherStore::new(aggregator(&mock));

    store.set_active_location(victoria());
    store.refresh().await;

    let state = store.state();
    assert!(state.snapshot.is_none());
    assert_eq!(state.theme, Theme::Generic);
    assert!(state.last_error.is_some());
}

#[tokio::test(start_paused = true)]
async fn loading_is_visible_while_a_cycle_is_in_flight() {
    let mock = Arc::new(MockProviders {
        delay: Duration::from_millis(100),
        ..Default::default()
    });
    let store = Arc::new(WeatherStore::new(aggregator(&mock)));
    store.set_active_location(victoria());

    let task = tokio::spawn({
        let store = store.clone();
        async move { store.refresh().await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;

    let state = store.state();
    assert!(state.loading);
    assert!(state.snapshot.is_none());

    assert!(matches!(task.await.unwrap(), RefreshOutcome::Fetched(_)));
    assert!(!store.state().loading);
}

#[tokio::test(start_paused = true)]
async fn stale_cycle_does_not_overwrite_the_newer_location() {
    let mock = Arc::new(MockProviders {
        slow_city: Some(("Victoria".into(), Duration::from_millis(500))),
        delay: Duration::from_millis(10),
        ..Default::default()
    });
    let store = Arc::new(WeatherStore::new(aggregator(&mock)));

    store.set_active_location(victoria());
    let slow = tokio::spawn({
        let store = store.clone();
        async move { store.refresh().await }
    });
    tokio::time::sleep(Duration::from_millis(1)).await;

    assert!(store.set_active_location(vancouver()));
    let fast = store.refresh().await;
    assert!(matches!(fast, RefreshOutcome::Fetched(_)));

    assert!(matches!(slow.await.unwrap(), RefreshOutcome::Discarded));

    let state = store.state();
    assert_eq!(state.active, Some(vancouver()));
    assert_eq!(
        state.snapshot.unwrap().display_name(),
        "Vancouver,CA"
    );
    assert!(!state.loading);
}

#[tokio::test(start_paused = true)]
async fn invalidating_mid_cycle_discards_it_and_clears_loading() {
    let mock = Arc::new(MockProviders {
        delay: Duration::from_millis(100),
        ..Default::default()
    });
    let store = Arc::new(WeatherStore::new(aggregator(&mock)));
    let mut rx = store.subscribe();
    store.set_active_location(victoria());

    let task = tokio::spawn({
        let store = store.clone();
        async move { store.refresh().await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(rx.borrow_and_update().loading);

    store.invalidate();
    assert!(rx.has_changed().unwrap());
    assert!(!rx.borrow_and_update().loading);

    assert!(matches!(task.await.unwrap(), RefreshOutcome::Discarded));
    let state = store.state();
    assert!(!state.loading);
    assert!(state.snapshot.is_none());
    assert!(!rx.borrow().loading);

    assert!(matches!(store.refresh().await, RefreshOutcome::Fetched(_)));
    assert_eq!(mock.count("geocode"), 2);
    assert_eq!(mock.count("weather"), 1);
    assert!(!store.state().loading);
}
