//! Published weather state for the active location.
//!
//! The store is the single writer of [`WeatherState`]. Every cycle is tagged
//! with the active location and a generation number taken when it starts; a
//! cycle whose tag no longer matches on completion is discarded.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::{
    aggregator::Aggregator,
    error::AggregationError,
    model::{Location, WeatherSnapshot},
    theme::Theme,
};

/// What subscribers see. Replaced wholesale on every change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeatherState {
    pub active: Option<Location>,
    /// Last successful snapshot; may belong to a previous location until a
    /// new one supersedes it.
    pub snapshot: Option<Arc<WeatherSnapshot>>,
    pub theme: Theme,
    pub loading: bool,
    pub last_error: Option<String>,
}

impl WeatherState {
    /// Whether the visible snapshot belongs to the active location.
    pub fn shows_active_location(&self) -> bool {
        match (&self.active, &self.snapshot) {
            (Some(active), Some(snapshot)) => snapshot.location.same_place(active),
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    NoActiveLocation,
    /// A current snapshot exists; no provider was called.
    AlreadyCurrent(Arc<WeatherSnapshot>),
    Fetched(Arc<WeatherSnapshot>),
    /// The active location changed, or the store was invalidated, while the
    /// cycle was in flight.
    Discarded,
    Failed(AggregationError),
}

#[derive(Debug)]
struct Inner {
    generation: u64,
    /// Generation whose successful cycle produced the visible snapshot.
    current: Option<u64>,
    cancel: CancellationToken,
    state: WeatherState,
}

impl Inner {
    /// Start a new generation, cancelling whatever was in flight. No cycle
    /// of the new generation is running yet, so `loading` drops too.
    fn bump(&mut self) {
        self.generation += 1;
        self.current = None;
        self.cancel.cancel();
        self.cancel = CancellationToken::new();
        self.state.loading = false;
    }

    fn current_snapshot(&self) -> Option<&Arc<WeatherSnapshot>> {
        if self.current != Some(self.generation) || !self.state.shows_active_location() {
            return None;
        }
        self.state.snapshot.as_ref()
    }
}

#[derive(Debug)]
pub struct WeatherStore {
    aggregator: Aggregator,
    inner: Mutex<Inner>,
    tx: watch::Sender<WeatherState>,
}

impl WeatherStore {
    pub fn new(aggregator: Aggregator) -> Self {
        let (tx, _rx) = watch::channel(WeatherState::default());
        Self {
            aggregator,
            inner: Mutex::new(Inner {
                generation: 0,
                current: None,
                cancel: CancellationToken::new(),
                state: WeatherState::default(),
            }),
            tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<WeatherState> {
        self.tx.subscribe()
    }

    pub fn state(&self) -> WeatherState {
        self.lock().state.clone()
    }

    pub fn active_location(&self) -> Option<Location> {
        self.lock().state.active.clone()
    }

    /// Switch the active location. Returns `false` if it was already active.
    pub fn set_active_location(&self, location: Location) -> bool {
        let mut inner = self.lock();
        if inner
            .state
            .active
            .as_ref()
            .is_some_and(|active| active.same_place(&location))
        {
            return false;
        }

        tracing::info!(%location, "active location changed");
        inner.bump();
        inner.state.active = Some(location);
        inner.state.last_error = None;
        self.publish(&inner);
        true
    }

    /// Mark the visible snapshot as outdated so the next refresh fetches.
    pub fn invalidate(&self) {
        let mut inner = self.lock();
        tracing::debug!(generation = inner.generation, "snapshot invalidated");
        inner.bump();
        self.publish(&inner);
    }

    /// Run an aggregation cycle for the active location unless it already
    /// has a current snapshot.
    pub async fn refresh(&self) -> RefreshOutcome {
        let (location, generation, cancel) = {
            let mut inner = self.lock();
            let Some(location) = inner.state.active.clone() else {
                return RefreshOutcome::NoActiveLocation;
            };

            if let Some(snapshot) = inner.current_snapshot() {
                tracing::debug!(%location, "snapshot is current, skipping fetch");
                return RefreshOutcome::AlreadyCurrent(snapshot.clone());
            }

            inner.state.loading = true;
            self.publish(&inner);
            (location, inner.generation, inner.cancel.clone())
        };

        let result = self.aggregator.aggregate(&location, &cancel).await;

        let mut inner = self.lock();
        let still_active = inner.generation == generation
            && inner
                .state
                .active
                .as_ref()
                .is_some_and(|active| active.same_place(&location));

        if !still_active || matches!(result, Err(AggregationError::Cancelled)) {
            tracing::warn!(
                %location,
                generation,
                current_generation = inner.generation,
                succeeded = result.is_ok(),
                "discarding result of a stale aggregation cycle"
            );
            return RefreshOutcome::Discarded;
        }

        inner.state.loading = false;
        match result {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                inner.state.theme = Theme::for_snapshot(&snapshot);
                inner.state.snapshot = Some(snapshot.clone());
                inner.state.last_error = None;
                inner.current = Some(generation);
                tracing::info!(%location, theme = %inner.state.theme, "snapshot published");
                self.publish(&inner);
                RefreshOutcome::Fetched(snapshot)
            }
            Err(err) => {
                inner.state.last_error = Some(err.to_string());
                self.publish(&inner);
                RefreshOutcome::Failed(err)
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, inner: &Inner) {
        self.tx.send_replace(inner.state.clone());
    }
}
