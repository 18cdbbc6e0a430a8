//! Core library for the `nimbus` weather assistant.
//!
//! This crate defines:
//! - Provider clients for current weather, UV index, air quality and geocoding
//! - The aggregator that merges one cycle of provider data into a snapshot
//! - The store that publishes the snapshot and theme for the active location
//! - Theme classification and the conversational planner
//! - Configuration & credentials handling
//!
//! It is used by `nimbus-cli`, but can also be reused by other front ends.

pub mod aggregator;
pub mod config;
pub mod error;
pub mod locations;
pub mod model;
pub mod payload;
pub mod planner;
pub mod provider;
pub mod store;
pub mod theme;

pub use aggregator::Aggregator;
pub use config::{Config, ProviderConfig};
pub use error::{AggregationError, CompletionError, FetchResult};
pub use locations::LocationBook;
pub use model::{
    AirQualityReading, AqiLevel, Coordinates, InvalidLocation, Location, UvLevel, UvReading,
    WeatherSnapshot,
};
pub use planner::{ChatMessage, Planner, TextCompletion};
pub use provider::{ProviderId, gemini::GeminiClient};
pub use store::{RefreshOutcome, WeatherState, WeatherStore};
pub use theme::{Theme, classify};
