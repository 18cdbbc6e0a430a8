//! Wire shapes returned by the data providers.
//!
//! These mirror the JSON bodies exactly; merging them into a
//! [`WeatherSnapshot`](crate::WeatherSnapshot) happens in the aggregator.

use serde::{Deserialize, Serialize};

/// OpenWeatherMap current-weather body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherPayload {
    pub main: MainReadings,
    #[serde(default)]
    pub weather: Vec<ConditionEntry>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainReadings {
    pub temp: f64,
    pub feels_like: f64,
    pub humidity: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionEntry {
    pub main: String,
    pub description: String,
    pub icon: String,
}

/// OpenUV body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UvPayload {
    pub result: UvResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UvResult {
    pub uv: f64,
    pub uv_max: f64,
    pub uv_max_time: String,
}

/// WAQI feed body. `data` is legitimately `null` when the station has
/// nothing to report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirQualityPayload {
    pub status: String,
    pub data: Option<AqiData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AqiData {
    pub aqi: u16,
    pub city: AqiCity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AqiCity {
    pub name: String,
}

/// One OpenWeatherMap direct-geocoding match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoMatch {
    pub name: String,
    pub country: String,
    #[serde(default)]
    pub state: Option<String>,
    pub lat: f64,
    pub lon: f64,
}

impl GeoMatch {
    /// "Victoria, British Columbia, CA" style label for search listings.
    pub fn label(&self) -> String {
        match &self.state {
            Some(state) if !state.is_empty() => {
                format!("{}, {}, {}", self.name, state, self.country)
            }
            _ => format!("{}, {}", self.name, self.country),
        }
    }
}
