use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::payload::{AirQualityPayload, UvPayload, WeatherPayload};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid location '{input}': expected \"City,Country\" with both parts non-empty")]
pub struct InvalidLocation {
    pub input: String,
}

/// A place identified by city and country, e.g. `Victoria,CA`.
///
/// Serialized as its display name; deserializing goes through
/// [`Location::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Location {
    city: String,
    country: String,
}

impl Location {
    pub fn new(city: impl Into<String>, country: impl Into<String>) -> Result<Self, InvalidLocation> {
        let city = city.into().trim().to_string();
        let country = country.into().trim().to_string();

        if city.is_empty() || country.is_empty() {
            return Err(InvalidLocation {
                input: format!("{city},{country}"),
            });
        }

        Ok(Self { city, country })
    }

    /// Parse `"City,Country"`, splitting at the first comma.
    pub fn parse(input: &str) -> Result<Self, InvalidLocation> {
        let (city, country) = input.split_once(',').ok_or_else(|| InvalidLocation {
            input: input.to_string(),
        })?;

        Self::new(city, country).map_err(|_| InvalidLocation {
            input: input.to_string(),
        })
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn display_name(&self) -> String {
        format!("{},{}", self.city, self.country)
    }

    /// Display-name equality, the identity used for de-duplication and
    /// re-fetch suppression.
    pub fn same_place(&self, other: &Location) -> bool {
        self.display_name() == other.display_name()
    }
}

impl TryFrom<String> for Location {
    type Error = InvalidLocation;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Location> for String {
    fn from(location: Location) -> Self {
        location.display_name()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.city, self.country)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// Everything a data provider needs for one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderQuery {
    pub location: Location,
    pub coordinates: Coordinates,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AqiLevel {
    Good,
    Moderate,
    UnhealthyForSensitiveGroups,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl AqiLevel {
    pub fn from_aqi(aqi: u16) -> Self {
        match aqi {
            0..=50 => Self::Good,
            51..=100 => Self::Moderate,
            101..=150 => Self::UnhealthyForSensitiveGroups,
            151..=200 => Self::Unhealthy,
            201..=300 => Self::VeryUnhealthy,
            _ => Self::Hazardous,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Good => "Good",
            Self::Moderate => "Moderate",
            Self::UnhealthyForSensitiveGroups => "Unhealthy for Sensitive Groups",
            Self::Unhealthy => "Unhealthy",
            Self::VeryUnhealthy => "Very Unhealthy",
            Self::Hazardous => "Hazardous",
        }
    }
}

impl fmt::Display for AqiLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UvLevel {
    Low,
    Moderate,
    High,
    VeryHigh,
    Extreme,
}

impl UvLevel {
    pub fn from_index(uv: f64) -> Self {
        if uv < 3.0 {
            Self::Low
        } else if uv < 6.0 {
            Self::Moderate
        } else if uv < 8.0 {
            Self::High
        } else if uv < 11.0 {
            Self::VeryHigh
        } else {
            Self::Extreme
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Moderate => "Moderate",
            Self::High => "High",
            Self::VeryHigh => "Very High",
            Self::Extreme => "Extreme",
        }
    }
}

impl fmt::Display for UvLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Icon code such as "01d" or "10n".
    pub code: String,
    pub group: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UvReading {
    pub index: f64,
    pub max: f64,
    pub max_time: String,
}

impl UvReading {
    pub fn level(&self) -> UvLevel {
        UvLevel::from_index(self.index)
    }

    /// Time of the daily maximum, when the provider sent an RFC 3339 stamp.
    pub fn max_time_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.max_time)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirQualityReading {
    pub aqi: u16,
    pub level: AqiLevel,
    pub station: String,
}

/// Merged result of one successful aggregation cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub location: Location,
    pub coordinates: Coordinates,
    /// Place name as reported by the weather provider.
    pub reported_name: String,
    pub temperature_c: f64,
    pub feels_like_c: f64,
    pub humidity_pct: u8,
    pub condition: Option<Condition>,
    pub uv: Option<UvReading>,
    pub air_quality: Option<AirQualityReading>,
    pub fetched_at: DateTime<Utc>,
}

impl WeatherSnapshot {
    pub fn merge(
        query: ProviderQuery,
        weather: WeatherPayload,
        uv: Option<UvPayload>,
        air: AirQualityPayload,
    ) -> Self {
        let condition = weather.weather.into_iter().next().map(|entry| Condition {
            code: entry.icon,
            group: entry.main,
            description: entry.description,
        });

        let uv = uv.map(|payload| UvReading {
            index: payload.result.uv,
            max: payload.result.uv_max,
            max_time: payload.result.uv_max_time,
        });

        let air_quality = air.data.map(|data| AirQualityReading {
            aqi: data.aqi,
            level: AqiLevel::from_aqi(data.aqi),
            station: data.city.name,
        });

        Self {
            location: query.location,
            coordinates: query.coordinates,
            reported_name: weather.name,
            temperature_c: weather.main.temp,
            feels_like_c: weather.main.feels_like,
            humidity_pct: weather.main.humidity,
            condition,
            uv,
            air_quality,
            fetched_at: Utc::now(),
        }
    }

    pub fn display_name(&self) -> String {
        self.location.display_name()
    }

    pub fn condition_code(&self) -> Option<&str> {
        self.condition.as_ref().map(|c| c.code.as_str())
    }

    pub fn description(&self) -> Option<&str> {
        self.condition.as_ref().map(|c| c.description.as_str())
    }
}
