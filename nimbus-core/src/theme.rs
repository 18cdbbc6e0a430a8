use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::WeatherSnapshot;

/// Visual theme derived from the current weather condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Theme {
    ClearDay,
    ClearNight,
    Cloudy,
    Rain,
    #[default]
    Generic,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::ClearDay => "clear-day",
            Theme::ClearNight => "clear-night",
            Theme::Cloudy => "cloudy",
            Theme::Rain => "rain",
            Theme::Generic => "generic",
        }
    }

    /// Theme for a snapshot; a snapshot without a condition is `Generic`.
    pub fn for_snapshot(snapshot: &WeatherSnapshot) -> Self {
        snapshot.condition_code().map_or(Theme::Generic, classify)
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map an OpenWeatherMap icon code to a theme. Total: unknown codes are
/// `Generic`. Night rain and cloud codes share the day themes.
pub fn classify(code: &str) -> Theme {
    match code {
        "01d" => Theme::ClearDay,
        "01n" => Theme::ClearNight,
        "02d" | "03d" | "04d" | "02n" | "03n" | "04n" => Theme::Cloudy,
        "09d" | "10d" | "11d" | "09n" | "10n" | "11n" => Theme::Rain,
        _ => Theme::Generic,
    }
}
