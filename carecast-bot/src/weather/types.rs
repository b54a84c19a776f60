use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel rendered for a reading the provider did not include.
pub const UNAVAILABLE: &str = "N/A";

/// Unit system requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    /// Celsius and metres per second.
    #[default]
    Metric,
    /// Fahrenheit and miles per hour.
    Imperial,
}

impl Units {
    /// Value of the provider's `units` query parameter.
    #[must_use]
    pub const fn as_query(self) -> &'static str {
        match self {
            Self::Metric => "metric",
            Self::Imperial => "imperial",
        }
    }

    /// Suffix printed after a temperature.
    #[must_use]
    pub const fn temperature_label(self) -> &'static str {
        match self {
            Self::Metric => "°C",
            Self::Imperial => "°F",
        }
    }

    /// Suffix printed after a wind speed.
    #[must_use]
    pub const fn wind_label(self) -> &'static str {
        match self {
            Self::Metric => "m/s",
            Self::Imperial => "mph",
        }
    }
}

/// Current conditions for one city, as far as the provider reported them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    /// Air temperature in the requested unit system.
    pub temperature: Option<f64>,
    /// Relative humidity.
    pub humidity_percent: Option<f64>,
    /// Wind speed in the requested unit system.
    pub wind_speed: Option<f64>,
    /// Capitalized condition text, e.g. "Light rain".
    pub condition: Option<String>,
    /// Unit system the numbers are expressed in.
    #[serde(default)]
    pub units: Units,
}

impl WeatherSnapshot {
    /// Temperature, or the sentinel.
    #[must_use]
    pub fn temperature_text(&self) -> String {
        Reading(self.temperature).to_string()
    }

    /// Humidity, or the sentinel.
    #[must_use]
    pub fn humidity_text(&self) -> String {
        Reading(self.humidity_percent).to_string()
    }

    /// Wind speed, or the sentinel.
    #[must_use]
    pub fn wind_speed_text(&self) -> String {
        Reading(self.wind_speed).to_string()
    }

    /// Condition, or the sentinel.
    #[must_use]
    pub fn condition_text(&self) -> &str {
        self.condition.as_deref().unwrap_or(UNAVAILABLE)
    }
}

/// Displays a numeric reading as the provider sent it, or [`UNAVAILABLE`].
struct Reading(Option<f64>);

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(v) => write!(f, "{v}"),
            None => f.write_str(UNAVAILABLE),
        }
    }
}

/// First character upper-cased, the rest lower-cased.
#[must_use]
pub fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
    })
}
