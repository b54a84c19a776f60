//! Weather provider integration.
//!
//! The conversation core only sees the [`WeatherFetcher`] trait; the
//! production implementation talks to OpenWeatherMap.

mod client;
mod types;

pub use client::{OpenWeatherClient, WeatherFetcher};
pub use types::{UNAVAILABLE, Units, WeatherSnapshot, capitalize};
