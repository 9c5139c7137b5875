//! Weather observation model and display methods

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unit system used for temperatures and wind speeds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    /// Degrees Celsius and metres per second
    #[default]
    Metric,
    /// Degrees Fahrenheit and miles per hour
    Imperial,
}

impl UnitSystem {
    /// Convert a temperature in this unit system to degrees Celsius
    #[must_use]
    pub fn to_celsius(self, temperature: f64) -> f64 {
        match self {
            UnitSystem::Metric => temperature,
            UnitSystem::Imperial => (temperature - 32.0) * 5.0 / 9.0,
        }
    }

    /// Convert a Kelvin temperature into this unit system
    #[must_use]
    pub fn convert_kelvin(self, kelvin: f64) -> f64 {
        let celsius = kelvin - 273.15;
        match self {
            UnitSystem::Metric => celsius,
            UnitSystem::Imperial => celsius * 9.0 / 5.0 + 32.0,
        }
    }

    /// Convert a wind speed in this unit system to metres per second
    #[must_use]
    pub fn to_meters_per_second(self, speed: f64) -> f64 {
        match self {
            UnitSystem::Metric => speed,
            UnitSystem::Imperial => speed * 0.447_04,
        }
    }

    /// Convert a wind speed in metres per second into this unit system
    #[must_use]
    pub fn convert_meters_per_second(self, speed: f64) -> f64 {
        match self {
            UnitSystem::Metric => speed,
            UnitSystem::Imperial => speed / 0.447_04,
        }
    }

    #[must_use]
    pub fn temperature_symbol(self) -> &'static str {
        match self {
            UnitSystem::Metric => "°C",
            UnitSystem::Imperial => "°F",
        }
    }

    #[must_use]
    pub fn wind_symbol(self) -> &'static str {
        match self {
            UnitSystem::Metric => "m/s",
            UnitSystem::Imperial => "mph",
        }
    }
}

/// Weather condition category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    Clear,
    Clouds,
    Rain,
    Snow,
    Storm,
    Fog,
}

impl Condition {
    /// Map a provider's main weather group ("Rain", "Thunderstorm", ...) to a condition
    #[must_use]
    pub fn from_provider_group(group: &str) -> Self {
        match group {
            "Thunderstorm" | "Tornado" | "Squall" => Condition::Storm,
            "Drizzle" | "Rain" => Condition::Rain,
            "Snow" => Condition::Snow,
            "Clear" => Condition::Clear,
            "Mist" | "Fog" | "Haze" | "Smoke" | "Dust" | "Sand" | "Ash" => Condition::Fog,
            _ => Condition::Clouds,
        }
    }

    /// Whether this condition calls for rain or snow protection
    #[must_use]
    pub fn is_precipitation(self) -> bool {
        matches!(self, Condition::Rain | Condition::Snow | Condition::Storm)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Condition::Clear => "clear",
            Condition::Clouds => "clouds",
            Condition::Rain => "rain",
            Condition::Snow => "snow",
            Condition::Storm => "storm",
            Condition::Fog => "fog",
        };
        f.write_str(name)
    }
}

/// A single point-in-time weather reading.
///
/// `temperature` and `wind_speed` are expressed in the unit system the
/// observation was requested in.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WeatherObservation {
    /// Air temperature
    pub temperature: f64,
    /// Condition category
    pub condition: Condition,
    /// Wind speed, never negative
    pub wind_speed: f64,
    /// Relative humidity in percent (0-100)
    pub humidity: f64,
    /// When the provider measured this reading
    pub timestamp: DateTime<Utc>,
    /// Place name reported by the provider
    pub place_name: Option<String>,
    /// Provider description of the conditions ("light rain")
    pub description: Option<String>,
}

impl WeatherObservation {
    /// Format temperature with unit
    #[must_use]
    pub fn format_temperature(&self, units: UnitSystem) -> String {
        format!("{:.0}{}", self.temperature, units.temperature_symbol())
    }

    /// Format wind speed with unit
    #[must_use]
    pub fn format_wind(&self, units: UnitSystem) -> String {
        format!("{:.1} {}", self.wind_speed, units.wind_symbol())
    }

    #[must_use]
    pub fn format_humidity(&self) -> String {
        format!("{:.0}%", self.humidity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kelvin_conversion() {
        assert!((UnitSystem::Metric.convert_kelvin(273.15) - 0.0).abs() < 1e-9);
        assert!((UnitSystem::Metric.convert_kelvin(298.15) - 25.0).abs() < 1e-9);
        assert!((UnitSystem::Imperial.convert_kelvin(273.15) - 32.0).abs() < 1e-9);
    }

    #[test]
    fn test_imperial_to_metric() {
        assert!((UnitSystem::Imperial.to_celsius(212.0) - 100.0).abs() < 1e-9);
        assert!((UnitSystem::Imperial.to_meters_per_second(10.0) - 4.4704).abs() < 1e-9);
        let mph = UnitSystem::Imperial.convert_meters_per_second(4.4704);
        assert!((mph - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_provider_group_mapping() {
        assert_eq!(Condition::from_provider_group("Thunderstorm"), Condition::Storm);
        assert_eq!(Condition::from_provider_group("Drizzle"), Condition::Rain);
        assert_eq!(Condition::from_provider_group("Snow"), Condition::Snow);
        assert_eq!(Condition::from_provider_group("Haze"), Condition::Fog);
        assert_eq!(Condition::from_provider_group("Clear"), Condition::Clear);
        assert_eq!(Condition::from_provider_group("Something"), Condition::Clouds);
    }

    #[test]
    fn test_formatting() {
        let observation = WeatherObservation {
            temperature: 21.6,
            condition: Condition::Clear,
            wind_speed: 3.24,
            humidity: 40.0,
            timestamp: Utc::now(),
            place_name: None,
            description: None,
        };
        assert_eq!(observation.format_temperature(UnitSystem::Metric), "22°C");
        assert_eq!(observation.format_wind(UnitSystem::Imperial), "3.2 mph");
        assert_eq!(observation.format_humidity(), "40%");
    }
}
