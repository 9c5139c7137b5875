//! Data models for `WetterMail`
//!
//! - Location: free-text place names or coordinate pairs
//! - Weather: a single point-in-time observation and its condition category

pub mod location;
pub mod weather;

// Re-export all public types for convenient access
pub use location::Location;
pub use weather::{Condition, UnitSystem, WeatherObservation};
