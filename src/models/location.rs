//! Location model for place names and coordinate pairs

use serde::{Deserialize, Serialize};
use std::fmt;

/// A location as typed by the user
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Location {
    /// Latitude and longitude in decimal degrees
    Coordinates { latitude: f64, longitude: f64 },
    /// City, region or any other name the weather provider can resolve
    Place(String),
}

impl Location {
    /// Parse free text such as "51.4344,6.7623", "51.4344 6.7623" or "Duisburg".
    ///
    /// Anything that is not a pair of in-range coordinates is treated as a
    /// place name.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        match Self::parse_coordinates(input) {
            Some((latitude, longitude)) => Location::Coordinates {
                latitude,
                longitude,
            },
            None => Location::Place(input.to_string()),
        }
    }

    fn parse_coordinates(input: &str) -> Option<(f64, f64)> {
        let parts: Vec<&str> = input
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .collect();

        if parts.len() != 2 {
            return None;
        }

        let lat = parts[0].parse::<f64>().ok()?;
        let lon = parts[1].parse::<f64>().ok()?;

        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return None;
        }

        Some((lat, lon))
    }

    /// Format location as coordinates string
    #[must_use]
    pub fn format_coordinates(&self) -> Option<String> {
        match self {
            Location::Coordinates {
                latitude,
                longitude,
            } => Some(format!("{latitude:.4}, {longitude:.4}")),
            Location::Place(_) => None,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Coordinates {
                latitude,
                longitude,
            } => write!(f, "{latitude},{longitude}"),
            Location::Place(name) => f.write_str(name),
        }
    }
}
