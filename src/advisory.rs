//! Clothing advice from a weather observation
//!
//! `evaluate` is a pure function: the temperature picks one of five bands,
//! each band has a base list of clothing items, and the condition, wind and
//! humidity append extras in a fixed order.
//!
//! | Band     | °C range      | Severity |
//! |----------|---------------|----------|
//! | VeryCold | t < 0         | warning  |
//! | Cold     | 0 <= t < 12   | -        |
//! | Mild     | 12 <= t < 24  | -        |
//! | Warm     | 24 <= t < 30  | -        |
//! | Hot      | t >= 30       | warning  |
//!
//! Storm is always a warning. Rain, snow, fog or wind above
//! [`HIGH_WIND_MS`] raise the severity to caution.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;
use crate::models::{Condition, WeatherObservation};
use crate::settings::{DisplayOptions, Language, Verbosity};

/// Lower bound (inclusive) of the cold band, °C
pub const COLD_FROM_C: f64 = 0.0;
/// Lower bound (inclusive) of the mild band, °C
pub const MILD_FROM_C: f64 = 12.0;
/// Lower bound (inclusive) of the warm band, °C
pub const WARM_FROM_C: f64 = 24.0;
/// Lower bound (inclusive) of the hot band, °C
pub const HOT_FROM_C: f64 = 30.0;
/// Wind speeds strictly above this (m/s, Beaufort 6) count as high wind
pub const HIGH_WIND_MS: f64 = 10.8;
/// Humidity from which warm weather gets a hydration hint, percent
pub const HUMID_FROM_PERCENT: f64 = 70.0;

/// Temperature band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemperatureBand {
    VeryCold,
    Cold,
    Mild,
    Warm,
    Hot,
}

impl TemperatureBand {
    pub const ALL: [TemperatureBand; 5] = [
        TemperatureBand::VeryCold,
        TemperatureBand::Cold,
        TemperatureBand::Mild,
        TemperatureBand::Warm,
        TemperatureBand::Hot,
    ];

    /// Half-open `[lower, upper)` bounds in °C; `None` means unbounded
    #[must_use]
    pub fn bounds(self) -> (Option<f64>, Option<f64>) {
        match self {
            TemperatureBand::VeryCold => (None, Some(COLD_FROM_C)),
            TemperatureBand::Cold => (Some(COLD_FROM_C), Some(MILD_FROM_C)),
            TemperatureBand::Mild => (Some(MILD_FROM_C), Some(WARM_FROM_C)),
            TemperatureBand::Warm => (Some(WARM_FROM_C), Some(HOT_FROM_C)),
            TemperatureBand::Hot => (Some(HOT_FROM_C), None),
        }
    }

    #[must_use]
    pub fn contains(self, celsius: f64) -> bool {
        let (lower, upper) = self.bounds();
        lower.is_none_or(|l| celsius >= l) && upper.is_none_or(|u| celsius < u)
    }

    /// Band for a finite temperature in °C
    #[must_use]
    pub fn classify(celsius: f64) -> Self {
        if celsius < COLD_FROM_C {
            TemperatureBand::VeryCold
        } else if celsius < MILD_FROM_C {
            TemperatureBand::Cold
        } else if celsius < WARM_FROM_C {
            TemperatureBand::Mild
        } else if celsius < HOT_FROM_C {
            TemperatureBand::Warm
        } else {
            TemperatureBand::Hot
        }
    }

    /// The outermost bands on either side
    #[must_use]
    pub fn is_extreme(self) -> bool {
        matches!(self, TemperatureBand::VeryCold | TemperatureBand::Hot)
    }

    fn base_items(self) -> &'static [Item] {
        match self {
            TemperatureBand::VeryCold => &[
                Item::WinterCoat,
                Item::ThermalLayers,
                Item::Scarf,
                Item::InsulatedBoots,
            ],
            TemperatureBand::Cold => &[Item::WarmJacket, Item::Sweater, Item::LongTrousers],
            TemperatureBand::Mild => &[Item::NormalClothing, Item::LightJacket],
            TemperatureBand::Warm => &[Item::AiryClothing, Item::Sunglasses],
            TemperatureBand::Hot => &[Item::AiryClothing, Item::SunHat, Item::Sunscreen],
        }
    }

    fn headline(self, language: Language) -> &'static str {
        match (self, language) {
            (TemperatureBand::VeryCold, Language::En) => "Freezing: bundle up",
            (TemperatureBand::Cold, Language::En) => "Cold: dress warmly",
            (TemperatureBand::Mild, Language::En) => "Mild: normal clothing",
            (TemperatureBand::Warm, Language::En) => "Warm: light clothing",
            (TemperatureBand::Hot, Language::En) => "Hot: dress as lightly as possible",
            (TemperatureBand::VeryCold, Language::De) => "Eiskalt: warm einpacken",
            (TemperatureBand::Cold, Language::De) => "Kalt: warme Kleidung",
            (TemperatureBand::Mild, Language::De) => "Mild: normale Kleidung",
            (TemperatureBand::Warm, Language::De) => "Warm: luftige Kleidung",
            (TemperatureBand::Hot, Language::De) => "Heiß: möglichst luftige Kleidung",
        }
    }
}

/// Advisory severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Normal,
    Caution,
    Warning,
}

impl Severity {
    #[must_use]
    pub fn label(self, language: Language) -> &'static str {
        match (self, language) {
            (Severity::Normal, _) => "normal",
            (Severity::Caution, Language::En) => "caution",
            (Severity::Caution, Language::De) => "Vorsicht",
            (Severity::Warning, Language::En) => "warning",
            (Severity::Warning, Language::De) => "Warnung",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label(Language::En))
    }
}

/// Recommendation for one observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advisory {
    pub headline: String,
    /// Base items first, then condition, wind and humidity extras
    pub details: Vec<String>,
    pub severity: Severity,
    pub band: TemperatureBand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Item {
    WinterCoat,
    ThermalLayers,
    Scarf,
    InsulatedBoots,
    WarmJacket,
    Sweater,
    LongTrousers,
    NormalClothing,
    LightJacket,
    AiryClothing,
    Sunglasses,
    SunHat,
    Sunscreen,
    StayIndoors,
    RainGear,
    HeadCovering,
    Gloves,
    WaterproofShoes,
    Reflective,
    Windproof,
    Water,
}

impl Item {
    fn text(self, language: Language) -> &'static str {
        match language {
            Language::En => match self {
                Item::WinterCoat => "winter coat",
                Item::ThermalLayers => "thermal underwear",
                Item::Scarf => "scarf",
                Item::InsulatedBoots => "insulated boots",
                Item::WarmJacket => "warm jacket",
                Item::Sweater => "sweater",
                Item::LongTrousers => "long trousers",
                Item::NormalClothing => "normal clothing",
                Item::LightJacket => "light jacket for the evening",
                Item::AiryClothing => "airy clothing",
                Item::Sunglasses => "sunglasses",
                Item::SunHat => "sun hat",
                Item::Sunscreen => "sunscreen",
                Item::StayIndoors => "stay indoors if you can",
                Item::RainGear => "rain jacket or umbrella",
                Item::HeadCovering => "head covering",
                Item::Gloves => "gloves",
                Item::WaterproofShoes => "waterproof shoes",
                Item::Reflective => "bright or reflective clothing",
                Item::Windproof => "windproof outer layer",
                Item::Water => "plenty of water",
            },
            Language::De => match self {
                Item::WinterCoat => "Wintermantel",
                Item::ThermalLayers => "Thermounterwäsche",
                Item::Scarf => "Schal",
                Item::InsulatedBoots => "gefütterte Stiefel",
                Item::WarmJacket => "warme Jacke",
                Item::Sweater => "Pullover",
                Item::LongTrousers => "lange Hose",
                Item::NormalClothing => "normale Kleidung",
                Item::LightJacket => "leichte Jacke für den Abend",
                Item::AiryClothing => "luftige Kleidung",
                Item::Sunglasses => "Sonnenbrille",
                Item::SunHat => "Sonnenhut",
                Item::Sunscreen => "Sonnencreme",
                Item::StayIndoors => "möglichst drinnen bleiben",
                Item::RainGear => "Regenjacke oder Regenschirm",
                Item::HeadCovering => "Kopfbedeckung",
                Item::Gloves => "Handschuhe",
                Item::WaterproofShoes => "wasserfeste Schuhe",
                Item::Reflective => "helle oder reflektierende Kleidung",
                Item::Windproof => "winddichte Oberbekleidung",
                Item::Water => "ausreichend Wasser",
            },
        }
    }
}

fn condition_items(condition: Condition) -> &'static [Item] {
    match condition {
        Condition::Storm => &[Item::StayIndoors, Item::RainGear, Item::HeadCovering],
        Condition::Rain => &[Item::RainGear, Item::HeadCovering],
        Condition::Snow => &[Item::Gloves, Item::HeadCovering, Item::WaterproofShoes],
        Condition::Fog => &[Item::Reflective],
        Condition::Clear | Condition::Clouds => &[],
    }
}

fn condition_note(condition: Condition, language: Language) -> Option<&'static str> {
    match (condition, language) {
        (Condition::Storm, Language::En) => Some("storm warning"),
        (Condition::Rain, Language::En) => Some("rain expected"),
        (Condition::Snow, Language::En) => Some("snow expected"),
        (Condition::Fog, Language::En) => Some("poor visibility"),
        (Condition::Storm, Language::De) => Some("Unwetterwarnung"),
        (Condition::Rain, Language::De) => Some("Regen erwartet"),
        (Condition::Snow, Language::De) => Some("Schnee erwartet"),
        (Condition::Fog, Language::De) => Some("schlechte Sicht"),
        (Condition::Clear | Condition::Clouds, _) => None,
    }
}

fn validate(observation: &WeatherObservation) -> Result<(), ValidationError> {
    if !(0.0..=100.0).contains(&observation.humidity) {
        return Err(ValidationError::Humidity(observation.humidity));
    }
    if !observation.temperature.is_finite() {
        return Err(ValidationError::Temperature(observation.temperature));
    }
    if !observation.wind_speed.is_finite() || observation.wind_speed < 0.0 {
        return Err(ValidationError::WindSpeed(observation.wind_speed));
    }
    Ok(())
}

/// Map an observation to advice.
///
/// Temperature and wind speed are read in `options.units`. Identical input
/// always produces identical output.
pub fn evaluate(
    observation: &WeatherObservation,
    options: &DisplayOptions,
) -> Result<Advisory, ValidationError> {
    validate(observation)?;

    let celsius = options.units.to_celsius(observation.temperature);
    let wind_ms = options.units.to_meters_per_second(observation.wind_speed);
    let band = TemperatureBand::classify(celsius);
    let high_wind = wind_ms > HIGH_WIND_MS;
    let condition = observation.condition;

    let base = band.base_items();
    let base = match options.verbosity {
        Verbosity::Brief => &base[..1],
        Verbosity::Detailed => base,
    };

    let mut items: Vec<Item> = base.to_vec();
    items.extend_from_slice(condition_items(condition));
    if high_wind {
        items.push(Item::Windproof);
    }
    if matches!(band, TemperatureBand::Warm | TemperatureBand::Hot)
        && observation.humidity >= HUMID_FROM_PERCENT
    {
        items.push(Item::Water);
    }

    let mut details: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let text = item.text(options.language);
        if !details.iter().any(|d| d == text) {
            details.push(text.to_string());
        }
    }

    let severity = if condition == Condition::Storm || band.is_extreme() {
        Severity::Warning
    } else if condition.is_precipitation() || condition == Condition::Fog || high_wind {
        Severity::Caution
    } else {
        Severity::Normal
    };

    let headline = match condition_note(condition, options.language) {
        Some(note) => format!("{} - {note}", band.headline(options.language)),
        None => band.headline(options.language).to_string(),
    };

    Ok(Advisory {
        headline,
        details,
        severity,
        band,
    })
}
