//! Current-weather retrieval
//!
//! The pipeline only sees the [`WeatherFetcher`] trait. The bundled
//! implementation talks to the OpenWeatherMap current-weather endpoint with a
//! blocking `reqwest` client and performs no retries.

use chrono::DateTime;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use crate::config::WeatherConfig;
use crate::error::{ConfigError, FetchError};
use crate::models::{Condition, Location, UnitSystem, WeatherObservation};
use crate::settings::Language;

/// What to fetch
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherRequest {
    pub location: Location,
    /// Units the observation's temperature and wind speed are returned in
    pub units: UnitSystem,
    /// Language of the provider's description text
    pub language: Language,
}

/// Anything that can produce the current observation for a location
pub trait WeatherFetcher {
    fn fetch(&self, request: &WeatherRequest) -> Result<WeatherObservation, FetchError>;
}

impl<F> WeatherFetcher for F
where
    F: Fn(&WeatherRequest) -> Result<WeatherObservation, FetchError>,
{
    fn fetch(&self, request: &WeatherRequest) -> Result<WeatherObservation, FetchError> {
        self(request)
    }
}

/// OpenWeatherMap current-weather client
pub struct OpenWeatherMapClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenWeatherMapClient {
    /// Create a client from the weather section of the application config
    pub fn new(config: &WeatherConfig) -> Result<Self, ConfigError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::invalid("weather.api_key is required to fetch weather"))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.into()))
            .user_agent(concat!("WetterMail/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::invalid(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Request URL without the API key, safe to log
    fn public_url(&self, request: &WeatherRequest) -> String {
        let location = match &request.location {
            Location::Coordinates {
                latitude,
                longitude,
            } => format!("lat={latitude}&lon={longitude}"),
            Location::Place(name) => format!("q={}", urlencoding::encode(name)),
        };
        format!(
            "{}/weather?{}&lang={}",
            self.base_url,
            location,
            request.language.code()
        )
    }

    fn request_url(&self, request: &WeatherRequest) -> String {
        format!(
            "{}&appid={}",
            self.public_url(request),
            urlencoding::encode(&self.api_key)
        )
    }
}

impl WeatherFetcher for OpenWeatherMapClient {
    #[instrument(name = "fetch_weather", skip(self), fields(location = %request.location))]
    fn fetch(&self, request: &WeatherRequest) -> Result<WeatherObservation, FetchError> {
        debug!("OpenWeatherMap request URL: {}", self.public_url(request));
        let start_time = Instant::now();

        let response = self
            .client
            .get(self.request_url(request))
            .send()
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            warn!("Weather provider returned {}", status);
            return Err(status_error(status.as_u16(), &request.location, &body));
        }

        let body: CurrentWeatherResponse = response.json().map_err(transport_error)?;
        let observation = observation_from_response(body, request.units)?;

        info!(
            "Fetched weather in {:.3}s: {} {}",
            start_time.elapsed().as_secs_f64(),
            observation.condition,
            observation.format_temperature(request.units)
        );
        Ok(observation)
    }
}

fn transport_error(error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout
    } else if error.is_decode() {
        FetchError::Provider(format!("Unreadable weather response: {error}"))
    } else {
        FetchError::Network(error.to_string())
    }
}

fn status_error(status: u16, location: &Location, body: &str) -> FetchError {
    let message = serde_json::from_str::<ProviderErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .unwrap_or_else(|| format!("HTTP {status}"));

    match status {
        404 => FetchError::NotFound(location.to_string()),
        401 => FetchError::Provider(format!("API key rejected: {message}")),
        408 | 504 => FetchError::Timeout,
        _ => FetchError::Provider(format!("HTTP {status}: {message}")),
    }
}

fn observation_from_response(
    response: CurrentWeatherResponse,
    units: UnitSystem,
) -> Result<WeatherObservation, FetchError> {
    let group = response
        .weather
        .first()
        .ok_or_else(|| FetchError::Provider("Response has no weather group".to_string()))?;

    let timestamp = DateTime::from_timestamp(response.dt, 0)
        .ok_or_else(|| FetchError::Provider(format!("Invalid timestamp {}", response.dt)))?;

    let wind_ms = response.wind.map_or(0.0, |w| w.speed);

    Ok(WeatherObservation {
        temperature: units.convert_kelvin(response.main.temp),
        condition: Condition::from_provider_group(&group.main),
        wind_speed: units.convert_meters_per_second(wind_ms),
        humidity: response.main.humidity,
        timestamp,
        place_name: response.name.filter(|n| !n.is_empty()),
        description: group.description.clone(),
    })
}

/// OpenWeatherMap `/weather` response (default units: Kelvin, m/s)
#[derive(Debug, Deserialize)]
struct CurrentWeatherResponse {
    name: Option<String>,
    dt: i64,
    weather: Vec<WeatherGroup>,
    main: MainData,
    wind: Option<WindData>,
}

#[derive(Debug, Deserialize)]
struct WeatherGroup {
    main: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MainData {
    temp: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct WindData {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    message: Option<String>,
}
