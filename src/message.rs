//! Report mail composition

use chrono::{Local, TimeZone};
use std::fmt::{Display, Write as _};

use crate::advisory::Advisory;
use crate::models::WeatherObservation;
use crate::settings::{DisplayOptions, Language};

/// A mail ready for the transport
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedMessage {
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

struct Labels {
    subject_prefix: &'static str,
    subject_date: &'static str,
    severity: &'static str,
    clothing: &'static str,
    observation: &'static str,
    description: &'static str,
    condition: &'static str,
    temperature: &'static str,
    wind: &'static str,
    humidity: &'static str,
    observed_at: &'static str,
}

const EN: Labels = Labels {
    subject_prefix: "Weather report for",
    subject_date: "on",
    severity: "Severity",
    clothing: "Recommended clothing",
    observation: "Observation",
    description: "Description",
    condition: "Condition",
    temperature: "Current temperature",
    wind: "Wind",
    humidity: "Humidity",
    observed_at: "Observed at",
};

const DE: Labels = Labels {
    subject_prefix: "Wetterbericht für",
    subject_date: "am",
    severity: "Einstufung",
    clothing: "Empfohlene Kleidung",
    observation: "Messwerte",
    description: "Beschreibung",
    condition: "Wetterlage",
    temperature: "Aktuelle Temperatur",
    wind: "Wind",
    humidity: "Luftfeuchtigkeit",
    observed_at: "Gemessen um",
};

fn labels(language: Language) -> &'static Labels {
    match language {
        Language::En => &EN,
        Language::De => &DE,
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Build the report mail for one observation, dated in the local time zone.
///
/// `location` is the user's location text, used when the provider did not
/// report a place name.
#[must_use]
pub fn compose(
    location: &str,
    observation: &WeatherObservation,
    advisory: &Advisory,
    options: &DisplayOptions,
) -> ComposedMessage {
    compose_in(location, observation, advisory, options, &Local)
}

/// [`compose`] with the observation time shown in `zone`
#[must_use]
pub fn compose_in<Tz>(
    location: &str,
    observation: &WeatherObservation,
    advisory: &Advisory,
    options: &DisplayOptions,
    zone: &Tz,
) -> ComposedMessage
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let l = labels(options.language);
    let local_time = observation.timestamp.with_timezone(zone);
    let place = observation
        .place_name
        .as_deref()
        .unwrap_or(location)
        .trim();

    let subject = format!(
        "{} {} {} {}",
        l.subject_prefix,
        place,
        l.subject_date,
        local_time.format("%d.%m.%y")
    );

    let rows: Vec<(&str, String)> = vec![
        (
            l.description,
            observation
                .description
                .clone()
                .unwrap_or_else(|| observation.condition.to_string()),
        ),
        (l.condition, observation.condition.to_string()),
        (l.temperature, observation.format_temperature(options.units)),
        (l.wind, observation.format_wind(options.units)),
        (l.humidity, observation.format_humidity()),
        (
            l.observed_at,
            local_time.format("%d.%m.%Y %H:%M").to_string(),
        ),
    ];
    let severity = advisory.severity.label(options.language);

    let mut text_body = String::new();
    let _ = writeln!(text_body, "{subject}\n");
    let _ = writeln!(text_body, "{}", advisory.headline);
    let _ = writeln!(text_body, "{}: {severity}\n", l.severity);
    let _ = writeln!(text_body, "{}:", l.clothing);
    for item in &advisory.details {
        let _ = writeln!(text_body, "- {item}");
    }
    let _ = writeln!(text_body, "\n{}:", l.observation);
    for (label, value) in &rows {
        let _ = writeln!(text_body, "{label}: {value}");
    }

    let mut html_body = String::new();
    html_body.push_str(concat!(
        "<html>\n<head>\n<style>\n",
        "body { font-family: Arial, sans-serif; }\n",
        "table { width: 100%; border-collapse: collapse; }\n",
        "th, td { border: 1px solid #ddd; padding: 8px; text-align: left; }\n",
        "th { background-color: #f2f2f2; }\n",
        "</style>\n</head>\n<body>\n",
    ));
    let _ = writeln!(html_body, "<h2>{}</h2>", escape_html(&subject));
    let _ = writeln!(
        html_body,
        "<h3>{}</h3>\n<p>{}: {}</p>",
        escape_html(&advisory.headline),
        l.severity,
        escape_html(severity)
    );
    html_body.push_str("<table>\n");
    for (label, value) in &rows {
        let _ = writeln!(
            html_body,
            "<tr><th>{}</th><td>{}</td></tr>",
            escape_html(label),
            escape_html(value)
        );
    }
    let _ = writeln!(
        html_body,
        "<tr><th>{}</th><td>{}</td></tr>",
        l.clothing,
        escape_html(&advisory.details.join(", "))
    );
    html_body.push_str("</table>\n</body>\n</html>\n");

    ComposedMessage {
        subject,
        text_body,
        html_body,
    }
}
