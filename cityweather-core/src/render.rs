//! Human and machine readable output for a [`WeatherReport`].

use std::str::FromStr;

use anyhow::anyhow;

use crate::model::WeatherReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(anyhow!("Unknown output format '{value}'. Supported formats: text, json.")),
        }
    }
}

/// Upper-case the first character, lower-case the rest: `"lonDon"` -> `"London"`.
pub fn display_city_name(city: &str) -> String {
    let mut chars = city.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Four-line summary, newline terminated.
pub fn render_text(report: &WeatherReport) -> String {
    let w = &report.weather;
    format!(
        "Current weather for {} - {}, {:.2}°C\n\
         Feels like: {:.2}°C\n\
         Humidity: {}%\n\
         Wind Speed: {:.2} m/s\n",
        report.city, w.condition, w.temperature_c, w.feels_like_c, w.humidity_pct, w.wind_speed_mps,
    )
}

/// Single JSON line, newline terminated.
pub fn render_json(report: &WeatherReport) -> serde_json::Result<String> {
    let mut line = serde_json::to_string(report)?;
    line.push('\n');
    Ok(line)
}

pub fn render(report: &WeatherReport, format: OutputFormat) -> serde_json::Result<String> {
    match format {
        OutputFormat::Text => Ok(render_text(report)),
        OutputFormat::Json => render_json(report),
    }
}
