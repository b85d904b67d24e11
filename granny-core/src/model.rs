use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Raised when a string does not name a member of one of the domain enums.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown {kind} '{value}'. Expected one of: {expected}.")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
    pub expected: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WeatherCondition {
    Sunny,
    Rainy,
    Cloudy,
    Windy,
    Snowy,
    Unknown,
}

impl WeatherCondition {
    pub const fn all() -> &'static [WeatherCondition] {
        &[
            WeatherCondition::Sunny,
            WeatherCondition::Rainy,
            WeatherCondition::Cloudy,
            WeatherCondition::Windy,
            WeatherCondition::Snowy,
            WeatherCondition::Unknown,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WeatherCondition::Sunny => "SUNNY",
            WeatherCondition::Rainy => "RAINY",
            WeatherCondition::Cloudy => "CLOUDY",
            WeatherCondition::Windy => "WINDY",
            WeatherCondition::Snowy => "SNOWY",
            WeatherCondition::Unknown => "UNKNOWN",
        }
    }

    /// Classify free-form provider text such as "Patchy light rain" or "Overcast".
    ///
    /// Rain wins over everything else, so "Sunny with rain showers" is rainy.
    pub fn from_description(text: &str) -> Self {
        let normalized = text.to_lowercase();
        let has = |needle: &str| normalized.contains(needle);

        if has("rain") {
            WeatherCondition::Rainy
        } else if has("sun") || has("clear") {
            WeatherCondition::Sunny
        } else if has("cloud") || has("overcast") {
            WeatherCondition::Cloudy
        } else if has("snow") || has("sleet") {
            WeatherCondition::Snowy
        } else if has("wind") {
            WeatherCondition::Windy
        } else {
            WeatherCondition::Unknown
        }
    }
}

impl fmt::Display for WeatherCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WeatherCondition {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WeatherCondition::all()
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseEnumError {
                kind: "weather condition",
                value: s.to_string(),
                expected: "sunny, rainy, cloudy, windy, snowy, unknown",
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdviceTone {
    Playful,
    Concerned,
    #[default]
    Caring,
}

impl AdviceTone {
    pub const fn all() -> &'static [AdviceTone] {
        &[AdviceTone::Playful, AdviceTone::Concerned, AdviceTone::Caring]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AdviceTone::Playful => "PLAYFUL",
            AdviceTone::Concerned => "CONCERNED",
            AdviceTone::Caring => "CARING",
        }
    }
}

impl fmt::Display for AdviceTone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdviceTone {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AdviceTone::all()
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseEnumError {
                kind: "advice tone",
                value: s.to_string(),
                expected: "playful, concerned, caring",
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemperatureUnit::Celsius => "CELSIUS",
            TemperatureUnit::Fahrenheit => "FAHRENHEIT",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            TemperatureUnit::Celsius => "°C",
            TemperatureUnit::Fahrenheit => "°F",
        }
    }

    /// Convert an absolute Celsius reading into this unit.
    pub fn convert_celsius(&self, celsius: f64) -> f64 {
        match self {
            TemperatureUnit::Celsius => celsius,
            TemperatureUnit::Fahrenheit => celsius * 9.0 / 5.0 + 32.0,
        }
    }

    /// Convert a Celsius difference into this unit (no offset).
    pub fn convert_celsius_delta(&self, delta: f64) -> f64 {
        match self {
            TemperatureUnit::Celsius => delta,
            TemperatureUnit::Fahrenheit => delta * 9.0 / 5.0,
        }
    }
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemperatureUnit {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "celsius" | "c" => Ok(TemperatureUnit::Celsius),
            "fahrenheit" | "f" => Ok(TemperatureUnit::Fahrenheit),
            _ => Err(ParseEnumError {
                kind: "temperature unit",
                value: s.to_string(),
                expected: "celsius, fahrenheit",
            }),
        }
    }
}

/// Where to ask the provider for weather.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationQuery {
    /// Let the provider resolve the caller's location (e.g. by IP).
    Automatic,
    Manual(String),
}

impl fmt::Display for LocationQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationQuery::Automatic => f.write_str("automatic"),
            LocationQuery::Manual(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub location: String,
    pub temperature_celsius: f64,
    pub condition: WeatherCondition,
    pub description: String,
    pub observed_at: DateTime<Utc>,
}

impl WeatherSnapshot {
    pub const FALLBACK_TEMPERATURE_C: f64 = 22.0;
    pub const FALLBACK_DESCRIPTION: &'static str = "Mock data (API unavailable)";

    /// Stand-in reading used when the provider cannot be reached.
    pub fn fallback(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            temperature_celsius: Self::FALLBACK_TEMPERATURE_C,
            condition: WeatherCondition::Cloudy,
            description: Self::FALLBACK_DESCRIPTION.to_string(),
            observed_at: Utc::now(),
        }
    }
}

/// Today's reading against the stored baseline. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureComparison {
    pub today: f64,
    pub yesterday: f64,
    pub delta: f64,
}

impl TemperatureComparison {
    /// Re-express a Celsius comparison in `unit`.
    pub fn in_unit(&self, unit: TemperatureUnit) -> Self {
        Self {
            today: unit.convert_celsius(self.today),
            yesterday: unit.convert_celsius(self.yesterday),
            delta: unit.convert_celsius_delta(self.delta),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    pub language: String,
    pub notification_hour: u32,
    pub notification_minute: u32,
    pub advice_tone: AdviceTone,
    pub voice_notifications: bool,
    pub temperature_unit: TemperatureUnit,
    pub threshold_delta: u32,
    pub granny_avatar: String,
    pub background_theme: String,
    pub automatic_location: bool,
    pub manual_location: String,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            language: "English".to_string(),
            notification_hour: 7,
            notification_minute: 30,
            advice_tone: AdviceTone::Caring,
            voice_notifications: false,
            temperature_unit: TemperatureUnit::Celsius,
            threshold_delta: 2,
            granny_avatar: "classic".to_string(),
            background_theme: "auto".to_string(),
            automatic_location: true,
            manual_location: "Istanbul".to_string(),
        }
    }
}

impl UserSettings {
    pub fn location_query(&self) -> LocationQuery {
        if self.automatic_location {
            LocationQuery::Automatic
        } else {
            LocationQuery::Manual(self.manual_location.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_from_description_follows_keyword_order() {
        assert_eq!(WeatherCondition::from_description("Patchy light rain"), WeatherCondition::Rainy);
        assert_eq!(WeatherCondition::from_description("Sunny"), WeatherCondition::Sunny);
        assert_eq!(WeatherCondition::from_description("clear sky"), WeatherCondition::Sunny);
        assert_eq!(WeatherCondition::from_description("Overcast"), WeatherCondition::Cloudy);
        assert_eq!(WeatherCondition::from_description("broken clouds"), WeatherCondition::Cloudy);
        assert_eq!(WeatherCondition::from_description("Light sleet"), WeatherCondition::Snowy);
        assert_eq!(WeatherCondition::from_description("Windy"), WeatherCondition::Windy);
        assert_eq!(WeatherCondition::from_description("Mist"), WeatherCondition::Unknown);
        // rain is checked first
        assert_eq!(
            WeatherCondition::from_description("Sunny intervals with rain"),
            WeatherCondition::Rainy
        );
    }

    #[test]
    fn enums_parse_case_insensitively() {
        assert_eq!("caring".parse::<AdviceTone>(), Ok(AdviceTone::Caring));
        assert_eq!("PLAYFUL".parse::<AdviceTone>(), Ok(AdviceTone::Playful));
        assert_eq!("Snowy".parse::<WeatherCondition>(), Ok(WeatherCondition::Snowy));
        assert_eq!("f".parse::<TemperatureUnit>(), Ok(TemperatureUnit::Fahrenheit));
    }

    #[test]
    fn garbage_enum_values_are_rejected_at_parse() {
        let err = "grumpy".parse::<AdviceTone>().unwrap_err();
        assert_eq!(err.kind, "advice tone");
        assert!(err.to_string().contains("Unknown advice tone 'grumpy'"));

        assert!("hail".parse::<WeatherCondition>().is_err());
        assert!("kelvin".parse::<TemperatureUnit>().is_err());
    }

    #[test]
    fn comparison_converts_to_fahrenheit() {
        let c = TemperatureComparison { today: 25.0, yesterday: 20.0, delta: 5.0 };
        let f = c.in_unit(TemperatureUnit::Fahrenheit);

        assert_eq!(f.today, 77.0);
        assert_eq!(f.yesterday, 68.0);
        assert_eq!(f.delta, 9.0);
        assert_eq!(c.in_unit(TemperatureUnit::Celsius), c);
    }

    #[test]
    fn location_query_follows_settings() {
        let mut settings = UserSettings::default();
        assert_eq!(settings.location_query(), LocationQuery::Automatic);

        settings.automatic_location = false;
        settings.manual_location = "Izmir".into();
        assert_eq!(settings.location_query(), LocationQuery::Manual("Izmir".into()));
    }

    #[test]
    fn fallback_snapshot_is_cloudy_mock() {
        let snap = WeatherSnapshot::fallback("Istanbul");
        assert_eq!(snap.location, "Istanbul");
        assert_eq!(snap.temperature_celsius, 22.0);
        assert_eq!(snap.condition, WeatherCondition::Cloudy);
        assert_eq!(snap.description, "Mock data (API unavailable)");
    }
}
