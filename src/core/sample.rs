//! Biometric and environmental sample types.
//!
//! A [`Sample`] is one observation for one user. Samples are immutable once
//! stored; the ingestion boundary is responsible for normalising timestamps
//! and rejecting non-finite readings before a sample reaches the store.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Weather label that marks storm conditions.
pub const STORM_CONDITION: &str = "storm";

/// Default weather label when the producer omits one.
pub const DEFAULT_WEATHER: &str = "clear";

/// A named numeric reading carried by every sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    HeartRate,
    Hrv,
    SleepDebtHours,
    ScreenTimeMinutes,
    CalendarLoad,
    TemperatureC,
    BarometricPressureHpa,
    SolarPressureIndex,
    UvIndex,
    AmbientNoiseDb,
    TriggerScore,
    MigraineProbability,
}

impl Signal {
    /// Every signal, in column order.
    pub const ALL: [Signal; 12] = [
        Signal::HeartRate,
        Signal::Hrv,
        Signal::SleepDebtHours,
        Signal::ScreenTimeMinutes,
        Signal::CalendarLoad,
        Signal::TemperatureC,
        Signal::BarometricPressureHpa,
        Signal::SolarPressureIndex,
        Signal::UvIndex,
        Signal::AmbientNoiseDb,
        Signal::TriggerScore,
        Signal::MigraineProbability,
    ];

    /// Column name used for this signal in feature tables.
    pub fn name(self) -> &'static str {
        match self {
            Signal::HeartRate => "heart_rate",
            Signal::Hrv => "hrv",
            Signal::SleepDebtHours => "sleep_debt_hours",
            Signal::ScreenTimeMinutes => "screen_time_minutes",
            Signal::CalendarLoad => "calendar_load",
            Signal::TemperatureC => "temperature_c",
            Signal::BarometricPressureHpa => "barometric_pressure_hpa",
            Signal::SolarPressureIndex => "solar_pressure_index",
            Signal::UvIndex => "uv_index",
            Signal::AmbientNoiseDb => "ambient_noise_db",
            Signal::TriggerScore => "trigger_score",
            Signal::MigraineProbability => "migraine_probability",
        }
    }
}

/// One timestamped multi-signal observation for a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Owner of the sample
    pub user_id: String,
    /// Absolute instant of the observation
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Beats per minute
    pub heart_rate: f64,
    /// Heart-rate variability (ms)
    pub hrv: f64,
    /// Accumulated sleep debt in hours
    pub sleep_debt_hours: f64,
    /// Screen minutes within the sampling minute
    pub screen_time_minutes: f64,
    /// Scheduled calendar items in progress
    pub calendar_load: f64,
    pub temperature_c: f64,
    pub barometric_pressure_hpa: f64,
    pub solar_pressure_index: f64,
    pub uv_index: f64,
    pub ambient_noise_db: f64,
    /// Upstream composite trigger score
    pub trigger_score: f64,
    /// Upstream per-minute event probability
    pub migraine_probability: f64,
    /// Categorical weather label ("clear", "cloudy", "storm", ...)
    #[serde(default = "default_weather")]
    pub weather_condition: String,
}

fn default_weather() -> String {
    DEFAULT_WEATHER.to_string()
}

impl Sample {
    /// Read a numeric signal by name.
    pub fn reading(&self, signal: Signal) -> f64 {
        match signal {
            Signal::HeartRate => self.heart_rate,
            Signal::Hrv => self.hrv,
            Signal::SleepDebtHours => self.sleep_debt_hours,
            Signal::ScreenTimeMinutes => self.screen_time_minutes,
            Signal::CalendarLoad => self.calendar_load,
            Signal::TemperatureC => self.temperature_c,
            Signal::BarometricPressureHpa => self.barometric_pressure_hpa,
            Signal::SolarPressureIndex => self.solar_pressure_index,
            Signal::UvIndex => self.uv_index,
            Signal::AmbientNoiseDb => self.ambient_noise_db,
            Signal::TriggerScore => self.trigger_score,
            Signal::MigraineProbability => self.migraine_probability,
        }
    }

    /// Whether the weather label denotes a storm.
    pub fn is_storm(&self) -> bool {
        self.weather_condition.trim().eq_ignore_ascii_case(STORM_CONDITION)
    }

    /// Names of any signals holding NaN or infinite values.
    pub fn non_finite_signals(&self) -> Vec<&'static str> {
        Signal::ALL
            .iter()
            .filter(|s| !self.reading(**s).is_finite())
            .map(|s| s.name())
            .collect()
    }
}

/// Parse an ISO-8601 timestamp into an absolute UTC instant.
///
/// Offsets are honoured; timestamps without an offset are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::<FixedOffset>::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{raw}'")))
}
