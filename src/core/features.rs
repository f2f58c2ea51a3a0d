//! Feature computation from event windows.
//!
//! The pipeline turns a user's sample history into a per-sample feature
//! table and reads the model-ready [`FeatureVector`] off its most recent row.
//! Stages run in a fixed order, each adding columns:
//!
//! 1. time features (minute of day, circadian phase, weekend, work hours)
//! 2. context flags (screen/calendar load, pressure, noise, UV, storm)
//! 3. rolling statistics over trailing sample counts
//! 4. circadian deltas against the same minute one day earlier
//! 5. extraction onto the model's ordered feature list
//!
//! Rolling windows and circadian lags are sample counts, not wall-clock
//! durations; producers are expected to sample at a near-uniform one-minute
//! cadence.

use crate::core::sample::{Sample, Signal};
use chrono::{DateTime, Datelike, Timelike, Utc};
use chrono_tz::Tz;
use statrs::statistics::Statistics;
use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::sync::Arc;

/// Samples in one day at the assumed per-minute cadence.
pub const MINUTES_PER_DAY: usize = 24 * 60;

/// First and last local hour (inclusive) counted as work hours.
pub const WORK_HOURS: (u32, u32) = (9, 18);

/// Screen minutes per sample above which screen load is high.
const HIGH_SCREEN_LOAD_MINUTES: f64 = 2.0;

/// Calendar load at or above which the calendar is heavy.
const HEAVY_CALENDAR_LOAD: f64 = 3.0;

/// Pressure below which a low-pressure system is flagged (hPa).
const LOW_PRESSURE_HPA: f64 = 1005.0;

/// Ambient noise above which noise is flagged (dB).
const HIGH_NOISE_DB: f64 = 70.0;

/// UV index above which a UV alert is raised.
const UV_ALERT_INDEX: f64 = 8.0;

/// Rolling aggregation applied over a trailing window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    Mean,
    /// Population standard deviation
    StdDev,
    Sum,
    Max,
}

impl Aggregation {
    /// Short name used in feature column names.
    pub fn name(self) -> &'static str {
        match self {
            Aggregation::Mean => "mean",
            Aggregation::StdDev => "std",
            Aggregation::Sum => "sum",
            Aggregation::Max => "max",
        }
    }

    /// Aggregate a non-empty slice of finite observations.
    fn apply(self, values: &[f64]) -> f64 {
        match self {
            Aggregation::Mean => values.iter().mean(),
            Aggregation::StdDev => values.iter().population_std_dev(),
            Aggregation::Sum => values.iter().sum(),
            Aggregation::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

/// A signal aggregated over several trailing window lengths.
#[derive(Debug, Clone, Copy)]
pub struct RollingSpec {
    pub signal: Signal,
    /// Window lengths in samples
    pub windows: &'static [usize],
    pub aggregation: Aggregation,
}

impl RollingSpec {
    /// Column name for one window length, e.g. `heart_rate_mean_15m`.
    pub fn column_name(&self, window: usize) -> String {
        format!(
            "{}_{}_{}m",
            self.signal.name(),
            self.aggregation.name(),
            window
        )
    }
}

/// Rolling statistics computed by the pipeline.
pub const ROLLING_FEATURES: &[RollingSpec] = &[
    RollingSpec {
        signal: Signal::HeartRate,
        windows: &[15, 60, 180],
        aggregation: Aggregation::Mean,
    },
    RollingSpec {
        signal: Signal::HeartRate,
        windows: &[60, 240],
        aggregation: Aggregation::StdDev,
    },
    RollingSpec {
        signal: Signal::Hrv,
        windows: &[15, 60, 180],
        aggregation: Aggregation::Mean,
    },
    RollingSpec {
        signal: Signal::Hrv,
        windows: &[60, 240],
        aggregation: Aggregation::StdDev,
    },
    RollingSpec {
        signal: Signal::SleepDebtHours,
        windows: &[60, 360],
        aggregation: Aggregation::Max,
    },
    RollingSpec {
        signal: Signal::ScreenTimeMinutes,
        windows: &[30, 120],
        aggregation: Aggregation::Sum,
    },
    RollingSpec {
        signal: Signal::AmbientNoiseDb,
        windows: &[30, 120],
        aggregation: Aggregation::Mean,
    },
    RollingSpec {
        signal: Signal::BarometricPressureHpa,
        windows: &[180, 360],
        aggregation: Aggregation::Mean,
    },
];

/// Signals that receive a day-over-day delta column.
pub const CIRCADIAN_SIGNALS: &[Signal] = &[
    Signal::HeartRate,
    Signal::Hrv,
    Signal::ScreenTimeMinutes,
    Signal::BarometricPressureHpa,
    Signal::AmbientNoiseDb,
    Signal::TemperatureC,
];

const TIME_COLUMNS: [&str; 5] = [
    "minute_of_day",
    "sin_circadian",
    "cos_circadian",
    "is_weekend",
    "is_work_hours",
];

const CONTEXT_COLUMNS: [&str; 7] = [
    "high_screen_load",
    "heavy_calendar",
    "low_pressure",
    "high_noise",
    "uv_alert",
    "storm_conditions",
    "combined_environment_stress",
];

/// Minimum number of observations before a rolling value is produced.
pub fn min_periods(window: usize) -> usize {
    (window / 4).max(10)
}

/// Column name of the circadian delta for a signal.
pub fn circadian_column(signal: Signal) -> String {
    format!("{}_circadian_delta", signal.name())
}

/// Every column the pipeline can produce, in stage order.
pub fn produced_feature_names() -> Vec<String> {
    let mut names: Vec<String> = Signal::ALL.iter().map(|s| s.name().to_string()).collect();
    names.extend(TIME_COLUMNS.iter().map(|c| c.to_string()));
    names.extend(CONTEXT_COLUMNS.iter().map(|c| c.to_string()));
    for spec in ROLLING_FEATURES {
        names.extend(spec.windows.iter().map(|&w| spec.column_name(w)));
    }
    names.extend(CIRCADIAN_SIGNALS.iter().map(|&s| circadian_column(s)));
    names
}

/// Feature computation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureError {
    /// No samples to compute features from
    EmptyWindow,
}

impl std::fmt::Display for FeatureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureError::EmptyWindow => write!(f, "empty window: no samples to build features from"),
        }
    }
}

impl std::error::Error for FeatureError {}

/// Per-sample feature table, rows sorted ascending by timestamp.
///
/// Undefined values (insufficient history) are stored as NaN.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    timestamps: Vec<DateTime<Utc>>,
    columns: BTreeMap<String, Vec<f64>>,
}

impl FeatureTable {
    fn from_sorted(samples: &[&Sample]) -> Self {
        let mut table = Self {
            timestamps: samples.iter().map(|s| s.timestamp).collect(),
            columns: BTreeMap::new(),
        };
        for signal in Signal::ALL {
            table.insert(
                signal.name(),
                samples.iter().map(|s| s.reading(signal)).collect(),
            );
        }
        table
    }

    fn insert(&mut self, name: impl Into<String>, values: Vec<f64>) {
        debug_assert_eq!(values.len(), self.timestamps.len());
        self.columns.insert(name.into(), values);
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Check if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Row timestamps, ascending.
    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    /// Full column by name.
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    /// Names of all columns present.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Value of a column in the most recent row, if defined.
    pub fn latest(&self, name: &str) -> Option<f64> {
        self.column(name)
            .and_then(|values| values.last().copied())
            .filter(|v| v.is_finite())
    }
}

/// Model-ready feature mapping for the latest sample of a window.
///
/// Keys follow the model's declared order. Entries the pipeline left
/// undefined are zero-filled; [`FeatureVector::observed`] still tells them
/// apart from genuine zeros.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    names: Arc<[String]>,
    values: Vec<f64>,
    defined: Vec<bool>,
}

impl FeatureVector {
    /// Build a vector keyed on `names`, zero-filling absent or NaN lookups.
    pub fn from_lookup(names: Arc<[String]>, lookup: impl Fn(&str) -> Option<f64>) -> Self {
        let mut values = Vec::with_capacity(names.len());
        let mut defined = Vec::with_capacity(names.len());
        for name in names.iter() {
            match lookup(name).filter(|v| v.is_finite()) {
                Some(v) => {
                    values.push(v);
                    defined.push(true);
                }
                None => {
                    values.push(0.0);
                    defined.push(false);
                }
            }
        }
        Self {
            names,
            values,
            defined,
        }
    }

    /// Ordered feature names.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Values in name order, zero-filled.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value handed to the scorer for `name`, including zero-fill.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.position(name).map(|i| self.values[i])
    }

    /// Value for `name` only when the pipeline actually produced it.
    pub fn observed(&self, name: &str) -> Option<f64> {
        self.position(name)
            .filter(|&i| self.defined[i])
            .map(|i| self.values[i])
    }

    /// Iterate `(name, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

/// Turns sample windows into feature vectors for a fixed feature list.
#[derive(Debug, Clone)]
pub struct FeaturePipeline {
    feature_names: Arc<[String]>,
    timezone: Tz,
    circadian_lag: usize,
}

impl FeaturePipeline {
    /// Create a pipeline producing vectors keyed on `feature_names`.
    pub fn new(feature_names: Vec<String>) -> Self {
        Self {
            feature_names: feature_names.into(),
            timezone: Tz::UTC,
            circadian_lag: MINUTES_PER_DAY,
        }
    }

    /// Evaluate time-of-day features in `timezone` instead of UTC.
    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    /// Override the number of samples in one circadian period.
    pub fn with_circadian_lag(mut self, lag: usize) -> Self {
        self.circadian_lag = lag.max(1);
        self
    }

    /// Ordered feature names of produced vectors.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Requested feature names this pipeline never produces.
    pub fn unproduced_features(&self) -> Vec<String> {
        let produced = produced_feature_names();
        self.feature_names
            .iter()
            .filter(|name| !produced.contains(name))
            .cloned()
            .collect()
    }

    /// Compute the full per-sample table for a window.
    pub fn compute_table(&self, samples: &[Sample]) -> Result<FeatureTable, FeatureError> {
        if samples.is_empty() {
            return Err(FeatureError::EmptyWindow);
        }

        // Rows must be in timestamp order regardless of arrival order
        let mut sorted: Vec<&Sample> = samples.iter().collect();
        sorted.sort_by_key(|s| s.timestamp);

        let mut table = FeatureTable::from_sorted(&sorted);
        add_time_features(&mut table, &sorted, self.timezone);
        add_context_flags(&mut table, &sorted);
        for spec in ROLLING_FEATURES {
            add_rolling_features(&mut table, spec);
        }
        add_circadian_deltas(&mut table, CIRCADIAN_SIGNALS, self.circadian_lag);
        Ok(table)
    }

    /// Compute the feature vector for the most recent sample of a window.
    pub fn compute(&self, samples: &[Sample]) -> Result<FeatureVector, FeatureError> {
        let table = self.compute_table(samples)?;
        Ok(FeatureVector::from_lookup(self.feature_names.clone(), |name| {
            table.latest(name)
        }))
    }
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

fn add_time_features(table: &mut FeatureTable, samples: &[&Sample], timezone: Tz) {
    let local: Vec<_> = samples
        .iter()
        .map(|s| s.timestamp.with_timezone(&timezone))
        .collect();

    let minute_of_day: Vec<f64> = local
        .iter()
        .map(|t| (t.hour() * 60 + t.minute()) as f64)
        .collect();
    let phase: Vec<f64> = minute_of_day
        .iter()
        .map(|m| 2.0 * PI * m / MINUTES_PER_DAY as f64)
        .collect();

    table.insert("sin_circadian", phase.iter().map(|p| p.sin()).collect());
    table.insert("cos_circadian", phase.iter().map(|p| p.cos()).collect());
    table.insert("minute_of_day", minute_of_day);
    table.insert(
        "is_weekend",
        local
            .iter()
            .map(|t| flag(t.weekday().num_days_from_monday() >= 5))
            .collect(),
    );
    table.insert(
        "is_work_hours",
        local
            .iter()
            .map(|t| flag((WORK_HOURS.0..=WORK_HOURS.1).contains(&t.hour())))
            .collect(),
    );
}

fn add_context_flags(table: &mut FeatureTable, samples: &[&Sample]) {
    let low_pressure: Vec<bool> = samples
        .iter()
        .map(|s| s.barometric_pressure_hpa < LOW_PRESSURE_HPA)
        .collect();
    let high_noise: Vec<bool> = samples
        .iter()
        .map(|s| s.ambient_noise_db > HIGH_NOISE_DB)
        .collect();
    let uv_alert: Vec<bool> = samples.iter().map(|s| s.uv_index > UV_ALERT_INDEX).collect();
    let storm: Vec<bool> = samples.iter().map(|s| s.is_storm()).collect();

    let combined: Vec<f64> = (0..samples.len())
        .map(|i| {
            [low_pressure[i], high_noise[i], uv_alert[i], storm[i]]
                .iter()
                .filter(|&&f| f)
                .count() as f64
        })
        .collect();

    table.insert(
        "high_screen_load",
        samples
            .iter()
            .map(|s| flag(s.screen_time_minutes > HIGH_SCREEN_LOAD_MINUTES))
            .collect(),
    );
    table.insert(
        "heavy_calendar",
        samples
            .iter()
            .map(|s| flag(s.calendar_load >= HEAVY_CALENDAR_LOAD))
            .collect(),
    );
    table.insert("low_pressure", low_pressure.into_iter().map(flag).collect());
    table.insert("high_noise", high_noise.into_iter().map(flag).collect());
    table.insert("uv_alert", uv_alert.into_iter().map(flag).collect());
    table.insert("storm_conditions", storm.into_iter().map(flag).collect());
    table.insert("combined_environment_stress", combined);
}

fn add_rolling_features(table: &mut FeatureTable, spec: &RollingSpec) {
    let Some(values) = table.column(spec.signal.name()).map(<[f64]>::to_vec) else {
        return;
    };
    for &window in spec.windows {
        let rolled = rolling(&values, window, spec.aggregation);
        table.insert(spec.column_name(window), rolled);
    }
}

/// Trailing aggregate over at most `window` samples ending at each row.
///
/// Non-finite inputs are skipped and do not count toward the minimum.
fn rolling(values: &[f64], window: usize, aggregation: Aggregation) -> Vec<f64> {
    let floor = min_periods(window);
    let mut observed = Vec::with_capacity(window);

    (0..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            observed.clear();
            observed.extend(values[start..=i].iter().copied().filter(|v| v.is_finite()));
            if observed.len() < floor {
                f64::NAN
            } else {
                aggregation.apply(&observed)
            }
        })
        .collect()
}

fn add_circadian_deltas(table: &mut FeatureTable, signals: &[Signal], lag: usize) {
    for &signal in signals {
        let Some(values) = table.column(signal.name()) else {
            continue;
        };
        let deltas: Vec<f64> = (0..values.len())
            .map(|i| {
                if i >= lag {
                    values[i] - values[i - lag]
                } else {
                    f64::NAN
                }
            })
            .collect();
        table.insert(circadian_column(signal), deltas);
    }
}
