//! Seeded synthetic sample streams.
//!
//! [`SyntheticUser`] emits one [`Sample`] per minute with plausible shapes:
//! a circadian heart-rate/HRV swing with occasional activity spikes, daytime
//! screen and calendar load, sleep debt that builds while awake and is repaid
//! overnight, and a per-day weather regime (storm days drop pressure and
//! temperature). Streams are reproducible for a given seed.

use crate::core::features::MINUTES_PER_DAY;
use crate::core::sample::Sample;
use chrono::{DateTime, Duration, Timelike, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use statrs::distribution::Normal;

/// Upper bound on accumulated sleep debt (hours).
const MAX_SLEEP_DEBT: f64 = 6.0;

const STORM_DAY_PROBABILITY: f64 = 0.18;
const ACTIVITY_SPIKE_PROBABILITY: f64 = 0.05;

/// Stable per-user traits.
#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub resting_hr: f64,
    pub resting_hrv: f64,
    /// Probability of screen use in a daytime minute
    pub screen_intensity: f64,
    pub calendar_intensity: f64,
    pub base_temperature: f64,
}

impl UserProfile {
    fn draw(rng: &mut StdRng) -> Self {
        Self {
            resting_hr: gaussian(rng, 68.0, 4.0),
            resting_hrv: gaussian(rng, 75.0, 10.0),
            screen_intensity: rng.gen_range(0.4..0.9),
            calendar_intensity: rng.gen_range(0.3..0.8),
            base_temperature: gaussian(rng, 18.0, 4.0),
        }
    }
}

#[derive(Debug, Clone)]
struct DayRegime {
    day: i64,
    storm_intensity: f64,
    cloud_cover: f64,
    temperature_shift: f64,
}

impl DayRegime {
    fn draw(day: i64, rng: &mut StdRng) -> Self {
        let storm = rng.gen_bool(STORM_DAY_PROBABILITY);
        let storm_intensity = if storm { rng.gen_range(4.0..12.0) } else { 0.0 };
        let cloud_factor = if storm { 0.6 } else { 1.0 };
        Self {
            day,
            storm_intensity,
            cloud_cover: rng.gen_range(0.2..0.9) * cloud_factor,
            temperature_shift: gaussian(rng, 0.0, 1.5),
        }
    }

    fn is_storm(&self) -> bool {
        self.storm_intensity > 0.0
    }
}

/// Minute-cadence sample generator for one user.
#[derive(Debug, Clone)]
pub struct SyntheticUser {
    user_id: String,
    profile: UserProfile,
    rng: StdRng,
    next_timestamp: DateTime<Utc>,
    sleep_debt: f64,
    regime: Option<DayRegime>,
}

impl SyntheticUser {
    /// Create a generator whose first sample is stamped `start`.
    pub fn new(user_id: impl Into<String>, seed: u64, start: DateTime<Utc>) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let profile = UserProfile::draw(&mut rng);
        let sleep_debt = rng.gen_range(0.0..1.0);
        Self {
            user_id: user_id.into(),
            profile,
            rng,
            next_timestamp: start,
            sleep_debt,
            regime: None,
        }
    }

    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }

    /// Generate the next `count` samples.
    pub fn take_samples(&mut self, count: usize) -> Vec<Sample> {
        (0..count).map(|_| self.next_sample()).collect()
    }

    /// Generate one sample and advance the clock by a minute.
    pub fn next_sample(&mut self) -> Sample {
        let timestamp = self.next_timestamp;
        self.next_timestamp = timestamp + Duration::minutes(1);

        let minute = (timestamp.hour() * 60 + timestamp.minute()) as f64;
        let day_fraction = minute / MINUTES_PER_DAY as f64;
        let day = timestamp.timestamp().div_euclid(86_400);
        let regime = self.regime_for(day);

        let tau = std::f64::consts::TAU;
        let circadian = (tau * day_fraction).sin();
        let daytime = day_fraction > 0.25 && day_fraction < 0.92;
        let asleep = day_fraction < 0.25;

        let spike = self.rng.gen_bool(ACTIVITY_SPIKE_PROBABILITY);
        let (hr_spike, hrv_dip) = if spike {
            (self.rng.gen_range(10.0..25.0), self.rng.gen_range(5.0..15.0))
        } else {
            (0.0, 0.0)
        };
        let heart_rate =
            self.profile.resting_hr + 8.0 * circadian + gaussian(&mut self.rng, 0.0, 3.0) + hr_spike;
        let hrv = (self.profile.resting_hrv - 12.0 * circadian + gaussian(&mut self.rng, 0.0, 4.0)
            - hrv_dip)
            .max(5.0);

        let screen_chance = self.profile.screen_intensity * if daytime { 1.0 } else { 0.4 };
        let screen_time_minutes = if self.rng.gen_bool(screen_chance.clamp(0.0, 1.0)) {
            self.rng.gen_range(0.0..3.0)
        } else {
            0.0
        };

        let calendar_rate = self.profile.calendar_intensity * if daytime { 2.0 } else { 0.4 };
        let calendar_load = (0..4)
            .filter(|_| self.rng.gen_bool((calendar_rate / 4.0).clamp(0.0, 1.0)))
            .count() as f64;

        if asleep {
            self.sleep_debt = (self.sleep_debt - self.rng.gen_range(0.02..0.05)).max(0.0);
        } else {
            let accrual = self.rng.gen_range(0.005..0.02) * (1.0 + screen_time_minutes / 2.0);
            self.sleep_debt = (self.sleep_debt + accrual).min(MAX_SLEEP_DEBT);
        }

        let solar_wave = (tau * (day_fraction - 0.25)).sin().max(0.0);
        let temperature_c = self.profile.base_temperature
            + 7.0 * (tau * (day_fraction - 0.2)).sin()
            + regime.temperature_shift
            - 0.4 * regime.storm_intensity
            + gaussian(&mut self.rng, 0.0, 1.2);
        let barometric_pressure_hpa = 1013.0 + gaussian(&mut self.rng, 0.0, 3.0)
            - regime.storm_intensity
            - 1.5 * solar_wave;
        let solar_pressure_index = (solar_wave * (1.0 - regime.cloud_cover)).clamp(0.0, 1.0);
        let uv_index =
            (solar_pressure_index * 11.0 + gaussian(&mut self.rng, 0.0, 0.5)).clamp(0.0, 11.0);

        let mut ambient_noise_db = 38.0
            + if day_fraction > 0.2 && day_fraction < 0.9 { 12.0 } else { 0.0 }
            + 3.0 * self.rng.gen_range(0.0..1.0)
            + gaussian(&mut self.rng, 0.0, 2.0);
        if day_fraction > 0.5 {
            ambient_noise_db += self.rng.gen_range(0.0..6.0);
        }

        let environment_risk = 0.6 * ((1015.0 - barometric_pressure_hpa) / 20.0).clamp(0.0, 1.0)
            + 0.4 * ((ambient_noise_db - 60.0) / 25.0).clamp(0.0, 1.0);
        let trigger_score = 0.3 * ((self.profile.resting_hrv - hrv) / 25.0).clamp(0.0, 1.0)
            + 0.25 * (self.sleep_debt / 4.0).clamp(0.0, 1.0)
            + 0.2 * (screen_time_minutes / 3.0).clamp(0.0, 1.0)
            + 0.25 * environment_risk;
        let migraine_probability = (0.0004
            + trigger_score * 0.2
            + calendar_load * 0.0005
            + environment_risk * 0.1)
            .clamp(0.0, 0.55);

        let weather_condition = if regime.is_storm() {
            "storm"
        } else if solar_pressure_index > 0.7 && regime.cloud_cover < 0.4 {
            "sunny"
        } else if regime.cloud_cover > 0.65 {
            "cloudy"
        } else {
            "clear"
        };

        Sample {
            user_id: self.user_id.clone(),
            timestamp,
            heart_rate,
            hrv,
            sleep_debt_hours: self.sleep_debt,
            screen_time_minutes,
            calendar_load,
            temperature_c,
            barometric_pressure_hpa,
            solar_pressure_index,
            uv_index,
            ambient_noise_db,
            trigger_score,
            migraine_probability,
            weather_condition: weather_condition.to_string(),
        }
    }

    fn regime_for(&mut self, day: i64) -> DayRegime {
        match &self.regime {
            Some(regime) if regime.day == day => regime.clone(),
            _ => {
                let regime = DayRegime::draw(day, &mut self.rng);
                self.regime = Some(regime.clone());
                regime
            }
        }
    }
}

impl Iterator for SyntheticUser {
    type Item = Sample;

    fn next(&mut self) -> Option<Sample> {
        Some(self.next_sample())
    }
}

fn gaussian(rng: &mut StdRng, mean: f64, std_dev: f64) -> f64 {
    match Normal::new(mean, std_dev) {
        Ok(normal) => rng.sample(normal),
        Err(_) => mean,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 22, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_same_seed_same_stream() {
        let a = SyntheticUser::new("user_001", 42, start()).take_samples(120);
        let b = SyntheticUser::new("user_001", 42, start()).take_samples(120);
        assert_eq!(a, b);

        let c = SyntheticUser::new("user_001", 43, start()).take_samples(120);
        assert_ne!(a, c);
    }

    #[test]
    fn test_minute_cadence() {
        let samples = SyntheticUser::new("user_001", 7, start()).take_samples(10);
        for pair in samples.windows(2) {
            assert_eq!(pair[1].timestamp - pair[0].timestamp, Duration::minutes(1));
        }
        assert!(samples.iter().all(|s| s.user_id == "user_001"));
    }

    #[test]
    fn test_readings_in_range() {
        let samples: Vec<Sample> = SyntheticUser::new("user_002", 9, start())
            .take(2 * MINUTES_PER_DAY)
            .collect();

        for sample in &samples {
            assert!(sample.non_finite_signals().is_empty());
            assert!((0.0..=MAX_SLEEP_DEBT).contains(&sample.sleep_debt_hours));
            assert!((0.0..=11.0).contains(&sample.uv_index));
            assert!((0.0..=0.55).contains(&sample.migraine_probability));
            assert!((0.0..3.0).contains(&sample.screen_time_minutes));
        }
        assert!(samples.iter().any(|s| s.screen_time_minutes > 0.0));
    }

    #[test]
    fn test_sleep_debt_repaid_overnight() {
        let mut user = SyntheticUser::new("user_003", 11, start());
        // Awake until 22:00
        let evening = user.take_samples(22 * 60).last().unwrap().sleep_debt_hours;
        // Through the small hours of the next day
        let night = user.take_samples(2 * 60 + 6 * 60).last().unwrap().sleep_debt_hours;
        assert!(night < evening);
    }
}
