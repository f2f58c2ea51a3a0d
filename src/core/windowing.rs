//! Bounded per-user sample history.
//!
//! Samples are kept in arrival order in a fixed-capacity ring buffer. When an
//! append overflows the capacity the oldest sample is evicted, so memory per
//! user never exceeds `capacity` samples.

use crate::core::sample::Sample;
use std::collections::VecDeque;
use std::sync::Arc;

/// A bounded, arrival-ordered buffer of samples for one user.
#[derive(Debug, Clone)]
pub struct EventWindow {
    /// Stored samples, oldest first
    samples: VecDeque<Sample>,
    /// Maximum number of retained samples
    capacity: usize,
}

impl EventWindow {
    /// Create an empty window holding at most `capacity` samples.
    ///
    /// A zero capacity is raised to one so the latest sample is always kept.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest entry on overflow.
    pub fn append(&mut self, sample: Sample) {
        self.samples.push_back(sample);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    /// Immutable copy of the current contents, oldest first.
    ///
    /// The snapshot is detached from the live buffer; later appends are not
    /// visible through it.
    pub fn snapshot(&self) -> Arc<[Sample]> {
        self.samples.iter().cloned().collect()
    }

    /// Drop every stored sample, keeping the capacity.
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Number of stored samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the window has any samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Maximum number of retained samples.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recently appended sample.
    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn make_sample(minute: i64) -> Sample {
        Sample {
            user_id: "user_001".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 22, 10, 0, 0).unwrap()
                + Duration::minutes(minute),
            heart_rate: 60.0 + minute as f64,
            hrv: 70.0,
            sleep_debt_hours: 0.0,
            screen_time_minutes: 0.0,
            calendar_load: 0.0,
            temperature_c: 18.0,
            barometric_pressure_hpa: 1013.0,
            solar_pressure_index: 0.0,
            uv_index: 0.0,
            ambient_noise_db: 40.0,
            trigger_score: 0.0,
            migraine_probability: 0.0,
            weather_condition: "clear".to_string(),
        }
    }

    #[test]
    fn test_window_creation() {
        let window = EventWindow::new(10);
        assert!(window.is_empty());
        assert_eq!(window.capacity(), 10);
        assert!(window.latest().is_none());
    }

    #[test]
    fn test_zero_capacity_keeps_latest() {
        let mut window = EventWindow::new(0);
        window.append(make_sample(0));
        window.append(make_sample(1));
        assert_eq!(window.len(), 1);
        assert_eq!(window.latest().unwrap().heart_rate, 61.0);
    }

    #[test]
    fn test_length_tracks_min_of_total_and_capacity() {
        let capacity = 7;
        let mut window = EventWindow::new(capacity);
        for n in 1..=20 {
            window.append(make_sample(n));
            assert_eq!(window.len(), (n as usize).min(capacity));
        }
    }

    #[test]
    fn test_eviction_keeps_most_recent_in_arrival_order() {
        let mut window = EventWindow::new(5);
        for n in 1..=8 {
            window.append(make_sample(n));
        }

        let snapshot = window.snapshot();
        let kept: Vec<f64> = snapshot.iter().map(|s| s.heart_rate).collect();
        assert_eq!(kept, vec![64.0, 65.0, 66.0, 67.0, 68.0]);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut window = EventWindow::new(3);
        window.append(make_sample(1));
        let snapshot = window.snapshot();

        window.append(make_sample(2));
        window.clear();

        assert_eq!(snapshot.len(), 1);
        assert!(window.is_empty());
        assert_eq!(window.capacity(), 3);
    }
}
