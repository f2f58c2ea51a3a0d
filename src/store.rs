//! Process-scoped tracking state shared by ingestion and refresh.
//!
//! [`StoreCoordinator`] owns every user's [`EventWindow`] and the
//! [`PredictionCache`]. All mutation (append, feature recompute, cache
//! commit) runs inside one exclusive async section, so ingest-triggered
//! updates and scheduled refreshes are linearized in the order they acquire
//! it. Cache reads bypass that section and return the last committed entry.
//! Concurrent ingests for different users contend on the same section.

use crate::core::coach;
use crate::core::features::FeaturePipeline;
use crate::core::prediction::{CacheEntry, PredictionCache};
use crate::core::sample::Sample;
use crate::core::windowing::EventWindow;
use crate::scorer::{Scorer, ScorerError};
use chrono_tz::Tz;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};

/// Construction-time settings for the store.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// Ring buffer capacity per user
    pub max_events_per_user: usize,
    /// Maximum insight messages per entry
    pub max_insights: usize,
    /// Timezone for time-of-day features
    pub timezone: Tz,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            max_events_per_user: 12 * 60,
            max_insights: 3,
            timezone: Tz::UTC,
        }
    }
}

/// Result of ingesting one sample.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestOutcome {
    /// Samples now stored for the user
    pub stored_count: usize,
    /// Probability of the user's cache entry after the update
    pub last_probability: Option<f64>,
}

/// Health summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthStats {
    pub tracked_user_count: usize,
    pub feature_count: usize,
}

/// Outcome of one refresh cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub refreshed: usize,
    /// Users with an empty window
    pub skipped: usize,
    pub failed: usize,
    /// Cancellation was observed before every user was visited
    pub cancelled: bool,
}

/// Store errors.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// No cache entry for the user yet
    NotFound(String),
    /// Feature computation on a user with no stored samples
    EmptyWindow(String),
    /// Scorer failure, previous entry retained
    Scorer(ScorerError),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound(user) => write!(f, "no prediction available for user '{user}'"),
            StoreError::EmptyWindow(user) => write!(f, "no samples stored for user '{user}'"),
            StoreError::Scorer(e) => write!(f, "scoring failed: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<ScorerError> for StoreError {
    fn from(e: ScorerError) -> Self {
        StoreError::Scorer(e)
    }
}

/// Owner of all per-user windows and cached predictions.
pub struct StoreCoordinator {
    /// Exclusive section guarding every window
    windows: Mutex<BTreeMap<String, EventWindow>>,
    /// Mirrors `windows.len()` for lock-free health reads
    tracked_users: AtomicUsize,
    cache: PredictionCache,
    pipeline: FeaturePipeline,
    scorer: Arc<dyn Scorer>,
    max_events_per_user: usize,
}

impl StoreCoordinator {
    /// Create an empty store scoring with `scorer`.
    pub fn new(scorer: Arc<dyn Scorer>, settings: StoreSettings) -> Self {
        let pipeline = FeaturePipeline::new(scorer.feature_names().to_vec())
            .with_timezone(settings.timezone);
        Self::with_pipeline(scorer, pipeline, settings)
    }

    /// Create a store with a custom pipeline.
    ///
    /// The pipeline's feature list should match the scorer's.
    pub fn with_pipeline(
        scorer: Arc<dyn Scorer>,
        pipeline: FeaturePipeline,
        settings: StoreSettings,
    ) -> Self {
        let unproduced = pipeline.unproduced_features();
        if !unproduced.is_empty() {
            warn!(
                count = unproduced.len(),
                features = ?unproduced,
                "model requests features the pipeline never produces; they will be zero-filled"
            );
        }

        Self {
            windows: Mutex::new(BTreeMap::new()),
            tracked_users: AtomicUsize::new(0),
            cache: PredictionCache::new(settings.max_insights),
            pipeline,
            scorer,
            max_events_per_user: settings.max_events_per_user,
        }
    }

    /// Append a sample and synchronously recompute the user's entry.
    ///
    /// The sample is stored even when scoring fails; the error is returned
    /// and the previous entry is kept.
    pub async fn ingest(&self, sample: Sample) -> Result<IngestOutcome, StoreError> {
        let user_id = sample.user_id.clone();
        let mut windows = self.windows.lock().await;

        let window = windows.entry(user_id.clone()).or_insert_with(|| {
            self.tracked_users.fetch_add(1, Ordering::Relaxed);
            debug!(user_id = %user_id, "tracking new user");
            EventWindow::new(self.max_events_per_user)
        });
        window.append(sample);
        let stored_count = window.len();

        let entry = self.recompute(&user_id, window)?;
        debug!(
            user_id = %user_id,
            stored_count,
            probability = entry.probability,
            risk_level = %entry.risk_level,
            "ingested sample"
        );

        Ok(IngestOutcome {
            stored_count,
            last_probability: Some(entry.probability),
        })
    }

    /// Last committed prediction for a user.
    pub fn get_prediction(&self, user_id: &str) -> Result<Arc<CacheEntry>, StoreError> {
        self.cache
            .get(user_id)
            .ok_or_else(|| StoreError::NotFound(user_id.to_string()))
    }

    /// Insights of the last committed prediction for a user.
    pub fn get_insights(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        self.get_prediction(user_id).map(|entry| entry.insights.clone())
    }

    /// Last committed prediction plus coaching recommendations.
    pub fn get_coaching(
        &self,
        user_id: &str,
    ) -> Result<(Arc<CacheEntry>, &'static [&'static str]), StoreError> {
        let entry = self.get_prediction(user_id)?;
        let recommendations = coach::recommendations(entry.risk_level);
        Ok((entry, recommendations))
    }

    pub fn health(&self) -> HealthStats {
        HealthStats {
            tracked_user_count: self.tracked_users.load(Ordering::Relaxed),
            feature_count: self.pipeline.feature_names().len(),
        }
    }

    /// Copy of a user's stored samples, oldest first.
    pub async fn window_snapshot(&self, user_id: &str) -> Option<Arc<[Sample]>> {
        self.windows.lock().await.get(user_id).map(EventWindow::snapshot)
    }

    /// Empty a user's window while keeping the user tracked.
    ///
    /// The cached entry is left in place; refreshes skip the user until new
    /// samples arrive.
    pub async fn clear_window(&self, user_id: &str) -> bool {
        match self.windows.lock().await.get_mut(user_id) {
            Some(window) => {
                window.clear();
                true
            }
            None => false,
        }
    }

    /// Recompute every tracked user's entry.
    ///
    /// Cancellation is checked between users; each user's update is atomic.
    /// A failure for one user is logged and the cycle continues.
    pub async fn refresh_all(&self, cancel: &watch::Receiver<bool>) -> RefreshReport {
        let windows = self.windows.lock().await;
        let mut report = RefreshReport::default();

        for (user_id, window) in windows.iter() {
            if *cancel.borrow() {
                report.cancelled = true;
                break;
            }
            match self.recompute(user_id, window) {
                Ok(_) => report.refreshed += 1,
                Err(StoreError::EmptyWindow(_)) => {
                    debug!(user_id = %user_id, "skipping refresh for empty window");
                    report.skipped += 1;
                }
                Err(e) => {
                    warn!(user_id = %user_id, error = %e, "refresh failed for user");
                    report.failed += 1;
                }
            }
        }

        report
    }

    pub fn pipeline(&self) -> &FeaturePipeline {
        &self.pipeline
    }

    fn recompute(&self, user_id: &str, window: &EventWindow) -> Result<Arc<CacheEntry>, StoreError> {
        let snapshot = window.snapshot();
        let vector = self
            .pipeline
            .compute(&snapshot)
            .map_err(|_| StoreError::EmptyWindow(user_id.to_string()))?;
        Ok(self.cache.update(user_id, &vector, self.scorer.as_ref())?)
    }
}
