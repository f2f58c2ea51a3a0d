//! Cached per-user predictions.
//!
//! The cache holds the latest committed [`CacheEntry`] for each user behind a
//! short read/write lock. Entries are built outside the lock and swapped in
//! whole, so readers only ever see a complete entry and never wait on a
//! feature computation or scorer call.

use crate::core::features::FeatureVector;
use crate::core::insights::rank_insights;
use crate::scorer::{Scorer, ScorerError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Probability at or above which risk is high.
pub const HIGH_RISK_THRESHOLD: f64 = 0.7;

/// Probability at or above which risk is medium.
pub const MEDIUM_RISK_THRESHOLD: f64 = 0.4;

/// Discretized probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_probability(probability: f64) -> Self {
        if probability >= HIGH_RISK_THRESHOLD {
            RiskLevel::High
        } else if probability >= MEDIUM_RISK_THRESHOLD {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latest prediction for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Probability in `[0, 1]`
    pub probability: f64,
    pub risk_level: RiskLevel,
    /// Insight messages, most salient first
    pub insights: Vec<String>,
    /// When the entry was computed
    pub computed_at: DateTime<Utc>,
}

/// Per-user map of committed prediction entries.
#[derive(Debug)]
pub struct PredictionCache {
    entries: RwLock<HashMap<String, Arc<CacheEntry>>>,
    max_insights: usize,
}

impl PredictionCache {
    pub fn new(max_insights: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_insights,
        }
    }

    /// Score `vector` and commit a fresh entry for `user_id`.
    ///
    /// On scorer failure the previous entry, if any, is left untouched.
    pub fn update(
        &self,
        user_id: &str,
        vector: &FeatureVector,
        scorer: &dyn Scorer,
    ) -> Result<Arc<CacheEntry>, ScorerError> {
        let probability = scorer.score(vector)?;
        if !(0.0..=1.0).contains(&probability) {
            return Err(ScorerError::InvalidProbability(probability));
        }

        let insights = rank_insights(vector, self.max_insights);
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);

        // computed_at never moves backwards for a user, even if the wall clock does
        let now = Utc::now();
        let computed_at = match entries.get(user_id) {
            Some(previous) if previous.computed_at > now => previous.computed_at,
            _ => now,
        };

        let entry = Arc::new(CacheEntry {
            probability,
            risk_level: RiskLevel::from_probability(probability),
            insights,
            computed_at,
        });
        entries.insert(user_id.to_string(), entry.clone());
        Ok(entry)
    }

    /// Last committed entry for `user_id`.
    pub fn get(&self, user_id: &str) -> Option<Arc<CacheEntry>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .cloned()
    }

    /// Number of users with a committed entry.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_insights(&self) -> usize {
        self.max_insights
    }
}
