//! Scoring capability consumed by the prediction cache.
//!
//! The engine never trains or inspects a model; it only calls a [`Scorer`]
//! that maps a [`FeatureVector`] to a probability. [`LogisticScorer`] is the
//! shipped implementation: a standard scaler followed by a logistic head,
//! loaded once at startup from a JSON bundle.

use crate::core::features::FeatureVector;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Maps feature vectors to probabilities.
pub trait Scorer: Send + Sync {
    /// Ordered feature names the scorer expects.
    fn feature_names(&self) -> &[String];

    /// Probability in `[0, 1]` for `vector`.
    fn score(&self, vector: &FeatureVector) -> Result<f64, ScorerError>;
}

/// Errors raised while scoring.
#[derive(Debug, Clone, PartialEq)]
pub enum ScorerError {
    /// Vector keys do not match the scorer's feature list
    FeatureMismatch { expected: usize, actual: usize },
    /// Scorer produced a value outside `[0, 1]`
    InvalidProbability(f64),
    /// Any other model failure
    Model(String),
}

impl std::fmt::Display for ScorerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScorerError::FeatureMismatch { expected, actual } => write!(
                f,
                "feature mismatch: expected {expected} ordered features, got {actual}"
            ),
            ScorerError::InvalidProbability(p) => write!(f, "scorer returned invalid probability {p}"),
            ScorerError::Model(msg) => write!(f, "model error: {msg}"),
        }
    }
}

impl std::error::Error for ScorerError {}

/// Errors raised while loading a model bundle.
#[derive(Debug)]
pub enum BundleError {
    Io(String),
    Parse(String),
    Invalid(String),
}

impl std::fmt::Display for BundleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BundleError::Io(e) => write!(f, "Bundle IO error: {e}"),
            BundleError::Parse(e) => write!(f, "Bundle parse error: {e}"),
            BundleError::Invalid(e) => write!(f, "Invalid bundle: {e}"),
        }
    }
}

impl std::error::Error for BundleError {}

/// Fitted standard scaler parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalerParams {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

/// Serialized scaler + logistic head.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelBundle {
    /// Ordered feature names
    pub features: Vec<String>,
    pub scaler: ScalerParams,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    /// When the bundle was produced (informational)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
}

impl ModelBundle {
    fn validate(&self) -> Result<(), BundleError> {
        let n = self.features.len();
        if n == 0 {
            return Err(BundleError::Invalid("feature list is empty".to_string()));
        }
        let unique: HashSet<&str> = self.features.iter().map(String::as_str).collect();
        if unique.len() != n {
            return Err(BundleError::Invalid("feature list has duplicates".to_string()));
        }
        for (name, len) in [
            ("scaler.mean", self.scaler.mean.len()),
            ("scaler.scale", self.scaler.scale.len()),
            ("coefficients", self.coefficients.len()),
        ] {
            if len != n {
                return Err(BundleError::Invalid(format!(
                    "{name} has {len} entries, expected {n}"
                )));
            }
        }
        let finite = self
            .scaler
            .mean
            .iter()
            .chain(&self.scaler.scale)
            .chain(&self.coefficients)
            .chain(std::iter::once(&self.intercept))
            .all(|v| v.is_finite());
        if !finite {
            return Err(BundleError::Invalid("non-finite parameter".to_string()));
        }
        Ok(())
    }
}

/// Standard scaler followed by logistic regression.
#[derive(Debug, Clone)]
pub struct LogisticScorer {
    bundle: ModelBundle,
}

impl LogisticScorer {
    /// Build a scorer from an in-memory bundle.
    pub fn from_bundle(bundle: ModelBundle) -> Result<Self, BundleError> {
        bundle.validate()?;
        Ok(Self { bundle })
    }

    /// Load a bundle from a JSON file.
    pub fn load(path: &Path) -> Result<Self, BundleError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| BundleError::Io(format!("{}: {e}", path.display())))?;
        let bundle: ModelBundle =
            serde_json::from_str(&content).map_err(|e| BundleError::Parse(e.to_string()))?;
        Self::from_bundle(bundle)
    }

    pub fn bundle(&self) -> &ModelBundle {
        &self.bundle
    }
}

impl Scorer for LogisticScorer {
    fn feature_names(&self) -> &[String] {
        &self.bundle.features
    }

    fn score(&self, vector: &FeatureVector) -> Result<f64, ScorerError> {
        if vector.names() != self.bundle.features.as_slice() {
            return Err(ScorerError::FeatureMismatch {
                expected: self.bundle.features.len(),
                actual: vector.len(),
            });
        }

        let scaler = &self.bundle.scaler;
        let logit = vector
            .values()
            .iter()
            .zip(&scaler.mean)
            .zip(&scaler.scale)
            .zip(&self.bundle.coefficients)
            .fold(self.bundle.intercept, |acc, (((x, mean), scale), coef)| {
                // sklearn leaves zero-variance features unscaled
                let scale = if *scale == 0.0 { 1.0 } else { *scale };
                acc + coef * (x - mean) / scale
            });

        Ok(1.0 / (1.0 + (-logit).exp()))
    }
}
