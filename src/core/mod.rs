//! Core functionality for the Head Start engine.
//!
//! This module contains:
//! - Sample types and the bounded per-user event window
//! - Feature computation from event windows
//! - Insight ranking and coaching recommendations
//! - The per-user prediction cache

pub mod coach;
pub mod features;
pub mod insights;
pub mod prediction;
pub mod sample;
pub mod windowing;

// Re-export commonly used types
pub use features::{FeatureError, FeaturePipeline, FeatureTable, FeatureVector};
pub use insights::{rank_insights, NO_TRIGGERS_MESSAGE};
pub use prediction::{CacheEntry, PredictionCache, RiskLevel};
pub use sample::{Sample, Signal};
pub use windowing::EventWindow;
