//! Head Start engine - online feature windowing and prediction caching.
//!
//! This library keeps a bounded window of recent biometric and environmental
//! samples per user, turns each window into a model-ready feature vector,
//! and caches the resulting risk prediction with ranked insights so reads
//! never wait on computation.
//!
//! # Guarantees
//!
//! - **Bounded memory**: each user's window holds at most
//!   `max_events_per_user` samples, oldest evicted first
//! - **No torn reads**: readers see the last fully committed prediction
//! - **Serialized updates**: ingest and refresh updates for a user are
//!   applied one at a time, in acquisition order
//! - **Failure isolation**: a scorer failure for one user never affects
//!   another, and never discards a committed prediction
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Head Start engine                       │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐        │
//! │  │   Ingest    │──▶│ EventWindow │──▶│  Features   │        │
//! │  │  (sample)   │   │ (ring/user) │   │ (pipeline)  │        │
//! │  └─────────────┘   └─────────────┘   └─────────────┘        │
//! │         ▲                                    │               │
//! │         │                                    ▼               │
//! │  ┌─────────────┐                     ┌─────────────┐        │
//! │  │   Refresh   │                     │ Prediction  │        │
//! │  │  Scheduler  │                     │    Cache    │        │
//! │  └─────────────┘                     └─────────────┘        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use headstart_engine::{LogisticScorer, StoreCoordinator, StoreSettings};
//! use std::sync::Arc;
//!
//! # async fn demo(sample: headstart_engine::Sample) -> anyhow::Result<()> {
//! let scorer = LogisticScorer::load("models/model_bundle.json".as_ref())?;
//! let store = StoreCoordinator::new(Arc::new(scorer), StoreSettings::default());
//!
//! let outcome = store.ingest(sample).await?;
//! println!("stored {} samples", outcome.stored_count);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod refresh;
pub mod scorer;
pub mod simulate;
pub mod store;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError};
pub use core::{
    CacheEntry, EventWindow, FeatureError, FeaturePipeline, FeatureVector, PredictionCache,
    RiskLevel, Sample, Signal,
};
pub use refresh::RefreshScheduler;
pub use scorer::{BundleError, LogisticScorer, ModelBundle, Scorer, ScorerError};
pub use simulate::SyntheticUser;
pub use store::{HealthStats, IngestOutcome, RefreshReport, StoreCoordinator, StoreError, StoreSettings};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
