//! End-to-end tests through the public store API

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use headstart_engine::core::NO_TRIGGERS_MESSAGE;
use headstart_engine::scorer::ScalerParams;
use headstart_engine::{
    FeaturePipeline, LogisticScorer, ModelBundle, RefreshScheduler, RiskLevel, Sample, ScorerError,
    StoreCoordinator, StoreError, StoreSettings, SyntheticUser,
};
use std::sync::Arc;
use std::time::Duration;

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 22, 8, 0, 0).unwrap()
}

fn scenario_scorer() -> LogisticScorer {
    LogisticScorer::from_bundle(ModelBundle {
        features: vec![
            "heart_rate_mean_15m".to_string(),
            "screen_time_minutes_sum_120m".to_string(),
        ],
        scaler: ScalerParams {
            mean: vec![70.0, 60.0],
            scale: vec![10.0, 30.0],
        },
        coefficients: vec![0.8, 0.8],
        intercept: -0.5,
        generated_at: None,
    })
    .expect("valid bundle")
}

fn make_store(capacity: usize) -> Arc<StoreCoordinator> {
    Arc::new(StoreCoordinator::new(
        Arc::new(scenario_scorer()),
        StoreSettings {
            max_events_per_user: capacity,
            ..StoreSettings::default()
        },
    ))
}

fn make_sample(user: &str, minute: i64, heart_rate: f64, screen: f64) -> Sample {
    Sample {
        user_id: user.to_string(),
        timestamp: base_time() + ChronoDuration::minutes(minute),
        heart_rate,
        hrv: 65.0,
        sleep_debt_hours: 1.0,
        screen_time_minutes: screen,
        calendar_load: 1.0,
        temperature_c: 19.0,
        barometric_pressure_hpa: 1013.0,
        solar_pressure_index: 0.3,
        uv_index: 2.0,
        ambient_noise_db: 42.0,
        trigger_score: 0.1,
        migraine_probability: 0.01,
        weather_condition: "clear".to_string(),
    }
}

#[tokio::test]
async fn test_rising_heart_rate_and_screen_time_raise_risk() {
    let store = make_store(720);

    for i in 0..90 {
        let heart_rate = 65.0 + 30.0 * i as f64 / 89.0;
        let outcome = store
            .ingest(make_sample("user_001", i, heart_rate, 1.5))
            .await
            .unwrap();
        assert_eq!(outcome.stored_count, i as usize + 1);
        assert!(outcome.last_probability.is_some());
    }

    let entry = store.get_prediction("user_001").unwrap();
    assert!((0.0..=1.0).contains(&entry.probability));
    assert!(entry.risk_level >= RiskLevel::Medium);
    assert!(entry.insights.iter().any(|i| i == "Screen time spike"));
    assert!(entry.insights.len() <= 3);

    let (coached, recommendations) = store.get_coaching("user_001").unwrap();
    assert_eq!(coached, entry);
    assert_eq!(recommendations.len(), 3);
}

#[tokio::test]
async fn test_quiet_user_gets_fallback_insight() {
    let store = make_store(720);
    for i in 0..40 {
        store
            .ingest(make_sample("user_002", i, 64.0, 0.0))
            .await
            .unwrap();
    }

    let entry = store.get_prediction("user_002").unwrap();
    assert_eq!(entry.risk_level, RiskLevel::Low);
    assert_eq!(entry.insights, vec![NO_TRIGGERS_MESSAGE.to_string()]);
}

#[tokio::test]
async fn test_unknown_user_is_not_found() {
    let store = make_store(720);
    store
        .ingest(make_sample("user_001", 0, 70.0, 0.0))
        .await
        .unwrap();

    assert_eq!(
        store.get_prediction("unknown_user"),
        Err(StoreError::NotFound("unknown_user".to_string()))
    );
    assert!(matches!(
        store.get_insights("unknown_user"),
        Err(StoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_window_keeps_most_recent_samples() {
    let store = make_store(5);
    for i in 1..=8 {
        store
            .ingest(make_sample("user_001", i, 60.0, 0.0))
            .await
            .unwrap();
    }

    let window = store.window_snapshot("user_001").await.unwrap();
    let minutes: Vec<i64> = window
        .iter()
        .map(|s| (s.timestamp - base_time()).num_minutes())
        .collect();
    assert_eq!(minutes, vec![4, 5, 6, 7, 8]);
}

#[tokio::test]
async fn test_feature_mismatch_never_commits() {
    // Pipeline keyed on a different feature list than the scorer
    let pipeline = FeaturePipeline::new(vec!["heart_rate".to_string()]);
    let store = StoreCoordinator::with_pipeline(
        Arc::new(scenario_scorer()),
        pipeline,
        StoreSettings::default(),
    );

    let err = store
        .ingest(make_sample("user_001", 0, 70.0, 0.0))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Scorer(ScorerError::FeatureMismatch {
            expected: 2,
            actual: 1
        })
    ));
    assert!(store.get_prediction("user_001").is_err());
    assert_eq!(store.window_snapshot("user_001").await.unwrap().len(), 1);
    assert_eq!(store.health().tracked_user_count, 1);
}

#[tokio::test]
async fn test_naive_timestamps_are_utc() {
    let store = make_store(720);
    let json = serde_json::json!({
        "user_id": "user_003",
        "timestamp": "2024-01-22T08:00:00",
        "heart_rate": 70.0,
        "hrv": 60.0,
        "sleep_debt_hours": 1.0,
        "screen_time_minutes": 0.5,
        "calendar_load": 1.0,
        "temperature_c": 18.0,
        "barometric_pressure_hpa": 1013.0,
        "solar_pressure_index": 0.2,
        "uv_index": 3.0,
        "ambient_noise_db": 45.0,
        "trigger_score": 0.1,
        "migraine_probability": 0.01
    });
    let sample: Sample = serde_json::from_value(json).unwrap();
    assert_eq!(sample.timestamp, base_time());

    store.ingest(sample).await.unwrap();
    assert!(store.get_prediction("user_003").is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reads_see_complete_monotonic_entries_under_refresh() {
    let store = make_store(240);
    let scheduler = RefreshScheduler::start(store.clone(), Duration::from_millis(5));

    let writer = {
        let store = store.clone();
        tokio::spawn(async move {
            let samples = SyntheticUser::new("user_001", 3, base_time()).take(300);
            for sample in samples {
                store.ingest(sample).await.unwrap();
                tokio::task::yield_now().await;
            }
        })
    };

    let reader = {
        let store = store.clone();
        tokio::spawn(async move {
            let mut last = None;
            for _ in 0..500 {
                if let Ok(entry) = store.get_prediction("user_001") {
                    assert_eq!(entry.risk_level, RiskLevel::from_probability(entry.probability));
                    assert!(!entry.insights.is_empty());
                    if let Some(previous) = last {
                        assert!(entry.computed_at >= previous);
                    }
                    last = Some(entry.computed_at);
                }
                tokio::task::yield_now().await;
            }
        })
    };

    writer.await.unwrap();
    reader.await.unwrap();
    scheduler.shutdown().await;

    assert_eq!(store.window_snapshot("user_001").await.unwrap().len(), 240);
}

#[tokio::test]
async fn test_scheduled_refresh_skips_cleared_windows() {
    let store = make_store(720);
    store
        .ingest(make_sample("active", 0, 80.0, 1.0))
        .await
        .unwrap();
    store
        .ingest(make_sample("idle", 0, 80.0, 1.0))
        .await
        .unwrap();
    assert!(store.clear_window("idle").await);

    let active_before = store.get_prediction("active").unwrap();
    let idle_before = store.get_prediction("idle").unwrap();

    let scheduler = RefreshScheduler::start(store.clone(), Duration::from_millis(10));
    tokio::time::sleep(Duration::from_millis(150)).await;
    scheduler.shutdown().await;

    assert!(store.get_prediction("active").unwrap().computed_at > active_before.computed_at);
    assert_eq!(store.get_prediction("idle").unwrap(), idle_before);
}

#[test]
fn test_shipped_bundle_loads_and_is_fully_produced() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("models")
        .join("model_bundle.json");
    let scorer = LogisticScorer::load(&path).unwrap();
    let pipeline = FeaturePipeline::new(headstart_engine::Scorer::feature_names(&scorer).to_vec());
    assert!(pipeline.unproduced_features().is_empty());
}
