//! Integration tests for the Head Start HTTP server

#[cfg(feature = "server")]
mod server_tests {
    use headstart_engine::scorer::ScalerParams;
    use headstart_engine::server::{run, ServerConfig};
    use headstart_engine::{LogisticScorer, ModelBundle, StoreCoordinator, StoreSettings};
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::oneshot;

    const TOKEN: &str = "test-token";

    fn test_store() -> Arc<StoreCoordinator> {
        let scorer = LogisticScorer::from_bundle(ModelBundle {
            features: vec![
                "heart_rate_mean_15m".to_string(),
                "screen_time_minutes_sum_120m".to_string(),
                "uv_index".to_string(),
            ],
            scaler: ScalerParams {
                mean: vec![70.0, 60.0, 3.0],
                scale: vec![10.0, 30.0, 2.0],
            },
            coefficients: vec![0.8, 0.8, 0.2],
            intercept: -0.5,
            generated_at: Some("2024-01-01T00:00:00Z".to_string()),
        })
        .expect("valid bundle");
        Arc::new(StoreCoordinator::new(
            Arc::new(scorer),
            StoreSettings::default(),
        ))
    }

    async fn start_server() -> (SocketAddr, oneshot::Sender<()>) {
        // Random port
        let config = ServerConfig::new(0, TOKEN, Duration::from_secs(3600));
        let (addr, shutdown_tx) = run(config, test_store())
            .await
            .expect("Failed to start server");

        // Give server time to start
        tokio::time::sleep(Duration::from_millis(100)).await;
        (addr, shutdown_tx)
    }

    fn sample_json(user: &str, minute: u32, uv_index: f64) -> serde_json::Value {
        serde_json::json!({
            "user_id": user,
            "timestamp": format!("2024-01-22T10:{:02}:00Z", minute),
            "heart_rate": 72.0,
            "hrv": 60.0,
            "sleep_debt_hours": 1.0,
            "screen_time_minutes": 0.5,
            "calendar_load": 1.0,
            "temperature_c": 18.0,
            "barometric_pressure_hpa": 1013.0,
            "solar_pressure_index": 0.2,
            "uv_index": uv_index,
            "ambient_noise_db": 45.0,
            "trigger_score": 0.1,
            "migraine_probability": 0.01,
            "weather_condition": "sunny"
        })
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (addr, shutdown_tx) = start_server().await;

        // No API key needed
        let client = reqwest::Client::new();
        let response = client
            .get(format!("http://{}/health", addr))
            .send()
            .await
            .expect("Failed to send request");

        assert!(response.status().is_success());

        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["status"], "ok");
        assert!(body["version"].as_str().is_some());
        assert_eq!(body["users_tracked"], 0);
        assert_eq!(body["model_features"], 3);

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_requires_api_key() {
        let (addr, shutdown_tx) = start_server().await;
        let client = reqwest::Client::new();

        let missing = client
            .post(format!("http://{}/ingest", addr))
            .json(&sample_json("user_001", 0, 2.0))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(missing.status(), reqwest::StatusCode::UNAUTHORIZED);

        let wrong = client
            .get(format!("http://{}/predict/user_001", addr))
            .header("X-API-Key", "nope")
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(wrong.status(), reqwest::StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = wrong.json().await.expect("Failed to parse JSON");
        assert_eq!(body["code"], "UNAUTHORIZED");

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_ingest_then_read_back() {
        let (addr, shutdown_tx) = start_server().await;
        let client = reqwest::Client::new();

        for minute in 0..3 {
            let response = client
                .post(format!("http://{}/ingest", addr))
                .header("X-API-Key", TOKEN)
                .json(&sample_json("user_001", minute, 9.5))
                .send()
                .await
                .expect("Failed to send request");
            assert!(response.status().is_success());

            let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
            assert_eq!(body["user_id"], "user_001");
            assert_eq!(body["stored_events"], minute + 1);
            assert!(body["last_prediction"].as_f64().is_some());
        }

        let prediction: serde_json::Value = client
            .get(format!("http://{}/predict/user_001", addr))
            .header("X-API-Key", TOKEN)
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        let probability = prediction["probability"].as_f64().unwrap();
        assert!((0.0..=1.0).contains(&probability));
        assert!(["low", "medium", "high"].contains(&prediction["risk_level"].as_str().unwrap()));
        assert!(prediction["updated_at"].as_str().is_some());

        let insights: serde_json::Value = client
            .get(format!("http://{}/insights/user_001", addr))
            .header("X-API-Key", TOKEN)
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        assert_eq!(insights["insights"][0], "Extreme UV exposure");
        assert_eq!(insights["risk_level"], prediction["risk_level"]);

        let coach: serde_json::Value = client
            .post(format!("http://{}/coach/user_001", addr))
            .header("X-API-Key", TOKEN)
            .json(&serde_json::json!({"context": "long meetings today"}))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        assert_eq!(coach["recommendations"].as_array().unwrap().len(), 3);

        let health: serde_json::Value = client
            .get(format!("http://{}/health", addr))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        assert_eq!(health["users_tracked"], 1);

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_unknown_user_returns_404() {
        let (addr, shutdown_tx) = start_server().await;
        let client = reqwest::Client::new();

        for path in ["predict", "insights"] {
            let response = client
                .get(format!("http://{}/{}/unknown_user", addr, path))
                .header("X-API-Key", TOKEN)
                .send()
                .await
                .expect("Failed to send request");
            assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
            let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
            assert_eq!(body["code"], "NOT_FOUND");
        }

        // Coach without a body
        let response = client
            .post(format!("http://{}/coach/unknown_user", addr))
            .header("X-API-Key", TOKEN)
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_malformed_timestamp_rejected() {
        let (addr, shutdown_tx) = start_server().await;
        let client = reqwest::Client::new();

        let mut sample = sample_json("user_001", 0, 2.0);
        sample["timestamp"] = serde_json::json!("not-a-time");

        let response = client
            .post(format!("http://{}/ingest", addr))
            .header("X-API-Key", TOKEN)
            .json(&sample)
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);
        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["code"], "INVALID_SAMPLE");

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_cors_headers() {
        let (addr, shutdown_tx) = start_server().await;

        // Send OPTIONS request to check CORS
        let client = reqwest::Client::new();
        let response = client
            .request(reqwest::Method::OPTIONS, format!("http://{}/ingest", addr))
            .header("Origin", "http://localhost")
            .header("Access-Control-Request-Method", "POST")
            .send()
            .await
            .expect("Failed to send request");

        // CORS preflight should succeed
        assert!(
            response.status().is_success() || response.status() == reqwest::StatusCode::NO_CONTENT,
            "CORS preflight failed: {}",
            response.status()
        );

        let _ = shutdown_tx.send(());
    }
}
