use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    export_csv, health_check, index, latest_reading, list_readings, logs, settings, thresholds,
    AppState,
};
use crate::monitor::ShutdownSignal;

/// Dashboard server configuration
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub host: String,
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Build the read-only dashboard router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/logs", get(logs))
        // Health check
        .route("/health", get(health_check))
        // Readings
        .route("/readings", get(list_readings))
        .route("/readings/latest", get(latest_reading))
        .route("/readings.csv", get(export_csv))
        // Configuration
        .route("/thresholds", get(thresholds))
        .route("/settings", get(settings))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Serve the dashboard until `shutdown` fires
pub async fn run_dashboard(
    config: DashboardConfig,
    state: Arc<AppState>,
    mut shutdown: ShutdownSignal,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Starting dashboard on http://{}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.triggered().await })
        .await?;

    tracing::info!("Dashboard stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::{AlertSettings, Thresholds};
    use crate::data::{Reading, SensorValues};
    use crate::storage::{MemoryReadingStore, ReadingStore, StorageError};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use chrono::{TimeZone, Utc};
    use std::time::Duration;
    use tower::util::ServiceExt;

    struct UnreadableStore;

    impl ReadingStore for UnreadableStore {
        fn init(&self) -> Result<(), StorageError> {
            Ok(())
        }

        fn save(&self, _reading: &Reading) -> Result<i64, StorageError> {
            Err(StorageError::Write("read-only".to_string()))
        }

        fn latest(&self, _limit: usize) -> Result<Vec<Reading>, StorageError> {
            Err(StorageError::Read("disk I/O error".to_string()))
        }

        fn count(&self) -> Result<u64, StorageError> {
            Err(StorageError::Read("disk I/O error".to_string()))
        }
    }

    fn app_with(store: Arc<dyn ReadingStore>) -> Router {
        build_router(Arc::new(AppState {
            store,
            thresholds: Thresholds::default(),
            alerts: AlertSettings::default(),
            channels: vec!["email".to_string()],
        }))
    }

    fn seeded_store(n: i64) -> Arc<MemoryReadingStore> {
        let store = Arc::new(MemoryReadingStore::new());
        for i in 0..n {
            store
                .save(&Reading::new(
                    Utc.timestamp_opt(1_700_000_000 + i, 0).unwrap(),
                    SensorValues::new(20.0 + i as f64, 50.0, 80.0),
                ))
                .unwrap();
        }
        store
    }

    async fn get_text(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health_check() {
        let (status, body) = get_json(app_with(seeded_store(0)), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_latest_empty_is_not_found() {
        let (status, _) = get_json(app_with(seeded_store(0)), "/readings/latest").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_latest_returns_newest() {
        let (status, body) = get_json(app_with(seeded_store(3)), "/readings/latest").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["temperature"], 22.0);
        assert!(body["alerts"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_respects_limit() {
        let (status, body) = get_json(app_with(seeded_store(15)), "/readings?limit=4").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 4);
        assert_eq!(body["total"], 15);
        assert_eq!(body["readings"][0]["temperature"], 34.0);

        let (_, body) = get_json(app_with(seeded_store(15)), "/readings").await;
        assert_eq!(body["count"], 10);
    }

    #[tokio::test]
    async fn test_zero_limit_rejected() {
        let (status, _) = get_json(app_with(seeded_store(1)), "/readings?limit=0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_store_failure_is_unavailable() {
        let (status, body) = get_json(app_with(Arc::new(UnreadableStore)), "/readings").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].as_str().unwrap().contains("disk I/O error"));
    }

    #[tokio::test]
    async fn test_csv_export() {
        let app = app_with(seeded_store(2));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/readings.csv")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "timestamp,temperature,humidity,light");
        assert_eq!(lines.len(), 3);
        assert!(lines[1].ends_with(",21,50,80"));
    }

    #[tokio::test]
    async fn test_thresholds_endpoint() {
        let (status, body) = get_json(app_with(seeded_store(0)), "/thresholds").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["light_min"], 70.0);
    }

    #[tokio::test]
    async fn test_index_page() {
        let app = app_with(seeded_store(1));
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("All systems normal"));
        assert!(html.contains("href=\"/logs\""));
    }

    #[tokio::test]
    async fn test_settings_endpoint() {
        let app = build_router(Arc::new(AppState {
            store: seeded_store(0),
            thresholds: Thresholds::default(),
            alerts: AlertSettings::default()
                .with_enabled(false)
                .with_cooldown(Duration::from_secs(90)),
            channels: vec!["email".to_string(), "sms".to_string()],
        }));

        let (status, body) = get_json(app, "/settings").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["alerts"]["enabled"], false);
        assert_eq!(body["alerts"]["cooldown_secs"], 90.0);
        assert_eq!(body["thresholds"]["temperature_max"], 35.0);
        assert_eq!(body["channels"], serde_json::json!(["email", "sms"]));
    }

    #[tokio::test]
    async fn test_logs_page_lists_history() {
        let store = seeded_store(3);
        store
            .save(&Reading::new(
                Utc.timestamp_opt(1_700_000_100, 0).unwrap(),
                SensorValues::new(48.5, 85.0, 30.0),
            ))
            .unwrap();

        let (status, html) = get_text(app_with(store), "/logs?limit=2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(html.matches("<tr><td>").count(), 2);
        assert!(html.contains("<td>Temperature out of range: 48.5°C<br>"));
        // newest row comes first
        let newest = html.find("2023-11-14T22:15:00.000000Z").unwrap();
        let older = html.find("2023-11-14T22:13:22.000000Z").unwrap();
        assert!(newest < older);
        assert!(!html.contains("22:13:20"));
    }

    #[tokio::test]
    async fn test_logs_page_empty_and_bad_limit() {
        let (status, html) = get_text(app_with(seeded_store(0)), "/logs").await;
        assert_eq!(status, StatusCode::OK);
        assert!(html.contains("No readings recorded yet"));

        let (status, _) = get_text(app_with(seeded_store(1)), "/logs?limit=0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
