//! Common test utilities for integration tests.
//!
//! Every test gets a private in-memory SQLite database with migrations
//! applied, a recording notification dispatcher and an in-process region
//! registry, so tests run in parallel without shared state.

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, Response},
    Router,
};
use domain::models::geofence::{CreateGeofenceRequest, GeofenceDetail};
use domain::services::{InMemoryGeofencingClient, MockNotificationDispatcher};
use fake::{faker::address::en::CityName, Fake};
use geofication_api::{
    app::{create_app, AppState},
    config::{
        Config, DatabaseConfig, DispatchConfig, GeofencingConfig, LoggingConfig, ServerConfig,
    },
    services::{DispatchSettings, Services},
};
use persistence::db::create_memory_pool;
use persistence::entities::{GeofenceEntity, GeoficationEntity};
use persistence::repositories::{GeofenceRepository, GeoficationRepository};
use serde_json::{json, Value};
use sqlx::SqlitePool;

/// Configuration for tests. Nothing here is read from disk.
pub fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            request_timeout_secs: 30,
        },
        database: DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            connect_timeout_secs: 10,
            idle_timeout_secs: 600,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            format: "pretty".to_string(),
        },
        dispatch: DispatchConfig::default(),
        geofencing: GeofencingConfig::default(),
    }
}

/// A fully wired application over a fresh database.
pub struct TestApp {
    pub pool: SqlitePool,
    pub services: Services,
    pub dispatcher: MockNotificationDispatcher,
    pub geofencing: Arc<InMemoryGeofencingClient>,
    pub router: Router,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_parts(
            MockNotificationDispatcher::new(),
            InMemoryGeofencingClient::default(),
        )
        .await
    }

    pub async fn with_dispatcher(dispatcher: MockNotificationDispatcher) -> Self {
        Self::with_parts(dispatcher, InMemoryGeofencingClient::default()).await
    }

    pub async fn with_geofencing(geofencing: InMemoryGeofencingClient) -> Self {
        Self::with_parts(MockNotificationDispatcher::new(), geofencing).await
    }

    pub async fn with_parts(
        dispatcher: MockNotificationDispatcher,
        geofencing: InMemoryGeofencingClient,
    ) -> Self {
        let pool = create_memory_pool()
            .await
            .expect("Failed to create test database");
        Self::over_pool(pool, dispatcher, Arc::new(geofencing))
    }

    /// Wire a new application over an existing database, as after a restart.
    pub fn over_pool(
        pool: SqlitePool,
        dispatcher: MockNotificationDispatcher,
        geofencing: Arc<InMemoryGeofencingClient>,
    ) -> Self {
        let config = test_config();
        let services = Services::new(
            pool.clone(),
            Arc::new(dispatcher.clone()),
            geofencing.clone(),
            DispatchSettings::from(&config.dispatch),
        );
        let router = create_app(AppState::new(config, pool.clone(), services.clone()));

        Self {
            pool,
            services,
            dispatcher,
            geofencing,
            router,
        }
    }

    /// Send one request through a clone of the router.
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        use tower::ServiceExt;
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Router is infallible")
    }

    /// Create a fence with one rule through the service layer.
    pub async fn seed_fence(&self, rule: Value) -> (i64, i64) {
        let detail = self.create_fence(rule).await;
        (detail.geofence.id, detail.geofications[0].id)
    }

    pub async fn create_fence(&self, rule: Value) -> GeofenceDetail {
        let request: CreateGeofenceRequest = serde_json::from_value(json!({
            "name": CityName().fake::<String>(),
            "latitude": 48.1486,
            "longitude": 17.1077,
            "radiusMeters": 50.0,
            "geofication": rule,
        }))
        .expect("Invalid fence fixture");
        self.services
            .fences
            .create_geofence(request)
            .await
            .expect("Failed to seed geofence")
    }

    pub async fn fence(&self, id: i64) -> Option<GeofenceEntity> {
        GeofenceRepository::new(self.pool.clone())
            .find_by_id(id)
            .await
            .expect("Failed to load geofence")
    }

    pub async fn rule(&self, id: i64) -> Option<GeoficationEntity> {
        GeoficationRepository::new(self.pool.clone())
            .find_by_id(id)
            .await
            .expect("Failed to load geofication")
    }

    /// Messages currently in the diagnostic log, newest first.
    pub async fn log_messages(&self) -> Vec<String> {
        sqlx::query_scalar::<_, String>("SELECT message FROM log_entries ORDER BY id DESC")
            .fetch_all(&self.pool)
            .await
            .expect("Failed to read log entries")
    }
}

/// A rule body with the given direction flags, post-trigger action and delay.
pub fn rule(flags: i64, on_trigger: i64, delay_minutes: i64) -> Value {
    json!({
        "message": format!("Rule {}/{}/{}", flags, on_trigger, delay_minutes),
        "flags": flags,
        "onTrigger": on_trigger,
        "delayMinutes": delay_minutes,
    })
}

pub fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("Failed to build request")
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .expect("Failed to build request")
}

pub fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("Failed to build request")
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read response body")
        .to_vec()
}

pub async fn parse_response_body(response: Response<Body>) -> Value {
    let bytes = body_bytes(response).await;
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}
