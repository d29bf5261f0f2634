use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{metrics_handler, metrics_middleware, trace_id};
use crate::routes::{geofences, geofications, health, logs, settings, transitions};
use crate::services::Services;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Arc<Config>,
    pub services: Services,
}

impl AppState {
    pub fn new(config: Config, pool: SqlitePool, services: Services) -> Self {
        Self {
            pool,
            config: Arc::new(config),
            services,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    // Local companion API: callers are the platform bridge and the UI shell.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let bridge_routes = Router::new()
        .route("/api/v1/transitions", post(transitions::report_transition))
        .route("/api/v1/boot", post(transitions::boot_completed));

    let geofence_routes = Router::new()
        .route(
            "/api/v1/geofences",
            post(geofences::create_geofence).get(geofences::list_geofences),
        )
        .route(
            "/api/v1/geofences/:id",
            get(geofences::get_geofence)
                .patch(geofences::update_geofence)
                .delete(geofences::delete_geofence),
        )
        .route(
            "/api/v1/geofences/:id/active",
            put(geofences::set_geofence_active),
        )
        .route(
            "/api/v1/geofences/:id/geofications",
            post(geofences::add_geofication),
        )
        .route(
            "/api/v1/geofences/:id/notification-delete",
            post(geofences::delete_geofence_from_notification),
        )
        .route(
            "/api/v1/geofications/:id",
            get(geofications::get_geofication)
                .patch(geofications::update_geofication)
                .delete(geofications::delete_geofication),
        )
        .route(
            "/api/v1/geofications/:id/active",
            put(geofications::set_geofication_active),
        )
        .route(
            "/api/v1/geofications/:id/disable",
            post(geofications::disable_geofication),
        );

    let support_routes = Router::new()
        .route(
            "/api/v1/logs",
            get(logs::list_logs).delete(logs::clear_logs),
        )
        .route("/api/v1/settings", get(settings::list_settings))
        .route(
            "/api/v1/settings/:key",
            get(settings::get_setting)
                .put(settings::put_setting)
                .delete(settings::delete_setting),
        );

    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    let request_timeout = Duration::from_secs(state.config.server.request_timeout_secs);

    Router::new()
        .merge(public_routes)
        .merge(bridge_routes)
        .merge(geofence_routes)
        .merge(support_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state)
}
