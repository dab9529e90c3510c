use axum::routing::{delete, get, post};
use axum::Router;
use socketioxide::SocketIo;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

mod config;
mod jobs;
mod models;
mod routes;
mod schema;
mod services;
mod socket;
mod store;

use config::AppConfig;
use socket::PushRegistry;
use store::{MemoryNotificationStore, NotificationStore, PgNotificationStore};

pub struct AppState {
    pub store: Arc<dyn NotificationStore>,
    pub config: AppConfig,
    pub io: SocketIo,
    pub registry: PushRegistry,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rally_shared::middleware::init_tracing("rally-notification");

    let config = AppConfig::load()?;
    let port = config.port;

    // Set JWT_SECRET env var for the auth extractor middleware
    std::env::set_var("JWT_SECRET", &config.jwt_secret);

    // The storage backend is decided exactly once, here, and injected
    // everywhere as Arc<dyn NotificationStore>.
    let store: Arc<dyn NotificationStore> = match config.store_backend.as_str() {
        "memory" => {
            tracing::warn!("using in-memory notification store; data will not survive restarts");
            Arc::new(MemoryNotificationStore::default())
        }
        _ => {
            let pool = rally_shared::clients::db::create_pool(&config.database_url);
            Arc::new(PgNotificationStore::new(pool))
        }
    };

    // Build Socket.IO layer - we need io in AppState for emitting from REST routes
    let (sio_layer, io) = SocketIo::builder().build_layer();

    let state = Arc::new(AppState {
        store: store.clone(),
        config,
        io: io.clone(),
        registry: PushRegistry::new(),
    });

    // Configure the Socket.IO namespace with state via closure
    io.ns("/", {
        let state = state.clone();
        move |socket: socketioxide::extract::SocketRef| {
            let state = state.clone();
            async move {
                socket::handlers::on_connect_with_state(socket, state).await;
            }
        }
    });

    jobs::sweeper::spawn(
        store,
        Duration::from_secs(state.config.sweep_interval_secs),
        chrono::Duration::hours(state.config.retention_hours),
    );

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route(
            "/notifications",
            get(routes::notifications::list_notifications)
                .post(routes::admin::create_notifications),
        )
        .route("/notifications/unread-count", get(routes::notifications::unread_count))
        .route("/notifications/mark-all-read", post(routes::notifications::mark_all_read))
        .route("/notifications/hide", post(routes::notifications::hide))
        .route("/notifications/:id/read", post(routes::notifications::mark_read))
        .route("/notifications/:id", delete(routes::admin::delete_notification))
        .route(
            "/notifications/users/:user_id",
            delete(routes::admin::purge_user_notifications),
        )
        .route("/internal/notifications", post(routes::internal::create_notification))
        .layer(sio_layer)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "rally-notification starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
