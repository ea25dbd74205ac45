// Breathable Commute API v0.1
use axum::{routing::get, Router};
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use breathable_commute_api::config::AppConfig;
use breathable_commute_api::routes::{self, AppState};
use breathable_commute_api::services::open_meteo::OpenMeteoClient;
use breathable_commute_api::{errors, helpers, models, services};

/// Breathable Commute API OpenAPI document.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Breathable Commute API",
        version = "0.1.0",
        description = "Cycling safety dashboard for Indian cities. \
            Fetches current PM2.5 and weather from Open-Meteo for every configured \
            point concurrently, with retries and all-or-nothing batches, and derives \
            traffic-light cycling recommendations and hazardous air-quality warnings.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Health", description = "Service and upstream health check"),
        (name = "Points", description = "Configured points"),
        (name = "Measurements", description = "Current air-quality and weather measurements"),
        (name = "Dashboard", description = "Recommendations, hazard warnings and summaries"),
    ),
    paths(
        routes::health::health_check,
        routes::points::list_points,
        routes::measurements::list_measurements,
        routes::dashboard::get_dashboard,
        routes::dashboard::get_dashboard_summary,
    ),
    components(
        schemas(
            routes::health::HealthResponse,
            services::health::HealthSummary,
            services::health::ServiceHealth,
            routes::points::PointsResponse,
            models::GeoPoint,
            models::Measurement,
            models::Status,
            models::Recommendation,
            models::RecommendationConditions,
            models::CorrelationRow,
            models::DashboardResult,
            services::dashboard::DashboardSummary,
            helpers::FormattedWeather,
            errors::ErrorResponse,
        )
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "breathable_commute_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().expect("Invalid configuration");
    let port = config.port;

    tracing::info!(
        "Configured {} points (default '{}'), {} attempts per request, concurrency {}",
        config.points.len(),
        config.default_point,
        config.max_retries,
        config.max_concurrent_requests
    );

    // Shared connection pool for every upstream request
    let client = OpenMeteoClient::new(config.connection_pool_size)
        .expect("Failed to build HTTP client");

    let shutdown = CancellationToken::new();
    let app_state = AppState::new(config, client, shutdown.clone()).expect("Invalid configuration");

    // CORS: read-only API, restrict methods to GET
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET])
        .allow_headers(Any);

    let app = Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .route("/api/v1/points", get(routes::points::list_points))
        .route(
            "/api/v1/measurements",
            get(routes::measurements::list_measurements),
        )
        .route("/api/v1/dashboard", get(routes::dashboard::get_dashboard))
        .route(
            "/api/v1/dashboard/summary",
            get(routes::dashboard::get_dashboard_summary),
        )
        .with_state(app_state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("API server listening on {}", addr);
    tracing::info!("Swagger UI available at http://localhost:{}/swagger-ui/", port);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind TCP listener");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .expect("Server terminated unexpectedly");
}

/// Wait for Ctrl-C, then cancel every in-flight batch.
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        // Keep serving; only an explicit signal stops the server
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, cancelling in-flight fetches");
    shutdown.cancel();
}
