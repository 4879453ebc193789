// Bitcoin address watch API server entry point

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use http::{header, Method};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use btc_watch_api::config::ApiConfig;
use btc_watch_api::handlers::{self, AppContext};
use btc_watch_api::services::explorer::MempoolSpaceProvider;

fn load_env() {
    dotenv::dotenv().ok();
}

#[tokio::main]
async fn main() {
    load_env();
    // Configure logging with tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load API configuration from environment
    let config = ApiConfig::from_env();
    tracing::info!(
        "Configuration loaded (network: {}, explorer: {}, {} allowed emails)",
        config.network,
        config.explorer_base_url,
        config.allowed_emails.len()
    );

    // Block explorer client
    let explorer = MempoolSpaceProvider::new(
        &config.explorer_base_url,
        Duration::from_secs(config.explorer_timeout_secs),
    )
    .expect("Failed to build explorer HTTP client");

    let addr: SocketAddr = config.server_addr().parse().expect("Invalid address");
    let app_state = Arc::new(AppContext::new(config, Arc::new(explorer)));

    // Configure CORS policy
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::ORIGIN])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_LENGTH])
        .max_age(Duration::from_secs(3600));

    // Set up API routes
    let app = handlers::router(app_state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(RequestBodyLimitLayer::new(64 * 1024))
            .layer(TimeoutLayer::new(Duration::from_secs(90)))
            .layer(cors),
    );

    // Start HTTP server
    tracing::info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");
    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
