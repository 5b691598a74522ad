// pulse_social server - HTTP surface over the record-backed services

use axum::Router;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use pulse_social::{api::create_api_router, app_state::AppState, config::Config, seed};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize application state
    let state = AppState::new(config.clone()).await?;

    if config.seed_demo_data {
        seed::seed_demo(&state.store).await?;
    }

    // Build main application router
    let app = Router::new()
        .nest("/api/v1", create_api_router(state))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        );

    // Start server
    let addr = config.server_address();
    info!("pulse_social server listening on http://{}", addr);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
