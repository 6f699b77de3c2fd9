use axum::{
    routing::{get, post},
    Router,
};
use opse_ghunt::config::Config;
use opse_ghunt::db::Database;
use opse_ghunt::db_storage::PgProfileSink;
use opse_ghunt::enrichment::GhuntTool;
use opse_ghunt::handlers::{self, AppState};
use opse_ghunt::services::{MemoryProfileSink, ProfileSink};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the application.
///
/// Initializes tracing, configuration, the profile sink and the GHunt tool, then
/// serves the tool over HTTP.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "opse_ghunt=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let sink: Arc<dyn ProfileSink> = match config.database_url.as_deref() {
        Some(url) => {
            let db = Database::new(url).await?;
            tracing::info!("Database connection pool established");
            Arc::new(PgProfileSink::new(db.pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, enriched profiles are kept in memory");
            Arc::new(MemoryProfileSink::new())
        }
    };

    let tool = GhuntTool::from_config(&config, sink)?;
    tracing::info!("GHunt tool wired to gateway {}", config.ghunt_gateway_url);

    let app_state = Arc::new(AppState {
        config: config.clone(),
        tool: Arc::new(tool),
    });

    // Lookups are slow and hit Google on our behalf: 1 request/second per IP, burst of 5
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(1)
            .burst_size(5)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
    );

    let protected_routes = Router::new()
        .route("/api/v1/tool", get(handlers::tool_descriptor))
        .route("/api/v1/hunt", post(handlers::hunt))
        .route("/api/v1/location", post(handlers::probable_location))
        .route("/api/v1/profiles/enrich", post(handlers::enrich_profile))
        .layer(
            ServiceBuilder::new()
                // Request size limit: 1MB max payload
                .layer(RequestBodyLimitLayer::new(1024 * 1024))
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
