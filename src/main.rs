use axum::{
    routing::{get, post, put},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use led_quiz_api::config::Config;
use led_quiz_api::crm::{self, CrmQueue, HubSpotClient};
use led_quiz_api::handlers::{self, AppState};

/// Main entry point for the application.
///
/// Initializes tracing and configuration, starts the CRM dispatcher, then
/// serves the quiz API with CORS, body-size and rate limits applied.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "led_quiz_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    // HubSpot delivery is optional; without a token events are only logged
    let hubspot_client = match config.hubspot_token.clone() {
        Some(token) => match HubSpotClient::new(config.hubspot_base_url.clone(), token) {
            Ok(client) => {
                tracing::info!("✓ HubSpot client initialized: {}", config.hubspot_base_url);
                Some(client)
            }
            Err(e) => {
                tracing::error!("Failed to initialize HubSpot client: {}", e);
                None
            }
        },
        None => None,
    };

    let (crm_queue, crm_rx) = CrmQueue::new();
    crm::spawn_dispatcher(crm_rx, hubspot_client);
    tracing::info!("CRM dispatcher started");

    let app_state = Arc::new(AppState::new(config.clone(), crm_queue));

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
    );

    let protected_routes = Router::new()
        .route("/api/v1/questions", get(handlers::list_questions))
        .route("/api/v1/sessions", post(handlers::create_session))
        .route(
            "/api/v1/sessions/:id",
            get(handlers::get_session).delete(handlers::reset_session),
        )
        .route("/api/v1/sessions/:id/sector", put(handlers::select_sector))
        .route(
            "/api/v1/sessions/:id/preferences",
            put(handlers::update_preferences),
        )
        .route("/api/v1/sessions/:id/answers", post(handlers::submit_answer))
        .route(
            "/api/v1/sessions/:id/transition",
            post(handlers::complete_transition),
        )
        .route("/api/v1/sessions/:id/contact", post(handlers::submit_contact))
        .route(
            "/api/v1/sessions/:id/email-capture",
            post(handlers::submit_email_capture),
        )
        .route("/api/v1/sessions/:id/result", get(handlers::get_result))
        .route("/api/v1/sessions/:id/guide", get(handlers::get_guide))
        .route(
            "/api/v1/sessions/:id/guide/sections/:number",
            get(handlers::get_guide_section),
        )
        .route(
            "/api/v1/sessions/:id/guide/navigate",
            post(handlers::navigate_guide),
        )
        .route(
            "/api/v1/sessions/:id/guide/profile",
            post(handlers::submit_profile),
        )
        .route(
            "/api/v1/sessions/:id/guide/summary",
            get(handlers::get_guide_summary),
        )
        .route(
            "/api/v1/sessions/:id/guide/summary/download",
            post(handlers::download_guide_summary),
        )
        .layer(
            ServiceBuilder::new()
                // Quiz payloads are small; 1MB is generous
                .layer(RequestBodyLimitLayer::new(1024 * 1024))
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    // Health check bypasses rate limiting
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
