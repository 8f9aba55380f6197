//! services/panel/src/bin/panel.rs

use panel_lib::{
    adapters::upstream::UpstreamClient,
    config::Config,
    error::PanelError,
    web::{
        auth::{
            change_password_handler, forgot_password_handler, login_handler, logout_handler,
            reset_password_handler, verify_otp_handler, verify_reset_token_handler,
        },
        leads::{decide_lead_handler, get_lead_handler, list_leads_handler},
        middleware::require_auth,
        sessions::SessionStore,
        state::AppState,
        ApiDoc,
    },
};
use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::post,
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), PanelError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Initialize the Upstream Adapter ---
    // One client serves both ports; it holds the connection pool.
    let upstream = Arc::new(UpstreamClient::new(
        reqwest::Client::new(),
        config.api_url.clone(),
    ));
    info!("Forwarding lead and auth traffic to {}", config.api_url);

    // --- 3. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        leads: upstream.clone(),
        auth: upstream,
        sessions: SessionStore::new(config.session_ttl_minutes),
        config: config.clone(),
    });

    let cors = CorsLayer::new()
        .allow_origin(
            config
                .allowed_origin
                .parse::<HeaderValue>()
                .map_err(|e| PanelError::Internal(format!("Invalid ALLOWED_ORIGIN: {}", e)))?,
        )
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 4. Create the Web Router ---
    // Public routes (no session required)
    let public_routes = Router::new()
        .route("/auth/login", post(login_handler))
        .route("/auth/verify-otp", post(verify_otp_handler))
        .route("/auth/forgot-password", post(forgot_password_handler))
        .route("/auth/verify-reset-token", post(verify_reset_token_handler))
        .route("/auth/reset-password", post(reset_password_handler));

    // Protected routes (session required)
    let protected_routes = Router::new()
        .route("/auth/logout", post(logout_handler))
        .route("/auth/change-password", post(change_password_handler))
        .route("/lead/list", post(list_leads_handler))
        .route("/lead/get", post(get_lead_handler))
        .route("/lead/decision", post(decide_lead_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    // Combine API routes
    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
