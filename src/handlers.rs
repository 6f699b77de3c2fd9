use crate::config::Config;
use crate::enrichment::{is_valid_email, EnrichmentReport, GhuntTool};
use crate::errors::AppError;
use crate::location::LocationEstimate;
use crate::lookup_models::HuntResult;
use crate::models::{EmailRequest, EnrichRequest};
use crate::tool::{Tool, ToolDescriptor};
use axum::{extract::State, http::StatusCode, Json};
use serde_json::json;
use std::sync::Arc;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// The wired GHunt tool.
    pub tool: Arc<GhuntTool>,
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "opse-ghunt",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// GET /api/v1/tool
///
/// Describes the tool the way OPSE registers it.
pub async fn tool_descriptor(State(state): State<Arc<AppState>>) -> Json<ToolDescriptor> {
    Json(state.tool.descriptor())
}

fn require_email(email: &str) -> Result<&str, AppError> {
    let email = email.trim();
    if !is_valid_email(email) {
        return Err(AppError::BadRequest(format!("Invalid email address: {}", email)));
    }
    Ok(email)
}

/// POST /api/v1/hunt
///
/// Resolves one email to its Google account, maps activity and calendar.
///
/// # Returns
///
/// * `Result<Json<HuntResult>, AppError>` - The hunt result, 404 when no account matches.
pub async fn hunt(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<EmailRequest>,
) -> Result<Json<HuntResult>, AppError> {
    let email = require_email(&payload.email)?;
    tracing::info!("POST /hunt - email: {}", email);

    state
        .tool
        .hunt(email)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No Google account for {}", email)))
}

/// POST /api/v1/location
///
/// Estimates the probable location of the account behind one email.
pub async fn probable_location(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<EmailRequest>,
) -> Result<Json<LocationEstimate>, AppError> {
    let email = require_email(&payload.email)?;
    tracing::info!("POST /location - email: {}", email);

    state
        .tool
        .probable_location(email)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No probable location for {}", email)))
}

/// POST /api/v1/profiles/enrich
///
/// Runs the tool over every email of the submitted profile. Malformed addresses
/// are reported per email and do not reject the request.
pub async fn enrich_profile(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<EnrichRequest>,
) -> Result<Json<EnrichmentReport>, AppError> {
    let profile = payload.profile;
    if profile.emails().is_empty() {
        return Err(AppError::BadRequest(
            "Profile must carry at least one email".to_string(),
        ));
    }

    tracing::info!(
        "POST /profiles/enrich - {} email(s)",
        profile.emails().len()
    );
    let report = state.tool.execute(&profile).await?;

    tracing::info!(
        "Enrichment done: {} account(s), {} address(es), {} field failure(s)",
        report.profile.accounts.len(),
        report.profile.addresses.len(),
        report.failures.len()
    );
    Ok(Json(report))
}
