//! REST endpoints for CTA selection and lifecycle events.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tower_http::cors::CorsLayer;
use tracing::warn;

use crate::error::Error;
use crate::onboarding::AppStage;

use super::engine::CtaEngine;
use super::model::Cta;
use super::site::Site;

/// Shared state for CTA routes.
#[derive(Clone)]
pub struct CtaRouteState {
    pub engine: Arc<CtaEngine>,
    /// Executor the refresh snapshot is gathered on.
    pub executor: Handle,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub is_browser_showing: bool,
    #[serde(default)]
    pub site: Option<Site>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub cta: Option<Cta>,
    /// Rendered text for Dax dialogs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Body of every lifecycle event: the CTA the UI acted on.
#[derive(Debug, Deserialize)]
pub struct CtaEvent {
    pub cta: Cta,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OkResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub survey_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StageResponse {
    pub stage: AppStage,
    pub dax_onboarding_complete: bool,
}

fn failure(action: &str, e: Error) -> Response {
    warn!(action, error = %e, "CTA request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({"error": e.to_string()})),
    )
        .into_response()
}

fn done(action: &str, result: crate::error::Result<()>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => failure(action, e),
    }
}

/// POST /api/cta/refresh
///
/// Selects the CTA to show for the home tab or the browsed site.
async fn refresh(
    State(state): State<CtaRouteState>,
    Json(req): Json<RefreshRequest>,
) -> impl IntoResponse {
    let cta = state
        .engine
        .refresh_cta(&state.executor, req.is_browser_showing, req.site)
        .await;
    let message = match &cta {
        Some(Cta::DaxDialog(dialog)) => Some(dialog.message()),
        _ => None,
    };
    Json(RefreshResponse { cta, message })
}

/// POST /api/cta/shown
async fn shown(State(state): State<CtaRouteState>, Json(event): Json<CtaEvent>) -> Response {
    done("shown", state.engine.on_cta_shown(&event.cta).await)
}

/// POST /api/cta/ok
///
/// Returns the survey url to open when the CTA is a survey.
async fn ok(State(state): State<CtaRouteState>, Json(event): Json<CtaEvent>) -> impl IntoResponse {
    let survey_url = state.engine.on_user_click_cta_ok_button(&event.cta);
    Json(OkResponse { survey_url })
}

/// POST /api/cta/secondary
async fn secondary(State(state): State<CtaRouteState>, Json(event): Json<CtaEvent>) -> StatusCode {
    state.engine.on_user_click_cta_secondary_button(&event.cta);
    StatusCode::NO_CONTENT
}

/// POST /api/cta/dismissed
async fn dismissed(State(state): State<CtaRouteState>, Json(event): Json<CtaEvent>) -> Response {
    done("dismissed", state.engine.on_user_dismissed_cta(&event.cta).await)
}

/// POST /api/cta/bubble-dismissed
async fn bubble_dismissed(
    State(state): State<CtaRouteState>,
    Json(event): Json<CtaEvent>,
) -> Response {
    done(
        "bubble-dismissed",
        state.engine.register_dax_bubble_cta_dismissed(&event.cta).await,
    )
}

/// POST /api/cta/hide-forever
async fn hide_forever(State(state): State<CtaRouteState>, Json(event): Json<CtaEvent>) -> Response {
    done("hide-forever", state.engine.hide_tips_forever(&event.cta).await)
}

/// GET /api/cta/stage
async fn stage(State(state): State<CtaRouteState>) -> Response {
    let tracker = state.engine.tracker();
    let result = async {
        let stage = state.engine.deps().stages.user_app_stage().await?;
        let complete = tracker.has_shown_all_required_dax_onboarding_ctas().await?;
        Ok::<_, Error>(StageResponse {
            stage,
            dax_onboarding_complete: complete,
        })
    }
    .await;

    match result {
        Ok(body) => Json(body).into_response(),
        Err(e) => failure("stage", e),
    }
}

/// Build the CTA REST routes.
pub fn cta_routes(state: CtaRouteState) -> Router {
    Router::new()
        .route("/api/cta/refresh", post(refresh))
        .route("/api/cta/shown", post(shown))
        .route("/api/cta/ok", post(ok))
        .route("/api/cta/secondary", post(secondary))
        .route("/api/cta/dismissed", post(dismissed))
        .route("/api/cta/bubble-dismissed", post(bubble_dismissed))
        .route("/api/cta/hide-forever", post(hide_forever))
        .route("/api/cta/stage", get(stage))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
