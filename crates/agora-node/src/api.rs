//! HTTP API for the Agora node.

use crate::models::Post;
use crate::storage::{PersistentStore, Storage};
use agora_moderation::{
    Error as ModerationError, ModerationEngine, Outcome, VoteSession,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Shared state for API handlers.
pub struct ApiState {
    pub storage: Arc<Storage>,
    pub engine: ModerationEngine<PersistentStore>,
}

type AppState = Arc<ApiState>;

/// Build the API router.
pub fn build_router(state: AppState) -> Router {
    // CORS layer for browser access
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/health", get(health))
        .route("/ready", get(ready))
        // Posts
        .route("/api/v1/posts", get(list_posts))
        .route("/api/v1/posts", post(create_post))
        .route("/api/v1/posts/:id", get(get_post))
        // Moderation
        .route("/api/v1/posts/:id/report", post(report_post))
        .route("/api/v1/posts/:id/vote", post(cast_vote))
        .route("/api/v1/posts/:id/resolve", post(resolve_vote))
        .route("/api/v1/posts/:id/moderation", get(get_session))
        .route("/api/v1/posts/:id/moderation/:principal", get(moderation_status))
        .route("/api/v1/reported", get(list_reported))
        .layer(cors)
        .with_state(state)
}

/// Current wall-clock time, seconds since the Unix epoch.
fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

// --- Error mapping ---

/// JSON error body for business failures.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

/// Moderation error carried out of a handler.
struct ApiError(ModerationError);

impl From<ModerationError> for ApiError {
    fn from(e: ModerationError) -> Self {
        Self(e)
    }
}

fn error_code(e: &ModerationError) -> &'static str {
    match e {
        ModerationError::ContentNotFound(_) => "contentNotFound",
        ModerationError::AlreadyReported(_) => "alreadyReported",
        ModerationError::SessionNotFound(_) => "sessionNotFound",
        ModerationError::VotingClosed(_) => "votingClosed",
        ModerationError::AlreadyVoted { .. } => "alreadyVoted",
        ModerationError::VotingStillActive { .. } => "votingStillActive",
        ModerationError::AlreadyResolved(_) => "alreadyResolved",
        ModerationError::StoreUnavailable(_) => "storeUnavailable",
    }
}

fn error_status(e: &ModerationError) -> StatusCode {
    match e {
        ModerationError::ContentNotFound(_) | ModerationError::SessionNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        ModerationError::AlreadyReported(_)
        | ModerationError::VotingClosed(_)
        | ModerationError::AlreadyVoted { .. }
        | ModerationError::VotingStillActive { .. }
        | ModerationError::AlreadyResolved(_) => StatusCode::CONFLICT,
        ModerationError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: error_code(&self.0),
            message: self.0.to_string(),
        };
        (error_status(&self.0), Json(body)).into_response()
    }
}

// --- Health endpoints ---

async fn health() -> &'static str {
    "OK"
}

async fn ready() -> &'static str {
    "OK"
}

// --- Post endpoints ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePostRequest {
    author: String,
    body: String,
    image_id: Option<String>,
}

async fn create_post(
    State(state): State<AppState>,
    Json(req): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<Post>), StatusCode> {
    let mut post = Post::new(req.author, req.body, unix_now());
    if let Some(image_id) = req.image_id {
        post = post.with_image(image_id);
    }

    state
        .storage
        .put_post(&post)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok((StatusCode::CREATED, Json(post)))
}

/// The feed: every post that has not been removed by moderation.
async fn list_posts(State(state): State<AppState>) -> Result<Json<Vec<Post>>, StatusCode> {
    let posts = state
        .storage
        .list_posts()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(posts.into_iter().filter(|p| !p.hidden).collect()))
}

async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Post>, StatusCode> {
    match state.storage.get_post(&id) {
        Ok(Some(post)) => Ok(Json(post)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

// --- Moderation endpoints ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportRequest {
    reporter: String,
}

async fn report_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ReportRequest>,
) -> Result<(StatusCode, Json<VoteSession>), ApiError> {
    let session = state
        .engine
        .report(&id.into(), &req.reporter.into(), unix_now())?;
    Ok((StatusCode::CREATED, Json(session)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VoteRequest {
    voter: String,
    in_favor: bool,
}

async fn cast_vote(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<VoteRequest>,
) -> Result<Json<VoteSession>, ApiError> {
    let session = state
        .engine
        .cast_vote(&id.into(), &req.voter.into(), req.in_favor, unix_now())?;
    Ok(Json(session))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResolveResponse {
    session: VoteSession,
    outcome: Outcome,
}

async fn resolve_vote(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ResolveResponse>, ApiError> {
    let resolution = state.engine.resolve(&id.into(), unix_now())?;
    Ok(Json(ResolveResponse {
        session: resolution.session,
        outcome: resolution.outcome,
    }))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<VoteSession>, ApiError> {
    Ok(Json(state.engine.session(&id.into())?))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ModerationStatus {
    has_reported: bool,
    has_voted: bool,
}

async fn moderation_status(
    State(state): State<AppState>,
    Path((id, principal)): Path<(String, String)>,
) -> Result<Json<ModerationStatus>, ApiError> {
    let content_id = id.into();
    let principal = principal.into();
    Ok(Json(ModerationStatus {
        has_reported: state.engine.has_reported(&content_id, &principal)?,
        has_voted: state.engine.has_voted(&content_id, &principal)?,
    }))
}

/// One entry of the reported-content view.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportedEntry {
    session: VoteSession,
    /// Present once the session is resolved.
    outcome: Option<Outcome>,
    /// The post under moderation, if it is still stored.
    post: Option<Post>,
}

async fn list_reported(
    State(state): State<AppState>,
) -> Result<Json<Vec<ReportedEntry>>, ApiError> {
    let sessions = state.engine.sessions()?;
    let entries = sessions
        .into_iter()
        .map(|session| {
            let post = state
                .storage
                .get_post(session.content_id.as_str())
                .ok()
                .flatten();
            let outcome = session.resolved.then(|| session.outcome());
            ReportedEntry {
                session,
                outcome,
                post,
            }
        })
        .collect();
    Ok(Json(entries))
}
