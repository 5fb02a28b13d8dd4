use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::jwt::AuthUser,
    error::AppError,
    extract::JsonBody,
    state::AppState,
    users::{
        dto::{
            ForgotPasswordRequest, Page, PageQuery, ProfileRequest, PublicUser,
            ResetPasswordRequest, StatusResponse,
        },
        services,
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(register))
        .route("/users/recommended", get(recommend))
        .route("/users/:id", put(update))
        .route("/user", get(me))
}

pub fn password_routes() -> Router<AppState> {
    Router::new()
        .route("/password/forgot", post(forgot_password))
        .route("/password/reset", post(reset_password))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<ProfileRequest>,
) -> Result<(StatusCode, Json<PublicUser>), AppError> {
    let user = services::create_user(state.users.as_ref(), payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state, payload))]
pub async fn update(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<Uuid>,
    JsonBody(payload): JsonBody<ProfileRequest>,
) -> Result<Json<PublicUser>, AppError> {
    let user = services::update_user(state.users.as_ref(), caller, id, payload).await?;
    Ok(Json(user))
}

#[instrument(skip(state))]
pub async fn me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, AppError> {
    Ok(Json(services::current_user(state.users.as_ref(), user_id).await?))
}

#[instrument(skip(state))]
pub async fn recommend(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Query(q): Query<PageQuery>,
) -> Result<Json<Page<PublicUser>>, AppError> {
    Ok(Json(services::recommend_users(state.users.as_ref(), q.number()).await?))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<ForgotPasswordRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    services::request_password_reset(state.users.as_ref(), state.notifier.as_ref(), payload)
        .await?;
    Ok(Json(StatusResponse {
        status: "reset link sent",
    }))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<ResetPasswordRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    services::reset_password(state.users.as_ref(), payload).await?;
    Ok(Json(StatusResponse {
        status: "password updated",
    }))
}
