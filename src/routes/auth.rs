use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::Deserialize;

use crate::{
    error::AppResult,
    middleware::RequestId,
    routes::AppState,
    services::accounts::{self, Session},
};

#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

pub async fn sign_up(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<SignUpRequest>,
) -> AppResult<(StatusCode, Json<Session>)> {
    tracing::info!(request_id = %request_id, "Processing sign-up");

    let session = accounts::sign_up(
        state.store.as_ref(),
        &state.auth,
        &request.email,
        &request.password,
        request.username,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn sign_in(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<SignInRequest>,
) -> AppResult<Json<Session>> {
    tracing::info!(request_id = %request_id, "Processing sign-in");

    let session = accounts::sign_in(
        state.store.as_ref(),
        &state.auth,
        &request.email,
        &request.password,
    )
    .await?;

    Ok(Json(session))
}
