use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::CurrentUser,
    error::AppResult,
    models::Invite,
    routes::AppState,
    services::invites,
};

#[derive(Debug, Deserialize)]
pub struct CreateInviteRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct AcceptResponse {
    pub group_id: Uuid,
}

pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(group_id): Path<Uuid>,
    Json(request): Json<CreateInviteRequest>,
) -> AppResult<(StatusCode, Json<Invite>)> {
    let invite = invites::create_invite(state.store.as_ref(), group_id, user.id, &request.email).await?;
    Ok((StatusCode::CREATED, Json(invite)))
}

pub async fn list_mine(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<Vec<Invite>>> {
    let pending = invites::list_pending(state.store.as_ref(), user.id).await?;
    Ok(Json(pending))
}

pub async fn accept(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(invite_id): Path<Uuid>,
) -> AppResult<Json<AcceptResponse>> {
    let group_id = invites::accept_invite(state.store.as_ref(), invite_id, user.id).await?;
    Ok(Json(AcceptResponse { group_id }))
}

pub async fn decline(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(invite_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    invites::decline_invite(state.store.as_ref(), invite_id, user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
