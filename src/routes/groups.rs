use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::CurrentUser,
    error::AppResult,
    middleware::RequestId,
    models::{Group, SortPreference},
    routes::AppState,
    services::groups::{self, GroupUpdate, LeaveOutcome, MemberView},
};

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateGroupRequest {
    pub name: Option<String>,
    pub profile_picture: Option<String>,
    pub sort_by: Option<SortPreference>,
    pub fairness_filter: Option<bool>,
}

impl From<UpdateGroupRequest> for GroupUpdate {
    fn from(request: UpdateGroupRequest) -> Self {
        Self {
            name: request.name,
            profile_picture: request.profile_picture,
            sort_by: request.sort_by,
            fairness_filter: request.fairness_filter,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LeaveResponse {
    pub outcome: LeaveOutcome,
}

pub async fn list(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<Vec<Group>>> {
    let groups = groups::list_for_user(state.store.as_ref(), user.id).await?;
    Ok(Json(groups))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    user: CurrentUser,
    Json(request): Json<CreateGroupRequest>,
) -> AppResult<(StatusCode, Json<Group>)> {
    tracing::info!(request_id = %request_id, user_id = %user.id, "Creating group");
    let group = groups::create_group(state.store.as_ref(), user.id, &request.name).await?;
    Ok((StatusCode::CREATED, Json(group)))
}

pub async fn get(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(group_id): Path<Uuid>,
) -> AppResult<Json<Group>> {
    let group = groups::get_group(state.store.as_ref(), group_id, user.id).await?;
    Ok(Json(group))
}

pub async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(group_id): Path<Uuid>,
    Json(request): Json<UpdateGroupRequest>,
) -> AppResult<Json<Group>> {
    let group = groups::update_group(state.store.as_ref(), group_id, user.id, request.into()).await?;
    Ok(Json(group))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    user: CurrentUser,
    Path(group_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    tracing::info!(request_id = %request_id, group_id = %group_id, "Deleting group");
    groups::delete_group(state.store.as_ref(), group_id, user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn members(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(group_id): Path<Uuid>,
) -> AppResult<Json<Vec<MemberView>>> {
    let members = groups::list_members(state.store.as_ref(), group_id, user.id).await?;
    Ok(Json(members))
}

pub async fn leave(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(group_id): Path<Uuid>,
) -> AppResult<Json<LeaveResponse>> {
    let outcome = groups::leave_group(state.store.as_ref(), group_id, user.id).await?;
    Ok(Json(LeaveResponse { outcome }))
}
