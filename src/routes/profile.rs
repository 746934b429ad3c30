use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;

use crate::{
    auth::CurrentUser,
    error::AppResult,
    models::Theme,
    routes::AppState,
    services::profile::{self, Profile, ProfileUpdate},
};

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub bio: Option<String>,
    pub avatar_uri: Option<String>,
    pub theme: Option<Theme>,
}

impl From<UpdateProfileRequest> for ProfileUpdate {
    fn from(request: UpdateProfileRequest) -> Self {
        Self {
            username: request.username,
            bio: request.bio,
            avatar_uri: request.avatar_uri,
            theme: request.theme,
        }
    }
}

pub async fn get_me(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<Profile>> {
    let profile = profile::get_profile(state.store.as_ref(), user.id).await?;
    Ok(Json(profile))
}

pub async fn update_me(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<UpdateProfileRequest>,
) -> AppResult<Json<Profile>> {
    let profile = profile::update_profile(state.store.as_ref(), user.id, request.into()).await?;
    Ok(Json(profile))
}

pub async fn toggle_genre(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(genre): Path<String>,
) -> AppResult<Json<Profile>> {
    let profile = profile::toggle_genre(state.store.as_ref(), user.id, &genre).await?;
    Ok(Json(profile))
}
