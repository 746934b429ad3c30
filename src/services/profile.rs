use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{user::BIO_MAX_LEN, Theme, User},
    store::Store,
};

/// A user as shown to themselves; never carries the password hash
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub bio: String,
    pub avatar_uri: Option<String>,
    pub theme: Theme,
    pub favorite_genres: Vec<String>,
    pub groups: Vec<Uuid>,
}

impl From<User> for Profile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            bio: user.bio,
            avatar_uri: user.avatar_uri,
            theme: user.theme,
            favorite_genres: user.favorite_genres,
            groups: user.groups,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub bio: Option<String>,
    pub avatar_uri: Option<String>,
    pub theme: Option<Theme>,
}

async fn load_user(store: &dyn Store, user_id: Uuid) -> AppResult<User> {
    store
        .get_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))
}

pub async fn get_profile(store: &dyn Store, user_id: Uuid) -> AppResult<Profile> {
    load_user(store, user_id).await.map(Profile::from)
}

pub async fn update_profile(
    store: &dyn Store,
    user_id: Uuid,
    update: ProfileUpdate,
) -> AppResult<Profile> {
    let mut user = load_user(store, user_id).await?;

    if let Some(username) = update.username {
        let username = username.trim();
        if username.is_empty() {
            return Err(AppError::InvalidInput("Username cannot be empty".to_string()));
        }
        user.username = username.to_string();
    }
    if let Some(bio) = update.bio {
        if bio.chars().count() > BIO_MAX_LEN {
            return Err(AppError::InvalidInput(format!(
                "Bio must be at most {} characters",
                BIO_MAX_LEN
            )));
        }
        user.bio = bio;
    }
    if let Some(avatar) = update.avatar_uri {
        let avatar = avatar.trim().to_string();
        user.avatar_uri = (!avatar.is_empty()).then_some(avatar);
    }
    if let Some(theme) = update.theme {
        user.theme = theme;
    }

    let user = store.update_user(user).await?;
    tracing::info!(user_id = %user_id, "Profile updated");
    Ok(user.into())
}

/// Adds or removes a favorite genre
pub async fn toggle_genre(store: &dyn Store, user_id: Uuid, genre: &str) -> AppResult<Profile> {
    if genre.trim().is_empty() {
        return Err(AppError::InvalidInput("Genre cannot be empty".to_string()));
    }
    let mut user = load_user(store, user_id).await?;
    user.toggle_genre(genre);
    Ok(store.update_user(user).await?.into())
}
