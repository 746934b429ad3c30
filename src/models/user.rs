use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AppError;

pub const BIO_MAX_LEN: usize = 150;
pub const DEFAULT_USERNAME: &str = "User";

/// Display theme preference
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

impl FromStr for Theme {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(AppError::InvalidInput(format!("Unknown theme: {}", other))),
        }
    }
}

/// A registered user
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    /// Lowercased; unique across users
    pub email: String,
    pub username: String,
    pub bio: String,
    pub avatar_uri: Option<String>,
    pub theme: Theme,
    pub favorite_genres: Vec<String>,
    /// Groups the user belongs to, in join order
    pub groups: Vec<Uuid>,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: &str, username: Option<String>, password_hash: String) -> Self {
        let username = username
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_USERNAME.to_string());

        Self {
            id: Uuid::new_v4(),
            email: normalize_email(email),
            username,
            bio: String::new(),
            avatar_uri: None,
            theme: Theme::default(),
            favorite_genres: Vec::new(),
            groups: Vec::new(),
            password_hash,
            created_at: Utc::now(),
        }
    }

    /// Adds the genre if absent, removes it otherwise
    pub fn toggle_genre(&mut self, genre: &str) {
        let genre = genre.trim();
        if let Some(pos) = self.favorite_genres.iter().position(|g| g == genre) {
            self.favorite_genres.remove(pos);
        } else if !genre.is_empty() {
            self.favorite_genres.push(genre.to_string());
        }
    }

    pub fn join_group(&mut self, group_id: Uuid) {
        if !self.groups.contains(&group_id) {
            self.groups.push(group_id);
        }
    }

    pub fn leave_group(&mut self, group_id: Uuid) {
        self.groups.retain(|g| *g != group_id);
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Minimal shape check; delivery is never attempted
pub fn validate_email(email: &str) -> Result<String, AppError> {
    let email = normalize_email(email);
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        }
        None => false,
    };

    if valid && !email.contains(char::is_whitespace) {
        Ok(email)
    } else {
        Err(AppError::InvalidInput(format!("Invalid email: {}", email)))
    }
}
