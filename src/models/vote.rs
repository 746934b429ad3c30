use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::ImdbId;
use crate::error::AppError;

/// Thumbs up or down
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VoteValue {
    Up,
    Down,
}

impl VoteValue {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteValue::Up => "up",
            VoteValue::Down => "down",
        }
    }
}

impl FromStr for VoteValue {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(VoteValue::Up),
            "down" => Ok(VoteValue::Down),
            other => Err(AppError::InvalidInput(format!("Unknown vote: {}", other))),
        }
    }
}

/// A user's signal on one movie within one group
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Vote {
    pub user_id: Uuid,
    pub imdb_id: ImdbId,
    pub group_id: Uuid,
    pub vote: Option<VoteValue>,
    pub seen: bool,
    pub updated_at: DateTime<Utc>,
}

impl Vote {
    pub fn new(user_id: Uuid, imdb_id: ImdbId, group_id: Uuid) -> Self {
        Self {
            user_id,
            imdb_id,
            group_id,
            vote: None,
            seen: false,
            updated_at: Utc::now(),
        }
    }

    /// Casting the current value again clears it; any other value replaces it
    pub fn toggle(&mut self, value: VoteValue, at: DateTime<Utc>) {
        self.vote = if self.vote == Some(value) {
            None
        } else {
            Some(value)
        };
        self.updated_at = at;
    }

    pub fn matches(&self, imdb_id: &ImdbId, group_id: Uuid) -> bool {
        self.group_id == group_id && &self.imdb_id == imdb_id
    }
}

/// Star value between 1 and 5
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Stars(u8);

impl Stars {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Stars {
    type Error = AppError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(AppError::InvalidInput(format!(
                "Rating must be between {} and {} stars",
                Self::MIN,
                Self::MAX
            )))
        }
    }
}

impl From<Stars> for u8 {
    fn from(stars: Stars) -> Self {
        stars.0
    }
}

/// A user's star rating of a movie, shared across groups
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Rating {
    pub user_id: Uuid,
    pub imdb_id: ImdbId,
    pub stars: Stars,
    pub updated_at: DateTime<Utc>,
}
