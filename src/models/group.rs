use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AppError;

/// Membership role within a group
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Member => "member",
        }
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "member" => Ok(Role::Member),
            other => Err(AppError::Internal(format!("Unknown role: {}", other))),
        }
    }
}

/// How a group's watchlist is ordered
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum SortPreference {
    /// Critic score, highest first
    #[default]
    #[serde(rename = "Rotten Tomatoes Rating")]
    RottenTomatoes,
    /// Net vote score, highest first
    #[serde(rename = "Liked")]
    Liked,
    /// Fewest members seen first
    #[serde(rename = "Not seen")]
    NotSeen,
    /// Insertion order
    #[serde(rename = "Chronological")]
    Chronological,
}

impl SortPreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortPreference::RottenTomatoes => "Rotten Tomatoes Rating",
            SortPreference::Liked => "Liked",
            SortPreference::NotSeen => "Not seen",
            SortPreference::Chronological => "Chronological",
        }
    }
}

impl FromStr for SortPreference {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Rotten Tomatoes Rating" => Ok(SortPreference::RottenTomatoes),
            "Liked" => Ok(SortPreference::Liked),
            "Not seen" => Ok(SortPreference::NotSeen),
            "Chronological" => Ok(SortPreference::Chronological),
            other => Err(AppError::InvalidInput(format!(
                "Unknown sort preference: {}",
                other
            ))),
        }
    }
}

/// A set of users sharing one watchlist
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub profile_picture: Option<String>,
    pub sort_by: SortPreference,
    pub fairness_filter: bool,
    pub movie_list_id: Uuid,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_updated_by: Option<Uuid>,
}

impl Group {
    /// Builds a group owned by `created_by`; the name must be non-blank
    pub fn new(name: &str, created_by: Uuid) -> Result<Self, AppError> {
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            name: validate_group_name(name)?,
            profile_picture: None,
            sort_by: SortPreference::default(),
            fairness_filter: true,
            movie_list_id: Uuid::new_v4(),
            created_by,
            created_at: now,
            updated_at: now,
            last_updated_by: None,
        })
    }
}

pub fn validate_group_name(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::InvalidInput("Group name required".to_string()));
    }
    Ok(name.to_string())
}

/// A user's membership in a group
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupMember {
    pub group_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
}

impl GroupMember {
    pub fn new(group_id: Uuid, user_id: Uuid, role: Role) -> Self {
        Self {
            group_id,
            user_id,
            role,
            joined_at: Utc::now(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// What happened when a member left
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveOutcome {
    Left,
    /// The caller was the last member, so the group is gone
    GroupDeleted,
}

impl LeaveOutcome {
    /// Decides a leave against the group's current members
    ///
    /// The last admin cannot leave while anyone else remains.
    pub fn decide(members: &[GroupMember], user_id: Uuid) -> Result<Self, AppError> {
        let leaving = members
            .iter()
            .find(|m| m.user_id == user_id)
            .ok_or_else(|| AppError::NotFound("Not a member of this group".to_string()))?;

        if members.len() == 1 {
            return Ok(LeaveOutcome::GroupDeleted);
        }

        let other_admins = members
            .iter()
            .filter(|m| m.user_id != user_id && m.is_admin())
            .count();
        if leaving.is_admin() && other_admins == 0 {
            return Err(AppError::Conflict(
                "The last admin cannot leave while other members remain".to_string(),
            ));
        }
        Ok(LeaveOutcome::Left)
    }
}
