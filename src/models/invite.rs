use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Invites only exist while pending; accepting or declining deletes them
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InviteStatus {
    Pending,
}

/// A request for the owner of `email` to join a group
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Invite {
    pub id: Uuid,
    pub email: String,
    pub group_id: Uuid,
    pub sent_by: Uuid,
    pub sent_at: DateTime<Utc>,
    pub status: InviteStatus,
}

impl Invite {
    pub fn new(email: String, group_id: Uuid, sent_by: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            email,
            group_id,
            sent_by,
            sent_at: Utc::now(),
            status: InviteStatus::Pending,
        }
    }
}
