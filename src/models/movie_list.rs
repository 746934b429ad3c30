use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use super::ImdbId;

/// The shared list owned by one group
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovieList {
    pub id: Uuid,
    pub group_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl MovieList {
    pub fn new(id: Uuid, group_id: Uuid) -> Self {
        Self {
            id,
            group_id,
            created_at: Utc::now(),
        }
    }
}

/// One title on a group's list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovieListEntry {
    pub imdb_id: ImdbId,
    pub added_by: Uuid,
    pub added_at: DateTime<Utc>,
    /// Users who marked the title seen
    pub watched_by: BTreeSet<Uuid>,
    /// When the title was last marked seen by anyone
    pub last_watched_at: Option<DateTime<Utc>>,
}

impl MovieListEntry {
    pub fn new(imdb_id: ImdbId, added_by: Uuid) -> Self {
        Self {
            imdb_id,
            added_by,
            added_at: Utc::now(),
            watched_by: BTreeSet::new(),
            last_watched_at: None,
        }
    }

    /// Records or clears `user_id`'s seen mark
    pub fn set_watched(&mut self, user_id: Uuid, seen: bool, at: DateTime<Utc>) {
        if seen {
            self.watched_by.insert(user_id);
            self.last_watched_at = Some(at);
        } else {
            self.watched_by.remove(&user_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_watched() {
        let mut entry = MovieListEntry::new("tt1375666".parse().unwrap(), Uuid::new_v4());
        let user = Uuid::new_v4();
        let at = Utc::now();

        entry.set_watched(user, true, at);
        assert!(entry.watched_by.contains(&user));
        assert_eq!(entry.last_watched_at, Some(at));

        entry.set_watched(user, false, Utc::now());
        assert!(entry.watched_by.is_empty());
        // Unmarking keeps the last watch time
        assert_eq!(entry.last_watched_at, Some(at));
    }
}
