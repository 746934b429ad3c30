/// Document access for every entity the service owns
///
/// Handlers and services only talk to storage through this trait, so the
/// in-memory backend used in tests and local runs and the PostgreSQL backend
/// used in production are interchangeable. Each method is atomic: multi-document
/// mutations (group creation, cascading deletes, vote toggles, seen marks)
/// happen under one lock or one transaction rather than as client-side
/// read-modify-write sequences.
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        Group, GroupMember, ImdbId, Invite, LeaveOutcome, MovieList, MovieListEntry, Rating,
        User, Vote, VoteValue,
    },
};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

#[async_trait::async_trait]
pub trait Store: Send + Sync {
    // Users

    /// Fails with `Conflict` when the email is already registered
    async fn create_user(&self, user: User) -> AppResult<User>;
    async fn get_user(&self, user_id: Uuid) -> AppResult<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> AppResult<Option<User>>;
    /// Persists profile fields; group membership is managed by the group methods
    async fn update_user(&self, user: User) -> AppResult<User>;
    async fn get_users(&self, user_ids: &[Uuid]) -> AppResult<Vec<User>>;

    // Groups

    /// Inserts the group, its movie list and the admin membership together
    async fn create_group(&self, group: Group, list: MovieList, admin: GroupMember)
        -> AppResult<Group>;
    async fn get_group(&self, group_id: Uuid) -> AppResult<Option<Group>>;
    async fn update_group(&self, group: Group) -> AppResult<Group>;
    /// Removes the group with its list, memberships, votes and invites
    async fn delete_group(&self, group_id: Uuid) -> AppResult<()>;
    async fn list_groups_for_user(&self, user_id: Uuid) -> AppResult<Vec<Group>>;

    // Memberships

    /// Fails with `Conflict` when the user is already a member
    async fn add_member(&self, member: GroupMember) -> AppResult<()>;
    async fn remove_member(&self, group_id: Uuid, user_id: Uuid) -> AppResult<()>;
    /// Removes the member, or the whole group when they were the last one.
    /// Fails with `Conflict` for the last admin while others remain.
    async fn leave_group(&self, group_id: Uuid, user_id: Uuid) -> AppResult<LeaveOutcome>;
    async fn get_member(&self, group_id: Uuid, user_id: Uuid) -> AppResult<Option<GroupMember>>;
    async fn list_members(&self, group_id: Uuid) -> AppResult<Vec<GroupMember>>;

    // Movie lists

    async fn list_entries(&self, list_id: Uuid) -> AppResult<Vec<MovieListEntry>>;
    /// Fails with `Conflict` when the movie is already listed
    async fn add_entry(&self, list_id: Uuid, entry: MovieListEntry) -> AppResult<()>;
    /// Removes the entry and the group's votes on it
    async fn remove_entry(&self, list_id: Uuid, group_id: Uuid, imdb_id: &ImdbId)
        -> AppResult<()>;
    /// Removes the movie if listed (with the group's votes on it), otherwise
    /// inserts `entry`. Returns whether the movie is now listed.
    async fn toggle_entry(&self, list_id: Uuid, group_id: Uuid, entry: MovieListEntry)
        -> AppResult<bool>;
    /// Updates the entry's watchers and the user's vote document
    async fn set_watched(
        &self,
        list_id: Uuid,
        group_id: Uuid,
        imdb_id: &ImdbId,
        user_id: Uuid,
        seen: bool,
        at: DateTime<Utc>,
    ) -> AppResult<MovieListEntry>;

    // Votes

    async fn get_vote(&self, user_id: Uuid, imdb_id: &ImdbId, group_id: Uuid)
        -> AppResult<Option<Vote>>;
    /// Toggles the user's vote and returns the resulting document
    async fn apply_vote(
        &self,
        user_id: Uuid,
        imdb_id: &ImdbId,
        group_id: Uuid,
        value: VoteValue,
        at: DateTime<Utc>,
    ) -> AppResult<Vote>;
    async fn list_group_votes(&self, group_id: Uuid) -> AppResult<Vec<Vote>>;

    // Ratings

    async fn upsert_rating(&self, rating: Rating) -> AppResult<Rating>;
    async fn get_rating(&self, user_id: Uuid, imdb_id: &ImdbId) -> AppResult<Option<Rating>>;
    async fn list_ratings(&self, imdb_ids: &[ImdbId]) -> AppResult<Vec<Rating>>;

    // Invites

    /// Fails with `Conflict` when the same email already has a pending invite to the group
    async fn create_invite(&self, invite: Invite) -> AppResult<Invite>;
    async fn get_invite(&self, invite_id: Uuid) -> AppResult<Option<Invite>>;
    async fn list_pending_invites(&self, email: &str) -> AppResult<Vec<Invite>>;
    async fn delete_invite(&self, invite_id: Uuid) -> AppResult<()>;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}
