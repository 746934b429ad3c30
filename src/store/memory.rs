use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::Store;
use crate::{
    error::{AppError, AppResult},
    models::{
        Group, GroupMember, ImdbId, Invite, LeaveOutcome, MovieList, MovieListEntry, Rating,
        User, Vote, VoteValue,
    },
};

type VoteKey = (Uuid, ImdbId, Uuid);
type RatingKey = (Uuid, ImdbId);

/// Process-local store; all collections share one lock so every method is atomic
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    /// email -> user id
    emails: HashMap<String, Uuid>,
    groups: HashMap<Uuid, Group>,
    /// group id -> members in join order
    members: HashMap<Uuid, Vec<GroupMember>>,
    /// movie list id -> entries in insertion order
    lists: HashMap<Uuid, Vec<MovieListEntry>>,
    votes: HashMap<VoteKey, Vote>,
    ratings: HashMap<RatingKey, Rating>,
    invites: HashMap<Uuid, Invite>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Inner {
    fn user_mut(&mut self, user_id: Uuid) -> AppResult<&mut User> {
        self.users
            .get_mut(&user_id)
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))
    }

    fn entries_mut(&mut self, list_id: Uuid) -> AppResult<&mut Vec<MovieListEntry>> {
        self.lists
            .get_mut(&list_id)
            .ok_or_else(|| AppError::NotFound(format!("Movie list {} not found", list_id)))
    }

    fn remove_group(&mut self, group_id: Uuid) -> AppResult<()> {
        let group = self
            .groups
            .remove(&group_id)
            .ok_or_else(|| AppError::NotFound(format!("Group {} not found", group_id)))?;

        for member in self.members.remove(&group_id).unwrap_or_default() {
            if let Some(user) = self.users.get_mut(&member.user_id) {
                user.leave_group(group_id);
            }
        }
        self.lists.remove(&group.movie_list_id);
        self.votes.retain(|(_, _, g), _| *g != group_id);
        self.invites.retain(|_, invite| invite.group_id != group_id);
        Ok(())
    }

    fn remove_votes_on(&mut self, group_id: Uuid, imdb_id: &ImdbId) {
        self.votes
            .retain(|(_, movie, g), _| !(movie == imdb_id && *g == group_id));
    }
}

#[async_trait::async_trait]
impl Store for InMemoryStore {
    async fn create_user(&self, user: User) -> AppResult<User> {
        let mut inner = self.inner.write().await;
        if inner.emails.contains_key(&user.email) {
            return Err(AppError::Conflict(format!(
                "Email {} is already registered",
                user.email
            )));
        }
        inner.emails.insert(user.email.clone(), user.id);
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, user_id: Uuid) -> AppResult<Option<User>> {
        Ok(self.inner.read().await.users.get(&user_id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner
            .emails
            .get(email)
            .and_then(|id| inner.users.get(id))
            .cloned())
    }

    async fn update_user(&self, user: User) -> AppResult<User> {
        let mut inner = self.inner.write().await;
        let existing = inner.user_mut(user.id)?;
        existing.username = user.username;
        existing.bio = user.bio;
        existing.avatar_uri = user.avatar_uri;
        existing.theme = user.theme;
        existing.favorite_genres = user.favorite_genres;
        Ok(existing.clone())
    }

    async fn get_users(&self, user_ids: &[Uuid]) -> AppResult<Vec<User>> {
        let inner = self.inner.read().await;
        Ok(user_ids
            .iter()
            .filter_map(|id| inner.users.get(id).cloned())
            .collect())
    }

    async fn create_group(
        &self,
        group: Group,
        list: MovieList,
        admin: GroupMember,
    ) -> AppResult<Group> {
        let mut inner = self.inner.write().await;
        inner.user_mut(admin.user_id)?.join_group(group.id);
        inner.members.insert(group.id, vec![admin]);
        inner.lists.insert(list.id, Vec::new());
        inner.groups.insert(group.id, group.clone());
        Ok(group)
    }

    async fn get_group(&self, group_id: Uuid) -> AppResult<Option<Group>> {
        Ok(self.inner.read().await.groups.get(&group_id).cloned())
    }

    async fn update_group(&self, group: Group) -> AppResult<Group> {
        let mut inner = self.inner.write().await;
        match inner.groups.get_mut(&group.id) {
            Some(existing) => {
                *existing = group.clone();
                Ok(group)
            }
            None => Err(AppError::NotFound(format!("Group {} not found", group.id))),
        }
    }

    async fn delete_group(&self, group_id: Uuid) -> AppResult<()> {
        self.inner.write().await.remove_group(group_id)
    }

    async fn list_groups_for_user(&self, user_id: Uuid) -> AppResult<Vec<Group>> {
        let inner = self.inner.read().await;
        let Some(user) = inner.users.get(&user_id) else {
            return Ok(Vec::new());
        };
        Ok(user
            .groups
            .iter()
            .filter_map(|id| inner.groups.get(id).cloned())
            .collect())
    }

    async fn add_member(&self, member: GroupMember) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.groups.contains_key(&member.group_id) {
            return Err(AppError::NotFound(format!(
                "Group {} not found",
                member.group_id
            )));
        }
        inner.user_mut(member.user_id)?;
        let members = inner.members.entry(member.group_id).or_default();
        if members.iter().any(|m| m.user_id == member.user_id) {
            return Err(AppError::Conflict("Already a member of this group".to_string()));
        }
        members.push(member.clone());
        inner.user_mut(member.user_id)?.join_group(member.group_id);
        Ok(())
    }

    async fn remove_member(&self, group_id: Uuid, user_id: Uuid) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        let members = inner.members.entry(group_id).or_default();
        let before = members.len();
        members.retain(|m| m.user_id != user_id);
        if members.len() == before {
            return Err(AppError::NotFound("Not a member of this group".to_string()));
        }
        if let Some(user) = inner.users.get_mut(&user_id) {
            user.leave_group(group_id);
        }
        Ok(())
    }

    async fn leave_group(&self, group_id: Uuid, user_id: Uuid) -> AppResult<LeaveOutcome> {
        let mut inner = self.inner.write().await;
        if !inner.groups.contains_key(&group_id) {
            return Err(AppError::NotFound(format!("Group {} not found", group_id)));
        }
        let members = inner.members.entry(group_id).or_default();
        let outcome = LeaveOutcome::decide(members, user_id)?;
        match outcome {
            LeaveOutcome::GroupDeleted => inner.remove_group(group_id)?,
            LeaveOutcome::Left => {
                members.retain(|m| m.user_id != user_id);
                if let Some(user) = inner.users.get_mut(&user_id) {
                    user.leave_group(group_id);
                }
            }
        }
        Ok(outcome)
    }

    async fn get_member(&self, group_id: Uuid, user_id: Uuid) -> AppResult<Option<GroupMember>> {
        let inner = self.inner.read().await;
        Ok(inner
            .members
            .get(&group_id)
            .and_then(|members| members.iter().find(|m| m.user_id == user_id))
            .cloned())
    }

    async fn list_members(&self, group_id: Uuid) -> AppResult<Vec<GroupMember>> {
        let inner = self.inner.read().await;
        Ok(inner.members.get(&group_id).cloned().unwrap_or_default())
    }

    async fn list_entries(&self, list_id: Uuid) -> AppResult<Vec<MovieListEntry>> {
        let inner = self.inner.read().await;
        Ok(inner
            .lists
            .get(&list_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn add_entry(&self, list_id: Uuid, entry: MovieListEntry) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        let entries = inner.entries_mut(list_id)?;
        if entries.iter().any(|e| e.imdb_id == entry.imdb_id) {
            return Err(AppError::Conflict(format!(
                "{} is already on the watchlist",
                entry.imdb_id
            )));
        }
        entries.push(entry);
        Ok(())
    }

    async fn remove_entry(
        &self,
        list_id: Uuid,
        group_id: Uuid,
        imdb_id: &ImdbId,
    ) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        let entries = inner.entries_mut(list_id)?;
        let before = entries.len();
        entries.retain(|e| &e.imdb_id != imdb_id);
        if entries.len() == before {
            return Err(AppError::NotFound(format!(
                "{} is not on the watchlist",
                imdb_id
            )));
        }
        inner.remove_votes_on(group_id, imdb_id);
        Ok(())
    }

    async fn toggle_entry(
        &self,
        list_id: Uuid,
        group_id: Uuid,
        entry: MovieListEntry,
    ) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        let entries = inner.entries_mut(list_id)?;
        match entries.iter().position(|e| e.imdb_id == entry.imdb_id) {
            Some(index) => {
                entries.remove(index);
                inner.remove_votes_on(group_id, &entry.imdb_id);
                Ok(false)
            }
            None => {
                entries.push(entry);
                Ok(true)
            }
        }
    }

    async fn set_watched(
        &self,
        list_id: Uuid,
        group_id: Uuid,
        imdb_id: &ImdbId,
        user_id: Uuid,
        seen: bool,
        at: DateTime<Utc>,
    ) -> AppResult<MovieListEntry> {
        let mut inner = self.inner.write().await;
        let entry = inner
            .entries_mut(list_id)?
            .iter_mut()
            .find(|e| &e.imdb_id == imdb_id)
            .ok_or_else(|| AppError::NotFound(format!("{} is not on the watchlist", imdb_id)))?;
        entry.set_watched(user_id, seen, at);
        let entry = entry.clone();

        let vote = inner
            .votes
            .entry((user_id, imdb_id.clone(), group_id))
            .or_insert_with(|| Vote::new(user_id, imdb_id.clone(), group_id));
        vote.seen = seen;
        vote.updated_at = at;

        Ok(entry)
    }

    async fn get_vote(
        &self,
        user_id: Uuid,
        imdb_id: &ImdbId,
        group_id: Uuid,
    ) -> AppResult<Option<Vote>> {
        let inner = self.inner.read().await;
        Ok(inner
            .votes
            .get(&(user_id, imdb_id.clone(), group_id))
            .cloned())
    }

    async fn apply_vote(
        &self,
        user_id: Uuid,
        imdb_id: &ImdbId,
        group_id: Uuid,
        value: VoteValue,
        at: DateTime<Utc>,
    ) -> AppResult<Vote> {
        let mut inner = self.inner.write().await;
        let vote = inner
            .votes
            .entry((user_id, imdb_id.clone(), group_id))
            .or_insert_with(|| Vote::new(user_id, imdb_id.clone(), group_id));
        vote.toggle(value, at);
        Ok(vote.clone())
    }

    async fn list_group_votes(&self, group_id: Uuid) -> AppResult<Vec<Vote>> {
        let inner = self.inner.read().await;
        Ok(inner
            .votes
            .values()
            .filter(|v| v.group_id == group_id)
            .cloned()
            .collect())
    }

    async fn upsert_rating(&self, rating: Rating) -> AppResult<Rating> {
        let mut inner = self.inner.write().await;
        inner
            .ratings
            .insert((rating.user_id, rating.imdb_id.clone()), rating.clone());
        Ok(rating)
    }

    async fn get_rating(&self, user_id: Uuid, imdb_id: &ImdbId) -> AppResult<Option<Rating>> {
        let inner = self.inner.read().await;
        Ok(inner.ratings.get(&(user_id, imdb_id.clone())).cloned())
    }

    async fn list_ratings(&self, imdb_ids: &[ImdbId]) -> AppResult<Vec<Rating>> {
        let inner = self.inner.read().await;
        Ok(inner
            .ratings
            .values()
            .filter(|r| imdb_ids.contains(&r.imdb_id))
            .cloned()
            .collect())
    }

    async fn create_invite(&self, invite: Invite) -> AppResult<Invite> {
        let mut inner = self.inner.write().await;
        let duplicate = inner
            .invites
            .values()
            .any(|i| i.group_id == invite.group_id && i.email == invite.email);
        if duplicate {
            return Err(AppError::Conflict(format!(
                "{} already has a pending invite to this group",
                invite.email
            )));
        }
        inner.invites.insert(invite.id, invite.clone());
        Ok(invite)
    }

    async fn get_invite(&self, invite_id: Uuid) -> AppResult<Option<Invite>> {
        Ok(self.inner.read().await.invites.get(&invite_id).cloned())
    }

    async fn list_pending_invites(&self, email: &str) -> AppResult<Vec<Invite>> {
        let inner = self.inner.read().await;
        let mut invites: Vec<Invite> = inner
            .invites
            .values()
            .filter(|i| i.email == email)
            .cloned()
            .collect();
        invites.sort_by_key(|i| i.sent_at);
        Ok(invites)
    }

    async fn delete_invite(&self, invite_id: Uuid) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        inner
            .invites
            .remove(&invite_id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("Invite {} not found", invite_id)))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
