use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::Store;
use crate::{
    error::{AppError, AppResult},
    models::{
        Group, GroupMember, ImdbId, Invite, InviteStatus, LeaveOutcome, MovieList,
        MovieListEntry, Rating, Stars, User, Vote, VoteValue,
    },
};

/// PostgreSQL-backed store; schema lives in `migrations/`
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Maps unique-key violations to `Conflict`, everything else to `Database`
fn conflict_on_unique(message: impl Into<String>) -> impl FnOnce(sqlx::Error) -> AppError {
    let message = message.into();
    move |e| constraint_error(e, message, None)
}

/// Like `conflict_on_unique`, but a foreign-key violation (the referenced
/// group, list or user is gone) becomes `NotFound`
fn conflict_or_missing(
    conflict: impl Into<String>,
    missing: impl Into<String>,
) -> impl FnOnce(sqlx::Error) -> AppError {
    let (conflict, missing) = (conflict.into(), missing.into());
    move |e| constraint_error(e, conflict, Some(missing))
}

fn constraint_error(e: sqlx::Error, conflict: String, missing: Option<String>) -> AppError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return AppError::Conflict(conflict);
        }
        if let (true, Some(missing)) = (db.is_foreign_key_violation(), missing) {
            return AppError::NotFound(missing);
        }
    }
    AppError::Database(e)
}

// ============================================================================
// Row types
// ============================================================================

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    username: String,
    bio: String,
    avatar_uri: Option<String>,
    theme: String,
    favorite_genres: Vec<String>,
    password_hash: String,
    created_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self, groups: Vec<Uuid>) -> AppResult<User> {
        Ok(User {
            id: self.id,
            email: self.email,
            username: self.username,
            bio: self.bio,
            avatar_uri: self.avatar_uri,
            theme: self.theme.parse()?,
            favorite_genres: self.favorite_genres,
            groups,
            password_hash: self.password_hash,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct GroupRow {
    id: Uuid,
    name: String,
    profile_picture: Option<String>,
    sort_by: String,
    fairness_filter: bool,
    movie_list_id: Uuid,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_updated_by: Option<Uuid>,
}

impl TryFrom<GroupRow> for Group {
    type Error = AppError;

    fn try_from(row: GroupRow) -> Result<Self, Self::Error> {
        Ok(Group {
            id: row.id,
            name: row.name,
            profile_picture: row.profile_picture,
            sort_by: row.sort_by.parse()?,
            fairness_filter: row.fairness_filter,
            movie_list_id: row.movie_list_id,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
            last_updated_by: row.last_updated_by,
        })
    }
}

#[derive(FromRow)]
struct MemberRow {
    group_id: Uuid,
    user_id: Uuid,
    role: String,
    joined_at: DateTime<Utc>,
}

impl TryFrom<MemberRow> for GroupMember {
    type Error = AppError;

    fn try_from(row: MemberRow) -> Result<Self, Self::Error> {
        Ok(GroupMember {
            group_id: row.group_id,
            user_id: row.user_id,
            role: row.role.parse()?,
            joined_at: row.joined_at,
        })
    }
}

#[derive(FromRow)]
struct EntryRow {
    imdb_id: String,
    added_by: Uuid,
    added_at: DateTime<Utc>,
    watched_by: Vec<Uuid>,
    last_watched_at: Option<DateTime<Utc>>,
}

impl TryFrom<EntryRow> for MovieListEntry {
    type Error = AppError;

    fn try_from(row: EntryRow) -> Result<Self, Self::Error> {
        Ok(MovieListEntry {
            imdb_id: row.imdb_id.parse()?,
            added_by: row.added_by,
            added_at: row.added_at,
            watched_by: row.watched_by.into_iter().collect(),
            last_watched_at: row.last_watched_at,
        })
    }
}

#[derive(FromRow)]
struct VoteRow {
    user_id: Uuid,
    imdb_id: String,
    group_id: Uuid,
    vote: Option<String>,
    seen: bool,
    updated_at: DateTime<Utc>,
}

impl TryFrom<VoteRow> for Vote {
    type Error = AppError;

    fn try_from(row: VoteRow) -> Result<Self, Self::Error> {
        Ok(Vote {
            user_id: row.user_id,
            imdb_id: row.imdb_id.parse()?,
            group_id: row.group_id,
            vote: row.vote.map(|v| v.parse()).transpose()?,
            seen: row.seen,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct RatingRow {
    user_id: Uuid,
    imdb_id: String,
    stars: i16,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RatingRow> for Rating {
    type Error = AppError;

    fn try_from(row: RatingRow) -> Result<Self, Self::Error> {
        let stars = u8::try_from(row.stars)
            .map_err(|_| AppError::Internal(format!("Stored rating out of range: {}", row.stars)))
            .and_then(Stars::try_from)?;
        Ok(Rating {
            user_id: row.user_id,
            imdb_id: row.imdb_id.parse()?,
            stars,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct InviteRow {
    id: Uuid,
    email: String,
    group_id: Uuid,
    sent_by: Uuid,
    sent_at: DateTime<Utc>,
}

impl From<InviteRow> for Invite {
    fn from(row: InviteRow) -> Self {
        Invite {
            id: row.id,
            email: row.email,
            group_id: row.group_id,
            sent_by: row.sent_by,
            sent_at: row.sent_at,
            status: InviteStatus::Pending,
        }
    }
}

const USER_COLUMNS: &str =
    "id, email, username, bio, avatar_uri, theme, favorite_genres, password_hash, created_at";
const GROUP_COLUMNS: &str = "id, name, profile_picture, sort_by, fairness_filter, movie_list_id, \
     created_by, created_at, updated_at, last_updated_by";
const VOTE_COLUMNS: &str = "user_id, imdb_id, group_id, vote, seen, updated_at";

impl PgStore {
    async fn user_group_ids(&self, user_id: Uuid) -> AppResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT group_id FROM group_members WHERE user_id = $1 ORDER BY joined_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn hydrate_user(&self, row: Option<UserRow>) -> AppResult<Option<User>> {
        match row {
            Some(row) => {
                let groups = self.user_group_ids(row.id).await?;
                Ok(Some(row.into_user(groups)?))
            }
            None => Ok(None),
        }
    }

    async fn upsert_vote(tx: &mut Transaction<'_, Postgres>, vote: &Vote) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO movie_votes (user_id, imdb_id, group_id, vote, seen, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id, imdb_id, group_id)
            DO UPDATE SET vote = EXCLUDED.vote, seen = EXCLUDED.seen, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(vote.user_id)
        .bind(vote.imdb_id.as_str())
        .bind(vote.group_id)
        .bind(vote.vote.map(|v| v.as_str()))
        .bind(vote.seen)
        .bind(vote.updated_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn lock_vote(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        imdb_id: &ImdbId,
        group_id: Uuid,
    ) -> AppResult<Vote> {
        let row = sqlx::query_as::<_, VoteRow>(&format!(
            "SELECT {} FROM movie_votes \
             WHERE user_id = $1 AND imdb_id = $2 AND group_id = $3 FOR UPDATE",
            VOTE_COLUMNS
        ))
        .bind(user_id)
        .bind(imdb_id.as_str())
        .bind(group_id)
        .fetch_optional(&mut **tx)
        .await?;

        match row {
            Some(row) => Vote::try_from(row),
            None => Ok(Vote::new(user_id, imdb_id.clone(), group_id)),
        }
    }
}

#[async_trait::async_trait]
impl Store for PgStore {
    async fn create_user(&self, user: User) -> AppResult<User> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, username, bio, avatar_uri, theme, favorite_genres, password_hash, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.bio)
        .bind(&user.avatar_uri)
        .bind(user.theme.as_str())
        .bind(&user.favorite_genres)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(conflict_on_unique(format!(
            "Email {} is already registered",
            user.email
        )))?;

        Ok(user)
    }

    async fn get_user(&self, user_id: Uuid) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        self.hydrate_user(row).await
    }

    async fn get_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        self.hydrate_user(row).await
    }

    async fn update_user(&self, user: User) -> AppResult<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET username = $2, bio = $3, avatar_uri = $4, theme = $5, favorite_genres = $6 \
             WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.bio)
        .bind(&user.avatar_uri)
        .bind(user.theme.as_str())
        .bind(&user.favorite_genres)
        .fetch_optional(&self.pool)
        .await?;

        self.hydrate_user(row)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user.id)))
    }

    async fn get_users(&self, user_ids: &[Uuid]) -> AppResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE id = ANY($1)",
            USER_COLUMNS
        ))
        .bind(user_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut users = Vec::with_capacity(rows.len());
        for row in rows {
            // Group lists are not needed where users are fetched in bulk
            users.push(row.into_user(Vec::new())?);
        }
        users.sort_by_key(|u| user_ids.iter().position(|id| *id == u.id));
        Ok(users)
    }

    async fn create_group(
        &self,
        group: Group,
        list: MovieList,
        admin: GroupMember,
    ) -> AppResult<Group> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO groups (id, name, profile_picture, sort_by, fairness_filter, movie_list_id,
                                created_by, created_at, updated_at, last_updated_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(group.id)
        .bind(&group.name)
        .bind(&group.profile_picture)
        .bind(group.sort_by.as_str())
        .bind(group.fairness_filter)
        .bind(group.movie_list_id)
        .bind(group.created_by)
        .bind(group.created_at)
        .bind(group.updated_at)
        .bind(group.last_updated_by)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO movie_lists (id, group_id, created_at) VALUES ($1, $2, $3)")
            .bind(list.id)
            .bind(list.group_id)
            .bind(list.created_at)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO group_members (group_id, user_id, role, joined_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(admin.group_id)
        .bind(admin.user_id)
        .bind(admin.role.as_str())
        .bind(admin.joined_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(group)
    }

    async fn get_group(&self, group_id: Uuid) -> AppResult<Option<Group>> {
        let row = sqlx::query_as::<_, GroupRow>(&format!(
            "SELECT {} FROM groups WHERE id = $1",
            GROUP_COLUMNS
        ))
        .bind(group_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Group::try_from).transpose()
    }

    async fn update_group(&self, group: Group) -> AppResult<Group> {
        let result = sqlx::query(
            r#"
            UPDATE groups
            SET name = $2, profile_picture = $3, sort_by = $4, fairness_filter = $5,
                updated_at = $6, last_updated_by = $7
            WHERE id = $1
            "#,
        )
        .bind(group.id)
        .bind(&group.name)
        .bind(&group.profile_picture)
        .bind(group.sort_by.as_str())
        .bind(group.fairness_filter)
        .bind(group.updated_at)
        .bind(group.last_updated_by)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Group {} not found", group.id)));
        }
        Ok(group)
    }

    async fn delete_group(&self, group_id: Uuid) -> AppResult<()> {
        // Lists, entries, memberships, votes and invites cascade
        let result = sqlx::query("DELETE FROM groups WHERE id = $1")
            .bind(group_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Group {} not found", group_id)));
        }
        Ok(())
    }

    async fn list_groups_for_user(&self, user_id: Uuid) -> AppResult<Vec<Group>> {
        let rows = sqlx::query_as::<_, GroupRow>(
            r#"
            SELECT g.id, g.name, g.profile_picture, g.sort_by, g.fairness_filter, g.movie_list_id,
                   g.created_by, g.created_at, g.updated_at, g.last_updated_by
            FROM groups g
            JOIN group_members m ON m.group_id = g.id
            WHERE m.user_id = $1
            ORDER BY m.joined_at
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Group::try_from).collect()
    }

    async fn add_member(&self, member: GroupMember) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO group_members (group_id, user_id, role, joined_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(member.group_id)
        .bind(member.user_id)
        .bind(member.role.as_str())
        .bind(member.joined_at)
        .execute(&self.pool)
        .await
        .map_err(conflict_or_missing(
            "Already a member of this group",
            format!("Group {} not found", member.group_id),
        ))?;
        Ok(())
    }

    async fn remove_member(&self, group_id: Uuid, user_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM group_members WHERE group_id = $1 AND user_id = $2")
            .bind(group_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Not a member of this group".to_string()));
        }
        Ok(())
    }

    async fn leave_group(&self, group_id: Uuid, user_id: Uuid) -> AppResult<LeaveOutcome> {
        let mut tx = self.pool.begin().await?;

        // Serializes concurrent leaves and joins of this group
        sqlx::query_scalar::<_, Uuid>("SELECT id FROM groups WHERE id = $1 FOR UPDATE")
            .bind(group_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Group {} not found", group_id)))?;

        let members = sqlx::query_as::<_, MemberRow>(
            "SELECT group_id, user_id, role, joined_at FROM group_members \
             WHERE group_id = $1 ORDER BY joined_at FOR UPDATE",
        )
        .bind(group_id)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(GroupMember::try_from)
        .collect::<AppResult<Vec<_>>>()?;

        let outcome = LeaveOutcome::decide(&members, user_id)?;
        match outcome {
            LeaveOutcome::GroupDeleted => {
                sqlx::query("DELETE FROM groups WHERE id = $1")
                    .bind(group_id)
                    .execute(&mut *tx)
                    .await?;
            }
            LeaveOutcome::Left => {
                sqlx::query("DELETE FROM group_members WHERE group_id = $1 AND user_id = $2")
                    .bind(group_id)
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;
        Ok(outcome)
    }

    async fn get_member(&self, group_id: Uuid, user_id: Uuid) -> AppResult<Option<GroupMember>> {
        let row = sqlx::query_as::<_, MemberRow>(
            "SELECT group_id, user_id, role, joined_at FROM group_members \
             WHERE group_id = $1 AND user_id = $2",
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(GroupMember::try_from).transpose()
    }

    async fn list_members(&self, group_id: Uuid) -> AppResult<Vec<GroupMember>> {
        let rows = sqlx::query_as::<_, MemberRow>(
            "SELECT group_id, user_id, role, joined_at FROM group_members \
             WHERE group_id = $1 ORDER BY joined_at",
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(GroupMember::try_from).collect()
    }

    async fn list_entries(&self, list_id: Uuid) -> AppResult<Vec<MovieListEntry>> {
        let rows = sqlx::query_as::<_, EntryRow>(
            "SELECT imdb_id, added_by, added_at, watched_by, last_watched_at \
             FROM movie_list_entries WHERE movie_list_id = $1 ORDER BY added_at",
        )
        .bind(list_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(MovieListEntry::try_from).collect()
    }

    async fn add_entry(&self, list_id: Uuid, entry: MovieListEntry) -> AppResult<()> {
        let watched_by: Vec<Uuid> = entry.watched_by.iter().copied().collect();
        sqlx::query(
            r#"
            INSERT INTO movie_list_entries (movie_list_id, imdb_id, added_by, added_at, watched_by, last_watched_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(list_id)
        .bind(entry.imdb_id.as_str())
        .bind(entry.added_by)
        .bind(entry.added_at)
        .bind(&watched_by)
        .bind(entry.last_watched_at)
        .execute(&self.pool)
        .await
        .map_err(conflict_or_missing(
            format!("{} is already on the watchlist", entry.imdb_id),
            format!("Movie list {} not found", list_id),
        ))?;
        Ok(())
    }

    async fn remove_entry(
        &self,
        list_id: Uuid,
        group_id: Uuid,
        imdb_id: &ImdbId,
    ) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let result =
            sqlx::query("DELETE FROM movie_list_entries WHERE movie_list_id = $1 AND imdb_id = $2")
                .bind(list_id)
                .bind(imdb_id.as_str())
                .execute(&mut *tx)
                .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "{} is not on the watchlist",
                imdb_id
            )));
        }

        sqlx::query("DELETE FROM movie_votes WHERE group_id = $1 AND imdb_id = $2")
            .bind(group_id)
            .bind(imdb_id.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn toggle_entry(
        &self,
        list_id: Uuid,
        group_id: Uuid,
        entry: MovieListEntry,
    ) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query_scalar::<_, Uuid>("SELECT id FROM movie_lists WHERE id = $1 FOR UPDATE")
            .bind(list_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Movie list {} not found", list_id)))?;

        let removed = sqlx::query_scalar::<_, String>(
            "DELETE FROM movie_list_entries WHERE movie_list_id = $1 AND imdb_id = $2 \
             RETURNING imdb_id",
        )
        .bind(list_id)
        .bind(entry.imdb_id.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let listed = if removed.is_some() {
            sqlx::query("DELETE FROM movie_votes WHERE group_id = $1 AND imdb_id = $2")
                .bind(group_id)
                .bind(entry.imdb_id.as_str())
                .execute(&mut *tx)
                .await?;
            false
        } else {
            let watched_by: Vec<Uuid> = entry.watched_by.iter().copied().collect();
            sqlx::query(
                r#"
                INSERT INTO movie_list_entries (movie_list_id, imdb_id, added_by, added_at, watched_by, last_watched_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(list_id)
            .bind(entry.imdb_id.as_str())
            .bind(entry.added_by)
            .bind(entry.added_at)
            .bind(&watched_by)
            .bind(entry.last_watched_at)
            .execute(&mut *tx)
            .await?;
            true
        };

        tx.commit().await?;
        Ok(listed)
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
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, EntryRow>(
            "SELECT imdb_id, added_by, added_at, watched_by, last_watched_at \
             FROM movie_list_entries WHERE movie_list_id = $1 AND imdb_id = $2 FOR UPDATE",
        )
        .bind(list_id)
        .bind(imdb_id.as_str())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} is not on the watchlist", imdb_id)))?;

        let mut entry = MovieListEntry::try_from(row)?;
        entry.set_watched(user_id, seen, at);
        let watched_by: Vec<Uuid> = entry.watched_by.iter().copied().collect();

        sqlx::query(
            "UPDATE movie_list_entries SET watched_by = $3, last_watched_at = $4 \
             WHERE movie_list_id = $1 AND imdb_id = $2",
        )
        .bind(list_id)
        .bind(imdb_id.as_str())
        .bind(&watched_by)
        .bind(entry.last_watched_at)
        .execute(&mut *tx)
        .await?;

        let mut vote = Self::lock_vote(&mut tx, user_id, imdb_id, group_id).await?;
        vote.seen = seen;
        vote.updated_at = at;
        Self::upsert_vote(&mut tx, &vote).await?;

        tx.commit().await?;
        Ok(entry)
    }

    async fn get_vote(
        &self,
        user_id: Uuid,
        imdb_id: &ImdbId,
        group_id: Uuid,
    ) -> AppResult<Option<Vote>> {
        let row = sqlx::query_as::<_, VoteRow>(&format!(
            "SELECT {} FROM movie_votes WHERE user_id = $1 AND imdb_id = $2 AND group_id = $3",
            VOTE_COLUMNS
        ))
        .bind(user_id)
        .bind(imdb_id.as_str())
        .bind(group_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Vote::try_from).transpose()
    }

    async fn apply_vote(
        &self,
        user_id: Uuid,
        imdb_id: &ImdbId,
        group_id: Uuid,
        value: VoteValue,
        at: DateTime<Utc>,
    ) -> AppResult<Vote> {
        let mut tx = self.pool.begin().await?;
        let mut vote = Self::lock_vote(&mut tx, user_id, imdb_id, group_id).await?;
        vote.toggle(value, at);
        Self::upsert_vote(&mut tx, &vote).await?;
        tx.commit().await?;
        Ok(vote)
    }

    async fn list_group_votes(&self, group_id: Uuid) -> AppResult<Vec<Vote>> {
        let rows = sqlx::query_as::<_, VoteRow>(&format!(
            "SELECT {} FROM movie_votes WHERE group_id = $1",
            VOTE_COLUMNS
        ))
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Vote::try_from).collect()
    }

    async fn upsert_rating(&self, rating: Rating) -> AppResult<Rating> {
        sqlx::query(
            r#"
            INSERT INTO user_ratings (user_id, imdb_id, stars, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, imdb_id)
            DO UPDATE SET stars = EXCLUDED.stars, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(rating.user_id)
        .bind(rating.imdb_id.as_str())
        .bind(i16::from(rating.stars.get()))
        .bind(rating.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(rating)
    }

    async fn get_rating(&self, user_id: Uuid, imdb_id: &ImdbId) -> AppResult<Option<Rating>> {
        let row = sqlx::query_as::<_, RatingRow>(
            "SELECT user_id, imdb_id, stars, updated_at FROM user_ratings \
             WHERE user_id = $1 AND imdb_id = $2",
        )
        .bind(user_id)
        .bind(imdb_id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Rating::try_from).transpose()
    }

    async fn list_ratings(&self, imdb_ids: &[ImdbId]) -> AppResult<Vec<Rating>> {
        let ids: Vec<String> = imdb_ids.iter().map(|id| id.to_string()).collect();
        let rows = sqlx::query_as::<_, RatingRow>(
            "SELECT user_id, imdb_id, stars, updated_at FROM user_ratings WHERE imdb_id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Rating::try_from).collect()
    }

    async fn create_invite(&self, invite: Invite) -> AppResult<Invite> {
        sqlx::query(
            r#"
            INSERT INTO invites (id, email, group_id, sent_by, sent_at, status)
            VALUES ($1, $2, $3, $4, $5, 'pending')
            "#,
        )
        .bind(invite.id)
        .bind(&invite.email)
        .bind(invite.group_id)
        .bind(invite.sent_by)
        .bind(invite.sent_at)
        .execute(&self.pool)
        .await
        .map_err(conflict_or_missing(
            format!("{} already has a pending invite to this group", invite.email),
            format!("Group {} not found", invite.group_id),
        ))?;
        Ok(invite)
    }

    async fn get_invite(&self, invite_id: Uuid) -> AppResult<Option<Invite>> {
        let row = sqlx::query_as::<_, InviteRow>(
            "SELECT id, email, group_id, sent_by, sent_at FROM invites WHERE id = $1",
        )
        .bind(invite_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Invite::from))
    }

    async fn list_pending_invites(&self, email: &str) -> AppResult<Vec<Invite>> {
        let rows = sqlx::query_as::<_, InviteRow>(
            "SELECT id, email, group_id, sent_by, sent_at FROM invites \
             WHERE email = $1 AND status = 'pending' ORDER BY sent_at",
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Invite::from).collect())
    }

    async fn delete_invite(&self, invite_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM invites WHERE id = $1")
            .bind(invite_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Invite {} not found", invite_id)));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::{error::Error as StdError, fmt};

    #[derive(Debug)]
    enum Violation {
        Unique,
        ForeignKey,
        Check,
    }

    #[derive(Debug)]
    struct FakeDbError(Violation);

    impl fmt::Display for FakeDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{:?} violation", self.0)
        }
    }

    impl StdError for FakeDbError {}

    impl DatabaseError for FakeDbError {
        fn message(&self) -> &str {
            "constraint violated"
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            match self.0 {
                Violation::Unique => ErrorKind::UniqueViolation,
                Violation::ForeignKey => ErrorKind::ForeignKeyViolation,
                Violation::Check => ErrorKind::CheckViolation,
            }
        }
    }

    fn db_error(violation: Violation) -> sqlx::Error {
        sqlx::Error::Database(Box::new(FakeDbError(violation)))
    }

    #[test]
    fn test_membership_insert_errors() {
        let map = || conflict_or_missing("Already a member", "Group gone");

        assert!(matches!(
            map()(db_error(Violation::Unique)),
            AppError::Conflict(msg) if msg == "Already a member"
        ));
        assert!(matches!(
            map()(db_error(Violation::ForeignKey)),
            AppError::NotFound(msg) if msg == "Group gone"
        ));
        assert!(matches!(map()(db_error(Violation::Check)), AppError::Database(_)));
        assert!(matches!(map()(sqlx::Error::RowNotFound), AppError::Database(_)));
    }

    #[test]
    fn test_unique_only_mapping_leaves_foreign_keys_alone() {
        assert!(matches!(
            conflict_on_unique("taken")(db_error(Violation::Unique)),
            AppError::Conflict(_)
        ));
        assert!(matches!(
            conflict_on_unique("taken")(db_error(Violation::ForeignKey)),
            AppError::Database(_)
        ));
    }
}
