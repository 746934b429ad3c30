/// Watchlist mutations: listing, votes, seen marks and star ratings
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{Group, ImdbId, MovieListEntry, Rating, Stars, Vote, VoteValue},
    services::groups::require_member,
    store::Store,
};

fn parse_imdb_id(raw: &str) -> AppResult<ImdbId> {
    raw.trim().parse()
}

async fn require_listed(store: &dyn Store, group: &Group, imdb_id: &ImdbId) -> AppResult<()> {
    let listed = store
        .list_entries(group.movie_list_id)
        .await?
        .iter()
        .any(|e| &e.imdb_id == imdb_id);
    if listed {
        Ok(())
    } else {
        Err(AppError::NotFound(format!(
            "{} is not on the watchlist",
            imdb_id
        )))
    }
}

pub async fn add_movie(
    store: &dyn Store,
    group_id: Uuid,
    user_id: Uuid,
    imdb_id: &str,
) -> AppResult<MovieListEntry> {
    let (group, _) = require_member(store, group_id, user_id).await?;
    let imdb_id = parse_imdb_id(imdb_id)?;

    let entry = MovieListEntry::new(imdb_id, user_id);
    store.add_entry(group.movie_list_id, entry.clone()).await?;

    tracing::info!(group_id = %group_id, imdb_id = %entry.imdb_id, added_by = %user_id, "Movie added");
    Ok(entry)
}

/// Removes the movie along with the group's votes on it
pub async fn remove_movie(
    store: &dyn Store,
    group_id: Uuid,
    user_id: Uuid,
    imdb_id: &str,
) -> AppResult<()> {
    let (group, _) = require_member(store, group_id, user_id).await?;
    let imdb_id = parse_imdb_id(imdb_id)?;

    store
        .remove_entry(group.movie_list_id, group_id, &imdb_id)
        .await?;

    tracing::info!(group_id = %group_id, imdb_id = %imdb_id, removed_by = %user_id, "Movie removed");
    Ok(())
}

/// Adds the movie when absent, removes it otherwise; returns whether it is now listed
pub async fn toggle_movie(
    store: &dyn Store,
    group_id: Uuid,
    user_id: Uuid,
    imdb_id: &str,
) -> AppResult<bool> {
    let (group, _) = require_member(store, group_id, user_id).await?;
    let imdb_id = parse_imdb_id(imdb_id)?;

    let listed = store
        .toggle_entry(
            group.movie_list_id,
            group_id,
            MovieListEntry::new(imdb_id.clone(), user_id),
        )
        .await?;

    tracing::info!(group_id = %group_id, imdb_id = %imdb_id, listed, "Movie toggled");
    Ok(listed)
}

/// Toggles the caller's vote: the same value twice clears it
pub async fn vote(
    store: &dyn Store,
    group_id: Uuid,
    user_id: Uuid,
    imdb_id: &str,
    value: VoteValue,
) -> AppResult<Vote> {
    let (group, _) = require_member(store, group_id, user_id).await?;
    let imdb_id = parse_imdb_id(imdb_id)?;
    require_listed(store, &group, &imdb_id).await?;

    let vote = store
        .apply_vote(user_id, &imdb_id, group_id, value, Utc::now())
        .await?;

    tracing::debug!(
        group_id = %group_id,
        imdb_id = %imdb_id,
        user_id = %user_id,
        vote = vote.vote.map(|v| v.as_str()).unwrap_or("none"),
        "Vote applied"
    );
    Ok(vote)
}

pub async fn set_seen(
    store: &dyn Store,
    group_id: Uuid,
    user_id: Uuid,
    imdb_id: &str,
    seen: bool,
) -> AppResult<MovieListEntry> {
    let (group, _) = require_member(store, group_id, user_id).await?;
    let imdb_id = parse_imdb_id(imdb_id)?;

    let entry = store
        .set_watched(group.movie_list_id, group_id, &imdb_id, user_id, seen, Utc::now())
        .await?;

    tracing::debug!(group_id = %group_id, imdb_id = %imdb_id, user_id = %user_id, seen, "Seen mark updated");
    Ok(entry)
}

/// Stores the caller's global star rating for a movie
pub async fn rate(store: &dyn Store, user_id: Uuid, imdb_id: &str, stars: u8) -> AppResult<Rating> {
    let imdb_id = parse_imdb_id(imdb_id)?;
    let stars = Stars::try_from(stars)?;

    let rating = store
        .upsert_rating(Rating {
            user_id,
            imdb_id,
            stars,
            updated_at: Utc::now(),
        })
        .await?;

    tracing::debug!(imdb_id = %rating.imdb_id, user_id = %user_id, stars = rating.stars.get(), "Movie rated");
    Ok(rating)
}

/// The caller's own vote, seen flag and rating for one movie
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MovieState {
    pub imdb_id: ImdbId,
    pub listed: bool,
    pub vote: Option<VoteValue>,
    pub seen: bool,
    pub rating: Option<u8>,
}

pub async fn my_state(
    store: &dyn Store,
    group_id: Uuid,
    user_id: Uuid,
    imdb_id: &str,
) -> AppResult<MovieState> {
    let (group, _) = require_member(store, group_id, user_id).await?;
    let imdb_id = parse_imdb_id(imdb_id)?;

    let entry = store
        .list_entries(group.movie_list_id)
        .await?
        .into_iter()
        .find(|e| e.imdb_id == imdb_id);
    let vote = store.get_vote(user_id, &imdb_id, group_id).await?;
    let rating = store.get_rating(user_id, &imdb_id).await?;

    let seen = entry
        .as_ref()
        .is_some_and(|e| e.watched_by.contains(&user_id))
        || vote.as_ref().is_some_and(|v| v.seen);

    Ok(MovieState {
        listed: entry.is_some(),
        vote: vote.and_then(|v| v.vote),
        seen,
        rating: rating.map(|r| r.stars.get()),
        imdb_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::User,
        services::groups::create_group,
        store::InMemoryStore,
    };

    const MATRIX: &str = "tt0133093";

    async fn setup() -> (InMemoryStore, User, Group) {
        let store = InMemoryStore::new();
        let user = store
            .create_user(User::new("alice@example.com", None, "h".into()))
            .await
            .unwrap();
        let group = create_group(&store, user.id, "Crew").await.unwrap();
        (store, user, group)
    }

    #[tokio::test]
    async fn test_add_movie_validates_and_rejects_duplicates() {
        let (store, user, group) = setup().await;

        assert!(matches!(
            add_movie(&store, group.id, user.id, "matrix").await,
            Err(AppError::InvalidInput(_))
        ));

        let entry = add_movie(&store, group.id, user.id, MATRIX).await.unwrap();
        assert_eq!(entry.added_by, user.id);
        assert!(matches!(
            add_movie(&store, group.id, user.id, MATRIX).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_missing_movie_not_found() {
        let (store, user, group) = setup().await;
        assert!(matches!(
            remove_movie(&store, group.id, user.id, MATRIX).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_toggle_movie() {
        let (store, user, group) = setup().await;
        assert!(toggle_movie(&store, group.id, user.id, MATRIX).await.unwrap());
        assert!(!toggle_movie(&store, group.id, user.id, MATRIX).await.unwrap());
        assert!(store.list_entries(group.movie_list_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_simultaneous_toggles_cancel_out() {
        let (store, user, group) = setup().await;
        let (first, second) = tokio::join!(
            toggle_movie(&store, group.id, user.id, MATRIX),
            toggle_movie(&store, group.id, user.id, MATRIX),
        );
        assert_ne!(first.unwrap(), second.unwrap());
        assert!(store.list_entries(group.movie_list_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_vote_double_toggle_restores_state() {
        let (store, user, group) = setup().await;
        add_movie(&store, group.id, user.id, MATRIX).await.unwrap();

        let first = vote(&store, group.id, user.id, MATRIX, VoteValue::Up).await.unwrap();
        assert_eq!(first.vote, Some(VoteValue::Up));
        let second = vote(&store, group.id, user.id, MATRIX, VoteValue::Up).await.unwrap();
        assert_eq!(second.vote, None);

        let switched = vote(&store, group.id, user.id, MATRIX, VoteValue::Up).await.unwrap();
        assert_eq!(switched.vote, Some(VoteValue::Up));
        let switched = vote(&store, group.id, user.id, MATRIX, VoteValue::Down).await.unwrap();
        assert_eq!(switched.vote, Some(VoteValue::Down));
    }

    #[tokio::test]
    async fn test_vote_on_unlisted_movie_not_found() {
        let (store, user, group) = setup().await;
        assert!(matches!(
            vote(&store, group.id, user.id, MATRIX, VoteValue::Up).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rate_bounds() {
        let (store, user, _) = setup().await;
        assert!(matches!(
            rate(&store, user.id, MATRIX, 0).await,
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            rate(&store, user.id, MATRIX, 6).await,
            Err(AppError::InvalidInput(_))
        ));
        rate(&store, user.id, MATRIX, 4).await.unwrap();
        let rating = rate(&store, user.id, MATRIX, 2).await.unwrap();
        assert_eq!(rating.stars.get(), 2);
        assert_eq!(
            store.list_ratings(&[MATRIX.parse().unwrap()]).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_my_state_tracks_vote_seen_and_rating() {
        let (store, user, group) = setup().await;
        add_movie(&store, group.id, user.id, MATRIX).await.unwrap();

        let state = my_state(&store, group.id, user.id, MATRIX).await.unwrap();
        assert!(state.listed);
        assert_eq!(state.vote, None);
        assert!(!state.seen);
        assert_eq!(state.rating, None);

        vote(&store, group.id, user.id, MATRIX, VoteValue::Down).await.unwrap();
        set_seen(&store, group.id, user.id, MATRIX, true).await.unwrap();
        rate(&store, user.id, MATRIX, 5).await.unwrap();

        let state = my_state(&store, group.id, user.id, MATRIX).await.unwrap();
        assert_eq!(state.vote, Some(VoteValue::Down));
        assert!(state.seen);
        assert_eq!(state.rating, Some(5));

        let entry = set_seen(&store, group.id, user.id, MATRIX, false).await.unwrap();
        assert!(entry.watched_by.is_empty());
        assert!(entry.last_watched_at.is_some());
        assert!(!my_state(&store, group.id, user.id, MATRIX).await.unwrap().seen);
    }
}
