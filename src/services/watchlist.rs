/// Group watchlist aggregation
///
/// The view a group sees is derived from several independent collections:
/// the movie list entries, the group's vote documents, everyone's star
/// ratings and the current membership. [`aggregate`] folds them into a
/// sorted, partitioned view without touching storage or the network, and
/// [`view`] gathers its inputs.
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::{
    borrow::Cow,
    cmp::Ordering,
    collections::{BTreeSet, HashMap},
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{ImdbId, MovieListEntry, MovieMetadata, Rating, SortPreference, Vote, VoteValue},
    services::{groups, providers::MetadataProvider},
    store::Store,
};

/// Shown when the user who added a movie no longer resolves
pub const UNKNOWN_USERNAME: &str = "Unknown";

/// One movie as presented in either tab
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MovieView {
    pub imdb_id: ImdbId,
    pub title: String,
    pub poster: String,
    pub genre: String,
    pub year: String,
    pub added_by: Uuid,
    pub added_by_username: String,
    pub added_at: DateTime<Utc>,
    pub up_votes: u32,
    pub down_votes: u32,
    pub net_score: i64,
    pub seen_count: usize,
    pub member_count: usize,
    pub seen: bool,
    pub average_rating: Option<u8>,
    pub rating_count: usize,
    pub rotten_tomatoes: Option<u8>,
    /// Pushed back by the fairness filter
    pub deferred: bool,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct WatchlistView {
    /// Not yet seen by every member
    pub watchlist: Vec<MovieView>,
    /// Seen by every current member
    pub watched: Vec<MovieView>,
}

/// Everything [`aggregate`] reads
pub struct AggregationInput<'a> {
    pub group_id: Uuid,
    pub entries: &'a [MovieListEntry],
    /// Votes of any group; only those for this group count
    pub votes: &'a [Vote],
    /// Global ratings; only those for listed movies count
    pub ratings: &'a [Rating],
    pub members: &'a [Uuid],
    pub usernames: &'a HashMap<Uuid, String>,
    /// Missing ids fall back to placeholder metadata
    pub metadata: &'a HashMap<ImdbId, MovieMetadata>,
    pub sort_by: SortPreference,
    pub fairness_filter: bool,
    pub genre: Option<&'a str>,
}

/// Builds the partitioned, sorted view of a group's movie list
pub fn aggregate(input: &AggregationInput<'_>) -> WatchlistView {
    let members: BTreeSet<Uuid> = input.members.iter().copied().collect();
    let genre = input.genre.map(str::trim).filter(|g| !g.is_empty());

    let mut views: Vec<(MovieView, Option<DateTime<Utc>>)> = input
        .entries
        .iter()
        .map(|entry| (movie_view(input, &members, entry), entry.last_watched_at))
        .collect();

    // Rotation target comes from the whole list, before any genre narrowing
    let deferred_adder = if input.fairness_filter {
        views
            .iter()
            .filter(|(view, _)| view.seen)
            .filter_map(|(view, at)| at.map(|at| (at, view.added_by)))
            .max_by_key(|(at, _)| *at)
            .map(|(_, adder)| adder)
    } else {
        None
    };

    if let Some(genre) = genre {
        views.retain(|(view, _)| metadata_for(input, &view.imdb_id).matches_genre(genre));
    }

    let (mut watched, mut watchlist): (Vec<MovieView>, Vec<MovieView>) = views
        .into_iter()
        .map(|(view, _)| view)
        .partition(|view| view.seen);

    watched.sort_by(|a, b| compare(input.sort_by, a, b));
    watchlist.sort_by(|a, b| compare(input.sort_by, a, b));

    if let Some(adder) = deferred_adder {
        for view in watchlist.iter_mut() {
            view.deferred = view.added_by == adder;
        }
        // Stable, so each half keeps its order
        watchlist.sort_by_key(|view| view.deferred);
    }

    WatchlistView { watchlist, watched }
}

fn movie_view(
    input: &AggregationInput<'_>,
    members: &BTreeSet<Uuid>,
    entry: &MovieListEntry,
) -> MovieView {
    let votes = input
        .votes
        .iter()
        .filter(|v| v.matches(&entry.imdb_id, input.group_id));

    let mut up_votes = 0u32;
    let mut down_votes = 0u32;
    let mut seen_by: BTreeSet<Uuid> = entry.watched_by.clone();
    for vote in votes {
        match vote.vote {
            Some(VoteValue::Up) => up_votes += 1,
            Some(VoteValue::Down) => down_votes += 1,
            None => {}
        }
        if vote.seen {
            seen_by.insert(vote.user_id);
        }
    }

    let seen_count = seen_by.intersection(members).count();
    let member_count = members.len();

    let stars: Vec<u32> = input
        .ratings
        .iter()
        .filter(|r| r.imdb_id == entry.imdb_id)
        .map(|r| u32::from(r.stars.get()))
        .collect();

    let metadata = metadata_for(input, &entry.imdb_id);

    MovieView {
        imdb_id: entry.imdb_id.clone(),
        title: metadata.title.clone(),
        poster: metadata.poster.clone(),
        genre: metadata.genre.clone(),
        year: metadata.year.clone(),
        added_by: entry.added_by,
        added_by_username: input
            .usernames
            .get(&entry.added_by)
            .cloned()
            .unwrap_or_else(|| UNKNOWN_USERNAME.to_string()),
        added_at: entry.added_at,
        up_votes,
        down_votes,
        net_score: i64::from(up_votes) - i64::from(down_votes),
        seen_count,
        member_count,
        seen: member_count > 0 && seen_count == member_count,
        average_rating: rounded_mean(&stars),
        rating_count: stars.len(),
        rotten_tomatoes: metadata.rotten_tomatoes(),
        deferred: false,
    }
}

/// Mean star value rounded to the nearest whole star, halves up
fn rounded_mean(stars: &[u32]) -> Option<u8> {
    if stars.is_empty() {
        return None;
    }
    let sum: u32 = stars.iter().sum();
    let mean = f64::from(sum) / stars.len() as f64;
    Some(mean.round() as u8)
}

fn metadata_for<'a>(input: &AggregationInput<'a>, imdb_id: &ImdbId) -> Cow<'a, MovieMetadata> {
    match input.metadata.get(imdb_id) {
        Some(meta) => Cow::Borrowed(meta),
        None => Cow::Owned(MovieMetadata::placeholder(imdb_id.clone())),
    }
}

fn compare(sort_by: SortPreference, a: &MovieView, b: &MovieView) -> Ordering {
    let primary = match sort_by {
        SortPreference::RottenTomatoes => match (a.rotten_tomatoes, b.rotten_tomatoes) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
        SortPreference::Liked => b.net_score.cmp(&a.net_score),
        SortPreference::NotSeen => a.seen_count.cmp(&b.seen_count),
        SortPreference::Chronological => Ordering::Equal,
    };

    primary
        .then_with(|| a.added_at.cmp(&b.added_at))
        .then_with(|| a.imdb_id.cmp(&b.imdb_id))
}

/// Loads a group's collections and aggregates them for a member
///
/// Metadata for every listed movie is fetched concurrently. A movie whose
/// details cannot be fetched is shown with placeholder metadata.
pub async fn view(
    store: &dyn Store,
    provider: &dyn MetadataProvider,
    group_id: Uuid,
    user_id: Uuid,
    genre: Option<&str>,
) -> AppResult<WatchlistView> {
    let (group, _) = groups::require_member(store, group_id, user_id).await?;

    let entries = store.list_entries(group.movie_list_id).await?;
    let member_ids: Vec<Uuid> = store
        .list_members(group_id)
        .await?
        .into_iter()
        .map(|m| m.user_id)
        .collect();
    let votes = store.list_group_votes(group_id).await?;
    let imdb_ids: Vec<ImdbId> = entries.iter().map(|e| e.imdb_id.clone()).collect();
    let ratings = store.list_ratings(&imdb_ids).await?;

    let mut lookup_ids: BTreeSet<Uuid> = member_ids.iter().copied().collect();
    lookup_ids.extend(entries.iter().map(|e| e.added_by));
    let lookup_ids: Vec<Uuid> = lookup_ids.into_iter().collect();
    let usernames: HashMap<Uuid, String> = store
        .get_users(&lookup_ids)
        .await?
        .into_iter()
        .map(|u| (u.id, u.username))
        .collect();

    let fetches = entries.iter().map(|entry| async move {
        let metadata = match provider.details(&entry.imdb_id).await {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!(
                    imdb_id = %entry.imdb_id,
                    provider = provider.name(),
                    error = %e,
                    "Metadata unavailable, using placeholder"
                );
                MovieMetadata::placeholder(entry.imdb_id.clone())
            }
        };
        (entry.imdb_id.clone(), metadata)
    });
    let metadata: HashMap<ImdbId, MovieMetadata> = join_all(fetches).await.into_iter().collect();

    let view = aggregate(&AggregationInput {
        group_id,
        entries: &entries,
        votes: &votes,
        ratings: &ratings,
        members: &member_ids,
        usernames: &usernames,
        metadata: &metadata,
        sort_by: group.sort_by,
        fairness_filter: group.fairness_filter,
        genre,
    });

    tracing::debug!(
        group_id = %group_id,
        watchlist = view.watchlist.len(),
        watched = view.watched.len(),
        "Watchlist aggregated"
    );

    Ok(view)
}
