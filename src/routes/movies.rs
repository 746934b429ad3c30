use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::CurrentUser,
    error::AppResult,
    middleware::RequestId,
    models::{ImdbId, MovieListEntry, MovieMetadata, MovieSummary, Rating, Vote, VoteValue},
    routes::AppState,
    services::{
        movies::{self, MovieState},
        watchlist::{self, WatchlistView},
    },
};

#[derive(Debug, Deserialize)]
pub struct WatchlistQuery {
    pub genre: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct AddMovieRequest {
    pub imdb_id: String,
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub vote: VoteValue,
}

#[derive(Debug, Deserialize)]
pub struct SeenRequest {
    pub seen: bool,
}

#[derive(Debug, Deserialize)]
pub struct RateRequest {
    pub stars: u8,
}

#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    pub imdb_id: String,
    pub listed: bool,
}

/// Aggregated watchlist and watched tabs for a group
pub async fn watchlist(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    user: CurrentUser,
    Path(group_id): Path<Uuid>,
    Query(query): Query<WatchlistQuery>,
) -> AppResult<Json<WatchlistView>> {
    tracing::info!(
        request_id = %request_id,
        group_id = %group_id,
        genre = query.genre.as_deref().unwrap_or(""),
        "Building watchlist"
    );

    let view = watchlist::view(
        state.store.as_ref(),
        state.metadata.as_ref(),
        group_id,
        user.id,
        query.genre.as_deref(),
    )
    .await?;

    Ok(Json(view))
}

pub async fn add(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(group_id): Path<Uuid>,
    Json(request): Json<AddMovieRequest>,
) -> AppResult<(StatusCode, Json<MovieListEntry>)> {
    let entry = movies::add_movie(state.store.as_ref(), group_id, user.id, &request.imdb_id).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn remove(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((group_id, imdb_id)): Path<(Uuid, String)>,
) -> AppResult<StatusCode> {
    movies::remove_movie(state.store.as_ref(), group_id, user.id, &imdb_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((group_id, imdb_id)): Path<(Uuid, String)>,
) -> AppResult<Json<ToggleResponse>> {
    let listed = movies::toggle_movie(state.store.as_ref(), group_id, user.id, &imdb_id).await?;
    Ok(Json(ToggleResponse { imdb_id, listed }))
}

pub async fn my_state(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((group_id, imdb_id)): Path<(Uuid, String)>,
) -> AppResult<Json<MovieState>> {
    let movie_state = movies::my_state(state.store.as_ref(), group_id, user.id, &imdb_id).await?;
    Ok(Json(movie_state))
}

pub async fn vote(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((group_id, imdb_id)): Path<(Uuid, String)>,
    Json(request): Json<VoteRequest>,
) -> AppResult<Json<Vote>> {
    let vote = movies::vote(state.store.as_ref(), group_id, user.id, &imdb_id, request.vote).await?;
    Ok(Json(vote))
}

pub async fn set_seen(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((group_id, imdb_id)): Path<(Uuid, String)>,
    Json(request): Json<SeenRequest>,
) -> AppResult<Json<MovieListEntry>> {
    let entry =
        movies::set_seen(state.store.as_ref(), group_id, user.id, &imdb_id, request.seen).await?;
    Ok(Json(entry))
}

pub async fn rate(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(imdb_id): Path<String>,
    Json(request): Json<RateRequest>,
) -> AppResult<Json<Rating>> {
    let rating = movies::rate(state.store.as_ref(), user.id, &imdb_id, request.stars).await?;
    Ok(Json(rating))
}

/// Title search against the metadata provider
pub async fn search(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    _user: CurrentUser,
    Query(params): Query<SearchQuery>,
) -> AppResult<Json<Vec<MovieSummary>>> {
    tracing::info!(
        request_id = %request_id,
        provider = state.metadata.name(),
        query = %params.q,
        "Searching titles"
    );
    let results = state.metadata.search(&params.q).await?;
    Ok(Json(results))
}

pub async fn details(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(imdb_id): Path<String>,
) -> AppResult<Json<MovieMetadata>> {
    let imdb_id: ImdbId = imdb_id.parse()?;
    let metadata = state.metadata.details(&imdb_id).await?;
    Ok(Json(metadata))
}
