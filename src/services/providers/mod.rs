/// Movie metadata provider abstraction
///
/// Title search and per-title details come from a third-party metadata API.
/// Keeping it behind a trait lets the watchlist code run against a mock in
/// tests and keeps the HTTP client out of the aggregation path.
use crate::{
    error::AppResult,
    models::{ImdbId, MovieMetadata, MovieSummary},
};

pub mod omdb;

pub use omdb::OmdbProvider;

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Search for titles by name
    ///
    /// An empty result is not an error; an empty query is.
    async fn search(&self, query: &str) -> AppResult<Vec<MovieSummary>>;

    /// Fetch details for one title
    async fn details(&self, imdb_id: &ImdbId) -> AppResult<MovieMetadata>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}
