/// OMDb API provider
///
/// API Flow:
/// 1. Title Search: `/?s={query}` → summaries with IMDb ids
/// 2. Details: `/?i={imdb_id}` → title, genre, poster and critic ratings
///
/// OMDb answers HTTP 200 even for failures and signals them with
/// `"Response": "False"` plus an `"Error"` message.
use crate::{
    cached,
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
    models::{ImdbId, MovieMetadata, MovieSummary, OmdbMovieDetails, OmdbSearchResponse},
    services::providers::MetadataProvider,
};
use reqwest::Client as HttpClient;

const SEARCH_CACHE_TTL: u64 = 3600; // 1 hour
const DETAILS_CACHE_TTL: u64 = 604800; // 1 week

/// OMDb's message for a search without hits
const NOT_FOUND_MESSAGE: &str = "Movie not found!";

#[derive(Clone)]
pub struct OmdbProvider {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    cache: Option<Cache>,
}

impl OmdbProvider {
    pub fn new(cache: Option<Cache>, api_key: String, api_url: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_key,
            api_url: api_url.trim_end_matches('/').to_string(),
            cache,
        }
    }

    async fn get(&self, params: &[(&str, &str)]) -> AppResult<String> {
        let url = format!("{}/", self.api_url);

        let response = self
            .http_client
            .get(&url)
            .query(&[("apikey", self.api_key.as_str())])
            .query(params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "OMDb API returned status {}: {}",
                status, body
            )));
        }

        Ok(response.text().await?)
    }
}

/// Converts a search body; "not found" becomes an empty list
fn parse_search_response(body: &str) -> AppResult<Vec<MovieSummary>> {
    let response: OmdbSearchResponse = serde_json::from_str(body)
        .map_err(|e| AppError::ExternalApi(format!("Failed to parse OMDb response: {}", e)))?;

    if response.response != "True" {
        let message = response.error.unwrap_or_default();
        if message == NOT_FOUND_MESSAGE {
            return Ok(Vec::new());
        }
        return Err(AppError::ExternalApi(if message.is_empty() {
            "Error fetching movie search results".to_string()
        } else {
            message
        }));
    }

    Ok(response
        .search
        .into_iter()
        .filter_map(|raw| match MovieSummary::try_from(raw) {
            Ok(summary) => Some(summary),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping OMDb search hit");
                None
            }
        })
        .collect())
}

/// Converts a details body
fn parse_details_response(body: &str, imdb_id: &ImdbId) -> AppResult<MovieMetadata> {
    let details: OmdbMovieDetails = serde_json::from_str(body)
        .map_err(|e| AppError::ExternalApi(format!("Failed to parse OMDb response: {}", e)))?;

    if details.response != "True" {
        let message = details
            .error
            .unwrap_or_else(|| "Error fetching movie details".to_string());
        return Err(if message.contains("not found") || message == "Incorrect IMDb ID." {
            AppError::NotFound(format!("{}: {}", imdb_id, message))
        } else {
            AppError::ExternalApi(message)
        });
    }

    Ok(details.into_metadata(imdb_id))
}

#[async_trait::async_trait]
impl MetadataProvider for OmdbProvider {
    async fn search(&self, query: &str) -> AppResult<Vec<MovieSummary>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::InvalidInput(
                "Search query cannot be empty".to_string(),
            ));
        }

        cached!(
            self.cache.as_ref(),
            CacheKey::MovieSearch(query.to_string()),
            SEARCH_CACHE_TTL,
            async move {
                let body = self.get(&[("s", query)]).await?;
                let movies = parse_search_response(&body)?;

                tracing::info!(
                    query = %query,
                    results = movies.len(),
                    provider = "omdb",
                    "Movie search completed"
                );

                Ok::<_, AppError>(movies)
            }
        )
    }

    async fn details(&self, imdb_id: &ImdbId) -> AppResult<MovieMetadata> {
        cached!(
            self.cache.as_ref(),
            CacheKey::MovieDetails(imdb_id.clone()),
            DETAILS_CACHE_TTL,
            async move {
                let body = self.get(&[("i", imdb_id.as_str())]).await?;
                let metadata = parse_details_response(&body, imdb_id)?;

                tracing::debug!(
                    imdb_id = %imdb_id,
                    title = %metadata.title,
                    provider = "omdb",
                    "Movie details fetched"
                );

                Ok::<_, AppError>(metadata)
            }
        )
    }

    fn name(&self) -> &'static str {
        "omdb"
    }
}
