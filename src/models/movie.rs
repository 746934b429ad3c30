use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

use crate::error::AppError;

pub const UNKNOWN_TITLE: &str = "Unknown";
pub const UNKNOWN_GENRE: &str = "N/A";

/// IMDb identifier of a title (e.g., "tt1375666")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImdbId(String);

impl ImdbId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ImdbId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let valid = s
            .strip_prefix("tt")
            .map(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
            .unwrap_or(false);

        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(AppError::InvalidInput(format!("Invalid IMDb id: {}", s)))
        }
    }
}

impl TryFrom<String> for ImdbId {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ImdbId> for String {
    fn from(id: ImdbId) -> Self {
        id.0
    }
}

impl Display for ImdbId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A search hit returned to the client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovieSummary {
    pub imdb_id: ImdbId,
    pub title: String,
    pub year: String,
    pub title_type: String,
    pub poster: String,
}

/// A critic score as reported by the metadata source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CriticRating {
    pub source: String,
    pub value: String,
}

/// Movie details used by the watchlist and the details endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovieMetadata {
    pub imdb_id: ImdbId,
    pub title: String,
    pub year: String,
    pub genre: String,
    pub poster: String,
    pub plot: String,
    pub ratings: Vec<CriticRating>,
}

impl MovieMetadata {
    /// Stand-in shown when the metadata source cannot be reached
    pub fn placeholder(imdb_id: ImdbId) -> Self {
        Self {
            imdb_id,
            title: UNKNOWN_TITLE.to_string(),
            year: String::new(),
            genre: UNKNOWN_GENRE.to_string(),
            poster: String::new(),
            plot: String::new(),
            ratings: Vec::new(),
        }
    }

    /// Rotten Tomatoes critic score in percent, if reported
    pub fn rotten_tomatoes(&self) -> Option<u8> {
        self.ratings
            .iter()
            .find(|r| r.source == "Rotten Tomatoes")
            .and_then(|r| r.value.trim().trim_end_matches('%').parse::<u8>().ok())
            .filter(|pct| *pct <= 100)
    }

    /// Case-insensitive substring match against the genre list
    pub fn matches_genre(&self, filter: &str) -> bool {
        self.genre
            .to_lowercase()
            .contains(&filter.trim().to_lowercase())
    }
}

// ============================================================================
// OMDb API Types
// ============================================================================

/// Envelope of `GET /?s=...`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OmdbSearchResponse {
    pub response: String,
    #[serde(default)]
    pub search: Vec<OmdbMovieSummary>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OmdbMovieSummary {
    pub title: String,
    #[serde(default)]
    pub year: String,
    #[serde(rename = "imdbID")]
    pub imdb_id: String,
    #[serde(rename = "Type", default)]
    pub title_type: String,
    #[serde(default)]
    pub poster: String,
}

/// Body of `GET /?i=...`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OmdbMovieDetails {
    pub response: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub plot: Option<String>,
    #[serde(default)]
    pub poster: Option<String>,
    #[serde(default)]
    pub ratings: Vec<OmdbRating>,
    #[serde(rename = "imdbID", default)]
    pub imdb_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OmdbRating {
    pub source: String,
    pub value: String,
}

/// OMDb reports missing fields as the literal "N/A"
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty() && v != "N/A")
}

impl TryFrom<OmdbMovieSummary> for MovieSummary {
    type Error = AppError;

    fn try_from(raw: OmdbMovieSummary) -> Result<Self, Self::Error> {
        Ok(Self {
            imdb_id: raw.imdb_id.parse()?,
            title: raw.title,
            year: raw.year,
            title_type: raw.title_type,
            poster: present(Some(raw.poster)).unwrap_or_default(),
        })
    }
}

impl OmdbMovieDetails {
    /// Converts to our model, falling back to `requested` when the body omits the id
    pub fn into_metadata(self, requested: &ImdbId) -> MovieMetadata {
        let imdb_id = self
            .imdb_id
            .and_then(|id| id.parse().ok())
            .unwrap_or_else(|| requested.clone());

        MovieMetadata {
            imdb_id,
            title: present(self.title).unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
            year: present(self.year).unwrap_or_default(),
            genre: present(self.genre).unwrap_or_else(|| UNKNOWN_GENRE.to_string()),
            poster: present(self.poster).unwrap_or_default(),
            plot: present(self.plot).unwrap_or_default(),
            ratings: self
                .ratings
                .into_iter()
                .map(|r| CriticRating {
                    source: r.source,
                    value: r.value,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ImdbId {
        s.parse().unwrap()
    }

    #[test]
    fn test_imdb_id_parse() {
        assert_eq!(id("tt1375666").as_str(), "tt1375666");
        assert_eq!(id(" tt0133093 ").as_str(), "tt0133093");
        assert!("1375666".parse::<ImdbId>().is_err());
        assert!("tt".parse::<ImdbId>().is_err());
        assert!("tt12ab".parse::<ImdbId>().is_err());
    }

    #[test]
    fn test_imdb_id_serde_is_plain_string() {
        let json = serde_json::to_string(&id("tt1375666")).unwrap();
        assert_eq!(json, r#""tt1375666""#);
        assert!(serde_json::from_str::<ImdbId>(r#""nope""#).is_err());
    }

    #[test]
    fn test_rotten_tomatoes_parsing() {
        let mut meta = MovieMetadata::placeholder(id("tt1375666"));
        assert_eq!(meta.rotten_tomatoes(), None);

        meta.ratings = vec![
            CriticRating {
                source: "Internet Movie Database".into(),
                value: "8.8/10".into(),
            },
            CriticRating {
                source: "Rotten Tomatoes".into(),
                value: "87%".into(),
            },
        ];
        assert_eq!(meta.rotten_tomatoes(), Some(87));
    }

    #[test]
    fn test_matches_genre_case_insensitive() {
        let mut meta = MovieMetadata::placeholder(id("tt1375666"));
        meta.genre = "Action, Adventure, Sci-Fi".into();
        assert!(meta.matches_genre("sci-fi"));
        assert!(meta.matches_genre(" ADVENTURE "));
        assert!(!meta.matches_genre("Horror"));
    }

    #[test]
    fn test_omdb_details_deserialization() {
        let json = r#"{
            "Title": "Inception",
            "Year": "2010",
            "Genre": "Action, Adventure, Sci-Fi",
            "Plot": "A thief who steals corporate secrets...",
            "Poster": "N/A",
            "Ratings": [{"Source": "Rotten Tomatoes", "Value": "87%"}],
            "imdbID": "tt1375666",
            "Response": "True"
        }"#;

        let details: OmdbMovieDetails = serde_json::from_str(json).unwrap();
        let meta = details.into_metadata(&id("tt1375666"));
        assert_eq!(meta.title, "Inception");
        assert_eq!(meta.poster, "");
        assert_eq!(meta.rotten_tomatoes(), Some(87));
    }

    #[test]
    fn test_omdb_summary_conversion() {
        let json = r#"{
            "Title": "The Matrix",
            "Year": "1999",
            "imdbID": "tt0133093",
            "Type": "movie",
            "Poster": "https://example.com/matrix.jpg"
        }"#;

        let raw: OmdbMovieSummary = serde_json::from_str(json).unwrap();
        let summary = MovieSummary::try_from(raw).unwrap();
        assert_eq!(summary.imdb_id, id("tt0133093"));
        assert_eq!(summary.title_type, "movie");
        assert_eq!(summary.poster, "https://example.com/matrix.jpg");
    }
}
