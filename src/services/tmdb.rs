// TMDB genre lookup
// API Documentation: https://developer.themoviedb.org/reference/intro/getting-started

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::playlist::classify::GenreLookup;

const TMDB_API_BASE: &str = "https://api.themoviedb.org/3";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// TMDB API client
pub struct TmdbClient {
    client: Client,
    api_key: String,
    base_url: String,
}

/// Search result for movies
#[derive(Debug, Deserialize)]
pub struct MovieSearchResults {
    pub results: Vec<MovieSearchResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MovieSearchResult {
    pub id: i64,
    pub title: String,
    pub release_date: Option<String>,
}

impl MovieSearchResult {
    fn release_year(&self) -> Option<i32> {
        self.release_date
            .as_deref()
            .and_then(|d| d.split('-').next())
            .and_then(|y| y.parse().ok())
    }
}

/// Detailed movie info
#[derive(Debug, Deserialize)]
pub struct MovieDetails {
    pub genres: Option<Vec<Genre>>,
}

#[derive(Debug, Deserialize)]
pub struct Genre {
    pub name: String,
}

impl TmdbClient {
    /// Create a new TMDB client
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, TMDB_API_BASE.to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            api_key,
            base_url,
        }
    }

    /// Search for movies by name
    pub async fn search_movie(
        &self,
        query: &str,
        year: Option<i32>,
    ) -> Result<Vec<MovieSearchResult>> {
        let mut url = format!(
            "{}/search/movie?api_key={}&query={}&include_adult=false",
            self.base_url,
            self.api_key,
            urlencoding::encode(query)
        );

        if let Some(y) = year {
            url.push_str(&format!("&year={}", y));
        }

        let response: MovieSearchResults = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to search TMDB for movies")?
            .error_for_status()
            .context("TMDB movie search returned an error status")?
            .json()
            .await
            .context("Failed to parse TMDB movie search response")?;

        tracing::debug!(
            "TMDB search for '{}' returned {} results",
            query,
            response.results.len()
        );
        Ok(response.results)
    }

    /// Get detailed movie info
    pub async fn get_movie_details(&self, tmdb_id: i64) -> Result<MovieDetails> {
        let url = format!(
            "{}/movie/{}?api_key={}",
            self.base_url, tmdb_id, self.api_key
        );

        let response: MovieDetails = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to get TMDB movie details")?
            .error_for_status()
            .context("TMDB movie details returned an error status")?
            .json()
            .await
            .context("Failed to parse TMDB movie details response")?;

        Ok(response)
    }

    /// Genre names of the best search match, empty when nothing matched
    pub async fn get_movie_genres(&self, title: &str, year: Option<i32>) -> Result<Vec<String>> {
        let results = self.search_movie(title, year).await?;

        let Some(best) = best_match(results, year) else {
            tracing::debug!("No TMDB match for movie: {}", title);
            return Ok(Vec::new());
        };

        tracing::debug!("TMDB match for '{}': {} ({})", title, best.title, best.id);
        let details = self.get_movie_details(best.id).await?;

        Ok(details
            .genres
            .unwrap_or_default()
            .into_iter()
            .map(|g| g.name)
            .collect())
    }
}

/// Prefer the first result released in the requested year, then the top result
fn best_match(results: Vec<MovieSearchResult>, year: Option<i32>) -> Option<MovieSearchResult> {
    if let Some(target_year) = year {
        if let Some(found) = results.iter().find(|r| r.release_year() == Some(target_year)) {
            return Some(found.clone());
        }
    }
    results.into_iter().next()
}

impl GenreLookup for TmdbClient {
    async fn movie_genres(&self, title: &str, year: Option<i32>) -> Result<Vec<String>> {
        self.get_movie_genres(title, year).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search_response() {
        let json = r#"{
            "page": 1,
            "results": [
                {"id": 603, "title": "The Matrix", "original_title": "The Matrix", "release_date": "1999-03-30"},
                {"id": 604, "title": "The Matrix Reloaded", "release_date": ""}
            ],
            "total_results": 2
        }"#;
        let parsed: MovieSearchResults = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.results.len(), 2);
        assert_eq!(parsed.results[0].release_year(), Some(1999));
        assert_eq!(parsed.results[1].release_year(), None);
    }

    #[test]
    fn test_parse_details_genres() {
        let json = r#"{"id": 515042, "title": "Free Solo", "genres": [{"id": 99, "name": "Documentary"}]}"#;
        let details: MovieDetails = serde_json::from_str(json).unwrap();
        let genres = details.genres.unwrap();
        assert_eq!(genres[0].name, "Documentary");
    }

    #[test]
    fn test_best_match_prefers_year() {
        let results = vec![
            MovieSearchResult {
                id: 1,
                title: "Dune".into(),
                release_date: Some("1984-12-14".into()),
            },
            MovieSearchResult {
                id: 2,
                title: "Dune".into(),
                release_date: Some("2021-09-15".into()),
            },
        ];
        assert_eq!(best_match(results.clone(), Some(2021)).unwrap().id, 2);
        assert_eq!(best_match(results.clone(), Some(1950)).unwrap().id, 1);
        assert_eq!(best_match(results, None).unwrap().id, 1);
        assert!(best_match(Vec::new(), None).is_none());
    }

    #[tokio::test]
    async fn test_unreachable_service_is_an_error() {
        // Port 9 (discard) on localhost is not an HTTP server
        let client = TmdbClient::with_base_url("key".into(), "http://127.0.0.1:9".into());
        assert!(client.movie_genres("Heat", Some(1995)).await.is_err());
    }
}
