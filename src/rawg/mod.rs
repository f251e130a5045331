//! RAWG catalog client.
//!
//! Base: https://api.rawg.io/api
//!
//! Endpoints used:
//! - GET /games?search=...&platforms=...&page=...&page_size=... - paginated search
//! - GET /games/{id} - full game detail
//! - GET /platforms - platform taxonomy
//! - GET /genres - genre taxonomy
//!
//! No retries here: retry policy belongs to callers, and none is implemented
//! anywhere so rate-limit pressure is never amplified.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::env as env_util;

const DEFAULT_BASE_URL: &str = "https://api.rawg.io/api";

/// Timeout for taxonomy and detail lookups.
const METADATA_TIMEOUT: Duration = Duration::from_secs(10);
/// Search payloads are larger; allow more time.
const SEARCH_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("RAWG request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("RAWG API error: {status} {message}")]
    Status { status: StatusCode, message: String },
}

impl CatalogError {
    /// True when the upstream answered 429, so callers can show a
    /// "slow down" message instead of a generic failure.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Status { status, .. } if *status == StatusCode::TOO_MANY_REQUESTS)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Platform {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Genre {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdName {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformEntry {
    pub platform: IdName,
}

/// One row of a paginated game listing. Never persisted; a transient
/// projection of upstream data keyed by the stable RAWG id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSummary {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub released: Option<String>,
    pub rating: f64,
    pub metacritic: Option<i32>,
    pub platforms: Option<Vec<PlatformEntry>>,
    pub genres: Option<Vec<Genre>>,
}

/// Full game record, fetched lazily when a candidate is actually inserted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameDetail {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub released: Option<String>,
    pub rating: f64,
    pub metacritic: Option<i32>,
    pub platforms: Option<Vec<PlatformEntry>>,
    pub genres: Option<Vec<Genre>>,
    pub background_image: Option<String>,
    pub publishers: Option<Vec<IdName>>,
    pub description_raw: Option<String>,
}

impl GameDetail {
    /// Public catalog page for this game.
    pub fn rawg_url(&self) -> String {
        format!("https://rawg.io/games/{}", self.slug)
    }
}

#[derive(Debug, Deserialize)]
pub struct Paginated<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// Optional, additive (AND) search filters. `platforms` is a CSV of
/// platform ids, `genres` a CSV of genre slugs, `dates` a
/// `YYYY-MM-DD,YYYY-MM-DD` range.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub search: Option<String>,
    pub platforms: Option<String>,
    pub genres: Option<String>,
    pub dates: Option<String>,
    pub ordering: Option<String>,
}

fn truncate_for_log(mut s: String, max_len: usize) -> String {
    if s.len() > max_len {
        s.truncate(max_len);
        s.push('…');
    }
    s
}

#[derive(Debug, Clone)]
pub struct RawgClient {
    base_url: String,
    http: Client,
    api_key: String,
}

impl RawgClient {
    pub fn new(api_key: String, base_url: Option<&str>) -> Result<Self, CatalogError> {
        let base_url = base_url
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();
        let http = Client::builder()
            .user_agent(concat!("game-backlog/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            base_url,
            http,
            api_key,
        })
    }

    pub fn from_env() -> anyhow::Result<Self> {
        let api_key = env_util::env_req("RAWG_API_KEY")?;
        let base_url = env_util::env_opt("RAWG_BASE_URL");
        Ok(Self::new(api_key, base_url.as_deref())?)
    }

    async fn get_json<T>(
        &self,
        url: &str,
        query: &[(&str, String)],
        timeout: Duration,
    ) -> Result<T, CatalogError>
    where
        T: serde::de::DeserializeOwned,
    {
        let resp = self
            .http
            .get(url)
            .query(&[("key", self.api_key.as_str())])
            .query(query)
            .timeout(timeout)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let message = truncate_for_log(resp.text().await.unwrap_or_default(), 2000);
            return Err(CatalogError::Status { status, message });
        }
        Ok(resp.json().await?)
    }

    /// One upstream page of search results.
    pub async fn search_games(
        &self,
        filters: &SearchFilters,
        page: u32,
        page_size: u32,
    ) -> Result<Paginated<GameSummary>, CatalogError> {
        let url = format!("{}/games", self.base_url);
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(search) = &filters.search {
            query.push(("search", search.clone()));
        }
        if let Some(platforms) = &filters.platforms {
            query.push(("platforms", platforms.clone()));
        }
        if let Some(genres) = &filters.genres {
            query.push(("genres", genres.clone()));
        }
        if let Some(dates) = &filters.dates {
            query.push(("dates", dates.clone()));
        }
        if let Some(ordering) = &filters.ordering {
            query.push(("ordering", ordering.clone()));
        }
        query.push(("page", page.to_string()));
        query.push(("page_size", page_size.to_string()));

        self.get_json(&url, &query, SEARCH_TIMEOUT).await
    }

    pub async fn game_detail(&self, id: i64) -> Result<GameDetail, CatalogError> {
        let url = format!("{}/games/{}", self.base_url, id);
        self.get_json(&url, &[], METADATA_TIMEOUT).await
    }

    pub async fn platforms(&self) -> Result<Vec<Platform>, CatalogError> {
        let url = format!("{}/platforms", self.base_url);
        let list: Paginated<Platform> = self
            .get_json(
                &url,
                &[
                    ("page_size", "50".to_string()),
                    ("ordering", "name".to_string()),
                ],
                METADATA_TIMEOUT,
            )
            .await?;
        Ok(list.results)
    }

    pub async fn genres(&self) -> Result<Vec<Genre>, CatalogError> {
        let url = format!("{}/genres", self.base_url);
        let list: Paginated<Genre> = self.get_json(&url, &[], METADATA_TIMEOUT).await?;
        Ok(list.results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_row_deserializes_from_rawg_payload() {
        let raw = serde_json::json!({
            "count": 1420,
            "next": "https://api.rawg.io/api/games?page=2",
            "previous": null,
            "results": [{
                "id": 3328,
                "slug": "the-witcher-3-wild-hunt",
                "name": "The Witcher 3: Wild Hunt",
                "released": "2015-05-18",
                "rating": 4.65,
                "metacritic": 92,
                "platforms": [{"platform": {"id": 18, "name": "PlayStation 4"}}],
                "genres": [{"id": 4, "name": "Action", "slug": "action"}],
                "background_image": "https://media.rawg.io/media/games/618/bg.jpg"
            }]
        });

        let page: Paginated<GameSummary> = serde_json::from_value(raw).unwrap();
        assert_eq!(page.count, 1420);
        assert!(page.next.is_some());
        let game = &page.results[0];
        assert_eq!(game.id, 3328);
        assert_eq!(game.released.as_deref(), Some("2015-05-18"));
        assert_eq!(game.metacritic, Some(92));
        assert_eq!(game.platforms.as_ref().unwrap()[0].platform.id, 18);
    }

    #[test]
    fn detail_tolerates_missing_optional_fields() {
        let raw = serde_json::json!({
            "id": 9999,
            "slug": "obscure-game",
            "name": "Obscure Game",
            "released": null,
            "rating": 0.0,
            "metacritic": null,
            "platforms": null,
            "genres": null,
            "background_image": null,
            "publishers": null
        });

        let detail: GameDetail = serde_json::from_value(raw).unwrap();
        assert!(detail.background_image.is_none());
        assert!(detail.publishers.is_none());
        assert!(detail.description_raw.is_none());
        assert_eq!(detail.rawg_url(), "https://rawg.io/games/obscure-game");
    }

    #[test]
    fn only_429_reads_as_rate_limited() {
        let throttled = CatalogError::Status {
            status: StatusCode::TOO_MANY_REQUESTS,
            message: String::new(),
        };
        let broken = CatalogError::Status {
            status: StatusCode::BAD_GATEWAY,
            message: String::new(),
        };
        assert!(throttled.is_rate_limited());
        assert!(!broken.is_rate_limited());
    }
}
