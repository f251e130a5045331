// API request/response models (DTOs)

use serde::{Deserialize, Serialize};

use crate::rawg::{GameSummary, Genre, Platform};

/// Error payload returned by every endpoint on failure.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

/// Filter vocabulary for the UI's dropdowns.
#[derive(Debug, Serialize)]
pub struct FilterOptions {
    pub platforms: Vec<Platform>,
    pub genres: Vec<Genre>,
}

fn default_page() -> u32 {
    1
}

/// Query parameters for the search flow (logical page size 20).
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
    pub platforms: Option<String>,
    pub genres: Option<String>,
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    pub ordering: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
}

/// Query parameters for the browse-by-platform flow (logical page size 100).
#[derive(Debug, Deserialize)]
pub struct BrowseQuery {
    pub platform: Option<String>,
    pub genres: Option<String>,
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    pub ordering: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub count: u64,
    pub next: Option<bool>,
    pub previous: Option<bool>,
    pub results: Vec<GameSummary>,
}

#[derive(Debug, Serialize)]
pub struct BrowseResponse {
    pub count: u64,
    pub results: Vec<GameSummary>,
    #[serde(rename = "hasNext")]
    pub has_next: bool,
    #[serde(rename = "hasPrevious")]
    pub has_previous: bool,
}

#[derive(Debug, Deserialize)]
pub struct AddGamesRequest {
    #[serde(rename = "gameIds", default)]
    pub game_ids: Vec<i64>,
}
