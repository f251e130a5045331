// HTTP request handlers for API endpoints

use actix_web::{web, HttpResponse};
use tracing::{error, info};

use crate::api::models::*;
use crate::notion::NotionClient;
use crate::paging::{PageTranslator, RawgPageSource};
use crate::rawg::{CatalogError, RawgClient, SearchFilters};
use crate::submit::{submit_games, SubmitError};
use crate::util::env as env_util;

// Messages mirrored to the UI verbatim.
const RATE_LIMITED: &str = "Too many requests. Please wait a moment and try again.";
const SEARCH_FAILED: &str = "Game search failed. Please try again.";
const BROWSE_FAILED: &str = "Failed to load games. Please try again.";
const FILTERS_FAILED: &str = "Failed to load filter options.";
const SUBMIT_FAILED: &str = "Failed to process games.";
const PLATFORM_REQUIRED: &str = "Platform is required";

/// Expand year bounds to the upstream `dates` filter. A missing bound
/// defaults to 1970 / 2030; no bounds means no date filter at all.
pub fn expand_year_range(year_from: Option<i32>, year_to: Option<i32>) -> Option<String> {
    if year_from.is_none() && year_to.is_none() {
        return None;
    }
    let from = year_from.map_or_else(|| "1970-01-01".to_string(), |y| format!("{y}-01-01"));
    let to = year_to.map_or_else(|| "2030-12-31".to_string(), |y| format!("{y}-12-31"));
    Some(format!("{from},{to}"))
}

fn upstream_error(err: &CatalogError, fallback: &str) -> HttpResponse {
    let message = if err.is_rate_limited() {
        RATE_LIMITED
    } else {
        fallback
    };
    HttpResponse::BadGateway().json(ErrorResponse::new(message))
}

/// Health check endpoint
pub async fn health_check() -> HttpResponse {
    let notion_configured = env_util::env_opt("NOTION_API_KEY").is_some()
        && env_util::env_opt("NOTION_DATABASE_ID").is_some();

    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "notion_configured": notion_configured,
    }))
}

/// Filter vocabulary: platforms and genres for the UI dropdowns.
pub async fn get_filters(catalog: web::Data<RawgClient>) -> HttpResponse {
    // Sequential on purpose; upstream calls within one action are serialized.
    let platforms = match catalog.platforms().await {
        Ok(platforms) => platforms,
        Err(err) => {
            error!(error = %err, "platform list failed");
            return upstream_error(&err, FILTERS_FAILED);
        }
    };
    let genres = match catalog.genres().await {
        Ok(genres) => genres,
        Err(err) => {
            error!(error = %err, "genre list failed");
            return upstream_error(&err, FILTERS_FAILED);
        }
    };

    HttpResponse::Ok().json(FilterOptions { platforms, genres })
}

/// One 20-item search page.
pub async fn search_games(
    query: web::Query<SearchQuery>,
    catalog: web::Data<RawgClient>,
) -> HttpResponse {
    let filters = SearchFilters {
        search: query.search.clone(),
        platforms: query.platforms.clone(),
        genres: query.genres.clone(),
        dates: expand_year_range(query.year_from, query.year_to),
        ordering: query.ordering.clone(),
    };
    let source = RawgPageSource {
        client: catalog.get_ref(),
        filters: &filters,
    };

    match PageTranslator::search().fetch_page(&source, query.page).await {
        Ok(page) => HttpResponse::Ok().json(SearchResponse {
            count: page.total_count,
            next: page.has_next.then_some(true),
            previous: page.has_previous.then_some(true),
            results: page.results,
        }),
        Err(err) => {
            error!(error = %err, page = query.page, "search failed");
            upstream_error(&err, SEARCH_FAILED)
        }
    }
}

/// One 100-item browse page for a single platform.
pub async fn browse_games(
    query: web::Query<BrowseQuery>,
    catalog: web::Data<RawgClient>,
) -> HttpResponse {
    let Some(platform) = query.platform.clone().filter(|p| !p.trim().is_empty()) else {
        return HttpResponse::BadRequest().json(ErrorResponse::new(PLATFORM_REQUIRED));
    };

    let filters = SearchFilters {
        search: None,
        platforms: Some(platform),
        genres: query.genres.clone(),
        dates: expand_year_range(query.year_from, query.year_to),
        ordering: query.ordering.clone(),
    };
    let source = RawgPageSource {
        client: catalog.get_ref(),
        filters: &filters,
    };

    match PageTranslator::browse().fetch_page(&source, query.page).await {
        Ok(page) => HttpResponse::Ok().json(BrowseResponse {
            count: page.total_count,
            results: page.results,
            has_next: page.has_next,
            has_previous: page.has_previous,
        }),
        Err(err) => {
            error!(error = %err, page = query.page, "browse failed");
            upstream_error(&err, BROWSE_FAILED)
        }
    }
}

/// Submit selected games to the backlog database.
pub async fn add_games(
    payload: web::Json<AddGamesRequest>,
    catalog: web::Data<RawgClient>,
) -> HttpResponse {
    let ids = &payload.game_ids;
    if ids.is_empty() {
        return HttpResponse::BadRequest()
            .json(ErrorResponse::new(SubmitError::EmptyInput.to_string()));
    }

    // The store client is built per submission so search and browse keep
    // working on deployments with no Notion credentials.
    let store = match NotionClient::from_env() {
        Ok(store) => store,
        Err(err) => {
            error!(error = %err, "notion configuration error");
            return HttpResponse::InternalServerError().json(ErrorResponse::new(SUBMIT_FAILED));
        }
    };

    info!(count = ids.len(), "add games requested");
    match submit_games(catalog.get_ref(), &store, ids).await {
        Ok(outcome) => HttpResponse::Ok().json(outcome),
        Err(SubmitError::EmptyInput) => {
            HttpResponse::BadRequest().json(ErrorResponse::new(SubmitError::EmptyInput.to_string()))
        }
        Err(SubmitError::Store(err)) => {
            error!(error = %err, "submission aborted");
            HttpResponse::InternalServerError().json(ErrorResponse::new(SUBMIT_FAILED))
        }
    }
}
