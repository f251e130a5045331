//! Notion document-store client: schema guard, duplicate lookup, inserts.
//!
//! REST API (base): https://api.notion.com
//!
//! Endpoints used:
//! - GET /v1/databases/{id} - column definitions
//! - PATCH /v1/databases/{id} - schema repair
//! - POST /v1/databases/{id}/query - compound-filter existence query
//! - POST /v1/pages - single-record insert

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use chrono::NaiveDate;
use reqwest::{Client, Method, StatusCode};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, info};

use crate::rawg::GameDetail;
use crate::util::env as env_util;

const DEFAULT_BASE_URL: &str = "https://api.notion.com";
const NOTION_VERSION: &str = "2022-06-28";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Notion rejects compound filters with more than 100 clauses.
pub const EXISTENCE_QUERY_CAPACITY: usize = 100;

/// The column holding the record's display name. A database has exactly one
/// title column; when it exists under another name it is renamed, never
/// duplicated.
pub const TITLE_COLUMN: &str = "Name";
/// Column storing the stable external id every lookup keys on.
pub const EXTERNAL_ID_COLUMN: &str = "RAWG ID";

const STATUS_BACKLOG: &str = "Backlog";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Notion is not configured: {0}")]
    Config(String),
    #[error("Notion request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Notion API error: {status} {message}")]
    Status { status: StatusCode, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Title,
    Number,
    MultiSelect,
    RichText,
    Date,
    Url,
    Select,
}

impl ColumnKind {
    fn config(self) -> Value {
        match self {
            Self::Title => json!({ "title": {} }),
            Self::Number => json!({ "number": {} }),
            Self::MultiSelect => json!({ "multi_select": {} }),
            Self::RichText => json!({ "rich_text": {} }),
            Self::Date => json!({ "date": {} }),
            Self::Url => json!({ "url": {} }),
            Self::Select => json!({ "select": { "options": [{ "name": STATUS_BACKLOG }] } }),
        }
    }
}

/// Every column the insert path references by name.
const REQUIRED_COLUMNS: &[(&str, ColumnKind)] = &[
    (TITLE_COLUMN, ColumnKind::Title),
    (EXTERNAL_ID_COLUMN, ColumnKind::Number),
    ("Platform", ColumnKind::MultiSelect),
    ("Genre", ColumnKind::MultiSelect),
    ("Publisher", ColumnKind::RichText),
    ("Release Date", ColumnKind::Date),
    ("Metacritic", ColumnKind::Number),
    ("Cover Image", ColumnKind::Url),
    ("Status", ColumnKind::Select),
    ("RAWG URL", ColumnKind::Url),
    ("Rating", ColumnKind::Number),
    ("Added Date", ColumnKind::Date),
];

/// Compute the schema update that brings `existing` (column name -> column
/// type) up to the required set. Returns `None` when the database already
/// conforms, so a conformant table never sees a write.
pub fn schema_patch(existing: &BTreeMap<String, String>) -> Option<Value> {
    let current_title = existing
        .iter()
        .find(|(_, kind)| kind.as_str() == "title")
        .map(|(name, _)| name.clone());

    let mut props = Map::new();
    for (name, kind) in REQUIRED_COLUMNS {
        if existing.contains_key(*name) {
            continue;
        }
        if *kind == ColumnKind::Title {
            // Rename the existing title column instead of creating a second
            // one; a database allows only one title column.
            if let Some(current) = &current_title {
                props.insert(current.clone(), json!({ "name": TITLE_COLUMN, "title": {} }));
            }
            continue;
        }
        props.insert((*name).to_string(), kind.config());
    }

    if props.is_empty() {
        None
    } else {
        Some(Value::Object(props))
    }
}

/// Compound `or`-filter matching any of the given external ids. Callers must
/// keep `group` within [`EXISTENCE_QUERY_CAPACITY`].
fn existence_filter(group: &[i64]) -> Value {
    let clauses: Vec<Value> = group
        .iter()
        .map(|id| json!({ "property": EXTERNAL_ID_COLUMN, "number": { "equals": id } }))
        .collect();
    json!({ "filter": { "or": clauses } })
}

/// Map a catalog record onto the closed set of database columns.
pub fn game_properties(game: &GameDetail, added_on: NaiveDate) -> Value {
    let platforms: Vec<Value> = game
        .platforms
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|entry| json!({ "name": entry.platform.name }))
        .collect();
    let genres: Vec<Value> = game
        .genres
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|genre| json!({ "name": genre.name }))
        .collect();
    let publishers = game
        .publishers
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|publisher| publisher.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let release_date = match &game.released {
        Some(date) => json!({ "start": date }),
        None => Value::Null,
    };

    json!({
        "Name": { "title": [{ "text": { "content": game.name } }] },
        "RAWG ID": { "number": game.id },
        "Platform": { "multi_select": platforms },
        "Genre": { "multi_select": genres },
        "Publisher": { "rich_text": [{ "text": { "content": publishers } }] },
        "Release Date": { "date": release_date },
        "Metacritic": { "number": game.metacritic },
        "Cover Image": { "url": game.background_image },
        "Status": { "select": { "name": STATUS_BACKLOG } },
        "RAWG URL": { "url": game.rawg_url() },
        "Rating": { "number": game.rating },
        "Added Date": { "date": { "start": added_on.format("%Y-%m-%d").to_string() } },
    })
}

fn truncate_for_log(mut s: String, max_len: usize) -> String {
    if s.len() > max_len {
        s.truncate(max_len);
        s.push('…');
    }
    s
}

#[derive(Debug, Clone)]
pub struct NotionClient {
    base_url: String,
    http: Client,
    token: String,
    database_id: String,
}

impl NotionClient {
    pub fn new(
        token: String,
        database_id: String,
        base_url: Option<&str>,
    ) -> Result<Self, StoreError> {
        let base_url = base_url
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();
        let http = Client::builder()
            .user_agent(concat!("game-backlog/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            base_url,
            http,
            token,
            database_id,
        })
    }

    pub fn from_env() -> Result<Self, StoreError> {
        let token = env_util::env_opt("NOTION_API_KEY")
            .ok_or_else(|| StoreError::Config("NOTION_API_KEY is not set".into()))?;
        let database_id = env_util::env_opt("NOTION_DATABASE_ID")
            .ok_or_else(|| StoreError::Config("NOTION_DATABASE_ID is not set".into()))?;
        let base_url = env_util::env_opt("NOTION_BASE_URL");
        Self::new(token, database_id, base_url.as_deref())
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let message = truncate_for_log(resp.text().await.unwrap_or_default(), 2000);
        Err(StoreError::Status { status, message })
    }

    /// Current column definitions: column name -> column type.
    pub async fn database_schema(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let path = format!("/v1/databases/{}", self.database_id);
        let resp = self.request(Method::GET, &path).send().await?;
        let body: Value = Self::check(resp).await?.json().await?;

        let mut schema = BTreeMap::new();
        if let Some(props) = body.get("properties").and_then(Value::as_object) {
            for (name, prop) in props {
                if let Some(kind) = prop.get("type").and_then(Value::as_str) {
                    schema.insert(name.clone(), kind.to_string());
                }
            }
        }
        Ok(schema)
    }

    pub async fn update_schema(&self, properties: Value) -> Result<(), StoreError> {
        let path = format!("/v1/databases/{}", self.database_id);
        let resp = self
            .request(Method::PATCH, &path)
            .json(&json!({ "properties": properties }))
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    /// Bring the database up to the required column set. Idempotent: a
    /// conformant database produces no write. Must complete before any
    /// insert, since inserts reference columns by name.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        let existing = self.database_schema().await?;
        match schema_patch(&existing) {
            Some(patch) => {
                info!(
                    columns = patch.as_object().map(Map::len).unwrap_or(0),
                    "updating database schema"
                );
                self.update_schema(patch).await
            }
            None => {
                debug!("database schema already conformant");
                Ok(())
            }
        }
    }

    /// Which of `ids` already exist in the database. Ids are resolved in
    /// groups of at most [`EXISTENCE_QUERY_CAPACITY`], one query per group;
    /// any group failure aborts the whole check so a partial duplicate set
    /// never reaches the insert path.
    pub async fn existing_ids(&self, ids: &[i64]) -> Result<HashSet<i64>, StoreError> {
        let path = format!("/v1/databases/{}/query", self.database_id);
        let mut existing = HashSet::new();

        for group in ids.chunks(EXISTENCE_QUERY_CAPACITY) {
            let resp = self
                .request(Method::POST, &path)
                .json(&existence_filter(group))
                .send()
                .await?;
            let body: Value = Self::check(resp).await?.json().await?;

            if let Some(results) = body.get("results").and_then(Value::as_array) {
                for page in results {
                    if let Some(id) = page
                        .pointer("/properties/RAWG ID/number")
                        .and_then(Value::as_i64)
                    {
                        existing.insert(id);
                    }
                }
            }
        }

        debug!(
            candidates = ids.len(),
            present = existing.len(),
            "duplicate check complete"
        );
        Ok(existing)
    }

    /// Insert one record. The cover image, when present, is attached both as
    /// the `Cover Image` column and as the page's external cover.
    pub async fn insert_game(&self, game: &GameDetail) -> Result<(), StoreError> {
        let mut body = json!({
            "parent": { "database_id": self.database_id },
            "properties": game_properties(game, chrono::Utc::now().date_naive()),
        });
        if let Some(cover) = &game.background_image {
            body["cover"] = json!({ "type": "external", "external": { "url": cover } });
        }

        let resp = self.request(Method::POST, "/v1/pages").json(&body).send().await?;
        Self::check(resp).await?;
        Ok(())
    }
}
