//! Bulk submission pipeline: candidate ids in, per-id outcome out.
//!
//! One schema-guard pass and one duplicate check run up front and are fatal
//! on failure; after that a single item's failure never aborts the batch.
//! Store writes are serialized through a token-paced submitter so the whole
//! pipeline stays under the store's published 3 requests/second ceiling.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

use crate::notion::{NotionClient, StoreError};
use crate::rawg::{CatalogError, GameDetail, RawgClient};

/// Candidates are processed in bounded chunks so each chunk's wall-clock
/// stays compatible with the store's sustained rate limit.
pub const CHUNK_SIZE: usize = 10;
/// 350ms between store submissions keeps headroom under 3 requests/second.
pub const SUBMIT_INTERVAL: Duration = Duration::from_millis(350);

/// Detail lookups the pipeline needs from the catalog.
#[async_trait]
pub trait GameCatalog {
    async fn game_detail(&self, id: i64) -> Result<GameDetail, CatalogError>;
}

#[async_trait]
impl GameCatalog for RawgClient {
    async fn game_detail(&self, id: i64) -> Result<GameDetail, CatalogError> {
        RawgClient::game_detail(self, id).await
    }
}

/// Store operations the pipeline needs, in call order.
#[async_trait]
pub trait BacklogStore {
    async fn ensure_schema(&self) -> Result<(), StoreError>;
    async fn existing_ids(&self, ids: &[i64]) -> Result<HashSet<i64>, StoreError>;
    async fn insert_game(&self, game: &GameDetail) -> Result<(), StoreError>;
}

#[async_trait]
impl BacklogStore for NotionClient {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        NotionClient::ensure_schema(self).await
    }

    async fn existing_ids(&self, ids: &[i64]) -> Result<HashSet<i64>, StoreError> {
        NotionClient::existing_ids(self, ids).await
    }

    async fn insert_game(&self, game: &GameDetail) -> Result<(), StoreError> {
        NotionClient::insert_game(self, game).await
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GameRef {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedGame {
    pub id: i64,
    pub name: String,
    pub error: String,
}

/// Per-id verdicts for one submission action. Every input id lands in
/// exactly one of the three lists.
#[derive(Debug, Default, Serialize)]
pub struct SubmissionOutcome {
    pub added: Vec<GameRef>,
    pub duplicates: Vec<GameRef>,
    #[serde(rename = "errors")]
    pub failed: Vec<FailedGame>,
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("gameIds must be a non-empty array.")]
    EmptyInput,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Token-paced submitter: one shared clock, a fixed interval between grants.
/// The first grant is immediate; each subsequent `wait` sleeps out whatever
/// remains of the interval since the previous grant.
#[derive(Clone)]
pub struct SubmitPacer {
    interval: Duration,
    next_allowed: Arc<Mutex<Instant>>,
}

impl SubmitPacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_allowed: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub async fn wait(&self) {
        let mut next_allowed = self.next_allowed.lock().await;
        let now = Instant::now();
        let wait_until = if now >= *next_allowed {
            now
        } else {
            *next_allowed
        };
        let sleep_duration = wait_until.saturating_duration_since(now);
        *next_allowed = wait_until + self.interval;
        drop(next_allowed);

        if !sleep_duration.is_zero() {
            sleep(sleep_duration).await;
        }
    }
}

fn placeholder_name(id: i64) -> String {
    format!("Game #{id}")
}

/// Add every candidate id to the store, reporting a per-id outcome.
///
/// `ids` is the caller's already-deduplicated selection set; an empty list
/// is rejected before any side effect.
pub async fn submit_games<C, S>(
    catalog: &C,
    store: &S,
    ids: &[i64],
) -> Result<SubmissionOutcome, SubmitError>
where
    C: GameCatalog + Sync,
    S: BacklogStore + Sync,
{
    if ids.is_empty() {
        return Err(SubmitError::EmptyInput);
    }

    store.ensure_schema().await?;
    let existing = store.existing_ids(ids).await?;

    let pacer = SubmitPacer::new(SUBMIT_INTERVAL);
    let mut outcome = SubmissionOutcome::default();
    let chunk_count = ids.len().div_ceil(CHUNK_SIZE);

    for (chunk_idx, chunk) in ids.chunks(CHUNK_SIZE).enumerate() {
        let first = chunk_idx * CHUNK_SIZE + 1;
        let last = chunk_idx * CHUNK_SIZE + chunk.len();
        // Advisory progress line for caller-side display.
        info!(
            chunk = chunk_idx + 1,
            chunks = chunk_count,
            "adding games {}-{} of {}",
            first,
            last,
            ids.len()
        );

        for &id in chunk {
            if existing.contains(&id) {
                // A duplicate is already a no-op for the store; name
                // resolution is best-effort and never fails the item.
                let name = match catalog.game_detail(id).await {
                    Ok(detail) => detail.name,
                    Err(err) => {
                        warn!(id, error = %err, "could not resolve duplicate name");
                        placeholder_name(id)
                    }
                };
                outcome.duplicates.push(GameRef { id, name });
                continue;
            }

            let detail = match catalog.game_detail(id).await {
                Ok(detail) => detail,
                Err(err) => {
                    warn!(id, error = %err, "detail fetch failed");
                    outcome.failed.push(FailedGame {
                        id,
                        name: placeholder_name(id),
                        error: "Failed to fetch game details.".into(),
                    });
                    continue;
                }
            };

            pacer.wait().await;
            match store.insert_game(&detail).await {
                Ok(()) => outcome.added.push(GameRef {
                    id,
                    name: detail.name,
                }),
                Err(err) => {
                    warn!(id, error = %err, "insert failed");
                    outcome.failed.push(FailedGame {
                        id,
                        name: detail.name,
                        error: "Failed to add to Notion.".into(),
                    });
                }
            }
        }
    }

    info!(
        added = outcome.added.len(),
        duplicates = outcome.duplicates.len(),
        failed = outcome.failed.len(),
        "submission complete"
    );
    Ok(outcome)
}
