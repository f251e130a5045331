//! Logical-page aggregation over RAWG's fixed upstream page size.
//!
//! The search flow exposes 20-item pages and the browse-by-platform flow
//! 100-item pages, while RAWG serves 40-item pages. One logical page is
//! assembled from `ceil(P/U)` sequential upstream fetches where the final
//! fetch requests exactly the remainder (100 -> 40+40+20, 20 -> 20).

use std::collections::HashSet;

use async_trait::async_trait;
use tracing::debug;

use crate::rawg::{CatalogError, GameSummary, Paginated, RawgClient, SearchFilters};

/// RAWG's page size used when assembling larger logical pages.
pub const UPSTREAM_PAGE_SIZE: u32 = 40;
/// Page size exposed to the search flow.
pub const SEARCH_PAGE_SIZE: u32 = 20;
/// Page size exposed to the browse-by-platform flow.
pub const BROWSE_PAGE_SIZE: u32 = 100;

/// One fixed-filter view of the upstream catalog, fetchable page by page.
#[async_trait]
pub trait PageSource {
    async fn fetch(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<Paginated<GameSummary>, CatalogError>;
}

/// The live catalog bound to one filter set.
pub struct RawgPageSource<'a> {
    pub client: &'a RawgClient,
    pub filters: &'a SearchFilters,
}

#[async_trait]
impl PageSource for RawgPageSource<'_> {
    async fn fetch(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<Paginated<GameSummary>, CatalogError> {
        self.client.search_games(self.filters, page, page_size).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpstreamFetch {
    pub page: u32,
    pub page_size: u32,
}

/// One logical page assembled from upstream fetches, deduplicated by id.
#[derive(Debug)]
pub struct AggregatedPage {
    pub total_count: u64,
    pub results: Vec<GameSummary>,
    pub has_next: bool,
    pub has_previous: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct PageTranslator {
    pub logical_page_size: u32,
    pub upstream_page_size: u32,
}

impl PageTranslator {
    pub const fn search() -> Self {
        Self {
            logical_page_size: SEARCH_PAGE_SIZE,
            upstream_page_size: UPSTREAM_PAGE_SIZE,
        }
    }

    pub const fn browse() -> Self {
        Self {
            logical_page_size: BROWSE_PAGE_SIZE,
            upstream_page_size: UPSTREAM_PAGE_SIZE,
        }
    }

    fn pages_per_request(&self) -> u32 {
        self.logical_page_size.div_ceil(self.upstream_page_size)
    }

    /// Upstream requests needed to fill one logical page, in fetch order.
    /// Sizes always sum to exactly `logical_page_size`.
    pub fn fetch_plan(&self, logical_page: u32) -> Vec<UpstreamFetch> {
        let pages = self.pages_per_request();
        let start = (logical_page.max(1) - 1) * pages + 1;
        let tail = self.logical_page_size - (pages - 1) * self.upstream_page_size;

        (0..pages)
            .map(|i| UpstreamFetch {
                page: start + i,
                page_size: if i + 1 == pages {
                    tail
                } else {
                    self.upstream_page_size
                },
            })
            .collect()
    }

    /// Fetch and aggregate one logical page.
    ///
    /// Fetches run sequentially: parallel requests would burst past the
    /// upstream rate limit. Any fetch failure aborts the whole logical page;
    /// partial pages are never returned.
    pub async fn fetch_page<S>(
        &self,
        source: &S,
        logical_page: u32,
    ) -> Result<AggregatedPage, CatalogError>
    where
        S: PageSource + Sync + ?Sized,
    {
        let logical_page = logical_page.max(1);
        let mut total_count: u64 = 0;
        let mut results: Vec<GameSummary> = Vec::with_capacity(self.logical_page_size as usize);

        for fetch in self.fetch_plan(logical_page) {
            let page = source.fetch(fetch.page, fetch.page_size).await?;
            // The most recent response is authoritative for the count; it may
            // drift between sequential fetches when upstream data mutates.
            total_count = page.count;
            let more = page.next.is_some();
            debug!(
                page = fetch.page,
                page_size = fetch.page_size,
                fetched = page.results.len(),
                total_count,
                "upstream page fetched"
            );
            results.extend(page.results);
            if !more {
                break;
            }
        }

        // Upstream pages can overlap when the underlying data shifts between
        // requests; keep the first occurrence of each id.
        let mut seen = HashSet::new();
        results.retain(|game| seen.insert(game.id));

        let total_pages = total_count.div_ceil(self.logical_page_size as u64);
        Ok(AggregatedPage {
            total_count,
            results,
            has_next: (logical_page as u64) < total_pages,
            has_previous: logical_page > 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    fn game(id: i64) -> GameSummary {
        GameSummary {
            id,
            slug: format!("game-{id}"),
            name: format!("Game {id}"),
            released: None,
            rating: 4.0,
            metacritic: None,
            platforms: None,
            genres: None,
        }
    }

    fn page(count: u64, more: bool, ids: &[i64]) -> Paginated<GameSummary> {
        Paginated {
            count,
            next: more.then(|| "https://api.rawg.io/api/games?page=next".to_string()),
            previous: None,
            results: ids.iter().copied().map(game).collect(),
        }
    }

    /// Serves queued responses in order and records every (page, page_size).
    struct ScriptedSource {
        responses: Mutex<VecDeque<Result<Paginated<GameSummary>, CatalogError>>>,
        calls: Mutex<Vec<(u32, u32)>>,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Result<Paginated<GameSummary>, CatalogError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(u32, u32)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageSource for ScriptedSource {
        async fn fetch(
            &self,
            page: u32,
            page_size: u32,
        ) -> Result<Paginated<GameSummary>, CatalogError> {
            self.calls.lock().unwrap().push((page, page_size));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("more fetches than scripted responses")
        }
    }

    #[test]
    fn search_plan_is_one_fetch_of_twenty() {
        let plan = PageTranslator::search().fetch_plan(1);
        assert_eq!(
            plan,
            vec![UpstreamFetch {
                page: 1,
                page_size: 20
            }]
        );
        assert_eq!(PageTranslator::search().fetch_plan(7)[0].page, 7);
    }

    #[test]
    fn browse_plan_spans_three_upstream_pages() {
        let plan = PageTranslator::browse().fetch_plan(2);
        let pages: Vec<u32> = plan.iter().map(|f| f.page).collect();
        let sizes: Vec<u32> = plan.iter().map(|f| f.page_size).collect();
        assert_eq!(pages, vec![4, 5, 6]);
        assert_eq!(sizes, vec![40, 40, 20]);
        assert_eq!(sizes.iter().sum::<u32>(), BROWSE_PAGE_SIZE);
    }

    #[test]
    fn plan_never_exceeds_ceil_of_sizes() {
        let translator = PageTranslator {
            logical_page_size: 80,
            upstream_page_size: 40,
        };
        let plan = translator.fetch_plan(3);
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0], UpstreamFetch { page: 5, page_size: 40 });
        assert_eq!(plan[1], UpstreamFetch { page: 6, page_size: 40 });
    }

    #[tokio::test]
    async fn browse_page_two_issues_pages_four_to_six() {
        let ids1: Vec<i64> = (120..160).collect();
        let ids2: Vec<i64> = (160..200).collect();
        let ids3: Vec<i64> = (100..120).collect();
        let source = ScriptedSource::new(vec![
            Ok(page(450, true, &ids1)),
            Ok(page(450, true, &ids2)),
            Ok(page(450, true, &ids3)),
        ]);

        let result = PageTranslator::browse().fetch_page(&source, 2).await.unwrap();

        assert_eq!(source.calls(), vec![(4, 40), (5, 40), (6, 20)]);
        assert_eq!(result.total_count, 450);
        assert_eq!(result.results.len(), 100);
        assert!(result.has_next); // 2 < ceil(450/100)
        assert!(result.has_previous);
    }

    #[tokio::test]
    async fn stops_early_when_upstream_is_exhausted() {
        let source = ScriptedSource::new(vec![
            Ok(page(170, true, &[1, 2, 3])),
            Ok(page(170, false, &[4, 5])),
            // A third response would panic the scripted source if requested.
        ]);

        let result = PageTranslator::browse().fetch_page(&source, 2).await.unwrap();

        assert_eq!(source.calls(), vec![(4, 40), (5, 40)]);
        assert_eq!(result.results.len(), 5);
    }

    #[tokio::test]
    async fn deduplicates_keeping_first_fetch_order() {
        let source = ScriptedSource::new(vec![
            Ok(page(300, true, &[10, 11, 12])),
            Ok(page(300, true, &[12, 13, 10])),
            Ok(page(300, true, &[14])),
        ]);

        let result = PageTranslator::browse().fetch_page(&source, 1).await.unwrap();

        let ids: Vec<i64> = result.results.iter().map(|g| g.id).collect();
        assert_eq!(ids, vec![10, 11, 12, 13, 14]);
    }

    #[tokio::test]
    async fn page_boundaries_for_next_and_previous() {
        // Last page: 3 == ceil(250/100).
        let source = ScriptedSource::new(vec![
            Ok(page(250, true, &[1])),
            Ok(page(250, true, &[2])),
            Ok(page(250, false, &[3])),
        ]);
        let last = PageTranslator::browse().fetch_page(&source, 3).await.unwrap();
        assert!(!last.has_next);
        assert!(last.has_previous);

        // First page of a multi-page result.
        let source = ScriptedSource::new(vec![
            Ok(page(250, true, &[1])),
            Ok(page(250, true, &[2])),
            Ok(page(250, true, &[3])),
        ]);
        let first = PageTranslator::browse().fetch_page(&source, 1).await.unwrap();
        assert!(first.has_next);
        assert!(!first.has_previous);
    }

    #[tokio::test]
    async fn any_fetch_failure_aborts_the_logical_page() {
        let source = ScriptedSource::new(vec![
            Ok(page(300, true, &[1, 2])),
            Err(CatalogError::Status {
                status: reqwest::StatusCode::TOO_MANY_REQUESTS,
                message: "throttled".into(),
            }),
        ]);

        let err = PageTranslator::browse()
            .fetch_page(&source, 1)
            .await
            .unwrap_err();
        assert!(err.is_rate_limited());
        // No third fetch after the failure.
        assert_eq!(source.calls().len(), 2);
    }
}
