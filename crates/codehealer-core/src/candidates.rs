use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::{error::GatewayError, gateway::RepositoryGateway, types::RepositoryHandle};

/// The platform never returns more than this many search results.
pub const SEARCH_RESULT_LIMIT: u64 = 1000;

/// Lazily paginated search results, consumed once per cycle.
///
/// The first page is fetched by [`CandidateSet::open`]; later pages are fetched
/// as [`CandidateSet::next`] drains the buffer. The set ends on a short or
/// empty page, after the reported total, at the page cap, or when a later
/// page fails.
pub struct CandidateSet<'a> {
    gateway: &'a dyn RepositoryGateway,
    query: String,
    per_page: u32,
    max_pages: u32,
    page: u32,
    total_count: u64,
    fetched: u64,
    buffer: VecDeque<RepositoryHandle>,
    exhausted: bool,
}

impl<'a> CandidateSet<'a> {
    pub async fn open(
        gateway: &'a dyn RepositoryGateway,
        query: &str,
        per_page: u32,
        max_pages: u32,
    ) -> Result<CandidateSet<'a>, GatewayError> {
        let per_page = per_page.clamp(1, 100);
        let page_limit = u32::try_from(SEARCH_RESULT_LIMIT / u64::from(per_page)).unwrap_or(u32::MAX);
        let max_pages = max_pages.clamp(1, page_limit.max(1));

        let first = gateway.search_repositories(query, 1, per_page).await?;
        let mut set = CandidateSet {
            gateway,
            query: query.to_string(),
            per_page,
            max_pages,
            page: 1,
            total_count: first.total_count,
            fetched: 0,
            buffer: VecDeque::new(),
            exhausted: false,
        };
        set.absorb(first.items);
        Ok(set)
    }

    /// Total matches as reported by the platform on the first page.
    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    pub async fn next(&mut self) -> Option<RepositoryHandle> {
        if let Some(repo) = self.buffer.pop_front() {
            return Some(repo);
        }
        if self.exhausted {
            return None;
        }

        self.page += 1;
        match self
            .gateway
            .search_repositories(&self.query, self.page, self.per_page)
            .await
        {
            Ok(page) => {
                self.absorb(page.items);
                self.buffer.pop_front()
            }
            Err(e) => {
                warn!(page = self.page, "search pagination stopped early: {e}");
                self.exhausted = true;
                None
            }
        }
    }

    fn absorb(&mut self, items: Vec<RepositoryHandle>) {
        let received = items.len() as u64;
        self.fetched += received;
        debug!(page = self.page, received, "search page fetched");

        if received < u64::from(self.per_page)
            || self.page >= self.max_pages
            || self.fetched >= self.total_count.min(SEARCH_RESULT_LIMIT)
        {
            self.exhausted = true;
        }
        self.buffer.extend(items);
    }
}
