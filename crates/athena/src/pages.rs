use std::sync::Arc;

use tracing::debug;

use crate::backend::AthenaBackend;
use crate::error::QthenaError;
use crate::model::{PageRequest, QueryExecutionId, QueryResults};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Cursor {
    Start,
    Next(String),
    Done,
}

/// Lazy walk over every result page of one execution.
///
/// Each [`next_page`](Self::next_page) issues one `GetQueryResults` call and
/// follows `NextToken` until the service stops returning one.
/// [`restart`](Self::restart) rewinds to the first page.
pub struct ResultPages {
    backend: Arc<dyn AthenaBackend>,
    query_id: QueryExecutionId,
    page_size: Option<i32>,
    cursor: Cursor,
    fetched: usize,
}

impl ResultPages {
    pub fn new(backend: Arc<dyn AthenaBackend>, query_id: QueryExecutionId) -> Self {
        Self {
            backend,
            query_id,
            page_size: None,
            cursor: Cursor::Start,
            fetched: 0,
        }
    }

    /// Ask for at most `page_size` rows per call.
    pub fn with_page_size(mut self, page_size: i32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn query_id(&self) -> &QueryExecutionId {
        &self.query_id
    }

    /// Number of pages fetched since the last restart.
    pub fn pages_fetched(&self) -> usize {
        self.fetched
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor == Cursor::Done
    }

    pub fn restart(&mut self) {
        self.cursor = Cursor::Start;
        self.fetched = 0;
    }

    /// Fetch the next page, or `None` once every page has been returned.
    ///
    /// On error the cursor stays where it was, so the same page can be asked
    /// for again.
    pub async fn next_page(&mut self) -> Result<Option<QueryResults>, QthenaError> {
        let next_token = match &self.cursor {
            Cursor::Done => return Ok(None),
            Cursor::Start => None,
            Cursor::Next(token) => Some(token.clone()),
        };

        let request = PageRequest {
            next_token,
            max_results: self.page_size,
        };
        let page = self
            .backend
            .get_query_results(&self.query_id, &request)
            .await?;

        self.fetched += 1;
        self.cursor = match &page.next_token {
            Some(token) if !token.is_empty() => Cursor::Next(token.clone()),
            _ => Cursor::Done,
        };

        debug!(
            query_id = %self.query_id,
            page = self.fetched,
            rows = page.result_set.rows.len(),
            more = !self.is_exhausted(),
            "Fetched result page"
        );

        Ok(Some(page))
    }

    /// Concatenate every remaining page into one result.
    ///
    /// Column metadata and update count come from the first page fetched;
    /// rows keep page order. The returned value has no `next_token`.
    pub async fn collect_all(mut self) -> Result<QueryResults, QthenaError> {
        let mut merged: Option<QueryResults> = None;

        while let Some(page) = self.next_page().await? {
            match merged.as_mut() {
                None => merged = Some(page),
                Some(acc) => acc.result_set.rows.extend(page.result_set.rows),
            }
        }

        let mut merged = merged.unwrap_or_default();
        merged.next_token = None;
        Ok(merged)
    }
}
