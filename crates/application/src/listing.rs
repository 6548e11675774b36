use std::future::Future;

use tokio::time::Instant;

use castellan_core::{AppError, AppResult};

/// Number of rows fetched from a store per round trip.
pub(crate) const LIST_PAGE_SIZE: usize = 100;

/// Collects up to `limit` rows starting at `offset` in store-sized pages.
///
/// The deadline is checked before every page; once it has passed the listing
/// stops with `DeadlineExceeded` instead of returning a partial result.
pub(crate) async fn collect_pages<T, F, Fut>(
    limit: usize,
    offset: usize,
    deadline: Option<Instant>,
    mut fetch_page: F,
) -> AppResult<Vec<T>>
where
    F: FnMut(usize, usize) -> Fut,
    Fut: Future<Output = AppResult<Vec<T>>>,
{
    let mut rows = Vec::new();

    while rows.len() < limit {
        if let Some(deadline) = deadline
            && Instant::now() >= deadline
        {
            return Err(AppError::DeadlineExceeded(format!(
                "listing stopped after {} rows because the deadline passed",
                rows.len()
            )));
        }

        let page_limit = (limit - rows.len()).min(LIST_PAGE_SIZE);
        let page = fetch_page(offset + rows.len(), page_limit).await?;
        let exhausted = page.len() < page_limit;
        rows.extend(page);

        if exhausted {
            break;
        }
    }

    Ok(rows)
}
