/// Sequential traversal of token-chained paged listings
use std::future::Future;
use tracing::debug;

use crate::error::{Result, SorterError};
use crate::youtube::Page;

/// Fetch every page of a listing into one flat, server-ordered sequence.
///
/// `list_page` is called with the continuation token of the previous page
/// (`None` for the first call) and the page size, until a page comes back
/// without a token. Items are neither sorted nor deduplicated. Errors from
/// `list_page` are returned as-is; retrying is the caller's decision.
pub async fn fetch_all<T, F, Fut>(page_size: u32, mut list_page: F) -> Result<Vec<T>>
where
    F: FnMut(Option<String>, u32) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let mut items = Vec::new();
    let mut token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = list_page(token.clone(), page_size).await?;
        pages += 1;
        debug!("Fetched page {} with {} items", pages, page.items.len());
        items.extend(page.items);

        match page.next_token.filter(|t| !t.is_empty()) {
            Some(next) => {
                if token.as_deref() == Some(next.as_str()) {
                    return Err(SorterError::DataShape(format!(
                        "listing returned continuation token {} twice in a row",
                        next
                    )));
                }
                token = Some(next);
            }
            None => break,
        }
    }

    debug!("Fetched {} items over {} pages", items.len(), pages);
    Ok(items)
}
