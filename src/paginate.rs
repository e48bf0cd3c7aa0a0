//! Post-filter pagination over a store that only limits pre-filter pages.

use serde::{Deserialize, Serialize};

use crate::record::{ObjectKey, ObjectRecord};

/// Default cap on store pages fetched for one filtered request.
pub const DEFAULT_MAX_FILTER_PAGES: usize = 10;

/// Items that can report their own store key.
pub trait Keyed {
    /// Key a scan can resume after.
    fn store_key(&self) -> ObjectKey;
}

impl Keyed for ObjectRecord {
    fn store_key(&self) -> ObjectKey {
        self.key()
    }
}

/// One raw page as returned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StorePage<T> {
    /// Items in key order.
    pub items: Vec<T>,
    /// Resume point; `None` when the store has nothing further.
    pub last_key: Option<ObjectKey>,
}

/// Canonical list result: at most `limit` items plus a resume point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Collected items.
    pub items: Vec<T>,
    /// Where the next request continues; `None` at end of data.
    pub next: Option<ObjectKey>,
}

impl<T> Page<T> {
    /// Maps each item, keeping the resume point.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            next: self.next,
        }
    }
}

/// Sizing for one filtered request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Wanted post-filter items.
    pub limit: usize,
    /// Items requested from the store per fetch.
    pub page_size: usize,
    /// Hard cap on fetches.
    pub max_pages: usize,
}

impl PageRequest {
    /// Request with page size equal to `limit` and the default page cap.
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            page_size: limit,
            max_pages: DEFAULT_MAX_FILTER_PAGES,
        }
    }
}

/// Fetches store pages starting after `start`, keeps items matching `keep`,
/// and stops once `limit` items are collected, the store runs dry, or
/// `max_pages` fetches were made. Hitting the cap is not an error: the
/// partial result carries the last resume point.
///
/// When the limit is reached inside a page, the resume point is the key of
/// the last collected item, so the unread remainder of that page is seen on
/// the next request.
pub fn collect_filtered<T, E, F, P>(
    start: Option<ObjectKey>,
    req: PageRequest,
    mut fetch: F,
    mut keep: P,
) -> Result<Page<T>, E>
where
    T: Keyed,
    F: FnMut(Option<&ObjectKey>, usize) -> Result<StorePage<T>, E>,
    P: FnMut(&T) -> bool,
{
    let limit = req.limit.max(1);
    let page_size = req.page_size.max(1);
    let mut collected = Vec::new();
    let mut cursor = start;
    let mut pages = 0usize;

    while pages < req.max_pages {
        let page = fetch(cursor.as_ref(), page_size)?;
        pages += 1;

        let mut stopped_at = None;
        let mut items = page.items.into_iter();
        while let Some(item) = items.next() {
            if !keep(&item) {
                continue;
            }
            let key = item.store_key();
            collected.push(item);
            if collected.len() >= limit {
                if items.len() > 0 {
                    stopped_at = Some(key);
                }
                break;
            }
        }

        cursor = match stopped_at {
            Some(key) => Some(key),
            None => page.last_key,
        };

        if collected.len() >= limit || cursor.is_none() {
            break;
        }
    }

    Ok(Page {
        items: collected,
        next: cursor,
    })
}
