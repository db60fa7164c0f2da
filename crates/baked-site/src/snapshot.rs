//! Site-wide render inputs shared by every page of a build.

use std::collections::HashMap;

use serde_json::Value;

use crate::Page;

/// Pages in date order, the `latest_pages` list and the site metadata, read
/// from the store once.
///
/// Taken with [`Baker::snapshot`](crate::Baker::snapshot) and passed to
/// [`Baker::render_page_in`](crate::Baker::render_page_in), so rendering `n`
/// pages does not re-read the page list `n` times. Store changes made after
/// the snapshot is taken are not seen.
#[derive(Debug, Clone)]
pub struct SiteSnapshot {
    /// Newest first, undated pages last.
    pages: Vec<Page>,
    positions: HashMap<String, usize>,
    latest: Value,
    site: Value,
}

impl SiteSnapshot {
    pub(crate) fn new(pages: Vec<Page>, latest_count: usize, site: Value) -> Self {
        let positions = pages
            .iter()
            .enumerate()
            .map(|(i, page)| (page.slug.clone(), i))
            .collect();
        let latest = pages
            .iter()
            .take(latest_count)
            .map(Page::to_json)
            .collect::<Vec<_>>();
        Self {
            pages,
            positions,
            latest: Value::Array(latest),
            site,
        }
    }

    /// Every page, newest first.
    #[must_use]
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub(crate) fn site(&self) -> &Value {
        &self.site
    }

    pub(crate) fn latest(&self) -> &Value {
        &self.latest
    }

    /// Older and newer neighbours of `slug`, or `None` for an unknown slug.
    pub(crate) fn neighbours(&self, slug: &str) -> Option<(Option<&Page>, Option<&Page>)> {
        let position = *self.positions.get(slug)?;
        let older = self.pages.get(position + 1);
        let newer = position.checked_sub(1).and_then(|i| self.pages.get(i));
        Some((older, newer))
    }
}
