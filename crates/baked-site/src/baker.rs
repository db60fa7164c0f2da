//! Read-side facade over the store and the page render entry point.

use std::sync::Arc;

use baked_config::{RenderConfig, SITE_FILENAME, SITE_KIND};
use baked_store::{AssetRecord, Store, TEMPLATES};
use baked_template::{Context, RenderOptions, Template, TemplateHost, wrap_script, wrap_style};
use serde_json::{Map, Value};

use crate::{BakeError, Page, SiteSnapshot};

/// Default number of pages exposed to templates as `latest_pages`.
const DEFAULT_LATEST_COUNT: usize = 10;

/// Queries pages and assets from a [`Store`] and renders pages.
///
/// The store is only read. A `Baker` is `Sync`, so one instance can render
/// many pages in parallel.
pub struct Baker {
    store: Arc<Store>,
    options: RenderOptions,
    latest_count: usize,
}

impl Baker {
    #[must_use]
    pub fn new(store: Arc<Store>, options: RenderOptions) -> Self {
        Self {
            store,
            options,
            latest_count: DEFAULT_LATEST_COUNT,
        }
    }

    /// Create a baker using the `[render]` section of `baked.toml`.
    #[must_use]
    pub fn with_config(store: Arc<Store>, config: &RenderConfig) -> Self {
        let options = RenderOptions {
            autoescape: config.autoescape,
            image_prefix: config.image_prefix.clone(),
        };
        Self::new(store, options).with_latest_count(config.latest_pages)
    }

    /// Set how many pages templates see as `latest_pages`.
    #[must_use]
    pub fn with_latest_count(mut self, count: usize) -> Self {
        self.latest_count = count;
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Look up a page by slug.
    pub fn get_page(&self, slug: &str) -> Result<Page, BakeError> {
        let record = self
            .store
            .get_page_by_slug(slug)?
            .ok_or_else(|| BakeError::PageNotFound(slug.to_owned()))?;
        Page::from_record(record)
    }

    /// The `count` most recent pages, newest first.
    pub fn get_latest_pages(&self, count: usize) -> Result<Vec<Page>, BakeError> {
        self.store
            .list_latest_pages(count)?
            .into_iter()
            .map(Page::from_record)
            .collect()
    }

    /// The page published just before `page`, if any.
    pub fn get_prev_page(&self, page: &Page) -> Result<Option<Page>, BakeError> {
        Ok(self.neighbours(page)?.0)
    }

    /// The page published just after `page`, if any.
    pub fn get_next_page(&self, page: &Page) -> Result<Option<Page>, BakeError> {
        Ok(self.neighbours(page)?.1)
    }

    /// Older and newer neighbours of `page` in date order.
    fn neighbours(&self, page: &Page) -> Result<(Option<Page>, Option<Page>), BakeError> {
        let mut pages = self.store.list_pages_ordered_by_date()?;
        let Some(position) = pages.iter().position(|p| p.slug == page.slug) else {
            return Err(BakeError::PageNotFound(page.slug.clone()));
        };

        // Newest first: the older page follows, the newer one precedes.
        let older = (position + 1 < pages.len()).then(|| pages.swap_remove(position + 1));
        let newer = position.checked_sub(1).map(|i| pages.swap_remove(i));

        Ok((
            older.map(Page::from_record).transpose()?,
            newer.map(Page::from_record).transpose()?,
        ))
    }

    /// Pages whose title or content contains `term`, ignoring case.
    pub fn search(&self, term: &str) -> Result<Vec<Page>, BakeError> {
        self.store
            .search_pages_by_text(term)?
            .into_iter()
            .map(Page::from_record)
            .collect()
    }

    /// The stored asset, unmodified.
    pub fn get_raw_asset(&self, path: &str, kind: &str) -> Result<AssetRecord, BakeError> {
        self.store
            .get_asset_by_path_and_type(path, kind)?
            .ok_or_else(|| BakeError::AssetNotFound {
                path: path.to_owned(),
                kind: kind.to_owned(),
            })
    }

    /// Asset content after kind-specific post-processing.
    ///
    /// `css` is wrapped in `<style>`, `js` in `<script>`; other kinds are
    /// returned as stored.
    pub fn get_asset(&self, path: &str, kind: &str) -> Result<String, BakeError> {
        let asset = self.get_raw_asset(path, kind)?;
        Ok(match kind {
            "css" => wrap_style(&asset.content),
            "js" => wrap_script(&asset.content),
            _ => asset.content,
        })
    }

    /// Site metadata stored from `site.yaml`, or an empty object.
    pub fn site_metadata(&self) -> Result<Value, BakeError> {
        match self.get_raw_asset(SITE_FILENAME, SITE_KIND) {
            Ok(asset) => serde_json::from_str(&asset.content).map_err(|source| BakeError::Metadata {
                slug: SITE_FILENAME.to_owned(),
                source,
            }),
            Err(e) if e.is_not_found() => Ok(Value::Object(Map::new())),
            Err(e) => Err(e),
        }
    }

    /// All page slugs in ascending order.
    pub fn slugs(&self) -> Result<Vec<String>, BakeError> {
        Ok(self.store.list_slugs()?)
    }

    /// Template source for `name`, trying `name` and then `name.html`.
    fn find_template(&self, name: &str) -> Result<Option<(String, String)>, BakeError> {
        let fallback = format!("{name}.html");
        for candidate in [name, fallback.as_str()] {
            if let Some(asset) = self.store.get_asset_by_path_and_type(candidate, TEMPLATES)? {
                return Ok(Some((candidate.to_owned(), asset.content)));
            }
            if name.ends_with(".html") {
                break;
            }
        }
        Ok(None)
    }

    /// Read the page list, `latest_pages` and site metadata once, for
    /// rendering many pages with [`render_page_in`](Self::render_page_in).
    pub fn snapshot(&self) -> Result<SiteSnapshot, BakeError> {
        let pages = self
            .store
            .list_pages_ordered_by_date()?
            .into_iter()
            .map(Page::from_record)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SiteSnapshot::new(pages, self.latest_count, self.site_metadata()?))
    }

    /// Render the page with slug `slug`.
    pub fn render_slug(&self, slug: &str) -> Result<String, BakeError> {
        self.render_page(&self.get_page(slug)?)
    }

    /// Render `page` into a complete HTML document.
    ///
    /// Reads a fresh [`SiteSnapshot`]; use [`render_page_in`](Self::render_page_in)
    /// when rendering a whole site.
    pub fn render_page(&self, page: &Page) -> Result<String, BakeError> {
        self.render_page_in(page, &self.snapshot()?)
    }

    /// Render `page` with site-wide inputs taken from `snapshot`.
    ///
    /// The page content is rendered as a template first, so shortcodes in the
    /// body expand; the page template then renders with the expanded content.
    pub fn render_page_in(&self, page: &Page, snapshot: &SiteSnapshot) -> Result<String, BakeError> {
        let (template_name, source) =
            self.find_template(&page.template)?
                .ok_or_else(|| BakeError::TemplateNotFound {
                    slug: page.slug.clone(),
                    template: page.template.clone(),
                })?;

        let render_error = |source| BakeError::Render {
            slug: page.slug.clone(),
            source,
        };

        let mut context = context(page, snapshot)?;
        let body = baked_template::render(&page.slug, &page.content, &context, self, &self.options)
            .map_err(render_error)?;

        let mut page_value = page.to_json();
        page_value["content"] = Value::String(body);
        context.insert("page", page_value);

        let html = Template::parse(&template_name, &source)
            .and_then(|template| template.render(&context, self, &self.options))
            .map_err(render_error)?;

        tracing::debug!(slug = %page.slug, template = %template_name, "Rendered page");
        Ok(html)
    }
}

fn context(page: &Page, snapshot: &SiteSnapshot) -> Result<Context, BakeError> {
    let (older, newer) = snapshot
        .neighbours(&page.slug)
        .ok_or_else(|| BakeError::PageNotFound(page.slug.clone()))?;

    let mut context = Context::new();
    for (key, value) in &page.metadata {
        context.insert(key.clone(), value.clone());
    }
    context.insert("page", page.to_json());
    context.insert("site", snapshot.site().clone());
    context.insert("prev_page", older.map_or(Value::Null, Page::to_json));
    context.insert("next_page", newer.map_or(Value::Null, Page::to_json));
    context.insert("latest_pages", snapshot.latest().clone());
    Ok(context)
}

/// Log lookup failures other than a plain miss.
fn found(result: Result<String, BakeError>) -> Option<String> {
    match result {
        Ok(content) => Some(content),
        Err(e) if e.is_not_found() => None,
        Err(e) => {
            tracing::warn!(error = %e, "Store lookup failed during render");
            None
        }
    }
}

impl TemplateHost for Baker {
    fn load_template(&self, name: &str) -> Option<String> {
        let result = self
            .find_template(name)
            .map(|t| t.map(|(_, source)| source));
        found(result.transpose()?)
    }

    fn raw_asset(&self, path: &str, kind: &str) -> Option<String> {
        found(self.get_raw_asset(path, kind).map(|asset| asset.content))
    }

    fn asset(&self, path: &str, kind: &str) -> Option<String> {
        found(self.get_asset(path, kind))
    }
}
