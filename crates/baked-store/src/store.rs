//! `SQLite`-backed store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::error::StoreError;
use crate::record::{AssetRecord, PageRecord, Record};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS pages (
    slug TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    content TEXT NOT NULL,
    template TEXT NOT NULL,
    metadata TEXT NOT NULL,
    published_date TEXT
);
CREATE TABLE IF NOT EXISTS assets (
    path TEXT NOT NULL,
    type TEXT NOT NULL,
    content TEXT NOT NULL,
    PRIMARY KEY (path, type)
);
";

/// SQL function folding case with Unicode rules. The built-in `lower()`
/// only folds ASCII.
const FOLD_FN: &str = "fold_case";

const PAGE_COLUMNS: &str = "slug, title, content, template, metadata, published_date";

/// Undated pages sort after dated ones; slug breaks ties.
const DATE_ORDER: &str = "ORDER BY published_date IS NULL, published_date DESC, slug ASC";

/// Page and asset store.
///
/// Three keyed mappings: pages by slug, assets by `(path, type)`, and
/// templates as assets of type [`TEMPLATES`](crate::TEMPLATES). The
/// connection sits behind a mutex so a single store can be shared by
/// threads rendering pages in parallel.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) a database file and ensure the schema exists.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::init(Connection::open(path)?)
    }

    /// Create a fresh database file, discarding any previous one.
    ///
    /// Ingestion is append-only per run, so builds start from an empty store.
    pub fn create(path: &Path) -> Result<Self, StoreError> {
        match std::fs::remove_file(path) {
            Ok(()) => tracing::debug!(path = %path.display(), "removed previous database"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        conn.create_scalar_function(
            FOLD_FN,
            1,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |ctx| Ok(ctx.get::<Option<String>>(0)?.map(|text| text.to_lowercase())),
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a page. Fails with [`StoreError::Duplicate`] if the slug exists.
    pub fn insert_page(&self, page: &PageRecord) -> Result<(), StoreError> {
        insert_page(&self.lock(), page)
    }

    /// Insert an asset. Fails with [`StoreError::Duplicate`] if `(path, type)` exists.
    pub fn insert_asset(&self, asset: &AssetRecord) -> Result<(), StoreError> {
        insert_asset(&self.lock(), asset)
    }

    /// Insert a batch of records in one transaction.
    ///
    /// Either every record is committed or, on the first failure, none are.
    pub fn insert_all(&self, records: &[Record]) -> Result<(), StoreError> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        for record in records {
            match record {
                Record::Page(page) => insert_page(&tx, page)?,
                Record::Asset(asset) => insert_asset(&tx, asset)?,
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Look up a page by slug.
    pub fn get_page_by_slug(&self, slug: &str) -> Result<Option<PageRecord>, StoreError> {
        let conn = self.lock();
        let sql = format!("SELECT {PAGE_COLUMNS} FROM pages WHERE slug = ?1");
        Ok(conn.query_row(&sql, [slug], page_from_row).optional()?)
    }

    /// All pages, newest first.
    ///
    /// Pages without a `published_date` come last, ordered by slug.
    pub fn list_pages_ordered_by_date(&self) -> Result<Vec<PageRecord>, StoreError> {
        self.query_pages(&format!("SELECT {PAGE_COLUMNS} FROM pages {DATE_ORDER}"), [])
    }

    /// The `limit` newest pages, in the same order as [`list_pages_ordered_by_date`](Self::list_pages_ordered_by_date).
    pub fn list_latest_pages(&self, limit: usize) -> Result<Vec<PageRecord>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.query_pages(
            &format!("SELECT {PAGE_COLUMNS} FROM pages {DATE_ORDER} LIMIT ?1"),
            [limit],
        )
    }

    /// Case-insensitive substring search over title and content.
    ///
    /// Matches are returned in date order; there is no ranking.
    pub fn search_pages_by_text(&self, term: &str) -> Result<Vec<PageRecord>, StoreError> {
        self.query_pages(
            &format!(
                "SELECT {PAGE_COLUMNS} FROM pages \
                 WHERE instr({FOLD_FN}(title), {FOLD_FN}(?1)) > 0 \
                    OR instr({FOLD_FN}(content), {FOLD_FN}(?1)) > 0 \
                 {DATE_ORDER}"
            ),
            [term],
        )
    }

    /// Look up an asset by path and type.
    pub fn get_asset_by_path_and_type(
        &self,
        path: &str,
        kind: &str,
    ) -> Result<Option<AssetRecord>, StoreError> {
        let conn = self.lock();
        Ok(conn
            .query_row(
                "SELECT path, type, content FROM assets WHERE path = ?1 AND type = ?2",
                [path, kind],
                |row| {
                    Ok(AssetRecord {
                        path: row.get(0)?,
                        kind: row.get(1)?,
                        content: row.get(2)?,
                    })
                },
            )
            .optional()?)
    }

    /// All page slugs in ascending order.
    pub fn list_slugs(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT slug FROM pages ORDER BY slug")?;
        let slugs = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(slugs)
    }

    /// Number of stored pages.
    pub fn count_pages(&self) -> Result<usize, StoreError> {
        let conn = self.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    fn query_pages<P: rusqlite::Params>(
        &self,
        sql: &str,
        params: P,
    ) -> Result<Vec<PageRecord>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(sql)?;
        let pages = stmt
            .query_map(params, page_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pages)
    }
}

fn insert_page(conn: &Connection, page: &PageRecord) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO pages (slug, title, content, template, metadata, published_date) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            page.slug,
            page.title,
            page.content,
            page.template,
            page.metadata,
            page.published_date,
        ],
    )
    .map_err(|e| StoreError::from_insert(e, "pages", page.slug.clone()))?;
    Ok(())
}

fn insert_asset(conn: &Connection, asset: &AssetRecord) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO assets (path, type, content) VALUES (?1, ?2, ?3)",
        params![asset.path, asset.kind, asset.content],
    )
    .map_err(|e| StoreError::from_insert(e, "assets", format!("{}:{}", asset.kind, asset.path)))?;
    Ok(())
}

fn page_from_row(row: &Row<'_>) -> rusqlite::Result<PageRecord> {
    Ok(PageRecord {
        slug: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        template: row.get(3)?,
        metadata: row.get(4)?,
        published_date: row.get(5)?,
    })
}
