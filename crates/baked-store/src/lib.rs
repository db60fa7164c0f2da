//! Relational store for baked.
//!
//! The store is the hand-off point between ingestion and rendering: the
//! content loader writes [`PageRecord`]s and [`AssetRecord`]s, the baker
//! reads them back. It is deliberately not a general database layer, only
//! the handful of keyed lookups the pipeline needs:
//!
//! - pages keyed by slug
//! - assets keyed by `(path, type)`
//! - templates, stored as assets of type [`TEMPLATES`]
//!
//! # Example
//!
//! ```
//! use baked_store::{AssetRecord, Store, TEMPLATES};
//!
//! let store = Store::open_in_memory()?;
//! store.insert_asset(&AssetRecord::new("base.html", TEMPLATES, "<html></html>"))?;
//! let template = store.get_asset_by_path_and_type("base.html", TEMPLATES)?;
//! assert!(template.is_some());
//! # Ok::<(), baked_store::StoreError>(())
//! ```

mod error;
mod record;
mod store;

pub use error::StoreError;
pub use record::{AssetRecord, PageRecord, Record, TEMPLATES};
pub use store::Store;
