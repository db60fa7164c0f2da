//! `baked search` command implementation.

use std::path::PathBuf;
use std::sync::Arc;

use baked_config::{Config, RenderConfig};
use baked_site::Baker;
use baked_store::Store;
use clap::Args;

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the search command.
#[derive(Args)]
pub(crate) struct SearchArgs {
    /// Text to look for in page titles and content (case-insensitive).
    term: String,

    /// Database built by `baked build` (default: from config).
    #[arg(short, long, env = "BAKED_DATABASE")]
    database: Option<PathBuf>,

    /// Path to configuration file (default: auto-discover baked.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl SearchArgs {
    /// Print the slug and title of every matching page.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let database = match self.database {
            Some(path) => path,
            None => Config::load(self.config.as_deref(), None)?.build_resolved.database,
        };
        if !database.is_file() {
            return Err(CliError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("database {} not found, run `baked build` first", database.display()),
            )));
        }

        let store = Store::open(&database)?;
        let baker = Baker::with_config(Arc::new(store), &RenderConfig::default());
        let pages = baker.search(&self.term)?;

        if pages.is_empty() {
            output.warning(&format!("No pages match {:?}", self.term));
            return Ok(());
        }
        for page in &pages {
            output.field(&page.slug, &page.title);
        }
        output.success(&format!("{} matching pages", pages.len()));
        Ok(())
    }
}
