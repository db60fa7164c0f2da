//! `baked build` command implementation.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use baked_config::{CliSettings, Config};
use baked_loader::{IngestOptions, MarkdownOptions, ROOT_SLUG, ingest};
use baked_site::{Baker, Page, SiteSnapshot};
use baked_store::Store;
use clap::Args;
use rayon::prelude::*;

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the build command.
#[derive(Args)]
pub(crate) struct BuildArgs {
    /// Content root holding site.yaml, pages/ and assets/ (overrides config).
    #[arg(short, long)]
    source: Option<PathBuf>,

    /// Output directory for the rendered site (overrides config).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Include pages marked `isDraft: true`.
    #[arg(long)]
    drafts: bool,

    /// Path to configuration file (default: auto-discover baked.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,
}

impl BuildArgs {
    /// Ingest the content tree into a fresh store and render every page.
    ///
    /// Pages that fail to render are reported individually; the rest of the
    /// batch still completes.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            content_dir: self.source,
            output_dir: self.output,
            drafts: self.drafts.then_some(true),
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        let build = &config.build_resolved;

        output.field("Source:", &build.content_dir.display().to_string());
        output.field("Output:", &build.output_dir.display().to_string());

        fs::create_dir_all(&build.output_dir)?;
        let store = Store::create(&build.database)?;

        let options = IngestOptions {
            include_drafts: build.drafts,
            output_dir: build.output_dir.clone(),
            image_prefix: config.render.image_prefix.clone(),
            markdown: MarkdownOptions::default(),
        };
        let report = ingest(&build.content_dir, &store, &options)?;
        output.info(&format!(
            "Ingested {} pages and {} assets",
            report.pages, report.assets
        ));
        if report.drafts_skipped > 0 {
            output.warning(&format!(
                "Skipped {} draft pages (use --drafts to include them)",
                report.drafts_skipped
            ));
        }

        let baker = Baker::with_config(Arc::new(store), &config.render);
        let snapshot = baker.snapshot()?;
        let pages = snapshot.pages();

        let failures: Vec<(String, CliError)> = pages
            .par_iter()
            .filter_map(|page| {
                write_page(&baker, page, &snapshot, &build.output_dir)
                    .err()
                    .map(|err| (page.slug.clone(), err))
            })
            .collect();

        for (slug, err) in &failures {
            output.error(&format!("{slug}: {err}"));
        }
        if !failures.is_empty() {
            return Err(CliError::Render {
                failed: failures.len(),
                total: pages.len(),
            });
        }

        output.success(&format!(
            "Built {} pages to {}",
            pages.len(),
            build.output_dir.display()
        ));
        Ok(())
    }
}

fn write_page(
    baker: &Baker,
    page: &Page,
    snapshot: &SiteSnapshot,
    output_dir: &Path,
) -> Result<(), CliError> {
    let html = baker.render_page_in(page, snapshot)?;
    let slug = page.slug.as_str();
    let path = page_path(output_dir, slug);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, html)?;
    tracing::debug!(slug, path = %path.display(), "Wrote page");
    Ok(())
}

/// Output file for a slug: `<output>/<slug>/index.html`, or
/// `<output>/index.html` for the root page.
fn page_path(output_dir: &Path, slug: &str) -> PathBuf {
    if slug == ROOT_SLUG {
        output_dir.join("index.html")
    } else {
        slug.split('/')
            .fold(output_dir.to_path_buf(), |path, part| path.join(part))
            .join("index.html")
    }
}
