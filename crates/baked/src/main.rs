//! baked CLI - static site baker.
//!
//! Provides commands for:
//! - `build`: Ingest a content tree and render every page to HTML
//! - `search`: Search pages in a built site database

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{BuildArgs, SearchArgs};
use output::Output;

/// baked - bake a content tree into a static site.
#[derive(Parser)]
#[command(name = "baked", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest content and render the site.
    Build(BuildArgs),
    /// Search page titles and content.
    Search(SearchArgs),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let verbose = matches!(&cli.command, Commands::Build(args) if args.verbose);
    let filter = if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Build(args) => args.execute(),
        Commands::Search(args) => args.execute(),
    };

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_build_flags() {
        let cli = Cli::try_parse_from(["baked", "build", "--source", "site", "--drafts", "-v"]).unwrap();
        assert!(matches!(cli.command, Commands::Build(ref args) if args.verbose));
    }

    #[test]
    fn test_search_requires_term() {
        assert!(Cli::try_parse_from(["baked", "search"]).is_err());
        assert!(Cli::try_parse_from(["baked", "search", "rust", "--database", "dist/site.db"]).is_ok());
    }
}
