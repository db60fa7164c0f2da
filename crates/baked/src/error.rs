//! CLI error types.

use baked_config::ConfigError;
use baked_loader::LoadError;
use baked_site::BakeError;
use baked_store::StoreError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Load(#[from] LoadError),

    #[error("{0}")]
    Bake(#[from] BakeError),

    #[error("{failed} of {total} pages failed to render")]
    Render { failed: usize, total: usize },
}
