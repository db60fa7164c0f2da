//! Configuration management for baked.
//!
//! Two sources of configuration:
//!
//! - `baked.toml`: build settings (where the content tree lives, where output
//!   goes, render knobs). Optional and auto-discovered in the current
//!   directory and its parents. CLI flags override it via [`CliSettings`].
//! - `site.yaml`: global site metadata at the content root, see
//!   [`SiteMetadata`].
//!
//! ## Variable Expansion
//!
//! String values in `baked.toml` support `${VAR}` and `${VAR:-default}`.
//! Path values also expand a leading `~`.

mod expand;
mod site;

use serde::Deserialize;
use std::path::{Path, PathBuf};

pub use site::{SITE_FILENAME, SITE_KIND, SiteMetadata};

/// CLI settings that override configuration file values.
///
/// Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override content root.
    pub content_dir: Option<PathBuf>,
    /// Override output directory.
    pub output_dir: Option<PathBuf>,
    /// Override draft inclusion.
    pub drafts: Option<bool>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "baked.toml";

/// Database filename inside the output directory.
const DEFAULT_DATABASE: &str = "site.db";

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Build section as written in TOML (paths unresolved).
    build: BuildConfigRaw,
    /// Render configuration.
    pub render: RenderConfig,

    /// Resolved build configuration (set after loading).
    #[serde(skip)]
    pub build_resolved: BuildConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Raw build configuration as parsed from TOML (paths as strings).
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct BuildConfigRaw {
    content_dir: Option<String>,
    output_dir: Option<String>,
    database: Option<String>,
    drafts: Option<bool>,
}

/// Resolved build configuration with absolute paths.
#[derive(Debug, Default, Clone)]
pub struct BuildConfig {
    /// Content root holding `site.yaml`, `pages/` and `assets/`.
    pub content_dir: PathBuf,
    /// Output directory for rendered HTML and copied images.
    pub output_dir: PathBuf,
    /// `SQLite` database file.
    pub database: PathBuf,
    /// Whether draft pages are ingested.
    pub drafts: bool,
}

/// Render configuration.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RenderConfig {
    /// Number of pages exposed to templates as `latest_pages`.
    pub latest_pages: usize,
    /// URL prefix images are served under.
    pub image_prefix: String,
    /// Escape interpolated values unless filtered with `safe`.
    pub autoescape: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            latest_pages: 10,
            image_prefix: "/images".to_owned(),
            autoescape: true,
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Malformed YAML configuration (`site.yaml`, `meta.yaml`).
    #[error("Malformed {file}: {message}")]
    Malformed {
        /// File that failed to parse.
        file: String,
        /// Parser message.
        message: String,
    },
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`build.content_dir`").
        field: String,
        /// Error message (e.g., "${`SITE_ROOT`} not set").
        message: String,
    },
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `baked.toml` in current directory and parents,
    /// falling back to defaults relative to the current directory.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist or parsing fails.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    ///
    /// Overriding the output directory moves the database along with it
    /// unless the database path was set explicitly in the file.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(content_dir) = &settings.content_dir {
            self.build_resolved.content_dir.clone_from(content_dir);
        }
        if let Some(output_dir) = &settings.output_dir {
            self.build_resolved.output_dir.clone_from(output_dir);
            if self.build.database.is_none() {
                self.build_resolved.database = output_dir.join(DEFAULT_DATABASE);
            }
        }
        if let Some(drafts) = settings.drafts {
            self.build_resolved.drafts = drafts;
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    fn default_with_base(base: &Path) -> Self {
        let output_dir = base.join("dist");
        Self {
            build: BuildConfigRaw::default(),
            render: RenderConfig::default(),
            build_resolved: BuildConfig {
                content_dir: base.to_path_buf(),
                database: output_dir.join(DEFAULT_DATABASE),
                output_dir,
                drafts: false,
            },
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        config.expand_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.render.latest_pages == 0 {
            return Err(ConfigError::Validation(
                "render.latest_pages must be greater than 0".to_owned(),
            ));
        }
        if !self.render.image_prefix.starts_with('/') {
            return Err(ConfigError::Validation(
                "render.image_prefix must start with /".to_owned(),
            ));
        }
        Ok(())
    }

    /// Expand variable references in build paths and render strings.
    fn expand_vars(&mut self) -> Result<(), ConfigError> {
        let build = &mut self.build;
        for (value, field) in [
            (&mut build.content_dir, "build.content_dir"),
            (&mut build.output_dir, "build.output_dir"),
            (&mut build.database, "build.database"),
        ] {
            if let Some(raw) = value.as_deref() {
                *value = Some(expand::expand_path(raw, field)?);
            }
        }
        self.render.image_prefix =
            expand::expand_vars(&self.render.image_prefix, "render.image_prefix")?;
        Ok(())
    }

    /// Resolve relative paths against the config file's directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let resolve = |path: Option<&str>, default: &Path| {
            path.map_or_else(|| default.to_path_buf(), |p| config_dir.join(p))
        };

        let content_dir = resolve(self.build.content_dir.as_deref(), config_dir);
        let output_dir = resolve(self.build.output_dir.as_deref(), &config_dir.join("dist"));
        let database = resolve(
            self.build.database.as_deref(),
            &output_dir.join(DEFAULT_DATABASE),
        );

        self.build_resolved = BuildConfig {
            content_dir,
            output_dir,
            database,
            drafts: self.build.drafts.unwrap_or(false),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = Config::default_with_base(Path::new("/site"));
        assert_eq!(config.build_resolved.content_dir, PathBuf::from("/site"));
        assert_eq!(config.build_resolved.output_dir, PathBuf::from("/site/dist"));
        assert_eq!(
            config.build_resolved.database,
            PathBuf::from("/site/dist/site.db")
        );
        assert!(!config.build_resolved.drafts);
        assert_eq!(config.render.latest_pages, 10);
        assert_eq!(config.render.image_prefix, "/images");
        assert!(config.render.autoescape);
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.render.latest_pages, 10);
        assert!(config.render.autoescape);
    }

    #[test]
    fn test_parse_render_config() {
        let toml = r#"
[render]
latest_pages = 3
image_prefix = "/static/img"
autoescape = false
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.render.latest_pages, 3);
        assert_eq!(config.render.image_prefix, "/static/img");
        assert!(!config.render.autoescape);
    }

    #[test]
    fn test_resolve_paths() {
        let toml = r#"
[build]
content_dir = "content"
output_dir = "public"
drafts = true
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_paths(Path::new("/project"));
        assert_eq!(
            config.build_resolved.content_dir,
            PathBuf::from("/project/content")
        );
        assert_eq!(
            config.build_resolved.output_dir,
            PathBuf::from("/project/public")
        );
        assert_eq!(
            config.build_resolved.database,
            PathBuf::from("/project/public/site.db")
        );
        assert!(config.build_resolved.drafts);
    }

    #[test]
    fn test_explicit_database_path() {
        let toml = r#"
[build]
database = "cache/site.sqlite"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_paths(Path::new("/project"));
        assert_eq!(
            config.build_resolved.database,
            PathBuf::from("/project/cache/site.sqlite")
        );
    }

    #[test]
    fn test_cli_settings_override() {
        let mut config = Config::default_with_base(Path::new("/site"));
        config.apply_cli_settings(&CliSettings {
            content_dir: Some(PathBuf::from("/elsewhere")),
            output_dir: Some(PathBuf::from("/out")),
            drafts: Some(true),
        });
        assert_eq!(config.build_resolved.content_dir, PathBuf::from("/elsewhere"));
        assert_eq!(config.build_resolved.output_dir, PathBuf::from("/out"));
        assert_eq!(config.build_resolved.database, PathBuf::from("/out/site.db"));
        assert!(config.build_resolved.drafts);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("baked.toml");
        std::fs::write(&path, "[build]\ncontent_dir = \"site\"\n").unwrap();

        let config = Config::load(Some(&path), None).unwrap();
        assert_eq!(config.build_resolved.content_dir, dir.path().join("site"));
        assert_eq!(config.config_path, Some(path));
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let err = Config::load(Some(Path::new("/nonexistent/baked.toml")), None).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_validate_rejects_zero_latest_pages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("baked.toml");
        std::fs::write(&path, "[render]\nlatest_pages = 0\n").unwrap();

        let err = Config::load(Some(&path), None).unwrap_err();
        assert!(err.to_string().contains("latest_pages"));
    }

    #[test]
    fn test_validate_rejects_relative_image_prefix() {
        let mut config = Config::default_with_base(Path::new("/site"));
        config.render.image_prefix = "images".to_owned();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));
    }
}
