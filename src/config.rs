//! Runtime configuration resolved from CLI arguments and the environment
//!
//! File locations default to the platform data directory
//! (`~/.local/share/cafescout/` on Linux); endpoints are fixed.

use directories::ProjectDirs;
use std::path::PathBuf;

use crate::cli::Cli;
use crate::data::cities::{DEFAULT_INDEX_URL, DEFAULT_SITE_ORIGIN};
use crate::data::search::{DEFAULT_SEARCH_TERM, DEFAULT_SEARCH_URL};

/// Default file name of the request cache
pub const CACHE_FILE_NAME: &str = "cache.json";

/// Default file name of the SQLite database
pub const DATABASE_FILE_NAME: &str = "cafescout.sqlite";

/// Default directory name for chart output
pub const CHARTS_DIR_NAME: &str = "charts";

/// Everything the session needs to run
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// JSON request cache
    pub cache_file: PathBuf,
    /// SQLite database for cities and businesses
    pub database: PathBuf,
    /// Directory for chart files
    pub output_dir: PathBuf,
    /// Bearer token for the business-search API
    pub api_key: Option<String>,
    /// Token embedded in map charts
    pub mapbox_token: Option<String>,
    /// Business-search endpoint
    pub search_url: String,
    /// Search term for business lookups
    pub search_term: String,
    /// Index page of the state directory
    pub directory_url: String,
    /// Origin for relative links in the directory
    pub directory_origin: String,
    /// State preselected with --state
    pub initial_state: Option<String>,
    /// City preselected with --city
    pub initial_city: Option<String>,
}

impl AppConfig {
    /// Builds the configuration rooted at `data_dir`
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            cache_file: data_dir.join(CACHE_FILE_NAME),
            database: data_dir.join(DATABASE_FILE_NAME),
            output_dir: data_dir.join(CHARTS_DIR_NAME),
            api_key: None,
            mapbox_token: None,
            search_url: DEFAULT_SEARCH_URL.to_string(),
            search_term: DEFAULT_SEARCH_TERM.to_string(),
            directory_url: DEFAULT_INDEX_URL.to_string(),
            directory_origin: DEFAULT_SITE_ORIGIN.to_string(),
            initial_state: None,
            initial_city: None,
        }
    }

    /// Resolves the configuration from parsed CLI arguments
    ///
    /// Paths not given on the command line fall back to the platform data
    /// directory, or to the current directory when none can be determined.
    pub fn from_cli(cli: &Cli) -> Self {
        let data_dir = default_data_dir().unwrap_or_else(|| PathBuf::from("."));
        let defaults = Self::with_data_dir(data_dir);

        Self {
            cache_file: cli.cache_file.clone().unwrap_or(defaults.cache_file),
            database: cli.database.clone().unwrap_or(defaults.database),
            output_dir: cli.output_dir.clone().unwrap_or(defaults.output_dir),
            api_key: cli.api_key.clone().filter(|k| !k.trim().is_empty()),
            mapbox_token: cli.mapbox_token.clone().filter(|k| !k.trim().is_empty()),
            initial_state: cli.state.clone(),
            initial_city: cli.city.clone(),
            ..defaults
        }
    }
}

/// Platform data directory for cafescout, if a home directory exists
pub fn default_data_dir() -> Option<PathBuf> {
    let project_dirs = ProjectDirs::from("", "", "cafescout")?;
    Some(project_dirs.data_dir().to_path_buf())
}
