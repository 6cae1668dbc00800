//! Run configuration: category table, organize settings and file filters.
//!
//! Configuration is a JSON document (TOML is accepted when the file ends in `.toml`):
//!
//! ```json
//! {
//!   "categories": { "Images": [".jpg", ".png"], "Documents": [".pdf"] },
//!   "settings": {
//!     "organizeByDate": false,
//!     "deleteDuplicates": false,
//!     "autoDeleteDays": 0,
//!     "notificationsEnabled": true
//!   },
//!   "filters": {
//!     "enable_hidden_files": false,
//!     "exclude": { "filenames": ["Thumbs.db"], "patterns": ["*.part"] },
//!     "include": { "patterns": [] }
//!   }
//! }
//! ```
//!
//! Every section is optional. A missing or broken file never aborts a run: the
//! loader reports the problem and the built-in defaults are used instead.

use crate::file_category::CategoryTable;
use crate::output::OutputFormatter;
use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Name of the per-directory configuration file looked up inside the organized root.
pub const CONFIG_FILE_NAME: &str = ".tidyfold.json";

/// Errors that can occur while loading configuration or compiling its filters.
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    ConfigNotFound(PathBuf),
    /// The document could not be parsed.
    ConfigInvalid { path: PathBuf, reason: String },
    /// Invalid glob pattern provided.
    InvalidGlobPattern(String),
    /// Invalid regex pattern provided with the actual error reason.
    InvalidRegexPattern { pattern: String, reason: String },
    /// IO error while reading configuration.
    IoError { path: PathBuf, reason: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ConfigNotFound(path) => {
                write!(f, "Configuration file not found: {}", path.display())
            }
            ConfigError::ConfigInvalid { path, reason } => {
                write!(f, "Invalid configuration in {}: {}", path.display(), reason)
            }
            ConfigError::InvalidGlobPattern(pattern) => {
                write!(f, "Invalid glob pattern '{}'", pattern)
            }
            ConfigError::InvalidRegexPattern { pattern, reason } => {
                write!(f, "Invalid regex pattern '{}': {}", pattern, reason)
            }
            ConfigError::IoError { path, reason } => {
                write!(f, "Could not read {}: {}", path.display(), reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Behaviour switches for an organize run. Immutable once a run starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrganizeSettings {
    /// Nest category folders under `<year>/<month name>` of the file's mtime.
    #[serde(alias = "organizeByDate")]
    pub organize_by_date: bool,
    /// Delete incoming files that are byte-identical to the file already at the target.
    #[serde(alias = "deleteDuplicates")]
    pub delete_duplicates: bool,
    /// Age in days after which files are purged. `0` disables the sweep.
    #[serde(alias = "autoDeleteDays")]
    pub auto_delete_days: u32,
    #[serde(alias = "notificationsEnabled")]
    pub notifications_enabled: bool,
}

impl Default for OrganizeSettings {
    fn default() -> Self {
        Self {
            organize_by_date: false,
            delete_duplicates: false,
            auto_delete_days: 0,
            notifications_enabled: true,
        }
    }
}

/// The full configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub categories: CategoryTable,
    #[serde(default)]
    pub settings: OrganizeSettings,
    #[serde(default)]
    pub filters: FilterRules,
    /// File the configuration was read from, if any.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// Which files are considered at all.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterRules {
    /// Whether to include hidden files (starting with "."). Defaults to false.
    #[serde(default)]
    pub enable_hidden_files: bool,
    #[serde(default)]
    pub exclude: ExcludeRules,
    /// Whitelist that overrides every exclusion.
    #[serde(default)]
    pub include: IncludeRules,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExcludeRules {
    /// Exact filenames, e.g. `"Thumbs.db"`.
    #[serde(default)]
    pub filenames: Vec<String>,
    /// Glob patterns matched against the path relative to the organized root.
    #[serde(default)]
    pub patterns: Vec<String>,
    /// Extensions without the dot, matched case-insensitively.
    #[serde(default)]
    pub extensions: Vec<String>,
    /// Regexes matched against the file name.
    #[serde(default)]
    pub regex: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncludeRules {
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl Config {
    /// Load configuration for `root`.
    ///
    /// Lookup order:
    /// 1. `config_path`, when given
    /// 2. `<root>/.tidyfold.json`
    /// 3. `~/.config/tidyfold/config.json`
    /// 4. built-in defaults
    ///
    /// # Errors
    ///
    /// Returns an error when a file is found (or named explicitly) but cannot be read
    /// or parsed.
    pub fn load(config_path: Option<&Path>, root: &Path) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = root.join(CONFIG_FILE_NAME);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("tidyfold")
                .join("config.json");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        debug!("no configuration file found, using defaults");
        Ok(Self::default())
    }

    /// Like [`Config::load`], but substitutes defaults on any error after reporting it.
    pub fn load_or_default(config_path: Option<&Path>, root: &Path) -> Self {
        match Self::load(config_path, root) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "configuration unusable, falling back to defaults");
                OutputFormatter::warning(&format!("{}. Using built-in defaults.", e));
                Self::default()
            }
        }
    }

    /// Parse a configuration file. `.toml` files go through `toml`, anything else is JSON.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        let parsed = if is_toml {
            toml::from_str::<Config>(&content).map_err(|e| e.to_string())
        } else {
            serde_json::from_str::<Config>(&content).map_err(|e| e.to_string())
        };

        let mut config = parsed.map_err(|reason| ConfigError::ConfigInvalid {
            path: path.to_path_buf(),
            reason,
        })?;
        config.source = Some(path.to_path_buf());
        debug!(path = %path.display(), categories = config.categories.len(), "configuration loaded");
        Ok(config)
    }
}

/// Filter rules with every pattern parsed up front.
#[derive(Debug, Clone)]
pub struct CompiledFilters {
    enable_hidden_files: bool,
    exclude_filenames: HashSet<String>,
    exclude_extensions: HashSet<String>,
    exclude_patterns: Vec<Pattern>,
    exclude_regexes: Vec<Regex>,
    include_patterns: Vec<Pattern>,
}

fn compile_globs(patterns: &[String]) -> Result<Vec<Pattern>, ConfigError> {
    patterns
        .iter()
        .map(|pattern| {
            Pattern::new(pattern).map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
        })
        .collect()
}

impl CompiledFilters {
    /// # Errors
    ///
    /// Returns an error if any glob or regex pattern is invalid.
    pub fn compile(rules: &FilterRules) -> Result<Self, ConfigError> {
        let exclude_regexes = rules
            .exclude
            .regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            enable_hidden_files: rules.enable_hidden_files,
            exclude_filenames: rules.exclude.filenames.iter().cloned().collect(),
            exclude_extensions: rules
                .exclude
                .extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            exclude_patterns: compile_globs(&rules.exclude.patterns)?,
            exclude_regexes,
            include_patterns: compile_globs(&rules.include.patterns)?,
        })
    }

    /// Filters that let every non-hidden file through.
    pub fn permissive() -> Self {
        Self {
            enable_hidden_files: false,
            exclude_filenames: HashSet::new(),
            exclude_extensions: HashSet::new(),
            exclude_patterns: Vec::new(),
            exclude_regexes: Vec::new(),
            include_patterns: Vec::new(),
        }
    }

    /// Whether a file (path relative to the organized root) takes part in organization.
    ///
    /// Include patterns win outright; otherwise hidden files, exact names,
    /// extensions, globs and regexes are checked in that order.
    pub fn should_include(&self, relative_path: &Path) -> bool {
        let file_name = relative_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if self
            .include_patterns
            .iter()
            .any(|pattern| pattern.matches_path(relative_path))
        {
            return true;
        }

        if !self.enable_hidden_files && file_name.starts_with('.') {
            return false;
        }

        if self.exclude_filenames.contains(file_name.as_ref()) {
            return false;
        }

        if let Some(ext) = relative_path.extension()
            && self
                .exclude_extensions
                .contains(&ext.to_string_lossy().to_lowercase())
        {
            return false;
        }

        if self
            .exclude_patterns
            .iter()
            .any(|pattern| pattern.matches_path(relative_path))
        {
            return false;
        }

        !self
            .exclude_regexes
            .iter()
            .any(|regex| regex.is_match(&file_name))
    }
}

impl Default for CompiledFilters {
    fn default() -> Self {
        Self::permissive()
    }
}
