//! The read-only state shared by every component during one run.

use crate::config::{CONFIG_FILE_NAME, CompiledFilters, Config, ConfigError, OrganizeSettings};
use crate::file_category::CategoryTable;
use crate::history::HISTORY_FILE_NAME;
use std::path::{Path, PathBuf};

/// Everything a run needs to know, passed explicitly instead of living in globals.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// The directory being organized.
    pub root: PathBuf,
    pub categories: CategoryTable,
    pub settings: OrganizeSettings,
    pub filters: CompiledFilters,
    /// When set, no component touches the filesystem.
    pub dry_run: bool,
    artifacts: Vec<PathBuf>,
}

impl RunContext {
    /// Builds a context with default categories, settings and filters.
    ///
    /// A relative `root` is resolved against the current directory, so every path
    /// the run records stays valid from anywhere.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = std::path::absolute(&root).unwrap_or(root);
        let artifacts = vec![root.join(HISTORY_FILE_NAME)];
        Self {
            root,
            categories: CategoryTable::default(),
            settings: OrganizeSettings::default(),
            filters: CompiledFilters::default(),
            dry_run: false,
            artifacts,
        }
    }

    /// Builds a context from a loaded configuration.
    ///
    /// # Errors
    ///
    /// Fails when the configured filter patterns do not compile.
    pub fn from_config(root: impl Into<PathBuf>, config: Config) -> Result<Self, ConfigError> {
        let filters = CompiledFilters::compile(&config.filters)?;
        let mut context = Self::new(root);
        context.categories = config.categories;
        context.settings = config.settings;
        context.filters = filters;
        if let Some(source) = config.source {
            context.artifacts.push(source);
        }
        Ok(context)
    }

    pub fn with_settings(mut self, settings: OrganizeSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_categories(mut self, categories: CategoryTable) -> Self {
        self.categories = categories;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Path of the durable history log for this root.
    pub fn history_path(&self) -> PathBuf {
        self.root.join(HISTORY_FILE_NAME)
    }

    /// True for files the engine itself owns (history log, loaded config).
    pub fn is_artifact(&self, path: &Path) -> bool {
        self.artifacts.iter().any(|artifact| artifact == path)
            || path
                .file_name()
                .is_some_and(|name| name == HISTORY_FILE_NAME || name == CONFIG_FILE_NAME)
    }

    /// `path` relative to the root, or unchanged when it lies outside.
    pub fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.root).unwrap_or(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_log_is_an_artifact() {
        let context = RunContext::new("/data/downloads");
        assert!(context.is_artifact(&context.history_path()));
        assert!(!context.is_artifact(Path::new("/data/downloads/photo.jpg")));
    }

    #[test]
    fn test_config_source_is_an_artifact() {
        let config = Config {
            source: Some(PathBuf::from("/data/downloads/rules.json")),
            ..Config::default()
        };
        let context = RunContext::from_config("/data/downloads", config).unwrap();
        assert!(context.is_artifact(Path::new("/data/downloads/rules.json")));
    }

    #[test]
    fn test_relative_root_is_made_absolute() {
        let context = RunContext::new("downloads");
        assert!(context.root.is_absolute());
        assert!(context.root.ends_with("downloads"));
        assert!(context.history_path().is_absolute());
    }

    #[test]
    fn test_relative_path() {
        let context = RunContext::new("/data/downloads");
        assert_eq!(
            context.relative(Path::new("/data/downloads/a/b.txt")),
            Path::new("a/b.txt")
        );
        assert_eq!(context.relative(Path::new("/elsewhere")), Path::new("/elsewhere"));
    }
}
