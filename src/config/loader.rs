//! Configuration loading and merging logic.

use std::path::{Path, PathBuf};

use super::{Config, Settings, ARCHIVES_SUBDIR};

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
    /// Use CWD for relative paths instead of config file directory.
    pub use_cwd: bool,
    /// Data directory or database file (--target flag).
    pub target: Option<PathBuf>,
}

/// Look for a config file next to the database.
fn find_config_next_to_db(data_dir: &Path) -> Option<PathBuf> {
    let extensions = ["toml", "yaml", "yml", "json"];
    let basenames = ["lotwatch", "config"];

    for basename in basenames {
        for ext in extensions {
            let path = data_dir.join(format!("{}.{}", basename, ext));
            if path.exists() {
                return Some(path);
            }
        }
    }
    None
}

fn is_db_file(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext == "db" || ext == "sqlite" || ext == "sqlite3")
        || path.is_file()
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    }
}

/// Split a `--target` into (data dir, database filename).
fn resolve_target(path: &Path) -> (PathBuf, Option<String>) {
    let path = absolute(path);
    if is_db_file(&path) {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string);
        let dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();
        (dir, filename)
    } else {
        (path, None)
    }
}

async fn load_file_config(options: &LoadOptions, data_dir_override: Option<&PathBuf>) -> Config {
    // Priority 1: Explicit --config flag
    if let Some(ref config_path) = options.config_path {
        return match Config::load_from_path(config_path).await {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{}: {}", config_path.display(), e);
                Config::default()
            }
        };
    }

    // Priority 2: Config next to data dir
    if let Some(data_dir) = data_dir_override {
        if let Some(config_path) = find_config_next_to_db(data_dir) {
            tracing::debug!("Found config next to data dir: {}", config_path.display());
            if let Ok(config) = Config::load_from_path(&config_path).await {
                return config;
            }
        }
    }

    // Priority 3: Auto-discover via prefer
    Config::load().await
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

/// Apply environment overrides, which beat every file setting.
fn apply_env_overrides(settings: &mut Settings) {
    if let Some(database_url) = env_var("DATABASE_URL") {
        if database_url.starts_with("sqlite:") {
            tracing::debug!("Using DATABASE_URL from environment");
            settings.database_url = Some(database_url);
        } else {
            tracing::warn!("Ignoring non-SQLite DATABASE_URL");
        }
    }
    if let Some(base_url) = env_var("LOTWATCH_BASE_URL") {
        tracing::debug!("Using LOTWATCH_BASE_URL from environment: {}", base_url);
        settings.base_url = base_url;
    }
    if let Some(token) = env_var("OBJECT_STORAGE_TOKEN") {
        settings.archive.token = Some(token);
    }
}

/// Load settings with explicit options.
/// Returns (Settings, Config) tuple.
pub async fn load_settings_with_options(options: LoadOptions) -> (Settings, Config) {
    let target = options.target.as_deref().map(resolve_target);
    let data_dir_override = target.as_ref().map(|(dir, _)| dir.clone());

    let config = load_file_config(&options, data_dir_override.as_ref()).await;

    let mut settings = Settings::default();

    let base_dir = if options.use_cwd {
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    } else {
        config
            .base_dir()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    };

    config.apply_to_settings(&mut settings, &base_dir);

    // --target takes precedence over the file for data_dir and database
    if let Some((data_dir, filename)) = target {
        if config.archive.local_root.is_none() {
            settings.archive.local_root = data_dir.join(ARCHIVES_SUBDIR);
        }
        settings.data_dir = data_dir;
        if let Some(filename) = filename {
            settings.database_filename = filename;
        }
    }

    apply_env_overrides(&mut settings);

    (settings, config)
}
