// Configuration loading and parsing (rescore.toml).

use rescore_core::{AnalyzerConfig, TableFormat};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub source: SourceConfig,
    pub games: GamesConfig,
    pub advancement: AdvancementConfig,
    pub output: OutputConfig,
    pub db_path: String,
}

// ---------------------------------------------------------------------------
// rescore.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire rescore.toml file.
#[derive(Debug, Clone, Deserialize)]
struct RescoreFile {
    source: SourceConfig,
    games: GamesConfig,
    advancement: AdvancementConfig,
    output: OutputConfig,
    database: DatabaseSection,
}

#[derive(Debug, Clone, Deserialize)]
struct DatabaseSection {
    path: String,
}

/// Where raw game events come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    File,
    Api,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub kind: SourceKind,
    #[serde(default)]
    pub events_path: String,
    #[serde(default)]
    pub api_base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct GamesConfig {
    pub list_path: String,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

fn default_max_concurrent() -> usize {
    4
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdvancementConfig {
    #[serde(default)]
    pub format: TableFormat,
    pub single_path: String,
    pub ground_out_path: String,
    pub fly_out_path: String,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub simulate_before_divergence: bool,
}

impl AdvancementConfig {
    pub fn analyzer_config(&self) -> AnalyzerConfig {
        AnalyzerConfig {
            seed: self.seed,
            simulate_before_divergence: self.simulate_before_divergence,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    pub dir: String,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate `config/rescore.toml` relative to `base_dir`.
///
/// Does not copy defaults. Prefer `load_config()`.
pub(crate) fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join(CONFIG_FILE);
    let text = read_file(&path)?;
    let file: RescoreFile = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.clone(),
        source: e,
    })?;

    let config = Config {
        source: file.source,
        games: file.games,
        advancement: file.advancement,
        output: file.output,
        db_path: file.database.path,
    };

    validate(&config)?;

    Ok(config)
}

/// Name of the one config file, under both `defaults/` and `config/`.
pub const CONFIG_FILE: &str = "rescore.toml";

/// Seed `config/rescore.toml` from `defaults/` when it does not exist yet.
///
/// Returns the path written, or `None` when the user's copy was already in
/// place. An existing file is never overwritten.
pub fn ensure_config_file(base_dir: &Path) -> Result<Option<PathBuf>, ConfigError> {
    let target = base_dir.join("config").join(CONFIG_FILE);
    if target.is_file() {
        return Ok(None);
    }

    let default = base_dir.join("defaults").join(CONFIG_FILE);
    if !default.is_file() {
        return Err(ConfigError::DefaultsCopyError {
            message: format!(
                "no {CONFIG_FILE} under config/ or defaults/ in {}; \
                 run from the project root or restore defaults/{CONFIG_FILE}",
                base_dir.display()
            ),
        });
    }

    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to create {}: {e}", parent.display()),
        })?;
    }

    if copy_new(&default, &target)? {
        tracing::info!("seeded {} from {}", target.display(), default.display());
        Ok(Some(target))
    } else {
        Ok(None)
    }
}

/// Copy `src` to `target` unless `target` already exists. Returns whether
/// anything was written.
fn copy_new(src: &Path, target: &Path) -> Result<bool, ConfigError> {
    use std::io::Write;

    let content = std::fs::read(src).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read {}: {e}", src.display()),
    })?;
    let mut dest = match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(target)
    {
        Ok(dest) => dest,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => {
            return Err(ConfigError::DefaultsCopyError {
                message: format!("failed to create {}: {e}", target.display()),
            })
        }
    };
    dest.write_all(&content)
        .map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to write {}: {e}", target.display()),
        })?;
    Ok(true)
}

/// Load config relative to the current working directory, seeding it from
/// defaults first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_file(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn require_non_empty(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: field.into(),
            message: "must not be empty".into(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    match config.source.kind {
        SourceKind::File => require_non_empty("source.events_path", &config.source.events_path)?,
        SourceKind::Api => {
            let url = &config.source.api_base_url;
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::ValidationError {
                    field: "source.api_base_url".into(),
                    message: format!("must be an http(s) URL, got {url:?}"),
                });
            }
            if config.source.request_timeout_secs == 0 {
                return Err(ConfigError::ValidationError {
                    field: "source.request_timeout_secs".into(),
                    message: "must be > 0".into(),
                });
            }
        }
    }

    require_non_empty("games.list_path", &config.games.list_path)?;
    if config.games.max_concurrent == 0 {
        return Err(ConfigError::ValidationError {
            field: "games.max_concurrent".into(),
            message: "must be > 0".into(),
        });
    }

    let adv = &config.advancement;
    let table_fields: &[(&str, &str)] = &[
        ("advancement.single_path", &adv.single_path),
        ("advancement.ground_out_path", &adv.ground_out_path),
        ("advancement.fly_out_path", &adv.fly_out_path),
    ];
    for (name, value) in table_fields {
        require_non_empty(name, value)?;
    }

    require_non_empty("output.dir", &config.output.dir)?;
    require_non_empty("database.path", &config.db_path)?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    /// The crate root holding `defaults/`, from either the crate or the
    /// workspace root.
    fn project_root() -> PathBuf {
        let cwd = std::env::current_dir().unwrap();
        if cwd.join("defaults").exists() {
            cwd
        } else if cwd.join("crates/rescore-app/defaults").exists() {
            cwd.join("crates/rescore-app")
        } else {
            panic!("Cannot locate defaults/ directory from CWD {:?}", cwd);
        }
    }

    /// Fresh temp dir with `config/rescore.toml` built from the defaults
    /// after applying `edit`.
    fn config_with(name: &str, edit: impl Fn(String) -> String) -> PathBuf {
        let tmp = std::env::temp_dir().join(name);
        let config_dir = tmp.join("config");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&config_dir).unwrap();

        let text = fs::read_to_string(project_root().join("defaults/rescore.toml")).unwrap();
        fs::write(config_dir.join("rescore.toml"), edit(text)).unwrap();
        tmp
    }

    fn expect_validation_field(err: ConfigError, expected: &str) {
        match &err {
            ConfigError::ValidationError { field, .. } => assert_eq!(field, expected),
            other => panic!("expected ValidationError, got: {other}"),
        }
    }

    #[test]
    fn load_valid_config_from_defaults() {
        let tmp = config_with("rescore_config_test_defaults", |text| text);
        let config = load_config_from(&tmp).expect("should load valid config");

        assert_eq!(config.source.kind, SourceKind::File);
        assert_eq!(config.source.events_path, "data/events.json");
        assert_eq!(
            config.source.api_base_url,
            "http://api.blaseball-reference.com/v1/"
        );
        assert_eq!(config.source.request_timeout_secs, 30);
        assert_eq!(config.games.list_path, "data/games.txt");
        assert_eq!(config.games.max_concurrent, 4);
        assert_eq!(config.advancement.format, TableFormat::Csv);
        assert_eq!(config.advancement.single_path, "data/advancement/single.csv");
        assert_eq!(config.advancement.analyzer_config(), AnalyzerConfig::default());
        assert_eq!(config.output.dir, "output");
        assert_eq!(config.db_path, "rescore.db");

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn api_source_with_tsv_tables() {
        let tmp = config_with("rescore_config_test_api", |text| {
            text.replace("kind = \"file\"", "kind = \"api\"")
                .replace("format = \"csv\"", "format = \"tsv\"")
                .replace("seed = 0", "seed = 42")
        });
        let config = load_config_from(&tmp).expect("should load api config");
        assert_eq!(config.source.kind, SourceKind::Api);
        assert_eq!(config.advancement.format, TableFormat::Tsv);
        assert_eq!(config.advancement.analyzer_config().seed, 42);

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_non_http_api_url() {
        let tmp = config_with("rescore_config_test_bad_url", |text| {
            text.replace("kind = \"file\"", "kind = \"api\"").replace(
                "http://api.blaseball-reference.com/v1/",
                "ftp://example.com/",
            )
        });
        expect_validation_field(load_config_from(&tmp).unwrap_err(), "source.api_base_url");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_empty_events_path_for_file_source() {
        let tmp = config_with("rescore_config_test_no_events", |text| {
            text.replace("events_path = \"data/events.json\"", "events_path = \"\"")
        });
        expect_validation_field(load_config_from(&tmp).unwrap_err(), "source.events_path");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_zero_concurrency() {
        let tmp = config_with("rescore_config_test_zero_concurrency", |text| {
            text.replace("max_concurrent = 4", "max_concurrent = 0")
        });
        expect_validation_field(load_config_from(&tmp).unwrap_err(), "games.max_concurrent");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_empty_table_path() {
        let tmp = config_with("rescore_config_test_empty_table", |text| {
            text.replace(
                "fly_out_path = \"data/advancement/fly_out.csv\"",
                "fly_out_path = \" \"",
            )
        });
        expect_validation_field(
            load_config_from(&tmp).unwrap_err(),
            "advancement.fly_out_path",
        );
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn parse_error_for_unknown_source_kind() {
        let tmp = config_with("rescore_config_test_bad_kind", |text| {
            text.replace("kind = \"file\"", "kind = \"carrier-pigeon\"")
        });
        match &load_config_from(&tmp).unwrap_err() {
            ConfigError::ParseError { path, .. } => assert!(path.ends_with("rescore.toml")),
            other => panic!("expected ParseError, got: {other}"),
        }
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_config_file() {
        let tmp = std::env::temp_dir().join("rescore_config_test_missing");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();

        match &load_config_from(&tmp).unwrap_err() {
            ConfigError::FileNotFound { path } => assert!(path.ends_with("rescore.toml")),
            other => panic!("expected FileNotFound, got: {other}"),
        }
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_file_seeds_once_and_keeps_user_edits() {
        let tmp = std::env::temp_dir().join("rescore_config_test_ensure_seeds");
        let _ = fs::remove_dir_all(&tmp);
        let defaults_dir = tmp.join("defaults");
        fs::create_dir_all(&defaults_dir).unwrap();

        fs::copy(
            project_root().join("defaults/rescore.toml"),
            defaults_dir.join(CONFIG_FILE),
        )
        .unwrap();
        fs::write(defaults_dir.join("games.txt"), "comeback\n").unwrap();

        let seeded = ensure_config_file(&tmp).expect("should succeed");
        assert_eq!(seeded, Some(tmp.join("config/rescore.toml")));
        assert!(!tmp.join("config/games.txt").exists());
        assert!(load_config_from(&tmp).is_ok());

        // Second run leaves the user's copy alone.
        fs::write(tmp.join("config/rescore.toml"), "# custom\n").unwrap();
        assert_eq!(ensure_config_file(&tmp).expect("should succeed"), None);
        let content = fs::read_to_string(tmp.join("config/rescore.toml")).unwrap();
        assert_eq!(content, "# custom\n");

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_file_accepts_config_without_defaults() {
        let tmp = std::env::temp_dir().join("rescore_config_test_no_defaults");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();
        fs::write(tmp.join("config/rescore.toml"), "# hand written\n").unwrap();

        assert_eq!(ensure_config_file(&tmp).expect("should succeed"), None);

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_file_errors_when_both_copies_missing() {
        let tmp = std::env::temp_dir().join("rescore_config_test_both_missing");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&tmp).unwrap();

        match &ensure_config_file(&tmp).unwrap_err() {
            ConfigError::DefaultsCopyError { message } => {
                assert!(message.contains("no rescore.toml under config/ or defaults/"));
            }
            other => panic!("expected DefaultsCopyError, got: {other}"),
        }
        let _ = fs::remove_dir_all(&tmp);
    }
}
