//! Static configuration.
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! `tracker.toml` in the working directory, then `TRACKER_*` environment
//! variables (`__` separates nested keys, e.g. `TRACKER_FETCH__TIMEOUT_SECS`).

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Result, TrackerError};

const CONFIG_FILE: &str = "tracker";
const ENV_PREFIX: &str = "TRACKER";

/// Reddit caps search listings at 100 children per request.
const MAX_FETCH_LIMIT: u32 = 100;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub subreddit: String,
    /// Search query sent to the endpoint.
    pub query: String,
    /// Title keywords identifying the show; used by the trailer check.
    pub keywords: Vec<String>,
    /// Minimum comment count or score for an unmatched post to be tracked.
    pub engagement_cutoff: i64,
    /// How many "other" posts to track per run.
    pub other_posts_limit: usize,
    pub output_dir: PathBuf,
    pub data_dir: PathBuf,
    pub store: StoreBackend,
    pub fetch: FetchConfig,
    pub preview: PreviewConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Csv,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub base_url: String,
    pub sort: String,
    pub time_filter: String,
    pub limit: u32,
    pub timeout_secs: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    pub host: String,
    pub port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            subreddit: "television".into(),
            query: "Heated Rivalry".into(),
            keywords: vec!["heated rivalry".into()],
            engagement_cutoff: 50,
            other_posts_limit: 5,
            output_dir: PathBuf::from("out"),
            data_dir: PathBuf::from("data"),
            store: StoreBackend::Csv,
            fetch: FetchConfig::default(),
            preview: PreviewConfig::default(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.reddit.com".into(),
            sort: "new".into(),
            time_filter: "all".into(),
            limit: MAX_FETCH_LIMIT,
            timeout_secs: 30,
            user_agent: "show-tracker/0.1 (personal project; respectful polling)".into(),
        }
    }
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8010,
        }
    }
}

impl Settings {
    /// Load from `tracker.toml` (if present) and `TRACKER_*` env vars.
    pub fn load() -> Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name(CONFIG_FILE).required(false))
            .add_source(env_source());
        Self::build(builder)
    }

    /// Load from an explicit file, still honouring env overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::from(path).required(true))
            .add_source(env_source());
        Self::build(builder)
    }

    fn build(builder: config::ConfigBuilder<config::builder::DefaultState>) -> Result<Self> {
        let settings: Settings = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| TrackerError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.subreddit.trim().is_empty() {
            return Err(TrackerError::Config("subreddit must not be empty".into()));
        }
        if self.query.trim().is_empty() {
            return Err(TrackerError::Config("query must not be empty".into()));
        }
        if self.fetch.limit == 0 || self.fetch.limit > MAX_FETCH_LIMIT {
            return Err(TrackerError::Config(format!(
                "fetch.limit must be between 1 and {MAX_FETCH_LIMIT}"
            )));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(TrackerError::Config(
                "fetch.timeout_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Per-show file stem, e.g. `television_heated-rivalry`.
    pub fn show_slug(&self) -> String {
        format!("{}_{}", slugify(&self.subreddit), slugify(&self.query))
    }

    /// Backing file for the observation history.
    pub fn history_path(&self) -> PathBuf {
        let ext = match self.store {
            StoreBackend::Csv => "csv",
            StoreBackend::Sqlite => "sqlite",
        };
        self.data_dir
            .join(format!("{}_comment_history.{ext}", self.show_slug()))
    }
}

fn env_source() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("keywords")
}

fn slugify(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.trim().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let s = Settings::default();
        assert!(s.validate().is_ok());
        assert_eq!(s.engagement_cutoff, 50);
        assert_eq!(s.preview.port, 8010);
        assert_eq!(s.store, StoreBackend::Csv);
    }

    #[test]
    fn history_path_uses_show_slug() {
        let s = Settings::default();
        assert_eq!(s.show_slug(), "television_heated-rivalry");
        assert_eq!(
            s.history_path(),
            PathBuf::from("data/television_heated-rivalry_comment_history.csv")
        );
    }

    #[test]
    fn sqlite_backend_changes_extension() {
        let s = Settings {
            store: StoreBackend::Sqlite,
            ..Default::default()
        };
        assert!(s.history_path().to_string_lossy().ends_with(".sqlite"));
    }

    #[test]
    fn zero_limit_rejected() {
        let mut s = Settings::default();
        s.fetch.limit = 0;
        assert!(matches!(s.validate(), Err(TrackerError::Config(_))));
    }

    #[test]
    fn empty_subreddit_rejected() {
        let s = Settings {
            subreddit: "  ".into(),
            ..Default::default()
        };
        assert!(s.validate().is_err());
    }

    #[test]
    fn file_overrides_defaults() {
        let mut f = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            f,
            "subreddit = \"netflix\"\nengagement_cutoff = 120\nstore = \"sqlite\"\n\n[fetch]\ntimeout_secs = 5\n"
        )
        .unwrap();

        let s = Settings::load_from(f.path()).unwrap();
        assert_eq!(s.subreddit, "netflix");
        assert_eq!(s.engagement_cutoff, 120);
        assert_eq!(s.store, StoreBackend::Sqlite);
        assert_eq!(s.fetch.timeout_secs, 5);
        // untouched keys keep their defaults
        assert_eq!(s.fetch.sort, "new");
        assert_eq!(s.query, "Heated Rivalry");
    }

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("Heated Rivalry!"), "heated-rivalry");
        assert_eq!(slugify("  The  Office (US) "), "the-office-us");
    }
}
