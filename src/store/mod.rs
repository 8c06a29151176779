//! Observation storage.
//!
//! The pipeline and renderer only see [`ObservationStore`]; the backend is
//! picked from configuration.

pub mod csv_file;
pub mod sqlite;

use std::collections::BTreeMap;

use chrono::{DateTime, SubsecRound, Utc};

use crate::config::{Settings, StoreBackend};
use crate::error::Result;
use crate::model::{History, Observation};

pub use csv_file::CsvStore;
pub use sqlite::SqliteStore;

pub trait ObservationStore {
    /// Append one observation. Returns `false` (and writes nothing) when a
    /// row for the same post and timestamp already exists.
    fn append(&mut self, obs: &Observation) -> Result<bool>;

    /// All observations for one post, oldest first. Unknown posts give an empty history.
    fn load(&self, post_id: &str) -> Result<History>;

    /// Every stored post's history, keyed by post id.
    fn load_all(&self) -> Result<BTreeMap<String, History>>;
}

pub fn open(settings: &Settings) -> Result<Box<dyn ObservationStore>> {
    let path = settings.history_path();
    Ok(match settings.store {
        StoreBackend::Csv => Box::new(CsvStore::new(path)),
        StoreBackend::Sqlite => Box::new(SqliteStore::open(&path)?),
    })
}

/// Timestamps are stored at whole-second precision.
pub(crate) fn normalize_ts(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(0)
}

pub(crate) fn format_ts(at: DateTime<Utc>) -> String {
    normalize_ts(at).to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

pub(crate) fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| crate::error::TrackerError::Parse(format!("bad timestamp {s:?}: {e}")))
}

/// Group observations by post into sorted histories.
pub(crate) fn group_histories(rows: Vec<Observation>) -> BTreeMap<String, History> {
    let mut by_post: BTreeMap<String, Vec<Observation>> = BTreeMap::new();
    for obs in rows {
        by_post.entry(obs.post_id.clone()).or_default().push(obs);
    }
    by_post
        .into_iter()
        .map(|(id, obs)| {
            let history = History::new(id.clone(), obs);
            (id, history)
        })
        .collect()
}
