use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use rusqlite::{params, Connection};
use tracing::warn;

use super::{format_ts, group_histories, parse_ts, ObservationStore};
use crate::error::{Result, TrackerError};
use crate::model::{History, Observation};

/// Embedded-table backend. Same contract as the CSV file, enforced by a
/// unique index instead of a scan.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::with_connection(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    fn query(&self, post_id: Option<&str>) -> Result<Vec<Observation>> {
        let sql = format!(
            "SELECT post_id, category, episode_key, observed_at, num_comments, score
             FROM observations{}
             ORDER BY observed_at, id",
            if post_id.is_some() { " WHERE post_id = ?1" } else { "" }
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let raw = match post_id {
            Some(id) => stmt
                .query_map(params![id], map_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?,
            None => stmt
                .query_map([], map_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?,
        };

        let mut rows = Vec::with_capacity(raw.len());
        for r in raw {
            match r.into_observation() {
                Ok(obs) => rows.push(obs),
                Err(e) => warn!("skipping stored observation: {}", e),
            }
        }
        Ok(rows)
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS observations (
            id           INTEGER PRIMARY KEY,
            post_id      TEXT NOT NULL,
            category     TEXT NOT NULL,
            episode_key  TEXT,
            observed_at  TEXT NOT NULL,
            num_comments INTEGER NOT NULL,
            score        INTEGER NOT NULL,
            UNIQUE(post_id, observed_at)
        );
        CREATE INDEX IF NOT EXISTS idx_observations_post ON observations(post_id);
        ",
    )?;
    Ok(())
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        post_id: row.get(0)?,
        category: row.get(1)?,
        episode_key: row.get(2)?,
        observed_at: row.get(3)?,
        num_comments: row.get(4)?,
        score: row.get(5)?,
    })
}

/// Row as stored; text columns are validated on the way out.
struct RawRow {
    post_id: String,
    category: String,
    episode_key: Option<String>,
    observed_at: String,
    num_comments: i64,
    score: i64,
}

impl RawRow {
    fn into_observation(self) -> Result<Observation> {
        let episode_key = match self.episode_key.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(k) => Some(k.parse()?),
        };
        Ok(Observation {
            category: self
                .category
                .parse()
                .map_err(|e: TrackerError| TrackerError::Parse(format!("{}: {e}", self.post_id)))?,
            observed_at: parse_ts(&self.observed_at)?,
            post_id: self.post_id,
            episode_key,
            num_comments: self.num_comments,
            score: self.score,
        })
    }
}

impl ObservationStore for SqliteStore {
    fn append(&mut self, obs: &Observation) -> Result<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO observations
             (post_id, category, episode_key, observed_at, num_comments, score)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                obs.post_id,
                obs.category.as_str(),
                obs.episode_key.map(|k| k.to_string()),
                format_ts(obs.observed_at),
                obs.num_comments,
                obs.score,
            ],
        )?;
        Ok(inserted == 1)
    }

    fn load(&self, post_id: &str) -> Result<History> {
        Ok(History::new(post_id, self.query(Some(post_id))?))
    }

    fn load_all(&self) -> Result<BTreeMap<String, History>> {
        Ok(group_histories(self.query(None)?))
    }
}
