use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::{format_ts, group_histories, normalize_ts, parse_ts, ObservationStore};
use crate::csv::{format_record, parse_record};
use crate::error::{Result, TrackerError};
use crate::model::{History, Observation};

pub const HEADER: [&str; 6] = [
    "post_id",
    "category",
    "episode_key",
    "observed_at",
    "num_comments",
    "score",
];

/// Append-only CSV history, one row per observation.
pub struct CsvStore {
    path: PathBuf,
    /// (post id, timestamp) pairs already on disk; filled on first append.
    seen: Option<HashSet<(String, DateTime<Utc>)>>,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            seen: None,
        }
    }

    /// Read every parseable row. Missing file reads as empty; bad rows are skipped.
    fn read_rows(&self) -> Result<Vec<Observation>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut rows = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            if line.trim().is_empty() || (idx == 0 && line.starts_with(HEADER[0])) {
                continue;
            }
            match parse_record(line).and_then(|fields| row_to_observation(&fields)) {
                Ok(obs) => rows.push(obs),
                Err(e) => warn!("{}:{}: skipping row: {}", self.path.display(), idx + 1, e),
            }
        }
        Ok(rows)
    }

    fn ensure_file(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        match OpenOptions::new().write(true).create_new(true).open(&self.path) {
            Ok(mut f) => {
                f.write_all(format_record(&HEADER).as_bytes())?;
                debug!("created history file {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl ObservationStore for CsvStore {
    fn append(&mut self, obs: &Observation) -> Result<bool> {
        if self.seen.is_none() {
            let existing = self
                .read_rows()?
                .into_iter()
                .map(|o| (o.post_id, o.observed_at))
                .collect();
            self.seen = Some(existing);
        }

        let key = (obs.post_id.clone(), normalize_ts(obs.observed_at));
        if self.seen.as_ref().is_some_and(|s| s.contains(&key)) {
            return Ok(false);
        }

        self.ensure_file()?;
        let mut f = OpenOptions::new().read(true).append(true).open(&self.path)?;
        let mut line = String::new();
        if !ends_with_newline(&mut f)? {
            warn!("{} lacks a trailing newline; terminating last row", self.path.display());
            line.push('\n');
        }
        line.push_str(&format_record(&observation_to_row(obs)));
        // one write_all per row keeps concurrent appenders line-atomic
        f.write_all(line.as_bytes())?;

        if let Some(seen) = self.seen.as_mut() {
            seen.insert(key);
        }
        Ok(true)
    }

    fn load(&self, post_id: &str) -> Result<History> {
        let rows = self
            .read_rows()?
            .into_iter()
            .filter(|o| o.post_id == post_id)
            .collect();
        Ok(History::new(post_id, rows))
    }

    fn load_all(&self) -> Result<BTreeMap<String, History>> {
        Ok(group_histories(self.read_rows()?))
    }
}

fn ends_with_newline(f: &mut File) -> Result<bool> {
    if f.metadata()?.len() == 0 {
        return Ok(true);
    }
    f.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    f.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

fn observation_to_row(obs: &Observation) -> [String; 6] {
    [
        obs.post_id.clone(),
        obs.category.to_string(),
        obs.episode_key.map(|k| k.to_string()).unwrap_or_default(),
        format_ts(obs.observed_at),
        obs.num_comments.to_string(),
        obs.score.to_string(),
    ]
}

fn row_to_observation(fields: &[String]) -> Result<Observation> {
    if fields.len() != HEADER.len() {
        return Err(TrackerError::Parse(format!(
            "expected {} columns, got {}",
            HEADER.len(),
            fields.len()
        )));
    }
    let post_id = fields[0].trim();
    if post_id.is_empty() {
        return Err(TrackerError::Parse("empty post_id".into()));
    }
    let episode_key = match fields[2].trim() {
        "" => None,
        k => Some(k.parse()?),
    };
    let int = |s: &str, name: &str| {
        s.trim()
            .parse::<i64>()
            .map_err(|_| TrackerError::Parse(format!("bad {name} {s:?}")))
    };
    Ok(Observation {
        post_id: post_id.to_string(),
        category: fields[1].parse()?,
        episode_key,
        observed_at: parse_ts(&fields[3])?,
        num_comments: int(&fields[4], "num_comments")?,
        score: int(&fields[5], "score")?,
    })
}
