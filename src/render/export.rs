//! Per-run snapshot CSVs. Overwritten on every run, unlike the history file.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::DateTime;

use super::Snapshot;
use crate::classify::Classification;
use crate::csv::write_record;
use crate::error::Result;
use crate::model::Post;

pub const ALL_POSTS: &str = "all_posts.csv";
pub const EPISODE_POSTS: &str = "episode_posts.csv";
pub const SELECTED_POSTS: &str = "selected_posts.csv";

const POST_HEADER: [&str; 8] = [
    "type",
    "episode_key",
    "id",
    "created_utc",
    "title",
    "num_comments",
    "score",
    "permalink",
];

pub fn write_snapshot(out_dir: &Path, snapshot: &Snapshot) -> Result<Vec<PathBuf>> {
    let all = out_dir.join(ALL_POSTS);
    write_all_posts(&all, &snapshot.fetched)?;

    let episodes = out_dir.join(EPISODE_POSTS);
    write_posts(&episodes, snapshot.selection.episodes.iter())?;

    let selected = out_dir.join(SELECTED_POSTS);
    write_posts(&selected, snapshot.selection.tracked())?;

    Ok(vec![all, episodes, selected])
}

fn write_all_posts(path: &Path, fetched: &[(crate::model::RawPost, Classification)]) -> Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    write_record(
        &mut w,
        &[
            "id",
            "created_utc",
            "title",
            "flair",
            "classification",
            "episode_key",
            "num_comments",
            "score",
            "author",
            "permalink",
            "url",
        ],
    )?;
    for (raw, class) in fetched {
        let (label, key) = match class {
            Classification::Episode(k) => ("episode", k.to_string()),
            Classification::Trailer => ("trailer", String::new()),
            Classification::Other => ("other", String::new()),
            Classification::Ignored => ("ignored", String::new()),
        };
        write_record(
            &mut w,
            &[
                raw.id.clone(),
                iso(raw.created_utc),
                raw.title.clone(),
                raw.flair.clone().unwrap_or_default(),
                label.to_string(),
                key,
                raw.num_comments.to_string(),
                raw.score.to_string(),
                raw.author.clone(),
                raw.permalink.clone(),
                raw.url.clone(),
            ],
        )?;
    }
    w.flush()?;
    Ok(())
}

fn write_posts<'a>(path: &Path, posts: impl Iterator<Item = &'a Post>) -> Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    write_record(&mut w, &POST_HEADER)?;
    for p in posts {
        write_record(
            &mut w,
            &[
                p.category.label().to_string(),
                p.episode_key.map(|k| k.to_string()).unwrap_or_default(),
                p.id.clone(),
                p.created_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
                p.title.clone(),
                p.num_comments.to_string(),
                p.score.to_string(),
                p.permalink.clone(),
            ],
        )?;
    }
    w.flush()?;
    Ok(())
}

fn iso(created_utc: i64) -> String {
    if created_utc <= 0 {
        return String::new();
    }
    DateTime::from_timestamp(created_utc, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_default()
}
