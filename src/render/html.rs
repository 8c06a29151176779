use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

use chrono::{DateTime, Utc};

use super::{escape, EPISODE_CHART, NON_EPISODE_CHART};
use crate::classify::Selection;
use crate::model::{History, Post};

pub struct Dashboard<'a> {
    pub subreddit: &'a str,
    pub query: &'a str,
    pub generated_at: DateTime<Utc>,
    pub selection: &'a Selection,
    pub histories: &'a BTreeMap<String, History>,
    /// Ids first seen this run.
    pub discovered: &'a BTreeSet<String>,
}

const STYLE: &str = r#"
    body { font-family: system-ui, Arial, sans-serif; margin: 24px; }
    .muted { color: #666; }
    table { border-collapse: collapse; width: 100%; margin: 12px 0 24px; }
    th, td { border: 1px solid #ddd; padding: 8px; vertical-align: top; }
    th { background: #f6f6f6; text-align: left; }
    td.num { text-align: right; }
    img { max-width: 100%; border: 1px solid #ddd; border-radius: 10px; padding: 6px; }
    code { background: #f6f6f6; padding: 2px 6px; border-radius: 6px; }
"#;

const TABLE_HEAD: &str = "<thead><tr><th>Type</th><th>Episode</th><th>Title</th><th>Comments</th><th>Score</th><th>Change</th><th>Snapshots</th><th>Created (UTC)</th></tr></thead>";

pub fn dashboard(d: &Dashboard<'_>) -> String {
    let mut html = String::new();
    let _ = write!(
        html,
        "<!doctype html>\n<html>\n<head>\n  <meta charset=\"utf-8\" />\n  <title>r/{sub}: {query} tracker</title>\n  <style>{STYLE}</style>\n</head>\n<body>\n",
        sub = escape(d.subreddit),
        query = escape(d.query),
    );
    let _ = writeln!(
        html,
        "  <h1>r/{}: {} tracking</h1>",
        escape(d.subreddit),
        escape(d.query)
    );
    let _ = writeln!(
        html,
        "  <p class=\"muted\">Query: <code>{}</code> · Generated: <code>{}</code></p>",
        escape(d.query),
        d.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );

    let _ = writeln!(html, "  <h2>Official trailer</h2>");
    section_table(
        &mut html,
        d.selection.trailer.iter(),
        d.histories,
        "No official trailer thread detected.",
    );

    let _ = writeln!(html, "  <h2>Episode discussion threads</h2>");
    section_table(
        &mut html,
        d.selection.episodes.iter(),
        d.histories,
        "No episode threads detected by title pattern.",
    );

    let _ = writeln!(html, "  <h2>Other notable posts (top by comments)</h2>");
    section_table(
        &mut html,
        d.selection.others.iter(),
        d.histories,
        "No additional posts selected.",
    );

    let fresh: Vec<&Post> = d
        .selection
        .tracked()
        .filter(|p| d.discovered.contains(&p.id))
        .collect();
    if !fresh.is_empty() {
        let _ = writeln!(html, "  <h2>Newly discovered</h2>\n  <ul>");
        for p in fresh {
            let _ = writeln!(
                html,
                "    <li>{} <a href=\"{}\" target=\"_blank\" rel=\"noopener\">{}</a></li>",
                p.category.label(),
                escape(&p.permalink),
                escape(&p.title)
            );
        }
        let _ = writeln!(html, "  </ul>");
    }

    let _ = writeln!(
        html,
        "  <h2>Comment growth over time</h2>\n  <p class=\"muted\">Each run adds one snapshot per tracked post.</p>"
    );
    let _ = writeln!(
        html,
        "  <h3>Episode discussions</h3>\n  <img src=\"{EPISODE_CHART}\" alt=\"Episode discussion growth chart\"/>"
    );
    let _ = writeln!(
        html,
        "  <h3>Trailer and other posts</h3>\n  <img src=\"{NON_EPISODE_CHART}\" alt=\"Non-episode growth chart\"/>"
    );
    html.push_str("</body>\n</html>\n");
    html
}

fn section_table<'a>(
    html: &mut String,
    posts: impl Iterator<Item = &'a Post>,
    histories: &BTreeMap<String, History>,
    empty_msg: &str,
) {
    let _ = writeln!(html, "  <table>\n    {TABLE_HEAD}\n    <tbody>");
    let mut any = false;
    for p in posts {
        any = true;
        let _ = writeln!(html, "{}", standings_row(p, histories.get(&p.id)));
    }
    if !any {
        let _ = writeln!(
            html,
            "      <tr><td colspan=\"8\" class=\"muted\">{empty_msg}</td></tr>"
        );
    }
    let _ = writeln!(html, "    </tbody>\n  </table>");
}

/// Latest stored counts win over the fetched ones; change is since the first snapshot.
fn standings_row(p: &Post, history: Option<&History>) -> String {
    let latest = history.and_then(|h| h.latest());
    let comments = latest.map_or(p.num_comments, |o| o.num_comments);
    let score = latest.map_or(p.score, |o| o.score);
    let snapshots = history.map_or(0, |h| h.len());
    let change = match history.and_then(|h| h.observations.first()) {
        Some(first) if snapshots > 1 => format!("{:+}", comments - first.num_comments),
        _ => "–".to_string(),
    };

    format!(
        "      <tr><td>{}</td><td>{}</td><td><a href=\"{}\" target=\"_blank\" rel=\"noopener\">{}</a></td><td class=\"num\">{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td><td>{}</td></tr>",
        p.category.label(),
        p.episode_key.map(|k| k.to_string()).unwrap_or_default(),
        escape(&p.permalink),
        escape(&p.title),
        comments,
        score,
        change,
        snapshots,
        p.created_display(),
    )
}
