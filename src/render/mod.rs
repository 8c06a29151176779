pub mod chart;
pub mod export;
pub mod html;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::info;

use crate::classify::{Classification, Selection};
use crate::config::Settings;
use crate::error::Result;
use crate::model::{Category, History, Post, RawPost};
use chart::Series;

pub const EPISODE_CHART: &str = "episode_comment_growth.svg";
pub const NON_EPISODE_CHART: &str = "non_episode_comment_growth.svg";
pub const DASHBOARD: &str = "dashboard.html";
pub const INDEX: &str = "index.html";

const LABEL_CHARS: usize = 40;

/// Everything learned from one fetch.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub taken_at: DateTime<Utc>,
    /// Every fetched record with its classification, in endpoint order.
    pub fetched: Vec<(RawPost, Classification)>,
    pub selection: Selection,
    /// Tracked posts that had no stored observation before this run.
    pub discovered: BTreeSet<String>,
}

/// Paths written by one render pass.
#[derive(Debug, Default)]
pub struct RenderOutput {
    pub files: Vec<PathBuf>,
    pub charted_posts: usize,
}

/// Writes charts, the dashboard and snapshot exports into the output directory.
/// Reads histories; never writes to the store.
pub struct Renderer {
    out_dir: PathBuf,
    subreddit: String,
    query: String,
}

impl Renderer {
    pub fn new(settings: &Settings) -> Self {
        Self {
            out_dir: settings.output_dir.clone(),
            subreddit: settings.subreddit.clone(),
            query: settings.query.clone(),
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn render(
        &self,
        snapshot: &Snapshot,
        histories: &BTreeMap<String, History>,
    ) -> Result<RenderOutput> {
        fs::create_dir_all(&self.out_dir)?;
        let mut out = RenderOutput::default();

        let current: HashMap<&str, &Post> = snapshot
            .selection
            .tracked()
            .map(|p| (p.id.as_str(), p))
            .collect();
        let (episodes, non_episodes) = chart_series(histories, &current);
        out.charted_posts = episodes.len() + non_episodes.len();

        let charts = [
            (EPISODE_CHART, "Episode discussion comment counts over time", &episodes),
            (
                NON_EPISODE_CHART,
                "Trailer and other posts: comment counts over time",
                &non_episodes,
            ),
        ];
        for (file, title, series) in charts {
            let path = self.out_dir.join(file);
            fs::write(&path, chart::render_svg(title, series))?;
            info!("Wrote chart: {}", path.display());
            out.files.push(path);
        }

        let page = html::dashboard(&html::Dashboard {
            subreddit: &self.subreddit,
            query: &self.query,
            generated_at: snapshot.taken_at,
            selection: &snapshot.selection,
            histories,
            discovered: &snapshot.discovered,
        });
        for file in [DASHBOARD, INDEX] {
            let path = self.out_dir.join(file);
            fs::write(&path, &page)?;
            out.files.push(path);
        }
        info!("Wrote dashboard: {}", self.out_dir.join(DASHBOARD).display());

        out.files.extend(export::write_snapshot(&self.out_dir, snapshot)?);
        Ok(out)
    }
}

/// Split stored histories into (episode, trailer + other) chart series.
/// Every stored episode is charted; trailer and other posts only while they
/// are tracked this run. Posts with no observations are skipped.
fn chart_series(
    histories: &BTreeMap<String, History>,
    current: &HashMap<&str, &Post>,
) -> (Vec<Series>, Vec<Series>) {
    let mut episodes: Vec<(Option<crate::model::EpisodeKey>, Series)> = Vec::new();
    let mut others = Vec::new();

    for (id, history) in histories {
        let Some(latest) = history.latest() else {
            continue;
        };
        let points = history
            .observations
            .iter()
            .map(|o| (o.observed_at, o.num_comments))
            .collect();

        if latest.category == Category::Episode {
            let label = latest
                .episode_key
                .map(|k| k.to_string())
                .unwrap_or_else(|| id.clone());
            episodes.push((latest.episode_key, Series { label, points }));
        } else if let Some(post) = current.get(id.as_str()) {
            let label = truncate_label(&post.title, LABEL_CHARS);
            others.push(Series { label, points });
        }
    }

    episodes.sort_by_key(|(k, _)| *k);
    (episodes.into_iter().map(|(_, s)| s).collect(), others)
}

pub(crate) fn truncate_label(s: &str, max: usize) -> String {
    let s = s.trim();
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}…", truncated.trim_end())
    }
}

/// Escape text for HTML and SVG.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Classifier;
    use crate::model::Observation;
    use chrono::TimeZone;

    fn raw(id: &str, title: &str, comments: i64) -> RawPost {
        RawPost {
            id: id.into(),
            title: title.into(),
            num_comments: comments,
            score: 1,
            created_utc: 1_765_000_000,
            ..Default::default()
        }
    }

    fn snapshot(raws: Vec<RawPost>) -> Snapshot {
        let c = Classifier::new(&["heated rivalry".to_string()], 50);
        let posts: Vec<Post> = raws.iter().filter_map(|r| c.to_post(r)).collect();
        Snapshot {
            taken_at: Utc.with_ymd_and_hms(2025, 12, 1, 6, 0, 0).unwrap(),
            fetched: raws.iter().map(|r| (r.clone(), c.classify(r))).collect(),
            selection: Selection::select(&posts, 5),
            discovered: BTreeSet::new(),
        }
    }

    #[test]
    fn truncate_label_adds_ellipsis() {
        assert_eq!(truncate_label("short", 40), "short");
        let long = "Heated Rivalry renewed for a second season at Crave and HBO Max";
        let t = truncate_label(long, 40);
        assert!(t.ends_with('…'));
        assert!(t.chars().count() <= 41);
    }

    #[test]
    fn render_writes_all_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            output_dir: dir.path().join("out"),
            ..Default::default()
        };
        let snap = snapshot(vec![
            raw("ep3", "Heated Rivalry - 1x03 - Discussion", 41),
            raw("news", "Heated Rivalry renewed", 400),
        ]);

        let mut histories = BTreeMap::new();
        for p in snap.selection.tracked() {
            histories.insert(p.id.clone(), History::new(p.id.clone(), vec![p.observe(snap.taken_at)]));
        }

        let out = Renderer::new(&settings).render(&snap, &histories).unwrap();
        assert_eq!(out.charted_posts, 2);
        for f in [EPISODE_CHART, NON_EPISODE_CHART, DASHBOARD, INDEX] {
            assert!(settings.output_dir.join(f).exists(), "{f} missing");
        }

        let ep_svg = fs::read_to_string(settings.output_dir.join(EPISODE_CHART)).unwrap();
        assert_eq!(ep_svg.matches("<circle").count(), 1);
        assert!(ep_svg.contains("S01E03"));
        let other_svg = fs::read_to_string(settings.output_dir.join(NON_EPISODE_CHART)).unwrap();
        assert!(other_svg.contains("Heated Rivalry renewed"));
    }

    #[test]
    fn zero_observation_posts_not_charted() {
        let snap = snapshot(vec![raw("ep1", "Heated Rivalry 1x01", 5)]);
        let mut histories = BTreeMap::new();
        histories.insert("ep1".to_string(), History::new("ep1", vec![]));
        let current: HashMap<&str, &Post> =
            snap.selection.tracked().map(|p| (p.id.as_str(), p)).collect();
        let (eps, others) = chart_series(&histories, &current);
        assert!(eps.is_empty());
        assert!(others.is_empty());
    }

    #[test]
    fn non_episode_posts_dropped_from_fetch_are_not_charted() {
        let snap = snapshot(vec![raw("news", "Heated Rivalry renewed", 400)]);
        let stored = |id: &str, category| Observation {
            post_id: id.into(),
            category,
            episode_key: None,
            observed_at: snap.taken_at,
            num_comments: 70,
            score: 2,
        };
        let mut histories = BTreeMap::new();
        for id in ["gone", "news"] {
            histories.insert(id.to_string(), History::new(id, vec![stored(id, Category::Other)]));
        }
        let mut old_ep = stored("ep9", Category::Episode);
        old_ep.episode_key = Some(crate::model::EpisodeKey::new(1, 9));
        histories.insert("ep9".to_string(), History::new("ep9", vec![old_ep]));

        let current: HashMap<&str, &Post> =
            snap.selection.tracked().map(|p| (p.id.as_str(), p)).collect();
        let (eps, others) = chart_series(&histories, &current);
        assert_eq!(eps.len(), 1);
        assert_eq!(eps[0].label, "S01E09");
        let labels: Vec<&str> = others.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["Heated Rivalry renewed"]);
    }

    #[test]
    fn escape_covers_markup() {
        assert_eq!(escape("<a href=\"x\">&'</a>"), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;&lt;/a&gt;");
    }
}
