use std::collections::BTreeSet;

use anyhow::{Context, Result};
use chrono::{DateTime, SubsecRound, Utc};
use tracing::{info, warn};

use crate::classify::{self, Classifier, Selection};
use crate::config::Settings;
use crate::fetcher::{Fetcher, Listing};
use crate::model::Post;
use crate::render::{Renderer, Snapshot};
use crate::store::{self, ObservationStore};

/// Counts reported after one poll.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub fetched: usize,
    pub tracked: usize,
    pub appended: usize,
    pub duplicates: usize,
    pub charted: usize,
}

impl RunSummary {
    pub fn print(&self) {
        println!(
            "Fetched {} posts, tracking {} ({} new snapshots, {} already recorded), charted {}.",
            self.fetched, self.tracked, self.appended, self.duplicates, self.charted,
        );
    }
}

/// One fetch → classify → append → render cycle.
///
/// The network call happens before the store is opened, so a failed fetch
/// leaves the history untouched.
pub async fn run_cycle(settings: &Settings) -> Result<RunSummary> {
    let taken_at = Utc::now().trunc_subsecs(0);

    let fetcher = Fetcher::new(settings)?;
    let listing = fetcher
        .fetch()
        .await
        .with_context(|| format!("search request to {} failed", fetcher.search_url()))?;

    let mut store = store::open(settings).context("failed to open history store")?;
    let classifier = Classifier::from_settings(settings);
    let renderer = Renderer::new(settings);

    process(
        listing,
        taken_at,
        &classifier,
        settings.other_posts_limit,
        store.as_mut(),
        &renderer,
    )
}

pub fn process(
    listing: Listing,
    taken_at: DateTime<Utc>,
    classifier: &Classifier,
    others_limit: usize,
    store: &mut dyn ObservationStore,
    renderer: &Renderer,
) -> Result<RunSummary> {
    let mut summary = RunSummary::default();
    if listing.is_empty() {
        warn!("Search returned no posts");
    }
    let mut fetched = Vec::with_capacity(listing.len());
    let mut posts: Vec<Post> = Vec::new();

    for raw in listing.into_posts() {
        let class = classifier.classify(&raw);
        if let Some(post) = classify::post_from(&raw, class) {
            posts.push(post);
        }
        fetched.push((raw, class));
    }
    summary.fetched = fetched.len();

    let selection = Selection::select(&posts, others_limit);
    summary.tracked = selection.len();
    info!(
        episodes = selection.episodes.len(),
        trailer = selection.trailer.is_some(),
        others = selection.others.len(),
        "Classified {} posts",
        summary.fetched
    );

    if selection.is_empty() {
        info!("Nothing passed classification; rendering stored history only");
    }
    // posts with no stored observation before this run
    let known = store.load_all().context("failed to load history")?;
    let discovered: BTreeSet<String> = selection
        .tracked()
        .filter(|p| known.get(&p.id).map_or(true, |h| h.is_empty()))
        .map(|p| p.id.clone())
        .collect();
    if !discovered.is_empty() {
        info!("Newly discovered: {:?}", discovered);
    }

    for post in selection.tracked() {
        if store.append(&post.observe(taken_at))? {
            summary.appended += 1;
        } else {
            summary.duplicates += 1;
        }
    }

    let histories = store.load_all().context("failed to load history")?;
    let snapshot = Snapshot {
        taken_at,
        fetched,
        selection,
        discovered,
    };
    let output = renderer
        .render(&snapshot, &histories)
        .with_context(|| format!("failed to render into {}", renderer.out_dir().display()))?;
    summary.charted = output.charted_posts;

    info!("Done.");
    Ok(summary)
}
