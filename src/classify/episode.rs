use std::sync::LazyLock;

use regex::Regex;

use crate::model::EpisodeKey;

// Order matters: the first pattern that matches anywhere in the title wins.
static NX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{1,2})\s*x\s*(\d{1,2})\b").unwrap());
static SE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bs(\d{1,2})\s*e(\d{1,2})\b").unwrap());

/// Parse a season/episode marker (`1x03`, `S01E03`, `s1 e3`) out of a title.
pub fn episode_key(title: &str) -> Option<EpisodeKey> {
    [&*NX_RE, &*SE_RE].iter().find_map(|re| {
        let caps = re.captures(title)?;
        let season = caps[1].parse().ok()?;
        let episode = caps[2].parse().ok()?;
        Some(EpisodeKey::new(season, episode))
    })
}
