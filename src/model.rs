use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::error::TrackerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Episode,
    Trailer,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Episode => "episode",
            Self::Trailer => "trailer",
            Self::Other => "other",
        }
    }

    /// Label used in tables.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Episode => "Episode",
            Self::Trailer => "Trailer",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "episode" => Ok(Self::Episode),
            "trailer" => Ok(Self::Trailer),
            "other" => Ok(Self::Other),
            other => Err(TrackerError::Parse(format!("unknown category {other:?}"))),
        }
    }
}

/// Season/episode identifier. Displays as `S01E03`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EpisodeKey {
    pub season: u32,
    pub episode: u32,
}

impl EpisodeKey {
    pub fn new(season: u32, episode: u32) -> Self {
        Self { season, episode }
    }
}

impl fmt::Display for EpisodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{:02}E{:02}", self.season, self.episode)
    }
}

impl FromStr for EpisodeKey {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || TrackerError::Parse(format!("bad episode key {s:?}"));
        let rest = s.trim().strip_prefix('S').ok_or_else(bad)?;
        let (season, episode) = rest.split_once('E').ok_or_else(bad)?;
        Ok(Self {
            season: season.parse().map_err(|_| bad())?,
            episode: episode.parse().map_err(|_| bad())?,
        })
    }
}

/// A post record as returned by the search endpoint, before classification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPost {
    pub id: String,
    pub title: String,
    pub flair: Option<String>,
    pub created_utc: i64,
    pub num_comments: i64,
    pub score: i64,
    pub permalink: String,
    pub url: String,
    pub author: String,
}

/// A classified post from the current fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub created_at: Option<DateTime<Utc>>,
    pub category: Category,
    pub episode_key: Option<EpisodeKey>,
    pub num_comments: i64,
    pub score: i64,
    pub permalink: String,
    pub author: String,
}

impl Post {
    pub fn observe(&self, observed_at: DateTime<Utc>) -> Observation {
        Observation {
            post_id: self.id.clone(),
            category: self.category,
            episode_key: self.episode_key,
            observed_at,
            num_comments: self.num_comments,
            score: self.score,
        }
    }

    pub fn created_display(&self) -> String {
        self.created_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default()
    }
}

/// One timestamped snapshot of a post's comment count and score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub post_id: String,
    pub category: Category,
    pub episode_key: Option<EpisodeKey>,
    pub observed_at: DateTime<Utc>,
    pub num_comments: i64,
    pub score: i64,
}

/// Observations for one post, ascending by `observed_at`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    pub post_id: String,
    pub observations: Vec<Observation>,
}

impl History {
    /// Build a history, sorting by timestamp. Stable, so equal timestamps keep file order.
    pub fn new(post_id: impl Into<String>, mut observations: Vec<Observation>) -> Self {
        observations.sort_by_key(|o| o.observed_at);
        Self {
            post_id: post_id.into(),
            observations,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn latest(&self) -> Option<&Observation> {
        self.observations.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn episode_key_display_pads() {
        assert_eq!(EpisodeKey::new(1, 3).to_string(), "S01E03");
        assert_eq!(EpisodeKey::new(10, 12).to_string(), "S10E12");
    }

    #[test]
    fn episode_key_parses_canonical_form() {
        assert_eq!("S02E07".parse::<EpisodeKey>().unwrap(), EpisodeKey::new(2, 7));
        assert!("2x07".parse::<EpisodeKey>().is_err());
        assert!("S02".parse::<EpisodeKey>().is_err());
    }

    #[test]
    fn category_parse() {
        assert_eq!("trailer".parse::<Category>().unwrap(), Category::Trailer);
        assert!("clip".parse::<Category>().is_err());
    }

    #[test]
    fn history_sorts_on_construction() {
        let at = |h| Utc.with_ymd_and_hms(2025, 12, 1, h, 0, 0).unwrap();
        let obs = |h, c| Observation {
            post_id: "abc".into(),
            category: Category::Other,
            episode_key: None,
            observed_at: at(h),
            num_comments: c,
            score: 0,
        };
        let h = History::new("abc", vec![obs(12, 30), obs(6, 10), obs(18, 25)]);
        let counts: Vec<i64> = h.observations.iter().map(|o| o.num_comments).collect();
        assert_eq!(counts, vec![10, 30, 25]);
        assert_eq!(h.latest().map(|o| o.num_comments), Some(25));
    }
}
