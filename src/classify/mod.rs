pub mod episode;
pub mod trailer;

use chrono::DateTime;

use crate::config::Settings;
use crate::model::{Category, EpisodeKey, Post, RawPost};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Episode(EpisodeKey),
    Trailer,
    Other,
    Ignored,
}

/// Title-only post classifier. Episode markers beat trailer markers, which
/// beat the engagement fallback.
#[derive(Debug, Clone)]
pub struct Classifier {
    keywords: Vec<String>,
    cutoff: i64,
}

impl Classifier {
    pub fn new(keywords: &[String], cutoff: i64) -> Self {
        Self {
            keywords: keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            cutoff,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.keywords, settings.engagement_cutoff)
    }

    pub fn classify(&self, raw: &RawPost) -> Classification {
        if let Some(key) = episode::episode_key(&raw.title) {
            return Classification::Episode(key);
        }
        if trailer::is_official_trailer(&raw.title, raw.flair.as_deref(), &self.keywords) {
            return Classification::Trailer;
        }
        if raw.num_comments >= self.cutoff || raw.score >= self.cutoff {
            return Classification::Other;
        }
        Classification::Ignored
    }

    /// Classify and build a [`Post`]; `None` for ignored records.
    pub fn to_post(&self, raw: &RawPost) -> Option<Post> {
        post_from(raw, self.classify(raw))
    }
}

/// Build a [`Post`] from an already computed classification.
pub fn post_from(raw: &RawPost, class: Classification) -> Option<Post> {
    let (category, episode_key) = match class {
        Classification::Episode(k) => (Category::Episode, Some(k)),
        Classification::Trailer => (Category::Trailer, None),
        Classification::Other => (Category::Other, None),
        Classification::Ignored => return None,
    };
    Some(Post {
        id: raw.id.clone(),
        title: raw.title.clone(),
        created_at: (raw.created_utc > 0)
            .then(|| DateTime::from_timestamp(raw.created_utc, 0))
            .flatten(),
        category,
        episode_key,
        num_comments: raw.num_comments,
        score: raw.score,
        permalink: raw.permalink.clone(),
        author: raw.author.clone(),
    })
}

/// The posts tracked for one run.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Sorted by episode key, then creation time.
    pub episodes: Vec<Post>,
    /// The canonical trailer thread: the trailer post with the most comments.
    pub trailer: Option<Post>,
    /// Top posts by comments, then score.
    pub others: Vec<Post>,
}

impl Selection {
    pub fn select(posts: &[Post], others_limit: usize) -> Self {
        let mut episodes: Vec<Post> = posts
            .iter()
            .filter(|p| p.category == Category::Episode)
            .cloned()
            .collect();
        episodes.sort_by(|a, b| {
            a.episode_key
                .cmp(&b.episode_key)
                .then(a.created_at.cmp(&b.created_at))
        });

        let trailer = posts
            .iter()
            .filter(|p| p.category == Category::Trailer)
            .max_by_key(|p| (p.num_comments, p.score))
            .cloned();

        let mut others: Vec<Post> = posts
            .iter()
            .filter(|p| p.category == Category::Other)
            .cloned()
            .collect();
        others.sort_by(|a, b| (b.num_comments, b.score).cmp(&(a.num_comments, a.score)));
        others.truncate(others_limit);

        Self {
            episodes,
            trailer,
            others,
        }
    }

    /// Every tracked post: trailer first, then episodes, then others.
    pub fn tracked(&self) -> impl Iterator<Item = &Post> {
        self.trailer
            .iter()
            .chain(self.episodes.iter())
            .chain(self.others.iter())
    }

    pub fn len(&self) -> usize {
        self.episodes.len() + self.others.len() + usize::from(self.trailer.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
