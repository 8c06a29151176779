use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use crate::config::Settings;
use crate::error::{Result, TrackerError};
use crate::model::RawPost;

/// Reads one page of subreddit search results per run.
pub struct Fetcher {
    client: reqwest::Client,
    search_url: String,
    params: Vec<(&'static str, String)>,
    base_url: String,
}

impl Fetcher {
    pub fn new(settings: &Settings) -> Result<Self> {
        let fetch = &settings.fetch;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(fetch.timeout_secs))
            .user_agent(fetch.user_agent.clone())
            .build()
            .map_err(|e| TrackerError::Network(format!("failed to build HTTP client: {e}")))?;

        let base_url = fetch.base_url.trim_end_matches('/').to_string();
        let search_url = format!("{}/r/{}/search.json", base_url, settings.subreddit.trim());
        let params = vec![
            ("q", settings.query.clone()),
            ("restrict_sr", "1".to_string()),
            ("sort", fetch.sort.clone()),
            ("t", fetch.time_filter.clone()),
            ("limit", fetch.limit.to_string()),
            ("raw_json", "1".to_string()),
        ];

        Ok(Self {
            client,
            search_url,
            params,
            base_url,
        })
    }

    pub fn search_url(&self) -> &str {
        &self.search_url
    }

    /// Issue the search request. Any transport failure, timeout, non-success
    /// status or non-JSON body is a [`TrackerError::Network`].
    pub async fn fetch(&self) -> Result<Listing> {
        info!("Searching {} ({:?})", self.search_url, self.params);
        let resp = self
            .client
            .get(&self.search_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(&self.params)
            .send()
            .await?
            .error_for_status()?;

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();
        if !content_type.contains("json") {
            return Err(TrackerError::Network(format!(
                "expected JSON but got content-type {:?} from {}",
                content_type,
                resp.url()
            )));
        }

        let body = resp.text().await?;
        let listing = Listing::from_json(&body, &self.base_url)?;
        info!("Fetched {} search results", listing.len());
        Ok(listing)
    }
}

/// One search response. Records are decoded lazily by [`Listing::into_posts`].
#[derive(Debug)]
pub struct Listing {
    children: Vec<serde_json::Value>,
    base_url: String,
}

#[derive(Deserialize)]
struct ListingEnvelope {
    data: ListingData,
}

#[derive(Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct Child {
    data: ApiPost,
}

#[derive(Deserialize)]
struct ApiPost {
    id: Option<String>,
    #[serde(default)]
    title: String,
    link_flair_text: Option<String>,
    created_utc: Option<f64>,
    num_comments: Option<i64>,
    score: Option<i64>,
    #[serde(default)]
    permalink: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    author: String,
}

impl Listing {
    pub fn from_json(body: &str, base_url: &str) -> Result<Self> {
        let env: ListingEnvelope = serde_json::from_str(body)
            .map_err(|e| TrackerError::Parse(format!("search response is not a listing: {e}")))?;
        Ok(Self {
            children: env.data.children,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Decode records one at a time, logging and skipping malformed ones.
    pub fn into_posts(self) -> impl Iterator<Item = RawPost> {
        let base_url = self.base_url;
        self.children
            .into_iter()
            .enumerate()
            .filter_map(move |(i, value)| match decode_child(value, &base_url) {
                Ok(post) => Some(post),
                Err(e) => {
                    warn!("skipping search result #{}: {}", i, e);
                    None
                }
            })
    }
}

fn decode_child(value: serde_json::Value, base_url: &str) -> Result<RawPost> {
    let child: Child =
        serde_json::from_value(value).map_err(|e| TrackerError::Parse(e.to_string()))?;
    let d = child.data;
    let id = d
        .id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| TrackerError::Parse("record has no id".into()))?;

    let permalink = if d.permalink.starts_with('/') {
        format!("{}{}", base_url, d.permalink)
    } else {
        d.permalink
    };

    Ok(RawPost {
        id,
        title: d.title,
        flair: d.link_flair_text.filter(|f| !f.trim().is_empty()),
        created_utc: d.created_utc.map(|t| t as i64).unwrap_or(0),
        num_comments: d.num_comments.unwrap_or(0),
        score: d.score.unwrap_or(0),
        permalink,
        url: d.url,
        author: d.author,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FIXTURE: &str = include_str!("../tests/fixtures/search_listing.json");

    fn settings_for(server: &MockServer) -> Settings {
        let mut s = Settings::default();
        s.fetch.base_url = server.uri();
        s.fetch.timeout_secs = 1;
        s
    }

    #[test]
    fn listing_skips_bad_records() {
        let listing = Listing::from_json(FIXTURE, "https://www.reddit.com").unwrap();
        assert_eq!(listing.len(), 6);

        let posts: Vec<RawPost> = listing.into_posts().collect();
        let ids: Vec<&str> = posts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["ep3", "trl", "news", "quiet"]);

        let ep = &posts[0];
        assert_eq!(ep.title, "Heated Rivalry - 1x03 - Discussion");
        assert_eq!(ep.num_comments, 812);
        assert_eq!(ep.created_utc, 1_765_000_000);
        assert_eq!(
            ep.permalink,
            "https://www.reddit.com/r/television/comments/ep3/heated_rivalry_1x03_discussion/"
        );
        assert_eq!(posts[1].flair.as_deref(), Some("Trailer"));
        // missing counts default to zero
        assert_eq!(posts[3].score, 0);
    }

    #[test]
    fn non_listing_body_is_parse_error() {
        assert!(matches!(
            Listing::from_json("[1,2,3]", ""),
            Err(TrackerError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn fetch_sends_search_params() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/r/television/search.json"))
            .and(query_param("q", "Heated Rivalry"))
            .and(query_param("restrict_sr", "1"))
            .and(query_param("sort", "new"))
            .and(query_param("limit", "100"))
            .and(query_param("raw_json", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(FIXTURE, "application/json"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&settings_for(&server)).unwrap();
        let listing = fetcher.fetch().await.unwrap();
        assert_eq!(listing.into_posts().count(), 4);
    }

    #[tokio::test]
    async fn server_error_is_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&settings_for(&server)).unwrap();
        assert!(matches!(fetcher.fetch().await, Err(TrackerError::Network(_))));
    }

    #[tokio::test]
    async fn html_body_is_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("<html>blocked</html>", "text/html"),
            )
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&settings_for(&server)).unwrap();
        let err = fetcher.fetch().await.unwrap_err();
        assert!(err.to_string().contains("expected JSON"), "{err}");
    }

    #[tokio::test]
    async fn slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(FIXTURE, "application/json")
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&settings_for(&server)).unwrap();
        assert!(matches!(fetcher.fetch().await, Err(TrackerError::Network(_))));
    }
}
