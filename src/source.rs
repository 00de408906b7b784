//! Post source: the X API v2 user timeline.
//!
//! One request per run, one page of at most 100 posts. Replies and reposts
//! are excluded server-side. Quoted posts and their authors arrive through
//! the `includes` expansion.

use crate::error::{Result, XsyncError};
use crate::model::{Author, Media, Post, PostBatch};
use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, Utc};
use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info};

/// Default X API v2 base URL.
pub const DEFAULT_API_BASE: &str = "https://api.twitter.com/2";

/// Largest page the timeline endpoint returns.
pub const MAX_RESULTS: u32 = 100;

const TWEET_FIELDS: &str = "created_at,conversation_id,attachments,author_id,referenced_tweets";
const EXPANSIONS: &str = "attachments.media_keys,referenced_tweets.id,referenced_tweets.id.author_id";
const MEDIA_FIELDS: &str = "url,preview_image_url,type";
const USER_FIELDS: &str = "username,name";

/// Where posts come from.
pub trait PostSource {
    /// Resolve a handle to the account it names.
    ///
    /// # Errors
    ///
    /// Returns [`XsyncError::UpstreamFetch`] on a non-success response.
    fn lookup_account(&self, handle: &str) -> Result<Author>;

    /// Fetch the account's recent posts.
    ///
    /// With `since_id`, only posts strictly newer than it; otherwise posts
    /// from the last `lookback_days`.
    ///
    /// # Errors
    ///
    /// Returns [`XsyncError::UpstreamFetch`] on a non-success response.
    fn fetch_recent_posts(
        &self,
        account_id: &str,
        since_id: Option<&str>,
        lookback_days: u32,
    ) -> Result<PostBatch>;
}

/// Connection settings for [`XClient`].
#[derive(Debug, Clone)]
pub struct XClientOptions {
    pub bearer_token: String,
    pub api_base: String,
    pub proxy_url: Option<String>,
    pub timeout: Duration,
}

impl XClientOptions {
    #[must_use]
    pub fn new(bearer_token: impl Into<String>) -> Self {
        Self {
            bearer_token: bearer_token.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            proxy_url: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Blocking X API v2 client.
pub struct XClient {
    http: Client,
    api_base: String,
    bearer_token: String,
}

impl XClient {
    /// Build a client. A proxy, if given, applies to this client only.
    ///
    /// # Errors
    ///
    /// Returns an error if the proxy URL is invalid or the client cannot be
    /// built.
    pub fn new(options: XClientOptions) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(options.timeout)
            .user_agent(concat!("xsync/", env!("CARGO_PKG_VERSION")));

        if let Some(proxy) = &options.proxy_url {
            debug!("Routing X API requests through proxy");
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }

        Ok(Self {
            http: builder.build()?,
            api_base: options.api_base.trim_end_matches('/').to_string(),
            bearer_token: options.bearer_token,
        })
    }

    fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Response> {
        let response = self
            .http
            .get(format!("{}{path}", self.api_base))
            .bearer_auth(&self.bearer_token)
            .query(query)
            .send()?;

        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(XsyncError::upstream(status.as_u16(), response.text()?))
        }
    }
}

impl PostSource for XClient {
    fn lookup_account(&self, handle: &str) -> Result<Author> {
        let response: UserLookupResponse =
            self.get(&format!("/users/by/username/{handle}"), &[])?.json()?;
        debug!(handle, id = %response.data.id, "Resolved account");
        Ok(response.data)
    }

    fn fetch_recent_posts(
        &self,
        account_id: &str,
        since_id: Option<&str>,
        lookback_days: u32,
    ) -> Result<PostBatch> {
        let query = timeline_query(since_id, lookback_days, Utc::now());
        let response: TimelineResponse = self
            .get(&format!("/users/{account_id}/tweets"), &query)?
            .json()?;

        let batch = response.into_batch();
        info!(
            posts = batch.posts.len(),
            media = batch.media.len(),
            quoted = batch.quoted_posts.len(),
            "Fetched timeline page"
        );
        Ok(batch)
    }
}

/// Query parameters for one timeline page.
#[must_use]
pub fn timeline_query(
    since_id: Option<&str>,
    lookback_days: u32,
    now: DateTime<Utc>,
) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("max_results", MAX_RESULTS.to_string()),
        ("exclude", "replies,retweets".to_string()),
        ("tweet.fields", TWEET_FIELDS.to_string()),
        ("expansions", EXPANSIONS.to_string()),
        ("media.fields", MEDIA_FIELDS.to_string()),
        ("user.fields", USER_FIELDS.to_string()),
    ];

    match since_id {
        Some(id) => query.push(("since_id", id.to_string())),
        None => {
            let start = ChronoDuration::try_days(i64::from(lookback_days))
                .and_then(|window| now.checked_sub_signed(window))
                .unwrap_or_default();
            query.push((
                "start_time",
                start.to_rfc3339_opts(SecondsFormat::Millis, true),
            ));
        }
    }

    query
}

#[derive(Debug, Deserialize)]
struct UserLookupResponse {
    data: Author,
}

#[derive(Debug, Default, Deserialize)]
struct TimelineResponse {
    #[serde(default)]
    data: Vec<Post>,
    #[serde(default)]
    includes: Includes,
}

#[derive(Debug, Default, Deserialize)]
struct Includes {
    #[serde(default)]
    media: Vec<Media>,
    #[serde(default)]
    tweets: Vec<Post>,
    #[serde(default)]
    users: Vec<Author>,
}

impl TimelineResponse {
    /// Split the response into a batch, keeping only included posts that one
    /// of the fetched posts quotes.
    fn into_batch(self) -> PostBatch {
        let quoted: HashSet<&str> = self.data.iter().flat_map(Post::quoted_ids).collect();
        let quoted_posts = self
            .includes
            .tweets
            .into_iter()
            .filter(|p| quoted.contains(p.id.as_str()))
            .collect();

        PostBatch {
            posts: self.data,
            media: self.includes.media,
            quoted_posts,
            authors: self.includes.users,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use mockito::Matcher;

    const TIMELINE: &str = r#"{
        "data": [
            {
                "id": "200",
                "text": "look at this",
                "created_at": "2025-01-02T00:00:00.000Z",
                "conversation_id": "200",
                "author_id": "42",
                "referenced_tweets": [{"type": "quoted", "id": "900"}],
                "attachments": {"media_keys": ["3_1"]}
            }
        ],
        "includes": {
            "media": [{"media_key": "3_1", "type": "photo", "url": "https://pbs/1.jpg"}],
            "tweets": [
                {"id": "900", "text": "original", "created_at": "2024-12-30T00:00:00.000Z", "author_id": "7"},
                {"id": "901", "text": "unrelated", "created_at": "2024-12-30T00:00:00.000Z", "author_id": "8"}
            ],
            "users": [
                {"id": "42", "name": "Alice", "username": "alice"},
                {"id": "7", "name": "Bob", "username": "bob"}
            ]
        },
        "meta": {"result_count": 1}
    }"#;

    fn client(server: &mockito::Server) -> XClient {
        let mut options = XClientOptions::new("token");
        options.api_base = server.url();
        XClient::new(options).unwrap()
    }

    #[test]
    fn timeline_query_uses_cursor_when_present() {
        let now = Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).single().unwrap();
        let query = timeline_query(Some("123"), 7, now);
        assert!(query.contains(&("since_id", "123".to_string())));
        assert!(!query.iter().any(|(k, _)| *k == "start_time"));
    }

    #[test]
    fn timeline_query_uses_lookback_without_cursor() {
        let now = Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).single().unwrap();
        let query = timeline_query(None, 7, now);
        assert!(query.contains(&("start_time", "2025-01-03T00:00:00.000Z".to_string())));
        assert!(query.contains(&("exclude", "replies,retweets".to_string())));
        assert!(query.contains(&("max_results", "100".to_string())));
    }

    #[test]
    fn timeline_query_clamps_oversized_lookback() {
        let now = Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).single().unwrap();
        let query = timeline_query(None, u32::MAX, now);
        assert!(query.contains(&("start_time", "1970-01-01T00:00:00.000Z".to_string())));
    }

    #[test]
    fn lookup_account() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/users/by/username/alice")
            .match_header("authorization", "Bearer token")
            .with_status(200)
            .with_body(r#"{"data":{"id":"42","name":"Alice","username":"alice"}}"#)
            .create();

        let author = client(&server).lookup_account("alice").unwrap();
        assert_eq!(author.id, "42");
        assert_eq!(author.username, "alice");
        mock.assert();
    }

    #[test]
    fn fetch_splits_includes() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/users/42/tweets")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("since_id".into(), "150".into()),
                Matcher::UrlEncoded("expansions".into(), EXPANSIONS.into()),
            ]))
            .with_status(200)
            .with_body(TIMELINE)
            .create();

        let batch = client(&server)
            .fetch_recent_posts("42", Some("150"), 7)
            .unwrap();
        mock.assert();

        assert_eq!(batch.posts.len(), 1);
        assert_eq!(batch.media.len(), 1);
        assert_eq!(batch.authors.len(), 2);
        let quoted: Vec<_> = batch.quoted_posts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(quoted, vec!["900"]);
    }

    #[test]
    fn empty_timeline_has_no_data_field() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/users/42/tweets")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"meta":{"result_count":0}}"#)
            .create();

        let batch = client(&server).fetch_recent_posts("42", None, 7).unwrap();
        assert!(batch.is_empty());
        assert!(batch.quoted_posts.is_empty());
    }

    #[test]
    fn non_success_is_upstream_error() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/users/by/username/alice")
            .with_status(401)
            .with_body(r#"{"title":"Unauthorized"}"#)
            .create();

        let err = client(&server).lookup_account("alice").unwrap_err();
        match err {
            XsyncError::UpstreamFetch { status, body } => {
                assert_eq!(status, 401);
                assert!(body.contains("Unauthorized"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
