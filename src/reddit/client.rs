// Authenticated Reddit JSON API client (OAuth2 "script" app).
//
// Covers exactly the surface the moderation engine needs: listing recent
// comments in the monitored subreddit, removing a comment as a moderator,
// and editing a wiki page. Each call may fail with a platform error whose
// string representation carries the HTTP status and body, which is what
// the error classifier pattern-matches against.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::Config;

/// Default endpoint for OAuth token exchange.
pub const DEFAULT_AUTH_URL: &str = "https://www.reddit.com";
/// Default endpoint for authenticated API calls.
pub const DEFAULT_API_URL: &str = "https://oauth.reddit.com";

/// How many comments a first run (no cursor) pulls from the listing.
pub const FIRST_RUN_LIMIT: u32 = 100;

/// A single comment fetched from the platform. Immutable once fetched.
#[derive(Debug, Clone)]
pub struct Comment {
    pub id: String,
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    /// Site-relative permalink (e.g. "/r/sub/comments/...").
    pub permalink: String,
}

/// The platform surface the orchestrator consumes.
///
/// `RedditClient` is the production implementation; tests substitute an
/// in-memory one.
#[async_trait]
pub trait Platform: Send + Sync {
    /// List comments newer than `since`, oldest first. A `None` cursor is
    /// a first run and returns the most recent `FIRST_RUN_LIMIT` comments.
    async fn list_comments_since(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Comment>>;

    /// Remove a comment as a moderator.
    async fn remove_comment(&self, comment_id: &str) -> Result<()>;

    /// Replace the content of a subreddit wiki page.
    async fn publish_page(&self, page_name: &str, content: &str) -> Result<()>;
}

struct Token {
    access_token: String,
    expires_at: std::time::Instant,
}

/// Authenticated Reddit client using the password grant for script apps.
pub struct RedditClient {
    client: reqwest::Client,
    auth_url: String,
    api_url: String,
    client_id: String,
    client_secret: String,
    username: String,
    password: String,
    subreddit: String,
    token: Mutex<Option<Token>>,
}

impl RedditClient {
    /// Build a client from configuration. Fails only on HTTP client
    /// construction; credentials are validated lazily on the first call.
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.reddit_user_agent.clone())
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            auth_url: DEFAULT_AUTH_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            client_id: config.reddit_client_id.clone(),
            client_secret: config.reddit_client_secret.clone(),
            username: config.reddit_username.clone(),
            password: config.reddit_password.clone(),
            subreddit: config.subreddit.clone(),
            token: Mutex::new(None),
        })
    }

    /// Get a valid access token, refreshing through the password grant
    /// when the cached one is missing or about to expire.
    async fn access_token(&self) -> Result<String> {
        let mut token = self.token.lock().await;

        if let Some(t) = token.as_ref() {
            if t.expires_at > std::time::Instant::now() + Duration::from_secs(60) {
                return Ok(t.access_token.clone());
            }
        }

        debug!("Requesting Reddit access token");
        let response = self
            .client
            .post(format!("{}/api/v1/access_token", self.auth_url))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("grant_type", "password"),
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
            ])
            .send()
            .await
            .context("Token request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Reddit authentication failed with {status}: {body}");
        }

        let grant: TokenResponse = response
            .json()
            .await
            .context("Failed to parse token response")?;

        let access = grant.access_token.clone();
        *token = Some(Token {
            access_token: grant.access_token,
            expires_at: std::time::Instant::now() + Duration::from_secs(grant.expires_in),
        });
        Ok(access)
    }

    async fn api_get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let token = self.access_token().await?;
        let url = format!("{}{}", self.api_url, path);

        debug!(path = path, "Reddit API GET");

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(params)
            .send()
            .await
            .with_context(|| format!("Reddit API request failed: {path}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Reddit API {path} returned {status}: {body}");
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to deserialize {path} response"))
    }

    async fn api_post(&self, path: &str, form: &[(&str, &str)]) -> Result<()> {
        let token = self.access_token().await?;
        let url = format!("{}{}", self.api_url, path);

        debug!(path = path, "Reddit API POST");

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .form(form)
            .send()
            .await
            .with_context(|| format!("Reddit API request failed: {path}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Reddit API {path} returned {status}: {body}");
        }
        Ok(())
    }
}

#[async_trait]
impl Platform for RedditClient {
    async fn list_comments_since(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Comment>> {
        let limit = FIRST_RUN_LIMIT.to_string();
        let listing: Listing = self
            .api_get(
                &format!("/r/{}/comments", self.subreddit),
                &[("limit", limit.as_str()), ("raw_json", "1")],
            )
            .await?;

        let mut comments: Vec<Comment> = listing
            .data
            .children
            .into_iter()
            .map(|child| {
                let d = child.data;
                Comment {
                    id: d.id,
                    author: d.author.unwrap_or_else(|| "[deleted]".to_string()),
                    body: d.body,
                    created_at: Utc
                        .timestamp_opt(d.created_utc as i64, 0)
                        .single()
                        .unwrap_or_else(Utc::now),
                    permalink: d.permalink,
                }
            })
            .collect();

        if let Some(cursor) = since {
            comments.retain(|c| c.created_at > cursor);
        }

        // Listings arrive newest first; the engine processes in stream order.
        comments.reverse();
        Ok(comments)
    }

    async fn remove_comment(&self, comment_id: &str) -> Result<()> {
        let fullname = format!("t1_{comment_id}");
        self.api_post("/api/remove", &[("id", fullname.as_str()), ("spam", "false")])
            .await
            .with_context(|| format!("Failed to remove comment {comment_id}"))
    }

    async fn publish_page(&self, page_name: &str, content: &str) -> Result<()> {
        self.api_post(
            &format!("/r/{}/api/wiki/edit", self.subreddit),
            &[
                ("page", page_name),
                ("content", content),
                ("reason", "Updated moderation transparency log"),
            ],
        )
        .await
        .with_context(|| format!("Failed to edit wiki page {page_name}"))
    }
}

// -- Serde types for the token grant --

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

// -- Serde types for comment listings --

#[derive(Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Deserialize)]
struct ListingData {
    children: Vec<ListingChild>,
}

#[derive(Deserialize)]
struct ListingChild {
    data: CommentData,
}

#[derive(Deserialize)]
struct CommentData {
    id: String,
    /// Absent when the account has been deleted.
    author: Option<String>,
    body: String,
    created_utc: f64,
    permalink: String,
}
