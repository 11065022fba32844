//! Reddit API client
//!
//! # Security considerations
//!
//! - The client secret and account password come from the environment and
//!   are only ever sent to the token endpoint. They are never logged; the
//!   `Debug` impl of [`RedditCredentials`] redacts them.
//! - The bearer token lives in memory for the duration of one run.

use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config_file::{BotConfig, CLIENT_SECRET_ENV, PASSWORD_ENV};
use crate::error::{CubeCompError, Result};

const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
const API_BASE: &str = "https://oauth.reddit.com";
const SIDEBAR_PAGE: &str = "config/sidebar";

/// A submitted post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Base-36 id without the `t3_` prefix
    pub id: String,
    pub url: String,
}

impl Submission {
    pub fn fullname(&self) -> String {
        format!("t3_{}", self.id)
    }
}

/// A top-level comment on a post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub id: String,
    pub author: String,
    pub body: String,
}

/// The Reddit operations the bot needs
pub trait RedditApi {
    fn submit_post(&mut self, subreddit: &str, title: &str, body: &str) -> Result<Submission>;

    /// Pin or unpin a post in the subreddit's announcement slot
    fn set_sticky(&mut self, post_id: &str, sticky: bool) -> Result<()>;

    fn fetch_sidebar(&mut self, subreddit: &str) -> Result<String>;

    fn edit_sidebar(&mut self, subreddit: &str, text: &str) -> Result<()>;

    /// Top-level comments of a post; deleted comments are skipped
    fn fetch_comments(&mut self, post_id: &str) -> Result<Vec<Comment>>;

    fn submit_comment(&mut self, post_id: &str, body: &str) -> Result<()>;

    fn edit_wiki_page(&mut self, subreddit: &str, page: &str, content: &str) -> Result<()>;
}

/// Script-app credentials
#[derive(Clone)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for RedditCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedditCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl RedditCredentials {
    /// Combine the config's public fields with secrets from the environment
    pub fn from_config(config: &BotConfig) -> Result<Self> {
        let secret = |name: &str| {
            std::env::var(name).map_err(|_| {
                CubeCompError::config(format!("environment variable {name} is not set"))
            })
        };
        Ok(Self {
            client_id: config.client_id.clone(),
            client_secret: secret(CLIENT_SECRET_ENV)?,
            username: config.username.clone(),
            password: secret(PASSWORD_ENV)?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct Token {
    value: String,
    expires_at: Instant,
}

/// Blocking Reddit client using the OAuth password grant
pub struct RedditClient {
    client: Client,
    credentials: RedditCredentials,
    user_agent: String,
    token: Option<Token>,
}

impl RedditClient {
    pub fn new(credentials: RedditCredentials, user_agent: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            credentials,
            user_agent: user_agent.into(),
            token: None,
        })
    }

    fn access_token(&mut self) -> Result<String> {
        if let Some(token) = &self.token {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        debug!("Requesting Reddit access token for u/{}", self.credentials.username);
        let response = self
            .client
            .post(TOKEN_URL)
            .basic_auth(&self.credentials.client_id, Some(&self.credentials.client_secret))
            .header("User-Agent", &self.user_agent)
            .form(&[
                ("grant_type", "password"),
                ("username", self.credentials.username.as_str()),
                ("password", self.credentials.password.as_str()),
            ])
            .send()?;
        let response = check_status(response, "access_token")?;
        let token: TokenResponse = response.json()?;

        // refresh a minute early
        let lifetime = Duration::from_secs(token.expires_in.saturating_sub(60));
        self.token = Some(Token {
            value: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(token.access_token)
    }

    fn authed(&mut self, builder: impl FnOnce(&Client) -> RequestBuilder) -> Result<RequestBuilder> {
        let token = self.access_token()?;
        Ok(builder(&self.client)
            .bearer_auth(token)
            .header("User-Agent", &self.user_agent))
    }

    fn post_form(&mut self, path: &str, form: &[(&str, &str)]) -> Result<Value> {
        let url = format!("{API_BASE}{path}");
        let response = self.authed(|c| c.post(&url).form(form))?.send()?;
        let body: Value = check_status(response, path)?.json()?;
        check_json_errors(&body, path)?;
        Ok(body)
    }

    fn get_json(&mut self, path: &str) -> Result<Value> {
        let url = format!("{API_BASE}{path}");
        let response = self.authed(|c| c.get(&url))?.send()?;
        Ok(check_status(response, path)?.json()?)
    }
}

fn check_status(
    response: reqwest::blocking::Response,
    endpoint: &str,
) -> Result<reqwest::blocking::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let hint = match status {
        StatusCode::UNAUTHORIZED => " (check credentials)",
        StatusCode::FORBIDDEN => " (is the bot a moderator?)",
        StatusCode::TOO_MANY_REQUESTS => " (rate limited)",
        _ => "",
    };
    Err(CubeCompError::reddit(format!("{endpoint} returned {status}{hint}")))
}

/// `api_type=json` endpoints report failures inside a 200 response
fn check_json_errors(body: &Value, endpoint: &str) -> Result<()> {
    match body.pointer("/json/errors").and_then(Value::as_array) {
        Some(errors) if !errors.is_empty() => Err(CubeCompError::reddit(format!(
            "{endpoint} rejected the request: {}",
            Value::Array(errors.clone())
        ))),
        _ => Ok(()),
    }
}

/// Most ids `/api/morechildren` accepts per request
const MORE_CHILDREN_BATCH: usize = 100;

/// Upper bound on `/api/morechildren` requests for one post
const MAX_MORE_REQUESTS: usize = 50;

/// Top-level comments plus the ids Reddit folded into `more` stubs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentListing {
    pub comments: Vec<Comment>,
    pub more: Vec<String>,
}

impl CommentListing {
    /// Sorts `t1` and `more` things, keeping those whose parent is
    /// `link_fullname` when a parent id is present
    fn collect<'a>(things: impl IntoIterator<Item = &'a Value>, link_fullname: Option<&str>) -> Self {
        let mut listing = Self::default();
        for thing in things {
            let Some(data) = thing.get("data") else {
                continue;
            };
            let parent = data.get("parent_id").and_then(Value::as_str);
            if let (Some(link), Some(parent)) = (link_fullname, parent) {
                if parent != link {
                    continue;
                }
            }
            match thing.get("kind").and_then(Value::as_str) {
                Some("t1") => listing.comments.extend(parse_comment(data)),
                Some("more") => listing.more.extend(
                    data.get("children")
                        .and_then(Value::as_array)
                        .into_iter()
                        .flatten()
                        .filter_map(Value::as_str)
                        .map(str::to_string),
                ),
                _ => {}
            }
        }
        listing
    }
}

fn parse_comment(data: &Value) -> Option<Comment> {
    let author = data.get("author")?.as_str()?;
    if author == "[deleted]" {
        return None;
    }
    Some(Comment {
        id: data.get("id")?.as_str()?.to_string(),
        author: author.to_string(),
        body: data.get("body")?.as_str()?.to_string(),
    })
}

/// Extracts top-level comments and folded ids from a `/comments/{id}` response
pub fn parse_comment_listing(listing: &Value) -> CommentListing {
    let children = listing
        .get(1)
        .and_then(|l| l.pointer("/data/children"))
        .and_then(Value::as_array);
    match children {
        Some(children) => CommentListing::collect(children, None),
        None => CommentListing::default(),
    }
}

/// Extracts the top-level comments of `link_fullname` from an
/// `/api/morechildren` response
pub fn parse_more_children(body: &Value, link_fullname: &str) -> CommentListing {
    match body.pointer("/json/data/things").and_then(Value::as_array) {
        Some(things) => CommentListing::collect(things, Some(link_fullname)),
        None => CommentListing::default(),
    }
}

fn strip_prefix(post_id: &str) -> &str {
    post_id.strip_prefix("t3_").unwrap_or(post_id)
}

impl RedditApi for RedditClient {
    fn submit_post(&mut self, subreddit: &str, title: &str, body: &str) -> Result<Submission> {
        info!("Submitting post to r/{}: {}", subreddit, title);
        let response = self.post_form(
            "/api/submit",
            &[
                ("api_type", "json"),
                ("kind", "self"),
                ("sr", subreddit),
                ("title", title),
                ("text", body),
                ("resubmit", "true"),
            ],
        )?;
        let data = response
            .pointer("/json/data")
            .ok_or_else(|| CubeCompError::reddit("submit response has no data"))?;
        let id = data
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| CubeCompError::reddit("submit response has no post id"))?;
        let url = data.get("url").and_then(Value::as_str).unwrap_or_default();
        Ok(Submission {
            id: id.to_string(),
            url: url.to_string(),
        })
    }

    fn set_sticky(&mut self, post_id: &str, sticky: bool) -> Result<()> {
        info!("Setting sticky={} on post {}", sticky, post_id);
        let fullname = format!("t3_{}", strip_prefix(post_id));
        let state = if sticky { "true" } else { "false" };
        self.post_form(
            "/api/set_subreddit_sticky",
            &[("api_type", "json"), ("id", &fullname), ("state", state), ("num", "1")],
        )?;
        Ok(())
    }

    fn fetch_sidebar(&mut self, subreddit: &str) -> Result<String> {
        let page = self.get_json(&format!("/r/{subreddit}/wiki/{SIDEBAR_PAGE}"))?;
        Ok(page
            .pointer("/data/content_md")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    fn edit_sidebar(&mut self, subreddit: &str, text: &str) -> Result<()> {
        info!("Updating sidebar of r/{}", subreddit);
        self.edit_wiki_page(subreddit, SIDEBAR_PAGE, text)
    }

    fn fetch_comments(&mut self, post_id: &str) -> Result<Vec<Comment>> {
        let listing = self.get_json(&format!(
            "/comments/{}?depth=1&limit=500&sort=old",
            strip_prefix(post_id)
        ))?;
        let link = format!("t3_{}", strip_prefix(post_id));
        let CommentListing { mut comments, mut more } = parse_comment_listing(&listing);

        let mut requests = 0;
        while !more.is_empty() && requests < MAX_MORE_REQUESTS {
            let batch: Vec<String> = more.drain(..more.len().min(MORE_CHILDREN_BATCH)).collect();
            let children = batch.join(",");
            let path = format!(
                "/api/morechildren?api_type=json&link_id={link}&children={children}&limit_children=true&depth=1"
            );
            let page = parse_more_children(&self.get_json(&path)?, &link);
            debug!("Expanded {} folded ids into {} comments", batch.len(), page.comments.len());
            comments.extend(page.comments);
            more.extend(page.more);
            requests += 1;
        }
        if !more.is_empty() {
            warn!("{} comments on {} were not fetched", more.len(), post_id);
        }

        debug!("Fetched {} comments from {}", comments.len(), post_id);
        Ok(comments)
    }

    fn submit_comment(&mut self, post_id: &str, body: &str) -> Result<()> {
        let fullname = format!("t3_{}", strip_prefix(post_id));
        self.post_form(
            "/api/comment",
            &[("api_type", "json"), ("thing_id", &fullname), ("text", body)],
        )?;
        Ok(())
    }

    fn edit_wiki_page(&mut self, subreddit: &str, page: &str, content: &str) -> Result<()> {
        self.post_form(
            &format!("/r/{subreddit}/api/wiki/edit"),
            &[("page", page), ("content", content), ("reason", "cubecomp update")],
        )?;
        Ok(())
    }
}

/// A recorded call made against [`DryRunReddit`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedditCall {
    SubmitPost { subreddit: String, title: String },
    SetSticky { post_id: String, sticky: bool },
    EditSidebar { subreddit: String },
    FetchComments { post_id: String },
    SubmitComment { post_id: String },
    EditWikiPage { subreddit: String, page: String },
}

/// Stand-in used by `--dry-run`: logs every call, touches no network and
/// keeps sidebar and wiki edits in memory
#[derive(Debug, Default)]
pub struct DryRunReddit {
    pub calls: Vec<RedditCall>,
    pub sidebar: String,
    pub wiki: HashMap<String, String>,
    pub comments: HashMap<String, Vec<Comment>>,
    next_id: u32,
}

impl DryRunReddit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preload the comments returned for a post
    pub fn with_comments(mut self, post_id: &str, comments: Vec<Comment>) -> Self {
        self.comments.insert(strip_prefix(post_id).to_string(), comments);
        self
    }
}

impl RedditApi for DryRunReddit {
    fn submit_post(&mut self, subreddit: &str, title: &str, body: &str) -> Result<Submission> {
        self.next_id += 1;
        let id = format!("dryrun{}", self.next_id);
        info!("[dry-run] submit to r/{}: {} ({} bytes)", subreddit, title, body.len());
        self.calls.push(RedditCall::SubmitPost {
            subreddit: subreddit.to_string(),
            title: title.to_string(),
        });
        Ok(Submission {
            url: format!("https://redd.it/{id}"),
            id,
        })
    }

    fn set_sticky(&mut self, post_id: &str, sticky: bool) -> Result<()> {
        info!("[dry-run] sticky={} on {}", sticky, post_id);
        self.calls.push(RedditCall::SetSticky {
            post_id: strip_prefix(post_id).to_string(),
            sticky,
        });
        Ok(())
    }

    fn fetch_sidebar(&mut self, _subreddit: &str) -> Result<String> {
        Ok(self.sidebar.clone())
    }

    fn edit_sidebar(&mut self, subreddit: &str, text: &str) -> Result<()> {
        info!("[dry-run] sidebar of r/{}:\n{}", subreddit, text);
        self.sidebar = text.to_string();
        self.calls.push(RedditCall::EditSidebar {
            subreddit: subreddit.to_string(),
        });
        Ok(())
    }

    fn fetch_comments(&mut self, post_id: &str) -> Result<Vec<Comment>> {
        let id = strip_prefix(post_id).to_string();
        self.calls.push(RedditCall::FetchComments { post_id: id.clone() });
        Ok(self.comments.get(&id).cloned().unwrap_or_default())
    }

    fn submit_comment(&mut self, post_id: &str, body: &str) -> Result<()> {
        info!("[dry-run] comment on {}:\n{}", post_id, body);
        self.calls.push(RedditCall::SubmitComment {
            post_id: strip_prefix(post_id).to_string(),
        });
        Ok(())
    }

    fn edit_wiki_page(&mut self, subreddit: &str, page: &str, content: &str) -> Result<()> {
        info!("[dry-run] wiki r/{}/{} ({} bytes)", subreddit, page, content.len());
        self.wiki.insert(page.to_string(), content.to_string());
        self.calls.push(RedditCall::EditWikiPage {
            subreddit: subreddit.to_string(),
            page: page.to_string(),
        });
        Ok(())
    }
}
