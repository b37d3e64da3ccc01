use atlas_shared::{
    AnonUser, Comment, CommentList, CreateComment, CreatePost, CreateVote, Health, Listing, Post,
    PostDetail, TopCauses, Vote, VoteResponse,
};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::feed::FeedQuery;
use crate::identity::Identity;

/// HTTP client for the authoritative store. Cheap to clone.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: String,
    user_header: String,
    identity: Identity,
}

impl ApiClient {
    pub fn new(config: &ClientConfig, identity: Identity) -> Result<Self> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            http,
            base: config.api_base_url.trim_end_matches('/').to_string(),
            user_header: config.user_id_header.trim().to_string(),
            identity,
        })
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    // ── Posts ──

    pub async fn list_posts(&self, query: &FeedQuery) -> Result<Listing<Post>> {
        let viewer = self.identity.current()?;
        let req = self.http.get(self.url("/posts")).query(&query.params());
        self.fetch(req, viewer.as_deref()).await
    }

    pub async fn create_post(&self, post: &CreatePost) -> Result<Post> {
        let viewer = self.identity.current()?;
        let req = self.http.post(self.url("/posts")).json(post);
        self.fetch(req, viewer.as_deref()).await
    }

    pub async fn get_post(&self, post_id: i64) -> Result<PostDetail> {
        let viewer = self.identity.current()?;
        let req = self.http.get(self.url(&format!("/posts/{post_id}")));
        self.fetch(req, viewer.as_deref()).await
    }

    pub async fn saved_posts(&self) -> Result<Listing<Post>> {
        let viewer = self.ensure_viewer().await?;
        let req = self.http.get(self.url("/me/saved"));
        self.fetch(req, Some(viewer.as_str())).await
    }

    // ── Votes & saves ──

    pub async fn vote(&self, post_id: i64, value: Vote) -> Result<VoteResponse> {
        let viewer = self.ensure_viewer().await?;
        let req = self
            .http
            .post(self.url(&format!("/posts/{post_id}/vote")))
            .json(&CreateVote { value });
        self.fetch(req, Some(viewer.as_str())).await
    }

    pub async fn save(&self, post_id: i64) -> Result<()> {
        let viewer = self.ensure_viewer().await?;
        let req = self.http.post(self.url(&format!("/posts/{post_id}/save")));
        self.execute(req, Some(viewer.as_str())).await.map(drop)
    }

    pub async fn unsave(&self, post_id: i64) -> Result<()> {
        let viewer = self.ensure_viewer().await?;
        let req = self.http.delete(self.url(&format!("/posts/{post_id}/save")));
        self.execute(req, Some(viewer.as_str())).await.map(drop)
    }

    // ── Comments ──

    pub async fn list_comments(&self, post_id: i64) -> Result<Vec<Comment>> {
        let viewer = self.identity.current()?;
        let req = self.http.get(self.url(&format!("/posts/{post_id}/comments")));
        let list: CommentList = self.fetch(req, viewer.as_deref()).await?;
        Ok(list.items)
    }

    pub async fn add_comment(&self, post_id: i64, content: &str) -> Result<Comment> {
        let viewer = self.ensure_viewer().await?;
        let req = self
            .http
            .post(self.url(&format!("/posts/{post_id}/comments")))
            .json(&CreateComment {
                content: content.to_string(),
            });
        self.fetch(req, Some(viewer.as_str())).await
    }

    // ── Analytics, identity, health ──

    pub async fn top_causes(&self) -> Result<TopCauses> {
        let viewer = self.identity.current()?;
        let req = self.http.get(self.url("/analytics/top-causes"));
        self.fetch(req, viewer.as_deref()).await
    }

    /// Ask the store for a fresh anonymous viewer. Sent without a viewer header.
    pub async fn create_anon(&self) -> Result<AnonUser> {
        let req = self.http.post(self.url("/auth/anon"));
        self.fetch(req, None).await
    }

    pub async fn health(&self) -> Result<Health> {
        let req = self.http.get(self.url("/health"));
        self.fetch(req, None).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn fetch<T: DeserializeOwned>(&self, req: RequestBuilder, viewer: Option<&str>) -> Result<T> {
        let resp = self.execute(req, viewer).await?;
        Ok(resp.json().await?)
    }

    async fn execute(&self, req: RequestBuilder, viewer: Option<&str>) -> Result<Response> {
        let req = match viewer {
            Some(id) => req.header(self.user_header.as_str(), id),
            None => req,
        };
        let req = req.build()?;
        debug!(method = %req.method(), url = %req.url(), "sending request");

        let resp = self.http.execute(req).await?;
        if !resp.status().is_success() {
            return Err(error_from(resp).await);
        }
        Ok(resp)
    }
}

/// Turn a failed response into an error carrying the backend's own message.
async fn error_from(resp: Response) -> ClientError {
    let status = resp.status();
    let fallback = status
        .canonical_reason()
        .unwrap_or("request failed")
        .to_string();
    let message = match resp.json::<Value>().await {
        Ok(body) => error_message(&body).unwrap_or(fallback),
        Err(_) => fallback,
    };
    debug!(%status, %message, "request failed");
    ClientError::from_status(status, message)
}

/// `detail` first (FastAPI), then `message`, then the whole body.
fn error_message(body: &Value) -> Option<String> {
    match body {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => ["detail", "message"]
            .iter()
            .filter_map(|key| map.get(*key))
            .find(|v| is_present(v))
            .map(render)
            .or_else(|| Some(body.to_string())),
        other => Some(other.to_string()),
    }
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
