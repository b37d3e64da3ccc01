//! In-process stand-in for the authoritative store.
//!
//! Records every request and can fail or delay the next request to a given
//! route.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use atlas_shared::{
    AnonUser, CauseAnalytics, Comment, CommentList, CreateComment, CreatePost, CreateVote, Health,
    Listing, Post, PostDetail, TopCauses, Vote, VoteResponse,
};
use axum::body::Body;
use axum::extract::{Path, Query, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

pub const USER_HEADER: &str = "x-user-id";

/// A captured request for assertions.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub user_id: Option<String>,
    pub body: String,
}

#[derive(Debug, Clone)]
struct Fault {
    method: String,
    path: String,
    status: Option<StatusCode>,
    body: Value,
    delay_before: Duration,
    delay_after: Duration,
}

#[derive(Debug, Clone)]
struct StoredPost {
    post: Post,
    body: Option<String>,
    votes: HashMap<String, Vote>,
    saved_by: HashSet<String>,
    comments: Vec<Comment>,
}

impl StoredPost {
    fn total(&self) -> i64 {
        self.post.votes + self.votes.values().map(|v| i64::from(v.value())).sum::<i64>()
    }

    fn view(&self, viewer: Option<&str>) -> Post {
        Post {
            votes: self.total(),
            user_vote: viewer
                .and_then(|v| self.votes.get(v).copied())
                .unwrap_or_default(),
            saved: viewer.is_some_and(|v| self.saved_by.contains(v)),
            comment_count: self.comments.len() as i64,
            ..self.post.clone()
        }
    }
}

#[derive(Default)]
struct Inner {
    posts: BTreeMap<i64, StoredPost>,
    requests: Vec<CapturedRequest>,
    faults: Vec<Fault>,
    next_post_id: i64,
    next_comment_id: i64,
    next_user: u64,
}

#[derive(Clone, Default)]
pub struct MockStore {
    inner: Arc<Mutex<Inner>>,
}

impl MockStore {
    pub fn new() -> Self {
        let store = Self::default();
        {
            let mut inner = store.inner.try_lock().expect("fresh store");
            inner.next_post_id = 100;
        }
        store
    }

    /// Add a post whose score from other viewers is `votes`.
    pub async fn seed_post(&self, id: i64, votes: i64, cause: &str, severity: &str, title: &str) {
        let post = Post {
            id,
            votes,
            title: title.to_string(),
            product: "Checkout".to_string(),
            year: 2023,
            category: "payments".to_string(),
            cause: cause.to_string(),
            severity: severity.to_string(),
            tags: vec!["postmortem".to_string()],
            summary: format!("{title} summary"),
            created_at: Some("2024-03-01T10:00:00".to_string()),
            user_vote: Vote::Neutral,
            saved: false,
            comment_count: 0,
        };
        self.inner.lock().await.posts.insert(
            id,
            StoredPost {
                post,
                body: Some(format!("Full write-up of {title}")),
                votes: HashMap::new(),
                saved_by: HashSet::new(),
                comments: Vec::new(),
            },
        );
    }

    /// Record a vote as if `user` had cast it.
    pub async fn set_vote(&self, post_id: i64, user: &str, vote: Vote) {
        let mut inner = self.inner.lock().await;
        let stored = inner.posts.get_mut(&post_id).expect("seeded post");
        stored.votes.insert(user.to_string(), vote);
    }

    pub async fn set_saved(&self, post_id: i64, user: &str) {
        let mut inner = self.inner.lock().await;
        let stored = inner.posts.get_mut(&post_id).expect("seeded post");
        stored.saved_by.insert(user.to_string());
    }

    /// Server-side view of a post for `user`.
    pub async fn post_for(&self, post_id: i64, user: &str) -> Post {
        self.inner.lock().await.posts[&post_id].view(Some(user))
    }

    /// Fail the next request to `method path` with `status` and a
    /// `{"detail": ...}` body.
    pub async fn fail_next(&self, method: &str, path: &str, status: u16, detail: &str) {
        self.push_fault(Fault {
            method: method.to_string(),
            path: path.to_string(),
            status: Some(StatusCode::from_u16(status).expect("valid status")),
            body: json!({ "detail": detail }),
            delay_before: Duration::ZERO,
            delay_after: Duration::ZERO,
        })
        .await;
    }

    /// Fail the next request with an arbitrary JSON body.
    pub async fn fail_next_with(&self, method: &str, path: &str, status: u16, body: Value) {
        self.push_fault(Fault {
            method: method.to_string(),
            path: path.to_string(),
            status: Some(StatusCode::from_u16(status).expect("valid status")),
            body,
            delay_before: Duration::ZERO,
            delay_after: Duration::ZERO,
        })
        .await;
    }

    /// Hold the next request for `ms`, then fail it without applying it.
    pub async fn fail_next_after(&self, method: &str, path: &str, ms: u64, status: u16, detail: &str) {
        self.push_fault(Fault {
            method: method.to_string(),
            path: path.to_string(),
            status: Some(StatusCode::from_u16(status).expect("valid status")),
            body: json!({ "detail": detail }),
            delay_before: Duration::from_millis(ms),
            delay_after: Duration::ZERO,
        })
        .await;
    }

    /// Hold the next request before it reaches the handler.
    pub async fn delay_next_request(&self, method: &str, path: &str, ms: u64) {
        self.push_fault(Fault {
            method: method.to_string(),
            path: path.to_string(),
            status: None,
            body: Value::Null,
            delay_before: Duration::from_millis(ms),
            delay_after: Duration::ZERO,
        })
        .await;
    }

    /// Apply the next request immediately but hold its response.
    pub async fn delay_next_response(&self, method: &str, path: &str, ms: u64) {
        self.push_fault(Fault {
            method: method.to_string(),
            path: path.to_string(),
            status: None,
            body: Value::Null,
            delay_before: Duration::ZERO,
            delay_after: Duration::from_millis(ms),
        })
        .await;
    }

    async fn push_fault(&self, fault: Fault) {
        self.inner.lock().await.faults.push(fault);
    }

    pub async fn requests(&self) -> Vec<CapturedRequest> {
        self.inner.lock().await.requests.clone()
    }

    pub async fn requests_to(&self, method: &str, path: &str) -> Vec<CapturedRequest> {
        self.requests()
            .await
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }

    /// Serve on an ephemeral local port.
    pub async fn spawn(&self) -> SocketAddr {
        let app = Router::new()
            .route("/health", get(health))
            .route("/auth/anon", post(create_anon))
            .route("/posts", get(list_posts).post(create_post))
            .route("/posts/{id}", get(get_post))
            .route("/posts/{id}/vote", post(cast_vote))
            .route("/posts/{id}/save", post(save_post).delete(unsave_post))
            .route("/posts/{id}/comments", get(list_comments).post(add_comment))
            .route("/analytics/top-causes", get(top_causes))
            .route("/me/saved", get(saved_posts))
            .layer(middleware::from_fn_with_state(self.clone(), record))
            .with_state(self.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock store");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock store");
        });
        addr
    }
}

async fn record(State(store): State<MockStore>, req: Request, next: Next) -> Response {
    let (parts, body) = req.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("request body");

    let method = parts.method.to_string();
    let path = parts.uri.path().to_string();
    let fault = {
        let mut inner = store.inner.lock().await;
        inner.requests.push(CapturedRequest {
            method: method.clone(),
            path: path.clone(),
            query: parts.uri.query().map(str::to_string),
            user_id: parts
                .headers
                .get(USER_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            body: String::from_utf8_lossy(&bytes).into_owned(),
        });
        let index = inner
            .faults
            .iter()
            .position(|f| f.method == method && f.path == path);
        index.map(|i| inner.faults.remove(i))
    };

    if let Some(ref fault) = fault {
        tokio::time::sleep(fault.delay_before).await;
        if let Some(status) = fault.status {
            return (status, Json(fault.body.clone())).into_response();
        }
    }

    let response = next.run(Request::from_parts(parts, Body::from(bytes))).await;

    if let Some(fault) = fault {
        tokio::time::sleep(fault.delay_after).await;
    }
    response
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;

fn reject(status: StatusCode, detail: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "detail": detail })))
}

fn viewer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn require_viewer(headers: &HeaderMap) -> Result<String, (StatusCode, Json<Value>)> {
    viewer(headers).ok_or_else(|| reject(StatusCode::UNAUTHORIZED, "X-User-Id header required"))
}

async fn health() -> Json<Health> {
    Json(Health {
        status: "ok".to_string(),
    })
}

async fn create_anon(State(store): State<MockStore>) -> Json<AnonUser> {
    let mut inner = store.inner.lock().await;
    inner.next_user += 1;
    Json(AnonUser {
        user_id: format!("00000000-0000-4000-8000-{:012}", inner.next_user),
    })
}

#[derive(Deserialize)]
struct ListParams {
    q: Option<String>,
    cause: Option<String>,
    severity: Option<String>,
    sort: Option<String>,
}

async fn list_posts(
    State(store): State<MockStore>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Json<Listing<Post>> {
    let user = viewer(&headers);
    let inner = store.inner.lock().await;
    let needle = params.q.map(|q| q.to_lowercase());

    let mut items: Vec<Post> = inner
        .posts
        .values()
        .filter(|p| {
            needle.as_ref().map_or(true, |n| {
                p.post.title.to_lowercase().contains(n) || p.post.summary.to_lowercase().contains(n)
            })
        })
        .filter(|p| params.cause.as_ref().map_or(true, |c| &p.post.cause == c))
        .filter(|p| params.severity.as_ref().map_or(true, |s| &p.post.severity == s))
        .map(|p| p.view(user.as_deref()))
        .collect();

    match params.sort.as_deref() {
        Some("new") => items.sort_by(|a, b| b.id.cmp(&a.id)),
        _ => items.sort_by(|a, b| b.votes.cmp(&a.votes).then(a.id.cmp(&b.id))),
    }

    let total = items.len() as i64;
    Json(Listing { items, total })
}

async fn create_post(State(store): State<MockStore>, Json(input): Json<CreatePost>) -> Json<Post> {
    let mut inner = store.inner.lock().await;
    inner.next_post_id += 1;
    let id = inner.next_post_id;
    let post = Post {
        id,
        votes: 0,
        title: input.title,
        product: input.product,
        year: input.year,
        category: input.category,
        cause: input.cause,
        severity: input.severity,
        tags: input.tags.unwrap_or_default(),
        summary: input.summary,
        created_at: Some("2024-03-02T09:30:00".to_string()),
        user_vote: Vote::Neutral,
        saved: false,
        comment_count: 0,
    };
    inner.posts.insert(
        id,
        StoredPost {
            post: post.clone(),
            body: None,
            votes: HashMap::new(),
            saved_by: HashSet::new(),
            comments: Vec::new(),
        },
    );
    Json(post)
}

async fn get_post(
    State(store): State<MockStore>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<PostDetail> {
    let user = viewer(&headers);
    let inner = store.inner.lock().await;
    let stored = inner
        .posts
        .get(&id)
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, "Post not found"))?;
    Ok(Json(PostDetail {
        post: stored.view(user.as_deref()),
        body: stored.body.clone(),
        status: Some("published".to_string()),
    }))
}

async fn cast_vote(
    State(store): State<MockStore>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(payload): Json<CreateVote>,
) -> ApiResult<VoteResponse> {
    let user = require_viewer(&headers)?;
    let mut inner = store.inner.lock().await;
    let stored = inner
        .posts
        .get_mut(&id)
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, "Post not found"))?;

    match payload.value {
        Vote::Neutral => {
            stored.votes.remove(&user);
        }
        value => {
            stored.votes.insert(user.clone(), value);
        }
    }

    Ok(Json(VoteResponse {
        post_id: id,
        votes: stored.total(),
        user_vote: payload.value,
    }))
}

async fn save_post(
    State(store): State<MockStore>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<StatusCode, (StatusCode, Json<Value>)> {
    let user = require_viewer(&headers)?;
    let mut inner = store.inner.lock().await;
    let stored = inner
        .posts
        .get_mut(&id)
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, "Post not found"))?;
    stored.saved_by.insert(user);
    Ok(StatusCode::CREATED)
}

async fn unsave_post(
    State(store): State<MockStore>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<StatusCode, (StatusCode, Json<Value>)> {
    let user = require_viewer(&headers)?;
    let mut inner = store.inner.lock().await;
    let stored = inner
        .posts
        .get_mut(&id)
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, "Post not found"))?;
    stored.saved_by.remove(&user);
    Ok(StatusCode::NO_CONTENT)
}

async fn list_comments(
    State(store): State<MockStore>,
    Path(id): Path<i64>,
) -> ApiResult<CommentList> {
    let inner = store.inner.lock().await;
    let stored = inner
        .posts
        .get(&id)
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, "Post not found"))?;
    Ok(Json(CommentList {
        items: stored.comments.clone(),
    }))
}

async fn add_comment(
    State(store): State<MockStore>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(payload): Json<CreateComment>,
) -> ApiResult<Comment> {
    let user = require_viewer(&headers)?;
    if payload.content.trim().is_empty() {
        return Err(reject(StatusCode::UNPROCESSABLE_ENTITY, "Comment content required"));
    }

    let mut inner = store.inner.lock().await;
    inner.next_comment_id += 1;
    let comment_id = inner.next_comment_id;
    let stored = inner
        .posts
        .get_mut(&id)
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, "Post not found"))?;

    let comment = Comment {
        id: comment_id,
        post_id: id,
        user_id: user,
        content: payload.content,
        created_at: format!("2024-03-02T10:{:02}:00", comment_id % 60),
    };
    stored.comments.push(comment.clone());
    Ok(Json(comment))
}

async fn top_causes(State(store): State<MockStore>) -> Json<TopCauses> {
    let inner = store.inner.lock().await;
    let total = inner.posts.len() as i64;

    let mut counts: BTreeMap<String, i64> = BTreeMap::new();
    for stored in inner.posts.values() {
        *counts.entry(stored.post.cause.clone()).or_default() += 1;
    }
    let mut items: Vec<CauseAnalytics> = counts
        .into_iter()
        .map(|(cause, count)| CauseAnalytics {
            percent: if total == 0 { 0 } else { count * 100 / total },
            cause,
            count,
        })
        .collect();
    items.sort_by(|a, b| b.count.cmp(&a.count).then(a.cause.cmp(&b.cause)));
    items.truncate(4);

    Json(TopCauses { items, total })
}

async fn saved_posts(
    State(store): State<MockStore>,
    headers: HeaderMap,
) -> ApiResult<Listing<Post>> {
    let user = require_viewer(&headers)?;
    let inner = store.inner.lock().await;
    let items: Vec<Post> = inner
        .posts
        .values()
        .filter(|p| p.saved_by.contains(&user))
        .map(|p| p.view(Some(&user)))
        .collect();
    let total = items.len() as i64;
    Ok(Json(Listing { items, total }))
}
