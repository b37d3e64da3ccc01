use std::collections::HashMap;
use std::sync::Arc;

use atlas_shared::{Comment, CreatePost, Post, Vote};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::api::ApiClient;
use crate::config::ClientConfig;
use crate::debounce::Debouncer;
use crate::error::{ClientError, Result};
use crate::feed::FeedState;
use crate::identity::Identity;
use crate::optimistic::{Optimistic, Token, TokenSource};
use crate::votes::Tally;

/// Local view of one post: the server's descriptive fields plus the
/// viewer-facing fields that change optimistically.
#[derive(Debug, Clone)]
pub struct PostView {
    pub post: Post,
    pub tally: Optimistic<Tally>,
    pub saved: Optimistic<bool>,
    pub comment_count: i64,
    pub body: Option<String>,
    pub status: Option<String>,
    /// `None` until comments are first loaded.
    pub comments: Option<Vec<Comment>>,
    pub comments_error: Option<String>,
    /// Token current when the last server answer for this post was applied.
    synced: Token,
}

impl PostView {
    fn new(post: Post, read: Token) -> Self {
        Self {
            synced: read,
            tally: Optimistic::settled(Tally::of(&post)),
            saved: Optimistic::settled(post.saved),
            comment_count: post.comment_count,
            post,
            body: None,
            status: None,
            comments: None,
            comments_error: None,
        }
    }

    /// Apply a snapshot read while `read` was the newest token. A snapshot
    /// requested before the last applied answer only updates the
    /// descriptive fields.
    fn refresh(&mut self, post: Post, read: Token) {
        if read < self.synced {
            debug!(post_id = post.id, ?read, synced = ?self.synced, "stale read, keeping viewer fields");
            self.post = post;
            return;
        }
        self.tally.rebase(Tally::of(&post));
        self.saved.rebase(post.saved);
        self.comment_count = post.comment_count;
        self.post = post;
        self.synced = read;
    }

    /// Record that a server answer was applied at `at`. Reads issued
    /// earlier can no longer overwrite the viewer fields.
    pub(crate) fn mark_synced(&mut self, at: Token) {
        self.synced = self.synced.max(at);
    }

    /// The post as the viewer should currently see it.
    pub fn snapshot(&self) -> Post {
        let tally = *self.tally.value();
        Post {
            votes: tally.votes,
            user_vote: tally.user_vote,
            saved: *self.saved.value(),
            comment_count: self.comment_count,
            ..self.post.clone()
        }
    }
}

/// Every post the client currently mirrors, and the token source that
/// orders mutations across all of them.
#[derive(Debug, Default)]
pub(crate) struct Mirror {
    pub(crate) posts: HashMap<i64, PostView>,
    pub(crate) tokens: TokenSource,
}

impl Mirror {
    /// Token for a read about to be sent.
    pub(crate) fn read_token(&mut self) -> Token {
        self.tokens.next()
    }

    /// Merge a post read at `read` into the mirror.
    pub(crate) fn upsert(&mut self, post: Post, read: Token) {
        match self.posts.get_mut(&post.id) {
            Some(view) => view.refresh(post, read),
            None => {
                self.posts.insert(post.id, PostView::new(post, read));
            }
        }
    }

    /// Forget viewer-scoped state and ignore responses already in flight,
    /// reads included.
    fn reset_viewer(&mut self) {
        let fence = self.tokens.last();
        let cutoff = self.tokens.next();
        for view in self.posts.values_mut() {
            let neutral = Tally {
                votes: view.tally.confirmed().votes,
                user_vote: Vote::Neutral,
            };
            view.tally.reset(neutral, fence);
            view.saved.reset(false, fence);
            view.mark_synced(cutoff);
        }
    }
}

/// Application context handed to every handler. Cheap to clone; clones
/// share state.
#[derive(Clone)]
pub struct AppState {
    api: ApiClient,
    pub(crate) mirror: Arc<Mutex<Mirror>>,
    pub(crate) feed: Arc<Mutex<FeedState>>,
    pub(crate) search: Debouncer,
}

impl AppState {
    pub fn new(config: &ClientConfig, identity: Identity) -> Result<Self> {
        Ok(Self {
            api: ApiClient::new(config, identity)?,
            mirror: Arc::new(Mutex::new(Mirror::default())),
            feed: Arc::new(Mutex::new(FeedState::default())),
            search: Debouncer::new(config.search_debounce()),
        })
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Start mirroring `post`, or refresh the mirror from it.
    pub fn track_post(&self, post: Post) {
        let mut mirror = self.mirror.lock();
        let read = mirror.read_token();
        mirror.upsert(post, read);
    }

    /// Stop mirroring a post. Responses still in flight for it are dropped.
    pub fn release_post(&self, post_id: i64) {
        if self.mirror.lock().posts.remove(&post_id).is_some() {
            debug!(post_id, "released post view");
        }
    }

    pub fn post(&self, post_id: i64) -> Option<Post> {
        self.mirror.lock().posts.get(&post_id).map(PostView::snapshot)
    }

    pub fn post_view(&self, post_id: i64) -> Option<PostView> {
        self.mirror.lock().posts.get(&post_id).cloned()
    }

    /// Fetch the full post and start mirroring it.
    pub async fn open_post(&self, post_id: i64) -> Result<PostView> {
        let read = self.mirror.lock().read_token();
        let detail = self.api.get_post(post_id).await?;
        let mut mirror = self.mirror.lock();
        mirror.upsert(detail.post, read);
        let view = mirror
            .posts
            .get_mut(&post_id)
            .ok_or_else(|| ClientError::NotFound(format!("post {post_id}")))?;
        view.body = detail.body;
        view.status = detail.status;
        Ok(view.clone())
    }

    pub async fn create_post(&self, input: CreatePost) -> Result<Post> {
        validate_post(&input)?;
        let post = self.api.create_post(&input).await?;
        info!(post_id = post.id, "created post");
        self.track_post(post.clone());
        self.feed.lock().prepend(post.id);
        Ok(post)
    }

    /// Delete the viewer id and reset every viewer-scoped field.
    pub fn sign_out(&self) -> Result<()> {
        self.api.identity().forget()?;
        self.search.cancel();
        {
            let mut feed = self.feed.lock();
            feed.cancel_feed_load();
            feed.clear_saved();
        }
        self.mirror.lock().reset_viewer();
        info!("signed out");
        Ok(())
    }

    /// Run `f` against a mirrored post.
    pub(crate) fn with_post<R>(
        &self,
        post_id: i64,
        f: impl FnOnce(&mut PostView, &mut TokenSource) -> R,
    ) -> Result<R> {
        let mut guard = self.mirror.lock();
        let mirror = &mut *guard;
        let view = mirror
            .posts
            .get_mut(&post_id)
            .ok_or_else(|| ClientError::Validation(format!("post {post_id} is not loaded")))?;
        Ok(f(view, &mut mirror.tokens))
    }
}

const POST_YEARS: std::ops::RangeInclusive<i32> = 1900..=2100;

fn validate_post(input: &CreatePost) -> Result<()> {
    let required = [
        ("title", &input.title),
        ("product", &input.product),
        ("category", &input.category),
        ("cause", &input.cause),
        ("severity", &input.severity),
        ("summary", &input.summary),
    ];
    let missing: Vec<&str> = required
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();
    if !missing.is_empty() {
        return Err(ClientError::Validation(format!(
            "missing required fields: {}",
            missing.join(", ")
        )));
    }
    if !POST_YEARS.contains(&input.year) {
        return Err(ClientError::Validation(format!(
            "year {} is outside {}..={}",
            input.year,
            POST_YEARS.start(),
            POST_YEARS.end()
        )));
    }
    Ok(())
}
