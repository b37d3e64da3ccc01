use std::fmt;
use std::str::FromStr;

use atlas_shared::{Listing, Post};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ClientError, Result};
use crate::optimistic::Token;
use crate::state::AppState;

/// Filter value meaning "no filter".
pub const ALL: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sort {
    #[default]
    Hot,
    New,
    Top,
}

impl Sort {
    pub fn as_str(self) -> &'static str {
        match self {
            Sort::Hot => "hot",
            Sort::New => "new",
            Sort::Top => "top",
        }
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sort {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hot" => Ok(Sort::Hot),
            "new" => Ok(Sort::New),
            "top" => Ok(Sort::Top),
            other => Err(ClientError::Validation(format!(
                "unknown sort '{other}', expected hot, new or top"
            ))),
        }
    }
}

/// Search text, filters and ordering for the post list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedQuery {
    pub q: String,
    pub cause: String,
    pub severity: String,
    pub sort: Sort,
}

impl Default for FeedQuery {
    fn default() -> Self {
        Self {
            q: String::new(),
            cause: ALL.to_string(),
            severity: ALL.to_string(),
            sort: Sort::Hot,
        }
    }
}

impl FeedQuery {
    /// Query-string pairs. Empty search text and `all` filters are left out.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        let q = self.q.trim();
        if !q.is_empty() {
            params.push(("q", q.to_string()));
        }
        if is_filter(&self.cause) {
            params.push(("cause", self.cause.trim().to_string()));
        }
        if is_filter(&self.severity) {
            params.push(("severity", self.severity.trim().to_string()));
        }
        params.push(("sort", self.sort.as_str().to_string()));
        params
    }
}

fn is_filter(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && !value.eq_ignore_ascii_case(ALL)
}

/// One displayed list of posts.
#[derive(Debug, Clone, Default)]
pub(crate) struct ListState {
    ids: Vec<i64>,
    total: i64,
    loading: bool,
    error: Option<String>,
    /// Bumped by every load; a response only applies to its own generation.
    generation: u64,
}

impl ListState {
    fn start(&mut self) -> u64 {
        self.generation += 1;
        self.loading = true;
        self.generation
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    /// Outdate any load in flight, keeping what is shown.
    fn abandon(&mut self) {
        self.generation += 1;
        self.loading = false;
    }

    fn fail(&mut self, message: String) {
        self.ids.clear();
        self.total = 0;
        self.loading = false;
        self.error = Some(message);
    }

    fn fill(&mut self, ids: Vec<i64>, total: i64) {
        self.ids = ids;
        self.total = total;
        self.loading = false;
        self.error = None;
    }
}

#[derive(Debug, Default)]
pub(crate) struct FeedState {
    query: FeedQuery,
    feed: ListState,
    saved: ListState,
}

impl FeedState {
    pub(crate) fn prepend(&mut self, post_id: i64) {
        if !self.feed.ids.contains(&post_id) {
            self.feed.ids.insert(0, post_id);
            self.feed.total += 1;
        }
    }

    pub(crate) fn cancel_feed_load(&mut self) {
        self.feed.abandon();
    }

    /// Empty the saved list. A load still in flight will not refill it.
    pub(crate) fn clear_saved(&mut self) {
        self.saved = ListState {
            generation: self.saved.generation + 1,
            ..ListState::default()
        };
    }
}

/// A list as it should be shown: the posts with their current optimistic
/// values, or the error that replaced them.
#[derive(Debug, Clone)]
pub struct ListView {
    pub posts: Vec<Post>,
    pub total: i64,
    pub loading: bool,
    pub error: Option<String>,
}

impl AppState {
    pub fn query(&self) -> FeedQuery {
        self.feed.lock().query.clone()
    }

    /// Replace filters and ordering. Takes effect on the next load.
    pub fn set_query(&self, query: FeedQuery) {
        self.feed.lock().query = query;
    }

    /// Update the search text and reload once typing pauses. Each call
    /// cancels the reload scheduled by the previous one. Must be called
    /// from within a tokio runtime.
    pub fn search(&self, text: impl Into<String>) {
        self.feed.lock().query.q = text.into();
        let state = self.clone();
        self.search.schedule(async move {
            if let Err(e) = state.load_feed().await {
                debug!(error = %e, "search reload failed");
            }
        });
    }

    /// Load the post list for the current query. A load started later wins
    /// over one started earlier, whichever finishes first.
    pub async fn load_feed(&self) -> Result<ListView> {
        let (query, generation, read) = {
            let mut feed = self.feed.lock();
            let generation = feed.feed.start();
            let read = self.mirror.lock().read_token();
            (feed.query.clone(), generation, read)
        };

        let result = self.api().list_posts(&query).await;
        {
            let mut feed = self.feed.lock();
            self.apply_listing(&mut feed.feed, generation, read, &result);
        }

        result?;
        Ok(self.feed_view())
    }

    /// Load the viewer's saved posts. Same ordering rule as [`load_feed`].
    ///
    /// [`load_feed`]: AppState::load_feed
    pub async fn load_saved(&self) -> Result<ListView> {
        let (generation, read) = {
            let mut feed = self.feed.lock();
            let generation = feed.saved.start();
            (generation, self.mirror.lock().read_token())
        };

        let result = self.api().saved_posts().await;
        {
            let mut feed = self.feed.lock();
            self.apply_listing(&mut feed.saved, generation, read, &result);
        }

        result?;
        Ok(self.saved_view())
    }

    fn apply_listing(
        &self,
        list: &mut ListState,
        generation: u64,
        read: Token,
        result: &Result<Listing<Post>>,
    ) {
        if !list.is_current(generation) {
            debug!(generation, "dropping superseded list response");
            return;
        }
        match result {
            Ok(listing) => {
                let mut mirror = self.mirror.lock();
                for post in &listing.items {
                    mirror.upsert(post.clone(), read);
                }
                list.fill(listing.items.iter().map(|p| p.id).collect(), listing.total);
            }
            Err(e) => list.fail(e.to_string()),
        }
    }

    pub fn feed_view(&self) -> ListView {
        let feed = self.feed.lock();
        self.list_view(&feed.feed)
    }

    pub fn saved_view(&self) -> ListView {
        let feed = self.feed.lock();
        self.list_view(&feed.saved)
    }

    fn list_view(&self, list: &ListState) -> ListView {
        let mirror = self.mirror.lock();
        ListView {
            posts: list
                .ids
                .iter()
                .filter_map(|id| mirror.posts.get(id))
                .map(|view| view.snapshot())
                .collect(),
            total: list.total,
            loading: list.loading,
            error: list.error.clone(),
        }
    }
}
