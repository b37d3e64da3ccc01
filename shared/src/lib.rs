use std::fmt;

use serde::{Deserialize, Serialize};

/// Longest comment the backend accepts, in characters.
pub const MAX_COMMENT_CHARS: usize = 2000;

// ── Identity ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnonUser {
    pub user_id: String,
}

// ── Votes ──

/// A viewer's vote on a post. Only -1, 0 and 1 exist on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum Vote {
    Down,
    #[default]
    Neutral,
    Up,
}

impl Vote {
    pub fn value(self) -> i32 {
        match self {
            Vote::Down => -1,
            Vote::Neutral => 0,
            Vote::Up => 1,
        }
    }
}

impl From<Vote> for i32 {
    fn from(vote: Vote) -> Self {
        vote.value()
    }
}

impl TryFrom<i32> for Vote {
    type Error = InvalidVote;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Vote::Down),
            0 => Ok(Vote::Neutral),
            1 => Ok(Vote::Up),
            other => Err(InvalidVote(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidVote(pub i32);

impl fmt::Display for InvalidVote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vote value must be -1, 0 or 1, got {}", self.0)
    }
}

impl std::error::Error for InvalidVote {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateVote {
    pub value: Vote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteResponse {
    pub post_id: i64,
    pub votes: i64,
    pub user_vote: Vote,
}

// ── Posts ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub votes: i64,
    pub title: String,
    pub product: String,
    pub year: i32,
    pub category: String,
    pub cause: String,
    pub severity: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub summary: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub user_vote: Vote,
    #[serde(default)]
    pub saved: bool,
    #[serde(default)]
    pub comment_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDetail {
    #[serde(flatten)]
    pub post: Post,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePost {
    pub title: String,
    pub product: String,
    pub year: i32,
    pub category: String,
    pub cause: String,
    pub severity: String,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing<T> {
    pub items: Vec<T>,
    pub total: i64,
}

// ── Comments ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub user_id: String,
    pub content: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateComment {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentList {
    #[serde(default)]
    pub items: Vec<Comment>,
}

// ── Analytics ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CauseAnalytics {
    pub cause: String,
    pub count: i64,
    pub percent: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopCauses {
    pub items: Vec<CauseAnalytics>,
    pub total: i64,
}

// ── Health ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
}
