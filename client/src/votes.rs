use atlas_shared::{Post, Vote, VoteResponse};
use tracing::{debug, warn};

use crate::error::Result;
use crate::optimistic::Resolution;
use crate::state::AppState;

/// Which arrow the viewer pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    fn vote(self) -> Vote {
        match self {
            Direction::Up => Vote::Up,
            Direction::Down => Vote::Down,
        }
    }
}

/// Pressing the active arrow again clears the vote; pressing the other one
/// jumps straight to it.
pub fn next_vote(current: Vote, pressed: Direction) -> Vote {
    let target = pressed.vote();
    if current == target {
        Vote::Neutral
    } else {
        target
    }
}

/// A post's score together with this viewer's part in it. The two always
/// move as one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub votes: i64,
    pub user_vote: Vote,
}

impl Tally {
    pub fn of(post: &Post) -> Self {
        Self {
            votes: post.votes,
            user_vote: post.user_vote,
        }
    }

    /// The tally after this viewer's vote becomes `target`.
    pub fn with_vote(self, target: Vote) -> Self {
        let delta = i64::from(target.value() - self.user_vote.value());
        Self {
            votes: self.votes + delta,
            user_vote: target,
        }
    }
}

impl From<&VoteResponse> for Tally {
    fn from(resp: &VoteResponse) -> Self {
        Self {
            votes: resp.votes,
            user_vote: resp.user_vote,
        }
    }
}

impl AppState {
    /// Cast or clear a vote on a mirrored post.
    ///
    /// The new tally is visible before the request is sent. The server's
    /// answer replaces it on success; on failure the previous tally comes
    /// back and the error is returned. Returns what is displayed once the
    /// response has been applied.
    pub async fn toggle_vote(&self, post_id: i64, pressed: Direction) -> Result<Tally> {
        let (token, target) = self.with_post(post_id, |view, tokens| {
            let shown = *view.tally.value();
            let target = next_vote(shown.user_vote, pressed);
            let token = tokens.next();
            view.tally.begin(shown.with_vote(target), token);
            (token, target)
        })?;

        let result = self.api().vote(post_id, target).await;

        let mut guard = self.mirror.lock();
        let mirror = &mut *guard;
        let Some(view) = mirror.posts.get_mut(&post_id) else {
            debug!(post_id, "post released before vote settled");
            return result.map(|resp| Tally::from(&resp));
        };

        match result {
            Ok(resp) => {
                if view.tally.confirm(token, Tally::from(&resp)) == Resolution::Stale {
                    debug!(post_id, ?token, "superseded vote response");
                }
                view.mark_synced(mirror.tokens.next());
                Ok(*view.tally.value())
            }
            Err(e) => {
                if view.tally.fail(token) == Resolution::RolledBack {
                    warn!(post_id, error = %e, "vote failed, rolled back");
                }
                Err(e)
            }
        }
    }
}
