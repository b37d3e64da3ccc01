use tracing::{debug, warn};

use crate::error::Result;
use crate::optimistic::Resolution;
use crate::state::AppState;

impl AppState {
    /// Flip the saved flag on a mirrored post.
    pub async fn toggle_save(&self, post_id: i64) -> Result<bool> {
        let target = self.with_post(post_id, |view, _| !*view.saved.value())?;
        self.set_saved(post_id, target).await
    }

    /// Save or unsave a mirrored post. Unsaving a post that is not saved
    /// still asks the store and leaves the flag `false` either way.
    pub async fn set_saved(&self, post_id: i64, saved: bool) -> Result<bool> {
        let token = self.with_post(post_id, |view, tokens| {
            let token = tokens.next();
            view.saved.begin(saved, token);
            token
        })?;

        let result = if saved {
            self.api().save(post_id).await
        } else {
            self.api().unsave(post_id).await
        };

        let mut guard = self.mirror.lock();
        let mirror = &mut *guard;
        let Some(view) = mirror.posts.get_mut(&post_id) else {
            debug!(post_id, "post released before save settled");
            return result.map(|()| saved);
        };

        match result {
            Ok(()) => {
                if view.saved.confirm(token, saved) == Resolution::Stale {
                    debug!(post_id, ?token, "superseded save response");
                }
                view.mark_synced(mirror.tokens.next());
                Ok(*view.saved.value())
            }
            Err(e) => {
                if view.saved.fail(token) == Resolution::RolledBack {
                    warn!(post_id, saved, error = %e, "save failed, rolled back");
                }
                Err(e)
            }
        }
    }
}
