use atlas_shared::{Comment, MAX_COMMENT_CHARS};
use tracing::{debug, warn};

use crate::error::{ClientError, Result};
use crate::state::AppState;

/// Trim `content` and check it fits before anything is sent.
pub fn validate_comment(content: &str) -> Result<&str> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ClientError::Validation("comment is empty".to_string()));
    }
    let chars = trimmed.chars().count();
    if chars > MAX_COMMENT_CHARS {
        return Err(ClientError::Validation(format!(
            "comment is {chars} characters, the limit is {MAX_COMMENT_CHARS}"
        )));
    }
    Ok(trimmed)
}

impl AppState {
    /// Fetch a post's comments. On failure the mirrored list is cleared and
    /// the error kept alongside it.
    pub async fn load_comments(&self, post_id: i64) -> Result<Vec<Comment>> {
        let result = self.api().list_comments(post_id).await;
        self.store_comments(post_id, &result);
        result
    }

    /// Post a comment, then reload the list from the store so ids, order
    /// and timestamps are the server's. The comment count only moves once
    /// the store has accepted the comment.
    pub async fn add_comment(&self, post_id: i64, content: &str) -> Result<Comment> {
        let content = validate_comment(content)?;
        let comment = self.api().add_comment(post_id, content).await?;
        debug!(post_id, comment_id = comment.id, "comment created");
        {
            let mut guard = self.mirror.lock();
            let mirror = &mut *guard;
            if let Some(view) = mirror.posts.get_mut(&post_id) {
                view.comment_count += 1;
                view.mark_synced(mirror.tokens.next());
            }
        }

        let refreshed = self.api().list_comments(post_id).await;
        if let Err(ref e) = refreshed {
            warn!(post_id, error = %e, "comment saved but reload failed");
        }
        self.store_comments(post_id, &refreshed);
        Ok(comment)
    }

    fn store_comments(&self, post_id: i64, result: &Result<Vec<Comment>>) {
        let mut mirror = self.mirror.lock();
        let Some(view) = mirror.posts.get_mut(&post_id) else {
            return;
        };
        match result {
            Ok(list) => {
                view.comments = Some(list.clone());
                view.comments_error = None;
            }
            Err(e) => {
                view.comments = Some(Vec::new());
                view.comments_error = Some(e.to_string());
            }
        }
    }
}
