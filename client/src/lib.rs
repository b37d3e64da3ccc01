//! Client for the Failure Atlas store: HTTP access, viewer identity and an
//! optimistic mirror of post state for votes, saves and comments.

pub mod api;
pub mod comments;
pub mod config;
pub mod debounce;
pub mod error;
pub mod feed;
pub mod identity;
pub mod optimistic;
mod saves;
pub mod state;
pub mod votes;

pub use api::ApiClient;
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use feed::{FeedQuery, ListView, Sort};
pub use identity::{FileStore, Identity, IdentityStore, MemoryStore};
pub use state::{AppState, PostView};
pub use votes::{Direction, Tally};
