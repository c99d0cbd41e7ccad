pub mod auth;
pub mod client;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use auth::TokenStore;
pub use client::YouTubeClient;

/// One page of a paged listing
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Opaque continuation token; `None` on the last page
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self { items, next_token: None }
    }

    pub fn with_next(items: Vec<T>, next_token: &str) -> Self {
        Self {
            items,
            next_token: Some(next_token.to_string()),
        }
    }
}

/// A playlist owned by the authorized user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistSummary {
    pub id: String,
    pub title: String,
}

/// A video as listed in the channel's uploads playlist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadItem {
    pub video_id: String,
    pub title: String,
    /// Fixed-width ISO-8601 UTC timestamp, e.g. `2024-05-01T21:00:12Z`
    pub published_at: String,
    pub position: Option<u32>,
}

/// Remote operations the sorter needs from the video platform.
///
/// Implementations must preserve the server's page order and surface
/// failures through the crate error taxonomy (`Auth`, `TransientApi`,
/// `NotFound`, `DataShape`).
#[async_trait]
pub trait YouTubeApi: Send + Sync {
    /// List the authorized user's playlists, one page at a time
    async fn list_my_playlists(
        &self,
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<Page<PlaylistSummary>>;

    /// List the items of a playlist, one page at a time
    async fn list_playlist_items(
        &self,
        playlist_id: &str,
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<Page<UploadItem>>;

    /// Resolve the id of a channel's uploads playlist
    async fn uploads_playlist_id(&self, channel_id: &str) -> Result<String>;

    /// Append a video to a playlist
    async fn insert_playlist_item(&self, playlist_id: &str, video_id: &str) -> Result<()>;
}
