//! Live index of the user's playlists, used to resolve rule keywords to
//! destination playlist ids.
//!
//! Iteration order is the order the listing API returned the playlists in
//! (page by page), unless `sort_by_title` is requested. Keyword resolution
//! takes the first hit in that order, so the order is part of the contract.

use tracing::{info, warn};

use crate::pagination::fetch_all;
use crate::rules::contains;
use crate::youtube::{PlaylistSummary, YouTubeApi};

/// How keywords are resolved against playlist titles
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
    pub case_sensitive: bool,
    /// An exact title match wins over earlier substring hits
    pub prefer_exact_title: bool,
}

/// Ordered title -> id mapping, rebuilt on every run
#[derive(Debug, Clone, Default)]
pub struct PlaylistIndex {
    entries: Vec<PlaylistSummary>,
}

impl PlaylistIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from already-fetched playlists, keeping their order
    pub fn from_playlists(playlists: Vec<PlaylistSummary>) -> Self {
        Self { entries: playlists }
    }

    /// Build from `(title, id)` pairs, keeping their order
    pub fn from_pairs<I, T, U>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (T, U)>,
        T: Into<String>,
        U: Into<String>,
    {
        let entries = pairs
            .into_iter()
            .map(|(title, id)| PlaylistSummary {
                title: title.into(),
                id: id.into(),
            })
            .collect();
        Self { entries }
    }

    /// List every playlist of the authorized user.
    ///
    /// Never fails: on any API error the index is empty and callers treat
    /// that as "no destinations available this run".
    pub async fn build(api: &dyn YouTubeApi, page_size: u32, sort_by_title: bool) -> Self {
        let result = fetch_all(page_size, |token, size| async move {
            api.list_my_playlists(token.as_deref(), size).await
        })
        .await;

        match result {
            Ok(playlists) => {
                let mut index = Self::from_playlists(playlists);
                if sort_by_title {
                    index.entries.sort_by(|a, b| a.title.cmp(&b.title));
                }
                info!("📋 Indexed {} playlists", index.len());
                index
            }
            Err(e) => {
                warn!("Failed to list playlists, continuing with no destinations: {}", e);
                Self::new()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlaylistSummary> {
        self.entries.iter()
    }

    /// Id of the first playlist with exactly this title
    pub fn get(&self, title: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|p| p.title == title)
            .map(|p| p.id.as_str())
    }

    /// Destination playlist for a keyword, or `None` if no title contains it
    pub fn resolve(&self, keyword: &str, options: ResolveOptions) -> Option<&str> {
        if options.prefer_exact_title {
            let exact = self.entries.iter().find(|p| {
                if options.case_sensitive {
                    p.title == keyword
                } else {
                    p.title.to_lowercase() == keyword.to_lowercase()
                }
            });
            if let Some(playlist) = exact {
                return Some(playlist.id.as_str());
            }
        }

        self.entries
            .iter()
            .find(|p| contains(&p.title, keyword, options.case_sensitive))
            .map(|p| p.id.as_str())
    }
}
