/// Church Playlist Sorter - Rust Implementation
///
/// Sorts a channel's newly uploaded videos into the owner's playlists by
/// keyword rules, and partitions pre-fetched channel metadata into CSV
/// files by title category, playlist membership or keyword group.

pub mod batch;
pub mod classifier;
pub mod config;
pub mod error;
pub mod pagination;
pub mod playlist_index;
pub mod rules;
pub mod sorter;
pub mod state;
pub mod youtube;

// Re-export main types for easy access
pub use crate::batch::{BatchOutcome, CategoryExtractor, PartitionReport};
pub use crate::classifier::{classify, Classification};
pub use crate::config::{Config, ConfigBuilder};
pub use crate::error::{Result, SorterError};
pub use crate::pagination::fetch_all;
pub use crate::playlist_index::{PlaylistIndex, ResolveOptions};
pub use crate::rules::{Rule, RuleSet};
pub use crate::sorter::{PlaylistSorter, RunReport, SortOptions, VideoOutcome};
pub use crate::state::{RunState, StateStore};
pub use crate::youtube::{Page, PlaylistSummary, UploadItem, YouTubeApi, YouTubeClient};
