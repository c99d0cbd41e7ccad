/// Live run: classify new uploads into playlists and advance the watermark
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::classifier::classify;
use crate::error::{Result, SorterError};
use crate::pagination::fetch_all;
use crate::playlist_index::PlaylistIndex;
use crate::rules::RuleSet;
use crate::state::{RunState, StateStore};
use crate::youtube::{UploadItem, YouTubeApi};

/// Settings for one live run
#[derive(Debug, Clone)]
pub struct SortOptions {
    pub channel_id: String,
    pub page_size: u32,
    pub uploads_page_size: u32,
    pub prefer_exact_title: bool,
    pub sort_index_by_title: bool,
    /// Classify and report only; no inserts, no state save
    pub dry_run: bool,
}

/// What happened to one new video
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum VideoOutcome {
    Added { playlist_id: String, keyword: String },
    WouldAdd { playlist_id: String, keyword: String },
    NoMatch,
    Failed { playlist_id: String, error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct VideoReport {
    pub video_id: String,
    pub title: String,
    pub published_at: String,
    pub outcome: VideoOutcome,
}

/// Summary of a live run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    pub playlists_indexed: usize,
    pub fetched: usize,
    pub new_videos: usize,
    pub added: usize,
    pub skipped_no_match: usize,
    pub failed: usize,
    pub dry_run: bool,
    pub watermark_before: String,
    pub watermark_after: String,
    /// Set when an auth or transient insert failure stopped the run early
    pub aborted: Option<String>,
    pub videos: Vec<VideoReport>,
}

impl RunReport {
    pub fn watermark_advanced(&self) -> bool {
        self.watermark_after > self.watermark_before
    }
}

/// One-shot sorter over an API implementation
pub struct PlaylistSorter<'a> {
    api: &'a dyn YouTubeApi,
    rules: &'a RuleSet,
    state: &'a StateStore,
    options: SortOptions,
}

impl<'a> PlaylistSorter<'a> {
    pub fn new(
        api: &'a dyn YouTubeApi,
        rules: &'a RuleSet,
        state: &'a StateStore,
        options: SortOptions,
    ) -> Self {
        Self {
            api,
            rules,
            state,
            options,
        }
    }

    /// Execute one run.
    ///
    /// Listing failures for the uploads playlist abort the run before any
    /// mutation and leave the watermark untouched. A failed insert only
    /// affects its own video unless it is an auth or transient failure,
    /// which stops the remaining inserts. Either way the watermark stays
    /// below the timestamp of the first failure so it is retried next run.
    pub async fn run(&self) -> Result<RunReport> {
        let started_at = Utc::now();
        let start_time = Instant::now();
        let initial = self.state.load()?;
        info!("🚀 Sorting uploads newer than {}", initial.last_published_at);

        info!("📋 Fetching your playlists to match keywords...");
        let index = PlaylistIndex::build(
            self.api,
            self.options.page_size,
            self.options.sort_index_by_title,
        )
        .await;

        let uploads_id = self.api.uploads_playlist_id(&self.options.channel_id).await?;
        debug!("Uploads playlist for {}: {}", self.options.channel_id, uploads_id);

        let api = self.api;
        let playlist_id = uploads_id.as_str();
        let uploads = fetch_all(self.options.uploads_page_size, |token, size| async move {
            api.list_playlist_items(playlist_id, token.as_deref(), size).await
        })
        .await?;
        let fetched = uploads.len();

        let new_videos = select_new_videos(uploads, &initial);
        let mut report = RunReport {
            started_at,
            duration: Duration::default(),
            playlists_indexed: index.len(),
            fetched,
            new_videos: new_videos.len(),
            added: 0,
            skipped_no_match: 0,
            failed: 0,
            dry_run: self.options.dry_run,
            watermark_before: initial.last_published_at.clone(),
            watermark_after: initial.last_published_at.clone(),
            aborted: None,
            videos: Vec::new(),
        };

        if new_videos.is_empty() {
            info!("📭 No new videos found");
            report.duration = start_time.elapsed();
            return Ok(report);
        }
        info!("📹 Found {} new videos out of {} uploads", new_videos.len(), fetched);

        if index.is_empty() {
            warn!("⚠️ No destination playlists available this run; leaving watermark unchanged");
            report.skipped_no_match = new_videos.len();
            report.videos = new_videos
                .into_iter()
                .map(|video| VideoReport {
                    video_id: video.video_id,
                    title: video.title,
                    published_at: video.published_at,
                    outcome: VideoOutcome::NoMatch,
                })
                .collect();
            report.duration = start_time.elapsed();
            return Ok(report);
        }

        for video in new_videos {
            info!("🎬 Processing: {}", video.title);
            let classification =
                classify(&video.title, self.rules, &index, self.options.prefer_exact_title);

            let mut abort = None;
            let outcome = match (classification.destination, classification.keyword) {
                (Some(playlist_id), Some(keyword)) if self.options.dry_run => {
                    info!(" -> Would add to {} (rule '{}')", playlist_id, keyword);
                    VideoOutcome::WouldAdd { playlist_id, keyword }
                }
                (Some(playlist_id), Some(keyword)) => {
                    match self.api.insert_playlist_item(&playlist_id, &video.video_id).await {
                        Ok(()) => {
                            info!(" -> ✅ Added to {} (rule '{}')", playlist_id, keyword);
                            VideoOutcome::Added { playlist_id, keyword }
                        }
                        Err(e) => {
                            error!(
                                "Error adding video {} to playlist {}: {}",
                                video.video_id, playlist_id, e
                            );
                            if aborts_run(&e) {
                                abort = Some(e.to_string());
                            }
                            VideoOutcome::Failed {
                                playlist_id,
                                error: e.to_string(),
                            }
                        }
                    }
                }
                _ => {
                    info!(" -> No matching rules or playlist found for this video");
                    VideoOutcome::NoMatch
                }
            };

            match &outcome {
                VideoOutcome::Added { .. } | VideoOutcome::WouldAdd { .. } => report.added += 1,
                VideoOutcome::NoMatch => report.skipped_no_match += 1,
                VideoOutcome::Failed { .. } => report.failed += 1,
            }

            report.videos.push(VideoReport {
                video_id: video.video_id,
                title: video.title,
                published_at: video.published_at,
                outcome,
            });

            if let Some(reason) = abort {
                warn!("⚠️ Stopping inserts for this run: {}", reason);
                report.aborted = Some(reason);
                break;
            }
        }

        let watermark = considered_watermark(&initial, &report.videos);
        report.watermark_after = watermark.last_published_at.clone();

        if self.options.dry_run {
            info!("🧪 Dry run: watermark would move to {}", watermark.last_published_at);
            report.watermark_after = initial.last_published_at.clone();
        } else if watermark != initial {
            self.state.save_monotonic(&watermark)?;
        }

        report.duration = start_time.elapsed();
        info!(
            "🎉 Update complete: {} added, {} unmatched, {} failed. Last processed timestamp: {}",
            report.added, report.skipped_no_match, report.failed, report.watermark_after
        );

        Ok(report)
    }
}

/// Insert failures after which further inserts in this run are pointless
fn aborts_run(error: &SorterError) -> bool {
    matches!(error, SorterError::Auth(_)) || error.is_transient()
}

/// Watermark after a run: the newest timestamp all of whose videos were
/// considered without a failed insert. Videos sharing the timestamp of the
/// first failure stay behind it so the failure is retried next run.
pub fn considered_watermark(initial: &RunState, videos: &[VideoReport]) -> RunState {
    let blocked_at = videos
        .iter()
        .find(|v| matches!(v.outcome, VideoOutcome::Failed { .. }))
        .map(|v| v.published_at.as_str());

    let mut watermark = initial.clone();
    for video in videos {
        if blocked_at.map_or(true, |blocked| video.published_at.as_str() < blocked) {
            watermark.advance(&video.published_at);
        }
    }
    watermark
}

/// Videos newer than the watermark, oldest first
pub fn select_new_videos(uploads: Vec<UploadItem>, state: &RunState) -> Vec<UploadItem> {
    let mut new_videos: Vec<UploadItem> = uploads
        .into_iter()
        .filter(|item| state.is_new(&item.published_at))
        .collect();
    new_videos.sort_by(|a, b| a.published_at.cmp(&b.published_at));
    new_videos
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(id: &str, published_at: &str) -> UploadItem {
        UploadItem {
            video_id: id.to_string(),
            title: format!("video {}", id),
            published_at: published_at.to_string(),
            position: None,
        }
    }

    #[test]
    fn test_select_new_videos_filters_and_sorts() {
        let state = RunState::new("2024-01-01T00:00:00Z");
        let uploads = vec![
            upload("c", "2024-01-03T00:00:00Z"),
            upload("old", "2023-12-31T00:00:00Z"),
            upload("a", "2024-01-02T00:00:00Z"),
            upload("same", "2024-01-01T00:00:00Z"),
        ];

        let ids: Vec<_> = select_new_videos(uploads, &state)
            .into_iter()
            .map(|v| v.video_id)
            .collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    fn considered(id: &str, published_at: &str, failed: bool) -> VideoReport {
        let outcome = if failed {
            VideoOutcome::Failed {
                playlist_id: "PL".to_string(),
                error: "503".to_string(),
            }
        } else {
            VideoOutcome::NoMatch
        };
        VideoReport {
            video_id: id.to_string(),
            title: id.to_string(),
            published_at: published_at.to_string(),
            outcome,
        }
    }

    #[test]
    fn test_watermark_stays_below_shared_failed_timestamp() {
        let initial = RunState::new("2024-01-01T00:00:00Z");
        let videos = vec![
            considered("a", "2024-05-01T05:00:00Z", false),
            considered("b", "2024-05-02T05:00:00Z", false),
            considered("c", "2024-05-02T05:00:00Z", true),
            considered("d", "2024-05-03T05:00:00Z", false),
        ];

        let watermark = considered_watermark(&initial, &videos);
        assert_eq!(watermark.last_published_at, "2024-05-01T05:00:00Z");

        let all_ok: Vec<_> = videos
            .into_iter()
            .map(|mut v| {
                v.outcome = VideoOutcome::NoMatch;
                v
            })
            .collect();
        assert_eq!(
            considered_watermark(&initial, &all_ok).last_published_at,
            "2024-05-03T05:00:00Z"
        );
    }

    #[test]
    fn test_auth_and_transient_insert_failures_abort() {
        assert!(aborts_run(&SorterError::Auth("401".into())));
        assert!(aborts_run(&SorterError::TransientApi("quotaExceeded".into())));
        assert!(!aborts_run(&SorterError::DataShape("400".into())));
        assert!(!aborts_run(&SorterError::NotFound("playlist".into())));
    }
}
