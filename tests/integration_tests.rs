use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tempfile::TempDir;

use playlist_sorter::error::{Result, SorterError};
use playlist_sorter::rules::RuleSet;
use playlist_sorter::sorter::{PlaylistSorter, SortOptions, VideoOutcome};
use playlist_sorter::state::{RunState, StateStore, EPOCH_TIMESTAMP};
use playlist_sorter::youtube::{Page, PlaylistSummary, UploadItem, YouTubeApi};
use playlist_sorter::{fetch_all, PlaylistIndex, ResolveOptions};

const CHANNEL: &str = "UC_church";
const UPLOADS: &str = "UU_church";

/// In-memory platform: pages are served by offset tokens, errors are injected
#[derive(Default)]
struct MockYouTubeApi {
    playlists: Vec<PlaylistSummary>,
    playlists_quota_exceeded: bool,
    uploads: Vec<UploadItem>,
    uploads_error: Option<String>,
    channels: HashMap<String, String>,
    failing_videos: HashMap<String, fn() -> SorterError>,
    inserted: Mutex<Vec<(String, String)>>,
    page_calls: Mutex<usize>,
}

impl MockYouTubeApi {
    fn new() -> Self {
        let mut channels = HashMap::new();
        channels.insert(CHANNEL.to_string(), UPLOADS.to_string());
        Self {
            channels,
            ..Default::default()
        }
    }

    fn with_playlists(mut self, playlists: &[(&str, &str)]) -> Self {
        self.playlists = playlists
            .iter()
            .map(|(id, title)| PlaylistSummary {
                id: id.to_string(),
                title: title.to_string(),
            })
            .collect();
        self
    }

    fn with_uploads(mut self, uploads: Vec<UploadItem>) -> Self {
        self.uploads = uploads;
        self
    }

    fn failing_on(mut self, video_id: &str, error: fn() -> SorterError) -> Self {
        self.failing_videos.insert(video_id.to_string(), error);
        self
    }

    fn inserted(&self) -> Vec<(String, String)> {
        self.inserted.lock().unwrap().clone()
    }

    fn page<T: Clone>(&self, all: &[T], token: Option<&str>, size: u32) -> Result<Page<T>> {
        *self.page_calls.lock().unwrap() += 1;

        let start = match token {
            None => 0,
            Some(t) => t
                .strip_prefix("offset-")
                .and_then(|n| n.parse::<usize>().ok())
                .ok_or_else(|| SorterError::DataShape(format!("unknown page token {}", t)))?,
        };
        let end = (start + size as usize).min(all.len());
        let items = all[start.min(end)..end].to_vec();

        if end < all.len() {
            Ok(Page::with_next(items, &format!("offset-{}", end)))
        } else {
            Ok(Page::last(items))
        }
    }
}

#[async_trait]
impl YouTubeApi for MockYouTubeApi {
    async fn list_my_playlists(
        &self,
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<Page<PlaylistSummary>> {
        if self.playlists_quota_exceeded {
            return Err(SorterError::TransientApi(
                "403 quotaExceeded: daily quota used up".to_string(),
            ));
        }
        self.page(&self.playlists, page_token, page_size)
    }

    async fn list_playlist_items(
        &self,
        playlist_id: &str,
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<Page<UploadItem>> {
        if let Some(message) = &self.uploads_error {
            return Err(SorterError::TransientApi(message.clone()));
        }
        if playlist_id != UPLOADS {
            return Err(SorterError::NotFound(format!("playlist {}", playlist_id)));
        }
        self.page(&self.uploads, page_token, page_size)
    }

    async fn uploads_playlist_id(&self, channel_id: &str) -> Result<String> {
        self.channels
            .get(channel_id)
            .cloned()
            .ok_or_else(|| SorterError::NotFound(format!("Channel not found: {}", channel_id)))
    }

    async fn insert_playlist_item(&self, playlist_id: &str, video_id: &str) -> Result<()> {
        if let Some(error) = self.failing_videos.get(video_id) {
            return Err(error());
        }
        self.inserted
            .lock()
            .unwrap()
            .push((playlist_id.to_string(), video_id.to_string()));
        Ok(())
    }
}

fn upload(id: &str, title: &str, published_at: &str) -> UploadItem {
    UploadItem {
        video_id: id.to_string(),
        title: title.to_string(),
        published_at: published_at.to_string(),
        position: None,
    }
}

fn video_unavailable() -> SorterError {
    SorterError::DataShape("400 video unavailable".to_string())
}

fn backend_error() -> SorterError {
    SorterError::TransientApi("503 backend error".to_string())
}

fn options() -> SortOptions {
    SortOptions {
        channel_id: CHANNEL.to_string(),
        page_size: 50,
        uploads_page_size: 50,
        prefer_exact_title: false,
        sort_index_by_title: false,
        dry_run: false,
    }
}

fn church_rules() -> RuleSet {
    RuleSet::from_keywords(["새벽예배", "주일예배", "수요예배"], true)
}

fn church_playlists() -> MockYouTubeApi {
    MockYouTubeApi::new().with_playlists(&[
        ("PL_dawn", "2024 새벽예배"),
        ("PL_sunday", "주일예배 모음"),
        ("PL_wed", "수요예배"),
    ])
}

fn store_in(temp_dir: &TempDir) -> StateStore {
    StateStore::new(temp_dir.path().join("state.json"))
}

#[tokio::test]
async fn test_only_videos_after_watermark_are_processed() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_in(&temp_dir);
    store.save(&RunState::new("2024-01-01T00:00:00Z")).unwrap();

    let api = church_playlists().with_uploads(vec![
        upload("V1", "새벽예배 1월 2일", "2024-01-02T05:00:00Z"),
        upload("V0", "새벽예배 12월 31일", "2023-12-31T05:00:00Z"),
    ]);
    let rules = church_rules();

    let report = PlaylistSorter::new(&api, &rules, &store, options())
        .run()
        .await
        .unwrap();

    assert_eq!(report.fetched, 2);
    assert_eq!(report.new_videos, 1);
    assert_eq!(report.added, 1);
    assert_eq!(api.inserted(), vec![("PL_dawn".to_string(), "V1".to_string())]);
    assert_eq!(store.load().unwrap().last_published_at, "2024-01-02T05:00:00Z");
    assert!(report.watermark_advanced());
}

#[tokio::test]
async fn test_new_videos_are_processed_oldest_first() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_in(&temp_dir);

    let api = church_playlists().with_uploads(vec![
        upload("V3", "수요예배", "2024-03-06T19:00:00Z"),
        upload("V2", "주일예배 2부", "2024-03-03T11:00:00Z"),
        upload("V1", "새벽예배", "2024-03-01T05:00:00Z"),
    ]);
    let rules = church_rules();

    let report = PlaylistSorter::new(&api, &rules, &store, options())
        .run()
        .await
        .unwrap();

    let ids: Vec<_> = report.videos.iter().map(|v| v.video_id.as_str()).collect();
    assert_eq!(ids, vec!["V1", "V2", "V3"]);
    assert_eq!(
        api.inserted(),
        vec![
            ("PL_dawn".to_string(), "V1".to_string()),
            ("PL_sunday".to_string(), "V2".to_string()),
            ("PL_wed".to_string(), "V3".to_string()),
        ]
    );
    assert_eq!(report.watermark_before, EPOCH_TIMESTAMP);
    assert_eq!(store.load().unwrap().last_published_at, "2024-03-06T19:00:00Z");
}

#[tokio::test]
async fn test_second_run_adds_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_in(&temp_dir);
    let api = church_playlists().with_uploads(vec![upload(
        "V1",
        "주일예배",
        "2024-03-03T11:00:00Z",
    )]);
    let rules = church_rules();

    let first = PlaylistSorter::new(&api, &rules, &store, options())
        .run()
        .await
        .unwrap();
    let second = PlaylistSorter::new(&api, &rules, &store, options())
        .run()
        .await
        .unwrap();

    assert_eq!(first.added, 1);
    assert_eq!(second.new_videos, 0);
    assert_eq!(second.added, 0);
    assert_eq!(api.inserted().len(), 1);
}

#[tokio::test]
async fn test_unmatched_video_still_advances_watermark() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_in(&temp_dir);
    let api = church_playlists().with_uploads(vec![
        upload("V1", "교회 소식", "2024-04-01T00:00:00Z"),
        upload("V2", "새벽예배", "2024-04-02T00:00:00Z"),
    ]);
    let rules = church_rules();

    let report = PlaylistSorter::new(&api, &rules, &store, options())
        .run()
        .await
        .unwrap();

    assert_eq!(report.skipped_no_match, 1);
    assert_eq!(report.added, 1);
    assert_eq!(report.videos[0].outcome, VideoOutcome::NoMatch);
    assert_eq!(store.load().unwrap().last_published_at, "2024-04-02T00:00:00Z");
}

#[tokio::test]
async fn test_keyword_without_playlist_falls_through_to_next_rule() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_in(&temp_dir);
    let api = MockYouTubeApi::new()
        .with_playlists(&[("PL_youth", "청년부")])
        .with_uploads(vec![upload("V1", "청년부 특별 새벽예배", "2024-04-01T00:00:00Z")]);
    let rules = RuleSet::from_keywords(["새벽예배", "청년부"], true);

    let report = PlaylistSorter::new(&api, &rules, &store, options())
        .run()
        .await
        .unwrap();

    assert_eq!(
        report.videos[0].outcome,
        VideoOutcome::Added {
            playlist_id: "PL_youth".to_string(),
            keyword: "청년부".to_string(),
        }
    );
}

#[tokio::test]
async fn test_insert_failure_stops_watermark() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_in(&temp_dir);
    let api = church_playlists()
        .with_uploads(vec![
            upload("V1", "새벽예배", "2024-05-01T05:00:00Z"),
            upload("V2", "주일예배", "2024-05-05T11:00:00Z"),
            upload("V3", "수요예배", "2024-05-08T19:00:00Z"),
        ])
        .failing_on("V2", video_unavailable);
    let rules = church_rules();

    let report = PlaylistSorter::new(&api, &rules, &store, options())
        .run()
        .await
        .unwrap();

    assert_eq!(report.added, 2);
    assert_eq!(report.failed, 1);
    assert!(matches!(report.videos[1].outcome, VideoOutcome::Failed { .. }));
    // V2 must be retried next run, so the watermark stays at V1
    assert_eq!(report.watermark_after, "2024-05-01T05:00:00Z");
    assert_eq!(store.load().unwrap().last_published_at, "2024-05-01T05:00:00Z");
}

#[tokio::test]
async fn test_failed_video_sharing_a_timestamp_is_retried() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_in(&temp_dir);
    store.save(&RunState::new("2024-04-30T00:00:00Z")).unwrap();
    let uploads = vec![
        upload("A", "새벽예배", "2024-05-01T05:00:00Z"),
        upload("B", "주일예배", "2024-05-01T05:00:00Z"),
    ];
    let rules = church_rules();

    let failing = church_playlists()
        .with_uploads(uploads.clone())
        .failing_on("B", video_unavailable);
    let first = PlaylistSorter::new(&failing, &rules, &store, options())
        .run()
        .await
        .unwrap();
    assert_eq!(first.failed, 1);
    assert_eq!(first.watermark_after, "2024-04-30T00:00:00Z");

    let healthy = church_playlists().with_uploads(uploads);
    let second = PlaylistSorter::new(&healthy, &rules, &store, options())
        .run()
        .await
        .unwrap();
    assert_eq!(second.new_videos, 2);
    assert!(healthy
        .inserted()
        .contains(&("PL_sunday".to_string(), "B".to_string())));
    assert_eq!(store.load().unwrap().last_published_at, "2024-05-01T05:00:00Z");
}

#[tokio::test]
async fn test_transient_insert_failure_stops_remaining_inserts() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_in(&temp_dir);
    let api = church_playlists()
        .with_uploads(vec![
            upload("V1", "새벽예배", "2024-05-01T05:00:00Z"),
            upload("V2", "주일예배", "2024-05-05T11:00:00Z"),
            upload("V3", "수요예배", "2024-05-08T19:00:00Z"),
        ])
        .failing_on("V2", backend_error);
    let rules = church_rules();

    let report = PlaylistSorter::new(&api, &rules, &store, options())
        .run()
        .await
        .unwrap();

    assert!(report.aborted.is_some());
    assert_eq!(report.videos.len(), 2);
    assert_eq!(api.inserted(), vec![("PL_dawn".to_string(), "V1".to_string())]);
    assert_eq!(store.load().unwrap().last_published_at, "2024-05-01T05:00:00Z");
}

#[tokio::test]
async fn test_auth_failure_on_insert_stops_the_run() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_in(&temp_dir);
    let api = church_playlists()
        .with_uploads(vec![
            upload("V1", "새벽예배", "2024-05-01T05:00:00Z"),
            upload("V2", "수요예배", "2024-05-08T19:00:00Z"),
        ])
        .failing_on("V1", || SorterError::Auth("401 token revoked".to_string()));
    let rules = church_rules();

    let report = PlaylistSorter::new(&api, &rules, &store, options())
        .run()
        .await
        .unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.videos.len(), 1);
    assert!(api.inserted().is_empty());
    assert!(!store.path().exists());
}

#[tokio::test]
async fn test_dry_run_makes_no_changes() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_in(&temp_dir);
    let api = church_playlists().with_uploads(vec![upload(
        "V1",
        "새벽예배",
        "2024-05-01T05:00:00Z",
    )]);
    let rules = church_rules();

    let mut opts = options();
    opts.dry_run = true;
    let report = PlaylistSorter::new(&api, &rules, &store, opts)
        .run()
        .await
        .unwrap();

    assert!(report.dry_run);
    assert_eq!(report.added, 1);
    assert!(matches!(report.videos[0].outcome, VideoOutcome::WouldAdd { .. }));
    assert!(api.inserted().is_empty());
    assert!(!store.path().exists());
    assert_eq!(report.watermark_after, EPOCH_TIMESTAMP);
}

#[tokio::test]
async fn test_quota_exceeded_on_playlists_leaves_state_untouched() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_in(&temp_dir);
    store.save(&RunState::new("2024-01-01T00:00:00Z")).unwrap();

    let mut api = church_playlists().with_uploads(vec![upload(
        "V1",
        "새벽예배",
        "2024-05-01T05:00:00Z",
    )]);
    api.playlists_quota_exceeded = true;
    let rules = church_rules();

    let report = PlaylistSorter::new(&api, &rules, &store, options())
        .run()
        .await
        .unwrap();

    assert_eq!(report.playlists_indexed, 0);
    assert_eq!(report.new_videos, 1);
    assert_eq!(report.added, 0);
    assert!(api.inserted().is_empty());
    assert!(!report.watermark_advanced());
    assert_eq!(store.load().unwrap().last_published_at, "2024-01-01T00:00:00Z");
}

#[tokio::test]
async fn test_unknown_channel_fails_before_any_change() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_in(&temp_dir);
    let api = church_playlists();
    let rules = church_rules();

    let mut opts = options();
    opts.channel_id = "UC_missing".to_string();
    let err = PlaylistSorter::new(&api, &rules, &store, opts)
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, SorterError::NotFound(_)));
    assert!(err.is_fatal());
    assert!(!store.path().exists());
}

#[tokio::test]
async fn test_uploads_listing_failure_aborts_run() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_in(&temp_dir);
    store.save(&RunState::new("2024-01-01T00:00:00Z")).unwrap();

    let mut api = church_playlists();
    api.uploads_error = Some("connection reset".to_string());
    let rules = church_rules();

    let err = PlaylistSorter::new(&api, &rules, &store, options())
        .run()
        .await
        .unwrap_err();

    assert!(err.is_transient());
    assert!(api.inserted().is_empty());
    assert_eq!(store.load().unwrap().last_published_at, "2024-01-01T00:00:00Z");
}

#[tokio::test]
async fn test_thousand_uploads_over_twenty_pages() {
    let uploads: Vec<UploadItem> = (0..1000)
        .map(|i| {
            upload(
                &format!("V{:04}", i),
                "영상",
                &format!("2024-01-01T00:{:02}:{:02}Z", i / 60, i % 60),
            )
        })
        .collect();
    let api = MockYouTubeApi::new().with_uploads(uploads.clone());

    let api_ref: &dyn YouTubeApi = &api;
    let fetched = fetch_all(50, |token, size| async move {
        api_ref.list_playlist_items(UPLOADS, token.as_deref(), size).await
    })
    .await
    .unwrap();

    assert_eq!(fetched, uploads);
    assert_eq!(*api.page_calls.lock().unwrap(), 20);
}

#[tokio::test]
async fn test_index_build_keeps_listing_order_across_pages() {
    let playlists: Vec<(String, String)> = (0..120)
        .map(|i| (format!("PL{}", i), format!("목록 {}", i)))
        .collect();
    let pairs: Vec<(&str, &str)> = playlists
        .iter()
        .map(|(id, title)| (id.as_str(), title.as_str()))
        .collect();
    let api = MockYouTubeApi::new().with_playlists(&pairs);

    let index = PlaylistIndex::build(&api, 50, false).await;

    assert_eq!(index.len(), 120);
    let ids: Vec<_> = index.iter().take(3).map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["PL0", "PL1", "PL2"]);
    assert_eq!(*api.page_calls.lock().unwrap(), 3);
}

#[tokio::test]
async fn test_index_sorted_by_title_decides_the_winner() {
    let api = MockYouTubeApi::new().with_playlists(&[
        ("PL_z", "주일예배 하반기"),
        ("PL_a", "2024 주일예배"),
        ("PL_m", "새벽예배"),
    ]);
    let sensitive = ResolveOptions {
        case_sensitive: true,
        prefer_exact_title: false,
    };

    let listing = PlaylistIndex::build(&api, 50, false).await;
    assert_eq!(listing.resolve("주일예배", sensitive), Some("PL_z"));

    let sorted = PlaylistIndex::build(&api, 50, true).await;
    let titles: Vec<_> = sorted.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["2024 주일예배", "새벽예배", "주일예배 하반기"]);
    assert_eq!(sorted.resolve("주일예배", sensitive), Some("PL_a"));
}

#[tokio::test]
async fn test_rules_file_drives_the_run() {
    let temp_dir = TempDir::new().unwrap();
    let rules_path = temp_dir.path().join("rules.json");
    std::fs::write(
        &rules_path,
        r#"{"rules": [{"keyword": "수요예배"}, {"keyword": "새벽예배"}]}"#,
    )
    .unwrap();
    let rules = RuleSet::load(&rules_path, true).unwrap();

    let store = store_in(&temp_dir);
    let api = church_playlists().with_uploads(vec![upload(
        "V1",
        "수요예배 후 새벽예배 광고",
        "2024-05-08T19:00:00Z",
    )]);

    PlaylistSorter::new(&api, &rules, &store, options())
        .run()
        .await
        .unwrap();

    assert_eq!(api.inserted(), vec![("PL_wed".to_string(), "V1".to_string())]);
}
