/// YouTube Data API v3 client
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::{Page, PlaylistSummary, TokenStore, UploadItem, YouTubeApi};
use crate::config::YouTubeConfig;
use crate::error::{Result, SorterError};
use crate::state::normalize_timestamp;

/// 403 reasons that mean "try again later" rather than "not allowed"
const QUOTA_REASONS: &[&str] = &[
    "quotaExceeded",
    "rateLimitExceeded",
    "userRateLimitExceeded",
    "dailyLimitExceeded",
];

/// reqwest-backed implementation of [`YouTubeApi`]
pub struct YouTubeClient {
    client: Client,
    api_base: String,
    tokens: TokenStore,
}

#[derive(Debug, Deserialize)]
struct RawListResponse<T> {
    items: Option<Vec<T>>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPlaylist {
    id: Option<String>,
    snippet: Option<RawPlaylistSnippet>,
}

#[derive(Debug, Deserialize)]
struct RawPlaylistSnippet {
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPlaylistItem {
    snippet: Option<RawPlaylistItemSnippet>,
    #[serde(rename = "contentDetails")]
    content_details: Option<RawContentDetails>,
}

#[derive(Debug, Deserialize)]
struct RawPlaylistItemSnippet {
    title: Option<String>,
    #[serde(rename = "publishedAt")]
    published_at: Option<String>,
    position: Option<u32>,
    #[serde(rename = "resourceId")]
    resource_id: Option<RawResourceId>,
}

#[derive(Debug, Deserialize)]
struct RawResourceId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawContentDetails {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawChannel {
    #[serde(rename = "contentDetails")]
    content_details: Option<RawChannelDetails>,
}

#[derive(Debug, Deserialize)]
struct RawChannelDetails {
    #[serde(rename = "relatedPlaylists")]
    related_playlists: Option<RawRelatedPlaylists>,
}

#[derive(Debug, Deserialize)]
struct RawRelatedPlaylists {
    uploads: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawErrorEnvelope {
    error: RawError,
}

#[derive(Debug, Deserialize)]
struct RawError {
    message: Option<String>,
    #[serde(default)]
    errors: Vec<RawErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct RawErrorDetail {
    reason: Option<String>,
}

impl YouTubeClient {
    /// Create a client with a bounded per-call timeout
    pub fn new(config: &YouTubeConfig, tokens: TokenStore) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| SorterError::Config(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            tokens,
        })
    }

    async fn get(&self, resource: &str, query: &[(&str, String)]) -> Result<String> {
        let url = format!("{}/{}", self.api_base, resource);
        let token = self.tokens.access_token().await?;

        debug!("GET {} {:?}", url, query);
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await?;

        read_body(response).await
    }
}

async fn read_body(response: reqwest::Response) -> Result<String> {
    let status = response.status();
    let text = response.text().await?;
    if status.is_success() {
        Ok(text)
    } else {
        Err(classify_http_error(status, &text))
    }
}

/// Map an unsuccessful HTTP response onto the error taxonomy
pub fn classify_http_error(status: StatusCode, body: &str) -> SorterError {
    let parsed = serde_json::from_str::<RawErrorEnvelope>(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|e| e.error.message.clone())
        .unwrap_or_else(|| body.chars().take(200).collect());
    let is_quota = parsed.as_ref().map_or(false, |e| {
        e.error
            .errors
            .iter()
            .filter_map(|d| d.reason.as_deref())
            .any(|reason| QUOTA_REASONS.contains(&reason))
    });

    let detail = format!("{} {}", status.as_u16(), message);
    match status {
        StatusCode::UNAUTHORIZED => SorterError::Auth(detail),
        StatusCode::FORBIDDEN if is_quota => SorterError::TransientApi(detail),
        StatusCode::FORBIDDEN => SorterError::Auth(detail),
        StatusCode::NOT_FOUND => SorterError::NotFound(detail),
        StatusCode::TOO_MANY_REQUESTS => SorterError::TransientApi(detail),
        s if s.is_server_error() => SorterError::TransientApi(detail),
        _ => SorterError::DataShape(format!("unexpected response {}", detail)),
    }
}

fn take_items<T>(raw: RawListResponse<T>, what: &str) -> Result<(Vec<T>, Option<String>)> {
    let items = raw
        .items
        .ok_or_else(|| SorterError::DataShape(format!("{} response has no items field", what)))?;
    let next_token = raw.next_page_token.filter(|t| !t.is_empty());
    Ok((items, next_token))
}

/// Decode one page of `playlists.list`
pub fn parse_playlists_page(body: &str) -> Result<Page<PlaylistSummary>> {
    let raw: RawListResponse<RawPlaylist> = serde_json::from_str(body)
        .map_err(|e| SorterError::DataShape(format!("playlists response: {}", e)))?;
    let (raw_items, next_token) = take_items(raw, "playlists")?;

    let mut items = Vec::with_capacity(raw_items.len());
    for raw in raw_items {
        let id = raw
            .id
            .ok_or_else(|| SorterError::DataShape("playlist without id".to_string()))?;
        let title = raw
            .snippet
            .and_then(|s| s.title)
            .ok_or_else(|| SorterError::DataShape(format!("playlist {} without snippet.title", id)))?;
        items.push(PlaylistSummary { id, title });
    }

    Ok(Page { items, next_token })
}

/// Decode one page of `playlistItems.list`
pub fn parse_playlist_items_page(body: &str) -> Result<Page<UploadItem>> {
    let raw: RawListResponse<RawPlaylistItem> = serde_json::from_str(body)
        .map_err(|e| SorterError::DataShape(format!("playlistItems response: {}", e)))?;
    let (raw_items, next_token) = take_items(raw, "playlistItems")?;

    let mut items = Vec::with_capacity(raw_items.len());
    for raw in raw_items {
        let snippet = raw
            .snippet
            .ok_or_else(|| SorterError::DataShape("playlist item without snippet".to_string()))?;

        let video_id = raw
            .content_details
            .and_then(|d| d.video_id)
            .or_else(|| snippet.resource_id.as_ref().and_then(|r| r.video_id.clone()))
            .ok_or_else(|| SorterError::DataShape("playlist item without video id".to_string()))?;

        let published_at = snippet.published_at.ok_or_else(|| {
            SorterError::DataShape(format!("video {} without snippet.publishedAt", video_id))
        })?;
        let published_at = normalize_timestamp(&published_at).map_err(|e| {
            SorterError::DataShape(format!("video {} has bad publishedAt: {}", video_id, e))
        })?;

        items.push(UploadItem {
            video_id,
            title: snippet.title.unwrap_or_default(),
            published_at,
            position: snippet.position,
        });
    }

    Ok(Page { items, next_token })
}

/// Decode `channels.list` into the uploads playlist id
pub fn parse_uploads_playlist_id(body: &str, channel_id: &str) -> Result<String> {
    let raw: RawListResponse<RawChannel> = serde_json::from_str(body)
        .map_err(|e| SorterError::DataShape(format!("channels response: {}", e)))?;
    let (channels, _) = take_items(raw, "channels")?;

    let channel = channels
        .into_iter()
        .next()
        .ok_or_else(|| SorterError::NotFound(format!("Channel not found: {}", channel_id)))?;

    channel
        .content_details
        .and_then(|d| d.related_playlists)
        .and_then(|p| p.uploads)
        .ok_or_else(|| {
            SorterError::DataShape(format!("channel {} has no uploads playlist", channel_id))
        })
}

#[async_trait]
impl YouTubeApi for YouTubeClient {
    async fn list_my_playlists(
        &self,
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<Page<PlaylistSummary>> {
        let mut query = vec![
            ("part", "snippet".to_string()),
            ("mine", "true".to_string()),
            ("maxResults", page_size.to_string()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }

        let body = self.get("playlists", &query).await?;
        parse_playlists_page(&body)
    }

    async fn list_playlist_items(
        &self,
        playlist_id: &str,
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<Page<UploadItem>> {
        let mut query = vec![
            ("part", "snippet,contentDetails".to_string()),
            ("playlistId", playlist_id.to_string()),
            ("maxResults", page_size.to_string()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }

        let body = self.get("playlistItems", &query).await?;
        parse_playlist_items_page(&body)
    }

    async fn uploads_playlist_id(&self, channel_id: &str) -> Result<String> {
        let query = [
            ("part", "contentDetails".to_string()),
            ("id", channel_id.to_string()),
        ];
        let body = self.get("channels", &query).await?;
        parse_uploads_playlist_id(&body, channel_id)
    }

    async fn insert_playlist_item(&self, playlist_id: &str, video_id: &str) -> Result<()> {
        let url = format!("{}/playlistItems", self.api_base);
        let token = self.tokens.access_token().await?;
        let body = json!({
            "snippet": {
                "playlistId": playlist_id,
                "resourceId": {
                    "kind": "youtube#video",
                    "videoId": video_id,
                }
            }
        });

        debug!("POST {} video={} playlist={}", url, video_id, playlist_id);
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .query(&[("part", "snippet")])
            .json(&body)
            .send()
            .await?;

        read_body(response).await.map(|_| ())
    }
}
