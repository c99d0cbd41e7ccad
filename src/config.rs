use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::batch::category::CategoryRule;
use crate::batch::partition::KeywordGroup;
use crate::error::{Result, SorterError};

/// Largest page size the listing endpoints accept
pub const MAX_PAGE_SIZE: u32 = 50;

/// Configuration for the playlist sorter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Remote API settings
    pub youtube: YouTubeConfig,

    /// Keyword rule settings for the live run
    pub rules: RulesConfig,

    /// Persisted watermark settings
    pub state: StateConfig,

    /// Offline CSV partitioning settings
    pub batch: BatchConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YouTubeConfig {
    /// Base URL of the Data API (v3)
    pub api_base: String,

    /// OAuth token endpoint used to refresh expired access tokens
    pub oauth_token_url: String,

    /// Channel whose uploads are sorted
    pub channel_id: Option<String>,

    /// Authorized-user token file
    pub token_file: PathBuf,

    /// Per-request timeout (seconds)
    pub timeout_seconds: u64,

    /// Page size for playlist listing
    pub page_size: u32,

    /// Page size for the uploads playlist listing
    pub uploads_page_size: u32,

    /// Classify and report without inserting or saving state
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    /// JSON file holding the ordered keyword list
    pub rules_file: PathBuf,

    /// Compare keywords and titles case-sensitively
    pub case_sensitive: bool,

    /// Prefer a playlist whose title equals the keyword over substring hits
    pub prefer_exact_title: bool,

    /// Sort the playlist index by title instead of listing order
    pub sort_index_by_title: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// File holding `{"last_published_at": ...}`
    pub state_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Organization name anchoring the structured title pattern
    pub organization_name: String,

    /// Full channel metadata table
    pub metadata_file: PathBuf,

    /// Video to playlist membership table
    pub mapping_file: PathBuf,

    /// Output directory for title-category partitions
    pub category_output_dir: PathBuf,

    /// Output directory for playlist partitions
    pub playlist_output_dir: PathBuf,

    /// Output directory for keyword-group partitions
    pub keyword_output_dir: PathBuf,

    /// Playlists never written by the membership variant
    pub excluded_playlists: Vec<String>,

    /// Categories never written by the title-category variant
    pub excluded_categories: Vec<String>,

    /// Titles containing any of these terms are left out of keyword groups
    pub keyword_exclude_terms: Vec<String>,

    /// Ordered keyword fallback used when the structured pattern fails
    pub category_rules: Vec<CategoryRule>,

    /// Ordered keyword groups for the keyword-split variant
    pub keyword_groups: Vec<KeywordGroup>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default tracing filter when RUST_LOG is unset
    pub level: String,
}

impl Config {
    /// Load configuration from the first file found, falling back to env
    pub fn load() -> Result<Self> {
        let config_paths = [
            "playlist-sorter.toml",
            "config/playlist-sorter.toml",
        ];

        for path in &config_paths {
            if Path::new(path).exists() {
                let config = Self::load_from(Path::new(path))?;
                tracing::info!("📄 Loaded configuration from: {}", path);
                return Ok(config);
            }
        }

        Ok(Self::from_env())
    }

    /// Load configuration from an explicit file; env variables still override
    pub fn load_from(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path).map_err(|e| {
            SorterError::Config(format!("cannot read config {}: {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&config_str)?;
        Ok(config.with_env_overrides())
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(channel_id) = std::env::var("TARGET_CHANNEL_ID") {
            if !channel_id.trim().is_empty() {
                self.youtube.channel_id = Some(channel_id.trim().to_string());
            }
        }

        if let Ok(token_file) = std::env::var("PLAYLIST_SORTER_TOKEN_FILE") {
            self.youtube.token_file = PathBuf::from(token_file);
        }

        if let Ok(state_file) = std::env::var("PLAYLIST_SORTER_STATE_FILE") {
            self.state.state_file = PathBuf::from(state_file);
        }

        if let Ok(rules_file) = std::env::var("PLAYLIST_SORTER_RULES_FILE") {
            self.rules.rules_file = PathBuf::from(rules_file);
        }

        if let Ok(level) = std::env::var("PLAYLIST_SORTER_LOG_LEVEL") {
            self.logging.level = level;
        }

        self
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let config_str = toml::to_string_pretty(self)
            .map_err(|e| SorterError::Config(format!("cannot serialize config: {}", e)))?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        for (name, size) in [
            ("youtube.page_size", self.youtube.page_size),
            ("youtube.uploads_page_size", self.youtube.uploads_page_size),
        ] {
            if size == 0 || size > MAX_PAGE_SIZE {
                return Err(SorterError::Config(format!(
                    "{} must be between 1 and {}, got {}",
                    name, MAX_PAGE_SIZE, size
                )));
            }
        }

        if self.youtube.timeout_seconds == 0 {
            return Err(SorterError::Config(
                "youtube.timeout_seconds must be greater than 0".to_string(),
            ));
        }

        for (name, value) in [
            ("youtube.api_base", &self.youtube.api_base),
            ("youtube.oauth_token_url", &self.youtube.oauth_token_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| SorterError::Config(format!("{} is not a URL ({}): {}", name, value, e)))?;
        }

        if self.batch.organization_name.trim().is_empty() {
            return Err(SorterError::Config(
                "batch.organization_name must not be empty".to_string(),
            ));
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }

    /// Channel id required by the live run
    pub fn require_channel_id(&self) -> Result<&str> {
        self.youtube
            .channel_id
            .as_deref()
            .ok_or_else(|| SorterError::Config("TARGET_CHANNEL_ID is not set".to_string()))
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Playlist Sorter Configuration:\n\
            - Channel: {}\n\
            - Token file: {}\n\
            - Rules file: {} (case sensitive: {})\n\
            - State file: {}\n\
            - Page sizes: playlists {}, uploads {}\n\
            - Timeout: {}s\n\
            - Dry run: {}\n\
            - Batch organization: {}\n\
            - Excluded playlists: {}",
            self.youtube.channel_id.as_deref().unwrap_or("<unset>"),
            self.youtube.token_file.display(),
            self.rules.rules_file.display(),
            self.rules.case_sensitive,
            self.state.state_file.display(),
            self.youtube.page_size,
            self.youtube.uploads_page_size,
            self.youtube.timeout_seconds,
            self.youtube.dry_run,
            self.batch.organization_name,
            self.batch.excluded_playlists.join(", "),
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            youtube: YouTubeConfig {
                api_base: "https://www.googleapis.com/youtube/v3".to_string(),
                oauth_token_url: "https://oauth2.googleapis.com/token".to_string(),
                channel_id: None,
                token_file: PathBuf::from("token.json"),
                timeout_seconds: 30,
                page_size: MAX_PAGE_SIZE,
                uploads_page_size: MAX_PAGE_SIZE,
                dry_run: false,
            },
            rules: RulesConfig {
                rules_file: PathBuf::from("rules.json"),
                case_sensitive: true,
                prefer_exact_title: false,
                sort_index_by_title: false,
            },
            state: StateConfig {
                state_file: PathBuf::from("state.json"),
            },
            batch: BatchConfig {
                organization_name: "예수산소망교회".to_string(),
                metadata_file: PathBuf::from("channel_videos_metadata.csv"),
                mapping_file: PathBuf::from("playlist_video_mapping.csv"),
                category_output_dir: PathBuf::from("categorized_videos"),
                playlist_output_dir: PathBuf::from("categorized_by_playlist"),
                keyword_output_dir: PathBuf::from("keyword_categorized"),
                excluded_playlists: vec!["특별영상".to_string()],
                excluded_categories: Vec::new(),
                keyword_exclude_terms: vec!["특별".to_string()],
                category_rules: CategoryRule::default_table(),
                keyword_groups: KeywordGroup::default_groups(),
            },
            logging: LoggingConfig {
                level: "playlist_sorter=info,warn".to_string(),
            },
        }
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_channel_id(mut self, channel_id: &str) -> Self {
        self.config.youtube.channel_id = Some(channel_id.to_string());
        self
    }

    pub fn with_state_file(mut self, path: PathBuf) -> Self {
        self.config.state.state_file = path;
        self
    }

    pub fn with_rules_file(mut self, path: PathBuf) -> Self {
        self.config.rules.rules_file = path;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.config.youtube.page_size = page_size;
        self
    }

    pub fn case_sensitive(mut self, enable: bool) -> Self {
        self.config.rules.case_sensitive = enable;
        self
    }

    pub fn prefer_exact_title(mut self, enable: bool) -> Self {
        self.config.rules.prefer_exact_title = enable;
        self
    }

    pub fn dry_run(mut self, enable: bool) -> Self {
        self.config.youtube.dry_run = enable;
        self
    }

    pub fn with_organization_name(mut self, name: &str) -> Self {
        self.config.batch.organization_name = name.to_string();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
