//! Error taxonomy shared by the live sorter and the batch partitioner

/// Result type for playlist sorter operations
pub type Result<T> = std::result::Result<T, SorterError>;

/// Error types for playlist sorter operations
#[derive(thiserror::Error, Debug)]
pub enum SorterError {
    /// Missing credential, rule or input file, or an invalid setting.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Quota, network, timeout or 5xx failure. Safe to retry on a later run.
    #[error("Transient API error: {0}")]
    TransientApi(String),

    /// Expired or invalid credential. Requires operator re-authorization.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Response or input that does not have the expected fields.
    #[error("Malformed data: {0}")]
    DataShape(String),

    /// A referenced remote resource (e.g. a channel) does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl SorterError {
    /// Whether the failure may clear up on its own (abort this run, retry later)
    pub fn is_transient(&self) -> bool {
        matches!(self, SorterError::TransientApi(_))
    }

    /// Whether the operator has to intervene before another run can succeed
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SorterError::Config(_) | SorterError::Auth(_) | SorterError::NotFound(_)
        )
    }
}

impl From<reqwest::Error> for SorterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SorterError::DataShape(err.to_string())
        } else {
            SorterError::TransientApi(err.to_string())
        }
    }
}
