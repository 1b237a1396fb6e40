use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    // Configuration errors
    #[error("Failed to parse config file: {0}")]
    ConfigParseError(#[from] toml::de::Error),

    #[error("Invalid config: {message}")]
    ConfigInvalid { message: String },

    #[error("Failed to read config file {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Lyrics loading errors
    #[error("Lyrics request for {url} returned status {status}")]
    LyricsHttpStatus { url: String, status: u16 },

    #[error("Lyrics fetch from {loader} failed: {reason}")]
    LyricsFetchFailed { loader: String, reason: String },

    #[error("Invalid lyrics URL {url}: {reason}")]
    InvalidLyricsUrl { url: String, reason: String },

    #[error("HTTP client could not be created: {reason}")]
    HttpClient { reason: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;
