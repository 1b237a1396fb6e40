use async_trait::async_trait;
use lyrisync_core::{CoreError, FetchConfig, LyricsLoader};
use reqwest::header::CACHE_CONTROL;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

const LOG_TARGET: &str = "lyrisync::loader::http";

/// Loads LRC text with a single GET per album.
///
/// Relative locations are resolved against the configured base URL. There is
/// no retry; a failed request surfaces as an inline message in the panel.
pub struct HttpLyricsLoader {
    client: reqwest::Client,
    base_url: Option<Url>,
    no_store: bool,
}

impl HttpLyricsLoader {
    /// Create a loader from the `[fetch]` config section.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is malformed or the HTTP client cannot be created.
    pub fn new(config: &FetchConfig) -> Result<Self, CoreError> {
        let base_url = config
            .base_url
            .as_deref()
            .map(|base| {
                Url::parse(base).map_err(|e| CoreError::InvalidLyricsUrl {
                    url: base.to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| CoreError::HttpClient {
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url,
            no_store: config.no_store,
        })
    }

    /// Resolve `location` to an absolute URL
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidLyricsUrl`] if `location` is relative and no
    /// base URL is configured, or if it cannot be joined onto the base.
    pub fn resolve(&self, location: &str) -> Result<Url, CoreError> {
        let resolved = match &self.base_url {
            Some(base) => base.join(location),
            None => Url::parse(location),
        };
        resolved.map_err(|e| CoreError::InvalidLyricsUrl {
            url: location.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait(?Send)]
impl LyricsLoader for HttpLyricsLoader {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn load(&self, location: &str) -> Result<String, CoreError> {
        let url = self.resolve(location)?;
        info!(target: LOG_TARGET, "GET {}", url);

        let mut request = self.client.get(url.clone());
        if self.no_store {
            request = request.header(CACHE_CONTROL, "no-store");
        }

        let response = request.send().await.map_err(|e| CoreError::LyricsFetchFailed {
            loader: self.name().to_string(),
            reason: e.to_string(),
        })?;
        debug!(target: LOG_TARGET, "Response status: {}", response.status());

        if !response.status().is_success() {
            warn!(target: LOG_TARGET, "{} returned status: {}", url, response.status());
            return Err(CoreError::LyricsHttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        response.text().await.map_err(|e| CoreError::LyricsFetchFailed {
            loader: self.name().to_string(),
            reason: e.to_string(),
        })
    }
}
