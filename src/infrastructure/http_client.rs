//! HTTP client for the listing site
//!
//! Carries the signed-in session (a configured `Cookie` header plus whatever
//! the site sets during the run) and classifies failures so callers can tell
//! an expired session from an unreachable host.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{
    Client, StatusCode,
    header::{COOKIE, HeaderMap, HeaderValue, USER_AGENT},
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::infrastructure::config::SiteConfig;

/// HTTP client configuration
#[derive(Debug, Clone, serde::Serialize)]
pub struct HttpClientConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub follow_redirects: bool,
    /// Responses whose final URL path starts with this are treated as signed out
    pub login_path: String,
    #[serde(skip_serializing)]
    pub session_cookie: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self::from(&SiteConfig::default())
    }
}

impl From<&SiteConfig> for HttpClientConfig {
    fn from(site: &SiteConfig) -> Self {
        Self {
            user_agent: site.user_agent.clone(),
            timeout_seconds: site.request_timeout_seconds,
            follow_redirects: true,
            login_path: site.login_path.clone(),
            session_cookie: site.session_cookie.clone(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HttpError {
    /// 401/403, or a redirect onto the login page
    #[error("Not authorized to fetch {url}")]
    Unauthorized { url: String },

    #[error("HTTP request failed with status {status}: {url}")]
    Status { status: u16, url: String },

    #[error("Request to {url} failed: {reason}")]
    Transport { url: String, reason: String },
}

pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
}

impl HttpClient {
    /// Create a new HTTP client with the given configuration
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).context("Invalid user agent")?,
        );
        if let Some(cookie) = &config.session_cookie {
            let mut value = HeaderValue::from_str(cookie).context("Invalid session cookie")?;
            value.set_sensitive(true);
            headers.insert(COOKIE, value);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .cookie_store(true)
            .redirect(if config.follow_redirects {
                reqwest::redirect::Policy::limited(10)
            } else {
                reqwest::redirect::Policy::none()
            })
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, config })
    }

    /// Fetch URL and return the body as text
    pub async fn get_text(&self, url: &str) -> Result<String, HttpError> {
        debug!("Fetching URL: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| HttpError::Transport {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
            || self.is_login_redirect(response.url())
        {
            warn!("Request to {} was rejected as signed out ({})", url, status);
            return Err(HttpError::Unauthorized {
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            return Err(HttpError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let text = response.text().await.map_err(|e| HttpError::Transport {
            url: url.to_string(),
            reason: format!("Failed to read response body: {e}"),
        })?;
        debug!("Fetched {} ({} chars)", url, text.len());
        Ok(text)
    }

    fn is_login_redirect(&self, final_url: &reqwest::Url) -> bool {
        !self.config.login_path.is_empty() && final_url.path().starts_with(&self.config.login_path)
    }
}
