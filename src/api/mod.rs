//! HTTP client for the source API and website.
//!
//! All network access of the synchronizer and downloader goes through this
//! module: daily index fetches, per-article HTML fetches, and the
//! connectivity probes each service runs before a cycle.

use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use chrono::NaiveDate;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::settings::Settings;

pub mod index;

pub use index::{DailyIndex, IndexArticle};

pub const CRHOY_API_BASE_URL: &str = "https://api.crhoy.net/";
pub const CRHOY_WEBSITE_URL: &str = "https://www.crhoy.com/";

/// Host used for the plain "is there internet at all" probe.
const INTERNET_PROBE_ADDR: &str = "8.8.8.8:53";
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const RETRY_PAUSE: Duration = Duration::from_secs(1);

/// Where the synchronizer gets daily index documents from.
pub trait IndexSource {
    fn fetch_daily_index(&self, date: NaiveDate) -> Result<DailyIndex, ApiError>;

    /// Pre-cycle connectivity probe; a `false` skips the whole cycle.
    fn available(&self) -> bool {
        true
    }
}

/// Where the downloader gets article pages from.
pub trait ArticleFetcher {
    fn fetch_article_html(&self, url: &str) -> Result<String, ApiError>;

    fn available(&self) -> bool {
        true
    }
}

pub struct SourceApiClient {
    http: Client,
    api_base: String,
    website_base: String,
    max_retries: u32,
    timezone: chrono_tz::Tz,
}

impl SourceApiClient {
    pub fn new(settings: &Settings) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout))
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(ApiError::ClientBuild)?;

        Ok(Self {
            http,
            api_base: CRHOY_API_BASE_URL.to_string(),
            website_base: CRHOY_WEBSITE_URL.to_string(),
            max_retries: settings.max_retries,
            timezone: settings.source_timezone,
        })
    }

    /// True when a TCP connection to a well-known host succeeds.
    pub fn probe_internet(&self) -> bool {
        let addr: SocketAddr = match INTERNET_PROBE_ADDR.parse() {
            Ok(addr) => addr,
            Err(_) => return false,
        };
        TcpStream::connect_timeout(&addr, PROBE_TIMEOUT).is_ok()
    }

    /// Any response from the API server, even an error status, counts as
    /// available; only connection failures count as down.
    pub fn probe_api(&self) -> bool {
        self.http.head(&self.api_base).send().is_ok()
    }

    pub fn probe_website(&self) -> bool {
        self.http
            .head(&self.website_base)
            .send()
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    fn get_with_retries(
        &self,
        url: &str,
        mut on_response: impl FnMut(reqwest::blocking::Response) -> Result<Option<String>, ApiError>,
    ) -> Result<String, ApiError> {
        let attempts = self.max_retries.max(1);
        for attempt in 1..=attempts {
            debug!(url, attempt, "Fetching");
            match self.http.get(url).send() {
                Ok(response) => match on_response(response)? {
                    Some(body) => return Ok(body),
                    None => warn!(url, attempt, "Retryable response"),
                },
                Err(e) => warn!(url, attempt, error = %e, "Request error"),
            }
            if attempt < attempts {
                std::thread::sleep(RETRY_PAUSE);
            }
        }
        Err(ApiError::RetriesExhausted {
            url: url.to_string(),
            attempts,
        })
    }
}

impl IndexSource for SourceApiClient {
    fn fetch_daily_index(&self, date: NaiveDate) -> Result<DailyIndex, ApiError> {
        let url = format!("{}ultimas/{}.json?v=3", self.api_base, date.format("%Y-%m-%d"));
        let mut not_found = false;

        let body = self.get_with_retries(&url, |response| {
            if response.status() == StatusCode::NOT_FOUND {
                // Days without news have no document; that is a valid,
                // empty index rather than an error.
                not_found = true;
                return Ok(Some(String::new()));
            }
            if !response.status().is_success() {
                return Ok(None);
            }
            let text = response.text().map_err(|e| ApiError::Request {
                url: url.clone(),
                source: e,
            })?;
            Ok(Some(text))
        })?;

        if not_found {
            warn!(%date, "No index document for date");
            return Ok(DailyIndex::empty());
        }

        let raw: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| ApiError::InvalidDocument(format!("invalid JSON: {e}")))?;
        index::parse_index(raw, self.timezone)
    }

    fn available(&self) -> bool {
        if !self.probe_internet() {
            warn!("No internet connection available");
            return false;
        }
        if !self.probe_api() {
            warn!("Source API is not reachable");
            return false;
        }
        true
    }
}

impl ArticleFetcher for SourceApiClient {
    fn fetch_article_html(&self, url: &str) -> Result<String, ApiError> {
        self.get_with_retries(url, |response| {
            if !response.status().is_success() {
                return Ok(None);
            }
            let text = response.text().map_err(|e| ApiError::Request {
                url: url.to_string(),
                source: e,
            })?;
            Ok(Some(text))
        })
    }

    fn available(&self) -> bool {
        if !self.probe_internet() {
            warn!("No internet connection available");
            return false;
        }
        if !self.probe_website() {
            warn!("Source website is not reachable");
            return false;
        }
        true
    }
}
