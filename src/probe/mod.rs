use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::utils;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 5;

// a status below this counts as reachable
const REACHABLE_BELOW: u16 = 400;
// an absent outcome below this is still reported as possible
const POSSIBLE_BELOW: u16 = 404;

/// Only this much of a page body is kept for keyword matching.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out: {url}")]
    Timeout { url: String },

    #[error("connection failed: {url}: {message}")]
    Connect { url: String, message: String },

    #[error("request failed: {url}: {message}")]
    Request { url: String, message: String },
}

impl TransportError {
    fn from_reqwest(url: &str, e: reqwest::Error) -> Self {
        let url = url.to_string();
        if e.is_timeout() {
            Self::Timeout { url }
        } else if e.is_connect() {
            Self::Connect {
                url,
                message: e.to_string(),
            }
        } else {
            Self::Request {
                url,
                message: e.to_string(),
            }
        }
    }
}

/// The network seam used by [`probe`]. `head` responses carry no body.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn head(&self, url: &str) -> Result<HttpResponse, TransportError>;
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError>;
}

#[derive(Debug, Error)]
pub enum TransportBuildError {
    #[error("invalid header '{header}', expected 'Key: Value'")]
    InvalidHeader { header: String },

    #[error("invalid user agent '{user_agent}'")]
    InvalidUserAgent { user_agent: String },

    #[error("failed to setup proxy: {proxy}: {source}")]
    ProxySetup {
        proxy: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to build HTTP client: {source}")]
    HttpClientBuild {
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Clone, Debug)]
pub struct TransportConfig {
    pub timeout: Duration,
    pub user_agent: String,
    pub follow_redirects: bool,
    pub header: Option<String>,
    pub proxy: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            follow_redirects: true,
            header: None,
            proxy: None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &TransportConfig) -> Result<Self, TransportBuildError> {
        let mut headers = reqwest::header::HeaderMap::new();
        let user_agent = reqwest::header::HeaderValue::from_str(&config.user_agent).map_err(|_| {
            TransportBuildError::InvalidUserAgent {
                user_agent: config.user_agent.clone(),
            }
        })?;
        headers.insert(reqwest::header::USER_AGENT, user_agent);

        if let Some(raw) = config.header.as_deref().filter(|h| !h.trim().is_empty()) {
            let (name, value) = parse_header(raw).ok_or_else(|| {
                TransportBuildError::InvalidHeader {
                    header: raw.to_string(),
                }
            })?;
            headers.insert(name, value);
        }

        let redirect_policy = if config.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        };

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .redirect(redirect_policy)
            .timeout(config.timeout)
            .danger_accept_invalid_hostnames(true)
            .danger_accept_invalid_certs(true);

        if let Some(proxy) = config.proxy.as_deref().filter(|p| !p.trim().is_empty()) {
            let proxy = reqwest::Proxy::all(proxy).map_err(|e| TransportBuildError::ProxySetup {
                proxy: proxy.to_string(),
                source: e,
            })?;
            builder = builder.proxy(proxy);
        } else {
            // environment proxies are ignored, only --proxy is honoured
            builder = builder.no_proxy();
        }

        let client = builder
            .build()
            .map_err(|e| TransportBuildError::HttpClientBuild { source: e })?;
        Ok(Self { client })
    }
}

fn parse_header(
    raw: &str,
) -> Option<(reqwest::header::HeaderName, reqwest::header::HeaderValue)> {
    let (name, value) = raw.split_once(':')?;
    let name = reqwest::header::HeaderName::from_bytes(name.trim().as_bytes()).ok()?;
    let value = reqwest::header::HeaderValue::from_str(value.trim()).ok()?;
    Some((name, value))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn head(&self, url: &str) -> Result<HttpResponse, TransportError> {
        let resp = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(url, e))?;
        Ok(HttpResponse {
            status: resp.status().as_u16(),
            body: Vec::new(),
        })
    }

    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        let mut resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(url, e))?;
        let status = resp.status().as_u16();

        let mut body = Vec::new();
        while body.len() < MAX_BODY_BYTES {
            let chunk = resp
                .chunk()
                .await
                .map_err(|e| TransportError::from_reqwest(url, e))?;
            match chunk {
                Some(chunk) => body.extend_from_slice(&chunk),
                None => break,
            }
        }
        body.truncate(MAX_BODY_BYTES);
        Ok(HttpResponse { status, body })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Classification {
    Confirmed,
    Absent,
}

/// How an outcome is reported once the scan receives it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Verdict {
    Found,
    Possible,
    NotFound,
}

impl Verdict {
    pub fn is_reportable(self) -> bool {
        !matches!(self, Verdict::NotFound)
    }

    pub fn label(self) -> &'static str {
        match self {
            Verdict::Found => "FOUND",
            Verdict::Possible => "POSSIBLE",
            Verdict::NotFound => "NOT FOUND",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub path: String,
    pub url: String,
    pub classification: Classification,
    /// `None` when the request itself failed.
    pub status: Option<u16>,
    pub error: Option<String>,
}

impl ProbeOutcome {
    pub fn verdict(&self) -> Verdict {
        match (self.classification, self.status) {
            (Classification::Confirmed, _) => Verdict::Found,
            (Classification::Absent, Some(status)) if status < POSSIBLE_BELOW => Verdict::Possible,
            (Classification::Absent, _) => Verdict::NotFound,
        }
    }
}

/// Checks one candidate path against `base`. Never fails: transport errors
/// become an absent outcome without a status code.
pub async fn probe<T>(transport: &T, base: &str, path: &str) -> ProbeOutcome
where
    T: Transport + ?Sized,
{
    let url = match utils::join_url(base, path) {
        Ok(url) => url,
        Err(message) => {
            debug!(base, path, error = %message, "could not resolve candidate path");
            return ProbeOutcome {
                path: path.to_string(),
                url: format!("{}{}", base, path),
                classification: Classification::Absent,
                status: None,
                error: Some(message),
            };
        }
    };

    match check(transport, &url).await {
        Ok((classification, status)) => ProbeOutcome {
            path: path.to_string(),
            url,
            classification,
            status: Some(status),
            error: None,
        },
        Err(e) => {
            debug!(url = %url, error = %e, "probe request failed");
            ProbeOutcome {
                path: path.to_string(),
                url,
                classification: Classification::Absent,
                status: None,
                error: Some(e.to_string()),
            }
        }
    }
}

async fn check<T>(transport: &T, url: &str) -> Result<(Classification, u16), TransportError>
where
    T: Transport + ?Sized,
{
    let head = transport.head(url).await?;
    if head.status >= REACHABLE_BELOW {
        return Ok((Classification::Absent, head.status));
    }

    // a reachable page without the keywords is reported as absent
    let page = transport.get(url).await?;
    if page.status < REACHABLE_BELOW && utils::contains_upload_keyword(&page.body) {
        Ok((Classification::Confirmed, page.status))
    } else {
        Ok((Classification::Absent, page.status))
    }
}
