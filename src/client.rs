//! Content service client.
//!
//! A thin, authenticated request/response layer over the headless content
//! service. Nothing is cached here; the build pipeline decides what to fetch
//! and how often.
//!
//! All endpoints live under `<api_url>/api/v1/<site_slug>` and authenticate
//! with an `X-API-Key` header.
//!
//! The [`ContentSource`] trait is the seam the rest of the crate talks to.
//! [`ContentClient`] is the production implementation; tests substitute a
//! scripted mock.

use crate::config::SiteConfig;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use ureq::Agent;

/// Default HTTP timeout in seconds.
const DEFAULT_TIMEOUT: u64 = 30;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {status} - {body}")]
    Status { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("request cancelled")]
    Cancelled,
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),
}

impl From<ureq::Error> for ClientError {
    fn from(e: ureq::Error) -> Self {
        ClientError::Transport(e.to_string())
    }
}

// ============================================================================
// Wire types
// ============================================================================

/// One published page from `GET /pages`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemotePage {
    #[serde(default)]
    pub id: String,
    pub path: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// A single field record: `{key, locale, value}` with a raw JSON value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRecord {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default)]
    pub value: Value,
}

/// Fields arrive either as a record list (pages) or a plain object (some
/// subcollection entries).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawFields {
    List(Vec<FieldRecord>),
    Map(serde_json::Map<String, Value>),
}

impl Default for RawFields {
    fn default() -> Self {
        RawFields::List(Vec::new())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub fields: RawFields,
    #[serde(default)]
    pub subcollections: Vec<RawSubcollection>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSubcollection {
    #[serde(default)]
    pub subcollection_id: String,
    pub key: String,
    #[serde(default)]
    pub entries: Vec<RawEntry>,
}

/// One page from `GET /pages/<path>`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageData {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub version_id: String,
    #[serde(default)]
    pub version_number: i64,
    #[serde(default)]
    pub fields: RawFields,
    #[serde(default)]
    pub subcollections: Vec<RawSubcollection>,
}

/// SEO metadata from `GET /seo/<path>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seo {
    #[serde(default)]
    pub meta_title: String,
    #[serde(default)]
    pub meta_description: String,
    #[serde(default)]
    pub og_image_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocaleInfo {
    pub locale: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub default_locale: String,
}

/// Optional transform parameters for `GET /media/<id>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaParams {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub quality: Option<u32>,
    pub format: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MediaUrl {
    url: String,
}

// ============================================================================
// ContentSource
// ============================================================================

/// The operations the build pipeline needs from the content service.
///
/// Must be `Sync`: the fetcher calls it from a rayon pool.
pub trait ContentSource: Send + Sync {
    /// All published pages.
    fn list_pages(&self) -> Result<Vec<RemotePage>, ClientError>;

    /// One page's fields and subcollections in `locale`.
    fn get_page(&self, path: &str, locale: &str) -> Result<PageData, ClientError>;

    /// SEO metadata of one page in `locale`.
    fn get_seo(&self, path: &str, locale: &str) -> Result<Seo, ClientError>;

    /// Configured locales.
    fn list_locales(&self) -> Result<Vec<LocaleInfo>, ClientError>;

    /// Site name, domain, and default locale.
    fn site_info(&self) -> Result<SiteInfo, ClientError>;

    /// Resolve a media id to a (possibly signed) URL.
    fn media_url(&self, _id: &str, _params: &MediaParams) -> Result<String, ClientError> {
        Err(ClientError::Unsupported("media_url"))
    }

    /// Upload a schema-sync payload.
    fn push_schema(&self, _payload: &Value) -> Result<(), ClientError> {
        Err(ClientError::Unsupported("push_schema"))
    }
}

/// HTTP implementation of [`ContentSource`].
pub struct ContentClient {
    agent: Agent,
    base_url: String,
    api_key: String,
}

impl ContentClient {
    pub fn new(api_url: &str, site_slug: &str, api_key: &str) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT)))
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            agent,
            base_url: format!("{}/api/v1/{}", api_url.trim_end_matches('/'), site_slug),
            api_key: api_key.to_string(),
        }
    }

    pub fn from_config(config: &SiteConfig) -> Self {
        Self::new(&config.api_url, &config.site_slug, &config.api_key)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ClientError> {
        let mut request = self
            .agent
            .get(url)
            .header("X-API-Key", &self.api_key)
            .header("Accept", "application/json");
        for (k, v) in query {
            request = request.query(*k, *v);
        }
        let response = request.call()?;

        let status = response.status().as_u16();
        let mut body_reader = response.into_body();
        let body = body_reader.read_to_string()?;
        if status >= 400 {
            return Err(ClientError::Status { status, body });
        }
        Ok(serde_json::from_str(&body)?)
    }
}

/// Endpoint for a page-scoped resource. The root page is addressed as
/// `<kind>//` so it doesn't collide with the collection endpoint.
pub(crate) fn page_endpoint(base: &str, kind: &str, path: &str) -> String {
    if path == "/" || path.is_empty() {
        format!("{base}/{kind}//")
    } else if path.starts_with('/') {
        format!("{base}/{kind}{path}")
    } else {
        format!("{base}/{kind}/{path}")
    }
}

impl ContentSource for ContentClient {
    fn list_pages(&self) -> Result<Vec<RemotePage>, ClientError> {
        self.get_json(&format!("{}/pages", self.base_url), &[])
    }

    fn get_page(&self, path: &str, locale: &str) -> Result<PageData, ClientError> {
        let url = page_endpoint(&self.base_url, "pages", path);
        self.get_json(&url, &[("locale", locale)])
    }

    fn get_seo(&self, path: &str, locale: &str) -> Result<Seo, ClientError> {
        let url = page_endpoint(&self.base_url, "seo", path);
        self.get_json(&url, &[("locale", locale)])
    }

    fn list_locales(&self) -> Result<Vec<LocaleInfo>, ClientError> {
        self.get_json(&format!("{}/locales", self.base_url), &[])
    }

    fn site_info(&self) -> Result<SiteInfo, ClientError> {
        self.get_json(&format!("{}/site", self.base_url), &[])
    }

    fn media_url(&self, id: &str, params: &MediaParams) -> Result<String, ClientError> {
        let width = params.width.map(|w| w.to_string());
        let height = params.height.map(|h| h.to_string());
        let quality = params.quality.map(|q| q.to_string());
        let mut query: Vec<(&str, &str)> = Vec::new();
        if let Some(w) = &width {
            query.push(("w", w));
        }
        if let Some(h) = &height {
            query.push(("h", h));
        }
        if let Some(q) = &quality {
            query.push(("q", q));
        }
        if let Some(f) = &params.format {
            query.push(("format", f));
        }
        let media: MediaUrl = self.get_json(&format!("{}/media/{}", self.base_url, id), &query)?;
        Ok(media.url)
    }

    fn push_schema(&self, payload: &Value) -> Result<(), ClientError> {
        let body = serde_json::to_vec(payload)?;
        let response = self
            .agent
            .post(&format!("{}/sync", self.base_url))
            .header("X-API-Key", &self.api_key)
            .header("Content-Type", "application/json")
            .send(&body[..])?;

        let status = response.status().as_u16();
        if status >= 400 {
            let body = response
                .into_body()
                .read_to_string()
                .unwrap_or_else(|_| "(unable to read error body)".to_string());
            return Err(ClientError::Status { status, body });
        }
        Ok(())
    }
}
