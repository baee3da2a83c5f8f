//! Shared test utilities.
//!
//! Provides scripted stand-ins for the two network seams and lookup helpers
//! for build output.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let source = MockSource::new()
//!     .remote_page("/blog/first", Some("2025-01-01T00:00:00Z"))
//!     .page("/blog/first", "en", json!({ "title": "First" }));
//!
//! let report = Builder::new(&config, &registry, &source).out_dir(tmp.path()).run()?;
//! assert_eq!(read_output(tmp.path(), "blog/first/index.html"), "<h1>First</h1>");
//! ```
//!
//! Both mocks record their calls behind a `Mutex` so they stay `Sync` for
//! the fetch pool.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::client::{
    ClientError, ContentSource, FieldRecord, LocaleInfo, PageData, RawFields, RemotePage, Seo,
    SiteInfo,
};
use crate::media::{MediaError, MediaResponse, MediaTransport};

// =========================================================================
// Content source
// =========================================================================

/// Scripted [`ContentSource`]. Unscripted pages and SEO records are 404s.
#[derive(Default)]
pub struct MockSource {
    remote: Vec<RemotePage>,
    pages: HashMap<(String, String), PageData>,
    seo: HashMap<(String, String), Seo>,
    locales: Vec<LocaleInfo>,
    site: Option<SiteInfo>,
    fail_push: bool,
    calls: Mutex<Vec<String>>,
    pushed: Mutex<Vec<Value>>,
}

fn not_found() -> ClientError {
    ClientError::Status {
        status: 404,
        body: "not found".to_string(),
    }
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// List `path` in `GET /pages`.
    pub fn remote_page(mut self, path: &str, updated_at: Option<&str>) -> Self {
        self.remote.push(RemotePage {
            id: format!("page-{}", self.remote.len()),
            path: path.to_string(),
            slug: crate::registry::slug_from_path(path),
            template_id: None,
            updated_at: updated_at.map(String::from),
        });
        self
    }

    /// Serve `fields` (a JSON object) for `path` in `locale`.
    pub fn page(self, path: &str, locale: &str, fields: Value) -> Self {
        let records = fields
            .as_object()
            .map(|map| {
                map.iter()
                    .map(|(key, value)| FieldRecord {
                        key: key.clone(),
                        locale: Some(locale.to_string()),
                        value: value.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        let data = PageData {
            path: path.to_string(),
            fields: RawFields::List(records),
            ..PageData::default()
        };
        self.page_data(path, locale, data)
    }

    pub fn page_data(mut self, path: &str, locale: &str, data: PageData) -> Self {
        self.pages.insert((path.to_string(), locale.to_string()), data);
        self
    }

    pub fn seo(mut self, path: &str, locale: &str, seo: Seo) -> Self {
        self.seo.insert((path.to_string(), locale.to_string()), seo);
        self
    }

    /// `(code, is_default)` pairs for `GET /locales`. Unset means the
    /// endpoint fails.
    pub fn locales(mut self, locales: &[(&str, bool)]) -> Self {
        self.locales = locales
            .iter()
            .map(|(code, is_default)| LocaleInfo {
                locale: code.to_string(),
                label: code.to_uppercase(),
                is_default: *is_default,
            })
            .collect();
        self
    }

    pub fn site_domain(mut self, domain: &str) -> Self {
        self.site = Some(SiteInfo {
            name: "Test".to_string(),
            slug: "test".to_string(),
            domain: Some(domain.to_string()),
            default_locale: "en".to_string(),
        });
        self
    }

    pub fn failing_push(mut self) -> Self {
        self.fail_push = true;
        self
    }

    /// Every call made so far, as `"<op> <path> <locale>"`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn pushed(&self) -> Vec<Value> {
        self.pushed.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl ContentSource for MockSource {
    fn list_pages(&self) -> Result<Vec<RemotePage>, ClientError> {
        self.record("list_pages".to_string());
        Ok(self.remote.clone())
    }

    fn get_page(&self, path: &str, locale: &str) -> Result<PageData, ClientError> {
        self.record(format!("get_page {path} {locale}"));
        self.pages
            .get(&(path.to_string(), locale.to_string()))
            .cloned()
            .ok_or_else(not_found)
    }

    fn get_seo(&self, path: &str, locale: &str) -> Result<Seo, ClientError> {
        self.record(format!("get_seo {path} {locale}"));
        self.seo
            .get(&(path.to_string(), locale.to_string()))
            .cloned()
            .ok_or_else(not_found)
    }

    fn list_locales(&self) -> Result<Vec<LocaleInfo>, ClientError> {
        self.record("list_locales".to_string());
        if self.locales.is_empty() {
            Err(not_found())
        } else {
            Ok(self.locales.clone())
        }
    }

    fn site_info(&self) -> Result<SiteInfo, ClientError> {
        self.record("site_info".to_string());
        self.site.clone().ok_or_else(not_found)
    }

    fn push_schema(&self, payload: &Value) -> Result<(), ClientError> {
        self.record("push_schema".to_string());
        if self.fail_push {
            return Err(ClientError::Status {
                status: 500,
                body: "sync failed".to_string(),
            });
        }
        self.pushed.lock().unwrap().push(payload.clone());
        Ok(())
    }
}

// =========================================================================
// Media transport
// =========================================================================

/// Scripted [`MediaTransport`]. Unscripted URLs answer 404.
#[derive(Default)]
pub struct MockTransport {
    responses: HashMap<String, (String, Vec<u8>)>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(mut self, url: &str, content_type: &str, body: &[u8]) -> Self {
        self.responses
            .insert(url.to_string(), (content_type.to_string(), body.to_vec()));
        self
    }

    /// Handle to the requested URLs that outlives the boxed transport.
    pub fn calls_handle(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.calls)
    }
}

impl MediaTransport for MockTransport {
    fn get(&self, url: &str) -> Result<MediaResponse, MediaError> {
        self.calls.lock().unwrap().push(url.to_string());
        Ok(match self.responses.get(url) {
            Some((content_type, body)) => MediaResponse {
                status: 200,
                content_type: content_type.clone(),
                body: body.clone(),
            },
            None => MediaResponse {
                status: 404,
                ..MediaResponse::default()
            },
        })
    }
}

// =========================================================================
// Output lookups
// =========================================================================

/// Read `rel` under `out_dir`, panicking with the path when it is missing.
pub fn read_output(out_dir: &Path, rel: &str) -> String {
    let path = out_dir.join(rel);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("expected output file {}: {e}", path.display()))
}
