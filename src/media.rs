//! Media downloading with content-addressed local filenames.
//!
//! Remote images referenced by CMS fields are downloaded into
//! `<out_dir>/media/` and referenced by their local web path instead. Each
//! processed image resolves a fixed variant set:
//!
//! - the full-size image (bare URL),
//! - an LQIP placeholder (`w=32&q=20`) inlined as a `data:` URI,
//! - the responsive widths 400, 800, 1200, 1600,
//! - each width in `avif` and `webp`, when the server offers them.
//!
//! ## Filenames
//!
//! A file is named after the first 8 bytes of the SHA-256 of its *stable*
//! URL, hex-encoded, plus an extension derived from the response
//! `Content-Type`. The stable URL drops the volatile `sig` and `exp` query
//! parameters and re-encodes the rest in key order, so signed URLs whose
//! signature rotates between builds land on the same file.
//!
//! ## Caching
//!
//! One map from remote URL (as given, query included) to local path or data
//! URI lives behind a mutex, shared by every fetch worker. Two workers
//! missing on the same URL at once may both download it; the later write
//! wins, which is harmless because the filename only depends on the URL.
//! A file already on disk with the same bytes is left alone and not counted.
//!
//! Processed images are memoised by remote URL as well, so rendering the
//! same image for the page, its fragments, and every locale pass resolves
//! the variant set once. Variants that failed are not requested again.

use crate::image::{FORMATS, ImageProcessor, ImageValue, WIDTHS};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use ureq::Agent;
use url::Url;

/// Per-request timeout for media downloads, in seconds.
const DOWNLOAD_TIMEOUT: u64 = 60;

/// Largest media body accepted.
const MAX_MEDIA_BYTES: u64 = 64 * 1024 * 1024;

/// Query parameters that rotate between builds and must not affect filenames.
const VOLATILE_PARAMS: [&str; 2] = ["sig", "exp"];

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("download failed: {url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<ureq::Error> for MediaError {
    fn from(e: ureq::Error) -> Self {
        MediaError::Transport(e.to_string())
    }
}

/// A fetched media response.
#[derive(Debug, Clone, Default)]
pub struct MediaResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
}

/// How media bytes are fetched. Production uses [`HttpTransport`].
pub trait MediaTransport: Send + Sync {
    fn get(&self, url: &str) -> Result<MediaResponse, MediaError>;
}

/// Blocking HTTP transport.
pub struct HttpTransport {
    agent: Agent,
}

impl HttpTransport {
    pub fn new() -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DOWNLOAD_TIMEOUT)))
            .http_status_as_error(false)
            .build()
            .into();
        Self { agent }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaTransport for HttpTransport {
    fn get(&self, url: &str) -> Result<MediaResponse, MediaError> {
        let response = self.agent.get(url).call()?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = response
            .into_body()
            .with_config()
            .limit(MAX_MEDIA_BYTES)
            .read_to_vec()?;
        Ok(MediaResponse {
            status,
            content_type,
            body,
        })
    }
}

/// Strip volatile query parameters and re-encode the query in key order.
///
/// Unparseable input is returned unchanged.
pub fn stable_url(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return raw.to_string();
    };
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !VOLATILE_PARAMS.contains(&k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    // Stable: repeated keys keep their relative order.
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }
    url.to_string()
}

/// `<16 hex chars><ext>` for a stable URL.
pub fn media_filename(stable: &str, ext: &str) -> String {
    let digest = Sha256::digest(stable.as_bytes());
    format!("{}{}", hex::encode(&digest[..8]), ext)
}

fn bare_mime(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// File extension (with dot) for a response.
///
/// Common image types map directly; other types use the first extension of
/// the MIME table, then the URL path extension, then `.jpg`.
pub fn extension_for(content_type: &str, url: &str) -> String {
    let mime = bare_mime(content_type);
    let known = match mime.as_str() {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(".jpg"),
        "image/png" => Some(".png"),
        "image/webp" => Some(".webp"),
        "image/avif" => Some(".avif"),
        "image/gif" => Some(".gif"),
        "image/svg+xml" => Some(".svg"),
        _ => None,
    };
    if let Some(ext) = known {
        return ext.to_string();
    }
    if !mime.is_empty()
        && let Some(first) = mime_guess::get_mime_extensions_str(&mime).and_then(|e| e.first())
    {
        return format!(".{first}");
    }
    if let Ok(parsed) = Url::parse(url)
        && let Some(ext) = Path::new(parsed.path())
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty())
    {
        return format!(".{}", ext.to_ascii_lowercase());
    }
    ".jpg".to_string()
}

/// Downloads remote media into a local directory and remembers the result.
pub struct MediaDownloader {
    transport: Box<dyn MediaTransport>,
    out_dir: PathBuf,
    web_prefix: String,
    cache: Mutex<HashMap<String, String>>,
    processed: Mutex<HashMap<String, ImageValue>>,
    written: AtomicUsize,
}

impl MediaDownloader {
    pub fn new(
        transport: Box<dyn MediaTransport>,
        out_dir: impl Into<PathBuf>,
        web_prefix: &str,
    ) -> Self {
        Self {
            transport,
            out_dir: out_dir.into(),
            web_prefix: web_prefix.trim_end_matches('/').to_string(),
            cache: Mutex::new(HashMap::new()),
            processed: Mutex::new(HashMap::new()),
            written: AtomicUsize::new(0),
        }
    }

    /// Downloader over HTTP.
    pub fn http(out_dir: impl Into<PathBuf>, web_prefix: &str) -> Self {
        Self::new(Box::new(HttpTransport::new()), out_dir, web_prefix)
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cached(&self, url: &str) -> Option<String> {
        self.cache().get(url).cloned()
    }

    /// Number of files written so far.
    pub fn files_written(&self) -> usize {
        self.written.load(Ordering::Relaxed)
    }

    fn fetch(&self, url: &str) -> Result<MediaResponse, MediaError> {
        let response = self.transport.get(url)?;
        if !(200..300).contains(&response.status) {
            return Err(MediaError::Status {
                url: url.to_string(),
                status: response.status,
            });
        }
        Ok(response)
    }

    /// Download `url` into the media directory and return its web path.
    pub fn download(&self, url: &str) -> Result<String, MediaError> {
        if let Some(hit) = self.cached(url) {
            return Ok(hit);
        }
        let response = self.fetch(url)?;
        let ext = extension_for(&response.content_type, url);
        let filename = media_filename(&stable_url(url), &ext);

        fs::create_dir_all(&self.out_dir).map_err(|source| MediaError::Io {
            path: self.out_dir.clone(),
            source,
        })?;
        let path = self.out_dir.join(&filename);
        if fs::read(&path).is_ok_and(|existing| existing == response.body) {
            tracing::debug!(url = %url, file = %filename, "Media file unchanged");
        } else {
            write_public_file(&path, &response.body)?;
            self.written.fetch_add(1, Ordering::Relaxed);
        }

        let web_path = format!("{}/{}", self.web_prefix, filename);
        self.cache().insert(url.to_string(), web_path.clone());
        Ok(web_path)
    }

    /// Download `url` and return it inline as a `data:` URI.
    pub fn download_lqip(&self, url: &str) -> Result<String, MediaError> {
        if let Some(hit) = self.cached(url) {
            return Ok(hit);
        }
        let response = self.fetch(url)?;
        let mut mime = bare_mime(&response.content_type);
        if mime.is_empty() {
            mime = mime_guess::from_path(Url::parse(url).map(|u| u.path().to_string()).unwrap_or_default())
                .first_raw()
                .unwrap_or("image/jpeg")
                .to_string();
        }
        let data_uri = format!("data:{};base64,{}", mime, BASE64.encode(&response.body));
        self.cache().insert(url.to_string(), data_uri.clone());
        Ok(data_uri)
    }

    /// Resolve the full variant set of an image.
    ///
    /// Images without a URL pass through unchanged. Every failed variant is
    /// simply left out of the resolved map. A URL seen before reuses the
    /// earlier result, keeping the caller's alt text.
    pub fn process(self: &Arc<Self>, image: ImageValue) -> ImageValue {
        if image.is_empty() {
            return image;
        }
        if let Some(mut done) = self.processed().get(&image.url).cloned() {
            done.alt = image.alt;
            return done.with_downloader(Arc::clone(self));
        }
        // Memoised without the downloader handle so the map holds no cycle.
        let bare = image.clone();
        let image = image.with_downloader(Arc::clone(self));

        match self.download(&image.url) {
            Ok(local) => image.insert_resolved(image.url.clone(), local),
            Err(e) => tracing::warn!(url = %image.url, error = %e, "Failed to download image"),
        }
        let lqip_url = image.lqip_url();
        if let Ok(data_uri) = self.download_lqip(&lqip_url) {
            image.insert_resolved(lqip_url, data_uri);
        }
        for width in WIDTHS {
            self.resolve_variant(&image, image.width_url(width));
            for format in FORMATS {
                self.resolve_variant(&image, image.format_url(width, format));
            }
        }
        self.processed().insert(bare.url.clone(), bare);
        image
    }

    fn processed(&self) -> MutexGuard<'_, HashMap<String, ImageValue>> {
        self.processed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn resolve_variant(&self, image: &ImageValue, remote: String) {
        match self.download(&remote) {
            Ok(local) => image.insert_resolved(remote, local),
            Err(e) => tracing::debug!(url = %remote, error = %e, "Media variant unavailable"),
        }
    }

    /// The downloader as an image processor callback.
    pub fn processor(self: &Arc<Self>) -> ImageProcessor {
        let downloader = Arc::clone(self);
        Arc::new(move |image| downloader.process(image))
    }
}

fn write_public_file(path: &Path, bytes: &[u8]) -> Result<(), MediaError> {
    let io_err = |source| MediaError::Io {
        path: path.to_path_buf(),
        source,
    };
    fs::write(path, bytes).map_err(io_err)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o644)).map_err(io_err)?;
    }
    Ok(())
}
