//! Image field values.
//!
//! An [`ImageValue`] is passed around by value, but the map of resolved
//! variants it carries is shared: every clone points at the same
//! `Arc<Mutex<…>>`, so a variant downloaded while rendering one fragment is
//! visible to the production page and the other fragments of the same build.
//!
//! The resolved map is keyed by the *remote* variant URL (query included) and
//! holds either a local web path (`/media/1a2b3c4d5e6f7a8b.jpg`) or an inline
//! `data:` URI for the LQIP placeholder.

use crate::media::MediaDownloader;
use maud::{Markup, html};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Query parameters of the low-quality placeholder variant.
pub const LQIP_PARAMS: &str = "w=32&q=20";

/// Responsive widths resolved for every processed image.
pub const WIDTHS: [u32; 4] = [400, 800, 1200, 1600];

/// Alternate formats probed for every responsive width.
pub const FORMATS: [&str; 2] = ["avif", "webp"];

/// Transforms an image value into one whose variants are resolved.
pub type ImageProcessor = Arc<dyn Fn(ImageValue) -> ImageValue + Send + Sync>;

type ResolvedMap = Arc<Mutex<HashMap<String, String>>>;

/// An image field: remote URL, alt text, and the variants resolved so far.
#[derive(Clone, Default)]
pub struct ImageValue {
    pub url: String,
    pub alt: String,
    resolved: ResolvedMap,
    downloader: Option<Arc<MediaDownloader>>,
}

impl fmt::Debug for ImageValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageValue")
            .field("url", &self.url)
            .field("alt", &self.alt)
            .field("resolved", &self.lock().len())
            .field("downloader", &self.downloader.is_some())
            .finish()
    }
}

/// Append query parameters to a URL that may already carry a query.
pub fn variant_url(url: &str, params: &str) -> String {
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{url}{sep}{params}")
}

impl ImageValue {
    pub fn new(url: impl Into<String>, alt: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            alt: alt.into(),
            ..Self::default()
        }
    }

    /// Attach a downloader handle for lazily resolving uncommon widths.
    pub(crate) fn with_downloader(mut self, downloader: Arc<MediaDownloader>) -> Self {
        self.downloader = Some(downloader);
        self
    }

    pub(crate) fn insert_resolved(&self, remote: String, local: String) {
        self.lock().insert(remote, local);
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.resolved.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lookup(&self, remote: &str) -> Option<String> {
        self.lock().get(remote).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.url.is_empty()
    }

    pub fn lqip_url(&self) -> String {
        variant_url(&self.url, LQIP_PARAMS)
    }

    pub fn width_url(&self, width: u32) -> String {
        variant_url(&self.url, &format!("w={width}"))
    }

    pub fn format_url(&self, width: u32, format: &str) -> String {
        variant_url(&self.url, &format!("w={width}&format={format}"))
    }

    /// Snapshot of the resolved map.
    pub fn resolved(&self) -> HashMap<String, String> {
        self.lock().clone()
    }

    /// The full-size image: local path when downloaded, remote URL otherwise.
    pub fn src(&self) -> String {
        self.lookup(&self.url).unwrap_or_else(|| self.url.clone())
    }

    /// Inline placeholder data URI, empty when unavailable.
    pub fn lqip(&self) -> String {
        self.lookup(&self.lqip_url()).unwrap_or_default()
    }

    /// A specific width. Widths outside the pre-resolved set are downloaded
    /// on demand when a downloader is attached.
    pub fn src_width(&self, width: u32) -> String {
        let remote = self.width_url(width);
        if let Some(local) = self.lookup(&remote) {
            return local;
        }
        if let Some(downloader) = &self.downloader
            && !self.url.is_empty()
            && let Ok(local) = downloader.download(&remote)
        {
            self.insert_resolved(remote, local.clone());
            return local;
        }
        remote
    }

    /// `srcset` over the standard widths, falling back to remote URLs for
    /// widths that failed to download.
    pub fn srcset(&self) -> String {
        if self.url.is_empty() {
            return String::new();
        }
        WIDTHS
            .iter()
            .map(|w| {
                let remote = self.width_url(*w);
                let src = self.lookup(&remote).unwrap_or(remote);
                format!("{src} {w}w")
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Whether at least one width of `format` was confirmed by the server.
    pub fn has_format(&self, format: &str) -> bool {
        let map = self.lock();
        WIDTHS
            .iter()
            .any(|w| map.contains_key(&self.format_url(*w, format)))
    }

    /// `srcset` of the confirmed widths of `format`.
    pub fn srcset_format(&self, format: &str) -> String {
        let map = self.lock();
        WIDTHS
            .iter()
            .filter_map(|w| {
                map.get(&self.format_url(*w, format))
                    .map(|src| format!("{src} {w}w"))
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `<picture>` with `<source>` elements only for confirmed formats.
    pub fn picture(&self, sizes: &str) -> Markup {
        let lqip = self.lqip();
        let style = (!lqip.is_empty())
            .then(|| format!("background-image:url({lqip});background-size:cover"));
        html! {
            picture {
                @for format in FORMATS {
                    @if self.has_format(format) {
                        source type={ "image/" (format) } srcset=(self.srcset_format(format)) sizes=(sizes);
                    }
                }
                img src=(self.src()) srcset=(self.srcset()) sizes=(sizes) alt=(self.alt) style=[style] loading="lazy";
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_url_respects_existing_query() {
        assert_eq!(variant_url("https://x/a.jpg", "w=400"), "https://x/a.jpg?w=400");
        assert_eq!(
            variant_url("https://x/a.jpg?sig=1", "w=400"),
            "https://x/a.jpg?sig=1&w=400"
        );
    }

    #[test]
    fn unresolved_image_falls_back_to_remote() {
        let img = ImageValue::new("https://cdn.x/a.jpg", "A");
        assert_eq!(img.src(), "https://cdn.x/a.jpg");
        assert_eq!(img.lqip(), "");
        assert_eq!(img.src_width(400), "https://cdn.x/a.jpg?w=400");
        assert!(!img.has_format("webp"));
    }

    #[test]
    fn clones_share_resolved_map() {
        let img = ImageValue::new("https://cdn.x/a.jpg", "");
        let copy = img.clone();
        copy.insert_resolved("https://cdn.x/a.jpg".into(), "/media/abc.jpg".into());
        assert_eq!(img.src(), "/media/abc.jpg");
    }

    #[test]
    fn has_format_only_for_confirmed_variants() {
        let img = ImageValue::new("https://cdn.x/a.jpg", "");
        img.insert_resolved(img.format_url(800, "webp"), "/media/w.webp".into());
        assert!(img.has_format("webp"));
        assert!(!img.has_format("avif"));
        assert_eq!(img.srcset_format("webp"), "/media/w.webp 800w");
    }

    #[test]
    fn picture_omits_unconfirmed_sources() {
        let img = ImageValue::new("https://cdn.x/a.jpg", "Alt");
        img.insert_resolved(img.format_url(400, "avif"), "/media/a.avif".into());
        let html = img.picture("100vw").into_string();
        assert!(html.contains(r#"type="image/avif""#));
        assert!(!html.contains("image/webp"));
        assert!(html.contains(r#"alt="Alt""#));
    }

    #[test]
    fn empty_image_has_empty_srcset() {
        assert_eq!(ImageValue::default().srcset(), "");
    }
}
