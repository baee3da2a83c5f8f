//! The page content value handed to render functions.
//!
//! A [`PageContent`] carries three groups of data:
//!
//! - **addressing**: output path, content path, slug, locale, locale prefix;
//! - **content**: the CMS fields, subcollections, and SEO record;
//! - **build accessories**: the image processor, collection listings, and the
//!   layout id manifest.
//!
//! Field access goes through the [`Fields`] trait, shared by pages and
//! subcollection entries. Accessors never fail: a missing key yields the
//! zero value of the requested kind, and the `*_or` variants substitute a
//! fallback when the CMS value is absent or empty.
//!
//! ## Absent vs. present subcollections
//!
//! [`Subcollections::Absent`] means no CMS data was fetched at all (template
//! renders, failed fetches); [`Subcollections::Present`] means the data was
//! fetched, even if a given key has no entries. `subcollection_or` returns
//! one synthetic empty entry only in the absent case, so template files
//! render every subcollection block exactly once for schema discovery.

use crate::client::{LocaleInfo, PageData, RawEntry, RawFields, RawSubcollection, Seo};
use crate::fields::{self, FieldMap, UrlValue};
use crate::image::{ImageProcessor, ImageValue};
use crate::registry::LayoutManifest;
use maud::PreEscaped;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Collection key → the per-entry page content of that collection.
pub type Listings = BTreeMap<String, Vec<PageContent>>;

/// Whether subcollection data was fetched.
#[derive(Debug, Clone, Default)]
pub enum Subcollections {
    /// No CMS data at all.
    #[default]
    Absent,
    /// CMS data fetched; keys map to their (possibly empty) entries.
    Present(BTreeMap<String, Vec<Entry>>),
}

impl Subcollections {
    pub fn is_absent(&self) -> bool {
        matches!(self, Subcollections::Absent)
    }

    fn get(&self, key: &str) -> Option<&Vec<Entry>> {
        match self {
            Subcollections::Absent => None,
            Subcollections::Present(map) => map.get(key),
        }
    }

    fn for_each_entry_mut(&mut self, f: &mut impl FnMut(&mut Entry)) {
        if let Subcollections::Present(map) = self {
            for entries in map.values_mut() {
                for entry in entries {
                    f(entry);
                    entry.subcollections.for_each_entry_mut(f);
                }
            }
        }
    }
}

/// Render-time context shared by a page and all of its nested entries.
#[derive(Clone, Default)]
pub struct RenderCtx {
    /// `"/<code>"` in locale-prefixed builds, empty otherwise.
    pub locale_prefix: String,
    pub(crate) images: Option<ImageProcessor>,
}

impl fmt::Debug for RenderCtx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderCtx")
            .field("locale_prefix", &self.locale_prefix)
            .field("images", &self.images.is_some())
            .finish()
    }
}

/// One subcollection entry: its own fields and nested subcollections.
#[derive(Debug, Clone, Default)]
pub struct Entry {
    pub id: String,
    pub fields: FieldMap,
    pub subcollections: Subcollections,
    ctx: RenderCtx,
}

impl Entry {
    /// The placeholder entry rendered when no CMS data exists.
    fn synthetic(ctx: &RenderCtx) -> Self {
        Self {
            ctx: ctx.clone(),
            ..Self::default()
        }
    }

    pub fn new(id: impl Into<String>, fields: FieldMap, subcollections: Subcollections) -> Self {
        Self {
            id: id.into(),
            fields,
            subcollections,
            ctx: RenderCtx::default(),
        }
    }
}

/// Typed field accessors shared by pages and entries.
pub trait Fields {
    fn field_map(&self) -> &FieldMap;
    fn subcollection_map(&self) -> &Subcollections;
    fn render_ctx(&self) -> &RenderCtx;

    fn has(&self, key: &str) -> bool {
        self.field_map()
            .get(key)
            .is_some_and(|v| !fields::value_to_text(v).is_empty() || v.is_object())
    }

    fn text(&self, key: &str) -> String {
        self.field_map()
            .get(key)
            .map(fields::value_to_text)
            .unwrap_or_default()
    }

    fn text_or(&self, key: &str, fallback: &str) -> String {
        let text = self.text(key);
        if text.is_empty() {
            fallback.to_string()
        } else {
            text
        }
    }

    /// HTML from the CMS, inserted without escaping.
    fn rich_text(&self, key: &str) -> PreEscaped<String> {
        PreEscaped(self.text(key))
    }

    fn rich_text_or(&self, key: &str, fallback: &str) -> PreEscaped<String> {
        PreEscaped(self.text_or(key, fallback))
    }

    fn number(&self, key: &str) -> f64 {
        self.field_map()
            .get(key)
            .map(fields::value_to_number)
            .unwrap_or(0.0)
    }

    fn number_or(&self, key: &str, fallback: f64) -> f64 {
        match self.field_map().get(key) {
            Some(v) if has_number(v) => fields::value_to_number(v),
            _ => fallback,
        }
    }

    fn currency(&self, key: &str) -> f64 {
        self.number(key)
    }

    /// Image field, passed through the image processor when one is attached.
    fn image(&self, key: &str) -> ImageValue {
        let (url, alt) = self
            .field_map()
            .get(key)
            .map(fields::image_parts)
            .unwrap_or_default();
        let image = ImageValue::new(url, alt);
        match &self.render_ctx().images {
            Some(process) if !image.is_empty() => process(image),
            _ => image,
        }
    }

    fn image_or(&self, key: &str, fallback_url: &str) -> ImageValue {
        let image = self.image(key);
        if image.is_empty() {
            ImageValue::new(fallback_url, "")
        } else {
            image
        }
    }

    /// Link field; internal hrefs carry the locale prefix.
    fn url(&self, key: &str) -> UrlValue {
        let mut value = self
            .field_map()
            .get(key)
            .map(UrlValue::from_value)
            .unwrap_or_default();
        value.href = fields::prefix_href(&self.render_ctx().locale_prefix, &value.href);
        value
    }

    /// Link href with a fallback; both are locale-prefixed when internal.
    fn url_or(&self, key: &str, fallback: &str) -> String {
        let value = self.url(key);
        if value.is_empty() {
            self.localize(fallback)
        } else {
            value.href
        }
    }

    /// Prefix an internal path with the current locale.
    fn localize(&self, href: &str) -> String {
        fields::prefix_href(&self.render_ctx().locale_prefix, href)
    }

    /// Entries of a subcollection; empty when absent.
    fn subcollection(&self, key: &str) -> &[Entry] {
        self.subcollection_map()
            .get(key)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Entries of a subcollection, or one synthetic entry when no CMS data
    /// was fetched at all.
    fn subcollection_or(&self, key: &str) -> Cow<'_, [Entry]> {
        match self.subcollection_map() {
            Subcollections::Absent => Cow::Owned(vec![Entry::synthetic(self.render_ctx())]),
            present => Cow::Borrowed(present.get(key).map(Vec::as_slice).unwrap_or(&[])),
        }
    }
}

fn has_number(v: &serde_json::Value) -> bool {
    !fields::value_to_text(v).is_empty() || v.get("amount").is_some_and(|a| !a.is_null())
}

impl Fields for Entry {
    fn field_map(&self) -> &FieldMap {
        &self.fields
    }
    fn subcollection_map(&self) -> &Subcollections {
        &self.subcollections
    }
    fn render_ctx(&self) -> &RenderCtx {
        &self.ctx
    }
}

/// Everything a render function gets to see about one page.
#[derive(Debug, Clone, Default)]
pub struct PageContent {
    /// Output path (`/en/about` in a locale-prefixed build).
    pub path: String,
    /// Unprefixed path used for registry and layout lookups.
    pub content_path: String,
    pub slug: String,
    pub locale: String,
    pub locales: Vec<LocaleInfo>,
    pub default_locale: Option<String>,
    pub fields: FieldMap,
    pub subcollections: Subcollections,
    pub seo: Option<Seo>,
    /// Entries of every collection, attached to non-entry pages.
    pub listings: Arc<Listings>,
    /// Layout path prefix → layout id.
    pub layouts: Arc<LayoutManifest>,
    ctx: RenderCtx,
}

impl Fields for PageContent {
    fn field_map(&self) -> &FieldMap {
        &self.fields
    }
    fn subcollection_map(&self) -> &Subcollections {
        &self.subcollections
    }
    fn render_ctx(&self) -> &RenderCtx {
        &self.ctx
    }
}

impl PageContent {
    /// Page content with no CMS data: nil fields, absent subcollections, no SEO.
    pub fn empty(path: &str, slug: &str, locale: &str) -> Self {
        Self {
            path: path.to_string(),
            content_path: path.to_string(),
            slug: slug.to_string(),
            locale: locale.to_string(),
            ..Self::default()
        }
    }

    /// Convert a fetched page into page content.
    ///
    /// Field records tagged with another locale are ignored. The output and
    /// content paths come from the fetch job, not the response.
    pub fn from_page_data(data: PageData, path: &str, slug: &str, locale: &str) -> Self {
        let slug = if data.slug.is_empty() {
            slug.to_string()
        } else {
            data.slug
        };
        Self {
            path: path.to_string(),
            content_path: path.to_string(),
            slug,
            locale: locale.to_string(),
            fields: convert_fields(data.fields, locale),
            subcollections: convert_subcollections(data.subcollections, locale),
            ..Self::default()
        }
    }

    /// Registry lookup key: the content path, falling back to the output path.
    pub fn lookup_path(&self) -> &str {
        if self.content_path.is_empty() {
            &self.path
        } else {
            &self.content_path
        }
    }

    pub fn locale_prefix(&self) -> &str {
        &self.ctx.locale_prefix
    }

    /// Entries of collection `key`, in fetch order.
    pub fn listing(&self, key: &str) -> &[PageContent] {
        self.listings.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The layout id registered for `prefix`, if any.
    pub fn layout_id(&self, prefix: &str) -> Option<&str> {
        self.layouts.get(prefix).map(String::as_str)
    }

    /// SEO title, falling back to `fallback`.
    pub fn meta_title_or(&self, fallback: &str) -> String {
        match &self.seo {
            Some(seo) if !seo.meta_title.is_empty() => seo.meta_title.clone(),
            _ => fallback.to_string(),
        }
    }

    /// Attach an image processor to the page and every nested entry.
    pub fn set_image_processor(&mut self, processor: Option<ImageProcessor>) {
        self.ctx.images = processor.clone();
        self.subcollections
            .for_each_entry_mut(&mut |entry: &mut Entry| entry.ctx.images = processor.clone());
    }

    /// Set the locale prefix on the page and every nested entry so URL
    /// accessors prefix internal links.
    pub fn set_locale_prefix(&mut self, prefix: &str) {
        self.ctx.locale_prefix = prefix.to_string();
        self.subcollections
            .for_each_entry_mut(&mut |entry: &mut Entry| entry.ctx.locale_prefix = prefix.to_string());
    }
}

fn convert_fields(raw: RawFields, locale: &str) -> FieldMap {
    match raw {
        RawFields::List(records) => records
            .into_iter()
            .filter(|r| {
                r.locale
                    .as_deref()
                    .is_none_or(|l| l.is_empty() || l == locale)
            })
            .map(|r| (r.key, r.value))
            .collect(),
        RawFields::Map(map) => map.into_iter().collect(),
    }
}

fn convert_subcollections(raw: Vec<RawSubcollection>, locale: &str) -> Subcollections {
    let mut map: BTreeMap<String, Vec<Entry>> = BTreeMap::new();
    for sub in raw {
        let entries = map.entry(sub.key).or_default();
        entries.extend(sub.entries.into_iter().map(|e| convert_entry(e, locale)));
    }
    Subcollections::Present(map)
}

fn convert_entry(raw: RawEntry, locale: &str) -> Entry {
    Entry {
        id: raw.id,
        fields: convert_fields(raw.fields, locale),
        subcollections: convert_subcollections(raw.subcollections, locale),
        ctx: RenderCtx::default(),
    }
}
