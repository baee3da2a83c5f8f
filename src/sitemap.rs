//! Sitemap and robots.txt generation.
//!
//! # URL set
//!
//! - every fixed page, except error pages (`404`, `500`) and pages
//!   registered with `no_sitemap`;
//! - every collection listing (priority `0.7`) and every remotely listed
//!   entry of it (priority `0.6`). `_template` URLs never appear.
//!
//! Fixed pages default to priority `1.0` at `/`, `0.8` one level deep and
//! `0.7` below that; change frequency is `daily` at `/` and `weekly`
//! elsewhere.
//!
//! # Locales
//!
//! With more than one locale every URL is listed once per locale: the
//! default locale under the unprefixed path, the others under `/<code>/...`.
//! Each `<url>` then carries one `xhtml:link` alternate per locale plus an
//! `x-default` pointing at the unprefixed path.
//!
//! # Files
//!
//! ```text
//! ≤1 collection and ≤50 000 URLs    sitemap.xml (urlset)
//! otherwise                         sitemap.xml (sitemapindex)
//!                                   sitemap-pages.xml
//!                                   sitemap-<key>.xml | sitemap-<key>-<n>.xml
//! ```

use crate::client::RemotePage;
use crate::emit::{EmitError, is_error_page, write_file};
use crate::registry::Registry;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::collections::{HashMap, HashSet};
use std::path::Path;

// ============================================================================
// Constants
// ============================================================================

/// URLs per sitemap file.
pub const MAX_URLS_PER_FILE: usize = 50_000;

const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";
const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";

const LISTING_PRIORITY: f64 = 0.7;
const ENTRY_PRIORITY: f64 = 0.6;

// ============================================================================
// URL collection
// ============================================================================

/// One unprefixed URL before locale expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct SitemapUrl {
    pub path: String,
    pub lastmod: String,
    pub priority: f64,
    pub changefreq: String,
}

/// URLs written to the same file family: `pages` or a collection key.
#[derive(Debug, Clone, PartialEq)]
pub struct SitemapGroup {
    pub key: String,
    pub urls: Vec<SitemapUrl>,
}

/// Locales a sitemap is written for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SitemapLocales {
    pub codes: Vec<String>,
    pub default: String,
}

impl SitemapLocales {
    pub fn single() -> Self {
        Self::default()
    }

    pub fn is_multi(&self) -> bool {
        self.codes.len() > 1
    }
}

fn depth(path: &str) -> usize {
    path.split('/').filter(|s| !s.is_empty()).count()
}

fn default_priority(path: &str) -> f64 {
    match depth(path) {
        0 => 1.0,
        1 => 0.8,
        _ => 0.7,
    }
}

fn default_changefreq(path: &str) -> &'static str {
    if depth(path) == 0 { "daily" } else { "weekly" }
}

fn excluded(path: &str) -> bool {
    is_error_page(path) || path.trim_end_matches('/').ends_with("/_template")
}

/// `YYYY-MM-DD` from a remote timestamp, or the build date.
pub fn format_lastmod(raw: Option<&str>, build_date: &str) -> String {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return build_date.to_string();
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.format("%Y-%m-%d").to_string();
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return dt.format("%Y-%m-%d").to_string();
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.format("%Y-%m-%d").to_string();
    }
    build_date.to_string()
}

/// Priority with at least one decimal: `1.0`, `0.8`, `0.65`.
pub fn format_priority(p: f64) -> String {
    let s = format!("{p}");
    if s.contains('.') { s } else { format!("{s}.0") }
}

/// Today in UTC as `YYYY-MM-DD`.
pub fn build_date() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}

/// Collect the unprefixed URL set, grouped by output file family.
pub fn collect(registry: &Registry, remote: &[RemotePage], build_date: &str) -> Vec<SitemapGroup> {
    let updated: HashMap<&str, Option<&str>> = remote
        .iter()
        .map(|p| (p.path.as_str(), p.updated_at.as_deref()))
        .collect();
    let lastmod = |path: &str| format_lastmod(updated.get(path).copied().flatten(), build_date);
    let mut seen: HashSet<String> = HashSet::new();

    let mut pages = SitemapGroup {
        key: "pages".to_string(),
        urls: Vec::new(),
    };
    for page in registry.pages() {
        if page.no_sitemap || excluded(&page.path) || !seen.insert(page.path.clone()) {
            continue;
        }
        pages.urls.push(SitemapUrl {
            path: page.path.clone(),
            lastmod: lastmod(&page.path),
            priority: page.priority.unwrap_or_else(|| default_priority(&page.path)),
            changefreq: page
                .change_freq
                .clone()
                .unwrap_or_else(|| default_changefreq(&page.path).to_string()),
        });
    }

    let mut groups = vec![pages];
    for collection in registry.collections() {
        let mut group = SitemapGroup {
            key: collection.key.clone(),
            urls: Vec::new(),
        };
        if seen.insert(collection.base_path.clone()) {
            group.urls.push(SitemapUrl {
                path: collection.base_path.clone(),
                lastmod: lastmod(&collection.base_path),
                priority: LISTING_PRIORITY,
                changefreq: "weekly".to_string(),
            });
        }
        for page in remote {
            if !collection.is_entry_path(&page.path)
                || excluded(&page.path)
                || !seen.insert(page.path.clone())
            {
                continue;
            }
            group.urls.push(SitemapUrl {
                path: page.path.clone(),
                lastmod: lastmod(&page.path),
                priority: ENTRY_PRIORITY,
                changefreq: "weekly".to_string(),
            });
        }
        groups.push(group);
    }
    groups
}

// ============================================================================
// XML
// ============================================================================

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn prefixed(code: &str, path: &str) -> String {
    if path == "/" || path.is_empty() {
        format!("/{code}")
    } else {
        format!("/{code}{path}")
    }
}

fn absolute(site_url: &str, path: &str) -> String {
    if path.is_empty() {
        format!("{site_url}/")
    } else {
        format!("{site_url}{path}")
    }
}

/// Rendered `<url>` elements of one URL, one per locale.
fn url_elements(url: &SitemapUrl, site_url: &str, locales: &SitemapLocales) -> Vec<String> {
    let body = format!(
        "<lastmod>{}</lastmod><priority>{}</priority><changefreq>{}</changefreq>",
        url.lastmod,
        format_priority(url.priority),
        escape_xml(&url.changefreq)
    );
    if !locales.is_multi() {
        return vec![format!(
            "<url><loc>{}</loc>{body}</url>",
            escape_xml(&absolute(site_url, &url.path))
        )];
    }

    let mut alternates = String::new();
    for code in &locales.codes {
        alternates.push_str(&format!(
            r#"<xhtml:link rel="alternate" hreflang="{}" href="{}"/>"#,
            escape_xml(code),
            escape_xml(&absolute(site_url, &prefixed(code, &url.path)))
        ));
    }
    alternates.push_str(&format!(
        r#"<xhtml:link rel="alternate" hreflang="x-default" href="{}"/>"#,
        escape_xml(&absolute(site_url, &url.path))
    ));

    locales
        .codes
        .iter()
        .map(|code| {
            let loc = if *code == locales.default {
                url.path.clone()
            } else {
                prefixed(code, &url.path)
            };
            format!(
                "<url><loc>{}</loc>{body}{alternates}</url>",
                escape_xml(&absolute(site_url, &loc))
            )
        })
        .collect()
}

fn urlset(elements: &[String], multi: bool) -> String {
    let mut xml = String::with_capacity(4096);
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push('\n');
    if multi {
        xml.push_str(&format!(r#"<urlset xmlns="{SITEMAP_NS}" xmlns:xhtml="{XHTML_NS}">"#));
    } else {
        xml.push_str(&format!(r#"<urlset xmlns="{SITEMAP_NS}">"#));
    }
    xml.push('\n');
    for element in elements {
        xml.push_str("  ");
        xml.push_str(element);
        xml.push('\n');
    }
    xml.push_str("</urlset>\n");
    xml
}

fn sitemap_index(site_url: &str, files: &[String], lastmod: &str) -> String {
    let mut xml = String::with_capacity(1024);
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push('\n');
    xml.push_str(&format!(r#"<sitemapindex xmlns="{SITEMAP_NS}">"#));
    xml.push('\n');
    for file in files {
        xml.push_str(&format!(
            "  <sitemap><loc>{}</loc><lastmod>{lastmod}</lastmod></sitemap>\n",
            escape_xml(&format!("{site_url}/{file}"))
        ));
    }
    xml.push_str("</sitemapindex>\n");
    xml
}

/// The robots.txt body.
pub fn robots_txt(site_url: &str) -> String {
    format!("User-agent: *\nAllow: /\n\nSitemap: {site_url}/sitemap.xml\n")
}

// ============================================================================
// Writing
// ============================================================================

/// Write `sitemap.xml` (plus shards when needed) and `robots.txt`.
///
/// Returns the sitemap file names written, index first.
pub fn write_sitemaps(
    out_dir: &Path,
    site_url: &str,
    groups: &[SitemapGroup],
    locales: &SitemapLocales,
    build_date: &str,
) -> Result<Vec<String>, EmitError> {
    let site_url = site_url.trim_end_matches('/');
    let multi = locales.is_multi();
    let rendered: Vec<(&str, Vec<String>)> = groups
        .iter()
        .map(|g| {
            let elements = g
                .urls
                .iter()
                .flat_map(|u| url_elements(u, site_url, locales))
                .collect();
            (g.key.as_str(), elements)
        })
        .collect();

    let collections = groups.len().saturating_sub(1);
    let total: usize = rendered.iter().map(|(_, e)| e.len()).sum();
    let mut written = Vec::new();

    if collections <= 1 && total <= MAX_URLS_PER_FILE {
        let all: Vec<String> = rendered.into_iter().flat_map(|(_, e)| e).collect();
        write_file(&out_dir.join("sitemap.xml"), urlset(&all, multi).as_bytes())?;
        written.push("sitemap.xml".to_string());
    } else {
        let mut shards = Vec::new();
        for (key, elements) in &rendered {
            if elements.is_empty() {
                continue;
            }
            let chunks: Vec<&[String]> = elements.chunks(MAX_URLS_PER_FILE).collect();
            let sharded = chunks.len() > 1;
            for (i, chunk) in chunks.into_iter().enumerate() {
                let name = if sharded {
                    format!("sitemap-{key}-{}.xml", i + 1)
                } else {
                    format!("sitemap-{key}.xml")
                };
                write_file(&out_dir.join(&name), urlset(chunk, multi).as_bytes())?;
                shards.push(name);
            }
        }
        write_file(
            &out_dir.join("sitemap.xml"),
            sitemap_index(site_url, &shards, build_date).as_bytes(),
        )?;
        written.push("sitemap.xml".to_string());
        written.extend(shards);
    }

    write_file(&out_dir.join("robots.txt"), robots_txt(site_url).as_bytes())?;
    Ok(written)
}
