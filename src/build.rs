//! The build orchestrator.
//!
//! A build runs the stages in order, leaves first:
//!
//! ```text
//! hook → locales → remote pages → plan → per-locale fetch + emit
//!      → template files → _routes.json / _router.js → sitemap + robots
//!      → schema payload
//! ```
//!
//! ## Locale expansion
//!
//! When the service reports a single locale (or the locale listing fails)
//! the site is built once, unprefixed, in the configured default locale.
//! With several locales every locale is built under `/<code>/...`, and the
//! default locale is emitted a second time without prefix from the same
//! fetched results, so `/` and `/<default>/` carry identical content.
//!
//! ## Errors
//!
//! Only filesystem failures, schema payload serialisation, hook failures,
//! and cancellation end a build. Service and media failures are logged and
//! absorbed by the stages that hit them.

use crate::client::{ContentClient, ContentSource, LocaleInfo, RemotePage};
use crate::config::{SiteConfig, normalize_site_url};
use crate::content::{Listings, PageContent};
use crate::emit::{self, EmitError, Emitter, PageOutcome};
use crate::fetch::{self, CancelToken, FetchOptions};
use crate::media::MediaDownloader;
use crate::plan::{FetchJob, plan};
use crate::registry::{LayoutManifest, Registry};
use crate::schema;
use crate::sitemap::{self, SitemapLocales};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use thiserror::Error;

/// Client-side router written to `_router.js`.
pub const ROUTER_SCRIPT: &str = include_str!("router.js");

pub const ROUTES_FILE: &str = "_routes.json";
pub const ROUTER_FILE: &str = "_router.js";

#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Emit(#[from] EmitError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to start fetch pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("pre-build hook failed: {0}")]
    Hook(String),
    #[error("build cancelled")]
    Cancelled,
}

/// What a build wrote.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BuildReport {
    /// Locale codes built, in build order. Empty for unprefixed single-locale builds.
    pub locales: Vec<String>,
    pub pages_written: usize,
    pub fragments_written: usize,
    pub templates_written: usize,
    /// Output paths with no registered component.
    pub skipped: Vec<String>,
    pub media_files: usize,
    pub routes_written: bool,
    pub router_written: bool,
    pub sitemap_files: Vec<String>,
    pub schema_file: Option<PathBuf>,
    pub schema_pushed: bool,
}

/// Run `argv` and fail unless it exits successfully.
pub fn run_hook(argv: &[String]) -> Result<(), BuildError> {
    let Some((program, args)) = argv.split_first() else {
        return Ok(());
    };
    tracing::info!(command = %argv.join(" "), "Running pre-build hook");
    let status = Command::new(program)
        .args(args)
        .status()
        .map_err(|e| BuildError::Hook(format!("{program}: {e}")))?;
    if status.success() {
        Ok(())
    } else {
        Err(BuildError::Hook(format!("`{}` exited with {status}", argv.join(" "))))
    }
}

/// `"/" + code` for the root, `"/" + code + path` otherwise.
pub fn prefixed_path(code: &str, path: &str) -> String {
    if path == "/" || path.is_empty() {
        format!("/{code}")
    } else {
        format!("/{code}{path}")
    }
}

/// Body of `_routes.json`.
#[derive(Serialize)]
struct Routes<'a> {
    layouts: &'a LayoutManifest,
}

/// Locale set resolved at the start of a build.
#[derive(Debug, Clone, PartialEq)]
struct LocalePlan {
    all: Vec<LocaleInfo>,
    default: String,
}

impl LocalePlan {
    fn is_multi(&self) -> bool {
        self.all.len() > 1
    }
}

/// Configurable build runner.
pub struct Builder<'a> {
    config: &'a SiteConfig,
    registry: &'a Registry,
    source: &'a dyn ContentSource,
    out_dir: PathBuf,
    media: Option<Arc<MediaDownloader>>,
    download_media: bool,
    cancel: CancelToken,
}

impl<'a> Builder<'a> {
    pub fn new(config: &'a SiteConfig, registry: &'a Registry, source: &'a dyn ContentSource) -> Self {
        Self {
            config,
            registry,
            source,
            out_dir: config.build.out_dir.clone(),
            media: None,
            download_media: config.build.download_media,
            cancel: CancelToken::new(),
        }
    }

    pub fn out_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.out_dir = dir.into();
        self
    }

    /// Use this downloader instead of an HTTP one.
    pub fn media(mut self, downloader: Arc<MediaDownloader>) -> Self {
        self.media = Some(downloader);
        self.download_media = true;
        self
    }

    pub fn without_media(mut self) -> Self {
        self.media = None;
        self.download_media = false;
        self
    }

    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    fn media_downloader(&self) -> Option<Arc<MediaDownloader>> {
        if !self.download_media {
            return None;
        }
        let prefix = &self.config.build.media_prefix;
        Some(self.media.clone().unwrap_or_else(|| {
            Arc::new(MediaDownloader::http(
                self.out_dir.join(prefix.trim_matches('/')),
                prefix,
            ))
        }))
    }

    /// Several reported locales take the service's default. Otherwise the
    /// configured default locale is built, whatever single locale the
    /// service reports.
    fn resolve_locales(&self) -> LocalePlan {
        let fallback = self.config.default_locale.clone();
        match self.source.list_locales() {
            Ok(all) if all.len() > 1 => {
                let default = all
                    .iter()
                    .find(|l| l.is_default)
                    .map(|l| l.locale.clone())
                    .unwrap_or(fallback);
                LocalePlan { all, default }
            }
            Ok(all) => LocalePlan {
                all,
                default: fallback,
            },
            Err(e) => {
                tracing::warn!(error = %e, "Failed to list locales; building the default locale only");
                LocalePlan {
                    all: Vec::new(),
                    default: fallback,
                }
            }
        }
    }

    fn remote_pages(&self) -> Vec<RemotePage> {
        self.source.list_pages().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to list remote pages; building fixed pages only");
            Vec::new()
        })
    }

    fn site_url(&self) -> Option<String> {
        if let Some(url) = self.config.configured_site_url() {
            return Some(url);
        }
        match self.source.site_info() {
            Ok(info) => info
                .domain
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(normalize_site_url),
            Err(e) => {
                tracing::warn!(error = %e, "No site URL; skipping sitemap");
                None
            }
        }
    }

    /// Run the whole build.
    pub fn run(&self) -> Result<BuildReport, BuildError> {
        if let Some(hook) = &self.config.pre_build_hook {
            run_hook(hook)?;
        }
        tracing::info!(out_dir = %self.out_dir.display(), "Building site");

        let locales = self.resolve_locales();
        let remote = self.remote_pages();
        let jobs = plan(self.registry, &remote);
        let pool = fetch::fetch_pool()?;
        let media = self.media_downloader();
        let processor = media.as_ref().map(MediaDownloader::processor);
        let manifest = Arc::new(self.registry.layout_manifest());
        let emitter = Emitter::new(self.registry, &self.out_dir, self.config.build.minify);
        let mut report = BuildReport::default();

        let codes: Vec<String> = if locales.is_multi() {
            locales.all.iter().map(|l| l.locale.clone()).collect()
        } else {
            vec![locales.default.clone()]
        };

        for code in &codes {
            tracing::info!(locale = %code, pages = jobs.len(), "Fetching content");
            let options = FetchOptions {
                locale: code,
                images: processor.as_ref(),
                media: media.as_deref(),
                cancel: &self.cancel,
            };
            let mut results = fetch::fetch_all(&pool, self.source, &jobs, options);
            if self.cancel.is_cancelled() {
                return Err(BuildError::Cancelled);
            }

            if !locales.is_multi() {
                self.emit_pass(&emitter, &jobs, results, &manifest, &mut report)?;
                continue;
            }

            report.locales.push(code.clone());
            let prefix = format!("/{code}");
            for content in &mut results {
                content.content_path = content.path.clone();
                content.path = prefixed_path(code, &content.content_path);
                content.locales = locales.all.clone();
                content.default_locale = Some(locales.default.clone());
                content.set_locale_prefix(&prefix);
            }

            if *code == locales.default {
                let unprefixed: Vec<PageContent> = results
                    .iter()
                    .cloned()
                    .map(|mut content| {
                        content.path = content.content_path.clone();
                        content.set_locale_prefix("");
                        content
                    })
                    .collect();
                self.emit_pass(&emitter, &jobs, results, &manifest, &mut report)?;
                self.emit_pass(&emitter, &jobs, unprefixed, &manifest, &mut report)?;
            } else {
                self.emit_pass(&emitter, &jobs, results, &manifest, &mut report)?;
            }
        }

        let templates = self.emit_templates(&emitter, &locales.default, &mut report)?;
        self.write_routes(&manifest, &mut report)?;

        if let Some(site_url) = self.site_url() {
            let date = sitemap::build_date();
            let groups = sitemap::collect(self.registry, &remote, &date);
            let sitemap_locales = if locales.is_multi() {
                SitemapLocales {
                    codes: codes.clone(),
                    default: locales.default.clone(),
                }
            } else {
                SitemapLocales::single()
            };
            report.sitemap_files =
                sitemap::write_sitemaps(&self.out_dir, &site_url, &groups, &sitemap_locales, &date)?;
        }

        self.sync_schema(&templates, &locales.default, &mut report)?;

        report.media_files = media.as_ref().map_or(0, |m| m.files_written());
        tracing::info!(
            pages = report.pages_written,
            fragments = report.fragments_written,
            templates = report.templates_written,
            "Build complete"
        );
        Ok(report)
    }

    /// Attach listings and the layout manifest, then write every page.
    ///
    /// Entry jobs precede listing jobs in the plan, so listings are complete
    /// before any listing page is written.
    fn emit_pass(
        &self,
        emitter: &Emitter<'_>,
        jobs: &[FetchJob],
        results: Vec<PageContent>,
        manifest: &Arc<LayoutManifest>,
        report: &mut BuildReport,
    ) -> Result<(), BuildError> {
        let mut listings = Listings::new();
        for (job, content) in jobs.iter().zip(&results) {
            if let Some(key) = &job.collection_key {
                listings.entry(key.clone()).or_default().push(content.clone());
            }
        }
        let listings = Arc::new(listings);

        for (job, mut content) in jobs.iter().zip(results) {
            if !job.is_entry() && !job.is_template {
                content.listings = Arc::clone(&listings);
            }
            content.layouts = Arc::clone(manifest);
            match emitter.emit_page(&content)? {
                PageOutcome::Written { fragments } => {
                    report.pages_written += 1;
                    report.fragments_written += fragments;
                }
                PageOutcome::Skipped => report.skipped.push(content.path),
            }
        }
        Ok(())
    }

    /// One template file per fixed page, collection listing, and collection
    /// template URL. Returns the page bodies keyed by path.
    fn emit_templates(
        &self,
        emitter: &Emitter<'_>,
        locale: &str,
        report: &mut BuildReport,
    ) -> Result<BTreeMap<String, String>, BuildError> {
        let paths = self
            .registry
            .pages()
            .iter()
            .map(|p| p.path.clone())
            .chain(self.registry.collections().iter().flat_map(|c| {
                [c.base_path.clone(), c.template_url.clone()]
            }));

        let mut bodies = BTreeMap::new();
        for path in paths {
            if bodies.contains_key(&path) {
                continue;
            }
            if let Some(body) = emitter.emit_template(&path, locale)? {
                report.templates_written += 1;
                bodies.insert(path, body);
            }
        }
        Ok(bodies)
    }

    fn write_routes(&self, manifest: &LayoutManifest, report: &mut BuildReport) -> Result<(), BuildError> {
        if manifest.is_empty() {
            return Ok(());
        }
        let bytes = serde_json::to_vec_pretty(&Routes { layouts: manifest })?;
        emit::write_file(&self.out_dir.join(ROUTES_FILE), &bytes)?;
        report.routes_written = true;

        if self.config.build.router_script {
            emit::write_file(&self.out_dir.join(ROUTER_FILE), ROUTER_SCRIPT.as_bytes())?;
            report.router_written = true;
        }
        Ok(())
    }

    fn sync_schema(
        &self,
        templates: &BTreeMap<String, String>,
        locale: &str,
        report: &mut BuildReport,
    ) -> Result<(), BuildError> {
        let build = &self.config.build;
        if build.schema_file.is_none() && !build.push_schema {
            return Ok(());
        }
        let payload = schema::build_payload(self.registry, templates, locale);

        if let Some(file) = &build.schema_file {
            let bytes = serde_json::to_vec_pretty(&payload)?;
            emit::write_file(file, &bytes)?;
            report.schema_file = Some(file.clone());
        }

        if build.push_schema {
            let value = serde_json::to_value(&payload)?;
            match self.source.push_schema(&value) {
                Ok(()) => report.schema_pushed = true,
                Err(e) => tracing::warn!(error = %e, "Failed to push schema"),
            }
        }
        Ok(())
    }
}

/// Build the site described by `config` and `registry` against the live
/// content service.
pub fn build(config: &SiteConfig, registry: &Registry) -> Result<BuildReport, BuildError> {
    let client = ContentClient::from_config(config);
    Builder::new(config, registry, &client).run()
}

/// Build into `out_dir` instead of the configured directory.
pub fn build_into(
    config: &SiteConfig,
    registry: &Registry,
    out_dir: &Path,
) -> Result<BuildReport, BuildError> {
    let client = ContentClient::from_config(config);
    Builder::new(config, registry, &client).out_dir(out_dir).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{PageData, Seo};
    use crate::content::Fields;
    use crate::test_helpers::{MockSource, MockTransport, read_output};
    use maud::html;
    use serde_json::json;
    use tempfile::TempDir;

    fn config() -> SiteConfig {
        SiteConfig::default()
    }

    fn run(
        config: &SiteConfig,
        registry: &Registry,
        source: &MockSource,
        tmp: &TempDir,
    ) -> BuildReport {
        Builder::new(config, registry, source)
            .out_dir(tmp.path())
            .without_media()
            .run()
            .unwrap()
    }

    #[test]
    fn prefixed_paths() {
        assert_eq!(prefixed_path("en", "/"), "/en");
        assert_eq!(prefixed_path("nl", "/about"), "/nl/about");
    }

    #[test]
    fn single_page_without_content() {
        let tmp = TempDir::new().unwrap();
        let mut r = Registry::new();
        r.page("/", |_| html! { (maud::PreEscaped("<html>empty</html>")) }, []);
        let report = run(&config(), &r, &MockSource::new(), &tmp);
        assert_eq!(read_output(tmp.path(), "index.html"), "<html>empty</html>");
        assert_eq!(report.pages_written, 1);
        assert_eq!(report.templates_written, 1);
        assert!(report.locales.is_empty());
        assert!(tmp.path().join("index.template.html").exists());
        assert!(!tmp.path().join("_routes.json").exists());
        assert!(!tmp.path().join("sitemap.xml").exists());
    }

    #[test]
    fn listings_reach_listing_pages() {
        let tmp = TempDir::new().unwrap();
        let mut r = Registry::new();
        r.collection(
            "/blog",
            "Blog",
            |p: &PageContent| {
                html! { @for entry in p.listing("blog") { (entry.text("title")) ";" } }
            },
            |p: &PageContent| html! { h1 { (p.text("title")) } },
        );
        let source = MockSource::new()
            .remote_page("/blog/first", None)
            .remote_page("/blog/second", None)
            .page("/blog/first", "en", json!({ "title": "First" }))
            .page("/blog/second", "en", json!({ "title": "Second" }));
        run(&config(), &r, &source, &tmp);
        assert_eq!(read_output(tmp.path(), "blog/index.html"), "First;Second;");
        assert_eq!(read_output(tmp.path(), "blog/first/index.html"), "<h1>First</h1>");
        assert!(tmp.path().join("blog/_template/index.template.html").exists());
    }

    #[test]
    fn multi_locale_emits_prefixed_and_default_unprefixed() {
        let tmp = TempDir::new().unwrap();
        let mut r = Registry::new();
        r.page("/", |p: &PageContent| html! { (p.text("title")) a href=(p.url_or("cta", "/features")) {} }, []);
        let source = MockSource::new()
            .locales(&[("en", true), ("nl", false)])
            .page("/", "en", json!({ "title": "Hello" }))
            .page("/", "nl", json!({ "title": "Hallo" }));
        let report = run(&config(), &r, &source, &tmp);

        assert_eq!(report.locales, vec!["en", "nl"]);
        assert_eq!(report.pages_written, 3);
        assert_eq!(
            read_output(tmp.path(), "en/index.html"),
            r#"Hello<a href="/en/features"></a>"#
        );
        assert_eq!(
            read_output(tmp.path(), "nl/index.html"),
            r#"Hallo<a href="/nl/features"></a>"#
        );
        assert_eq!(
            read_output(tmp.path(), "index.html"),
            r#"Hello<a href="/features"></a>"#
        );
    }

    #[test]
    fn single_reported_locale_builds_unprefixed() {
        let tmp = TempDir::new().unwrap();
        let mut r = Registry::new();
        r.page("/", |p: &PageContent| html! { (p.text("title")) }, []);
        let source = MockSource::new()
            .locales(&[("de", true)])
            .page("/", "de", json!({ "title": "Hallo" }));
        let mut cfg = config();
        cfg.default_locale = "de".into();
        run(&cfg, &r, &source, &tmp);
        assert_eq!(read_output(tmp.path(), "index.html"), "Hallo");
        assert!(!tmp.path().join("de").exists());
    }

    #[test]
    fn single_reported_locale_fetches_configured_default() {
        let tmp = TempDir::new().unwrap();
        let mut r = Registry::new();
        r.collection("/blog", "Blog", |_| html! {}, |p: &PageContent| html! { (p.text("title")) });
        let source = MockSource::new()
            .locales(&[("de", true)])
            .remote_page("/blog/first", None)
            .page("/blog/first", "en", json!({ "title": "First" }))
            .page("/blog/first", "de", json!({ "title": "Erste" }));
        run(&config(), &r, &source, &tmp);

        let calls = source.calls();
        assert!(calls.contains(&"get_page /blog/first en".to_string()));
        assert!(!calls.iter().any(|c| c.ends_with(" de")));
        assert_eq!(read_output(tmp.path(), "blog/first/index.html"), "First");
    }

    #[test]
    fn layouts_write_routes_router_and_fragments() {
        let tmp = TempDir::new().unwrap();
        let mut r = Registry::new();
        r.layout("/", "root", |_, b| html! { div data-layout="root" { (b) } })
            .page("/about", |_| html! { "about" }, []);
        let report = run(&config(), &r, &MockSource::new(), &tmp);
        assert!(report.routes_written && report.router_written);
        let routes: serde_json::Value =
            serde_json::from_str(&read_output(tmp.path(), "_routes.json")).unwrap();
        assert_eq!(routes["layouts"]["/"], "root");
        assert_eq!(read_output(tmp.path(), "_router.js"), ROUTER_SCRIPT);
        assert!(read_output(tmp.path(), "about/_root.html").ends_with("\nabout"));
        assert_eq!(report.fragments_written, 1);
    }

    #[test]
    fn router_script_can_be_disabled() {
        let tmp = TempDir::new().unwrap();
        let mut cfg = config();
        cfg.build.router_script = false;
        let mut r = Registry::new();
        r.layout("/", "root", |_, b| b).page("/", |_| html! {}, []);
        run(&cfg, &r, &MockSource::new(), &tmp);
        assert!(tmp.path().join("_routes.json").exists());
        assert!(!tmp.path().join("_router.js").exists());
    }

    #[test]
    fn sitemap_uses_site_domain_when_unconfigured() {
        let tmp = TempDir::new().unwrap();
        let mut r = Registry::new();
        r.page("/", |_| html! {}, []).page("/404", |_| html! {}, []);
        let source = MockSource::new().site_domain("example.com");
        let report = run(&config(), &r, &source, &tmp);
        assert_eq!(report.sitemap_files, vec!["sitemap.xml"]);
        assert!(tmp.path().join("404.html").exists());
        let xml = read_output(tmp.path(), "sitemap.xml");
        assert!(xml.contains("<loc>https://example.com/</loc>"));
        assert!(!xml.contains("/404"));
        assert!(read_output(tmp.path(), "robots.txt").contains("Sitemap: https://example.com/sitemap.xml"));
    }

    #[test]
    fn schema_is_written_and_pushed() {
        let tmp = TempDir::new().unwrap();
        let mut cfg = config();
        cfg.build.schema_file = Some(tmp.path().join("schema.json"));
        cfg.build.push_schema = true;
        let mut r = Registry::new();
        r.page("/", |p: &PageContent| html! { h1 data-cms-field="title" { (p.text("title")) } }, []);
        let source = MockSource::new().page("/", "en", json!({ "title": "Hi" }));
        let report = run(&cfg, &r, &source, &tmp);

        assert!(report.schema_pushed);
        assert_eq!(read_output(tmp.path(), "index.html"), "<h1>Hi</h1>");
        let written: serde_json::Value =
            serde_json::from_str(&read_output(tmp.path(), "schema.json")).unwrap();
        assert_eq!(written["pages"][0]["fields"][0]["key"], "title");
        assert_eq!(source.pushed().len(), 1);
    }

    #[test]
    fn failed_push_is_not_fatal() {
        let tmp = TempDir::new().unwrap();
        let mut cfg = config();
        cfg.build.push_schema = true;
        let mut r = Registry::new();
        r.page("/", |_| html! {}, []);
        let source = MockSource::new().failing_push();
        let report = run(&cfg, &r, &source, &tmp);
        assert!(!report.schema_pushed);
    }

    #[test]
    fn media_is_downloaded_through_the_builder() {
        let tmp = TempDir::new().unwrap();
        let mut r = Registry::new();
        r.page("/", |p: &PageContent| html! { img src=(p.image("hero").src()); }, []);
        let source = MockSource::new()
            .page("/", "en", json!({ "hero": { "url": "https://cdn.x/a.jpg", "alt": "" } }))
            .seo("/", "en", Seo::default());
        let media = Arc::new(MediaDownloader::new(
            Box::new(MockTransport::new().serve("https://cdn.x/a.jpg", "image/jpeg", b"J")),
            tmp.path().join("media"),
            "/media",
        ));
        let report = Builder::new(&config(), &r, &source)
            .out_dir(tmp.path())
            .media(media)
            .run()
            .unwrap();
        let html = read_output(tmp.path(), "index.html");
        assert!(html.contains("/media/"));
        assert!(!html.contains("cdn.x"));
        assert_eq!(report.media_files, 1);
    }

    #[test]
    fn cancelled_builds_fail() {
        let tmp = TempDir::new().unwrap();
        let mut r = Registry::new();
        r.page("/", |_| html! {}, []);
        let token = CancelToken::new();
        token.cancel();
        let cfg = config();
        let source = MockSource::new();
        let err = Builder::new(&cfg, &r, &source)
            .out_dir(tmp.path())
            .without_media()
            .cancel_token(token)
            .run()
            .unwrap_err();
        assert!(matches!(err, BuildError::Cancelled));
    }

    #[test]
    fn failing_hook_aborts() {
        let tmp = TempDir::new().unwrap();
        let mut cfg = config();
        cfg.pre_build_hook = Some(vec!["definitely-not-a-real-command-xyz".into()]);
        let r = Registry::new();
        let source = MockSource::new();
        let err = Builder::new(&cfg, &r, &source)
            .out_dir(tmp.path())
            .run()
            .unwrap_err();
        assert!(matches!(err, BuildError::Hook(_)));
    }

    #[test]
    fn unwritable_output_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("out");
        std::fs::write(&blocker, "not a directory").unwrap();
        let mut r = Registry::new();
        r.page("/", |_| html! {}, []);
        let cfg = config();
        let source = MockSource::new();
        let err = Builder::new(&cfg, &r, &source)
            .out_dir(&blocker)
            .without_media()
            .run()
            .unwrap_err();
        assert!(matches!(err, BuildError::Emit(_)));
    }

    #[test]
    fn content_failure_still_renders_seo() {
        let tmp = TempDir::new().unwrap();
        let mut r = Registry::new();
        r.page("/about", |p: &PageContent| html! { title { (p.meta_title_or("none")) } }, []);
        let source = MockSource::new()
            .page_data("/other", "en", PageData::default())
            .seo(
                "/about",
                "en",
                Seo {
                    meta_title: "About us".into(),
                    ..Seo::default()
                },
            );
        run(&config(), &r, &source, &tmp);
        assert_eq!(read_output(tmp.path(), "about/index.html"), "<title>About us</title>");
    }
}
