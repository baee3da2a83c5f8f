//! Page, collection, layout, and email-template registrations.
//!
//! A site is described by registering descriptors on a [`Registry`] before
//! the build runs. The registry is plain data: the build borrows it
//! immutably, so nothing can be registered once a build has started.
//!
//! ## Layout chains
//!
//! A layout registered at `pathPrefix` applies to a content path `P` when the
//! prefix is `/`, equals `P`, or `P` starts with `pathPrefix + "/"`. The
//! chain is sorted by prefix length, outermost first. A page at exactly
//! `/blog` therefore gets both the `/` and the `/blog` layout.

use crate::content::PageContent;
use maud::Markup;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Renders a page body from its content.
pub type RenderFn = Arc<dyn Fn(&PageContent) -> Markup + Send + Sync>;

/// Wraps an inner body in a layout.
pub type WrapFn = Arc<dyn Fn(&PageContent, Markup) -> Markup + Send + Sync>;

/// Layout path prefix → layout id.
pub type LayoutManifest = BTreeMap<String, String>;

/// Per-page registration options.
#[derive(Debug, Clone, PartialEq)]
pub enum PageOption {
    /// Exclude the page from the sitemap.
    NoSitemap,
    /// Override the sitemap priority.
    Priority(f64),
    /// Override the sitemap change frequency.
    ChangeFreq(String),
}

pub fn no_sitemap() -> PageOption {
    PageOption::NoSitemap
}

pub fn priority(p: f64) -> PageOption {
    PageOption::Priority(p)
}

pub fn change_freq(freq: impl Into<String>) -> PageOption {
    PageOption::ChangeFreq(freq.into())
}

#[derive(Clone)]
pub struct PageDef {
    pub path: String,
    pub title: String,
    pub render: RenderFn,
    pub no_sitemap: bool,
    pub priority: Option<f64>,
    pub change_freq: Option<String>,
}

#[derive(Clone)]
pub struct CollectionDef {
    pub base_path: String,
    /// First path segment of `base_path`.
    pub key: String,
    pub label: String,
    pub listing: RenderFn,
    pub entry: RenderFn,
    /// Always `base_path + "/_template"`.
    pub template_url: String,
}

impl CollectionDef {
    /// Whether `path` is an entry of this collection (template URL excluded).
    pub fn is_entry_path(&self, path: &str) -> bool {
        path != self.template_url
            && path
                .strip_prefix(&self.base_path)
                .is_some_and(|rest| rest.starts_with('/') && rest.len() > 1)
    }
}

#[derive(Clone)]
pub struct LayoutDef {
    pub path_prefix: String,
    pub id: String,
    pub wrap: WrapFn,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailTemplateDef {
    pub key: String,
    pub label: String,
    pub subject: String,
    pub html: String,
    pub variables: Vec<String>,
}

macro_rules! opaque_debug {
    ($ty:ty, $($field:ident),+) => {
        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($ty))
                    $(.field(stringify!($field), &self.$field))+
                    .finish_non_exhaustive()
            }
        }
    };
}

opaque_debug!(PageDef, path, title, no_sitemap, priority, change_freq);
opaque_debug!(CollectionDef, base_path, key, label, template_url);
opaque_debug!(LayoutDef, path_prefix, id);

/// Derive a display title from a URL path.
///
/// - `"/"` → `"Home"`
/// - `"/contact-us"` → `"Contact Us"`
/// - `"/blog/my-first-post"` → `"My First Post"`
pub fn title_from_path(path: &str) -> String {
    let last = path.trim_matches('/').rsplit('/').next().unwrap_or("");
    if last.is_empty() {
        return "Home".to_string();
    }
    last.split('-')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Last path segment; the root page is `"index"`.
pub fn slug_from_path(path: &str) -> String {
    match path.trim_matches('/').rsplit('/').next() {
        Some(last) if !last.is_empty() => last.to_string(),
        _ => "index".to_string(),
    }
}

/// Descriptors registered for one site.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    pages: Vec<PageDef>,
    collections: Vec<CollectionDef>,
    layouts: Vec<LayoutDef>,
    email_templates: Vec<EmailTemplateDef>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fixed page with a title derived from its path.
    pub fn page<F>(
        &mut self,
        path: &str,
        render: F,
        options: impl IntoIterator<Item = PageOption>,
    ) -> &mut Self
    where
        F: Fn(&PageContent) -> Markup + Send + Sync + 'static,
    {
        self.page_titled(path, &title_from_path(path), render, options)
    }

    /// Register a fixed page with an explicit title.
    pub fn page_titled<F>(
        &mut self,
        path: &str,
        title: &str,
        render: F,
        options: impl IntoIterator<Item = PageOption>,
    ) -> &mut Self
    where
        F: Fn(&PageContent) -> Markup + Send + Sync + 'static,
    {
        let mut def = PageDef {
            path: path.to_string(),
            title: title.to_string(),
            render: Arc::new(render),
            no_sitemap: false,
            priority: None,
            change_freq: None,
        };
        for option in options {
            match option {
                PageOption::NoSitemap => def.no_sitemap = true,
                PageOption::Priority(p) => def.priority = Some(p),
                PageOption::ChangeFreq(f) => def.change_freq = Some(f),
            }
        }
        self.pages.push(def);
        self
    }

    /// Register a collection: a listing page at `base_path` plus one entry
    /// page per remote page under it.
    pub fn collection<L, E>(&mut self, base_path: &str, label: &str, listing: L, entry: E) -> &mut Self
    where
        L: Fn(&PageContent) -> Markup + Send + Sync + 'static,
        E: Fn(&PageContent) -> Markup + Send + Sync + 'static,
    {
        let base_path = base_path.trim_end_matches('/').to_string();
        let key = base_path
            .trim_start_matches('/')
            .split('/')
            .next()
            .unwrap_or("")
            .to_string();
        self.collections.push(CollectionDef {
            template_url: format!("{base_path}/_template"),
            base_path,
            key,
            label: label.to_string(),
            listing: Arc::new(listing),
            entry: Arc::new(entry),
        });
        self
    }

    pub fn email_template(
        &mut self,
        key: &str,
        label: &str,
        subject: &str,
        html: &str,
        variables: &[&str],
    ) -> &mut Self {
        self.email_templates.push(EmailTemplateDef {
            key: key.to_string(),
            label: label.to_string(),
            subject: subject.to_string(),
            html: html.to_string(),
            variables: variables.iter().map(|v| v.to_string()).collect(),
        });
        self
    }

    pub fn layout<W>(&mut self, path_prefix: &str, id: &str, wrap: W) -> &mut Self
    where
        W: Fn(&PageContent, Markup) -> Markup + Send + Sync + 'static,
    {
        self.layouts.push(LayoutDef {
            path_prefix: path_prefix.to_string(),
            id: id.to_string(),
            wrap: Arc::new(wrap),
        });
        self
    }

    pub fn pages(&self) -> &[PageDef] {
        &self.pages
    }

    pub fn collections(&self) -> &[CollectionDef] {
        &self.collections
    }

    pub fn layouts(&self) -> &[LayoutDef] {
        &self.layouts
    }

    pub fn email_templates(&self) -> &[EmailTemplateDef] {
        &self.email_templates
    }

    pub fn find_page(&self, path: &str) -> Option<&PageDef> {
        self.pages.iter().find(|p| p.path == path)
    }

    /// Layouts applying to `content_path`, outermost first.
    pub fn layout_chain(&self, content_path: &str) -> Vec<&LayoutDef> {
        let mut chain: Vec<&LayoutDef> = self
            .layouts
            .iter()
            .filter(|l| {
                l.path_prefix == "/"
                    || l.path_prefix == content_path
                    || content_path.starts_with(&format!("{}/", l.path_prefix))
            })
            .collect();
        // Stable: equal-length prefixes keep registration order.
        chain.sort_by_key(|l| l.path_prefix.len());
        chain
    }

    /// The render function for a page, or `None` when nothing is registered.
    ///
    /// Fixed pages win over collections; within a collection the template
    /// URL and entries use the entry renderer, the base path the listing.
    pub fn resolve_component(&self, content: &PageContent) -> Option<&RenderFn> {
        let path = content.lookup_path();
        if let Some(page) = self.find_page(path) {
            return Some(&page.render);
        }
        for collection in &self.collections {
            if path == collection.template_url {
                return Some(&collection.entry);
            }
            if path == collection.base_path {
                return Some(&collection.listing);
            }
            if path.starts_with(&format!("{}/", collection.base_path)) {
                return Some(&collection.entry);
            }
        }
        None
    }

    pub fn layout_manifest(&self) -> LayoutManifest {
        self.layouts
            .iter()
            .map(|l| (l.path_prefix.clone(), l.id.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maud::html;

    fn body(text: &'static str) -> impl Fn(&PageContent) -> Markup + Send + Sync + 'static {
        move |_: &PageContent| html! { (text) }
    }

    fn render(registry: &Registry, path: &str) -> Option<String> {
        let content = PageContent::empty(path, "", "en");
        registry
            .resolve_component(&content)
            .map(|r| r(&content).into_string())
    }

    #[test]
    fn titles_derived_from_paths() {
        assert_eq!(title_from_path("/"), "Home");
        assert_eq!(title_from_path("/contact-us"), "Contact Us");
        assert_eq!(title_from_path("/blog/my-first-post"), "My First Post");
        assert_eq!(title_from_path("/about/"), "About");
    }

    #[test]
    fn slugs_derived_from_paths() {
        assert_eq!(slug_from_path("/"), "index");
        assert_eq!(slug_from_path("/blog/hello"), "hello");
    }

    #[test]
    fn page_options_compose() {
        let mut r = Registry::new();
        r.page("/about", body("a"), [priority(0.5), change_freq("monthly"), no_sitemap()]);
        let page = &r.pages()[0];
        assert_eq!(page.title, "About");
        assert_eq!(page.priority, Some(0.5));
        assert_eq!(page.change_freq.as_deref(), Some("monthly"));
        assert!(page.no_sitemap);
    }

    #[test]
    fn explicit_title_wins() {
        let mut r = Registry::new();
        r.page_titled("/", "Welcome", body("x"), []);
        assert_eq!(r.pages()[0].title, "Welcome");
    }

    #[test]
    fn collection_derives_key_and_template_url() {
        let mut r = Registry::new();
        r.collection("/blog", "Blog", body("list"), body("entry"));
        let c = &r.collections()[0];
        assert_eq!(c.key, "blog");
        assert_eq!(c.template_url, "/blog/_template");
        assert!(c.is_entry_path("/blog/first"));
        assert!(!c.is_entry_path("/blog/_template"));
        assert!(!c.is_entry_path("/blog"));
        assert!(!c.is_entry_path("/blogger"));
    }

    #[test]
    fn registration_order_preserved() {
        let mut r = Registry::new();
        r.page("/b", body("b"), []).page("/a", body("a"), []);
        let paths: Vec<&str> = r.pages().iter().map(|p| p.path.as_str()).collect();
        assert_eq!(paths, vec!["/b", "/a"]);
    }

    #[test]
    fn layout_chain_outermost_first() {
        let mut r = Registry::new();
        r.layout("/blog", "blog", |_, b| b)
            .layout("/", "root", |_, b| b)
            .layout("/docs", "docs", |_, b| b);
        let ids = |p: &str| -> Vec<String> {
            r.layout_chain(p).iter().map(|l| l.id.clone()).collect()
        };
        assert_eq!(ids("/blog/post"), vec!["root", "blog"]);
        assert_eq!(ids("/blog"), vec!["root", "blog"]);
        assert_eq!(ids("/blogger"), vec!["root"]);
        assert_eq!(ids("/"), vec!["root"]);
    }

    #[test]
    fn resolve_component_order() {
        let mut r = Registry::new();
        r.page("/blog/featured", body("fixed"), [])
            .collection("/blog", "Blog", body("list"), body("entry"));
        assert_eq!(render(&r, "/blog/featured").as_deref(), Some("fixed"));
        assert_eq!(render(&r, "/blog").as_deref(), Some("list"));
        assert_eq!(render(&r, "/blog/_template").as_deref(), Some("entry"));
        assert_eq!(render(&r, "/blog/post").as_deref(), Some("entry"));
        assert_eq!(render(&r, "/unknown"), None);
    }

    #[test]
    fn resolve_uses_content_path_over_output_path() {
        let mut r = Registry::new();
        r.page("/about", body("about"), []);
        let mut content = PageContent::empty("/nl/about", "about", "nl");
        content.content_path = "/about".into();
        assert!(r.resolve_component(&content).is_some());
    }

    #[test]
    fn layout_manifest_maps_prefix_to_id() {
        let mut r = Registry::new();
        r.layout("/", "root", |_, b| b).layout("/blog", "blog", |_, b| b);
        let m = r.layout_manifest();
        assert_eq!(m.get("/").map(String::as_str), Some("root"));
        assert_eq!(m.get("/blog").map(String::as_str), Some("blog"));
    }

    #[test]
    fn email_templates_recorded() {
        let mut r = Registry::new();
        r.email_template("welcome", "Welcome", "Hi {{name}}", "<p>Hi</p>", &["name"]);
        assert_eq!(r.email_templates()[0].variables, vec!["name"]);
    }
}
