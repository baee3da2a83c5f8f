//! Layout composition, fragments, and authoring-attribute stripping.
//!
//! For a chain `[L0, L1, ..., Lk-1]` (outermost first) and a page body `C`,
//! the full page is `L0(L1(...Lk-1(C)))`. The fragment for layout `Lt` is
//! whatever fills `Lt`'s slot: `Lt+1(...Lk-1(C))`, or just `C` for the
//! innermost layout. The client-side router swaps fragments in place so
//! navigation keeps the outer layouts mounted.

use crate::content::PageContent;
use crate::registry::LayoutDef;
use maud::Markup;
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// `data-cms-*` names that are runtime hooks rather than authoring metadata.
const KEPT_CMS_ATTRIBUTES: [&str; 2] = ["form", "form-field"];

static CMS_META_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<meta\s+name\s*=\s*["']cms-[^"']*["'][^>]*>"#).expect("invalid cms meta regex")
});

static CMS_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\s+data-cms-([A-Za-z0-9_-]+)(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'=<>`]+))?"#)
        .expect("invalid cms attribute regex")
});

/// Wrap `body` in every layout of `chain`, innermost first.
pub fn compose(chain: &[&LayoutDef], content: &PageContent, body: Markup) -> Markup {
    chain
        .iter()
        .rev()
        .fold(body, |inner, layout| (layout.wrap)(content, inner))
}

/// The markup inside layout `id`'s slot.
///
/// An id not present in the chain yields the bare body.
pub fn fragment(chain: &[&LayoutDef], id: &str, content: &PageContent, body: Markup) -> Markup {
    match chain.iter().position(|l| l.id == id) {
        Some(t) => compose(&chain[t + 1..], content, body),
        None => body,
    }
}

/// `<!--route:{"t":...}-->` plus a newline.
///
/// Angle brackets in the title are JSON-escaped so the comment can't be
/// closed early.
pub fn route_comment(title: &str) -> String {
    let meta = serde_json::json!({ "t": title }).to_string();
    let meta = meta.replace('<', "\\u003c").replace('>', "\\u003e");
    format!("<!--route:{meta}-->\n")
}

/// Fragment title: the SEO meta title, else the slug.
pub fn route_title(content: &PageContent) -> String {
    content.meta_title_or(&content.slug)
}

/// Remove `<meta name="cms-*">` tags and `data-cms-*` attributes, keeping
/// `data-cms-form` and `data-cms-form-field`. Idempotent.
pub fn strip_cms_attributes(html: &str) -> String {
    let without_meta = CMS_META_RE.replace_all(html, "");
    CMS_ATTR_RE
        .replace_all(&without_meta, |caps: &Captures| {
            if KEPT_CMS_ATTRIBUTES.contains(&&caps[1]) {
                caps[0].to_string()
            } else {
                String::new()
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use maud::html;

    fn registry() -> Registry {
        let mut r = Registry::new();
        r.layout("/", "root", |_, body| html! { root-layout { (body) } })
            .layout("/blog", "blog", |_, body| html! { blog-layout { (body) } });
        r
    }

    fn body() -> Markup {
        html! { "entry-content" }
    }

    #[test]
    fn compose_wraps_outermost_first() {
        let r = registry();
        let content = PageContent::empty("/blog/post", "post", "en");
        let html = compose(&r.layout_chain("/blog/post"), &content, body()).into_string();
        assert_eq!(
            html,
            "<root-layout><blog-layout>entry-content</blog-layout></root-layout>"
        );
    }

    #[test]
    fn empty_chain_is_the_raw_body() {
        let content = PageContent::empty("/", "index", "en");
        assert_eq!(compose(&[], &content, body()).into_string(), "entry-content");
    }

    #[test]
    fn fragments_fill_each_slot() {
        let r = registry();
        let chain = r.layout_chain("/blog/post");
        let content = PageContent::empty("/blog/post", "post", "en");
        assert_eq!(
            fragment(&chain, "root", &content, body()).into_string(),
            "<blog-layout>entry-content</blog-layout>"
        );
        assert_eq!(
            fragment(&chain, "blog", &content, body()).into_string(),
            "entry-content"
        );
        assert_eq!(
            fragment(&chain, "missing", &content, body()).into_string(),
            "entry-content"
        );
    }

    #[test]
    fn route_comment_is_json() {
        assert_eq!(route_comment("About"), "<!--route:{\"t\":\"About\"}-->\n");
        let tricky = route_comment("a --> b");
        assert!(tricky.starts_with("<!--route:{"));
        assert_eq!(tricky.matches("-->").count(), 1);
    }

    #[test]
    fn route_title_prefers_seo() {
        let mut content = PageContent::empty("/about", "about", "en");
        assert_eq!(route_title(&content), "about");
        content.seo = Some(crate::client::Seo {
            meta_title: "About us".into(),
            ..Default::default()
        });
        assert_eq!(route_title(&content), "About us");
    }

    #[test]
    fn strips_cms_attributes_and_meta() {
        let html = concat!(
            r#"<head><meta name="cms-page" content="home"><meta name="cms-x" content="y" />"#,
            r#"<meta name="description" content="d"></head>"#,
            r#"<h1 class="t" data-cms-field="title" data-cms-type='text'>Hi</h1>"#,
            r#"<ul data-cms-subcollection="team" data-cms-repeat><li>a</li></ul>"#,
        );
        let stripped = strip_cms_attributes(html);
        assert_eq!(
            stripped,
            concat!(
                r#"<head><meta name="description" content="d"></head>"#,
                r#"<h1 class="t">Hi</h1>"#,
                r#"<ul><li>a</li></ul>"#,
            )
        );
    }

    #[test]
    fn form_hooks_and_layout_attributes_survive() {
        let html = r#"<form data-cms-form="contact" data-layout="root"><input data-cms-form-field="email" data-cms-label="E"></form>"#;
        let stripped = strip_cms_attributes(html);
        assert_eq!(
            stripped,
            r#"<form data-cms-form="contact" data-layout="root"><input data-cms-form-field="email"></form>"#
        );
    }

    #[test]
    fn stripping_is_idempotent() {
        let html = r#"<div data-cms-field="a" data-cms-form="f"><meta name="cms-k" content="v"></div>"#;
        let once = strip_cms_attributes(html);
        assert_eq!(strip_cms_attributes(&once), once);
        assert!(!once.contains("data-cms-field"));
    }
}
