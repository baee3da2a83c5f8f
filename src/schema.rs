//! Schema discovery and the schema-sync payload.
//!
//! Template files are rendered from empty content, so every field and
//! subcollection a component can show is present exactly once, annotated
//! with authoring attributes:
//!
//! ```html
//! <h1 data-cms-field="title" data-cms-type="text" data-cms-label="Title">…</h1>
//! <ul data-cms-subcollection="team">
//!   <li><span data-cms-field="name">…</span></li>
//! </ul>
//! ```
//!
//! [`discover`] walks the tag structure of such HTML and returns the
//! field tree. Fields inside a subcollection element belong to that
//! subcollection, and subcollections nest. [`build_payload`] turns the
//! discoveries of a whole site into the payload the content service
//! accepts on `POST /sync`.

use crate::content::PageContent;
use crate::registry::{EmailTemplateDef, Registry, slug_from_path};
use maud::html;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<(/)?([A-Za-z][A-Za-z0-9-]*)((?:[^>"']|"[^"]*"|'[^']*')*?)(/)?>"#)
        .expect("invalid tag regex")
});

static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+))"#)
        .expect("invalid attribute regex")
});

const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

const DEFAULT_FIELD_TYPE: &str = "text";

// ============================================================================
// Discovery
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaField {
    pub key: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaSubcollection {
    pub key: String,
    pub label: String,
    pub fields: Vec<SchemaField>,
    pub subcollections: Vec<SchemaSubcollection>,
}

/// Fields and subcollections found in one template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Discovered {
    pub fields: Vec<SchemaField>,
    pub subcollections: Vec<SchemaSubcollection>,
}

trait Scope {
    fn fields_mut(&mut self) -> &mut Vec<SchemaField>;
    fn subcollections_mut(&mut self) -> &mut Vec<SchemaSubcollection>;

    fn add_field(&mut self, field: SchemaField) {
        let fields = self.fields_mut();
        if !fields.iter().any(|f| f.key == field.key) {
            fields.push(field);
        }
    }

    fn add_subcollection(&mut self, sub: SchemaSubcollection) {
        let subs = self.subcollections_mut();
        match subs.iter_mut().find(|s| s.key == sub.key) {
            Some(existing) => {
                for field in sub.fields {
                    existing.add_field(field);
                }
                for nested in sub.subcollections {
                    existing.add_subcollection(nested);
                }
            }
            None => subs.push(sub),
        }
    }
}

impl Scope for Discovered {
    fn fields_mut(&mut self) -> &mut Vec<SchemaField> {
        &mut self.fields
    }
    fn subcollections_mut(&mut self) -> &mut Vec<SchemaSubcollection> {
        &mut self.subcollections
    }
}

impl Scope for SchemaSubcollection {
    fn fields_mut(&mut self) -> &mut Vec<SchemaField> {
        &mut self.fields
    }
    fn subcollections_mut(&mut self) -> &mut Vec<SchemaSubcollection> {
        &mut self.subcollections
    }
}

/// `hero_image` → `Hero Image`.
pub fn humanize(key: &str) -> String {
    key.split(['_', '-', ' '])
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

fn unescape(value: &str) -> String {
    value
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn attributes(raw: &str) -> HashMap<String, String> {
    ATTR_RE
        .captures_iter(raw)
        .map(|caps| {
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| unescape(m.as_str()))
                .unwrap_or_default();
            (caps[1].to_ascii_lowercase(), value)
        })
        .collect()
}

struct Frame {
    tag: String,
    sub: Option<SchemaSubcollection>,
}

struct Walker {
    root: Discovered,
    stack: Vec<Frame>,
}

impl Walker {
    fn scope(&mut self) -> &mut dyn Scope {
        match self.stack.iter_mut().rev().find_map(|f| f.sub.as_mut()) {
            Some(sub) => sub,
            None => &mut self.root,
        }
    }

    fn pop(&mut self) {
        if let Some(Frame { sub: Some(sub), .. }) = self.stack.pop() {
            self.scope().add_subcollection(sub);
        }
    }

    fn close(&mut self, tag: &str) {
        // Unclosed elements above the match are closed implicitly.
        if let Some(pos) = self.stack.iter().rposition(|f| f.tag == tag) {
            while self.stack.len() > pos {
                self.pop();
            }
        }
    }

    fn open(&mut self, tag: String, attrs: HashMap<String, String>, self_closing: bool) {
        if let Some(key) = attrs.get("data-cms-field").filter(|k| !k.is_empty()) {
            let field = SchemaField {
                key: key.clone(),
                kind: attrs
                    .get("data-cms-type")
                    .filter(|t| !t.is_empty())
                    .cloned()
                    .unwrap_or_else(|| DEFAULT_FIELD_TYPE.to_string()),
                label: attrs
                    .get("data-cms-label")
                    .filter(|l| !l.is_empty())
                    .cloned()
                    .unwrap_or_else(|| humanize(key)),
            };
            self.scope().add_field(field);
        }

        let sub = attrs
            .get("data-cms-subcollection")
            .filter(|k| !k.is_empty())
            .map(|key| SchemaSubcollection {
                key: key.clone(),
                label: humanize(key),
                ..SchemaSubcollection::default()
            });
        let is_void = self_closing || VOID_ELEMENTS.contains(&tag.as_str());
        match (sub, is_void) {
            (Some(sub), true) => self.scope().add_subcollection(sub),
            (sub, false) => self.stack.push(Frame { tag, sub }),
            (None, true) => {}
        }
    }
}

/// Discover the fields and subcollections annotated in `html`.
pub fn discover(html: &str) -> Discovered {
    let mut walker = Walker {
        root: Discovered::default(),
        stack: Vec::new(),
    };
    for caps in TAG_RE.captures_iter(html) {
        let tag = caps[2].to_ascii_lowercase();
        if caps.get(1).is_some() {
            walker.close(&tag);
        } else {
            let attrs = attributes(caps.get(3).map_or("", |m| m.as_str()));
            walker.open(tag, attrs, caps.get(4).is_some());
        }
    }
    while !walker.stack.is_empty() {
        walker.pop();
    }
    walker.root
}

// ============================================================================
// Payload
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageSchema {
    pub path: String,
    pub title: String,
    pub fields: Vec<SchemaField>,
    pub subcollections: Vec<SchemaSubcollection>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionSchema {
    pub key: String,
    pub label: String,
    /// Entry path pattern, `<base>/:slug`.
    pub base_path: String,
    pub listing_path: String,
    pub template_url: String,
    pub fields: Vec<SchemaField>,
    pub subcollections: Vec<SchemaSubcollection>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutSchema {
    pub path_prefix: String,
    pub id: String,
    pub fields: Vec<SchemaField>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaPayload {
    pub pages: Vec<PageSchema>,
    pub collections: Vec<CollectionSchema>,
    pub layouts: Vec<LayoutSchema>,
    pub email_templates: Vec<EmailTemplateDef>,
}

/// Build the sync payload from rendered template bodies keyed by content
/// path. Collection listings are listed as pages titled with the collection
/// label; entry fields come from the collection template URL.
pub fn build_payload(
    registry: &Registry,
    templates: &BTreeMap<String, String>,
    locale: &str,
) -> SchemaPayload {
    let discovered = |path: &str| {
        templates
            .get(path)
            .map(|html| discover(html))
            .unwrap_or_default()
    };

    let mut pages: Vec<PageSchema> = registry
        .pages()
        .iter()
        .map(|page| {
            let found = discovered(&page.path);
            PageSchema {
                path: page.path.clone(),
                title: page.title.clone(),
                fields: found.fields,
                subcollections: found.subcollections,
            }
        })
        .collect();

    let mut collections = Vec::new();
    for collection in registry.collections() {
        if registry.find_page(&collection.base_path).is_none() {
            let listing = discovered(&collection.base_path);
            pages.push(PageSchema {
                path: collection.base_path.clone(),
                title: collection.label.clone(),
                fields: listing.fields,
                subcollections: listing.subcollections,
            });
        }
        let entry = discovered(&collection.template_url);
        collections.push(CollectionSchema {
            key: collection.key.clone(),
            label: collection.label.clone(),
            base_path: format!("{}/:slug", collection.base_path),
            listing_path: collection.base_path.clone(),
            template_url: collection.template_url.clone(),
            fields: entry.fields,
            subcollections: entry.subcollections,
        });
    }

    let layouts = registry
        .layouts()
        .iter()
        .map(|layout| {
            let content = PageContent::empty(
                &layout.path_prefix,
                &slug_from_path(&layout.path_prefix),
                locale,
            );
            let html = (layout.wrap)(&content, html! {}).into_string();
            LayoutSchema {
                path_prefix: layout.path_prefix.clone(),
                id: layout.id.clone(),
                fields: discover(&html).fields,
            }
        })
        .collect();

    SchemaPayload {
        pages,
        collections,
        layouts,
        email_templates: registry.email_templates().to_vec(),
    }
}
