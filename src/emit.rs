//! Writing rendered pages, fragments, and template files to disk.
//!
//! ## Path to file
//!
//! | Path          | Page file               | Template file                    |
//! |---------------|-------------------------|----------------------------------|
//! | `/`           | `index.html`            | `index.template.html`            |
//! | `/about`      | `about/index.html`      | `about/index.template.html`      |
//! | `/404`        | `404.html`              | `404.template.html`              |
//! | `/errors/500` | `errors/500.html`       | `errors/500.template.html`       |
//!
//! Fragments go next to the page, in the page's own directory:
//! `/blog/post` → `blog/post/_<layout id>.html`, `/404` → `404/_<id>.html`.
//!
//! Production HTML and fragments are stripped of authoring attributes and,
//! when enabled, minified. Template files are written as rendered.

use crate::compose::{self, compose, fragment};
use crate::content::PageContent;
use crate::registry::{Registry, slug_from_path};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Last path segments written as flat `<name>.html` files.
const FLAT_PAGES: [&str; 2] = ["404", "500"];

#[derive(Error, Debug)]
pub enum EmitError {
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn split_flat(path: &str) -> (String, bool) {
    let trimmed = path.trim_matches('/').to_string();
    let last = trimmed.rsplit('/').next().unwrap_or("");
    let flat = FLAT_PAGES.contains(&last);
    (trimmed, flat)
}

/// Whether `path` is an error page (`404`/`500` as last segment).
pub fn is_error_page(path: &str) -> bool {
    split_flat(path).1
}

/// Production HTML file for an output path.
pub fn path_to_file(out_dir: &Path, path: &str) -> PathBuf {
    let (trimmed, flat) = split_flat(path);
    if trimmed.is_empty() {
        out_dir.join("index.html")
    } else if flat {
        out_dir.join(format!("{trimmed}.html"))
    } else {
        out_dir.join(trimmed).join("index.html")
    }
}

/// Template HTML file for a content path.
pub fn path_to_template_file(out_dir: &Path, path: &str) -> PathBuf {
    let (trimmed, flat) = split_flat(path);
    if trimmed.is_empty() {
        out_dir.join("index.template.html")
    } else if flat {
        out_dir.join(format!("{trimmed}.template.html"))
    } else {
        out_dir.join(trimmed).join("index.template.html")
    }
}

/// Fragment file of layout `id` for an output path.
pub fn fragment_file(out_dir: &Path, path: &str, id: &str) -> PathBuf {
    let trimmed = path.trim_matches('/');
    let dir = if trimmed.is_empty() {
        out_dir.to_path_buf()
    } else {
        out_dir.join(trimmed)
    };
    dir.join(format!("_{id}.html"))
}

/// Minify HTML, falling back to the input when minification fails.
pub fn minify(html: &str) -> String {
    let mut cfg = minify_html::Cfg::new();
    cfg.keep_closing_tags = true;
    cfg.keep_html_and_head_opening_tags = true;
    cfg.keep_comments = false;
    cfg.minify_css = true;
    cfg.minify_js = true;
    cfg.remove_bangs = false;
    cfg.remove_processing_instructions = true;

    let minified = minify_html::minify(html.as_bytes(), &cfg);
    match String::from_utf8(minified) {
        Ok(out) if !out.is_empty() || html.trim().is_empty() => out,
        Ok(_) => {
            tracing::warn!("Minifier produced empty output; writing unminified HTML");
            html.to_string()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Minifier produced invalid UTF-8; writing unminified HTML");
            html.to_string()
        }
    }
}

/// Write `contents` to `path`, creating parent directories.
pub fn write_file(path: &Path, contents: &[u8]) -> Result<(), EmitError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| EmitError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, contents).map_err(|source| EmitError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// What one [`Emitter::emit_page`] call produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    Written { fragments: usize },
    /// No render function is registered for the path.
    Skipped,
}

/// Renders registered components and writes their output.
pub struct Emitter<'a> {
    registry: &'a Registry,
    out_dir: &'a Path,
    minify: bool,
}

impl<'a> Emitter<'a> {
    pub fn new(registry: &'a Registry, out_dir: &'a Path, minify: bool) -> Self {
        Self {
            registry,
            out_dir,
            minify,
        }
    }

    fn finish(&self, html: &str) -> String {
        let stripped = compose::strip_cms_attributes(html);
        if self.minify {
            minify(&stripped)
        } else {
            stripped
        }
    }

    /// Write the production HTML of one page plus a fragment per layout in
    /// its chain.
    pub fn emit_page(&self, content: &PageContent) -> Result<PageOutcome, EmitError> {
        let Some(render) = self.registry.resolve_component(content) else {
            tracing::debug!(path = %content.path, "No component registered; skipping");
            return Ok(PageOutcome::Skipped);
        };
        let chain = self.registry.layout_chain(content.lookup_path());
        let body = render(content);

        let full = compose(&chain, content, body.clone()).into_string();
        write_file(
            &path_to_file(self.out_dir, &content.path),
            self.finish(&full).as_bytes(),
        )?;

        let mut fragments = 0;
        if !self.registry.layouts().is_empty() {
            let prefix = compose::route_comment(&compose::route_title(content));
            for layout in &chain {
                let inner = fragment(&chain, &layout.id, content, body.clone()).into_string();
                let text = format!("{prefix}{}", self.finish(&inner));
                write_file(
                    &fragment_file(self.out_dir, &content.path, &layout.id),
                    text.as_bytes(),
                )?;
                fragments += 1;
            }
        }
        Ok(PageOutcome::Written { fragments })
    }

    /// Render the template file of `path` from empty content.
    ///
    /// Returns the page body without layouts, for schema discovery, or
    /// `None` when nothing is registered for the path.
    pub fn emit_template(&self, path: &str, locale: &str) -> Result<Option<String>, EmitError> {
        let mut content = PageContent::empty(path, &slug_from_path(path), locale);
        content.layouts = Arc::new(self.registry.layout_manifest());
        let Some(render) = self.registry.resolve_component(&content) else {
            return Ok(None);
        };
        let chain = self.registry.layout_chain(path);
        let body = render(&content);
        let html = compose(&chain, &content, body.clone()).into_string();
        write_file(&path_to_template_file(self.out_dir, path), html.as_bytes())?;
        Ok(Some(body.into_string()))
    }
}
