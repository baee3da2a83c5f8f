//! Terminal output for registrations and build results.
//!
//! # Information-First Display
//!
//! Output is **information-centric, not file-centric**. Every entity leads
//! with its semantic identity (positional index and title) and shows the
//! files it maps to as secondary context.
//!
//! # Output Format
//!
//! ## Registry
//!
//! ```text
//! Pages
//! 001 Home → index.html
//! 002 About → about/index.html
//!
//! Collections
//! 001 Blog → blog/index.html
//!     Entries: blog/<slug>/index.html
//!     Template: blog/_template/index.template.html
//!
//! Layouts
//! 001 root → /
//! 002 blog → /blog
//! ```
//!
//! ## Build
//!
//! ```text
//! Locales: en, nl
//! Pages: 12 written, 1 skipped
//!     Skipped: /legacy
//! Fragments: 24
//! Templates: 5
//! Media: 31 files
//! Routes: _routes.json, _router.js
//! Sitemap: sitemap.xml
//! Schema: written to schema.json, pushed
//! ```
//!
//! Each section has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout.

use crate::build::{BuildReport, ROUTER_FILE, ROUTES_FILE};
use crate::emit::{path_to_file, path_to_template_file};
use crate::registry::Registry;
use std::path::Path;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Output file of `path`, relative to the output root.
fn output_file(path: &str) -> String {
    path_to_file(Path::new(""), path).display().to_string()
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Inventory of registered pages, collections, and layouts.
pub fn format_registry(registry: &Registry) -> Vec<String> {
    let mut lines = Vec::new();

    if !registry.pages().is_empty() {
        lines.push("Pages".to_string());
        for (i, page) in registry.pages().iter().enumerate() {
            let mut line = format!("{} {} \u{2192} {}", format_index(i + 1), page.title, output_file(&page.path));
            if page.no_sitemap {
                line.push_str(" (no sitemap)");
            }
            lines.push(line);
        }
    }

    if !registry.collections().is_empty() {
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push("Collections".to_string());
        for (i, collection) in registry.collections().iter().enumerate() {
            lines.push(format!(
                "{} {} \u{2192} {}",
                format_index(i + 1),
                collection.label,
                output_file(&collection.base_path)
            ));
            lines.push(format!(
                "{}Entries: {}",
                indent(1),
                output_file(&format!("{}/<slug>", collection.base_path))
            ));
            lines.push(format!(
                "{}Template: {}",
                indent(1),
                path_to_template_file(Path::new(""), &collection.template_url).display()
            ));
        }
    }

    if !registry.layouts().is_empty() {
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push("Layouts".to_string());
        for (i, layout) in registry.layouts().iter().enumerate() {
            lines.push(format!(
                "{} {} \u{2192} {}",
                format_index(i + 1),
                layout.id,
                layout.path_prefix
            ));
        }
    }

    lines
}

pub fn print_registry(registry: &Registry) {
    for line in format_registry(registry) {
        println!("{}", line);
    }
}

// ============================================================================
// Build report
// ============================================================================

/// Summary of a finished build.
pub fn format_build_report(report: &BuildReport) -> Vec<String> {
    let mut lines = Vec::new();

    if !report.locales.is_empty() {
        lines.push(format!("Locales: {}", report.locales.join(", ")));
    }

    if report.skipped.is_empty() {
        lines.push(format!("Pages: {} written", report.pages_written));
    } else {
        lines.push(format!(
            "Pages: {} written, {} skipped",
            report.pages_written,
            report.skipped.len()
        ));
        for path in &report.skipped {
            lines.push(format!("{}Skipped: {}", indent(1), path));
        }
    }

    if report.fragments_written > 0 {
        lines.push(format!("Fragments: {}", report.fragments_written));
    }
    lines.push(format!("Templates: {}", report.templates_written));

    if report.media_files > 0 {
        lines.push(format!("Media: {}", plural(report.media_files, "file", "files")));
    }

    if report.routes_written {
        let mut files = vec![ROUTES_FILE];
        if report.router_written {
            files.push(ROUTER_FILE);
        }
        lines.push(format!("Routes: {}", files.join(", ")));
    }

    if !report.sitemap_files.is_empty() {
        lines.push(format!("Sitemap: {}", report.sitemap_files.join(", ")));
    }

    match (&report.schema_file, report.schema_pushed) {
        (Some(file), true) => lines.push(format!("Schema: written to {}, pushed", file.display())),
        (Some(file), false) => lines.push(format!("Schema: written to {}", file.display())),
        (None, true) => lines.push("Schema: pushed".to_string()),
        (None, false) => {}
    }

    lines
}

pub fn print_build_report(report: &BuildReport) {
    for line in format_build_report(report) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::no_sitemap;
    use maud::html;
    use std::path::PathBuf;

    #[test]
    fn registry_inventory() {
        let mut r = Registry::new();
        r.page("/", |_| html! {}, [])
            .page("/404", |_| html! {}, [no_sitemap()])
            .collection("/blog", "Blog", |_| html! {}, |_| html! {})
            .layout("/", "root", |_, b| b);
        let lines = format_registry(&r);
        assert_eq!(
            lines,
            vec![
                "Pages",
                "001 Home \u{2192} index.html",
                "002 404 \u{2192} 404.html (no sitemap)",
                "",
                "Collections",
                "001 Blog \u{2192} blog/index.html",
                "    Entries: blog/<slug>/index.html",
                "    Template: blog/_template/index.template.html",
                "",
                "Layouts",
                "001 root \u{2192} /",
            ]
        );
    }

    #[test]
    fn empty_registry_prints_nothing() {
        assert!(format_registry(&Registry::new()).is_empty());
    }

    #[test]
    fn minimal_report() {
        let report = BuildReport {
            pages_written: 1,
            templates_written: 1,
            ..BuildReport::default()
        };
        assert_eq!(format_build_report(&report), vec!["Pages: 1 written", "Templates: 1"]);
    }

    #[test]
    fn full_report() {
        let report = BuildReport {
            locales: vec!["en".into(), "nl".into()],
            pages_written: 12,
            fragments_written: 24,
            templates_written: 5,
            skipped: vec!["/legacy".into()],
            media_files: 1,
            routes_written: true,
            router_written: true,
            sitemap_files: vec!["sitemap.xml".into()],
            schema_file: Some(PathBuf::from("schema.json")),
            schema_pushed: true,
        };
        assert_eq!(
            format_build_report(&report),
            vec![
                "Locales: en, nl",
                "Pages: 12 written, 1 skipped",
                "    Skipped: /legacy",
                "Fragments: 24",
                "Templates: 5",
                "Media: 1 file",
                "Routes: _routes.json, _router.js",
                "Sitemap: sitemap.xml",
                "Schema: written to schema.json, pushed",
            ]
        );
    }
}
