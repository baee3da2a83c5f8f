//! Field value kinds.
//!
//! The content service stores every field as raw JSON. The accessors on
//! [`PageContent`](crate::content::PageContent) interpret that JSON according
//! to the kind the template asks for:
//!
//! | Kind | Accepted shapes |
//! |---|---|
//! | Text | string, number, bool |
//! | Rich text | string carrying HTML |
//! | Number / currency | number, numeric string, `{"amount": n}` |
//! | Image | `{"url", "alt"}` or a plain URL string |
//! | URL | `{"href", "text", "title", "target"}` or a plain string (legacy) |
//!
//! Missing keys and mismatched shapes yield the zero value of the kind.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Field key → raw JSON value.
pub type FieldMap = BTreeMap<String, Value>;

/// Render a JSON value as display text.
///
/// Integral floats print without a fractional part (`3.0` → `"3"`).
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() => format_number(f),
            _ => n.to_string(),
        },
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// Format a float without trailing zeros for integral values.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// Interpret a JSON value as a number; anything else is `0.0`.
pub fn value_to_number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        Value::Object(map) => map.get("amount").map(value_to_number).unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Split an image field into `(url, alt)`.
pub(crate) fn image_parts(value: &Value) -> (String, String) {
    match value {
        Value::String(s) => (s.clone(), String::new()),
        Value::Object(map) => {
            let get = |k: &str| map.get(k).and_then(Value::as_str).unwrap_or("").to_string();
            (get("url"), get("alt"))
        }
        _ => (String::new(), String::new()),
    }
}

/// A link field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlValue {
    pub href: String,
    pub text: String,
    pub title: String,
    /// Link target, `_self` unless the CMS says otherwise.
    pub target: String,
}

impl Default for UrlValue {
    fn default() -> Self {
        Self {
            href: String::new(),
            text: String::new(),
            title: String::new(),
            target: "_self".to_string(),
        }
    }
}

impl UrlValue {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(s) => Self {
                href: s.clone(),
                ..Self::default()
            },
            Value::Object(map) => {
                let get = |k: &str| map.get(k).and_then(Value::as_str).unwrap_or("").to_string();
                let target = get("target");
                Self {
                    href: get("href"),
                    text: get("text"),
                    title: get("title"),
                    target: if target.is_empty() {
                        "_self".to_string()
                    } else {
                        target
                    },
                }
            }
            _ => Self::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.href.is_empty()
    }
}

/// Whether a link points inside the site and should carry the locale prefix.
pub(crate) fn is_internal_href(href: &str) -> bool {
    href.starts_with('/') && !href.starts_with("//")
}

/// Prepend `prefix` to internal hrefs that don't already carry it.
pub(crate) fn prefix_href(prefix: &str, href: &str) -> String {
    if prefix.is_empty() || !is_internal_href(href) {
        return href.to_string();
    }
    if href == prefix || href.starts_with(&format!("{prefix}/")) {
        return href.to_string();
    }
    if href == "/" {
        prefix.to_string()
    } else {
        format!("{prefix}{href}")
    }
}
