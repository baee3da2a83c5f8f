//! Site configuration module.
//!
//! Handles loading and validating `site.toml`. User values are merged on top
//! of the stock defaults, so a config file only needs the keys it wants to
//! override.
//!
//! ## Configuration Options
//!
//! ```toml
//! api_url = "https://cms.example.com"   # Content service base URL
//! site_slug = "my-site"                 # Site identifier on the service
//! api_key = ""                          # Sent as X-API-Key
//! default_locale = "en"
//! site_url = "https://example.com"      # Canonical URL (sitemap, robots.txt)
//! pre_build_hook = ["npm", "run", "css"]
//!
//! [build]
//! out_dir = "dist"
//! minify = false
//! download_media = true
//! media_prefix = "/media"
//! schema_file = "schema.json"
//! push_schema = false
//! router_script = true
//! ```
//!
//! Unknown keys are rejected to catch typos early. The API key can also be
//! supplied through the `HEADLESS_SITE_API_KEY` environment variable, which
//! wins over the file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the config file looked up by [`load_config`].
pub const CONFIG_FILENAME: &str = "site.toml";

/// Environment variable overriding [`SiteConfig::api_key`].
pub const API_KEY_ENV: &str = "HEADLESS_SITE_API_KEY";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `site.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Base URL of the content service, without the `/api/v1` suffix.
    pub api_url: String,
    /// Site identifier on the content service.
    pub site_slug: String,
    /// API key sent as `X-API-Key`.
    pub api_key: String,
    /// Locale used for single-locale builds and template files.
    pub default_locale: String,
    /// Canonical public URL. When absent the service's site domain is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_url: Option<String>,
    /// Command (argv) run before every build.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_build_hook: Option<Vec<String>>,
    /// Output and post-processing settings.
    pub build: BuildConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            site_slug: String::new(),
            api_key: String::new(),
            default_locale: "en".to_string(),
            site_url: None,
            pre_build_hook: None,
            build: BuildConfig::default(),
        }
    }
}

/// Output and post-processing settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Directory the site is written to.
    pub out_dir: PathBuf,
    /// Minify production HTML and fragments.
    pub minify: bool,
    /// Download remote media into `<out_dir>/media`.
    pub download_media: bool,
    /// Web path under which downloaded media is served.
    pub media_prefix: String,
    /// Where to write the schema-sync payload, if anywhere.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_file: Option<PathBuf>,
    /// POST the schema-sync payload to the content service after a build.
    pub push_schema: bool,
    /// Emit `_router.js` when layouts are registered.
    pub router_script: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("dist"),
            minify: false,
            download_media: true,
            media_prefix: "/media".to_string(),
            schema_file: None,
            push_schema: false,
            router_script: true,
        }
    }
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.api_url.is_empty()
            && !self.api_url.starts_with("http://")
            && !self.api_url.starts_with("https://")
        {
            return Err(ConfigError::Validation(
                "api_url must start with http:// or https://".into(),
            ));
        }
        if self.default_locale.trim().is_empty() {
            return Err(ConfigError::Validation(
                "default_locale must not be empty".into(),
            ));
        }
        if !self.build.media_prefix.starts_with('/') {
            return Err(ConfigError::Validation(
                "build.media_prefix must start with '/'".into(),
            ));
        }
        Ok(())
    }

    /// The canonical site URL from config, normalised without a trailing slash.
    pub fn configured_site_url(&self) -> Option<String> {
        self.site_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(normalize_site_url)
    }
}

/// Prefix `https://` when the value has no scheme and drop trailing slashes.
///
/// The content service reports bare domains (`example.com`), config files
/// usually carry full URLs. Both end up as `https://example.com`.
pub fn normalize_site_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(SiteConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config must serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `site.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if no config file exists in the directory.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `site.toml` in the given directory.
///
/// Merges user values on top of stock defaults, applies the API key
/// environment override, and validates the result.
pub fn load_config(root: &Path) -> Result<SiteConfig, ConfigError> {
    let overlay = load_raw_config(root)?;
    let mut config = resolve_config(stock_defaults_value()?, overlay)?;
    if let Ok(key) = std::env::var(API_KEY_ENV)
        && !key.is_empty()
    {
        config.api_key = key;
    }
    Ok(config)
}

/// Returns a fully-commented stock `site.toml` with all keys and explanations.
pub fn stock_config_toml() -> &'static str {
    r##"# headless-site configuration
# ===========================
# Values shown below are the defaults unless noted.
# Unknown keys will cause an error.

# Base URL of the content service (required to fetch content).
api_url = "https://cms.example.com"

# Site identifier on the content service.
site_slug = "my-site"

# API key sent as X-API-Key. Prefer the HEADLESS_SITE_API_KEY env var.
api_key = ""

# Locale used for single-locale builds and for template files.
default_locale = "en"

# Canonical public URL. Enables sitemap.xml and robots.txt.
# When omitted, the domain reported by the content service is used.
# site_url = "https://example.com"

# Command run before every build, as an argv list.
# pre_build_hook = ["npm", "run", "build:css"]

# ---------------------------------------------------------------------------
# Build output
# ---------------------------------------------------------------------------
[build]
# Directory the generated site is written to.
out_dir = "dist"

# Minify production HTML and layout fragments.
minify = false

# Download remote images into <out_dir>/media and rewrite references.
download_media = true

# Web path under which downloaded media is served.
media_prefix = "/media"

# Write the schema-sync payload to this file.
# schema_file = "schema.json"

# POST the schema-sync payload back to the content service.
push_schema = false

# Emit the client-side router script (_router.js) when layouts exist.
router_script = true
"##
}
