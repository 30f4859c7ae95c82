//! Site configuration module.
//!
//! Handles loading, validating, and merging `izugen.toml`. Configuration is
//! layered: stock defaults are overridden by the site's `izugen.toml` in the
//! source root, so a config file only needs the keys it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [site]
//! title = "A photoblog"
//! subtitle = ""
//! base_url = "https://example.org/"
//! author = ""
//! language = "en"
//!
//! [layout]
//! theme_dir = "theme"       # Template directory, relative to the source root
//! items_per_page = 10       # Entries per front/index page
//! img_width = 700           # Display width for inline entry images
//!
//! [feed]
//! items = 15                # Entries published in the Atom feed
//!
//! [categories]
//! hidden = []               # Category names dropped from listings
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Config file name expected in the source root.
pub const CONFIG_FILE: &str = "izugen.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `izugen.toml`.
///
/// All fields have sensible defaults. A config file needs only the values it
/// wants to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Identity of the site (title, base URL, author).
    pub site: SiteSection,
    /// Page layout settings (theme directory, pagination, image width).
    pub layout: LayoutConfig,
    /// Atom feed settings.
    pub feed: FeedConfig,
    /// Category visibility filters.
    pub categories: CategoriesConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.layout.items_per_page == 0 {
            return Err(ConfigError::Validation(
                "layout.items_per_page must be at least 1".into(),
            ));
        }
        if self.layout.img_width == 0 {
            return Err(ConfigError::Validation(
                "layout.img_width must be non-zero".into(),
            ));
        }
        if self.feed.items == 0 {
            return Err(ConfigError::Validation(
                "feed.items must be at least 1".into(),
            ));
        }
        if !self.site.base_url.is_empty() && !self.site.base_url.ends_with('/') {
            return Err(ConfigError::Validation(
                "site.base_url must end with '/'".into(),
            ));
        }
        Ok(())
    }

    /// True when `name` should be dropped from category listings.
    pub fn category_hidden(&self, name: &str) -> bool {
        self.categories
            .hidden
            .iter()
            .any(|h| h.eq_ignore_ascii_case(name))
    }
}

/// Site identity settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteSection {
    /// Site title, shown in page headers and the feed.
    pub title: String,
    /// Optional subtitle.
    pub subtitle: String,
    /// Public base URL, with trailing slash. Used for feed links and
    /// absolute URLs; pages themselves use relative links.
    pub base_url: String,
    /// Feed author name.
    pub author: String,
    /// Default content language.
    pub language: String,
}

impl Default for SiteSection {
    fn default() -> Self {
        Self {
            title: "A photoblog".to_string(),
            subtitle: String::new(),
            base_url: String::new(),
            author: String::new(),
            language: "en".to_string(),
        }
    }
}

/// Page layout settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutConfig {
    /// Template directory, relative to the source root.
    pub theme_dir: String,
    /// Entries per front/index page.
    pub items_per_page: u32,
    /// Display width in pixels for inline entry images.
    pub img_width: u32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            theme_dir: "theme".to_string(),
            items_per_page: 10,
            img_width: 700,
        }
    }
}

/// Atom feed settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeedConfig {
    /// Number of newest entries published in the feed.
    pub items: u32,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self { items: 15 }
    }
}

/// Category visibility filters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CategoriesConfig {
    /// Category names dropped from listings and category pages. Entries
    /// tagged only with hidden categories still get their own pages.
    pub hidden: Vec<String>,
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel entry-rendering workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(SiteConfig::default()).expect("default config must serialize")
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

/// Load `izugen.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if no config file exists in the directory.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = path.join(CONFIG_FILE);
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

/// Load config from `izugen.toml` in the given directory.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(root: &Path) -> Result<SiteConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(root)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `izugen.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# izugen Configuration
# ====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Place this file as izugen.toml in the source root, next to the entry
# directories. Each key only needs to appear when you override it.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Site identity
# ---------------------------------------------------------------------------
[site]
# Title shown in page headers and the Atom feed.
title = "A photoblog"

# Optional subtitle.
subtitle = ""

# Public base URL with trailing slash. Feed links and other absolute URLs
# are built against it. Leave empty for a site served from file://.
base_url = ""

# Feed author name.
author = ""

# Default content language.
language = "en"

# ---------------------------------------------------------------------------
# Layout
# ---------------------------------------------------------------------------
[layout]
# Template directory, relative to the source root.
theme_dir = "theme"

# Entries per front/index page.
items_per_page = 10

# Display width in pixels for inline entry images.
img_width = 700

# ---------------------------------------------------------------------------
# Atom feed
# ---------------------------------------------------------------------------
[feed]
# Number of newest entries published in the feed.
items = 15

# ---------------------------------------------------------------------------
# Categories
# ---------------------------------------------------------------------------
[categories]
# Category names dropped from listings and category pages.
hidden = []

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel entry-rendering workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
