//! Render cache for incremental builds.
//!
//! Parsing and expanding an entry is cheap, but a site with years of
//! archives re-renders hundreds of pages per build. This module lets the
//! render stage skip an entry when neither its source text nor the entry
//! template changed since the last build.
//!
//! # Design
//!
//! The cache is **content-addressed**: lookups are by entry slug plus the
//! combination of `source_hash` and `template_hash`, so touching a file
//! without changing its bytes (e.g. `git checkout` resetting mtimes) never
//! invalidates anything.
//!
//! - **`source_hash`**: SHA-256 of the entry's content file text.
//! - **`template_hash`**: SHA-256 of the theme's entry template text.
//!   Editing the theme re-renders every entry.
//!
//! The cached value is the entry's rendered HTML fragment, stored inline in
//! a JSON manifest at `<output_dir>/.cache-manifest.json`. The manifest also
//! records the generator version; a version bump invalidates all caches.
//!
//! Index, category, and month pages are always rebuilt — they depend on the
//! whole entry set and are few.
//!
//! ## Bypassing the cache
//!
//! Pass `--no-cache` to the `build` command to force a full rebuild. This
//! loads an empty manifest, so every entry is re-rendered.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::Path;

/// Name of the cache manifest file within the output directory.
const MANIFEST_FILENAME: &str = ".cache-manifest.json";

/// Version of the cache manifest format. Bump this to invalidate all
/// existing caches when the format or key computation changes.
const MANIFEST_VERSION: u32 = 1;

/// A cached render of one entry.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct CacheEntry {
    pub source_hash: String,
    pub template_hash: String,
    /// The fully expanded entry page HTML.
    pub html: String,
}

/// On-disk cache manifest mapping entry slugs to their cached renders.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CacheManifest {
    pub version: u32,
    pub generator: String,
    pub entries: HashMap<String, CacheEntry>,
}

impl CacheManifest {
    /// Create an empty manifest (used for `--no-cache` or first build).
    pub fn empty() -> Self {
        Self {
            version: MANIFEST_VERSION,
            generator: env!("CARGO_PKG_VERSION").to_string(),
            entries: HashMap::new(),
        }
    }

    /// Load from the output directory. Returns an empty manifest if the
    /// file doesn't exist or can't be used (corruption, format or generator
    /// version mismatch).
    pub fn load(output_dir: &Path) -> Self {
        let path = output_dir.join(MANIFEST_FILENAME);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => return Self::empty(),
        };
        let manifest: Self = match serde_json::from_str(&content) {
            Ok(m) => m,
            Err(_) => return Self::empty(),
        };
        if manifest.version != MANIFEST_VERSION || manifest.generator != env!("CARGO_PKG_VERSION") {
            return Self::empty();
        }
        manifest
    }

    /// Save to the output directory.
    pub fn save(&self, output_dir: &Path) -> io::Result<()> {
        let path = output_dir.join(MANIFEST_FILENAME);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }

    /// Look up a cached render for an entry.
    ///
    /// Returns the stored HTML only when both hashes match the current
    /// source text and template.
    pub fn find_cached(&self, slug: &str, source_hash: &str, template_hash: &str) -> Option<&str> {
        let entry = self.entries.get(slug)?;
        if entry.source_hash == source_hash && entry.template_hash == template_hash {
            Some(&entry.html)
        } else {
            None
        }
    }

    /// Record a rendered entry. Replaces any previous render of the slug.
    pub fn insert(&mut self, slug: String, source_hash: String, template_hash: String, html: String) {
        self.entries.insert(
            slug,
            CacheEntry {
                source_hash,
                template_hash,
                html,
            },
        );
    }

    /// Drop cached renders whose slug is no longer part of the site.
    pub fn retain_slugs(&mut self, live: &[String]) {
        self.entries.retain(|slug, _| live.iter().any(|s| s == slug));
    }
}

/// SHA-256 hash of a text, returned as a hex string.
pub fn hash_text(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    format!("{:x}", digest)
}

/// SHA-256 hash of a file's contents, returned as a hex string.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let bytes = std::fs::read(path)?;
    let digest = Sha256::digest(&bytes);
    Ok(format!("{:x}", digest))
}

/// Summary of cache performance for a build run.
#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits: u32,
    pub misses: u32,
}

impl CacheStats {
    pub fn hit(&mut self) {
        self.hits += 1;
    }

    pub fn miss(&mut self) {
        self.misses += 1;
    }

    pub fn total(&self) -> u32 {
        self.hits + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(
                f,
                "{} cached, {} rendered ({} total)",
                self.hits,
                self.misses,
                self.total()
            )
        } else {
            write!(f, "{} rendered", self.misses)
        }
    }
}
