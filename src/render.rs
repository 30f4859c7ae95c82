//! Site rendering orchestration.
//!
//! Stage 2 of the build pipeline. Takes the scan manifest and produces the
//! output tree:
//!
//! ```text
//! output/
//! ├── index.html                   # Front page (+ page-2.html, ...)
//! ├── feed.xml                     # Atom feed
//! ├── .cache-manifest.json         # Render cache
//! ├── 2006-05-28-low-tide/
//! │   ├── index.html               # Entry page
//! │   ├── rocks.jpg                # Images copied as-is
//! │   └── pools.jpg
//! ├── cat/travel/index.html        # Per-category listings
//! └── month/2006-05/index.html     # Per-month listings
//! ```
//!
//! The theme supplies two templates: `entry.html` for entry pages and
//! `index.html` for every listing page. Template problems are fatal — a
//! broken theme breaks every page. Entry markup problems are logged and
//! degrade to partial pages, matching the markup parser's posture.
//!
//! Entry metadata (title, date, categories) always comes from a fresh parse
//! of the source text, so the render cache only short-circuits template
//! expansion; a cached entry page is reused when neither the source text
//! nor `entry.html` changed.
//!
//! Entries render in parallel through rayon. Each parse owns its own state,
//! so this is safe by construction.

use crate::cache::{self, CacheManifest, CacheStats};
use crate::config::{self, SiteConfig};
use crate::date::EntryDate;
use crate::feed::{self, FeedItem};
use crate::izu::{self, DEFAULT_SECTION, ParsedDoc};
use crate::scan::{self, Entry, ScanError};
use crate::template::{self, Bindings, NodeList, TemplateError, Value};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),
    #[error("Theme template not found: {0}")]
    MissingTemplate(PathBuf),
}

/// Options for a build run.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub no_cache: bool,
    /// Overrides the configured theme directory.
    pub theme: Option<String>,
}

/// Summary of a completed build.
#[derive(Debug)]
pub struct BuildReport {
    pub entries: usize,
    pub pages: usize,
    pub stats: CacheStats,
}

/// The parsed theme.
struct Theme {
    entry: NodeList,
    entry_hash: String,
    index: NodeList,
}

/// One entry, parsed and resolved, ready for page assembly.
struct PreparedEntry {
    slug: String,
    title: String,
    date: EntryDate,
    categories: Vec<String>,
    /// Body HTML with rig placeholders already resolved relative to the
    /// entry's own directory.
    body: String,
    /// Resolved `<img>` HTML for the images section.
    images: Vec<String>,
    /// SHA-256 of the content file, for cache keying.
    source_hash: String,
    /// Raw body fragment before placeholder resolution, for the feed.
    raw_body: String,
    image_files: Vec<String>,
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Full build: scan, render every page, write the output tree.
pub fn build(source: &Path, output: &Path, options: &BuildOptions) -> Result<BuildReport, RenderError> {
    let mut manifest = scan::scan(source)?;
    if let Some(theme) = &options.theme {
        manifest.config.layout.theme_dir = theme.clone();
    }
    let theme = load_theme(source, &manifest.config)?;

    fs::create_dir_all(output)?;
    let mut cache = if options.no_cache {
        CacheManifest::empty()
    } else {
        CacheManifest::load(output)
    };
    let mut stats = CacheStats::default();

    let prepared: Vec<PreparedEntry> = manifest
        .entries
        .par_iter()
        .filter_map(|entry| prepare_entry(source, entry, &manifest.config))
        .collect();

    // Entry pages.
    let expanded: Vec<(String, Result<PageOutcome, TemplateError>)> = prepared
        .par_iter()
        .map(|entry| (entry.slug.clone(), expand_entry_page(entry, &manifest.config, &theme, &cache)))
        .collect();
    let mut pages = Vec::with_capacity(expanded.len());
    for (slug, outcome) in expanded {
        let outcome = outcome?;
        if outcome.cached {
            stats.hit();
        } else {
            stats.miss();
        }
        cache.insert(
            slug,
            outcome.source_hash,
            theme.entry_hash.clone(),
            outcome.html.clone(),
        );
        pages.push(outcome.html);
    }

    for (entry, html) in prepared.iter().zip(&pages) {
        let dir = output.join(&entry.slug);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join("index.html"), html)?;
        for image in &entry.image_files {
            fs::copy(source.join(&entry.slug).join(image), dir.join(image))?;
        }
    }

    // Listing pages.
    let mut page_count = prepared.len();
    page_count += write_front_pages(output, &prepared, &manifest.config, &theme)?;
    page_count += write_category_pages(output, &prepared, &manifest.config, &theme)?;
    page_count += write_month_pages(output, &prepared, &manifest.config, &theme)?;

    // Feed.
    write_feed(output, &prepared, &manifest.config)?;
    page_count += 1;

    let live: Vec<String> = prepared.iter().map(|e| e.slug.clone()).collect();
    cache.retain_slugs(&live);
    cache.save(output)?;
    info!("{stats}");

    Ok(BuildReport {
        entries: prepared.len(),
        pages: page_count,
        stats,
    })
}

/// Parse everything, write nothing. Returns the number of entries checked.
pub fn check(source: &Path, theme: Option<&str>) -> Result<usize, RenderError> {
    let mut manifest = scan::scan(source)?;
    if let Some(theme) = theme {
        manifest.config.layout.theme_dir = theme.to_string();
    }
    load_theme(source, &manifest.config)?;
    let checked = manifest
        .entries
        .par_iter()
        .filter_map(|entry| prepare_entry(source, entry, &manifest.config))
        .count();
    Ok(checked)
}

// ---------------------------------------------------------------------------
// Theme
// ---------------------------------------------------------------------------

fn load_theme(source: &Path, config: &SiteConfig) -> Result<Theme, RenderError> {
    let dir = source.join(&config.layout.theme_dir);
    let entry_text = read_template(&dir.join("entry.html"))?;
    let index_text = read_template(&dir.join("index.html"))?;
    Ok(Theme {
        entry: template::parse(&entry_text, "entry.html")?,
        entry_hash: cache::hash_text(&entry_text),
        index: template::parse(&index_text, "index.html")?,
    })
}

fn read_template(path: &Path) -> Result<String, RenderError> {
    if !path.exists() {
        return Err(RenderError::MissingTemplate(path.to_path_buf()));
    }
    Ok(fs::read_to_string(path)?)
}

// ---------------------------------------------------------------------------
// Entry preparation
// ---------------------------------------------------------------------------

/// Parse one entry's content and resolve its metadata. Unreadable entries
/// are skipped with a warning, not fatal.
fn prepare_entry(source: &Path, entry: &Entry, config: &SiteConfig) -> Option<PreparedEntry> {
    let path = entry.content_path(source);
    let source_hash = match cache::hash_file(&path) {
        Ok(hash) => hash,
        Err(e) => {
            warn!("{}: cannot read, skipping entry: {e}", path.display());
            return None;
        }
    };
    let doc = izu::parse_file(&path);

    let date = doc.date().unwrap_or(entry.date);
    let title = doc
        .text_tag("title")
        .map(str::to_string)
        .or_else(|| entry.title.clone())
        .unwrap_or_else(|| date.to_string());
    let categories = doc.categories().into_iter().collect();
    let raw_body = body_fragment(&doc, config);

    // Placeholders inside the entry page resolve against the entry's own
    // output directory, where the images are copied.
    let body = resolve_placeholders(&raw_body, &entry.content_file, "", config);
    let images = doc
        .images()
        .iter()
        .map(|p| resolve_placeholders(p, &entry.content_file, "", config))
        .collect();

    Some(PreparedEntry {
        slug: entry.slug.clone(),
        title,
        date,
        categories,
        body,
        images,
        source_hash,
        raw_body,
        image_files: entry.images.clone(),
    })
}

/// Pick the entry's body section: the configured language, falling back to
/// the default section.
fn body_fragment(doc: &ParsedDoc, config: &SiteConfig) -> String {
    doc.section_html(&config.site.language)
        .or_else(|| doc.section_html(DEFAULT_SECTION))
        .unwrap_or("")
        .to_string()
}

/// Expand rig placeholders in generated markup against a given URL base.
///
/// The fragment came out of the markup parser, so it is expected to be
/// template-clean; if expansion fails anyway (hand-written `[[` in an HTML
/// escape block, say) the fragment is used verbatim with a warning.
fn resolve_placeholders(fragment: &str, label: &str, base: &str, config: &SiteConfig) -> String {
    let mut rig = Bindings::new();
    rig.insert("base".to_string(), Value::from(base));
    rig.insert("img_width".to_string(), Value::from(config.layout.img_width));
    let mut bindings = Bindings::new();
    bindings.insert("rig".to_string(), Value::Map(rig));

    let expand = || -> Result<String, TemplateError> {
        let nodes = template::parse(fragment, label)?;
        template::generate(&nodes, &bindings, label)
    };
    match expand() {
        Ok(html) => html,
        Err(e) => {
            warn!("{label}: placeholder expansion failed, keeping fragment verbatim: {e}");
            fragment.to_string()
        }
    }
}

// ---------------------------------------------------------------------------
// Page assembly
// ---------------------------------------------------------------------------

struct PageOutcome {
    html: String,
    source_hash: String,
    cached: bool,
}

fn expand_entry_page(
    entry: &PreparedEntry,
    config: &SiteConfig,
    theme: &Theme,
    cache: &CacheManifest,
) -> Result<PageOutcome, TemplateError> {
    if let Some(html) = cache.find_cached(&entry.slug, &entry.source_hash, &theme.entry_hash) {
        return Ok(PageOutcome {
            html: html.to_string(),
            source_hash: entry.source_hash.clone(),
            cached: true,
        });
    }

    let mut bindings = site_bindings(config);
    bindings.insert("entry".to_string(), Value::Map(entry_bindings(entry, config)));
    let html = template::generate(&theme.entry, &bindings, "entry.html")?;
    Ok(PageOutcome {
        html,
        source_hash: entry.source_hash.clone(),
        cached: false,
    })
}

fn site_bindings(config: &SiteConfig) -> Bindings {
    let mut site = Bindings::new();
    site.insert("title".to_string(), Value::from(config.site.title.as_str()));
    site.insert("subtitle".to_string(), Value::from(config.site.subtitle.as_str()));
    site.insert("base_url".to_string(), Value::from(config.site.base_url.as_str()));
    site.insert("author".to_string(), Value::from(config.site.author.as_str()));
    let mut bindings = Bindings::new();
    bindings.insert("site".to_string(), Value::Map(site));
    bindings
}

fn entry_bindings(entry: &PreparedEntry, config: &SiteConfig) -> Bindings {
    let mut map = Bindings::new();
    map.insert("title".to_string(), Value::from(entry.title.as_str()));
    map.insert("date".to_string(), Value::from(entry.date));
    map.insert("slug".to_string(), Value::from(entry.slug.as_str()));
    map.insert("url".to_string(), Value::from(entry_url(entry, config)));
    map.insert("body".to_string(), Value::from(entry.body.as_str()));
    map.insert(
        "categories".to_string(),
        Value::List(
            entry
                .categories
                .iter()
                .filter(|c| !config.category_hidden(c))
                .map(|c| Value::from(c.as_str()))
                .collect(),
        ),
    );
    map.insert(
        "images".to_string(),
        Value::List(entry.images.iter().map(|i| Value::from(i.as_str())).collect()),
    );
    map
}

/// Public URL of an entry page: absolute when a base URL is configured,
/// root-relative otherwise.
fn entry_url(entry: &PreparedEntry, config: &SiteConfig) -> String {
    if config.site.base_url.is_empty() {
        format!("/{}/", entry.slug)
    } else {
        feed::absolute_url(&config.site.base_url, &format!("{}/", entry.slug))
    }
}

// ---------------------------------------------------------------------------
// Listing pages
// ---------------------------------------------------------------------------

fn listing_bindings(
    entries: &[&PreparedEntry],
    config: &SiteConfig,
    heading: &str,
    page: u32,
    page_count: u32,
) -> Bindings {
    let mut bindings = site_bindings(config);
    bindings.insert("heading".to_string(), Value::from(heading));
    bindings.insert(
        "entries".to_string(),
        Value::List(
            entries
                .iter()
                .map(|e| Value::Map(entry_bindings(e, config)))
                .collect(),
        ),
    );

    let mut pager = Bindings::new();
    pager.insert("number".to_string(), Value::from(page));
    pager.insert("count".to_string(), Value::from(page_count));
    pager.insert(
        "prev".to_string(),
        Value::from(match page {
            1 => String::new(),
            2 => "index.html".to_string(),
            n => format!("page-{}.html", n - 1),
        }),
    );
    pager.insert(
        "next".to_string(),
        Value::from(if page < page_count {
            format!("page-{}.html", page + 1)
        } else {
            String::new()
        }),
    );
    bindings.insert("page".to_string(), Value::Map(pager));
    bindings
}

/// Paginated front pages: `index.html`, `page-2.html`, ...
fn write_front_pages(
    output: &Path,
    entries: &[PreparedEntry],
    config: &SiteConfig,
    theme: &Theme,
) -> Result<usize, RenderError> {
    let per_page = config.layout.items_per_page as usize;
    let chunks: Vec<Vec<&PreparedEntry>> = if entries.is_empty() {
        vec![Vec::new()]
    } else {
        entries.chunks(per_page).map(|c| c.iter().collect()).collect()
    };
    let page_count = chunks.len() as u32;

    for (i, chunk) in chunks.iter().enumerate() {
        let number = i as u32 + 1;
        let bindings = listing_bindings(chunk, config, &config.site.title, number, page_count);
        let html = template::generate(&theme.index, &bindings, "index.html")?;
        let name = if number == 1 {
            "index.html".to_string()
        } else {
            format!("page-{number}.html")
        };
        fs::write(output.join(name), html)?;
    }
    Ok(chunks.len())
}

/// One listing page per visible category, at `cat/<name>/index.html`.
fn write_category_pages(
    output: &Path,
    entries: &[PreparedEntry],
    config: &SiteConfig,
    theme: &Theme,
) -> Result<usize, RenderError> {
    let mut by_category: BTreeMap<&str, Vec<&PreparedEntry>> = BTreeMap::new();
    for entry in entries {
        for cat in &entry.categories {
            if !config.category_hidden(cat) {
                by_category.entry(cat).or_default().push(entry);
            }
        }
    }

    let count = by_category.len();
    for (cat, members) in by_category {
        let bindings = listing_bindings(&members, config, cat, 1, 1);
        let html = template::generate(&theme.index, &bindings, "index.html")?;
        let dir = output.join("cat").join(cat);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join("index.html"), html)?;
    }
    Ok(count)
}

/// One listing page per month with entries, at `month/<YYYY-MM>/index.html`.
fn write_month_pages(
    output: &Path,
    entries: &[PreparedEntry],
    config: &SiteConfig,
    theme: &Theme,
) -> Result<usize, RenderError> {
    let mut by_month: BTreeMap<String, Vec<&PreparedEntry>> = BTreeMap::new();
    for entry in entries {
        by_month.entry(entry.date.month_key()).or_default().push(entry);
    }

    let count = by_month.len();
    for (month, members) in by_month {
        let bindings = listing_bindings(&members, config, &month, 1, 1);
        let html = template::generate(&theme.index, &bindings, "index.html")?;
        let dir = output.join("month").join(&month);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join("index.html"), html)?;
    }
    Ok(count)
}

// ---------------------------------------------------------------------------
// Feed
// ---------------------------------------------------------------------------

fn write_feed(
    output: &Path,
    entries: &[PreparedEntry],
    config: &SiteConfig,
) -> Result<(), RenderError> {
    let items: Vec<FeedItem> = entries
        .iter()
        .map(|entry| {
            let path = format!("{}/", entry.slug);
            // Feed readers resolve nothing, so rig references get absolute
            // URLs here.
            let base = feed::absolute_url(&config.site.base_url, &path);
            FeedItem {
                title: entry.title.clone(),
                path,
                updated: entry.date,
                html: resolve_placeholders(&entry.raw_body, &entry.slug, &base, config),
            }
        })
        .collect();
    fs::write(output.join("feed.xml"), feed::atom_feed(config, &items))?;
    Ok(())
}
