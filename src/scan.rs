//! Filesystem scanning and manifest generation.
//!
//! Stage 1 of the build pipeline. Scans the source directory to discover
//! dated *entries*, producing a structured manifest that the render stage
//! consumes.
//!
//! ## Directory Structure
//!
//! A source tree is flat: each entry is a dated directory (or a dated
//! standalone file) directly under the root.
//!
//! ```text
//! source/                          # Source root
//! ├── izugen.toml                  # Site configuration (optional)
//! ├── theme/                       # Templates (name set by config)
//! │   ├── entry.html
//! │   └── index.html
//! ├── 2006-05-28-low-tide/         # Entry directory
//! │   ├── index.izu                # Content file
//! │   ├── rocks.jpg                # Sibling images
//! │   └── pools.jpg
//! ├── 20060612_dunes/              # Compact date form also accepted
//! │   └── index.izu
//! ├── 2006-07-02.izu               # Standalone entry file (no images)
//! └── drafts/                      # Undated = skipped with a warning
//!     └── ...
//! ```
//!
//! ## Naming Conventions
//!
//! - **Entry names** start with a date: `YYYY-MM-DD`, `YYYY/MM/DD` or
//!   compact `YYYYMMDD`, optionally followed by `-`, `_` or space and a
//!   title. The title part becomes the display title (separators → spaces);
//!   an `[izu:title:...]` tag in the content overrides it.
//! - **Content file**: one `.izu` (preferred) or `.html` file per entry
//!   directory. With several candidates the first in name order wins.
//! - **Images**: sibling files with gif/jpg/jpeg/png/svg extensions, listed
//!   in name order.
//!
//! Undated directories and entries without a content file are skipped with
//! a logged warning, never a fatal error.

use crate::config::{self, SiteConfig};
use crate::date::{regex, EntryDate};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::{fs, io};
use thiserror::Error;
use tracing::warn;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Manifest output from the scan stage. Entries are sorted newest-first.
#[derive(Debug, Serialize)]
pub struct Manifest {
    pub entries: Vec<Entry>,
    pub config: SiteConfig,
}

/// One discovered entry.
#[derive(Debug, Clone, Serialize)]
pub struct Entry {
    /// Date from the entry name. An `[izu:date:...]` tag in the content
    /// overrides it at render time.
    pub date: EntryDate,
    /// Title from the entry name, if it carries one past the date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Entry name, used as the output directory name.
    pub slug: String,
    /// Content file path relative to the source root.
    pub content_file: String,
    /// Sibling image file names, in name order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

impl Entry {
    /// Absolute path of the content file.
    pub fn content_path(&self, root: &Path) -> PathBuf {
        root.join(&self.content_file)
    }
}

const CONTENT_EXTENSIONS: &[&str] = &["izu", "html"];
const IMAGE_EXTENSIONS: &[&str] = &["gif", "jpg", "jpeg", "png", "svg"];

pub fn scan(root: &Path) -> Result<Manifest, ScanError> {
    let config = config::load_config(root)?;
    let theme_dir = config.layout.theme_dir.clone();

    let mut entries = Vec::new();
    for item in WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let item = item?;
        let name = item.file_name().to_string_lossy().to_string();
        if name.starts_with('.') || name == config::CONFIG_FILE || name == theme_dir {
            continue;
        }

        if item.file_type().is_dir() {
            match parse_entry_name(&name) {
                Some((date, title)) => {
                    if let Some(entry) = build_entry(root, item.path(), &name, date, title)? {
                        entries.push(entry);
                    }
                }
                None => warn!(directory = %name, "skipping undated directory"),
            }
        } else if has_extension(item.path(), CONTENT_EXTENSIONS) {
            let stem = item
                .path()
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            match parse_entry_name(&stem) {
                Some((date, title)) => entries.push(Entry {
                    date,
                    title,
                    slug: stem,
                    content_file: name,
                    images: Vec::new(),
                }),
                None => warn!(file = %name, "skipping undated file"),
            }
        }
    }

    entries.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| b.slug.cmp(&a.slug)));
    Ok(Manifest { entries, config })
}

/// Build an entry from a dated directory, or `None` when it has no content
/// file.
fn build_entry(
    root: &Path,
    dir: &Path,
    name: &str,
    date: EntryDate,
    title: Option<String>,
) -> Result<Option<Entry>, ScanError> {
    let mut files: Vec<String> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .filter(|n| !n.starts_with('.'))
        .collect();
    files.sort();

    // `.izu` beats `.html`, name order breaks ties.
    let content = CONTENT_EXTENSIONS.iter().find_map(|ext| {
        files
            .iter()
            .find(|n| Path::new(n).extension().is_some_and(|e| e.eq_ignore_ascii_case(ext)))
    });
    let Some(content) = content else {
        warn!(directory = %name, "skipping entry without a content file");
        return Ok(None);
    };

    let images = files
        .iter()
        .filter(|n| has_extension(Path::new(n), IMAGE_EXTENSIONS))
        .cloned()
        .collect();

    let content_file = dir
        .join(content)
        .strip_prefix(root)
        .expect("entry lives under the root")
        .to_string_lossy()
        .to_string();

    Ok(Some(Entry {
        date,
        title,
        slug: name.to_string(),
        content_file,
        images,
    }))
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|ext| extensions.contains(&ext.as_str()))
}

/// Parse a dated entry name into its date and optional title.
///
/// - `2006-05-28-low-tide` → (2006-05-28, Some("low tide"))
/// - `20060612_dunes` → (2006-06-12, Some("dunes"))
/// - `2006-07-02` → (2006-07-02, None)
pub fn parse_entry_name(name: &str) -> Option<(EntryDate, Option<String>)> {
    let caps = regex!(r"^(\d{4}-\d{1,2}-\d{1,2}|\d{4}/\d{1,2}/\d{1,2}|\d{8})(?:[-_ ]+(.+))?$")
        .captures(name)?;
    let date = EntryDate::parse(&caps[1])?;
    let title = caps.get(2).map(|m| m.as_str().replace(['-', '_'], " "));
    Some((date, title))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_entry(root: &Path, name: &str, files: &[&str]) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        for file in files {
            fs::write(dir.join(file), "content").unwrap();
        }
    }

    // =========================================================================
    // Entry name parsing
    // =========================================================================

    #[test]
    fn entry_name_with_title() {
        let (date, title) = parse_entry_name("2006-05-28-low-tide").unwrap();
        assert_eq!(date, EntryDate::new(2006, 5, 28));
        assert_eq!(title.as_deref(), Some("low tide"));
    }

    #[test]
    fn entry_name_compact_date() {
        let (date, title) = parse_entry_name("20060612_dunes").unwrap();
        assert_eq!(date, EntryDate::new(2006, 6, 12));
        assert_eq!(title.as_deref(), Some("dunes"));
    }

    #[test]
    fn entry_name_date_only() {
        let (date, title) = parse_entry_name("2006-07-02").unwrap();
        assert_eq!(date, EntryDate::new(2006, 7, 2));
        assert_eq!(title, None);
    }

    #[test]
    fn entry_name_space_separator() {
        let (_, title) = parse_entry_name("2006-05-28 at the beach").unwrap();
        assert_eq!(title.as_deref(), Some("at the beach"));
    }

    #[test]
    fn entry_name_undated_is_none() {
        assert!(parse_entry_name("drafts").is_none());
        assert!(parse_entry_name("notes-2006").is_none());
    }

    #[test]
    fn entry_name_invalid_date_is_none() {
        // Month 13 fails date validation even though the shape matches.
        assert!(parse_entry_name("2006-13-01-oops").is_none());
    }

    // =========================================================================
    // Scanning
    // =========================================================================

    #[test]
    fn scan_finds_dated_directories() {
        let tmp = TempDir::new().unwrap();
        make_entry(tmp.path(), "2006-05-28-low-tide", &["index.izu", "rocks.jpg"]);
        make_entry(tmp.path(), "2006-06-12-dunes", &["index.izu"]);

        let manifest = scan(tmp.path()).unwrap();
        assert_eq!(manifest.entries.len(), 2);
    }

    #[test]
    fn entries_sorted_newest_first() {
        let tmp = TempDir::new().unwrap();
        make_entry(tmp.path(), "2006-05-28-first", &["index.izu"]);
        make_entry(tmp.path(), "2006-07-02-third", &["index.izu"]);
        make_entry(tmp.path(), "2006-06-12-second", &["index.izu"]);

        let manifest = scan(tmp.path()).unwrap();
        let slugs: Vec<&str> = manifest.entries.iter().map(|e| e.slug.as_str()).collect();
        assert_eq!(
            slugs,
            vec!["2006-07-02-third", "2006-06-12-second", "2006-05-28-first"]
        );
    }

    #[test]
    fn undated_directory_skipped() {
        let tmp = TempDir::new().unwrap();
        make_entry(tmp.path(), "2006-05-28-tide", &["index.izu"]);
        make_entry(tmp.path(), "drafts", &["wip.izu"]);

        let manifest = scan(tmp.path()).unwrap();
        assert_eq!(manifest.entries.len(), 1);
        assert_eq!(manifest.entries[0].slug, "2006-05-28-tide");
    }

    #[test]
    fn theme_directory_skipped() {
        let tmp = TempDir::new().unwrap();
        make_entry(tmp.path(), "theme", &["entry.html", "index.html"]);
        make_entry(tmp.path(), "2006-05-28-tide", &["index.izu"]);

        let manifest = scan(tmp.path()).unwrap();
        assert_eq!(manifest.entries.len(), 1);
    }

    #[test]
    fn entry_without_content_file_skipped() {
        let tmp = TempDir::new().unwrap();
        make_entry(tmp.path(), "2006-05-28-photos-only", &["a.jpg", "b.jpg"]);

        let manifest = scan(tmp.path()).unwrap();
        assert!(manifest.entries.is_empty());
    }

    #[test]
    fn images_listed_in_name_order() {
        let tmp = TempDir::new().unwrap();
        make_entry(
            tmp.path(),
            "2006-05-28-tide",
            &["index.izu", "rocks.jpg", "dawn.png", "notes.txt"],
        );

        let manifest = scan(tmp.path()).unwrap();
        assert_eq!(manifest.entries[0].images, vec!["dawn.png", "rocks.jpg"]);
    }

    #[test]
    fn izu_content_beats_html() {
        let tmp = TempDir::new().unwrap();
        make_entry(tmp.path(), "2006-05-28-tide", &["page.html", "index.izu"]);

        let manifest = scan(tmp.path()).unwrap();
        assert!(manifest.entries[0].content_file.ends_with("index.izu"));
    }

    #[test]
    fn standalone_dated_file_is_an_entry() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("2006-07-02.izu"), "[izu:title:Quick note]").unwrap();

        let manifest = scan(tmp.path()).unwrap();
        assert_eq!(manifest.entries.len(), 1);
        let entry = &manifest.entries[0];
        assert_eq!(entry.slug, "2006-07-02");
        assert_eq!(entry.content_file, "2006-07-02.izu");
        assert!(entry.images.is_empty());
    }

    #[test]
    fn content_paths_are_relative() {
        let tmp = TempDir::new().unwrap();
        make_entry(tmp.path(), "2006-05-28-tide", &["index.izu"]);

        let manifest = scan(tmp.path()).unwrap();
        let entry = &manifest.entries[0];
        assert!(!entry.content_file.starts_with('/'));
        assert!(entry.content_path(tmp.path()).exists());
    }

    #[test]
    fn config_loaded_alongside_entries() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(config::CONFIG_FILE),
            "[site]\ntitle = \"Tidepools\"\n",
        )
        .unwrap();
        make_entry(tmp.path(), "2006-05-28-tide", &["index.izu"]);

        let manifest = scan(tmp.path()).unwrap();
        assert_eq!(manifest.config.site.title, "Tidepools");
        assert_eq!(manifest.entries.len(), 1);
    }

    #[test]
    fn manifest_serializes_to_json() {
        let tmp = TempDir::new().unwrap();
        make_entry(tmp.path(), "2006-05-28-tide", &["index.izu", "rocks.jpg"]);

        let manifest = scan(tmp.path()).unwrap();
        let json = serde_json::to_string_pretty(&manifest).unwrap();
        assert!(json.contains("2006-05-28-tide"));
        assert!(json.contains("rocks.jpg"));
    }
}
