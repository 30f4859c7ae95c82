//! # izugen
//!
//! A static photoblog generator for Izu markup. Your filesystem is the data
//! source: dated directories become entries, each carrying one `.izu` content
//! file and the photos it talks about.
//!
//! # Architecture: Two-Stage Pipeline
//!
//! ```text
//! 1. Scan     source/   →  Manifest        (filesystem → dated entries)
//! 2. Render   Manifest  →  site/           (entry pages, listings, feed)
//! ```
//!
//! The scan manifest is serializable JSON you can inspect (`izugen scan`),
//! and the render stage is driven entirely by it, so pipeline logic is
//! testable without a real site.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`buffer`] | Character cursor with line/column tracking, shared by both parsers |
//! | [`izu`] | The Izu markup parser — entry text → header tags + HTML sections |
//! | [`template`] | The `[[tag]]` template language: parser, evaluator, binding values |
//! | [`scan`] | Stage 1 — discovers dated entries, produces the scan manifest |
//! | [`render`] | Stage 2 — expands templates into entry pages, listings, and the feed |
//! | [`config`] | `izugen.toml` loading, merging, and validation |
//! | [`cache`] | Content-addressed render cache for incremental builds |
//! | [`feed`] | Atom feed writer |
//! | [`date`] | Entry date parsing and formatting |
//!
//! # Design Decisions
//!
//! ## Two Parsers, Two Error Postures
//!
//! Entry markup is hand-authored, long-lived content: one bad line must not
//! blank a page, so the [`izu`] parser logs problems and keeps going, and
//! never returns an error. Templates are site infrastructure shared by every
//! page, so the [`template`] parser and engine fail loudly with
//! `[<file>, line N, col M]` locations instead of degrading silently.
//!
//! ## Runtime Templates Over Compile-Time HTML
//!
//! Pages come from a tiny `[[tag]]` template language evaluated at build
//! time, not from HTML generated in Rust. Themes are plain files a user can
//! edit without recompiling, and the tag vocabulary is deliberately closed:
//! extending it means adding an enum variant and its evaluation arm, which
//! keeps templates auditable.
//!
//! ## Photos Copied As-Is
//!
//! No image re-encoding. Entry images are copied beside their page and sized
//! with a `width` attribute from config. A photoblog's photos are already
//! export-quality; re-encoding them trades fidelity for pipeline complexity.
//!
//! ## Content-Addressed Render Cache
//!
//! Entry pages are cached by SHA-256 of source text + entry template, so
//! `git checkout` (which resets mtimes) never causes a rebuild and editing
//! the theme rebuilds everything. Listing pages are always rebuilt — they
//! depend on the whole entry set and are few.
//!
//! # The Output
//!
//! Plain HTML, copied images, one Atom feed. The generated site can be
//! dropped on any file server — no Node, no PHP, no database.

pub mod buffer;
pub mod cache;
pub mod config;
pub mod date;
pub mod feed;
pub mod izu;
pub mod render;
pub mod scan;
pub mod template;
