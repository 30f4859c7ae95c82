//! The Izu markup parser.
//!
//! Izu is a line-oriented markup language for hand-authored photoblog
//! entries. A document is a stream of lines carrying header tags
//! (`[izu:name:value]`), section markers (`[s:name]`), escape blocks
//! (`[!-- ... --]` and `[!html: ... --]`) and prose formatted by the
//! [`inline`] pipeline. Parsing produces [`ParsedDoc`]: a map of header
//! tags plus a map of section-name → rendered HTML (or, for the `images`
//! section, a list of unresolved image placeholders).
//!
//! ## Grammar precedence, per physical line
//!
//! 1. Line continuation — a trailing `\` merges the next physical line.
//! 2. Escape blocks — scanned first, so nothing inside them is interpreted.
//!    Blocks may open and close on one line, span lines, or close and
//!    reopen on the same line; the same open/body/close scan handles all
//!    three, and `[!html:` content lands in its section in source order.
//! 3. Header tags — any number per line, dispatched per name.
//! 4. Section markers — each one flushes pending text through the previous
//!    section's formatter before switching.
//! 5. Whatever remains goes through the active section's formatter.
//!
//! ## Error posture
//!
//! Markup documents are long-lived hand-authored content: one bad line must
//! not blank a whole page. Malformed tags, unparsable dates, unknown
//! sections and mid-document read failures are logged through `tracing` and
//! parsing continues with the best partial result. This parser never
//! returns an error.
//!
//! All mutable state lives in a per-call [`DocumentState`]; the entry
//! points are plain functions, so concurrent parses are trivially safe.

pub mod inline;

pub use inline::escape_html;

use crate::buffer::ScanBuffer;
use crate::date::{EntryDate, regex};
use inline::LineContext;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use tracing::{error, warn};

/// Section receiving text before any `[s:...]` marker.
pub const DEFAULT_SECTION: &str = "en";

/// The section with the stricter images-only formatter.
pub const IMAGES_SECTION: &str = "images";

/// Value of one `[izu:name:value]` header tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TagValue {
    /// Default handler: the trimmed value, verbatim.
    Text(String),
    /// `[izu:date:...]`, parsed flexibly.
    Date(EntryDate),
    /// `[izu:cat:...]` — lowercased, accumulated across declarations.
    Categories(BTreeSet<String>),
}

/// Accumulated content of one named section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SectionValue {
    /// Rendered markup, wrapped in the `<span class="izu">` marker.
    Html(String),
    /// The `images` section: unresolved `[[rigimg ...]]` placeholders.
    Images(Vec<String>),
}

/// Result of parsing one Izu document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedDoc {
    pub tags: BTreeMap<String, TagValue>,
    pub sections: BTreeMap<String, SectionValue>,
}

impl ParsedDoc {
    pub fn date(&self) -> Option<EntryDate> {
        match self.tags.get("date") {
            Some(TagValue::Date(d)) => Some(*d),
            _ => None,
        }
    }

    pub fn categories(&self) -> BTreeSet<String> {
        match self.tags.get("cat") {
            Some(TagValue::Categories(set)) => set.clone(),
            _ => BTreeSet::new(),
        }
    }

    pub fn text_tag(&self, name: &str) -> Option<&str> {
        match self.tags.get(name) {
            Some(TagValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn section_html(&self, name: &str) -> Option<&str> {
        match self.sections.get(name) {
            Some(SectionValue::Html(s)) => Some(s),
            _ => None,
        }
    }

    pub fn images(&self) -> &[String] {
        match self.sections.get(IMAGES_SECTION) {
            Some(SectionValue::Images(list)) => list,
            _ => &[],
        }
    }
}

/// Parse Izu markup from an in-memory string.
///
/// `label` names the input in diagnostics; `source_dir`, when present, is
/// the directory `riglink:`/`rigimg:` globs resolve against.
pub fn render_to_html(text: &str, label: &str, source_dir: Option<&Path>) -> ParsedDoc {
    let mut state = DocumentState::new(label, source_dir);
    let mut buf = ScanBuffer::new(text);
    while !buf.at_end() {
        let line = buf.skip_until("\n");
        buf.starts_with("\n", false, true);
        state.feed_line(&line);
    }
    state.close()
}

/// Parse an Izu file, line-buffered.
///
/// A read failure mid-document is logged and parsing stops with whatever
/// was accumulated so far; no error propagates.
pub fn parse_file(path: &Path) -> ParsedDoc {
    let label = path.display().to_string();
    let file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) => {
            error!("{label}: cannot open: {e}");
            return ParsedDoc::default();
        }
    };
    let mut state = DocumentState::new(&label, path.parent());
    for line in std::io::BufReader::new(file).lines() {
        match line {
            Ok(line) => state.feed_line(&line),
            Err(e) => {
                error!("{label}: read failed mid-document: {e}");
                break;
            }
        }
    }
    state.close()
}

// ---------------------------------------------------------------------------
// Document state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EscapeKind {
    /// `[!-- ... --]` — content is dropped.
    Comment,
    /// `[!html: ... --]` — content bypasses the formatter entirely.
    Html,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionKind {
    Default,
    Images,
}

#[derive(Debug)]
struct Accumulator {
    kind: SectionKind,
    text: String,
    images: Vec<String>,
    needs_break: bool,
}

impl Accumulator {
    fn new(kind: SectionKind) -> Self {
        Self {
            kind,
            text: String::new(),
            images: Vec::new(),
            needs_break: false,
        }
    }
}

/// Per-parse mutable state, created at the start of a parse call and
/// consumed by [`DocumentState::close`].
pub struct DocumentState {
    label: String,
    source_dir: Option<PathBuf>,
    tags: BTreeMap<String, TagValue>,
    sections: BTreeMap<String, Accumulator>,
    current: String,
    open_escape: Option<EscapeKind>,
    continuation: Option<String>,
}

/// HTML prefixes that already provide their own break, so an owed
/// paragraph is not inserted before them.
const BREAK_PREFIXES: &[&str] = &[
    "<p", "<br", "<li", "<ul", "<ol", "<h", "<table", "<pre", "<div",
];

impl DocumentState {
    pub fn new(label: &str, source_dir: Option<&Path>) -> Self {
        let mut sections = BTreeMap::new();
        sections.insert(
            DEFAULT_SECTION.to_string(),
            Accumulator::new(SectionKind::Default),
        );
        Self {
            label: label.to_string(),
            source_dir: source_dir.map(Path::to_path_buf),
            tags: BTreeMap::new(),
            sections,
            current: DEFAULT_SECTION.to_string(),
            open_escape: None,
            continuation: None,
        }
    }

    fn line_context(&self) -> LineContext<'_> {
        LineContext {
            label: &self.label,
            source_dir: self.source_dir.as_deref(),
        }
    }

    /// Process one physical line.
    pub fn feed_line(&mut self, raw: &str) {
        let line = match self.continuation.take() {
            Some(prev) => prev + raw.trim_end(),
            None => raw.trim_end().to_string(),
        };

        // Trailing backslash merges the next physical line before anything
        // else happens.
        if let Some(stripped) = line.strip_suffix('\\') {
            self.continuation = Some(stripped.to_string());
            return;
        }

        let blank = line.trim().is_empty() && self.open_escape.is_none();
        if blank {
            self.mark_blank();
            return;
        }
        self.process_line(&line);
    }

    /// Finalize: flush a dangling continuation, wrap every non-empty
    /// rendered section in the `<span class="izu">` marker, and return the
    /// immutable result.
    pub fn close(mut self) -> ParsedDoc {
        // A backslash on the last line continues into nothing.
        if let Some(pending) = self.continuation.take() {
            if !pending.is_empty() {
                self.process_line(&pending);
            }
        }
        if self.open_escape.is_some() {
            warn!("{}: escape block still open at end of document", self.label);
        }

        let mut sections = BTreeMap::new();
        for (name, acc) in self.sections {
            match acc.kind {
                SectionKind::Default if !acc.text.is_empty() => {
                    sections.insert(
                        name,
                        SectionValue::Html(format!("<span class=\"izu\">{}</span>", acc.text)),
                    );
                }
                SectionKind::Images if !acc.images.is_empty() => {
                    sections.insert(name, SectionValue::Images(acc.images));
                }
                _ => {}
            }
        }
        ParsedDoc {
            tags: self.tags,
            sections,
        }
    }

    // -----------------------------------------------------------------------
    // Escape blocks
    // -----------------------------------------------------------------------

    /// Dispatch one logical line, escape blocks first.
    ///
    /// The same open/body/close scan loops until no block boundary remains
    /// on the line, which uniformly covers blocks that open and close
    /// within the line, blocks spanning lines, and a close followed by a
    /// new open. Visible text between block boundaries accumulates into a
    /// run that flushes through tag extraction and the section formatter;
    /// a `[!html:` body flushes the pending run first and then lands raw,
    /// so section content keeps source order.
    fn process_line(&mut self, line: &str) {
        let mut visible = String::new();
        let mut rest = line;
        loop {
            match self.open_escape {
                Some(kind) => match rest.find("--]") {
                    Some(i) => {
                        self.finish_escape_chunk(kind, &rest[..i], &mut visible);
                        self.open_escape = None;
                        rest = &rest[i + 3..];
                    }
                    None => {
                        self.finish_escape_chunk(kind, rest, &mut visible);
                        break;
                    }
                },
                None => {
                    let comment = rest.find("[!--");
                    let html = rest.find("[!html:");
                    let opener = match (comment, html) {
                        (Some(c), Some(h)) if c <= h => Some((c, EscapeKind::Comment, 4)),
                        (_, Some(h)) => Some((h, EscapeKind::Html, 7)),
                        (Some(c), None) => Some((c, EscapeKind::Comment, 4)),
                        (None, None) => None,
                    };
                    match opener {
                        Some((i, kind, len)) => {
                            visible.push_str(&rest[..i]);
                            self.open_escape = Some(kind);
                            rest = &rest[i + len..];
                        }
                        None => {
                            visible.push_str(rest);
                            break;
                        }
                    }
                }
            }
        }
        self.flush_visible(&mut visible);
    }

    fn finish_escape_chunk(&mut self, kind: EscapeKind, body: &str, visible: &mut String) {
        match kind {
            EscapeKind::Comment => {}
            EscapeKind::Html => {
                self.flush_visible(visible);
                self.append_raw(body);
            }
        }
    }

    /// Run an accumulated visible stretch through tags and sections.
    fn flush_visible(&mut self, visible: &mut String) {
        if visible.is_empty() {
            return;
        }
        let line = self.extract_tags(visible);
        self.process_sections(&line);
        visible.clear();
    }

    // -----------------------------------------------------------------------
    // Header tags
    // -----------------------------------------------------------------------

    fn extract_tags(&mut self, line: &str) -> String {
        let well_formed = regex!(r"\[izu:([a-z0-9-]+):([^\]]*)\]");
        let mut found = Vec::new();
        let stripped = well_formed
            .replace_all(line, |caps: &regex::Captures<'_>| {
                found.push((caps[1].to_string(), caps[2].to_string()));
                String::new()
            })
            .into_owned();
        for (name, value) in found {
            self.dispatch_tag(&name, &value);
        }

        // Anything still shaped like a tag is malformed.
        let malformed = regex!(r"\[izu:[^\]]*\]");
        malformed
            .replace_all(&stripped, |caps: &regex::Captures<'_>| {
                warn!("{}: ignoring malformed tag {}", self.label, &caps[0]);
                String::new()
            })
            .into_owned()
    }

    fn dispatch_tag(&mut self, name: &str, value: &str) {
        match name {
            "date" => match EntryDate::parse(value) {
                Some(date) => {
                    self.tags.insert(name.to_string(), TagValue::Date(date));
                }
                None => {
                    error!("{}: unparsable date tag value '{value}'", self.label);
                }
            },
            "cat" => {
                let set = match self
                    .tags
                    .entry(name.to_string())
                    .or_insert_with(|| TagValue::Categories(BTreeSet::new()))
                {
                    TagValue::Categories(set) => set,
                    other => {
                        warn!("{}: tag 'cat' redeclared with a new shape", self.label);
                        *other = TagValue::Categories(BTreeSet::new());
                        match other {
                            TagValue::Categories(set) => set,
                            _ => unreachable!(),
                        }
                    }
                };
                for word in value.split([',', ' ', '\t', '\u{c}']) {
                    let word = word.trim().to_lowercase();
                    if !word.is_empty() {
                        set.insert(word);
                    }
                }
            }
            _ => {
                self.tags
                    .insert(name.to_string(), TagValue::Text(value.trim().to_string()));
            }
        }
    }

    // -----------------------------------------------------------------------
    // Section markers and formatting
    // -----------------------------------------------------------------------

    fn process_sections(&mut self, line: &str) {
        let marker = regex!(r"\[s:([a-z0-9]+)\]");
        let mut rest = line;
        while let Some(caps) = marker.captures(rest) {
            let whole = caps.get(0).unwrap();
            let before = &rest[..whole.start()];
            self.append_formatted(before);
            self.switch_section(&caps[1]);
            rest = &rest[whole.end()..];
        }

        // A marker-shaped leftover has an invalid section name.
        let malformed = regex!(r"\[s:[^\]]*\]");
        let rest = malformed
            .replace_all(rest, |caps: &regex::Captures<'_>| {
                warn!("{}: ignoring unknown section marker {}", self.label, &caps[0]);
                String::new()
            })
            .into_owned();
        self.append_formatted(&rest);
    }

    fn switch_section(&mut self, name: &str) {
        let kind = if name == IMAGES_SECTION {
            SectionKind::Images
        } else {
            SectionKind::Default
        };
        self.sections
            .entry(name.to_string())
            .or_insert_with(|| Accumulator::new(kind));
        self.current = name.to_string();
    }

    fn append_formatted(&mut self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        let formatted = inline::format_line(text, self.line_context());
        let acc = self.sections.get_mut(&self.current).expect("current section exists");
        match acc.kind {
            SectionKind::Images => {
                // Only lines that are purely a single rigimg reference are
                // kept; anything else is dropped, not escaped.
                let trimmed = formatted.trim();
                let pure = regex!(r"^\[\[rigimg [^\[\]]+\]\]$");
                if pure.is_match(trimmed) {
                    acc.images.push(trimmed.to_string());
                } else {
                    warn!("{}: dropping non-image line in images section", self.label);
                }
            }
            SectionKind::Default => append_html(acc, &formatted),
        }
    }

    /// `[!html:` content: straight into the section, no formatter.
    fn append_raw(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let acc = self.sections.get_mut(&self.current).expect("current section exists");
        if !acc.text.is_empty() && !acc.text.ends_with('\n') {
            acc.text.push('\n');
        }
        acc.text.push_str(text);
    }

    fn mark_blank(&mut self) {
        let acc = self.sections.get_mut(&self.current).expect("current section exists");
        if !acc.text.is_empty() {
            acc.needs_break = true;
        }
    }
}

/// Append formatted HTML to a section, honoring the paragraph/line-break
/// bookkeeping: an owed paragraph break materializes as a `<p>` glued to
/// the next content (unless it brings its own break), consecutive
/// `<br>`/`<p>` across a join are de-duplicated, and a newline separates
/// lines otherwise.
fn append_html(acc: &mut Accumulator, content: &str) {
    if content.is_empty() {
        return;
    }
    if acc.needs_break {
        acc.needs_break = false;
        if !starts_with_break(content) {
            acc.text.push_str("<p>");
            acc.text.push_str(content);
            return;
        }
    }

    let mut content = content;
    if acc.text.ends_with("<br>") {
        content = content.strip_prefix("<br>").unwrap_or(content);
    }
    if acc.text.ends_with("<p>") || acc.text.ends_with("<p/>") {
        content = content
            .strip_prefix("<p/>")
            .or_else(|| content.strip_prefix("<p>"))
            .unwrap_or(content);
    }
    if content.is_empty() {
        return;
    }
    // A trailing newline or break tag already separates; closing tags glue
    // onto what they close.
    let at_separator = acc.text.is_empty()
        || acc.text.ends_with('\n')
        || acc.text.ends_with("<br>")
        || acc.text.ends_with("<p>")
        || acc.text.ends_with("<p/>");
    if !at_separator && !content.starts_with("</") {
        acc.text.push('\n');
    }
    acc.text.push_str(content);
}

fn starts_with_break(content: &str) -> bool {
    BREAK_PREFIXES.iter().any(|p| content.starts_with(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> ParsedDoc {
        render_to_html(text, "test.izu", None)
    }

    fn en(doc: &ParsedDoc) -> &str {
        doc.section_html(DEFAULT_SECTION).unwrap_or("")
    }

    // =========================================================================
    // Sections and wrapping
    // =========================================================================

    #[test]
    fn simple_document_is_wrapped_in_marker_span() {
        let doc = parse("Hello world");
        assert_eq!(en(&doc), "<span class=\"izu\">Hello world</span>");
    }

    #[test]
    fn empty_document_has_no_sections() {
        let doc = parse("");
        assert!(doc.sections.is_empty());
        assert!(doc.tags.is_empty());
    }

    #[test]
    fn whitespace_only_document_has_no_sections() {
        let doc = parse("   \n\n  \t\n");
        assert!(doc.sections.is_empty());
    }

    #[test]
    fn section_marker_switches_sections() {
        let doc = parse("body text\n[s:fr]\ntexte");
        assert_eq!(en(&doc), "<span class=\"izu\">body text</span>");
        assert_eq!(
            doc.section_html("fr"),
            Some("<span class=\"izu\">texte</span>")
        );
    }

    #[test]
    fn multiple_markers_on_one_line_each_flush() {
        let doc = parse("one[s:fr]deux[s:en]two");
        assert_eq!(en(&doc), "<span class=\"izu\">one\ntwo</span>");
        assert_eq!(doc.section_html("fr"), Some("<span class=\"izu\">deux</span>"));
    }

    #[test]
    fn section_isolation() {
        let doc = parse("english text\n[s:images]\nnot an image\n[s:en]\nmore english");
        let body = en(&doc);
        assert!(body.contains("english text"));
        assert!(body.contains("more english"));
        assert!(!body.contains("not an image"));
        // The dropped line appears nowhere.
        assert!(doc.images().is_empty());
    }

    #[test]
    fn invalid_section_marker_is_dropped() {
        let doc = parse("before [s:No Such!] after");
        assert_eq!(en(&doc), "<span class=\"izu\">before  after</span>");
    }

    // =========================================================================
    // Paragraph and line-break bookkeeping
    // =========================================================================

    #[test]
    fn paragraph_insertion_law() {
        let doc = parse("Line 1\nLine 2\n\nLine 3");
        assert_eq!(
            en(&doc),
            "<span class=\"izu\">Line 1\nLine 2<p>Line 3</span>"
        );
    }

    #[test]
    fn no_paragraph_without_blank_line() {
        let doc = parse("Line 1\nLine 2\nLine 3");
        assert!(!en(&doc).contains("<p>"));
    }

    #[test]
    fn multiple_blank_lines_owe_a_single_paragraph() {
        let doc = parse("one\n\n\n\ntwo");
        assert_eq!(en(&doc), "<span class=\"izu\">one<p>two</span>");
    }

    #[test]
    fn leading_blank_lines_do_not_emit() {
        let doc = parse("\n\nfirst");
        assert_eq!(en(&doc), "<span class=\"izu\">first</span>");
    }

    #[test]
    fn owed_paragraph_suppressed_before_break_markup() {
        let doc = parse("one\n\n[p]two");
        assert_eq!(en(&doc), "<span class=\"izu\">one\n<p/>two</span>");
    }

    #[test]
    fn owed_paragraph_suppressed_before_bullet() {
        let doc = parse("intro\n\n* item");
        assert_eq!(en(&doc), "<span class=\"izu\">intro\n<li>item</li></span>");
    }

    #[test]
    fn consecutive_br_deduplicated_at_join() {
        let doc = parse("one /\n[br]two");
        assert_eq!(en(&doc), "<span class=\"izu\">one<br>two</span>");
    }

    // =========================================================================
    // Line continuation
    // =========================================================================

    #[test]
    fn backslash_joins_lines() {
        let doc = parse("one \\\ntwo");
        assert_eq!(en(&doc), "<span class=\"izu\">one two</span>");
    }

    #[test]
    fn continuation_chain() {
        let doc = parse("a\\\nb\\\nc");
        assert_eq!(en(&doc), "<span class=\"izu\">abc</span>");
    }

    #[test]
    fn dangling_continuation_still_flushes() {
        let doc = parse("tail\\");
        assert_eq!(en(&doc), "<span class=\"izu\">tail</span>");
    }

    // =========================================================================
    // Escape blocks
    // =========================================================================

    #[test]
    fn comment_block_on_one_line() {
        let doc = parse("keep [!-- drop --] this");
        assert_eq!(en(&doc), "<span class=\"izu\">keep  this</span>");
    }

    #[test]
    fn comment_block_spanning_lines() {
        let doc = parse("before\n[!-- one\ntwo\nthree --]\nafter");
        let body = en(&doc);
        assert!(body.contains("before"));
        assert!(body.contains("after"));
        assert!(!body.contains("one"));
        assert!(!body.contains("two"));
    }

    #[test]
    fn html_block_bypasses_formatting() {
        let doc = parse("[!html:<table><tr></tr></table>--]");
        assert_eq!(
            en(&doc),
            "<span class=\"izu\"><table><tr></tr></table></span>"
        );
    }

    #[test]
    fn html_block_spanning_lines() {
        let doc = parse("[!html:<ul>\n<li>raw & unescaped</li>\n</ul>--]");
        let body = en(&doc);
        assert!(body.contains("<li>raw & unescaped</li>"));
    }

    #[test]
    fn html_block_midline_keeps_source_order() {
        let doc = parse("intro [!html:<hr>--] outro");
        assert_eq!(en(&doc), "<span class=\"izu\">intro \n<hr>\n outro</span>");
    }

    #[test]
    fn close_then_reopen_on_same_line() {
        let doc = parse("[!-- a\nstill hidden --] visible [!-- b --] end");
        assert_eq!(en(&doc), "<span class=\"izu\"> visible  end</span>");
    }

    #[test]
    fn tags_inside_comments_are_ignored() {
        let doc = parse("[!-- [izu:date:2006-05-28] --]text");
        assert!(doc.date().is_none());
        assert!(en(&doc).contains("text"));
    }

    #[test]
    fn unclosed_block_swallows_rest_of_document() {
        let doc = parse("shown\n[!-- hidden\nstill hidden");
        assert_eq!(en(&doc), "<span class=\"izu\">shown</span>");
    }

    // =========================================================================
    // File input
    // =========================================================================

    #[test]
    fn parse_file_reads_a_document() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("entry.izu");
        std::fs::write(&path, "[izu:title:Trip]\nbody text\n").unwrap();

        let doc = parse_file(&path);
        assert_eq!(doc.text_tag("title"), Some("Trip"));
        assert_eq!(en(&doc), "<span class=\"izu\">body text</span>");
    }

    #[test]
    fn parse_file_missing_file_is_empty() {
        let doc = parse_file(Path::new("/no/such/entry.izu"));
        assert_eq!(doc, ParsedDoc::default());
    }

    #[test]
    fn read_failure_mid_document_keeps_partial_result() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("entry.izu");
        // The invalid UTF-8 line fails the buffered read; everything before
        // it must survive, everything after is never reached.
        std::fs::write(
            &path,
            b"[izu:title:Trip]\ngood line\n\xff\xfe\nnever reached\n",
        )
        .unwrap();

        let doc = parse_file(&path);
        assert_eq!(doc.text_tag("title"), Some("Trip"));
        let body = en(&doc);
        assert!(body.contains("good line"));
        assert!(!body.contains("never reached"));
    }

    // =========================================================================
    // Header tags
    // =========================================================================

    #[test]
    fn date_tag_parsed() {
        let doc = parse("[izu:date:2006-05-28 17:10:23]\nbody");
        assert_eq!(
            doc.date(),
            Some(EntryDate::new(2006, 5, 28).with_time(17, 10, 23))
        );
    }

    #[test]
    fn invalid_date_is_logged_and_unset() {
        let doc = parse("[izu:date:not a date]\nbody");
        assert!(doc.date().is_none());
        // The rest of the document still parses.
        assert!(en(&doc).contains("body"));
    }

    #[test]
    fn categories_accumulate_across_declarations() {
        let doc = parse("[izu:cat:Video, Photo]\ntext\n[izu:cat:travel photo]");
        let cats: Vec<String> = doc.categories().into_iter().collect();
        assert_eq!(cats, vec!["photo", "travel", "video"]);
    }

    #[test]
    fn default_tag_handler_stores_trimmed_text() {
        let doc = parse("[izu:title:  A Day Out  ]");
        assert_eq!(doc.text_tag("title"), Some("A Day Out"));
    }

    #[test]
    fn several_tags_on_one_line() {
        let doc = parse("[izu:title:Trip][izu:date:2006-05-28]body");
        assert_eq!(doc.text_tag("title"), Some("Trip"));
        assert!(doc.date().is_some());
        assert!(en(&doc).contains("body"));
    }

    #[test]
    fn malformed_tag_is_dropped() {
        let doc = parse("before [izu:broken] after");
        assert_eq!(en(&doc), "<span class=\"izu\">before  after</span>");
    }

    // =========================================================================
    // Images section
    // =========================================================================

    #[test]
    fn images_section_keeps_only_pure_rigimg_lines() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("dawn.jpg"), "x").unwrap();
        std::fs::write(tmp.path().join("dusk.jpg"), "x").unwrap();
        let doc = render_to_html(
            "[s:images]\n[rigimg:dawn.*]\nnot an image line\n[rigimg:dusk.*]",
            "test.izu",
            Some(tmp.path()),
        );
        assert_eq!(
            doc.images(),
            &["[[rigimg dawn.jpg]]".to_string(), "[[rigimg dusk.jpg]]".to_string()]
        );
    }

    #[test]
    fn body_text_renders_inline_markup() {
        let doc = parse("some __bold__ and ''italic'' text");
        assert_eq!(
            en(&doc),
            "<span class=\"izu\">some <b>bold</b> and <i>italic</i> text</span>"
        );
    }
}
