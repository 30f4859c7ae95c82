//! Per-line Izu formatting pipeline.
//!
//! [`format_line`] turns one logical line of Izu markup into an HTML
//! fragment. The pipeline is an ordered sequence of text → text transforms
//! over the line, and the order is load-bearing:
//!
//! 1. HTML escaping of `&`, `<`, `>` — unconditional, before any markup is
//!    interpreted, so user-typed angle brackets can never corrupt emitted
//!    tags.
//! 2. `[[` → `[` unescaping — before bracket forms, so a literal `[` can be
//!    written without triggering link syntax (and so generated `[[...]]`
//!    placeholders are never re-escaped).
//! 3. Inline styles: bold `__x__`, italics `''x''`, code `==x==`. Lazy
//!    interiors require at least one character, so doubled delimiters fall
//!    through to the unescape step.
//! 4. Simple tags: `[br]`, `[p]`, and a lone trailing `/`.
//! 5. `riglink:`/`rigimg:` references — resolved against the source file's
//!    directory and emitted as template placeholders, before generic link
//!    forms so the generic bracket regex never sees them.
//! 6. Link and image forms: `[title|url]`, `[url]`, bare URLs and `#anchor`
//!    targets. A single `replace_all` pass, so emitted HTML is never
//!    rescanned.
//! 7. Bullet lines `* text` → `<li>text</li>` — after links, so a bullet
//!    can contain them.
//! 8. Unescaping of `__`, `''`, `==` doubles, then named-entity conversion
//!    of known accented characters.

use crate::date::regex;
use regex::Captures;
use std::path::Path;
use std::sync::OnceLock;
use tracing::warn;

/// Escape the three HTML-unsafe characters. Shared with the template
/// engine's `[[html ...]]` tag and the feed writer.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Where a line came from, for `rig*:` glob resolution and diagnostics.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LineContext<'a> {
    pub label: &'a str,
    pub source_dir: Option<&'a Path>,
}

/// Run the full pipeline over one logical line.
pub(crate) fn format_line(line: &str, ctx: LineContext<'_>) -> String {
    let mut text = escape_html(line);
    text = text.replace("[[", "[");
    text = apply_styles(&text);
    text = apply_simple_tags(&text);
    text = apply_rig_references(&text, ctx);
    text = apply_links(&text);
    text = apply_bullet(&text);
    text = unescape_doubles(&text);
    named_entities(&text)
}

// ---------------------------------------------------------------------------
// Inline styles
// ---------------------------------------------------------------------------

fn apply_styles(text: &str) -> String {
    let bold = regex!(r"__(.+?)__");
    let italics = regex!(r"''(.+?)''");
    let code = regex!(r"==(.+?)==");
    let text = bold.replace_all(text, "<b>$1</b>");
    let text = italics.replace_all(&text, "<i>$1</i>");
    code.replace_all(&text, "<code>$1</code>").into_owned()
}

fn apply_simple_tags(text: &str) -> String {
    let mut out = text.replace("[br]", "<br>").replace("[p]", "<p/>");
    // A lone trailing slash forces a line break.
    if out == "/" {
        return "<br>".to_string();
    }
    if out.ends_with('/')
        && out[..out.len() - 1]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_whitespace())
    {
        out.truncate(out.trim_end_matches('/').trim_end().len());
        out.push_str("<br>");
    }
    out
}

// ---------------------------------------------------------------------------
// riglink: / rigimg: references
// ---------------------------------------------------------------------------

/// Match `[title|riglink:glob]`, `[riglink:glob]`, `[rigimg:glob]` and
/// `[rigimg:link:glob]` forms. The glob is resolved against the source
/// file's directory; the first match (in name order) wins. The output is a
/// template placeholder — final URL construction belongs to the render
/// stage, which knows where the entry's images end up.
fn apply_rig_references(text: &str, ctx: LineContext<'_>) -> String {
    let re = regex!(r"\[(?:([^\[\]|]+)\|)?(riglink|rigimg:link|rigimg):([^\[\]]+)\]");
    re.replace_all(text, |caps: &Captures<'_>| {
        let title = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
        let kind = &caps[2];
        let pattern = caps[3].trim();
        let Some(file) = resolve_glob(pattern, ctx) else {
            warn!("{}: no file matches {kind}:{pattern}", ctx.label);
            return title.to_string();
        };
        match kind {
            "riglink" => {
                let label = if title.is_empty() { file.as_str() } else { title };
                format!("[[riglink {file} {label}]]")
            }
            "rigimg:link" if title.is_empty() => format!("[[rigimg link {file}]]"),
            "rigimg:link" => format!("[[rigimg link {file} {title}]]"),
            _ if title.is_empty() => format!("[[rigimg {file}]]"),
            _ => format!("[[rigimg {file} {title}]]"),
        }
    })
    .into_owned()
}

/// First directory entry matching a shell-style glob, in name order.
fn resolve_glob(pattern: &str, ctx: LineContext<'_>) -> Option<String> {
    let dir = ctx.source_dir?;
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names.into_iter().find(|name| glob_match(pattern, name))
}

/// Shell-style glob: `*` matches any run, `?` matches one character,
/// everything else is literal. Case-insensitive, since photo exports
/// disagree about extension casing.
pub(crate) fn glob_match(pattern: &str, name: &str) -> bool {
    fn matches(pat: &[char], name: &[char]) -> bool {
        match pat.split_first() {
            None => name.is_empty(),
            Some(('*', rest)) => {
                (0..=name.len()).any(|i| matches(rest, &name[i..]))
            }
            Some(('?', rest)) => !name.is_empty() && matches(rest, &name[1..]),
            Some((c, rest)) => {
                name.first().is_some_and(|n| n.eq_ignore_ascii_case(c)) && matches(rest, &name[1..])
            }
        }
    }
    let pat: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();
    matches(&pat, &name)
}

// ---------------------------------------------------------------------------
// Links and images
// ---------------------------------------------------------------------------

const IMAGE_EXTENSIONS: &[&str] = &["gif", "jpg", "jpeg", "png", "svg"];

fn is_image_target(target: &str) -> bool {
    let lower = target.to_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(&format!(".{ext}")))
}

fn is_link_target(target: &str) -> bool {
    target.starts_with("http://")
        || target.starts_with("https://")
        || target.starts_with("ftp://")
        || target.starts_with('#')
}

/// One combined pass over titled `[title|url]`, untitled `[url]` and bare
/// URL forms. Running them as a single `replace_all` means generated
/// `href`/`src` attributes are never seen by a later link rule.
fn apply_links(text: &str) -> String {
    let re = regex!(
        r#"\[([^\[\]|]+)\|([^\[\]|]+)\]|\[([^\[\]|\s]+)\]|((?:https?|ftp)://[^\s\[\]"]+)"#
    );
    re.replace_all(text, |caps: &Captures<'_>| {
        if let (Some(title), Some(target)) = (caps.get(1), caps.get(2)) {
            let title = title.as_str().trim();
            let target = target.as_str().trim();
            if is_image_target(target) {
                return format!(r#"<img src="{target}" alt="{title}" title="{title}">"#);
            }
            if is_link_target(target) {
                return format!(r#"<a href="{target}">{title}</a>"#);
            }
        } else if let Some(target) = caps.get(3) {
            let target = target.as_str();
            if is_image_target(target) {
                return format!(r#"<img src="{target}">"#);
            }
            if is_link_target(target) {
                return format!(r#"<a href="{target}">{target}</a>"#);
            }
        } else if let Some(url) = caps.get(4) {
            let url = url.as_str();
            if is_image_target(url) {
                return format!(r#"<img src="{url}">"#);
            }
            return format!(r#"<a href="{url}">{url}</a>"#);
        }
        // Not a recognized target: leave the bracketed text untouched.
        caps[0].to_string()
    })
    .into_owned()
}

fn apply_bullet(text: &str) -> String {
    match text.strip_prefix("* ") {
        Some(rest) if !rest.trim().is_empty() => format!("<li>{}</li>", rest.trim()),
        _ => text.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Unescaping and entities
// ---------------------------------------------------------------------------

fn unescape_doubles(text: &str) -> String {
    text.replace("__", "_").replace("''", "'").replace("==", "=")
}

/// Known accented characters become named entities. Anything outside the
/// table passes through as-is — input is UTF-8 end to end, so there is
/// nothing to fail on.
fn named_entities(text: &str) -> String {
    static TABLE: OnceLock<Vec<(char, &'static str)>> = OnceLock::new();
    let table = TABLE.get_or_init(|| {
        vec![
            ('à', "&agrave;"),
            ('â', "&acirc;"),
            ('ä', "&auml;"),
            ('ç', "&ccedil;"),
            ('é', "&eacute;"),
            ('è', "&egrave;"),
            ('ê', "&ecirc;"),
            ('ë', "&euml;"),
            ('î', "&icirc;"),
            ('ï', "&iuml;"),
            ('ô', "&ocirc;"),
            ('ö', "&ouml;"),
            ('ù', "&ugrave;"),
            ('û', "&ucirc;"),
            ('ü', "&uuml;"),
            ('œ', "&oelig;"),
            ('æ', "&aelig;"),
            ('ñ', "&ntilde;"),
            ('À', "&Agrave;"),
            ('Â', "&Acirc;"),
            ('Ç', "&Ccedil;"),
            ('É', "&Eacute;"),
            ('È', "&Egrave;"),
            ('Ê', "&Ecirc;"),
            ('Ô', "&Ocirc;"),
            ('Ù', "&Ugrave;"),
            ('«', "&laquo;"),
            ('»', "&raquo;"),
        ]
    });
    if text.is_ascii() {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match table.iter().find(|(k, _)| *k == c) {
            Some((_, entity)) => out.push_str(entity),
            None => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(line: &str) -> String {
        format_line(
            line,
            LineContext {
                label: "test",
                source_dir: None,
            },
        )
    }

    // =========================================================================
    // Escaping
    // =========================================================================

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(fmt("just a line of prose."), "just a line of prose.");
    }

    #[test]
    fn html_unsafe_characters_are_escaped() {
        assert_eq!(fmt("a < b & c > d"), "a &lt; b &amp; c &gt; d");
    }

    #[test]
    fn escaping_happens_before_markup() {
        // The angle brackets inside the link title must not survive raw.
        assert_eq!(
            fmt("[<x>|http://e.com]"),
            r#"<a href="http://e.com">&lt;x&gt;</a>"#
        );
    }

    // =========================================================================
    // Inline styles
    // =========================================================================

    #[test]
    fn bold() {
        assert_eq!(fmt("some __bold__ text"), "some <b>bold</b> text");
    }

    #[test]
    fn italics() {
        assert_eq!(fmt("some ''italic'' text"), "some <i>italic</i> text");
    }

    #[test]
    fn code() {
        assert_eq!(fmt("some ==code== text"), "some <code>code</code> text");
    }

    #[test]
    fn doubled_delimiters_are_literal_singles() {
        assert_eq!(fmt("____"), "__");
        assert_eq!(fmt("''''"), "''");
        assert_eq!(fmt("===="), "==");
        assert_eq!(fmt("[["), "[");
    }

    #[test]
    fn bold_requires_content() {
        // Exactly one conversion, nothing for the empty pair.
        assert_eq!(fmt("__bold__"), "<b>bold</b>");
    }

    // =========================================================================
    // Simple tags
    // =========================================================================

    #[test]
    fn br_tag() {
        assert_eq!(fmt("one[br]two"), "one<br>two");
    }

    #[test]
    fn p_tag() {
        assert_eq!(fmt("[p]"), "<p/>");
    }

    #[test]
    fn trailing_lone_slash_is_br() {
        assert_eq!(fmt("line one /"), "line one<br>");
        assert_eq!(fmt("/"), "<br>");
    }

    #[test]
    fn url_trailing_slash_is_not_br() {
        assert_eq!(
            fmt("http://example.com/"),
            r#"<a href="http://example.com/">http://example.com/</a>"#
        );
    }

    // =========================================================================
    // Links and images
    // =========================================================================

    #[test]
    fn titled_link() {
        assert_eq!(
            fmt("[home|http://example.com]"),
            r#"<a href="http://example.com">home</a>"#
        );
    }

    #[test]
    fn untitled_link() {
        assert_eq!(
            fmt("[http://example.com]"),
            r#"<a href="http://example.com">http://example.com</a>"#
        );
    }

    #[test]
    fn bare_url() {
        assert_eq!(
            fmt("see http://example.com/page here"),
            r#"see <a href="http://example.com/page">http://example.com/page</a> here"#
        );
    }

    #[test]
    fn anchor_link() {
        assert_eq!(fmt("[top|#top]"), r##"<a href="#top">top</a>"##);
    }

    #[test]
    fn titled_image() {
        assert_eq!(
            fmt("[dawn|http://example.com/dawn.jpg]"),
            r#"<img src="http://example.com/dawn.jpg" alt="dawn" title="dawn">"#
        );
    }

    #[test]
    fn untitled_image() {
        assert_eq!(
            fmt("[http://example.com/a.png]"),
            r#"<img src="http://example.com/a.png">"#
        );
    }

    #[test]
    fn bare_image_url() {
        assert_eq!(
            fmt("http://example.com/a.gif"),
            r#"<img src="http://example.com/a.gif">"#
        );
    }

    #[test]
    fn unrecognized_bracket_stays_literal() {
        assert_eq!(fmt("[not-a-link]"), "[not-a-link]");
    }

    #[test]
    fn ftp_link() {
        assert_eq!(
            fmt("[ftp://host/file]"),
            r#"<a href="ftp://host/file">ftp://host/file</a>"#
        );
    }

    // =========================================================================
    // rig references
    // =========================================================================

    #[test]
    fn rig_reference_without_source_dir_degrades_to_title() {
        assert_eq!(fmt("[my photo|rigimg:*.jpg]"), "my photo");
    }

    #[test]
    fn rig_reference_resolves_first_match() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("b.jpg"), "x").unwrap();
        std::fs::write(tmp.path().join("a.jpg"), "x").unwrap();
        let out = format_line(
            "[rigimg:*.jpg]",
            LineContext {
                label: "test",
                source_dir: Some(tmp.path()),
            },
        );
        assert_eq!(out, "[[rigimg a.jpg]]");
    }

    #[test]
    fn riglink_with_title() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("trip.izu"), "x").unwrap();
        let out = format_line(
            "[the trip|riglink:trip.*]",
            LineContext {
                label: "test",
                source_dir: Some(tmp.path()),
            },
        );
        assert_eq!(out, "[[riglink trip.izu the trip]]");
    }

    #[test]
    fn rigimg_link_variant() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("pic.png"), "x").unwrap();
        let out = format_line(
            "[rigimg:link:pic.png]",
            LineContext {
                label: "test",
                source_dir: Some(tmp.path()),
            },
        );
        assert_eq!(out, "[[rigimg link pic.png]]");
    }

    // =========================================================================
    // Bullets and entities
    // =========================================================================

    #[test]
    fn bullet_line() {
        assert_eq!(fmt("* first point"), "<li>first point</li>");
    }

    #[test]
    fn bullet_can_contain_link() {
        assert_eq!(
            fmt("* see [here|http://e.com]"),
            r#"<li>see <a href="http://e.com">here</a></li>"#
        );
    }

    #[test]
    fn accented_characters_become_entities() {
        assert_eq!(fmt("café à côté"), "caf&eacute; &agrave; c&ocirc;t&eacute;");
    }

    #[test]
    fn unknown_unicode_passes_through() {
        assert_eq!(fmt("日本"), "日本");
    }

    // =========================================================================
    // Glob matching
    // =========================================================================

    #[test]
    fn glob_star() {
        assert!(glob_match("*.jpg", "photo.jpg"));
        assert!(!glob_match("*.jpg", "photo.png"));
    }

    #[test]
    fn glob_question_mark() {
        assert!(glob_match("pic?.png", "pic1.png"));
        assert!(!glob_match("pic?.png", "pic12.png"));
    }

    #[test]
    fn glob_is_case_insensitive() {
        assert!(glob_match("*.JPG", "photo.jpg"));
    }

    #[test]
    fn glob_literal() {
        assert!(glob_match("exact.txt", "exact.txt"));
        assert!(!glob_match("exact.txt", "exact.txt.bak"));
    }
}
