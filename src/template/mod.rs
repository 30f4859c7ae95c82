//! The page template engine.
//!
//! Templates are flat text with `[[tag ...]]` invocations. [`parse`] turns a
//! template into a [`NodeList`] in one linear pass with no backtracking;
//! [`engine::generate`] expands the tree against a binding context.
//!
//! The tag vocabulary is fixed — `#` (comment), `raw`, `html`, `url`,
//! `riglink`, `rigimg`, `for`, `if`, and the `end` sentinel that closes a
//! body. Extending the language means adding a [`TagKind`] variant and its
//! evaluation arm, not subclassing anything.
//!
//! Unlike markup parsing, template parsing fails loudly: templates are site
//! infrastructure reused by every page, so an unclosed tag or unknown
//! keyword aborts the render with a `[<label>, line N, col M]` error rather
//! than silently degrading every generated page.

pub mod engine;
pub mod value;

pub use engine::generate;
pub use value::{Bindings, Value};

use crate::buffer::ScanBuffer;
use thiserror::Error;

/// A template syntax or evaluation error, pinned to its source location.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("[{label}, line {line}, col {column}] {message}")]
pub struct TemplateError {
    pub label: String,
    pub line: u32,
    pub column: u32,
    pub message: String,
}

impl TemplateError {
    pub(crate) fn new(label: &str, line: u32, column: u32, message: impl Into<String>) -> Self {
        Self {
            label: label.to_string(),
            line,
            column,
            message: message.into(),
        }
    }
}

/// The fixed tag vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    /// `[[# ...]]` — always expands to nothing.
    Comment,
    /// `[[raw expr]]` — expression result, verbatim.
    Raw,
    /// `[[html expr]]` — expression result, HTML-escaped.
    Html,
    /// `[[url expr]]` — expression result, percent-encoded per URL component.
    Url,
    /// `[[riglink file title...]]` — deferred entry link, resolved against
    /// the `rig` bindings supplied by the render stage.
    RigLink,
    /// `[[rigimg [link] file caption...]]` — deferred image reference.
    RigImg,
    /// `[[for var in expr]] ... [[end]]`.
    For,
    /// `[[if expr]] ... [[end]]`.
    If,
    /// Parser-only sentinel; never appears in a finished tree.
    End,
}

impl TagKind {
    fn lookup(keyword: &str) -> Option<TagKind> {
        if keyword.starts_with('#') {
            return Some(TagKind::Comment);
        }
        match keyword {
            "raw" => Some(TagKind::Raw),
            "html" => Some(TagKind::Html),
            "url" => Some(TagKind::Url),
            "riglink" => Some(TagKind::RigLink),
            "rigimg" => Some(TagKind::RigImg),
            "for" => Some(TagKind::For),
            "if" => Some(TagKind::If),
            "end" => Some(TagKind::End),
            _ => None,
        }
    }

    fn accepts_body(self) -> bool {
        matches!(self, TagKind::For | TagKind::If)
    }

    fn keyword(self) -> &'static str {
        match self {
            TagKind::Comment => "#",
            TagKind::Raw => "raw",
            TagKind::Html => "html",
            TagKind::Url => "url",
            TagKind::RigLink => "riglink",
            TagKind::RigImg => "rigimg",
            TagKind::For => "for",
            TagKind::If => "if",
            TagKind::End => "end",
        }
    }
}

/// One template AST node.
///
/// A tag whose kind accepts a body always carries `body: Some(..)`,
/// terminated by a matching `[[end]]` during parse; leaf tags always carry
/// `None`. The tree is immutable once parsed and rebuilt in full on every
/// parse call.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Raw passthrough text.
    Literal(String),
    Tag {
        kind: TagKind,
        /// Everything between the keyword and `]]`, trimmed.
        params: String,
        body: Option<NodeList>,
        line: u32,
        column: u32,
    },
}

impl Node {
    /// Parameters split on whitespace, however they were laid out.
    pub fn param_list(&self) -> Vec<&str> {
        match self {
            Node::Literal(_) => Vec::new(),
            Node::Tag { params, .. } => params.split_whitespace().collect(),
        }
    }
}

/// The root of a parsed template and the content of every tag body.
pub type NodeList = Vec<Node>;

/// Parse template text into a [`NodeList`].
///
/// `label` (a filename, or `"source"` for in-memory templates) names the
/// template in error messages.
pub fn parse(text: &str, label: &str) -> Result<NodeList, TemplateError> {
    let mut buf = ScanBuffer::new(text);
    parse_nodes(&mut buf, label, None)
}

/// One nesting level. `open` carries the tag that opened this body, so both
/// "EOF inside a body" and "[[end]] with nothing open" can name the right
/// location.
fn parse_nodes(
    buf: &mut ScanBuffer,
    label: &str,
    open: Option<(TagKind, u32, u32)>,
) -> Result<NodeList, TemplateError> {
    let mut nodes = NodeList::new();
    loop {
        if buf.at_end() {
            return match open {
                None => Ok(nodes),
                Some((kind, line, column)) => Err(TemplateError::new(
                    label,
                    line,
                    column,
                    format!("[[{}]] is never closed", kind.keyword()),
                )),
            };
        }

        if !buf.starts_with("[[", false, true) {
            let text = buf.skip_until("[[");
            if !text.is_empty() {
                nodes.push(Node::Literal(text));
            }
            continue;
        }

        // Location of the `[[` that opened this tag.
        let (line, column) = (buf.line(), buf.column().saturating_sub(2));
        let keyword = buf.next_token().to_lowercase();
        let params = buf.skip_until("]]").trim().to_string();
        if !buf.starts_with("]]", false, true) {
            return Err(TemplateError::new(label, line, column, "missing closing ]]"));
        }

        let kind = TagKind::lookup(&keyword).ok_or_else(|| {
            TemplateError::new(label, line, column, format!("unknown tag '{keyword}'"))
        })?;

        if kind == TagKind::End {
            return if open.is_some() {
                Ok(nodes)
            } else {
                Err(TemplateError::new(
                    label,
                    line,
                    column,
                    "unexpected [[end]]: no tag is open",
                ))
            };
        }

        let body = if kind.accepts_body() {
            Some(parse_nodes(buf, label, Some((kind, line, column)))?)
        } else {
            None
        };
        nodes.push(Node::Tag {
            kind,
            params,
            body,
            line,
            column,
        });
    }
}
