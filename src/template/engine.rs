//! Template tree evaluation.
//!
//! [`generate`] walks a parsed [`NodeList`] with a binding context and
//! produces the expanded text. Expressions are deliberately tiny: a dotted
//! name looked up in the context, an integer or quoted-string literal, a
//! `not` prefix, and `==`/`!=` comparison. There is no ambient state and no
//! way to call code — evaluation reads the bindings and nothing else.
//!
//! Evaluation failures (unknown name, non-sequence in a `[[for]]`) are
//! fatal for the render and carry the offending tag's source location, same
//! as syntax errors.

use super::value::{Bindings, Value};
use super::{Node, NodeList, TagKind, TemplateError};
use crate::date::regex;
use crate::izu::escape_html;

/// Expand a parsed template against a binding context.
pub fn generate(nodes: &NodeList, bindings: &Bindings, label: &str) -> Result<String, TemplateError> {
    let mut out = String::new();
    render_nodes(nodes, bindings, label, &mut out)?;
    Ok(out)
}

fn render_nodes(
    nodes: &NodeList,
    ctx: &Bindings,
    label: &str,
    out: &mut String,
) -> Result<(), TemplateError> {
    for node in nodes {
        match node {
            Node::Literal(text) => out.push_str(text),
            Node::Tag { kind, params, body, line, column } => {
                let fail = |message: String| TemplateError::new(label, *line, *column, message);
                match kind {
                    TagKind::Comment => {}
                    TagKind::Raw => {
                        let value = eval_expr(params, ctx).map_err(fail)?;
                        out.push_str(&value.to_string());
                    }
                    TagKind::Html => {
                        let value = eval_expr(params, ctx).map_err(fail)?;
                        out.push_str(&escape_html(&value.to_string()));
                    }
                    TagKind::Url => {
                        let value = eval_expr(params, ctx).map_err(fail)?;
                        out.push_str(&encode_url(&value.to_string()));
                    }
                    TagKind::RigLink => {
                        out.push_str(&render_riglink(params, ctx).map_err(fail)?);
                    }
                    TagKind::RigImg => {
                        out.push_str(&render_rigimg(params, ctx).map_err(fail)?);
                    }
                    TagKind::If => {
                        let value = eval_expr(params, ctx).map_err(fail)?;
                        if value.truthy() {
                            let body = body.as_ref().expect("if tag carries a body");
                            render_nodes(body, ctx, label, out)?;
                        }
                    }
                    TagKind::For => {
                        let caps = regex!(r"^([A-Za-z_][A-Za-z0-9_]*)\s+in\s+(.+)$")
                            .captures(params)
                            .ok_or_else(|| {
                                fail(format!("for expects '<var> in <expression>', got '{params}'"))
                            })?;
                        let var = caps[1].to_string();
                        let value = eval_expr(&caps[2], ctx).map_err(&fail)?;
                        let items = match value {
                            Value::List(items) => items,
                            other => {
                                return Err(fail(format!("'{}' is not a sequence", other)));
                            }
                        };
                        let body = body.as_ref().expect("for tag carries a body");
                        for item in items {
                            // Each iteration renders against its own copy of
                            // the context, so the loop variable never leaks.
                            let mut scope = ctx.clone();
                            scope.insert(var.clone(), item);
                            render_nodes(body, &scope, label, out)?;
                        }
                    }
                    TagKind::End => unreachable!("end never appears in a parsed tree"),
                }
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Deferred rig references
// ---------------------------------------------------------------------------

/// The render stage supplies a `rig` map binding: `rig.base` is the public
/// URL prefix for the entry's files, `rig.img_width` the display width for
/// inline images.
fn rig_setting<'a>(ctx: &'a Bindings, key: &str) -> Result<&'a Value, String> {
    match ctx.get("rig") {
        Some(Value::Map(map)) => map
            .get(key)
            .ok_or_else(|| format!("binding 'rig.{key}' is not set")),
        _ => Err("binding 'rig' is not set".to_string()),
    }
}

fn render_riglink(params: &str, ctx: &Bindings) -> Result<String, String> {
    let mut words = params.split_whitespace();
    let file = words.next().ok_or("riglink needs a target file")?;
    let title = words.collect::<Vec<_>>().join(" ");
    let base = rig_setting(ctx, "base")?;
    let label = if title.is_empty() { file } else { &title };
    Ok(format!(
        r#"<a href="{}{}">{}</a>"#,
        encode_url(&base.to_string()),
        encode_url(file),
        escape_html(label)
    ))
}

fn render_rigimg(params: &str, ctx: &Bindings) -> Result<String, String> {
    let mut words = params.split_whitespace().peekable();
    let linked = words.peek() == Some(&"link");
    if linked {
        words.next();
    }
    let file = words.next().ok_or("rigimg needs a target file")?;
    let caption = words.collect::<Vec<_>>().join(" ");
    let base = rig_setting(ctx, "base")?;
    let width = rig_setting(ctx, "img_width")?;
    let src = format!("{}{}", encode_url(&base.to_string()), encode_url(file));
    let mut img = format!(r#"<img src="{src}" width="{width}""#);
    if !caption.is_empty() {
        let caption = escape_html(&caption);
        img.push_str(&format!(r#" alt="{caption}" title="{caption}""#));
    }
    img.push('>');
    if linked {
        Ok(format!(r#"<a href="{src}">{img}</a>"#))
    } else {
        Ok(img)
    }
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

fn eval_expr(expr: &str, ctx: &Bindings) -> Result<Value, String> {
    let expr = expr.trim();
    if expr.is_empty() {
        return Err("empty expression".to_string());
    }
    if let Some(rest) = expr.strip_prefix("not ") {
        return Ok(Value::Bool(!eval_expr(rest, ctx)?.truthy()));
    }
    // Comparison operators bind loosest; first one wins.
    for op in ["==", "!="] {
        if let Some((left, right)) = split_operator(expr, op) {
            let left = eval_term(left, ctx)?;
            let right = eval_term(right, ctx)?;
            let equal = values_equal(&left, &right);
            return Ok(Value::Bool(if op == "==" { equal } else { !equal }));
        }
    }
    eval_term(expr, ctx)
}

/// Split on an operator occurring outside quoted strings.
fn split_operator<'a>(expr: &'a str, op: &str) -> Option<(&'a str, &'a str)> {
    let mut quote: Option<char> = None;
    let bytes = expr.as_bytes();
    for (i, c) in expr.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if bytes[i..].starts_with(op.as_bytes()) => {
                return Some((&expr[..i], &expr[i + op.len()..]));
            }
            None => {}
        }
    }
    None
}

fn eval_term(term: &str, ctx: &Bindings) -> Result<Value, String> {
    let term = term.trim();
    if term.is_empty() {
        return Err("empty expression".to_string());
    }
    for quote in ['"', '\''] {
        if term.len() >= 2 && term.starts_with(quote) && term.ends_with(quote) {
            return Ok(Value::Str(term[1..term.len() - 1].to_string()));
        }
    }
    if let Ok(n) = term.parse::<i64>() {
        return Ok(Value::Int(n));
    }
    match term {
        "true" => return Ok(Value::Bool(true)),
        "false" => return Ok(Value::Bool(false)),
        _ => {}
    }
    lookup_path(term, ctx)
}

/// Resolve a dotted name against the bindings, descending through nested
/// maps.
fn lookup_path(path: &str, ctx: &Bindings) -> Result<Value, String> {
    let mut segments = path.split('.');
    let first = segments.next().expect("split yields at least one segment");
    let mut current = ctx
        .get(first)
        .ok_or_else(|| format!("unknown name '{first}'"))?;
    for segment in segments {
        match current {
            Value::Map(map) => {
                current = map
                    .get(segment)
                    .ok_or_else(|| format!("'{path}': no field '{segment}'"))?;
            }
            _ => return Err(format!("'{path}': '{segment}' is not a map field")),
        }
    }
    Ok(current.clone())
}

/// Same-variant values compare structurally; mixed types fall back to their
/// string forms, so `[[if entry.year == "2006"]]` behaves as authors expect.
fn values_equal(left: &Value, right: &Value) -> bool {
    if std::mem::discriminant(left) == std::mem::discriminant(right) {
        left == right
    } else {
        left.to_string() == right.to_string()
    }
}

// ---------------------------------------------------------------------------
// URL encoding
// ---------------------------------------------------------------------------

/// Percent-encode a URL piecewise by component.
///
/// The scheme separator `://` survives intact; within the host part `.`,
/// `:` and `@` are preserved; `/` stays a path separator and each segment
/// is encoded on its own. A value without a scheme is treated as a bare
/// path.
pub fn encode_url(url: &str) -> String {
    match url.split_once("://") {
        Some((scheme, rest)) => {
            let (host, path) = match rest.split_once('/') {
                Some((host, path)) => (host, Some(path)),
                None => (rest, None),
            };
            let mut out = format!("{}://{}", scheme, encode_component(host, ".:@"));
            if let Some(path) = path {
                out.push('/');
                out.push_str(&encode_path(path));
            }
            out
        }
        None => encode_path(url),
    }
}

fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|seg| encode_component(seg, "."))
        .collect::<Vec<_>>()
        .join("/")
}

fn encode_component(text: &str, keep: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '~') || keep.contains(c) {
            out.push(c);
        } else {
            let mut bytes = [0u8; 4];
            for byte in c.encode_utf8(&mut bytes).bytes() {
                out.push_str(&format!("%{byte:02X}"));
            }
        }
    }
    out
}
