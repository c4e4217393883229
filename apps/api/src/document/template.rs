//! Minimal `{tag}` template renderer for WordprocessingML bodies.
//!
//! Supported syntax (the subset the resume template is built with):
//! - `{path.to.value}`: value lookup, innermost loop scope first
//! - `{.}`: the current loop item
//! - `{#name}` … `{/name}`: section: repeats for arrays, renders once for other
//!   truthy values, skips falsy ones
//! - `{^name}` … `{/name}`: inverted section: renders once only when falsy
//!
//! Section tags must be the only text of their paragraph. The tag paragraphs
//! themselves are dropped and the paragraphs between them are repeated, so
//! paragraph and run formatting come straight from the template. Inline tags must
//! sit inside a single `<w:t>` run. Newlines in values become `<w:br/>` breaks.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::document::entities::encode_xml;
use crate::document::text_units::{extract_text_units, ExtractedDocument, Part};

const PARAGRAPH_CLOSE: &str = "</w:p>";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template section {{#{0}}} is never closed")]
    UnclosedSection(String),

    #[error("template closing tag {{/{found}}} does not match {expected}")]
    UnexpectedClose { expected: String, found: String },

    #[error("template section tag {{{0}}} must be alone in its paragraph")]
    InlineSection(String),
}

/// Parsed template body.
#[derive(Debug)]
enum Node {
    Literal(String),
    Paragraph(ExtractedDocument),
    Section {
        name: String,
        inverted: bool,
        children: Vec<Node>,
    },
}

enum Control {
    Open { name: String, inverted: bool },
    Close { name: String },
}

fn paragraph_open_regex() -> &'static Regex {
    static PARAGRAPH_OPEN: OnceLock<Regex> = OnceLock::new();
    PARAGRAPH_OPEN.get_or_init(|| {
        Regex::new(r"<w:p(?:\s[^>]*[^/>])?\s*>").expect("paragraph pattern is valid")
    })
}

fn control_tag_regex() -> &'static Regex {
    static CONTROL_TAG: OnceLock<Regex> = OnceLock::new();
    CONTROL_TAG.get_or_init(|| {
        Regex::new(r"^\{([#^/])([A-Za-z_][\w.]*)\}$").expect("control tag pattern is valid")
    })
}

fn inline_tag_regex() -> &'static Regex {
    static INLINE_TAG: OnceLock<Regex> = OnceLock::new();
    INLINE_TAG.get_or_init(|| {
        Regex::new(r"\{([#^/]?)(\.|[A-Za-z_]\w*(?:\.[A-Za-z_]\w*)*)\}")
            .expect("inline tag pattern is valid")
    })
}

/// Renders `template_xml` against `data`.
pub fn render(template_xml: &str, data: &Value) -> Result<String, TemplateError> {
    let nodes = parse(template_xml)?;
    let mut out = String::with_capacity(template_xml.len() * 2);
    let mut scopes = vec![data];
    render_nodes(&nodes, &mut scopes, &mut out)?;
    Ok(out)
}

// ────────────────────────────────────────────────────────────────────────────
// Parsing
// ────────────────────────────────────────────────────────────────────────────

fn parse(xml: &str) -> Result<Vec<Node>, TemplateError> {
    // Stack of open sections: (name, inverted, children collected so far).
    let mut stack: Vec<(String, bool, Vec<Node>)> = Vec::new();
    let mut root: Vec<Node> = Vec::new();

    for segment in split_paragraphs(xml) {
        let node = match segment {
            Segment::Literal(text) => Node::Literal(text.to_string()),
            Segment::Paragraph(text) => {
                let doc = extract_text_units(text);
                match control_of(&doc) {
                    Some(Control::Open { name, inverted }) => {
                        stack.push((name, inverted, Vec::new()));
                        continue;
                    }
                    Some(Control::Close { name }) => {
                        let Some((open_name, inverted, children)) = stack.pop() else {
                            return Err(TemplateError::UnexpectedClose {
                                expected: "no open section".to_string(),
                                found: name,
                            });
                        };
                        if open_name != name {
                            return Err(TemplateError::UnexpectedClose {
                                expected: format!("{{#{open_name}}}"),
                                found: name,
                            });
                        }
                        Node::Section {
                            name,
                            inverted,
                            children,
                        }
                    }
                    None => Node::Paragraph(doc),
                }
            }
        };

        match stack.last_mut() {
            Some((_, _, children)) => children.push(node),
            None => root.push(node),
        }
    }

    if let Some((name, _, _)) = stack.pop() {
        return Err(TemplateError::UnclosedSection(name));
    }

    Ok(root)
}

enum Segment<'a> {
    Literal(&'a str),
    Paragraph(&'a str),
}

fn split_paragraphs(xml: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut pos = 0;

    while let Some(open) = paragraph_open_regex().find_at(xml, pos) {
        let Some(close_rel) = xml[open.end()..].find(PARAGRAPH_CLOSE) else {
            break;
        };
        let end = open.end() + close_rel + PARAGRAPH_CLOSE.len();

        if open.start() > pos {
            segments.push(Segment::Literal(&xml[pos..open.start()]));
        }
        segments.push(Segment::Paragraph(&xml[open.start()..end]));
        pos = end;
    }

    if pos < xml.len() {
        segments.push(Segment::Literal(&xml[pos..]));
    }
    segments
}

/// A paragraph whose whole text is one section tag controls a loop.
fn control_of(doc: &ExtractedDocument) -> Option<Control> {
    let text: String = doc.units.iter().map(|u| u.text.as_str()).collect();
    let caps = control_tag_regex().captures(text.trim())?;
    let name = caps[2].to_string();
    match &caps[1] {
        "#" => Some(Control::Open {
            name,
            inverted: false,
        }),
        "^" => Some(Control::Open {
            name,
            inverted: true,
        }),
        _ => Some(Control::Close { name }),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Rendering
// ────────────────────────────────────────────────────────────────────────────

fn render_nodes<'a>(
    nodes: &[Node],
    scopes: &mut Vec<&'a Value>,
    out: &mut String,
) -> Result<(), TemplateError> {
    for node in nodes {
        match node {
            Node::Literal(text) => out.push_str(text),
            Node::Paragraph(doc) => render_paragraph(doc, scopes, out)?,
            Node::Section {
                name,
                inverted,
                children,
            } => {
                let value = lookup(scopes, name);
                if *inverted {
                    if !is_truthy(value) {
                        render_nodes(children, scopes, out)?;
                    }
                    continue;
                }
                match value {
                    Value::Array(items) => {
                        for item in items {
                            scopes.push(item);
                            let result = render_nodes(children, scopes, out);
                            scopes.pop();
                            result?;
                        }
                    }
                    v if is_truthy(v) => {
                        scopes.push(v);
                        let result = render_nodes(children, scopes, out);
                        scopes.pop();
                        result?;
                    }
                    _ => {}
                }
            }
        }
    }
    Ok(())
}

fn render_paragraph(
    doc: &ExtractedDocument,
    scopes: &[&Value],
    out: &mut String,
) -> Result<(), TemplateError> {
    for part in &doc.parts {
        match part {
            Part::Literal(fragment) => out.push_str(fragment),
            Part::Unit(id) => {
                let unit = &doc.units[*id];
                if !unit.text.contains('{') {
                    out.push_str(&unit.open_markup);
                    out.push_str(&unit.raw_text);
                    out.push_str(&unit.close_markup);
                    continue;
                }

                let rendered = substitute_inline(&unit.text, scopes)?;
                for (index, line) in rendered.split('\n').enumerate() {
                    if index > 0 {
                        out.push_str("<w:br/>");
                    }
                    out.push_str(&open_tag_for(&unit.open_markup, line));
                    out.push_str(&encode_xml(line));
                    out.push_str(&unit.close_markup);
                }
            }
        }
    }
    Ok(())
}

/// Word trims edge whitespace unless the run asks to preserve it.
fn open_tag_for(open_markup: &str, line: &str) -> String {
    let has_edge_space = line.starts_with(char::is_whitespace) || line.ends_with(char::is_whitespace);
    if has_edge_space && open_markup == "<w:t>" {
        r#"<w:t xml:space="preserve">"#.to_string()
    } else {
        open_markup.to_string()
    }
}

fn substitute_inline(text: &str, scopes: &[&Value]) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for caps in inline_tag_regex().captures_iter(text) {
        let whole = caps.get(0).expect("capture 0 always present");
        let sigil = &caps[1];
        let path = &caps[2];
        if !sigil.is_empty() {
            return Err(TemplateError::InlineSection(format!("{sigil}{path}")));
        }

        out.push_str(&text[last..whole.start()]);
        out.push_str(&scalar_text(lookup(scopes, path), path));
        last = whole.end();
    }

    out.push_str(&text[last..]);
    Ok(out)
}

static NULL: Value = Value::Null;

/// Resolves `path` against the scope stack, innermost first. The first scope
/// that has the leading key wins; missing values resolve to `null`.
fn lookup<'a>(scopes: &[&'a Value], path: &str) -> &'a Value {
    if path == "." {
        return scopes.last().copied().unwrap_or(&NULL);
    }

    let mut segments = path.split('.');
    let Some(head) = segments.next() else {
        return &NULL;
    };

    for scope in scopes.iter().rev() {
        if let Some(mut value) = scope.get(head) {
            for segment in segments.by_ref() {
                value = match value.get(segment) {
                    Some(v) => v,
                    None => return &NULL,
                };
            }
            return value;
        }
    }
    &NULL
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

fn scalar_text(value: &Value, path: &str) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => {
            warn!("Template tag {{{path}}} resolved to a non-scalar value; rendering empty");
            String::new()
        }
    }
}
