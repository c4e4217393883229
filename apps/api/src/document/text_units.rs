//! Splits `word/document.xml` into addressable `<w:t>` runs.
//!
//! The document is represented as an ordered list of `parts`: literal markup
//! fragments interleaved with references to text units. Rendering the parts with
//! an empty `EditSet` reproduces the input byte-for-byte, which is what lets us
//! rewrite text without ever touching paragraph/run formatting.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::document::entities::{decode_xml, encode_xml};

const TEXT_CLOSE_TAG: &str = "</w:t>";

/// A single addressable run of user-visible text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextUnit {
    /// Dense, 0-based, document-order id.
    pub id: usize,
    /// Opening tag including attributes, e.g. `<w:t xml:space="preserve">`.
    pub open_markup: String,
    pub close_markup: String,
    /// Inner text exactly as it appears in the markup (entities still encoded).
    pub raw_text: String,
    /// Entity-decoded inner text. This is what the model sees and edits.
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Literal(String),
    Unit(usize),
}

#[derive(Debug, Clone, Default)]
pub struct ExtractedDocument {
    pub units: Vec<TextUnit>,
    pub parts: Vec<Part>,
}

/// A raw edit as returned by the model. `id` is signed so that out-of-range
/// values survive deserialization and can be reported by validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edit {
    pub id: i64,
    pub text: String,
}

/// Sparse id → replacement text mapping, restricted to known unit ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditSet {
    replacements: BTreeMap<usize, String>,
}

impl EditSet {
    /// Builds an edit set from raw model edits. Ids outside `[0, unit_count)`
    /// are dropped; a later edit for the same id replaces an earlier one.
    pub fn from_edits(edits: &[Edit], unit_count: usize) -> Self {
        let mut replacements = BTreeMap::new();
        for edit in edits {
            match usize::try_from(edit.id) {
                Ok(id) if id < unit_count => {
                    replacements.insert(id, edit.text.clone());
                }
                _ => {}
            }
        }
        Self { replacements }
    }

    pub fn get(&self, id: usize) -> Option<&str> {
        self.replacements.get(&id).map(String::as_str)
    }
}

fn text_node_regex() -> &'static Regex {
    static TEXT_NODE: OnceLock<Regex> = OnceLock::new();
    TEXT_NODE.get_or_init(|| {
        // Attributes must follow whitespace, which keeps `<w:tab/>`, `<w:tbl>` and
        // the self-closing `<w:t/>` out. `(?s)` lets text span lines.
        Regex::new(r"(?s)<w:t(?:\s[^>]*[^/>])?\s*>.*?</w:t>").expect("text node pattern is valid")
    })
}

/// Extracts every `<w:t>` node from `xml` in document order.
pub fn extract_text_units(xml: &str) -> ExtractedDocument {
    let mut units = Vec::new();
    let mut parts = Vec::new();
    let mut last_index = 0;

    for m in text_node_regex().find_iter(xml) {
        let full = m.as_str();
        let Some(open_end) = full.find('>') else {
            continue;
        };

        let open_markup = &full[..=open_end];
        let raw_text = &full[open_end + 1..full.len() - TEXT_CLOSE_TAG.len()];

        parts.push(Part::Literal(xml[last_index..m.start()].to_string()));

        let id = units.len();
        units.push(TextUnit {
            id,
            open_markup: open_markup.to_string(),
            close_markup: TEXT_CLOSE_TAG.to_string(),
            raw_text: raw_text.to_string(),
            text: decode_xml(raw_text),
        });
        parts.push(Part::Unit(id));
        last_index = m.end();
    }

    parts.push(Part::Literal(xml[last_index..].to_string()));

    ExtractedDocument { units, parts }
}

/// Reassembles the markup, substituting encoded replacement text for every
/// unit present in `edits`. Literal fragments are emitted verbatim.
pub fn apply_edits(doc: &ExtractedDocument, edits: &EditSet) -> String {
    let mut out = String::new();
    for part in &doc.parts {
        match part {
            Part::Literal(fragment) => out.push_str(fragment),
            Part::Unit(id) => {
                let unit = &doc.units[*id];
                out.push_str(&unit.open_markup);
                match edits.get(*id) {
                    Some(text) => out.push_str(&encode_xml(text)),
                    None => out.push_str(&unit.raw_text),
                }
                out.push_str(&unit.close_markup);
            }
        }
    }
    out
}
