//! XML character-entity codec for text-node content.
//!
//! Decoding understands decimal (`&#233;`) and hex (`&#xE9;`) numeric references
//! plus the five predefined entities. Anything else that starts with `&` is left
//! untouched, so decoding arbitrary Word output never fails.

use quick_xml::escape::{escape, unescape};

/// Decodes XML character references in `raw` into plain text.
pub fn decode_xml(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];

        match reference_len(tail).and_then(|len| Some((unescape(&tail[..len]).ok()?, len))) {
            Some((decoded, len)) => {
                out.push_str(&decoded);
                rest = &tail[len..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// Encodes plain text for use inside an XML element. `&` is escaped first so
/// existing references are never double-decoded on the way back.
pub fn encode_xml(text: &str) -> String {
    escape(text).into_owned()
}

/// Byte length of the `&…;` reference at the start of `s`, if it is closed
/// before the next `&`.
fn reference_len(s: &str) -> Option<usize> {
    let end = s[1..].find([';', '&'])? + 1;
    (s.as_bytes()[end] == b';').then_some(end + 1)
}
