//! `.docx` container access: read one named part, or rebuild the archive with one
//! part replaced while every other entry is raw-copied (same compressed bytes,
//! same timestamps, same order).

use std::io::{Cursor, Read, Write};

use bytes::Bytes;
use thiserror::Error;
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

/// The main document body inside a WordprocessingML package.
pub const DOCUMENT_PART: &str = "word/document.xml";

/// Media type for stored `.docx` blobs.
pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("invalid document container: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("container I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not find {0} in docx file")]
    MissingPart(String),

    #[error("{0} is not valid UTF-8")]
    NotUtf8(String),
}

/// Reads a named part as UTF-8 text.
pub fn read_part(container: &[u8], name: &str) -> Result<String, ContainerError> {
    let mut archive = ZipArchive::new(Cursor::new(container))?;
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => {
            return Err(ContainerError::MissingPart(name.to_string()))
        }
        Err(e) => return Err(e.into()),
    };

    let mut buf = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut buf)?;
    String::from_utf8(buf).map_err(|_| ContainerError::NotUtf8(name.to_string()))
}

/// Returns a copy of `container` in which `name` holds `content`.
///
/// The replaced entry keeps its original compression method and modification
/// time. Every other entry is copied without recompression. Fails with
/// `MissingPart` if `name` does not exist, so a template cannot silently grow
/// a stray part.
pub fn replace_part(container: &[u8], name: &str, content: &[u8]) -> Result<Bytes, ContainerError> {
    let mut archive = ZipArchive::new(Cursor::new(container))?;
    if !archive.file_names().any(|n| n == name) {
        return Err(ContainerError::MissingPart(name.to_string()));
    }

    let mut writer = ZipWriter::new(Cursor::new(Vec::with_capacity(container.len())));

    for index in 0..archive.len() {
        let entry_name = archive.by_index_raw(index)?.name().to_string();

        if entry_name == name {
            let (method, modified, mode) = {
                let original = archive.by_index_raw(index)?;
                (original.compression(), original.last_modified(), original.unix_mode())
            };
            let mut options = FileOptions::default()
                .compression_method(method)
                .last_modified_time(modified);
            if let Some(mode) = mode {
                options = options.unix_permissions(mode);
            }
            writer.start_file(entry_name, options)?;
            writer.write_all(content)?;
        } else {
            let raw = archive.by_index_raw(index)?;
            writer.raw_copy_file(raw)?;
        }
    }

    let cursor = writer.finish()?;
    Ok(Bytes::from(cursor.into_inner()))
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    fn sample_docx() -> Vec<u8> {
        build_container(&[
            ("[Content_Types].xml", "<Types/>"),
            ("_rels/.rels", "<Relationships/>"),
            (DOCUMENT_PART, "<w:document><w:t>Hello</w:t></w:document>"),
            ("word/styles.xml", "<w:styles/>"),
            ("word/media/logo.png", "\u{89}PNG fake bytes"),
        ])
    }

    #[test]
    fn test_read_part_returns_document_xml() {
        let xml = read_part(&sample_docx(), DOCUMENT_PART).unwrap();
        assert_eq!(xml, "<w:document><w:t>Hello</w:t></w:document>");
    }

    #[test]
    fn test_read_part_missing() {
        let err = read_part(&sample_docx(), "word/missing.xml").unwrap_err();
        assert!(matches!(err, ContainerError::MissingPart(_)));
        assert_eq!(err.to_string(), "Could not find word/missing.xml in docx file");
    }

    #[test]
    fn test_read_part_rejects_non_zip_input() {
        let err = read_part(b"definitely not a zip", DOCUMENT_PART).unwrap_err();
        assert!(matches!(err, ContainerError::Zip(_)));
    }

    #[test]
    fn test_replace_part_swaps_only_named_part() {
        let original = sample_docx();
        let patched = replace_part(
            &original,
            DOCUMENT_PART,
            b"<w:document><w:t>Bonjour</w:t></w:document>",
        )
        .unwrap();

        assert_eq!(
            read_part(&patched, DOCUMENT_PART).unwrap(),
            "<w:document><w:t>Bonjour</w:t></w:document>"
        );
        assert_eq!(read_part(&patched, "word/styles.xml").unwrap(), "<w:styles/>");
        assert_eq!(
            read_part(&patched, "word/media/logo.png").unwrap(),
            "\u{89}PNG fake bytes"
        );
        assert_eq!(entry_names(&patched), entry_names(&original));
    }

    #[test]
    fn test_replace_part_preserves_compression_methods() {
        let original = sample_docx();
        let patched = replace_part(&original, DOCUMENT_PART, b"<w:document/>").unwrap();

        let mut before = ZipArchive::new(Cursor::new(original.as_slice())).unwrap();
        let mut after = ZipArchive::new(Cursor::new(patched.as_ref())).unwrap();
        for i in 0..before.len() {
            let a = before.by_index_raw(i).unwrap().compression();
            let b = after.by_index_raw(i).unwrap().compression();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_replace_part_refuses_unknown_part() {
        let err = replace_part(&sample_docx(), "word/new.xml", b"x").unwrap_err();
        assert!(matches!(err, ContainerError::MissingPart(_)));
    }
}
