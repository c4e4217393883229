// Document handling: the .docx container, its text units and the resume template.
// Nothing here knows about the LLM; rewrite/ feeds edits and data in.

pub mod container;
pub mod entities;
pub mod template;
pub mod template_cache;
pub mod text_units;

pub use container::{read_part, replace_part, ContainerError, DOCUMENT_PART, DOCX_CONTENT_TYPE};
pub use template_cache::TemplateCache;
pub use text_units::{apply_edits, extract_text_units, Edit, EditSet, ExtractedDocument};
