//! PDF adapter for toolport.
//!
//! Reads text and AcroForm values from existing documents and writes new
//! ones: plain text laid out on fixed US-Letter pages, or a template with
//! its form fields filled and extra text pages appended.

mod config;
mod forms;
mod input;
mod layout;
mod reader;
mod tools;

use std::fmt::Display;

use lopdf::{Dictionary, Document, Object, ObjectId};
use toolport_core::{Error, Result};

pub use config::{PdfConfig, PDF_OUTPUT_DIR};
pub use forms::{fill_fields, read_fields, FillReport, FormField};
pub use input::PdfSource;
pub use layout::{append_text, lines_per_page, paginate, render_text};
pub use reader::{read_contents, PageText, PdfContents};
pub use tools::register_tools;

pub(crate) fn pdf_error(e: impl Display) -> Error {
    Error::InvalidData(format!("malformed PDF: {}", e))
}

/// Parse a document from memory.
pub fn load_document(bytes: &[u8]) -> Result<Document> {
    Document::load_mem(bytes).map_err(pdf_error)
}

/// Serialize a document to bytes.
pub fn save_document(doc: &mut Document) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).map_err(pdf_error)?;
    Ok(bytes)
}

pub(crate) fn catalog_id(doc: &Document) -> Result<ObjectId> {
    match doc.trailer.get(b"Root") {
        Ok(Object::Reference(id)) => Ok(*id),
        _ => Err(Error::InvalidData("document has no catalog".to_string())),
    }
}

pub(crate) fn dict_mut(doc: &mut Document, id: ObjectId) -> Result<&mut Dictionary> {
    match doc.get_object_mut(id).map_err(pdf_error)? {
        Object::Dictionary(dict) => Ok(dict),
        _ => Err(Error::InvalidData(format!(
            "object {} {} is not a dictionary",
            id.0, id.1
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_rejects_garbage() {
        let err = load_document(b"%PDF-1.5 truncated").unwrap_err();
        assert!(err.to_string().starts_with("Invalid data: malformed PDF"));
    }
}
