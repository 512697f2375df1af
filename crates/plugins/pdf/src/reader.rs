//! Text and form extraction.

use lopdf::Document;
use serde::Serialize;
use tracing::warn;

use crate::forms::{read_fields, FormField};

#[derive(Debug, Serialize)]
pub struct PageText {
    pub page: u32,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct PdfContents {
    pub page_count: usize,
    pub pages: Vec<PageText>,
    pub text: String,
    pub form_fields: Vec<FormField>,
}

/// One line per text object, trailing whitespace removed.
fn tidy(raw: &str) -> String {
    raw.lines().map(str::trim_end).collect::<Vec<_>>().join("\n")
}

fn page_text(doc: &Document, page: u32) -> String {
    match doc.extract_text(&[page]) {
        Ok(raw) => tidy(&raw),
        Err(e) => {
            warn!(page, error = %e, "Could not extract page text");
            String::new()
        }
    }
}

/// Extract per-page text and form values.
///
/// Pages whose text cannot be decoded come back empty rather than failing
/// the whole document.
pub fn read_contents(doc: &Document) -> PdfContents {
    let pages: Vec<PageText> = doc
        .get_pages()
        .keys()
        .map(|&page| PageText {
            page,
            text: page_text(doc, page),
        })
        .collect();
    let text = pages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    PdfContents {
        page_count: pages.len(),
        pages,
        text,
        form_fields: read_fields(doc),
    }
}
