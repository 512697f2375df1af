//! Fixed text layout for generated pages.
//!
//! US-Letter pages, Courier 12 pt on an 18 pt line pitch inside 50 pt
//! margins. Lines are assigned to pages by counting; long lines are not
//! wrapped and run past the right margin.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, StringFormat, Stream};
use toolport_core::{Error, Result};

use crate::{catalog_id, dict_mut, pdf_error};

pub const PAGE_WIDTH: i64 = 612;
pub const PAGE_HEIGHT: i64 = 792;
pub const MARGIN: i64 = 50;
pub const FONT_SIZE: i64 = 12;
pub const LINE_HEIGHT: i64 = FONT_SIZE * 3 / 2;
pub const FONT_NAME: &str = "F1";

/// How many lines fit between the top and bottom margins.
pub const fn lines_per_page() -> usize {
    ((PAGE_HEIGHT - 2 * MARGIN) / LINE_HEIGHT) as usize
}

/// Split text into pages of lines. Empty text still yields one blank page.
pub fn paginate(text: &str) -> Vec<Vec<&str>> {
    let lines: Vec<&str> = text.lines().collect();
    if lines.is_empty() {
        return vec![Vec::new()];
    }
    lines
        .chunks(lines_per_page())
        .map(|chunk| chunk.to_vec())
        .collect()
}

/// Encode a line for a WinAnsi font. Characters outside Latin-1 become `?`.
fn encode_line(line: &str) -> Vec<u8> {
    // A lone space keeps blank lines visible to text extraction
    if line.is_empty() {
        return vec![b' '];
    }
    line.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

/// Content stream for one page; every line is its own text object.
fn page_content(lines: &[&str]) -> Content {
    let mut operations = Vec::with_capacity(lines.len() * 5);
    let top = PAGE_HEIGHT - MARGIN - FONT_SIZE;
    for (index, line) in lines.iter().enumerate() {
        let y = top - index as i64 * LINE_HEIGHT;
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new(
            "Tf",
            vec![Object::Name(FONT_NAME.as_bytes().to_vec()), Object::Integer(FONT_SIZE)],
        ));
        operations.push(Operation::new(
            "Td",
            vec![Object::Integer(MARGIN), Object::Integer(y)],
        ));
        operations.push(Operation::new(
            "Tj",
            vec![Object::String(encode_line(line), StringFormat::Literal)],
        ));
        operations.push(Operation::new("ET", vec![]));
    }
    Content { operations }
}

/// Add pages holding `text` under the page tree node `parent`.
///
/// Returns the new page ids in order; linking them into the parent's
/// `Kids` is left to the caller.
pub fn add_text_pages(doc: &mut Document, parent: ObjectId, text: &str) -> Result<Vec<ObjectId>> {
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { FONT_NAME => font_id },
    });

    let mut page_ids = Vec::new();
    for lines in paginate(text) {
        let content = page_content(&lines).encode().map_err(pdf_error)?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => parent,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(PAGE_WIDTH),
                Object::Integer(PAGE_HEIGHT),
            ],
        });
        page_ids.push(page_id);
    }
    Ok(page_ids)
}

/// Lay out `text` as a new document.
pub fn render_text(text: &str) -> Result<Document> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let page_ids = add_text_pages(&mut doc, pages_id, text)?;

    let count = page_ids.len() as i64;
    let kids: Vec<Object> = page_ids.into_iter().map(Object::Reference).collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog);
    Ok(doc)
}

/// Append `text` as extra pages at the end of an existing document.
pub fn append_text(doc: &mut Document, text: &str) -> Result<usize> {
    let root = catalog_id(doc)?;
    let pages_id = match dict_mut(doc, root)?.get(b"Pages") {
        Ok(Object::Reference(id)) => *id,
        _ => {
            return Err(Error::InvalidData(
                "catalog has no page tree reference".to_string(),
            ))
        }
    };

    let page_ids = add_text_pages(doc, pages_id, text)?;
    let added = page_ids.len();

    let pages = dict_mut(doc, pages_id)?;
    let count = match pages.get(b"Count") {
        Ok(Object::Integer(count)) => *count,
        _ => 0,
    };
    match pages.get_mut(b"Kids") {
        Ok(Object::Array(kids)) => kids.extend(page_ids.into_iter().map(Object::Reference)),
        _ => {
            return Err(Error::InvalidData(
                "page tree root has no inline Kids array".to_string(),
            ))
        }
    }
    pages.set("Count", count + added as i64);
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_per_page() {
        assert_eq!(LINE_HEIGHT, 18);
        assert_eq!(lines_per_page(), 38);
    }

    #[test]
    fn test_paginate_by_count() {
        let text: Vec<String> = (1..=80).map(|i| format!("line {}", i)).collect();
        let text = text.join("\n");
        let pages = paginate(&text);
        let sizes: Vec<usize> = pages.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![38, 38, 4]);
        assert_eq!(pages[1][0], "line 39");
        assert_eq!(pages[2][3], "line 80");

        assert_eq!(paginate(""), vec![Vec::<&str>::new()]);
    }

    #[test]
    fn test_line_positions() {
        let content = page_content(&["first", "second"]);
        let moves: Vec<Vec<i64>> = content
            .operations
            .iter()
            .filter(|op| op.operator == "Td")
            .map(|op| {
                op.operands
                    .iter()
                    .filter_map(|o| match o {
                        Object::Integer(i) => Some(*i),
                        _ => None,
                    })
                    .collect()
            })
            .collect();
        assert_eq!(moves, vec![vec![50, 730], vec![50, 712]]);
    }

    #[test]
    fn test_encode_line() {
        assert_eq!(encode_line("café"), b"caf\xe9".to_vec());
        assert_eq!(encode_line("→"), b"?".to_vec());
        assert_eq!(encode_line(""), b" ".to_vec());
    }

    #[test]
    fn test_render_page_count() {
        let text = vec!["x"; 39].join("\n");
        let doc = render_text(&text).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[test]
    fn test_append_pages() {
        let mut doc = render_text("cover").unwrap();
        let added = append_text(&mut doc, &vec!["y"; 40].join("\n")).unwrap();
        assert_eq!(added, 2);
        assert_eq!(doc.get_pages().len(), 3);
    }
}
