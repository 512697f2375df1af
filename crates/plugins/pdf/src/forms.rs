//! AcroForm fields: reading values and filling them in.
//!
//! Field names are fully qualified: partial names of nested fields are
//! joined with `.` (`applicant.email`).

use std::collections::BTreeSet;

use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};
use serde::Serialize;
use serde_json::{Map, Value};
use toolport_core::{Error, Result};
use tracing::{debug, warn};

use crate::{catalog_id, dict_mut};

/// Field trees deeper than this are assumed to be cyclic.
const MAX_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormField {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
    pub value: Option<String>,
}

/// Outcome of filling a form.
#[derive(Debug, Default, Serialize)]
pub struct FillReport {
    pub filled: Vec<String>,
    pub unknown: Vec<String>,
}

struct FieldNode {
    field: FormField,
    id: Option<ObjectId>,
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn as_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<(Option<ObjectId>, &'a Dictionary)> {
    let id = match obj {
        Object::Reference(id) => Some(*id),
        _ => None,
    };
    match resolve(doc, obj)? {
        Object::Dictionary(dict) => Some((id, dict)),
        _ => None,
    }
}

fn as_array<'a>(doc: &'a Document, obj: &'a Object) -> &'a [Object] {
    match resolve(doc, obj) {
        Some(Object::Array(items)) => items,
        _ => &[],
    }
}

/// Decode a PDF text string: UTF-16BE with a byte order mark, otherwise
/// single-byte.
fn decode_text(bytes: &[u8]) -> String {
    match bytes.strip_prefix(&[0xFE, 0xFF]) {
        Some(utf16) => {
            let units: Vec<u16> = utf16
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        None => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

fn encode_text(text: &str) -> Vec<u8> {
    if text.chars().all(|c| u32::from(c) <= 0xFF) {
        return text.chars().map(|c| u32::from(c) as u8).collect();
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    bytes
}

fn text_of(doc: &Document, obj: &Object) -> Option<String> {
    match resolve(doc, obj)? {
        Object::String(bytes, _) => Some(decode_text(bytes)),
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        _ => None,
    }
}

fn field_type(dict: &Dictionary) -> Option<String> {
    match dict.get(b"FT") {
        Ok(Object::Name(name)) => Some(String::from_utf8_lossy(name).into_owned()),
        _ => None,
    }
}

fn walk(
    doc: &Document,
    obj: &Object,
    prefix: Option<&str>,
    inherited_type: Option<&str>,
    depth: usize,
    out: &mut Vec<FieldNode>,
) {
    if depth > MAX_DEPTH {
        warn!("Form field tree too deep, ignoring the rest");
        return;
    }
    let Some((id, dict)) = as_dict(doc, obj) else {
        return;
    };

    let partial = dict.get(b"T").ok().and_then(|t| text_of(doc, t));
    let name = match (prefix, partial) {
        (Some(prefix), Some(partial)) => format!("{}.{}", prefix, partial),
        (None, Some(partial)) => partial,
        (Some(prefix), None) => prefix.to_string(),
        (None, None) => return,
    };
    let ty = field_type(dict).or_else(|| inherited_type.map(String::from));

    // Kids without a partial name are widgets of this field, not subfields
    let subfields: Vec<&Object> = dict
        .get(b"Kids")
        .map(|kids| as_array(doc, kids))
        .unwrap_or(&[])
        .iter()
        .filter(|kid| as_dict(doc, kid).is_some_and(|(_, d)| d.has(b"T")))
        .collect();

    if subfields.is_empty() {
        out.push(FieldNode {
            field: FormField {
                name,
                field_type: ty,
                value: dict.get(b"V").ok().and_then(|v| text_of(doc, v)),
            },
            id,
        });
    } else {
        for kid in subfields {
            walk(doc, kid, Some(&name), ty.as_deref(), depth + 1, out);
        }
    }
}

fn acro_form(doc: &Document) -> Option<&Dictionary> {
    let catalog = doc.get_object(catalog_id(doc).ok()?).ok()?;
    let Object::Dictionary(catalog) = catalog else {
        return None;
    };
    as_dict(doc, catalog.get(b"AcroForm").ok()?).map(|(_, dict)| dict)
}

fn collect(doc: &Document) -> Vec<FieldNode> {
    let mut nodes = Vec::new();
    if let Some(form) = acro_form(doc) {
        if let Ok(fields) = form.get(b"Fields") {
            for field in as_array(doc, fields) {
                walk(doc, field, None, None, 0, &mut nodes);
            }
        }
    }
    nodes
}

/// Every terminal form field with its current value.
pub fn read_fields(doc: &Document) -> Vec<FormField> {
    collect(doc).into_iter().map(|node| node.field).collect()
}

fn value_text(value: &Value, is_button: bool) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(true) if is_button => "Yes".to_string(),
        Value::Bool(false) if is_button => "Off".to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Set field values by fully qualified name.
///
/// Names with no matching field are reported, not treated as errors.
pub fn fill_fields(doc: &mut Document, values: &Map<String, Value>) -> Result<FillReport> {
    let mut report = FillReport::default();
    if values.is_empty() {
        return Ok(report);
    }

    let nodes = collect(doc);
    for (name, value) in values {
        let target = nodes
            .iter()
            .find(|node| &node.field.name == name)
            .and_then(|node| node.id.map(|id| (id, node.field.field_type.as_deref() == Some("Btn"))));
        let Some((id, is_button)) = target else {
            report.unknown.push(name.clone());
            continue;
        };

        let text = value_text(value, is_button);
        let object = if is_button {
            Object::Name(text.into_bytes())
        } else {
            Object::String(encode_text(&text), StringFormat::Literal)
        };
        dict_mut(doc, id)?.set("V", object);
        debug!(field = %name, "Filled form field");
        report.filled.push(name.clone());
    }

    if !report.filled.is_empty() {
        request_appearance_update(doc)?;
    }
    if !report.unknown.is_empty() {
        let known: BTreeSet<&str> = nodes.iter().map(|n| n.field.name.as_str()).collect();
        warn!(unknown = ?report.unknown, known = ?known, "Unknown form fields");
    }
    Ok(report)
}

/// Ask viewers to regenerate field appearances from the new values.
fn request_appearance_update(doc: &mut Document) -> Result<()> {
    let root = catalog_id(doc)?;
    let form = dict_mut(doc, root)?
        .get(b"AcroForm")
        .map_err(|_| Error::InvalidData("document has no AcroForm".to_string()))?
        .clone();

    match form {
        Object::Reference(id) => dict_mut(doc, id)?.set("NeedAppearances", true),
        Object::Dictionary(_) => {
            if let Ok(Object::Dictionary(form)) = dict_mut(doc, root)?.get_mut(b"AcroForm") {
                form.set("NeedAppearances", true);
            }
        }
        _ => return Err(Error::InvalidData("malformed AcroForm".to_string())),
    }
    Ok(())
}

/// A one-page document with a small form, for tests.
#[cfg(test)]
pub(crate) fn sample_form() -> Document {
    use lopdf::dictionary;

    let mut doc = crate::layout::render_text("Application form").unwrap();
    let name_id = doc.add_object(dictionary! {
        "FT" => "Tx",
        "T" => Object::string_literal("name"),
        "V" => Object::string_literal(""),
    });
    let email_id = doc.add_object(dictionary! {
        "FT" => "Tx",
        "T" => Object::string_literal("email"),
    });
    let applicant_id = doc.add_object(dictionary! {
        "T" => Object::string_literal("applicant"),
        "Kids" => vec![Object::Reference(email_id)],
    });
    let agree_id = doc.add_object(dictionary! {
        "FT" => "Btn",
        "T" => Object::string_literal("agree"),
        "V" => "Off",
    });
    let form_id = doc.add_object(dictionary! {
        "Fields" => vec![
            Object::Reference(name_id),
            Object::Reference(applicant_id),
            Object::Reference(agree_id),
        ],
    });
    let root = catalog_id(&doc).unwrap();
    dict_mut(&mut doc, root).unwrap().set("AcroForm", form_id);
    doc
}
