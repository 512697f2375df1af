//! PDF tool handlers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use toolport_core::{Error, Result, ResultExt};
use toolport_mcp::{ParamSchema, ParamType, ToolOutput, ToolRegistry};
use tracing::info;

use crate::config::PdfConfig;
use crate::forms::fill_fields;
use crate::input::{encode, PdfSource};
use crate::layout::{append_text, render_text};
use crate::reader::read_contents;
use crate::{load_document, save_document};

#[derive(Debug, Deserialize)]
struct ReadPdfParams {
    input: String,
}

#[derive(Debug, Deserialize)]
struct WritePdfParams {
    text: Option<String>,
    #[serde(default)]
    form_fields: Map<String, Value>,
    template: Option<String>,
    output_path: Option<String>,
}

/// Register every PDF tool.
pub fn register_tools(registry: &mut ToolRegistry, config: Arc<PdfConfig>) -> Result<()> {
    registry.register_with(
        &config,
        "read_pdf",
        "Extract text per page and form field values from a PDF",
        ParamSchema::new().required(
            "input",
            ParamType::String,
            "File path, data: URL or base64-encoded PDF",
        ),
        read_pdf,
    )?;
    registry.register_with(
        &config,
        "write_pdf",
        "Create a PDF from plain text, or fill a template's form fields and append text pages",
        ParamSchema::new()
            .optional("text", ParamType::String, "Text to lay out, one line per line")
            .optional(
                "form_fields",
                ParamType::Object,
                "Form values by fully qualified field name; requires a template",
            )
            .optional(
                "template",
                ParamType::String,
                "Template PDF as a file path, data: URL or base64",
            )
            .optional(
                "output_path",
                ParamType::String,
                "Where to write the result; returned as base64 when omitted",
            ),
        write_pdf,
    )?;
    Ok(())
}

async fn read_pdf(_config: Arc<PdfConfig>, params: ReadPdfParams) -> Result<ToolOutput> {
    let bytes = PdfSource::detect("input", &params.input)?
        .load()
        .await
        .context("reading PDF")?;
    let doc = load_document(&bytes).context("parsing PDF")?;
    let contents = read_contents(&doc);

    let mut summary = format!("Read {} pages", contents.page_count);
    if !contents.form_fields.is_empty() {
        summary.push_str(&format!(" with {} form fields", contents.form_fields.len()));
    }
    ToolOutput::new(summary, contents)
}

#[derive(Serialize)]
struct WriteResult {
    page_count: usize,
    size_bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    base64: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    filled_fields: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    unknown_fields: Vec<String>,
}

async fn write_pdf(config: Arc<PdfConfig>, params: WritePdfParams) -> Result<ToolOutput> {
    let text = params.text.as_deref();
    let template = params.template.as_deref();
    let form_fields = &params.form_fields;

    let (mut doc, report) = match template {
        Some(template) => {
            let bytes = PdfSource::detect("template", template)?
                .load()
                .await
                .context("reading template")?;
            let mut doc = load_document(&bytes).context("parsing template")?;
            let report = fill_fields(&mut doc, form_fields).context("filling form")?;
            if let Some(text) = text {
                append_text(&mut doc, text).context("appending text")?;
            }
            (doc, report)
        }
        None => {
            if !form_fields.is_empty() {
                return Err(Error::validation(
                    "form_fields",
                    "filling form fields requires a template",
                ));
            }
            let text = text.ok_or_else(|| {
                Error::validation("text", "either text or template is required")
            })?;
            (render_text(text)?, Default::default())
        }
    };

    let page_count = doc.get_pages().len();
    let bytes = save_document(&mut doc).context("serializing PDF")?;
    let mut result = WriteResult {
        page_count,
        size_bytes: bytes.len(),
        path: None,
        base64: None,
        filled_fields: report.filled,
        unknown_fields: report.unknown,
    };

    let mut summary = match params.output_path.as_deref() {
        Some(requested) => {
            let path = config.resolve_output(requested);
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            tokio::fs::write(&path, &bytes)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), pages = page_count, "Wrote PDF");
            let summary = format!("Wrote {}-page PDF to {}", page_count, path.display());
            result.path = Some(path.display().to_string());
            summary
        }
        None => {
            result.base64 = Some(encode(&bytes));
            format!("Created {}-page PDF ({} bytes, base64 encoded)", page_count, bytes.len())
        }
    };

    if !result.filled_fields.is_empty() {
        summary.push_str(&format!("; filled {} form fields", result.filled_fields.len()));
    }
    if !result.unknown_fields.is_empty() {
        summary.push_str(&format!(
            "; unknown fields: {}",
            result.unknown_fields.join(", ")
        ));
    }
    ToolOutput::new(summary, result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::sample_form;
    use serde_json::json;

    fn registry(config: PdfConfig) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        register_tools(&mut registry, Arc::new(config)).unwrap();
        registry
    }

    fn payload(result: &toolport_mcp::ToolCallResult) -> Value {
        serde_json::from_str(result.content[1].text()).unwrap()
    }

    #[tokio::test]
    async fn test_write_to_output_dir_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(PdfConfig {
            output_dir: Some(dir.path().to_path_buf()),
        });
        let text: Vec<String> = (1..=40).map(|i| format!("row {}", i)).collect();
        let text = text.join("\n");

        let written = registry
            .dispatch(
                "write_pdf",
                Some(json!({"text": text, "output_path": "reports/out.pdf"})),
            )
            .await;
        assert!(!written.is_error(), "{:?}", written.first_text());
        let target = dir.path().join("reports/out.pdf");
        assert_eq!(
            written.first_text(),
            Some(format!("Wrote 2-page PDF to {}", target.display()).as_str())
        );

        let read = registry
            .dispatch("read_pdf", Some(json!({"input": target.display().to_string()})))
            .await;
        assert_eq!(read.first_text(), Some("Read 2 pages"));
        let contents = payload(&read);
        assert_eq!(contents["text"], text);
        assert_eq!(contents["pages"][1]["text"], "row 39\nrow 40");
    }

    #[tokio::test]
    async fn test_inline_output_reads_back() {
        let registry = registry(PdfConfig::default());
        let written = registry
            .dispatch("write_pdf", Some(json!({"text": "hello\nworld"})))
            .await;
        let encoded = payload(&written)["base64"].as_str().unwrap().to_string();
        assert!(encoded.starts_with("JVBER"));

        let read = registry
            .dispatch(
                "read_pdf",
                Some(json!({"input": format!("data:application/pdf;base64,{}", encoded)})),
            )
            .await;
        assert_eq!(payload(&read)["text"], "hello\nworld");
    }

    #[tokio::test]
    async fn test_fill_template_and_append() {
        let mut template = sample_form();
        let encoded = encode(&save_document(&mut template).unwrap());
        let registry = registry(PdfConfig::default());

        let written = registry
            .dispatch(
                "write_pdf",
                Some(json!({
                    "template": encoded,
                    "form_fields": {"name": "Ada", "nickname": "A"},
                    "text": "Appendix"
                })),
            )
            .await;
        let result = payload(&written);
        assert_eq!(
            written.first_text().unwrap(),
            format!(
                "Created 2-page PDF ({} bytes, base64 encoded); filled 1 form fields; unknown fields: nickname",
                result["size_bytes"]
            )
        );
        assert_eq!(result["unknown_fields"], json!(["nickname"]));

        let read = registry
            .dispatch("read_pdf", Some(json!({"input": result["base64"].clone()})))
            .await;
        let contents = payload(&read);
        assert_eq!(contents["page_count"], 2);
        assert_eq!(contents["pages"][1]["text"], "Appendix");
        assert_eq!(contents["form_fields"][0], json!({"name": "name", "field_type": "Tx", "value": "Ada"}));
    }

    #[tokio::test]
    async fn test_write_requires_text_or_template() {
        let registry = registry(PdfConfig::default());
        let result = registry.dispatch("write_pdf", Some(json!({}))).await;
        assert!(result.is_error());
        assert_eq!(
            result.first_text(),
            Some("Error: Invalid parameter 'text': either text or template is required")
        );

        let result = registry
            .dispatch("write_pdf", Some(json!({"text": "x", "form_fields": {"a": "b"}})))
            .await;
        assert_eq!(
            result.first_text(),
            Some("Error: Invalid parameter 'form_fields': filling form fields requires a template")
        );
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let result = registry(PdfConfig::default())
            .dispatch("read_pdf", Some(json!({"input": "/nonexistent/report.pdf"})))
            .await;
        assert!(result.is_error());
        assert!(result
            .first_text()
            .unwrap()
            .starts_with("Error reading PDF: Not found: cannot read /nonexistent/report.pdf"));
    }
}
