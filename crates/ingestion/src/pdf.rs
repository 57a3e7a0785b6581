//! PDF text extraction module
//!
//! Extracts text page by page using lopdf. A page that cannot be decoded
//! contributes nothing; only an unreadable file fails the document.

use crate::errors::IngestionError;
use lopdf::content::Content;
use lopdf::{Document, Object, ObjectId};
use tracing::{debug, warn};

/// Extract the text of an in-memory PDF
pub fn extract_text_from_bytes(source_id: &str, bytes: &[u8]) -> Result<String, IngestionError> {
    let doc = Document::load_mem(bytes).map_err(|e| IngestionError::PdfParseError {
        source_id: source_id.to_string(),
        message: format!("Failed to load PDF: {}", e),
    })?;
    extract_document(source_id, &doc)
}

fn extract_document(source_id: &str, doc: &Document) -> Result<String, IngestionError> {
    let pages = doc.get_pages();
    debug!(source_id, page_count = pages.len(), "Extracting text from PDF");

    let mut text = String::new();
    for (page_number, page_id) in pages {
        text.push_str(&extract_page_text(doc, page_number, page_id));
    }

    if text.trim().is_empty() {
        return Err(IngestionError::NoText(source_id.to_string()));
    }

    debug!(source_id, chars = text.chars().count(), "Text extraction complete");
    Ok(text)
}

/// Text of one page, empty when nothing can be decoded
fn extract_page_text(doc: &Document, page_number: u32, page_id: ObjectId) -> String {
    match doc.extract_text(&[page_number]) {
        Ok(text) if !text.trim().is_empty() => return text,
        Ok(_) => {}
        Err(e) => debug!(page = page_number, error = %e, "Font-aware extraction failed"),
    }

    match scan_content_stream(doc, page_id) {
        Ok(text) => text,
        Err(e) => {
            warn!(page = page_number, error = %e, "Failed to extract text from page, skipping");
            String::new()
        }
    }
}

/// Collect string operands of text-showing operators without font decoding
fn scan_content_stream(doc: &Document, page_id: ObjectId) -> Result<String, lopdf::Error> {
    let raw = doc.get_page_content(page_id)?;
    let content = Content::decode(&raw)?;

    let mut text = String::new();
    for op in &content.operations {
        match op.operator.as_str() {
            "Tj" | "'" | "\"" => {
                if let Some(operand) = op.operands.last() {
                    push_string(&mut text, operand);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = op.operands.first() {
                    for item in items {
                        push_string(&mut text, item);
                    }
                }
            }
            "T*" | "Td" | "TD" => text.push(' '),
            "ET" => text.push('\n'),
            _ => {}
        }
    }
    Ok(text)
}

fn push_string(out: &mut String, object: &Object) {
    if let Object::String(bytes, _) = object {
        out.push_str(&String::from_utf8_lossy(bytes));
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::content::Operation;
    use lopdf::{dictionary, Stream};

    /// Minimal PDF with one page per entry; an empty entry is a blank page
    pub(crate) fn sample_pdf(pages: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for page_text in pages {
            let operations = if page_text.is_empty() {
                Vec::new()
            } else {
                vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*page_text)]),
                    Operation::new("ET", vec![]),
                ]
            };
            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_extracts_pages_in_order() {
        let bytes = sample_pdf(&["The capital of France is Paris.", "Berlin is in Germany."]);
        let text = extract_text_from_bytes("geo.pdf", &bytes).unwrap();

        let paris = text.find("The capital of France is Paris.").unwrap();
        let berlin = text.find("Berlin is in Germany.").unwrap();
        assert!(paris < berlin);
    }

    #[test]
    fn test_blank_page_does_not_fail_document() {
        let bytes = sample_pdf(&["", "Only the second page has text."]);
        let text = extract_text_from_bytes("mixed.pdf", &bytes).unwrap();
        assert!(text.contains("Only the second page has text."));
    }

    #[test]
    fn test_document_without_text() {
        let bytes = sample_pdf(&["", ""]);
        let err = extract_text_from_bytes("blank.pdf", &bytes).unwrap_err();
        assert!(matches!(err, IngestionError::NoText(ref id) if id == "blank.pdf"));
    }

    #[test]
    fn test_not_a_pdf() {
        let err = extract_text_from_bytes("notes.txt", b"just some text").unwrap_err();
        assert!(matches!(err, IngestionError::PdfParseError { .. }));
    }

    #[test]
    fn test_scan_handles_text_arrays() {
        let mut doc = Document::with_version("1.5");
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new(
                    "TJ",
                    vec![Object::Array(vec![
                        Object::string_literal("Hel"),
                        (-120).into(),
                        Object::string_literal("lo"),
                    ])],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! { "Type" => "Page", "Contents" => content_id });

        assert_eq!(scan_content_stream(&doc, page_id).unwrap(), "Hello\n");
    }
}
