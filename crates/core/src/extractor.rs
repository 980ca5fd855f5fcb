use crate::cancel::CancellationFlag;
use crate::error::{IngestError, IngestStage};
use crate::models::ExtractedText;
use lopdf::Document;
use std::io::Read;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

const SUPPORTED_EXTENSIONS: [&str; 1] = ["pdf"];

/// Turns a document byte stream into plain text.
pub trait TextExtractor: Send + Sync {
    fn extract(
        &self,
        document: &mut dyn Read,
        cancel: &CancellationFlag,
    ) -> Result<ExtractedText, IngestError>;
}

/// Whether `file_name` has an extension an extractor exists for.
pub fn is_supported_document(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
}

#[derive(Debug, Default)]
pub struct PdfTextExtractor;

impl TextExtractor for PdfTextExtractor {
    fn extract(
        &self,
        document: &mut dyn Read,
        cancel: &CancellationFlag,
    ) -> Result<ExtractedText, IngestError> {
        let mut bytes = Vec::new();
        document
            .read_to_end(&mut bytes)
            .map_err(|error| IngestError::Extraction(format!("failed to read document: {error}")))?;

        let pdf = Document::load_mem(&bytes)
            .map_err(|error| IngestError::Extraction(format!("malformed pdf: {error}")))?;
        drop(bytes);

        let pages = pdf.get_pages();
        if pages.is_empty() {
            return Err(IngestError::Extraction(
                "pdf contains no pages".to_string(),
            ));
        }

        let page_count = pages.len();
        info!(pages = page_count, "extracting text");
        let started = Instant::now();

        let mut text = String::new();
        for (position, page_no) in pages.keys().enumerate() {
            if cancel.is_cancelled() {
                warn!(page = page_no, "extraction cancelled");
                return Err(IngestError::Cancelled(IngestStage::Extraction));
            }

            match pdf.extract_text(&[*page_no]) {
                Ok(page_text) => {
                    if page_text.is_empty() {
                        debug!(page = page_no, "page has no text");
                    }
                    text.push_str(&page_text);
                }
                Err(error) => {
                    warn!(page = page_no, %error, "page text unreadable, continuing");
                }
            }

            debug!(page = page_no, "extracted page {}/{}", position + 1, page_count);
        }

        info!(
            pages = page_count,
            bytes = text.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "text extraction completed"
        );

        Ok(ExtractedText::new(text, page_count))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{is_supported_document, PdfTextExtractor, TextExtractor};
    use crate::cancel::CancellationFlag;
    use crate::error::{IngestError, IngestStage};
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};
    use std::io::Cursor;

    /// Builds a PDF with one page per entry; `None` produces a page without content.
    pub(crate) fn pdf_with_pages(pages: &[Option<&str>]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });

        let mut kids: Vec<Object> = Vec::new();
        for page in pages {
            let mut page_dict = dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
            };
            if let Some(text) = page {
                let content = Content {
                    operations: vec![
                        Operation::new("BT", vec![]),
                        Operation::new("Tf", vec!["F1".into(), 24.into()]),
                        Operation::new("Td", vec![72.into(), 700.into()]),
                        Operation::new("Tj", vec![Object::string_literal(*text)]),
                        Operation::new("ET", vec![]),
                    ],
                };
                let encoded = content.encode().expect("content encodes");
                let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
                page_dict.set("Contents", content_id);
            }
            kids.push(doc.add_object(page_dict).into());
        }

        let count = kids.len() as i64;
        let pages_dict = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages_dict));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).expect("pdf serializes");
        buffer
    }

    #[test]
    fn pages_are_concatenated_in_order() {
        let pdf = pdf_with_pages(&[Some("Alpha"), Some("Bravo"), Some("Charlie")]);
        let extracted = PdfTextExtractor
            .extract(&mut Cursor::new(pdf), &CancellationFlag::new())
            .expect("pdf should extract");

        let text = extracted.as_str();
        let alpha = text.find("Alpha").expect("page 1 text");
        let bravo = text.find("Bravo").expect("page 2 text");
        let charlie = text.find("Charlie").expect("page 3 text");
        assert!(alpha < bravo && bravo < charlie);
        assert_eq!(extracted.page_count(), 3);
    }

    #[test]
    fn page_without_text_does_not_abort_extraction() {
        let pdf = pdf_with_pages(&[Some("Before"), None, Some("After")]);
        let extracted = PdfTextExtractor
            .extract(&mut Cursor::new(pdf), &CancellationFlag::new())
            .expect("blank page is tolerated");

        assert!(extracted.as_str().contains("Before"));
        assert!(extracted.as_str().contains("After"));
        assert_eq!(extracted.page_count(), 3);
    }

    #[test]
    fn zero_page_document_is_an_extraction_error() {
        let pdf = pdf_with_pages(&[]);
        let result = PdfTextExtractor.extract(&mut Cursor::new(pdf), &CancellationFlag::new());
        assert!(matches!(result, Err(IngestError::Extraction(_))));
    }

    #[test]
    fn malformed_bytes_are_an_extraction_error() {
        let mut broken = Cursor::new(b"%PDF-1.4\n%broken".to_vec());
        let result = PdfTextExtractor.extract(&mut broken, &CancellationFlag::new());
        assert!(matches!(result, Err(IngestError::Extraction(_))));
    }

    #[test]
    fn cancelled_flag_stops_before_reading_pages() {
        let pdf = pdf_with_pages(&[Some("Never read")]);
        let cancel = CancellationFlag::new();
        cancel.cancel();

        let result = PdfTextExtractor.extract(&mut Cursor::new(pdf), &cancel);
        assert!(matches!(
            result,
            Err(IngestError::Cancelled(IngestStage::Extraction))
        ));
    }

    #[test]
    fn only_pdf_extensions_are_supported() {
        assert!(is_supported_document("manual.pdf"));
        assert!(is_supported_document("MANUAL.PDF"));
        assert!(!is_supported_document("notes.txt"));
        assert!(!is_supported_document("pdf"));
    }
}
