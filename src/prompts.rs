//! Prompts sent alongside a consolidated PDF to the OCR service.
//!
//! The merged document is one artefact built from many uploads, so the prompt
//! tells the reader model that page boundaries may also be document
//! boundaries. Callers can override it per batch via
//! [`crate::handoff::BatchRequest::prompt`]; the constant here is used only
//! when no override is provided.

/// Default instruction for extracting text from a consolidated PDF.
pub const DEFAULT_OCR_PROMPT: &str = r#"You are reading a PDF assembled from several separately uploaded documents: scans, phone photos and digital PDFs. Extract all of its text.

Follow these rules precisely:

1. ORDER
   - Process pages strictly in order
   - Begin each page with a line of the form: --- page N ---
   - Within a page, keep the reading order a human would use

2. CONTENT
   - Transcribe ALL text, including handwriting, stamps and form fields
   - Render tables as GFM pipe tables
   - Mark unreadable passages as [illegible]

3. OUTPUT
   - Output ONLY the extracted text
   - Do NOT summarise, translate or add commentary"#;

/// Build the prompt for one consolidated document.
///
/// Prepends a short context line naming the batch and its page count, which
/// lets the model catch truncated uploads ("expected 12 pages, saw 11").
pub fn ocr_prompt(title: Option<&str>, page_count: usize) -> String {
    let noun = if page_count == 1 { "page" } else { "pages" };
    match title.map(str::trim).filter(|t| !t.is_empty()) {
        Some(t) => format!(
            "Document: \"{}\" ({} {}).\n\n{}",
            t, page_count, noun, DEFAULT_OCR_PROMPT
        ),
        None => format!("Document: {} {}.\n\n{}", page_count, noun, DEFAULT_OCR_PROMPT),
    }
}
