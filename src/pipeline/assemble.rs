//! The output document aggregate.
//!
//! Page-construction strategies never touch the output directly. They
//! return a [`PageBatch`]: the fully-prepared objects for one input file,
//! numbered from an id the aggregate handed out. A batch is committed in a
//! single [`OutputDocument::append`] call, so a file that fails half-way
//! through decoding leaves no orphan objects behind.
//!
//! Page order lives in an append-only list of page ids; the page tree is
//! only written out in [`OutputDocument::finish`], so the order of the
//! `Kids` array is exactly the order of `append` calls.

use crate::error::ConsolidateError;
use crate::output::{PageInfo, PageOrigin};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, StringFormat};
use tracing::debug;

/// One prepared page, not yet attached to a page tree.
#[derive(Debug, Clone)]
pub struct PreparedPage {
    pub id: ObjectId,
    /// Page dictionary without `/Parent`.
    pub dict: Dictionary,
    pub width: f64,
    pub height: f64,
    pub origin: PageOrigin,
}

/// Every object one input file contributes to the output.
#[derive(Debug, Clone, Default)]
pub struct PageBatch {
    /// Non-page objects (content streams, images, fonts, ...).
    pub objects: Vec<(ObjectId, Object)>,
    /// Pages in the order they must appear.
    pub pages: Vec<PreparedPage>,
}

impl PageBatch {
    /// Highest object number used by the batch, 0 when empty.
    pub fn max_id(&self) -> u32 {
        self.objects
            .iter()
            .map(|(id, _)| id.0)
            .chain(self.pages.iter().map(|p| p.id.0))
            .max()
            .unwrap_or(0)
    }
}

/// Options applied when the document is serialised.
#[derive(Debug, Clone, Default)]
pub struct FinishOptions {
    pub compress: bool,
    pub title: Option<String>,
    pub producer: Option<String>,
}

/// The single PDF being built by one consolidation run.
pub struct OutputDocument {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<ObjectId>,
    pages: Vec<PageInfo>,
}

impl OutputDocument {
    /// Start an empty document with the given PDF header version.
    pub fn new(version: &str) -> Self {
        let mut doc = Document::with_version(version);
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
            pages: Vec::new(),
        }
    }

    /// First object number a new batch may use.
    pub fn next_object_number(&self) -> u32 {
        self.doc.max_id + 1
    }

    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    pub fn pages(&self) -> &[PageInfo] {
        &self.pages
    }

    /// Commit a batch, attaching its pages after all existing ones.
    ///
    /// Returns the number of pages added.
    pub fn append(&mut self, batch: PageBatch, source_index: usize, source_name: &str) -> usize {
        let max_id = batch.max_id();
        debug_assert!(
            batch.objects.iter().all(|(id, _)| id.0 > self.pages_id.0),
            "batch reuses reserved object ids"
        );

        for (id, object) in batch.objects {
            self.doc.objects.insert(id, object);
        }

        let added = batch.pages.len();
        for page in batch.pages {
            let mut dict = page.dict;
            dict.set("Parent", self.pages_id);
            self.doc.objects.insert(page.id, Object::Dictionary(dict));
            self.kids.push(page.id);
            self.pages.push(PageInfo {
                page_num: self.kids.len(),
                source_index,
                source_name: source_name.to_string(),
                width: page.width,
                height: page.height,
                origin: page.origin,
            });
        }

        self.doc.max_id = self.doc.max_id.max(max_id);
        debug!(
            "Appended {} page(s) from '{}' → {} total",
            added,
            source_name,
            self.kids.len()
        );
        added
    }

    /// Write the page tree and catalog, then serialise to PDF bytes.
    ///
    /// # Errors
    /// [`ConsolidateError::EmptyResult`] if no page was ever appended,
    /// [`ConsolidateError::SerializeFailed`] if lopdf cannot write the file.
    pub fn finish(self, options: &FinishOptions) -> Result<(Vec<u8>, Vec<PageInfo>), ConsolidateError> {
        let OutputDocument {
            mut doc,
            pages_id,
            kids,
            pages,
        } = self;

        if kids.is_empty() {
            return Err(ConsolidateError::EmptyResult {
                total_files: 0,
                first_reason: "no pages were appended".into(),
            });
        }

        let count = kids.len() as i64;
        let kids: Vec<Object> = kids.into_iter().map(Object::Reference).collect();
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut info = Dictionary::new();
        if let Some(ref title) = options.title {
            info.set("Title", text_string(title));
        }
        if let Some(ref producer) = options.producer {
            info.set("Producer", text_string(producer));
        }
        if !info.is_empty() {
            let info_id = doc.add_object(info);
            doc.trailer.set("Info", info_id);
        }

        if options.compress {
            doc.compress();
        }

        let mut buf = Vec::new();
        doc.save_to(&mut buf)
            .map_err(|e| ConsolidateError::SerializeFailed {
                detail: e.to_string(),
            })?;

        Ok((buf, pages))
    }
}

/// PDF text string: plain literal for ASCII, UTF-16BE with BOM otherwise.
fn text_string(s: &str) -> Object {
    if s.is_ascii() {
        Object::String(s.as_bytes().to_vec(), StringFormat::Literal)
    } else {
        let mut bytes = vec![0xFE, 0xFF];
        for unit in s.encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        Object::String(bytes, StringFormat::Hexadecimal)
    }
}
