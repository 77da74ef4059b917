//! Page importing: lift every page of a standalone PDF into the output.
//!
//! Pages are copied at the object level. The source document is renumbered
//! so its object ids start above everything the output already holds, then
//! each page dictionary and the transitive closure of objects it references
//! (content streams, fonts, images, annotations, ...) are collected into a
//! [`PageBatch`]. Nothing is re-rendered.
//!
//! ## Inherited attributes
//!
//! `MediaBox`, `CropBox`, `Resources` and `Rotate` may live on an ancestor
//! `Pages` node instead of the page itself. The source page tree is dropped
//! when a page is re-parented under the output tree, so these values are
//! copied onto the page before it leaves its original document.

use crate::error::SkipReason;
use crate::output::PageOrigin;
use crate::pipeline::assemble::{PageBatch, PreparedPage};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::BTreeSet;
use tracing::{debug, warn};

const FORMAT: &str = "pdf";

/// Keys a page may inherit from its ancestors (PDF 32000-1, table 30).
const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// US Letter, used when neither the page nor any ancestor has a MediaBox.
const DEFAULT_MEDIA_BOX: [i64; 4] = [0, 0, 612, 792];

/// Guards against `Parent` cycles in malformed files.
const MAX_TREE_DEPTH: usize = 64;

/// Build a batch holding every page of the PDF in `bytes`, in file order.
///
/// Object numbers are allocated from `first_id` upwards.
///
/// # Errors
/// [`SkipReason::Decode`] when the document cannot be parsed, is encrypted
/// with a non-empty user password, or has no pages.
pub fn import_pdf(bytes: &[u8], first_id: u32) -> Result<PageBatch, SkipReason> {
    let mut source = Document::load_mem(bytes).map_err(|e| SkipReason::decode(FORMAT, e))?;

    // Owner-password-only files open with the empty user password; must run
    // before renumbering, the per-object keys depend on the original ids.
    if source.is_encrypted() {
        source.decrypt("").map_err(|e| {
            SkipReason::decode(FORMAT, format!("document is encrypted and needs a password: {e}"))
        })?;
        source.trailer.remove(b"Encrypt");
        debug!("Decrypted PDF with the empty user password");
    }

    source.renumber_objects_with(first_id);

    // get_pages() is keyed by 1-based page number, so iteration is file order.
    let page_ids: Vec<ObjectId> = source.get_pages().into_values().collect();
    if page_ids.is_empty() {
        return Err(SkipReason::decode(FORMAT, "document has no pages"));
    }

    let lifted: BTreeSet<ObjectId> = page_ids.iter().copied().collect();
    let mut seen: BTreeSet<ObjectId> = lifted.clone();
    let mut batch = PageBatch::default();

    for (n, &page_id) in page_ids.iter().enumerate() {
        let mut dict = source
            .get_dictionary(page_id)
            .map_err(|e| SkipReason::decode(FORMAT, format!("page {}: {e}", n + 1)))?
            .clone();

        for key in INHERITABLE {
            if !dict.has(key) {
                if let Some(value) = inherited(&source, &dict, key) {
                    dict.set(key.to_vec(), value);
                }
            }
        }
        if !dict.has(b"MediaBox") {
            warn!("PDF page {} has no MediaBox; assuming US Letter", n + 1);
            dict.set(
                "MediaBox",
                DEFAULT_MEDIA_BOX.iter().map(|&v| Object::Integer(v)).collect::<Vec<_>>(),
            );
        }
        dict.remove(b"Parent");

        let (width, height) = page_size(&source, &dict)
            .ok_or_else(|| SkipReason::decode(FORMAT, format!("page {}: invalid MediaBox", n + 1)))?;

        let mut stack: Vec<ObjectId> = Vec::new();
        for (_, value) in dict.iter() {
            push_references(value, &mut stack);
        }
        collect(&source, &lifted, &mut seen, stack, &mut batch.objects);

        batch.pages.push(PreparedPage {
            id: page_id,
            dict,
            width,
            height,
            origin: PageOrigin::Imported { source_page: n + 1 },
        });
    }

    debug!(
        "Lifted {} page(s) and {} supporting object(s) from PDF",
        batch.pages.len(),
        batch.objects.len()
    );
    Ok(batch)
}

/// Walk up the `Parent` chain looking for `key`.
fn inherited(doc: &Document, page: &Dictionary, key: &[u8]) -> Option<Object> {
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    for _ in 0..MAX_TREE_DEPTH {
        let node = doc.get_dictionary(parent?).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}

/// Width and height of the MediaBox in points.
fn page_size(doc: &Document, page: &Dictionary) -> Option<(f64, f64)> {
    let media_box = resolve(doc, page.get(b"MediaBox").ok()?)?;
    let coords: Vec<f64> = media_box
        .as_array()
        .ok()?
        .iter()
        .map(|o| resolve(doc, o).and_then(number))
        .collect::<Option<_>>()?;
    if coords.len() != 4 {
        return None;
    }
    let width = (coords[2] - coords[0]).abs();
    let height = (coords[3] - coords[1]).abs();
    if width > 0.0 && height > 0.0 {
        Some((width, height))
    } else {
        None
    }
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

/// Copy every object reachable from `stack` into `out`.
///
/// Other pages of the source are never descended into (they are either
/// lifted themselves or deliberately dropped), and neither are the source's
/// page tree nodes and catalog.
fn collect(
    doc: &Document,
    lifted: &BTreeSet<ObjectId>,
    seen: &mut BTreeSet<ObjectId>,
    mut stack: Vec<ObjectId>,
    out: &mut Vec<(ObjectId, Object)>,
) {
    while let Some(id) = stack.pop() {
        if lifted.contains(&id) || !seen.insert(id) {
            continue;
        }
        let Ok(object) = doc.get_object(id) else {
            // Dangling reference in the source; readers treat it as null.
            continue;
        };
        if is_structural(object) {
            continue;
        }
        push_references(object, &mut stack);
        out.push((id, object.clone()));
    }
}

fn is_structural(object: &Object) -> bool {
    let dict = match object {
        Object::Dictionary(d) => d,
        _ => return false,
    };
    matches!(
        dict.get(b"Type").and_then(Object::as_name),
        Ok(b"Page") | Ok(b"Pages") | Ok(b"Catalog")
    )
}

fn push_references(object: &Object, stack: &mut Vec<ObjectId>) {
    match object {
        Object::Reference(id) => stack.push(*id),
        Object::Array(items) => items.iter().for_each(|o| push_references(o, stack)),
        Object::Dictionary(dict) => dict.iter().for_each(|(_, o)| push_references(o, stack)),
        Object::Stream(stream) => stream.dict.iter().for_each(|(_, o)| push_references(o, stack)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream, StringFormat};
    use md5::{Digest, Md5};

    /// Two pages sized by the `Pages` node, one overriding it.
    fn inherited_box_doc() -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids = Vec::new();
        for (i, own_box) in [None, Some([0, 0, 300, 400])].into_iter().enumerate() {
            let content = format!("BT /F1 12 Tf 72 720 Td (page {}) Tj ET", i + 1);
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            let mut page = dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            };
            if let Some(b) = own_box {
                page.set("MediaBox", b.iter().map(|&v| Object::Integer(v)).collect::<Vec<_>>());
            }
            kids.push(Object::Reference(doc.add_object(page)));
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => 2,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    fn save(mut doc: Document) -> Vec<u8> {
        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    fn inherited_box_pdf() -> Vec<u8> {
        save(inherited_box_doc())
    }

    // ── Standard security handler, RC4 40-bit (V1/R2) ──

    const PASSWORD_PAD: [u8; 32] = [
        0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
        0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
    ];

    fn rc4(key: &[u8], data: &[u8]) -> Vec<u8> {
        let mut s: Vec<u8> = (0..=255).collect();
        let mut j = 0u8;
        for i in 0..256 {
            j = j.wrapping_add(s[i]).wrapping_add(key[i % key.len()]);
            s.swap(i, j as usize);
        }
        let (mut i, mut j) = (0u8, 0u8);
        data.iter()
            .map(|&b| {
                i = i.wrapping_add(1);
                j = j.wrapping_add(s[i as usize]);
                s.swap(i as usize, j as usize);
                b ^ s[s[i as usize].wrapping_add(s[j as usize]) as usize]
            })
            .collect()
    }

    /// Encrypt every stream of `doc` so that it opens with `user_password`.
    fn encrypt_rc4_40(doc: &mut Document, user_password: &[u8]) {
        let owner_hash = vec![0x5A_u8; 32];
        let permissions: i64 = -4;
        let file_id = b"docmerge-fixture".to_vec();

        let n = user_password.len().min(32);
        let mut seed = user_password[..n].to_vec();
        seed.extend_from_slice(&PASSWORD_PAD[..32 - n]);
        seed.extend_from_slice(&owner_hash);
        seed.extend_from_slice(&(permissions as u32).to_le_bytes());
        seed.extend_from_slice(&file_id);
        let key = Md5::digest(&seed)[..5].to_vec();

        for (&(num, gen), object) in doc.objects.iter_mut() {
            if let Object::Stream(stream) = object {
                let mut object_key = key.clone();
                object_key.extend_from_slice(&num.to_le_bytes()[..3]);
                object_key.extend_from_slice(&gen.to_le_bytes()[..2]);
                let digest = Md5::digest(&object_key);
                let encrypted = rc4(&digest[..10], &stream.content);
                stream.set_content(encrypted);
            }
        }

        let encrypt_id = doc.add_object(dictionary! {
            "Filter" => "Standard",
            "V" => 1,
            "R" => 2,
            "O" => Object::String(owner_hash, StringFormat::Hexadecimal),
            "U" => Object::String(rc4(&key, &PASSWORD_PAD), StringFormat::Hexadecimal),
            "P" => permissions,
        });
        doc.trailer.set("Encrypt", encrypt_id);
        doc.trailer.set(
            "ID",
            vec![
                Object::String(file_id.clone(), StringFormat::Hexadecimal),
                Object::String(file_id, StringFormat::Hexadecimal),
            ],
        );
    }

    #[test]
    fn lifts_all_pages_in_order_with_inherited_attributes() {
        let batch = import_pdf(&inherited_box_pdf(), 10).unwrap();
        assert_eq!(batch.pages.len(), 2);

        assert_eq!((batch.pages[0].width, batch.pages[0].height), (595.0, 842.0));
        assert_eq!((batch.pages[1].width, batch.pages[1].height), (300.0, 400.0));
        assert_eq!(batch.pages[0].origin, PageOrigin::Imported { source_page: 1 });
        assert_eq!(batch.pages[1].origin, PageOrigin::Imported { source_page: 2 });

        for page in &batch.pages {
            assert!(page.dict.has(b"Resources"), "Resources must be materialised");
            assert!(page.dict.has(b"MediaBox"));
            assert!(!page.dict.has(b"Parent"));
        }
    }

    #[test]
    fn ids_start_at_first_id_and_skip_page_tree() {
        let batch = import_pdf(&inherited_box_pdf(), 100).unwrap();
        assert!(batch.objects.iter().all(|(id, _)| id.0 >= 100));
        assert!(batch.pages.iter().all(|p| p.id.0 >= 100));
        assert!(batch.objects.iter().all(|(_, o)| !is_structural(o)));
        // font, resources, two content streams
        assert_eq!(batch.objects.len(), 4);
    }

    #[test]
    fn owner_password_only_pdf_is_decrypted() {
        let mut doc = inherited_box_doc();
        encrypt_rc4_40(&mut doc, b"");
        let bytes = save(doc);
        assert!(Document::load_mem(&bytes).unwrap().is_encrypted());

        let batch = import_pdf(&bytes, 10).unwrap();
        assert_eq!(batch.pages.len(), 2);

        let contents: Vec<&[u8]> = batch
            .objects
            .iter()
            .filter_map(|(_, o)| match o {
                Object::Stream(s) => Some(s.content.as_slice()),
                _ => None,
            })
            .collect();
        assert_eq!(contents.len(), 2);
        assert!(contents.iter().all(|c| c.starts_with(b"BT /F1 12 Tf")), "content must be plaintext");
        // The security handler dictionary stays behind.
        assert!(batch
            .objects
            .iter()
            .all(|(_, o)| o.as_dict().map_or(true, |d| !d.has(b"U"))));
    }

    #[test]
    fn user_password_pdf_is_skipped() {
        let mut doc = inherited_box_doc();
        encrypt_rc4_40(&mut doc, b"secret");
        let err = import_pdf(&save(doc), 10).unwrap_err();
        assert!(err.to_string().contains("needs a password"), "got: {err}");
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = import_pdf(b"%PDF-1.4\nthis is not really a pdf", 1).unwrap_err();
        assert!(matches!(err, SkipReason::Decode { ref format, .. } if format == "pdf"));
        assert!(import_pdf(b"", 1).is_err());
    }

    #[test]
    fn references_inside_streams_and_arrays_are_followed() {
        let mut stack = Vec::new();
        let obj = Object::Array(vec![
            Object::Reference((1, 0)),
            Object::Dictionary(dictionary! { "X" => Object::Reference((2, 0)) }),
            Object::Stream(Stream::new(dictionary! { "Y" => Object::Reference((3, 0)) }, vec![])),
        ]);
        push_references(&obj, &mut stack);
        stack.sort();
        assert_eq!(stack, vec![(1, 0), (2, 0), (3, 0)]);
    }

    #[test]
    fn page_size_handles_offset_and_real_boxes() {
        let doc = Document::with_version("1.5");
        let page = dictionary! {
            "MediaBox" => vec![Object::Integer(10), Object::Integer(20), Object::Real(110.5), Object::Integer(220)],
        };
        assert_eq!(page_size(&doc, &page), Some((100.5, 200.0)));

        let degenerate = dictionary! {
            "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(0), Object::Integer(10)],
        };
        assert_eq!(page_size(&doc, &degenerate), None);
    }
}
