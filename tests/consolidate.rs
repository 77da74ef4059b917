//! Integration tests for the public consolidation API.
//!
//! Every fixture is generated in memory (images via `image`, PDFs via
//! `lopdf`) so the suite needs no files on disk and no network.

use edgequake_docmerge::{
    consolidate, consolidate_files, consolidate_to_bytes, ConsolidateError, ConsolidationConfig,
    ConsolidationProgressCallback, FileFormat, FileOutcome, InputFile, PageOrigin, SkipReason,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use lopdf::{dictionary, Document, Object, Stream};
use serde_json::{json, Value};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Fixtures ─────────────────────────────────────────────────────────────────

fn png(w: u32, h: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([10, 120, 30, 255])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
    buf
}

fn jpeg(w: u32, h: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([220, 200, 20])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg).unwrap();
    buf
}

/// A PDF with one page per `(width, height)` entry.
fn pdf(sizes: &[(i64, i64)]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });

    let kids: Vec<Object> = sizes
        .iter()
        .enumerate()
        .map(|(i, &(w, h))| {
            let text = format!("BT /F1 10 Tf 20 20 Td (source page {}) Tj ET", i + 1);
            let content_id = doc.add_object(Stream::new(dictionary! {}, text.into_bytes()));
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), w.into(), h.into()],
                "Contents" => content_id,
                "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
            })
            .into()
        })
        .collect();

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => sizes.len() as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

fn entry(name: &str, bytes: &[u8]) -> Value {
    serde_json::to_value(InputFile::from_bytes(name, bytes)).unwrap()
}

/// The canonical batch: a.png, b.pdf (2 pages), c.jpg.
fn abc_batch() -> Value {
    json!([
        entry("a.png", &png(100, 50)),
        entry("b.pdf", &pdf(&[(200, 300), (210, 310)])),
        entry("c.jpg", &jpeg(40, 60)),
    ])
}

/// MediaBox `(width, height)` of every page of a serialised PDF, in order.
fn page_sizes(bytes: &[u8]) -> Vec<(f32, f32)> {
    let doc = Document::load_mem(bytes).unwrap();
    doc.get_pages()
        .into_values()
        .map(|id| {
            let page = doc.get_dictionary(id).unwrap();
            let b = page.get(b"MediaBox").unwrap().as_array().unwrap();
            let n: Vec<f32> = b.iter().map(|o| o.as_float().unwrap()).collect();
            (n[2] - n[0], n[3] - n[1])
        })
        .collect()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn merges_images_and_pdf_pages_in_input_order() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("merged.pdf");

    let out = consolidate(&abc_batch(), &target, &ConsolidationConfig::default())
        .await
        .unwrap();

    assert_eq!(out.stats.total_pages, 4);
    assert_eq!(out.stats.added_files, 3);
    assert_eq!(out.stats.skipped_files, 0);

    let names: Vec<&str> = out.pages.iter().map(|p| p.source_name.as_str()).collect();
    assert_eq!(names, ["a.png", "b.pdf", "b.pdf", "c.jpg"]);
    assert_eq!(out.pages[0].origin, PageOrigin::Embedded { format: FileFormat::Png });
    assert_eq!(out.pages[2].origin, PageOrigin::Imported { source_page: 2 });
    assert_eq!(out.pages[3].origin, PageOrigin::Embedded { format: FileFormat::Jpeg });
    let nums: Vec<usize> = out.pages.iter().map(|p| p.page_num).collect();
    assert_eq!(nums, [1, 2, 3, 4]);

    let bytes = std::fs::read(&target).unwrap();
    assert_eq!(
        page_sizes(&bytes),
        [(100.0, 50.0), (200.0, 300.0), (210.0, 310.0), (40.0, 60.0)]
    );
}

#[tokio::test]
async fn permuting_inputs_permutes_pages() {
    let a = entry("a.png", &png(11, 11));
    let b = entry("b.pdf", &pdf(&[(22, 22), (33, 33)]));
    let c = entry("c.jpg", &jpeg(44, 44));

    let out = consolidate_to_bytes(&json!([c, a, b]), &ConsolidationConfig::default())
        .await
        .unwrap();

    assert_eq!(
        page_sizes(&out.bytes),
        [(44.0, 44.0), (11.0, 11.0), (22.0, 22.0), (33.0, 33.0)]
    );
}

#[tokio::test]
async fn corrupt_file_is_skipped_and_rest_still_merged() {
    let raw = json!([
        entry("a.png", &png(10, 10)),
        entry("broken.pdf", b"%PDF-1.4 this is not really a pdf"),
        entry("c.jpg", &jpeg(12, 12)),
    ]);
    let out = consolidate_to_bytes(&raw, &ConsolidationConfig::default())
        .await
        .unwrap();

    assert_eq!(out.stats.total_pages, 2);
    assert_eq!(out.stats.skipped_files, 1);
    let skipped: Vec<_> = out.skipped().collect();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].file_name, "broken.pdf");
    assert!(matches!(
        skipped[0].outcome,
        FileOutcome::Skipped { reason: SkipReason::Decode { .. } }
    ));
    assert_eq!(page_sizes(&out.bytes), [(10.0, 10.0), (12.0, 12.0)]);
}

#[tokio::test]
async fn unsupported_extension_is_skipped() {
    let raw = json!([
        entry("notes.docx", b"PK\x03\x04"),
        entry("scan.PNG", &png(5, 7)),
    ]);
    let out = consolidate_to_bytes(&raw, &ConsolidationConfig::default())
        .await
        .unwrap();

    assert_eq!(out.stats.total_pages, 1);
    assert_eq!(
        out.files[0].outcome,
        FileOutcome::Skipped {
            reason: SkipReason::UnsupportedFormat {
                extension: "docx".into()
            }
        }
    );
}

#[tokio::test]
async fn all_files_failing_is_empty_result_and_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("out/merged.pdf");
    let raw = json!([
        entry("a.png", b"not a png"),
        entry("b.txt", b"plain text"),
    ]);

    let err = consolidate(&raw, &target, &ConsolidationConfig::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ConsolidateError::EmptyResult { total_files: 2, .. }));
    assert!(!target.exists());
    assert!(!dir.path().join("out").exists());
}

#[tokio::test]
async fn invalid_input_is_rejected() {
    let config = ConsolidationConfig::default();
    for raw in [json!(null), json!([]), json!({"fileName": "a.png"})] {
        let err = consolidate_to_bytes(&raw, &config).await.unwrap_err();
        assert!(matches!(err, ConsolidateError::InvalidInput { .. }), "{raw}");
    }
}

#[tokio::test]
async fn nested_output_directories_are_created() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("tenant/42/2026/merged.pdf");

    let out = consolidate_files(
        vec![InputFile::from_bytes("a.jpg", &jpeg(8, 8))],
        &target,
        &ConsolidationConfig::default(),
    )
    .await
    .unwrap();

    assert_eq!(out.path, target);
    let bytes = std::fs::read(&target).unwrap();
    assert!(bytes.starts_with(b"%PDF-1.7"));
    assert_eq!(out.stats.output_bytes, bytes.len() as u64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_runs_on_one_target_both_succeed() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("same.pdf");
    let config = ConsolidationConfig::default();
    let small = json!([entry("a.png", &png(6, 6))]);
    let large = abc_batch();

    for _ in 0..20 {
        let (a, b) = tokio::join!(
            consolidate(&small, &target, &config),
            consolidate(&large, &target, &config)
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        let on_disk = std::fs::read(&target).unwrap();
        let pages = page_sizes(&on_disk).len();
        assert!(pages == a.stats.total_pages || pages == b.stats.total_pages);
    }

    let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(entries.len(), 1, "temp files must not be left behind");
}

#[tokio::test]
async fn title_is_written_to_info_dictionary() {
    let config = ConsolidationConfig::builder()
        .title("Claim 4711")
        .build()
        .unwrap();
    let out = consolidate_to_bytes(&json!([entry("a.png", &png(3, 3))]), &config)
        .await
        .unwrap();

    let doc = Document::load_mem(&out.bytes).unwrap();
    let info_id = doc.trailer.get(b"Info").unwrap().as_reference().unwrap();
    let info = doc.get_dictionary(info_id).unwrap();
    assert_eq!(info.get(b"Title").unwrap().as_str().unwrap(), b"Claim 4711");
}

#[derive(Default)]
struct Recorder {
    started: AtomicUsize,
    added: AtomicUsize,
    skipped: AtomicUsize,
    events: Mutex<Vec<String>>,
}

impl ConsolidationProgressCallback for Recorder {
    fn on_consolidation_start(&self, total_files: usize) {
        self.events.lock().unwrap().push(format!("start {total_files}"));
    }

    fn on_file_start(&self, file_num: usize, _total: usize, _name: &str) {
        self.started.fetch_add(1, Ordering::SeqCst);
        self.events.lock().unwrap().push(format!("file {file_num}"));
    }

    fn on_file_complete(&self, _file_num: usize, _total: usize, _name: &str, _pages: usize) {
        self.added.fetch_add(1, Ordering::SeqCst);
    }

    fn on_file_skipped(&self, file_num: usize, _total: usize, _name: &str, _reason: &str) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
        self.events.lock().unwrap().push(format!("skip {file_num}"));
    }

    fn on_consolidation_complete(&self, total: usize, added: usize, pages: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("done {total}/{added}/{pages}"));
    }
}

#[tokio::test]
async fn progress_callback_sees_every_file() {
    let recorder = Arc::new(Recorder::default());
    let config = ConsolidationConfig::builder()
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    let mut raw = abc_batch();
    let list = raw.as_array_mut().unwrap();
    list.insert(1, json!({"fileName": "missing-data.png"}));
    list.push(entry("x.gif", b"GIF89a"));

    let out = consolidate_to_bytes(&raw, &config).await.unwrap();
    assert_eq!(out.stats.total_files, 5);

    // The rejected entry never reaches on_file_start.
    assert_eq!(recorder.started.load(Ordering::SeqCst), 4);
    assert_eq!(recorder.added.load(Ordering::SeqCst), 3);
    assert_eq!(recorder.skipped.load(Ordering::SeqCst), 2);

    let events = recorder.events.lock().unwrap();
    assert_eq!(
        *events,
        [
            "start 5", "file 1", "skip 2", "file 3", "file 4", "file 5", "skip 5", "done 5/3/4"
        ]
    );
}
