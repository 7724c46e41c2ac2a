//! Merge and split through the public API.

mod common;

use common::{font_count, labelled_pdf, page_labels, single_font_pdf, PdfBuilder};
use pdf_splice::object::Object;
use pdf_splice::{
    copy_pages, merge, merge_parallel, parse, split, CancellationFlag, CopyError, CopySession, Document,
    EngineConfig, Error, SourceDocument,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn labels(bytes: &[u8]) -> Vec<String> {
    page_labels(&parse(bytes).unwrap())
}

#[test]
fn test_merge_two_and_three_pages() {
    let sources = vec![
        SourceDocument::named("a.pdf", labelled_pdf("A", 2)),
        SourceDocument::named("b.pdf", labelled_pdf("B", 3)),
    ];
    let merged = merge(&sources, &EngineConfig::default(), None).unwrap();
    assert_eq!(labels(&merged), vec!["A0", "A1", "B0", "B1", "B2"]);
}

#[test]
fn test_merge_keeps_first_info() {
    let sources = vec![
        SourceDocument::new(labelled_pdf("A", 1)),
        SourceDocument::new(labelled_pdf("B", 1)),
    ];
    let doc = parse(&merge(&sources, &EngineConfig::default(), None).unwrap()).unwrap();
    let info = doc.trailer_info().unwrap();
    assert_eq!(info.get("Title"), Some(&Object::String(b"A".to_vec())));
}

#[test]
fn test_split_reorders() {
    let source = SourceDocument::new(labelled_pdf("P", 5));
    let out = split(&source, &[4, 0], &EngineConfig::default(), None).unwrap();
    assert_eq!(labels(&out), vec!["P4", "P0"]);
}

#[test]
fn test_split_boundary() {
    let source = SourceDocument::new(labelled_pdf("P", 5));
    let config = EngineConfig::default();

    assert_eq!(labels(&split(&source, &[4], &config, None).unwrap()), vec!["P4"]);
    let err = split(&source, &[5], &config, None).unwrap_err();
    assert!(
        matches!(err, Error::Copy(CopyError::IndexOutOfRange { index: 5, page_count: 5 })),
        "{:?}",
        err
    );
}

#[test]
fn test_split_without_pages_is_rejected() {
    let source = SourceDocument::new(labelled_pdf("P", 2));
    assert!(matches!(
        split(&source, &[], &EngineConfig::default(), None),
        Err(Error::Configuration(_))
    ));
}

#[test]
fn test_distinct_fonts_are_both_kept() {
    let sources = vec![
        SourceDocument::new(single_font_pdf("Helvetica")),
        SourceDocument::new(single_font_pdf("Courier")),
    ];
    let doc = parse(&merge(&sources, &EngineConfig::default(), None).unwrap()).unwrap();
    assert_eq!(font_count(&doc), 2);
}

#[test]
fn test_shared_font_copied_once() {
    let source = SourceDocument::new(labelled_pdf("F", 2));
    let doc = parse(&split(&source, &[0, 1], &EngineConfig::default(), None).unwrap()).unwrap();
    assert_eq!(font_count(&doc), 1);
}

#[test]
fn test_duplicate_page_shares_content() {
    let source = parse(&labelled_pdf("D", 2)).unwrap();
    let mut dest = Document::new();
    let mut session = CopySession::new();
    let pages = session.copy_pages(&source, &[1, 1], &mut dest, None).unwrap();

    assert_eq!(pages.len(), 2);
    assert_ne!(pages[0].reference, pages[1].reference);
    let contents = |i: usize| dest.resolve(pages[i].reference).get("Contents").cloned();
    assert_eq!(contents(0), contents(1));
    assert_eq!(page_labels(&dest), vec!["D1", "D1"]);
}

#[test]
fn test_copied_pages_materialise_inherited_attributes() {
    let source = parse(&labelled_pdf("I", 1)).unwrap();
    let mut dest = Document::new();
    let pages = copy_pages(&source, &[0], &mut dest, None).unwrap();

    let page = dest.resolve(pages[0].reference);
    assert!(page.get("Resources").is_some());
    assert!(page.get("MediaBox").is_some());
    assert_eq!(page.get("Parent"), Some(&Object::Reference(dest.pages_root().unwrap())));
}

#[test]
fn test_annotation_link_into_dropped_page() {
    let bytes = PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R 4 0 R] /Count 2 /MediaBox [0 0 100 100] >>")
        .object(3, "<< /Type /Page /Parent 2 0 R /Annots [5 0 R] /Contents 6 0 R >>")
        .object(4, "<< /Type /Page /Parent 2 0 R /Contents 7 0 R >>")
        .object(5, "<< /Type /Annot /Subtype /Link /Rect [0 0 10 10] /P 3 0 R /Dest [4 0 R /Fit] >>")
        .stream(6, "", b"BT (L0) Tj ET")
        .stream(7, "", b"BT (L1) Tj ET")
        .build();
    let out = split(&SourceDocument::new(bytes), &[0], &EngineConfig::default(), None).unwrap();
    let doc = parse(&out).unwrap();

    assert_eq!(page_labels(&doc), vec!["L0"]);
    let page = doc.page(0).unwrap();
    let annots = doc.deref(doc.resolve(page.reference).get("Annots").unwrap());
    let annot = doc.deref(&annots.as_array().unwrap()[0]);
    assert!(annot.get("Dest").is_none());
    assert_eq!(annot.get("P"), Some(&Object::Reference(page.reference)));
}

#[test]
fn test_untyped_foreign_page_is_not_pulled_in() {
    let bytes = PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Kids [3 0 R 4 0 R] /Count 2 /MediaBox [0 0 100 100] >>")
        .object(3, "<< /Parent 2 0 R /Annots [5 0 R] /Contents 6 0 R >>")
        .object(4, "<< /Parent 2 0 R /Contents 7 0 R >>")
        .object(5, "<< /Type /Annot /Subtype /Text /Rect [0 0 10 10] /P 4 0 R /Popup 8 0 R >>")
        .stream(6, "", b"BT (U0) Tj ET")
        .stream(7, "", b"BT (U1) Tj ET OTHER-PAGE-ONLY")
        .object(8, "<< /Type /Annot /Subtype /Popup /Parent 4 0 R /Rect [0 0 5 5] >>")
        .build();
    let out = split(&SourceDocument::new(bytes), &[0], &EngineConfig::default(), None).unwrap();

    assert!(!out.windows(15).any(|w| w == b"OTHER-PAGE-ONLY"));
    let doc = parse(&out).unwrap();
    assert_eq!(page_labels(&doc), vec!["U0"]);
    let page = doc.page(0).unwrap();
    let annots = doc.deref(doc.resolve(page.reference).get("Annots").unwrap());
    let annot = doc.deref(&annots.as_array().unwrap()[0]);
    assert!(annot.get("P").is_none());
    assert!(annot.get("Popup").is_some());
}

#[test]
fn test_bad_source_is_attributed() {
    let sources = vec![
        SourceDocument::named("good.pdf", labelled_pdf("A", 1)),
        SourceDocument::named("broken.pdf", b"not a pdf".to_vec()),
    ];
    let err = merge(&sources, &EngineConfig::default(), None).unwrap_err();
    assert_eq!(err.source_name(), Some("broken.pdf"));
    assert!(err.is_per_source());
}

#[test]
fn test_source_limit() {
    let config = EngineConfig::default().with_max_source_documents(2);
    let sources: Vec<_> = (0..3)
        .map(|_| SourceDocument::new(labelled_pdf("X", 1)))
        .collect();
    assert!(matches!(merge(&sources, &config, None), Err(Error::Configuration(_))));
    assert!(matches!(merge(&[], &config, None), Err(Error::Configuration(_))));
}

#[test]
fn test_cancelled_merge_produces_nothing() {
    let flag = CancellationFlag::new();
    flag.cancel();
    let sources = vec![SourceDocument::new(labelled_pdf("A", 2))];
    assert!(matches!(
        merge(&sources, &EngineConfig::default(), Some(&flag)),
        Err(Error::Cancelled)
    ));
}

#[test]
fn test_parallel_merge_keeps_source_order() {
    let sources: Vec<_> = ["A", "B", "C", "D"]
        .iter()
        .enumerate()
        .map(|(i, prefix)| SourceDocument::new(labelled_pdf(prefix, i + 1)))
        .collect();
    let merged = merge_parallel(&sources, &EngineConfig::default(), None).unwrap();
    assert_eq!(
        labels(&merged),
        vec!["A0", "B0", "B1", "C0", "C1", "C2", "D0", "D1", "D2", "D3"]
    );
    assert_eq!(font_count(&parse(&merged).unwrap()), 4);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_split_preserves_requested_order(indices in prop::collection::vec(0usize..6, 1..10)) {
        let source = SourceDocument::new(labelled_pdf("Q", 6));
        let out = split(&source, &indices, &EngineConfig::default(), None).unwrap();
        let expected: Vec<String> = indices.iter().map(|i| format!("Q{}", i)).collect();
        prop_assert_eq!(labels(&out), expected);
    }
}
