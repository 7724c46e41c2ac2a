//! Configuration surface and its effect on the operations.

mod common;

use common::{labelled_pdf, PdfBuilder};
use pdf_splice::{
    merge, parse, Document, EngineConfig, Error, LayoutConfiguration, Margin, Orientation, PageSize,
    SourceDocument,
};
use pretty_assertions::assert_eq;
use std::io::Write;

#[test]
fn test_pairs_are_case_insensitive_values() {
    let config =
        EngineConfig::from_pairs(&[("pageSize", "Letter"), ("orientation", "LANDSCAPE"), ("margin", " none ")])
            .unwrap();
    assert_eq!(
        config.layout,
        LayoutConfiguration::new(PageSize::Letter, Orientation::Landscape, Margin::None)
    );
}

#[test]
fn test_unrecognised_options_fail() {
    for (key, value) in [
        ("pageSize", "tabloid"),
        ("margin", "huge"),
        ("orientation", "sideways"),
        ("maxSourceDocuments", "many"),
        ("strictReferences", "maybe"),
        ("quality", "95"),
    ] {
        let result = EngineConfig::from_pairs(&[(key, value)]);
        assert!(matches!(result, Err(Error::Configuration(_))), "{}={}", key, value);
    }
}

#[test]
fn test_json_keys_are_case_sensitive() {
    assert!(EngineConfig::from_json(r#"{"page_size": "a4"}"#).is_err());
    assert!(EngineConfig::from_json(r#"{"pageSize": "A4"}"#).is_err());
    assert!(EngineConfig::from_json(r#""pageSize""#).is_err());
    assert_eq!(EngineConfig::from_json("{}").unwrap(), EngineConfig::default());
}

#[test]
fn test_json_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{"pageSize": "legal", "margin": "big", "maxSourceDocuments": 2}}"#).unwrap();
    let text = std::fs::read_to_string(file.path()).unwrap();

    let config = EngineConfig::from_json(&text).unwrap();
    assert_eq!(config.layout.page_size, PageSize::Legal);
    assert_eq!(config.layout.margin, Margin::Big);
    assert_eq!(config.max_source_documents, 2);
}

#[test]
fn test_source_limit_from_configuration() {
    let config = EngineConfig::from_pairs(&[("maxSourceDocuments", "1")]).unwrap();
    let one = vec![SourceDocument::new(labelled_pdf("A", 1))];
    let two = vec![
        SourceDocument::new(labelled_pdf("A", 1)),
        SourceDocument::new(labelled_pdf("B", 1)),
    ];
    assert!(merge(&one, &config, None).is_ok());
    assert!(matches!(merge(&two, &config, None), Err(Error::Configuration(_))));
}

#[test]
fn test_nesting_limit_from_configuration() {
    let deep = format!("{}1{}", "[".repeat(20), "]".repeat(20));
    let bytes = PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [] /Count 0 >>")
        .object(3, &deep)
        .build();

    assert!(parse(&bytes).is_ok());
    let shallow = EngineConfig::from_pairs(&[("maxNesting", "5")]).unwrap();
    assert!(Document::parse(&bytes, &shallow).is_err());
}
