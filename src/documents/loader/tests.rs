use super::*;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use tempfile::TempDir;

fn build_pdf(pages: &[&str]) -> Vec<u8> {
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
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("content should encode"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        kids.push(page_id.into());
    }

    let count = i64::try_from(kids.len()).expect("page count fits");
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

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("pdf should serialize");
    bytes
}

#[test]
fn format_from_filename() {
    assert_eq!(DocumentFormat::from_filename("report.pdf"), DocumentFormat::Pdf);
    assert_eq!(DocumentFormat::from_filename("REPORT.PDF"), DocumentFormat::Pdf);
    assert_eq!(
        DocumentFormat::from_filename("notes.txt"),
        DocumentFormat::PlainText
    );
    assert_eq!(
        DocumentFormat::from_filename("README"),
        DocumentFormat::PlainText
    );
    assert_eq!(
        DocumentFormat::from_filename("archive.pdf.txt"),
        DocumentFormat::PlainText
    );
}

#[test]
fn load_plain_text_bytes() {
    let text = load_bytes(DocumentFormat::PlainText, "line one\nline two".as_bytes())
        .expect("text should load");
    assert_eq!(text, "line one\nline two");
}

#[test]
fn load_plain_text_rejects_invalid_utf8() {
    let result = load_bytes(DocumentFormat::PlainText, &[0xff, 0xfe, 0x00, 0x41]);
    assert!(matches!(result, Err(LoadError::InvalidUtf8(_))));
}

#[test]
fn load_text_file_from_path() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("notes.txt");
    std::fs::write(&path, "Cats are small carnivorous mammals.").expect("should write file");

    let text = load_path(&path).expect("file should load");
    assert_eq!(text, "Cats are small carnivorous mammals.");
}

#[test]
fn missing_file_is_load_error() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("missing.txt");

    let result = load_path(&path);
    assert!(matches!(result, Err(LoadError::Read { .. })));
}

#[test]
fn corrupt_pdf_is_load_error() {
    let result = load_bytes(DocumentFormat::Pdf, b"definitely not a pdf");
    assert!(matches!(result, Err(LoadError::Pdf(_))));
}

#[test]
fn pdf_pages_are_concatenated_in_order() {
    let bytes = build_pdf(&["First page text", "Second page text"]);

    let text = load_bytes(DocumentFormat::Pdf, &bytes).expect("pdf should load");

    let first = text.find("First page text").expect("first page present");
    let second = text.find("Second page text").expect("second page present");
    assert!(first < second);
    assert!(text.ends_with('\n'));
}

#[test]
fn pdf_loads_from_path_by_extension() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("paper.PDF");
    std::fs::write(&path, build_pdf(&["Only page"])).expect("should write file");

    let text = load_path(&path).expect("pdf should load");
    assert!(text.contains("Only page"));
}
