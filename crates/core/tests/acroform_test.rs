//! Tests for AcroForm field flattening.

use miranda_core::{PDFDocument, PDFObject};
use std::io::Cursor;

fn push_obj(buf: &mut Vec<u8>, body: String, offsets: &mut Vec<usize>) {
    offsets.push(buf.len());
    buf.extend_from_slice(body.as_bytes());
}

fn push_classic_xref(buf: &mut Vec<u8>, offsets: &[usize], trailer_extra: &str) {
    let xref_pos = buf.len();
    buf.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", offsets.len() + 1).as_bytes());
    for offset in offsets {
        buf.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    buf.extend_from_slice(
        format!(
            "trailer\n<< /Size {} {} >>\nstartxref\n{}\n%%EOF",
            offsets.len() + 1,
            trailer_extra,
            xref_pos
        )
        .as_bytes(),
    );
}

/// A document with a small field tree:
///
/// - `name`: a terminal text field with a direct value
/// - `addr`: a parent with two kids, `addr.city` (own value) and `addr.zip`
///   (no value anywhere)
/// - `opt`: a field whose value is inherited by its unnamed widget kid
fn build_acroform_pdf() -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let mut offsets = Vec::new();
    push_obj(
        &mut out,
        "1 0 obj\n<< /Type /Catalog /Pages 2 0 R /AcroForm << /Fields [3 0 R 4 0 R 7 0 R] >> >>\nendobj\n"
            .to_string(),
        &mut offsets,
    );
    push_obj(
        &mut out,
        "2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n".to_string(),
        &mut offsets,
    );
    push_obj(
        &mut out,
        "3 0 obj\n<< /FT /Tx /T (name) /V (John) >>\nendobj\n".to_string(),
        &mut offsets,
    );
    push_obj(
        &mut out,
        "4 0 obj\n<< /T (addr) /Kids [5 0 R 6 0 R] >>\nendobj\n".to_string(),
        &mut offsets,
    );
    push_obj(
        &mut out,
        "5 0 obj\n<< /FT /Tx /T (city) /V (Oslo) /Parent 4 0 R >>\nendobj\n".to_string(),
        &mut offsets,
    );
    push_obj(
        &mut out,
        "6 0 obj\n<< /FT /Tx /T (zip) /Parent 4 0 R >>\nendobj\n".to_string(),
        &mut offsets,
    );
    push_obj(
        &mut out,
        "7 0 obj\n<< /FT /Btn /T (opt) /V /Yes /Kids [8 0 R] >>\nendobj\n".to_string(),
        &mut offsets,
    );
    push_obj(
        &mut out,
        "8 0 obj\n<< /Subtype /Widget /Parent 7 0 R >>\nendobj\n".to_string(),
        &mut offsets,
    );
    push_classic_xref(&mut out, &offsets, "/Root 1 0 R");
    out
}

#[test]
fn test_flattened_field_names_and_values() {
    let mut doc = PDFDocument::new(Cursor::new(build_acroform_pdf())).unwrap();
    let fields = doc.get_form_fields().unwrap();

    assert_eq!(
        fields.get("name").unwrap().as_string().unwrap(),
        b"John"
    );
    assert_eq!(
        fields.get("addr.city").unwrap().as_string().unwrap(),
        b"Oslo"
    );
    // no value anywhere along the chain resolves to null
    assert!(fields.get("addr.zip").unwrap().is_null());
    // the unnamed widget kid reports under its parent's name, with the
    // parent's value
    assert_eq!(fields.get("opt").unwrap().as_name().unwrap(), "Yes");
    // intermediate parents with kids do not produce entries of their own
    assert!(!fields.contains_key("addr"));
    assert_eq!(fields.len(), 4);
}

#[test]
fn test_field_order_follows_document_order() {
    let mut doc = PDFDocument::new(Cursor::new(build_acroform_pdf())).unwrap();
    let fields = doc.get_form_fields().unwrap();
    let names: Vec<_> = fields.keys().cloned().collect();
    assert_eq!(names, vec!["name", "addr.city", "addr.zip", "opt"]);
}

#[test]
fn test_document_without_acroform_yields_empty_map() {
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let mut offsets = Vec::new();
    push_obj(
        &mut out,
        "1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n".to_string(),
        &mut offsets,
    );
    push_obj(
        &mut out,
        "2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n".to_string(),
        &mut offsets,
    );
    push_classic_xref(&mut out, &offsets, "/Root 1 0 R");

    let mut doc = PDFDocument::new(Cursor::new(out)).unwrap();
    assert!(doc.get_form_fields().unwrap().is_empty());
}

#[test]
fn test_field_value_as_indirect_reference_is_resolved() {
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let mut offsets = Vec::new();
    push_obj(
        &mut out,
        "1 0 obj\n<< /Type /Catalog /AcroForm << /Fields [2 0 R] >> >>\nendobj\n".to_string(),
        &mut offsets,
    );
    push_obj(
        &mut out,
        "2 0 obj\n<< /FT /Tx /T (ref) /V 3 0 R >>\nendobj\n".to_string(),
        &mut offsets,
    );
    push_obj(
        &mut out,
        "3 0 obj\n(indirect value)\nendobj\n".to_string(),
        &mut offsets,
    );
    push_classic_xref(&mut out, &offsets, "/Root 1 0 R");

    let mut doc = PDFDocument::new(Cursor::new(out)).unwrap();
    let fields = doc.get_form_fields().unwrap();
    assert_eq!(
        fields.get("ref").unwrap(),
        &PDFObject::String(b"indirect value".to_vec(), miranda_core::StringFormat::Literal)
    );
}
