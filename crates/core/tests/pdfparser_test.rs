//! Tests for the object tokenizer and parser.

use miranda_core::error::PdfError;
use miranda_core::parser::cursor;
use miranda_core::{PDFObject, PDFParser, StringFormat};
use std::io::Cursor;

fn parse(data: &[u8]) -> miranda_core::Result<PDFObject> {
    let mut source = Cursor::new(data.to_vec());
    PDFParser::new(&mut source, data.len() as u64).parse_object()
}

// === Scalars ===

#[test]
fn test_parse_numbers() {
    let obj = parse(b"[ 42 -17 +8 3.14 -.5 0 3. ]").unwrap();
    let arr = obj.as_array().unwrap();
    assert_eq!(arr[0].as_int().unwrap(), 42);
    assert_eq!(arr[1].as_int().unwrap(), -17);
    assert_eq!(arr[2].as_int().unwrap(), 8);
    assert_eq!(arr[3].as_num().unwrap(), 3.14);
    assert_eq!(arr[4].as_num().unwrap(), -0.5);
    assert_eq!(arr[5].as_int().unwrap(), 0);
    assert_eq!(arr[6].as_num().unwrap(), 3.0);
}

#[test]
fn test_number_terminator_is_pushed_back() {
    // the ']' terminating 7 must still close the array
    let obj = parse(b"[7]").unwrap();
    let arr = obj.as_array().unwrap();
    assert_eq!(arr.len(), 1);
    assert_eq!(arr[0].as_int().unwrap(), 7);
}

#[test]
fn test_parse_bool_and_null() {
    assert_eq!(parse(b"true").unwrap().as_bool().unwrap(), true);
    assert_eq!(parse(b"false").unwrap().as_bool().unwrap(), false);
    assert!(parse(b"null").unwrap().is_null());
}

#[test]
fn test_parse_name_terminated_by_delimiter() {
    let obj = parse(b"[/Name(abc)]").unwrap();
    let arr = obj.as_array().unwrap();
    assert_eq!(arr.len(), 2);
    assert_eq!(arr[0].as_name().unwrap(), "Name");
    assert_eq!(arr[1].as_string().unwrap(), b"abc");
}

// === Strings ===

#[test]
fn test_literal_string_keeps_raw_bytes() {
    // escape sequences are not decoded by the tokenizer
    let obj = parse(b"(Line\\nLine)").unwrap();
    assert_eq!(obj.as_string().unwrap(), b"Line\\nLine");
    assert_eq!(obj, PDFObject::String(b"Line\\nLine".to_vec(), StringFormat::Literal));
}

#[test]
fn test_literal_string_balanced_parens() {
    let obj = parse(b"(a(b)c)").unwrap();
    assert_eq!(obj.as_string().unwrap(), b"a(b)c");
}

#[test]
fn test_literal_string_escaped_paren_does_not_close() {
    let obj = parse(b"(a\\)b)").unwrap();
    assert_eq!(obj.as_string().unwrap(), b"a\\)b");
}

#[test]
fn test_hex_string() {
    let obj = parse(b"<48656C6C6F>").unwrap();
    assert_eq!(obj, PDFObject::String(b"Hello".to_vec(), StringFormat::Hex));
}

#[test]
fn test_hex_string_ignores_whitespace() {
    let obj = parse(b"<48 65\n6C 6C 6F>").unwrap();
    assert_eq!(obj.as_string().unwrap(), b"Hello");
}

#[test]
fn test_hex_string_odd_digits_pad_zero_nybble() {
    assert_eq!(parse(b"<41>").unwrap().as_string().unwrap(), &[0x41]);
    assert_eq!(parse(b"<4>").unwrap().as_string().unwrap(), &[0x40]);
    assert_eq!(parse(b"<414>").unwrap().as_string().unwrap(), &[0x41, 0x40]);
}

// === Containers ===

#[test]
fn test_parse_simple_dict() {
    let obj = parse(b"<< /Type /Page /Count 5 >>").unwrap();
    let dict = obj.as_dict().unwrap();
    assert_eq!(dict.get("Type").unwrap().as_name().unwrap(), "Page");
    assert_eq!(dict.get("Count").unwrap().as_int().unwrap(), 5);
}

#[test]
fn test_parse_nested_dict() {
    let obj = parse(b"<< /Resources << /Font << /F1 1 0 R >> >> >>").unwrap();
    let dict = obj.as_dict().unwrap();
    let resources = dict.get("Resources").unwrap().as_dict().unwrap();
    let font = resources.get("Font").unwrap().as_dict().unwrap();
    let f1 = font.get("F1").unwrap().as_objref().unwrap();
    assert_eq!(f1.objid, 1);
    assert_eq!(f1.genno, 0);
}

#[test]
fn test_parse_empty_containers() {
    assert!(parse(b"<< >>").unwrap().as_dict().unwrap().is_empty());
    assert!(parse(b"[ ]").unwrap().as_array().unwrap().is_empty());
}

#[test]
fn test_deeply_nested_arrays() {
    // explicit stacks, so depth is bounded by the input only
    let mut data = Vec::new();
    for _ in 0..2000 {
        data.push(b'[');
    }
    data.push(b'1');
    for _ in 0..2000 {
        data.push(b']');
    }
    let mut obj = parse(&data).unwrap();
    for _ in 0..2000 {
        let arr = obj.as_array().unwrap();
        assert_eq!(arr.len(), 1);
        obj = arr[0].clone();
    }
    assert_eq!(obj.as_int().unwrap(), 1);
}

#[test]
fn test_duplicate_dict_key_is_error() {
    assert!(matches!(
        parse(b"<< /A 1 /A 2 >>"),
        Err(PdfError::TokenError { .. })
    ));
}

#[test]
fn test_dict_key_without_value_is_error() {
    assert!(parse(b"<< /A >>").is_err());
}

#[test]
fn test_dict_key_must_be_name() {
    assert!(parse(b"<< 1 2 >>").is_err());
}

#[test]
fn test_unterminated_containers_are_errors() {
    assert!(parse(b"[1 2").is_err());
    assert!(parse(b"<< /A 1").is_err());
    assert!(parse(b"]").is_err());
    assert!(parse(b">>").is_err());
}

// === Indirect references ===

#[test]
fn test_ref_collapsing_in_array() {
    // `12 0 R` collapses into one element, not three
    let obj = parse(b"[12 0 R]").unwrap();
    let arr = obj.as_array().unwrap();
    assert_eq!(arr.len(), 1);
    let r = arr[0].as_objref().unwrap();
    assert_eq!((r.objid, r.genno), (12, 0));
}

#[test]
fn test_ref_collapsing_at_top_level() {
    let obj = parse(b"12 0 R").unwrap();
    let r = obj.as_objref().unwrap();
    assert_eq!((r.objid, r.genno), (12, 0));
}

#[test]
fn test_multiple_refs() {
    let obj = parse(b"[ 1 0 R 2 0 R 3 1 R ]").unwrap();
    let arr = obj.as_array().unwrap();
    assert_eq!(arr.len(), 3);
    assert_eq!(arr[2].as_objref().unwrap().genno, 1);
}

#[test]
fn test_ref_mixed_with_plain_integers() {
    let obj = parse(b"[ 5 12 0 R 9 ]").unwrap();
    let arr = obj.as_array().unwrap();
    assert_eq!(arr.len(), 3);
    assert_eq!(arr[0].as_int().unwrap(), 5);
    assert!(matches!(arr[1], PDFObject::Ref(_)));
    assert_eq!(arr[2].as_int().unwrap(), 9);
}

#[test]
fn test_stray_ref_marker_is_error() {
    assert!(parse(b"[1 R]").is_err());
    assert!(parse(b"[(a) 1 R]").is_err());
}

// === Comments and boundaries ===

#[test]
fn test_comments_are_skipped() {
    let obj = parse(b"[1 % a comment\n2]").unwrap();
    let arr = obj.as_array().unwrap();
    assert_eq!(arr.len(), 2);
}

#[test]
fn test_parse_stops_at_unknown_keyword() {
    let data = b"42 endobj".to_vec();
    let mut source = Cursor::new(data);
    let obj = PDFParser::new(&mut source, 9).parse_object().unwrap();
    assert_eq!(obj.as_int().unwrap(), 42);
    // the cursor is left on the keyword's first byte
    assert!(cursor::match_and_consume(&mut source, b"endobj").unwrap());
}

#[test]
fn test_parse_stops_before_stream_keyword() {
    let data = b"<< /Length 5 >>\nstream".to_vec();
    let len = data.len() as u64;
    let mut source = Cursor::new(data);
    let obj = PDFParser::new(&mut source, len).parse_object().unwrap();
    assert!(obj.as_dict().is_ok());
    assert!(cursor::match_and_consume(&mut source, b"stream").unwrap());
}

#[test]
fn test_zero_objects_is_error() {
    assert!(parse(b"").is_err());
    assert!(parse(b"   % just a comment\n").is_err());
    assert!(parse(b"endobj").is_err());
}

#[test]
fn test_multiple_top_level_objects_is_error() {
    assert!(matches!(
        parse(b"1 2"),
        Err(PdfError::SyntaxError(_))
    ));
    assert!(parse(b"(a) (b)").is_err());
}

#[test]
fn test_region_bound_is_respected() {
    // only the first 7 bytes are in the region: "[1 2 3]"
    let data = b"[1 2 3] [4 5 6]".to_vec();
    let mut source = Cursor::new(data);
    let obj = PDFParser::new(&mut source, 7).parse_object().unwrap();
    assert_eq!(obj.as_array().unwrap().len(), 3);
}

#[test]
fn test_realistic_page_dict() {
    let data = b"<< /Type /Page /MediaBox [ 0 0 612 792 ] /Contents 5 0 R /Resources << /Font << /F1 6 0 R >> >> >>";
    let obj = parse(data).unwrap();
    let dict = obj.as_dict().unwrap();
    assert_eq!(dict.get("Type").unwrap().as_name().unwrap(), "Page");
    let media_box = dict.get("MediaBox").unwrap().as_array().unwrap();
    assert_eq!(media_box.len(), 4);
    assert_eq!(media_box[2].as_int().unwrap(), 612);
    assert_eq!(dict.get("Contents").unwrap().as_objref().unwrap().objid, 5);
}
