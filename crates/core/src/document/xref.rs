//! Cross-reference tables and their two on-file encodings.
//!
//! A PDF carries one cross-reference section per incremental update, each
//! pointing at the previous one through /Prev. Sections come in two
//! mutually-incompatible encodings: the classic `xref` subsection table and
//! the binary cross-reference stream with variable-width packed fields.
//! Both feed the same [`XRefTable`], and the chain is merged newest-first.

use crate::document::stream;
use crate::error::{PdfError, Result};
use crate::model::objects::{PDFObjRef, PDFObject, PDFStream};
use crate::parser::cursor::{self, Source};
use crate::parser::pdf_parser::PDFParser;
use log::debug;
use rustc_hash::FxHashMap;
use std::collections::{HashMap, HashSet};

/// Where an object lives in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjLocation {
    /// Free-standing indirect object at an absolute byte offset.
    Offset(u64),
    /// Packed into a compressed object stream, addressed by position.
    InStream { stream_objid: u32, index: u32 },
}

/// Merged cross-reference table: object identity to location, plus the
/// distinguished Root and Info identities from the newest trailer.
#[derive(Debug, Default)]
pub struct XRefTable {
    locations: FxHashMap<PDFObjRef, ObjLocation>,
    root: Option<PDFObjRef>,
    info: Option<PDFObjRef>,
}

impl XRefTable {
    /// Look up an object's location.
    pub fn get(&self, objref: &PDFObjRef) -> Option<ObjLocation> {
        self.locations.get(objref).copied()
    }

    /// Record a location. Within one table the last record for an identity
    /// wins; across tables precedence is decided by [`XRefTable::merge_under`].
    pub fn insert(&mut self, objref: PDFObjRef, location: ObjLocation) {
        self.locations.insert(objref, location);
    }

    /// Identity of the document catalog, if the trailer named one.
    pub const fn root(&self) -> Option<PDFObjRef> {
        self.root
    }

    /// Identity of the document information dictionary, if any.
    pub const fn info(&self) -> Option<PDFObjRef> {
        self.info
    }

    /// Number of located objects.
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Identities present in the table, in no particular order.
    pub fn objrefs(&self) -> impl Iterator<Item = PDFObjRef> + '_ {
        self.locations.keys().copied()
    }

    /// Layer an older table beneath this one.
    ///
    /// For every identity present in either table the newer entry wins, and
    /// Root/Info stay the newest table's. This models the append-only
    /// incremental-update semantics: later writes shadow earlier ones.
    pub fn merge_under(&mut self, older: XRefTable) {
        for (objref, location) in older.locations {
            self.locations.entry(objref).or_insert(location);
        }
    }
}

/// One parsed section plus the chain pointers from its trailer.
struct XRefSection {
    table: XRefTable,
    prev: Option<u64>,
    xref_stm: Option<u64>,
}

/// Load and merge the whole cross-reference chain starting at `start`.
pub fn load_xref_chain<S: Source>(source: &mut S, size: u64, start: u64) -> Result<XRefTable> {
    let mut visited: HashSet<u64> = HashSet::new();
    let mut merged: Option<XRefTable> = None;
    let mut next = Some(start);

    while let Some(pos) = next {
        if !visited.insert(pos) {
            debug!("xref chain loops back to offset {pos}, stopping");
            break;
        }
        let section = load_xref_at(source, size, pos)?;
        debug!("xref section at {pos}: {} entries", section.table.len());

        // Hybrid-reference files: a classic table may name a companion xref
        // stream whose entries rank below it but above /Prev.
        let mut table = section.table;
        if let Some(stm_pos) = section.xref_stm
            && visited.insert(stm_pos)
        {
            let stm_section = load_xref_at(source, size, stm_pos)?;
            table.merge_under(stm_section.table);
        }

        merged = Some(match merged {
            None => table,
            Some(mut newer) => {
                newer.merge_under(table);
                newer
            }
        });
        next = section.prev;
    }

    merged.ok_or(PdfError::NoValidXRef)
}

/// Parse whichever encoding sits at `pos`: `x` starts a classic table, a
/// digit starts the indirect-object header of a cross-reference stream, and
/// `<` opens a cross-reference stream dictionary directly.
fn load_xref_at<S: Source>(source: &mut S, size: u64, pos: u64) -> Result<XRefSection> {
    cursor::seek_to(source, pos)?;
    cursor::skip_whitespace(source)?;
    match cursor::peek_byte(source)? {
        Some(b'x') => load_xref_table(source, size),
        Some(b'<') => load_xref_stream(source, size),
        Some(b) if b.is_ascii_digit() => {
            skip_indirect_header(source)?;
            load_xref_stream(source, size)
        }
        Some(b) => Err(PdfError::SyntaxError(format!(
            "unrecognized xref section at offset {pos} (byte {b:#04x})"
        ))),
        None => Err(PdfError::UnexpectedEof),
    }
}

/// Skip `<num> <gen> obj` in front of a cross-reference stream.
fn skip_indirect_header<S: Source>(source: &mut S) -> Result<()> {
    cursor::read_unsigned_int(source)?;
    cursor::skip_whitespace(source)?;
    cursor::read_unsigned_int(source)?;
    cursor::skip_whitespace(source)?;
    if !cursor::match_and_consume(source, b"obj")? {
        return Err(PdfError::SyntaxError(
            "expected 'obj' before cross-reference stream".into(),
        ));
    }
    cursor::skip_whitespace(source)?;
    Ok(())
}

/// Classic table: repeated `<first> <count>` subsection headers, each
/// followed by `count` records of offset, generation and an n/f marker.
/// Only in-use (`n`) records are added. Ends at `trailer` plus a tokenized
/// trailer dictionary.
fn load_xref_table<S: Source>(source: &mut S, size: u64) -> Result<XRefSection> {
    if !cursor::match_and_consume(source, b"xref")? {
        return Err(PdfError::SyntaxError("expected 'xref' keyword".into()));
    }
    let mut table = XRefTable::default();

    loop {
        cursor::skip_whitespace(source)?;
        if cursor::match_and_consume(source, b"trailer")? {
            break;
        }
        let first = cursor::read_unsigned_int(source)?;
        cursor::skip_whitespace(source)?;
        let count = cursor::read_unsigned_int(source)?;

        for i in 0..count {
            cursor::skip_whitespace(source)?;
            let offset = cursor::read_unsigned_int(source)?;
            cursor::skip_whitespace(source)?;
            let genno = cursor::read_unsigned_int(source)?;
            cursor::skip_whitespace(source)?;
            let marker = cursor::read_byte(source)?.ok_or(PdfError::UnexpectedEof)?;
            match marker {
                b'n' => {
                    let objid = u32::try_from(first + i).map_err(|_| {
                        PdfError::SyntaxError(format!("object number {} out of range", first + i))
                    })?;
                    table.insert(
                        PDFObjRef::new(objid, genno as u32),
                        ObjLocation::Offset(offset),
                    );
                }
                b'f' => {}
                other => {
                    return Err(PdfError::SyntaxError(format!(
                        "invalid xref entry marker {:?}",
                        other as char
                    )));
                }
            }
        }
    }

    cursor::skip_whitespace(source)?;
    let trailer = PDFParser::new(source, size).parse_object()?;
    let trailer = match trailer {
        PDFObject::Dict(dict) => dict,
        other => {
            return Err(PdfError::SyntaxError(format!(
                "trailer must be a dictionary, got {}",
                other.type_name()
            )));
        }
    };
    section_from_trailer(table, &trailer)
}

/// Cross-reference stream: a stream object whose decoded bytes hold packed
/// rows of `/W`-sized big-endian fields, covering the `/Index` subsections.
fn load_xref_stream<S: Source>(source: &mut S, size: u64) -> Result<XRefSection> {
    let dict = match PDFParser::new(source, size).parse_object()? {
        PDFObject::Dict(dict) => dict,
        other => {
            return Err(PdfError::SyntaxError(format!(
                "cross-reference stream must start with a dictionary, got {}",
                other.type_name()
            )));
        }
    };
    if !cursor::match_and_consume(source, b"stream")? {
        return Err(PdfError::SyntaxError(
            "cross-reference stream dictionary not followed by 'stream'".into(),
        ));
    }
    // /Length must be direct: there is no resolver yet while bootstrapping.
    let length = match dict.get("Length") {
        Some(PDFObject::Int(n)) if *n >= 0 => *n as u64,
        Some(PDFObject::Ref(_)) => {
            return Err(PdfError::SyntaxError(
                "indirect /Length in cross-reference stream".into(),
            ));
        }
        _ => {
            return Err(PdfError::SyntaxError(
                "cross-reference stream missing /Length".into(),
            ));
        }
    };
    let raw = stream::read_stream_body(source, length)?;
    let stm = stream::build_stream(dict, raw, true)?;
    parse_xref_stream_data(&stm)
}

fn parse_xref_stream_data(stm: &PDFStream) -> Result<XRefSection> {
    let widths = stm
        .get("W")
        .ok_or_else(|| PdfError::SyntaxError("cross-reference stream missing /W".into()))?
        .as_array()?;
    if widths.len() != 3 {
        return Err(PdfError::SyntaxError(
            "/W must have exactly 3 elements".into(),
        ));
    }
    let w0 = field_width(&widths[0])?;
    let w1 = field_width(&widths[1])?;
    let w2 = field_width(&widths[2])?;
    let entry_size = w0 + w1 + w2;
    if entry_size == 0 {
        return Err(PdfError::SyntaxError("/W declares zero-size entries".into()));
    }

    let size = stm
        .get("Size")
        .ok_or_else(|| PdfError::SyntaxError("cross-reference stream missing /Size".into()))?
        .as_int()?;
    if size < 0 {
        return Err(PdfError::SyntaxError("/Size must be non-negative".into()));
    }

    // /Index defaults to one subsection covering object 0 through Size-1.
    let index: Vec<(u64, u64)> = match stm.get("Index") {
        Some(obj) => {
            let arr = obj.as_array()?;
            if arr.is_empty() || arr.len() % 2 != 0 {
                return Err(PdfError::SyntaxError(
                    "/Index must hold (first, count) pairs".into(),
                ));
            }
            arr.chunks(2)
                .map(|pair| {
                    let first = pair[0].as_int()?;
                    let count = pair[1].as_int()?;
                    if first < 0 || count < 0 {
                        return Err(PdfError::SyntaxError(
                            "/Index entries must be non-negative".into(),
                        ));
                    }
                    Ok((first as u64, count as u64))
                })
                .collect::<Result<_>>()?
        }
        None => vec![(0, size as u64)],
    };

    let data = stm.data();
    let mut table = XRefTable::default();
    let mut pos = 0usize;
    for (first, count) in index {
        for i in 0..count {
            if pos + entry_size > data.len() {
                return Err(PdfError::SyntaxError(
                    "cross-reference stream data shorter than /Index declares".into(),
                ));
            }
            // a zero-width type field implies type 1 (in use)
            let entry_type = if w0 == 0 {
                1
            } else {
                unpack_be(&data[pos..pos + w0])
            };
            let field2 = unpack_be(&data[pos + w0..pos + w0 + w1]);
            let field3 = unpack_be(&data[pos + w0 + w1..pos + entry_size]);
            pos += entry_size;

            let objid = u32::try_from(first + i).map_err(|_| {
                PdfError::SyntaxError(format!("object number {} out of range", first + i))
            })?;
            match entry_type {
                0 => {}
                1 => table.insert(
                    PDFObjRef::new(objid, field3 as u32),
                    ObjLocation::Offset(field2),
                ),
                2 => table.insert(
                    PDFObjRef::new(objid, 0),
                    ObjLocation::InStream {
                        stream_objid: field2 as u32,
                        index: field3 as u32,
                    },
                ),
                other => {
                    return Err(PdfError::SyntaxError(format!(
                        "invalid cross-reference entry type {other}"
                    )));
                }
            }
        }
    }
    section_from_trailer(table, &stm.attrs)
}

/// Pull Root/Info/Prev (and XRefStm for hybrid files) out of a trailer
/// dictionary. The stream encoding keeps its trailer keys in the stream
/// dictionary itself.
fn section_from_trailer(
    mut table: XRefTable,
    trailer: &HashMap<String, PDFObject>,
) -> Result<XRefSection> {
    table.root = match trailer.get("Root") {
        Some(PDFObject::Ref(r)) => Some(*r),
        Some(other) => {
            return Err(PdfError::SyntaxError(format!(
                "trailer /Root must be a reference, got {}",
                other.type_name()
            )));
        }
        None => None,
    };
    table.info = match trailer.get("Info") {
        Some(PDFObject::Ref(r)) => Some(*r),
        Some(other) => {
            return Err(PdfError::SyntaxError(format!(
                "trailer /Info must be a reference, got {}",
                other.type_name()
            )));
        }
        None => None,
    };
    let prev = trailer_offset(trailer.get("Prev"), "/Prev")?;
    let xref_stm = trailer_offset(trailer.get("XRefStm"), "/XRefStm")?;
    Ok(XRefSection {
        table,
        prev,
        xref_stm,
    })
}

fn trailer_offset(obj: Option<&PDFObject>, what: &str) -> Result<Option<u64>> {
    match obj {
        None => Ok(None),
        Some(PDFObject::Int(n)) if *n >= 0 => Ok(Some(*n as u64)),
        Some(other) => Err(PdfError::SyntaxError(format!(
            "trailer {what} must be a non-negative integer, got {}",
            other.type_name()
        ))),
    }
}

fn field_width(obj: &PDFObject) -> Result<usize> {
    let n = obj.as_int()?;
    if !(0..=8).contains(&n) {
        return Err(PdfError::SyntaxError(format!("invalid /W field width {n}")));
    }
    Ok(n as usize)
}

/// Big-endian unsigned integer of arbitrary (small) width. An empty slice
/// decodes to 0, the implied value of a zero-width field.
fn unpack_be(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}
