//! PDF document - trailer discovery, the object resolver, and its cache.

use crate::document::stream;
use crate::document::xref::{self, ObjLocation, XRefTable};
use crate::error::{PdfError, Result};
use crate::model::objects::{PDFObjRef, PDFObject};
use crate::parser::cursor::{self, Source};
use crate::parser::pdf_parser::PDFParser;
use log::debug;
use rustc_hash::FxHashMap;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, SeekFrom};
use std::path::Path;
use std::sync::Arc;

/// The startxref keyword must sit within this many bytes of end of file.
const STARTXREF_WINDOW: u64 = 1024;

/// An open PDF document.
///
/// Owns the byte source, the merged cross-reference table, and the object
/// cache. Resolution takes `&mut self`: reading an object moves the shared
/// cursor and fills the cache, so one document must not be used from several
/// threads without external serialization. Independently opened documents
/// are unrelated and safe to use concurrently.
///
/// The cache is unbounded and lives as long as the document: every identity
/// is read and parsed at most once.
pub struct PDFDocument<S: Source> {
    source: S,
    size: u64,
    xref: XRefTable,
    cache: FxHashMap<PDFObjRef, Arc<PDFObject>>,
    resolving: HashSet<PDFObjRef>,
}

impl PDFDocument<BufReader<File>> {
    /// Open a document from a file path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file))
    }
}

impl<S: Source> PDFDocument<S> {
    /// Open a document over any seekable byte source.
    pub fn new(mut source: S) -> Result<Self> {
        let size = source.seek(SeekFrom::End(0))?;
        let start = Self::find_startxref(&mut source, size)?;
        debug!("startxref points at offset {start}");
        let xref = xref::load_xref_chain(&mut source, size, start)?;
        debug!("merged cross-reference table holds {} objects", xref.len());
        Ok(Self {
            source,
            size,
            xref,
            cache: FxHashMap::default(),
            resolving: HashSet::new(),
        })
    }

    /// Locate the cross-reference start offset near the end of the file:
    /// the `startxref` keyword within the last 1024 bytes, the offset
    /// integer, whitespace, then the `%%EOF` marker.
    fn find_startxref(source: &mut S, size: u64) -> Result<u64> {
        cursor::seek_to(source, size)?;
        if !cursor::find_reverse(source, b"startxref", STARTXREF_WINDOW)? {
            return Err(PdfError::NoValidXRef);
        }
        cursor::skip_whitespace(source)?;
        let start = cursor::read_unsigned_int(source).map_err(|_| PdfError::NoValidXRef)?;
        cursor::skip_whitespace(source)?;
        if !cursor::match_and_consume(source, b"%%EOF")? {
            return Err(PdfError::NoValidXRef);
        }
        Ok(start)
    }

    /// Size of the underlying file in bytes.
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// The merged cross-reference table.
    pub const fn xref(&self) -> &XRefTable {
        &self.xref
    }

    /// Identity of the document catalog, from the newest trailer.
    pub fn root(&self) -> Result<PDFObjRef> {
        self.xref
            .root()
            .ok_or_else(|| PdfError::SyntaxError("trailer has no /Root entry".into()))
    }

    /// Identity of the document information dictionary, if any.
    pub fn info_ref(&self) -> Option<PDFObjRef> {
        self.xref.info()
    }

    /// Resolve and return the document catalog dictionary.
    pub fn catalog(&mut self) -> Result<Arc<PDFObject>> {
        let root = self.root()?;
        let obj = self.getobj(root)?;
        if obj.as_dict().is_err() {
            return Err(PdfError::SyntaxError(
                "document /Root is not a dictionary".into(),
            ));
        }
        Ok(obj)
    }

    /// Resolve the document information dictionary, when present.
    pub fn info(&mut self) -> Result<Option<Arc<PDFObject>>> {
        match self.xref.info() {
            Some(r) => Ok(Some(self.getobj(r)?)),
            None => Ok(None),
        }
    }

    /// Get an object by identity, parsing and caching it on first use.
    ///
    /// Repeated calls for the same identity return the same instance and
    /// perform no further reads.
    pub fn getobj(&mut self, objref: PDFObjRef) -> Result<Arc<PDFObject>> {
        if let Some(obj) = self.cache.get(&objref) {
            return Ok(Arc::clone(obj));
        }
        let location = self
            .xref
            .get(&objref)
            .ok_or(PdfError::ObjectNotFound(objref.objid))?;
        if !self.resolving.insert(objref) {
            return Err(PdfError::SyntaxError(format!(
                "circular resolution of object {objref}"
            )));
        }
        let parsed = match location {
            ObjLocation::Offset(offset) => self.load_object_at(offset),
            ObjLocation::InStream {
                stream_objid,
                index,
            } => self.load_compressed_object(stream_objid, index),
        };
        self.resolving.remove(&objref);
        let obj = Arc::new(parsed?);
        self.cache.insert(objref, Arc::clone(&obj));
        Ok(obj)
    }

    /// Follow reference chains until a non-reference value.
    pub fn resolve(&mut self, obj: &PDFObject) -> Result<Arc<PDFObject>> {
        let mut seen = HashSet::new();
        let mut current = match obj {
            PDFObject::Ref(r) => {
                seen.insert(*r);
                self.getobj(*r)?
            }
            other => return Ok(Arc::new(other.clone())),
        };
        loop {
            match current.as_ref() {
                PDFObject::Ref(r) => {
                    if !seen.insert(*r) {
                        return Err(PdfError::SyntaxError(format!(
                            "circular reference chain through {r}"
                        )));
                    }
                    current = self.getobj(*r)?;
                }
                _ => return Ok(current),
            }
        }
    }

    /// Parse a free-standing indirect object at a byte offset.
    fn load_object_at(&mut self, offset: u64) -> Result<PDFObject> {
        if offset >= self.size {
            return Err(PdfError::SyntaxError(format!(
                "object offset {offset} exceeds file size {}",
                self.size
            )));
        }
        cursor::seek_to(&mut self.source, offset)?;
        cursor::skip_whitespace(&mut self.source)?;
        cursor::read_unsigned_int(&mut self.source)?;
        cursor::skip_whitespace(&mut self.source)?;
        cursor::read_unsigned_int(&mut self.source)?;
        cursor::skip_whitespace(&mut self.source)?;
        if !cursor::match_and_consume(&mut self.source, b"obj")? {
            return Err(PdfError::SyntaxError(format!(
                "expected 'obj' keyword at offset {offset}"
            )));
        }

        let obj = PDFParser::new(&mut self.source, self.size).parse_object()?;

        // a dictionary followed by the stream keyword is a stream object
        match obj {
            PDFObject::Dict(dict) => {
                if cursor::match_and_consume(&mut self.source, b"stream")? {
                    let length = self.stream_length(&dict)?;
                    let raw = stream::read_stream_body(&mut self.source, length)?;
                    let built = stream::build_stream(dict, raw, true)?;
                    Ok(PDFObject::Stream(Box::new(built)))
                } else {
                    Ok(PDFObject::Dict(dict))
                }
            }
            other => Ok(other),
        }
    }

    /// Resolve a stream dictionary's /Length, which may itself be an
    /// indirect reference. The nested resolution moves the cursor, so the
    /// caller's read position is saved and restored around it.
    fn stream_length(&mut self, dict: &HashMap<String, PDFObject>) -> Result<u64> {
        let length = dict
            .get("Length")
            .ok_or_else(|| PdfError::SyntaxError("stream dictionary missing /Length".into()))?;
        let length = match length {
            PDFObject::Ref(r) => {
                let pos = cursor::tell(&mut self.source)?;
                let resolved = self.getobj(*r)?;
                cursor::seek_to(&mut self.source, pos)?;
                resolved.as_int()?
            }
            other => other.as_int()?,
        };
        if length < 0 {
            return Err(PdfError::SyntaxError(format!(
                "negative stream /Length {length}"
            )));
        }
        Ok(length as u64)
    }

    /// Parse an object packed inside a compressed object stream.
    ///
    /// The container is resolved as an ordinary cached stream first, so
    /// repeated lookups in the same container pay the decode cost once. Its
    /// decoded bytes start with N (objnum, offset) pairs; the requested
    /// index selects the half-open byte range between its offset and the
    /// next one (or end of buffer for the last entry).
    fn load_compressed_object(&mut self, stream_objid: u32, index: u32) -> Result<PDFObject> {
        let container_ref = PDFObjRef::new(stream_objid, 0);
        if let Some(ObjLocation::InStream { .. }) = self.xref.get(&container_ref) {
            return Err(PdfError::SyntaxError(format!(
                "object stream {stream_objid} is itself stored compressed"
            )));
        }
        let container = self.getobj(container_ref)?;
        let stm = container.as_stream()?;

        let n = stream_uint(&stm.attrs, "N")?;
        let first = stream_uint(&stm.attrs, "First")? as usize;
        let data = stm.data();
        if first > data.len() {
            return Err(PdfError::SyntaxError(
                "/First beyond end of object stream".into(),
            ));
        }

        let mut header = std::io::Cursor::new(&data[..first]);
        let mut offsets = Vec::with_capacity(n as usize);
        for _ in 0..n {
            cursor::skip_whitespace(&mut header)?;
            cursor::read_unsigned_int(&mut header)?; // sub-object number
            cursor::skip_whitespace(&mut header)?;
            offsets.push(cursor::read_unsigned_int(&mut header)? as usize);
        }

        let index = index as usize;
        if index >= offsets.len() {
            return Err(PdfError::SyntaxError(format!(
                "object stream index {index} out of range (N = {n})"
            )));
        }
        let start = first + offsets[index];
        let end = if index + 1 < offsets.len() {
            first + offsets[index + 1]
        } else {
            data.len()
        };
        if start > end || end > data.len() {
            return Err(PdfError::SyntaxError(
                "object stream offsets out of order".into(),
            ));
        }

        let mut body = std::io::Cursor::new(data);
        cursor::seek_to(&mut body, start as u64)?;
        PDFParser::new(&mut body, end as u64).parse_object()
    }
}

fn stream_uint(dict: &HashMap<String, PDFObject>, key: &str) -> Result<u64> {
    let value = dict
        .get(key)
        .ok_or_else(|| PdfError::SyntaxError(format!("object stream missing /{key}")))?
        .as_int()?;
    if value < 0 {
        return Err(PdfError::SyntaxError(format!(
            "object stream /{key} must be non-negative"
        )));
    }
    Ok(value as u64)
}
