//! miranda - PDF document object resolution library.
//!
//! Turns a seekable byte source containing a PDF file into a lazily
//! resolved, memoized graph of typed objects: object tokenizing,
//! cross-reference chain merging across incremental updates, compressed
//! object streams, and deflate stream decoding.

pub mod document;
pub mod error;
pub mod model;
pub mod parser;

pub use document::catalog::PDFDocument;
pub use document::stream::build_stream;
pub use document::xref::{ObjLocation, XRefTable, load_xref_chain};
pub use error::{PdfError, Result};
pub use model::objects::{PDFObjRef, PDFObject, PDFStream, StringFormat};
pub use parser::cursor::Source;
pub use parser::pdf_parser::PDFParser;
