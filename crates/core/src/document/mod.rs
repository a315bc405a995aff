//! PDF document structure.
//!
//! - `xref` - cross-reference tables and their two on-file encodings
//! - `stream` - stream body extraction and filter decoding
//! - `catalog` - the open document: trailer discovery, object resolution, cache (PDFDocument)
//! - `page` - page tree flattening and page-derived views
//! - `acroform` - interactive form field flattening

pub mod acroform;
pub mod catalog;
pub mod page;
pub mod stream;
pub mod xref;

// Re-export main types for convenience
pub use catalog::PDFDocument;
pub use xref::{ObjLocation, XRefTable};
