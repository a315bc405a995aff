//! PDF model types.
//!
//! - `objects` - PDF object types (PDFObject, PDFStream, PDFObjRef)

pub mod objects;

// Re-export main types for convenience
pub use objects::{PDFObjRef, PDFObject, PDFStream, StringFormat};
