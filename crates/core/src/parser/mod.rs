//! PDF object syntax parsing.
//!
//! - `cursor`: byte cursor utilities over a seekable source
//! - `lexer`: token scanner
//! - `pdf_parser`: explicit-stack object assembly

pub mod cursor;
pub mod lexer;
pub mod pdf_parser;

// Re-export main types for convenience
pub use cursor::Source;
pub use lexer::{Lexer, Token};
pub use pdf_parser::PDFParser;
