//! PDF object assembly.
//!
//! Builds exactly one object from the token stream. Container state lives on
//! two parallel explicit stacks (container kind, in-progress items), so
//! nesting depth is input-controlled without any call-stack recursion.

use crate::error::{PdfError, Result};
use crate::model::objects::{PDFObjRef, PDFObject};
use crate::parser::cursor::Source;
use crate::parser::lexer::{Lexer, Token};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Container {
    Array,
    Dict,
}

/// PDF Parser - consumes exactly one object from a bounded source region.
pub struct PDFParser<'a, S: Source> {
    lexer: Lexer<'a, S>,
}

impl<'a, S: Source> PDFParser<'a, S> {
    /// Parse the region `[current position, limit)`.
    pub fn new(source: &'a mut S, limit: u64) -> Self {
        Self {
            lexer: Lexer::new(source, limit),
        }
    }

    /// Current position in the source.
    pub fn tell(&mut self) -> Result<u64> {
        self.lexer.tell()
    }

    /// Consume exactly one object.
    ///
    /// Scanning stops at the region bound or at the first unrecognized
    /// keyword (`stream`, `endobj`, `startxref`, ...), whose first byte the
    /// cursor is left on so the caller can inspect the boundary. Anything
    /// other than exactly one complete value by that point is an error.
    pub fn parse_object(&mut self) -> Result<PDFObject> {
        let mut kinds: Vec<Container> = Vec::new();
        let mut items: Vec<Vec<PDFObject>> = vec![Vec::new()];

        loop {
            let (pos, token) = match self.lexer.next_token()? {
                Some(t) => t,
                None => break,
            };
            match token {
                Token::Int(n) => top(&mut items)?.push(PDFObject::Int(n)),
                Token::Real(n) => top(&mut items)?.push(PDFObject::Real(n)),
                Token::Bool(b) => top(&mut items)?.push(PDFObject::Bool(b)),
                Token::Null => top(&mut items)?.push(PDFObject::Null),
                Token::Name(name) => top(&mut items)?.push(PDFObject::Name(name)),
                Token::String(data, format) => {
                    top(&mut items)?.push(PDFObject::String(data, format));
                }
                Token::ArrayStart => {
                    kinds.push(Container::Array);
                    items.push(Vec::new());
                }
                Token::DictStart => {
                    kinds.push(Container::Dict);
                    items.push(Vec::new());
                }
                Token::ArrayEnd => match kinds.pop() {
                    Some(Container::Array) => {
                        let arr = items
                            .pop()
                            .ok_or_else(|| PdfError::InternalState("item stack underflow".into()))?;
                        top(&mut items)?.push(PDFObject::Array(arr));
                    }
                    _ => {
                        return Err(PdfError::TokenError {
                            pos,
                            msg: "']' without matching '['".into(),
                        });
                    }
                },
                Token::DictEnd => match kinds.pop() {
                    Some(Container::Dict) => {
                        let entries = items
                            .pop()
                            .ok_or_else(|| PdfError::InternalState("item stack underflow".into()))?;
                        let dict = build_dict(pos, entries)?;
                        top(&mut items)?.push(PDFObject::Dict(dict));
                    }
                    _ => {
                        return Err(PdfError::TokenError {
                            pos,
                            msg: "'>>' without matching '<<'".into(),
                        });
                    }
                },
                Token::RefMarker => collapse_reference(pos, top(&mut items)?)?,
                Token::Stop(_) => break,
            }
        }

        if !kinds.is_empty() {
            return Err(PdfError::SyntaxError(
                "unterminated array or dictionary".into(),
            ));
        }
        let mut results = items
            .pop()
            .ok_or_else(|| PdfError::InternalState("item stack underflow".into()))?;
        match results.len() {
            1 => Ok(results.remove(0)),
            0 => Err(PdfError::SyntaxError("expected an object, found none".into())),
            n => Err(PdfError::SyntaxError(format!(
                "expected a single object, found {n}"
            ))),
        }
    }
}

fn top(items: &mut [Vec<PDFObject>]) -> Result<&mut Vec<PDFObject>> {
    items
        .last_mut()
        .ok_or_else(|| PdfError::InternalState("item stack underflow".into()))
}

/// Rewrite `<int> <int> R` at the tail of the current container's pending
/// items into one reference.
///
/// This is a post-token rewrite, not a grammar production: both integers are
/// already pushed as siblings by the time the `R` shows up. It applies in
/// any open container, the top level included.
fn collapse_reference(pos: u64, pending: &mut Vec<PDFObject>) -> Result<()> {
    if let [.., PDFObject::Int(objid), PDFObject::Int(genno)] = pending.as_slice() {
        let (objid, genno) = (*objid, *genno);
        if objid < 0 || genno < 0 || objid > i64::from(u32::MAX) || genno > i64::from(u32::MAX) {
            return Err(PdfError::TokenError {
                pos,
                msg: format!("reference {objid} {genno} R out of range"),
            });
        }
        pending.truncate(pending.len() - 2);
        pending.push(PDFObject::Ref(PDFObjRef::new(objid as u32, genno as u32)));
        return Ok(());
    }
    Err(PdfError::TokenError {
        pos,
        msg: "'R' not preceded by two integers".into(),
    })
}

/// Turn a flat key/value item list into a dictionary. Keys must be names at
/// the even positions, and duplicate keys are rejected.
fn build_dict(pos: u64, entries: Vec<PDFObject>) -> Result<HashMap<String, PDFObject>> {
    if entries.len() % 2 != 0 {
        return Err(PdfError::TokenError {
            pos,
            msg: "dictionary has a key without a value".into(),
        });
    }
    let mut dict = HashMap::with_capacity(entries.len() / 2);
    let mut iter = entries.into_iter();
    while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
        let name = match key {
            PDFObject::Name(name) => name,
            other => {
                return Err(PdfError::TokenError {
                    pos,
                    msg: format!("dictionary key must be a name, got {}", other.type_name()),
                });
            }
        };
        if dict.insert(name.clone(), value).is_some() {
            return Err(PdfError::TokenError {
                pos,
                msg: format!("duplicate dictionary key /{name}"),
            });
        }
    }
    Ok(dict)
}
