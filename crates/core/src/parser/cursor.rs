//! Byte cursor utilities over a seekable byte source.
//!
//! Every reader in this crate goes through these helpers, so position
//! handling stays in one place: the xref locators scan headers with them,
//! and the lexer builds its token rules on the same byte classes.

use crate::error::{PdfError, Result};
use std::io::{Read, Seek, SeekFrom};

/// A random-access byte source.
///
/// Blanket-implemented for anything readable and seekable, which covers
/// `File`, `BufReader<File>` and in-memory cursors alike.
pub trait Source: Read + Seek {}

impl<T: Read + Seek> Source for T {}

/// PDF whitespace: NUL, tab, LF, FF, CR, space.
pub const fn is_whitespace(b: u8) -> bool {
    matches!(b, b'\x00' | b'\t' | b'\n' | b'\x0c' | b'\r' | b' ')
}

/// PDF delimiter bytes.
pub const fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

/// Current absolute position.
pub fn tell<S: Source>(source: &mut S) -> Result<u64> {
    Ok(source.stream_position()?)
}

/// Seek to an absolute position.
pub fn seek_to<S: Source>(source: &mut S, pos: u64) -> Result<()> {
    source.seek(SeekFrom::Start(pos))?;
    Ok(())
}

/// Read one byte, or `None` at end of input.
pub fn read_byte<S: Source>(source: &mut S) -> Result<Option<u8>> {
    let mut buf = [0u8; 1];
    match source.read(&mut buf)? {
        0 => Ok(None),
        _ => Ok(Some(buf[0])),
    }
}

/// Peek one byte without advancing.
pub fn peek_byte<S: Source>(source: &mut S) -> Result<Option<u8>> {
    match read_byte(source)? {
        Some(b) => {
            source.seek(SeekFrom::Current(-1))?;
            Ok(Some(b))
        }
        None => Ok(None),
    }
}

/// Advance past PDF whitespace, leaving the cursor at the first
/// non-whitespace byte (or end of input).
pub fn skip_whitespace<S: Source>(source: &mut S) -> Result<()> {
    loop {
        match read_byte(source)? {
            Some(b) if is_whitespace(b) => {}
            Some(_) => {
                source.seek(SeekFrom::Current(-1))?;
                return Ok(());
            }
            None => return Ok(()),
        }
    }
}

/// Check whether the next bytes equal `literal`, without consuming them.
/// The position is restored regardless of the outcome.
pub fn match_literal<S: Source>(source: &mut S, literal: &[u8]) -> Result<bool> {
    let pos = tell(source)?;
    let mut buf = vec![0u8; literal.len()];
    let matched = match source.read_exact(&mut buf) {
        Ok(()) => buf == literal,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => false,
        Err(e) => return Err(e.into()),
    };
    seek_to(source, pos)?;
    Ok(matched)
}

/// Consume `literal` if the next bytes match it.
///
/// Callers must not rely on the position after a failed match.
pub fn match_and_consume<S: Source>(source: &mut S, literal: &[u8]) -> Result<bool> {
    if match_literal(source, literal)? {
        source.seek(SeekFrom::Current(literal.len() as i64))?;
        Ok(true)
    } else {
        Ok(false)
    }
}

/// Accumulate ASCII digits into an unsigned integer, leaving the cursor on
/// the first non-digit byte. Fails if no digit was consumed.
pub fn read_unsigned_int<S: Source>(source: &mut S) -> Result<u64> {
    let start = tell(source)?;
    let mut value: u64 = 0;
    let mut digits = 0u32;
    loop {
        match read_byte(source)? {
            Some(b) if b.is_ascii_digit() => {
                value = value
                    .checked_mul(10)
                    .and_then(|v| v.checked_add(u64::from(b - b'0')))
                    .ok_or_else(|| PdfError::TokenError {
                        pos: start,
                        msg: "integer overflow".into(),
                    })?;
                digits += 1;
            }
            Some(_) => {
                source.seek(SeekFrom::Current(-1))?;
                break;
            }
            None => break,
        }
    }
    if digits == 0 {
        return Err(PdfError::TokenError {
            pos: start,
            msg: "expected unsigned integer".into(),
        });
    }
    Ok(value)
}

/// Accumulate ASCII digits, with an optional leading sign, into a signed
/// integer.
pub fn read_signed_long<S: Source>(source: &mut S) -> Result<i64> {
    let mut negative = false;
    match peek_byte(source)? {
        Some(b'+') => {
            read_byte(source)?;
        }
        Some(b'-') => {
            negative = true;
            read_byte(source)?;
        }
        _ => {}
    }
    let value = read_unsigned_int(source)? as i64;
    Ok(if negative { -value } else { value })
}

/// Scan backward from the current position, within at most `window` bytes,
/// for the last occurrence of `needle`.
///
/// On success the cursor is left immediately after the match; otherwise it
/// is restored.
pub fn find_reverse<S: Source>(source: &mut S, needle: &[u8], window: u64) -> Result<bool> {
    let end = tell(source)?;
    let start = end.saturating_sub(window);
    let mut buf = vec![0u8; (end - start) as usize];
    seek_to(source, start)?;
    source.read_exact(&mut buf)?;
    if buf.len() >= needle.len() {
        for pos in (0..=buf.len() - needle.len()).rev() {
            if &buf[pos..pos + needle.len()] == needle {
                seek_to(source, start + (pos + needle.len()) as u64)?;
                return Ok(true);
            }
        }
    }
    seek_to(source, end)?;
    Ok(false)
}
