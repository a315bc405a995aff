//! Stream body extraction and filter decoding.
//!
//! Supported filter chain: FlateDecode, optionally followed by PNG predictor
//! reconstruction per /DecodeParms. Any other declared filter is a hard
//! error rather than a pass-through.

use crate::error::{PdfError, Result};
use crate::model::objects::{PDFObject, PDFStream};
use crate::parser::cursor::{self, Source};
use bytes::Bytes;
use std::collections::HashMap;
use std::io::Read;

/// Read a stream body of exactly `length` bytes.
///
/// The cursor must sit immediately after the `stream` keyword: the format
/// allows a single optional CR there, then requires a LF, then the data.
/// Short reads are fatal, never truncated.
pub(crate) fn read_stream_body<S: Source>(source: &mut S, length: u64) -> Result<Bytes> {
    let mut b = cursor::read_byte(source)?.ok_or(PdfError::UnexpectedEof)?;
    if b == b'\r' {
        b = cursor::read_byte(source)?.ok_or(PdfError::UnexpectedEof)?;
    }
    if b != b'\n' {
        return Err(PdfError::SyntaxError(
            "'stream' keyword not followed by a newline".into(),
        ));
    }
    let mut buf = vec![0u8; length as usize];
    source.read_exact(&mut buf).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => PdfError::UnexpectedEof,
        _ => PdfError::Io(e),
    })?;
    Ok(Bytes::from(buf))
}

/// Assemble a stream object from its dictionary and raw body.
///
/// With `decode` unset the body is kept untouched (bootstrap-style scanning
/// of cross-reference and object streams). Otherwise the declared filter
/// chain is applied and /Filter and /DecodeParms are dropped from the
/// dictionary, since they describe an encoding the buffer no longer has.
pub fn build_stream(
    mut attrs: HashMap<String, PDFObject>,
    raw: Bytes,
    decode: bool,
) -> Result<PDFStream> {
    if !decode || !attrs.contains_key("Filter") {
        return Ok(PDFStream::new(attrs, raw));
    }
    let decoded = apply_filters(&attrs, &raw)?;
    attrs.remove("Filter");
    attrs.remove("DecodeParms");
    Ok(PDFStream::new(attrs, decoded))
}

fn apply_filters(attrs: &HashMap<String, PDFObject>, data: &[u8]) -> Result<Vec<u8>> {
    let filter = attrs
        .get("Filter")
        .ok_or_else(|| PdfError::InternalState("apply_filters without /Filter".into()))?;
    let name = match filter {
        PDFObject::Name(name) => name.as_str(),
        PDFObject::Array(arr) if arr.len() == 1 => arr[0].as_name()?,
        PDFObject::Array(arr) => {
            return Err(PdfError::UnsupportedFilter(format!(
                "filter chain of length {}",
                arr.len()
            )));
        }
        other => {
            return Err(PdfError::SyntaxError(format!(
                "/Filter must be a name, got {}",
                other.type_name()
            )));
        }
    };
    if name != "FlateDecode" {
        return Err(PdfError::UnsupportedFilter(name.to_string()));
    }

    let mut decoded = Vec::new();
    flate2::read::ZlibDecoder::new(data)
        .read_to_end(&mut decoded)
        .map_err(|e| PdfError::SyntaxError(format!("corrupt FlateDecode stream: {e}")))?;

    let Some(parms) = decode_parms(attrs)? else {
        return Ok(decoded);
    };
    let predictor = int_parm(parms.get("Predictor"), 1)?;
    match predictor {
        1 => Ok(decoded),
        10..=15 => {
            let columns = int_parm(parms.get("Columns"), 1)?;
            let colors = int_parm(parms.get("Colors"), 1)?;
            let bits = int_parm(parms.get("BitsPerComponent"), 8)?;
            apply_png_predictor(&decoded, columns as usize, colors as usize, bits as usize)
        }
        other => Err(PdfError::UnsupportedFilter(format!("predictor {other}"))),
    }
}

fn decode_parms(attrs: &HashMap<String, PDFObject>) -> Result<Option<&HashMap<String, PDFObject>>> {
    match attrs.get("DecodeParms") {
        None | Some(PDFObject::Null) => Ok(None),
        Some(PDFObject::Dict(dict)) => Ok(Some(dict)),
        Some(PDFObject::Array(arr)) if arr.len() == 1 => match &arr[0] {
            PDFObject::Dict(dict) => Ok(Some(dict)),
            PDFObject::Null => Ok(None),
            other => Err(PdfError::SyntaxError(format!(
                "/DecodeParms entry must be a dictionary, got {}",
                other.type_name()
            ))),
        },
        Some(other) => Err(PdfError::SyntaxError(format!(
            "/DecodeParms must be a dictionary, got {}",
            other.type_name()
        ))),
    }
}

fn int_parm(obj: Option<&PDFObject>, default: i64) -> Result<i64> {
    match obj {
        None => Ok(default),
        Some(PDFObject::Int(n)) if *n >= 0 => Ok(*n),
        Some(other) => Err(PdfError::SyntaxError(format!(
            "decode parameter must be a non-negative integer, got {}",
            other.type_name()
        ))),
    }
}

/// Reverse PNG row prediction. Each row carries a leading filter-type byte;
/// reconstruction is row-by-row against the previous reconstructed row.
fn apply_png_predictor(
    data: &[u8],
    columns: usize,
    colors: usize,
    bits_per_component: usize,
) -> Result<Vec<u8>> {
    let row_bytes = columns * colors * bits_per_component / 8;
    if row_bytes == 0 {
        return Err(PdfError::SyntaxError("predictor row width is zero".into()));
    }
    let bpp = std::cmp::max(1, colors * bits_per_component / 8); // bytes per pixel
    let row_size = row_bytes + 1; // +1 for the filter byte
    if data.len() % row_size != 0 {
        return Err(PdfError::SyntaxError(
            "predicted data is not a whole number of rows".into(),
        ));
    }

    let mut result = Vec::with_capacity(data.len());
    let mut prev_row = vec![0u8; row_bytes];

    for row in data.chunks(row_size) {
        let filter_type = row[0];
        let row_data = &row[1..];
        let mut current_row = vec![0u8; row_bytes];

        match filter_type {
            0 => {
                // None
                current_row.copy_from_slice(row_data);
            }
            1 => {
                // Sub - each byte depends on the byte to the left
                for i in 0..row_bytes {
                    let left = if i >= bpp { current_row[i - bpp] } else { 0 };
                    current_row[i] = row_data[i].wrapping_add(left);
                }
            }
            2 => {
                // Up - each byte depends on the byte above
                for i in 0..row_bytes {
                    current_row[i] = row_data[i].wrapping_add(prev_row[i]);
                }
            }
            3 => {
                // Average of left and above
                for i in 0..row_bytes {
                    let left = if i >= bpp {
                        u16::from(current_row[i - bpp])
                    } else {
                        0
                    };
                    let above = u16::from(prev_row[i]);
                    current_row[i] = row_data[i].wrapping_add(((left + above) / 2) as u8);
                }
            }
            4 => {
                // Paeth
                for i in 0..row_bytes {
                    let left = if i >= bpp { current_row[i - bpp] } else { 0 };
                    let above = prev_row[i];
                    let upper_left = if i >= bpp { prev_row[i - bpp] } else { 0 };
                    let paeth = paeth_predictor(left, above, upper_left);
                    current_row[i] = row_data[i].wrapping_add(paeth);
                }
            }
            other => {
                return Err(PdfError::SyntaxError(format!(
                    "unknown PNG predictor row filter {other}"
                )));
            }
        }

        result.extend_from_slice(&current_row);
        prev_row = current_row;
    }

    Ok(result)
}

/// Paeth predictor function used in PNG filtering.
const fn paeth_predictor(left: u8, above: u8, upper_left: u8) -> u8 {
    let a = left as i32;
    let b = above as i32;
    let c = upper_left as i32;
    let p = a + b - c;
    let pa = (p - a).abs();
    let pb = (p - b).abs();
    let pc = (p - c).abs();

    if pa <= pb && pa <= pc {
        left
    } else if pb <= pc {
        above
    } else {
        upper_left
    }
}
