//! dumppdf - dump the internal object structure of a PDF file.
//!
//! A command line companion for the miranda resolver: prints the trailer
//! summary, individual objects, the flattened page list, or the interactive
//! form fields.

use clap::Parser;
use log::warn;
use miranda_core::error::Result;
use miranda_core::{PDFDocument, PDFObjRef, PDFObject, StringFormat};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dumppdf", version, about = "Dump PDF internal structure")]
struct Args {
    /// PDF file to inspect
    file: PathBuf,

    /// Dump specific objects by object number (repeatable)
    #[arg(short = 'i', long = "objid", value_name = "OBJID")]
    objids: Vec<u32>,

    /// Dump every object in the cross-reference table
    #[arg(short = 'a', long = "all")]
    all: bool,

    /// List the flattened page tree
    #[arg(long)]
    pages: bool,

    /// Print flattened form fields as JSON
    #[arg(long)]
    fields: bool,

    /// Dump a page (by index) repackaged as a Form XObject
    #[arg(long, value_name = "INDEX")]
    form_xobject: Option<usize>,
}

/// Render a string payload with PDF-style escapes for non-printable bytes.
fn escape(data: &[u8]) -> String {
    let mut out = String::new();
    for &byte in data {
        match byte {
            b'(' | b')' | b'\\' => {
                out.push('\\');
                out.push(byte as char);
            }
            0x20..=0x7e => out.push(byte as char),
            _ => out.push_str(&format!("\\{byte:03o}")),
        }
    }
    out
}

/// Print an object in PDF-like syntax.
fn dump_object<W: Write>(out: &mut W, obj: &PDFObject) -> io::Result<()> {
    match obj {
        PDFObject::Null => write!(out, "null")?,
        PDFObject::Bool(b) => write!(out, "{b}")?,
        PDFObject::Int(n) => write!(out, "{n}")?,
        PDFObject::Real(n) => write!(out, "{n}")?,
        PDFObject::Name(name) => write!(out, "/{name}")?,
        PDFObject::String(data, StringFormat::Literal) => write!(out, "({})", escape(data))?,
        PDFObject::String(data, StringFormat::Hex) => {
            write!(out, "<")?;
            for b in data {
                write!(out, "{b:02X}")?;
            }
            write!(out, ">")?;
        }
        PDFObject::Array(items) => {
            write!(out, "[ ")?;
            for item in items {
                dump_object(out, item)?;
                write!(out, " ")?;
            }
            write!(out, "]")?;
        }
        PDFObject::Dict(dict) => {
            write!(out, "<< ")?;
            let mut keys: Vec<_> = dict.keys().collect();
            keys.sort();
            for key in keys {
                write!(out, "/{key} ")?;
                dump_object(out, &dict[key])?;
                write!(out, " ")?;
            }
            write!(out, ">>")?;
        }
        PDFObject::Stream(stm) => {
            dump_object(out, &PDFObject::Dict(stm.attrs.clone()))?;
            write!(out, " stream ({} bytes)", stm.data().len())?;
        }
        PDFObject::Ref(r) => write!(out, "{r}")?,
    }
    Ok(())
}

/// Convert an object to JSON for the --fields output.
fn json_value(obj: &PDFObject) -> serde_json::Value {
    match obj {
        PDFObject::Null => serde_json::Value::Null,
        PDFObject::Bool(b) => (*b).into(),
        PDFObject::Int(n) => (*n).into(),
        PDFObject::Real(n) => serde_json::Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        PDFObject::Name(name) => name.clone().into(),
        PDFObject::String(data, _) => String::from_utf8_lossy(data).into_owned().into(),
        PDFObject::Array(items) => items.iter().map(json_value).collect(),
        PDFObject::Dict(dict) => dict
            .iter()
            .map(|(k, v)| (k.clone(), json_value(v)))
            .collect::<serde_json::Map<_, _>>()
            .into(),
        PDFObject::Stream(stm) => format!("<stream, {} bytes>", stm.data().len()).into(),
        PDFObject::Ref(r) => r.to_string().into(),
    }
}

fn run(args: &Args) -> Result<()> {
    let mut doc = PDFDocument::open(&args.file)?;
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut selected = false;

    if args.pages {
        selected = true;
        let pages = doc.pages()?;
        writeln!(out, "{} pages", pages.len())?;
        for (i, page) in pages.iter().enumerate() {
            writeln!(out, "page {i}: {page}")?;
        }
    }

    if args.fields {
        selected = true;
        let fields = doc.get_form_fields()?;
        let map: serde_json::Map<String, serde_json::Value> = fields
            .iter()
            .map(|(name, value)| (name.clone(), json_value(value)))
            .collect();
        let rendered =
            serde_json::to_string_pretty(&serde_json::Value::Object(map)).map_err(io::Error::other)?;
        writeln!(out, "{rendered}")?;
    }

    if let Some(index) = args.form_xobject {
        selected = true;
        let xobj = doc.get_page_as_form_xobject(index)?;
        dump_object(&mut out, &xobj)?;
        writeln!(out)?;
    }

    for objid in &args.objids {
        selected = true;
        let obj = doc.getobj(PDFObjRef::new(*objid, 0))?;
        writeln!(out, "{objid} 0 obj")?;
        dump_object(&mut out, &obj)?;
        writeln!(out)?;
    }

    if args.all {
        selected = true;
        let mut objrefs: Vec<_> = doc.xref().objrefs().collect();
        objrefs.sort_by_key(|r| (r.objid, r.genno));
        for objref in objrefs {
            match doc.getobj(objref) {
                Ok(obj) => {
                    writeln!(out, "{} {} obj", objref.objid, objref.genno)?;
                    dump_object(&mut out, &obj)?;
                    writeln!(out)?;
                    writeln!(out)?;
                }
                Err(e) => warn!("cannot load {objref}: {e}"),
            }
        }
    }

    if !selected {
        // default: a trailer summary
        writeln!(out, "objects: {}", doc.xref().len())?;
        writeln!(out, "root: {}", doc.root()?)?;
        match doc.info_ref() {
            Some(info) => writeln!(out, "info: {info}")?,
            None => writeln!(out, "info: none")?,
        }
        writeln!(out, "pages: {}", doc.page_count()?)?;
    }

    out.flush()?;
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();
    if let Err(e) = run(&args) {
        eprintln!("dumppdf: {e}");
        std::process::exit(1);
    }
}
