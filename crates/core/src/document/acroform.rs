//! Interactive form (AcroForm) field flattening.

use super::catalog::PDFDocument;
use crate::error::Result;
use crate::model::objects::{PDFObjRef, PDFObject};
use crate::parser::cursor::Source;
use indexmap::IndexMap;
use log::warn;
use std::collections::HashSet;

impl<S: Source> PDFDocument<S> {
    /// Flatten the interactive form into fully-qualified field name to
    /// current value.
    ///
    /// Qualified names join the ancestor chain with `.` (or use whichever
    /// half exists when parent or partial name is absent). A field's value
    /// is its own /V, else the nearest ancestor's. Documents without an
    /// /AcroForm yield an empty map; individually malformed field nodes are
    /// skipped, not repaired.
    pub fn get_form_fields(&mut self) -> Result<IndexMap<String, PDFObject>> {
        let mut fields = IndexMap::new();
        let catalog = self.catalog()?;
        let catalog_dict = catalog.as_dict()?;
        let Some(acroform) = catalog_dict.get("AcroForm") else {
            return Ok(fields);
        };
        let acroform = self.resolve(acroform)?;
        let Some(roots) = acroform.as_dict()?.get("Fields") else {
            return Ok(fields);
        };
        let roots = self.resolve(roots)?;
        let roots = roots.as_array()?.clone();

        // depth-first over the field tree, carrying the qualified name
        // prefix and the inherited value
        let mut visited: HashSet<PDFObjRef> = HashSet::new();
        let mut stack: Vec<(PDFObject, Option<String>, Option<PDFObject>)> =
            roots.into_iter().rev().map(|f| (f, None, None)).collect();

        while let Some((node, prefix, inherited_value)) = stack.pop() {
            if let PDFObject::Ref(r) = node
                && !visited.insert(r)
            {
                warn!("field tree loops through {r}, skipping");
                continue;
            }
            let resolved = match self.resolve(&node) {
                Ok(obj) => obj,
                Err(e) => {
                    warn!("failed to resolve form field: {e}");
                    continue;
                }
            };
            let dict = match resolved.as_dict() {
                Ok(d) => d,
                Err(_) => {
                    warn!("form field is not a dictionary, skipping");
                    continue;
                }
            };

            let partial = match dict.get("T") {
                Some(PDFObject::String(bytes, _)) => {
                    Some(String::from_utf8_lossy(bytes).into_owned())
                }
                _ => None,
            };
            let qualified = match (&prefix, &partial) {
                (Some(parent), Some(name)) => Some(format!("{parent}.{name}")),
                (Some(parent), None) => Some(parent.clone()),
                (None, Some(name)) => Some(name.clone()),
                (None, None) => None,
            };
            let value = dict.get("V").cloned().or(inherited_value);

            if let Some(kids) = dict.get("Kids") {
                let kids = self.resolve(kids)?;
                match kids.as_array() {
                    Ok(arr) => {
                        for kid in arr.iter().rev() {
                            stack.push((kid.clone(), qualified.clone(), value.clone()));
                        }
                    }
                    Err(_) => warn!("/Kids of a form field is not an array, skipping"),
                }
                continue;
            }

            // terminal field
            let Some(name) = qualified else {
                warn!("form field without /T, skipping");
                continue;
            };
            let value = match value {
                Some(PDFObject::Ref(r)) => (*self.resolve(&PDFObject::Ref(r))?).clone(),
                Some(other) => other,
                None => PDFObject::Null,
            };
            fields.insert(name, value);
        }
        Ok(fields)
    }
}
