//! Page tree flattening and page-derived views.
//!
//! This layer only consumes the resolver contract. Unlike the core below it,
//! it may skip an individually malformed node (logged) instead of failing
//! the whole walk - but it never repairs one.

use super::catalog::PDFDocument;
use crate::error::{PdfError, Result};
use crate::model::objects::{PDFObjRef, PDFObject, PDFStream};
use crate::parser::cursor::Source;
use log::warn;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

impl<S: Source> PDFDocument<S> {
    /// Flatten the page tree into document page order.
    ///
    /// Depth-first over /Pages -> /Kids with cycle protection. Nodes whose
    /// /Type is neither /Pages nor /Page are skipped; a catalog without
    /// /Pages is an error.
    pub fn pages(&mut self) -> Result<Vec<PDFObjRef>> {
        let catalog = self.catalog()?;
        let catalog_dict = catalog.as_dict()?;
        let pages_root = match catalog_dict.get("Pages") {
            Some(PDFObject::Ref(r)) => *r,
            Some(other) => {
                return Err(PdfError::SyntaxError(format!(
                    "catalog /Pages must be a reference, got {}",
                    other.type_name()
                )));
            }
            None => {
                return Err(PdfError::SyntaxError("catalog has no /Pages entry".into()));
            }
        };

        let mut pages = Vec::new();
        let mut stack = vec![pages_root];
        let mut visited: HashSet<PDFObjRef> = HashSet::new();

        while let Some(noderef) = stack.pop() {
            if !visited.insert(noderef) {
                continue;
            }
            let node = self.getobj(noderef)?;
            let dict = match node.as_dict() {
                Ok(d) => d,
                Err(_) => {
                    warn!("page tree node {noderef} is not a dictionary, skipping");
                    continue;
                }
            };
            match dict.get("Type") {
                Some(PDFObject::Name(name)) if name == "Pages" => {
                    let Some(kids) = dict.get("Kids") else {
                        warn!("pages node {noderef} has no /Kids");
                        continue;
                    };
                    let kids = self.resolve(kids)?;
                    match kids.as_array() {
                        Ok(arr) => {
                            // reversed so the stack pops in document order
                            for kid in arr.iter().rev() {
                                match kid {
                                    PDFObject::Ref(r) => stack.push(*r),
                                    other => warn!(
                                        "page tree kid is not a reference ({}), skipping",
                                        other.type_name()
                                    ),
                                }
                            }
                        }
                        Err(_) => warn!("/Kids of {noderef} is not an array, skipping"),
                    }
                }
                Some(PDFObject::Name(name)) if name == "Page" => pages.push(noderef),
                _ => warn!("page tree node {noderef} has no valid /Type, skipping"),
            }
        }
        Ok(pages)
    }

    /// Total number of pages.
    pub fn page_count(&mut self) -> Result<usize> {
        Ok(self.pages()?.len())
    }

    /// The page dictionary at `index` in document order.
    pub fn get_page(&mut self, index: usize) -> Result<Arc<PDFObject>> {
        let pages = self.pages()?;
        let objref = pages.get(index).copied().ok_or_else(|| {
            PdfError::InvalidArgument(format!(
                "page index {index} out of range ({} pages)",
                pages.len()
            ))
        })?;
        self.getobj(objref)
    }

    /// Look up a page attribute (Resources, MediaBox, Rotate, ...), walking
    /// /Parent links until found or exhausted.
    pub fn inherited_attribute(
        &mut self,
        page: PDFObjRef,
        name: &str,
    ) -> Result<Option<Arc<PDFObject>>> {
        let mut visited = HashSet::new();
        let mut current = page;
        loop {
            if !visited.insert(current) {
                return Err(PdfError::SyntaxError(
                    "circular /Parent chain in page tree".into(),
                ));
            }
            let node = self.getobj(current)?;
            let dict = node.as_dict()?;
            if let Some(value) = dict.get(name) {
                return Ok(Some(self.resolve(value)?));
            }
            match dict.get("Parent") {
                Some(PDFObject::Ref(r)) => current = *r,
                Some(other) => {
                    return Err(PdfError::SyntaxError(format!(
                        "/Parent must be a reference, got {}",
                        other.type_name()
                    )));
                }
                None => return Ok(None),
            }
        }
    }

    /// Transitive set of indirect references reachable from `start`, in
    /// first-visited order. Used to bundle a page's resources.
    pub fn collect_references(&mut self, start: &PDFObject) -> Result<Vec<PDFObjRef>> {
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        let mut pending: Vec<PDFObject> = vec![start.clone()];
        while let Some(obj) = pending.pop() {
            match obj {
                PDFObject::Ref(r) => {
                    if seen.insert(r) {
                        order.push(r);
                        pending.push((*self.getobj(r)?).clone());
                    }
                }
                PDFObject::Array(items) => pending.extend(items),
                PDFObject::Dict(dict) => pending.extend(dict.into_values()),
                PDFObject::Stream(stm) => pending.extend(stm.attrs.into_values()),
                _ => {}
            }
        }
        Ok(order)
    }

    /// Repackage a page as a Form XObject: the decoded page content becomes
    /// the XObject body, /BBox comes from the inherited /MediaBox, and the
    /// inherited /Resources are carried over.
    pub fn get_page_as_form_xobject(&mut self, index: usize) -> Result<PDFObject> {
        let pages = self.pages()?;
        let pageref = pages.get(index).copied().ok_or_else(|| {
            PdfError::InvalidArgument(format!(
                "page index {index} out of range ({} pages)",
                pages.len()
            ))
        })?;

        let mediabox = self
            .inherited_attribute(pageref, "MediaBox")?
            .ok_or_else(|| PdfError::SyntaxError(format!("page {pageref} has no /MediaBox")))?;
        let resources = self.inherited_attribute(pageref, "Resources")?;
        let content = self.page_contents(pageref)?;

        let mut attrs = HashMap::new();
        attrs.insert("Type".to_string(), PDFObject::Name("XObject".into()));
        attrs.insert("Subtype".to_string(), PDFObject::Name("Form".into()));
        attrs.insert("BBox".to_string(), (*mediabox).clone());
        if let Some(resources) = resources {
            attrs.insert("Resources".to_string(), (*resources).clone());
        }
        attrs.insert("Length".to_string(), PDFObject::Int(content.len() as i64));
        Ok(PDFObject::Stream(Box::new(PDFStream::new(attrs, content))))
    }

    /// Concatenated decoded content streams of a page. /Contents may be a
    /// single stream or an array; a malformed element contributes nothing.
    fn page_contents(&mut self, pageref: PDFObjRef) -> Result<Vec<u8>> {
        let page = self.getobj(pageref)?;
        let dict = page.as_dict()?;
        let contents = match dict.get("Contents") {
            Some(c) => self.resolve(c)?,
            None => return Ok(Vec::new()),
        };
        let mut out = Vec::new();
        match contents.as_ref() {
            PDFObject::Stream(stm) => out.extend_from_slice(stm.data()),
            PDFObject::Array(items) => {
                let items = items.clone();
                for item in &items {
                    match self.resolve(item) {
                        Ok(obj) => match obj.as_ref() {
                            PDFObject::Stream(stm) => out.extend_from_slice(stm.data()),
                            other => warn!(
                                "page content element is not a stream ({}), skipping",
                                other.type_name()
                            ),
                        },
                        Err(e) => warn!("failed to resolve page content element: {e}"),
                    }
                }
            }
            other => warn!(
                "/Contents is neither stream nor array ({}), skipping",
                other.type_name()
            ),
        }
        Ok(out)
    }
}
