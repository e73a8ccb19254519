use crate::error::MalformedInputError;
use crate::models::RawElement;
use anyhow::{Context, Result};
use bzip2::read::BzDecoder;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Which elements an [`ElementReader`] builds and hands out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Elements with one of these names, wherever they first appear
    Named(Vec<String>),
    /// Every direct child of the root element
    TopLevel,
}

impl Selection {
    fn selects(&self, name: &[u8], depth: usize) -> bool {
        match self {
            Selection::Named(names) => names.iter().any(|n| n.as_bytes() == name),
            Selection::TopLevel => depth == 1,
        }
    }
}

/// Streams complete top-level elements out of an OSM XML document.
///
/// Only selected elements are built; everything outside them is skipped event
/// by event. Each element's subtree is handed out as soon as its closing tag is
/// read and nothing of it is kept afterwards. The document itself must still be
/// well-formed: a missing root, text outside it, or any element left open at
/// end of input is reported as malformed.
pub struct ElementReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    selection: Selection,
    /// Open elements of the subtree under construction, outermost first
    stack: Vec<RawElement>,
    /// Open elements in the whole document, selected or not
    depth: usize,
    root: Option<String>,
    done: bool,
}

/// Opens `path` for streaming, decompressing it when it ends in `.bz2`.
pub fn open_input(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open input file: {}", path.display()))?;
    let is_bz2 = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("bz2"))
        .unwrap_or(false);

    if is_bz2 {
        Ok(Box::new(BufReader::new(BzDecoder::new(BufReader::new(file)))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

impl ElementReader<Box<dyn BufRead>> {
    pub fn open(path: &Path, wanted: &[&str]) -> Result<Self> {
        Ok(Self::from_reader(open_input(path)?, wanted))
    }

    pub fn open_selecting(path: &Path, selection: Selection) -> Result<Self> {
        Ok(Self::with_selection(open_input(path)?, selection))
    }
}

impl<R: BufRead> ElementReader<R> {
    pub fn from_reader(source: R, wanted: &[&str]) -> Self {
        let names = wanted.iter().map(|s| s.to_string()).collect();
        Self::with_selection(source, Selection::Named(names))
    }

    pub fn with_selection(source: R, selection: Selection) -> Self {
        let mut reader = Reader::from_reader(source);
        reader.trim_text(true);
        Self {
            reader,
            buf: Vec::with_capacity(8 * 1024),
            selection,
            stack: Vec::new(),
            depth: 0,
            root: None,
            done: false,
        }
    }

    /// Name of the document's root element, once it has been read.
    pub fn root_name(&self) -> Option<&str> {
        self.root.as_deref()
    }

    /// Reads events until one top-level element is complete.
    fn next_element(&mut self) -> Result<Option<RawElement>, MalformedInputError> {
        loop {
            self.buf.clear();
            let event = match self.reader.read_event_into(&mut self.buf) {
                Ok(event) => event,
                Err(e) => return Err(malformed(&self.reader, e.to_string())),
            };

            match event {
                Event::Start(e) => {
                    let depth = self.depth;
                    if depth == 0 {
                        open_root(&mut self.root, &e).map_err(|r| malformed(&self.reader, r))?;
                    }
                    self.depth += 1;
                    if !self.stack.is_empty() || self.selection.selects(e.name().as_ref(), depth) {
                        let element = element_from_start(&e)
                            .map_err(|reason| malformed(&self.reader, reason))?;
                        self.stack.push(element);
                    }
                }
                Event::Empty(e) => {
                    let depth = self.depth;
                    if depth == 0 {
                        open_root(&mut self.root, &e).map_err(|r| malformed(&self.reader, r))?;
                    }
                    if self.stack.is_empty() {
                        if self.selection.selects(e.name().as_ref(), depth) {
                            let element = element_from_start(&e)
                                .map_err(|reason| malformed(&self.reader, reason))?;
                            return Ok(Some(element));
                        }
                    } else {
                        let element = element_from_start(&e)
                            .map_err(|reason| malformed(&self.reader, reason))?;
                        if let Some(parent) = self.stack.last_mut() {
                            parent.children.push(element);
                        }
                    }
                }
                Event::End(_) => {
                    self.depth = self.depth.saturating_sub(1);
                    if let Some(finished) = self.stack.pop() {
                        match self.stack.last_mut() {
                            Some(parent) => parent.children.push(finished),
                            None => return Ok(Some(finished)),
                        }
                    }
                }
                Event::Text(t) if self.depth == 0 => {
                    if !t.iter().all(u8::is_ascii_whitespace) {
                        return Err(malformed(&self.reader, "text outside the root element"));
                    }
                }
                Event::CData(_) if self.depth == 0 => {
                    return Err(malformed(&self.reader, "CDATA outside the root element"));
                }
                Event::Eof => {
                    if let Some(open) = self.stack.last() {
                        let reason = format!("document ended inside <{}>", open.name);
                        return Err(malformed(&self.reader, reason));
                    }
                    if self.depth > 0 {
                        let reason = format!("document ended with {} unclosed elements", self.depth);
                        return Err(malformed(&self.reader, reason));
                    }
                    if self.root.is_none() {
                        return Err(malformed(&self.reader, "document has no root element"));
                    }
                    return Ok(None);
                }
                // comments, declarations and processing instructions carry nothing we shape
                _ => {}
            }
        }
    }
}

fn malformed<R>(reader: &Reader<R>, reason: impl Into<String>) -> MalformedInputError {
    MalformedInputError {
        position: reader.buffer_position() as u64,
        reason: reason.into(),
    }
}

/// Records the root element; a second element at depth 0 is an error.
fn open_root(root: &mut Option<String>, e: &BytesStart<'_>) -> Result<(), String> {
    let name = element_name(e)?;
    match root {
        Some(first) => Err(format!("second root element <{}> after <{}>", name, first)),
        None => {
            *root = Some(name);
            Ok(())
        }
    }
}

fn element_name(e: &BytesStart<'_>) -> Result<String, String> {
    std::str::from_utf8(e.name().as_ref())
        .map(str::to_string)
        .map_err(|err| format!("element name is not UTF-8: {}", err))
}

fn element_from_start(e: &BytesStart<'_>) -> Result<RawElement, String> {
    let mut element = RawElement::new(element_name(e)?);

    for attr in e.attributes() {
        let attr = attr.map_err(|err| err.to_string())?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|err| format!("attribute name is not UTF-8: {}", err))?
            .to_string();
        let value = attr.unescape_value().map_err(|err| err.to_string())?;
        element.attributes.push((key, value.into_owned()));
    }

    Ok(element)
}

impl<R: BufRead> Iterator for ElementReader<R> {
    type Item = Result<RawElement, MalformedInputError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_element() {
            Ok(Some(element)) => Some(Ok(element)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
