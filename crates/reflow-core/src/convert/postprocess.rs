//! Best-effort clean-up of structurally converted documents.
//!
//! Rewrites `word/document.xml` as an event stream:
//! - every section gets the measured page size and margins,
//! - every table gets single black borders on all edges and inside,
//! - runs of blank body paragraphs collapse to one,
//! - paragraph spacing before and after is fixed.

use std::io::Cursor;

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use tracing::{debug, warn};

use crate::error::WriterError;
use crate::geometry::PageGeometry;
use crate::writers::ooxml::{read_part, replace_part};

const DOCUMENT_PART: &str = "word/document.xml";

/// Border width in eighths of a point.
const BORDER_SIZE: &str = "4";
const BORDER_EDGES: [&str; 6] = ["w:top", "w:left", "w:bottom", "w:right", "w:insideH", "w:insideV"];

/// `w:tblPr` children that must follow `w:tblBorders`.
const AFTER_TABLE_BORDERS: &[&[u8]] = &[
    b"w:shd",
    b"w:tblLayout",
    b"w:tblCellMar",
    b"w:tblLook",
    b"w:tblCaption",
    b"w:tblDescription",
    b"w:tblPrChange",
];

/// `w:pPr` children that must follow `w:spacing`.
const AFTER_SPACING: &[&[u8]] = &[
    b"w:ind",
    b"w:contextualSpacing",
    b"w:mirrorIndents",
    b"w:suppressOverlap",
    b"w:jc",
    b"w:textDirection",
    b"w:textAlignment",
    b"w:textboxTightWrap",
    b"w:outlineLvl",
    b"w:divId",
    b"w:cnfStyle",
    b"w:rPr",
    b"w:sectPr",
    b"w:pPrChange",
];

/// Elements that make a paragraph non-blank even without text.
const CONTENT_ELEMENTS: &[&[u8]] = &[b"w:drawing", b"w:pict", b"w:object", b"w:br", b"w:tab", b"w:sectPr", b"w:fldSimple"];

/// Settings for one enhancement pass.
#[derive(Debug, Clone, Copy)]
pub struct Enhancement {
    pub geometry: PageGeometry,
    pub spacing_twips: u32,
}

impl Enhancement {
    pub fn new(geometry: PageGeometry, spacing_pt: f32) -> Self {
        Self {
            geometry,
            spacing_twips: (spacing_pt.max(0.0) * 20.0).round() as u32,
        }
    }
}

/// Apply every enhancement, returning the untouched package when any step fails.
pub fn enhance(package: Vec<u8>, enhancement: &Enhancement) -> Vec<u8> {
    match try_enhance(&package, enhancement) {
        Ok(enhanced) => {
            debug!("Post-processing applied ({} -> {} bytes)", package.len(), enhanced.len());
            enhanced
        }
        Err(e) => {
            warn!("Post-processing failed, keeping unmodified document: {}", e);
            package
        }
    }
}

/// Apply every enhancement.
pub fn try_enhance(package: &[u8], enhancement: &Enhancement) -> Result<Vec<u8>, WriterError> {
    let xml = read_part(package, DOCUMENT_PART)?;
    let collapsed = collapse_blank_paragraphs(&xml)?;
    let rewritten = rewrite_properties(&collapsed, enhancement)?;
    replace_part(package, DOCUMENT_PART, rewritten.as_bytes())
}

fn xml_err(e: impl std::fmt::Display) -> WriterError {
    WriterError::Xml(e.to_string())
}

fn new_writer() -> Writer<Cursor<Vec<u8>>> {
    Writer::new(Cursor::new(Vec::new()))
}

fn into_string(writer: Writer<Cursor<Vec<u8>>>) -> Result<String, WriterError> {
    String::from_utf8(writer.into_inner().into_inner()).map_err(xml_err)
}

fn is_blank(events: &[Event<'static>]) -> bool {
    let mut in_text = false;
    for event in events {
        match event {
            Event::Start(e) | Event::Empty(e) if CONTENT_ELEMENTS.contains(&e.name().as_ref()) => {
                return false;
            }
            Event::Start(e) if e.name().as_ref() == b"w:t" => in_text = true,
            Event::End(e) if e.name().as_ref() == b"w:t" => in_text = false,
            Event::Text(t) if in_text && t.iter().any(|b| !b.is_ascii_whitespace()) => return false,
            Event::CData(_) => return false,
            _ => {}
        }
    }
    true
}

/// Drop a body-level blank paragraph that directly follows another one.
pub fn collapse_blank_paragraphs(xml: &str) -> Result<String, WriterError> {
    let mut reader = Reader::from_str(xml);
    let mut writer = new_writer();

    let mut depth = 0usize;
    let mut body_depth: Option<usize> = None;
    let mut paragraph: Option<Vec<Event<'static>>> = None;
    let mut paragraph_depth = 0usize;
    let mut previous_blank = false;
    let mut dropped = 0usize;

    loop {
        let event = reader.read_event().map_err(xml_err)?;
        if matches!(event, Event::Eof) {
            break;
        }

        if let Some(buffer) = paragraph.as_mut() {
            match &event {
                Event::Start(_) => paragraph_depth += 1,
                Event::End(_) => paragraph_depth -= 1,
                _ => {}
            }
            buffer.push(event.into_owned());
            if paragraph_depth == 0 {
                let events = paragraph.take().unwrap_or_default();
                let blank = is_blank(&events);
                if blank && previous_blank {
                    dropped += 1;
                } else {
                    for event in events {
                        writer.write_event(event).map_err(xml_err)?;
                    }
                }
                previous_blank = blank;
            }
            continue;
        }

        let at_body_level = body_depth.is_some_and(|d| depth == d);
        match &event {
            Event::Start(e) if at_body_level && e.name().as_ref() == b"w:p" => {
                paragraph = Some(vec![event.into_owned()]);
                paragraph_depth = 1;
                continue;
            }
            Event::Empty(e) if at_body_level && e.name().as_ref() == b"w:p" => {
                if previous_blank {
                    dropped += 1;
                } else {
                    writer.write_event(event).map_err(xml_err)?;
                }
                previous_blank = true;
                continue;
            }
            Event::Start(e) => {
                if at_body_level {
                    previous_blank = false;
                }
                depth += 1;
                if e.name().as_ref() == b"w:body" {
                    body_depth = Some(depth);
                }
            }
            Event::Empty(_) if at_body_level => previous_blank = false,
            Event::End(e) => {
                if e.name().as_ref() == b"w:body" {
                    body_depth = None;
                }
                depth = depth.saturating_sub(1);
            }
            _ => {}
        }
        writer.write_event(event).map_err(xml_err)?;
    }

    debug!("Collapsed {} blank paragraphs", dropped);
    into_string(writer)
}

/// A property container (`w:tblPr`, `w:pPr`) that must carry one generated child.
struct PropertyPatch {
    owner: &'static [u8],
    container: &'static str,
    child: &'static [u8],
    before: &'static [&'static [u8]],
}

const TABLE_PATCH: PropertyPatch = PropertyPatch {
    owner: b"w:tbl",
    container: "w:tblPr",
    child: b"w:tblBorders",
    before: AFTER_TABLE_BORDERS,
};

const PARAGRAPH_PATCH: PropertyPatch = PropertyPatch {
    owner: b"w:p",
    container: "w:pPr",
    child: b"w:spacing",
    before: AFTER_SPACING,
};

#[derive(Debug, Clone, Copy, PartialEq)]
enum PatchState {
    /// Owner opened; the next child decides whether a container exists.
    AwaitingContainer,
    /// Inside the container, generated child not yet written.
    InContainer,
    /// Generated child written, or nothing left to do.
    Done,
}

struct Patcher<'a> {
    enhancement: &'a Enhancement,
    writer: Writer<Cursor<Vec<u8>>>,
    /// One entry per open patched owner element.
    states: Vec<(&'static PropertyPatch, PatchState, usize)>,
    depth: usize,
    /// Depth of a replaced child being skipped.
    skip_until: Option<usize>,
}

impl<'a> Patcher<'a> {
    fn write(&mut self, event: Event<'_>) -> Result<(), WriterError> {
        self.writer.write_event(event).map_err(xml_err)
    }

    fn write_child(&mut self, patch: &PropertyPatch) -> Result<(), WriterError> {
        if patch.child == TABLE_PATCH.child {
            self.write(Event::Start(BytesStart::new("w:tblBorders")))?;
            for edge in BORDER_EDGES {
                let mut border = BytesStart::new(edge);
                border.push_attribute(("w:val", "single"));
                border.push_attribute(("w:sz", BORDER_SIZE));
                border.push_attribute(("w:space", "0"));
                border.push_attribute(("w:color", "000000"));
                self.write(Event::Empty(border))?;
            }
            self.write(Event::End(BytesEnd::new("w:tblBorders")))
        } else {
            let twips = self.enhancement.spacing_twips.to_string();
            let mut spacing = BytesStart::new("w:spacing");
            spacing.push_attribute(("w:before", twips.as_str()));
            spacing.push_attribute(("w:after", twips.as_str()));
            self.write(Event::Empty(spacing))
        }
    }

    fn write_container(&mut self, patch: &PropertyPatch) -> Result<(), WriterError> {
        self.write(Event::Start(BytesStart::new(patch.container)))?;
        self.write_child(patch)?;
        self.write(Event::End(BytesEnd::new(patch.container)))
    }

    fn section_element(&self, e: &BytesStart<'_>) -> Option<BytesStart<'static>> {
        let geometry = &self.enhancement.geometry;
        match e.name().as_ref() {
            b"w:pgSz" => {
                let mut size = BytesStart::new("w:pgSz");
                size.push_attribute(("w:w", geometry.page_width_twips().to_string().as_str()));
                size.push_attribute(("w:h", geometry.page_height_twips().to_string().as_str()));
                Some(size)
            }
            b"w:pgMar" => {
                let (top, right, bottom, left) = geometry.margins_twips();
                let mut margin = BytesStart::new("w:pgMar");
                margin.push_attribute(("w:top", top.to_string().as_str()));
                margin.push_attribute(("w:right", right.to_string().as_str()));
                margin.push_attribute(("w:bottom", bottom.to_string().as_str()));
                margin.push_attribute(("w:left", left.to_string().as_str()));
                for attr in e.attributes().flatten() {
                    let key = attr.key.as_ref();
                    if !matches!(key, b"w:top" | b"w:right" | b"w:bottom" | b"w:left") {
                        margin.push_attribute(attr);
                    }
                }
                Some(margin.into_owned())
            }
            _ => None,
        }
    }

    /// Handle the state of the innermost patched owner before `name` opens at the current depth.
    fn before_child(&mut self, name: &[u8], is_start: bool) -> Result<bool, WriterError> {
        let Some(&(patch, state, owner_depth)) = self.states.last() else {
            return Ok(false);
        };

        match state {
            PatchState::AwaitingContainer if self.depth == owner_depth => {
                if name == patch.container.as_bytes() {
                    if is_start {
                        self.set_state(PatchState::InContainer);
                        return Ok(false);
                    }
                    self.write_container(patch)?;
                    self.set_state(PatchState::Done);
                    return Ok(true);
                }
                self.write_container(patch)?;
                self.set_state(PatchState::Done);
                Ok(false)
            }
            PatchState::InContainer if self.depth == owner_depth + 1 => {
                if name == patch.child {
                    if is_start {
                        self.skip_until = Some(self.depth);
                    }
                    return Ok(true);
                }
                if patch.before.contains(&name) {
                    self.write_child(patch)?;
                    self.set_state(PatchState::Done);
                }
                Ok(false)
            }
            _ => Ok(false),
        }
    }

    fn set_state(&mut self, state: PatchState) {
        if let Some(last) = self.states.last_mut() {
            last.1 = state;
        }
    }
}

fn patch_for(name: &[u8]) -> Option<&'static PropertyPatch> {
    if name == TABLE_PATCH.owner {
        Some(&TABLE_PATCH)
    } else if name == PARAGRAPH_PATCH.owner {
        Some(&PARAGRAPH_PATCH)
    } else {
        None
    }
}

/// Set section geometry, table borders and paragraph spacing.
pub fn rewrite_properties(xml: &str, enhancement: &Enhancement) -> Result<String, WriterError> {
    let mut reader = Reader::from_str(xml);
    let mut patcher = Patcher {
        enhancement,
        writer: new_writer(),
        states: Vec::new(),
        depth: 0,
        skip_until: None,
    };

    loop {
        let event = reader.read_event().map_err(xml_err)?;

        if let Some(skip_depth) = patcher.skip_until {
            match event {
                Event::Start(_) => patcher.depth += 1,
                Event::End(_) => {
                    patcher.depth -= 1;
                    if patcher.depth <= skip_depth {
                        patcher.skip_until = None;
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            continue;
        }

        match event {
            Event::Eof => break,
            Event::Start(e) => {
                if patcher.before_child(e.name().as_ref(), true)? {
                    patcher.depth += 1;
                    continue;
                }
                patcher.depth += 1;
                let owner = patch_for(e.name().as_ref());
                match patcher.section_element(&e) {
                    Some(replacement) => patcher.write(Event::Start(replacement))?,
                    None => patcher.write(Event::Start(e))?,
                }
                if let Some(patch) = owner {
                    patcher.states.push((patch, PatchState::AwaitingContainer, patcher.depth));
                }
            }
            Event::Empty(e) => {
                if patcher.before_child(e.name().as_ref(), false)? {
                    continue;
                }
                if e.name().as_ref() == PARAGRAPH_PATCH.owner {
                    let mut open = BytesStart::new("w:p");
                    for attr in e.attributes().flatten() {
                        open.push_attribute(attr);
                    }
                    patcher.write(Event::Start(open))?;
                    patcher.write_container(&PARAGRAPH_PATCH)?;
                    patcher.write(Event::End(BytesEnd::new("w:p")))?;
                    continue;
                }
                match patcher.section_element(&e) {
                    Some(replacement) => patcher.write(Event::Empty(replacement))?,
                    None => patcher.write(Event::Empty(e))?,
                }
            }
            Event::End(e) => {
                let name = e.name();
                if let Some(&(patch, state, owner_depth)) = patcher.states.last() {
                    if state == PatchState::InContainer
                        && patcher.depth == owner_depth + 1
                        && name.as_ref() == patch.container.as_bytes()
                    {
                        patcher.write_child(patch)?;
                        patcher.set_state(PatchState::Done);
                    } else if state == PatchState::AwaitingContainer
                        && patcher.depth == owner_depth
                        && name.as_ref() == patch.owner
                    {
                        patcher.write_container(patch)?;
                    }
                    if patcher.depth == owner_depth && name.as_ref() == patch.owner {
                        patcher.states.pop();
                    }
                }
                patcher.depth = patcher.depth.saturating_sub(1);
                patcher.write(Event::End(e))?;
            }
            other => patcher.write(other)?,
        }
    }

    into_string(patcher.writer)
}
