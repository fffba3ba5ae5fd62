//! Content stream interpretation.
//!
//! Walks a page's operators, tracking the graphics and text state, and
//! records where each shown string and each image XObject lands in user
//! space.

use std::collections::HashMap;
use std::sync::Arc;

use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::trace;

use super::fonts::FontInfo;

/// Form XObjects nested deeper than this are ignored.
const MAX_FORM_DEPTH: usize = 8;

/// 2D affine transform in PDF row-vector convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix { a: 1.0, b: 0.0, c: 0.0, d: 1.0, e: 0.0, f: 0.0 };

    pub fn translate(tx: f32, ty: f32) -> Matrix {
        Matrix { e: tx, f: ty, ..Self::IDENTITY }
    }

    fn from_operands(operands: &[Object]) -> Option<Matrix> {
        if operands.len() < 6 {
            return None;
        }
        Some(Matrix {
            a: number(&operands[0])?,
            b: number(&operands[1])?,
            c: number(&operands[2])?,
            d: number(&operands[3])?,
            e: number(&operands[4])?,
            f: number(&operands[5])?,
        })
    }

    fn from_array(obj: Option<&Object>) -> Option<Matrix> {
        match obj {
            Some(Object::Array(items)) => Self::from_operands(items),
            _ => None,
        }
    }

    /// `self` applied first, then `other`.
    pub fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (x * self.a + y * self.c + self.e, x * self.b + y * self.d + self.f)
    }

    /// Length of the transformed unit vertical vector.
    fn vertical_scale(&self) -> f32 {
        (self.c * self.c + self.d * self.d).sqrt()
    }
}

/// Read an integer or real operand.
pub(crate) fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

/// A shown string positioned in user space.
#[derive(Debug, Clone)]
pub(crate) struct GlyphRun {
    pub text: String,
    pub x0: f32,
    pub x1: f32,
    /// Baseline in user space (origin bottom-left).
    pub baseline: f32,
    /// Font size after the text and graphics transforms.
    pub size: f32,
    pub font: Arc<FontInfo>,
}

/// An image XObject and the CTM it was drawn with.
#[derive(Debug, Clone)]
pub(crate) struct ImagePlacement {
    pub object_id: ObjectId,
    pub ctm: Matrix,
}

impl ImagePlacement {
    /// Bounds of the unit square under the CTM, in user space.
    pub fn user_bounds(&self) -> (f32, f32, f32, f32) {
        let corners = [
            self.ctm.apply(0.0, 0.0),
            self.ctm.apply(1.0, 0.0),
            self.ctm.apply(0.0, 1.0),
            self.ctm.apply(1.0, 1.0),
        ];
        let min_x = corners.iter().map(|c| c.0).fold(f32::INFINITY, f32::min);
        let max_x = corners.iter().map(|c| c.0).fold(f32::NEG_INFINITY, f32::max);
        let min_y = corners.iter().map(|c| c.1).fold(f32::INFINITY, f32::min);
        let max_y = corners.iter().map(|c| c.1).fold(f32::NEG_INFINITY, f32::max);
        (min_x, min_y, max_x, max_y)
    }
}

/// Everything drawn on one page.
#[derive(Debug, Default)]
pub(crate) struct PageContent {
    pub runs: Vec<GlyphRun>,
    pub images: Vec<ImagePlacement>,
}

#[derive(Debug, Clone)]
struct TextState {
    font: Option<Arc<FontInfo>>,
    size: f32,
    char_spacing: f32,
    word_spacing: f32,
    scale: f32,
    leading: f32,
    rise: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font: None,
            size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    text: TextState,
}

/// Interprets page and form content streams against one document.
pub(crate) struct Interpreter<'a> {
    doc: &'a Document,
    fonts: HashMap<ObjectId, Arc<FontInfo>>,
    fallback_font: Arc<FontInfo>,
    out: PageContent,
}

impl<'a> Interpreter<'a> {
    pub fn new(doc: &'a Document) -> Self {
        Self {
            doc,
            fonts: HashMap::new(),
            fallback_font: Arc::new(FontInfo::fallback()),
            out: PageContent::default(),
        }
    }

    /// Interpret a page content stream.
    pub fn page(mut self, data: &[u8], resources: &Dictionary) -> PageContent {
        self.run(data, resources, Matrix::IDENTITY, 0);
        self.out
    }

    fn run(&mut self, data: &[u8], resources: &Dictionary, ctm: Matrix, depth: usize) {
        let content = match Content::decode(data) {
            Ok(c) => c,
            Err(e) => {
                trace!("Skipping undecodable content stream: {}", e);
                return;
            }
        };

        let mut gs = GraphicsState { ctm, text: TextState::default() };
        let mut stack: Vec<GraphicsState> = Vec::new();
        let mut tm = Matrix::IDENTITY;
        let mut tlm = Matrix::IDENTITY;

        for op in &content.operations {
            let operands = &op.operands;
            let num = |i: usize| operands.get(i).and_then(number);

            match op.operator.as_str() {
                "q" => stack.push(gs.clone()),
                "Q" => {
                    if let Some(saved) = stack.pop() {
                        gs = saved;
                    }
                }
                "cm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        gs.ctm = m.then(&gs.ctm);
                    }
                }
                "BT" => {
                    tm = Matrix::IDENTITY;
                    tlm = Matrix::IDENTITY;
                }
                "Tf" => {
                    if let Some(name) = operands.first().and_then(|o| o.as_name().ok()) {
                        gs.text.font = self.font(resources, name);
                    }
                    gs.text.size = num(1).unwrap_or(gs.text.size);
                }
                "Tc" => gs.text.char_spacing = num(0).unwrap_or(0.0),
                "Tw" => gs.text.word_spacing = num(0).unwrap_or(0.0),
                "Tz" => gs.text.scale = num(0).unwrap_or(100.0) / 100.0,
                "TL" => gs.text.leading = num(0).unwrap_or(0.0),
                "Ts" => gs.text.rise = num(0).unwrap_or(0.0),
                "Td" | "TD" => {
                    let (tx, ty) = (num(0).unwrap_or(0.0), num(1).unwrap_or(0.0));
                    if op.operator == "TD" {
                        gs.text.leading = -ty;
                    }
                    tlm = Matrix::translate(tx, ty).then(&tlm);
                    tm = tlm;
                }
                "Tm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        tlm = m;
                        tm = m;
                    }
                }
                "T*" => {
                    tlm = Matrix::translate(0.0, -gs.text.leading).then(&tlm);
                    tm = tlm;
                }
                "Tj" => {
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        self.show(&gs, &mut tm, bytes);
                    }
                }
                "'" | "\"" => {
                    let string_at = if op.operator == "'" { 0 } else { 2 };
                    if op.operator == "\"" {
                        gs.text.word_spacing = num(0).unwrap_or(gs.text.word_spacing);
                        gs.text.char_spacing = num(1).unwrap_or(gs.text.char_spacing);
                    }
                    tlm = Matrix::translate(0.0, -gs.text.leading).then(&tlm);
                    tm = tlm;
                    if let Some(Object::String(bytes, _)) = operands.get(string_at) {
                        self.show(&gs, &mut tm, bytes);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = operands.first() {
                        for item in items {
                            match item {
                                Object::String(bytes, _) => self.show(&gs, &mut tm, bytes),
                                other => {
                                    if let Some(adjust) = number(other) {
                                        let tx = -adjust / 1000.0 * gs.text.size * gs.text.scale;
                                        tm = Matrix::translate(tx, 0.0).then(&tm);
                                    }
                                }
                            }
                        }
                    }
                }
                "Do" => {
                    if let Some(name) = operands.first().and_then(|o| o.as_name().ok()) {
                        self.draw_xobject(resources, name, gs.ctm, depth);
                    }
                }
                _ => {}
            }
        }
    }

    fn show(&mut self, gs: &GraphicsState, tm: &mut Matrix, bytes: &[u8]) {
        let ts = &gs.text;
        let font = ts.font.clone().unwrap_or_else(|| self.fallback_font.clone());

        let render = |tm: &Matrix| {
            Matrix { a: ts.size * ts.scale, b: 0.0, c: 0.0, d: ts.size, e: 0.0, f: ts.rise }
                .then(tm)
                .then(&gs.ctm)
        };

        let (start_x, baseline) = render(tm).apply(0.0, 0.0);
        let mut text = String::new();

        for glyph in font.decode(bytes) {
            text.push_str(&glyph.text);
            let mut tx = glyph.width / 1000.0 * ts.size + ts.char_spacing;
            if glyph.is_space {
                tx += ts.word_spacing;
            }
            *tm = Matrix::translate(tx * ts.scale, 0.0).then(tm);
        }

        if text.is_empty() {
            return;
        }

        let (end_x, _) = render(tm).apply(0.0, 0.0);
        let size = ts.size * tm.then(&gs.ctm).vertical_scale();

        self.out.runs.push(GlyphRun {
            text,
            x0: start_x.min(end_x),
            x1: start_x.max(end_x),
            baseline,
            size: size.abs(),
            font,
        });
    }

    fn draw_xobject(&mut self, resources: &Dictionary, name: &[u8], ctm: Matrix, depth: usize) {
        let doc = self.doc;
        let Some(xobjects) = resource_dict(doc, resources, b"XObject") else {
            return;
        };
        let Ok(Object::Reference(id)) = xobjects.get(name) else {
            return;
        };
        let Ok(Object::Stream(stream)) = doc.get_object(*id) else {
            return;
        };

        match stream.dict.get(b"Subtype").and_then(|o| o.as_name()) {
            Ok(b"Image") => self.out.images.push(ImagePlacement { object_id: *id, ctm }),
            Ok(b"Form") if depth < MAX_FORM_DEPTH => {
                let matrix = Matrix::from_array(stream.dict.get(b"Matrix").ok())
                    .unwrap_or(Matrix::IDENTITY);
                let form_resources = stream
                    .dict
                    .get(b"Resources")
                    .ok()
                    .and_then(|o| doc.dereference(o).ok())
                    .and_then(|(_, o)| o.as_dict().ok())
                    .unwrap_or(resources);
                let data = stream
                    .decompressed_content()
                    .unwrap_or_else(|_| stream.content.clone());
                self.run(&data, form_resources, matrix.then(&ctm), depth + 1);
            }
            _ => {}
        }
    }

    fn font(&mut self, resources: &Dictionary, name: &[u8]) -> Option<Arc<FontInfo>> {
        let doc = self.doc;
        let fonts = resource_dict(doc, resources, b"Font")?;
        let entry = fonts.get(name).ok()?;

        if let Object::Reference(id) = entry {
            if let Some(cached) = self.fonts.get(id) {
                return Some(cached.clone());
            }
            let dict = doc.get_object(*id).ok()?.as_dict().ok()?;
            let font = Arc::new(FontInfo::from_dict(doc, dict));
            self.fonts.insert(*id, font.clone());
            return Some(font);
        }

        entry.as_dict().ok().map(|dict| Arc::new(FontInfo::from_dict(doc, dict)))
    }
}

/// Look up a named sub-dictionary of a resource dictionary.
pub(crate) fn resource_dict<'d>(
    doc: &'d Document,
    resources: &'d Dictionary,
    key: &[u8],
) -> Option<&'d Dictionary> {
    let obj = resources.get(key).ok()?;
    doc.dereference(obj).ok()?.1.as_dict().ok()
}
