//! Synthetic PDFs for tests.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};

/// Raw 8-bit RGB pixels.
#[derive(Debug, Clone)]
pub(crate) struct TestImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl TestImage {
    pub fn rgb(width: u32, height: u32, color: [u8; 3]) -> Self {
        let pixels = color.repeat((width * height) as usize);
        Self { width, height, pixels }
    }
}

#[derive(Debug, Default)]
struct PageSpec {
    operations: Vec<Operation>,
    images: Vec<TestImage>,
}

/// Builds a small uncompressed PDF with Helvetica text and RGB images.
pub(crate) struct PdfBuilder {
    width: f32,
    height: f32,
    pages: Vec<PageSpec>,
}

fn num(v: f32) -> Object {
    if v.fract() == 0.0 {
        Object::Integer(v as i64)
    } else {
        Object::Real(v.into())
    }
}

impl PdfBuilder {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height, pages: vec![PageSpec::default()] }
    }

    fn current(&mut self) -> &mut PageSpec {
        if self.pages.is_empty() {
            self.pages.push(PageSpec::default());
        }
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    fn show(mut self, font: &str, x: f32, y: f32, size: f32, text: &str) -> Self {
        let page = self.current();
        page.operations.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(font.as_bytes().to_vec()), num(size)]),
            Operation::new("Td", vec![num(x), num(y)]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ]);
        self
    }

    /// Regular text with its baseline at `(x, y)` in PDF user space.
    pub fn text(self, x: f32, y: f32, size: f32, text: &str) -> Self {
        self.show("F1", x, y, size, text)
    }

    pub fn bold_text(self, x: f32, y: f32, size: f32, text: &str) -> Self {
        self.show("F2", x, y, size, text)
    }

    /// Lines stacked downwards from `top` with the given leading.
    pub fn lines(mut self, x: f32, top: f32, size: f32, leading: f32, lines: &[&str]) -> Self {
        for (i, line) in lines.iter().enumerate() {
            self = self.text(x, top - leading * i as f32, size, line);
        }
        self
    }

    /// One text object per cell, columns `col_width` apart, rows `row_height` apart.
    pub fn table(
        mut self,
        x: f32,
        top: f32,
        col_width: f32,
        row_height: f32,
        size: f32,
        rows: &[&[&str]],
    ) -> Self {
        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                let cx = x + col_width * c as f32;
                let cy = top - row_height * r as f32;
                self = if r == 0 {
                    self.bold_text(cx, cy, size, cell)
                } else {
                    self.text(cx, cy, size, cell)
                };
            }
        }
        self
    }

    /// Draw an image into the rectangle with lower-left corner `(x, y)`.
    pub fn image(mut self, x: f32, y: f32, w: f32, h: f32, image: TestImage) -> Self {
        let page = self.current();
        let name = format!("Im{}", page.images.len() + 1);
        page.images.push(image);
        page.operations.extend([
            Operation::new("q", vec![]),
            Operation::new("cm", vec![num(w), num(0.0), num(0.0), num(h), num(x), num(y)]),
            Operation::new("Do", vec![Object::Name(name.into_bytes())]),
            Operation::new("Q", vec![]),
        ]);
        self
    }

    pub fn new_page(mut self) -> Self {
        self.pages.push(PageSpec::default());
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let regular = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let bold = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica-Bold",
        });

        let mut kids = Vec::new();
        for page in self.pages {
            let mut xobjects = Dictionary::new();
            for (i, image) in page.images.into_iter().enumerate() {
                let stream = Stream::new(
                    dictionary! {
                        "Type" => "XObject",
                        "Subtype" => "Image",
                        "Width" => Object::Integer(image.width as i64),
                        "Height" => Object::Integer(image.height as i64),
                        "ColorSpace" => "DeviceRGB",
                        "BitsPerComponent" => Object::Integer(8),
                    },
                    image.pixels,
                );
                let id = doc.add_object(stream);
                xobjects.set(format!("Im{}", i + 1), Object::Reference(id));
            }

            let content = Content { operations: page.operations };
            let content_id = doc.add_object(Stream::new(
                Dictionary::new(),
                content.encode().unwrap_or_default(),
            ));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => dictionary! {
                    "Font" => dictionary! {
                        "F1" => regular,
                        "F2" => bold,
                    },
                    "XObject" => xobjects,
                },
            });
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => Object::Integer(count),
                "MediaBox" => vec![num(0.0), num(0.0), num(self.width), num(self.height)],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }
}

/// One page of lorem-style words, `words` long, wrapped at `per_line` words.
pub(crate) fn word_lines(words: usize, per_line: usize, seed: usize) -> Vec<String> {
    const VOCAB: [&str; 8] = ["alpha", "bravo", "delta", "gamma", "sigma", "omega", "theta", "kappa"];
    let all: Vec<&str> = (0..words).map(|i| VOCAB[(i + seed) % VOCAB.len()]).collect();
    all.chunks(per_line).map(|chunk| chunk.join(" ")).collect()
}
