//! Minimal PresentationML package writer.
//!
//! Produces one slide master, one blank layout and a theme, plus a slide per
//! [`SlideContent`]. Slides hold at most one text frame and any number of
//! pictures.

use std::fmt::Write as _;

use quick_xml::escape::escape;

use super::ooxml::PackageWriter;
use crate::error::WriterError;
use crate::geometry::inches_to_emu;

const NS: &str = concat!(
    r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" "#,
    r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" "#,
    r#"xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#
);
const REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const REL_TYPE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

/// A styled paragraph inside a text frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SlideParagraph {
    pub text: String,
    pub size_pt: f32,
    pub bold: bool,
    pub italic: bool,
    pub font: String,
}

/// A picture placed in inches from the slide's top-left corner.
#[derive(Debug, Clone, PartialEq)]
pub struct SlidePicture {
    pub png: Vec<u8>,
    pub left_in: f32,
    pub top_in: f32,
    pub width_in: f32,
    pub height_in: f32,
}

/// Everything drawn on one slide.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlideContent {
    pub paragraphs: Vec<SlideParagraph>,
    pub pictures: Vec<SlidePicture>,
}

/// Collects slides and packages them.
pub struct DeckBuilder {
    width_in: f32,
    height_in: f32,
    margin_in: f32,
    paragraph_spacing_pt: f32,
    slides: Vec<SlideContent>,
}

impl DeckBuilder {
    pub fn new(width_in: f32, height_in: f32, margin_in: f32) -> Self {
        Self {
            width_in,
            height_in,
            margin_in,
            paragraph_spacing_pt: 8.0,
            slides: Vec::new(),
        }
    }

    pub fn add_slide(&mut self, slide: SlideContent) {
        self.slides.push(slide);
    }

    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }

    pub fn finish(self) -> Result<Vec<u8>, WriterError> {
        if self.slides.is_empty() {
            return Err(WriterError::Slides("deck has no slides".to_string()));
        }

        let mut package = PackageWriter::new();
        package.add("[Content_Types].xml", self.content_types().as_bytes())?;
        package.add("_rels/.rels", root_rels().as_bytes())?;
        package.add("ppt/presentation.xml", self.presentation().as_bytes())?;
        package.add("ppt/_rels/presentation.xml.rels", self.presentation_rels().as_bytes())?;
        package.add("ppt/slideMasters/slideMaster1.xml", SLIDE_MASTER.as_bytes())?;
        package.add(
            "ppt/slideMasters/_rels/slideMaster1.xml.rels",
            rels(&[
                ("rId1", "slideLayout", "../slideLayouts/slideLayout1.xml"),
                ("rId2", "theme", "../theme/theme1.xml"),
            ])
            .as_bytes(),
        )?;
        package.add("ppt/slideLayouts/slideLayout1.xml", SLIDE_LAYOUT.as_bytes())?;
        package.add(
            "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
            rels(&[("rId1", "slideMaster", "../slideMasters/slideMaster1.xml")]).as_bytes(),
        )?;
        package.add("ppt/theme/theme1.xml", THEME.as_bytes())?;

        let mut media = 0usize;
        for (i, slide) in self.slides.iter().enumerate() {
            let number = i + 1;
            let mut targets = vec![("rId1".to_string(), "slideLayout", "../slideLayouts/slideLayout1.xml".to_string())];
            for picture in &slide.pictures {
                media += 1;
                let name = format!("image{}.png", media);
                package.add(&format!("ppt/media/{}", name), &picture.png)?;
                targets.push((format!("rId{}", targets.len() + 1), "image", format!("../media/{}", name)));
            }

            let slide_rels: Vec<(&str, &str, &str)> = targets
                .iter()
                .map(|(id, kind, target)| (id.as_str(), *kind, target.as_str()))
                .collect();
            package.add(&format!("ppt/slides/slide{}.xml", number), self.slide_xml(slide).as_bytes())?;
            package.add(
                &format!("ppt/slides/_rels/slide{}.xml.rels", number),
                rels(&slide_rels).as_bytes(),
            )?;
        }

        package.finish()
    }

    fn content_types(&self) -> String {
        let mut xml = String::from(XML_DECL);
        xml.push_str(r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#);
        xml.push_str(r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#);
        xml.push_str(r#"<Default Extension="xml" ContentType="application/xml"/>"#);
        xml.push_str(r#"<Default Extension="png" ContentType="image/png"/>"#);
        xml.push_str(r#"<Override PartName="/ppt/presentation.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"/>"#);
        xml.push_str(r#"<Override PartName="/ppt/slideMasters/slideMaster1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml"/>"#);
        xml.push_str(r#"<Override PartName="/ppt/slideLayouts/slideLayout1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml"/>"#);
        xml.push_str(r#"<Override PartName="/ppt/theme/theme1.xml" ContentType="application/vnd.openxmlformats-officedocument.theme+xml"/>"#);
        for i in 1..=self.slides.len() {
            let _ = write!(
                xml,
                r#"<Override PartName="/ppt/slides/slide{}.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/>"#,
                i
            );
        }
        xml.push_str("</Types>");
        xml
    }

    fn presentation(&self) -> String {
        let mut xml = format!("{}<p:presentation {}>", XML_DECL, NS);
        xml.push_str(r#"<p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst><p:sldIdLst>"#);
        for i in 0..self.slides.len() {
            let _ = write!(xml, r#"<p:sldId id="{}" r:id="rId{}"/>"#, 256 + i, i + 3);
        }
        let _ = write!(
            xml,
            r#"</p:sldIdLst><p:sldSz cx="{}" cy="{}"/><p:notesSz cx="6858000" cy="9144000"/></p:presentation>"#,
            inches_to_emu(self.width_in),
            inches_to_emu(self.height_in)
        );
        xml
    }

    fn presentation_rels(&self) -> String {
        let slides: Vec<(String, String)> = (1..=self.slides.len())
            .map(|i| (format!("rId{}", i + 2), format!("slides/slide{}.xml", i)))
            .collect();
        let mut entries = vec![
            ("rId1", "slideMaster", "slideMasters/slideMaster1.xml"),
            ("rId2", "theme", "theme/theme1.xml"),
        ];
        entries.extend(slides.iter().map(|(id, target)| (id.as_str(), "slide", target.as_str())));
        rels(&entries)
    }

    fn slide_xml(&self, slide: &SlideContent) -> String {
        let mut xml = format!("{}<p:sld {}><p:cSld><p:spTree>", XML_DECL, NS);
        xml.push_str(r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>"#);

        let mut shape_id = 2;
        if !slide.paragraphs.is_empty() {
            let margin = inches_to_emu(self.margin_in);
            let width = inches_to_emu(self.width_in - 2.0 * self.margin_in);
            let height = inches_to_emu(self.height_in - 2.0 * self.margin_in);
            let _ = write!(
                xml,
                r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="TextBox {id}"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr><p:spPr><a:xfrm><a:off x="{m}" y="{m}"/><a:ext cx="{w}" cy="{h}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom><a:noFill/></p:spPr><p:txBody><a:bodyPr wrap="square" rtlCol="0"><a:normAutofit/></a:bodyPr><a:lstStyle/>"#,
                id = shape_id,
                m = margin,
                w = width,
                h = height
            );
            for paragraph in &slide.paragraphs {
                let _ = write!(
                    xml,
                    r#"<a:p><a:pPr><a:spcAft><a:spcPts val="{}"/></a:spcAft></a:pPr><a:r><a:rPr lang="en-US" sz="{}" b="{}" i="{}" dirty="0"><a:latin typeface="{}"/></a:rPr><a:t>{}</a:t></a:r></a:p>"#,
                    (self.paragraph_spacing_pt * 100.0).round() as u32,
                    (paragraph.size_pt * 100.0).round() as u32,
                    paragraph.bold as u8,
                    paragraph.italic as u8,
                    escape(paragraph.font.as_str()),
                    escape(paragraph.text.as_str())
                );
            }
            xml.push_str("</p:txBody></p:sp>");
            shape_id += 1;
        }

        for (i, picture) in slide.pictures.iter().enumerate() {
            let _ = write!(
                xml,
                r#"<p:pic><p:nvPicPr><p:cNvPr id="{id}" name="Picture {id}"/><p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="rId{rel}"/><a:stretch><a:fillRect/></a:stretch></p:blipFill><p:spPr><a:xfrm><a:off x="{x}" y="{y}"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr></p:pic>"#,
                id = shape_id,
                rel = i + 2,
                x = inches_to_emu(picture.left_in),
                y = inches_to_emu(picture.top_in),
                cx = inches_to_emu(picture.width_in),
                cy = inches_to_emu(picture.height_in)
            );
            shape_id += 1;
        }

        xml.push_str(r#"</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#);
        xml
    }
}

fn root_rels() -> String {
    rels(&[("rId1", "officeDocument", "ppt/presentation.xml")])
}

fn rels(entries: &[(&str, &str, &str)]) -> String {
    let mut xml = format!(r#"{}<Relationships xmlns="{}">"#, XML_DECL, REL_NS);
    for (id, kind, target) in entries {
        let _ = write!(xml, r#"<Relationship Id="{}" Type="{}/{}" Target="{}"/>"#, id, REL_TYPE, kind, target);
    }
    xml.push_str("</Relationships>");
    xml
}

const SLIDE_MASTER: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<p:sldMaster xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main">"#,
    r#"<p:cSld><p:bg><p:bgRef idx="1001"><a:schemeClr val="bg1"/></p:bgRef></p:bg><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/></p:spTree></p:cSld>"#,
    r#"<p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/>"#,
    r#"<p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="rId1"/></p:sldLayoutIdLst>"#,
    r#"</p:sldMaster>"#
);

const SLIDE_LAYOUT: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<p:sldLayout xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" type="blank" preserve="1">"#,
    r#"<p:cSld name="Blank"><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/></p:spTree></p:cSld>"#,
    r#"<p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>"#
);

const THEME: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="Reflow"><a:themeElements>"#,
    r#"<a:clrScheme name="Reflow">"#,
    r#"<a:dk1><a:sysClr val="windowText" lastClr="000000"/></a:dk1><a:lt1><a:sysClr val="window" lastClr="FFFFFF"/></a:lt1>"#,
    r#"<a:dk2><a:srgbClr val="44546A"/></a:dk2><a:lt2><a:srgbClr val="E7E6E6"/></a:lt2>"#,
    r#"<a:accent1><a:srgbClr val="4472C4"/></a:accent1><a:accent2><a:srgbClr val="ED7D31"/></a:accent2>"#,
    r#"<a:accent3><a:srgbClr val="A5A5A5"/></a:accent3><a:accent4><a:srgbClr val="FFC000"/></a:accent4>"#,
    r#"<a:accent5><a:srgbClr val="5B9BD5"/></a:accent5><a:accent6><a:srgbClr val="70AD47"/></a:accent6>"#,
    r#"<a:hlink><a:srgbClr val="0563C1"/></a:hlink><a:folHlink><a:srgbClr val="954F72"/></a:folHlink>"#,
    r#"</a:clrScheme>"#,
    r#"<a:fontScheme name="Reflow"><a:majorFont><a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/></a:majorFont>"#,
    r#"<a:minorFont><a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/></a:minorFont></a:fontScheme>"#,
    r#"<a:fmtScheme name="Reflow">"#,
    r#"<a:fillStyleLst><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:fillStyleLst>"#,
    r#"<a:lnStyleLst><a:ln w="6350"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln><a:ln w="12700"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln><a:ln w="19050"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln></a:lnStyleLst>"#,
    r#"<a:effectStyleLst><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle></a:effectStyleLst>"#,
    r#"<a:bgFillStyleLst><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:bgFillStyleLst>"#,
    r#"</a:fmtScheme></a:themeElements></a:theme>"#
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writers::ooxml::{part_names, read_part};

    fn paragraph(text: &str) -> SlideParagraph {
        SlideParagraph {
            text: text.to_string(),
            size_pt: 18.0,
            bold: true,
            italic: false,
            font: "Calibri".to_string(),
        }
    }

    #[test]
    fn test_deck_parts() {
        let mut deck = DeckBuilder::new(10.0, 7.5, 0.5);
        deck.add_slide(SlideContent { paragraphs: vec![paragraph("Q1 & Q2 <results>")], pictures: vec![] });
        deck.add_slide(SlideContent {
            paragraphs: vec![],
            pictures: vec![SlidePicture { png: vec![0x89, b'P'], left_in: 0.5, top_in: 5.5, width_in: 9.0, height_in: 1.0 }],
        });
        assert_eq!(deck.slide_count(), 2);

        let bytes = deck.finish().unwrap();
        let names = part_names(&bytes).unwrap();
        for part in ["ppt/slides/slide1.xml", "ppt/slides/slide2.xml", "ppt/media/image1.png", "ppt/theme/theme1.xml"] {
            assert!(names.iter().any(|n| n == part), "missing {part}");
        }

        let presentation = read_part(&bytes, "ppt/presentation.xml").unwrap();
        assert!(presentation.contains(r#"<p:sldSz cx="9144000" cy="6858000"/>"#));
        assert!(presentation.contains(r#"r:id="rId4""#));

        let slide = read_part(&bytes, "ppt/slides/slide1.xml").unwrap();
        assert!(slide.contains("Q1 &amp; Q2 &lt;results&gt;"));
        assert!(slide.contains(r#"sz="1800" b="1" i="0""#));

        let rels = read_part(&bytes, "ppt/slides/_rels/slide2.xml.rels").unwrap();
        assert!(rels.contains("../media/image1.png"));
    }

    #[test]
    fn test_empty_deck_rejected() {
        assert!(DeckBuilder::new(10.0, 7.5, 0.5).finish().is_err());
    }
}
