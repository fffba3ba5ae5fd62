//! Raster image export in about twenty formats.
//!
//! Formats fall into three groups. Native formats are encoded in-process.
//! Modern formats need an optional codec, and professional formats need
//! ImageMagick. When either is missing the page is written as PNG instead and
//! the downgrade is logged and reported.

use std::fmt;
use std::io::{Cursor, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::str::FromStr;
use std::thread;
use std::time::{Duration, Instant};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use tracing::{debug, info, warn};
use zip::ZipWriter;

use crate::capabilities::Capabilities;
use crate::error::{ReflowError, Result, WriterError};
use crate::geometry::POINTS_PER_INCH;
use crate::pdf::PdfProcessor;
use crate::writers::ooxml::entry_options;

const TOOL_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How a format gets encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatGroup {
    Native,
    Modern,
    Professional,
}

/// Image export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageTarget {
    Png,
    Jpeg,
    Webp,
    Gif,
    Bmp,
    Tiff,
    Svg,
    Avif,
    Heif,
    Heic,
    Psd,
    Xcf,
    Ai,
    Eps,
    Wmf,
    Emf,
    Raw,
    Dng,
    Ico,
    Icns,
}

impl ImageTarget {
    pub const ALL: [ImageTarget; 20] = [
        Self::Png,
        Self::Jpeg,
        Self::Webp,
        Self::Gif,
        Self::Bmp,
        Self::Tiff,
        Self::Svg,
        Self::Avif,
        Self::Heif,
        Self::Heic,
        Self::Psd,
        Self::Xcf,
        Self::Ai,
        Self::Eps,
        Self::Wmf,
        Self::Emf,
        Self::Raw,
        Self::Dng,
        Self::Ico,
        Self::Icns,
    ];

    pub fn group(&self) -> FormatGroup {
        match self {
            Self::Png | Self::Jpeg | Self::Webp | Self::Gif | Self::Bmp | Self::Tiff | Self::Svg => {
                FormatGroup::Native
            }
            Self::Avif | Self::Heif | Self::Heic => FormatGroup::Modern,
            _ => FormatGroup::Professional,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Webp => "webp",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
            Self::Tiff => "tiff",
            Self::Svg => "svg",
            Self::Avif => "avif",
            Self::Heif => "heif",
            Self::Heic => "heic",
            Self::Psd => "psd",
            Self::Xcf => "xcf",
            Self::Ai => "ai",
            Self::Eps => "eps",
            Self::Wmf => "wmf",
            Self::Emf => "emf",
            Self::Raw => "raw",
            Self::Dng => "dng",
            Self::Ico => "ico",
            Self::Icns => "icns",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
            Self::Gif => "image/gif",
            Self::Bmp => "image/bmp",
            Self::Tiff => "image/tiff",
            Self::Svg => "image/svg+xml",
            Self::Avif => "image/avif",
            Self::Heif => "image/heif",
            Self::Heic => "image/heic",
            Self::Psd => "image/vnd.adobe.photoshop",
            Self::Ai => "application/postscript",
            Self::Eps => "application/postscript",
            Self::Wmf => "image/wmf",
            Self::Emf => "image/emf",
            Self::Ico => "image/x-icon",
            Self::Icns => "image/icns",
            Self::Xcf | Self::Raw | Self::Dng => "application/octet-stream",
        }
    }

    /// Whether `quality` affects the encoding.
    pub fn is_lossy(&self) -> bool {
        matches!(self, Self::Jpeg | Self::Avif | Self::Heif | Self::Heic)
    }
}

impl fmt::Display for ImageTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ImageTarget {
    type Err = ReflowError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().trim_start_matches('.').to_ascii_lowercase();
        let target = match normalized.as_str() {
            "jpeg" => Self::Jpeg,
            "tif" => Self::Tiff,
            other => Self::ALL
                .into_iter()
                .find(|t| t.extension() == other)
                .ok_or_else(|| ReflowError::UnsupportedFormat(format!("image format '{}'", s)))?,
        };
        Ok(target)
    }
}

/// Encoding settings for one export.
#[derive(Debug, Clone)]
pub struct ImageSettings {
    pub target: ImageTarget,
    pub dpi: u32,
    /// 1-100, for lossy formats.
    pub quality: u8,
    pub tool_timeout: Duration,
}

/// One encoded page.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    /// The format actually written.
    pub format: ImageTarget,
}

/// Result of an image export.
#[derive(Debug, Clone)]
pub struct ImageExport {
    pub bytes: Vec<u8>,
    pub extension: String,
    pub mime_type: String,
    /// PNG when any page was downgraded.
    pub effective_format: ImageTarget,
    /// Whether `bytes` is a ZIP of every page.
    pub archived: bool,
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    image.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)?;
    Ok(out)
}

fn encode_native(image: &DynamicImage, target: ImageTarget, quality: u8) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    match target {
        ImageTarget::Png => return encode_png(image),
        ImageTarget::Jpeg => {
            let rgb = image.to_rgb8();
            JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100)).encode_image(&rgb)?;
        }
        ImageTarget::Webp => {
            debug!("WebP is encoded lossless; quality {} ignored", quality);
            DynamicImage::ImageRgba8(image.to_rgba8()).write_to(&mut Cursor::new(&mut out), ImageFormat::WebP)?;
        }
        ImageTarget::Gif => {
            DynamicImage::ImageRgba8(image.to_rgba8()).write_to(&mut Cursor::new(&mut out), ImageFormat::Gif)?;
        }
        ImageTarget::Bmp => {
            DynamicImage::ImageRgb8(image.to_rgb8()).write_to(&mut Cursor::new(&mut out), ImageFormat::Bmp)?;
        }
        ImageTarget::Tiff => {
            DynamicImage::ImageRgb8(image.to_rgb8()).write_to(&mut Cursor::new(&mut out), ImageFormat::Tiff)?;
        }
        ImageTarget::Svg => {
            let png = encode_png(image)?;
            let (w, h) = (image.width(), image.height());
            out = format!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
                 <svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">\n\
                 <image width=\"{w}\" height=\"{h}\" href=\"data:image/png;base64,{}\"/>\n</svg>\n",
                BASE64.encode(&png)
            )
            .into_bytes();
        }
        other => {
            return Err(ReflowError::UnsupportedFormat(format!("{} is not a native format", other)));
        }
    }
    Ok(out)
}

#[cfg(feature = "avif")]
fn encode_avif(image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    use image::codecs::avif::AvifEncoder;
    use image::ImageEncoder;

    let mut out = Vec::new();
    let rgba = image.to_rgba8();
    AvifEncoder::new_with_speed_quality(&mut out, 8, quality.clamp(1, 100)).write_image(
        rgba.as_raw(),
        rgba.width(),
        rgba.height(),
        image::ExtendedColorType::Rgba8,
    )?;
    Ok(out)
}

#[cfg(not(feature = "avif"))]
fn encode_avif(_image: &DynamicImage, _quality: u8) -> Result<Vec<u8>> {
    Err(ReflowError::missing("avif", "built without the avif feature"))
}

/// Run ImageMagick on a PNG, killing it after `timeout`.
fn run_image_tool(tool: &Path, png: &[u8], target: ImageTarget, timeout: Duration) -> Result<Vec<u8>> {
    let workdir = tempfile::Builder::new().prefix("reflow-image-").tempdir()?;
    let input = workdir.path().join("page.png");
    let output = workdir.path().join(format!("page.{}", target.extension()));
    std::fs::File::create(&input)?.write_all(png)?;

    let destination = match target {
        ImageTarget::Psd | ImageTarget::Ai | ImageTarget::Eps => {
            format!("{}:{}", target.extension(), output.display())
        }
        _ => output.display().to_string(),
    };

    let mut child = Command::new(tool)
        .arg(&input)
        .arg(&destination)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| ReflowError::strategy("image-tool", format!("failed to start {}: {}", tool.display(), e)))?;

    let started = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if started.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ReflowError::strategy(
                "image-tool",
                format!("timed out after {}s", timeout.as_secs()),
            ));
        }
        thread::sleep(TOOL_POLL_INTERVAL);
    };

    if !status.success() {
        return Err(ReflowError::strategy("image-tool", format!("exited with {}", status)));
    }
    let bytes = std::fs::read(&output)?;
    if bytes.is_empty() {
        return Err(ReflowError::OutputVerification {
            strategy: "image-tool".to_string(),
            reason: format!("{} output is empty", target),
        });
    }
    Ok(bytes)
}

fn downgrade(image: &DynamicImage, target: ImageTarget, reason: &str) -> Result<EncodedImage> {
    warn!("{} unavailable ({}), writing PNG instead", target.extension().to_uppercase(), reason);
    Ok(EncodedImage { bytes: encode_png(image)?, format: ImageTarget::Png })
}

/// Encode one rendered page, downgrading to PNG when the target cannot be produced.
pub fn encode_page(image: &DynamicImage, settings: &ImageSettings, capabilities: &Capabilities) -> Result<EncodedImage> {
    let target = settings.target;
    match target.group() {
        FormatGroup::Native => Ok(EncodedImage {
            bytes: encode_native(image, target, settings.quality)?,
            format: target,
        }),
        FormatGroup::Modern => {
            if target == ImageTarget::Avif && capabilities.avif {
                match encode_avif(image, settings.quality) {
                    Ok(bytes) => Ok(EncodedImage { bytes, format: target }),
                    Err(e) => downgrade(image, target, &e.to_string()),
                }
            } else {
                downgrade(image, target, "no codec in this build")
            }
        }
        FormatGroup::Professional => match capabilities.image_tool.as_deref() {
            Some(tool) => {
                let png = encode_png(image)?;
                match run_image_tool(tool, &png, target, settings.tool_timeout) {
                    Ok(bytes) => Ok(EncodedImage { bytes, format: target }),
                    Err(e) => {
                        warn!("ImageMagick failed for {}: {}", target, e);
                        Ok(EncodedImage { bytes: png, format: ImageTarget::Png })
                    }
                }
            }
            None => downgrade(image, target, "ImageMagick not installed"),
        },
    }
}

fn render(pdf: &dyn PdfProcessor, index: usize, dpi: u32) -> Result<DynamicImage> {
    pdf.render_page(index, dpi as f32 / POINTS_PER_INCH)
        .map_err(|e| ReflowError::strategy("render", e))
}

/// Export one page (1-based) or, without a page, every page as a ZIP archive.
pub fn pdf_to_images(
    pdf: &dyn PdfProcessor,
    stem: &str,
    page: Option<usize>,
    settings: &ImageSettings,
    capabilities: &Capabilities,
) -> Result<ImageExport> {
    let count = pdf.page_count();
    if !capabilities.full_renderer {
        warn!("No full renderer in this build, page text is drawn as placeholder bars");
    }

    if let Some(page) = page {
        if page == 0 || page > count {
            return Err(ReflowError::Config(format!("page {} is outside 1..={}", page, count)));
        }
        let encoded = encode_page(&render(pdf, page - 1, settings.dpi)?, settings, capabilities)?;
        info!("Exported page {} as {}", page, encoded.format);
        return Ok(ImageExport {
            extension: encoded.format.extension().to_string(),
            mime_type: encoded.format.mime_type().to_string(),
            effective_format: encoded.format,
            bytes: encoded.bytes,
            archived: false,
        });
    }

    let mut archive = ZipWriter::new(Cursor::new(Vec::new()));
    let mut effective = settings.target;
    for index in 0..count {
        let encoded = encode_page(&render(pdf, index, settings.dpi)?, settings, capabilities)?;
        if encoded.format != settings.target {
            effective = encoded.format;
        }
        let name = format!("{}_page{}.{}", stem, index + 1, encoded.format.extension());
        archive.start_file(name, entry_options()).map_err(WriterError::from)?;
        archive.write_all(&encoded.bytes)?;
    }
    let bytes = archive.finish().map_err(WriterError::from)?.into_inner();
    info!("Exported {} pages as {} into a ZIP archive", count, effective);

    Ok(ImageExport {
        bytes,
        extension: "zip".to_string(),
        mime_type: "application/zip".to_string(),
        effective_format: effective,
        archived: true,
    })
}
