//! Lossless PDF size reduction.

use lopdf::Document;
use tracing::{debug, info};

use crate::error::{PdfError, Result};

/// Outcome of [`compress_pdf`].
#[derive(Debug, Clone)]
pub struct CompressionReport {
    pub original_size: usize,
    pub compressed_size: usize,
    pub bytes: Vec<u8>,
}

impl CompressionReport {
    /// Percentage of the original size saved, 0 when nothing was gained.
    pub fn savings_percent(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        (1.0 - self.compressed_size as f64 / self.original_size as f64) * 100.0
    }
}

/// Prune unreferenced objects, drop empty streams, deflate the rest and
/// renumber. The input comes back unchanged when that does not shrink it.
pub fn compress_pdf(data: &[u8]) -> Result<CompressionReport> {
    let mut doc = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;
    if doc.is_encrypted() {
        return Err(PdfError::Encrypted.into());
    }
    if doc.get_pages().is_empty() {
        return Err(PdfError::NoPages.into());
    }

    let pruned = doc.prune_objects();
    let emptied = doc.delete_zero_length_streams();
    debug!("Pruned {} objects and {} empty streams", pruned.len(), emptied.len());
    doc.compress();
    doc.renumber_objects();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;

    let original_size = data.len();
    if bytes.len() >= original_size {
        info!("Compression gained nothing ({} -> {} bytes), keeping original", original_size, bytes.len());
        return Ok(CompressionReport {
            original_size,
            compressed_size: original_size,
            bytes: data.to_vec(),
        });
    }

    info!("Compressed {} -> {} bytes", original_size, bytes.len());
    Ok(CompressionReport {
        original_size,
        compressed_size: bytes.len(),
        bytes,
    })
}
