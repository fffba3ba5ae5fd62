//! Reading and rewriting parts of Office Open XML packages.

use std::io::{Cursor, Read, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::WriterError;

/// Default options for package entries.
pub fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}

/// Read one XML part of a package as UTF-8 text.
pub fn read_part(package: &[u8], name: &str) -> Result<String, WriterError> {
    let mut archive = ZipArchive::new(Cursor::new(package))?;
    let mut file = archive.by_name(name)?;
    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| WriterError::Xml(format!("failed to read {}: {}", name, e)))?;
    Ok(content)
}

/// Copy a package, replacing the contents of one part.
pub fn replace_part(package: &[u8], name: &str, content: &[u8]) -> Result<Vec<u8>, WriterError> {
    let mut archive = ZipArchive::new(Cursor::new(package))?;
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let mut replaced = false;

    for i in 0..archive.len() {
        let file = archive.by_index_raw(i)?;
        if file.name() == name {
            drop(file);
            writer.start_file(name, entry_options())?;
            writer.write_all(content).map_err(zip::result::ZipError::Io)?;
            replaced = true;
        } else {
            writer.raw_copy_file(file)?;
        }
    }

    if !replaced {
        return Err(WriterError::Xml(format!("package has no part {}", name)));
    }
    Ok(writer.finish()?.into_inner())
}

/// Incremental writer for a new package.
pub struct PackageWriter {
    zip: ZipWriter<Cursor<Vec<u8>>>,
}

impl PackageWriter {
    pub fn new() -> Self {
        Self { zip: ZipWriter::new(Cursor::new(Vec::new())) }
    }

    pub fn add(&mut self, name: &str, content: &[u8]) -> Result<(), WriterError> {
        self.zip.start_file(name, entry_options())?;
        self.zip.write_all(content).map_err(zip::result::ZipError::Io)?;
        Ok(())
    }

    pub fn finish(self) -> Result<Vec<u8>, WriterError> {
        Ok(self.zip.finish()?.into_inner())
    }
}

impl Default for PackageWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Names of all entries in a package.
pub fn part_names(package: &[u8]) -> Result<Vec<String>, WriterError> {
    let archive = ZipArchive::new(Cursor::new(package))?;
    Ok(archive.file_names().map(str::to_string).collect())
}
