//! Zip packaging of an assembled [`Archive`].

use super::Archive;
use crate::error::Result;
use std::io::{Seek, Write};
use tracing::debug;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Write every entry, in path order, as a deflated member. Returns the
/// underlying writer once the central directory is written.
pub fn write_zip<W: Write + Seek>(archive: &Archive, writer: W) -> Result<W> {
    let mut zip = ZipWriter::new(writer);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    for (path, content) in archive.iter() {
        zip.start_file(path, options)?;
        zip.write_all(content)?;
    }

    debug!(root = %archive.root(), entries = archive.len(), "wrote zip archive");
    Ok(zip.finish()?)
}
