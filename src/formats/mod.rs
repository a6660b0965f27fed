//! Container-specific I/O implementations
//!
//! A container I/O implementation knows how to parse one file structure,
//! pull the main XMP packet out of it, and stream it back out with updates applied.

use crate::{error::Result, structure::Structure, MediaType, Updates};
use std::io::{Read, Seek, Write};

pub mod jpeg_io;

/// Trait for container-specific I/O operations
pub trait ContainerIO: Send + Sync {
    /// Media types this I/O implementation can read/write
    fn supported_media_types() -> &'static [MediaType]
    where
        Self: Sized;

    /// Parse file structure in single pass
    ///
    /// This discovers all segments and the XMP location without loading the
    /// actual data into memory.
    fn parse<R: Read + Seek>(&self, source: &mut R) -> Result<Structure>;

    /// Write file with updates in single streaming pass
    ///
    /// This streams from the source to destination, applying updates
    /// without loading the entire file into memory.
    fn write<R: Read + Seek, W: Write>(
        &self,
        structure: &Structure,
        source: &mut R,
        writer: &mut W,
        updates: &Updates,
    ) -> Result<()>;

    /// Read the main XMP packet (container-specific)
    ///
    /// Containers that split large packets, like JPEG's extended XMP, expose
    /// the extra parts separately.
    fn read_xmp<R: Read + Seek>(
        &self,
        structure: &Structure,
        source: &mut R,
    ) -> Result<Option<Vec<u8>>>;
}
