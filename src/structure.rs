//! Structure representation for parsed photos

use crate::{
    error::Result,
    segment::{ByteRange, Segment},
    MediaType,
};
use std::io::{Read, Seek, SeekFrom};

/// Represents the discovered structure of a parsed JPEG
///
/// This structure works with any `Read + Seek` source (files, buffers, streams).
/// It records the segment layout up to and including EOI, plus how many bytes
/// the source holds past that point.
#[derive(Debug)]
pub struct Structure {
    /// All segments in the image, SOI through EOI
    pub segments: Vec<Segment>,

    /// Media type - what the content represents
    pub media_type: MediaType,

    /// Size of the image itself (offset just past the EOI marker)
    pub total_size: u64,

    /// Size of the whole source, including anything appended after EOI
    pub source_size: u64,

    /// Quick lookup: index of XMP segment (if any)
    xmp_index: Option<usize>,
}

impl Structure {
    /// Create a new, empty structure for the given media type
    pub fn new(media_type: MediaType) -> Self {
        Self {
            segments: Vec::new(),
            media_type,
            total_size: 0,
            source_size: 0,
            xmp_index: None,
        }
    }

    /// Add a segment and update indices
    pub fn add_segment(&mut self, segment: Segment) {
        if segment.is_xmp() {
            self.xmp_index = Some(self.segments.len());
        }
        self.segments.push(segment);
    }

    /// Index of the XMP segment, if the image has one
    pub fn xmp_index(&self) -> Option<usize> {
        self.xmp_index
    }

    /// Get reference to segments
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of bytes stored after the EOI marker
    ///
    /// For a motion photo this is the embedded video.
    pub fn trailing_size(&self) -> u64 {
        self.source_size.saturating_sub(self.total_size)
    }

    /// Range of the bytes stored after the EOI marker
    pub fn trailing_range(&self) -> ByteRange {
        ByteRange::new(self.total_size, self.trailing_size())
    }

    /// Read a specific byte range from the source
    pub fn read_range<R: Read + Seek>(&self, source: &mut R, range: ByteRange) -> Result<Vec<u8>> {
        source.seek(SeekFrom::Start(range.offset))?;
        let mut buffer = vec![0u8; range.size as usize];
        source.read_exact(&mut buffer)?;
        Ok(buffer)
    }
}
