//! Segment types and location tracking

/// A byte range in a file (offset and size)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// Offset from start of file
    pub offset: u64,
    /// Size in bytes
    pub size: u64,
}

impl ByteRange {
    /// Create a new byte range
    pub fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }

    /// Get the end offset of this range
    pub fn end_offset(&self) -> u64 {
        self.offset + self.size
    }
}

/// Alias used by the JPEG parser for XMP chunk positions
pub type Location = ByteRange;

/// Maximum size for a reassembled XMP packet (100 MB)
///
/// Extended XMP declares its own total length; anything beyond this is
/// treated as a corrupt or hostile file.
pub const MAX_XMP_SIZE: u32 = 100 * 1024 * 1024;

/// Logical classification of a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    /// File header/signature
    Header,
    /// XMP metadata
    Xmp,
    /// Compressed image data
    ImageData,
    /// EXIF metadata
    Exif,
    /// Other/unknown segment type
    Other,
}

impl SegmentKind {
    /// Get a string representation of this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Header => "header",
            Self::Xmp => "xmp",
            Self::ImageData => "image_data",
            Self::Exif => "exif",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// JPEG Extended XMP reassembly information
///
/// Extended XMP chunks carry explicit offsets and must be placed into the
/// reassembled packet at those offsets, not just concatenated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedXmp {
    /// GUID identifying this XMP set (all parts share same GUID)
    pub guid: String,
    /// Offset where each extended chunk belongs in the reassembled XMP
    pub chunk_offsets: Vec<u32>,
    /// Total size of the complete extended XMP when reassembled
    pub total_size: u32,
}

/// A segment of a parsed JPEG
#[derive(Debug)]
pub enum Segment {
    /// SOI marker
    Header { offset: u64, size: u64 },

    /// XMP packet: `segments[0]` is the main packet, any further entries are
    /// extended XMP chunks described by `extended`
    Xmp {
        offset: u64,
        size: u64,
        segments: Vec<Location>,
        extended: Option<ExtendedXmp>,
    },

    /// EXIF APP1 segment, including marker and length
    Exif { offset: u64, size: u64 },

    /// SOS marker, scan header and entropy-coded data up to EOI
    ImageData { offset: u64, size: u64 },

    /// Any other marker segment, including marker and length
    Other {
        offset: u64,
        size: u64,
        label: &'static str,
    },
}

impl Segment {
    /// Logical kind of this segment
    pub fn kind(&self) -> SegmentKind {
        match self {
            Self::Header { .. } => SegmentKind::Header,
            Self::Xmp { .. } => SegmentKind::Xmp,
            Self::Exif { .. } => SegmentKind::Exif,
            Self::ImageData { .. } => SegmentKind::ImageData,
            Self::Other { .. } => SegmentKind::Other,
        }
    }

    /// Location of this segment
    ///
    /// For XMP this is the main packet payload (without marker and signature).
    /// Every other kind includes its marker bytes.
    pub fn location(&self) -> ByteRange {
        match self {
            Self::Header { offset, size }
            | Self::Xmp { offset, size, .. }
            | Self::Exif { offset, size }
            | Self::ImageData { offset, size }
            | Self::Other { offset, size, .. } => ByteRange::new(*offset, *size),
        }
    }

    /// Check if this is an XMP segment
    pub fn is_xmp(&self) -> bool {
        self.kind() == SegmentKind::Xmp
    }

    /// Check if this is an application (APPn) marker segment
    ///
    /// Metadata inserted into a JPEG belongs in the run of APPn segments that
    /// follows SOI.
    pub fn is_app_marker(&self) -> bool {
        match self {
            Self::Xmp { .. } | Self::Exif { .. } => true,
            Self::Other { label, .. } => label.starts_with("APP"),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_marker_classification() {
        let app0 = Segment::Other {
            offset: 2,
            size: 18,
            label: "APP0",
        };
        let dqt = Segment::Other {
            offset: 20,
            size: 69,
            label: "DQT",
        };
        assert!(app0.is_app_marker());
        assert!(Segment::Exif { offset: 2, size: 30 }.is_app_marker());
        assert!(!dqt.is_app_marker());
        assert!(!Segment::ImageData { offset: 90, size: 100 }.is_app_marker());
    }

    #[test]
    fn test_location() {
        let seg = Segment::ImageData {
            offset: 100,
            size: 50,
        };
        assert_eq!(seg.location(), ByteRange::new(100, 50));
        assert_eq!(seg.location().end_offset(), 150);
        assert_eq!(seg.kind().to_string(), "image_data");
    }
}
