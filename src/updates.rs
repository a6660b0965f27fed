//! Updates applied when rewriting a photo

/// Metadata update strategy
///
/// Specifies how to handle the main XMP packet when rewriting a photo.
/// By default, existing metadata is kept unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MetadataUpdate {
    /// Keep existing metadata (default)
    #[default]
    Keep,
    /// Replace or add the main packet; extended XMP parts are copied as they are
    Set(Vec<u8>),
}

/// Updates to apply when writing a photo
///
/// This struct uses a builder pattern where the default is to keep all existing
/// metadata and every byte stored after the EOI marker unchanged.
///
/// # Example
///
/// ```
/// use motion_photo_muxer::{MetadataUpdate, Updates};
///
/// let updates = Updates::new().set_xmp(b"<x:xmpmeta/>".to_vec());
/// assert_eq!(updates.xmp, MetadataUpdate::Set(b"<x:xmpmeta/>".to_vec()));
/// assert_eq!(updates.drop_trailing, 0);
///
/// let updates = Updates::new().drop_trailing(4096);
/// assert_eq!(updates.drop_trailing, 4096);
/// ```
#[derive(Debug, Default)]
pub struct Updates {
    /// XMP data update strategy
    pub xmp: MetadataUpdate,

    /// Number of bytes cut from the end of the data stored after EOI
    pub drop_trailing: u64,
}

impl Updates {
    /// Create a new `Updates` builder that keeps everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the main XMP packet to a new value
    pub fn set_xmp(mut self, xmp: Vec<u8>) -> Self {
        self.xmp = MetadataUpdate::Set(xmp);
        self
    }

    /// Leave out the last `len` bytes stored after EOI, e.g. a previously
    /// embedded video
    pub fn drop_trailing(mut self, len: u64) -> Self {
        self.drop_trailing = len;
        self
    }
}
