//! Test utilities for building photo and video fixtures in memory.
//!
//! Fixtures are synthesized rather than loaded from disk so that every test
//! controls the exact bytes it checks against.
//!
//! # Usage
//!
//! ```
//! use motion_photo_muxer::test_utils::{video_bytes, JpegBuilder, SAMPLE_XMP};
//!
//! let photo = JpegBuilder::new().with_exif().with_xmp(SAMPLE_XMP).build();
//! assert_eq!(&photo[..2], &[0xFF, 0xD8]);
//!
//! let video = video_bytes(1024, 7);
//! assert_eq!(&video[4..8], b"ftyp");
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::formats::jpeg_io::{XMP_EXTENDED_SIGNATURE, XMP_SIGNATURE};

/// A small, well-formed XMP packet with a couple of properties
pub const SAMPLE_XMP: &str = r#"<?xpacket begin="" id="W5M0MpCehiHzreSzNTczkc9d"?>
<x:xmpmeta xmlns:x="adobe:ns:meta/">
  <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
    <rdf:Description rdf:about=""
      xmlns:dc="http://purl.org/dc/elements/1.1/"
      dc:format="image/jpeg"/>
  </rdf:RDF>
</x:xmpmeta>
<?xpacket end="w"?>"#;

/// Main packet of a photo that also carries extended XMP
///
/// The GUID is a placeholder; readers pair parts by the GUID in the segment
/// headers, not by this property.
pub const MAIN_WITH_EXTENDED_XMP: &str = r#"<?xpacket begin="" id="W5M0MpCehiHzreSzNTczkc9d"?>
<x:xmpmeta xmlns:x="adobe:ns:meta/">
  <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
    <rdf:Description rdf:about=""
      xmlns:dc="http://purl.org/dc/elements/1.1/"
      xmlns:xmpNote="http://ns.adobe.com/xmp/note/"
      dc:format="image/jpeg"
      xmpNote:HasExtendedXMP="00000000000000000000000000000000"/>
  </rdf:RDF>
</x:xmpmeta>
<?xpacket end="w"?>"#;

/// Extended packet as a portrait photo stores its depth map description
pub const SAMPLE_EXTENDED_XMP: &str = r#"<x:xmpmeta xmlns:x="adobe:ns:meta/">
  <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
    <rdf:Description rdf:about=""
      xmlns:GDepth="http://ns.google.com/photos/1.0/depthmap/"
      GDepth:Format="RangeInverse"
      GDepth:Mime="image/jpeg"/>
  </rdf:RDF>
</x:xmpmeta>"#;

/// Entropy-coded bytes with a stuffed 0xFF00 and a restart marker
const DEFAULT_SCAN: &[u8] = &[0x12, 0x34, 0xFF, 0x00, 0x56, 0xFF, 0xD0, 0x78, 0x9A];

/// Builds a structurally valid baseline JPEG
///
/// Layout: SOI, APP0 (JFIF), optional EXIF, optional XMP and extended XMP,
/// DQT, SOF0, SOS, scan data, EOI, then any trailer bytes.
#[derive(Debug, Clone)]
pub struct JpegBuilder {
    exif: bool,
    xmp: Option<String>,
    extended_xmp: Option<String>,
    scan: Vec<u8>,
    trailer: Vec<u8>,
}

impl Default for JpegBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl JpegBuilder {
    pub fn new() -> Self {
        Self {
            exif: false,
            xmp: None,
            extended_xmp: None,
            scan: DEFAULT_SCAN.to_vec(),
            trailer: Vec::new(),
        }
    }

    /// Add an APP1 EXIF segment with an empty big-endian IFD
    pub fn with_exif(mut self) -> Self {
        self.exif = true;
        self
    }

    /// Add an APP1 XMP segment holding `xmp`
    pub fn with_xmp(mut self, xmp: &str) -> Self {
        self.xmp = Some(xmp.to_string());
        self
    }

    /// Add one extended XMP part after the main packet
    pub fn with_extended_xmp(mut self, xmp: &str) -> Self {
        self.extended_xmp = Some(xmp.to_string());
        self
    }

    /// Replace the entropy-coded scan data
    pub fn with_scan(mut self, scan: Vec<u8>) -> Self {
        self.scan = scan;
        self
    }

    /// Bytes appended after EOI, as a motion photo stores its video
    pub fn with_trailer(mut self, trailer: Vec<u8>) -> Self {
        self.trailer = trailer;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = vec![0xFF, 0xD8];

        push_segment(
            &mut out,
            0xE0,
            &[b'J', b'F', b'I', b'F', 0, 1, 1, 0, 0, 1, 0, 1, 0, 0],
        );

        if self.exif {
            let mut payload = b"Exif\0\0".to_vec();
            payload.extend_from_slice(b"MM\0\x2A\0\0\0\x08");
            payload.extend_from_slice(&[0, 0, 0, 0, 0, 0]);
            push_segment(&mut out, 0xE1, &payload);
        }

        if let Some(xmp) = &self.xmp {
            let mut payload = XMP_SIGNATURE.to_vec();
            payload.extend_from_slice(xmp.as_bytes());
            push_segment(&mut out, 0xE1, &payload);
        }

        if let Some(xmp) = &self.extended_xmp {
            let mut payload = XMP_EXTENDED_SIGNATURE.to_vec();
            payload.extend_from_slice(format!("{:032X}", md5::compute(xmp)).as_bytes());
            payload.extend_from_slice(&(xmp.len() as u32).to_be_bytes());
            payload.extend_from_slice(&0u32.to_be_bytes());
            payload.extend_from_slice(xmp.as_bytes());
            push_segment(&mut out, 0xE1, &payload);
        }

        // One 8-bit quantization table
        let mut dqt = vec![0u8];
        dqt.extend_from_slice(&[1u8; 64]);
        push_segment(&mut out, 0xDB, &dqt);

        // 1x1 greyscale frame
        push_segment(&mut out, 0xC0, &[8, 0, 1, 0, 1, 1, 1, 0x11, 0]);

        push_segment(&mut out, 0xDA, &[1, 1, 0, 0, 0x3F, 0]);
        out.extend_from_slice(&self.scan);

        out.extend_from_slice(&[0xFF, 0xD9]);
        out.extend_from_slice(&self.trailer);
        out
    }
}

fn push_segment(out: &mut Vec<u8>, marker: u8, payload: &[u8]) {
    out.push(0xFF);
    out.push(marker);
    out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(payload);
}

/// Deterministic video-like payload of exactly `len` bytes
///
/// Begins with an ISO BMFF `ftyp` box when there is room for one; the rest
/// is a pattern derived from `seed` so different clips differ.
pub fn video_bytes(len: usize, seed: u8) -> Vec<u8> {
    let mut data = Vec::with_capacity(len.max(24));
    data.extend_from_slice(&[0, 0, 0, 24]);
    data.extend_from_slice(b"ftypmp42\0\0\0\0isommp42");
    let mut value = seed;
    while data.len() < len {
        data.push(value);
        value = value.wrapping_mul(31).wrapping_add(17);
    }
    data.truncate(len);
    data
}

/// Write `bytes` to `dir/name` and return the path
pub fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create fixture directory");
    }
    fs::write(&path, bytes).expect("write fixture");
    path
}

/// Write a photo and a video sharing `stem`, returning (photo, video)
pub fn write_pair(
    dir: &Path,
    stem: &str,
    photo_ext: &str,
    video_ext: &str,
    video_len: usize,
) -> (PathBuf, PathBuf) {
    let photo = write_file(
        dir,
        &format!("{}.{}", stem, photo_ext),
        &JpegBuilder::new().with_exif().build(),
    );
    let video = write_file(
        dir,
        &format!("{}.{}", stem, video_ext),
        &video_bytes(video_len, stem.len() as u8),
    );
    (photo, video)
}
