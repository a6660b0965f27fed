//! JPEG container I/O implementation

use crate::{
    error::{Error, Result},
    segment::{ExtendedXmp, Location, Segment, MAX_XMP_SIZE},
    structure::Structure,
    ContainerIO, MediaType, MetadataUpdate, Updates,
};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{copy, Read, Seek, SeekFrom, Write};

// JPEG markers
const SOI: u8 = 0xD8; // Start of Image
const EOI: u8 = 0xD9; // End of Image
const APP1: u8 = 0xE1; // XMP / EXIF
const SOS: u8 = 0xDA; // Start of Scan (image data follows)
const TEM: u8 = 0x01;

// Special markers without length
const RST0: u8 = 0xD0;
const RST7: u8 = 0xD7;

pub(crate) const XMP_SIGNATURE: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";
pub(crate) const XMP_EXTENDED_SIGNATURE: &[u8] = b"http://ns.adobe.com/xmp/extension/\0";
const EXIF_SIGNATURE: &[u8] = b"Exif\0\0";
const MAX_MARKER_SIZE: usize = 65533; // Max payload for a JPEG marker segment

/// GUID + full length + chunk offset following the extended XMP signature
const EXTENDED_XMP_HEADER_SIZE: u64 = 32 + 4 + 4;

/// Get human-readable label for a JPEG marker
fn marker_label(marker: u8) -> &'static str {
    match marker {
        0xD8 => "SOI",
        0xD9 => "EOI",
        0xDA => "SOS",
        0xDB => "DQT",
        0xC0 => "SOF0",
        0xC2 => "SOF2",
        0xC4 => "DHT",
        0xDD => "DRI",
        0xFE => "COM",
        0xD0..=0xD7 => "RST",
        0xE0 => "APP0",
        0xE1 => "APP1",
        0xE2 => "APP2",
        0xE3 => "APP3",
        0xE4 => "APP4",
        0xE5 => "APP5",
        0xE6 => "APP6",
        0xE7 => "APP7",
        0xE8 => "APP8",
        0xE9 => "APP9",
        0xEA => "APP10",
        0xEB => "APP11",
        0xEC => "APP12",
        0xED => "APP13",
        0xEE => "APP14",
        0xEF => "APP15",
        _ => "OTHER",
    }
}

/// JPEG container I/O implementation
#[derive(Debug, Clone, Copy)]
pub struct JpegIO;

impl JpegIO {
    /// Create a new JPEG I/O implementation
    pub fn new() -> Self {
        Self
    }

    /// Detect if this is a JPEG file from header
    pub fn detect(header: &[u8]) -> bool {
        header.len() >= 2 && header[0] == 0xFF && header[1] == SOI
    }

    /// Read the main XMP packet
    fn read_xmp_impl<R: Read + Seek>(
        structure: &Structure,
        source: &mut R,
    ) -> Result<Option<Vec<u8>>> {
        let Some(Segment::Xmp { segments, .. }) = xmp_segment(structure) else {
            return Ok(None);
        };
        let Some(main) = segments.first() else {
            return Ok(None);
        };
        Ok(Some(structure.read_range(source, *main)?))
    }

    /// Reassemble the extended XMP packet from its parts using chunk offsets
    ///
    /// Returns `None` when the photo has no extended XMP. The main packet
    /// only points at it through `xmpNote:HasExtendedXMP`.
    pub fn read_extended_xmp<R: Read + Seek>(
        &self,
        structure: &Structure,
        source: &mut R,
    ) -> Result<Option<Vec<u8>>> {
        let Some(Segment::Xmp {
            segments,
            extended: Some(extended),
            ..
        }) = xmp_segment(structure)
        else {
            return Ok(None);
        };

        // segments[0] is the main packet, segments[1..] the extended parts
        let parts = segments.get(1..).unwrap_or_default();
        if parts.is_empty() || extended.chunk_offsets.len() != parts.len() {
            return Ok(None);
        }

        let mut extended_xmp = vec![0u8; extended.total_size as usize];
        for (segment, &chunk_offset) in parts.iter().zip(&extended.chunk_offsets) {
            let start = chunk_offset as usize;
            if start >= extended_xmp.len() {
                continue; // Skip malformed chunks
            }
            let end = (start + segment.size as usize).min(extended_xmp.len());
            source.seek(SeekFrom::Start(segment.offset))?;
            source.read_exact(&mut extended_xmp[start..end])?;
        }

        Ok(Some(extended_xmp))
    }

    /// Fast single-pass parser
    fn parse_impl<R: Read + Seek>(&self, source: &mut R) -> Result<Structure> {
        let mut structure = Structure::new(MediaType::Jpeg);

        source.seek(SeekFrom::Start(0))?;
        let mut soi = [0u8; 2];
        if source.read_exact(&mut soi).is_err() || !Self::detect(&soi) {
            return Err(Error::InvalidFormat("Not a JPEG file".into()));
        }

        structure.add_segment(Segment::Header { offset: 0, size: 2 });

        loop {
            let mut offset = source.stream_position()?;

            let marker_prefix = source.read_u8()?;
            if marker_prefix != 0xFF {
                return Err(Error::InvalidSegment {
                    offset,
                    reason: format!("Expected 0xFF, got 0x{:02X}", marker_prefix),
                });
            }

            // Fill bytes: the marker starts at the last 0xFF
            let mut marker = source.read_u8()?;
            while marker == 0xFF {
                offset += 1;
                marker = source.read_u8()?;
            }

            match marker {
                EOI => {
                    structure.add_segment(Segment::Other {
                        offset,
                        size: 2,
                        label: marker_label(EOI),
                    });
                    structure.total_size = offset + 2;
                    break;
                }

                SOS => {
                    let size = read_segment_length(source, offset)?;

                    // Skip SOS header
                    source.seek(SeekFrom::Start(offset + 2 + size))?;

                    // ImageData spans SOS marker, header, and every scan up to EOI
                    let image_end = find_eoi(source)?;
                    structure.add_segment(Segment::ImageData {
                        offset,
                        size: image_end - offset,
                    });

                    structure.add_segment(Segment::Other {
                        offset: image_end,
                        size: 2,
                        label: marker_label(EOI),
                    });

                    structure.total_size = image_end + 2;
                    break;
                }

                APP1 => {
                    let size = read_segment_length(source, offset)?;
                    let next = offset + 2 + size;
                    self.parse_app1(&mut structure, source, offset, size)?;
                    source.seek(SeekFrom::Start(next))?;
                }

                // Markers without a length field
                RST0..=RST7 | TEM => {
                    structure.add_segment(Segment::Other {
                        offset,
                        size: 2,
                        label: marker_label(marker),
                    });
                }

                _ => {
                    // Standard marker with length
                    let size = read_segment_length(source, offset)?;
                    structure.add_segment(Segment::Other {
                        offset,
                        size: size + 2,
                        label: marker_label(marker),
                    });
                    source.seek(SeekFrom::Start(offset + 2 + size))?;
                }
            }
        }

        structure.source_size = source.seek(SeekFrom::End(0))?;
        Ok(structure)
    }

    /// Classify one APP1 segment as XMP, extended XMP, EXIF, or other
    fn parse_app1<R: Read + Seek>(
        &self,
        structure: &mut Structure,
        source: &mut R,
        segment_start: u64,
        size: u64,
    ) -> Result<()> {
        let data_size = size - 2;

        // Read enough bytes to check both standard and extended XMP signatures
        let sig_len = XMP_EXTENDED_SIGNATURE.len().max(XMP_SIGNATURE.len());
        let bytes_to_read = sig_len.min(data_size as usize);
        let mut sig_buf = vec![0u8; bytes_to_read];
        source.read_exact(&mut sig_buf)?;

        if sig_buf.starts_with(XMP_SIGNATURE) {
            let xmp_offset = segment_start + 4 + XMP_SIGNATURE.len() as u64;
            let xmp_size = data_size - XMP_SIGNATURE.len() as u64;
            structure.add_segment(Segment::Xmp {
                offset: xmp_offset,
                size: xmp_size,
                segments: vec![Location::new(xmp_offset, xmp_size)],
                extended: None,
            });
        } else if sig_buf.starts_with(XMP_EXTENDED_SIGNATURE)
            && data_size >= XMP_EXTENDED_SIGNATURE.len() as u64 + EXTENDED_XMP_HEADER_SIZE
        {
            // Format: signature (35) + GUID (32) + full_length (4) + offset (4) + data
            let mut guid_bytes = [0u8; 32];
            source.read_exact(&mut guid_bytes)?;
            let guid = String::from_utf8_lossy(&guid_bytes).to_string();
            let total_size = source.read_u32::<BigEndian>()?;
            let chunk_offset = source.read_u32::<BigEndian>()?;
            if total_size > MAX_XMP_SIZE {
                return Err(Error::DataTooLarge {
                    size: total_size as usize,
                    max: MAX_XMP_SIZE as usize,
                });
            }

            let header_len = XMP_EXTENDED_SIGNATURE.len() as u64 + EXTENDED_XMP_HEADER_SIZE;
            let chunk = Location::new(segment_start + 4 + header_len, data_size - header_len);

            let attached = match structure.xmp_index() {
                Some(idx) => match &mut structure.segments[idx] {
                    Segment::Xmp {
                        segments, extended, ..
                    } => match extended {
                        Some(existing) => {
                            // Parts from a different XMP set are ignored
                            if existing.guid == guid && existing.total_size == total_size {
                                existing.chunk_offsets.push(chunk_offset);
                                segments.push(chunk);
                            }
                            true
                        }
                        None => {
                            *extended = Some(ExtendedXmp {
                                guid,
                                chunk_offsets: vec![chunk_offset],
                                total_size,
                            });
                            segments.push(chunk);
                            true
                        }
                    },
                    _ => false,
                },
                None => false,
            };

            if !attached {
                // Extended XMP without main XMP - malformed but handle gracefully
                structure.add_segment(Segment::Other {
                    offset: segment_start,
                    size: size + 2,
                    label: marker_label(APP1),
                });
            }
        } else if sig_buf.starts_with(EXIF_SIGNATURE) {
            structure.add_segment(Segment::Exif {
                offset: segment_start,
                size: size + 2,
            });
        } else {
            structure.add_segment(Segment::Other {
                offset: segment_start,
                size: size + 2,
                label: marker_label(APP1),
            });
        }

        Ok(())
    }
}

impl Default for JpegIO {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerIO for JpegIO {
    fn supported_media_types() -> &'static [MediaType] {
        &[MediaType::Jpeg]
    }

    fn parse<R: Read + Seek>(&self, source: &mut R) -> Result<Structure> {
        self.parse_impl(source)
    }

    fn read_xmp<R: Read + Seek>(
        &self,
        structure: &Structure,
        source: &mut R,
    ) -> Result<Option<Vec<u8>>> {
        Self::read_xmp_impl(structure, source)
    }

    fn write<R: Read + Seek, W: Write>(
        &self,
        structure: &Structure,
        source: &mut R,
        writer: &mut W,
        updates: &Updates,
    ) -> Result<()> {
        let trailing = structure.trailing_range();
        if updates.drop_trailing > trailing.size {
            return Err(Error::InvalidFormat(format!(
                "Cannot drop {} bytes, only {} are stored after EOI",
                updates.drop_trailing, trailing.size
            )));
        }

        source.seek(SeekFrom::Start(0))?;
        let mut current_read_pos = 0u64;

        let has_xmp = structure.xmp_index().is_some();
        let mut xmp_written = false;

        for segment in &structure.segments {
            match segment {
                Segment::Header { .. } => {
                    writer.write_u8(0xFF)?;
                    writer.write_u8(SOI)?;
                }

                Segment::Xmp {
                    segments, extended, ..
                } => match &updates.xmp {
                    MetadataUpdate::Set(new_xmp) => {
                        if !xmp_written {
                            match extended {
                                // The main packet must keep fitting in one segment
                                Some(extended) => {
                                    write_main_xmp(writer, new_xmp)?;
                                    copy_extended_parts(
                                        segments.get(1..).unwrap_or_default(),
                                        extended,
                                        source,
                                        writer,
                                        &mut current_read_pos,
                                    )?;
                                }
                                None => write_xmp_segment(writer, new_xmp)?,
                            }
                            xmp_written = true;
                        }
                    }
                    MetadataUpdate::Keep => {
                        copy_xmp_segments(
                            segments,
                            extended.as_ref(),
                            source,
                            writer,
                            &mut current_read_pos,
                        )?;
                    }
                },

                _ => {
                    // New XMP goes right after the leading APPn run
                    if !has_xmp && !xmp_written && !segment.is_app_marker() {
                        if let MetadataUpdate::Set(new_xmp) = &updates.xmp {
                            write_xmp_segment(writer, new_xmp)?;
                            xmp_written = true;
                        }
                    }
                    copy_segment(segment, source, writer, &mut current_read_pos)?;
                }
            }
        }

        // Secondary images, gain maps and the like live after EOI
        let kept = Location::new(trailing.offset, trailing.size - updates.drop_trailing);
        if kept.size > 0 {
            copy_range(kept, source, writer, &mut current_read_pos)?;
        }

        Ok(())
    }
}

// Helper functions

/// Read a marker segment length, which counts itself but not the marker
fn read_segment_length<R: Read>(source: &mut R, offset: u64) -> Result<u64> {
    let size = source.read_u16::<BigEndian>()? as u64;
    if size < 2 {
        return Err(Error::InvalidSegment {
            offset,
            reason: format!("Segment length {} is shorter than its own field", size),
        });
    }
    Ok(size)
}

/// Find End of Image marker (FFD9)
/// Properly handles byte stuffing in JPEG compressed data
fn find_eoi<R: Read + Seek>(source: &mut R) -> Result<u64> {
    const BUFFER_SIZE: usize = 8192;
    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut prev_was_ff = false;
    let start_pos = source.stream_position()?;
    let mut total_read = 0u64;

    loop {
        let n = source.read(&mut buffer)?;
        if n == 0 {
            return Err(Error::InvalidFormat("EOI marker not found".into()));
        }

        for (i, &byte) in buffer[..n].iter().enumerate() {
            if prev_was_ff {
                if byte == EOI {
                    // Position of the FF
                    return Ok(start_pos + total_read + i as u64 - 1);
                }
                // Stuffed 0x00, fill 0xFF, or RST/DHT/SOS between scans
                prev_was_ff = byte == 0xFF;
            } else if byte == 0xFF {
                prev_was_ff = true;
            }
        }

        total_read += n as u64;
    }
}

fn xmp_segment(structure: &Structure) -> Option<&Segment> {
    structure
        .xmp_index()
        .and_then(|index| structure.segments().get(index))
}

/// Write a main XMP packet as a single APP1 segment
fn write_main_xmp<W: Write>(writer: &mut W, xmp: &[u8]) -> Result<()> {
    const MAIN_XMP_MAX: usize = MAX_MARKER_SIZE - XMP_SIGNATURE.len();

    if xmp.len() > MAIN_XMP_MAX {
        return Err(Error::DataTooLarge {
            size: xmp.len(),
            max: MAIN_XMP_MAX,
        });
    }

    let total_size = XMP_SIGNATURE.len() + xmp.len() + 2;
    writer.write_u8(0xFF)?;
    writer.write_u8(APP1)?;
    writer.write_u16::<BigEndian>(total_size as u16)?;
    writer.write_all(XMP_SIGNATURE)?;
    writer.write_all(xmp)?;
    Ok(())
}

/// Write XMP as APP1 segment(s), splitting if needed for large XMP
fn write_xmp_segment<W: Write>(writer: &mut W, xmp: &[u8]) -> Result<()> {
    const MAIN_XMP_MAX: usize = MAX_MARKER_SIZE - XMP_SIGNATURE.len();

    if xmp.len() <= MAIN_XMP_MAX {
        return write_main_xmp(writer, xmp);
    }

    if xmp.len() > MAX_XMP_SIZE as usize {
        return Err(Error::DataTooLarge {
            size: xmp.len(),
            max: MAX_XMP_SIZE as usize,
        });
    }

    // Need to split into main + extended
    // GUID is the MD5 of the full packet as an uppercase hex string
    let guid = format!("{:032X}", md5::compute(xmp));

    let main_xmp = format!(
        r#"<?xpacket begin="" id="W5M0MpCehiHzreSzNTczkc9d"?>
<x:xmpmeta xmlns:x="adobe:ns:meta/">
  <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
    <rdf:Description rdf:about=""
      xmlns:xmpNote="http://ns.adobe.com/xmp/note/">
      <xmpNote:HasExtendedXMP>{}</xmpNote:HasExtendedXMP>
    </rdf:Description>
  </rdf:RDF>
</x:xmpmeta>
<?xpacket end="w"?>"#,
        guid
    );
    write_main_xmp(writer, main_xmp.as_bytes())?;

    const HEADER_SIZE: usize = XMP_EXTENDED_SIGNATURE.len() + EXTENDED_XMP_HEADER_SIZE as usize;
    const CHUNK_SIZE: usize = MAX_MARKER_SIZE - HEADER_SIZE;

    let total_size = xmp.len() as u32;
    let mut offset = 0u32;

    while offset < total_size {
        let chunk_size = (total_size - offset).min(CHUNK_SIZE as u32);

        writer.write_u8(0xFF)?;
        writer.write_u8(APP1)?;
        writer.write_u16::<BigEndian>((HEADER_SIZE + chunk_size as usize + 2) as u16)?;
        writer.write_all(XMP_EXTENDED_SIGNATURE)?;
        writer.write_all(guid.as_bytes())?;
        writer.write_u32::<BigEndian>(total_size)?;
        writer.write_u32::<BigEndian>(offset)?;

        let chunk_end = (offset + chunk_size) as usize;
        writer.write_all(&xmp[offset as usize..chunk_end])?;

        offset += chunk_size;
    }

    Ok(())
}

/// Copy an existing XMP packet (and any extended parts) unchanged
fn copy_xmp_segments<R: Read + Seek, W: Write>(
    segments: &[Location],
    extended: Option<&ExtendedXmp>,
    source: &mut R,
    writer: &mut W,
    current_read_pos: &mut u64,
) -> Result<()> {
    let Some((main, parts)) = segments.split_first() else {
        return Ok(());
    };

    writer.write_u8(0xFF)?;
    writer.write_u8(APP1)?;
    writer.write_u16::<BigEndian>((main.size + XMP_SIGNATURE.len() as u64 + 2) as u16)?;
    writer.write_all(XMP_SIGNATURE)?;
    copy_range(*main, source, writer, current_read_pos)?;

    match extended {
        Some(extended) => copy_extended_parts(parts, extended, source, writer, current_read_pos),
        None => Ok(()),
    }
}

/// Copy extended XMP parts unchanged, headers rebuilt from `extended`
fn copy_extended_parts<R: Read + Seek, W: Write>(
    parts: &[Location],
    extended: &ExtendedXmp,
    source: &mut R,
    writer: &mut W,
    current_read_pos: &mut u64,
) -> Result<()> {
    for (part, &chunk_offset) in parts.iter().zip(&extended.chunk_offsets) {
        writer.write_u8(0xFF)?;
        writer.write_u8(APP1)?;
        let seg_size =
            XMP_EXTENDED_SIGNATURE.len() as u64 + EXTENDED_XMP_HEADER_SIZE + part.size + 2;
        writer.write_u16::<BigEndian>(seg_size as u16)?;
        writer.write_all(XMP_EXTENDED_SIGNATURE)?;

        // GUID is always 32 bytes on disk
        let guid_bytes = extended.guid.as_bytes();
        let guid_len = guid_bytes.len().min(32);
        writer.write_all(&guid_bytes[..guid_len])?;
        for _ in guid_len..32 {
            writer.write_u8(0)?;
        }

        writer.write_u32::<BigEndian>(extended.total_size)?;
        writer.write_u32::<BigEndian>(chunk_offset)?;
        copy_range(*part, source, writer, current_read_pos)?;
    }

    Ok(())
}

/// Helper to copy a segment verbatim, marker included
fn copy_segment<R: Read + Seek, W: Write>(
    segment: &Segment,
    source: &mut R,
    writer: &mut W,
    current_read_pos: &mut u64,
) -> Result<()> {
    copy_range(segment.location(), source, writer, current_read_pos)
}

fn copy_range<R: Read + Seek, W: Write>(
    range: Location,
    source: &mut R,
    writer: &mut W,
    current_read_pos: &mut u64,
) -> Result<()> {
    // Optimized seek
    if *current_read_pos != range.offset {
        source.seek(SeekFrom::Start(range.offset))?;
        *current_read_pos = range.offset;
    }

    let mut limited = source.take(range.size);
    copy(&mut limited, writer)?;
    *current_read_pos += range.size;

    Ok(())
}
