//! Metadata accessor: the seam between merging and the metadata backend
//!
//! Tags are named with exiv2-style keys, `Xmp.<prefix>.<name>`, and stored as
//! XMP properties on the first `rdf:Description` of the photo's main packet.
//! Reads also look in the extended packet, where large properties such as
//! depth maps live.

use std::{
    fs::{self, File, OpenOptions},
    io::{self, BufReader, BufWriter, Read, Write},
    path::Path,
};

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::{
    error::{Error, Result},
    formats::{jpeg_io::JpegIO, ContainerIO},
    structure::Structure,
    xmp, MediaType, Updates,
};

/// Keys of the Microvideo properties
pub mod tags {
    pub const MICRO_VIDEO: &str = "Xmp.GCamera.MicroVideo";
    pub const MICRO_VIDEO_VERSION: &str = "Xmp.GCamera.MicroVideoVersion";
    pub const MICRO_VIDEO_OFFSET: &str = "Xmp.GCamera.MicroVideoOffset";
    pub const MICRO_VIDEO_PRESENTATION_TIMESTAMP_US: &str =
        "Xmp.GCamera.MicroVideoPresentationTimestampUs";
}

/// XMP namespaces a tag key may use: (prefix, URI)
pub const NAMESPACES: &[(&str, &str)] = &[
    ("GCamera", "http://ns.google.com/photos/1.0/camera/"),
    ("xmp", "http://ns.adobe.com/xap/1.0/"),
    ("dc", "http://purl.org/dc/elements/1.1/"),
    ("xmpNote", "http://ns.adobe.com/xmp/note/"),
    ("GDepth", "http://ns.google.com/photos/1.0/depthmap/"),
];

/// A parsed `Xmp.<prefix>.<name>` key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    prefix: &'static str,
    uri: &'static str,
    name: String,
}

impl Tag {
    /// Parse an exiv2-style key
    ///
    /// # Example
    ///
    /// ```
    /// use motion_photo_muxer::metadata::Tag;
    ///
    /// let tag = Tag::parse("Xmp.GCamera.MicroVideoOffset").unwrap();
    /// assert_eq!(tag.qualified_name(), "GCamera:MicroVideoOffset");
    /// assert!(Tag::parse("Exif.Photo.MicroVideo").is_err());
    /// ```
    pub fn parse(key: &str) -> Result<Self> {
        let mut parts = key.splitn(3, '.');
        let (Some("Xmp"), Some(prefix), Some(name)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(Error::InvalidFormat(format!(
                "Tag {:?} is not of the form Xmp.<prefix>.<name>",
                key
            )));
        };

        let valid_name = name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid_name {
            return Err(Error::InvalidFormat(format!(
                "Tag {:?} has an invalid property name",
                key
            )));
        }

        let &(prefix, uri) = NAMESPACES
            .iter()
            .find(|(known, _)| *known == prefix)
            .ok_or_else(|| {
                Error::InvalidFormat(format!("Tag {:?} uses an unknown namespace", key))
            })?;

        Ok(Self {
            prefix,
            uri,
            name: name.to_string(),
        })
    }

    /// The property as it appears in XMP, e.g. `GCamera:MicroVideo`
    pub fn qualified_name(&self) -> String {
        format!("{}:{}", self.prefix, self.name)
    }

    /// The namespace declaration attribute, e.g. `xmlns:GCamera`
    pub fn namespace_attribute(&self) -> String {
        format!("xmlns:{}", self.prefix)
    }

    pub fn namespace_uri(&self) -> &'static str {
        self.uri
    }
}

/// Reads and writes photo metadata and appends raw bytes to files
pub trait MetadataAccessor {
    /// Read a tag's value, `None` when the photo doesn't carry it
    fn read_tag(&self, path: &Path, tag: &str) -> Result<Option<String>>;

    /// Set several tags in one rewrite of the photo
    ///
    /// Existing values are replaced. Bytes stored after the image are kept,
    /// except a video embedded by an earlier merge, which is dropped so the
    /// caller can append a new one. Fails with [`Error::MetadataWrite`] when
    /// the photo can't be opened, parsed, or written, or a tag is malformed.
    fn write_tags(&self, path: &Path, tags: &[(&str, String)]) -> Result<()>;

    /// Set a single tag
    fn write_tag(&self, path: &Path, tag: &str, value: &str) -> Result<()> {
        self.write_tags(path, &[(tag, value.to_string())])
    }

    /// Append everything from `data` to the end of the file, returning the
    /// number of bytes written
    fn append_bytes(&self, path: &Path, data: &mut dyn Read) -> Result<u64>;
}

/// [`MetadataAccessor`] storing tags in a JPEG's XMP packet
#[derive(Debug, Default)]
pub struct XmpMetadata {
    io: JpegIO,
}

impl XmpMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_supported(path: &Path) -> Result<()> {
        match MediaType::from_path(path) {
            Some(media_type) if JpegIO::supported_media_types().contains(&media_type) => Ok(()),
            _ => Err(Error::InvalidFormat(format!(
                "{} is not a JPEG file",
                path.display()
            ))),
        }
    }

    fn open(&self, path: &Path) -> Result<(Structure, BufReader<File>)> {
        Self::ensure_supported(path)?;
        let mut source = BufReader::new(File::open(path)?);
        let structure = self.io.parse(&mut source)?;
        Ok((structure, source))
    }

    /// Look a tag up in the main packet, then in the extended one
    fn lookup(
        &self,
        structure: &Structure,
        source: &mut BufReader<File>,
        tag: &Tag,
    ) -> Result<Option<String>> {
        let name = tag.qualified_name();
        if let Some(main) = self.io.read_xmp(structure, source)? {
            if let Some(value) = xmp::extract_key(&String::from_utf8_lossy(&main), &name) {
                return Ok(Some(value));
            }
        }
        let extended = self.io.read_extended_xmp(structure, source)?;
        Ok(extended.and_then(|packet| xmp::extract_key(&String::from_utf8_lossy(&packet), &name)))
    }

    /// Length of a video appended by an earlier merge, 0 if there is none
    ///
    /// Only trusted when `MicroVideoOffset` fits in the data after EOI.
    fn previous_video_len(
        &self,
        path: &Path,
        structure: &Structure,
        source: &mut BufReader<File>,
    ) -> Result<u64> {
        let offset_tag = Tag::parse(tags::MICRO_VIDEO_OFFSET)?;
        let Some(value) = self.lookup(structure, source, &offset_tag)? else {
            return Ok(0);
        };

        let trailing = structure.trailing_size();
        match value.trim().parse::<u64>() {
            Ok(len) if len <= trailing => {
                info!(path = %path.display(), bytes = len, "dropping previously merged video");
                Ok(len)
            }
            _ => {
                warn!(
                    path = %path.display(),
                    offset = %value,
                    trailing,
                    "MicroVideoOffset doesn't match the data after EOI, keeping that data"
                );
                Ok(0)
            }
        }
    }

    fn rewrite(&self, path: &Path, tags: &[(&str, String)]) -> Result<()> {
        let parsed = tags
            .iter()
            .map(|(key, value)| Ok((Tag::parse(key)?, value.as_str())))
            .collect::<Result<Vec<_>>>()?;

        let (structure, mut source) = self.open(path)?;
        let drop_trailing = self.previous_video_len(path, &structure, &mut source)?;
        let kept = structure.trailing_size() - drop_trailing;
        if kept > 0 {
            debug!(path = %path.display(), bytes = kept, "keeping data stored after EOI");
        }

        let mut packet = match self.io.read_xmp(&structure, &mut source)? {
            Some(bytes) => String::from_utf8(bytes)
                .map_err(|e| Error::InvalidFormat(format!("XMP is not UTF-8: {}", e)))?,
            None => xmp::new_packet(),
        };

        for (tag, value) in &parsed {
            packet = xmp::add_key(&packet, &tag.namespace_attribute(), tag.namespace_uri())?;
            packet = xmp::add_key(&packet, &tag.qualified_name(), value)?;
        }

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut temp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            self.io.write(
                &structure,
                &mut source,
                &mut writer,
                &Updates::new()
                    .set_xmp(packet.into_bytes())
                    .drop_trailing(drop_trailing),
            )?;
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        drop(source);

        fs::set_permissions(temp.path(), fs::metadata(path)?.permissions())?;
        temp.persist(path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}

impl MetadataAccessor for XmpMetadata {
    fn read_tag(&self, path: &Path, tag: &str) -> Result<Option<String>> {
        let read = || {
            let tag = Tag::parse(tag)?;
            let (structure, mut source) = self.open(path)?;
            self.lookup(&structure, &mut source, &tag)
        };
        read().map_err(|e| Error::metadata_write(path, e))
    }

    fn write_tags(&self, path: &Path, tags: &[(&str, String)]) -> Result<()> {
        self.rewrite(path, tags)
            .map_err(|e| Error::metadata_write(path, e))?;
        debug!(path = %path.display(), count = tags.len(), "wrote tags");
        Ok(())
    }

    fn append_bytes(&self, path: &Path, data: &mut dyn Read) -> Result<u64> {
        let file = OpenOptions::new().append(true).open(path)?;
        let mut writer = BufWriter::new(file);
        let written = io::copy(data, &mut writer)?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        Ok(written)
    }
}
