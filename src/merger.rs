//! Merging a photo and a video into a Microvideo motion photo
//!
//! A merged file is the photo, tagged with the Microvideo XMP properties,
//! followed directly by every byte of the video. `MicroVideoOffset` holds the
//! video length, i.e. the distance from end of file back to the first video byte.

use std::{
    fs::{self, File},
    io::BufReader,
    path::{Path, PathBuf},
};

use tempfile::{Builder, NamedTempFile};
use tracing::{debug, info, warn};

use crate::{
    error::{Error, Result},
    locator::PhotoVideoPair,
    metadata::{tags, MetadataAccessor, XmpMetadata},
    segment::ByteRange,
};

/// Presentation timestamp written when none is configured
pub const DEFAULT_PRESENTATION_TIMESTAMP_US: i64 = 10;

/// Options controlling where and how pairs are merged
///
/// # Example
///
/// ```
/// use motion_photo_muxer::MergeOptions;
///
/// let options = MergeOptions::new()
///     .set_output_dir("out")
///     .set_presentation_timestamp_us(-1);
/// assert_eq!(options.output_dir().unwrap().to_str(), Some("out"));
/// assert_eq!(options.presentation_timestamp_us(), -1);
/// ```
#[derive(Debug, Clone)]
pub struct MergeOptions {
    output_dir: Option<PathBuf>,
    presentation_timestamp_us: i64,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            output_dir: None,
            presentation_timestamp_us: DEFAULT_PRESENTATION_TIMESTAMP_US,
        }
    }
}

impl MergeOptions {
    /// Options for in-place merging with the default timestamp
    pub fn new() -> Self {
        Self::default()
    }

    /// Write merged files into `dir` instead of updating photos in place
    pub fn set_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn set_presentation_timestamp_us(mut self, value: i64) -> Self {
        self.presentation_timestamp_us = value;
        self
    }

    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }

    pub fn presentation_timestamp_us(&self) -> i64 {
        self.presentation_timestamp_us
    }
}

/// Result of one successful merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedFile {
    pub path: PathBuf,
    /// Size of the tagged photo before the video was appended
    pub photo_size: u64,
    pub video_size: u64,
    /// Value written to `MicroVideoOffset`
    pub offset: u64,
}

impl MergedFile {
    pub fn total_size(&self) -> u64 {
        self.photo_size + self.video_size
    }
}

/// Merges pairs through a [`MetadataAccessor`]
#[derive(Debug)]
pub struct Merger<M = XmpMetadata> {
    accessor: M,
    options: MergeOptions,
}

impl Merger<XmpMetadata> {
    /// Merger backed by the built-in XMP writer
    pub fn new(options: MergeOptions) -> Self {
        Self::with_accessor(XmpMetadata::new(), options)
    }
}

impl<M: MetadataAccessor> Merger<M> {
    pub fn with_accessor(accessor: M, options: MergeOptions) -> Self {
        Self { accessor, options }
    }

    pub fn options(&self) -> &MergeOptions {
        &self.options
    }

    pub fn accessor(&self) -> &M {
        &self.accessor
    }

    /// Where the merged file for `pair` will be written
    pub fn output_path(&self, pair: &PhotoVideoPair) -> Result<PathBuf> {
        let Some(dir) = self.options.output_dir() else {
            return Ok(pair.photo().to_path_buf());
        };
        let name = pair.photo().file_name().ok_or_else(|| {
            Error::InvalidInput(format!("Photo has no file name: {}", pair.photo().display()))
        })?;
        Ok(dir.join(name))
    }

    /// Merge one pair
    ///
    /// Steps: copy the photo to a staging file next to the output, write the
    /// Microvideo tags, append the video, check the final size, then move the
    /// staging file over the output. Nothing at the output path changes
    /// unless every step succeeds. A video embedded by an earlier merge is
    /// dropped by the tag rewrite, so merging a merged photo redoes the merge.
    pub fn merge(&self, pair: &PhotoVideoPair) -> Result<MergedFile> {
        let output = self.output_path(pair)?;
        let dir = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let staging = staged_copy(pair.photo(), dir)?;
        let staged = staging.path();
        debug!(from = %pair.photo().display(), staging = %staged.display(), "copied photo");

        if let Some(previous) = self.accessor.read_tag(staged, tags::MICRO_VIDEO_OFFSET)? {
            info!(
                photo = %pair.photo().display(),
                previous_offset = %previous,
                "photo is already a motion photo, replacing its video"
            );
        }

        let video_size = fs::metadata(pair.video())?.len();
        if video_size == 0 {
            warn!(video = %pair.video().display(), "video is empty, merging with offset 0");
        }
        let offset = video_size;

        let values = [
            (tags::MICRO_VIDEO, "1".to_string()),
            (tags::MICRO_VIDEO_VERSION, "1".to_string()),
            (tags::MICRO_VIDEO_OFFSET, offset.to_string()),
            (
                tags::MICRO_VIDEO_PRESENTATION_TIMESTAMP_US,
                self.options.presentation_timestamp_us.to_string(),
            ),
        ];
        self.accessor.write_tags(staged, &values)?;

        let photo_size = fs::metadata(staged)?.len();
        let mut video = BufReader::new(File::open(pair.video())?);
        let appended = self.accessor.append_bytes(staged, &mut video)?;
        debug!(staging = %staged.display(), bytes = appended, "appended video");

        let expected = photo_size + video_size;
        let actual = fs::metadata(staged)?.len();
        if actual != expected {
            return Err(Error::MergeIntegrity {
                path: output,
                expected,
                actual,
            });
        }

        staging.persist(&output).map_err(|e| Error::Io(e.error))?;
        info!(path = %output.display(), photo_size, video_size, "merged");
        Ok(MergedFile {
            path: output,
            photo_size,
            video_size,
            offset,
        })
    }

    /// Byte range of the video embedded in a merged file
    ///
    /// Returns `None` when the file carries no `MicroVideoOffset`.
    pub fn read_embedded_video_range(&self, path: &Path) -> Result<Option<ByteRange>> {
        let Some(value) = self.accessor.read_tag(path, tags::MICRO_VIDEO_OFFSET)? else {
            return Ok(None);
        };
        let offset: u64 = value.trim().parse().map_err(|_| {
            Error::InvalidFormat(format!("MicroVideoOffset is not a byte count: {:?}", value))
        })?;

        let file_size = fs::metadata(path)?.len();
        if offset > file_size {
            return Err(Error::InvalidFormat(format!(
                "MicroVideoOffset {} exceeds file size {}",
                offset, file_size
            )));
        }
        Ok(Some(ByteRange::new(file_size - offset, offset)))
    }
}

/// Copy `photo` into a temporary file in `dir`, keeping its extension
fn staged_copy(photo: &Path, dir: &Path) -> Result<NamedTempFile> {
    let suffix = photo
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    let staging = Builder::new()
        .prefix(".merging-")
        .suffix(&suffix)
        .tempfile_in(dir)?;
    fs::copy(photo, staging.path())?;
    Ok(staging)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{video_bytes, write_file, write_pair, JpegBuilder, SAMPLE_XMP};
    use crate::ErrorKind;
    use std::io::Read;

    fn pair(dir: &Path, stem: &str, video_len: usize) -> PhotoVideoPair {
        let (photo, video) = write_pair(dir, stem, "jpg", "mov", video_len);
        PhotoVideoPair::new(photo, video).unwrap()
    }

    #[test]
    fn test_merge_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let pair = pair(dir.path(), "IMG_001", 4096);
        let video = fs::read(pair.video()).unwrap();
        let merger = Merger::new(MergeOptions::new());

        let merged = merger.merge(&pair).unwrap();
        assert_eq!(merged.path, pair.photo());
        assert_eq!(merged.offset, 4096);
        assert_eq!(merged.video_size, 4096);

        let bytes = fs::read(&merged.path).unwrap();
        assert_eq!(bytes.len() as u64, merged.total_size());
        assert_eq!(&bytes[bytes.len() - video.len()..], &video[..]);
        assert_eq!(bytes[bytes.len() - merged.offset as usize], video[0]);

        let accessor = merger.accessor();
        let read = |tag| accessor.read_tag(&merged.path, tag).unwrap();
        assert_eq!(read(tags::MICRO_VIDEO).as_deref(), Some("1"));
        assert_eq!(read(tags::MICRO_VIDEO_VERSION).as_deref(), Some("1"));
        assert_eq!(read(tags::MICRO_VIDEO_OFFSET).as_deref(), Some("4096"));
        assert_eq!(
            read(tags::MICRO_VIDEO_PRESENTATION_TIMESTAMP_US).as_deref(),
            Some("10")
        );
    }

    #[test]
    fn test_merge_into_output_dir_leaves_source_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let pair = pair(dir.path(), "a", 100);
        let original = fs::read(pair.photo()).unwrap();
        let out = dir.path().join("out").join("nested");

        let merger = Merger::new(MergeOptions::new().set_output_dir(&out));
        let merged = merger.merge(&pair).unwrap();

        assert_eq!(merged.path, out.join("a.jpg"));
        assert_eq!(fs::read(pair.photo()).unwrap(), original);
        assert_eq!(
            fs::metadata(&merged.path).unwrap().len(),
            merged.photo_size + 100
        );
    }

    #[test]
    fn test_output_dir_equal_to_photo_dir_merges_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let pair = pair(dir.path(), "same", 50);
        let merger = Merger::new(MergeOptions::new().set_output_dir(dir.path()));

        let merged = merger.merge(&pair).unwrap();
        assert_eq!(fs::metadata(pair.photo()).unwrap().len(), merged.total_size());
    }

    #[test]
    fn test_remerge_is_identical() {
        let dir = tempfile::tempdir().unwrap();
        let pair = pair(dir.path(), "again", 777);
        let merger = Merger::new(MergeOptions::new());

        merger.merge(&pair).unwrap();
        let first = fs::read(pair.photo()).unwrap();
        merger.merge(&pair).unwrap();
        let second = fs::read(pair.photo()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_remerge_with_new_video_replaces_old_one() {
        let dir = tempfile::tempdir().unwrap();
        let pair = pair(dir.path(), "swap", 300);
        let merger = Merger::new(MergeOptions::new());
        merger.merge(&pair).unwrap();

        fs::write(pair.video(), video_bytes(120, 99)).unwrap();
        let merged = merger.merge(&pair).unwrap();
        assert_eq!(merged.offset, 120);
        assert_eq!(
            fs::metadata(pair.photo()).unwrap().len(),
            merged.photo_size + 120
        );
    }

    #[test]
    fn test_zero_byte_video() {
        let dir = tempfile::tempdir().unwrap();
        let pair = pair(dir.path(), "empty", 0);
        let merger = Merger::new(MergeOptions::new());

        let merged = merger.merge(&pair).unwrap();
        assert_eq!(merged.offset, 0);
        assert_eq!(fs::metadata(&merged.path).unwrap().len(), merged.photo_size);
        assert_eq!(
            merger.read_embedded_video_range(&merged.path).unwrap(),
            Some(ByteRange::new(merged.photo_size, 0))
        );
    }

    #[test]
    fn test_existing_xmp_is_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let photo = write_file(
            dir.path(),
            "x.jpg",
            &JpegBuilder::new().with_exif().with_xmp(SAMPLE_XMP).build(),
        );
        let video = write_file(dir.path(), "x.mp4", &video_bytes(64, 3));
        let pair = PhotoVideoPair::new(photo, video).unwrap();
        let merger = Merger::new(MergeOptions::new().set_presentation_timestamp_us(-1));

        let merged = merger.merge(&pair).unwrap();
        let accessor = merger.accessor();
        assert_eq!(
            accessor
                .read_tag(&merged.path, "Xmp.dc.format")
                .unwrap()
                .as_deref(),
            Some("image/jpeg")
        );
        assert_eq!(
            accessor
                .read_tag(&merged.path, tags::MICRO_VIDEO_PRESENTATION_TIMESTAMP_US)
                .unwrap()
                .as_deref(),
            Some("-1")
        );
    }

    #[test]
    fn test_embedded_video_range() {
        let dir = tempfile::tempdir().unwrap();
        let pair = pair(dir.path(), "range", 2048);
        let video = fs::read(pair.video()).unwrap();
        let merger = Merger::new(MergeOptions::new());
        assert_eq!(merger.read_embedded_video_range(pair.photo()).unwrap(), None);

        let merged = merger.merge(&pair).unwrap();
        let range = merger
            .read_embedded_video_range(&merged.path)
            .unwrap()
            .unwrap();
        assert_eq!(range, ByteRange::new(merged.photo_size, 2048));

        let bytes = fs::read(&merged.path).unwrap();
        assert_eq!(&bytes[range.offset as usize..range.end_offset() as usize], &video[..]);
    }

    #[test]
    fn test_unparseable_photo_is_metadata_write() {
        let dir = tempfile::tempdir().unwrap();
        let photo = write_file(dir.path(), "bad.jpg", b"definitely not a jpeg");
        let video = write_file(dir.path(), "bad.mov", &video_bytes(10, 1));
        let pair = PhotoVideoPair::new(photo, video).unwrap();

        let err = Merger::new(MergeOptions::new()).merge(&pair).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MetadataWrite);
    }

    /// Appends only half of the data it is given
    struct ShortAppend(XmpMetadata);

    impl MetadataAccessor for ShortAppend {
        fn read_tag(&self, path: &Path, tag: &str) -> Result<Option<String>> {
            self.0.read_tag(path, tag)
        }

        fn write_tags(&self, path: &Path, tags: &[(&str, String)]) -> Result<()> {
            self.0.write_tags(path, tags)
        }

        fn append_bytes(&self, path: &Path, data: &mut dyn Read) -> Result<u64> {
            let mut all = Vec::new();
            data.read_to_end(&mut all)?;
            let half = &all[..all.len() / 2];
            self.0.append_bytes(path, &mut &half[..])
        }
    }

    #[test]
    fn test_short_append_fails_integrity_check() {
        let dir = tempfile::tempdir().unwrap();
        let pair = pair(dir.path(), "short", 1000);
        let merger = Merger::with_accessor(ShortAppend(XmpMetadata::new()), MergeOptions::new());

        let original = fs::read(pair.photo()).unwrap();

        let err = merger.merge(&pair).unwrap_err();
        match err {
            Error::MergeIntegrity {
                expected, actual, ..
            } => assert_eq!(expected - actual, 500),
            other => panic!("unexpected error: {}", other),
        }

        // The photo is untouched and the staging file is gone
        assert_eq!(fs::read(pair.photo()).unwrap(), original);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_failed_write_leaves_output_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let photo = write_file(dir.path(), "broken.jpg", b"not a jpeg");
        let video = write_file(dir.path(), "broken.mov", &video_bytes(10, 1));
        let out = dir.path().join("out");
        let existing = write_file(&out, "broken.jpg", b"earlier result");
        let pair = PhotoVideoPair::new(photo, video).unwrap();

        let merger = Merger::new(MergeOptions::new().set_output_dir(&out));
        assert!(merger.merge(&pair).is_err());
        assert_eq!(fs::read(&existing).unwrap(), b"earlier result");
        assert_eq!(fs::read_dir(&out).unwrap().count(), 1);
    }

    #[test]
    fn test_trailer_of_untagged_photo_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let secondary = b"\xFF\xD8SECONDARY-IMAGE\xFF\xD9".to_vec();
        let photo = write_file(
            dir.path(),
            "mpf.jpg",
            &JpegBuilder::new().with_trailer(secondary.clone()).build(),
        );
        let video = write_file(dir.path(), "mpf.mov", &video_bytes(256, 4));
        let pair = PhotoVideoPair::new(photo, video).unwrap();
        let merger = Merger::new(MergeOptions::new().set_output_dir(dir.path().join("out")));

        let merged = merger.merge(&pair).unwrap();
        let bytes = fs::read(&merged.path).unwrap();
        let photo_part = &bytes[..merged.photo_size as usize];
        assert!(photo_part.ends_with(&secondary));
        assert_eq!(bytes.len() as u64, merged.total_size());

        // Merging the result again keeps the secondary image once
        let again = PhotoVideoPair::new(&merged.path, pair.video()).unwrap();
        let remerged = Merger::new(MergeOptions::new()).merge(&again).unwrap();
        assert_eq!(fs::read(&remerged.path).unwrap(), bytes);
    }
}
