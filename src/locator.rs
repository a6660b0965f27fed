//! Discovery of photo/video pairs
//!
//! Pairs come either from an explicit photo and video path, or from scanning
//! a directory for files that share a stem (`IMG_001.jpg` + `IMG_001.mov`).

use std::{
    collections::BTreeMap,
    fmt, fs,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::{
    error::{Error, Result},
    MediaType,
};

/// A photo and the video to embed in it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoVideoPair {
    photo: PathBuf,
    video: PathBuf,
}

impl PhotoVideoPair {
    /// Create a pair, checking extensions, existence, and that the photo is non-empty
    ///
    /// Extensions are checked before touching the filesystem.
    pub fn new(photo: impl Into<PathBuf>, video: impl Into<PathBuf>) -> Result<Self> {
        let pair = Self::unchecked(photo.into(), video.into());
        pair.validate()?;
        Ok(pair)
    }

    pub(crate) fn unchecked(photo: PathBuf, video: PathBuf) -> Self {
        Self { photo, video }
    }

    pub fn photo(&self) -> &Path {
        &self.photo
    }

    pub fn video(&self) -> &Path {
        &self.video
    }

    /// Check the pair invariant against the current state of the filesystem
    pub fn validate(&self) -> Result<()> {
        check_extensions(&self.photo, &self.video)?;

        if regular_file_len(&self.photo, "Photo")? == 0 {
            return Err(Error::InvalidInput(format!(
                "Photo is empty: {}",
                self.photo.display()
            )));
        }
        regular_file_len(&self.video, "Video")?;
        Ok(())
    }
}

impl fmt::Display for PhotoVideoPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} + {}", self.photo.display(), self.video.display())
    }
}

fn check_extensions(photo: &Path, video: &Path) -> Result<()> {
    if !MediaType::from_path(photo).is_some_and(|t| t.is_photo()) {
        return Err(Error::InvalidInput(format!(
            "Photo isn't a JPEG (.jpg, .jpeg): {}",
            photo.display()
        )));
    }
    if !MediaType::from_path(video).is_some_and(|t| t.is_video()) {
        return Err(Error::InvalidInput(format!(
            "Video isn't a MOV or MP4: {}",
            video.display()
        )));
    }
    Ok(())
}

fn regular_file_len(path: &Path, what: &str) -> Result<u64> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() => Ok(meta.len()),
        Ok(_) => Err(Error::InvalidInput(format!(
            "{} is not a regular file: {}",
            what,
            path.display()
        ))),
        Err(_) => Err(Error::InvalidInput(format!(
            "{} does not exist: {}",
            what,
            path.display()
        ))),
    }
}

/// A set of same-stem files that didn't form exactly one photo and one video
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedGroup {
    /// Directory joined with the (lowercased) shared stem
    pub stem: PathBuf,
    pub photos: Vec<PathBuf>,
    pub videos: Vec<PathBuf>,
}

impl SkippedGroup {
    pub fn reason(&self) -> String {
        match (self.photos.len(), self.videos.len()) {
            (_, 0) => "no matching video".to_string(),
            (0, _) => "no matching photo".to_string(),
            (p, v) => format!("ambiguous: {} photos and {} videos", p, v),
        }
    }
}

impl fmt::Display for SkippedGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.stem.display(), self.reason())
    }
}

/// Finite, single-pass sequence of discovered pairs
///
/// Groups that could not be paired are available from [`Pairs::skipped`].
#[derive(Debug)]
pub struct Pairs {
    pending: std::vec::IntoIter<PhotoVideoPair>,
    skipped: Vec<SkippedGroup>,
}

impl Pairs {
    pub fn new(pairs: Vec<PhotoVideoPair>, skipped: Vec<SkippedGroup>) -> Self {
        Self {
            pending: pairs.into_iter(),
            skipped,
        }
    }

    pub fn skipped(&self) -> &[SkippedGroup] {
        &self.skipped
    }

    pub fn into_skipped(self) -> Vec<SkippedGroup> {
        self.skipped
    }
}

impl Iterator for Pairs {
    type Item = PhotoVideoPair;

    fn next(&mut self) -> Option<Self::Item> {
        self.pending.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.pending.size_hint()
    }
}

/// A single explicit pair
pub fn locate_explicit(photo: impl Into<PathBuf>, video: impl Into<PathBuf>) -> Result<Pairs> {
    let pair = PhotoVideoPair::new(photo, video)?;
    Ok(Pairs::new(vec![pair], Vec::new()))
}

/// Scan `root` for photo/video pairs, descending into subdirectories when
/// `recurse` is set
///
/// Files are grouped by parent directory and case-insensitive stem. Pairs are
/// ordered by directory, then stem.
pub fn locate_in_dir(root: &Path, recurse: bool) -> Result<Pairs> {
    if !fs::metadata(root).is_ok_and(|meta| meta.is_dir()) {
        return Err(Error::InvalidInput(format!(
            "Not a directory: {}",
            root.display()
        )));
    }

    let max_depth = if recurse { usize::MAX } else { 1 };
    let mut groups: BTreeMap<(PathBuf, String), (Vec<PathBuf>, Vec<PathBuf>)> = BTreeMap::new();

    for entry in WalkDir::new(root)
        .min_depth(1)
        .max_depth(max_depth)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.into_path();
        let Some(media_type) = MediaType::from_path(&path) else {
            continue;
        };
        let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().to_lowercase()) else {
            continue;
        };
        let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();

        let (photos, videos) = groups.entry((parent, stem)).or_default();
        if media_type.is_photo() {
            photos.push(path);
        } else {
            videos.push(path);
        }
    }

    let mut pairs = Vec::new();
    let mut skipped = Vec::new();
    for ((parent, stem), (mut photos, mut videos)) in groups {
        if photos.len() == 1 && videos.len() == 1 {
            if let (Some(photo), Some(video)) = (photos.pop(), videos.pop()) {
                debug!(photo = %photo.display(), video = %video.display(), "found pair");
                pairs.push(PhotoVideoPair::unchecked(photo, video));
            }
            continue;
        }

        let group = SkippedGroup {
            stem: parent.join(stem),
            photos,
            videos,
        };
        warn!(group = %group.stem.display(), reason = %group.reason(), "skipping group");
        skipped.push(group);
    }

    debug!(
        root = %root.display(),
        pairs = pairs.len(),
        skipped = skipped.len(),
        "scanned directory"
    );
    Ok(Pairs::new(pairs, skipped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{write_file, write_pair, JpegBuilder};

    fn names(pairs: Pairs) -> Vec<(String, String)> {
        pairs
            .map(|pair| {
                (
                    pair.photo().file_name().unwrap().to_string_lossy().into_owned(),
                    pair.video().file_name().unwrap().to_string_lossy().into_owned(),
                )
            })
            .collect()
    }

    #[test]
    fn test_extensions_checked_before_io() {
        // Neither file exists; the extension error must win
        let err = PhotoVideoPair::new("/nonexistent/photo.png", "/nonexistent/clip.mov").unwrap_err();
        assert!(matches!(&err, Error::InvalidInput(msg) if msg.contains("JPEG")), "{}", err);

        let err = PhotoVideoPair::new("/nonexistent/photo.jpg", "/nonexistent/clip.avi").unwrap_err();
        assert!(matches!(&err, Error::InvalidInput(msg) if msg.contains("MOV")), "{}", err);
    }

    #[test]
    fn test_explicit_pair() {
        let dir = tempfile::tempdir().unwrap();
        let (photo, video) = write_pair(dir.path(), "IMG_001", "JPG", "MoV", 64);

        let pairs: Vec<_> = locate_explicit(&photo, &video).unwrap().collect();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].photo(), photo);
        assert_eq!(pairs[0].video(), video);
    }

    #[test]
    fn test_missing_and_empty_files() {
        let dir = tempfile::tempdir().unwrap();
        let (photo, video) = write_pair(dir.path(), "a", "jpg", "mp4", 0);

        // Zero-byte video is allowed
        assert!(PhotoVideoPair::new(&photo, &video).is_ok());

        let missing = dir.path().join("missing.mov");
        let err = PhotoVideoPair::new(&photo, &missing).unwrap_err();
        assert!(matches!(&err, Error::InvalidInput(msg) if msg.contains("does not exist")));

        let empty_photo = write_file(dir.path(), "empty.jpeg", b"");
        let err = PhotoVideoPair::new(&empty_photo, &video).unwrap_err();
        assert!(matches!(&err, Error::InvalidInput(msg) if msg.contains("empty")));
    }

    #[test]
    fn test_directory_without_recursion() {
        let dir = tempfile::tempdir().unwrap();
        write_pair(dir.path(), "b", "jpg", "mov", 32);
        write_pair(dir.path(), "a", "jpeg", "mp4", 32);
        write_pair(&dir.path().join("nested"), "c", "jpg", "mov", 32);
        write_file(dir.path(), "notes.txt", b"ignored");

        let pairs = locate_in_dir(dir.path(), false).unwrap();
        assert!(pairs.skipped().is_empty());
        assert_eq!(
            names(pairs),
            vec![
                ("a.jpeg".to_string(), "a.mp4".to_string()),
                ("b.jpg".to_string(), "b.mov".to_string()),
            ]
        );
    }

    #[test]
    fn test_directory_with_recursion() {
        let dir = tempfile::tempdir().unwrap();
        write_pair(dir.path(), "a", "jpg", "mov", 32);
        write_pair(&dir.path().join("x").join("y"), "deep", "jpg", "mp4", 32);

        let found = names(locate_in_dir(dir.path(), true).unwrap());
        assert_eq!(found.len(), 2);
        assert!(found.contains(&("deep.jpg".to_string(), "deep.mp4".to_string())));
    }

    #[test]
    fn test_stems_match_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        let photo = write_file(dir.path(), "IMG_7.JPG", &JpegBuilder::new().build());
        let video = write_file(dir.path(), "img_7.mov", b"video");

        let pairs: Vec<_> = locate_in_dir(dir.path(), false).unwrap().collect();
        assert_eq!(pairs, vec![PhotoVideoPair::unchecked(photo, video)]);
    }

    #[test]
    fn test_unpairable_groups_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_pair(dir.path(), "A", "jpg", "mov", 32);
        write_file(dir.path(), "B.jpg", &JpegBuilder::new().build());
        write_file(dir.path(), "C.mov", b"video");
        write_file(dir.path(), "C.mp4", b"video");
        write_file(dir.path(), "C.jpg", &JpegBuilder::new().build());

        let mut pairs = locate_in_dir(dir.path(), false).unwrap();
        assert_eq!(pairs.by_ref().count(), 1);

        let skipped = pairs.into_skipped();
        assert_eq!(skipped.len(), 2);
        assert_eq!(skipped[0].stem, dir.path().join("b"));
        assert_eq!(skipped[0].reason(), "no matching video");
        assert_eq!(skipped[1].videos.len(), 2);
        assert!(skipped[1].reason().starts_with("ambiguous"));
    }

    #[test]
    fn test_bad_root() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_file(dir.path(), "a.jpg", b"x");
        assert!(matches!(
            locate_in_dir(&dir.path().join("missing"), false),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            locate_in_dir(&file, true),
            Err(Error::InvalidInput(_))
        ));
    }
}
