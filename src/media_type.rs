//! Media type definitions
//!
//! This module defines the media types a motion photo is assembled from: the
//! still photo (JPEG) and the clip (MP4 or QuickTime).

use std::path::Path;

/// Specific media type - what the content represents
///
/// Detection is by file extension only. The muxer never inspects the video
/// stream, and the photo is validated later by the JPEG parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    /// Standard JPEG image
    Jpeg,
    /// MPEG-4 video
    Mp4,
    /// QuickTime MOV video
    QuickTime,
}

impl MediaType {
    /// All media types the muxer accepts
    fn all() -> &'static [MediaType] {
        &[MediaType::Jpeg, MediaType::Mp4, MediaType::QuickTime]
    }

    /// Get the primary MIME type for this media type
    ///
    /// # Example
    ///
    /// ```
    /// use motion_photo_muxer::MediaType;
    ///
    /// assert_eq!(MediaType::QuickTime.to_mime(), "video/quicktime");
    /// ```
    pub fn to_mime(&self) -> &'static str {
        match self {
            MediaType::Jpeg => "image/jpeg",
            MediaType::Mp4 => "video/mp4",
            MediaType::QuickTime => "video/quicktime",
        }
    }

    /// File extensions accepted for this media type (lowercase, without dot)
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            MediaType::Jpeg => &["jpg", "jpeg"],
            MediaType::Mp4 => &["mp4"],
            MediaType::QuickTime => &["mov"],
        }
    }

    /// Detect the media type from a file extension (case-insensitive)
    ///
    /// # Example
    ///
    /// ```
    /// use motion_photo_muxer::MediaType;
    ///
    /// assert_eq!(MediaType::from_extension("JPEG"), Some(MediaType::Jpeg));
    /// assert_eq!(MediaType::from_extension("png"), None);
    /// ```
    pub fn from_extension(ext: &str) -> Option<MediaType> {
        let ext = ext.to_ascii_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|media_type| media_type.extensions().contains(&ext.as_str()))
    }

    /// Detect the media type of a path from its extension
    pub fn from_path(path: &Path) -> Option<MediaType> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// True for the still photo side of a pair
    pub fn is_photo(&self) -> bool {
        matches!(self, MediaType::Jpeg)
    }

    /// True for the motion side of a pair
    pub fn is_video(&self) -> bool {
        matches!(self, MediaType::Mp4 | MediaType::QuickTime)
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_mime())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path_is_case_insensitive() {
        assert_eq!(
            MediaType::from_path(Path::new("IMG_001.JPG")),
            Some(MediaType::Jpeg)
        );
        assert_eq!(
            MediaType::from_path(Path::new("clip.Mov")),
            Some(MediaType::QuickTime)
        );
        assert_eq!(
            MediaType::from_path(Path::new("clip.MP4")),
            Some(MediaType::Mp4)
        );
    }

    #[test]
    fn test_unsupported_and_missing_extensions() {
        assert_eq!(MediaType::from_path(Path::new("photo.png")), None);
        assert_eq!(MediaType::from_path(Path::new("README")), None);
        assert_eq!(MediaType::from_path(Path::new("archive.jpg.gz")), None);
    }

    #[test]
    fn test_photo_video_classification() {
        assert!(MediaType::Jpeg.is_photo());
        assert!(!MediaType::Jpeg.is_video());
        assert!(MediaType::Mp4.is_video());
        assert!(MediaType::QuickTime.is_video());
    }
}
