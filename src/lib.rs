//! Merge a JPEG photo and a short video clip into a Google "Motion Photo".
//!
//! The merged file uses the single-file Microvideo layout: the photo, with
//! `GCamera:MicroVideo*` properties in its XMP packet, followed directly by
//! every byte of the video. Android viewers find the clip by seeking
//! `MicroVideoOffset` bytes back from the end of the file.
//!
//! # Design Principles
//!
//! - **Streaming**: JPEGs are parsed in a single pass and rewritten segment by segment
//! - **Safe rewrites**: a merged file is assembled in a temporary file that only
//!   replaces the output once it is complete
//! - **Repeatable**: a video embedded by an earlier merge is dropped before a
//!   merge, so merging twice gives the same bytes as merging once. Other data
//!   after the photo's EOI marker is kept
//!
//! # Quick Start
//!
//! ```no_run
//! use motion_photo_muxer::{locate_in_dir, Batch, BatchConfig, MergeOptions, Merger};
//!
//! # fn main() -> motion_photo_muxer::Result<()> {
//! let pairs = locate_in_dir("camera".as_ref(), true)?;
//! let merger = Merger::new(MergeOptions::new().set_output_dir("merged"));
//! let report = Batch::new(merger, BatchConfig::default()).run(pairs);
//! println!("{}", report);
//! # Ok(())
//! # }
//! ```
//!
//! # Single Pair
//!
//! ```no_run
//! use motion_photo_muxer::{MergeOptions, Merger, PhotoVideoPair};
//!
//! # fn main() -> motion_photo_muxer::Result<()> {
//! let pair = PhotoVideoPair::new("IMG_001.jpg", "IMG_001.mov")?;
//! let merger = Merger::new(MergeOptions::new());
//! let merged = merger.merge(&pair)?;
//! assert_eq!(merged.offset, merged.video_size);
//! # Ok(())
//! # }
//! ```
//!
//! # Container API
//!
//! The JPEG layer is usable on its own:
//!
//! ```no_run
//! use motion_photo_muxer::{ContainerIO, JpegIO, Updates};
//! use std::fs::File;
//!
//! # fn main() -> motion_photo_muxer::Result<()> {
//! let mut file = File::open("image.jpg")?;
//! let io = JpegIO::new();
//! let structure = io.parse(&mut file)?;
//!
//! if let Some(xmp) = io.read_xmp(&structure, &mut file)? {
//!     println!("Found XMP: {} bytes", xmp.len());
//! }
//! println!("{} bytes after EOI", structure.trailing_size());
//!
//! let mut output = File::create("output.jpg")?;
//! io.write(&structure, &mut file, &mut output, &Updates::new())?;
//! # Ok(())
//! # }
//! ```

pub mod batch;
mod error;
mod formats;
pub mod locator;
pub mod logging;
mod media_type;
pub mod merger;
pub mod metadata;
mod segment;
mod structure;
mod updates;
pub mod xmp;

pub use batch::{Batch, BatchConfig, BatchReport, PairOutcome, PairState};
pub use error::{Error, ErrorKind, Result};
pub use formats::{jpeg_io::JpegIO, ContainerIO};
pub use locator::{locate_explicit, locate_in_dir, Pairs, PhotoVideoPair, SkippedGroup};
pub use logging::Verbosity;
pub use media_type::MediaType;
pub use merger::{MergeOptions, MergedFile, Merger, DEFAULT_PRESENTATION_TIMESTAMP_US};
pub use metadata::{MetadataAccessor, Tag, XmpMetadata};
pub use segment::{ByteRange, ExtendedXmp, Location, Segment, SegmentKind, MAX_XMP_SIZE};
pub use structure::Structure;
pub use updates::{MetadataUpdate, Updates};

// Test utilities - only compiled for tests or when explicitly enabled
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
