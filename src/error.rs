//! Error types for the `rewind` crate.
//!
//! [`RewindError`] is the single error type returned by every fallible
//! operation. The pipeline never lets one of these escape a batch: they are
//! caught per input and folded into an
//! [`InputReport`](crate::pipeline::InputReport).

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

/// The unified error type for all `rewind` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RewindError {
    /// The input could not be opened, has no video stream, or yielded no
    /// readable frames.
    #[error("Failed to decode {path}: {reason}")]
    Decode {
        /// Input that failed to decode.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// An output container or image could not be written.
    #[error("Failed to encode {path}: {reason}")]
    Encode {
        /// Output that could not be written.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// One of the two constituents of a combined video could not be read,
    /// or the combined output could not be written.
    #[error("Failed to combine into {path}: {reason}")]
    Combine {
        /// Combined output path.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// Invalid configuration (unknown combination mode, empty input list).
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    Ffmpeg(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// An error from the `image` crate.
    #[error("Image processing error: {0}")]
    Image(#[from] ImageError),
}

/// Coarse classification of a [`RewindError`], used in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Input could not be read.
    Decode,
    /// Output could not be written.
    Encode,
    /// Combination step failed.
    Combine,
    /// Configuration was rejected.
    Config,
    /// Filesystem failure outside of decoding/encoding.
    Io,
}

impl RewindError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RewindError::Decode { .. } => ErrorKind::Decode,
            RewindError::Encode { .. } | RewindError::Image(_) => ErrorKind::Encode,
            RewindError::Combine { .. } => ErrorKind::Combine,
            RewindError::Config(_) => ErrorKind::Config,
            RewindError::Ffmpeg(_) => ErrorKind::Decode,
            RewindError::Io(_) => ErrorKind::Io,
        }
    }

    /// Re-tag this error as a decode failure of `path`, keeping its message.
    pub(crate) fn into_decode(self, path: impl Into<PathBuf>) -> Self {
        match self {
            RewindError::Decode { .. } => self,
            other => RewindError::Decode {
                path: path.into(),
                reason: other.to_string(),
            },
        }
    }

    /// Re-tag this error as a combination failure of `path`.
    pub(crate) fn into_combine(self, path: impl Into<PathBuf>) -> Self {
        match self {
            RewindError::Combine { .. } => self,
            other => RewindError::Combine {
                path: path.into(),
                reason: other.to_string(),
            },
        }
    }
}

impl ErrorKind {
    /// Short lowercase label, as printed in CLI output and JSON reports.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Decode => "decode",
            ErrorKind::Encode => "encode",
            ErrorKind::Combine => "combine",
            ErrorKind::Config => "config",
            ErrorKind::Io => "io",
        }
    }
}

impl From<FfmpegError> for RewindError {
    fn from(error: FfmpegError) -> Self {
        RewindError::Ffmpeg(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retagging_keeps_original_message() {
        let error = RewindError::Ffmpeg("Invalid data found".to_string()).into_decode("clip.mp4");
        assert_eq!(error.kind(), ErrorKind::Decode);
        assert!(error.to_string().contains("Invalid data found"));
        assert!(error.to_string().contains("clip.mp4"));
    }

    #[test]
    fn retagging_combine_is_idempotent() {
        let error = RewindError::Combine {
            path: PathBuf::from("a_combo_ab.mp4"),
            reason: "boom".to_string(),
        };
        let retagged = error.into_combine("other.mp4");
        assert!(retagged.to_string().contains("a_combo_ab.mp4"));
    }

    #[test]
    fn image_errors_count_as_encode_failures() {
        let error = RewindError::from(ImageError::IoError(IoError::other("disk full")));
        assert_eq!(error.kind(), ErrorKind::Encode);
        assert_eq!(error.kind().as_str(), "encode");
    }
}
