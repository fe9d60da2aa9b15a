//! Video metadata.
//!
//! Extracted once when a [`VideoSource`](crate::VideoSource) is opened and
//! cached for the lifetime of the handle.

use std::time::Duration;

/// Metadata for the video stream of an opened source.
#[derive(Debug, Clone)]
#[must_use]
pub struct VideoMetadata {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frames per second (average; approximate for variable-frame-rate content).
    pub frames_per_second: f64,
    /// Container duration. `Duration::ZERO` when the container does not say.
    pub duration: Duration,
    /// Estimated frame count, computed from duration and frame rate.
    ///
    /// The authoritative count is the number of frames actually decoded.
    pub frame_count: u64,
    /// Codec name (e.g. `"h264"`, `"mpeg4"`).
    pub codec: String,
    /// Container format name (e.g. `"mov,mp4,m4a,3gp,3g2,mj2"`).
    pub format: String,
}
