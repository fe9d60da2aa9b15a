//! Frame reversal.
//!
//! The whole input is decoded into memory, reversed with
//! [`FrameSequence::reversed`], and encoded frame by frame. Each output frame
//! carries the duration of the source frame it came from, so the reversed
//! clip plays for exactly as long as the original even when the source has a
//! variable frame rate.

use std::path::{Path, PathBuf};

use crate::{
    config::PipelineOptions,
    encode::EncodeSummary,
    error::RewindError,
    frames::FrameSequence,
    progress::{OperationType, ProgressTracker},
    source::VideoSource,
};

/// A reversed video: the file that was written and the frames it holds.
#[derive(Debug, Clone)]
pub struct ReversedVideo {
    /// Encoded output.
    pub summary: EncodeSummary,
    /// Reversed frames, still in memory for frame extraction.
    pub sequence: FrameSequence,
}

impl ReversedVideo {
    /// Path of the written file.
    pub fn path(&self) -> &Path {
        &self.summary.path
    }
}

/// Decode `source` completely, with progress reporting.
///
/// # Errors
///
/// [`RewindError::Decode`] on decode failure or when no frame is readable.
pub fn decode_with_progress(
    source: &mut VideoSource,
    options: &PipelineOptions,
) -> Result<FrameSequence, RewindError> {
    let expected = source.metadata().frame_count;
    let mut tracker = ProgressTracker::new(
        options.progress.clone(),
        OperationType::Decoding,
        source.path(),
        (expected > 0).then_some(expected),
        options.batch_size,
    );
    source.decode_tracked(&mut tracker)
}

/// Encode `sequence` to `output`, with progress reported against `input`.
pub(crate) fn encode_with_progress(
    sequence: &FrameSequence,
    input: &Path,
    output: &Path,
    options: &PipelineOptions,
) -> Result<EncodeSummary, RewindError> {
    let mut tracker = ProgressTracker::new(
        options.progress.clone(),
        OperationType::Encoding,
        input,
        Some(sequence.len() as u64),
        options.batch_size,
    );
    options
        .video_encoder()
        .write_tracked(output, sequence, &mut tracker)
}

/// Reverse an opened source into `output`, overwriting any file there.
///
/// # Errors
///
/// - [`RewindError::Decode`] if the source cannot be decoded or has no frames.
/// - [`RewindError::Encode`] if the output cannot be written.
pub fn reverse_source<P: AsRef<Path>>(
    source: &mut VideoSource,
    output: P,
    options: &PipelineOptions,
) -> Result<ReversedVideo, RewindError> {
    let output = output.as_ref();
    let input: PathBuf = source.path().to_path_buf();

    let sequence = decode_with_progress(source, options)?.reversed();
    log::debug!(
        "Reversed {} frames ({:?}) from {}",
        sequence.len(),
        sequence.total_duration(),
        input.display()
    );

    let summary = encode_with_progress(&sequence, &input, output, options)?;
    Ok(ReversedVideo { summary, sequence })
}

/// Open `input` and reverse it into `output`.
///
/// # Example
///
/// ```no_run
/// use rewind::{PipelineOptions, RewindError};
///
/// let reversed = rewind::reverse_file("clip.mp4", "clip_reversed.mp4", &PipelineOptions::new())?;
/// println!("{} frames", reversed.sequence.len());
/// # Ok::<(), RewindError>(())
/// ```
///
/// # Errors
///
/// See [`reverse_source`].
pub fn reverse_file<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    options: &PipelineOptions,
) -> Result<ReversedVideo, RewindError> {
    let mut source = VideoSource::open(input)?;
    reverse_source(&mut source, output, options)
}
