//! Batch configuration.
//!
//! [`ReversalSpec`] is the immutable description of one invocation: which
//! files, whether to keep frames, and how to combine. Both outer surfaces (CLI
//! and web form) build one and hand it to
//! [`process_batch`](crate::pipeline::process_batch); the pipeline never looks
//! at where it came from.
//!
//! [`PipelineOptions`] threads encoder settings and progress reporting
//! through the pipeline without widening every function signature.
//!
//! # Example
//!
//! ```
//! use rewind::{CombineMode, ReversalSpec};
//!
//! let spec = ReversalSpec::new(["clip.mp4", "other.mov"])
//!     .keep_frames(true)
//!     .combine("ab".parse::<CombineMode>().unwrap());
//! assert!(spec.validate().is_ok());
//! ```

use std::{
    fmt::{self, Debug, Formatter, Result as FmtResult},
    path::PathBuf,
    str::FromStr,
    sync::Arc,
};

use crate::{
    encode::{VideoEncoder, VideoEncoderOptions},
    error::RewindError,
    progress::{NoOpProgress, ProgressCallback},
};

/// Whether, and in which order, the original and reversed clips are joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CombineMode {
    /// No combined output.
    #[default]
    None,
    /// Original, then reversed (`ab`).
    OriginalThenReversed,
    /// Reversed, then original (`ba`).
    ReversedThenOriginal,
}

impl CombineMode {
    /// Short tag used in output names (`ab` / `ba`), `None` for [`CombineMode::None`].
    pub fn tag(self) -> Option<&'static str> {
        match self {
            CombineMode::None => None,
            CombineMode::OriginalThenReversed => Some("ab"),
            CombineMode::ReversedThenOriginal => Some("ba"),
        }
    }

    /// Whether the combiner runs at all.
    pub fn is_enabled(self) -> bool {
        self != CombineMode::None
    }
}

impl FromStr for CombineMode {
    type Err = RewindError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(CombineMode::None),
            "ab" => Ok(CombineMode::OriginalThenReversed),
            "ba" => Ok(CombineMode::ReversedThenOriginal),
            other => Err(RewindError::Config(format!(
                "invalid combination mode {other:?} (expected none, ab or ba)"
            ))),
        }
    }
}

impl fmt::Display for CombineMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.tag().unwrap_or("none"))
    }
}

/// One invocation's worth of work. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct ReversalSpec {
    /// Input video paths, processed in order.
    pub inputs: Vec<PathBuf>,
    /// Write the reversed frames as images.
    pub keep_frames: bool,
    /// Combination mode.
    pub mode: CombineMode,
}

impl ReversalSpec {
    /// Start a spec for `inputs` with frames discarded and no combination.
    pub fn new<I, P>(inputs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            keep_frames: false,
            mode: CombineMode::None,
        }
    }

    /// Set the keep-frames flag.
    pub fn keep_frames(mut self, keep: bool) -> Self {
        self.keep_frames = keep;
        self
    }

    /// Set the combination mode.
    pub fn combine(mut self, mode: CombineMode) -> Self {
        self.mode = mode;
        self
    }

    /// Reject a spec with nothing to do.
    ///
    /// # Errors
    ///
    /// [`RewindError::Config`] when no input path was given.
    pub fn validate(&self) -> Result<(), RewindError> {
        if self.inputs.is_empty() {
            return Err(RewindError::Config("no input videos given".to_string()));
        }
        Ok(())
    }
}

/// Operational settings for the pipeline.
#[derive(Clone)]
pub struct PipelineOptions {
    /// Encoder used for reversed and combined outputs.
    pub encoder: VideoEncoderOptions,
    /// Progress callback (default: no-op).
    pub progress: Arc<dyn ProgressCallback>,
    /// Frames between progress callbacks.
    pub batch_size: u64,
}

impl Debug for PipelineOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("PipelineOptions")
            .field("encoder", &self.encoder)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            encoder: VideoEncoderOptions::default(),
            progress: Arc::new(NoOpProgress),
            batch_size: 10,
        }
    }
}

impl PipelineOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the encoder options.
    pub fn with_encoder(mut self, encoder: VideoEncoderOptions) -> Self {
        self.encoder = encoder;
        self
    }

    /// Attach a progress callback.
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Set how many frames pass between progress callbacks.
    pub fn with_batch_size(mut self, batch_size: u64) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub(crate) fn video_encoder(&self) -> VideoEncoder {
        VideoEncoder::new(self.encoder.clone())
    }
}
