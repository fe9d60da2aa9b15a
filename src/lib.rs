//! # rewind
//!
//! Reverse videos frame by frame, keep the reversed frames as images, and
//! loop originals with their reversal.
//!
//! Every frame keeps its own display duration through reversal, so a
//! reversed clip plays for exactly as long as its source, variable frame
//! rate included. Decoding and encoding go through FFmpeg via the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate.
//!
//! ## Quick Start
//!
//! ### Reverse a Video
//!
//! ```no_run
//! use rewind::PipelineOptions;
//!
//! let reversed = rewind::reverse_file("input.mp4", "input_reversed.mp4", &PipelineOptions::new()).unwrap();
//! println!("{} frames, {:?}", reversed.summary.frames, reversed.summary.duration);
//! ```
//!
//! ### Run a Batch
//!
//! ```no_run
//! use rewind::{CombineMode, OutputLayout, PipelineOptions, ReversalSpec};
//!
//! let spec = ReversalSpec::new(["a.mp4", "b.mov"])
//!     .keep_frames(true)
//!     .combine(CombineMode::OriginalThenReversed);
//! let report = rewind::process_batch(&spec, &OutputLayout::default(), &PipelineOptions::new()).unwrap();
//! println!("{} ok, {} failed", report.succeeded(), report.failed());
//! ```
//!
//! This writes, for `a.mp4`:
//!
//! - `reversed_videos/a_reversed.mp4`
//! - `extracted_frames/a/frame_00000.jpg`, `frame_00001.jpg`, …
//! - `reversed_videos/a_combo_ab.mp4`
//!
//! ### Work With Frames Directly
//!
//! ```no_run
//! use rewind::VideoSource;
//!
//! let mut source = VideoSource::open("input.mp4").unwrap();
//! let frames = source.decode().unwrap();
//! let reversed = frames.reversed();
//! assert_eq!(reversed.len(), reversed.durations().len());
//! ```
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `web` (default) | Upload form and static file server via axum |
//! | `rayon` | `process_batch_parallel()` runs one worker per input |
//! | `full` | Enables all of the above |
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

pub mod combine;
pub mod config;
pub mod encode;
pub mod error;
pub mod extract;
pub mod ffmpeg;
pub mod frames;
pub mod layout;
pub mod metadata;
#[cfg(feature = "rayon")]
mod parallel;
pub mod pipeline;
pub mod progress;
pub mod reverse;
pub mod source;
mod utilities;
#[cfg(feature = "web")]
pub mod web;

pub use combine::{combine_sequences, combine_videos};
pub use config::{CombineMode, PipelineOptions, ReversalSpec};
pub use encode::{EncodeSummary, VideoCodec, VideoEncoder, VideoEncoderOptions, VideoWriter};
pub use error::{ErrorKind, RewindError};
pub use extract::extract_frames;
pub use ffmpeg::{FfmpegLogLevel, set_ffmpeg_log_level};
pub use frames::{FrameReader, FrameSequence, TimedFrame};
pub use layout::{OutputLayout, base_name};
pub use metadata::VideoMetadata;
#[cfg(feature = "rayon")]
pub use parallel::process_batch_parallel;
pub use pipeline::{
    BatchReport, InputReport, InputStatus, Step, StepFailure, VideoArtifact, process_batch,
    process_input,
};
pub use progress::{OperationType, ProgressCallback, ProgressInfo};
pub use reverse::{ReversedVideo, reverse_file, reverse_source};
pub use source::VideoSource;
#[cfg(feature = "web")]
pub use web::WebConfig;
