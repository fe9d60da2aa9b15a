//! Batch orchestration.
//!
//! For each input, in order: decode and reverse, optionally write the
//! reversed frames, optionally combine with the original. A failure in one
//! input never stops the batch; it is recorded in that input's
//! [`InputReport`] and the next input starts from scratch.
//!
//! Within one input the steps are ordered: frames are only written and the
//! combination only attempted once the reversed video exists. A failed
//! combination keeps the reversed video and any extracted frames.
//!
//! # Example
//!
//! ```no_run
//! use rewind::{CombineMode, OutputLayout, PipelineOptions, ReversalSpec};
//!
//! let spec = ReversalSpec::new(["clip.mp4"]).combine(CombineMode::OriginalThenReversed);
//! let report = rewind::process_batch(&spec, &OutputLayout::default(), &PipelineOptions::new())?;
//! for input in report.inputs() {
//!     println!("{}: {}", input.input.display(), input.status());
//! }
//! # Ok::<(), rewind::RewindError>(())
//! ```

use std::{
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};

use serde_json::{Value, json};

use crate::{
    combine::combine_videos,
    config::{CombineMode, PipelineOptions, ReversalSpec},
    error::{ErrorKind, RewindError},
    extract::extract_frames,
    layout::{OutputLayout, base_name},
    reverse::reverse_source,
    source::VideoSource,
};

/// The step of the pipeline an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Decoding and encoding the reversed video.
    Reverse,
    /// Writing the reversed frames as images.
    ExtractFrames,
    /// Joining original and reversed.
    Combine,
}

impl Step {
    /// Short lowercase label.
    pub fn as_str(self) -> &'static str {
        match self {
            Step::Reverse => "reverse",
            Step::ExtractFrames => "extract_frames",
            Step::Combine => "combine",
        }
    }
}

/// A recorded failure of one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    /// Step that failed.
    pub step: Step,
    /// Classification of the error.
    pub kind: ErrorKind,
    /// Human-readable message.
    pub message: String,
}

impl StepFailure {
    fn new(step: Step, error: &RewindError) -> Self {
        Self {
            step,
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// A video file the pipeline wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoArtifact {
    /// Where it was written.
    pub path: PathBuf,
    /// Number of frames in it.
    pub frames: u64,
    /// Its total duration.
    pub duration: Duration,
}

/// Overall outcome for one input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputStatus {
    /// Every requested step succeeded.
    Succeeded,
    /// The reversed video was written but a later step failed.
    Partial,
    /// Nothing was produced.
    Failed,
}

impl fmt::Display for InputStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InputStatus::Succeeded => "ok",
            InputStatus::Partial => "partial",
            InputStatus::Failed => "failed",
        })
    }
}

/// What happened to one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputReport {
    /// Input path as given.
    pub input: PathBuf,
    /// Base name used for output naming.
    pub base_name: String,
    /// The reversed video, if written.
    pub reversed: Option<VideoArtifact>,
    /// Extracted frame images, in reversed-playback order.
    pub frames: Vec<PathBuf>,
    /// The combined video, if written.
    pub combined: Option<VideoArtifact>,
    /// Steps that failed.
    pub failures: Vec<StepFailure>,
}

impl InputReport {
    fn new(input: &Path) -> Self {
        Self {
            input: input.to_path_buf(),
            base_name: base_name(input),
            reversed: None,
            frames: Vec::new(),
            combined: None,
            failures: Vec::new(),
        }
    }

    fn fail(&mut self, step: Step, error: &RewindError) {
        log::warn!("{} ({}): {error}", self.input.display(), step.as_str());
        self.failures.push(StepFailure::new(step, error));
    }

    /// Overall status.
    pub fn status(&self) -> InputStatus {
        match (&self.reversed, self.failures.is_empty()) {
            (None, _) => InputStatus::Failed,
            (Some(_), true) => InputStatus::Succeeded,
            (Some(_), false) => InputStatus::Partial,
        }
    }

    /// Failure of the given step, if any.
    pub fn failure(&self, step: Step) -> Option<&StepFailure> {
        self.failures.iter().find(|failure| failure.step == step)
    }

    /// Paths of every artifact written for this input.
    pub fn artifacts(&self) -> Vec<&Path> {
        self.reversed
            .iter()
            .map(|video| video.path.as_path())
            .chain(self.frames.iter().map(PathBuf::as_path))
            .chain(self.combined.iter().map(|video| video.path.as_path()))
            .collect()
    }

    /// JSON view of this report.
    pub fn to_json(&self) -> Value {
        let video = |artifact: &Option<VideoArtifact>| {
            artifact.as_ref().map(|video| {
                json!({
                    "path": video.path.display().to_string(),
                    "frames": video.frames,
                    "duration_seconds": video.duration.as_secs_f64(),
                })
            })
        };
        json!({
            "input": self.input.display().to_string(),
            "base_name": self.base_name,
            "status": self.status().to_string(),
            "reversed": video(&self.reversed),
            "frames": self.frames.iter().map(|path| path.display().to_string()).collect::<Vec<_>>(),
            "combined": video(&self.combined),
            "errors": self.failures.iter().map(|failure| json!({
                "step": failure.step.as_str(),
                "kind": failure.kind.as_str(),
                "message": failure.message,
            })).collect::<Vec<_>>(),
        })
    }
}

/// Per-input outcomes of a batch, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    inputs: Vec<InputReport>,
}

impl BatchReport {
    pub(crate) fn new(inputs: Vec<InputReport>) -> Self {
        Self { inputs }
    }

    /// Reports in input order.
    pub fn inputs(&self) -> &[InputReport] {
        &self.inputs
    }

    /// Number of inputs where every step succeeded.
    pub fn succeeded(&self) -> usize {
        self.count(InputStatus::Succeeded)
    }

    /// Number of inputs with a reversed video but a failed later step.
    pub fn partial(&self) -> usize {
        self.count(InputStatus::Partial)
    }

    /// Number of inputs that produced nothing.
    pub fn failed(&self) -> usize {
        self.count(InputStatus::Failed)
    }

    fn count(&self, status: InputStatus) -> usize {
        self.inputs
            .iter()
            .filter(|report| report.status() == status)
            .count()
    }

    /// JSON view of the whole batch.
    pub fn to_json(&self) -> Value {
        json!({
            "succeeded": self.succeeded(),
            "partial": self.partial(),
            "failed": self.failed(),
            "inputs": self.inputs.iter().map(InputReport::to_json).collect::<Vec<_>>(),
        })
    }
}

/// Run every step for one input.
///
/// Never returns an error: failures are recorded in the report.
pub fn process_input<P: AsRef<Path>>(
    input: P,
    keep_frames: bool,
    mode: CombineMode,
    layout: &OutputLayout,
    options: &PipelineOptions,
) -> InputReport {
    let input = input.as_ref();
    let mut report = InputReport::new(input);
    log::info!("Processing {}", input.display());

    let reversed_path = layout.reversed_path(&report.base_name);
    let reversed = match VideoSource::open(input)
        .and_then(|mut source| reverse_source(&mut source, &reversed_path, options))
    {
        Ok(reversed) => reversed,
        Err(error) => {
            report.fail(Step::Reverse, &error);
            return report;
        }
    };
    report.reversed = Some(VideoArtifact {
        path: reversed.summary.path.clone(),
        frames: reversed.summary.frames,
        duration: reversed.summary.duration,
    });
    log::info!(
        "Reversed {} -> {}",
        input.display(),
        reversed.path().display()
    );

    if keep_frames {
        match extract_frames(&reversed.sequence, layout, &report.base_name, options) {
            Ok(frames) => report.frames = frames,
            Err(error) => {
                report.fail(Step::ExtractFrames, &error);
                return report;
            }
        }
    }

    // The combiner streams from disk; release the decoded frames first.
    drop(reversed);

    if let Some(combined_path) = layout.combined_path(&report.base_name, mode) {
        match combine_videos(input, &reversed_path, mode, &combined_path, options) {
            Ok(summary) => {
                log::info!("Combined ({mode}) -> {}", summary.path.display());
                report.combined = Some(VideoArtifact {
                    path: summary.path,
                    frames: summary.frames,
                    duration: summary.duration,
                });
            }
            Err(error) => report.fail(Step::Combine, &error),
        }
    }

    report
}

/// Process every input of `spec`, in order.
///
/// # Errors
///
/// Only for problems that affect the whole batch:
/// - [`RewindError::Config`] if `spec` has no inputs.
/// - [`RewindError::Io`] if the output directories cannot be created.
///
/// Per-input failures are reported in the returned [`BatchReport`].
pub fn process_batch(
    spec: &ReversalSpec,
    layout: &OutputLayout,
    options: &PipelineOptions,
) -> Result<BatchReport, RewindError> {
    spec.validate()?;
    layout.ensure_dirs(spec.keep_frames)?;

    let reports = spec
        .inputs
        .iter()
        .map(|input| process_input(input, spec.keep_frames, spec.mode, layout, options))
        .collect();

    let report = BatchReport::new(reports);
    log::info!(
        "Batch finished: {} ok, {} partial, {} failed",
        report.succeeded(),
        report.partial(),
        report.failed()
    );
    Ok(report)
}
