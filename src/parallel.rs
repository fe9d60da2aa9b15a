//! Parallel batch processing.
//!
//! [`process_batch_parallel`] hands each input to its own [`rayon`] worker.
//! Every worker opens its own demuxer, decoder and encoder, so nothing is
//! shared except the progress callback. Reports come back in input order.
//!
//! Peak memory grows with the number of workers, since each one holds a
//! whole decoded clip. Size the rayon pool accordingly.

use ::rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::{
    config::{PipelineOptions, ReversalSpec},
    error::RewindError,
    layout::OutputLayout,
    pipeline::{BatchReport, InputReport, process_input},
};

/// Like [`process_batch`](crate::process_batch), with one rayon task per input.
///
/// # Errors
///
/// Same as [`process_batch`](crate::process_batch).
pub fn process_batch_parallel(
    spec: &ReversalSpec,
    layout: &OutputLayout,
    options: &PipelineOptions,
) -> Result<BatchReport, RewindError> {
    spec.validate()?;
    layout.ensure_dirs(spec.keep_frames)?;

    let reports: Vec<InputReport> = spec
        .inputs
        .par_iter()
        .map(|input| process_input(input, spec.keep_frames, spec.mode, layout, options))
        .collect();

    Ok(BatchReport::new(reports))
}
