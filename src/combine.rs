//! Joining an original clip with its reversal.
//!
//! [`combine_videos`] re-opens both files and streams them, one after the
//! other, into a single output. Frames are never held in memory all at once
//! and each keeps its own duration, so the output is exactly as long as the
//! two inputs together.
//!
//! The seam is left as is: the last frame of the first clip and the first
//! frame of the second are the same picture, and both are kept.

use std::path::Path;

use crate::{
    config::{CombineMode, PipelineOptions},
    encode::{EncodeSummary, VideoWriter},
    error::RewindError,
    frames::FrameSequence,
    progress::{OperationType, ProgressTracker},
    source::VideoSource,
};

/// Order the two parts according to `mode`.
fn ordered<'p>(original: &'p Path, reversed: &'p Path, mode: CombineMode) -> Option<[&'p Path; 2]> {
    match mode {
        CombineMode::None => None,
        CombineMode::OriginalThenReversed => Some([original, reversed]),
        CombineMode::ReversedThenOriginal => Some([reversed, original]),
    }
}

/// Concatenate in-memory sequences according to `mode`.
///
/// Returns `None` for [`CombineMode::None`].
pub fn combine_sequences(
    original: FrameSequence,
    reversed: FrameSequence,
    mode: CombineMode,
) -> Option<FrameSequence> {
    match mode {
        CombineMode::None => None,
        CombineMode::OriginalThenReversed => Some(original.concat(reversed)),
        CombineMode::ReversedThenOriginal => Some(reversed.concat(original)),
    }
}

/// Write `original` and `reversed` back to back into `output`.
///
/// # Errors
///
/// [`RewindError::Combine`] if `mode` is [`CombineMode::None`], if either
/// part cannot be opened or yields no frames, or if the output cannot be
/// written.
pub fn combine_videos<P: AsRef<Path>, R: AsRef<Path>, O: AsRef<Path>>(
    original: P,
    reversed: R,
    mode: CombineMode,
    output: O,
    options: &PipelineOptions,
) -> Result<EncodeSummary, RewindError> {
    let output = output.as_ref();
    let combine_error = |reason: String| RewindError::Combine {
        path: output.to_path_buf(),
        reason,
    };

    let parts = ordered(original.as_ref(), reversed.as_ref(), mode)
        .ok_or_else(|| combine_error("combination mode is none".to_string()))?;

    log::info!(
        "Combining {} + {} into {}",
        parts[0].display(),
        parts[1].display(),
        output.display()
    );

    let mut sources = Vec::with_capacity(parts.len());
    for part in parts {
        sources.push(VideoSource::open(part).map_err(|error| error.into_combine(output))?);
    }

    let expected: u64 = sources.iter().map(|source| source.metadata().frame_count).sum();
    let mut tracker = ProgressTracker::new(
        options.progress.clone(),
        OperationType::Combining,
        original.as_ref(),
        (expected > 0).then_some(expected),
        options.batch_size,
    );

    let mut writer: Option<VideoWriter> = None;
    for source in &mut sources {
        let part = source.path().to_path_buf();
        let frame_rate = source.metadata().frames_per_second;
        let mut part_frames = 0_u64;

        let reader = source.frames().map_err(|error| error.into_combine(output))?;
        for frame in reader {
            let frame = frame.map_err(|error| error.into_combine(output))?;
            // The output takes the dimensions of the first frame written.
            if writer.is_none() {
                let opened = options
                    .video_encoder()
                    .open(
                        output,
                        frame.image.width(),
                        frame.image.height(),
                        (frame_rate > 0.0).then_some(frame_rate),
                    )
                    .map_err(|error| error.into_combine(output))?;
                writer = Some(opened);
            }
            if let Some(active) = writer.as_mut() {
                active.push(&frame).map_err(|error| error.into_combine(output))?;
            }
            part_frames += 1;
            tracker.advance();
        }

        if part_frames == 0 {
            return Err(combine_error(format!("{} has no readable frames", part.display())));
        }
        log::debug!("Appended {part_frames} frames from {}", part.display());
    }

    let writer = writer.ok_or_else(|| combine_error("nothing to write".to_string()))?;
    let summary = writer.finish().map_err(|error| error.into_combine(output))?;
    tracker.finish();
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use image::{DynamicImage, RgbImage};

    use super::*;
    use crate::frames::TimedFrame;

    fn clip(count: u8, millis: u64) -> FrameSequence {
        (0..count)
            .map(|shade| {
                let image = RgbImage::from_pixel(2, 2, image::Rgb([shade, 0, 0]));
                TimedFrame::new(DynamicImage::ImageRgb8(image), Duration::from_millis(millis))
            })
            .collect()
    }

    fn reds(sequence: &FrameSequence) -> Vec<u8> {
        sequence
            .iter()
            .map(|frame| frame.image.to_rgb8().get_pixel(0, 0)[0])
            .collect()
    }

    #[test]
    fn ab_puts_original_first() {
        let original = clip(3, 10);
        let reversed = original.clone().reversed();
        let combined =
            combine_sequences(original, reversed, CombineMode::OriginalThenReversed).unwrap();
        assert_eq!(reds(&combined), vec![0, 1, 2, 2, 1, 0]);
    }

    #[test]
    fn ba_puts_reversed_first() {
        let original = clip(3, 10);
        let reversed = original.clone().reversed();
        let combined =
            combine_sequences(original, reversed, CombineMode::ReversedThenOriginal).unwrap();
        assert_eq!(reds(&combined), vec![2, 1, 0, 0, 1, 2]);
    }

    #[test]
    fn length_law_holds_for_uneven_parts() {
        let original = clip(4, 40);
        let other = clip(2, 25);
        let combined =
            combine_sequences(original, other, CombineMode::OriginalThenReversed).unwrap();
        assert_eq!(combined.len(), 6);
        assert_eq!(combined.total_duration(), Duration::from_millis(210));
    }

    #[test]
    fn none_mode_produces_nothing() {
        assert!(combine_sequences(clip(1, 10), clip(1, 10), CombineMode::None).is_none());
    }

    #[test]
    fn none_mode_is_rejected_for_files() {
        let result = combine_videos(
            "a.mp4",
            "a_reversed.mp4",
            CombineMode::None,
            "a_combo.mp4",
            &PipelineOptions::new(),
        );
        assert!(matches!(result, Err(RewindError::Combine { .. })));
    }

    #[test]
    fn unreadable_part_is_a_combine_error() {
        let directory = tempfile::tempdir().unwrap();
        let output = directory.path().join("x_combo_ab.mp4");
        let result = combine_videos(
            directory.path().join("missing.mp4"),
            directory.path().join("missing_reversed.mp4"),
            CombineMode::OriginalThenReversed,
            &output,
            &PipelineOptions::new(),
        );
        let error = result.unwrap_err();
        assert!(matches!(error, RewindError::Combine { .. }));
        assert!(error.to_string().contains("missing.mp4"));
        assert!(!output.exists());
    }
}
