//! Shared helpers for integration tests.
//!
//! Fixtures are generated on the fly with the crate's own encoder using
//! MPEG-4 Part 2, which every FFmpeg build ships. Frames are flat grey so
//! they survive lossy compression well enough to be told apart.

#![allow(dead_code)]

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use image::{DynamicImage, RgbImage};
use rewind::{
    FfmpegLogLevel, FrameSequence, PipelineOptions, TimedFrame, VideoCodec, VideoEncoder,
    VideoEncoderOptions,
};

pub const WIDTH: u32 = 64;
pub const HEIGHT: u32 = 48;

pub fn mpeg4_encoder_options() -> VideoEncoderOptions {
    VideoEncoderOptions::default().codec(VideoCodec::Mpeg4)
}

pub fn mpeg4_options() -> PipelineOptions {
    rewind::set_ffmpeg_log_level(FfmpegLogLevel::Error);
    PipelineOptions::new().with_encoder(mpeg4_encoder_options())
}

/// Flat grey frames, one per `(level, duration)` pair.
pub fn grey_sequence(frames: &[(u8, Duration)]) -> FrameSequence {
    frames
        .iter()
        .map(|&(level, duration)| {
            let image = RgbImage::from_pixel(WIDTH, HEIGHT, image::Rgb([level, level, level]));
            TimedFrame::new(DynamicImage::ImageRgb8(image), duration)
        })
        .collect()
}

/// `count` frames at a constant `fps`, levels spread evenly from dark to light.
pub fn constant_rate_sequence(count: usize, fps: u32) -> FrameSequence {
    let interval = Duration::from_secs(1) / fps;
    let frames: Vec<(u8, Duration)> = (0..count)
        .map(|index| ((index * 240 / count.max(1)) as u8, interval))
        .collect();
    grey_sequence(&frames)
}

/// Encode `sequence` into `directory/name`. Returns `None`, after printing a
/// skip notice, when the MPEG-4 encoder is unavailable.
pub fn write_fixture(directory: &Path, name: &str, sequence: &FrameSequence) -> Option<PathBuf> {
    rewind::set_ffmpeg_log_level(FfmpegLogLevel::Error);
    let path = directory.join(name);
    match VideoEncoder::new(mpeg4_encoder_options()).write(&path, sequence) {
        Ok(_) => Some(path),
        Err(error) => {
            eprintln!("Skipping: MPEG-4 encoder not available ({error})");
            None
        }
    }
}

/// Grey level at the centre of each frame.
pub fn levels(sequence: &FrameSequence) -> Vec<u8> {
    sequence
        .iter()
        .map(|frame| frame.image.to_rgb8().get_pixel(WIDTH / 2, HEIGHT / 2)[1])
        .collect()
}

pub fn assert_levels_close(actual: &[u8], expected: &[u8], tolerance: u8) {
    assert_eq!(actual.len(), expected.len(), "frame count differs");
    for (index, (&a, &e)) in actual.iter().zip(expected).enumerate() {
        assert!(
            a.abs_diff(e) <= tolerance,
            "frame {index}: level {a} not within {tolerance} of {e} ({actual:?} vs {expected:?})"
        );
    }
}

pub fn assert_duration_close(actual: Duration, expected: Duration, tolerance: Duration) {
    let difference = if actual > expected {
        actual - expected
    } else {
        expected - actual
    };
    assert!(
        difference <= tolerance,
        "{actual:?} not within {tolerance:?} of {expected:?}"
    );
}
