//! Reversal integration tests.

mod common;

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use rewind::{OperationType, ProgressCallback, ProgressInfo, VideoSource};

#[derive(Default)]
struct Recorder(Mutex<Vec<(OperationType, u64)>>);

impl ProgressCallback for Recorder {
    fn on_progress(&self, info: &ProgressInfo) {
        self.0.lock().unwrap().push((info.operation, info.current));
    }
}

#[test]
fn reversed_file_has_same_frame_count_and_duration() {
    let directory = tempfile::tempdir().unwrap();
    let Some(input) = common::write_fixture(
        directory.path(),
        "clip.mp4",
        &common::constant_rate_sequence(30, 30),
    ) else {
        return;
    };
    let output = directory.path().join("clip_reversed.mp4");

    let original = VideoSource::open(&input).unwrap().decode().unwrap();
    let reversed = rewind::reverse_file(&input, &output, &common::mpeg4_options()).unwrap();

    assert_eq!(reversed.summary.frames, 30);
    assert_eq!(reversed.sequence.len(), original.len());
    assert_eq!(reversed.summary.duration, original.total_duration());

    let decoded = VideoSource::open(&output).unwrap().decode().unwrap();
    assert_eq!(decoded.len(), 30);
    common::assert_duration_close(
        decoded.total_duration(),
        Duration::from_secs(1),
        Duration::from_millis(5),
    );
}

#[test]
fn reversed_file_plays_frames_backwards() {
    let directory = tempfile::tempdir().unwrap();
    let frames: Vec<(u8, Duration)> = [20, 70, 120, 170, 220]
        .into_iter()
        .map(|level| (level, Duration::from_millis(40)))
        .collect();
    let Some(input) = common::write_fixture(
        directory.path(),
        "steps.mp4",
        &common::grey_sequence(&frames),
    ) else {
        return;
    };
    let output = directory.path().join("steps_reversed.mp4");

    rewind::reverse_file(&input, &output, &common::mpeg4_options()).unwrap();

    let decoded = VideoSource::open(&output).unwrap().decode().unwrap();
    common::assert_levels_close(&common::levels(&decoded), &[220, 170, 120, 70, 20], 12);
}

/// One tick of the default encoder clock.
fn encoder_tick() -> Duration {
    Duration::from_secs(1) / 60_000
}

fn assert_durations_close(actual: &[Duration], expected: &[Duration]) {
    assert_eq!(actual.len(), expected.len(), "frame count differs");
    for (&actual, &expected) in actual.iter().zip(expected) {
        common::assert_duration_close(actual, expected, encoder_tick());
    }
}

fn variable_rate_frames() -> Vec<(u8, Duration)> {
    vec![
        (20, Duration::from_millis(100)),
        (80, Duration::from_millis(20)),
        (140, Duration::from_millis(60)),
        (200, Duration::from_millis(40)),
    ]
}

#[test]
fn reversing_twice_restores_the_original_order() {
    let directory = tempfile::tempdir().unwrap();
    let frames: Vec<(u8, Duration)> = [30, 90, 150, 210]
        .into_iter()
        .map(|level| (level, Duration::from_millis(50)))
        .collect();
    let Some(input) =
        common::write_fixture(directory.path(), "pair.mp4", &common::grey_sequence(&frames))
    else {
        return;
    };
    let once = directory.path().join("once.mp4");
    let twice = directory.path().join("twice.mp4");
    let options = common::mpeg4_options();

    rewind::reverse_file(&input, &once, &options).unwrap();
    rewind::reverse_file(&once, &twice, &options).unwrap();

    let original = VideoSource::open(&input).unwrap().decode().unwrap();
    let restored = VideoSource::open(&twice).unwrap().decode().unwrap();
    common::assert_levels_close(&common::levels(&restored), &common::levels(&original), 16);
    assert_durations_close(&restored.durations(), &original.durations());
}

#[test]
fn reversing_a_variable_rate_file_twice_restores_every_duration() {
    let directory = tempfile::tempdir().unwrap();
    let frames = variable_rate_frames();
    let Some(input) =
        common::write_fixture(directory.path(), "vfr.mp4", &common::grey_sequence(&frames))
    else {
        return;
    };
    let once = directory.path().join("vfr_once.mp4");
    let twice = directory.path().join("vfr_twice.mp4");
    let options = common::mpeg4_options();

    rewind::reverse_file(&input, &once, &options).unwrap();
    rewind::reverse_file(&once, &twice, &options).unwrap();

    let expected: Vec<Duration> = frames.iter().map(|&(_, duration)| duration).collect();
    let restored = VideoSource::open(&twice).unwrap().decode().unwrap();
    assert_durations_close(&restored.durations(), &expected);
    common::assert_levels_close(&common::levels(&restored), &[20, 80, 140, 200], 16);
}

#[test]
fn variable_frame_durations_travel_with_their_frames() {
    let directory = tempfile::tempdir().unwrap();
    let frames = variable_rate_frames();
    let Some(input) =
        common::write_fixture(directory.path(), "vfr.mp4", &common::grey_sequence(&frames))
    else {
        return;
    };
    let output = directory.path().join("vfr_reversed.mp4");

    let original = VideoSource::open(&input).unwrap().decode().unwrap();
    let written: Vec<Duration> = frames.iter().map(|&(_, duration)| duration).collect();
    assert_durations_close(&original.durations(), &written);

    let reversed = rewind::reverse_file(&input, &output, &common::mpeg4_options()).unwrap();
    let mut expected = original.durations();
    expected.reverse();
    assert_eq!(reversed.sequence.durations(), expected);
    assert_eq!(reversed.summary.duration, original.total_duration());

    // The last frame of the reversed file is the 100 ms opening frame.
    let decoded = VideoSource::open(&output).unwrap().decode().unwrap();
    assert_durations_close(&decoded.durations(), &expected);
    common::assert_duration_close(
        decoded.total_duration(),
        Duration::from_millis(220),
        encoder_tick() * 4,
    );
}

#[test]
fn reversal_reports_every_decoded_and_encoded_frame() {
    let directory = tempfile::tempdir().unwrap();
    let Some(input) = common::write_fixture(
        directory.path(),
        "counted.mp4",
        &common::constant_rate_sequence(12, 25),
    ) else {
        return;
    };
    let recorder = Arc::new(Recorder::default());
    let options = common::mpeg4_options()
        .with_progress(recorder.clone())
        .with_batch_size(5);

    rewind::reverse_file(&input, directory.path().join("counted_reversed.mp4"), &options)
        .unwrap();

    let calls = recorder.0.lock().unwrap().clone();
    let last = |operation: OperationType| {
        calls
            .iter()
            .filter(|(seen, _)| *seen == operation)
            .map(|&(_, current)| current)
            .last()
    };
    assert_eq!(last(OperationType::Decoding), Some(12));
    assert_eq!(last(OperationType::Encoding), Some(12));
    assert!(calls.contains(&(OperationType::Encoding, 5)));
}

#[test]
fn metadata_reports_the_fixture_geometry() {
    let directory = tempfile::tempdir().unwrap();
    let Some(input) = common::write_fixture(
        directory.path(),
        "meta.mp4",
        &common::constant_rate_sequence(10, 25),
    ) else {
        return;
    };

    let source = VideoSource::open(&input).unwrap();
    let metadata = source.metadata();
    assert_eq!(metadata.width, common::WIDTH);
    assert_eq!(metadata.height, common::HEIGHT);
    assert_eq!(metadata.codec, "mpeg4");
    assert!((metadata.frames_per_second - 25.0).abs() < 0.5);
}
