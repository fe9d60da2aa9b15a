//! Combination integration tests.

mod common;

use std::time::Duration;

use rewind::{CombineMode, RewindError, VideoSource};

fn steps() -> Vec<(u8, Duration)> {
    [40, 120, 200]
        .into_iter()
        .map(|level| (level, Duration::from_millis(40)))
        .collect()
}

#[test]
fn original_then_reversed() {
    let directory = tempfile::tempdir().unwrap();
    let Some(input) =
        common::write_fixture(directory.path(), "clip.mp4", &common::grey_sequence(&steps()))
    else {
        return;
    };
    let reversed = directory.path().join("clip_reversed.mp4");
    let combined = directory.path().join("clip_combo_ab.mp4");
    let options = common::mpeg4_options();

    rewind::reverse_file(&input, &reversed, &options).unwrap();
    let summary = rewind::combine_videos(
        &input,
        &reversed,
        CombineMode::OriginalThenReversed,
        &combined,
        &options,
    )
    .unwrap();

    assert_eq!(summary.frames, 6);
    let decoded = VideoSource::open(&combined).unwrap().decode().unwrap();
    common::assert_levels_close(&common::levels(&decoded), &[40, 120, 200, 200, 120, 40], 16);
}

#[test]
fn reversed_then_original() {
    let directory = tempfile::tempdir().unwrap();
    let Some(input) =
        common::write_fixture(directory.path(), "clip.mp4", &common::grey_sequence(&steps()))
    else {
        return;
    };
    let reversed = directory.path().join("clip_reversed.mp4");
    let combined = directory.path().join("clip_combo_ba.mp4");
    let options = common::mpeg4_options();

    rewind::reverse_file(&input, &reversed, &options).unwrap();
    rewind::combine_videos(
        &input,
        &reversed,
        CombineMode::ReversedThenOriginal,
        &combined,
        &options,
    )
    .unwrap();

    let decoded = VideoSource::open(&combined).unwrap().decode().unwrap();
    common::assert_levels_close(&common::levels(&decoded), &[200, 120, 40, 40, 120, 200], 16);
}

#[test]
fn combined_length_is_the_sum_of_both_parts() {
    let directory = tempfile::tempdir().unwrap();
    let Some(input) = common::write_fixture(
        directory.path(),
        "long.mp4",
        &common::constant_rate_sequence(24, 24),
    ) else {
        return;
    };
    let reversed = directory.path().join("long_reversed.mp4");
    let combined = directory.path().join("long_combo_ab.mp4");
    let options = common::mpeg4_options();

    rewind::reverse_file(&input, &reversed, &options).unwrap();
    let summary = rewind::combine_videos(
        &input,
        &reversed,
        CombineMode::OriginalThenReversed,
        &combined,
        &options,
    )
    .unwrap();

    let original = VideoSource::open(&input).unwrap().decode().unwrap();
    let backwards = VideoSource::open(&reversed).unwrap().decode().unwrap();
    assert_eq!(summary.frames as usize, original.len() + backwards.len());
    assert_eq!(
        summary.duration,
        original.total_duration() + backwards.total_duration()
    );

    let decoded = VideoSource::open(&combined).unwrap().decode().unwrap();
    assert_eq!(decoded.len(), 48);
    common::assert_duration_close(
        decoded.total_duration(),
        Duration::from_secs(2),
        Duration::from_millis(10),
    );
}

#[test]
fn unreadable_reversed_part_is_a_combine_error() {
    let directory = tempfile::tempdir().unwrap();
    let Some(input) =
        common::write_fixture(directory.path(), "clip.mp4", &common::grey_sequence(&steps()))
    else {
        return;
    };
    let reversed = directory.path().join("clip_reversed.mp4");
    std::fs::write(&reversed, b"truncated").unwrap();

    let result = rewind::combine_videos(
        &input,
        &reversed,
        CombineMode::OriginalThenReversed,
        directory.path().join("clip_combo_ab.mp4"),
        &common::mpeg4_options(),
    );

    let error = result.unwrap_err();
    assert!(matches!(error, RewindError::Combine { .. }));
    assert_eq!(error.kind(), rewind::ErrorKind::Combine);
}
