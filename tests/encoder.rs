//! Video encoder integration tests.

mod common;

use std::time::Duration;

use rewind::{RewindError, VideoEncoder, VideoSource};

#[test]
fn writer_streams_frames_one_at_a_time() {
    let directory = tempfile::tempdir().unwrap();
    let output = directory.path().join("streamed.mp4");
    let frames = common::constant_rate_sequence(8, 20);
    let encoder = VideoEncoder::new(common::mpeg4_encoder_options());

    let mut writer = match encoder.open(&output, common::WIDTH, common::HEIGHT, Some(20.0)) {
        Ok(writer) => writer,
        Err(error) => {
            eprintln!("Skipping: MPEG-4 encoder not available ({error})");
            return;
        }
    };
    assert_eq!(writer.path(), output.as_path());
    for frame in &frames {
        writer.push(frame).unwrap();
    }
    assert_eq!(writer.frames_written(), 8);

    let summary = writer.finish().unwrap();
    assert_eq!(summary.frames, 8);
    assert_eq!(summary.duration, Duration::from_millis(400));

    let decoded = VideoSource::open(&output).unwrap().decode().unwrap();
    assert_eq!(decoded.len(), 8);
}

#[test]
fn finishing_without_frames_is_an_error() {
    let directory = tempfile::tempdir().unwrap();
    let output = directory.path().join("nothing.mp4");
    let encoder = VideoEncoder::new(common::mpeg4_encoder_options());

    let Ok(writer) = encoder.open(&output, common::WIDTH, common::HEIGHT, None) else {
        return;
    };
    assert!(matches!(writer.finish(), Err(RewindError::Encode { .. })));
}

#[test]
fn odd_dimensions_are_rounded_down() {
    let directory = tempfile::tempdir().unwrap();
    let output = directory.path().join("odd.mp4");
    let options = common::mpeg4_encoder_options().resolution(63, 47);
    let frames = common::constant_rate_sequence(3, 25);

    if let Err(error) = VideoEncoder::new(options).write(&output, &frames) {
        eprintln!("Skipping: MPEG-4 encoder not available ({error})");
        return;
    }

    let source = VideoSource::open(&output).unwrap();
    assert_eq!(source.metadata().width, 62);
    assert_eq!(source.metadata().height, 46);
}

#[test]
fn overwrites_an_existing_file() {
    let directory = tempfile::tempdir().unwrap();
    let output = directory.path().join("twice.mp4");
    std::fs::write(&output, b"stale").unwrap();

    let encoder = VideoEncoder::new(common::mpeg4_encoder_options());
    if let Err(error) = encoder.write(&output, &common::constant_rate_sequence(5, 25)) {
        eprintln!("Skipping: MPEG-4 encoder not available ({error})");
        return;
    }

    let decoded = VideoSource::open(&output).unwrap().decode().unwrap();
    assert_eq!(decoded.len(), 5);
}

#[test]
fn abandoned_writer_keeps_the_previous_file() {
    let directory = tempfile::tempdir().unwrap();
    let output = directory.path().join("kept.mp4");
    let encoder = VideoEncoder::new(common::mpeg4_encoder_options());
    if let Err(error) = encoder.write(&output, &common::constant_rate_sequence(4, 25)) {
        eprintln!("Skipping: MPEG-4 encoder not available ({error})");
        return;
    }
    let before = std::fs::read(&output).unwrap();

    let mut writer = encoder
        .open(&output, common::WIDTH, common::HEIGHT, Some(25.0))
        .unwrap();
    for frame in &common::constant_rate_sequence(2, 25) {
        writer.push(frame).unwrap();
    }
    drop(writer);

    assert_eq!(std::fs::read(&output).unwrap(), before);
    let names: Vec<String> = std::fs::read_dir(directory.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["kept.mp4".to_string()]);
}
