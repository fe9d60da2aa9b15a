//! Benchmarks for reversal, combination and encoding.
//!
//! Run with: cargo bench

use std::time::Duration;

use criterion::Criterion;
use image::{DynamicImage, RgbImage};
use rewind::{
    CombineMode, FfmpegLogLevel, FrameSequence, TimedFrame, VideoCodec, VideoEncoder,
    VideoEncoderOptions,
};

fn sequence(count: u32, width: u32, height: u32) -> FrameSequence {
    (0..count)
        .map(|index| {
            let shade = (index * 255 / count.max(1)) as u8;
            let image = RgbImage::from_pixel(width, height, image::Rgb([shade, 64, 255 - shade]));
            TimedFrame::new(DynamicImage::ImageRgb8(image), Duration::from_micros(33_367))
        })
        .collect()
}

fn benchmark_reversal(criterion: &mut Criterion) {
    let frames = sequence(300, 320, 240);

    criterion.bench_function("reverse 300 frames in memory", |bencher| {
        bencher.iter(|| frames.clone().reversed());
    });

    criterion.bench_function("combine 300 + 300 frames (ab)", |bencher| {
        bencher.iter(|| {
            rewind::combine_sequences(
                frames.clone(),
                frames.clone().reversed(),
                CombineMode::OriginalThenReversed,
            )
        });
    });
}

fn benchmark_encoding(criterion: &mut Criterion) {
    rewind::set_ffmpeg_log_level(FfmpegLogLevel::Error);

    let directory = match tempfile::tempdir() {
        Ok(directory) => directory,
        Err(_) => return,
    };
    let output = directory.path().join("bench.mp4");
    let frames = sequence(60, 320, 240);
    let encoder = VideoEncoder::new(VideoEncoderOptions::default().codec(VideoCodec::Mpeg4));

    if encoder.write(&output, &frames).is_err() {
        eprintln!("Skipping benchmark: MPEG-4 encoder unavailable");
        return;
    }

    criterion.bench_function("encode 60 frames (mpeg4, 320x240)", |bencher| {
        bencher.iter(|| encoder.write(&output, &frames).unwrap());
    });

    criterion.bench_function("decode 60 frames (mpeg4, 320x240)", |bencher| {
        bencher.iter(|| {
            let mut source = rewind::VideoSource::open(&output).unwrap();
            source.decode().unwrap()
        });
    });
}

criterion::criterion_group!(benches, benchmark_reversal, benchmark_encoding);
criterion::criterion_main!(benches);
