//! Internal utility functions.
//!
//! Pixel-data copying and timestamp conversion shared by the decoder and
//! encoder.

use std::time::Duration;

use ffmpeg_next::{Rational, frame::Video as VideoFrame};

/// Copy pixel data from an RGB24 FFmpeg frame into a tightly-packed buffer.
///
/// FFmpeg frames frequently carry per-row padding (stride > width × 3).
/// This strips that padding so the result can be passed directly to
/// [`image::RgbImage::from_raw`].
pub(crate) fn frame_to_rgb_buffer(video_frame: &VideoFrame, width: u32, height: u32) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let expected_stride = (width as usize) * 3;
    let data = video_frame.data(0);

    if stride == expected_stride {
        data[..expected_stride * (height as usize)].to_vec()
    } else {
        let mut buffer = Vec::with_capacity(expected_stride * (height as usize));
        for row in 0..(height as usize) {
            let row_start = row * stride;
            buffer.extend_from_slice(&data[row_start..row_start + expected_stride]);
        }
        buffer
    }
}

/// Copy a tightly-packed RGB buffer into an RGB24 frame, honouring its stride.
pub(crate) fn rgb_buffer_to_frame(rgb: &[u8], frame: &mut VideoFrame, width: u32, height: u32) {
    let stride = frame.stride(0);
    let row_len = (width as usize) * 3;
    let data = frame.data_mut(0);
    for y in 0..height as usize {
        let src_start = y * row_len;
        let dst_start = y * stride;
        data[dst_start..dst_start + row_len].copy_from_slice(&rgb[src_start..src_start + row_len]);
    }
}

/// Convert a rational to `f64`, returning `None` for a zero denominator or
/// non-positive value.
pub(crate) fn rational_to_f64(rate: Rational) -> Option<f64> {
    if rate.denominator() == 0 {
        return None;
    }
    let value = rate.numerator() as f64 / rate.denominator() as f64;
    (value > 0.0).then_some(value)
}

/// Convert a PTS delta in `time_base` units to a [`Duration`].
///
/// Negative deltas clamp to zero.
pub(crate) fn ticks_to_duration(ticks: i64, time_base: Rational) -> Duration {
    if ticks <= 0 || time_base.denominator() == 0 {
        return Duration::ZERO;
    }
    let nanos = ticks as i128 * time_base.numerator() as i128 * 1_000_000_000
        / time_base.denominator() as i128;
    Duration::from_nanos(nanos.max(0) as u64)
}

/// Convert a [`Duration`] to the nearest tick count in `time_base`.
pub(crate) fn duration_to_ticks(duration: Duration, time_base: Rational) -> i64 {
    let numerator = time_base.numerator().max(1) as i128;
    let denominator = time_base.denominator() as i128;
    let nanos = duration.as_nanos() as i128;
    let scaled = nanos * denominator;
    let unit = numerator * 1_000_000_000;
    ((scaled + unit / 2) / unit) as i64
}

/// Nominal frame interval for a frame rate, if the rate is usable.
pub(crate) fn frame_interval(frames_per_second: f64) -> Option<Duration> {
    (frames_per_second.is_finite() && frames_per_second > 0.0)
        .then(|| Duration::from_secs_f64(1.0 / frames_per_second))
}
