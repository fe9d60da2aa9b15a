//! Decoded frames and their timing.
//!
//! [`FrameReader`] is a lazy, pull-based iterator that decodes one frame per
//! call to [`next()`](Iterator::next) and pairs it with its display duration.
//! [`FrameSequence`] is the fully decoded, in-memory form that reversal and
//! extraction operate on.
//!
//! Durations come from the gap between consecutive presentation timestamps,
//! so variable-frame-rate input keeps its exact timing. The last frame has no
//! successor and keeps the duration its packet carried; only when the
//! container stores none does it fall back to the nominal frame interval.
//!
//! # Example
//!
//! ```no_run
//! use rewind::{RewindError, VideoSource};
//!
//! let mut source = VideoSource::open("input.mp4")?;
//! for frame in source.frames()? {
//!     let frame = frame?;
//!     println!("{:?} for {:?}", frame.timestamp, frame.duration);
//! }
//! # Ok::<(), RewindError>(())
//! ```

use std::time::Duration;

use ffmpeg_next::{
    Error as FfmpegError, Packet, Rational,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::Pixel,
    frame::Video as VideoFrame,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use image::{DynamicImage, RgbImage};

use crate::{error::RewindError, source::VideoSource, utilities};

/// One decoded frame with its timing.
#[derive(Debug, Clone)]
pub struct TimedFrame {
    /// Frame pixels (RGB8).
    pub image: DynamicImage,
    /// How long this frame stays on screen.
    pub duration: Duration,
    /// Presentation time relative to the first frame of its sequence.
    pub timestamp: Duration,
}

impl TimedFrame {
    /// Create a frame at timestamp zero.
    pub fn new(image: DynamicImage, duration: Duration) -> Self {
        Self {
            image,
            duration,
            timestamp: Duration::ZERO,
        }
    }
}

/// An ordered, in-memory list of frames.
///
/// Timestamps are always kept consistent with the durations: frame *i* starts
/// at the sum of the durations of frames *0..i*.
#[derive(Debug, Clone, Default)]
pub struct FrameSequence {
    frames: Vec<TimedFrame>,
}

impl FrameSequence {
    /// Build a sequence from frames, recomputing their timestamps.
    pub fn new(frames: Vec<TimedFrame>) -> Self {
        let mut sequence = Self { frames };
        sequence.retime();
        sequence
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the sequence holds no frames.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frames in order.
    pub fn frames(&self) -> &[TimedFrame] {
        &self.frames
    }

    /// Iterate over frames in order.
    pub fn iter(&self) -> std::slice::Iter<'_, TimedFrame> {
        self.frames.iter()
    }

    /// Per-frame durations in order.
    pub fn durations(&self) -> Vec<Duration> {
        self.frames.iter().map(|frame| frame.duration).collect()
    }

    /// Sum of all frame durations.
    pub fn total_duration(&self) -> Duration {
        self.frames.iter().map(|frame| frame.duration).sum()
    }

    /// Reverse the frame order.
    ///
    /// Output frame *i* is input frame *N − 1 − i*, and it keeps that input
    /// frame's own duration, so the duration list is reversed with the frames
    /// and the total is unchanged.
    pub fn reversed(mut self) -> Self {
        self.frames.reverse();
        self.retime();
        self
    }

    /// Append `other` after `self`, keeping every frame and duration. The
    /// boundary frames are kept even when identical.
    pub fn concat(mut self, other: FrameSequence) -> Self {
        self.frames.extend(other.frames);
        self.retime();
        self
    }

    /// Consume the sequence, returning its frames.
    pub fn into_frames(self) -> Vec<TimedFrame> {
        self.frames
    }

    fn retime(&mut self) {
        let mut timestamp = Duration::ZERO;
        for frame in &mut self.frames {
            frame.timestamp = timestamp;
            timestamp += frame.duration;
        }
    }
}

impl FromIterator<TimedFrame> for FrameSequence {
    fn from_iter<I: IntoIterator<Item = TimedFrame>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl IntoIterator for FrameSequence {
    type Item = TimedFrame;
    type IntoIter = std::vec::IntoIter<TimedFrame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.into_iter()
    }
}

impl<'s> IntoIterator for &'s FrameSequence {
    type Item = &'s TimedFrame;
    type IntoIter = std::slice::Iter<'s, TimedFrame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}

/// Consecutive demuxer errors after which the stream is treated as ended.
const MAX_READ_FAILURES: u32 = 16;

/// A decoded frame held back until its duration is known.
struct Pending {
    start: i64,
    /// Duration recorded in the frame's own packet, in stream ticks.
    own_ticks: Option<i64>,
    image: DynamicImage,
}

/// A lazy iterator over the decoded frames of a [`VideoSource`].
///
/// Borrows the source mutably; frames are produced in presentation order,
/// one frame behind the decoder so each frame's duration is known when it is
/// yielded. Not restartable: reopen the source to read it again.
pub struct FrameReader<'a> {
    source: &'a mut VideoSource,
    decoder: VideoDecoder,
    scaler: ScalingContext,
    video_stream_index: usize,
    time_base: Rational,
    /// Nominal frame interval in stream ticks, if the frame rate is known.
    nominal_ticks: Option<i64>,
    width: u32,
    height: u32,
    decoded_frame: VideoFrame,
    scaled_frame: VideoFrame,
    /// Timestamp of the first decoded frame; later timestamps are relative to it.
    origin: Option<i64>,
    /// Decoded frame waiting for its successor's timestamp.
    pending: Option<Pending>,
    last_gap: Option<i64>,
    read_failures: u32,
    eof_sent: bool,
    done: bool,
}

impl<'a> FrameReader<'a> {
    pub(crate) fn new(source: &'a mut VideoSource) -> Result<Self, RewindError> {
        let video_stream_index = source.video_stream_index;
        let width = source.metadata.width;
        let height = source.metadata.height;
        let frames_per_second = source.metadata.frames_per_second;

        let stream = source
            .input_context
            .stream(video_stream_index)
            .ok_or_else(|| RewindError::Decode {
                path: source.file_path.clone(),
                reason: "video stream disappeared".to_string(),
            })?;
        let time_base = stream.time_base();
        let decoder_context = CodecContext::from_parameters(stream.parameters())?;
        let decoder = decoder_context.decoder().video()?;

        let scaler = ScalingContext::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            Pixel::RGB24,
            width,
            height,
            ScalingFlags::BILINEAR,
        )?;

        let nominal_ticks = utilities::frame_interval(frames_per_second)
            .map(|interval| utilities::duration_to_ticks(interval, time_base))
            .filter(|&ticks| ticks > 0);

        Ok(Self {
            source,
            decoder,
            scaler,
            video_stream_index,
            time_base,
            nominal_ticks,
            width,
            height,
            decoded_frame: VideoFrame::empty(),
            scaled_frame: VideoFrame::empty(),
            origin: None,
            pending: None,
            last_gap: None,
            read_failures: 0,
            eof_sent: false,
            done: false,
        })
    }

    /// Convert the current `decoded_frame` to an RGB image.
    fn convert_current_frame(&mut self) -> Result<DynamicImage, RewindError> {
        self.scaler.run(&self.decoded_frame, &mut self.scaled_frame)?;
        let buffer = utilities::frame_to_rgb_buffer(&self.scaled_frame, self.width, self.height);
        let image = RgbImage::from_raw(self.width, self.height, buffer).ok_or_else(|| {
            RewindError::Decode {
                path: self.source.file_path.clone(),
                reason: "decoded frame does not match the stream dimensions".to_string(),
            }
        })?;
        Ok(DynamicImage::ImageRgb8(image))
    }

    /// Timestamp of the current decoded frame relative to the first one.
    fn current_ticks(&mut self) -> i64 {
        let raw = self.decoded_frame.timestamp().or(self.decoded_frame.pts());
        match (raw, self.pending.as_ref()) {
            (Some(ticks), _) => {
                let origin = *self.origin.get_or_insert(ticks);
                ticks - origin
            }
            // No timestamp at all: place it one interval after its predecessor.
            (None, Some(previous)) => {
                previous.start
                    + previous
                        .own_ticks
                        .or(self.last_gap)
                        .or(self.nominal_ticks)
                        .unwrap_or(1)
            }
            (None, None) => {
                self.origin.get_or_insert(0);
                0
            }
        }
    }

    /// Emit `pending` with a duration of `gap` ticks.
    fn finish_pending(&mut self, gap: i64) -> Option<TimedFrame> {
        let pending = self.pending.take()?;
        Some(TimedFrame {
            image: pending.image,
            duration: utilities::ticks_to_duration(gap, self.time_base),
            timestamp: utilities::ticks_to_duration(pending.start, self.time_base),
        })
    }

    /// Emit the final frame. It has no successor, so it keeps its packet
    /// duration when the container recorded one.
    fn finish_last(&mut self) -> Option<TimedFrame> {
        let own_ticks = self.pending.as_ref()?.own_ticks;
        let gap = own_ticks
            .or(self.nominal_ticks)
            .or(self.last_gap)
            .unwrap_or(1);
        self.finish_pending(gap)
    }

    /// Handle a freshly decoded frame; returns the previous frame once its
    /// duration is known.
    fn accept_decoded(&mut self) -> Result<Option<TimedFrame>, RewindError> {
        let ticks = self.current_ticks();
        let own_ticks = Some(self.decoded_frame.packet().duration).filter(|&ticks| ticks > 0);
        let image = self.convert_current_frame()?;

        let Some(start) = self.pending.as_ref().map(|pending| pending.start) else {
            self.pending = Some(Pending {
                start: ticks,
                own_ticks,
                image,
            });
            return Ok(None);
        };

        let mut gap = ticks - start;
        if gap <= 0 {
            // Out-of-order or duplicated timestamp.
            gap = self.last_gap.or(self.nominal_ticks).unwrap_or(1);
        }
        self.last_gap = Some(gap);
        let emitted = self.finish_pending(gap);
        self.pending = Some(Pending {
            start: start + gap,
            own_ticks,
            image,
        });
        Ok(emitted)
    }

    fn fail(&mut self, error: RewindError) -> Option<Result<TimedFrame, RewindError>> {
        self.done = true;
        Some(Err(error))
    }
}

impl Iterator for FrameReader<'_> {
    type Item = Result<TimedFrame, RewindError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            if self.decoder.receive_frame(&mut self.decoded_frame).is_ok() {
                match self.accept_decoded() {
                    Ok(Some(frame)) => return Some(Ok(frame)),
                    Ok(None) => continue,
                    Err(error) => return self.fail(error),
                }
            }

            if self.eof_sent {
                self.done = true;
                return self.finish_last().map(Ok);
            }

            let mut packet = Packet::empty();
            match packet.read(&mut self.source.input_context) {
                Ok(()) => {
                    self.read_failures = 0;
                    if packet.stream() == self.video_stream_index {
                        if let Err(error) = self.decoder.send_packet(&packet) {
                            return self.fail(error.into());
                        }
                    }
                }
                Err(error) => {
                    if !matches!(error, FfmpegError::Eof) {
                        self.read_failures += 1;
                        log::debug!(
                            "Skipping unreadable packet in {}: {error}",
                            self.source.file_path.display()
                        );
                        if self.read_failures < MAX_READ_FAILURES {
                            continue;
                        }
                        log::warn!(
                            "Giving up on {} after {MAX_READ_FAILURES} read errors",
                            self.source.file_path.display()
                        );
                    }
                    if let Err(error) = self.decoder.send_eof() {
                        return self.fail(error.into());
                    }
                    self.eof_sent = true;
                }
            }
        }
    }
}
