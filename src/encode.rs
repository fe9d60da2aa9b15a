//! Video encoder: write timed frames into a video container.
//!
//! [`VideoEncoder`] opens a [`VideoWriter`] session that accepts
//! [`TimedFrame`]s one at a time. Every frame is stamped with its own start
//! time and duration, so sequences with uneven frame durations (reversed
//! variable-frame-rate clips, concatenations of clips at different rates) keep
//! their exact timing instead of being forced onto a constant rate.
//!
//! # Example
//!
//! ```no_run
//! use rewind::{RewindError, VideoEncoder, VideoEncoderOptions, VideoSource};
//!
//! let mut source = VideoSource::open("input.mp4")?;
//! let reversed = source.decode()?.reversed();
//! VideoEncoder::new(VideoEncoderOptions::default()).write("reversed.mp4", &reversed)?;
//! # Ok::<(), RewindError>(())
//! ```

use std::{
    collections::HashMap,
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use ffmpeg_next::{
    Dictionary, Packet, Rational,
    codec::{Flags as CodecFlags, Id, context::Context as CodecContext},
    encoder::video::Encoder as OpenedVideoEncoder,
    format::{Flags as FormatFlags, Pixel, context::Output},
    frame::Video as VideoFrame,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use image::imageops::FilterType;

use crate::{
    error::RewindError,
    frames::{FrameSequence, TimedFrame},
    progress::{OperationType, ProgressTracker},
    utilities,
};

/// Default encoder clock: 60 000 ticks per second represents 24, 25, 30, 60
/// and the NTSC 1000/1001 rates exactly, and stays within the MPEG-4 Part 2
/// limit of 65 535.
pub const DEFAULT_TIMESCALE: u32 = 60_000;

/// Options for the video encoder.
#[derive(Debug, Clone)]
pub struct VideoEncoderOptions {
    /// Output width. If `None`, taken from the first frame.
    pub width: Option<u32>,
    /// Output height. If `None`, taken from the first frame.
    pub height: Option<u32>,
    /// Codec to use. Default is H.264.
    pub codec: VideoCodec,
    /// Constant Rate Factor for H.264/H.265 (0-51, lower is better). Default: 23.
    pub crf: Option<u32>,
    /// Bitrate in bits per second. If set, overrides CRF.
    pub bitrate: Option<usize>,
    /// Encoder clock in ticks per second.
    pub timescale: u32,
}

impl Default for VideoEncoderOptions {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            codec: VideoCodec::H264,
            crf: Some(23),
            bitrate: None,
            timescale: DEFAULT_TIMESCALE,
        }
    }
}

impl VideoEncoderOptions {
    /// Set the output resolution.
    pub fn resolution(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Set the codec.
    pub fn codec(mut self, codec: VideoCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Set the CRF quality value.
    pub fn crf(mut self, crf: u32) -> Self {
        self.crf = Some(crf);
        self
    }

    /// Set the target bitrate in bits per second.
    pub fn bitrate(mut self, bitrate: usize) -> Self {
        self.bitrate = Some(bitrate);
        self
    }

    /// Set the encoder clock (ticks per second).
    pub fn timescale(mut self, timescale: u32) -> Self {
        self.timescale = timescale.max(1);
        self
    }
}

/// Supported output video codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoCodec {
    /// H.264 / AVC.
    #[default]
    H264,
    /// H.265 / HEVC.
    H265,
    /// MPEG-4 Part 2. Built into every FFmpeg, no external library needed.
    Mpeg4,
}

impl VideoCodec {
    fn to_codec_id(self) -> Id {
        match self {
            VideoCodec::H264 => Id::H264,
            VideoCodec::H265 => Id::HEVC,
            VideoCodec::Mpeg4 => Id::MPEG4,
        }
    }

    fn supports_crf(self) -> bool {
        matches!(self, VideoCodec::H264 | VideoCodec::H265)
    }
}

impl FromStr for VideoCodec {
    type Err = RewindError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "h264" | "avc" | "x264" => Ok(VideoCodec::H264),
            "h265" | "hevc" | "x265" => Ok(VideoCodec::H265),
            "mpeg4" | "mp4v" => Ok(VideoCodec::Mpeg4),
            other => Err(RewindError::Config(format!("unsupported codec: {other}"))),
        }
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VideoCodec::H264 => "h264",
            VideoCodec::H265 => "h265",
            VideoCodec::Mpeg4 => "mpeg4",
        })
    }
}

/// What a finished [`VideoWriter`] wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeSummary {
    /// Output file.
    pub path: PathBuf,
    /// Number of frames sent to the encoder.
    pub frames: u64,
    /// Sum of the durations of those frames.
    pub duration: Duration,
}

/// Encodes frames into video files.
#[derive(Debug, Clone, Default)]
pub struct VideoEncoder {
    config: VideoEncoderOptions,
}

impl VideoEncoder {
    /// Create a new video encoder with the given options.
    pub fn new(config: VideoEncoderOptions) -> Self {
        Self { config }
    }

    /// Options this encoder was created with.
    pub fn options(&self) -> &VideoEncoderOptions {
        &self.config
    }

    /// Write a whole sequence to `path`. The container is inferred from the
    /// extension; an existing file is overwritten.
    ///
    /// # Errors
    ///
    /// [`RewindError::Encode`] if the sequence is empty or anything in the
    /// encode chain fails.
    pub fn write<P: AsRef<Path>>(
        &self,
        path: P,
        sequence: &FrameSequence,
    ) -> Result<EncodeSummary, RewindError> {
        let path = path.as_ref();
        let mut tracker = ProgressTracker::silent(OperationType::Encoding, path);
        self.write_tracked(path, sequence, &mut tracker)
    }

    /// [`write`](Self::write), advancing `tracker` once per frame.
    pub(crate) fn write_tracked(
        &self,
        path: &Path,
        sequence: &FrameSequence,
        tracker: &mut ProgressTracker,
    ) -> Result<EncodeSummary, RewindError> {
        let first = sequence.frames().first().ok_or_else(|| RewindError::Encode {
            path: path.to_path_buf(),
            reason: "no frames to write".to_string(),
        })?;

        let total = sequence.total_duration();
        let frame_rate = (!total.is_zero()).then(|| sequence.len() as f64 / total.as_secs_f64());

        let mut writer = self.open(path, first.image.width(), first.image.height(), frame_rate)?;
        for frame in sequence {
            writer.push(frame)?;
            tracker.advance();
        }
        let summary = writer.finish()?;
        tracker.finish();
        Ok(summary)
    }

    /// Start writing a video to `path`.
    ///
    /// `width`/`height` are used unless the options fix a resolution.
    /// `frame_rate` is an advisory nominal rate recorded in the stream header;
    /// actual timing always follows each frame's duration.
    ///
    /// The video is written to a hidden sibling of `path` and only moved
    /// into place by [`VideoWriter::finish`], so a failed or abandoned
    /// session never replaces an existing file.
    ///
    /// # Errors
    ///
    /// [`RewindError::Encode`] if the container, codec or scaler cannot be set up.
    pub fn open<P: AsRef<Path>>(
        &self,
        path: P,
        width: u32,
        height: u32,
        frame_rate: Option<f64>,
    ) -> Result<VideoWriter, RewindError> {
        let path = path.as_ref().to_path_buf();
        let encode_error = |reason: String| RewindError::Encode {
            path: path.clone(),
            reason,
        };

        crate::ffmpeg::init().map_err(|error| encode_error(error.to_string()))?;

        let target_pixel = Pixel::YUV420P;
        // 4:2:0 chroma subsampling needs even dimensions.
        let width = even(self.config.width.unwrap_or(width));
        let height = even(self.config.height.unwrap_or(height));
        let time_base = Rational::new(1, self.config.timescale.max(1) as i32);
        let codec_id = self.config.codec.to_codec_id();

        log::info!(
            "Writing {} ({}x{}, codec={}, timescale={})",
            path.display(),
            width,
            height,
            self.config.codec,
            self.config.timescale,
        );

        let staging = staging_path(&path);
        let mut output = ffmpeg_next::format::output(&staging)
            .map_err(|error| encode_error(format!("cannot open output: {error}")))?;
        let staged = Staged::new(staging, path.clone());

        let needs_global_header = output.format().flags().contains(FormatFlags::GLOBAL_HEADER);

        let encoder_codec = ffmpeg_next::encoder::find(codec_id)
            .ok_or_else(|| encode_error(format!("codec {codec_id:?} not available")))?;

        let mut stream = output
            .add_stream(encoder_codec)
            .map_err(|error| encode_error(format!("cannot add stream: {error}")))?;
        let stream_index = stream.index();

        let mut encoder = CodecContext::from_parameters(stream.parameters())
            .map_err(|error| encode_error(format!("cannot create codec context: {error}")))?
            .encoder()
            .video()
            .map_err(|error| encode_error(format!("cannot open video encoder: {error}")))?;

        encoder.set_width(width);
        encoder.set_height(height);
        encoder.set_format(target_pixel);
        encoder.set_time_base(time_base);
        if let Some(rate) = frame_rate.filter(|rate| rate.is_finite() && *rate > 0.0) {
            encoder.set_frame_rate(Some(Rational::from(rate)));
        }

        let mut codec_options = Dictionary::new();
        match (self.config.bitrate, self.config.crf) {
            (Some(bitrate), _) => encoder.set_bit_rate(bitrate),
            (None, Some(crf)) if self.config.codec.supports_crf() => {
                codec_options.set("crf", &crf.to_string());
            }
            // MPEG-4 Part 2 has no CRF; give it a bitrate that scales with the picture.
            _ => encoder.set_bit_rate((width as usize * height as usize * 4).max(400_000)),
        }

        if needs_global_header {
            encoder.set_flags(CodecFlags::GLOBAL_HEADER);
        }

        let opened_encoder = encoder
            .open_as_with(encoder_codec, codec_options)
            .map_err(|error| encode_error(format!("cannot open encoder: {error}")))?;

        stream.set_parameters(&opened_encoder);
        stream.set_time_base(time_base);

        output
            .write_header()
            .map_err(|error| encode_error(format!("cannot write header: {error}")))?;

        let stream_time_base = output
            .stream(stream_index)
            .map(|stream| stream.time_base())
            .ok_or_else(|| encode_error("output stream disappeared".to_string()))?;

        let scaler = ScalingContext::get(
            Pixel::RGB24,
            width,
            height,
            target_pixel,
            width,
            height,
            ScalingFlags::BILINEAR,
        )
        .map_err(|error| encode_error(format!("cannot create scaler: {error}")))?;

        Ok(VideoWriter {
            path,
            output,
            staged,
            encoder: opened_encoder,
            scaler,
            stream_index,
            time_base,
            stream_time_base,
            width,
            height,
            elapsed: Duration::ZERO,
            last_pts: None,
            frames: 0,
            packet_durations: HashMap::new(),
        })
    }
}

/// An open encoding session. Call [`finish`](VideoWriter::finish) to flush
/// the encoder, write the trailer and move the file into place; dropping it
/// without finishing deletes the partial file.
pub struct VideoWriter {
    path: PathBuf,
    output: Output,
    /// Declared after `output` so the file is closed before it is removed.
    staged: Staged,
    encoder: OpenedVideoEncoder,
    scaler: ScalingContext,
    stream_index: usize,
    time_base: Rational,
    stream_time_base: Rational,
    width: u32,
    height: u32,
    /// Sum of durations of frames pushed so far.
    elapsed: Duration,
    last_pts: Option<i64>,
    frames: u64,
    /// Duration (encoder ticks) of each frame still inside the encoder, by PTS.
    packet_durations: HashMap<i64, i64>,
}

impl VideoWriter {
    /// Output path of this session.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of frames pushed so far.
    pub fn frames_written(&self) -> u64 {
        self.frames
    }

    fn encode_error(&self, reason: String) -> RewindError {
        RewindError::Encode {
            path: self.path.clone(),
            reason,
        }
    }

    /// Encode one frame, starting where the previous one ended.
    ///
    /// # Errors
    ///
    /// [`RewindError::Encode`] on scaling, encoding or muxing failure.
    pub fn push(&mut self, frame: &TimedFrame) -> Result<(), RewindError> {
        let rgb = if frame.image.width() != self.width || frame.image.height() != self.height {
            frame
                .image
                .resize_exact(self.width, self.height, FilterType::Lanczos3)
                .to_rgb8()
        } else {
            frame.image.to_rgb8()
        };

        let mut src_frame = VideoFrame::new(Pixel::RGB24, self.width, self.height);
        utilities::rgb_buffer_to_frame(rgb.as_raw(), &mut src_frame, self.width, self.height);

        let mut dst_frame = VideoFrame::empty();
        self.scaler
            .run(&src_frame, &mut dst_frame)
            .map_err(|error| self.encode_error(format!("scaling failed: {error}")))?;

        // Start and end are rounded from the running total so rounding never
        // accumulates across frames.
        let mut pts = utilities::duration_to_ticks(self.elapsed, self.time_base);
        if let Some(last) = self.last_pts {
            pts = pts.max(last + 1);
        }
        self.elapsed += frame.duration;
        let end = utilities::duration_to_ticks(self.elapsed, self.time_base);
        self.packet_durations.insert(pts, (end - pts).max(1));
        self.last_pts = Some(pts);

        dst_frame.set_pts(Some(pts));
        self.encoder
            .send_frame(&dst_frame)
            .map_err(|error| self.encode_error(format!("send_frame failed: {error}")))?;
        self.frames += 1;

        self.drain_packets()
    }

    /// Write every packet the encoder has ready.
    fn drain_packets(&mut self) -> Result<(), RewindError> {
        let mut packet = Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.stream_index);
            if let Some(duration) = packet.pts().and_then(|pts| self.packet_durations.remove(&pts)) {
                packet.set_duration(duration);
            }
            packet.rescale_ts(self.time_base, self.stream_time_base);
            packet
                .write_interleaved(&mut self.output)
                .map_err(|error| self.encode_error(format!("write packet failed: {error}")))?;
        }
        Ok(())
    }

    /// Flush the encoder and write the container trailer.
    ///
    /// # Errors
    ///
    /// [`RewindError::Encode`] if no frame was pushed, or on flush/trailer failure.
    pub fn finish(mut self) -> Result<EncodeSummary, RewindError> {
        if self.frames == 0 {
            return Err(self.encode_error("no frames to write".to_string()));
        }

        self.encoder
            .send_eof()
            .map_err(|error| self.encode_error(format!("send_eof failed: {error}")))?;
        self.drain_packets()?;

        self.output
            .write_trailer()
            .map_err(|error| self.encode_error(format!("cannot write trailer: {error}")))?;

        let Self {
            path,
            output,
            staged,
            frames,
            elapsed,
            ..
        } = self;
        drop(output);
        staged.commit().map_err(|error| RewindError::Encode {
            path: path.clone(),
            reason: format!("cannot move finished video into place: {error}"),
        })?;

        log::info!("Wrote {frames} frames ({elapsed:?}) to {}", path.display());

        Ok(EncodeSummary {
            path,
            frames,
            duration: elapsed,
        })
    }
}

/// A file written under a temporary name, renamed to its target on commit
/// and removed otherwise.
struct Staged {
    staging: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl Staged {
    fn new(staging: PathBuf, target: PathBuf) -> Self {
        Self {
            staging,
            target,
            committed: false,
        }
    }

    fn commit(mut self) -> std::io::Result<()> {
        fs::rename(&self.staging, &self.target)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for Staged {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match fs::remove_file(&self.staging) {
            Ok(()) => log::debug!("Removed unfinished {}", self.staging.display()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
            Err(error) => log::warn!("Cannot remove {}: {error}", self.staging.display()),
        }
    }
}

/// `dir/name.ext` -> `dir/.name.partial.ext`. The extension is kept so the
/// container format is still inferred from it.
fn staging_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(extension) => format!(".{stem}.partial.{}", extension.to_string_lossy()),
        None => format!(".{stem}.partial"),
    };
    path.with_file_name(name)
}

fn even(dimension: u32) -> u32 {
    (dimension & !1).max(2)
}
