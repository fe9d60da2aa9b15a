//! Opened video inputs.
//!
//! [`VideoSource`] holds the demuxer context of one input file together with
//! its cached [`VideoMetadata`]. It is owned by the pipeline step that opened
//! it and dropped once that input is done.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    time::Duration,
};

use ffmpeg_next::{codec::context::Context as CodecContext, format::context::Input, media::Type};

use crate::{
    error::RewindError,
    frames::{FrameReader, FrameSequence},
    metadata::VideoMetadata,
    progress::{OperationType, ProgressTracker},
    utilities,
};

/// An opened, decodable video file.
///
/// # Example
///
/// ```no_run
/// use rewind::{RewindError, VideoSource};
///
/// let mut source = VideoSource::open("clip.mp4")?;
/// println!("{:.2} fps", source.metadata().frames_per_second);
/// let sequence = source.decode()?;
/// println!("{} frames", sequence.len());
/// # Ok::<(), RewindError>(())
/// ```
pub struct VideoSource {
    pub(crate) input_context: Input,
    pub(crate) video_stream_index: usize,
    pub(crate) metadata: VideoMetadata,
    pub(crate) file_path: PathBuf,
}

impl Debug for VideoSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("VideoSource")
            .field("metadata", &self.metadata)
            .field("video_stream_index", &self.video_stream_index)
            .field("file_path", &self.file_path)
            .finish_non_exhaustive()
    }
}

impl VideoSource {
    /// Open a video file.
    ///
    /// Initialises FFmpeg (idempotent), opens the container, picks the best
    /// video stream and caches its metadata.
    ///
    /// # Errors
    ///
    /// [`RewindError::Decode`] if the file cannot be opened or carries no
    /// decodable video stream.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RewindError> {
        let path = path.as_ref();
        let file_path = path.to_path_buf();
        let decode_error = |reason: String| RewindError::Decode {
            path: file_path.clone(),
            reason,
        };

        log::debug!("Opening video source: {}", file_path.display());

        crate::ffmpeg::init().map_err(|error| decode_error(error.to_string()))?;

        let input_context =
            ffmpeg_next::format::input(&path).map_err(|error| decode_error(error.to_string()))?;

        let stream = input_context
            .streams()
            .best(Type::Video)
            .ok_or_else(|| decode_error("no video stream found".to_string()))?;
        let video_stream_index = stream.index();

        let decoder_context = CodecContext::from_parameters(stream.parameters()).map_err(
            |error| decode_error(format!("failed to read video codec parameters: {error}")),
        )?;
        let video_decoder = decoder_context
            .decoder()
            .video()
            .map_err(|error| decode_error(format!("failed to create video decoder: {error}")))?;

        let frames_per_second = utilities::rational_to_f64(stream.avg_frame_rate())
            .or_else(|| utilities::rational_to_f64(stream.rate()))
            .unwrap_or(0.0);

        let duration_microseconds = input_context.duration();
        let duration = if duration_microseconds > 0 {
            Duration::from_micros(duration_microseconds as u64)
        } else {
            Duration::ZERO
        };

        let frame_count = match stream.frames() {
            count if count > 0 => count as u64,
            _ => (duration.as_secs_f64() * frames_per_second).round() as u64,
        };

        let codec = video_decoder
            .codec()
            .map(|codec| codec.name().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let metadata = VideoMetadata {
            width: video_decoder.width(),
            height: video_decoder.height(),
            frames_per_second,
            duration,
            frame_count,
            codec,
            format: input_context.format().name().to_string(),
        };

        log::debug!(
            "Opened {} ({}x{} @ {:.3} fps, ~{} frames, {:?})",
            file_path.display(),
            metadata.width,
            metadata.height,
            metadata.frames_per_second,
            metadata.frame_count,
            metadata.duration,
        );

        Ok(Self {
            input_context,
            video_stream_index,
            metadata,
            file_path,
        })
    }

    /// Cached metadata.
    pub fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    /// Path this source was opened from.
    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Lazy, single-pass reader over the frames of the stream.
    ///
    /// A source is read once; reopen the file to read it again.
    ///
    /// # Errors
    ///
    /// [`RewindError::Decode`] if the decoder or scaler cannot be created.
    pub fn frames(&mut self) -> Result<FrameReader<'_>, RewindError> {
        let path = self.file_path.clone();
        FrameReader::new(self).map_err(|error| error.into_decode(path))
    }

    /// Decode every frame into memory.
    ///
    /// # Errors
    ///
    /// [`RewindError::Decode`] on any decode failure, or when the stream
    /// yields no frames at all.
    pub fn decode(&mut self) -> Result<FrameSequence, RewindError> {
        let mut tracker = ProgressTracker::silent(OperationType::Decoding, &self.file_path);
        self.decode_tracked(&mut tracker)
    }

    /// [`decode`](Self::decode), advancing `tracker` once per frame.
    pub(crate) fn decode_tracked(
        &mut self,
        tracker: &mut ProgressTracker,
    ) -> Result<FrameSequence, RewindError> {
        let path = self.file_path.clone();
        let capacity = usize::try_from(self.metadata.frame_count).unwrap_or(0);
        let mut frames = Vec::with_capacity(capacity);
        for frame in self.frames()? {
            frames.push(frame.map_err(|error| error.into_decode(&path))?);
            tracker.advance();
        }
        tracker.finish();
        let sequence = FrameSequence::new(frames);

        if sequence.is_empty() {
            return Err(RewindError::Decode {
                path,
                reason: "no readable frames".to_string(),
            });
        }

        log::debug!(
            "Decoded {} frames ({:?}) from {}",
            sequence.len(),
            sequence.total_duration(),
            self.file_path.display(),
        );
        Ok(sequence)
    }
}
