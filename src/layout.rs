//! Output locations and artifact naming.
//!
//! Every output name is a pure function of the input's base name and the
//! kind of artifact, so re-running a batch overwrites its own previous
//! outputs and nothing else:
//!
//! ```text
//! reversed_videos/
//!   <base>_reversed.<ext>
//!   <base>_combo_ab.<ext>
//!   <base>_combo_ba.<ext>
//! extracted_frames/
//!   <base>/frame_<NNNNN>.<image_ext>
//! ```
//!
//! Two inputs with the same base name (`a/clip.mp4`, `b/clip.mov`) map to the
//! same outputs; the later one wins.

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{config::CombineMode, error::RewindError};

/// Default directory for reversed and combined videos.
pub const DEFAULT_VIDEOS_DIR: &str = "reversed_videos";
/// Default directory for extracted frames.
pub const DEFAULT_FRAMES_DIR: &str = "extracted_frames";

/// Where outputs go and which extensions they use.
///
/// Built once at startup and passed to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    /// Directory for `_reversed` and `_combo_*` videos.
    pub videos_dir: PathBuf,
    /// Root directory for per-video frame folders.
    pub frames_dir: PathBuf,
    /// Container extension for video outputs, without the dot.
    pub video_extension: String,
    /// Image extension for extracted frames, without the dot.
    pub image_extension: String,
}

impl Default for OutputLayout {
    fn default() -> Self {
        Self {
            videos_dir: PathBuf::from(DEFAULT_VIDEOS_DIR),
            frames_dir: PathBuf::from(DEFAULT_FRAMES_DIR),
            video_extension: "mp4".to_string(),
            image_extension: "jpg".to_string(),
        }
    }
}

impl OutputLayout {
    /// Layout with both output directories under `root`.
    pub fn under<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref();
        Self {
            videos_dir: root.join(DEFAULT_VIDEOS_DIR),
            frames_dir: root.join(DEFAULT_FRAMES_DIR),
            ..Self::default()
        }
    }

    /// Set the videos directory.
    pub fn with_videos_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.videos_dir = dir.into();
        self
    }

    /// Set the frames directory.
    pub fn with_frames_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.frames_dir = dir.into();
        self
    }

    /// Set the video container extension (a leading dot is ignored).
    pub fn with_video_extension(mut self, extension: &str) -> Self {
        self.video_extension = clean_extension(extension);
        self
    }

    /// Set the frame image extension (a leading dot is ignored).
    pub fn with_image_extension(mut self, extension: &str) -> Self {
        self.image_extension = clean_extension(extension);
        self
    }

    /// `<videos_dir>/<base>_reversed.<ext>`
    pub fn reversed_path(&self, base_name: &str) -> PathBuf {
        self.videos_dir
            .join(format!("{base_name}_reversed.{}", self.video_extension))
    }

    /// `<videos_dir>/<base>_combo_<ab|ba>.<ext>`, or `None` for [`CombineMode::None`].
    pub fn combined_path(&self, base_name: &str, mode: CombineMode) -> Option<PathBuf> {
        mode.tag().map(|tag| {
            self.videos_dir
                .join(format!("{base_name}_combo_{tag}.{}", self.video_extension))
        })
    }

    /// `<frames_dir>/<base>`
    pub fn frames_dir_for(&self, base_name: &str) -> PathBuf {
        self.frames_dir.join(base_name)
    }

    /// `<frames_dir>/<base>/frame_<NNNNN>.<image_ext>`; `index` starts at 0.
    pub fn frame_path(&self, base_name: &str, index: usize) -> PathBuf {
        self.frames_dir_for(base_name)
            .join(format!("frame_{index:05}.{}", self.image_extension))
    }

    /// Create the videos directory, and the frames directory if `with_frames`.
    ///
    /// # Errors
    ///
    /// [`RewindError::Io`] if a directory cannot be created.
    pub fn ensure_dirs(&self, with_frames: bool) -> Result<(), RewindError> {
        fs::create_dir_all(&self.videos_dir)?;
        if with_frames {
            fs::create_dir_all(&self.frames_dir)?;
        }
        Ok(())
    }
}

/// Input file name without directory or extension.
///
/// Falls back to `"video"` for paths without a file name (`/`, `..`).
pub fn base_name<P: AsRef<Path>>(path: P) -> String {
    path.as_ref()
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "video".to_string())
}

fn clean_extension(extension: &str) -> String {
    extension.trim().trim_start_matches('.').to_ascii_lowercase()
}
