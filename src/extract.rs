//! Writing reversed frames as individual images.
//!
//! Frames land in `<frames_dir>/<base>/frame_<NNNNN>.<ext>`, numbered from 0
//! in reversed-playback order. The image format follows the extension.

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    config::PipelineOptions,
    error::RewindError,
    frames::FrameSequence,
    layout::OutputLayout,
    progress::{OperationType, ProgressTracker},
};

/// Write every frame of `sequence` as an image for the video named `base_name`.
///
/// Frame files left over from an earlier, longer run of the same video are
/// removed, so the folder always holds exactly `sequence.len()` frames.
///
/// Returns the written paths in order.
///
/// # Errors
///
/// [`RewindError::Encode`] naming the first frame (or folder) that could not
/// be written.
pub fn extract_frames(
    sequence: &FrameSequence,
    layout: &OutputLayout,
    base_name: &str,
    options: &PipelineOptions,
) -> Result<Vec<PathBuf>, RewindError> {
    let folder = layout.frames_dir_for(base_name);
    let encode_error = |path: &Path, reason: String| RewindError::Encode {
        path: path.to_path_buf(),
        reason,
    };

    fs::create_dir_all(&folder).map_err(|error| encode_error(&folder, error.to_string()))?;
    remove_stale_frames(&folder, &layout.image_extension)
        .map_err(|error| encode_error(&folder, error.to_string()))?;

    let mut tracker = ProgressTracker::new(
        options.progress.clone(),
        OperationType::FrameExtraction,
        &folder,
        Some(sequence.len() as u64),
        options.batch_size,
    );

    let mut written = Vec::with_capacity(sequence.len());
    for (index, frame) in sequence.iter().enumerate() {
        let path = layout.frame_path(base_name, index);
        // JPEG has no alpha channel; decoded frames are RGB already.
        frame
            .image
            .to_rgb8()
            .save(&path)
            .map_err(|error| encode_error(&path, error.to_string()))?;
        written.push(path);
        tracker.advance();
    }
    tracker.finish();

    log::debug!("Wrote {} frames to {}", written.len(), folder.display());
    Ok(written)
}

fn is_frame_file(name: &str, extension: &str) -> bool {
    name.strip_prefix("frame_")
        .and_then(|rest| rest.strip_suffix(extension))
        .and_then(|rest| rest.strip_suffix('.'))
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

fn remove_stale_frames(folder: &Path, extension: &str) -> std::io::Result<()> {
    for entry in fs::read_dir(folder)? {
        let entry = entry?;
        let name = entry.file_name();
        if is_frame_file(&name.to_string_lossy(), extension) && entry.file_type()?.is_file() {
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use image::{DynamicImage, RgbImage};

    use super::*;
    use crate::frames::TimedFrame;

    fn sequence(count: u8) -> FrameSequence {
        (0..count)
            .map(|shade| {
                let image = RgbImage::from_pixel(4, 4, image::Rgb([shade * 40, 0, 0]));
                TimedFrame::new(DynamicImage::ImageRgb8(image), Duration::from_millis(40))
            })
            .collect()
    }

    #[test]
    fn frame_file_names_are_recognised() {
        assert!(is_frame_file("frame_00000.jpg", "jpg"));
        assert!(is_frame_file("frame_123456.jpg", "jpg"));
        assert!(!is_frame_file("frame_.jpg", "jpg"));
        assert!(!is_frame_file("frame_00001.png", "jpg"));
        assert!(!is_frame_file("cover.jpg", "jpg"));
        assert!(!is_frame_file("frame_0a001.jpg", "jpg"));
    }

    #[test]
    fn writes_one_image_per_frame() {
        let root = tempfile::tempdir().unwrap();
        let layout = OutputLayout::under(root.path()).with_image_extension("png");

        let paths = extract_frames(&sequence(3), &layout, "clip", &PipelineOptions::new()).unwrap();

        assert_eq!(paths.len(), 3);
        assert_eq!(paths[0], layout.frame_path("clip", 0));
        assert!(paths.iter().all(|path| path.is_file()));

        let first = image::open(&paths[0]).unwrap().to_rgb8();
        assert_eq!(first.get_pixel(0, 0)[0], 0);
        let last = image::open(&paths[2]).unwrap().to_rgb8();
        assert_eq!(last.get_pixel(0, 0)[0], 80);
    }

    #[test]
    fn rerun_with_fewer_frames_leaves_no_stale_files() {
        let root = tempfile::tempdir().unwrap();
        let layout = OutputLayout::under(root.path()).with_image_extension("png");
        let options = PipelineOptions::new();

        extract_frames(&sequence(5), &layout, "clip", &options).unwrap();
        let unrelated = layout.frames_dir_for("clip").join("notes.txt");
        fs::write(&unrelated, "keep me").unwrap();

        extract_frames(&sequence(2), &layout, "clip", &options).unwrap();

        let mut names: Vec<String> = fs::read_dir(layout.frames_dir_for("clip"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["frame_00000.png", "frame_00001.png", "notes.txt"]);
    }
}
