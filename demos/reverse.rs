//! Reverse one video and compare its timing with the source.
//!
//! Usage:
//!   cargo run --example reverse -- <input_file> [output_file]

use std::error::Error;

use rewind::{PipelineOptions, VideoSource};

fn main() -> Result<(), Box<dyn Error>> {
    let input_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "input.mp4".to_string());
    let output_path = std::env::args()
        .nth(2)
        .unwrap_or_else(|| format!("{}_reversed.mp4", rewind::base_name(&input_path)));

    let mut source = VideoSource::open(&input_path)?;
    let metadata = source.metadata().clone();
    println!(
        "{input_path}: {}x{} @ {:.3} fps, {:?}, codec {}",
        metadata.width,
        metadata.height,
        metadata.frames_per_second,
        metadata.duration,
        metadata.codec
    );

    let reversed = rewind::reverse_source(&mut source, &output_path, &PipelineOptions::new())?;
    println!(
        "Wrote {} ({} frames, {:?})",
        reversed.path().display(),
        reversed.summary.frames,
        reversed.summary.duration
    );

    // Durations travel with their frames: the first source frame now plays last.
    let frames = reversed.sequence.frames();
    if let (Some(first), Some(last)) = (frames.first(), frames.last()) {
        println!(
            "First frame lasts {:?}, last frame lasts {:?}",
            first.duration, last.duration
        );
    }

    Ok(())
}
