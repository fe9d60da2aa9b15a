//! Run a batch with frame extraction and a loop, reporting progress.
//!
//! Usage:
//!   cargo run --example batch -- <input_file>... [--loop ab|ba]

use std::{error::Error, sync::Arc};

use rewind::{
    CombineMode, OutputLayout, PipelineOptions, ProgressCallback, ProgressInfo, ReversalSpec,
};

/// Prints one line per progress update.
struct PrintProgress;

impl ProgressCallback for PrintProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        let pct = info
            .percentage
            .map_or("??".to_string(), |p| format!("{p:.1}"));
        println!(
            "[{:?}] {} {}/{} ({pct}%)",
            info.operation,
            info.input.display(),
            info.current,
            info.total.map_or("?".to_string(), |t| t.to_string()),
        );
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let mut inputs = Vec::new();
    let mut mode = CombineMode::OriginalThenReversed;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--loop" {
            mode = args.next().unwrap_or_default().parse()?;
        } else {
            inputs.push(arg);
        }
    }
    if inputs.is_empty() {
        inputs.push("input.mp4".to_string());
    }

    let spec = ReversalSpec::new(inputs).keep_frames(true).combine(mode);
    let options = PipelineOptions::new()
        .with_progress(Arc::new(PrintProgress))
        .with_batch_size(10);

    let report = rewind::process_batch(&spec, &OutputLayout::default(), &options)?;

    for input in report.inputs() {
        println!("{}: {}", input.input.display(), input.status());
        for failure in &input.failures {
            println!("  {} failed: {}", failure.step.as_str(), failure.message);
        }
        for artifact in input.artifacts().iter().take(3) {
            println!("  {}", artifact.display());
        }
    }
    println!("\n{}", serde_json::to_string_pretty(&report.to_json())?);

    Ok(())
}
