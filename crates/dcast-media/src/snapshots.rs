//! Interior frame extraction from the demo recording.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_duration;

pub const DEFAULT_SNAPSHOT_COUNT: usize = 3;

/// Interior timestamps at `duration * (i+1)/(n+1)`, avoiding the first and
/// last frames. Three snapshots of a 10 s video land at 2.5, 5.0, 7.5.
pub fn snapshot_timestamps(duration_sec: f64, count: usize) -> Vec<f64> {
    (0..count)
        .map(|i| duration_sec * (i as f64 + 1.0) / (count as f64 + 1.0))
        .collect()
}

/// Extract `count` uniformly placed PNG frames into `output_dir`.
pub async fn extract_snapshots(
    video: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    count: usize,
) -> MediaResult<Vec<PathBuf>> {
    if count == 0 {
        return Err(MediaError::invalid_input("snapshot count must be at least 1"));
    }
    let video = video.as_ref();
    let output_dir = output_dir.as_ref();
    tokio::fs::create_dir_all(output_dir).await?;

    let duration = probe_duration(video).await?;
    let mut snapshots = Vec::with_capacity(count);
    for (index, timestamp) in snapshot_timestamps(duration, count).into_iter().enumerate() {
        let output = output_dir.join(format!("snapshot_{index:02}.png"));
        extract_frame(video, &output, timestamp).await?;
        debug!(index, timestamp, path = %output.display(), "snapshot extracted");
        snapshots.push(output);
    }

    info!(
        video = %video.display(),
        count = snapshots.len(),
        duration_sec = duration,
        "snapshots extracted"
    );
    Ok(snapshots)
}

/// Extract a single frame at `timestamp_sec`.
pub async fn extract_frame(
    video: impl AsRef<Path>,
    output: impl AsRef<Path>,
    timestamp_sec: f64,
) -> MediaResult<PathBuf> {
    let output = output.as_ref();
    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let cmd = FfmpegCommand::new(output)
        .input_with_args(["-ss".to_string(), format!("{timestamp_sec:.3}")], video.as_ref())
        .single_frame()
        .output_args(["-q:v", "2"]);
    FfmpegRunner::new().run(&cmd).await?;
    Ok(output.to_path_buf())
}
