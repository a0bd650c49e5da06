//! Segment concatenation and trimming.

use std::path::{Path, PathBuf};

use tracing::info;

use dcast_models::VideoMeta;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_video;

/// Concatenate already-normalized segments in order via the concat demuxer.
pub async fn concat_videos(
    segments: &[PathBuf],
    output: impl AsRef<Path>,
) -> MediaResult<VideoMeta> {
    if segments.is_empty() {
        return Err(MediaError::invalid_input("segment list must be non-empty"));
    }
    let output = output.as_ref();
    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let temp_dir = tempfile::tempdir()?;
    let list_path = temp_dir.path().join("concat.txt");
    tokio::fs::write(&list_path, concat_list(segments)?).await?;

    let cmd = FfmpegCommand::new(output)
        .input_with_args(["-f", "concat", "-safe", "0"], &list_path)
        .video_codec("libx264")
        .output_args(["-pix_fmt", "yuv420p"])
        .audio_codec("aac");
    FfmpegRunner::new().run(&cmd).await?;

    let meta = probe_video(output).await?;
    info!(
        output = %output.display(),
        segments = segments.len(),
        duration_sec = meta.duration_sec,
        "segments concatenated"
    );
    Ok(meta)
}

/// Trim a video to at most `duration_sec` (floored at 0.5 s) by stream copy.
pub async fn trim_video(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    duration_sec: f64,
) -> MediaResult<VideoMeta> {
    let output = output.as_ref();
    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let cmd = FfmpegCommand::new(output)
        .input(input.as_ref())
        .duration(duration_sec.max(0.5))
        .output_args(["-c", "copy"]);
    FfmpegRunner::new().run(&cmd).await?;
    probe_video(output).await
}

fn concat_list(segments: &[PathBuf]) -> MediaResult<String> {
    let mut lines = Vec::with_capacity(segments.len());
    for segment in segments {
        let canonical = segment.canonicalize().unwrap_or_else(|_| segment.clone());
        let path = canonical.to_string_lossy().replace('\\', "/");
        // The concat demuxer treats single quotes inside quoted paths as
        // terminators.
        if path.contains('\'') {
            return Err(MediaError::invalid_input(format!(
                "segment path contains an unsupported quote: {path}"
            )));
        }
        lines.push(format!("file '{path}'"));
    }
    Ok(lines.join("\n"))
}
