//! Narration mixing over the stitched video's audio bed.

use std::path::Path;

use tracing::info;

use dcast_models::VideoMeta;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::probe::probe_video;

/// Duck the base audio under the narration, then mix both. The base track
/// keeps ambience from the stitched segments instead of being replaced.
const DUCKING_FILTER: &str = "[0:a][1:a]sidechaincompress=threshold=0.03:ratio=8:attack=20:release=350[ducked];\
[ducked][1:a]amix=inputs=2:weights='0.7 1.0':normalize=0[aout]";

/// Mix narration audio under the video's existing audio with sidechain
/// ducking; video stream is copied untouched.
pub async fn mix_with_narration(
    base_video: impl AsRef<Path>,
    narration_audio: impl AsRef<Path>,
    output: impl AsRef<Path>,
) -> MediaResult<VideoMeta> {
    let output = output.as_ref();
    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let cmd = FfmpegCommand::new(output)
        .input(base_video.as_ref())
        .input(narration_audio.as_ref())
        .filter_complex(DUCKING_FILTER)
        .map("0:v:0")
        .map("[aout]")
        .video_codec("copy")
        .audio_codec("aac")
        .audio_bitrate("192k")
        .shortest();
    FfmpegRunner::new().run(&cmd).await?;

    let meta = probe_video(output).await?;
    info!(output = %output.display(), duration_sec = meta.duration_sec, "narration mixed");
    Ok(meta)
}
