//! Segment normalization to the common stitch format.

use std::path::Path;

use tracing::debug;

use dcast_models::VideoMeta;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::probe::probe_video;

/// Scale/pad to 1280x720, 30 fps, yuv420p.
const NORMALIZE_VF: &str = "scale=1280:720:force_original_aspect_ratio=decrease,\
pad=1280:720:(ow-iw)/2:(oh-ih)/2:black,fps=30,format=yuv420p";

const SILENCE_BED: &str = "anullsrc=channel_layout=stereo:sample_rate=48000";

/// Normalize a segment to 720p/30fps h264 with 48 kHz stereo aac audio.
/// Silent inputs get an `anullsrc` bed so every normalized segment carries
/// an audio track the concat and narration mix can rely on.
pub async fn normalize_video(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
) -> MediaResult<VideoMeta> {
    let input = input.as_ref();
    let output = output.as_ref();
    let meta = probe_video(input).await?;
    debug!(
        input = %input.display(),
        has_audio = meta.has_audio,
        duration_sec = meta.duration_sec,
        "normalizing segment"
    );

    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut cmd = FfmpegCommand::new(output).input(input);
    if meta.has_audio {
        cmd = cmd.map("0:v:0").map("0:a:0");
    } else {
        cmd = cmd
            .lavfi_input(SILENCE_BED, Some(meta.duration_sec))
            .map("0:v:0")
            .map("1:a:0");
    }
    cmd = cmd
        .video_filter(NORMALIZE_VF)
        .video_codec("libx264")
        .preset("veryfast")
        .crf(20)
        .audio_codec("aac")
        .output_args(["-ar", "48000", "-ac", "2"]);
    if !meta.has_audio {
        cmd = cmd.shortest();
    }

    FfmpegRunner::new().run(&cmd).await?;
    probe_video(output).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_filter_shape() {
        assert!(NORMALIZE_VF.contains("scale=1280:720"));
        assert!(NORMALIZE_VF.contains("fps=30"));
        assert!(NORMALIZE_VF.contains("format=yuv420p"));
    }

    #[test]
    fn test_silence_bed_spec() {
        assert!(SILENCE_BED.contains("stereo"));
        assert!(SILENCE_BED.contains("48000"));
    }
}
