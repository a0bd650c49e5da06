//! SRT building and caption burn-in.

use std::path::Path;

use tracing::info;

use dcast_models::VideoMeta;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_video;

const CAPTION_WRAP_WIDTH: usize = 42;
const CAPTION_MAX_LINES: usize = 2;

/// Build SRT text with one cue per scene, aligned to scene durations.
pub fn build_srt(caption_lines: &[String], scene_durations: &[f64]) -> MediaResult<String> {
    if caption_lines.len() != scene_durations.len() {
        return Err(MediaError::invalid_input(format!(
            "caption lines ({}) must match scene durations ({})",
            caption_lines.len(),
            scene_durations.len()
        )));
    }

    let mut current = 0.0;
    let mut chunks = Vec::with_capacity(caption_lines.len());
    for (index, (line, duration)) in caption_lines.iter().zip(scene_durations).enumerate() {
        let start = format_srt_timestamp(current);
        let end = format_srt_timestamp(current + duration);
        let text = limit_caption_lines(line);
        chunks.push(format!("{}\n{start} --> {end}\n{text}", index + 1));
        current += duration;
    }
    Ok(format!("{}\n", chunks.join("\n\n")))
}

/// Burn SRT subtitles into the video stream; audio is copied.
pub async fn burn_captions(
    input_video: impl AsRef<Path>,
    captions: impl AsRef<Path>,
    output: impl AsRef<Path>,
) -> MediaResult<VideoMeta> {
    let output = output.as_ref();
    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let srt = captions.as_ref();
    let srt_path = srt.canonicalize().unwrap_or_else(|_| srt.to_path_buf());
    let escaped = escape_filter_path(&srt_path.to_string_lossy().replace('\\', "/"));
    // FFmpeg 8.x requires explicit filename= for the subtitles filter.
    let cmd = FfmpegCommand::new(output)
        .input(input_video.as_ref())
        .video_filter(format!("subtitles=filename={escaped}"))
        .video_codec("libx264")
        .output_args(["-pix_fmt", "yuv420p"])
        .audio_codec("copy");
    FfmpegRunner::new().run(&cmd).await?;

    let meta = probe_video(output).await?;
    info!(output = %output.display(), "captions burned");
    Ok(meta)
}

/// `HH:MM:SS,mmm`
fn format_srt_timestamp(seconds: f64) -> String {
    let total_ms = (seconds * 1000.0).round() as i64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!("{hours:02}:{minutes:02}:{secs:02},{millis:03}")
}

/// Wrap to at most two display lines of 42 chars; overflow past the second
/// line is flattened and cut.
fn limit_caption_lines(text: &str) -> String {
    let wrapped = wrap_words(text.trim(), CAPTION_WRAP_WIDTH);
    if wrapped.is_empty() {
        return text.trim().to_string();
    }
    if wrapped.len() <= CAPTION_MAX_LINES {
        return wrapped.join("\n");
    }
    let rest: String = wrapped[1..].join(" ").chars().take(CAPTION_WRAP_WIDTH).collect();
    format!("{}\n{}", wrapped[0], rest)
}

fn wrap_words(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        if line.is_empty() {
            line = word.to_string();
        } else if line.chars().count() + 1 + word.chars().count() <= width {
            line.push(' ');
            line.push_str(word);
        } else {
            lines.push(std::mem::take(&mut line));
            line = word.to_string();
        }
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

/// Escape characters libass treats as special inside a filter expression.
fn escape_filter_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for ch in path.chars() {
        if matches!(ch, ':' | '\\' | '\'' | '[' | ']' | ';' | ',') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_srt_timestamp_format() {
        assert_eq!(format_srt_timestamp(0.0), "00:00:00,000");
        assert_eq!(format_srt_timestamp(4.5), "00:00:04,500");
        assert_eq!(format_srt_timestamp(61.25), "00:01:01,250");
        assert_eq!(format_srt_timestamp(3661.001), "01:01:01,001");
    }

    #[test]
    fn test_build_srt_cue_sequence() {
        let lines = vec!["First scene".to_string(), "Second scene".to_string()];
        let srt = build_srt(&lines, &[4.0, 5.5]).unwrap();
        let expected = "1\n00:00:00,000 --> 00:00:04,000\nFirst scene\n\n\
                        2\n00:00:04,000 --> 00:00:09,500\nSecond scene\n";
        assert_eq!(srt, expected);
    }

    #[test]
    fn test_build_srt_rejects_mismatched_lengths() {
        let lines = vec!["only one".to_string()];
        assert!(matches!(
            build_srt(&lines, &[4.0, 5.0]),
            Err(MediaError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_caption_wrapping_two_lines_max() {
        let short = limit_caption_lines("short line");
        assert_eq!(short, "short line");

        let long = limit_caption_lines(
            "this caption is quite long and will definitely need wrapping across multiple display lines",
        );
        let lines: Vec<&str> = long.split('\n').collect();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.chars().count() <= CAPTION_WRAP_WIDTH));
    }

    #[test]
    fn test_escape_filter_path() {
        assert_eq!(escape_filter_path("/tmp/a.srt"), "/tmp/a.srt");
        assert_eq!(escape_filter_path("C:/x,y.srt"), "C\\:/x\\,y.srt");
    }
}
