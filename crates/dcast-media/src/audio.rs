//! Audio conversion for narration tracks.

use std::path::Path;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Convert any audio file to WAV PCM s16le, 48 kHz, mono.
pub async fn convert_to_wav(input: impl AsRef<Path>, output: impl AsRef<Path>) -> MediaResult<()> {
    let output = output.as_ref();
    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let cmd = FfmpegCommand::new(output)
        .input(input.as_ref())
        .output_args(["-acodec", "pcm_s16le", "-ar", "48000", "-ac", "1"]);
    FfmpegRunner::new().run(&cmd).await
}

/// Convert raw PCM bytes (known sample format/rate/channels) to the same
/// 48 kHz mono WAV target. Gemini TTS returns `audio/l16` payloads that need
/// the input format stated explicitly.
pub async fn convert_pcm_to_wav(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    sample_format: &str,
    sample_rate: u32,
    channels: u16,
) -> MediaResult<()> {
    if sample_rate == 0 || channels == 0 {
        return Err(MediaError::invalid_input("PCM sample rate and channels must be non-zero"));
    }
    let output = output.as_ref();
    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let cmd = FfmpegCommand::new(output)
        .input_with_args(
            [
                "-f".to_string(),
                sample_format.to_string(),
                "-ar".to_string(),
                sample_rate.to_string(),
                "-ac".to_string(),
                channels.to_string(),
            ],
            input.as_ref(),
        )
        .output_args(["-acodec", "pcm_s16le", "-ar", "48000", "-ac", "1"]);
    FfmpegRunner::new().run(&cmd).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wav_target_args() {
        let cmd = FfmpegCommand::new("out.wav")
            .input("in.mp3")
            .output_args(["-acodec", "pcm_s16le", "-ar", "48000", "-ac", "1"]);
        let args = cmd.build_args();
        assert!(args.contains(&"pcm_s16le".to_string()));
        assert!(args.contains(&"48000".to_string()));
    }

    #[tokio::test]
    async fn test_pcm_conversion_rejects_zero_rate() {
        let result = convert_pcm_to_wav("in.pcm", "/tmp/out.wav", "s16le", 0, 1).await;
        assert!(matches!(result, Err(MediaError::InvalidInput(_))));
    }
}
