//! FFmpeg/ffprobe toolchain for the DiffCast pipeline.
//!
//! Everything that shells out to the media tools lives here: probing,
//! normalization, concatenation, narration mixing, caption burn-in, snapshot
//! extraction, and audio conversion. Callers get structured errors with
//! captured stderr instead of raw process failures.

pub mod audio;
pub mod captions;
pub mod command;
pub mod concat;
pub mod error;
pub mod mix;
pub mod normalize;
pub mod probe;
pub mod snapshots;

pub use audio::{convert_pcm_to_wav, convert_to_wav};
pub use captions::{build_srt, burn_captions};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use concat::{concat_videos, trim_video};
pub use error::{MediaError, MediaResult};
pub use mix::mix_with_narration;
pub use normalize::normalize_video;
pub use probe::{probe_duration, probe_video};
pub use snapshots::{
    extract_frame, extract_snapshots, snapshot_timestamps, DEFAULT_SNAPSHOT_COUNT,
};
