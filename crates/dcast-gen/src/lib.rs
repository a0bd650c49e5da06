//! Generation clients for the DiffCast pipeline: Gemini chat, Veo clips,
//! TTS narration, and the browser-agent demo recorder.

pub mod clips;
pub mod error;
pub mod goal;
pub mod llm;
pub mod poll;
pub mod recorder;
pub mod retry;
pub mod script;
pub mod tts;

pub use clips::{snap_clip_duration, ClipOutput, VeoClient, VeoConfig};
pub use error::{GenError, GenResult};
pub use goal::generate_demo_goal;
pub use llm::{ChatMessage, ChatRole, LlmClient, LlmOptions, LlmResponse, TokenUsage};
pub use recorder::{RecorderClient, RecorderConfig};
pub use retry::{retry_async, RetryConfig};
pub use script::{generate_localized_lines, generate_scene_script};
pub use tts::{parse_voice_map, TtsClient, TtsConfig, TtsOutput, DEFAULT_VOICE};
