//! Scene script: the validated narrative contract between the script
//! generator and every downstream stage.

use std::sync::OnceLock;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const MIN_SCENES: usize = 3;
pub const MAX_SCENES: usize = 8;
pub const MAX_TOTAL_DURATION_SEC: f64 = 120.0;

const MIN_SCENE_DURATION_SEC: f64 = 2.0;
const MAX_SCENE_DURATION_SEC: f64 = 20.0;

const TITLE_LIMIT: usize = 120;
const ON_SCREEN_TEXT_LIMIT: usize = 240;
const NARRATION_SEED_LIMIT: usize = 260;
const SUMMARY_LIMIT: usize = 260;

/// Engineering vocabulary the viewer-facing script must never contain.
fn jargon_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)\b(api|class|function|refactor|endpoint|backend|frontend|schema|regex|cli|sql|database|cache|repository)\b",
        )
        .expect("jargon pattern is a valid regex")
    })
}

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ScriptValidationError {
    #[error("script.title is required")]
    MissingTitle,
    #[error("script.feature_summary is required")]
    MissingSummary,
    #[error("script.scenes must contain between {MIN_SCENES} and {MAX_SCENES} scenes, got {0}")]
    SceneCount(usize),
    #[error("scene[{0}].on_screen_text is required")]
    MissingOnScreenText(usize),
    #[error("scene[{0}].narration_seed is required")]
    MissingNarrationSeed(usize),
    #[error("scene[{0}].duration_sec must be between 2 and 20, got {1}")]
    SceneDuration(usize, f64),
    #[error("total video duration must be at most 120 seconds, got {0:.2}")]
    TotalDuration(f64),
    #[error("{0} contains technical jargon")]
    Jargon(String),
    #[error("localized script for {language} must provide {expected} lines, got {got}")]
    LocalizedLineCount {
        language: String,
        expected: usize,
        got: usize,
    },
    #[error("localized script for {0} contains an empty line")]
    LocalizedEmptyLine(String),
}

/// A single scene after validation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Scene {
    pub on_screen_text: String,
    pub narration_seed: String,
    pub duration_sec: f64,
}

/// The raw script payload as the LLM returns it, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SceneScriptDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub feature_summary: String,
    #[serde(default)]
    pub scenes: Vec<SceneDraft>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SceneDraft {
    #[serde(default)]
    pub on_screen_text: String,
    #[serde(default)]
    pub narration_seed: String,
    #[serde(default)]
    pub duration_sec: f64,
}

/// A validated, normalized scene script.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SceneScript {
    pub title: String,
    pub feature_summary: String,
    pub scenes: Vec<Scene>,
    pub total_duration_sec: f64,
}

impl SceneScript {
    /// Validate and normalize a draft: required fields, scene count bounds,
    /// per-scene and total duration limits, jargon filtering, and field
    /// truncation.
    pub fn from_draft(draft: SceneScriptDraft) -> Result<Self, ScriptValidationError> {
        let title = draft.title.trim().to_string();
        let summary = draft.feature_summary.trim().to_string();

        if title.is_empty() {
            return Err(ScriptValidationError::MissingTitle);
        }
        if summary.is_empty() {
            return Err(ScriptValidationError::MissingSummary);
        }
        let count = draft.scenes.len();
        if !(MIN_SCENES..=MAX_SCENES).contains(&count) {
            return Err(ScriptValidationError::SceneCount(count));
        }
        if contains_jargon(&title) || contains_jargon(&summary) {
            return Err(ScriptValidationError::Jargon("script".to_string()));
        }

        let mut scenes = Vec::with_capacity(count);
        let mut total = 0.0;
        for (index, scene) in draft.scenes.into_iter().enumerate() {
            let on_screen_text = scene.on_screen_text.trim().to_string();
            let narration_seed = scene.narration_seed.trim().to_string();
            if on_screen_text.is_empty() {
                return Err(ScriptValidationError::MissingOnScreenText(index));
            }
            if narration_seed.is_empty() {
                return Err(ScriptValidationError::MissingNarrationSeed(index));
            }
            if contains_jargon(&on_screen_text) || contains_jargon(&narration_seed) {
                return Err(ScriptValidationError::Jargon(format!("scene[{index}]")));
            }
            let duration = scene.duration_sec;
            if !duration.is_finite()
                || duration < MIN_SCENE_DURATION_SEC
                || duration > MAX_SCENE_DURATION_SEC
            {
                return Err(ScriptValidationError::SceneDuration(index, duration));
            }
            total += duration;
            scenes.push(Scene {
                on_screen_text: truncate(&on_screen_text, ON_SCREEN_TEXT_LIMIT),
                narration_seed: truncate(&narration_seed, NARRATION_SEED_LIMIT),
                duration_sec: duration,
            });
        }

        if total > MAX_TOTAL_DURATION_SEC {
            return Err(ScriptValidationError::TotalDuration(total));
        }

        Ok(Self {
            title: truncate(&title, TITLE_LIMIT),
            feature_summary: truncate(&summary, SUMMARY_LIMIT),
            scenes,
            total_duration_sec: (total * 100.0).round() / 100.0,
        })
    }

    pub fn scene_count(&self) -> usize {
        self.scenes.len()
    }

    pub fn scene_durations(&self) -> Vec<f64> {
        self.scenes.iter().map(|s| s.duration_sec).collect()
    }
}

/// Per-language narration and caption lines, one entry per scene.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LocalizedLines {
    pub voice_lines: Vec<String>,
    pub caption_lines: Vec<String>,
}

impl LocalizedLines {
    /// Trim all lines and check both arrays match the scene count with no
    /// empty entries.
    pub fn validate(mut self, language: &str, scene_count: usize) -> Result<Self, ScriptValidationError> {
        for lines in [&mut self.voice_lines, &mut self.caption_lines] {
            if lines.len() != scene_count {
                return Err(ScriptValidationError::LocalizedLineCount {
                    language: language.to_string(),
                    expected: scene_count,
                    got: lines.len(),
                });
            }
            for line in lines.iter_mut() {
                *line = line.trim().to_string();
                if line.is_empty() {
                    return Err(ScriptValidationError::LocalizedEmptyLine(
                        language.to_string(),
                    ));
                }
            }
        }
        Ok(self)
    }

    /// The full narration text for TTS: voice lines joined with spaces.
    pub fn voice_script(&self) -> String {
        self.voice_lines.join(" ").trim().to_string()
    }
}

fn contains_jargon(text: &str) -> bool {
    jargon_pattern().is_match(text)
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let cut: String = text.chars().take(limit).collect();
    format!("{cut}...")
}
