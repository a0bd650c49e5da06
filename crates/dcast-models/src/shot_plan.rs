//! Shot plan: the deterministic bridge between the validated script and the
//! clip-synthesis and narration stages.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::script::SceneScript;

/// Default requested length for the cinematic opener and closer inserts.
pub const DEFAULT_INSERT_DURATION_SEC: f64 = 6.0;

/// One planned shot, derived from a scene.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Shot {
    pub index: usize,
    /// Visual prompt handed to the clip synthesizer.
    pub prompt: String,
    /// Seed text the narrator localizes for this shot.
    pub caption_seed: String,
    pub duration_sec: f64,
}

/// The full plan for a job's video: per-scene shots plus the opener and
/// closer insert prompts anchored around the recorded demo.
///
/// Built once from the validated script and the measured demo duration; every
/// downstream stage reads scene count and durations from here rather than
/// re-deriving them.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ShotPlan {
    pub shots: Vec<Shot>,
    pub opener_prompt: String,
    pub closer_prompt: String,
    pub opener_duration_sec: f64,
    pub closer_duration_sec: f64,
    pub demo_duration_sec: f64,
}

impl ShotPlan {
    /// Derive the plan from a validated script and the probed demo duration.
    /// Pure and deterministic: the same inputs always yield the same plan.
    pub fn from_script(script: &SceneScript, demo_duration_sec: f64) -> Self {
        let shots = script
            .scenes
            .iter()
            .enumerate()
            .map(|(index, scene)| Shot {
                index,
                prompt: format!(
                    "Cinematic product shot for \"{}\": {}",
                    script.title, scene.on_screen_text
                ),
                caption_seed: scene.narration_seed.clone(),
                duration_sec: scene.duration_sec,
            })
            .collect();

        Self {
            shots,
            opener_prompt: format!(
                "Cinematic opening title shot for a product update called \"{}\". {}",
                script.title, script.feature_summary
            ),
            closer_prompt: format!(
                "Cinematic closing shot wrapping up a product update: {}",
                script.feature_summary
            ),
            opener_duration_sec: DEFAULT_INSERT_DURATION_SEC,
            closer_duration_sec: DEFAULT_INSERT_DURATION_SEC,
            demo_duration_sec,
        }
    }

    pub fn scene_count(&self) -> usize {
        self.shots.len()
    }

    pub fn scene_durations(&self) -> Vec<f64> {
        self.shots.iter().map(|s| s.duration_sec).collect()
    }

    pub fn caption_seeds(&self) -> Vec<&str> {
        self.shots.iter().map(|s| s.caption_seed.as_str()).collect()
    }
}
