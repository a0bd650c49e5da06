//! Scene-script and localized-narration generation.

use serde_json::json;
use tracing::info;

use dcast_models::{
    CommitDoc, LocalizedLines, SceneScript, SceneScriptDraft, MAX_SCENES, MIN_SCENES,
};

use crate::error::{GenError, GenResult};
use crate::llm::{ChatMessage, LlmClient, LlmOptions, MODEL_FLASH, MODEL_PRO};

const DIFF_PAYLOAD_MAX_CHARS: usize = 18_000;
const MAX_LISTED_FILES: usize = 30;

/// Generate a viewer-facing scene script from the commit diff and validate
/// it into the canonical shape.
pub async fn generate_scene_script(
    llm: &LlmClient,
    commit: &CommitDoc,
) -> GenResult<SceneScript> {
    let diff_payload = commit.diff_payload(DIFF_PAYLOAD_MAX_CHARS);
    if diff_payload.trim().is_empty() {
        return Err(GenError::validation(
            "commit has no patch content to describe",
        ));
    }

    info!(
        commit_id = %commit.id,
        repo = %commit.repo_full_name,
        files = commit.files.len(),
        "generating scene script"
    );

    let file_paths = commit
        .files
        .iter()
        .take(MAX_LISTED_FILES)
        .map(|f| format!("- {}", f.path))
        .collect::<Vec<_>>()
        .join("\n");

    let system = "You are a really smart talented product manager who writes short product \
                  update transcripts for non-technical audiences. Avoid all code or engineering \
                  jargon (unless it contributes in selling that feature somehow). This is going \
                  to be used to generate a video for a product update, so it should be engaging \
                  and interesting to watch.";
    let user = format!(
        "Analyze the commit diff and produce JSON only.\n\n\
         Required JSON object:\n\
         {{\n  \"title\": \"string\",\n  \"feature_summary\": \"string\",\n  \"scenes\": [\n    \
         {{\n      \"on_screen_text\": \"string\",\n      \"narration_seed\": \"string\",\n      \
         \"duration_sec\": number\n    }}\n  ]\n}}\n\n\
         Constraints:\n\
         - {MIN_SCENES} to {MAX_SCENES} scenes.\n\
         - Keep language simple and non-technical.\n\
         - No words like API, endpoint, refactor, class, backend, frontend.\n\
         - on_screen_text: short sentence, <= 140 chars.\n\
         - narration_seed: friendly explanation, <= 180 chars.\n\
         - duration_sec: between 3 and 12.\n\n\
         Repo: {repo}\n\
         Commit message: {message}\n\
         Changed files:\n{file_paths}\n\n\
         Unified diff:\n{diff_payload}\n",
        repo = commit.repo_full_name,
        message = commit.message,
    );

    let options = LlmOptions {
        model: MODEL_PRO.to_string(),
        json_mode: true,
        temperature: 0.2,
        max_output_tokens: Some(2000),
        retries: 1,
    };
    let response = llm
        .invoke(&[ChatMessage::system(system), ChatMessage::user(user)], &options)
        .await?;

    let json = response.json.ok_or(GenError::EmptyResponse)?;
    let draft: SceneScriptDraft = serde_json::from_value(json)
        .map_err(|e| GenError::response_format(format!("script response shape: {e}")))?;
    let script = SceneScript::from_draft(draft)?;

    info!(
        commit_id = %commit.id,
        scenes = script.scene_count(),
        total_duration_sec = script.total_duration_sec,
        "scene script generated"
    );
    Ok(script)
}

/// Generate per-scene voice and caption lines for one target language.
pub async fn generate_localized_lines(
    llm: &LlmClient,
    script: &SceneScript,
    language: &str,
) -> GenResult<LocalizedLines> {
    info!(language, scenes = script.scene_count(), "generating localized lines");

    let payload = json!({
        "language": language,
        "title": script.title,
        "feature_summary": script.feature_summary,
        "scene_narration_seed": script.scenes.iter().map(|s| &s.narration_seed).collect::<Vec<_>>(),
        "scene_on_screen_text": script.scenes.iter().map(|s| &s.on_screen_text).collect::<Vec<_>>(),
    });

    let system = "You produce narration and caption lines for short product videos. Use simple \
                  non-technical language.";
    let user = format!(
        "Return JSON only with this object shape:\n\
         {{ \"voice_lines\": [string], \"caption_lines\": [string] }}\n\
         - Keep one line per scene.\n\
         - Keep each line concise and easy to read.\n\
         - Do not add numbering or extra metadata.\n\
         - Output language: {language}\n\n\
         Source JSON:\n{payload}"
    );

    let options = LlmOptions {
        model: MODEL_FLASH.to_string(),
        json_mode: true,
        temperature: 0.3,
        max_output_tokens: Some(1800),
        retries: 1,
    };
    let response = llm
        .invoke(&[ChatMessage::system(system), ChatMessage::user(user)], &options)
        .await?;

    let json = response.json.ok_or(GenError::EmptyResponse)?;
    let lines: LocalizedLines = serde_json::from_value(json).map_err(|_| {
        GenError::response_format(format!(
            "localized script for {language} must include voice_lines and caption_lines arrays"
        ))
    })?;
    Ok(lines.validate(language, script.scene_count())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcast_models::CommitFile;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn commit() -> CommitDoc {
        CommitDoc::new(
            "octocat/hello-world",
            "abc1234def",
            "add search",
            vec![CommitFile {
                path: "src/search.rs".to_string(),
                status: "modified".to_string(),
                additions: 4,
                deletions: 1,
                patch: Some("+let results = find(query);".to_string()),
            }],
        )
    }

    fn text_response(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": text}]}}]
        })
    }

    #[tokio::test]
    async fn test_valid_script_is_normalized() {
        let script_json = serde_json::json!({
            "title": "Faster search for everyone",
            "feature_summary": "Finding things now takes a moment",
            "scenes": [
                {"on_screen_text": "Type what you need", "narration_seed": "Show typing", "duration_sec": 4.0},
                {"on_screen_text": "Results appear", "narration_seed": "Show results", "duration_sec": 5.0},
                {"on_screen_text": "Pick one", "narration_seed": "Show a click", "duration_sec": 3.0}
            ]
        });
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(text_response(&script_json.to_string())),
            )
            .mount(&server)
            .await;

        let llm = LlmClient::new("key", server.uri()).unwrap();
        let script = generate_scene_script(&llm, &commit()).await.unwrap();
        assert_eq!(script.scene_count(), 3);
        assert_eq!(script.total_duration_sec, 12.0);
    }

    #[tokio::test]
    async fn test_jargon_script_is_rejected() {
        let script_json = serde_json::json!({
            "title": "New API endpoint",
            "feature_summary": "We shipped an endpoint",
            "scenes": [
                {"on_screen_text": "a", "narration_seed": "b", "duration_sec": 4.0},
                {"on_screen_text": "c", "narration_seed": "d", "duration_sec": 4.0},
                {"on_screen_text": "e", "narration_seed": "f", "duration_sec": 4.0}
            ]
        });
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(text_response(&script_json.to_string())),
            )
            .mount(&server)
            .await;

        let llm = LlmClient::new("key", server.uri()).unwrap();
        let result = generate_scene_script(&llm, &commit()).await;
        assert!(matches!(result, Err(GenError::Script(_))));
    }

    #[tokio::test]
    async fn test_localized_lines_must_match_scene_count() {
        let draft = dcast_models::SceneScriptDraft {
            title: "Faster search".to_string(),
            feature_summary: "Find anything quickly".to_string(),
            scenes: (0..3)
                .map(|i| dcast_models::SceneDraft {
                    on_screen_text: format!("text {i}"),
                    narration_seed: format!("seed {i}"),
                    duration_sec: 4.0,
                })
                .collect(),
        };
        let script = SceneScript::from_draft(draft).unwrap();

        let lines_json = serde_json::json!({
            "voice_lines": ["uno", "dos"],
            "caption_lines": ["1", "2"]
        });
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(text_response(&lines_json.to_string())),
            )
            .mount(&server)
            .await;

        let llm = LlmClient::new("key", server.uri()).unwrap();
        let result = generate_localized_lines(&llm, &script, "es").await;
        assert!(matches!(result, Err(GenError::Script(_))));
    }
}
