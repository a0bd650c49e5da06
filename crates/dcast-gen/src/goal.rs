//! Demo-goal generation from the commit diff.

use serde::Deserialize;
use tracing::info;

use dcast_models::CommitDoc;

use crate::error::{GenError, GenResult};
use crate::llm::{ChatMessage, LlmClient, LlmOptions, MODEL_PRO};

const DIFF_PAYLOAD_MAX_CHARS: usize = 18_000;

#[derive(Debug, Deserialize)]
struct GoalPayload {
    goal: String,
}

/// Produce a short browsing goal describing how to demonstrate the change.
/// Commits without patch content are rejected before any model call.
pub async fn generate_demo_goal(llm: &LlmClient, commit: &CommitDoc) -> GenResult<String> {
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
        "generating demo goal"
    );

    let system = "You are a head of product engineering who defines a goal for demonstrating a \
                  new product feature release. You are given a commit diff and you need to define \
                  a goal for demonstrating the new feature. The goal should be a short paragraph \
                  (no more than 70 words) describing: the steps to demonstrate the new feature \
                  (e.g. first navigate to this page) and the expected outcome. Respond with JSON \
                  only: {\"goal\": \"your goal text\"}.";
    let user = format!(
        "Analyze the commit diff and produce a JSON object with a single \"goal\" field containing \
         a short paragraph describing the steps to demonstrate the new feature and the expected \
         outcome.\n\nUnified diff:\n{diff_payload}\n"
    );

    let options = LlmOptions {
        model: MODEL_PRO.to_string(),
        json_mode: true,
        temperature: 0.2,
        max_output_tokens: Some(3000),
        retries: 1,
    };
    let response = llm
        .invoke(&[ChatMessage::system(system), ChatMessage::user(user)], &options)
        .await?;

    let json = response.json.ok_or(GenError::EmptyResponse)?;
    let payload: GoalPayload = serde_json::from_value(json)
        .map_err(|_| GenError::response_format("goal response must carry a goal string"))?;
    let goal = payload.goal.trim().to_string();
    if goal.is_empty() {
        return Err(GenError::response_format("goal text is empty"));
    }
    Ok(goal)
}
