//! Request handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use dcast_models::{commit_doc_id, JobStatus, VideoJob};
use dcast_pipeline::EnqueueOutcome;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EnqueueRequest {
    #[serde(default)]
    pub commit_id: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default)]
    pub sha: Option<String>,
    /// Must be an array of language-code strings when present.
    #[serde(default)]
    pub languages: Option<Value>,
    #[serde(default)]
    pub force: bool,
}

impl EnqueueRequest {
    fn commit_id(&self) -> ApiResult<String> {
        if let Some(id) = self.commit_id.as_ref().filter(|s| !s.trim().is_empty()) {
            return Ok(id.clone());
        }
        match (&self.owner, &self.repo, &self.sha) {
            (Some(owner), Some(repo), Some(sha))
                if !owner.is_empty() && !repo.is_empty() && !sha.is_empty() =>
            {
                Ok(commit_doc_id(&format!("{owner}/{repo}"), sha))
            }
            _ => Err(ApiError::bad_request(
                "either commit_id or owner, repo, and sha are required",
            )),
        }
    }

    fn languages(&self) -> ApiResult<Option<Vec<String>>> {
        let Some(value) = &self.languages else {
            return Ok(None);
        };
        let Value::Array(items) = value else {
            return Err(ApiError::bad_request(
                "languages must be an array of language codes",
            ));
        };
        let mut codes = Vec::with_capacity(items.len());
        for item in items {
            match item.as_str() {
                Some(code) => codes.push(code.to_string()),
                None => {
                    return Err(ApiError::bad_request(
                        "languages must be an array of language codes",
                    ))
                }
            }
        }
        Ok(Some(codes))
    }
}

/// `POST /api/pipeline/commit` — 202 when a run was scheduled, 200 when the
/// request was skipped as a duplicate.
pub async fn enqueue_commit(
    State(state): State<AppState>,
    Json(request): Json<EnqueueRequest>,
) -> ApiResult<(StatusCode, Json<EnqueueOutcome>)> {
    let commit_id = request.commit_id()?;
    let languages = request.languages()?;
    let outcome = state
        .scheduler
        .enqueue(&commit_id, languages.as_deref(), request.force)
        .await?;
    let status = if outcome.queued {
        StatusCode::ACCEPTED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome)))
}

/// `GET /api/videos/:video_id`
pub async fn get_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> ApiResult<Json<VideoJob>> {
    let job = state
        .jobs
        .get(&video_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("video {video_id}")))?;
    Ok(Json(job))
}

const MAX_LIST_LIMIT: usize = 100;
const DEFAULT_LIST_LIMIT: usize = 20;

#[derive(Debug, Deserialize)]
pub struct ListVideosQuery {
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Serialize)]
pub struct VideoListResponse {
    pub videos: Vec<VideoJob>,
}

/// `GET /api/repos/:owner/:repo/videos`
pub async fn list_repo_videos(
    State(state): State<AppState>,
    Path((owner, repo)): Path<(String, String)>,
    Query(query): Query<ListVideosQuery>,
) -> ApiResult<Json<VideoListResponse>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);
    let status = query.status.as_deref().map(parse_status).transpose()?;
    let videos = state
        .jobs
        .list_for_repo(&format!("{owner}/{repo}"), status, limit)
        .await?;
    Ok(Json(VideoListResponse { videos }))
}

fn parse_status(s: &str) -> ApiResult<JobStatus> {
    match s {
        "queued" => Ok(JobStatus::Queued),
        "running" => Ok(JobStatus::Running),
        "awaiting_input" => Ok(JobStatus::AwaitingInput),
        "completed" => Ok(JobStatus::Completed),
        "failed" => Ok(JobStatus::Failed),
        other => Err(ApiError::bad_request(format!("unknown status: {other}"))),
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Liveness probe; also serves `/healthz` and `/ready`.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_ref_resolution() {
        let request = EnqueueRequest {
            commit_id: None,
            owner: Some("octocat".to_string()),
            repo: Some("hello-world".to_string()),
            sha: Some("abc1234def".to_string()),
            languages: None,
            force: false,
        };
        assert_eq!(
            request.commit_id().unwrap(),
            commit_doc_id("octocat/hello-world", "abc1234def")
        );

        let missing = EnqueueRequest {
            commit_id: None,
            owner: None,
            repo: None,
            sha: None,
            languages: None,
            force: false,
        };
        assert!(missing.commit_id().is_err());
    }

    #[test]
    fn test_languages_must_be_string_array() {
        let mut request = EnqueueRequest {
            commit_id: Some("c1".to_string()),
            owner: None,
            repo: None,
            sha: None,
            languages: Some(serde_json::json!(["en", "es"])),
            force: false,
        };
        assert_eq!(
            request.languages().unwrap(),
            Some(vec!["en".to_string(), "es".to_string()])
        );

        request.languages = Some(serde_json::json!("en"));
        assert!(request.languages().is_err());

        request.languages = Some(serde_json::json!([1, 2]));
        assert!(request.languages().is_err());

        request.languages = None;
        assert_eq!(request.languages().unwrap(), None);
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status("completed").unwrap(), JobStatus::Completed);
        assert!(parse_status("done").is_err());
    }
}
