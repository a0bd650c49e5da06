//! Commit and repository documents.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One changed file inside a commit, including its unified diff patch.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CommitFile {
    pub path: String,
    /// Change status as reported by the forge ("added", "modified", ...)
    #[serde(default = "default_file_status")]
    pub status: String,
    #[serde(default)]
    pub additions: u32,
    #[serde(default)]
    pub deletions: u32,
    /// Unified diff hunk text. Absent for binary or oversized files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,
}

fn default_file_status() -> String {
    "modified".to_string()
}

/// Commit author metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CommitAuthor {
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub avatar_url: String,
}

/// A stored commit, keyed by [`commit_doc_id`].
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CommitDoc {
    pub id: String,
    pub sha: String,
    pub sha_short: String,
    pub repo_id: String,
    pub repo_full_name: String,
    pub message: String,
    #[serde(default)]
    pub author: CommitAuthor,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub branch: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_title: Option<String>,
    #[serde(default)]
    pub files: Vec<CommitFile>,
}

impl CommitDoc {
    /// Create a commit document with derived ids.
    pub fn new(
        repo_full_name: impl Into<String>,
        sha: impl Into<String>,
        message: impl Into<String>,
        files: Vec<CommitFile>,
    ) -> Self {
        let repo_full_name = repo_full_name.into();
        let sha = sha.into();
        Self {
            id: commit_doc_id(&repo_full_name, &sha),
            sha_short: short_sha(&sha),
            repo_id: repo_doc_id(&repo_full_name),
            repo_full_name,
            sha,
            message: message.into(),
            author: CommitAuthor::default(),
            timestamp: Utc::now(),
            branch: String::new(),
            pr_number: None,
            pr_title: None,
            files,
        }
    }

    /// Concatenate per-file patches into one prompt payload, truncated at
    /// `max_chars`. Files without patch content are skipped.
    pub fn diff_payload(&self, max_chars: usize) -> String {
        let mut chunks = String::new();
        for file in &self.files {
            let patch = match file.patch.as_deref() {
                Some(p) if !p.is_empty() => p,
                _ => continue,
            };
            let body = format!(
                "FILE: {}\nSTATUS: {}\nPATCH:\n{}\n\n",
                file.path, file.status, patch
            );
            let remaining = max_chars.saturating_sub(chunks.len());
            if remaining == 0 {
                break;
            }
            if body.len() > remaining {
                let cut = floor_char_boundary(&body, remaining);
                chunks.push_str(&body[..cut]);
                chunks.push_str("\n...TRUNCATED...");
                break;
            }
            chunks.push_str(&body);
        }
        chunks
    }

    /// Whether any changed file carries patch content.
    pub fn has_patch_content(&self) -> bool {
        self.files
            .iter()
            .any(|f| f.patch.as_deref().is_some_and(|p| !p.trim().is_empty()))
    }
}

/// A watched repository.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RepoDoc {
    pub full_name: String,
    pub owner: String,
    pub name: String,
    #[serde(default = "default_branch")]
    pub default_branch: String,
    /// Deployed site the demo recorder drives. Required for the demo stage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website_url: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_enabled() -> bool {
    true
}

/// Deterministic commit document id: `{owner}_{repo}_{sha7}`.
pub fn commit_doc_id(repo_full_name: &str, sha: &str) -> String {
    format!("{}_{}", repo_doc_id(repo_full_name), short_sha(sha))
}

/// Deterministic repo document id: the full name with `/` flattened.
pub fn repo_doc_id(full_name: &str) -> String {
    full_name.replace('/', "_")
}

fn short_sha(sha: &str) -> String {
    sha.chars().take(7).collect()
}

fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit_with_patches(patches: Vec<Option<&str>>) -> CommitDoc {
        let files = patches
            .into_iter()
            .enumerate()
            .map(|(i, patch)| CommitFile {
                path: format!("src/file_{i}.rs"),
                status: "modified".to_string(),
                additions: 1,
                deletions: 0,
                patch: patch.map(String::from),
            })
            .collect();
        CommitDoc::new("octocat/hello-world", "abc1234def5678", "add search", files)
    }

    #[test]
    fn test_commit_doc_ids() {
        let commit = commit_with_patches(vec![Some("+line")]);
        assert_eq!(commit.id, "octocat_hello-world_abc1234");
        assert_eq!(commit.sha_short, "abc1234");
        assert_eq!(commit.repo_id, "octocat_hello-world");
    }

    #[test]
    fn test_diff_payload_skips_empty_patches() {
        let commit = commit_with_patches(vec![None, Some("+added line"), None]);
        let payload = commit.diff_payload(18_000);
        assert!(payload.contains("FILE: src/file_1.rs"));
        assert!(!payload.contains("file_0"));
        assert!(payload.contains("+added line"));
    }

    #[test]
    fn test_diff_payload_truncation() {
        let long_patch = "x".repeat(500);
        let commit = commit_with_patches(vec![Some(&long_patch), Some(&long_patch)]);
        let payload = commit.diff_payload(300);
        assert!(payload.len() < 400);
        assert!(payload.ends_with("...TRUNCATED..."));
    }

    #[test]
    fn test_has_patch_content() {
        assert!(commit_with_patches(vec![Some("+x")]).has_patch_content());
        assert!(!commit_with_patches(vec![None, Some("   ")]).has_patch_content());
    }
}
