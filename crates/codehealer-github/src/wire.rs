//! GitHub REST payloads and response classification.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use codehealer_core::{GatewayError, RepositoryHandle};
use serde::{Deserialize, Serialize};

/// Maximum length for error body content in error messages.
const MAX_ERROR_BODY_LEN: usize = 200;

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub items: Vec<RepoItem>,
}

#[derive(Debug, Deserialize)]
pub struct RepoItem {
    pub full_name: String,
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub archived: bool,
    pub url: String,
}

impl From<RepoItem> for RepositoryHandle {
    fn from(item: RepoItem) -> Self {
        Self {
            full_name: item.full_name,
            default_branch: item
                .default_branch
                .filter(|b| !b.is_empty())
                .unwrap_or_else(|| "main".to_string()),
            archived: item.archived,
            api_ref: item.url,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ContentResponse {
    pub path: String,
    pub sha: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub encoding: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

#[derive(Debug, Deserialize)]
pub struct BranchResponse {
    pub commit: CommitRef,
}

#[derive(Debug, Deserialize)]
pub struct CommitRef {
    pub sha: String,
}

#[derive(Debug, Serialize)]
pub struct CreateRefRequest<'a> {
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub sha: &'a str,
}

#[derive(Debug, Serialize)]
pub struct PutContentRequest<'a> {
    pub message: &'a str,
    pub content: String,
    pub sha: &'a str,
    pub branch: &'a str,
}

#[derive(Debug, Serialize)]
pub struct CreatePullRequest<'a> {
    pub title: &'a str,
    pub body: &'a str,
    pub head: &'a str,
    pub base: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct PullResponse {
    pub number: u64,
    pub html_url: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    message: String,
    #[serde(default)]
    errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

pub fn encode_content(text: &str) -> String {
    STANDARD.encode(text.as_bytes())
}

/// Decode a contents-API payload into text.
pub fn decode_content(response: &ContentResponse) -> Result<String, GatewayError> {
    if response.kind != "file" && !response.kind.is_empty() {
        return Err(GatewayError::Decode(format!(
            "{} is a {}, not a file",
            response.path, response.kind
        )));
    }
    if response.encoding != "base64" {
        return Err(GatewayError::Decode(format!(
            "unsupported encoding '{}' for {}",
            response.encoding, response.path
        )));
    }
    // The API wraps base64 at 60 columns.
    let compact: String = response
        .content
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let bytes = STANDARD
        .decode(compact)
        .map_err(|e| GatewayError::Decode(format!("{}: {e}", response.path)))?;
    String::from_utf8(bytes)
        .map_err(|e| GatewayError::Decode(format!("{} is not UTF-8: {e}", response.path)))
}

/// Sanitize an API error body to prevent credential leakage.
/// Truncates long responses and redacts potential secrets.
pub fn sanitize_error_body(body: &str) -> String {
    const SECRET_PATTERNS: &[&str] = &[
        "token",
        "secret",
        "password",
        "credential",
        "bearer",
        "ghp_",
        "gho_",
        "ghu_",
        "github_pat_",
    ];

    let truncated = if body.len() > MAX_ERROR_BODY_LEN {
        let mut cut = MAX_ERROR_BODY_LEN;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}... (truncated)", &body[..cut])
    } else {
        body.to_string()
    };

    let lower = truncated.to_lowercase();
    if SECRET_PATTERNS.iter().any(|p| lower.contains(p)) {
        return "(error details redacted - may contain sensitive data)".to_string();
    }
    truncated
}

/// Human-readable message from an error body: the structured `message`
/// (plus first detail) when present, otherwise the sanitized raw body.
pub fn error_message(body: &str) -> String {
    match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(api) => {
            let detail = api
                .errors
                .first()
                .and_then(|e| e.message.clone())
                .unwrap_or_default();
            let msg = if detail.is_empty() {
                api.message
            } else {
                format!("{}: {}", api.message, detail)
            };
            sanitize_error_body(&msg)
        }
        Err(_) => sanitize_error_body(body),
    }
}

/// Map a non-success response onto the gateway error kinds.
pub fn classify(status: u16, ratelimit_remaining: Option<&str>, body: &str) -> GatewayError {
    let message = error_message(body);
    let exhausted = ratelimit_remaining.is_some_and(|r| r.trim() == "0");
    match status {
        401 => GatewayError::Unauthorized(message),
        404 => GatewayError::NotFound(message),
        409 => GatewayError::Conflict(message),
        429 => GatewayError::RateLimited(message),
        403 if exhausted || message.to_lowercase().contains("rate limit") => {
            GatewayError::RateLimited(message)
        }
        403 => GatewayError::PermissionDenied(message),
        _ => GatewayError::Api { status, message },
    }
}
