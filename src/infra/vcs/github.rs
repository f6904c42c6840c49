//! GitHub pull request review comments through the `gh` CLI.

use crate::domain::{PendingComment, PullRequestRef, ReviewComment};
use crate::infra::process::CommandRequest;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

lazy_static! {
    static ref GH_PR_URL_RE: Regex =
        Regex::new(r"^https?://(?:www\.)?github\.com/([^/]+)/([^/]+)/pull/(\d+)")
            .expect("github pr url regex");
    static ref GH_OWNER_REPO_NUM_RE: Regex =
        Regex::new(r"^([^/\s]+)/([^#\s]+)#(\d+)$").expect("github owner/repo#num regex");
}

pub fn parse_pr_ref(input: &str) -> Option<PullRequestRef> {
    let trimmed = input.trim();
    let caps = GH_PR_URL_RE
        .captures(trimmed)
        .or_else(|| GH_OWNER_REPO_NUM_RE.captures(trimmed))?;

    Some(PullRequestRef {
        owner: caps.get(1)?.as_str().to_string(),
        repo: caps.get(2)?.as_str().to_string(),
        number: caps.get(3)?.as_str().parse().ok()?,
    })
}

#[derive(Debug, Clone)]
pub struct Gh {
    program: String,
}

impl Default for Gh {
    fn default() -> Self {
        Self::new("gh")
    }
}

impl Gh {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// All review comments on a pull request, every page.
    pub fn review_comments(&self, pr: &PullRequestRef) -> CommandRequest {
        CommandRequest::new(
            self.program.clone(),
            [
                "api".to_string(),
                "--paginate".to_string(),
                "-H".to_string(),
                "Accept: application/vnd.github+json".to_string(),
                format!("repos/{}/{}/pulls/{}/comments", pr.owner, pr.repo, pr.number),
            ],
        )
    }

    /// One review carrying every pending comment.
    pub fn submit_review(
        &self,
        pr: &PullRequestRef,
        body: &str,
        comments: &[PendingComment],
    ) -> CommandRequest {
        let payload = serde_json::json!({
            "event": "COMMENT",
            "body": body,
            "comments": comments
                .iter()
                .map(|c| serde_json::json!({
                    "path": c.path,
                    "line": c.line,
                    "side": c.side,
                    "body": c.body,
                }))
                .collect::<Vec<_>>(),
        });

        CommandRequest::new(
            self.program.clone(),
            [
                "api".to_string(),
                format!("repos/{}/{}/pulls/{}/reviews", pr.owner, pr.repo, pr.number),
                "--method".to_string(),
                "POST".to_string(),
                "-H".to_string(),
                "Accept: application/vnd.github+json".to_string(),
                "--input".to_string(),
                "-".to_string(),
            ],
        )
        .stdin(payload.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct GhUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct GhReviewComment {
    id: u64,
    #[serde(default)]
    in_reply_to_id: Option<u64>,
    path: String,
    #[serde(default)]
    line: Option<u32>,
    #[serde(default)]
    original_line: Option<u32>,
    #[serde(default)]
    body: String,
    #[serde(default)]
    user: Option<GhUser>,
}

impl From<GhReviewComment> for ReviewComment {
    fn from(raw: GhReviewComment) -> Self {
        ReviewComment {
            id: raw.id,
            parent_id: raw.in_reply_to_id,
            path: raw.path,
            line: raw.line,
            original_line: raw.original_line,
            body: raw.body,
            author: raw.user.map(|u| u.login).unwrap_or_default(),
        }
    }
}

/// Decode `gh api --paginate` output, which concatenates one JSON array per
/// page.
pub fn parse_comments_json(json: &str) -> Result<Vec<ReviewComment>, serde_json::Error> {
    let mut comments = Vec::new();
    for page in serde_json::Deserializer::from_str(json).into_iter::<Vec<GhReviewComment>>() {
        comments.extend(page?.into_iter().map(ReviewComment::from));
    }
    Ok(comments)
}

/// Review id from the response to [`Gh::submit_review`].
pub fn parse_review_id(json: &str) -> Option<String> {
    let parsed: serde_json::Value = serde_json::from_str(json).ok()?;
    parsed.get("id").and_then(|v| v.as_i64()).map(|id| id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DiffSide;

    #[test]
    fn test_parse_pr_ref_valid_url() {
        let res = parse_pr_ref("https://github.com/octo/gitweave/pull/123").expect("should parse");
        assert_eq!(res.owner, "octo");
        assert_eq!(res.repo, "gitweave");
        assert_eq!(res.number, 123);
    }

    #[test]
    fn test_parse_pr_ref_valid_short_ref() {
        let res = parse_pr_ref("octo/gitweave#7").expect("should parse");
        assert_eq!(res.to_string(), "octo/gitweave#7");
    }

    #[test]
    fn test_parse_pr_ref_invalid() {
        assert!(parse_pr_ref("invalid").is_none());
        assert!(parse_pr_ref("https://google.com").is_none());
        assert!(parse_pr_ref("owner/repo").is_none());
    }

    #[test]
    fn test_parse_comments_json_concatenated_pages() {
        let json = r#"[{"id":101,"path":"src/a.rs","line":4,"original_line":4,"body":"why?","user":{"login":"alice"}}]
[{"id":102,"in_reply_to_id":101,"path":"src/a.rs","line":null,"original_line":4,"body":"because","user":{"login":"bob"}}]"#;
        let comments = parse_comments_json(json).unwrap();

        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].author, "alice");
        assert_eq!(comments[1].parent_id, Some(101));
        assert_eq!(comments[1].line, None);
        assert_eq!(comments[1].effective_line(), Some(4));
    }

    #[test]
    fn test_parse_comments_json_rejects_garbage() {
        assert!(parse_comments_json("{not json").is_err());
        assert!(parse_comments_json("").unwrap().is_empty());
    }

    #[test]
    fn test_submit_review_batches_all_comments() {
        let pr = PullRequestRef {
            owner: "octo".into(),
            repo: "gitweave".into(),
            number: 9,
        };
        let comments = vec![
            PendingComment {
                path: "a.rs".into(),
                line: 3,
                side: DiffSide::Right,
                body: "one".into(),
            },
            PendingComment {
                path: "b.rs".into(),
                line: 8,
                side: DiffSide::Left,
                body: "two".into(),
            },
        ];
        let request = Gh::default().submit_review(&pr, "", &comments);

        assert!(request.args.contains(&"repos/octo/gitweave/pulls/9/reviews".to_string()));
        let payload: serde_json::Value =
            serde_json::from_str(request.options.stdin.as_deref().unwrap()).unwrap();
        assert_eq!(payload["event"], "COMMENT");
        assert_eq!(payload["comments"].as_array().unwrap().len(), 2);
        assert_eq!(payload["comments"][1]["side"], "LEFT");
    }

    #[test]
    fn test_parse_review_id() {
        assert_eq!(parse_review_id(r#"{"id": 42}"#).as_deref(), Some("42"));
        assert_eq!(parse_review_id("{}"), None);
    }
}
