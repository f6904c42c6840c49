use super::queue::ReviewQueue;
use super::threads::{ThreadMap, build_threads};
use crate::application::inbox::{GatewayResult, Inbox};
use crate::application::staleness::{StalenessGuard, Stamp, Stamped};
use crate::domain::{LineAnchor, PendingComment, PullRequestRef, ReviewError};
use crate::infra::process::Gateway;
use crate::infra::vcs::github::{Gh, parse_comments_json, parse_review_id};
use serde::Serialize;

#[derive(Debug)]
enum ReviewMessage {
    Comments(GatewayResult),
    Submitted { ids: Vec<u64>, result: GatewayResult },
}

/// What a finished request changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReviewUpdate {
    ThreadsLoaded { threads: usize },
    Submitted { review_id: Option<String>, comments: usize },
    RefreshFailed { diagnostic: String },
    SubmitFailed { diagnostic: String },
}

/// Review threads and pending comments for one pull request.
pub struct ReviewSession {
    gateway: Gateway,
    gh: Gh,
    guard: StalenessGuard<PullRequestRef>,
    inbox: Inbox<PullRequestRef, ReviewMessage>,
    threads: ThreadMap,
    queue: ReviewQueue,
}

impl ReviewSession {
    pub fn new(gateway: Gateway, gh: Gh) -> Self {
        Self {
            gateway,
            gh,
            guard: StalenessGuard::new(),
            inbox: Inbox::new(),
            threads: ThreadMap::default(),
            queue: ReviewQueue::new(),
        }
    }

    /// Switch to `pr` and load its threads. Switching to a different pull
    /// request discards the threads and pending comments of the previous one.
    pub fn open(&mut self, pr: PullRequestRef) {
        if self.guard.scope() != Some(&pr) {
            log::info!("opening review session for {pr}");
            self.threads = ThreadMap::default();
            self.queue.clear();
        }
        let stamp = self.guard.switch_to(pr);
        self.dispatch_refresh(stamp);
    }

    pub fn close(&mut self) {
        self.guard.close();
        self.threads = ThreadMap::default();
        self.queue.clear();
    }

    /// Reload the thread list. Pending comments are untouched.
    pub fn refresh(&mut self) -> Result<(), ReviewError> {
        let stamp = self.guard.stamp().ok_or(ReviewError::NoPullRequest)?;
        self.dispatch_refresh(stamp);
        Ok(())
    }

    fn dispatch_refresh(&mut self, stamp: Stamp<PullRequestRef>) {
        let request = self.gh.review_comments(&stamp.scope);
        self.inbox
            .dispatch(&self.gateway, request, stamp, ReviewMessage::Comments);
    }

    pub fn queue_comment(&mut self, comment: PendingComment) -> u64 {
        self.queue.push(comment)
    }

    /// Queue a comment on the diff line described by `anchor`.
    pub fn queue_at(&mut self, anchor: &LineAnchor, body: impl Into<String>) -> Option<u64> {
        self.queue.push_at(anchor, body)
    }

    pub fn unqueue(&mut self, id: u64) -> Option<PendingComment> {
        self.queue.remove(id)
    }

    /// Submit every queued comment as one review.
    pub fn submit(&mut self, body: &str) -> Result<(), ReviewError> {
        let stamp = self.guard.stamp().ok_or(ReviewError::NoPullRequest)?;
        if self.queue.is_empty() {
            return Err(ReviewError::EmptyBatch);
        }
        let (ids, comments) = self.queue.batch();
        log::info!("submitting {} review comments on {}", ids.len(), stamp.scope);
        let request = self.gh.submit_review(&stamp.scope, body, &comments);
        self.inbox
            .dispatch(&self.gateway, request, stamp, move |result| {
                ReviewMessage::Submitted { ids, result }
            });
        Ok(())
    }

    pub fn poll(&mut self) -> Vec<ReviewUpdate> {
        let mut updates = Vec::new();
        while let Some(msg) = self.inbox.try_next() {
            updates.extend(self.apply(msg));
        }
        updates
    }

    /// Wait for one request to finish. None if it was stale or nothing was
    /// outstanding.
    pub async fn wait_next(&mut self) -> Option<ReviewUpdate> {
        let msg = self.inbox.next().await?;
        self.apply(msg)
    }

    fn apply(&mut self, msg: Stamped<PullRequestRef, ReviewMessage>) -> Option<ReviewUpdate> {
        let message = self.guard.apply(msg, |message| message)?;
        let update = match message {
            ReviewMessage::Comments(result) => match decode_comments(result) {
                Ok(threads) => {
                    self.threads = threads;
                    ReviewUpdate::ThreadsLoaded {
                        threads: self.threads.len(),
                    }
                }
                Err(err) => ReviewUpdate::RefreshFailed {
                    diagnostic: err.to_string(),
                },
            },
            ReviewMessage::Submitted { ids, result } => {
                match result.map_err(ReviewError::from).and_then(|r| {
                    r.into_checked().map_err(ReviewError::from)
                }) {
                    Ok(output) => {
                        self.queue.clear_submitted(&ids);
                        ReviewUpdate::Submitted {
                            review_id: parse_review_id(&output.stdout),
                            comments: ids.len(),
                        }
                    }
                    Err(err) => {
                        log::warn!("review submission failed: {err}");
                        ReviewUpdate::SubmitFailed {
                            diagnostic: err.to_string(),
                        }
                    }
                }
            }
        };
        Some(update)
    }

    pub fn pull_request(&self) -> Option<&PullRequestRef> {
        self.guard.scope()
    }

    pub fn threads(&self) -> &ThreadMap {
        &self.threads
    }

    pub fn queue(&self) -> &ReviewQueue {
        &self.queue
    }
}

fn decode_comments(result: GatewayResult) -> Result<ThreadMap, ReviewError> {
    let output = result?.into_checked()?;
    let comments = parse_comments_json(&output.stdout)?;
    Ok(build_threads(&comments))
}

/// Fetch and thread the review comments of `pr` in one go.
pub async fn fetch_threads(
    gateway: &Gateway,
    gh: &Gh,
    pr: &PullRequestRef,
) -> Result<ThreadMap, ReviewError> {
    decode_comments(gateway.run(gh.review_comments(pr)).await)
}
