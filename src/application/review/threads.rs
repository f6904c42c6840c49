use crate::domain::{CommentId, ReviewComment, ReviewThread};
use serde::Serialize;
use std::collections::HashMap;

/// Threads in the order their first member arrived, with a lookup from any
/// member id to its thread.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ThreadMap {
    threads: Vec<ReviewThread>,
    #[serde(skip)]
    by_member: HashMap<CommentId, usize>,
}

impl ThreadMap {
    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    pub fn threads(&self) -> &[ReviewThread] {
        &self.threads
    }

    pub fn into_threads(self) -> Vec<ReviewThread> {
        self.threads
    }

    /// Thread keyed by `id` (the id of its first member).
    pub fn get(&self, id: CommentId) -> Option<&ReviewThread> {
        self.thread_of(id).filter(|thread| thread.id == id)
    }

    /// Thread containing the comment `member`.
    pub fn thread_of(&self, member: CommentId) -> Option<&ReviewThread> {
        self.by_member.get(&member).map(|&idx| &self.threads[idx])
    }

    /// Threads anchored on `path` at `line`.
    pub fn at(&self, path: &str, line: u32) -> impl Iterator<Item = &ReviewThread> {
        self.threads
            .iter()
            .filter(move |t| t.anchor_path == path && t.anchor_line == Some(line))
    }
}

/// Rebuild reply threads from a flat comment list.
///
/// A parentless comment starts a thread keyed by its own id. A reply joins
/// the thread of its parent in arrival order. A reply whose parent never
/// arrived (deleted, or on a page we did not get) starts a thread of its
/// own.
pub fn build_threads(comments: &[ReviewComment]) -> ThreadMap {
    let mut map = ThreadMap::default();

    for comment in comments {
        if map.by_member.contains_key(&comment.id) {
            log::debug!("skipping duplicate review comment {}", comment.id);
            continue;
        }

        let parent_thread = comment
            .parent_id
            .and_then(|parent| map.by_member.get(&parent).copied());

        let idx = match (comment.parent_id, parent_thread) {
            (Some(_), Some(idx)) => {
                map.threads[idx].members.push(comment.clone());
                idx
            }
            (parent, _) => {
                if let Some(parent) = parent {
                    log::warn!(
                        "review comment {} replies to unknown comment {}; starting a new thread",
                        comment.id,
                        parent
                    );
                }
                map.threads.push(ReviewThread {
                    id: comment.id,
                    members: vec![comment.clone()],
                    anchor_path: String::new(),
                    anchor_line: None,
                });
                map.threads.len() - 1
            }
        };
        map.by_member.insert(comment.id, idx);
    }

    for thread in &mut map.threads {
        let anchor = match thread.members.first() {
            Some(root) if root.parent_id.is_none() => Some(root),
            _ => thread.members.last(),
        };
        if let Some(anchor) = anchor {
            thread.anchor_path = anchor.path.clone();
            thread.anchor_line = anchor.effective_line();
        }
    }

    map
}
