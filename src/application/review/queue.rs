use crate::domain::{DiffSide, LineAnchor, PendingComment};
use serde::Serialize;

/// A pending comment with the local id it was queued under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueuedComment {
    pub id: u64,
    pub comment: PendingComment,
}

/// Locally composed comments, in the order they were written, waiting to be
/// submitted as one review.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReviewQueue {
    items: Vec<QueuedComment>,
    #[serde(skip)]
    next_id: u64,
}

impl ReviewQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, comment: PendingComment) -> u64 {
        self.next_id += 1;
        self.items.push(QueuedComment {
            id: self.next_id,
            comment,
        });
        self.next_id
    }

    /// Queue a comment on the line under `anchor`. Added and context lines
    /// go on the new side, deleted lines on the old side.
    pub fn push_at(&mut self, anchor: &LineAnchor, body: impl Into<String>) -> Option<u64> {
        let (line, side) = match (anchor.context.new_line, anchor.context.old_line) {
            (Some(line), _) => (line, DiffSide::Right),
            (None, Some(line)) => (line, DiffSide::Left),
            (None, None) => return None,
        };
        Some(self.push(PendingComment {
            path: anchor.path.clone(),
            line,
            side,
            body: body.into(),
        }))
    }

    pub fn remove(&mut self, id: u64) -> Option<PendingComment> {
        let pos = self.items.iter().position(|item| item.id == id)?;
        Some(self.items.remove(pos).comment)
    }

    pub fn items(&self) -> &[QueuedComment] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Ids and comments of everything queued right now, for one submission.
    pub fn batch(&self) -> (Vec<u64>, Vec<PendingComment>) {
        self.items
            .iter()
            .map(|item| (item.id, item.comment.clone()))
            .unzip()
    }

    /// Drop the comments a successful submission carried. Anything queued
    /// after the batch was taken stays.
    pub fn clear_submitted(&mut self, ids: &[u64]) {
        self.items.retain(|item| !ids.contains(&item.id));
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}
