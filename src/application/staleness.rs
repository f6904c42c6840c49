//! Generation tokens that keep overlapping async results consistent.
//!
//! A request captures a [`Stamp`] when it is issued. When its result comes
//! back, the owner applies it only if the stamp still matches the guard:
//! switching scope, closing the session, or invalidating all bump the
//! generation and turn every outstanding stamp stale. Stale results are
//! dropped without error. Nothing is cancelled; the process simply finishes
//! and its output is ignored.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Default)]
pub struct Generation(u64);

impl Generation {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// Scope and generation captured when a request was issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stamp<S> {
    pub scope: S,
    pub generation: Generation,
}

/// A result travelling back to its owner together with its stamp.
#[derive(Debug)]
pub struct Stamped<S, T> {
    pub stamp: Stamp<S>,
    pub value: T,
}

impl<S, T> Stamped<S, T> {
    pub fn new(stamp: Stamp<S>, value: T) -> Self {
        Self { stamp, value }
    }
}

/// Tracks the current scope of a view or session and its generation.
#[derive(Debug, Clone)]
pub struct StalenessGuard<S> {
    scope: Option<S>,
    generation: Generation,
}

impl<S> Default for StalenessGuard<S> {
    fn default() -> Self {
        Self {
            scope: None,
            generation: Generation::default(),
        }
    }
}

impl<S: Clone + PartialEq + fmt::Debug> StalenessGuard<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fresh session on `scope`. Always bumps the generation, so a
    /// session reopened on the same scope never accepts results from the
    /// previous one.
    pub fn open(&mut self, scope: S) -> Stamp<S> {
        self.bump();
        self.scope = Some(scope.clone());
        Stamp {
            scope,
            generation: self.generation,
        }
    }

    /// Point the guard at `scope`. Bumps only when the scope changes or the
    /// guard was closed.
    pub fn switch_to(&mut self, scope: S) -> Stamp<S> {
        if self.scope.as_ref() != Some(&scope) {
            return self.open(scope);
        }
        Stamp {
            scope,
            generation: self.generation,
        }
    }

    /// End the current scope. Every outstanding stamp becomes stale.
    pub fn close(&mut self) {
        if self.scope.take().is_some() {
            log::debug!("closed scope at {}", self.generation);
        }
        self.bump();
    }

    /// Keep the scope but supersede everything issued so far.
    pub fn invalidate(&mut self) -> Option<Stamp<S>> {
        self.bump();
        self.stamp()
    }

    /// Stamp for a request issued now; None while closed.
    pub fn stamp(&self) -> Option<Stamp<S>> {
        self.scope.clone().map(|scope| Stamp {
            scope,
            generation: self.generation,
        })
    }

    pub fn is_open(&self) -> bool {
        self.scope.is_some()
    }

    pub fn scope(&self) -> Option<&S> {
        self.scope.as_ref()
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn accepts(&self, stamp: &Stamp<S>) -> bool {
        self.scope.as_ref() == Some(&stamp.scope) && self.generation == stamp.generation
    }

    /// Run `apply` on the value if its stamp is still current. Returns None
    /// (and drops the value) otherwise.
    pub fn apply<T, R>(&self, stamped: Stamped<S, T>, apply: impl FnOnce(T) -> R) -> Option<R> {
        if self.accepts(&stamped.stamp) {
            Some(apply(stamped.value))
        } else {
            log::debug!(
                "discarding stale result for {:?} ({}; current {})",
                stamped.stamp.scope,
                stamped.stamp.generation,
                self.generation
            );
            None
        }
    }

    fn bump(&mut self) {
        self.generation = Generation(self.generation.0 + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_switch_invalidates_previous_stamp() {
        let mut guard = StalenessGuard::new();
        let on_a = guard.switch_to("feature-a".to_string());
        assert!(guard.accepts(&on_a));

        let on_b = guard.switch_to("feature-b".to_string());
        assert!(!guard.accepts(&on_a));
        assert!(guard.accepts(&on_b));
    }

    #[test]
    fn test_switch_to_same_scope_keeps_generation() {
        let mut guard = StalenessGuard::new();
        let first = guard.switch_to("main");
        let second = guard.switch_to("main");
        assert_eq!(first, second);
        assert!(guard.accepts(&first));
    }

    #[test]
    fn test_close_invalidates_and_blocks_new_stamps() {
        let mut guard = StalenessGuard::new();
        let stamp = guard.open(());
        guard.close();

        assert!(!guard.accepts(&stamp));
        assert!(guard.stamp().is_none());
        assert!(!guard.is_open());
    }

    #[test]
    fn test_reopen_same_scope_rejects_old_session() {
        let mut guard = StalenessGuard::new();
        let old = guard.open(());
        guard.close();
        let new = guard.open(());

        assert!(!guard.accepts(&old));
        assert!(guard.accepts(&new));
    }

    #[test]
    fn test_out_of_order_completion_keeps_later_scope() {
        let mut guard = StalenessGuard::new();
        let mut shown: Option<&str> = None;

        let first = guard.switch_to("branch-a");
        let second = guard.switch_to("branch-b");

        // branch-b's result arrives first, branch-a's straggles in after.
        guard.apply(Stamped::new(second, "diff for b"), |v| shown = Some(v));
        guard.apply(Stamped::new(first, "diff for a"), |v| shown = Some(v));

        assert_eq!(shown, Some("diff for b"));
    }

    #[test]
    fn test_invalidate_supersedes_same_scope() {
        let mut guard = StalenessGuard::new();
        let older = guard.switch_to(7u32);
        let newer = guard.invalidate().unwrap();

        assert!(guard.apply(Stamped::new(older, ()), |_| ()).is_none());
        assert!(guard.apply(Stamped::new(newer, ()), |_| ()).is_some());
    }
}
