//! Diff view controller: runs `git diff`, keeps the markers for whatever
//! target is currently shown.

use super::inbox::{GatewayResult, Inbox};
use super::staleness::{StalenessGuard, Stamped};
use crate::domain::DiffMarkers;
use crate::infra::diff::collect_markers;
use crate::infra::git::Git;
use crate::infra::process::Gateway;

/// What the view diffs against. None is the working tree.
pub type DiffTarget = Option<String>;

pub struct DiffView {
    gateway: Gateway,
    git: Git,
    /// Lines the presentation layer renders above the diff itself.
    header_lines: usize,
    guard: StalenessGuard<DiffTarget>,
    inbox: Inbox<DiffTarget, GatewayResult>,
    lines: Vec<String>,
    markers: DiffMarkers,
    error: Option<String>,
}

impl DiffView {
    pub fn new(gateway: Gateway, git: Git) -> Self {
        Self {
            gateway,
            git,
            header_lines: 0,
            guard: StalenessGuard::new(),
            inbox: Inbox::new(),
            lines: Vec::new(),
            markers: DiffMarkers::default(),
            error: None,
        }
    }

    pub fn with_header_lines(mut self, header_lines: usize) -> Self {
        self.header_lines = header_lines;
        self
    }

    /// Show `target`, refreshing it if it is already shown. Earlier requests
    /// for other targets are superseded.
    pub fn show(&mut self, target: Option<&str>) {
        let target: DiffTarget = target.map(str::to_string);
        let stamp = self.guard.switch_to(target.clone());
        log::debug!("diff view -> {:?} ({})", target, stamp.generation);
        let request = self.git.diff(target.as_deref());
        self.inbox.dispatch(&self.gateway, request, stamp, |result| result);
    }

    pub fn close(&mut self) {
        self.guard.close();
        self.lines.clear();
        self.markers = DiffMarkers::default();
        self.error = None;
    }

    /// Apply every finished refresh. Returns true if the view changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        while let Some(msg) = self.inbox.try_next() {
            changed |= self.apply(msg);
        }
        changed
    }

    /// Wait for one refresh to finish and apply it. Returns false if it was
    /// stale or nothing was outstanding.
    pub async fn wait_next(&mut self) -> bool {
        match self.inbox.next().await {
            Some(msg) => self.apply(msg),
            None => false,
        }
    }

    pub fn pending(&self) -> usize {
        self.inbox.in_flight()
    }

    fn apply(&mut self, msg: Stamped<DiffTarget, GatewayResult>) -> bool {
        let header_lines = self.header_lines;
        let Some(update) = self.guard.apply(msg, |result| match result {
            Ok(output) if output.success() => {
                let lines: Vec<String> = output.stdout.lines().map(str::to_string).collect();
                let markers = collect_markers(&lines, header_lines);
                Ok((lines, markers))
            }
            Ok(output) => Err(output.diagnostic()),
            Err(err) => Err(err.to_string()),
        }) else {
            return false;
        };

        match update {
            Ok((lines, markers)) => {
                self.lines = lines;
                self.markers = markers;
                self.error = None;
            }
            Err(diagnostic) => {
                log::warn!("git diff failed: {diagnostic}");
                self.lines.clear();
                self.markers = DiffMarkers::default();
                self.error = Some(diagnostic);
            }
        }
        true
    }

    pub fn target(&self) -> Option<&DiffTarget> {
        self.guard.scope()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn markers(&self) -> &DiffMarkers {
        &self.markers
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}
