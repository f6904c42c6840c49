//! fetch -> pull -> ahead check -> push.

use super::inbox::{GatewayResult, Inbox};
use super::staleness::{StalenessGuard, Stamped};
use crate::domain::{StepOutcome, SyncError, SyncOutcome, SyncStep, SyncStepKind};
use crate::infra::app_config::AppConfig;
use crate::infra::git::{Git, parse_count};
use crate::infra::process::{CommandRequest, CommandResult, Gateway};

/// Phrases in a failed pull that mean it stopped on conflicts rather than
/// failing outright. Matched as git prints them, so a path that merely
/// contains "conflict" does not count.
pub const CONFLICT_MARKERS: &[&str] = &[
    "CONFLICT (",
    "Merge conflict in",
    "Automatic merge failed",
    "could not apply",
    "you have unmerged files",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    pub remote: String,
    /// Branch to pull and push; the current branch's upstream when None.
    pub branch: Option<String>,
    pub pull_rebase: bool,
    pub extra_conflict_markers: Vec<String>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
            branch: None,
            pull_rebase: false,
            extra_conflict_markers: Vec::new(),
        }
    }
}

impl From<&AppConfig> for SyncOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            remote: config.remote.clone(),
            branch: None,
            pull_rebase: config.pull_rebase,
            extra_conflict_markers: config.extra_conflict_markers.clone(),
        }
    }
}

/// One run of the pipeline. Steps run strictly in order; the first failure
/// or conflict ends the run.
#[derive(Debug, Clone)]
pub struct SyncPipeline {
    git: Git,
    options: SyncOptions,
    next: Option<SyncStepKind>,
    steps: Vec<SyncStep>,
    ahead: u32,
    outcome: Option<SyncOutcome>,
}

impl SyncPipeline {
    pub fn new(git: Git, options: SyncOptions) -> Self {
        Self {
            git,
            options,
            next: Some(SyncStepKind::Fetch),
            steps: Vec::new(),
            ahead: 0,
            outcome: None,
        }
    }

    /// Step that runs next, or None once the pipeline has finished.
    pub fn pending_step(&self) -> Option<SyncStepKind> {
        self.next
    }

    pub fn request_for(&self, kind: SyncStepKind) -> CommandRequest {
        let remote = self.options.remote.as_str();
        let branch = self.options.branch.as_deref();
        match kind {
            SyncStepKind::Fetch => self.git.fetch(remote),
            SyncStepKind::Pull => self.git.pull(remote, branch, self.options.pull_rebase),
            SyncStepKind::AheadCheck => self.git.ahead_count(),
            SyncStepKind::Push => self.git.push(remote, branch),
        }
    }

    /// Run the next step. Errors with [`SyncError::Finished`] once there is
    /// nothing left to run. A step whose process could not be started is
    /// recorded as failed before the error is returned.
    pub async fn advance(&mut self, gateway: &Gateway) -> Result<Vec<SyncStep>, SyncError> {
        let kind = self.next.ok_or(SyncError::Finished)?;
        match gateway.run(self.request_for(kind)).await {
            Ok(output) => Ok(self.record_result(kind, Ok(output))),
            Err(err) => {
                self.fail(kind, err.to_string());
                Err(err.into())
            }
        }
    }

    /// Drive the pipeline to the end, reporting every step as it lands.
    pub async fn run(
        &mut self,
        gateway: &Gateway,
        mut on_step: impl FnMut(&SyncStep),
    ) -> SyncOutcome {
        while self.next.is_some() {
            match self.advance(gateway).await {
                Ok(steps) => steps.iter().for_each(&mut on_step),
                Err(_) => {
                    if let Some(step) = self.steps.last() {
                        on_step(step);
                    }
                    break;
                }
            }
        }
        self.outcome.clone().unwrap_or(SyncOutcome::UpToDate)
    }

    /// Record the result of `kind` and decide what runs next. Returns the
    /// steps this produced: usually one, two when a skipped push is recorded
    /// along with the ahead check.
    pub fn record_result(&mut self, kind: SyncStepKind, result: GatewayResult) -> Vec<SyncStep> {
        if self.next != Some(kind) {
            log::debug!("ignoring {kind} result; pipeline expects {:?}", self.next);
            return Vec::new();
        }

        let output = match result {
            Ok(output) => output,
            Err(err) => return self.fail(kind, err.to_string()),
        };

        match kind {
            SyncStepKind::Fetch | SyncStepKind::Push if !output.success() => {
                self.fail(kind, output.diagnostic())
            }
            SyncStepKind::Pull if !output.success() => {
                if self.is_conflict(&output) {
                    let diagnostic = full_output(&output);
                    self.stop(
                        kind,
                        StepOutcome::Conflict {
                            diagnostic: diagnostic.clone(),
                        },
                        SyncOutcome::Conflict { diagnostic },
                    )
                } else {
                    self.fail(kind, output.diagnostic())
                }
            }
            SyncStepKind::AheadCheck => {
                let count = if output.success() {
                    parse_count(&output.stdout)
                } else {
                    None
                };
                let resolved = count.is_some();
                let count = count.unwrap_or(0);
                self.ahead = count;
                let check = self.push_step(kind, StepOutcome::Ahead { resolved, count });

                if resolved && count > 0 {
                    self.next = kind.next();
                    vec![check]
                } else {
                    if !resolved {
                        log::warn!("could not count unpushed commits: {}", output.diagnostic());
                    }
                    let skipped = self.stop(
                        SyncStepKind::Push,
                        StepOutcome::Skipped,
                        SyncOutcome::UpToDate,
                    );
                    std::iter::once(check).chain(skipped).collect()
                }
            }
            SyncStepKind::Push => {
                let commits = self.ahead;
                self.stop(
                    kind,
                    StepOutcome::Succeeded,
                    SyncOutcome::Pushed { commits },
                )
            }
            SyncStepKind::Fetch | SyncStepKind::Pull => {
                self.next = kind.next();
                vec![self.push_step(kind, StepOutcome::Succeeded)]
            }
        }
    }

    fn is_conflict(&self, output: &CommandResult) -> bool {
        let combined = output.combined_output();
        CONFLICT_MARKERS
            .iter()
            .copied()
            .chain(self.options.extra_conflict_markers.iter().map(String::as_str))
            .any(|marker| combined.contains(marker))
    }

    fn push_step(&mut self, kind: SyncStepKind, outcome: StepOutcome) -> SyncStep {
        let step = SyncStep { kind, outcome };
        self.steps.push(step.clone());
        step
    }

    fn fail(&mut self, kind: SyncStepKind, diagnostic: String) -> Vec<SyncStep> {
        self.stop(
            kind,
            StepOutcome::Failed {
                diagnostic: diagnostic.clone(),
            },
            SyncOutcome::Failed {
                step: kind,
                diagnostic,
            },
        )
    }

    fn stop(&mut self, kind: SyncStepKind, outcome: StepOutcome, overall: SyncOutcome) -> Vec<SyncStep> {
        if !matches!(outcome, StepOutcome::Succeeded | StepOutcome::Skipped) {
            log::warn!("sync stopped at {kind}: {outcome:?}");
        }
        let step = self.push_step(kind, outcome);
        self.next = None;
        self.outcome = Some(overall);
        vec![step]
    }

    pub fn steps(&self) -> &[SyncStep] {
        &self.steps
    }

    pub fn outcome(&self) -> Option<&SyncOutcome> {
        self.outcome.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.next.is_none()
    }
}

/// Conflict reports are split across both streams; keep all of it.
fn full_output(output: &CommandResult) -> String {
    [output.stdout.trim_end(), output.stderr.trim_end()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Runs the pipeline for one branch without blocking the caller. Switching
/// branch or closing drops whatever the previous run still reports.
pub struct SyncSession {
    gateway: Gateway,
    git: Git,
    options: SyncOptions,
    guard: StalenessGuard<String>,
    inbox: Inbox<String, (SyncStepKind, GatewayResult)>,
    pipeline: Option<SyncPipeline>,
}

impl SyncSession {
    pub fn new(gateway: Gateway, git: Git, options: SyncOptions) -> Self {
        Self {
            gateway,
            git,
            options,
            guard: StalenessGuard::new(),
            inbox: Inbox::new(),
            pipeline: None,
        }
    }

    /// Start a fresh run for `branch`.
    pub fn start(&mut self, branch: &str) {
        self.guard.open(branch.to_string());
        log::info!("sync {branch} with {}", self.options.remote);
        let options = SyncOptions {
            branch: Some(branch.to_string()),
            ..self.options.clone()
        };
        self.pipeline = Some(SyncPipeline::new(self.git.clone(), options));
        self.dispatch_next();
    }

    pub fn close(&mut self) {
        self.guard.close();
        self.pipeline = None;
    }

    fn dispatch_next(&mut self) {
        let (Some(pipeline), Some(stamp)) = (&self.pipeline, self.guard.stamp()) else {
            return;
        };
        let Some(kind) = pipeline.pending_step() else {
            return;
        };
        let request = pipeline.request_for(kind);
        self.inbox
            .dispatch(&self.gateway, request, stamp, move |result| (kind, result));
    }

    pub fn poll(&mut self) -> Vec<SyncStep> {
        let mut steps = Vec::new();
        while let Some(msg) = self.inbox.try_next() {
            steps.extend(self.apply(msg));
        }
        steps
    }

    /// Wait for the step in flight and apply it. Empty when nothing is
    /// running or the result was stale.
    pub async fn wait_next(&mut self) -> Vec<SyncStep> {
        match self.inbox.next().await {
            Some(msg) => self.apply(msg),
            None => Vec::new(),
        }
    }

    fn apply(&mut self, msg: Stamped<String, (SyncStepKind, GatewayResult)>) -> Vec<SyncStep> {
        let Some((kind, result)) = self.guard.apply(msg, |value| value) else {
            return Vec::new();
        };
        let Some(pipeline) = self.pipeline.as_mut() else {
            return Vec::new();
        };
        let steps = pipeline.record_result(kind, result);
        self.dispatch_next();
        steps
    }

    pub fn branch(&self) -> Option<&str> {
        self.guard.scope().map(String::as_str)
    }

    pub fn pipeline(&self) -> Option<&SyncPipeline> {
        self.pipeline.as_ref()
    }

    pub fn outcome(&self) -> Option<&SyncOutcome> {
        self.pipeline.as_ref().and_then(SyncPipeline::outcome)
    }
}
