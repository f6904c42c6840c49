//! Completion channel shared by the workflow controllers.
//!
//! Gateway callbacks run on the runtime and only push stamped results in
//! here. The owning controller drains them on its own logical thread, so
//! applying a result never races with another application.

use super::staleness::{Stamp, Stamped};
use crate::domain::GatewayError;
use crate::infra::process::{CommandRequest, CommandResult, Gateway};
use tokio::sync::mpsc;

pub type GatewayResult = Result<CommandResult, GatewayError>;

pub(crate) struct Inbox<S, T> {
    tx: mpsc::UnboundedSender<Stamped<S, T>>,
    rx: mpsc::UnboundedReceiver<Stamped<S, T>>,
    in_flight: usize,
}

impl<S, T> Inbox<S, T>
where
    S: Send + 'static,
    T: Send + 'static,
{
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx,
            in_flight: 0,
        }
    }

    /// Submit `request` and deliver `wrap(result)` under `stamp` once it
    /// finishes.
    pub fn dispatch<F>(&mut self, gateway: &Gateway, request: CommandRequest, stamp: Stamp<S>, wrap: F)
    where
        F: FnOnce(GatewayResult) -> T + Send + 'static,
    {
        self.in_flight += 1;
        let tx = self.tx.clone();
        gateway.submit(request, move |result| {
            // The receiver lives as long as the controller; a send error
            // only means the controller is gone.
            let _ = tx.send(Stamped::new(stamp, wrap(result)));
        });
    }

    /// Next finished result, if one is already waiting.
    pub fn try_next(&mut self) -> Option<Stamped<S, T>> {
        let msg = self.rx.try_recv().ok()?;
        self.in_flight = self.in_flight.saturating_sub(1);
        Some(msg)
    }

    /// Wait for the next result. Returns None straight away when nothing is
    /// outstanding.
    pub async fn next(&mut self) -> Option<Stamped<S, T>> {
        if self.in_flight == 0 {
            return None;
        }
        let msg = self.rx.recv().await?;
        self.in_flight -= 1;
        Some(msg)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::staleness::StalenessGuard;
    use crate::infra::process::ScriptedHost;

    #[tokio::test]
    async fn test_next_returns_none_when_idle() {
        let mut inbox: Inbox<(), GatewayResult> = Inbox::new();
        assert!(inbox.next().await.is_none());
        assert!(inbox.try_next().is_none());
    }

    #[tokio::test]
    async fn test_dispatch_counts_in_flight() {
        let host = ScriptedHost::new();
        host.respond(&["status"], CommandResult::ok("clean"));
        let gateway = Gateway::new(host);
        let mut guard = StalenessGuard::new();
        let mut inbox = Inbox::new();

        let stamp = guard.open(());
        inbox.dispatch(
            &gateway,
            CommandRequest::new("git", ["status"]),
            stamp,
            |result| result.map(|r| r.stdout),
        );
        assert_eq!(inbox.in_flight(), 1);

        let msg = inbox.next().await.unwrap();
        assert_eq!(inbox.in_flight(), 0);
        assert!(guard.accepts(&msg.stamp));
        assert_eq!(msg.value.unwrap(), "clean");
    }
}
