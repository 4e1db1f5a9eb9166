//! Single-shot shutdown for one running server.
//!
//! Every path that ends a server (Ctrl+C, expiry, the last allowed download,
//! a dying listener) funnels into [`ShutdownCoordinator::trigger`]. The first
//! caller performs the teardown; later callers return immediately and can
//! await [`ShutdownCoordinator::wait`] for the result.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::common::{SharedEventSink, TransferEvent};
use crate::send::session::{SessionId, SessionState};

/// Extra time granted on top of a configured drain cap before teardown
/// proceeds without the listener having confirmed it closed.
const CLOSE_SLACK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    Explicit,
    LimitReached,
    Expired,
    ListenerError(String),
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Explicit => f.write_str("stopped by user"),
            ShutdownReason::LimitReached => f.write_str("download limit reached"),
            ShutdownReason::Expired => f.write_str("share expired"),
            ShutdownReason::ListenerError(err) => write!(f, "listener failed: {err}"),
        }
    }
}

/// Final outcome published once teardown finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Termination {
    pub reason: ShutdownReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Running,
    Stopping,
    Stopped,
}

const RUNNING: u8 = 0;
const STOPPING: u8 = 1;
const STOPPED: u8 = 2;

pub struct ShutdownCoordinator {
    phase: AtomicU8,
    handle: axum_server::Handle,
    session: Option<(SessionState, SessionId)>,
    /// `None` lets transfers past the gate run to completion
    drain_timeout: Option<Duration>,
    events: SharedEventSink,
    /// Cancelled by the serve task once the listener future returned
    listener_closed: CancellationToken,
    /// Parent of every timer and background loop owned by this server
    timers: CancellationToken,
    done: watch::Sender<Option<Termination>>,
}

impl ShutdownCoordinator {
    /// `session` is the send session this server owns, if any. Teardown only
    /// stops that exact session, never one started later.
    pub fn new(
        handle: axum_server::Handle,
        session: Option<(SessionState, SessionId)>,
        drain_timeout: Option<Duration>,
        events: SharedEventSink,
    ) -> Arc<Self> {
        let (done, _) = watch::channel(None);
        Arc::new(Self {
            phase: AtomicU8::new(RUNNING),
            handle,
            session,
            drain_timeout,
            events,
            listener_closed: CancellationToken::new(),
            timers: CancellationToken::new(),
            done,
        })
    }

    pub fn phase(&self) -> Phase {
        match self.phase.load(Ordering::Acquire) {
            RUNNING => Phase::Running,
            STOPPING => Phase::Stopping,
            _ => Phase::Stopped,
        }
    }

    pub fn listener_closed_token(&self) -> CancellationToken {
        self.listener_closed.clone()
    }

    /// Child token for loops that must end when shutdown begins.
    pub fn timers_token(&self) -> CancellationToken {
        self.timers.child_token()
    }

    /// Run teardown if nobody else has. Returns `true` for the caller that
    /// actually performed it.
    pub async fn trigger(&self, reason: ShutdownReason) -> bool {
        if self
            .phase
            .compare_exchange(RUNNING, STOPPING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(%reason, "shutdown already in progress");
            return false;
        }

        tracing::info!(%reason, "shutting down server");
        self.timers.cancel();

        // Stop accepting; open connections keep streaming
        self.handle.graceful_shutdown(self.drain_timeout);
        match self.drain_timeout {
            Some(cap) => {
                let bound = cap + CLOSE_SLACK;
                if tokio::time::timeout(bound, self.listener_closed.cancelled())
                    .await
                    .is_err()
                {
                    tracing::warn!(
                        "listener did not close within {:?}, continuing teardown",
                        bound
                    );
                }
            }
            None => {
                tracing::debug!("waiting for in-flight transfers to finish");
                self.listener_closed.cancelled().await;
            }
        }

        if let Some((state, id)) = &self.session {
            if state.stop_session(*id) {
                tracing::debug!("session resources released");
            }
        }

        self.phase.store(STOPPED, Ordering::Release);

        let termination = Termination { reason };
        self.events
            .emit(TransferEvent::Stopped(termination.clone()));
        self.done.send_replace(Some(termination));
        true
    }

    /// Resolves once teardown completed, immediately if it already has.
    pub async fn wait(&self) -> Termination {
        let mut rx = self.done.subscribe();
        loop {
            if let Some(termination) = rx.borrow_and_update().clone() {
                return termination;
            }
            if rx.changed().await.is_err() {
                // Sender lives in self, so this cannot happen while borrowed
                return Termination {
                    reason: ShutdownReason::Explicit,
                };
            }
        }
    }

    /// Trigger [`ShutdownReason::Expired`] at `deadline`. Past deadlines fire
    /// right away.
    pub fn arm_expiry(self: &Arc<Self>, deadline: SystemTime) {
        let delay = deadline
            .duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO);
        tracing::debug!("share expires in {:?}", delay);
        self.schedule(delay, ShutdownReason::Expired);
    }

    /// Trigger [`ShutdownReason::LimitReached`] after `grace`.
    pub fn schedule_limit_shutdown(self: &Arc<Self>, grace: Duration) {
        tracing::info!("download limit reached, stopping in {:?}", grace);
        self.schedule(grace, ShutdownReason::LimitReached);
    }

    fn schedule(self: &Arc<Self>, delay: Duration, reason: ShutdownReason) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(%reason, "no runtime available, shutdown timer not armed");
            return;
        };
        let token = self.timers_token();
        let coordinator = Arc::clone(self);
        runtime.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    coordinator.trigger(reason).await;
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::events::ChannelEvents;

    fn coordinator() -> (
        Arc<ShutdownCoordinator>,
        tokio::sync::mpsc::UnboundedReceiver<TransferEvent>,
    ) {
        let (sink, rx) = ChannelEvents::new();
        let coordinator = ShutdownCoordinator::new(
            axum_server::Handle::new(),
            None,
            None,
            Arc::new(sink),
        );
        // No listener in these tests
        coordinator.listener_closed_token().cancel();
        (coordinator, rx)
    }

    #[tokio::test]
    async fn second_trigger_is_a_noop() {
        let (coordinator, mut rx) = coordinator();

        assert!(coordinator.trigger(ShutdownReason::Explicit).await);
        assert!(!coordinator.trigger(ShutdownReason::Expired).await);

        assert_eq!(coordinator.phase(), Phase::Stopped);
        assert_eq!(coordinator.wait().await.reason, ShutdownReason::Explicit);

        let stopped: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
            .filter(|e| matches!(e, TransferEvent::Stopped(_)))
            .collect();
        assert_eq!(stopped.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn limit_shutdown_waits_for_grace_period() {
        let (coordinator, _rx) = coordinator();

        coordinator.schedule_limit_shutdown(Duration::from_secs(5));
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(coordinator.phase(), Phase::Running);

        let termination = coordinator.wait().await;
        assert_eq!(termination.reason, ShutdownReason::LimitReached);
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_stop_cancels_pending_expiry() {
        let (coordinator, _rx) = coordinator();

        coordinator.arm_expiry(SystemTime::now() + Duration::from_secs(60));
        assert!(coordinator.trigger(ShutdownReason::Explicit).await);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(coordinator.wait().await.reason, ShutdownReason::Explicit);
    }

    #[tokio::test]
    async fn past_deadline_expires_immediately() {
        let (coordinator, _rx) = coordinator();
        coordinator.arm_expiry(SystemTime::UNIX_EPOCH);

        let termination = tokio::time::timeout(Duration::from_secs(5), coordinator.wait())
            .await
            .expect("expiry fires");
        assert_eq!(termination.reason, ShutdownReason::Expired);
    }

    #[test]
    fn reasons_render_for_humans() {
        assert_eq!(
            ShutdownReason::ListenerError("addr in use".into()).to_string(),
            "listener failed: addr in use"
        );
        assert_eq!(ShutdownReason::LimitReached.to_string(), "download limit reached");
    }
}
