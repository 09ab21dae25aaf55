//! Back-to-back call handling on one channel.

use tracing::{info, warn};

use crate::{
    channel::ModemChannel,
    error::ModemResult,
    player::AudioPlayer,
    session::{CallSession, SessionConfig, SessionReport, StopReason},
};

/// Why [`Monitor::run`] returned normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorExit {
    /// Single-call mode and a call was handled.
    CallHandled,
    /// The session stopped before a ring arrived.
    Stopped(StopReason),
}

/// Runs sessions one after another until told to stop.
///
/// After each call the monitor goes back to waiting for the next ring. A
/// channel failure that leaves the device unusable ends the loop with that
/// error so the caller can reopen the port; any other failure is logged and
/// the monitor keeps listening.
#[derive(Debug)]
pub struct Monitor<C, P> {
    session: CallSession<C, P>,
    once: bool,
    calls: u64,
}

impl<C, P> Monitor<C, P> {
    /// Wrap an initialized session controller.
    pub fn new(session: CallSession<C, P>) -> Self {
        Self {
            session,
            once: false,
            calls: 0,
        }
    }

    /// Stop after the first answered call.
    pub fn once(mut self, once: bool) -> Self {
        self.once = once;
        self
    }

    /// Number of calls answered so far.
    pub fn calls_handled(&self) -> u64 {
        self.calls
    }

    /// Borrow the wrapped controller.
    pub fn session(&self) -> &CallSession<C, P> {
        &self.session
    }

    /// Give back the wrapped controller.
    pub fn into_session(self) -> CallSession<C, P> {
        self.session
    }
}

impl<C: ModemChannel, P: AudioPlayer> Monitor<C, P> {
    /// Handle calls with `config`, passing each session's report to
    /// `on_report` before deciding whether to continue.
    pub async fn run(
        &mut self,
        config: &SessionConfig,
        mut on_report: impl FnMut(&SessionReport),
    ) -> ModemResult<MonitorExit> {
        loop {
            let mut report = self
                .session
                .start(config.clone())
                .await;
            on_report(&report);

            if report.answered() {
                self.calls += 1;
                info!("[SESSION] Calls handled: {}", self.calls);
            }

            if let Some(err) = report.take_channel_error() {
                if err.is_channel_fatal() {
                    return Err(err);
                }
                warn!("[SESSION] Call failed, waiting for the next ring: {}", err);
            }

            if let Some(reason) = report.stop_reason() {
                return Ok(MonitorExit::Stopped(reason));
            }
            if self.session.shutdown_requested() {
                return Ok(MonitorExit::Stopped(StopReason::Shutdown));
            }
            if self.once && report.answered() {
                return Ok(MonitorExit::CallHandled);
            }
        }
    }
}
