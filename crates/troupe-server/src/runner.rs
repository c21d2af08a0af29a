//! Background conversation runs.
//!
//! At most one run is active per server. The run owns a child of the
//! shutdown token, so stopping the server also stops the run between rounds.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use troupe_runtime::{AutoSkip, RunSummary, SessionHandle};

use crate::error::ApiError;

struct ActiveRun {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Slot holding the single background run and the last finished summary.
#[derive(Default)]
pub struct RunSlot {
    active: Mutex<Option<ActiveRun>>,
    last: Arc<Mutex<Option<RunSummary>>>,
}

impl RunSlot {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a run is in progress.
    pub fn is_running(&self) -> bool {
        self.active
            .lock()
            .as_ref()
            .is_some_and(|run| !run.handle.is_finished())
    }

    /// Summary of the most recently finished run.
    pub fn last_summary(&self) -> Option<RunSummary> {
        self.last.lock().clone()
    }

    /// Spawn `rounds` unattended rounds on `session`.
    ///
    /// Fails with [`ApiError::Busy`] while another run is active.
    pub fn start(
        &self,
        session: SessionHandle,
        rounds: u32,
        parent: &CancellationToken,
    ) -> Result<(), ApiError> {
        let mut active = self.active.lock();
        if active.as_ref().is_some_and(|run| !run.handle.is_finished()) {
            return Err(ApiError::Busy);
        }

        let cancel = parent.child_token();
        let token = cancel.clone();
        let last = Arc::clone(&self.last);
        let handle = tokio::spawn(async move {
            let mut input = AutoSkip;
            match session.run_rounds(rounds, &mut input, &token).await {
                Ok(summary) => *last.lock() = Some(summary),
                Err(error) => warn!(category = error.category(), %error, "background run failed"),
            }
        });
        info!(rounds, "background run started");
        *active = Some(ActiveRun { cancel, handle });
        Ok(())
    }

    /// Ask the active run to stop after its current round.
    ///
    /// Returns whether a run was active.
    pub fn stop(&self) -> bool {
        let active = self.active.lock();
        match active.as_ref() {
            Some(run) if !run.handle.is_finished() => {
                run.cancel.cancel();
                info!("background run stop requested");
                true
            }
            _ => false,
        }
    }

    /// Take the run's join handle so shutdown can wait on it.
    pub fn take_handle(&self) -> Option<JoinHandle<()>> {
        self.active.lock().take().map(|run| run.handle)
    }
}
