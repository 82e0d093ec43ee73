//! Bounded wait for dispatched requests.
//!
//! A single deadline covers the whole batch. When it passes, the stage
//! returns with whatever has resolved; the remaining tasks keep running
//! detached and write into slots nobody reads anymore.

use futures::future::join_all;
use std::time::Duration;

use crate::dispatch::PendingRequest;
use crate::ui::is_ui_thread;
use crate::{LspError, LspResult};

/// How the wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Every request finished before the deadline
    Completed,
    /// The deadline passed with requests still outstanding
    TimedOut {
        /// Requests without a result at the deadline
        outstanding: usize,
    },
}

/// Waits for all `pending` requests, at most `deadline`.
///
/// A task that panicked counts as finished with no actions. Refuses to run
/// on the UI thread.
pub async fn join(pending: Vec<PendingRequest>, deadline: Duration) -> LspResult<JoinOutcome> {
    if is_ui_thread() {
        return Err(LspError::JoinOnUiThread);
    }

    let total = pending.len();
    let slots: Vec<_> = pending.iter().map(|p| p.slot.clone()).collect();

    let waits = pending.into_iter().map(|request| async move {
        if let Err(e) = request.handle.await {
            tracing::warn!("code action task failed: {}", e);
            let _ = request.slot.set(Vec::new());
        }
    });

    match tokio::time::timeout(deadline, join_all(waits)).await {
        Ok(_) => Ok(JoinOutcome::Completed),
        Err(_) => {
            let outstanding = slots.iter().filter(|slot| slot.get().is_none()).count();
            tracing::warn!(
                total,
                outstanding,
                "code action requests timed out after {:?}",
                deadline
            );
            Ok(JoinOutcome::TimedOut { outstanding })
        }
    }
}
