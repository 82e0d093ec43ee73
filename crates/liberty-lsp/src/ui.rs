//! The UI-affinity thread.
//!
//! Annotations may only be applied on the host's UI thread. Background code
//! never touches it directly: it hands a closure to a [`UiExecutor`], which
//! queues it for the thread that owns the matching [`UiThread`].
//!
//! The owning thread is flagged while it runs queued tasks, so code that
//! must not block the UI (the join stage) can refuse to run there.

use std::cell::Cell;
use tokio::sync::mpsc;

/// Work queued for the UI thread.
pub type UiTask = Box<dyn FnOnce() + Send + 'static>;

/// Schedules work onto the UI thread.
pub trait UiExecutor: Send + Sync {
    /// Queues `task` to run later on the UI thread.
    fn invoke_later(&self, task: UiTask);
}

thread_local! {
    static ON_UI_THREAD: Cell<bool> = const { Cell::new(false) };
}

/// Returns true while the current thread is running UI tasks.
pub fn is_ui_thread() -> bool {
    ON_UI_THREAD.with(Cell::get)
}

/// Marks the current thread as the UI thread until dropped.
struct UiGuard {
    previous: bool,
}

impl UiGuard {
    fn enter() -> Self {
        Self {
            previous: ON_UI_THREAD.with(|flag| flag.replace(true)),
        }
    }
}

impl Drop for UiGuard {
    fn drop(&mut self) {
        ON_UI_THREAD.with(|flag| flag.set(self.previous));
    }
}

/// Sending half: cheap to clone, usable from any thread.
#[derive(Clone)]
pub struct UiHandle {
    sender: mpsc::UnboundedSender<UiTask>,
}

impl UiExecutor for UiHandle {
    fn invoke_later(&self, task: UiTask) {
        if self.sender.send(task).is_err() {
            tracing::warn!("UI thread is gone, dropping task");
        }
    }
}

/// Receiving half, owned by the UI thread.
pub struct UiThread {
    receiver: mpsc::UnboundedReceiver<UiTask>,
}

/// Creates a connected executor/thread pair.
pub fn channel() -> (UiHandle, UiThread) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (UiHandle { sender }, UiThread { receiver })
}

impl UiThread {
    /// Runs every task queued so far and returns how many ran.
    ///
    /// For hosts that pump the queue from their own event loop.
    pub fn run_pending(&mut self) -> usize {
        let _guard = UiGuard::enter();
        let mut ran = 0;
        while let Ok(task) = self.receiver.try_recv() {
            task();
            ran += 1;
        }
        ran
    }

    /// Runs tasks until every [`UiHandle`] has been dropped.
    ///
    /// Blocks the calling thread; never call it from an async task.
    pub fn run_blocking(mut self) {
        let _guard = UiGuard::enter();
        while let Some(task) = self.receiver.blocking_recv() {
            task();
        }
    }

    /// Moves the queue onto a dedicated OS thread named `ui`.
    pub fn spawn(self) -> std::io::Result<std::thread::JoinHandle<()>> {
        std::thread::Builder::new()
            .name("ui".to_string())
            .spawn(move || self.run_blocking())
    }
}
