//! Event system for editor and diagnostics notifications.
//!
//! Events are values broadcast over `tokio::sync::broadcast`: the annotator,
//! tests and the driver binary subscribe independently, and a slow
//! subscriber only lags itself.

use crate::document::DocumentId;
use crate::editor::EditorId;
use tokio::sync::broadcast;

/// Events that can occur in the workbench.
#[derive(Debug, Clone)]
pub enum EditorEvent {
    // Editor lifecycle
    /// An editor was opened
    EditorOpened(EditorId),
    /// An editor was closed
    EditorClosed(EditorId),

    // Document events
    /// A document's content changed
    DocumentChanged(DocumentId),

    // Language server events
    /// A server published a fresh diagnostics batch for a document
    DiagnosticsPublished {
        /// Document URI as sent by the server
        uri: String,
        /// Server definition id
        server: String,
    },
    /// A render pass replaced an editor's annotations
    AnnotationsApplied {
        /// Editor that was annotated
        editor: EditorId,
        /// Number of annotations now shown
        count: usize,
    },
}

/// Event bus for broadcasting events.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EditorEvent>,
}

impl EventBus {
    /// Creates a new event bus.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }

    /// Emits an event to all subscribers.
    pub fn emit(&self, event: EditorEvent) {
        // No receivers is fine
        let _ = self.sender.send(event);
    }

    /// Subscribes to events.
    ///
    /// Returns a receiver that will get all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<EditorEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper for processing events asynchronously.
///
/// ## Example
///
/// ```ignore
/// let mut handler = EventHandler::new(bus.subscribe());
///
/// tokio::spawn(async move {
///     while let Some(event) = handler.next().await {
///         if let EditorEvent::AnnotationsApplied { editor, count } = event {
///             tracing::info!(%editor, count, "annotated");
///         }
///     }
/// });
/// ```
pub struct EventHandler {
    receiver: broadcast::Receiver<EditorEvent>,
}

impl EventHandler {
    /// Creates a new event handler.
    pub fn new(receiver: broadcast::Receiver<EditorEvent>) -> Self {
        Self { receiver }
    }

    /// Waits for the next event.
    pub async fn next(&mut self) -> Option<EditorEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Event handler lagged, missed {} events", n);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
