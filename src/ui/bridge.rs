// Channels into the consumer context
//
// Two handoffs cross into the single consumer:
// 1. Engine thread -> NotificationChannel (polled on a fixed interval)
// 2. Import wake callbacks and import workers -> UiEvent channel
//
// Neither side ever blocks the sender. Everything the consumer receives is
// applied to view state on the consumer alone.

use crate::models::{Envelope, ErrorReport};
use crate::services::deferred_queue::WakeError;
use crate::services::import::{ImportObserver, ImportProgress};
use thiserror::Error;
use tokio::sync::mpsc;

/// Returned by [`NotificationSender::push`] once the consumer is gone
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("notification consumer has stopped")]
pub struct ChannelClosed;

/// Create the engine-to-consumer notification channel
///
/// The channel is unbounded so the engine thread never waits on the UI.
pub fn notification_channel() -> (NotificationSender, NotificationReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (NotificationSender { tx }, NotificationReceiver { rx })
}

/// Engine side of the notification channel
#[derive(Clone)]
pub struct NotificationSender {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl NotificationSender {
    pub fn push(&self, envelope: Envelope) -> Result<(), ChannelClosed> {
        self.tx.send(envelope).map_err(|_| ChannelClosed)
    }
}

/// Consumer side of the notification channel
///
/// Not `Clone`, and `poll` takes `&mut self`, so only one context can ever
/// consume.
pub struct NotificationReceiver {
    rx: mpsc::UnboundedReceiver<Envelope>,
}

impl NotificationReceiver {
    /// Oldest undelivered envelope, or `None` when nothing is pending.
    /// Never blocks.
    pub fn poll(&mut self) -> Option<Envelope> {
        self.rx.try_recv().ok()
    }
}

/// Signals delivered to the consumer loop from outside the notification path
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    /// The file import queue has items
    WakeFiles,

    /// The link import queue has items
    WakeLinks,

    ImportProgress(ImportProgress),

    ImportFailed(ErrorReport),
}

/// Create the channel that carries [`UiEvent`]s to the consumer loop
pub fn ui_event_channel() -> (UiEventSender, mpsc::UnboundedReceiver<UiEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (UiEventSender { tx }, rx)
}

/// Cloneable sender for [`UiEvent`]s, usable from any thread
#[derive(Clone)]
pub struct UiEventSender {
    tx: mpsc::UnboundedSender<UiEvent>,
}

impl UiEventSender {
    /// Send an event, failing when the consumer loop has not started or has
    /// already stopped.
    pub fn send(&self, event: UiEvent) -> Result<(), WakeError> {
        self.tx
            .send(event)
            .map_err(|e| WakeError(format!("consumer loop stopped, dropped {:?}", e.0)))
    }

    /// Wake callback for a [`DeferredQueue`](crate::services::DeferredQueue)
    pub fn waker(&self, event: UiEvent) -> impl Fn() -> Result<(), WakeError> + Send + Sync + 'static {
        let sender = self.clone();
        move || sender.send(event.clone())
    }
}

impl ImportObserver for UiEventSender {
    fn progress(&self, progress: ImportProgress) {
        if let Err(e) = self.send(UiEvent::ImportProgress(progress)) {
            tracing::debug!("Dropping import progress: {}", e);
        }
    }

    fn failed(&self, report: ErrorReport) {
        if let Err(e) = self.send(UiEvent::ImportFailed(report)) {
            tracing::warn!("Failed to forward import error: {}", e);
        }
    }
}
