// Best-effort observer sink.
//
// An external observer (a dashboard, a tray icon, a test harness) can
// subscribe to engine events over a bounded channel. Emission never
// blocks the worker and never fails it: a missing subscriber or a full
// channel silently drops the event.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::decision::Verdict;

/// Events the engine emits as it works.
#[derive(Debug, Clone)]
pub enum Event {
    /// Free-form operator log line.
    Log(String),
    /// Lifecycle state changed ("STARTING", "RUNNING", ...).
    Status(&'static str),
    /// A comment completed analysis.
    CommentAnalyzed {
        comment_id: String,
        verdict: Verdict,
    },
    /// A comment was removed (live mode).
    CommentRemoved {
        comment_id: String,
        permalink: String,
    },
    /// A comment was kept.
    CommentApproved { comment_id: String },
    /// Safe mode intercepted a removal.
    WouldRemove { comment_id: String },
    /// A rate limit was hit and backoff applied.
    RateLimitHit { context: String, delay: Duration },
}

/// Handle the engine emits through. Cheap to clone; a `Notifier` without
/// a subscriber is a no-op.
#[derive(Clone, Default)]
pub struct Notifier {
    tx: Option<mpsc::Sender<Event>>,
}

impl Notifier {
    /// A sink with no subscriber — every emission is dropped.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// A sink backed by a bounded channel. The receiver side belongs to
    /// the observer.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx: Some(tx) }, rx)
    }

    /// Emit an event. Never blocks; a full or closed channel drops it.
    pub fn notify(&self, event: Event) {
        if let Some(tx) = &self.tx {
            let _ = tx.try_send(event);
        }
    }

    pub fn log(&self, message: impl Into<String>) {
        self.notify(Event::Log(message.into()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_sink_drops_silently() {
        let notifier = Notifier::disabled();
        // No subscriber, no panic, no block
        notifier.log("nobody listening");
        notifier.notify(Event::Status("RUNNING"));
    }

    #[tokio::test]
    async fn channel_delivers_events_in_order() {
        let (notifier, mut rx) = Notifier::channel(8);
        notifier.log("first");
        notifier.notify(Event::Status("RUNNING"));

        match rx.recv().await {
            Some(Event::Log(msg)) => assert_eq!(msg, "first"),
            other => panic!("unexpected event: {other:?}"),
        }
        match rx.recv().await {
            Some(Event::Status(state)) => assert_eq!(state, "RUNNING"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn full_channel_drops_instead_of_blocking() {
        let (notifier, mut rx) = Notifier::channel(1);
        notifier.log("kept");
        notifier.log("dropped");

        match rx.recv().await {
            Some(Event::Log(msg)) => assert_eq!(msg, "kept"),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(rx.try_recv().is_err());
    }
}
