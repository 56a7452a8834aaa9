//! Per-instance event queues.
//!
//! Each component owns one [`EventSink`]. Callers obtain receivers with
//! `subscribe()`; every receiver sees every event emitted after it
//! subscribed, in emission order. Closing the sink happens under the same
//! lock as emission, so once `close()` returns no further event can reach
//! any receiver and all receivers observe end-of-stream.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

/// Receiving half handed to subscribers.
pub type EventReceiver<E> = mpsc::UnboundedReceiver<E>;

/// Shared, closable fan-out queue.
#[derive(Debug)]
pub struct EventSink<E> {
    subscribers: Arc<Mutex<Option<Vec<mpsc::UnboundedSender<E>>>>>,
}

impl<E> Clone for EventSink<E> {
    fn clone(&self) -> Self {
        Self {
            subscribers: Arc::clone(&self.subscribers),
        }
    }
}

impl<E> Default for EventSink<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EventSink<E> {
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Some(Vec::new()))),
        }
    }

    /// Register a new receiver. A closed sink hands out an already-ended one.
    pub fn subscribe(&self) -> EventReceiver<E> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut guard) = self.subscribers.lock()
            && let Some(subs) = guard.as_mut()
        {
            subs.push(tx);
        }
        rx
    }

    /// Stop delivery for good and end every receiver's stream.
    pub fn close(&self) {
        if let Ok(mut guard) = self.subscribers.lock() {
            guard.take();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.subscribers.lock().map(|g| g.is_none()).unwrap_or(true)
    }
}

impl<E: Clone> EventSink<E> {
    /// Deliver `event` to every live subscriber.
    ///
    /// Returns `false` when the sink is closed and nothing was delivered.
    pub fn emit(&self, event: E) -> bool {
        let Ok(mut guard) = self.subscribers.lock() else {
            return false;
        };
        let Some(subs) = guard.as_mut() else {
            return false;
        };
        subs.retain(|tx| tx.send(event.clone()).is_ok());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_every_subscriber_receives_in_order() {
        let sink = EventSink::new();
        let mut a = sink.subscribe();
        let mut b = sink.subscribe();

        sink.emit(1);
        sink.emit(2);

        assert_eq!(a.recv().await, Some(1));
        assert_eq!(a.recv().await, Some(2));
        assert_eq!(b.recv().await, Some(1));
        assert_eq!(b.recv().await, Some(2));
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_earlier_events() {
        let sink = EventSink::new();
        sink.emit("early");
        let mut rx = sink.subscribe();
        sink.emit("late");
        assert_eq!(rx.recv().await, Some("late"));
    }

    #[tokio::test]
    async fn test_close_ends_streams_and_blocks_emit() {
        let sink = EventSink::new();
        let mut rx = sink.subscribe();
        let emitter = sink.clone();

        sink.close();
        assert!(sink.is_closed());
        assert!(!emitter.emit(5));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_dropped_receivers_are_pruned() {
        let sink = EventSink::new();
        let rx = sink.subscribe();
        drop(rx);
        assert!(sink.emit(1));
        let mut live = sink.subscribe();
        sink.emit(2);
        assert_eq!(live.recv().await, Some(2));
    }
}
