//! Editor event bus - change notifications for hosts.
//!
//! - `subscribe()` registers a callback invoked synchronously on every `emit()`
//! - `emit()` also queues the event; `poll()` drains the queue for batch processing
//!   in a host's main loop
//!
//! Callback order is subscription order.

use std::sync::{Arc, Mutex, RwLock};

use log::warn;
use uuid::Uuid;

use super::player::PlaybackState;

/// Maximum events in queue before the oldest half is evicted
const MAX_QUEUE_SIZE: usize = 1000;

/// Something observable changed in the editor
#[derive(Clone, Debug, PartialEq)]
pub enum EditorEvent {
    /// Tracks were added, removed, moved or trimmed
    TrackListChanged { frame_count: i32 },
    /// A track became selected (None: selection cleared)
    SelectionChanged { track: Option<Uuid> },
    /// Current frame changed (tick or scrub)
    FrameChanged { frame: i32 },
    PlaybackChanged(PlaybackState),
    /// A composite pass finished and swapped the presented frame
    FramePresented { frame: i32 },
    /// Import started (`loading` = counter after the change) or finished
    LoadingChanged { loading: usize },
}

type Callback = Arc<dyn Fn(&EditorEvent) + Send + Sync>;

/// Cloneable handle; clones share subscribers and queue
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<RwLock<Vec<Callback>>>,
    queue: Arc<Mutex<Vec<EditorEvent>>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.read().unwrap_or_else(|e| e.into_inner()).len())
            .field("queued", &self.queue_len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, callback: F)
    where
        F: Fn(&EditorEvent) + Send + Sync + 'static,
    {
        self.subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(Arc::new(callback));
    }

    /// Invoke callbacks, then queue for `poll()`
    pub fn emit(&self, event: EditorEvent) {
        // Snapshot so callbacks may subscribe without deadlocking
        let callbacks: Vec<Callback> = self.subscribers.read().unwrap_or_else(|e| e.into_inner()).clone();
        for cb in &callbacks {
            cb(&event);
        }

        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        if queue.len() >= MAX_QUEUE_SIZE {
            let evict_count = queue.len() / 2;
            warn!("EventBus queue full ({} events), evicting oldest {}", queue.len(), evict_count);
            queue.drain(0..evict_count);
        }
        queue.push(event);
    }

    /// All events emitted since the last poll
    pub fn poll(&self) -> Vec<EditorEvent> {
        std::mem::take(&mut *self.queue.lock().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn queue_len(&self) -> usize {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn clear(&self) {
        self.subscribers.write().unwrap_or_else(|e| e.into_inner()).clear();
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn test_subscribe_and_poll() {
        let bus = EventBus::new();
        let last = Arc::new(AtomicI32::new(-1));
        let seen = last.clone();
        bus.subscribe(move |e| {
            if let EditorEvent::FrameChanged { frame } = e {
                seen.store(*frame, Ordering::SeqCst);
            }
        });

        bus.emit(EditorEvent::FrameChanged { frame: 12 });
        bus.emit(EditorEvent::TrackListChanged { frame_count: 40 });
        assert_eq!(last.load(Ordering::SeqCst), 12);

        let events = bus.poll();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], EditorEvent::TrackListChanged { frame_count: 40 });
        assert_eq!(bus.queue_len(), 0);
    }

    #[test]
    fn test_queue_eviction() {
        let bus = EventBus::new();
        for frame in 0..(MAX_QUEUE_SIZE as i32 + 1) {
            bus.emit(EditorEvent::FrameChanged { frame });
        }
        let events = bus.poll();
        assert_eq!(events.len(), MAX_QUEUE_SIZE / 2 + 1);
        assert_eq!(events.last(), Some(&EditorEvent::FrameChanged { frame: MAX_QUEUE_SIZE as i32 }));
    }
}
