//! Broadcast + history event store, so a host that attaches late still sees
//! what the engine reported during start-up.

use std::{
    collections::VecDeque,
    sync::{PoisonError, RwLock},
};

use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::event::{BridgeEvent, EventSink};

/// Default history size limit (1 MB).
const HISTORY_BYTES: usize = 1024 * 1024;

/// Live channel capacity.
const CHANNEL_CAPACITY: usize = 1024;

#[derive(Clone)]
struct StoredEvent {
    event: BridgeEvent,
    bytes: usize,
}

struct Inner {
    history: VecDeque<StoredEvent>,
    total_bytes: usize,
}

/// Event sink with broadcast and history support.
pub struct EventStore {
    inner: RwLock<Inner>,
    sender: broadcast::Sender<BridgeEvent>,
    history_limit: usize,
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EventStore {
    /// Create a new event store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_history_limit(HISTORY_BYTES)
    }

    /// Create a store that keeps roughly `history_limit` bytes of events.
    #[must_use]
    pub fn with_history_limit(history_limit: usize) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            inner: RwLock::new(Inner {
                history: VecDeque::with_capacity(32),
                total_bytes: 0,
            }),
            sender,
            history_limit,
        }
    }

    /// Push an event to both live listeners and history.
    pub fn push(&self, event: BridgeEvent) {
        let bytes = event.approx_bytes();

        // History first, so a subscriber that replays history and then
        // listens never misses an event in between.
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        while inner.total_bytes.saturating_add(bytes) > self.history_limit {
            if let Some(front) = inner.history.pop_front() {
                inner.total_bytes = inner.total_bytes.saturating_sub(front.bytes);
            } else {
                break;
            }
        }
        inner.history.push_back(StoredEvent {
            event: event.clone(),
            bytes,
        });
        inner.total_bytes = inner.total_bytes.saturating_add(bytes);
        let _ = self.sender.send(event); // no live listeners is fine
    }

    /// Get a receiver for live updates.
    #[must_use]
    pub fn get_receiver(&self) -> broadcast::Receiver<BridgeEvent> {
        self.sender.subscribe()
    }

    /// Get a snapshot of the history.
    #[must_use]
    pub fn get_history(&self) -> Vec<BridgeEvent> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .history
            .iter()
            .map(|s| s.event.clone())
            .collect()
    }

    /// Stream that yields history first, then live updates.
    #[must_use]
    pub fn history_plus_stream(&self) -> futures::stream::BoxStream<'static, BridgeEvent> {
        let (history, rx) = {
            // Hold the lock so nothing is pushed between the copy and the subscribe.
            let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
            let history: Vec<BridgeEvent> =
                inner.history.iter().map(|s| s.event.clone()).collect();
            (history, self.sender.subscribe())
        };

        let hist = futures::stream::iter(history);
        let live = BroadcastStream::new(rx).filter_map(|res| async move {
            match res {
                Ok(event) => Some(event),
                Err(e) => {
                    tracing::warn!("event subscriber lagged: {e}");
                    None
                }
            }
        });

        Box::pin(hist.chain(live))
    }
}

impl EventSink for EventStore {
    fn deliver(&self, event: BridgeEvent) {
        self.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_keeps_order() {
        let store = EventStore::new();
        store.deliver(BridgeEvent::notification("deploy", "start"));
        store.deliver(BridgeEvent::notification("deploy", "success"));
        store.deliver(BridgeEvent::SchemaList(Vec::new()));

        let types: Vec<String> = store
            .get_history()
            .iter()
            .map(|e| e.event_type().to_string())
            .collect();
        assert_eq!(types, ["deploy", "deploy", "schema_list"]);
    }

    #[test]
    fn test_history_is_bounded() {
        // Each event is just under 50 bytes; room for two.
        let store = EventStore::with_history_limit(100);
        for value in ["ascii_mode", "!ascii_mode", "ascii_mode"] {
            store.push(BridgeEvent::notification("option", value));
        }
        let history = store.get_history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], BridgeEvent::notification("option", "!ascii_mode"));
    }

    #[tokio::test]
    async fn test_history_plus_stream_replays_then_follows() {
        let store = EventStore::new();
        store.push(BridgeEvent::notification("deploy", "start"));

        let mut stream = store.history_plus_stream();
        store.push(BridgeEvent::notification("deploy", "success"));

        assert_eq!(
            stream.next().await,
            Some(BridgeEvent::notification("deploy", "start"))
        );
        assert_eq!(
            stream.next().await,
            Some(BridgeEvent::notification("deploy", "success"))
        );
    }

    #[test]
    fn test_live_receiver() {
        let store = EventStore::new();
        let mut rx = store.get_receiver();
        store.push(BridgeEvent::notification("schema", "luna_pinyin/朙月拼音"));
        let event = tokio_test::block_on(rx.recv()).unwrap();
        assert_eq!(event.event_type(), "schema");
    }
}
