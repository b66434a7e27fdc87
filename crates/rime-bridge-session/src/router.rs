//! Forwards engine notifications to the host, adding derived catalog events.

use std::sync::{Arc, Weak};

use rime_bridge_core::{BridgeEvent, Engine, EventSink, SessionId};

use crate::manager::SessionCell;

/// Routes notifications from the engine's thread to the event sink.
///
/// Holds the engine weakly: the engine owns the handler that owns the router.
pub struct NotificationRouter<E: Engine> {
    engine: Weak<E>,
    sink: Arc<dyn EventSink>,
    session: SessionCell,
}

impl<E: Engine> NotificationRouter<E> {
    #[must_use]
    pub fn new(engine: &Arc<E>, sink: Arc<dyn EventSink>, session: SessionCell) -> Self {
        Self {
            engine: Arc::downgrade(engine),
            sink,
            session,
        }
    }

    /// Handle one notification. The raw event always goes out first.
    pub fn on_notify(&self, session: SessionId, kind: &str, value: &str) {
        tracing::debug!(%session, kind, value, "engine notification");
        self.sink.deliver(BridgeEvent::notification(kind, value));

        match kind {
            "deploy" if value == "success" => self.forward_schema_list(),
            "schema" => self.forward_switches(session),
            _ => {}
        }
    }

    fn forward_schema_list(&self) {
        let schemas = self
            .engine
            .upgrade()
            .and_then(|engine| engine.schema_list())
            .unwrap_or_else(|| {
                tracing::warn!("schema list unavailable after deploy");
                Vec::new()
            });
        self.sink.deliver(BridgeEvent::SchemaList(schemas));
    }

    fn forward_switches(&self, notified: SessionId) {
        let session = if notified.is_valid() {
            Some(notified)
        } else {
            self.session.get()
        };
        let switches = session
            .zip(self.engine.upgrade())
            .and_then(|(session, engine)| engine.switches(session))
            .unwrap_or_else(|| {
                tracing::warn!(?session, "switch list unavailable after schema change");
                Vec::new()
            });
        self.sink.deliver(BridgeEvent::SwitchesList(switches));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use rime_bridge_core::{
        engine::{SchemaInfo, SwitchGroup, SwitchInfo},
        testing::ScriptedEngine,
    };

    use super::*;

    type Seen = Arc<Mutex<Vec<BridgeEvent>>>;

    fn router(engine: &Arc<ScriptedEngine>) -> (NotificationRouter<ScriptedEngine>, Seen) {
        let seen: Seen = Arc::default();
        let sink_seen = Arc::clone(&seen);
        let sink = Arc::new(move |event: BridgeEvent| sink_seen.lock().unwrap().push(event));
        (NotificationRouter::new(engine, sink, SessionCell::default()), seen)
    }

    fn luna() -> SchemaInfo {
        SchemaInfo {
            id: "luna_pinyin".to_string(),
            name: "朙月拼音".to_string(),
        }
    }

    #[test]
    fn test_plain_notification_passes_through() {
        let engine = Arc::new(ScriptedEngine::new());
        let (router, seen) = router(&engine);
        router.on_notify(SessionId(1), "option", "!ascii_mode");
        assert_eq!(
            *seen.lock().unwrap(),
            [BridgeEvent::notification("option", "!ascii_mode")]
        );
    }

    #[test]
    fn test_deploy_success_adds_schema_list() {
        let engine = Arc::new(ScriptedEngine::new());
        engine.script_schemas(Some(vec![luna()]));
        let (router, seen) = router(&engine);

        router.on_notify(SessionId(0), "deploy", "start");
        router.on_notify(SessionId(0), "deploy", "success");
        assert_eq!(
            *seen.lock().unwrap(),
            [
                BridgeEvent::notification("deploy", "start"),
                BridgeEvent::notification("deploy", "success"),
                BridgeEvent::SchemaList(vec![luna()]),
            ]
        );
    }

    #[test]
    fn test_deploy_failure_has_no_derived_event() {
        let engine = Arc::new(ScriptedEngine::new());
        let (router, seen) = router(&engine);
        router.on_notify(SessionId(0), "deploy", "failure");
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_missing_catalog_still_emits_one_event() {
        let engine = Arc::new(ScriptedEngine::new());
        let (router, seen) = router(&engine);
        router.on_notify(SessionId(0), "deploy", "success");
        assert_eq!(
            seen.lock().unwrap().last(),
            Some(&BridgeEvent::SchemaList(Vec::new()))
        );
    }

    #[test]
    fn test_schema_change_adds_switches() {
        let engine = Arc::new(ScriptedEngine::new());
        let group = SwitchGroup {
            is_radio: false,
            current_index: 0,
            reset_index: 0,
            switches: vec![SwitchInfo {
                name: "ascii_mode".to_string(),
                label: "中文".to_string(),
                abbrev: "中".to_string(),
            }],
        };
        engine.script_switches(Some(vec![group.clone()]));
        let (router, seen) = router(&engine);

        router.on_notify(SessionId(3), "schema", "luna_pinyin/朙月拼音");
        assert_eq!(
            *seen.lock().unwrap(),
            [
                BridgeEvent::notification("schema", "luna_pinyin/朙月拼音"),
                BridgeEvent::SwitchesList(vec![group]),
            ]
        );
        assert!(engine.calls().contains(&"switches(3)".to_string()));
    }

    #[test]
    fn test_dropped_engine_degrades_to_empty_catalog() {
        let engine = Arc::new(ScriptedEngine::new());
        let (router, seen) = router(&engine);
        drop(engine);
        router.on_notify(SessionId(0), "deploy", "success");
        assert_eq!(
            seen.lock().unwrap().last(),
            Some(&BridgeEvent::SchemaList(Vec::new()))
        );
    }
}
