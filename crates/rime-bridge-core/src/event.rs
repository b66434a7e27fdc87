//! Events pushed to the host outside the command/reply cycle.

use serde::{Deserialize, Deserializer, Serialize, Serializer, ser::SerializeStruct};
use serde_json::Value;

use crate::engine::{SchemaInfo, SwitchGroup};

/// Event type emitted after a successful deploy.
pub const SCHEMA_LIST: &str = "schema_list";

/// Event type emitted after a schema change.
pub const SWITCHES_LIST: &str = "switches_list";

/// An event delivered to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    /// Engine notification, forwarded verbatim.
    Notification { kind: String, value: String },
    /// Installed schemas, queried after `deploy`/`success`.
    SchemaList(Vec<SchemaInfo>),
    /// Switches of the active schema, queried after any `schema` notification.
    SwitchesList(Vec<SwitchGroup>),
}

impl BridgeEvent {
    /// Build a raw notification event.
    pub fn notification(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Notification {
            kind: kind.into(),
            value: value.into(),
        }
    }

    /// The `type` field on the wire.
    #[must_use]
    pub fn event_type(&self) -> &str {
        match self {
            Self::Notification { kind, .. } => kind,
            Self::SchemaList(_) => SCHEMA_LIST,
            Self::SwitchesList(_) => SWITCHES_LIST,
        }
    }

    /// Rough payload size, used to bound history.
    #[must_use]
    pub fn approx_bytes(&self) -> usize {
        const OVERHEAD: usize = 32;
        let payload = match self {
            Self::Notification { kind, value } => kind.len() + value.len(),
            Self::SchemaList(schemas) => schemas.iter().map(|s| s.id.len() + s.name.len()).sum(),
            Self::SwitchesList(groups) => groups
                .iter()
                .flat_map(|g| &g.switches)
                .map(|s| s.name.len() + s.label.len() + s.abbrev.len())
                .sum(),
        };
        OVERHEAD + payload
    }
}

impl Serialize for BridgeEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("BridgeEvent", 2)?;
        state.serialize_field("type", self.event_type())?;
        match self {
            Self::Notification { value, .. } => state.serialize_field("value", value)?,
            Self::SchemaList(schemas) => state.serialize_field("value", schemas)?,
            Self::SwitchesList(groups) => state.serialize_field("value", groups)?,
        }
        state.end()
    }
}

#[derive(Deserialize)]
struct WireEvent {
    #[serde(rename = "type")]
    kind: String,
    value: Value,
}

impl<'de> Deserialize<'de> for BridgeEvent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;

        let WireEvent { kind, value } = WireEvent::deserialize(deserializer)?;
        match kind.as_str() {
            SCHEMA_LIST => serde_json::from_value(value)
                .map(Self::SchemaList)
                .map_err(D::Error::custom),
            SWITCHES_LIST => serde_json::from_value(value)
                .map(Self::SwitchesList)
                .map_err(D::Error::custom),
            _ => match value {
                Value::String(value) => Ok(Self::Notification { kind, value }),
                other => Err(D::Error::custom(format!(
                    "notification value must be a string, got {other}"
                ))),
            },
        }
    }
}

/// Host-side receiver of bridge events.
///
/// Called from whichever thread the engine notifies on; implementations must
/// not block for long.
pub trait EventSink: Send + Sync {
    fn deliver(&self, event: BridgeEvent);
}

impl<F> EventSink for F
where
    F: Fn(BridgeEvent) + Send + Sync,
{
    fn deliver(&self, event: BridgeEvent) {
        self(event);
    }
}

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn deliver(&self, event: BridgeEvent) {
        tracing::trace!(event_type = event.event_type(), "event dropped by null sink");
    }
}
