//! Runs decoded host commands against a bridge.

use rime_bridge_core::Engine;
use rime_bridge_session::{Bridge, BridgeError};
use thiserror::Error;

use crate::protocol::{HostCommand, HostReply};

/// Protocol error.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Stateless dispatcher from `HostCommand` to `Bridge` calls.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandHandler;

impl CommandHandler {
    /// Run one command.
    pub fn handle<E: Engine + 'static>(bridge: &mut Bridge<E>, command: HostCommand) -> HostReply {
        match command {
            HostCommand::Init => Self::outcome("init", bridge.init().map(|()| true)),
            HostCommand::Deploy => Self::outcome("deploy", bridge.deploy().map(|()| true)),
            HostCommand::SetSchema { schema_id } => {
                Self::outcome("set_schema", bridge.set_schema(&schema_id))
            }
            HostCommand::SetOption { name, value } => match bridge.set_option(&name, value) {
                Ok(()) => HostReply::Ok { success: true },
                Err(e) => Self::error(&e),
            },
            HostCommand::SetPreference { name, value } => HostReply::Ok {
                success: bridge.set_preference(&name, value),
            },
            HostCommand::ProcessKey { input } => Self::snapshot(bridge.process_key(&input)),
            HostCommand::SelectCandidate { index } => {
                Self::snapshot(bridge.select_candidate(index))
            }
            HostCommand::DeleteCandidate { index } => {
                Self::snapshot(bridge.delete_candidate(index))
            }
            HostCommand::FlipPage { backward } => Self::snapshot(bridge.flip_page(backward)),
            HostCommand::ClearInput => Self::snapshot(bridge.clear_input()),
            HostCommand::Ping => HostReply::Pong,
        }
    }

    /// Decode a JSON command, run it, and encode the reply. Malformed input
    /// gets an `error` reply rather than failing the call.
    ///
    /// # Errors
    /// Returns error only if the reply cannot be encoded.
    pub fn handle_json<E: Engine + 'static>(
        bridge: &mut Bridge<E>,
        json: &str,
    ) -> Result<String, ProtocolError> {
        let reply = match serde_json::from_str::<HostCommand>(json) {
            Ok(command) => Self::handle(bridge, command),
            Err(e) => {
                tracing::warn!("Invalid host command: {e}");
                HostReply::Error {
                    message: format!("Invalid command: {e}"),
                }
            }
        };
        Ok(serde_json::to_string(&reply)?)
    }

    // Lifecycle commands report a plain flag; the reason goes to the log.
    fn outcome(command: &str, result: Result<bool, BridgeError>) -> HostReply {
        match result {
            Ok(success) => HostReply::Ok { success },
            Err(e) => {
                tracing::error!(command, "{e}");
                HostReply::Ok { success: false }
            }
        }
    }

    fn snapshot(result: Result<rime_bridge_core::Snapshot, BridgeError>) -> HostReply {
        result.map_or_else(|e| Self::error(&e), HostReply::Snapshot)
    }

    fn error(e: &BridgeError) -> HostReply {
        HostReply::Error {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rime_bridge_core::{NullSink, Snapshot, testing::ScriptedEngine};
    use rime_bridge_session::BridgeConfig;
    use serde_json::{Value, json};

    use super::*;

    fn bridge() -> (Arc<ScriptedEngine>, Bridge<ScriptedEngine>) {
        let engine = Arc::new(ScriptedEngine::new());
        let bridge = Bridge::new(Arc::clone(&engine), Arc::new(NullSink), BridgeConfig::default());
        (engine, bridge)
    }

    fn run(bridge: &mut Bridge<ScriptedEngine>, command: Value) -> Value {
        let reply = CommandHandler::handle_json(bridge, &command.to_string()).unwrap();
        serde_json::from_str(&reply).unwrap()
    }

    #[test]
    fn test_session_over_json() {
        let (engine, mut bridge) = bridge();
        engine.script_candidates(["哈囉"]);

        assert_eq!(run(&mut bridge, json!({"type": "init"})), json!({"type": "ok", "success": true}));

        let reply = run(&mut bridge, json!({"type": "process_key", "input": "hello"}));
        assert_eq!(reply["type"], "snapshot");
        assert_eq!(reply["isComposing"], true);
        assert_eq!(reply["inputBuffer"]["active"], "hello");
        assert_eq!(reply["candidates"][0], json!({"label": "1.", "text": "哈囉"}));

        let reply = run(&mut bridge, json!({"type": "select_candidate", "index": 0}));
        assert_eq!(
            reply,
            json!({"type": "snapshot", "success": true, "committedText": "哈囉", "isComposing": false})
        );
    }

    #[test]
    fn test_command_before_init_is_error() {
        let (_engine, mut bridge) = bridge();
        let reply = CommandHandler::handle(&mut bridge, HostCommand::ClearInput);
        assert_eq!(
            reply,
            HostReply::Error {
                message: "Bridge is not initialized".to_string()
            }
        );
    }

    #[test]
    fn test_failed_init_is_false() {
        let (engine, mut bridge) = bridge();
        engine.fail_start(true);
        assert_eq!(
            CommandHandler::handle(&mut bridge, HostCommand::Init),
            HostReply::Ok { success: false }
        );
    }

    #[test]
    fn test_failed_command_still_returns_snapshot() {
        let (_engine, mut bridge) = bridge();
        CommandHandler::handle(&mut bridge, HostCommand::Init);
        let reply = CommandHandler::handle(&mut bridge, HostCommand::FlipPage { backward: false });
        assert_eq!(reply, HostReply::Snapshot(Snapshot::idle(false, None)));
    }

    #[test]
    fn test_preference_names() {
        let (_engine, mut bridge) = bridge();
        let known = HostCommand::SetPreference {
            name: "pageSize".to_string(),
            value: 6,
        };
        let unknown = HostCommand::SetPreference {
            name: "volume".to_string(),
            value: 6,
        };
        assert_eq!(CommandHandler::handle(&mut bridge, known), HostReply::Ok { success: true });
        assert_eq!(CommandHandler::handle(&mut bridge, unknown), HostReply::Ok { success: false });
    }

    #[test]
    fn test_malformed_json() {
        let (_engine, mut bridge) = bridge();
        let reply = run(&mut bridge, json!({"type": "process_key"}));
        assert_eq!(reply["type"], "error");

        let reply = CommandHandler::handle_json(&mut bridge, "not json").unwrap();
        assert!(reply.contains("\"type\":\"error\""));
    }

    #[test]
    fn test_ping() {
        let (_engine, mut bridge) = bridge();
        assert_eq!(run(&mut bridge, json!({"type": "ping"})), json!({"type": "pong"}));
    }
}
