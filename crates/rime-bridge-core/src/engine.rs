//! Engine capability trait and the values it hands out.

use std::{
    ops::{Deref, DerefMut},
    path::PathBuf,
    sync::Arc,
};

use serde::{Deserialize, Serialize};

/// Engine-assigned session handle. Zero is never a live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl SessionId {
    /// Whether the engine handed out a usable handle.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Static configuration consumed by `setup` and `initialize`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineTraits {
    /// Read-only schema and dictionary data.
    pub shared_data_dir: PathBuf,
    /// Per-user data: compiled dictionaries, learned phrases.
    pub user_data_dir: PathBuf,
    /// Application identity reported to the engine.
    pub app_name: String,
}

/// Text accepted by the last command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawCommit {
    pub text: Option<String>,
}

/// Composition state as the engine reports it.
///
/// `sel_start`, `sel_end` and `cursor_pos` are byte offsets into `preedit`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawComposition {
    pub length: usize,
    pub cursor_pos: usize,
    pub sel_start: usize,
    pub sel_end: usize,
    pub preedit: Option<String>,
}

/// One entry of the candidate menu.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawCandidate {
    pub text: String,
    pub comment: Option<String>,
}

/// The current page of candidates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawMenu {
    pub page_size: usize,
    pub page_no: usize,
    pub is_last_page: bool,
    pub highlighted_candidate_index: usize,
    pub candidates: Vec<RawCandidate>,
}

/// Composition plus menu, fetched after every mutating command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawContext {
    pub composition: RawComposition,
    pub menu: RawMenu,
    /// Per-candidate selection labels, when the schema defines them.
    pub select_labels: Option<Vec<Option<String>>>,
}

/// An installed schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaInfo {
    pub id: String,
    pub name: String,
}

/// A single state of a switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchInfo {
    pub name: String,
    pub label: String,
    pub abbrev: String,
}

/// A toggleable engine option; radio groups hold several mutually exclusive states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchGroup {
    pub is_radio: bool,
    pub current_index: usize,
    pub reset_index: usize,
    pub switches: Vec<SwitchInfo>,
}

/// Callback the engine invokes for out-of-band notifications:
/// `(session, message_type, message_value)`.
pub type NotificationHandler = Arc<dyn Fn(SessionId, &str, &str) + Send + Sync>;

/// The input-method engine the bridge drives.
///
/// Implementations are internally synchronised: notifications arrive on the
/// engine's own thread and may query it while no command is in flight.
pub trait Engine: Send + Sync {
    /// One-time process-level setup.
    fn setup(&self, traits: &EngineTraits);

    /// Bring the engine up with the given data directories.
    fn initialize(&self, traits: &EngineTraits);

    /// Shut the engine down. Sessions must be destroyed first.
    fn finalize(&self);

    /// Register the single notification sink, replacing any previous one.
    fn set_notification_handler(&self, handler: NotificationHandler);

    /// Rebuild schemas and dictionaries on a background worker.
    fn start_maintenance(&self, full_check: bool) -> bool;

    /// Start without checking for stale data.
    fn start_quick(&self) -> bool;

    /// Block until the maintenance worker (if any) finishes.
    fn join_maintenance_thread(&self);

    fn create_session(&self) -> SessionId;

    fn destroy_session(&self, session: SessionId) -> bool;

    /// Feed a key sequence such as `"nihao{space}"`.
    fn simulate_key_sequence(&self, session: SessionId, keys: &str) -> bool;

    fn select_candidate_on_current_page(&self, session: SessionId, index: usize) -> bool;

    fn delete_candidate_on_current_page(&self, session: SessionId, index: usize) -> bool;

    fn change_page(&self, session: SessionId, backward: bool) -> bool;

    fn clear_composition(&self, session: SessionId);

    fn get_commit(&self, session: SessionId) -> Option<RawCommit>;

    fn free_commit(&self, commit: &mut RawCommit) -> bool;

    fn get_context(&self, session: SessionId) -> Option<RawContext>;

    fn free_context(&self, context: &mut RawContext) -> bool;

    fn set_option(&self, session: SessionId, name: &str, value: bool);

    fn get_option(&self, session: SessionId, name: &str) -> bool;

    fn select_schema(&self, session: SessionId, schema_id: &str) -> bool;

    fn current_schema(&self, session: SessionId) -> Option<String>;

    /// All installed schemas.
    fn schema_list(&self) -> Option<Vec<SchemaInfo>>;

    /// Switches declared by the session's active schema.
    fn switches(&self, session: SessionId) -> Option<Vec<SwitchGroup>>;

    /// Apply a host preference such as page size. Engines without the
    /// notion report `false`.
    fn apply_preference(&self, _session: SessionId, _name: &str, _value: i32) -> bool {
        false
    }
}

/// A fetched commit, released back to the engine when dropped.
pub struct CommitGuard<'e, E: Engine + ?Sized> {
    engine: &'e E,
    commit: RawCommit,
}

impl<'e, E: Engine + ?Sized> CommitGuard<'e, E> {
    /// Fetch the pending commit, if any.
    pub fn acquire(engine: &'e E, session: SessionId) -> Option<Self> {
        engine
            .get_commit(session)
            .map(|commit| Self { engine, commit })
    }
}

impl<E: Engine + ?Sized> Deref for CommitGuard<'_, E> {
    type Target = RawCommit;

    fn deref(&self) -> &Self::Target {
        &self.commit
    }
}

impl<E: Engine + ?Sized> Drop for CommitGuard<'_, E> {
    fn drop(&mut self) {
        if !self.engine.free_commit(&mut self.commit) {
            tracing::warn!("engine refused to release commit");
        }
    }
}

/// A fetched context, released back to the engine when dropped.
pub struct ContextGuard<'e, E: Engine + ?Sized> {
    engine: &'e E,
    context: RawContext,
}

impl<'e, E: Engine + ?Sized> ContextGuard<'e, E> {
    /// Fetch the current context.
    pub fn acquire(engine: &'e E, session: SessionId) -> Option<Self> {
        engine
            .get_context(session)
            .map(|context| Self { engine, context })
    }
}

impl<E: Engine + ?Sized> Deref for ContextGuard<'_, E> {
    type Target = RawContext;

    fn deref(&self) -> &Self::Target {
        &self.context
    }
}

impl<E: Engine + ?Sized> DerefMut for ContextGuard<'_, E> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.context
    }
}

impl<E: Engine + ?Sized> Drop for ContextGuard<'_, E> {
    fn drop(&mut self) {
        if !self.engine.free_context(&mut self.context) {
            tracing::warn!("engine refused to release context");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedEngine;

    #[test]
    fn test_session_id_validity() {
        assert!(!SessionId(0).is_valid());
        assert!(SessionId(7).is_valid());
    }

    #[test]
    fn test_commit_guard_releases_on_drop() {
        let engine = ScriptedEngine::new();
        let session = engine.create_session();
        engine.script_commit("你好");
        {
            let commit = CommitGuard::acquire(&engine, session).unwrap();
            assert_eq!(commit.text.as_deref(), Some("你好"));
            assert_eq!(engine.outstanding_commits(), 1);
        }
        assert_eq!(engine.outstanding_commits(), 0);
    }

    #[test]
    fn test_context_guard_releases_on_early_return() {
        fn composing(engine: &ScriptedEngine, session: SessionId) -> bool {
            let Some(context) = ContextGuard::acquire(engine, session) else {
                return false;
            };
            if context.composition.length == 0 {
                return false;
            }
            true
        }

        let engine = ScriptedEngine::new();
        let session = engine.create_session();
        assert!(!composing(&engine, session));
        assert_eq!(engine.outstanding_contexts(), 0);
    }
}
