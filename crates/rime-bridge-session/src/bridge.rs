//! The bridge: one engine, one session, one host.

use std::sync::Arc;

use rime_bridge_core::{Engine, EventSink, SessionId, Snapshot, engine::NotificationHandler};
use uuid::Uuid;

use crate::{
    config::BridgeConfig,
    manager::{ManagerError, SessionCell, SessionManager},
    preferences::PreferenceStore,
    router::NotificationRouter,
    snapshot::SnapshotBuilder,
};

/// Bridge error.
///
/// A command the engine rejects is not an error: it comes back as a
/// `Snapshot` with `success == false`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    #[error("Engine failed to start")]
    EngineStartFailure,
    #[error("Engine refused to create a session")]
    SessionCreationFailure,
    #[error("Failed to destroy session {0}")]
    SessionTeardownFailure(SessionId),
    #[error("Bridge is not initialized")]
    NotInitialized,
}

impl From<ManagerError> for BridgeError {
    fn from(e: ManagerError) -> Self {
        match e {
            ManagerError::EngineStart => Self::EngineStartFailure,
            ManagerError::SessionCreation => Self::SessionCreationFailure,
            ManagerError::SessionTeardown(session) => Self::SessionTeardownFailure(session),
        }
    }
}

/// Lifecycle state visible to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Uninitialized,
    Ready,
}

/// Owns the engine session and turns host commands into engine calls.
///
/// Commands take `&mut self`: the engine's commit and context are single-slot,
/// so commands on one bridge must not overlap. Notifications arrive
/// independently on the engine's thread and go straight to the sink.
pub struct Bridge<E: Engine + 'static> {
    id: Uuid,
    engine: Arc<E>,
    config: BridgeConfig,
    manager: SessionManager<E>,
    preferences: PreferenceStore,
}

impl<E: Engine + 'static> Bridge<E> {
    /// Create a bridge. The router is registered with the engine on `init`.
    #[must_use]
    pub fn new(engine: Arc<E>, sink: Arc<dyn EventSink>, config: BridgeConfig) -> Self {
        let session = SessionCell::default();
        let router = Arc::new(NotificationRouter::new(&engine, sink, session.clone()));
        let handler: NotificationHandler =
            Arc::new(move |session: SessionId, kind: &str, value: &str| {
                router.on_notify(session, kind, value);
            });
        let manager = SessionManager::new(Arc::clone(&engine), config.to_traits(), handler, session);

        Self {
            id: Uuid::new_v4(),
            engine,
            config,
            manager,
            preferences: PreferenceStore::new(),
        }
    }

    /// Identifier used to tell bridges apart in logs.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub const fn config(&self) -> &BridgeConfig {
        &self.config
    }

    #[must_use]
    pub fn state(&self) -> BridgeState {
        if self.manager.session().is_some() {
            BridgeState::Ready
        } else {
            BridgeState::Uninitialized
        }
    }

    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        self.manager.session()
    }

    #[must_use]
    pub const fn preferences(&self) -> &PreferenceStore {
        &self.preferences
    }

    /// Start the engine and open a session. On a bridge that is already
    /// ready this redeploys instead.
    ///
    /// # Errors
    /// Returns error if the engine does not start or grants no session.
    pub fn init(&mut self) -> Result<(), BridgeError> {
        if self.state() == BridgeState::Ready {
            return self.deploy();
        }
        let _span = tracing::info_span!("init", bridge = %self.id).entered();
        self.manager.bring_up(false)?;
        let session = self.manager.create_session()?;
        self.apply_preferences(session);
        Ok(())
    }

    /// Tear down, rebuild schemas and dictionaries, and open a fresh session.
    /// Blocks for the whole maintenance pass.
    ///
    /// # Errors
    /// Returns the first failing step. After any failure the bridge is
    /// `Uninitialized`.
    pub fn deploy(&mut self) -> Result<(), BridgeError> {
        let _span = tracing::info_span!("deploy", bridge = %self.id).entered();
        let session = self.manager.redeploy()?;
        self.apply_preferences(session);
        Ok(())
    }

    /// Replace the session with one bound to `schema_id`.
    ///
    /// The old session is always destroyed first. `Ok(false)` means the new
    /// session exists but the engine rejected the schema.
    ///
    /// # Errors
    /// Returns error if the old session cannot be destroyed or no new one is
    /// granted.
    pub fn set_schema(&mut self, schema_id: &str) -> Result<bool, BridgeError> {
        self.require_session()?;
        let session = self.manager.recreate_session()?;
        let selected = self.engine.select_schema(session, schema_id);
        if !selected {
            tracing::warn!(bridge = %self.id, schema_id, "engine rejected schema");
        }
        // Selecting a schema reloads its own page size and toggles.
        self.apply_preferences(session);
        Ok(selected)
    }

    /// Forward a boolean engine option.
    ///
    /// # Errors
    /// Returns `NotInitialized` without a session.
    pub fn set_option(&mut self, name: &str, value: bool) -> Result<(), BridgeError> {
        let session = self.require_session()?;
        self.engine.set_option(session, name, value);
        Ok(())
    }

    /// Read a boolean engine option.
    ///
    /// # Errors
    /// Returns `NotInitialized` without a session.
    pub fn get_option(&self, name: &str) -> Result<bool, BridgeError> {
        let session = self.require_session()?;
        Ok(self.engine.get_option(session, name))
    }

    /// Schema the current session is using.
    ///
    /// # Errors
    /// Returns `NotInitialized` without a session.
    pub fn current_schema(&self) -> Result<Option<String>, BridgeError> {
        let session = self.require_session()?;
        Ok(self.engine.current_schema(session))
    }

    /// Cache a preference. It reaches the engine on the next session creation.
    pub fn set_preference(&mut self, name: &str, value: i32) -> bool {
        self.preferences.set(name, value)
    }

    /// Feed a key sequence.
    ///
    /// # Errors
    /// Returns `NotInitialized` without a session.
    pub fn process_key(&mut self, input: &str) -> Result<Snapshot, BridgeError> {
        let session = self.require_session()?;
        let success = self.engine.simulate_key_sequence(session, input);
        Ok(self.snapshot("process_key", session, success))
    }

    /// Commit the candidate at zero-based `index` on the current page.
    ///
    /// # Errors
    /// Returns `NotInitialized` without a session.
    pub fn select_candidate(&mut self, index: usize) -> Result<Snapshot, BridgeError> {
        let session = self.require_session()?;
        let success = self.engine.select_candidate_on_current_page(session, index);
        Ok(self.snapshot("select_candidate", session, success))
    }

    /// Forget a learned candidate at zero-based `index` on the current page.
    ///
    /// # Errors
    /// Returns `NotInitialized` without a session.
    pub fn delete_candidate(&mut self, index: usize) -> Result<Snapshot, BridgeError> {
        let session = self.require_session()?;
        let success = self.engine.delete_candidate_on_current_page(session, index);
        Ok(self.snapshot("delete_candidate", session, success))
    }

    /// Move one candidate page.
    ///
    /// # Errors
    /// Returns `NotInitialized` without a session.
    pub fn flip_page(&mut self, backward: bool) -> Result<Snapshot, BridgeError> {
        let session = self.require_session()?;
        let success = self.engine.change_page(session, backward);
        Ok(self.snapshot("flip_page", session, success))
    }

    /// Drop the composition without committing anything.
    ///
    /// # Errors
    /// Returns `NotInitialized` without a session.
    pub fn clear_input(&mut self) -> Result<Snapshot, BridgeError> {
        let session = self.require_session()?;
        self.engine.clear_composition(session);
        Ok(self.snapshot("clear_input", session, true))
    }

    /// Destroy the session and finalise the engine.
    ///
    /// # Errors
    /// Returns `SessionTeardownFailure` if the session cannot be destroyed;
    /// the engine is then left running.
    pub fn shutdown(&mut self) -> Result<(), BridgeError> {
        let _span = tracing::info_span!("shutdown", bridge = %self.id).entered();
        self.manager.teardown().map_err(Into::into)
    }

    fn require_session(&self) -> Result<SessionId, BridgeError> {
        self.manager.session().ok_or(BridgeError::NotInitialized)
    }

    fn snapshot(&self, command: &'static str, session: SessionId, success: bool) -> Snapshot {
        if !success {
            tracing::debug!(bridge = %self.id, command, "engine rejected command");
        }
        let snapshot = SnapshotBuilder::new(&*self.engine).build(session, success);
        tracing::trace!(bridge = %self.id, command, ?snapshot, "snapshot");
        snapshot
    }

    fn apply_preferences(&self, session: SessionId) {
        for (preference, value) in self.preferences.iter_set() {
            if !self.engine.apply_preference(session, preference.as_str(), value) {
                tracing::warn!(
                    bridge = %self.id,
                    preference = preference.as_str(),
                    value,
                    "engine did not apply preference"
                );
            }
        }
    }
}

impl<E: Engine + 'static> Drop for Bridge<E> {
    fn drop(&mut self) {
        if self.manager.session().is_none() && !self.manager.is_engine_up() {
            return;
        }
        if let Err(e) = self.manager.teardown() {
            tracing::warn!(bridge = %self.id, "teardown on drop failed: {e}");
        }
    }
}
