//! Engine lifecycle and the single live session.

use std::sync::{Arc, PoisonError, RwLock};

use rime_bridge_core::{
    Engine, EngineTraits, SessionId,
    engine::NotificationHandler,
};

/// Option every new session starts with: the engine draws no cursor of its
/// own inside the preedit.
pub const SOFT_CURSOR_OPTION: &str = "soft_cursor";

/// Session manager error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ManagerError {
    #[error("Engine failed to start")]
    EngineStart,
    #[error("Engine refused to create a session")]
    SessionCreation,
    #[error("Failed to destroy session {0}")]
    SessionTeardown(SessionId),
}

/// The current session, shared with the notification router.
#[derive(Debug, Clone, Default)]
pub struct SessionCell(Arc<RwLock<Option<SessionId>>>);

impl SessionCell {
    #[must_use]
    pub fn get(&self) -> Option<SessionId> {
        *self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn set(&self, session: Option<SessionId>) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = session;
    }
}

/// Brings the engine up and down and owns the at-most-one live session.
pub struct SessionManager<E: Engine> {
    engine: Arc<E>,
    traits: EngineTraits,
    handler: NotificationHandler,
    session: SessionCell,
    setup_done: bool,
    engine_up: bool,
}

impl<E: Engine> SessionManager<E> {
    /// Create a manager; nothing touches the engine until `bring_up`.
    #[must_use]
    pub fn new(
        engine: Arc<E>,
        traits: EngineTraits,
        handler: NotificationHandler,
        session: SessionCell,
    ) -> Self {
        Self {
            engine,
            traits,
            handler,
            session,
            setup_done: false,
            engine_up: false,
        }
    }

    /// The live session, if any.
    #[must_use]
    pub fn session(&self) -> Option<SessionId> {
        self.session.get()
    }

    /// Whether `initialize` has run without a matching `finalize`.
    #[must_use]
    pub const fn is_engine_up(&self) -> bool {
        self.engine_up
    }

    /// Initialise the engine and start it, running a full maintenance pass
    /// when `restart` is set. Blocks until maintenance finishes.
    ///
    /// # Errors
    /// Returns `EngineStart` if the engine does not start; the engine is
    /// finalised again and no session remains.
    pub fn bring_up(&mut self, restart: bool) -> Result<(), ManagerError> {
        if self.engine_up {
            // Left running by a failed session step; restart from clean.
            tracing::warn!("engine still up, finalizing before bring-up");
            self.engine.finalize();
            self.engine_up = false;
        }
        if !self.setup_done {
            self.engine.setup(&self.traits);
            self.setup_done = true;
        }
        self.engine.initialize(&self.traits);
        self.engine
            .set_notification_handler(Arc::clone(&self.handler));
        self.engine_up = true;

        let started = if restart {
            self.engine.start_maintenance(true)
        } else {
            self.engine.start_quick()
        };
        if !started {
            tracing::error!(restart, "engine failed to start");
            self.engine.finalize();
            self.engine_up = false;
            self.session.set(None);
            return Err(ManagerError::EngineStart);
        }

        self.engine.join_maintenance_thread();
        tracing::info!(restart, "engine started");
        Ok(())
    }

    /// Ask the engine for a fresh session and give it the default options.
    ///
    /// # Errors
    /// Returns `SessionCreation` if the engine hands back an invalid handle.
    pub fn create_session(&mut self) -> Result<SessionId, ManagerError> {
        let session = self.engine.create_session();
        if !session.is_valid() {
            tracing::error!("engine refused to create a session");
            self.session.set(None);
            return Err(ManagerError::SessionCreation);
        }
        self.engine.set_option(session, SOFT_CURSOR_OPTION, true);
        self.session.set(Some(session));
        tracing::debug!(%session, "session created");
        Ok(session)
    }

    /// Destroy the current session, then finalise the engine.
    ///
    /// # Errors
    /// Returns `SessionTeardown` if the engine will not destroy the session;
    /// the engine is not finalised and the session reference is kept.
    pub fn teardown(&mut self) -> Result<(), ManagerError> {
        if let Some(session) = self.session.get() {
            if !self.engine.destroy_session(session) {
                tracing::error!(%session, "failed to destroy session");
                return Err(ManagerError::SessionTeardown(session));
            }
            self.session.set(None);
        }
        if self.engine_up {
            self.engine.finalize();
            self.engine_up = false;
            tracing::info!("engine finalized");
        }
        Ok(())
    }

    /// Tear down, restart with a maintenance pass, and open a new session.
    ///
    /// # Errors
    /// Returns the first step's error. A failed teardown still drops the
    /// session reference, so nothing points at a half-dead session.
    pub fn redeploy(&mut self) -> Result<SessionId, ManagerError> {
        if let Err(e) = self.teardown() {
            self.session.set(None);
            return Err(e);
        }
        self.bring_up(true)?;
        self.create_session()
    }

    /// Replace the current session with a new one.
    ///
    /// # Errors
    /// Returns `SessionTeardown` if the old session cannot be destroyed (it
    /// stays current), or `SessionCreation` if no new one is granted.
    pub fn recreate_session(&mut self) -> Result<SessionId, ManagerError> {
        if let Some(session) = self.session.get() {
            if !self.engine.destroy_session(session) {
                tracing::warn!(%session, "failed to destroy session before recreating");
                return Err(ManagerError::SessionTeardown(session));
            }
            self.session.set(None);
        }
        self.create_session()
    }
}

#[cfg(test)]
mod tests {
    use rime_bridge_core::testing::ScriptedEngine;

    use super::*;

    fn manager() -> (Arc<ScriptedEngine>, SessionManager<ScriptedEngine>) {
        let engine = Arc::new(ScriptedEngine::new());
        let traits = EngineTraits {
            shared_data_dir: "/usr/share/rime-data".into(),
            user_data_dir: "/tmp/rime".into(),
            app_name: "rime.test".to_string(),
        };
        let handler: NotificationHandler = Arc::new(|_: SessionId, _: &str, _: &str| {});
        let manager = SessionManager::new(Arc::clone(&engine), traits, handler, SessionCell::default());
        (engine, manager)
    }

    #[test]
    fn test_quick_start_sequence() {
        let (engine, mut manager) = manager();
        manager.bring_up(false).unwrap();
        let session = manager.create_session().unwrap();
        assert_eq!(manager.session(), Some(session));
        assert_eq!(
            engine.calls(),
            [
                "setup",
                "initialize",
                "set_notification_handler",
                "start_quick",
                "join_maintenance_thread",
                "create_session",
                "set_option(soft_cursor, true)",
            ]
        );
        assert_eq!(engine.traits().unwrap().app_name, "rime.test");
    }

    #[test]
    fn test_setup_runs_once() {
        let (engine, mut manager) = manager();
        manager.bring_up(false).unwrap();
        manager.create_session().unwrap();
        manager.redeploy().unwrap();
        let setups = engine.calls().iter().filter(|c| *c == "setup").count();
        assert_eq!(setups, 1);
    }

    #[test]
    fn test_start_failure_leaves_nothing() {
        let (engine, mut manager) = manager();
        engine.fail_start(true);
        assert_eq!(manager.bring_up(false), Err(ManagerError::EngineStart));
        assert!(!manager.is_engine_up());
        assert_eq!(manager.session(), None);
        assert_eq!(engine.calls().last().map(String::as_str), Some("finalize"));
    }

    #[test]
    fn test_teardown_failure_skips_finalize() {
        let (engine, mut manager) = manager();
        manager.bring_up(false).unwrap();
        let session = manager.create_session().unwrap();
        engine.fail_destroy(true);
        engine.clear_calls();

        assert_eq!(manager.teardown(), Err(ManagerError::SessionTeardown(session)));
        assert!(!engine.calls().iter().any(|c| c == "finalize"));
        assert!(manager.is_engine_up());
        assert_eq!(manager.session(), Some(session));
    }

    #[test]
    fn test_redeploy_replaces_session() {
        let (engine, mut manager) = manager();
        manager.bring_up(false).unwrap();
        let first = manager.create_session().unwrap();
        engine.clear_calls();

        let second = manager.redeploy().unwrap();
        assert_ne!(first, second);
        assert_eq!(engine.live_sessions(), 1);
        let calls = engine.calls();
        assert_eq!(calls[0], format!("destroy_session({})", first.0));
        assert_eq!(calls[1], "finalize");
        assert!(calls.contains(&"start_maintenance(true)".to_string()));
    }

    #[test]
    fn test_redeploy_teardown_failure_clears_session() {
        let (engine, mut manager) = manager();
        manager.bring_up(false).unwrap();
        let session = manager.create_session().unwrap();
        engine.fail_destroy(true);

        assert_eq!(manager.redeploy(), Err(ManagerError::SessionTeardown(session)));
        assert_eq!(manager.session(), None);
    }

    #[test]
    fn test_redeploy_restart_failure() {
        let (engine, mut manager) = manager();
        manager.bring_up(false).unwrap();
        manager.create_session().unwrap();
        engine.fail_start(true);
        engine.clear_calls();

        assert_eq!(manager.redeploy(), Err(ManagerError::EngineStart));
        assert_eq!(manager.session(), None);
        assert_eq!(engine.live_sessions(), 0);
        assert!(!engine.calls().iter().any(|c| c == "create_session"));
    }

    #[test]
    fn test_bring_up_finalizes_running_engine() {
        let (engine, mut manager) = manager();
        manager.bring_up(false).unwrap();
        engine.fail_create(true);
        assert_eq!(manager.create_session(), Err(ManagerError::SessionCreation));
        assert!(manager.is_engine_up());
        engine.fail_create(false);
        engine.clear_calls();

        manager.bring_up(false).unwrap();
        assert_eq!(engine.calls()[..2], ["finalize", "initialize"]);
    }

    #[test]
    fn test_create_failure() {
        let (engine, mut manager) = manager();
        manager.bring_up(false).unwrap();
        engine.fail_create(true);
        assert_eq!(manager.create_session(), Err(ManagerError::SessionCreation));
        assert_eq!(manager.session(), None);
    }
}
