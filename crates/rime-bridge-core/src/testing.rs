//! Scripted in-memory engine for exercising the bridge without a real IME.

use std::{
    collections::{HashMap, HashSet},
    sync::{Mutex, MutexGuard, PoisonError},
};

use crate::engine::{
    Engine, EngineTraits, NotificationHandler, RawCandidate, RawCommit, RawComposition,
    RawContext, RawMenu, SchemaInfo, SessionId, SwitchGroup,
};

#[derive(Default)]
struct State {
    calls: Vec<String>,
    traits: Option<EngineTraits>,
    handler: Option<NotificationHandler>,

    next_session: u64,
    live_sessions: HashSet<u64>,
    options: HashMap<(u64, String), bool>,
    preferences: Vec<(u64, String, i32)>,
    current_schema: HashMap<u64, String>,

    preedit: String,
    selection: Option<(usize, usize)>,
    candidates: Vec<RawCandidate>,
    labels: Option<Vec<Option<String>>>,
    page_size: usize,
    page_no: usize,
    highlighted: usize,
    pending_commit: Option<String>,

    schemas: Option<Vec<SchemaInfo>>,
    switches: Option<Vec<SwitchGroup>>,

    fail_start: bool,
    fail_create: bool,
    fail_destroy: bool,
    fail_keys: bool,

    outstanding_commits: i64,
    outstanding_contexts: i64,
}

/// A deterministic engine whose composition, candidates and failures are
/// scripted by the test.
///
/// Plain characters in a key sequence are appended to the preedit. Braced
/// keys are interpreted loosely: `{BackSpace}` and `{Escape}` edit, a
/// single-character key such as `{a}` or `{Shift+A}` types it, and anything
/// else is accepted and ignored. The candidate menu is whatever the test
/// scripted, paged by `page_size` (default 5).
pub struct ScriptedEngine {
    state: Mutex<State>,
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedEngine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                page_size: 5,
                ..State::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(state: &mut State, call: impl Into<String>) {
        state.calls.push(call.into());
    }

    /// Every engine call so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    #[must_use]
    pub fn outstanding_commits(&self) -> i64 {
        self.lock().outstanding_commits
    }

    #[must_use]
    pub fn outstanding_contexts(&self) -> i64 {
        self.lock().outstanding_contexts
    }

    #[must_use]
    pub fn live_sessions(&self) -> usize {
        self.lock().live_sessions.len()
    }

    #[must_use]
    pub fn traits(&self) -> Option<EngineTraits> {
        self.lock().traits.clone()
    }

    /// Preferences applied so far as `(session, name, value)`.
    #[must_use]
    pub fn applied_preferences(&self) -> Vec<(u64, String, i32)> {
        self.lock().preferences.clone()
    }

    pub fn script_commit(&self, text: &str) {
        self.lock().pending_commit = Some(text.to_string());
    }

    pub fn script_candidates<I, S>(&self, texts: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock().candidates = texts
            .into_iter()
            .map(|text| RawCandidate {
                text: text.into(),
                comment: None,
            })
            .collect();
    }

    pub fn script_comment(&self, index: usize, comment: &str) {
        if let Some(candidate) = self.lock().candidates.get_mut(index) {
            candidate.comment = Some(comment.to_string());
        }
    }

    pub fn script_labels(&self, labels: Option<Vec<Option<String>>>) {
        self.lock().labels = labels;
    }

    /// Byte offsets of the active selection; `None` selects the whole preedit.
    pub fn script_selection(&self, selection: Option<(usize, usize)>) {
        self.lock().selection = selection;
    }

    pub fn script_page_size(&self, page_size: usize) {
        self.lock().page_size = page_size.max(1);
    }

    pub fn script_schemas(&self, schemas: Option<Vec<SchemaInfo>>) {
        self.lock().schemas = schemas;
    }

    pub fn script_switches(&self, switches: Option<Vec<SwitchGroup>>) {
        self.lock().switches = switches;
    }

    pub fn fail_start(&self, fail: bool) {
        self.lock().fail_start = fail;
    }

    pub fn fail_create(&self, fail: bool) {
        self.lock().fail_create = fail;
    }

    pub fn fail_destroy(&self, fail: bool) {
        self.lock().fail_destroy = fail;
    }

    pub fn fail_keys(&self, fail: bool) {
        self.lock().fail_keys = fail;
    }

    /// Fire a notification through the registered handler, as the engine's
    /// own thread would.
    pub fn notify(&self, session: SessionId, kind: &str, value: &str) {
        let handler = self.lock().handler.clone();
        if let Some(handler) = handler {
            handler(session, kind, value);
        }
    }

    fn is_live(state: &State, session: SessionId) -> bool {
        state.live_sessions.contains(&session.0)
    }

    fn page_range(state: &State) -> (usize, usize) {
        let start = (state.page_no * state.page_size).min(state.candidates.len());
        let end = (start + state.page_size).min(state.candidates.len());
        (start, end)
    }

    fn type_keys(state: &mut State, keys: &str) {
        let mut rest = keys;
        while let Some(c) = rest.chars().next() {
            if c == '{' {
                if let Some(end) = rest.find('}') {
                    Self::type_named_key(state, &rest[1..end]);
                    rest = &rest[end + 1..];
                    continue;
                }
            }
            state.preedit.push(c);
            rest = &rest[c.len_utf8()..];
        }
    }

    fn type_named_key(state: &mut State, key: &str) {
        let key = key.strip_prefix("Shift+").unwrap_or(key);
        match key {
            "BackSpace" => {
                state.preedit.pop();
            }
            "Escape" => Self::reset_composition(state),
            _ => {
                let mut chars = key.chars();
                if let (Some(c), None) = (chars.next(), chars.next()) {
                    state.preedit.push(c);
                }
            }
        }
    }

    fn reset_composition(state: &mut State) {
        state.preedit.clear();
        state.page_no = 0;
        state.highlighted = 0;
    }
}

impl Engine for ScriptedEngine {
    fn setup(&self, traits: &EngineTraits) {
        let mut state = self.lock();
        Self::record(&mut state, "setup");
        state.traits = Some(traits.clone());
    }

    fn initialize(&self, traits: &EngineTraits) {
        let mut state = self.lock();
        Self::record(&mut state, "initialize");
        state.traits = Some(traits.clone());
    }

    fn finalize(&self) {
        let mut state = self.lock();
        Self::record(&mut state, "finalize");
        state.handler = None;
    }

    fn set_notification_handler(&self, handler: NotificationHandler) {
        let mut state = self.lock();
        Self::record(&mut state, "set_notification_handler");
        state.handler = Some(handler);
    }

    fn start_maintenance(&self, full_check: bool) -> bool {
        let ok = {
            let mut state = self.lock();
            Self::record(&mut state, format!("start_maintenance({full_check})"));
            !state.fail_start
        };
        if ok {
            self.notify(SessionId(0), "deploy", "start");
        }
        ok
    }

    fn start_quick(&self) -> bool {
        let mut state = self.lock();
        Self::record(&mut state, "start_quick");
        !state.fail_start
    }

    fn join_maintenance_thread(&self) {
        let deploying = {
            let mut state = self.lock();
            Self::record(&mut state, "join_maintenance_thread");
            state
                .calls
                .iter()
                .rev()
                .find(|c| c.starts_with("start_"))
                .is_some_and(|c| c.starts_with("start_maintenance"))
        };
        if deploying {
            self.notify(SessionId(0), "deploy", "success");
        }
    }

    fn create_session(&self) -> SessionId {
        let mut state = self.lock();
        Self::record(&mut state, "create_session");
        if state.fail_create {
            return SessionId(0);
        }
        state.next_session += 1;
        let id = state.next_session;
        state.live_sessions.insert(id);
        Self::reset_composition(&mut state);
        SessionId(id)
    }

    fn destroy_session(&self, session: SessionId) -> bool {
        let mut state = self.lock();
        Self::record(&mut state, format!("destroy_session({})", session.0));
        if state.fail_destroy {
            return false;
        }
        state.live_sessions.remove(&session.0)
    }

    fn simulate_key_sequence(&self, session: SessionId, keys: &str) -> bool {
        let mut state = self.lock();
        Self::record(&mut state, format!("simulate_key_sequence({keys})"));
        if state.fail_keys || !Self::is_live(&state, session) {
            return false;
        }
        Self::type_keys(&mut state, keys);
        state.page_no = 0;
        state.highlighted = 0;
        true
    }

    fn select_candidate_on_current_page(&self, session: SessionId, index: usize) -> bool {
        let mut state = self.lock();
        Self::record(&mut state, format!("select_candidate({index})"));
        if !Self::is_live(&state, session) || state.preedit.is_empty() {
            return false;
        }
        let (start, end) = Self::page_range(&state);
        if start + index >= end {
            return false;
        }
        state.pending_commit = Some(state.candidates[start + index].text.clone());
        Self::reset_composition(&mut state);
        true
    }

    fn delete_candidate_on_current_page(&self, session: SessionId, index: usize) -> bool {
        let mut state = self.lock();
        Self::record(&mut state, format!("delete_candidate({index})"));
        if !Self::is_live(&state, session) || state.preedit.is_empty() {
            return false;
        }
        let (start, end) = Self::page_range(&state);
        if start + index >= end {
            return false;
        }
        state.candidates.remove(start + index);
        true
    }

    fn change_page(&self, session: SessionId, backward: bool) -> bool {
        let mut state = self.lock();
        Self::record(&mut state, format!("change_page({backward})"));
        if !Self::is_live(&state, session) || state.preedit.is_empty() {
            return false;
        }
        if backward {
            if state.page_no == 0 {
                return false;
            }
            state.page_no -= 1;
        } else {
            let (_, end) = Self::page_range(&state);
            if end >= state.candidates.len() {
                return false;
            }
            state.page_no += 1;
        }
        state.highlighted = 0;
        true
    }

    fn clear_composition(&self, session: SessionId) {
        let mut state = self.lock();
        Self::record(&mut state, "clear_composition");
        if Self::is_live(&state, session) {
            Self::reset_composition(&mut state);
        }
    }

    fn get_commit(&self, session: SessionId) -> Option<RawCommit> {
        let mut state = self.lock();
        if !Self::is_live(&state, session) {
            return None;
        }
        let text = state.pending_commit.take()?;
        state.outstanding_commits += 1;
        Some(RawCommit { text: Some(text) })
    }

    fn free_commit(&self, commit: &mut RawCommit) -> bool {
        let mut state = self.lock();
        state.outstanding_commits -= 1;
        commit.text = None;
        true
    }

    fn get_context(&self, session: SessionId) -> Option<RawContext> {
        let mut state = self.lock();
        if !Self::is_live(&state, session) {
            return None;
        }
        state.outstanding_contexts += 1;
        if state.preedit.is_empty() {
            return Some(RawContext::default());
        }
        let len = state.preedit.len();
        let (sel_start, sel_end) = state.selection.unwrap_or((0, len));
        let (start, end) = Self::page_range(&state);
        let labels = state
            .labels
            .as_ref()
            .map(|labels| labels.iter().take(end - start).cloned().collect());
        Some(RawContext {
            composition: RawComposition {
                length: len,
                cursor_pos: len,
                sel_start,
                sel_end,
                preedit: Some(state.preedit.clone()),
            },
            menu: RawMenu {
                page_size: state.page_size,
                page_no: state.page_no,
                is_last_page: end >= state.candidates.len(),
                highlighted_candidate_index: state.highlighted,
                candidates: state.candidates[start..end].to_vec(),
            },
            select_labels: labels,
        })
    }

    fn free_context(&self, context: &mut RawContext) -> bool {
        let mut state = self.lock();
        state.outstanding_contexts -= 1;
        *context = RawContext::default();
        true
    }

    fn set_option(&self, session: SessionId, name: &str, value: bool) {
        let mut state = self.lock();
        Self::record(&mut state, format!("set_option({name}, {value})"));
        state.options.insert((session.0, name.to_string()), value);
    }

    fn get_option(&self, session: SessionId, name: &str) -> bool {
        self.lock()
            .options
            .get(&(session.0, name.to_string()))
            .copied()
            .unwrap_or(false)
    }

    fn select_schema(&self, session: SessionId, schema_id: &str) -> bool {
        let name = {
            let mut state = self.lock();
            Self::record(&mut state, format!("select_schema({schema_id})"));
            let name = state.schemas.as_ref().and_then(|schemas| {
                schemas
                    .iter()
                    .find(|s| s.id == schema_id)
                    .map(|s| s.name.clone())
            });
            match name {
                Some(name) if Self::is_live(&state, session) => {
                    state
                        .current_schema
                        .insert(session.0, schema_id.to_string());
                    name
                }
                _ => return false,
            }
        };
        self.notify(session, "schema", &format!("{schema_id}/{name}"));
        true
    }

    fn current_schema(&self, session: SessionId) -> Option<String> {
        self.lock().current_schema.get(&session.0).cloned()
    }

    fn schema_list(&self) -> Option<Vec<SchemaInfo>> {
        let mut state = self.lock();
        Self::record(&mut state, "schema_list");
        state.schemas.clone()
    }

    fn switches(&self, session: SessionId) -> Option<Vec<SwitchGroup>> {
        let mut state = self.lock();
        Self::record(&mut state, format!("switches({})", session.0));
        state.switches.clone()
    }

    fn apply_preference(&self, session: SessionId, name: &str, value: i32) -> bool {
        let mut state = self.lock();
        Self::record(&mut state, format!("apply_preference({name}, {value})"));
        state.preferences.push((session.0, name.to_string(), value));
        true
    }
}
