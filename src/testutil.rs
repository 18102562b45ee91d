//! Shared test doubles: a scriptable in-memory backend and a recording
//! status sink.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::backend::{BackendError, BackendResult, SessionId, TabId, TerminalBackend};
use crate::layout::{LayoutNode, SplitAxis};
use crate::status::StatusSink;

#[derive(Default)]
struct MockState {
    sessions: Vec<(SessionId, TabId)>,
    layouts: HashMap<TabId, LayoutNode>,
    current_tab: Option<TabId>,
    focus: HashMap<TabId, SessionId>,
    sent: Vec<(SessionId, String)>,
    activated: Vec<SessionId>,
    fail_next_list: bool,
}

pub struct MockBackend {
    state: Mutex<MockState>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
        }
    }

    pub fn add_session(&self, session: &str, tab: &str) {
        self.state
            .lock()
            .unwrap()
            .sessions
            .push((SessionId::from(session), TabId::from(tab)));
    }

    pub fn remove_session(&self, session: &str) {
        let id = SessionId::from(session);
        self.state
            .lock()
            .unwrap()
            .sessions
            .retain(|(s, _)| *s != id);
    }

    /// Script a tab's layout as a single row of side-by-side panes.
    pub fn set_columns(&self, tab: &str, sessions: &[&str]) {
        let node = match sessions {
            [only] => LayoutNode::Leaf(SessionId::from(*only)),
            many => LayoutNode::Split {
                axis: SplitAxis::Horizontal,
                children: many
                    .iter()
                    .map(|s| LayoutNode::Leaf(SessionId::from(*s)))
                    .collect(),
            },
        };
        self.state
            .lock()
            .unwrap()
            .layouts
            .insert(TabId::from(tab), node);
    }

    pub fn set_layout(&self, tab: &str, node: LayoutNode) {
        self.state
            .lock()
            .unwrap()
            .layouts
            .insert(TabId::from(tab), node);
    }

    pub fn set_current_tab(&self, tab: &str) {
        self.state.lock().unwrap().current_tab = Some(TabId::from(tab));
    }

    pub fn set_focus(&self, tab: &str, session: &str) {
        let mut state = self.state.lock().unwrap();
        state.current_tab = Some(TabId::from(tab));
        state
            .focus
            .insert(TabId::from(tab), SessionId::from(session));
    }

    pub fn clear_focus(&self) {
        self.state.lock().unwrap().focus.clear();
    }

    pub fn fail_next_list(&self) {
        self.state.lock().unwrap().fail_next_list = true;
    }

    pub fn sent(&self) -> Vec<(SessionId, String)> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn activated(&self) -> Vec<SessionId> {
        self.state.lock().unwrap().activated.clone()
    }
}

#[async_trait]
impl TerminalBackend for MockBackend {
    async fn list_target_sessions(&self) -> BackendResult<Vec<SessionId>> {
        let mut state = self.state.lock().unwrap();
        if state.fail_next_list {
            state.fail_next_list = false;
            return Err(BackendError::Unavailable("scripted failure".into()));
        }
        Ok(state.sessions.iter().map(|(s, _)| s.clone()).collect())
    }

    async fn owning_tab(&self, session: &SessionId) -> BackendResult<Option<TabId>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .sessions
            .iter()
            .find(|(s, _)| s == session)
            .map(|(_, t)| t.clone()))
    }

    async fn layout_tree(&self, tab: &TabId) -> BackendResult<LayoutNode> {
        let state = self.state.lock().unwrap();
        state
            .layouts
            .get(tab)
            .cloned()
            .ok_or_else(|| BackendError::Protocol(format!("no layout for tab {tab}")))
    }

    async fn focused_session(&self, tab: &TabId) -> BackendResult<Option<SessionId>> {
        Ok(self.state.lock().unwrap().focus.get(tab).cloned())
    }

    async fn current_tab(&self) -> BackendResult<Option<TabId>> {
        Ok(self.state.lock().unwrap().current_tab.clone())
    }

    async fn activate(&self, session: &SessionId) -> BackendResult<()> {
        self.state.lock().unwrap().activated.push(session.clone());
        Ok(())
    }

    async fn send_text(&self, session: &SessionId, text: &str) -> BackendResult<()> {
        self.state
            .lock()
            .unwrap()
            .sent
            .push((session.clone(), text.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingStatus {
    pub updates: Mutex<Vec<(String, bool)>>,
    pub listening: Mutex<Vec<bool>>,
    pub clears: Mutex<usize>,
}

impl RecordingStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_update(&self) -> Option<String> {
        self.updates
            .lock()
            .unwrap()
            .last()
            .map(|(text, _)| text.clone())
    }

    pub fn updates(&self) -> Vec<(String, bool)> {
        self.updates.lock().unwrap().clone()
    }
}

impl StatusSink for RecordingStatus {
    fn update(&self, text: &str, is_final: bool) {
        self.updates
            .lock()
            .unwrap()
            .push((text.to_string(), is_final));
    }

    fn set_listening(&self, listening: bool) {
        self.listening.lock().unwrap().push(listening);
    }

    fn clear(&self) {
        *self.clears.lock().unwrap() += 1;
    }
}
