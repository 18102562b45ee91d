//! Session registry - tracks voice-target sessions and arbitrates focus.
//!
//! The registry never trusts its own cache over the multiplexer: refresh
//! re-enumerates from scratch and diffs, and active-session resolution asks
//! for live focus before falling back to the cached id. All backend calls
//! run under a per-call deadline; a hung multiplexer degrades a single
//! operation, never the daemon.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{BackendError, BackendResult, SessionId, TabId, TerminalBackend};
use crate::layout::{self, PanePlacement};
use crate::position::PanePosition;

/// Escape + Ctrl+C + Ctrl+U: abort any multi-line input, then blank the line.
const CLEAR_LINE_SEQ: &str = "\x1b\x03\x15";

/// One tracked voice-target session.
#[derive(Debug, Clone)]
pub struct ManagedSession {
    pub session: SessionId,
    pub tab: TabId,
    pub placement: Option<PanePlacement>,
    pub is_active: bool,
}

pub struct SessionRegistry {
    backend: Arc<dyn TerminalBackend>,
    sessions: HashMap<SessionId, ManagedSession>,
    active_id: Option<SessionId>,
    call_timeout: Duration,
}

async fn with_deadline<T>(
    deadline: Duration,
    fut: impl Future<Output = BackendResult<T>>,
) -> BackendResult<T> {
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(BackendError::Timeout),
    }
}

impl SessionRegistry {
    pub fn new(backend: Arc<dyn TerminalBackend>, call_timeout: Duration) -> Self {
        Self {
            backend,
            sessions: HashMap::new(),
            active_id: None,
            call_timeout,
        }
    }

    /// Re-enumerate target sessions, diff against the registry, and
    /// recompute every pane placement from fresh layout trees.
    pub async fn refresh(&mut self) -> BackendResult<()> {
        let observed =
            with_deadline(self.call_timeout, self.backend.list_target_sessions()).await?;

        for session in &observed {
            if self.sessions.contains_key(session) {
                continue;
            }
            match with_deadline(self.call_timeout, self.backend.owning_tab(session)).await {
                Ok(Some(tab)) => {
                    log::info!("registered new target session {session} in tab {tab}");
                    self.sessions.insert(
                        session.clone(),
                        ManagedSession {
                            session: session.clone(),
                            tab,
                            placement: None,
                            is_active: false,
                        },
                    );
                }
                Ok(None) => log::debug!("session {session} has no owning tab, skipping"),
                Err(e) => log::warn!("could not resolve tab for {session}: {e}"),
            }
        }

        let vanished: Vec<SessionId> = self
            .sessions
            .keys()
            .filter(|id| !observed.contains(id))
            .cloned()
            .collect();
        for id in vanished {
            log::info!("removed target session {id}");
            self.sessions.remove(&id);
            if self.active_id.as_ref() == Some(&id) {
                self.active_id = None;
            }
        }

        self.update_placements().await;
        Ok(())
    }

    /// Recompute placements grouped by tab: one layout fetch per distinct
    /// tab, not one per session.
    async fn update_placements(&mut self) {
        let mut tabs: HashMap<TabId, Vec<SessionId>> = HashMap::new();
        for managed in self.sessions.values() {
            tabs.entry(managed.tab.clone())
                .or_default()
                .push(managed.session.clone());
        }

        for (tab, members) in tabs {
            let tree = match with_deadline(self.call_timeout, self.backend.layout_tree(&tab)).await
            {
                Ok(tree) => tree,
                Err(e) => {
                    log::warn!("layout fetch failed for tab {tab}: {e}");
                    continue;
                }
            };
            let placements = layout::compute_positions(&tree);
            for id in members {
                if let Some(managed) = self.sessions.get_mut(&id) {
                    managed.placement =
                        placements.iter().find(|p| p.session == id).cloned();
                }
            }
        }
    }

    /// Resolve the session dictation should go to.
    ///
    /// Live focus wins over the cache: if the currently focused pane is a
    /// registered target, it is adopted as active. Otherwise the cached
    /// active id is used if still known, then a sole registered session,
    /// then nothing.
    pub async fn get_active_session(&mut self) -> Option<SessionId> {
        if let Ok(Some(tab)) = with_deadline(self.call_timeout, self.backend.current_tab()).await
        {
            if let Ok(Some(focused)) =
                with_deadline(self.call_timeout, self.backend.focused_session(&tab)).await
            {
                if self.sessions.contains_key(&focused) {
                    self.active_id = Some(focused.clone());
                    return Some(focused);
                }
            }
        }

        if let Some(id) = &self.active_id {
            if self.sessions.contains_key(id) {
                return Some(id.clone());
            }
        }

        if self.sessions.len() == 1 {
            let id = self.sessions.keys().next().cloned();
            self.active_id = id.clone();
            return id;
        }

        None
    }

    /// Focus a session and mark it active.
    pub async fn set_active_session(&mut self, session: &SessionId) {
        if let Err(e) = with_deadline(self.call_timeout, self.backend.activate(session)).await {
            log::warn!("failed to activate {session}: {e}");
        }

        if !self.sessions.contains_key(session) {
            log::warn!("activated session {session} is not a registered target");
            for managed in self.sessions.values_mut() {
                managed.is_active = false;
            }
            return;
        }

        self.active_id = Some(session.clone());
        for managed in self.sessions.values_mut() {
            managed.is_active = managed.session == *session;
        }
    }

    /// Find the pane at a spoken position in the tab the user is looking
    /// at. The layout tree is re-read on every call; cached geometry would
    /// go stale the moment a pane opens or closes.
    pub async fn get_session_for_position(
        &mut self,
        position: PanePosition,
    ) -> Option<SessionId> {
        let tab = match with_deadline(self.call_timeout, self.backend.current_tab()).await {
            Ok(Some(tab)) => tab,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("could not resolve current tab: {e}");
                return None;
            }
        };

        let tree = match with_deadline(self.call_timeout, self.backend.layout_tree(&tab)).await {
            Ok(tree) => tree,
            Err(e) => {
                log::warn!("layout fetch failed for tab {tab}: {e}");
                return None;
            }
        };

        let placements = layout::compute_positions(&tree);
        layout::find_pane_by_position(&placements, position)
    }

    /// Send text to the active session as-is. False if nothing resolves.
    pub async fn send_text_to_active(&mut self, text: &str) -> bool {
        let Some(session) = self.get_active_session().await else {
            log::warn!("no active session to send text to");
            return false;
        };
        self.deliver(&session, text).await
    }

    /// Send text followed by a carriage return (the Enter key).
    pub async fn submit_to_active(&mut self, text: &str) -> bool {
        let Some(session) = self.get_active_session().await else {
            log::warn!("no active session to submit to");
            return false;
        };
        let mut payload = text.to_string();
        payload.push('\r');
        self.deliver(&session, &payload).await
    }

    /// Abort any partial input in the active session and blank the line.
    pub async fn clear_current_line(&mut self) -> bool {
        let Some(session) = self.get_active_session().await else {
            log::warn!("no active session to clear line in");
            return false;
        };
        self.deliver(&session, CLEAR_LINE_SEQ).await
    }

    async fn deliver(&self, session: &SessionId, payload: &str) -> bool {
        match with_deadline(self.call_timeout, self.backend.send_text(session, payload)).await {
            Ok(()) => true,
            Err(e) => {
                log::warn!("send to {session} failed: {e}");
                false
            }
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn sessions(&self) -> impl Iterator<Item = &ManagedSession> {
        self.sessions.values()
    }
}
