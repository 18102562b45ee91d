//! Terminal backend interface
//!
//! The core never talks to a multiplexer directly; it goes through this
//! trait so the registry and dispatcher can be tested against a mock and
//! the real tmux implementation stays at the edge. Session and tab handles
//! are opaque stable ids - the core never holds references into
//! backend-owned structures across calls.

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

use crate::layout::LayoutNode;

/// Opaque stable id for one terminal pane (tmux: `%3`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

/// Opaque stable id for the tab/window a pane lives in (tmux: `@1`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TabId(String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TabId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TabId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TabId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Error)]
pub enum BackendError {
    /// The call did not finish within the configured deadline.
    #[error("backend call timed out")]
    Timeout,
    /// The multiplexer could not be reached (server gone, command failed).
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    /// The multiplexer answered with something we could not interpret.
    #[error("backend protocol error: {0}")]
    Protocol(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Everything the core needs from a terminal multiplexer. Every call may
/// fail or hang; callers wrap them in timeouts and treat failures as soft.
#[async_trait]
pub trait TerminalBackend: Send + Sync {
    /// Enumerate panes classified as voice-controllable targets.
    async fn list_target_sessions(&self) -> BackendResult<Vec<SessionId>>;

    /// The tab a session belongs to, or None if it vanished.
    async fn owning_tab(&self, session: &SessionId) -> BackendResult<Option<TabId>>;

    /// Fresh snapshot of a tab's split tree.
    async fn layout_tree(&self, tab: &TabId) -> BackendResult<LayoutNode>;

    /// The session holding focus in a tab, if any.
    async fn focused_session(&self, tab: &TabId) -> BackendResult<Option<SessionId>>;

    /// The tab the user is currently looking at.
    async fn current_tab(&self) -> BackendResult<Option<TabId>>;

    /// Bring a session to focus.
    async fn activate(&self, session: &SessionId) -> BackendResult<()>;

    /// Send text to a session as if typed.
    async fn send_text(&self, session: &SessionId, text: &str) -> BackendResult<()>;
}
