//! Dispatch loop: turns transcript events into buffer edits, navigation,
//! and submissions.
//!
//! Interim transcripts only touch the status sink. Final transcripts are
//! classified by the command parser and acted on; everything that is not a
//! command accumulates in the buffer until an end-of-input phrase submits
//! it in one piece.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::command::{CommandParser, ParsedCommand};
use crate::config::Config;
use crate::registry::SessionRegistry;
use crate::status::StatusSink;
use crate::transcript::TranscriptEvent;

pub struct Dispatcher {
    parser: CommandParser,
    registry: SessionRegistry,
    status: Arc<dyn StatusSink>,
    buffer: String,
    confirm_delay: Duration,
    refresh_interval: Duration,
}

impl Dispatcher {
    pub fn new(
        parser: CommandParser,
        registry: SessionRegistry,
        status: Arc<dyn StatusSink>,
        config: &Config,
    ) -> Self {
        Self {
            parser,
            registry,
            status,
            buffer: String::new(),
            confirm_delay: config.feedback.confirm_delay(),
            refresh_interval: Duration::from_secs(config.registry.refresh_interval_secs),
        }
    }

    /// Main loop. Exits when the shutdown flag flips or the transcript
    /// source disconnects.
    pub async fn run(
        mut self,
        events: flume::Receiver<TranscriptEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<()> {
        if let Err(e) = self.registry.refresh().await {
            log::warn!("initial session scan failed: {e}");
        }
        log::info!(
            "dispatcher started with {} target session(s)",
            self.registry.session_count()
        );
        self.status.set_listening(true);

        let mut refresh_tick = tokio::time::interval(self.refresh_interval);
        refresh_tick.tick().await; // first tick fires immediately, skip it

        loop {
            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    // A dropped sender counts as a stop request.
                    if changed.is_err() || *shutdown.borrow() {
                        log::info!("dispatcher shutting down");
                        break;
                    }
                }

                event = events.recv_async() => {
                    match event {
                        Ok(TranscriptEvent::Transcript { text, is_final }) => {
                            if is_final {
                                self.handle_final(&text).await;
                            } else {
                                self.handle_interim(&text);
                            }
                        }
                        Ok(TranscriptEvent::UtteranceEnd) => {
                            log::debug!("utterance end");
                        }
                        Err(_) => {
                            log::info!("transcript source disconnected");
                            break;
                        }
                    }
                }

                _ = refresh_tick.tick() => {
                    self.periodic_refresh().await;
                }
            }
        }

        self.status.set_listening(false);
        self.status.clear();
        Ok(())
    }

    fn handle_interim(&self, text: &str) {
        self.status.update(text, false);
        if self.parser.is_command_prefix(text) {
            // No action yet: only final transcripts trigger commands.
            log::debug!("interim looks like a command: {text:?}");
        }
    }

    async fn handle_final(&mut self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        self.status.update(text, true);

        match self.parser.parse(text) {
            ParsedCommand::WindowNavigation(position) => {
                log::info!("navigation request: {position}");
                match self.registry.get_session_for_position(position).await {
                    Some(session) => {
                        self.registry.set_active_session(&session).await;
                        self.status.update(&format!("Activated {position}"), true);
                    }
                    None => {
                        log::warn!("no pane found at {position}");
                        self.status.update(&format!("No window at {position}"), true);
                    }
                }
            }

            ParsedCommand::ClearRestart => {
                log::info!("clear and restart");
                self.buffer.clear();
                self.registry.clear_current_line().await;
                self.status.clear();
                self.status.set_listening(true);
            }

            ParsedCommand::EndOfInput(prefix) => {
                if let Some(prefix) = prefix {
                    self.append_to_buffer(&prefix);
                }
                self.submit_buffer().await;
            }

            ParsedCommand::PlainText(text) => {
                self.append_to_buffer(&text);
            }
        }
    }

    fn append_to_buffer(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if !self.buffer.is_empty() {
            self.buffer.push(' ');
        }
        self.buffer.push_str(text);
        log::debug!("buffer is now {:?}", self.buffer);
    }

    async fn submit_buffer(&mut self) {
        let text = self.buffer.trim().to_string();
        self.buffer.clear();
        if text.is_empty() {
            log::debug!("end of input with empty buffer, nothing to submit");
            return;
        }

        if self.registry.submit_to_active(&text).await {
            log::info!("submitted {} chars", text.len());
            self.status.update("Submitted!", true);
            if let Err(e) = self.registry.refresh().await {
                log::warn!("post-submit session scan failed: {e}");
            }
            if self.registry.session_count() > 0 {
                // Let the confirmation stay up for a beat, then go back to
                // listening. Done off the dispatch path so the loop keeps
                // handling transcripts in the meantime.
                let status = self.status.clone();
                let delay = self.confirm_delay;
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    status.clear();
                    status.set_listening(true);
                });
            } else {
                self.status.update("No active sessions", true);
            }
        } else {
            self.status.update("No active session", true);
        }
    }

    async fn periodic_refresh(&mut self) {
        let before = self.registry.session_count();
        if let Err(e) = self.registry.refresh().await {
            log::debug!("periodic session scan failed: {e}");
            return;
        }
        let after = self.registry.session_count();
        if before != after {
            log::info!("target sessions changed: {before} -> {after}");
        }
        if after == 0 && before > 0 {
            self.status.update("No active sessions", true);
        } else if before == 0 && after > 0 {
            self.status.clear();
            self.status.set_listening(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MockBackend, RecordingStatus};

    fn test_config() -> Config {
        let mut config = Config::default();
        config.feedback.confirm_delay_ms = 0;
        config
    }

    fn dispatcher_with(
        backend: Arc<MockBackend>,
        status: Arc<RecordingStatus>,
    ) -> Dispatcher {
        dispatcher_with_config(backend, status, test_config())
    }

    fn dispatcher_with_config(
        backend: Arc<MockBackend>,
        status: Arc<RecordingStatus>,
        config: Config,
    ) -> Dispatcher {
        let registry = SessionRegistry::new(backend, config.backend.call_timeout());
        let parser = CommandParser::new(&config.commands);
        Dispatcher::new(parser, registry, status, &config)
    }

    #[tokio::test]
    async fn test_plain_text_accumulates_with_spaces() {
        let backend = Arc::new(MockBackend::new());
        let status = Arc::new(RecordingStatus::new());
        let mut dispatcher = dispatcher_with(backend, status);

        dispatcher.handle_final("fix the failing").await;
        dispatcher.handle_final("test in parser").await;
        assert_eq!(dispatcher.buffer, "fix the failing test in parser");
    }

    #[tokio::test]
    async fn test_end_phrase_submits_buffer() {
        let backend = Arc::new(MockBackend::new());
        backend.add_session("%1", "@0");
        backend.set_columns("@0", &["%1"]);
        let status = Arc::new(RecordingStatus::new());
        let mut dispatcher = dispatcher_with(backend.clone(), status.clone());
        dispatcher.registry.refresh().await.unwrap();

        dispatcher.handle_final("run the tests").await;
        dispatcher.handle_final("end voice").await;

        assert_eq!(
            backend.sent(),
            vec![(crate::backend::SessionId::from("%1"), "run the tests\r".to_string())]
        );
        assert!(dispatcher.buffer.is_empty());
        assert!(status
            .updates()
            .iter()
            .any(|(t, _)| t == "Submitted!"));
    }

    #[tokio::test]
    async fn test_end_phrase_prefix_is_included() {
        let backend = Arc::new(MockBackend::new());
        backend.add_session("%1", "@0");
        backend.set_columns("@0", &["%1"]);
        let status = Arc::new(RecordingStatus::new());
        let mut dispatcher = dispatcher_with(backend.clone(), status);
        dispatcher.registry.refresh().await.unwrap();

        dispatcher.handle_final("list the files end voice").await;

        assert_eq!(
            backend.sent(),
            vec![(crate::backend::SessionId::from("%1"), "list the files\r".to_string())]
        );
    }

    #[tokio::test]
    async fn test_submit_confirmation_does_not_stall_dispatch() {
        let backend = Arc::new(MockBackend::new());
        backend.add_session("%1", "@0");
        backend.set_columns("@0", &["%1"]);
        let status = Arc::new(RecordingStatus::new());
        let mut config = test_config();
        config.feedback.confirm_delay_ms = 60_000;
        let mut dispatcher = dispatcher_with_config(backend.clone(), status.clone(), config);
        dispatcher.registry.refresh().await.unwrap();

        dispatcher.handle_final("run the tests").await;
        // The confirmation beat runs in the background; submitting must
        // return long before the delay elapses.
        tokio::time::timeout(
            Duration::from_millis(500),
            dispatcher.handle_final("end voice"),
        )
        .await
        .expect("submit blocked on the confirmation delay");

        assert_eq!(
            backend.sent(),
            vec![(crate::backend::SessionId::from("%1"), "run the tests\r".to_string())]
        );
        assert!(status.updates().iter().any(|(t, _)| t == "Submitted!"));
    }

    #[tokio::test]
    async fn test_empty_buffer_end_phrase_sends_nothing() {
        let backend = Arc::new(MockBackend::new());
        backend.add_session("%1", "@0");
        backend.set_columns("@0", &["%1"]);
        let status = Arc::new(RecordingStatus::new());
        let mut dispatcher = dispatcher_with(backend.clone(), status.clone());
        dispatcher.registry.refresh().await.unwrap();

        dispatcher.handle_final("end voice").await;

        assert!(backend.sent().is_empty());
        assert!(!status.updates().iter().any(|(t, _)| t == "Submitted!"));
    }

    #[tokio::test]
    async fn test_submit_without_session_reports_failure() {
        let backend = Arc::new(MockBackend::new());
        let status = Arc::new(RecordingStatus::new());
        let mut dispatcher = dispatcher_with(backend, status.clone());

        dispatcher.handle_final("hello there").await;
        dispatcher.handle_final("send it").await;

        assert_eq!(status.last_update().as_deref(), Some("No active session"));
        // The buffer is discarded even on failure; stale dictation must not
        // leak into the next utterance.
        assert!(dispatcher.buffer.is_empty());
    }

    #[tokio::test]
    async fn test_clear_restart_discards_buffer_and_clears_line() {
        let backend = Arc::new(MockBackend::new());
        backend.add_session("%1", "@0");
        backend.set_columns("@0", &["%1"]);
        let status = Arc::new(RecordingStatus::new());
        let mut dispatcher = dispatcher_with(backend.clone(), status.clone());
        dispatcher.registry.refresh().await.unwrap();

        dispatcher.handle_final("delete all my files").await;
        dispatcher.handle_final("never mind").await;

        assert!(dispatcher.buffer.is_empty());
        assert_eq!(
            backend.sent(),
            vec![(crate::backend::SessionId::from("%1"), "\x1b\x03\x15".to_string())]
        );
        assert_eq!(*status.clears.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_navigation_activates_pane() {
        let backend = Arc::new(MockBackend::new());
        backend.add_session("%1", "@0");
        backend.add_session("%2", "@0");
        backend.set_columns("@0", &["%1", "%2"]);
        backend.set_current_tab("@0");
        let status = Arc::new(RecordingStatus::new());
        let mut dispatcher = dispatcher_with(backend.clone(), status.clone());
        dispatcher.registry.refresh().await.unwrap();

        dispatcher.handle_final("switch to the right window").await;

        assert_eq!(
            backend.activated(),
            vec![crate::backend::SessionId::from("%2")]
        );
        assert_eq!(
            status.last_update().as_deref(),
            Some("Activated middle-right")
        );
    }

    #[tokio::test]
    async fn test_navigation_to_missing_pane_reports_position() {
        let backend = Arc::new(MockBackend::new());
        backend.add_session("%1", "@0");
        backend.set_columns("@0", &["%1"]);
        backend.set_current_tab("@0");
        let status = Arc::new(RecordingStatus::new());
        let mut dispatcher = dispatcher_with(backend.clone(), status.clone());
        dispatcher.registry.refresh().await.unwrap();

        dispatcher.handle_final("go to the upper left pane").await;

        assert!(backend.activated().is_empty());
        assert_eq!(
            status.last_update().as_deref(),
            Some("No window at upper-left")
        );
    }

    #[tokio::test]
    async fn test_interim_transcripts_do_not_touch_buffer() {
        let backend = Arc::new(MockBackend::new());
        let status = Arc::new(RecordingStatus::new());
        let mut dispatcher = dispatcher_with(backend, status.clone());

        dispatcher.handle_interim("fix the");
        dispatcher.handle_final("fix the failing test").await;

        assert_eq!(dispatcher.buffer, "fix the failing test");
        assert_eq!(
            status.updates(),
            vec![
                ("fix the".to_string(), false),
                ("fix the failing test".to_string(), true),
            ]
        );
    }

    #[tokio::test]
    async fn test_run_exits_on_shutdown() {
        let backend = Arc::new(MockBackend::new());
        let status = Arc::new(RecordingStatus::new());
        let dispatcher = dispatcher_with(backend, status);

        let (tx, rx) = flume::unbounded();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(dispatcher.run(rx, shutdown_rx));
        tx.send(TranscriptEvent::final_text("hello")).unwrap();
        shutdown_tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("dispatcher did not stop")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_run_exits_when_source_disconnects() {
        let backend = Arc::new(MockBackend::new());
        let status = Arc::new(RecordingStatus::new());
        let dispatcher = dispatcher_with(backend, status);

        let (tx, rx) = flume::unbounded();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(dispatcher.run(rx, shutdown_rx));
        drop(tx);

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("dispatcher did not stop")
            .unwrap()
            .unwrap();
    }
}
