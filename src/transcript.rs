//! Transcript event source
//!
//! The daemon consumes an unbounded stream of transcript events; who
//! produces them (cloud STT, local model, a human typing) is not the
//! core's business. Events arrive over a flume channel, FIFO per source.

use std::io::BufRead;
use std::thread;

/// One event from a transcript source.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptEvent {
    /// A piece of recognized speech. Interim results (`is_final == false`)
    /// are display-only; final results get classified and dispatched.
    Transcript { text: String, is_final: bool },
    /// Silence detected - the utterance ended without further text.
    UtteranceEnd,
}

impl TranscriptEvent {
    pub fn final_text(text: impl Into<String>) -> Self {
        Self::Transcript {
            text: text.into(),
            is_final: true,
        }
    }

    pub fn interim_text(text: impl Into<String>) -> Self {
        Self::Transcript {
            text: text.into(),
            is_final: false,
        }
    }
}

/// Spawn a reader thread that turns stdin lines into final transcripts.
///
/// This is the typed stand-in for a streaming speech provider: each line is
/// one final transcript. The channel disconnects on EOF, which ends the
/// dispatch loop.
pub fn stdin_source() -> flume::Receiver<TranscriptEvent> {
    let (tx, rx) = flume::unbounded();

    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let line = line.trim().to_string();
            if line.is_empty() {
                if tx.send(TranscriptEvent::UtteranceEnd).is_err() {
                    break;
                }
                continue;
            }
            if tx.send(TranscriptEvent::final_text(line)).is_err() {
                break;
            }
        }
    });

    rx
}
