//! Voice command parsing
//!
//! Classifies a final transcript into one of four buckets: a window
//! navigation command, an end-of-input command (submit the buffer), a
//! clear/restart command, or plain dictated text. Phrase matching is
//! case-insensitive substring containment, checked in a fixed priority
//! order so a transcript containing several phrase types resolves
//! deterministically.

use regex::Regex;

use crate::config::CommandsConfig;
use crate::position::{HorizontalPos, PanePosition, VerticalPos};

/// Result of classifying one final transcript.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedCommand {
    /// Activate the pane at a spoken position.
    WindowNavigation(PanePosition),
    /// Submit the accumulated buffer, optionally with text spoken
    /// before the end phrase.
    EndOfInput(Option<String>),
    /// Discard the buffer and clear the current line.
    ClearRestart,
    /// Ordinary dictation to accumulate.
    PlainText(String),
}

/// Parses transcripts for voice commands.
pub struct CommandParser {
    end_phrases: Vec<String>,
    clear_phrases: Vec<String>,
    window_pattern: Regex,
}

const WINDOW_PATTERN: &str =
    r"(?i)(?:activate|go to|switch to)\s+(?:the\s+)?(.+?)\s*(?:window|pane)?$";

const COMMAND_PREFIXES: &[&str] = &["activate", "go to", "switch to", "end"];

impl CommandParser {
    pub fn new(config: &CommandsConfig) -> Self {
        let mut end_phrases = vec![config.end_voice_phrase.to_lowercase()];
        end_phrases.extend(
            config
                .additional_end_phrases
                .iter()
                .map(|p| p.to_lowercase()),
        );

        let clear_phrases = config
            .clear_restart_phrases
            .iter()
            .map(|p| p.to_lowercase())
            .collect();

        Self {
            end_phrases,
            clear_phrases,
            // Pattern is fixed at compile time, so this cannot fail.
            window_pattern: Regex::new(WINDOW_PATTERN).unwrap(),
        }
    }

    /// Classify a transcript. Priority order: clear/restart, end-of-input,
    /// window navigation, plain text. First match wins.
    pub fn parse(&self, text: &str) -> ParsedCommand {
        let text = text.trim();
        let lower = text.to_lowercase();

        for phrase in &self.clear_phrases {
            if lower.contains(phrase.as_str()) {
                log::debug!("clear/restart command: {text:?}");
                return ParsedCommand::ClearRestart;
            }
        }

        for phrase in &self.end_phrases {
            if let Some(idx) = find_phrase(text, phrase) {
                log::debug!("end-of-input command: {text:?}");
                let prefix = text[..idx].trim();
                return ParsedCommand::EndOfInput(if prefix.is_empty() {
                    None
                } else {
                    Some(prefix.to_string())
                });
            }
        }

        if let Some(position) = self.parse_window_command(text) {
            log::debug!("window command: {position}");
            return ParsedCommand::WindowNavigation(position);
        }

        ParsedCommand::PlainText(text.to_string())
    }

    /// True if the text looks like the start of a command. Callers use this
    /// to avoid acting on interim transcripts that are mid-command.
    pub fn is_command_prefix(&self, text: &str) -> bool {
        let lower = text.trim().to_lowercase();
        COMMAND_PREFIXES.iter().any(|p| lower.starts_with(p))
    }

    fn parse_window_command(&self, text: &str) -> Option<PanePosition> {
        let captures = self.window_pattern.captures(text)?;
        let span = captures.get(1)?.as_str().to_lowercase();
        parse_position_words(&span)
    }
}

/// Byte offset in `text` where a lowercase phrase begins, or None.
///
/// Lowercasing can change byte length ("\u{212A}" is three bytes, its
/// lowercase "k" is one), so an offset found in `text.to_lowercase()` is
/// not usable to slice `text`. Instead, try each char boundary of the
/// original string and lowercase on the fly; the returned offset is always
/// valid for slicing.
fn find_phrase(text: &str, phrase: &str) -> Option<usize> {
    text.char_indices()
        .map(|(offset, _)| offset)
        .find(|&offset| lowercase_starts_with(&text[offset..], phrase))
}

fn lowercase_starts_with(text: &str, phrase: &str) -> bool {
    let mut wanted = phrase.chars();
    for c in text.chars().flat_map(char::to_lowercase) {
        match wanted.next() {
            Some(expected) if expected == c => {}
            Some(_) => return false,
            None => return true,
        }
    }
    wanted.next().is_none()
}

fn horizontal_word(word: &str) -> Option<HorizontalPos> {
    match word {
        "left" => Some(HorizontalPos::Left),
        "right" => Some(HorizontalPos::Right),
        "center" | "middle" => Some(HorizontalPos::Center),
        _ => None,
    }
}

fn vertical_word(word: &str) -> Option<VerticalPos> {
    match word {
        "upper" | "top" => Some(VerticalPos::Upper),
        "lower" | "bottom" => Some(VerticalPos::Lower),
        "middle" | "center" => Some(VerticalPos::Middle),
        _ => None,
    }
}

/// Resolve a captured span like "upper left" or "bottom" to a position.
///
/// Each whitespace token is looked up in the horizontal table first, then
/// the vertical one ("middle" and "center" live in both; the horizontal
/// table wins). Tokens matching neither table are skipped, so filler words
/// inside the span ("the left side") don't defeat the match. Last match
/// per axis wins, unset axes default to center/middle. Resolution fails
/// only when no token matched at all.
fn parse_position_words(span: &str) -> Option<PanePosition> {
    let mut horizontal: Option<HorizontalPos> = None;
    let mut vertical: Option<VerticalPos> = None;

    for word in span.split_whitespace() {
        if let Some(h) = horizontal_word(word) {
            horizontal = Some(h);
        } else if let Some(v) = vertical_word(word) {
            vertical = Some(v);
        }
    }

    if horizontal.is_none() && vertical.is_none() {
        return None;
    }

    Some(PanePosition::new(
        horizontal.unwrap_or(HorizontalPos::Center),
        vertical.unwrap_or(VerticalPos::Middle),
    ))
}
