//! Status sink - where user-facing state strings go.
//!
//! The overlay UI lives outside this crate; the core only pushes strings.
//! All methods are fire-and-forget and must never block or fail.

pub trait StatusSink: Send + Sync {
    /// Show transcript or status text. `is_final` distinguishes settled
    /// text from a still-changing interim transcript.
    fn update(&self, text: &str, is_final: bool);

    /// Toggle the listening indicator.
    fn set_listening(&self, listening: bool);

    /// Blank the display.
    fn clear(&self);
}

/// Default sink: mirrors status to the log. Useful headless and in tests
/// run with a logger attached.
pub struct LogStatus;

impl StatusSink for LogStatus {
    fn update(&self, text: &str, is_final: bool) {
        if is_final {
            log::info!("status: {text}");
        } else {
            log::debug!("status (interim): {text}");
        }
    }

    fn set_listening(&self, listening: bool) {
        log::info!("listening: {listening}");
    }

    fn clear(&self) {
        log::debug!("status cleared");
    }
}
