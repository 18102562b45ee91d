use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub commands: CommandsConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub feedback: FeedbackConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            commands: CommandsConfig::default(),
            registry: RegistryConfig::default(),
            backend: BackendConfig::default(),
            feedback: FeedbackConfig::default(),
        }
    }
}

// ============================================================================
// Commands Config
// ============================================================================

#[derive(Debug, Deserialize, Clone)]
pub struct CommandsConfig {
    /// Primary phrase that submits the accumulated buffer
    #[serde(default = "default_end_voice_phrase")]
    pub end_voice_phrase: String,

    /// Extra phrases that also submit
    #[serde(default = "default_additional_end_phrases")]
    pub additional_end_phrases: Vec<String>,

    /// Phrases that discard the buffer and restart listening
    #[serde(default = "default_clear_restart_phrases")]
    pub clear_restart_phrases: Vec<String>,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            end_voice_phrase: default_end_voice_phrase(),
            additional_end_phrases: default_additional_end_phrases(),
            clear_restart_phrases: default_clear_restart_phrases(),
        }
    }
}

fn default_end_voice_phrase() -> String {
    "end voice".into()
}

fn default_additional_end_phrases() -> Vec<String> {
    vec![
        "end audio".to_string(),
        "submit".to_string(),
        "send it".to_string(),
        "done".to_string(),
    ]
}

fn default_clear_restart_phrases() -> Vec<String> {
    vec![
        "clear and restart".to_string(),
        "start over".to_string(),
        "never mind".to_string(),
    ]
}

// ============================================================================
// Registry Config
// ============================================================================

#[derive(Debug, Deserialize, Clone)]
pub struct RegistryConfig {
    /// Substring matched (case-insensitive) against a pane's command/title
    /// to classify it as a voice target
    #[serde(default = "default_target_filter")]
    pub target_filter: String,

    /// Seconds between background session rescans
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            target_filter: default_target_filter(),
            refresh_interval_secs: default_refresh_interval_secs(),
        }
    }
}

fn default_target_filter() -> String {
    "claude".into()
}

fn default_refresh_interval_secs() -> u64 {
    5
}

// ============================================================================
// Backend Config
// ============================================================================

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct BackendConfig {
    /// Deadline for one multiplexer call; a hung call is abandoned, not fatal
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
}

impl BackendConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: default_call_timeout_ms(),
        }
    }
}

fn default_call_timeout_ms() -> u64 {
    2000
}

// ============================================================================
// Feedback Config
// ============================================================================

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct FeedbackConfig {
    /// How long the "Submitted!" confirmation stays up
    #[serde(default = "default_confirm_delay_ms")]
    pub confirm_delay_ms: u64,
}

impl FeedbackConfig {
    pub fn confirm_delay(&self) -> Duration {
        Duration::from_millis(self.confirm_delay_ms)
    }
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            confirm_delay_ms: default_confirm_delay_ms(),
        }
    }
}

fn default_confirm_delay_ms() -> u64 {
    1000
}

impl Config {
    pub fn load(path: Option<&Path>) -> Self {
        let path = path.unwrap_or_else(|| Path::new("voxmux.toml"));
        if path.exists() {
            fs::read_to_string(path)
                .ok()
                .and_then(|s| match toml::from_str(&s) {
                    Ok(c) => Some(c),
                    Err(e) => {
                        log::warn!("bad config {}: {e}", path.display());
                        None
                    }
                })
                .unwrap_or_default()
        } else {
            Config::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.commands.end_voice_phrase, "end voice");
        assert!(config
            .commands
            .clear_restart_phrases
            .contains(&"never mind".to_string()));
        assert_eq!(config.registry.refresh_interval_secs, 5);
        assert_eq!(config.backend.call_timeout_ms, 2000);
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config: Config = toml::from_str(
            r#"
            [commands]
            end_voice_phrase = "over and out"

            [registry]
            target_filter = "vim"
            "#,
        )
        .unwrap();

        assert_eq!(config.commands.end_voice_phrase, "over and out");
        assert_eq!(config.registry.target_filter, "vim");
        // Untouched sections keep their defaults.
        assert_eq!(config.registry.refresh_interval_secs, 5);
        assert_eq!(config.feedback.confirm_delay_ms, 1000);
    }
}
