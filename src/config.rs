use crate::catalog::CommandId;
use crate::error::ConfigError;
use crate::language::Language;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "voxdeck.toml";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub language: LanguageConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub buffer: BufferConfig,
    #[serde(default)]
    pub training: TrainingConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
}

// ============================================================================
// Language Config
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct LanguageConfig {
    /// Fallback language when detection is unsure
    #[serde(default = "default_primary")]
    pub primary: Language,
    #[serde(default = "default_supported")]
    pub supported: Vec<Language>,
    /// Detect the language of each transcript instead of assuming `primary`
    #[serde(default = "default_true")]
    pub auto_detect: bool,
    /// Run batch detection on a worker pool
    #[serde(default = "default_true")]
    pub parallel: bool,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            primary: default_primary(),
            supported: default_supported(),
            auto_detect: true,
            parallel: true,
            workers: default_workers(),
        }
    }
}

fn default_primary() -> Language {
    Language::English
}

fn default_supported() -> Vec<Language> {
    vec![
        Language::English,
        Language::Spanish,
        Language::French,
        Language::German,
    ]
}

fn default_workers() -> usize {
    4
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Matching Config
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct MatchingConfig {
    /// Minimum partial-ratio score (0-100) for a fuzzy match
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: u8,

    /// Additional trigger patterns, tried after the built-in ones
    #[serde(default)]
    pub extra_triggers: Vec<ExtraTrigger>,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: default_fuzzy_threshold(),
            extra_triggers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtraTrigger {
    pub command: CommandId,
    pub language: Language,
    pub pattern: String,
}

fn default_fuzzy_threshold() -> u8 {
    80
}

// ============================================================================
// Buffer Config
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct BufferConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Minimum spacing between two commands leaving the buffer
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// How long the dispatch loop waits for input before re-checking for shutdown
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            debounce_ms: default_debounce_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_capacity() -> usize {
    10
}

fn default_debounce_ms() -> u64 {
    50
}

fn default_poll_interval_ms() -> u64 {
    100
}

// ============================================================================
// Training Config
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct TrainingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Only log decisions whose recognition confidence reaches this value
    #[serde(default = "default_log_threshold")]
    pub log_confidence_threshold: f32,
    #[serde(default = "default_export_threshold")]
    pub export_threshold: f32,
    #[serde(default = "default_user_id")]
    pub user_id: String,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            data_dir: default_data_dir(),
            log_confidence_threshold: default_log_threshold(),
            export_threshold: default_export_threshold(),
            user_id: default_user_id(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("training_data")
}

fn default_log_threshold() -> f32 {
    0.70
}

fn default_export_threshold() -> f32 {
    0.80
}

fn default_user_id() -> String {
    "default".into()
}

// ============================================================================
// Speech Config
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct SpeechConfig {
    /// Confidence attached to typed transcripts read from stdin
    #[serde(default = "default_speech_confidence")]
    pub confidence: f32,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            confidence: default_speech_confidence(),
        }
    }
}

fn default_speech_confidence() -> f32 {
    0.95
}

impl Config {
    /// Load from `path`, falling back to defaults when the file does not exist
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.display().to_string(),
                source,
            })?;
            Self::from_toml(&text)?
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Config::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Check ranges and make sure the primary language is supported
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.matching.fuzzy_threshold > 100 {
            return Err(invalid("matching.fuzzy_threshold", self.matching.fuzzy_threshold));
        }
        if self.buffer.capacity == 0 {
            return Err(invalid("buffer.capacity", self.buffer.capacity));
        }
        if self.buffer.poll_interval_ms == 0 {
            return Err(invalid("buffer.poll_interval_ms", self.buffer.poll_interval_ms));
        }
        if self.language.workers == 0 {
            return Err(invalid("language.workers", self.language.workers));
        }
        for (field, value) in [
            ("training.log_confidence_threshold", self.training.log_confidence_threshold),
            ("training.export_threshold", self.training.export_threshold),
            ("speech.confidence", self.speech.confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(field, value));
            }
        }

        if !self.language.supported.contains(&self.language.primary) {
            tracing::warn!(
                "Primary language {} not in supported set, adding it",
                self.language.primary
            );
            self.language.supported.insert(0, self.language.primary);
        }
        let mut seen = Vec::with_capacity(self.language.supported.len());
        self.language.supported.retain(|lang| {
            if seen.contains(lang) {
                false
            } else {
                seen.push(*lang);
                true
            }
        });

        Ok(())
    }
}

fn invalid(field: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.language.primary, Language::English);
        assert_eq!(config.language.supported.len(), 4);
        assert_eq!(config.matching.fuzzy_threshold, 80);
        assert_eq!(config.buffer.capacity, 10);
        assert_eq!(config.buffer.debounce_ms, 50);
        assert!((config.training.log_confidence_threshold - 0.70).abs() < f32::EPSILON);
    }

    #[test]
    fn test_from_toml() {
        let text = r#"
            [language]
            primary = "es"
            supported = ["es", "en"]
            parallel = false

            [matching]
            fuzzy_threshold = 90

            [[matching.extra_triggers]]
            command = "next_slide"
            language = "en"
            pattern = "onward"

            [buffer]
            capacity = 4
        "#;
        let mut config = Config::from_toml(text).unwrap();
        config.validate().unwrap();
        assert_eq!(config.language.primary, Language::Spanish);
        assert!(!config.language.parallel);
        assert!(config.language.auto_detect);
        assert_eq!(config.matching.fuzzy_threshold, 90);
        assert_eq!(config.matching.extra_triggers[0].command, CommandId::NextSlide);
        assert_eq!(config.buffer.capacity, 4);
        assert_eq!(config.buffer.debounce_ms, 50);
    }

    #[test]
    fn test_primary_added_to_supported() {
        let mut config = Config::from_toml("[language]\nprimary = \"it\"\nsupported = [\"en\"]").unwrap();
        config.validate().unwrap();
        assert_eq!(config.language.supported, vec![Language::Italian, Language::English]);
    }

    #[test]
    fn test_rejects_out_of_range() {
        let mut config = Config::from_toml("[matching]\nfuzzy_threshold = 150").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue { .. })));

        let mut config = Config::from_toml("[training]\nlog_confidence_threshold = 1.5").unwrap();
        assert!(config.validate().is_err());

        let mut config = Config::from_toml("[buffer]\ncapacity = 0").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_language_is_parse_error() {
        assert!(matches!(
            Config::from_toml("[language]\nprimary = \"xx\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load("/nonexistent/voxdeck.toml").unwrap();
        assert_eq!(config.buffer.capacity, 10);
    }
}
