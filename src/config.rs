//! LLM provider configuration.
//!
//! Centralized configuration for provider selection, model tiers, caching,
//! and performance tuning. Loaded once from environment variables; immutable
//! afterwards. `reset_config` exists for tests.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

/// Model quality/speed tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    /// Quick iterations, lower quality
    #[default]
    Fast,
    /// Better quality, slower
    Balanced,
    /// Best quality, paid (remote provider only)
    Quality,
}

impl FromStr for ModelTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "balanced" => Ok(Self::Balanced),
            "quality" => Ok(Self::Quality),
            other => Err(format!("unknown model tier: {other}")),
        }
    }
}

impl ModelTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Balanced => "balanced",
            Self::Quality => "quality",
        }
    }
}

/// Which provider the router should prefer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderChoice {
    /// Prefer local if healthy, otherwise remote
    #[default]
    Auto,
    Local,
    Remote,
}

impl FromStr for ProviderChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "local" | "ollama" => Ok(Self::Local),
            "remote" | "gemini" => Ok(Self::Remote),
            other => Err(format!("unknown provider: {other}")),
        }
    }
}

/// Minimum plausible API key length; shorter keys are treated as placeholders.
const MIN_API_KEY_LENGTH: usize = 20;

const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "your_",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "api_key_here",
];

/// Complete LLM configuration.
///
/// Controls provider selection, model tiers, caching, and performance tuning.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    // Provider selection
    pub default_provider: ProviderChoice,
    pub model_tier: ModelTier,
    pub fallback_enabled: bool,

    // Ollama settings
    pub ollama_host: String,
    pub ollama_model_fast: String,
    pub ollama_model_balanced: String,

    // Gemini settings
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,

    // Performance tuning
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub default_temperature: f64,

    // Cache settings
    pub cache_enabled: bool,
    pub cache_ttl_seconds: u64,
    pub cache_max_size_mb: u64,
    pub cache_dir: PathBuf,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            default_provider: ProviderChoice::Auto,
            model_tier: ModelTier::Fast,
            fallback_enabled: true,
            ollama_host: "http://localhost:11434".to_string(),
            ollama_model_fast: "gemma3:4b-it-qat".to_string(),
            ollama_model_balanced: "gemma3:12b-it-qat".to_string(),
            gemini_api_key: None,
            gemini_model: "gemini-2.5-flash".to_string(),
            max_retries: 3,
            retry_delay_ms: 500,
            default_temperature: 0.7,
            cache_enabled: true,
            cache_ttl_seconds: 86_400,
            cache_max_size_mb: 1000,
            cache_dir: default_cache_dir(),
        }
    }
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("madspark")
        .join("llm")
}

fn env_u64(name: &str, default: u64) -> u64 {
    match std::env::var(name) {
        Ok(raw) => match raw.parse::<i64>() {
            Ok(v) if v >= 0 => v as u64,
            Ok(_) => {
                tracing::warn!(
                    "Invalid {} value '{}' (negative). Using default: {}",
                    name,
                    raw,
                    default
                );
                default
            }
            Err(_) => {
                tracing::warn!(
                    "Invalid {} value '{}' (not an integer). Using default: {}",
                    name,
                    raw,
                    default
                );
                default
            }
        },
        Err(_) => default,
    }
}

fn env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(raw) => raw.to_lowercase() == "true",
        Err(_) => default,
    }
}

impl LlmConfig {
    /// Load configuration from environment variables.
    ///
    /// Recognized variables:
    /// - `MADSPARK_LLM_PROVIDER`: auto, local, remote
    /// - `MADSPARK_MODEL_TIER`: fast, balanced, quality
    /// - `MADSPARK_FALLBACK_ENABLED`: true/false
    /// - `OLLAMA_HOST`, `OLLAMA_MODEL_FAST`, `OLLAMA_MODEL_BALANCED`
    /// - `GOOGLE_API_KEY`, `GOOGLE_GENAI_MODEL`
    /// - `MADSPARK_CACHE_ENABLED`, `MADSPARK_CACHE_TTL`,
    ///   `MADSPARK_CACHE_MAX_SIZE_MB`, `MADSPARK_CACHE_DIR`
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let provider = std::env::var("MADSPARK_LLM_PROVIDER")
            .ok()
            .and_then(|raw| ProviderChoice::from_str(&raw).ok())
            .unwrap_or(defaults.default_provider);

        let tier = std::env::var("MADSPARK_MODEL_TIER")
            .ok()
            .and_then(|raw| ModelTier::from_str(&raw).ok())
            .unwrap_or(defaults.model_tier);

        let cache_dir = std::env::var("MADSPARK_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.cache_dir);

        let ollama_host = match std::env::var("OLLAMA_HOST") {
            Ok(raw) if url::Url::parse(&raw).is_ok() => raw,
            Ok(raw) => {
                tracing::warn!(
                    "Invalid OLLAMA_HOST value '{}' (not a URL). Using default: {}",
                    raw,
                    defaults.ollama_host
                );
                defaults.ollama_host.clone()
            }
            Err(_) => defaults.ollama_host.clone(),
        };

        Self {
            default_provider: provider,
            model_tier: tier,
            fallback_enabled: env_bool("MADSPARK_FALLBACK_ENABLED", defaults.fallback_enabled),
            ollama_host,
            ollama_model_fast: std::env::var("OLLAMA_MODEL_FAST")
                .unwrap_or(defaults.ollama_model_fast),
            ollama_model_balanced: std::env::var("OLLAMA_MODEL_BALANCED")
                .unwrap_or(defaults.ollama_model_balanced),
            gemini_api_key: std::env::var("GOOGLE_API_KEY").ok(),
            gemini_model: std::env::var("GOOGLE_GENAI_MODEL").unwrap_or(defaults.gemini_model),
            max_retries: defaults.max_retries,
            retry_delay_ms: defaults.retry_delay_ms,
            default_temperature: defaults.default_temperature,
            cache_enabled: env_bool("MADSPARK_CACHE_ENABLED", defaults.cache_enabled),
            cache_ttl_seconds: env_u64("MADSPARK_CACHE_TTL", defaults.cache_ttl_seconds),
            cache_max_size_mb: env_u64("MADSPARK_CACHE_MAX_SIZE_MB", defaults.cache_max_size_mb),
            cache_dir,
        }
    }

    /// Ollama model for the configured tier.
    ///
    /// QUALITY tier returns the balanced model since Ollama has no higher
    /// tier; true quality requires the remote provider.
    pub fn ollama_model(&self) -> &str {
        match self.model_tier {
            ModelTier::Fast => &self.ollama_model_fast,
            ModelTier::Balanced | ModelTier::Quality => &self.ollama_model_balanced,
        }
    }

    /// Validate that the API key is present and not a placeholder value.
    ///
    /// Warns and returns false when the key is too short or matches a
    /// placeholder pattern like `your-api-key` or `API_KEY_HERE`.
    pub fn validate_api_key(&self) -> bool {
        let Some(key) = &self.gemini_api_key else {
            return false;
        };

        if key.len() < MIN_API_KEY_LENGTH {
            tracing::warn!(
                "API key too short ({} chars, minimum {}). \
                 Please set a valid GOOGLE_API_KEY in your environment.",
                key.len(),
                MIN_API_KEY_LENGTH
            );
            return false;
        }

        let key_lower = key.to_lowercase();
        for pattern in PLACEHOLDER_PATTERNS {
            if key_lower.contains(pattern) {
                tracing::warn!(
                    "API key appears to be a placeholder (contains '{}'). \
                     Please set a valid GOOGLE_API_KEY in your environment.",
                    pattern
                );
                return false;
            }
        }

        true
    }
}

static CONFIG: Mutex<Option<Arc<LlmConfig>>> = Mutex::new(None);

/// Get the process-wide config handle, lazily initialized from the
/// environment on first call.
pub fn get_config() -> Arc<LlmConfig> {
    let mut guard = CONFIG.lock().expect("config lock poisoned");
    match guard.as_ref() {
        Some(config) => Arc::clone(config),
        None => {
            let config = Arc::new(LlmConfig::from_env());
            *guard = Some(Arc::clone(&config));
            config
        }
    }
}

/// Reset the config handle so the next `get_config` re-reads the
/// environment. For tests and configuration reload.
pub fn reset_config() {
    let mut guard = CONFIG.lock().expect("config lock poisoned");
    *guard = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_tier_parsing() {
        assert_eq!(ModelTier::from_str("fast").unwrap(), ModelTier::Fast);
        assert_eq!(ModelTier::from_str("QUALITY").unwrap(), ModelTier::Quality);
        assert!(ModelTier::from_str("turbo").is_err());
    }

    #[test]
    fn test_quality_tier_falls_back_to_balanced_model() {
        let config = LlmConfig {
            model_tier: ModelTier::Quality,
            ..Default::default()
        };
        assert_eq!(config.ollama_model(), config.ollama_model_balanced);
    }

    #[test]
    fn test_placeholder_api_key_rejected() {
        let mut config = LlmConfig::default();

        config.gemini_api_key = Some("your-api-key-goes-here-12345".to_string());
        assert!(!config.validate_api_key());

        config.gemini_api_key = Some("short".to_string());
        assert!(!config.validate_api_key());

        config.gemini_api_key = Some("API_KEY_HERE_PLEASE_REPLACE_ME".to_string());
        assert!(!config.validate_api_key());

        config.gemini_api_key = Some("AIzaSyD4u8fake9keyv4lue0987654321".to_string());
        assert!(config.validate_api_key());

        config.gemini_api_key = None;
        assert!(!config.validate_api_key());
    }

    #[test]
    #[serial]
    fn test_from_env_invalid_ttl_uses_default() {
        std::env::set_var("MADSPARK_CACHE_TTL", "not-a-number");
        let config = LlmConfig::from_env();
        assert_eq!(config.cache_ttl_seconds, 86_400);
        std::env::remove_var("MADSPARK_CACHE_TTL");
    }

    #[test]
    #[serial]
    fn test_from_env_provider_and_tier() {
        std::env::set_var("MADSPARK_LLM_PROVIDER", "local");
        std::env::set_var("MADSPARK_MODEL_TIER", "balanced");
        let config = LlmConfig::from_env();
        assert_eq!(config.default_provider, ProviderChoice::Local);
        assert_eq!(config.model_tier, ModelTier::Balanced);
        std::env::remove_var("MADSPARK_LLM_PROVIDER");
        std::env::remove_var("MADSPARK_MODEL_TIER");
    }

    #[test]
    #[serial]
    fn test_config_singleton_reset() {
        reset_config();
        let first = get_config();
        let second = get_config();
        assert!(Arc::ptr_eq(&first, &second));
        reset_config();
        let third = get_config();
        assert!(!Arc::ptr_eq(&first, &third));
    }
}
