//! Disk-backed response cache for LLM providers.
//!
//! Caches (validated payload, response metadata) pairs keyed by a SHA-256
//! digest over every input that affects the output. Entries expire by TTL
//! and total volume is capped by evicting the oldest entries.
//!
//! The cache stores prompts and responses in plaintext on disk; the cache
//! directory is created with user-only permissions.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::config::get_config;
use crate::types::LlmResponse;

/// Strings longer than this are hashed before entering the key material.
const LONG_STRING_THRESHOLD: usize = 10_000;

/// Everything that affects a provider's output, in cache-key form.
#[derive(Debug, Clone, Default)]
pub struct CacheKeyInput<'a> {
    pub prompt: &'a str,
    /// Fully qualified schema name, e.g. `madspark::schemas::EvaluationBatch`.
    pub schema_name: &'a str,
    /// SHA-256 of the schema's JSON representation.
    pub schema_hash: &'a str,
    pub temperature: f64,
    pub provider: &'a str,
    pub model: &'a str,
    pub system_instruction: &'a str,
    pub images: &'a [String],
    pub files: &'a [String],
    pub urls: &'a [String],
}

fn hash_if_long(value: &str) -> String {
    if value.len() > LONG_STRING_THRESHOLD {
        let mut hasher = Sha256::new();
        hasher.update(value.as_bytes());
        format!("sha256:{:x}", hasher.finalize())
    } else {
        value.to_string()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    validated: Value,
    response: LlmResponse,
    stored_at: u64,
    ttl_seconds: u64,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Cache statistics snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatsReport {
    pub enabled: bool,
    pub size: usize,
    pub volume_bytes: u64,
    pub cache_dir: PathBuf,
    pub ttl_seconds: u64,
}

/// Disk-based cache for LLM responses.
///
/// All operations on a disabled cache are no-ops reporting success, so
/// callers never need to branch on whether caching is available.
#[derive(Debug)]
pub struct ResponseCache {
    enabled: bool,
    cache_dir: PathBuf,
    ttl_seconds: u64,
    max_size_bytes: u64,
}

impl ResponseCache {
    /// Build a cache from the process-wide config.
    pub fn from_config() -> Self {
        let config = get_config();
        Self::new(
            Some(config.cache_dir.clone()),
            Some(config.cache_ttl_seconds),
            Some(config.cache_enabled),
            Some(config.cache_max_size_mb),
        )
    }

    pub fn new(
        cache_dir: Option<PathBuf>,
        ttl_seconds: Option<u64>,
        enabled: Option<bool>,
        max_size_mb: Option<u64>,
    ) -> Self {
        let config = get_config();
        let enabled = enabled.unwrap_or(config.cache_enabled);
        let ttl_seconds = ttl_seconds.unwrap_or(config.cache_ttl_seconds);
        let max_size_bytes = max_size_mb.unwrap_or(config.cache_max_size_mb) * 1024 * 1024;
        let requested_dir = cache_dir.unwrap_or_else(|| config.cache_dir.clone());

        let mut cache = Self {
            enabled,
            cache_dir: resolve_safe_dir(&requested_dir),
            ttl_seconds,
            max_size_bytes,
        };

        if cache.enabled {
            if let Err(e) = cache.init_dir() {
                tracing::warn!("Failed to initialize cache directory: {e}. Caching disabled.");
                cache.enabled = false;
            }
        }

        cache
    }

    fn init_dir(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.cache_dir)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.cache_dir, fs::Permissions::from_mode(0o700))?;
        }
        tracing::info!(
            "Initialized cache at {} (max size: {}MB)",
            self.cache_dir.display(),
            self.max_size_bytes / (1024 * 1024)
        );
        Ok(())
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Generate a deterministic, collision-resistant cache key.
    ///
    /// Includes prompt, schema identity + hash, temperature, provider,
    /// model, and every multi-modal input. Strings over 10 KB are hashed
    /// before key composition to bound memory.
    pub fn make_key(&self, input: &CacheKeyInput<'_>) -> String {
        let key_data = serde_json::json!({
            "files": input.files,
            "images": input.images,
            "model": input.model,
            "prompt": hash_if_long(input.prompt),
            "provider": input.provider,
            "schema_hash": input.schema_hash,
            "schema_name": input.schema_name,
            "system_instruction": hash_if_long(input.system_instruction),
            "temperature": input.temperature,
            "urls": input.urls,
        });
        let mut hasher = Sha256::new();
        hasher.update(key_data.to_string().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{key}.json"))
    }

    /// Fetch a cached response. Returned metadata has `cached = true`.
    ///
    /// Malformed or expired entries are silently invalidated.
    pub fn get(&self, key: &str) -> Option<(Value, LlmResponse)> {
        if !self.enabled {
            return None;
        }

        let path = self.entry_path(key);
        let raw = fs::read_to_string(&path).ok()?;

        let entry: CacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Invalid cache format for {}..., invalidating: {e}", &key[..16.min(key.len())]);
                self.invalidate(key);
                return None;
            }
        };

        let age = unix_now().saturating_sub(entry.stored_at);
        if age > entry.ttl_seconds {
            tracing::debug!("Cache entry expired: {}...", &key[..16.min(key.len())]);
            self.invalidate(key);
            return None;
        }

        let mut response = entry.response;
        response.cached = true;
        tracing::debug!("Cache hit: {}...", &key[..16.min(key.len())]);
        Some((entry.validated, response))
    }

    /// Store a (validated payload, response) pair with TTL.
    ///
    /// An invalid TTL override (≤ 0) falls back to the configured default
    /// with a warning. Returns true on success or when the cache is
    /// disabled (no-op success).
    pub fn set(&self, key: &str, validated: &Value, response: &LlmResponse, ttl: Option<i64>) -> bool {
        if !self.enabled {
            return true;
        }

        let ttl_seconds = match ttl {
            Some(t) if t > 0 => t as u64,
            Some(t) => {
                tracing::warn!("Invalid TTL {t}s, using default {}s", self.ttl_seconds);
                self.ttl_seconds
            }
            None => self.ttl_seconds,
        };

        let entry = CacheEntry {
            validated: validated.clone(),
            response: response.clone(),
            stored_at: unix_now(),
            ttl_seconds,
        };

        let serialized = match serde_json::to_string(&entry) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("Cache set failed: {e}");
                return false;
            }
        };

        if let Err(e) = fs::write(self.entry_path(key), serialized) {
            tracing::error!("Cache set failed: {e}");
            return false;
        }

        self.enforce_size_limit();
        tracing::debug!("Cached: {}... (TTL: {ttl_seconds}s)", &key[..16.min(key.len())]);
        true
    }

    /// Remove a specific entry. Returns true if one was removed.
    pub fn invalidate(&self, key: &str) -> bool {
        if !self.enabled {
            return false;
        }
        fs::remove_file(self.entry_path(key)).is_ok()
    }

    /// Remove all entries.
    pub fn clear(&self) -> bool {
        if !self.enabled {
            return false;
        }
        match self.entry_files() {
            Ok(files) => {
                for (path, _, _) in files {
                    let _ = fs::remove_file(path);
                }
                tracing::info!("Cache cleared");
                true
            }
            Err(e) => {
                tracing::warn!("Cache clear failed: {e}");
                false
            }
        }
    }

    pub fn stats(&self) -> CacheStatsReport {
        let (size, volume) = self
            .entry_files()
            .map(|files| {
                let volume = files.iter().map(|(_, len, _)| len).sum();
                (files.len(), volume)
            })
            .unwrap_or((0, 0));

        CacheStatsReport {
            enabled: self.enabled,
            size,
            volume_bytes: volume,
            cache_dir: self.cache_dir.clone(),
            ttl_seconds: self.ttl_seconds,
        }
    }

    /// Flush state; the disk representation is already durable.
    pub fn close(&self) {
        tracing::debug!("Cache closed");
    }

    fn entry_files(&self) -> std::io::Result<Vec<(PathBuf, u64, SystemTime)>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.cache_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                let meta = entry.metadata()?;
                let modified = meta.modified().unwrap_or(UNIX_EPOCH);
                files.push((path, meta.len(), modified));
            }
        }
        Ok(files)
    }

    fn enforce_size_limit(&self) {
        let Ok(mut files) = self.entry_files() else {
            return;
        };
        let mut volume: u64 = files.iter().map(|(_, len, _)| len).sum();
        if volume <= self.max_size_bytes {
            return;
        }

        // Evict oldest first
        files.sort_by_key(|(_, _, modified)| *modified);
        for (path, len, _) in files {
            if volume <= self.max_size_bytes {
                break;
            }
            if fs::remove_file(&path).is_ok() {
                volume = volume.saturating_sub(len);
                tracing::debug!("Evicted cache entry {}", path.display());
            }
        }
    }
}

/// Restrict the cache directory to safe locations.
///
/// Anything outside $HOME, /tmp, or the current working directory is
/// rewritten to the default under the user's cache directory.
fn resolve_safe_dir(requested: &Path) -> PathBuf {
    let mut safe_prefixes: Vec<PathBuf> = Vec::new();
    if let Some(home) = dirs::home_dir() {
        safe_prefixes.push(home);
    }
    safe_prefixes.push(PathBuf::from("/tmp"));
    if let Ok(cwd) = std::env::current_dir() {
        safe_prefixes.push(cwd);
    }

    // Resolve without requiring the path to exist yet
    let normalized = requested
        .canonicalize()
        .unwrap_or_else(|_| requested.to_path_buf());

    let is_safe = safe_prefixes.iter().any(|prefix| {
        let prefix = prefix.canonicalize().unwrap_or_else(|_| prefix.clone());
        normalized.starts_with(&prefix)
    });

    if is_safe {
        normalized
    } else {
        let fallback = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("madspark")
            .join("llm");
        tracing::warn!(
            "Cache directory {} is outside safe directories. Using default {}",
            requested.display(),
            fallback.display()
        );
        fallback
    }
}

static CACHE: Mutex<Option<Arc<ResponseCache>>> = Mutex::new(None);

/// Get the process-wide cache instance, lazily initialized.
pub fn get_cache() -> Arc<ResponseCache> {
    let mut guard = CACHE.lock().expect("cache lock poisoned");
    match guard.as_ref() {
        Some(cache) => Arc::clone(cache),
        None => {
            let cache = Arc::new(ResponseCache::from_config());
            *guard = Some(Arc::clone(&cache));
            cache
        }
    }
}

/// Reset the cache singleton (for testing).
pub fn reset_cache() {
    let mut guard = CACHE.lock().expect("cache lock poisoned");
    if let Some(cache) = guard.take() {
        cache.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_cache(dir: &TempDir) -> ResponseCache {
        ResponseCache::new(
            Some(dir.path().to_path_buf()),
            Some(3600),
            Some(true),
            Some(10),
        )
    }

    fn sample_response() -> LlmResponse {
        LlmResponse::new("raw text".to_string(), "ollama", "gemma3:4b-it-qat", 120, 450.0, 0.0)
    }

    fn sample_key_input<'a>() -> CacheKeyInput<'a> {
        CacheKeyInput {
            prompt: "rate this idea",
            schema_name: "madspark::schemas::EvaluationBatch",
            schema_hash: "abc123",
            temperature: 0.3,
            provider: "ollama",
            model: "gemma3:4b-it-qat",
            system_instruction: "",
            images: &[],
            files: &[],
            urls: &[],
        }
    }

    #[test]
    fn test_round_trip_sets_cached_flag() {
        let dir = TempDir::new().unwrap();
        let cache = test_cache(&dir);
        let key = cache.make_key(&sample_key_input());
        let payload = serde_json::json!({"score": 8, "comment": "good"});

        assert!(cache.set(&key, &payload, &sample_response(), None));
        let (got_payload, got_response) = cache.get(&key).unwrap();
        assert_eq!(got_payload, payload);
        assert!(got_response.cached);
        assert_eq!(got_response.tokens_used, 120);
    }

    #[test]
    fn test_key_sensitivity() {
        let dir = TempDir::new().unwrap();
        let cache = test_cache(&dir);
        let base = cache.make_key(&sample_key_input());

        let mut changed = sample_key_input();
        changed.prompt = "rate this other idea";
        assert_ne!(base, cache.make_key(&changed));

        let mut changed = sample_key_input();
        changed.temperature = 0.7;
        assert_ne!(base, cache.make_key(&changed));

        let mut changed = sample_key_input();
        changed.provider = "gemini";
        assert_ne!(base, cache.make_key(&changed));

        let mut changed = sample_key_input();
        changed.model = "gemini-2.5-flash";
        assert_ne!(base, cache.make_key(&changed));

        let mut changed = sample_key_input();
        changed.schema_hash = "def456";
        assert_ne!(base, cache.make_key(&changed));

        let images = vec!["/tmp/photo.png".to_string()];
        let mut changed = sample_key_input();
        changed.images = &images;
        assert_ne!(base, cache.make_key(&changed));

        let urls = vec!["https://example.com".to_string()];
        let mut changed = sample_key_input();
        changed.urls = &urls;
        assert_ne!(base, cache.make_key(&changed));

        let mut changed = sample_key_input();
        changed.system_instruction = "answer in haiku";
        assert_ne!(base, cache.make_key(&changed));
    }

    #[test]
    fn test_long_prompt_hashed_key_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let cache = test_cache(&dir);
        let long_prompt = "x".repeat(20_000);
        let mut input = sample_key_input();
        input.prompt = &long_prompt;
        assert_eq!(cache.make_key(&input), cache.make_key(&input));
        assert_ne!(cache.make_key(&input), cache.make_key(&sample_key_input()));
    }

    #[test]
    fn test_expired_entry_invalidated() {
        let dir = TempDir::new().unwrap();
        let cache = test_cache(&dir);
        let key = cache.make_key(&sample_key_input());
        let payload = serde_json::json!({"score": 5});

        // TTL of 1 second then backdate the entry on disk
        cache.set(&key, &payload, &sample_response(), Some(1));
        let path = cache.entry_path(&key);
        let raw = fs::read_to_string(&path).unwrap();
        let mut entry: serde_json::Value = serde_json::from_str(&raw).unwrap();
        entry["stored_at"] = serde_json::json!(unix_now() - 100);
        fs::write(&path, entry.to_string()).unwrap();

        assert!(cache.get(&key).is_none());
        assert!(!path.exists());
    }

    #[test]
    fn test_malformed_entry_silently_invalidated() {
        let dir = TempDir::new().unwrap();
        let cache = test_cache(&dir);
        let key = cache.make_key(&sample_key_input());
        fs::write(cache.entry_path(&key), "not json at all").unwrap();

        assert!(cache.get(&key).is_none());
        assert!(!cache.entry_path(&key).exists());
    }

    #[test]
    fn test_invalid_ttl_falls_back_to_default() {
        let dir = TempDir::new().unwrap();
        let cache = test_cache(&dir);
        let key = cache.make_key(&sample_key_input());
        let payload = serde_json::json!({"score": 5});

        assert!(cache.set(&key, &payload, &sample_response(), Some(-10)));
        assert!(cache.get(&key).is_some());
    }

    #[test]
    fn test_unsafe_dir_rewritten() {
        let cache = ResponseCache::new(
            Some(PathBuf::from("/etc/shadow")),
            Some(3600),
            Some(false),
            Some(10),
        );
        assert!(!cache.cache_dir.starts_with("/etc"));
    }

    #[test]
    fn test_disabled_cache_is_noop_success() {
        let dir = TempDir::new().unwrap();
        let cache = ResponseCache::new(
            Some(dir.path().to_path_buf()),
            Some(3600),
            Some(false),
            Some(10),
        );
        let key = cache.make_key(&sample_key_input());
        let payload = serde_json::json!({"score": 5});

        assert!(cache.set(&key, &payload, &sample_response(), None));
        assert!(cache.get(&key).is_none());
        assert!(!cache.stats().enabled);
    }

    #[test]
    fn test_clear_and_stats() {
        let dir = TempDir::new().unwrap();
        let cache = test_cache(&dir);
        let payload = serde_json::json!({"score": 5});

        for i in 0..3 {
            let prompt = format!("prompt {i}");
            let mut input = sample_key_input();
            input.prompt = &prompt;
            let key = cache.make_key(&input);
            cache.set(&key, &payload, &sample_response(), None);
        }

        assert_eq!(cache.stats().size, 3);
        assert!(cache.clear());
        assert_eq!(cache.stats().size, 0);
    }
}
