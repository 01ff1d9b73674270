//! Provider selection, fallback, and response caching.
//!
//! The router sits between agent callers and concrete providers: it checks
//! the cache, picks a primary provider per configuration, falls back to the
//! secondary on recoverable failures, and keeps request-scoped metrics.
//! Metrics are per-instance; each workflow run may construct its own router.

use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::cache::{CacheKeyInput, ResponseCache};
use crate::config::{get_config, LlmConfig, ModelTier, ProviderChoice};
use crate::errors::{Result, WorkflowError};
use crate::providers::{GeminiProvider, OllamaProvider, Provider, StructuredRequest};
use crate::schemas::StructuredSchema;
use crate::types::LlmResponse;

/// Request-scoped router metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RouterMetrics {
    pub total_requests: u64,
    pub local_calls: u64,
    pub remote_calls: u64,
    pub cache_hits: u64,
    pub fallback_triggers: u64,
    pub total_tokens: u64,
    pub total_cost: f64,
    total_latency_ms: f64,
    latency_samples: u64,
}

impl RouterMetrics {
    pub fn avg_latency_ms(&self) -> f64 {
        if self.latency_samples == 0 {
            0.0
        } else {
            self.total_latency_ms / self.latency_samples as f64
        }
    }

    pub fn cache_hit_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.total_requests as f64
        }
    }

    fn record_response(&mut self, provider: &str, response: &LlmResponse) {
        match provider {
            "ollama" => self.local_calls += 1,
            "gemini" => self.remote_calls += 1,
            _ => {}
        }
        self.total_tokens += response.tokens_used;
        self.total_cost += response.cost;
        self.total_latency_ms += response.latency_ms;
        self.latency_samples += 1;
    }
}

/// Routes generation requests to a local or remote provider.
#[derive(Debug)]
pub struct LlmRouter {
    config: Arc<LlmConfig>,
    local: Option<OllamaProvider>,
    remote: Option<GeminiProvider>,
    cache: Option<Arc<ResponseCache>>,
    metrics: Mutex<RouterMetrics>,
}

impl LlmRouter {
    /// Build a router from the process-wide config.
    pub fn from_env() -> Self {
        let config = get_config();
        Self::new(config, None, true)
    }

    /// Build a router with explicit dependencies.
    ///
    /// `cache` of `None` with `enable_cache` true uses the process-wide
    /// cache singleton; `enable_cache` false disables caching entirely.
    pub fn new(config: Arc<LlmConfig>, cache: Option<Arc<ResponseCache>>, enable_cache: bool) -> Self {
        let local = Some(OllamaProvider::new(
            Some(config.ollama_model().to_string()),
            Some(config.ollama_host.clone()),
        ));

        let remote = if config.validate_api_key() {
            match GeminiProvider::new(config.gemini_api_key.clone(), Some(config.gemini_model.clone())) {
                Ok(provider) => Some(provider),
                Err(e) => {
                    tracing::warn!("Remote provider unavailable: {e}");
                    None
                }
            }
        } else {
            None
        };

        let cache = if enable_cache {
            Some(cache.unwrap_or_else(crate::cache::get_cache))
        } else {
            None
        };

        Self {
            config,
            local,
            remote,
            cache,
            metrics: Mutex::new(RouterMetrics::default()),
        }
    }

    /// Whether any provider is configured. When false, agent callers run
    /// in mock mode.
    pub async fn has_provider(&self) -> bool {
        if let Some(local) = &self.local {
            if local.health_check().await {
                return true;
            }
        }
        self.remote.is_some()
    }

    pub fn metrics(&self) -> RouterMetrics {
        self.metrics.lock().expect("metrics lock poisoned").clone()
    }

    pub fn model_tier(&self) -> ModelTier {
        self.config.model_tier
    }

    /// Providers in the order they should be tried for this request.
    async fn provider_order(&self) -> Vec<ProviderRef<'_>> {
        let mut order = Vec::new();
        let prefer_local = match self.config.default_provider {
            ProviderChoice::Local => true,
            ProviderChoice::Remote => false,
            ProviderChoice::Auto => match &self.local {
                Some(local) => local.health_check().await,
                None => false,
            },
        };

        if prefer_local {
            if let Some(local) = &self.local {
                order.push(ProviderRef::Local(local));
            }
            if self.config.fallback_enabled {
                if let Some(remote) = &self.remote {
                    order.push(ProviderRef::Remote(remote));
                }
            }
        } else {
            if let Some(remote) = &self.remote {
                order.push(ProviderRef::Remote(remote));
            }
            if self.config.fallback_enabled {
                if let Some(local) = &self.local {
                    order.push(ProviderRef::Local(local));
                }
            }
        }
        order
    }

    /// Generate structured output, consulting the cache first and falling
    /// back between providers on recoverable errors.
    pub async fn generate_structured<T: StructuredSchema>(
        &self,
        request: &StructuredRequest,
    ) -> Result<(T, LlmResponse)> {
        {
            let mut metrics = self.metrics.lock().expect("metrics lock poisoned");
            metrics.total_requests += 1;
        }

        let cache_key = self.cache.as_ref().map(|cache| {
            let schema_hash = T::schema_hash();
            let key = cache.make_key(&CacheKeyInput {
                prompt: &request.prompt,
                schema_name: T::SCHEMA_NAME,
                schema_hash: &schema_hash,
                temperature: request.temperature,
                provider: match self.config.default_provider {
                    ProviderChoice::Local => "local",
                    ProviderChoice::Remote => "remote",
                    ProviderChoice::Auto => "auto",
                },
                model: match self.config.default_provider {
                    ProviderChoice::Remote => &self.config.gemini_model,
                    _ => self.config.ollama_model(),
                },
                system_instruction: request.system_instruction.as_deref().unwrap_or(""),
                images: &request.images,
                files: &request.files,
                urls: &request.urls,
            });
            (Arc::clone(cache), key)
        });

        if let Some((cache, key)) = &cache_key {
            if let Some((validated, response)) = cache.get(key) {
                match serde_json::from_value::<T>(validated) {
                    Ok(payload) => {
                        let mut metrics = self.metrics.lock().expect("metrics lock poisoned");
                        metrics.cache_hits += 1;
                        return Ok((payload, response));
                    }
                    Err(e) => {
                        tracing::warn!("Cached payload no longer matches schema, invalidating: {e}");
                        cache.invalidate(key);
                    }
                }
            }
        }

        let order = self.provider_order().await;
        if order.is_empty() {
            return Err(WorkflowError::provider_unavailable(
                "No LLM provider configured (local daemon down, no remote key)",
            ));
        }

        let mut failures: Vec<String> = Vec::new();
        for (attempt, provider) in order.iter().enumerate() {
            if attempt > 0 {
                let mut metrics = self.metrics.lock().expect("metrics lock poisoned");
                metrics.fallback_triggers += 1;
            }

            match provider.generate_structured::<T>(request).await {
                Ok((payload, response)) => {
                    {
                        let mut metrics = self.metrics.lock().expect("metrics lock poisoned");
                        metrics.record_response(provider.name(), &response);
                    }
                    if let Some((cache, key)) = &cache_key {
                        if let Ok(value) = serde_json::to_value(&payload) {
                            cache.set(key, &value, &response, None);
                        }
                    }
                    return Ok((payload, response));
                }
                Err(e) => {
                    let recoverable = matches!(
                        e,
                        WorkflowError::ProviderUnavailable(_)
                            | WorkflowError::SchemaValidation(_)
                            | WorkflowError::Http(_)
                            | WorkflowError::Timeout { .. }
                    );
                    failures.push(format!("{}: {e}", provider.name()));
                    if !recoverable || !self.config.fallback_enabled {
                        break;
                    }
                }
            }
        }

        Err(WorkflowError::AllProvidersFailed(failures.join("; ")))
    }

    /// Generate plain text from the first available provider.
    pub async fn generate(&self, request: &StructuredRequest) -> Result<LlmResponse> {
        {
            let mut metrics = self.metrics.lock().expect("metrics lock poisoned");
            metrics.total_requests += 1;
        }

        let order = self.provider_order().await;
        if order.is_empty() {
            return Err(WorkflowError::provider_unavailable(
                "No LLM provider configured (local daemon down, no remote key)",
            ));
        }

        let mut failures: Vec<String> = Vec::new();
        for (attempt, provider) in order.iter().enumerate() {
            if attempt > 0 {
                let mut metrics = self.metrics.lock().expect("metrics lock poisoned");
                metrics.fallback_triggers += 1;
            }
            match provider.generate(request).await {
                Ok(response) => {
                    let mut metrics = self.metrics.lock().expect("metrics lock poisoned");
                    metrics.record_response(provider.name(), &response);
                    return Ok(response);
                }
                Err(e) => {
                    failures.push(format!("{}: {e}", provider.name()));
                    if !self.config.fallback_enabled {
                        break;
                    }
                }
            }
        }

        Err(WorkflowError::AllProvidersFailed(failures.join("; ")))
    }
}

enum ProviderRef<'a> {
    Local(&'a OllamaProvider),
    Remote(&'a GeminiProvider),
}

impl ProviderRef<'_> {
    fn name(&self) -> &'static str {
        match self {
            Self::Local(_) => "ollama",
            Self::Remote(_) => "gemini",
        }
    }

    async fn generate_structured<T: StructuredSchema>(
        &self,
        request: &StructuredRequest,
    ) -> Result<(T, LlmResponse)> {
        match self {
            Self::Local(p) => p.generate_structured(request).await,
            Self::Remote(p) => p.generate_structured(request).await,
        }
    }

    async fn generate(&self, request: &StructuredRequest) -> Result<LlmResponse> {
        match self {
            Self::Local(p) => p.generate(request).await,
            Self::Remote(p) => p.generate(request).await,
        }
    }
}

static ROUTER: Mutex<Option<Arc<LlmRouter>>> = Mutex::new(None);

/// Legacy singleton access. New code should accept an injected router so
/// metrics stay request-scoped.
pub fn get_router() -> Arc<LlmRouter> {
    let mut guard = ROUTER.lock().expect("router lock poisoned");
    match guard.as_ref() {
        Some(router) => Arc::clone(router),
        None => {
            let router = Arc::new(LlmRouter::from_env());
            *guard = Some(Arc::clone(&router));
            router
        }
    }
}

/// Reset the router singleton (for testing).
pub fn reset_router() {
    let mut guard = ROUTER.lock().expect("router lock poisoned");
    *guard = None;
}

/// Drop in a pre-built router as the process-wide default.
pub fn set_router(router: Arc<LlmRouter>) {
    let mut guard = ROUTER.lock().expect("router lock poisoned");
    *guard = Some(router);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_config() -> Arc<LlmConfig> {
        Arc::new(LlmConfig {
            default_provider: ProviderChoice::Local,
            ollama_host: "http://127.0.0.1:1".to_string(),
            gemini_api_key: None,
            cache_enabled: false,
            ..Default::default()
        })
    }

    #[test]
    fn test_metrics_isolated_between_instances() {
        let router_a = LlmRouter::new(offline_config(), None, false);
        let router_b = LlmRouter::new(offline_config(), None, false);

        {
            let mut metrics = router_a.metrics.lock().unwrap();
            metrics.total_requests += 5;
            metrics.cache_hits += 2;
        }

        assert_eq!(router_a.metrics().total_requests, 5);
        assert_eq!(router_b.metrics().total_requests, 0);
        assert_eq!(router_b.metrics().cache_hits, 0);
    }

    #[test]
    fn test_cache_hit_rate_and_latency() {
        let mut metrics = RouterMetrics::default();
        assert_eq!(metrics.cache_hit_rate(), 0.0);
        assert_eq!(metrics.avg_latency_ms(), 0.0);

        metrics.total_requests = 10;
        metrics.cache_hits = 4;
        metrics.total_latency_ms = 900.0;
        metrics.latency_samples = 3;
        assert!((metrics.cache_hit_rate() - 0.4).abs() < f64::EPSILON);
        assert!((metrics.avg_latency_ms() - 300.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_no_provider_errors_cleanly() {
        let router = LlmRouter::new(offline_config(), None, false);
        let request = StructuredRequest::new("rate this", 0.3);
        let result = router
            .generate_structured::<crate::schemas::IdeaList>(&request)
            .await;
        match result {
            Err(WorkflowError::AllProvidersFailed(msg)) => assert!(msg.contains("ollama")),
            Err(WorkflowError::ProviderUnavailable(_)) => {}
            other => panic!("expected provider failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_has_provider_false_when_offline() {
        let router = LlmRouter::new(offline_config(), None, false);
        assert!(!router.has_provider().await);
    }
}
