//! Shared application state.
//!
//! Everything is `Arc`-friendly and cloneable; per-session state lives in
//! the session supervisor, not here.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::BrainConfig;
use crate::obs::metrics::BrainMetrics;
use crate::policy::{policy_from_config, CallPolicy};
use crate::producer::{ScriptedProducer, SpeechProducer};
use crate::session::registry::CallRegistry;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: BrainConfig,
    metrics: Arc<BrainMetrics>,
    registry: CallRegistry,
    producer: Arc<dyn SpeechProducer>,
    policy: Arc<dyn CallPolicy>,
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(cfg: BrainConfig) -> Self {
        let producer: Arc<dyn SpeechProducer> = Arc::new(ScriptedProducer::default());
        Self::with_producer(cfg, producer)
    }

    /// Wire in the real LLM/policy collaborator.
    pub fn with_producer(cfg: BrainConfig, producer: Arc<dyn SpeechProducer>) -> Self {
        let policy = policy_from_config(&cfg.allowlist);
        Self {
            inner: Arc::new(AppStateInner {
                cfg,
                metrics: Arc::new(BrainMetrics::default()),
                registry: CallRegistry::new(),
                producer,
                policy,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn cfg(&self) -> &BrainConfig {
        &self.inner.cfg
    }

    pub fn metrics(&self) -> &BrainMetrics {
        &self.inner.metrics
    }

    pub fn metrics_arc(&self) -> Arc<BrainMetrics> {
        self.inner.metrics.clone()
    }

    pub fn registry(&self) -> &CallRegistry {
        &self.inner.registry
    }

    pub fn producer(&self) -> Arc<dyn SpeechProducer> {
        self.inner.producer.clone()
    }

    pub fn policy(&self) -> &dyn CallPolicy {
        self.inner.policy.as_ref()
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.inner.shutdown
    }

    /// Begin process shutdown: cancel every live session.
    pub fn begin_shutdown(&self) {
        self.inner.shutdown.cancel();
        self.inner.registry.shutdown_all();
    }
}
