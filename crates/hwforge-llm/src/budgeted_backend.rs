//! Call-count budget around any `LlmBackend`

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, warn};

use hwforge_utils::error::LlmError;

use crate::types::{LlmBackend, LlmInvocation, LlmResult};

/// Calls allowed per process when neither env nor config sets a limit
pub(crate) const DEFAULT_BUDGET_LIMIT: u32 = 40;

pub(crate) const BUDGET_ENV_VAR: &str = "HWFORGE_LLM_BUDGET";

/// Wraps a backend and fails fast once `limit` invocations were attempted.
///
/// The budget counts attempts, not successes: a failed call still consumes
/// its slot, so retry loops in the orchestrator cannot exceed the limit.
pub struct BudgetedBackend {
    inner: Box<dyn LlmBackend>,
    calls: AtomicU32,
    limit: u32,
}

impl BudgetedBackend {
    pub fn new(inner: Box<dyn LlmBackend>, limit: u32) -> Self {
        debug!(limit, "Creating BudgetedBackend");
        Self {
            inner,
            calls: AtomicU32::new(0),
            limit,
        }
    }

    /// Limit precedence: `HWFORGE_LLM_BUDGET` > config `budget` > default (40).
    pub fn with_limit_from_config(inner: Box<dyn LlmBackend>, config_budget: Option<u32>) -> Self {
        let limit = resolve_limit(std::env::var(BUDGET_ENV_VAR).ok().as_deref(), config_budget);
        Self::new(inner, limit)
    }

    #[must_use]
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit
    }
}

fn resolve_limit(env_value: Option<&str>, config_budget: Option<u32>) -> u32 {
    if let Some(env_limit) = env_value.and_then(|s| s.trim().parse::<u32>().ok()) {
        debug!(limit = env_limit, "Using budget limit from {}", BUDGET_ENV_VAR);
        return env_limit;
    }
    if let Some(config_limit) = config_budget {
        debug!(limit = config_limit, "Using budget limit from config file");
        return config_limit;
    }
    DEFAULT_BUDGET_LIMIT
}

#[async_trait]
impl LlmBackend for BudgetedBackend {
    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        // Count before calling so failures consume budget too.
        let current = self.calls.fetch_add(1, Ordering::SeqCst);

        if current >= self.limit {
            let attempted = current + 1;
            warn!(limit = self.limit, attempted, "LLM budget exhausted");
            return Err(LlmError::BudgetExceeded {
                limit: self.limit,
                attempted,
            });
        }

        let result = self.inner.invoke(inv).await;
        if let Err(e) = &result {
            debug!(
                call_count = current + 1,
                limit = self.limit,
                error = %e,
                "Inner backend failed (budget slot still consumed)"
            );
        }
        result
    }
}
