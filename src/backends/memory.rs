//! In-process backends for tests and dry runs.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::callbacks::{MetricSource, Orchestrator};
use crate::error::{KogiaError, KogiaResult};

/// Metric source that reports fixed values
#[derive(Debug, Clone, Default)]
pub struct StaticMetrics {
    fallback: i64,
    values: HashMap<String, i64>,
    failing: HashSet<String>,
}

impl StaticMetrics {
    /// Every metric reports `fallback` unless overridden
    pub fn new(fallback: i64) -> Self {
        Self {
            fallback,
            ..Self::default()
        }
    }

    pub fn with_metric(mut self, name: &str, value: i64) -> Self {
        self.values.insert(name.to_string(), value);
        self
    }

    /// Make every lookup of `name` fail
    pub fn with_failure(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }
}

#[async_trait]
impl MetricSource for StaticMetrics {
    async fn get_metric(&self, name: &str) -> KogiaResult<i64> {
        if self.failing.contains(name) {
            return Err(KogiaError::backend(
                "get_metric",
                format!("metric '{}' is unavailable", name),
            ));
        }
        Ok(self.values.get(name).copied().unwrap_or(self.fallback))
    }
}

#[derive(Debug, Clone)]
struct ServiceState {
    replicas: i64,
    replicated: bool,
}

/// Orchestrator that keeps replica counts in memory
#[derive(Debug, Default)]
pub struct InMemoryOrchestrator {
    services: RwLock<HashMap<String, ServiceState>>,
    history: RwLock<Vec<(String, i64)>>,
}

impl InMemoryOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a replicated service
    pub fn with_service(mut self, name: &str, replicas: i64) -> Self {
        self.services.get_mut().insert(
            name.to_string(),
            ServiceState {
                replicas,
                replicated: true,
            },
        );
        self
    }

    /// Register a service in global mode, which cannot be scaled
    pub fn with_global_service(mut self, name: &str, replicas: i64) -> Self {
        self.services.get_mut().insert(
            name.to_string(),
            ServiceState {
                replicas,
                replicated: false,
            },
        );
        self
    }

    pub async fn replicas(&self, service: &str) -> Option<i64> {
        self.services.read().await.get(service).map(|s| s.replicas)
    }

    /// Every successful `set_replicas` call, oldest first
    pub async fn history(&self) -> Vec<(String, i64)> {
        self.history.read().await.clone()
    }
}

#[async_trait]
impl Orchestrator for InMemoryOrchestrator {
    async fn get_replicas(&self, service: &str) -> KogiaResult<i64> {
        self.replicas(service).await.ok_or_else(|| {
            KogiaError::backend("get_replicas", format!("service '{}' not found", service))
        })
    }

    async fn set_replicas(&self, service: &str, count: i64) -> KogiaResult<()> {
        let mut services = self.services.write().await;
        let state = services.get_mut(service).ok_or_else(|| {
            KogiaError::backend("set_replicas", format!("service '{}' not found", service))
        })?;
        if !state.replicated {
            return Err(KogiaError::not_replicated(service));
        }
        state.replicas = count;
        drop(services);

        self.history.write().await.push((service.to_string(), count));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_static_metrics() {
        let metrics = StaticMetrics::new(123)
            .with_metric("jobs", 7)
            .with_failure("broken");

        assert_eq!(metrics.get_metric("anything").await.unwrap(), 123);
        assert_eq!(metrics.get_metric("jobs").await.unwrap(), 7);
        assert_err!(metrics.get_metric("broken").await);
    }

    #[tokio::test]
    async fn test_in_memory_orchestrator() {
        let swarm = InMemoryOrchestrator::new()
            .with_service("worker", 2)
            .with_global_service("agent", 3);

        assert_eq!(swarm.get_replicas("worker").await.unwrap(), 2);
        assert_ok!(swarm.set_replicas("worker", 5).await);
        assert_eq!(swarm.get_replicas("worker").await.unwrap(), 5);
        assert_eq!(swarm.history().await, vec![("worker".to_string(), 5)]);

        assert_err!(swarm.get_replicas("ghost").await);
        assert_err!(swarm.set_replicas("ghost", 1).await);
    }

    #[tokio::test]
    async fn test_global_services_cannot_be_scaled() {
        let swarm = InMemoryOrchestrator::new().with_global_service("agent", 3);

        let err = swarm.set_replicas("agent", 1).await.unwrap_err();
        assert!(matches!(err, KogiaError::NotReplicated { ref service } if service == "agent"));
        assert_eq!(swarm.replicas("agent").await, Some(3));
        assert!(swarm.history().await.is_empty());
    }
}
