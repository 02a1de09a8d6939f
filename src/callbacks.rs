// src/callbacks.rs

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::KogiaResult;

/// Source of backlog measurements
///
/// Implement this to feed queue depths (or any other countable backlog) to
/// the autoscaler.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Current backlog of the named metric, e.g. messages waiting in a queue
    ///
    /// Failures are treated as transient: the autoscaler logs them and counts
    /// the metric as zero for that sample.
    async fn get_metric(&self, name: &str) -> KogiaResult<i64>;
}

/// Container orchestrator that owns the replica counts
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Number of replicas the service is currently configured to run
    async fn get_replicas(&self, service: &str) -> KogiaResult<i64>;

    /// Change the number of replicas of a service
    ///
    /// Must fail with [`KogiaError::NotReplicated`](crate::KogiaError::NotReplicated)
    /// if the service is not in a replica-settable mode.
    async fn set_replicas(&self, service: &str, count: i64) -> KogiaResult<()>;
}

/// Both backends a running autoscaler talks to
#[derive(Clone)]
pub struct KogiaCallbacks {
    pub metric_source: Arc<dyn MetricSource>,
    pub orchestrator: Arc<dyn Orchestrator>,
}

impl KogiaCallbacks {
    pub fn new(metric_source: Arc<dyn MetricSource>, orchestrator: Arc<dyn Orchestrator>) -> Self {
        Self {
            metric_source,
            orchestrator,
        }
    }
}
