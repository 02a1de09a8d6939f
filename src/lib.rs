//! # Kogia - Queue-Driven Autoscaling
//!
//! Kogia keeps the replica count of container services in line with the
//! backlog they have to work through. For every configured service it
//! periodically samples one or more queue depths, sizes the service from a
//! window of recent samples and applies the result to the orchestrator,
//! while separate upscale and downscale cooldowns keep it from flapping.
//!
//! ## Architecture
//!
//! ```text
//!   kogia.yml ──► ConfigLoader ──► KogiaConfig::resolve() ──► ResolvedConfig
//!                                   (defaults + validation)        │
//!                                                                  ▼
//!                        ┌──────────────────── KogiaEngine ─────────────────────┐
//!                        │  Autoscaler (svc A)   Autoscaler (svc B)   ...       │
//!                        │   every sample_rate:  sum metrics → window           │
//!                        │   every scale_rate:   required → bound → cooldown    │
//!                        └──────────┬───────────────────────────┬───────────────┘
//!                                   │                           │
//!                           MetricSource                  Orchestrator
//!                     (RabbitMQ queue depths)       (Docker swarm replicas)
//! ```
//!
//! Every service gets its own task with its own sample window and cooldown
//! clock; tasks share nothing.
//!
//! ## Sizing
//!
//! At the end of a scale cycle the window holds `scale_rate / sample_rate`
//! samples. The target is the smallest replica count `r` such that fewer
//! than `floor(len * coverage)` samples exceed `r * threshold`, clamped to
//! `[min_replicas, max_replicas]`.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use kogia::backends::{InMemoryOrchestrator, StaticMetrics};
//! use kogia::{ConfigLoader, KogiaCallbacks, KogiaEngine};
//!
//! #[tokio::main]
//! async fn main() -> kogia::KogiaResult<()> {
//!     let config = ConfigLoader::load_file("kogia.yml")?.resolve()?;
//!
//!     let callbacks = KogiaCallbacks::new(
//!         Arc::new(StaticMetrics::new(123)),
//!         Arc::new(InMemoryOrchestrator::new().with_service("mailer", 1)),
//!     );
//!
//!     let engine = KogiaEngine::new(&config, callbacks)?;
//!     let handle = engine.handle();
//!     tokio::spawn(async move {
//!         let _ = tokio::signal::ctrl_c().await;
//!         handle.shutdown();
//!     });
//!
//!     engine.start().await
//! }
//! ```

pub mod error;
pub mod utils;
pub mod types;
pub mod config;
pub mod tests;
pub mod engine;
pub mod policies;
pub mod callbacks;
pub mod backends;

// Re-export common types for convenience
pub use types::{
    ConnectionConfig, FieldErrors, KogiaConfig, Policy, PolicyBuilder, ResolvedConfig,
    ServiceName,
};

pub use config::{ConfigLoader, ServiceErrors, ValidationReport, DEFAULT_CONFIG_PATH};

pub use error::{KogiaError, KogiaResult};

pub use callbacks::{KogiaCallbacks, MetricSource, Orchestrator};

pub use engine::{Autoscaler, CooldownClock, KogiaEngine, KogiaHandle, SampleWindow, TickOutcome};

pub use policies::{bound, required, ScaleDirection, UNSIZABLE};
