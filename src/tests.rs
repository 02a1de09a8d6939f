#[cfg(test)]
mod tests {
	use crate::backends::*;
	use crate::callbacks::*;
	use crate::config::*;
	use crate::engine::*;
	use crate::error::*;
	use crate::policies::*;
	use crate::types::*;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::{Arc, Mutex};
	use std::time::Duration;
	use async_trait::async_trait;

	fn secs(s: u64) -> Duration {
		Duration::from_secs(s)
	}

	fn policy(service: &str) -> Policy {
		Policy::builder(service)
			.metric("jobs")
			.coverage(1.0)
			.threshold(10)
			.replicas(1, 10)
			.sample_rate(secs(1))
			.scale_rate(secs(1))
			.build()
	}

	/// Always reports the same replica count, whatever was set
	struct StuckOrchestrator {
		replicas: i64,
		calls: Mutex<Vec<i64>>,
	}

	#[async_trait]
	impl Orchestrator for StuckOrchestrator {
		async fn get_replicas(&self, _service: &str) -> KogiaResult<i64> {
			Ok(self.replicas)
		}
		async fn set_replicas(&self, _service: &str, count: i64) -> KogiaResult<()> {
			self.calls.lock().unwrap().push(count);
			Ok(())
		}
	}

	/// Rejects the first `failures` scale requests
	struct FlakyOrchestrator {
		replicas: Mutex<i64>,
		failures: AtomicUsize,
		attempts: AtomicUsize,
	}

	#[async_trait]
	impl Orchestrator for FlakyOrchestrator {
		async fn get_replicas(&self, _service: &str) -> KogiaResult<i64> {
			Ok(*self.replicas.lock().unwrap())
		}
		async fn set_replicas(&self, _service: &str, count: i64) -> KogiaResult<()> {
			self.attempts.fetch_add(1, Ordering::SeqCst);
			if self.failures.load(Ordering::SeqCst) > 0 {
				self.failures.fetch_sub(1, Ordering::SeqCst);
				return Err(KogiaError::backend("set_replicas", "update out of sequence"));
			}
			*self.replicas.lock().unwrap() = count;
			Ok(())
		}
	}

	#[tokio::test]
	async fn test_constant_load_upscales_once_per_delay() {
		// 3 ticks per cycle, upscale allowed every 3 cycles
		let policy = Policy {
			scale_rate: secs(3),
			upscale_delay: secs(9),
			downscale_delay: secs(27),
			..policy("worker")
		};
		let orchestrator = Arc::new(StuckOrchestrator {
			replicas: 1,
			calls: Mutex::new(Vec::new()),
		});
		let callbacks = KogiaCallbacks::new(Arc::new(StaticMetrics::new(1_000)), orchestrator.clone());
		let mut scaler = Autoscaler::new(policy, callbacks).unwrap();

		let mut scaled_cycles = Vec::new();
		for tick in 1..=30u64 {
			match scaler.tick().await {
				TickOutcome::Scaled { direction, from, to } => {
					assert_eq!((direction, from, to), (ScaleDirection::Up, 1, 10));
					scaled_cycles.push(tick / 3);
				}
				TickOutcome::CoolingDown { direction, .. } => {
					assert_eq!(direction, ScaleDirection::Up);
				}
				TickOutcome::Sampled { sample } => assert_eq!(sample, 1_000),
				other => panic!("unexpected outcome {:?} at tick {}", other, tick),
			}
		}

		assert_eq!(scaled_cycles, vec![1, 4, 7, 10]);
		assert!(scaled_cycles.windows(2).all(|w| w[1] - w[0] >= 3));
		assert_eq!(orchestrator.calls.lock().unwrap().len(), 4);
	}

	#[tokio::test]
	async fn test_failed_rescale_is_retried_next_cycle() {
		let policy = Policy {
			upscale_delay: secs(2),
			downscale_delay: secs(4),
			..policy("worker")
		};
		let orchestrator = Arc::new(FlakyOrchestrator {
			replicas: Mutex::new(1),
			failures: AtomicUsize::new(1),
			attempts: AtomicUsize::new(0),
		});
		let callbacks = KogiaCallbacks::new(Arc::new(StaticMetrics::new(45)), orchestrator.clone());
		let mut scaler = Autoscaler::new(policy, callbacks).unwrap();

		assert_eq!(
			scaler.tick().await,
			TickOutcome::ScaleFailed { direction: ScaleDirection::Up, target: 5, current: 1 }
		);
		assert_eq!(scaler.last_rescale(), None);

		assert_eq!(
			scaler.tick().await,
			TickOutcome::Scaled { direction: ScaleDirection::Up, from: 1, to: 5 }
		);
		assert_eq!(scaler.last_rescale(), Some(2));
		assert_eq!(*orchestrator.replicas.lock().unwrap(), 5);

		assert_eq!(scaler.tick().await, TickOutcome::Unchanged { replicas: 5 });
		assert_eq!(orchestrator.attempts.load(Ordering::SeqCst), 2);
	}

	#[tokio::test]
	async fn test_rescale_restarts_both_cooldowns() {
		let policy = Policy {
			upscale_delay: secs(2),
			downscale_delay: secs(3),
			..policy("worker")
		};
		let metrics = Arc::new(SwitchableMetrics(AtomicUsize::new(80)));
		let orchestrator = Arc::new(InMemoryOrchestrator::new().with_service("worker", 2));
		let callbacks = KogiaCallbacks::new(metrics.clone(), orchestrator.clone());
		let mut scaler = Autoscaler::new(policy, callbacks).unwrap();

		assert!(matches!(scaler.tick().await, TickOutcome::Scaled { to: 8, .. }));

		// backlog drains right after the upscale
		metrics.0.store(10, Ordering::SeqCst);
		assert!(matches!(scaler.tick().await, TickOutcome::CoolingDown { direction: ScaleDirection::Down, .. }));
		assert!(matches!(scaler.tick().await, TickOutcome::CoolingDown { direction: ScaleDirection::Down, .. }));
		assert!(matches!(scaler.tick().await, TickOutcome::Scaled { from: 8, to: 1, .. }));

		// and spikes again: upscale delay counts from the downscale
		metrics.0.store(30, Ordering::SeqCst);
		assert!(matches!(scaler.tick().await, TickOutcome::CoolingDown { direction: ScaleDirection::Up, .. }));
		assert!(matches!(scaler.tick().await, TickOutcome::Scaled { from: 1, to: 3, .. }));

		assert_eq!(
			orchestrator.history().await,
			vec![("worker".to_string(), 8), ("worker".to_string(), 1), ("worker".to_string(), 3)]
		);
	}

	struct SwitchableMetrics(AtomicUsize);

	#[async_trait]
	impl MetricSource for SwitchableMetrics {
		async fn get_metric(&self, _name: &str) -> KogiaResult<i64> {
			Ok(self.0.load(Ordering::SeqCst) as i64)
		}
	}

	#[tokio::test]
	async fn test_failed_metric_counts_as_zero() {
		let policy = Policy {
			metrics: vec!["mails".to_string(), "broken".to_string(), "retries".to_string()],
			scale_rate: secs(2),
			..policy("mailer")
		};
		let metrics = StaticMetrics::new(0)
			.with_metric("mails", 30)
			.with_metric("retries", 12)
			.with_failure("broken");
		let orchestrator = InMemoryOrchestrator::new().with_service("mailer", 5);
		let callbacks = KogiaCallbacks::new(Arc::new(metrics), Arc::new(orchestrator));
		let mut scaler = Autoscaler::new(policy, callbacks).unwrap();

		assert_eq!(scaler.tick().await, TickOutcome::Sampled { sample: 42 });
		assert_eq!(scaler.tick().await, TickOutcome::Unchanged { replicas: 5 });
		assert_eq!(scaler.window(), &[42, 42]);
	}

	#[tokio::test]
	async fn test_unsizable_window_falls_back_to_min_replicas() {
		// floor(2 * 0.4) == 0 samples to cover
		let policy = Policy {
			coverage: 0.4,
			scale_rate: secs(2),
			..policy("worker")
		};
		assert_eq!(required(&[500, 500], policy.coverage, policy.threshold), UNSIZABLE);

		let orchestrator = Arc::new(InMemoryOrchestrator::new().with_service("worker", 5));
		let callbacks = KogiaCallbacks::new(Arc::new(StaticMetrics::new(500)), orchestrator.clone());
		let mut scaler = Autoscaler::new(policy, callbacks).unwrap();

		assert_eq!(scaler.tick().await, TickOutcome::Sampled { sample: 500 });
		assert_eq!(
			scaler.tick().await,
			TickOutcome::Scaled { direction: ScaleDirection::Down, from: 5, to: 1 }
		);
		assert_eq!(orchestrator.history().await, vec![("worker".to_string(), 1)]);
	}

	#[test]
	fn test_defaults_fill_everything_but_service_and_metrics() {
		let yaml = r#"
connection:
  amqp: http://localhost:15672/
  docker: http://localhost:2375
defaults:
  service: template
  metrics: [fallback]
  coverage: 0.8
  threshold: 25
  min_replicas: 2
  max_replicas: 12
  sample_rate: 5s
  scale_rate: 30s
  upscale_delay: 1m
  downscale_delay: 5m
services:
  - service: indexer
    metrics: [docs.new, docs.changed]
"#;
		let config = ConfigLoader::load_str(yaml).unwrap();
		let defaults = config.defaults.clone().unwrap();
		let resolved = config.resolve().unwrap();

		let expected = Policy {
			service: "indexer".to_string(),
			metrics: vec!["docs.new".to_string(), "docs.changed".to_string()],
			..defaults
		};
		assert_eq!(resolved.services(), &[expected]);
	}

	#[test]
	fn test_invalid_service_blocks_engine() {
		let yaml = r#"
services:
  - service: ok
    metrics: [a]
    coverage: 0.5
    threshold: 1
    sample_rate: 1s
    scale_rate: 2s
  - service: bad
    metrics: [b]
    coverage: 0.5
    threshold: 1
    sample_rate: 2s
    scale_rate: 3s
"#;
		let err = ConfigLoader::load_str(yaml).unwrap().resolve().unwrap_err();
		match err {
			KogiaError::Validation { report } => {
				assert_eq!(report.len(), 1);
				let bad = report.iter().next().unwrap();
				assert_eq!(bad.service, "bad");
				assert_eq!(bad.errors["scale_rate"], "must be multiple of sample_rate");
			}
			other => panic!("expected validation failure, got {:?}", other),
		}
	}

	#[tokio::test(start_paused = true)]
	async fn test_engine_lifecycle() {
		let config = KogiaConfig {
			services: vec![
				Policy { scale_rate: secs(2), ..policy("mailer") },
				// not known to the orchestrator, its loop only logs errors
				policy("ghost"),
			],
			..Default::default()
		}
		.resolve()
		.unwrap();

		let orchestrator = Arc::new(InMemoryOrchestrator::new().with_service("mailer", 1));
		let callbacks = KogiaCallbacks::new(Arc::new(StaticMetrics::new(45)), orchestrator.clone());
		let engine = KogiaEngine::new(&config, callbacks).unwrap();
		let handle = engine.handle();
		let engine_task = tokio::spawn(engine.start());

		// first sample after 1s, first scale cycle after 2s
		tokio::time::sleep(Duration::from_millis(1_500)).await;
		assert!(orchestrator.history().await.is_empty());
		tokio::time::sleep(Duration::from_secs(1)).await;
		assert_eq!(orchestrator.history().await, vec![("mailer".to_string(), 5)]);

		handle.shutdown();
		engine_task.await.unwrap().unwrap();
		assert!(handle.is_shutdown());
	}

	#[test]
	fn test_error_variants() {
		let err = KogiaError::config("bad config");
		assert!(matches!(err, KogiaError::Config { .. }));
		let err = KogiaError::not_replicated("agent");
		assert!(err.to_string().contains("agent"));
		let err = KogiaError::backend("get_metric", "timeout");
		assert_eq!(err.to_string(), "Backend call failed for 'get_metric': timeout");
	}
}
