// src/engine.rs

use futures::future::join_all;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::callbacks::KogiaCallbacks;
use crate::config::{ServiceErrors, ValidationReport};
use crate::error::{KogiaError, KogiaResult};
use crate::policies::{bound, required, ScaleDirection, UNSIZABLE};
use crate::types::{Policy, ResolvedConfig};

/// What a single sampling tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// A sample was recorded, no scale cycle ended on this tick
    Sampled { sample: i64 },
    /// The current replica count could not be read, cycle aborted
    ReplicasUnavailable,
    /// Service already runs the target number of replicas
    Unchanged { replicas: i64 },
    /// Rescale needed but the cooldown for this direction has not elapsed
    CoolingDown {
        direction: ScaleDirection,
        target: i64,
        current: i64,
    },
    /// The orchestrator accepted the new replica count
    Scaled {
        direction: ScaleDirection,
        from: i64,
        to: i64,
    },
    /// The orchestrator rejected the new replica count, retried next cycle
    ScaleFailed {
        direction: ScaleDirection,
        target: i64,
        current: i64,
    },
}

/// Most recent aggregate samples, trimmed to one scale cycle
#[derive(Debug, Clone)]
pub struct SampleWindow {
    samples: Vec<i64>,
    size: usize,
}

impl SampleWindow {
    pub fn new(size: usize) -> Self {
        Self {
            samples: Vec::with_capacity(size),
            size,
        }
    }

    pub fn push(&mut self, sample: i64) {
        self.samples.push(sample);
    }

    /// Drop everything but the last `size` samples
    pub fn trim(&mut self) {
        if self.samples.len() > self.size {
            let excess = self.samples.len() - self.size;
            self.samples.drain(..excess);
        }
    }

    pub fn samples(&self) -> &[i64] {
        &self.samples
    }
}

/// Tracks the scale cycle of the last successful rescale.
///
/// A rescale in either direction restarts both cooldowns.
#[derive(Debug, Clone)]
pub struct CooldownClock {
    rescaled_at: Option<u64>,
    upscale_delay: u64,
    downscale_delay: u64,
}

impl CooldownClock {
    /// Delays are in scale cycles
    pub fn new(upscale_delay: u64, downscale_delay: u64) -> Self {
        Self {
            rescaled_at: None,
            upscale_delay,
            downscale_delay,
        }
    }

    /// Whether a rescale in `direction` may happen during `cycle`
    pub fn permits(&self, direction: ScaleDirection, cycle: u64) -> bool {
        let delay = match direction {
            ScaleDirection::Up => self.upscale_delay,
            ScaleDirection::Down => self.downscale_delay,
            ScaleDirection::Maintain => return false,
        };

        match self.rescaled_at {
            Some(at) => cycle >= at.saturating_add(delay),
            None => true, // Never scaled before
        }
    }

    pub fn record(&mut self, cycle: u64) {
        self.rescaled_at = Some(cycle);
    }

    pub fn last_rescale(&self) -> Option<u64> {
        self.rescaled_at
    }
}

/// Control loop for one service.
///
/// Samples the configured metrics every `sample_rate`, and at the end of
/// every scale cycle sizes the service from the window, clamps the result
/// and applies it if the cooldown for that direction has elapsed.
pub struct Autoscaler {
    policy: Policy,
    callbacks: KogiaCallbacks,
    ticks: u64,
    scale_ratio: u64,
    window: SampleWindow,
    cooldown: CooldownClock,
}

impl Autoscaler {
    /// Create an autoscaler for a policy that has already been merged with
    /// the defaults. Fails if the policy does not validate.
    pub fn new(policy: Policy, callbacks: KogiaCallbacks) -> KogiaResult<Self> {
        let errors = policy.validate();
        if !errors.is_empty() {
            let mut report = ValidationReport::default();
            report.push(ServiceErrors {
                service: policy.service.clone(),
                errors,
            });
            return Err(KogiaError::Validation { report });
        }

        let scale_ratio = policy.scale_ratio();
        let window_size = usize::try_from(scale_ratio)
            .map_err(|_| KogiaError::config("scale_rate / sample_rate is too large"))?;

        Ok(Self {
            cooldown: CooldownClock::new(
                policy.upscale_delay_cycles(),
                policy.downscale_delay_cycles(),
            ),
            window: SampleWindow::new(window_size),
            scale_ratio,
            ticks: 0,
            callbacks,
            policy,
        })
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn window(&self) -> &[i64] {
        self.window.samples()
    }

    /// Scale cycle of the last successful rescale
    pub fn last_rescale(&self) -> Option<u64> {
        self.cooldown.last_rescale()
    }

    /// Run until `shutdown` is cancelled, ticking every `sample_rate`.
    ///
    /// Cancellation is only observed between ticks.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let period = self.policy.sample_rate;
        let mut timer = interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(service = %self.policy.service, "starting autoscaler");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!(service = %self.policy.service, "autoscaler shutting down");
                    break;
                }
                _ = timer.tick() => {
                    let outcome = self.tick().await;
                    debug!(service = %self.policy.service, tick = self.ticks, ?outcome, "tick finished");
                }
            }
        }
    }

    /// Record one sample and, on a scale-cycle boundary, evaluate the window
    pub async fn tick(&mut self) -> TickOutcome {
        self.ticks += 1;

        let sample = self.sample().await;
        self.window.push(sample);

        if self.ticks % self.scale_ratio != 0 {
            return TickOutcome::Sampled { sample };
        }

        self.window.trim();
        let cycle = self.ticks / self.scale_ratio;
        self.rescale(cycle).await
    }

    /// Sum of all configured metrics; failed metrics count as zero
    async fn sample(&self) -> i64 {
        let mut total: i64 = 0;
        for name in &self.policy.metrics {
            match self.callbacks.metric_source.get_metric(name).await {
                Ok(value) => total = total.saturating_add(value),
                Err(e) => {
                    error!(
                        service = %self.policy.service,
                        metric = %name,
                        "failed to get metric: {}", e
                    );
                }
            }
        }
        total
    }

    async fn rescale(&mut self, cycle: u64) -> TickOutcome {
        let service = self.policy.service.as_str();

        let wanted = required(self.window.samples(), self.policy.coverage, self.policy.threshold);
        if wanted == UNSIZABLE {
            // the sentinel still goes through bound and lands on min_replicas
            warn!(service, cycle, window = ?self.window.samples(), "unable to size sample window");
        }
        let target = bound(wanted, self.policy.min_replicas, self.policy.max_replicas);

        let orchestrator = &self.callbacks.orchestrator;
        let current = match orchestrator.get_replicas(service).await {
            Ok(current) => current,
            Err(e) => {
                error!(service, cycle, "failed to get replica count: {}", e);
                return TickOutcome::ReplicasUnavailable;
            }
        };

        let direction = ScaleDirection::between(target, current);
        if direction == ScaleDirection::Maintain {
            debug!(service, cycle, replicas = current, "no rescale needed");
            return TickOutcome::Unchanged { replicas: current };
        }

        if !self.cooldown.permits(direction, cycle) {
            debug!(
                service,
                cycle,
                ?direction,
                target,
                current,
                last_rescale = ?self.cooldown.last_rescale(),
                "rescale skipped due to cooldown"
            );
            return TickOutcome::CoolingDown {
                direction,
                target,
                current,
            };
        }

        match orchestrator.set_replicas(service, target).await {
            Ok(()) => {
                self.cooldown.record(cycle);
                info!(service, cycle, from = current, to = target, "{} scaled to {}", service, target);
                TickOutcome::Scaled {
                    direction,
                    from: current,
                    to: target,
                }
            }
            Err(e) => {
                error!(service, cycle, target, "failed to scale: {}", e);
                TickOutcome::ScaleFailed {
                    direction,
                    target,
                    current,
                }
            }
        }
    }
}

/// Runs one [`Autoscaler`] per configured service
pub struct KogiaEngine {
    scalers: Vec<Autoscaler>,
    shutdown: CancellationToken,
}

impl KogiaEngine {
    /// Create a new engine for every service of a resolved configuration
    pub fn new(config: &ResolvedConfig, callbacks: KogiaCallbacks) -> KogiaResult<Self> {
        let scalers = config
            .services()
            .iter()
            .map(|policy| Autoscaler::new(policy.clone(), callbacks.clone()))
            .collect::<KogiaResult<Vec<_>>>()?;

        Ok(Self {
            scalers,
            shutdown: CancellationToken::new(),
        })
    }

    /// Get a handle to stop the engine
    pub fn handle(&self) -> KogiaHandle {
        KogiaHandle {
            shutdown: self.shutdown.clone(),
        }
    }

    pub fn services(&self) -> impl Iterator<Item = &str> {
        self.scalers.iter().map(|s| s.policy().service.as_str())
    }

    /// Start every autoscaler and wait until all of them have stopped
    pub async fn start(self) -> KogiaResult<()> {
        if self.scalers.is_empty() {
            warn!("no services configured, nothing to autoscale");
        }
        info!(services = self.scalers.len(), "Kogia engine starting...");

        let tasks: Vec<_> = self
            .scalers
            .into_iter()
            .map(|scaler| tokio::spawn(scaler.run(self.shutdown.child_token())))
            .collect();

        for result in join_all(tasks).await {
            if let Err(e) = result {
                error!("autoscaler task failed: {}", e);
            }
        }

        info!("Kogia engine stopped");
        Ok(())
    }
}

/// Handle for stopping a running engine
#[derive(Clone)]
pub struct KogiaHandle {
    shutdown: CancellationToken,
}

impl KogiaHandle {
    /// Ask every autoscaler to stop after its current tick
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}
