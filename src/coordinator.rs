//! Reward coordinator - the asynchronous seam between the hosting runtime
//! and the decision pipeline.
//!
//! `handle_elimination` is called from the host's single-threaded loop and
//! returns as soon as the evaluation job is queued; evaluation and store
//! I/O run on the worker pool. Anything the host has to show the user
//! comes back as an [`EffectRequest`] on the channel handed out at
//! construction, so observable effects always apply on the host's own
//! context.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::cache::CooldownCache;
use crate::config::RewardConfig;
use crate::executor::{ExecutorError, TaskExecutor};
use crate::pipeline::{DecisionPipeline, DenyReason, EliminationEvent, Verdict};
use crate::util::time::{format_duration, Clock};

/// Observable side effect for the host to apply on its own context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectRequest {
    /// All checks passed. `commands` are the configured reward templates,
    /// still carrying `%eliminator%`/`%target%` placeholders; substitution
    /// and execution belong to the host.
    Reward {
        eliminator: Uuid,
        target: Uuid,
        commands: Vec<String>,
    },
    /// A check failed and the eliminator should be told why.
    Denied {
        eliminator: Uuid,
        reason: DenyReason,
        /// Human-readable remaining cooldown for time-based denials
        remaining: Option<String>,
    },
}

pub struct RewardCoordinator {
    config: Arc<RewardConfig>,
    pipeline: Arc<DecisionPipeline>,
    cache: Arc<CooldownCache>,
    executor: Arc<TaskExecutor>,
    clock: Arc<dyn Clock>,
    effects: mpsc::UnboundedSender<EffectRequest>,
}

impl RewardCoordinator {
    /// Build the coordinator and the effect stream the host must consume.
    pub fn new(
        config: Arc<RewardConfig>,
        cache: Arc<CooldownCache>,
        executor: Arc<TaskExecutor>,
        clock: Arc<dyn Clock>,
    ) -> (Self, mpsc::UnboundedReceiver<EffectRequest>) {
        let (effects, effects_rx) = mpsc::unbounded_channel();
        let pipeline = Arc::new(DecisionPipeline::new(
            config.rewards.clone(),
            Arc::clone(&cache),
            Arc::clone(&clock),
        ));

        let coordinator = Self {
            config,
            pipeline,
            cache,
            executor,
            clock,
            effects,
        };
        (coordinator, effects_rx)
    }

    /// Accept one elimination event.
    ///
    /// Returns once the evaluation job is queued; the verdict arrives later
    /// as an [`EffectRequest`]. A full queue surfaces as an error instead of
    /// blocking the caller.
    pub fn handle_elimination(&self, event: EliminationEvent) -> Result<(), ExecutorError> {
        let pipeline = Arc::clone(&self.pipeline);
        let cache = Arc::clone(&self.cache);
        let executor = Arc::clone(&self.executor);
        let clock = Arc::clone(&self.clock);
        let config = Arc::clone(&self.config);
        let effects = self.effects.clone();

        self.executor
            .submit(async move {
                match pipeline.evaluate(&event).await {
                    None => {}
                    Some(Verdict::Granted) => {
                        let request = EffectRequest::Reward {
                            eliminator: event.eliminator,
                            target: event.target,
                            commands: config.rewards.commands.clone(),
                        };
                        if effects.send(request).is_err() {
                            warn!("Effect receiver dropped; reward effects not delivered");
                        }

                        let eliminator = event.eliminator;
                        let target = event.target;
                        let now = clock.now_millis();
                        let queued = executor.submit(async move {
                            if let Err(e) = cache.record_event(eliminator, target, now).await {
                                // Accepted degradation: the next event for this
                                // key re-evaluates as if no cooldown exists
                                error!(
                                    %eliminator,
                                    %target,
                                    error = %e,
                                    "Cooldown write failed"
                                );
                            }
                        });
                        if let Err(e) = queued {
                            error!(
                                eliminator = %event.eliminator,
                                target = %event.target,
                                error = %e,
                                "Could not queue cooldown write"
                            );
                        }
                    }
                    Some(Verdict::Denied {
                        reason,
                        remaining_seconds,
                    }) => {
                        debug!(
                            eliminator = %event.eliminator,
                            target = %event.target,
                            %reason,
                            "Reward denied"
                        );
                        let request = EffectRequest::Denied {
                            eliminator: event.eliminator,
                            reason,
                            remaining: remaining_seconds.map(format_duration),
                        };
                        if effects.send(request).is_err() {
                            warn!("Effect receiver dropped; denial feedback not delivered");
                        }
                    }
                }
            })
            .map(|_| ())
    }

    /// Drop in-memory cooldowns for one actor, e.g. on disconnect.
    /// Durable rows are untouched.
    pub async fn invalidate_actor(&self, actor: Uuid) {
        self.cache.invalidate(actor).await;
    }

    /// Clear the cooldown cache, e.g. after a config reload.
    pub async fn invalidate_all(&self) {
        self.cache.invalidate_all().await;
    }

    /// Stop accepting events, drain queued work, join the workers.
    pub async fn shutdown(&self) {
        self.executor.shutdown().await;
    }
}
