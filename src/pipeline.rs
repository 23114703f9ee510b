//! Eligibility decision pipeline.
//!
//! Evaluates one elimination event against the ordered rule chain and
//! yields a verdict, short-circuiting on the first disqualifying check.
//! Evaluation never mutates cooldown state; recording a grant is the
//! coordinator's job, which keeps this state machine independently
//! testable.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::cache::CooldownCache;
use crate::config::RewardRules;
use crate::util::time::Clock;

/// One elimination as reported by the hosting runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EliminationEvent {
    pub eliminator: Uuid,
    pub target: Uuid,
    /// Whether the eliminator can still be notified
    pub eliminator_reachable: bool,
    /// Override capability: grants immediately, skipping every remaining check
    pub eliminator_has_bypass: bool,
    /// Network-address token; used only for the same-address check
    pub eliminator_address: Option<String>,
    pub target_address: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DenyReason {
    #[serde(rename = "self")]
    SelfElimination,
    SameAddress,
    PairCooldown,
    GlobalCooldown,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::SelfElimination => "self",
            Self::SameAddress => "same-address",
            Self::PairCooldown => "pair-cooldown",
            Self::GlobalCooldown => "global-cooldown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "lowercase")]
pub enum Verdict {
    Granted,
    Denied {
        reason: DenyReason,
        /// Remaining cooldown, present only for time-based denials
        remaining_seconds: Option<i64>,
    },
}

impl Verdict {
    fn denied(reason: DenyReason) -> Self {
        Self::Denied {
            reason,
            remaining_seconds: None,
        }
    }

    fn denied_for(reason: DenyReason, remaining_millis: i64) -> Self {
        Self::Denied {
            reason,
            remaining_seconds: Some(remaining_millis / 1000),
        }
    }
}

pub struct DecisionPipeline {
    rules: RewardRules,
    cache: Arc<CooldownCache>,
    clock: Arc<dyn Clock>,
}

impl DecisionPipeline {
    pub fn new(rules: RewardRules, cache: Arc<CooldownCache>, clock: Arc<dyn Clock>) -> Self {
        Self {
            rules,
            cache,
            clock,
        }
    }

    /// Run the ordered checks for one event.
    ///
    /// `None` is a silent abort: nobody to notify, or the feature is off.
    /// Cache reads inside the cooldown checks may block on the store and
    /// must therefore run on a worker, never the host loop.
    pub async fn evaluate(&self, event: &EliminationEvent) -> Option<Verdict> {
        if event.eliminator == event.target {
            debug!(eliminator = %event.eliminator, "Self-elimination, denying");
            return Some(Verdict::denied(DenyReason::SelfElimination));
        }

        if !event.eliminator_reachable {
            debug!(eliminator = %event.eliminator, "Eliminator unreachable, skipping evaluation");
            return None;
        }

        if !self.rules.enabled {
            debug!("Rewards disabled, skipping evaluation");
            return None;
        }

        if event.eliminator_has_bypass {
            debug!(eliminator = %event.eliminator, "Bypass capability, granting");
            return Some(Verdict::Granted);
        }

        if self.rules.address_check_enabled && shares_address(event) {
            debug!(
                eliminator = %event.eliminator,
                target = %event.target,
                "Shared network address, denying"
            );
            return Some(Verdict::denied(DenyReason::SameAddress));
        }

        let now = self.clock.now_millis();

        if self.rules.pair_cooldown_enabled && self.rules.pair_cooldown_seconds > 0 {
            if let Some(last) = self.cache.get_pair(event.eliminator, event.target).await {
                let remaining = self.rules.pair_cooldown_seconds * 1000 - (now - last);
                if remaining > 0 {
                    debug!(
                        eliminator = %event.eliminator,
                        target = %event.target,
                        remaining_millis = remaining,
                        "Pair cooldown active"
                    );
                    return Some(Verdict::denied_for(DenyReason::PairCooldown, remaining));
                }
            }
        }

        // Independent of the pair toggle: keyed by eliminator only
        if self.rules.global_cooldown_seconds > 0 {
            if let Some(last) = self.cache.get_global(event.eliminator).await {
                let remaining = self.rules.global_cooldown_seconds * 1000 - (now - last);
                if remaining > 0 {
                    debug!(
                        eliminator = %event.eliminator,
                        remaining_millis = remaining,
                        "Global cooldown active"
                    );
                    return Some(Verdict::denied_for(DenyReason::GlobalCooldown, remaining));
                }
            }
        }

        debug!(
            eliminator = %event.eliminator,
            target = %event.target,
            "All checks passed"
        );
        Some(Verdict::Granted)
    }
}

/// Both addresses known and equal. An unknown address never matches.
fn shares_address(event: &EliminationEvent) -> bool {
    match (&event.eliminator_address, &event.target_address) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{StorageConfig, StorageKind};
    use crate::database::{CooldownDatabase, CooldownRepository};
    use crate::util::time::ManualClock;

    async fn memory_cache() -> Arc<CooldownCache> {
        let storage = StorageConfig {
            kind: StorageKind::Embedded,
            sqlite_path: ":memory:".to_string(),
            max_connections: 1,
            ..StorageConfig::default()
        };
        let db = CooldownDatabase::connect(&storage).await.unwrap();
        let repo = CooldownRepository::new(db, "");
        repo.init_schema().await.unwrap();
        Arc::new(CooldownCache::new(repo))
    }

    fn rules() -> RewardRules {
        RewardRules {
            enabled: true,
            address_check_enabled: true,
            pair_cooldown_enabled: true,
            pair_cooldown_seconds: 300,
            global_cooldown_seconds: 0,
            commands: Vec::new(),
        }
    }

    fn event(eliminator: Uuid, target: Uuid) -> EliminationEvent {
        EliminationEvent {
            eliminator,
            target,
            eliminator_reachable: true,
            eliminator_has_bypass: false,
            eliminator_address: None,
            target_address: None,
        }
    }

    async fn pipeline(rules: RewardRules, clock: Arc<ManualClock>) -> DecisionPipeline {
        DecisionPipeline::new(rules, memory_cache().await, clock)
    }

    #[tokio::test]
    async fn test_self_elimination_denied() {
        let clock = Arc::new(ManualClock::new(0));
        let pipeline = pipeline(rules(), clock).await;
        let actor = Uuid::new_v4();

        let verdict = pipeline.evaluate(&event(actor, actor)).await;
        assert_eq!(
            verdict,
            Some(Verdict::Denied {
                reason: DenyReason::SelfElimination,
                remaining_seconds: None
            })
        );
    }

    #[tokio::test]
    async fn test_unreachable_eliminator_aborts_silently() {
        let clock = Arc::new(ManualClock::new(0));
        let pipeline = pipeline(rules(), clock).await;

        let mut ev = event(Uuid::new_v4(), Uuid::new_v4());
        ev.eliminator_reachable = false;
        assert_eq!(pipeline.evaluate(&ev).await, None);
    }

    #[tokio::test]
    async fn test_rewards_disabled_aborts_silently() {
        let clock = Arc::new(ManualClock::new(0));
        let mut r = rules();
        r.enabled = false;
        let pipeline = pipeline(r, clock).await;

        let ev = event(Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(pipeline.evaluate(&ev).await, None);
    }

    #[tokio::test]
    async fn test_bypass_short_circuits_cooldowns() {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let cache = memory_cache().await;
        let pipeline = DecisionPipeline::new(rules(), Arc::clone(&cache), clock.clone());

        let eliminator = Uuid::new_v4();
        let target = Uuid::new_v4();

        // Active pair cooldown that would otherwise deny
        cache
            .record_event(eliminator, target, clock.now_millis())
            .await
            .unwrap();

        let mut ev = event(eliminator, target);
        ev.eliminator_has_bypass = true;
        assert_eq!(pipeline.evaluate(&ev).await, Some(Verdict::Granted));
    }

    #[tokio::test]
    async fn test_shared_address_denied() {
        let clock = Arc::new(ManualClock::new(0));
        let pipeline = pipeline(rules(), clock).await;

        let mut ev = event(Uuid::new_v4(), Uuid::new_v4());
        ev.eliminator_address = Some("10.0.0.7".to_string());
        ev.target_address = Some("10.0.0.7".to_string());

        assert_eq!(
            pipeline.evaluate(&ev).await,
            Some(Verdict::Denied {
                reason: DenyReason::SameAddress,
                remaining_seconds: None
            })
        );
    }

    #[tokio::test]
    async fn test_missing_address_passes_address_check() {
        let clock = Arc::new(ManualClock::new(0));
        let pipeline = pipeline(rules(), clock).await;

        let mut ev = event(Uuid::new_v4(), Uuid::new_v4());
        ev.eliminator_address = Some("10.0.0.7".to_string());
        ev.target_address = None;

        assert_eq!(pipeline.evaluate(&ev).await, Some(Verdict::Granted));
    }

    #[tokio::test]
    async fn test_pair_cooldown_window() {
        let t0 = 1_000_000i64;
        let clock = Arc::new(ManualClock::new(t0));
        let cache = memory_cache().await;
        let pipeline = DecisionPipeline::new(rules(), Arc::clone(&cache), clock.clone());

        let eliminator = Uuid::new_v4();
        let target = Uuid::new_v4();
        cache.record_event(eliminator, target, t0).await.unwrap();

        // One second before expiry: denied with ~1s remaining
        clock.set(t0 + 299_000);
        assert_eq!(
            pipeline.evaluate(&event(eliminator, target)).await,
            Some(Verdict::Denied {
                reason: DenyReason::PairCooldown,
                remaining_seconds: Some(1)
            })
        );

        // One second after expiry: no longer a pair-cooldown denial
        clock.set(t0 + 301_000);
        assert_eq!(
            pipeline.evaluate(&event(eliminator, target)).await,
            Some(Verdict::Granted)
        );
    }

    #[tokio::test]
    async fn test_zero_duration_disables_pair_check() {
        let t0 = 1_000_000i64;
        let clock = Arc::new(ManualClock::new(t0));
        let cache = memory_cache().await;
        let mut r = rules();
        r.pair_cooldown_seconds = 0;
        let pipeline = DecisionPipeline::new(r, Arc::clone(&cache), clock.clone());

        let eliminator = Uuid::new_v4();
        let target = Uuid::new_v4();
        cache.record_event(eliminator, target, t0).await.unwrap();

        assert_eq!(
            pipeline.evaluate(&event(eliminator, target)).await,
            Some(Verdict::Granted)
        );
    }

    #[tokio::test]
    async fn test_global_cooldown_independent_of_pair_toggle() {
        let t0 = 1_000_000i64;
        let clock = Arc::new(ManualClock::new(t0));
        let cache = memory_cache().await;
        let mut r = rules();
        r.pair_cooldown_enabled = false;
        r.global_cooldown_seconds = 120;
        let pipeline = DecisionPipeline::new(r, Arc::clone(&cache), clock.clone());

        let eliminator = Uuid::new_v4();
        let first_target = Uuid::new_v4();
        let second_target = Uuid::new_v4();
        cache
            .record_event(eliminator, first_target, t0)
            .await
            .unwrap();

        // A different target still trips the per-eliminator cooldown
        clock.set(t0 + 10_000);
        assert_eq!(
            pipeline.evaluate(&event(eliminator, second_target)).await,
            Some(Verdict::Denied {
                reason: DenyReason::GlobalCooldown,
                remaining_seconds: Some(110)
            })
        );
    }

    #[tokio::test]
    async fn test_store_outage_fails_open() {
        let storage = StorageConfig {
            kind: StorageKind::Embedded,
            sqlite_path: ":memory:".to_string(),
            max_connections: 1,
            ..StorageConfig::default()
        };
        let db = CooldownDatabase::connect(&storage).await.unwrap();
        let repo = CooldownRepository::new(db.clone(), "");
        repo.init_schema().await.unwrap();
        let cache = Arc::new(CooldownCache::new(repo));

        let t0 = 1_000_000i64;
        let clock = Arc::new(ManualClock::new(t0));
        let mut r = rules();
        r.global_cooldown_seconds = 120;
        let pipeline = DecisionPipeline::new(r, Arc::clone(&cache), clock);

        let eliminator = Uuid::new_v4();
        let target = Uuid::new_v4();
        cache.record_event(eliminator, target, t0).await.unwrap();
        cache.invalidate_all().await;

        // With the store gone and memory cold, both checks see no cooldown
        db.close().await;

        assert_eq!(
            pipeline.evaluate(&event(eliminator, target)).await,
            Some(Verdict::Granted)
        );
    }
}
