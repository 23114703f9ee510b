//! In-memory cooldown cache layered over the SQL store.
//!
//! Reads fall through to the store on a miss and are fail-open: a store
//! error is logged and treated as "no cooldown recorded", so an
//! infrastructure hiccup can never lock an eliminator out. Writes go to
//! the store first and only populate memory after the transaction commits,
//! so the cache never claims a cooldown that a restarted process reading
//! the store would not see.

use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::database::{CooldownRepository, StoreError};

pub struct CooldownCache {
    repo: CooldownRepository,
    pair: RwLock<HashMap<(Uuid, Uuid), i64>>,
    global: RwLock<HashMap<Uuid, i64>>,
}

impl CooldownCache {
    pub fn new(repo: CooldownRepository) -> Self {
        Self {
            repo,
            pair: RwLock::new(HashMap::new()),
            global: RwLock::new(HashMap::new()),
        }
    }

    /// Last rewarded event time for this ordered pair, if any.
    pub async fn get_pair(&self, eliminator: Uuid, target: Uuid) -> Option<i64> {
        {
            let cache = self.pair.read().await;
            if let Some(&last) = cache.get(&(eliminator, target)) {
                debug!(%eliminator, %target, last, "Pair cooldown cache hit");
                return Some(last);
            }
        }

        match self.repo.read_pair(eliminator, target).await {
            Ok(Some(last)) => {
                self.pair.write().await.insert((eliminator, target), last);
                debug!(%eliminator, %target, last, "Pair cooldown loaded from store");
                Some(last)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(
                    %eliminator,
                    %target,
                    error = %e,
                    "Pair cooldown read failed; treating as no cooldown"
                );
                None
            }
        }
    }

    /// Last rewarded event time for this eliminator, regardless of target.
    pub async fn get_global(&self, eliminator: Uuid) -> Option<i64> {
        {
            let cache = self.global.read().await;
            if let Some(&last) = cache.get(&eliminator) {
                debug!(%eliminator, last, "Global cooldown cache hit");
                return Some(last);
            }
        }

        match self.repo.read_global(eliminator).await {
            Ok(Some(last)) => {
                self.global.write().await.insert(eliminator, last);
                debug!(%eliminator, last, "Global cooldown loaded from store");
                Some(last)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(
                    %eliminator,
                    error = %e,
                    "Global cooldown read failed; treating as no cooldown"
                );
                None
            }
        }
    }

    /// Record a rewarded event: store first, memory only after commit.
    ///
    /// On failure memory is left untouched and the error propagates to the
    /// caller; there is no speculative cache write to undo.
    pub async fn record_event(
        &self,
        eliminator: Uuid,
        target: Uuid,
        time_millis: i64,
    ) -> Result<(), StoreError> {
        self.repo.update_both(eliminator, target, time_millis).await?;

        self.pair
            .write()
            .await
            .insert((eliminator, target), time_millis);
        self.global.write().await.insert(eliminator, time_millis);

        Ok(())
    }

    /// Drop every memory entry involving this actor, as eliminator or
    /// target. The store is untouched.
    pub async fn invalidate(&self, actor: Uuid) {
        self.pair
            .write()
            .await
            .retain(|&(eliminator, target), _| eliminator != actor && target != actor);
        self.global.write().await.remove(&actor);
    }

    /// Clear both memory maps. The store is untouched.
    pub async fn invalidate_all(&self) {
        self.pair.write().await.clear();
        self.global.write().await.clear();
    }
}
