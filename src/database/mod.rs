//! SQL persistence for the cooldown relations.
//!
//! Two relations, two supported engines (embedded SQLite, networked
//! PostgreSQL), one transactional write entry point.

pub mod cooldowns;
pub mod pool;

pub use cooldowns::{CooldownRepository, StoreError};
pub use pool::CooldownDatabase;
