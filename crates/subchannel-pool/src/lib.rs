//! Subchannel pool for RPC client channels
//!
//! Shares subchannels across channels that target the same address with the
//! same options and credentials. Entries are bucketed by
//! (channel target, subchannel target) and matched by a linear equality scan.
//!
//! Subchannel lifecycle in the global pool:
//! 1. A lookup misses → subchannel created, pool takes one reference
//! 2. Later lookups with equal options/credentials → same subchannel, no new reference
//! 3. Channels take and drop their own references independently
//! 4. Periodic sweep finds the pool holding the only reference → entry evicted
//! 5. Sweep finds nothing left alive → cleanup task stops until the next lookup
//!
//! Non-global pools never take references and never run the cleanup task;
//! their owners release subchannels directly.

mod cleanup;
pub mod config;
pub mod global;
mod metrics;
pub mod pool;

pub use config::PoolConfig;
pub use global::{get_pool, init_global_pool};
pub use pool::{DEFAULT_SWEEP_INTERVAL, MIN_SWEEP_INTERVAL, Pool, PoolStats};
