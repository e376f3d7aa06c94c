//! Pool index, subchannel lookup and the reference sweep
//!
//! The index maps channel target → subchannel target → entry list. Each entry
//! is one distinct (options, credentials) combination registered for that
//! target pair. Buckets are expected to hold very few entries, so matching is
//! a front-to-back equality scan rather than a hashed lookup.
//!
//! A single mutex guards the whole index and the cleanup task handle for the
//! full duration of every lookup and every sweep pass. Neither operation
//! awaits or performs I/O while holding it.
//!
//! Emptied buckets are never removed from the index.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use subchannel::{ChannelCredentials, ChannelOptions, Subchannel};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::metrics;

/// Interval between sweeps of the global pool.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10);

/// Shortest sweep interval a pool accepts; smaller values are raised to it.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// One registered (options, credentials) combination for a target pair.
struct Entry {
    options: ChannelOptions,
    credentials: Arc<dyn ChannelCredentials>,
    subchannel: Subchannel,
}

impl Entry {
    fn matches(&self, options: &ChannelOptions, credentials: &dyn ChannelCredentials) -> bool {
        self.options == *options && self.credentials.equals(credentials)
    }
}

/// subchannel target → entries
type Buckets = HashMap<String, Vec<Entry>>;

pub(crate) struct PoolState {
    /// channel target → buckets
    index: HashMap<String, Buckets>,
    pub(crate) cleanup_task: Option<JoinHandle<()>>,
}

impl PoolState {
    /// A stored handle whose task already finished (its runtime shut down)
    /// does not count as running.
    pub(crate) fn cleanup_running(&self) -> bool {
        self.cleanup_task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

pub(crate) struct PoolInner {
    pub(crate) global: bool,
    pub(crate) sweep_interval: Duration,
    pub(crate) state: Mutex<PoolState>,
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = state.cleanup_task.take() {
            task.abort();
        }
    }
}

/// Snapshot of the pool index for logging and health reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub global: bool,
    pub cleanup_armed: bool,
    pub channel_targets: usize,
    pub buckets: usize,
    pub empty_buckets: usize,
    pub entries: usize,
}

/// Subchannel pool handle.
///
/// Cloning is cheap and every clone shares the same index. A global pool
/// holds one reference on each registered subchannel and runs a periodic
/// cleanup task; a non-global pool does neither.
#[derive(Clone)]
pub struct Pool {
    pub(crate) inner: Arc<PoolInner>,
}

impl Pool {
    /// Create an empty pool with its cleanup task disarmed.
    ///
    /// `sweep_interval` only matters when `global` is set and is raised to
    /// `MIN_SWEEP_INTERVAL` if shorter (a zero interval is never valid).
    /// Most callers want `get_pool` instead.
    pub fn new(global: bool, sweep_interval: Duration) -> Self {
        let sweep_interval = sweep_interval.max(MIN_SWEEP_INTERVAL);
        info!(
            global,
            sweep_interval_secs = sweep_interval.as_secs_f64(),
            "subchannel pool initialized"
        );
        Self {
            inner: Arc::new(PoolInner {
                global,
                sweep_interval,
                state: Mutex::new(PoolState {
                    index: HashMap::new(),
                    cleanup_task: None,
                }),
            }),
        }
    }

    /// Return the pooled subchannel for this target pair, options and
    /// credentials, creating and registering one if none matches.
    ///
    /// A match needs options structurally equal to `options` and credentials
    /// for which the stored credentials' `equals` holds. Hits take no
    /// reference. On a miss the global pool takes one reference on the new
    /// subchannel before returning it.
    ///
    /// Also arms the cleanup task of a global pool if it is not running.
    pub fn get_or_create_subchannel(
        &self,
        channel_target: &str,
        subchannel_target: &str,
        options: &ChannelOptions,
        credentials: Arc<dyn ChannelCredentials>,
    ) -> Subchannel {
        let mut state = self.lock();
        self.ensure_cleanup_task(&mut state);

        let bucket = state
            .index
            .entry(channel_target.to_string())
            .or_default()
            .entry(subchannel_target.to_string())
            .or_default();

        if let Some(entry) = bucket
            .iter()
            .find(|e| e.matches(options, credentials.as_ref()))
        {
            debug!(
                channel_target,
                subchannel_target,
                subchannel_id = entry.subchannel.id(),
                "reusing pooled subchannel"
            );
            metrics::record_lookup(true);
            return entry.subchannel.clone();
        }

        let subchannel = Subchannel::new(
            channel_target,
            subchannel_target,
            options.clone(),
            credentials.clone(),
        );
        bucket.push(Entry {
            options: options.clone(),
            credentials,
            subchannel: subchannel.clone(),
        });
        if self.inner.global {
            subchannel.add_ref();
        }
        debug!(
            channel_target,
            subchannel_target,
            subchannel_id = subchannel.id(),
            bucket_len = bucket.len(),
            "registered new subchannel"
        );
        metrics::record_lookup(false);
        subchannel
    }

    /// Evict every entry whose subchannel is referenced only by the pool.
    ///
    /// Each subchannel is asked to release the pool's reference atomically,
    /// succeeding only if it is the sole one; released entries leave the
    /// index. If nothing survives the pass, the cleanup task is stopped.
    pub fn unref_unused_subchannels(&self) {
        self.sweep();
    }

    /// One sweep pass. Returns whether any entry is still alive.
    pub(crate) fn sweep(&self) -> bool {
        let mut state = self.lock();
        let mut has_live_entries = false;
        let mut evicted = 0usize;
        let mut remaining = 0usize;

        for (channel_target, buckets) in state.index.iter_mut() {
            for (subchannel_target, entries) in buckets.iter_mut() {
                entries.retain(|entry| {
                    if entry.subchannel.release_if_sole_reference() {
                        debug!(
                            channel_target = %channel_target,
                            subchannel_target = %subchannel_target,
                            subchannel_id = entry.subchannel.id(),
                            "evicted unused subchannel"
                        );
                        evicted += 1;
                        false
                    } else {
                        has_live_entries = true;
                        true
                    }
                });
                remaining += entries.len();
            }
        }

        metrics::record_sweep(evicted, remaining, self.inner.global);
        debug!(evicted, remaining, "subchannel pool sweep complete");

        if !has_live_entries {
            if let Some(task) = state.cleanup_task.take() {
                task.abort();
                info!("subchannel pool idle, cleanup task stopped");
            }
        }
        has_live_entries
    }

    /// Whether this pool holds references and runs the cleanup task.
    pub fn is_global(&self) -> bool {
        self.inner.global
    }

    pub fn sweep_interval(&self) -> Duration {
        self.inner.sweep_interval
    }

    /// Whether a cleanup task is currently active.
    pub fn is_cleanup_armed(&self) -> bool {
        self.lock().cleanup_running()
    }

    /// Whether two handles refer to the same pool.
    pub fn ptr_eq(a: &Pool, b: &Pool) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    pub fn stats(&self) -> PoolStats {
        self.stats_locked(&self.lock())
    }

    fn stats_locked(&self, state: &PoolState) -> PoolStats {
        let mut stats = PoolStats {
            global: self.inner.global,
            cleanup_armed: state.cleanup_running(),
            channel_targets: state.index.len(),
            buckets: 0,
            empty_buckets: 0,
            entries: 0,
        };
        for buckets in state.index.values() {
            stats.buckets += buckets.len();
            for entries in buckets.values() {
                if entries.is_empty() {
                    stats.empty_buckets += 1;
                }
                stats.entries += entries.len();
            }
        }
        stats
    }

    /// Pool health summary.
    ///
    /// Status is "active" while any subchannel is registered, "idle" otherwise.
    pub fn health(&self) -> serde_json::Value {
        let state = self.lock();
        let stats = self.stats_locked(&state);

        let mut subchannels = Vec::new();
        for buckets in state.index.values() {
            for entries in buckets.values() {
                for entry in entries {
                    let sc = &entry.subchannel;
                    subchannels.push(serde_json::json!({
                        "id": sc.id(),
                        "channel_target": sc.channel_target(),
                        "subchannel_target": sc.subchannel_target(),
                        "refs": sc.ref_count(),
                        "secure": entry.credentials.is_secure(),
                    }));
                }
            }
        }

        serde_json::json!({
            "status": if stats.entries > 0 { "active" } else { "idle" },
            "pool": stats,
            "subchannels": subchannels
        })
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("global", &self.inner.global)
            .field("sweep_interval", &self.inner.sweep_interval)
            .finish_non_exhaustive()
    }
}
