//! Periodic cleanup task for the global pool
//!
//! The task is armed by the first lookup observed while no task is running and
//! runs one sweep per interval. It stops itself when a sweep finds nothing
//! left alive; the next lookup arms a fresh one.
//!
//! The task runs on the caller's tokio runtime when there is one, otherwise on
//! a single-worker background runtime owned by this module. A task whose
//! runtime has shut down counts as disarmed and is replaced on the next lookup.
//!
//! The task is detached: its `JoinHandle` is kept only so the sweep can abort
//! it, never awaited. It holds a `Weak` reference to the pool so an unused
//! pool is not kept alive by its own timer.

use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::pool::{Pool, PoolInner, PoolState};

/// Runtime for cleanup tasks armed outside any tokio runtime.
///
/// Lives in a static and is never dropped; its worker thread is not joined,
/// so it never holds up process exit. `None` if it could not be built.
fn background_runtime() -> Option<&'static Runtime> {
    static BACKGROUND: OnceLock<Option<Runtime>> = OnceLock::new();
    BACKGROUND
        .get_or_init(|| {
            match Builder::new_multi_thread()
                .worker_threads(1)
                .thread_name("subchannel-pool-cleanup")
                .enable_time()
                .build()
            {
                Ok(runtime) => Some(runtime),
                Err(e) => {
                    warn!(error = %e, "failed to start subchannel pool cleanup runtime");
                    None
                }
            }
        })
        .as_ref()
}

impl Pool {
    /// Arm the cleanup task if this is a global pool and none is running.
    pub(crate) fn ensure_cleanup_task(&self, state: &mut PoolState) {
        if !self.inner.global || state.cleanup_running() {
            return;
        }
        if state.cleanup_task.take().is_some() {
            debug!("previous cleanup task ended with its runtime, re-arming");
        }

        let runtime = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => match background_runtime() {
                Some(runtime) => runtime.handle().clone(),
                None => return,
            },
        };
        let interval = self.inner.sweep_interval;
        state.cleanup_task = Some(runtime.spawn(run_cleanup(
            Arc::downgrade(&self.inner),
            interval,
        )));
        info!(
            interval_secs = interval.as_secs_f64(),
            "subchannel pool cleanup task armed"
        );
    }
}

/// Sweep `pool` every `interval` until a sweep leaves nothing alive or the
/// pool is dropped.
async fn run_cleanup(pool: Weak<PoolInner>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // Skip the immediate first tick, the entry that armed us was just created
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let Some(inner) = pool.upgrade() else {
            debug!("subchannel pool dropped, cleanup task exiting");
            return;
        };
        if !(Pool { inner }).sweep() {
            return;
        }
    }
}
