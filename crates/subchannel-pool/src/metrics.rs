//! Pool metrics
//!
//! - `subchannel_pool_lookups_total` (counter): label `result` = `hit` | `miss`
//! - `subchannel_pool_sweeps_total` (counter)
//! - `subchannel_pool_evictions_total` (counter)
//! - `subchannel_pool_entries` (gauge): entries left in the global pool after a sweep
//!
//! All calls are no-ops until a recorder is installed.

/// Record one `get_or_create_subchannel` outcome.
pub(crate) fn record_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    metrics::counter!("subchannel_pool_lookups_total", "result" => result).increment(1);
}

/// Record a completed sweep pass.
///
/// The entries gauge is only set for the global pool, since independent
/// pools would overwrite each other's values.
pub(crate) fn record_sweep(evicted: usize, remaining: usize, global: bool) {
    metrics::counter!("subchannel_pool_sweeps_total").increment(1);
    metrics::counter!("subchannel_pool_evictions_total").increment(evicted as u64);
    if global {
        metrics::gauge!("subchannel_pool_entries").set(remaining as f64);
    }
}
