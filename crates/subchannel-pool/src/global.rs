//! Pool factory and the process-wide global pool
//!
//! The global pool is created once, on first use, and lives until the process
//! exits. There is no teardown path.

use std::sync::OnceLock;

use crate::config::PoolConfig;
use crate::pool::{DEFAULT_SWEEP_INTERVAL, Pool};

static GLOBAL_POOL: OnceLock<Pool> = OnceLock::new();

/// Get a subchannel pool.
///
/// `true` returns a handle to the process-wide global pool; every call
/// shares the same index. `false` returns a new, independent pool that takes
/// no references and never runs a cleanup task.
pub fn get_pool(global: bool) -> Pool {
    if global {
        GLOBAL_POOL
            .get_or_init(|| Pool::new(true, DEFAULT_SWEEP_INTERVAL))
            .clone()
    } else {
        Pool::new(false, DEFAULT_SWEEP_INTERVAL)
    }
}

/// Create the global pool from configuration.
///
/// Must run before the first `get_pool(true)`; fails with
/// `AlreadyInitialized` otherwise.
pub fn init_global_pool(config: &PoolConfig) -> common::Result<Pool> {
    let mut created = false;
    let pool = GLOBAL_POOL.get_or_init(|| {
        created = true;
        Pool::new(true, config.sweep_interval())
    });
    if !created {
        return Err(common::Error::AlreadyInitialized("global subchannel pool"));
    }
    Ok(pool.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use subchannel::{ChannelOptions, InsecureCredentials, Subchannel};

    #[test]
    fn global_pool_is_a_singleton() {
        let a = get_pool(true);
        let b = get_pool(true);
        assert!(Pool::ptr_eq(&a, &b));
        assert!(a.is_global());
    }

    #[test]
    fn local_pools_are_independent() {
        let a = get_pool(false);
        let b = get_pool(false);
        assert!(!Pool::ptr_eq(&a, &b));
        assert!(!a.is_global());
        assert!(!Pool::ptr_eq(&a, &get_pool(true)));

        let opts = ChannelOptions::new();
        let creds = Arc::new(InsecureCredentials);
        let sa = a.get_or_create_subchannel("host:1", "sub:1", &opts, creds.clone());
        let sb = b.get_or_create_subchannel("host:1", "sub:1", &opts, creds);
        assert!(!Subchannel::ptr_eq(&sa, &sb), "indices must be disjoint");
        assert_eq!(a.stats().entries, 1);
        assert_eq!(b.stats().entries, 1);
    }

    #[tokio::test]
    async fn local_pool_does_not_arm_cleanup() {
        let pool = get_pool(false);
        pool.get_or_create_subchannel(
            "host:1",
            "sub:1",
            &ChannelOptions::new(),
            Arc::new(InsecureCredentials),
        );
        assert!(!pool.is_cleanup_armed());
    }

    // The only test in this binary that looks up through the singleton, so its
    // armed state and entries are not shared with anything else.
    #[tokio::test(start_paused = true)]
    async fn global_pool_arms_sweeps_and_disarms() {
        let pool = get_pool(true);
        let opts = ChannelOptions::new();
        let creds = Arc::new(InsecureCredentials);
        let tick = DEFAULT_SWEEP_INTERVAL + std::time::Duration::from_millis(100);
        assert!(!pool.is_cleanup_armed());

        let sc = pool.get_or_create_subchannel(
            "global-lifecycle:1",
            "10.1.0.1:443",
            &opts,
            creds.clone(),
        );
        assert_eq!(sc.ref_count(), 1);
        assert!(get_pool(true).is_cleanup_armed());

        sc.add_ref();
        tokio::time::sleep(tick).await;
        assert_eq!(sc.ref_count(), 2, "referenced entry survives the tick");
        assert!(pool.is_cleanup_armed());

        sc.unref();
        tokio::time::sleep(tick).await;
        assert_eq!(sc.ref_count(), 0);
        assert_eq!(pool.stats().entries, 0);
        assert!(!pool.is_cleanup_armed());

        let again = get_pool(true).get_or_create_subchannel(
            "global-lifecycle:1",
            "10.1.0.1:443",
            &opts,
            creds,
        );
        assert!(!Subchannel::ptr_eq(&sc, &again));
        assert!(pool.is_cleanup_armed());
    }

    #[test]
    fn init_after_first_use_fails() {
        get_pool(true);
        let err = init_global_pool(&PoolConfig::default()).unwrap_err();
        assert!(
            matches!(err, common::Error::AlreadyInitialized(_)),
            "got: {err:?}"
        );
    }
}
