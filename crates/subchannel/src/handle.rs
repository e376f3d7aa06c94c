//! Reference-counted subchannel handle
//!
//! A `Subchannel` represents one transport-level connection to one address.
//! Cloning the handle does not touch the reference count: the count tracks
//! logical owners (channels and the global pool), which call `add_ref` and
//! `unref` explicitly.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tracing::{debug, trace, warn};

use crate::credentials::ChannelCredentials;
use crate::options::ChannelOptions;

static NEXT_SUBCHANNEL_ID: AtomicU64 = AtomicU64::new(1);

/// Shared handle to one transport-level connection.
#[derive(Clone)]
pub struct Subchannel {
    inner: Arc<Inner>,
}

struct Inner {
    id: u64,
    channel_target: String,
    subchannel_target: String,
    options: ChannelOptions,
    credentials: Arc<dyn ChannelCredentials>,
    refs: AtomicUsize,
}

impl Subchannel {
    /// Create a subchannel for a target pair. Starts with no references.
    pub fn new(
        channel_target: &str,
        subchannel_target: &str,
        options: ChannelOptions,
        credentials: Arc<dyn ChannelCredentials>,
    ) -> Self {
        let id = NEXT_SUBCHANNEL_ID.fetch_add(1, Ordering::Relaxed);
        debug!(
            subchannel_id = id,
            channel_target,
            subchannel_target,
            secure = credentials.is_secure(),
            "subchannel created"
        );
        Self {
            inner: Arc::new(Inner {
                id,
                channel_target: channel_target.to_string(),
                subchannel_target: subchannel_target.to_string(),
                options,
                credentials,
                refs: AtomicUsize::new(0),
            }),
        }
    }

    /// Process-unique identifier, for logging.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn channel_target(&self) -> &str {
        &self.inner.channel_target
    }

    pub fn subchannel_target(&self) -> &str {
        &self.inner.subchannel_target
    }

    pub fn options(&self) -> &ChannelOptions {
        &self.inner.options
    }

    pub fn credentials(&self) -> &Arc<dyn ChannelCredentials> {
        &self.inner.credentials
    }

    /// Take one reference.
    pub fn add_ref(&self) {
        let refs = self.inner.refs.fetch_add(1, Ordering::AcqRel) + 1;
        trace!(subchannel_id = self.inner.id, refs, "subchannel ref");
    }

    /// Drop one reference. Never underflows.
    pub fn unref(&self) {
        match self
            .inner
            .refs
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        {
            Ok(1) => debug!(
                subchannel_id = self.inner.id,
                "subchannel has no remaining references"
            ),
            Ok(prev) => trace!(subchannel_id = self.inner.id, refs = prev - 1, "subchannel unref"),
            Err(_) => warn!(
                subchannel_id = self.inner.id,
                "unref on subchannel with no references, ignoring"
            ),
        }
    }

    /// Drop the caller's reference only if it is the sole outstanding one.
    ///
    /// Single compare-and-swap from 1 to 0, so a concurrent `add_ref` either
    /// lands before (the swap fails, nothing is released) or after (the
    /// subchannel was already released).
    pub fn release_if_sole_reference(&self) -> bool {
        let released = self
            .inner
            .refs
            .compare_exchange(1, 0, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if released {
            debug!(subchannel_id = self.inner.id, "released sole reference");
        }
        released
    }

    /// Current reference count.
    pub fn ref_count(&self) -> usize {
        self.inner.refs.load(Ordering::Acquire)
    }

    /// Whether two handles point at the same subchannel.
    pub fn ptr_eq(a: &Subchannel, b: &Subchannel) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

impl fmt::Debug for Subchannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subchannel")
            .field("id", &self.inner.id)
            .field("channel_target", &self.inner.channel_target)
            .field("subchannel_target", &self.inner.subchannel_target)
            .field("refs", &self.ref_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::InsecureCredentials;

    fn subchannel() -> Subchannel {
        Subchannel::new(
            "dns:///svc.local:443",
            "10.0.0.1:443",
            ChannelOptions::new(),
            Arc::new(InsecureCredentials),
        )
    }

    #[test]
    fn starts_without_references() {
        assert_eq!(subchannel().ref_count(), 0);
    }

    #[test]
    fn add_ref_and_unref_track_count() {
        let sc = subchannel();
        sc.add_ref();
        sc.add_ref();
        assert_eq!(sc.ref_count(), 2);
        sc.unref();
        assert_eq!(sc.ref_count(), 1);
    }

    #[test]
    fn unref_at_zero_does_not_underflow() {
        let sc = subchannel();
        sc.unref();
        assert_eq!(sc.ref_count(), 0);
    }

    #[test]
    fn release_succeeds_only_for_sole_reference() {
        let sc = subchannel();
        assert!(!sc.release_if_sole_reference(), "no references to release");

        sc.add_ref();
        sc.add_ref();
        assert!(!sc.release_if_sole_reference());
        assert_eq!(sc.ref_count(), 2, "failed release must not drop a reference");

        sc.unref();
        assert!(sc.release_if_sole_reference());
        assert_eq!(sc.ref_count(), 0);
    }

    #[test]
    fn clones_share_identity_and_count() {
        let sc = subchannel();
        let other = sc.clone();
        other.add_ref();
        assert!(Subchannel::ptr_eq(&sc, &other));
        assert_eq!(sc.ref_count(), 1);
        assert_eq!(sc.id(), other.id());
    }

    #[test]
    fn separate_subchannels_are_distinct() {
        let a = subchannel();
        let b = subchannel();
        assert!(!Subchannel::ptr_eq(&a, &b));
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn concurrent_refs_are_not_lost() {
        let sc = subchannel();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let sc = sc.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        sc.add_ref();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(sc.ref_count(), 8000);
    }
}
