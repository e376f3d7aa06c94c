//! Channel credentials and their equality predicate
//!
//! Credentials are trait objects so the pool can hold any implementation
//! behind `Arc<dyn ChannelCredentials>`. Equality is decided by the
//! credentials themselves, not by the pool.

use std::any::Any;
use std::fmt;

use common::Secret;

/// Credentials a channel connects with.
pub trait ChannelCredentials: fmt::Debug + Send + Sync {
    /// Whether `other` can be used interchangeably with these credentials.
    fn equals(&self, other: &dyn ChannelCredentials) -> bool;

    /// Whether connections made with these credentials are encrypted.
    fn is_secure(&self) -> bool;

    /// Downcast hook for `equals` implementations.
    fn as_any(&self) -> &dyn Any;
}

/// Plaintext credentials. All instances are equal to each other.
#[derive(Debug, Clone, Copy, Default)]
pub struct InsecureCredentials;

impl ChannelCredentials for InsecureCredentials {
    fn equals(&self, other: &dyn ChannelCredentials) -> bool {
        other.as_any().is::<InsecureCredentials>()
    }

    fn is_secure(&self) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Bearer-token credentials. Equal when the other side carries the same token.
#[derive(Debug, Clone)]
pub struct TokenCredentials {
    token: Secret<String>,
}

impl TokenCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Secret::new(token.into()),
        }
    }

    /// Token value (use sparingly)
    pub fn token(&self) -> &str {
        self.token.expose()
    }
}

impl ChannelCredentials for TokenCredentials {
    fn equals(&self, other: &dyn ChannelCredentials) -> bool {
        other
            .as_any()
            .downcast_ref::<TokenCredentials>()
            .is_some_and(|o| self.token.matches(&o.token))
    }

    fn is_secure(&self) -> bool {
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
