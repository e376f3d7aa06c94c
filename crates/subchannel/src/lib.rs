//! Collaborator contracts consumed by the subchannel pool
//!
//! The pool never looks inside these types. It relies on three contracts:
//! - `ChannelOptions` compares structurally through `PartialEq`
//! - `ChannelCredentials::equals` decides whether two credential objects are
//!   interchangeable
//! - `Subchannel` carries an atomic reference count with a conditional
//!   `release_if_sole_reference` check-and-act
//!
//! Connection establishment and retry behaviour live outside this crate; a
//! `Subchannel` here is only the shared, reference-counted handle.

pub mod credentials;
pub mod handle;
pub mod options;

pub use credentials::{ChannelCredentials, InsecureCredentials, TokenCredentials};
pub use handle::Subchannel;
pub use options::{ChannelOptions, OptionValue};
