//! Event dispatch: the handler registry and per-target locking.

pub mod multilock;
pub mod registry;

pub use multilock::{MultiLock, MultiLockGuard};
pub use registry::{HANDLER_TIMEOUT, Outcome, Registry};
