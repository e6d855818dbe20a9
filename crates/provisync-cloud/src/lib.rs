//! Provisync reconciliation core
//!
//! State reconciliation and operation coordination for provisioning
//! sub-resources (disks, network adapters, backup clients, ...) against a
//! remote compute API that is asynchronous, eventually consistent and
//! intolerant of concurrently initiated mutations.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │        Orchestration (per resource kind)         │
//! └───────┬─────────────────┬───────────────┬───────┘
//!         │                 │               │
//! ┌───────▼───────┐ ┌───────▼───────┐ ┌─────▼─────────┐
//! │   reconcile   │ │     retry     │ │     lock      │
//! │ split / ids   │ │ RetryExecutor │ │ single-flight │
//! └───────────────┘ └───────────────┘ └───────────────┘
//! ```
//!
//! Every mutation produced by [`reconcile::split_by_action`] is issued inside
//! [`RetryExecutor::action`] while holding an [`AsyncOperationLock`]; the lock
//! is released as soon as the mutating call returns, before completion is
//! polled.

pub mod delta;
pub mod error;
pub mod lock;
pub mod reconcile;
pub mod remote;
pub mod retry;

// Re-exports
pub use delta::{AppliedChange, ApplyReport, Delta, DeltaKind, DeltaSummary};
pub use error::{CloudError, OperationTimeout, Result, RetryError};
pub use lock::{AsyncOperationGuard, AsyncOperationLock};
pub use reconcile::{
    Reconcilable, apply_current_configuration, capture_ids, split_by_action,
    split_by_action_with, split_by_initial_type, validate_unique_keys,
};
pub use remote::{ClassifyError, ErrorClass, collect_pages};
pub use retry::{Attempt, RetryContext, RetryExecutor};
