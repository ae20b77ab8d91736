//! `weaver-controller` — fabric controller client and task executor.
//!
//! This crate owns everything that talks to the external fabric management
//! API. The rest of the workspace only sees the [`FabricController`] trait:
//!
//! ```text
//! ProvisioningTask
//!     │
//!     ▼
//! execute_task      ← retry loop: timeout, backoff, transient/permanent
//!     │                classification; one TaskAttempt per try
//!     ▼
//! FabricController  ← authenticate() + apply(TaskSpec)
//!     │
//!     ▼
//! ApicClient        ← APIC-dialect REST over reqwest/rustls
//! ```
//!
//! [`mock`] provides scripted controllers for engine and executor tests.

pub mod client;
pub mod error;
pub mod executor;
pub mod mock;

pub use client::{ApicClient, Applied, FabricController};
pub use error::ControllerError;
pub use executor::{execute_task, AttemptOutcome, RetryPolicy, TaskAttempt, TaskOutcome};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, ControllerError>;
