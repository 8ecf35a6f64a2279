//! # capstan-control
//!
//! Task-control state machine and worker event dispatch for Capstan.
//!
//! Capstan sits between callers and a worker subsystem executing long-running
//! plans. This crate implements the control plane:
//!
//! - **State Machine**: Which control operations are legal in which task
//!   states, and what each one does
//! - **Dispatch Protocol**: Fire-and-forget requests and the synchronous
//!   acknowledged step-cancel, always bounded by a timeout
//! - **Safety Model**: Safe versus dangerous operation categories, with a
//!   configuration gate in front of the dangerous ones
//!
//! ## Core Concepts
//!
//! - **Task record**: The durable row describing a unit of work; owned by the
//!   Record Store, read and conditionally written here
//! - **Execution binding**: Whether a record is addressable on the worker
//!   subsystem, and by which external identifier
//! - **Outcome**: Every operation resolves to applied, rejected, or
//!   dispatch-failed, each carrying user-facing text
//!
//! ## Guarantees
//!
//! - State writes go through compare-and-set only; a lost race is retried
//!   once against fresh state and then reported, never silently dropped
//! - Dangerous operations never reach the store while the gate is closed
//! - No operation blocks unboundedly; the step-cancel acknowledgement wait
//!   is capped by configuration
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use capstan_control::bus::memory::InMemoryWorkerBus;
//! use capstan_control::error::Result;
//! use capstan_control::gate::DangerousActionGate;
//! use capstan_control::plane::ControlPlane;
//! use capstan_control::store::memory::InMemoryRecordStore;
//! use capstan_control::task::{TaskRecord, TaskState};
//! use capstan_core::TaskId;
//!
//! # async fn demo() -> Result<()> {
//! let store = Arc::new(InMemoryRecordStore::new());
//! let record = TaskRecord::new(TaskId::generate(), "Sync repository")
//!     .with_state(TaskState::Paused);
//! let task_id = record.id;
//! store.insert(record)?;
//!
//! let plane = ControlPlane::new(store, Arc::new(InMemoryWorkerBus::new()))
//!     .with_gate(DangerousActionGate::open());
//!
//! let outcome = plane.unlock(&task_id).await?;
//! assert!(outcome.is_applied());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod authz;
pub mod bus;
pub mod config;
pub mod error;
pub mod gate;
pub mod metrics;
pub mod operation;
pub mod outcome;
pub mod plane;
pub mod store;
pub mod summary;
pub mod task;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::authz::{Authorizer, PermitAllAuthorizer, StaticAuthorizer};
    pub use crate::bus::{EventDelivery, StepEventKind, WorkerEventBus};
    pub use crate::config::ControlPlaneConfig;
    pub use crate::error::{Error, Result};
    pub use crate::gate::DangerousActionGate;
    pub use crate::metrics::ControlMetrics;
    pub use crate::operation::{Category, ControlOperation, Permission};
    pub use crate::outcome::ControlOutcome;
    pub use crate::plane::ControlPlane;
    pub use crate::store::{CasOutcome, RecordStore};
    pub use crate::summary::{SummaryBucket, TaskSummary};
    pub use crate::task::{ExecutionBinding, TaskRecord, TaskResult, TaskState};
}

pub use error::{Error, Result};
pub use outcome::ControlOutcome;
pub use plane::ControlPlane;
