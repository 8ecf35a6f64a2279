//! # capstan-core
//!
//! Core abstractions for the Capstan task control plane.
//!
//! This crate provides the foundational types used across all Capstan components:
//!
//! - **Identifiers**: Strongly-typed IDs for tasks, execution plans, and steps
//! - **Error Types**: Shared error definitions and result types
//! - **Observability**: Logging initialization and span helpers
//!
//! ## Crate Boundary
//!
//! `capstan-core` carries no async runtime and no collaborator interfaces;
//! those live in `capstan-control`. Anything defined here is a primitive
//! shared by every component.
//!
//! ## Example
//!
//! ```rust
//! use capstan_core::prelude::*;
//!
//! // Generate a unique task ID
//! let task_id = TaskId::generate();
//!
//! // Wrap an identifier issued by the worker subsystem
//! let plan = ExecutionPlanId::new("3f3a78f0-4b63-4b90-8a8e-9a3f5c2d1e77");
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod id;
pub mod observability;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use capstan_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::id::{ExecutionPlanId, StepId, TaskId};
    pub use crate::observability::{LogFormat, init_logging};
}

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use id::{ExecutionPlanId, StepId, TaskId};
pub use observability::{LogFormat, init_logging};
