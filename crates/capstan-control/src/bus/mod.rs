//! The Worker Event Bus boundary.
//!
//! The worker subsystem ("the world") executes plans; the control plane
//! reaches it only through the [`WorkerEventBus`] trait. Two dispatch modes
//! exist:
//!
//! - **Fire-and-forget** (`request_cancel`, `request_abort`, `execute_plan`):
//!   the call returns as soon as the request is accepted for dispatch. The
//!   eventual effect shows up later in the Record Store, written by the
//!   worker subsystem out-of-band.
//! - **Synchronous acknowledged** (`send_step_event`): the call resolves only
//!   once the worker confirms it received and queued the event. Confirmation
//!   means the event was registered, not that the step halted. Callers bound
//!   the wait; see [`crate::config::ControlPlaneConfig`].
//!
//! Every method addresses the worker subsystem by the execution's external
//! identifier, never by the Record Store's primary key.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use capstan_core::{ExecutionPlanId, StepId};

use crate::error::{Error, Result};

/// Step-level events the worker engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepEventKind {
    /// Ask the step to stop cooperatively at its next checkpoint.
    Cancel,
    /// Ask the step to stop abruptly, abandoning in-flight work.
    Abort,
}

impl StepEventKind {
    /// Returns a lowercase label suitable for metrics and logs.
    #[must_use]
    pub const fn as_label(&self) -> &'static str {
        match self {
            Self::Cancel => "cancel",
            Self::Abort => "abort",
        }
    }
}

impl std::fmt::Display for StepEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_label())
    }
}

/// The worker's answer to a step event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventDelivery {
    /// The worker received and queued the event.
    Acknowledged {
        /// When the worker confirmed receipt.
        acknowledged_at: DateTime<Utc>,
    },
    /// The worker does not recognize the execution or the step.
    UnknownTarget {
        /// What the worker reported about the miss.
        detail: String,
    },
}

impl EventDelivery {
    /// Creates an acknowledgement stamped with the current time.
    #[must_use]
    pub fn acknowledged() -> Self {
        Self::Acknowledged {
            acknowledged_at: Utc::now(),
        }
    }

    /// Creates an unknown-target report.
    #[must_use]
    pub fn unknown_target(detail: impl Into<String>) -> Self {
        Self::UnknownTarget {
            detail: detail.into(),
        }
    }

    /// Returns true if the worker confirmed receipt.
    #[must_use]
    pub const fn is_acknowledged(&self) -> bool {
        matches!(self, Self::Acknowledged { .. })
    }
}

/// Access to the worker subsystem executing the plans.
///
/// Implementations carry requests over whatever transport the deployment
/// uses. A transport failure is an [`Error::Dispatch`]; the control plane
/// reports it to callers as a dispatch-failed outcome, never as a fatal
/// error, and leaves task state untouched.
#[async_trait]
pub trait WorkerEventBus: Send + Sync {
    /// Delivers a step-level event and waits for the worker's answer.
    ///
    /// Resolution of the returned future is the acknowledgement; callers
    /// impose their own wait bound.
    async fn send_step_event(
        &self,
        external_id: &ExecutionPlanId,
        step_id: StepId,
        kind: StepEventKind,
    ) -> Result<EventDelivery>;

    /// Asks the engine to cancel the whole execution.
    ///
    /// Returns whether the engine accepted the request; the engine declines
    /// when the execution is not currently cancellable.
    async fn request_cancel(&self, external_id: &ExecutionPlanId) -> Result<bool>;

    /// Asks the engine to stop the execution abruptly.
    ///
    /// Best-effort; may race with in-flight steps. Returns whether the
    /// engine accepted the request.
    async fn request_abort(&self, external_id: &ExecutionPlanId) -> Result<bool>;

    /// Submits an execution plan for (re)start.
    ///
    /// Fire-and-forget: the resulting task state arrives later through the
    /// Record Store.
    async fn execute_plan(&self, plan_id: &ExecutionPlanId) -> Result<()>;
}

/// A bus whose transport always fails.
///
/// Useful for exercising dispatch-failure handling without a worker.
#[derive(Debug, Default)]
pub struct UnreachableWorkerBus;

#[async_trait]
impl WorkerEventBus for UnreachableWorkerBus {
    async fn send_step_event(
        &self,
        _external_id: &ExecutionPlanId,
        _step_id: StepId,
        _kind: StepEventKind,
    ) -> Result<EventDelivery> {
        Err(Error::dispatch("worker event bus unreachable"))
    }

    async fn request_cancel(&self, _external_id: &ExecutionPlanId) -> Result<bool> {
        Err(Error::dispatch("worker event bus unreachable"))
    }

    async fn request_abort(&self, _external_id: &ExecutionPlanId) -> Result<bool> {
        Err(Error::dispatch("worker event bus unreachable"))
    }

    async fn execute_plan(&self, _plan_id: &ExecutionPlanId) -> Result<()> {
        Err(Error::dispatch("worker event bus unreachable"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_predicates() {
        assert!(EventDelivery::acknowledged().is_acknowledged());
        assert!(!EventDelivery::unknown_target("no such step").is_acknowledged());
    }

    #[test]
    fn event_kind_labels() {
        assert_eq!(StepEventKind::Cancel.to_string(), "cancel");
        assert_eq!(StepEventKind::Abort.to_string(), "abort");
    }

    #[tokio::test]
    async fn unreachable_bus_fails_every_call() {
        let bus = UnreachableWorkerBus;
        let plan = ExecutionPlanId::new("plan-1");

        let err = bus
            .send_step_event(&plan, StepId::new(1), StepEventKind::Cancel)
            .await
            .expect_err("must fail");
        assert!(matches!(err, Error::Dispatch { .. }));
        assert!(bus.request_cancel(&plan).await.is_err());
        assert!(bus.request_abort(&plan).await.is_err());
        assert!(bus.execute_plan(&plan).await.is_err());
    }
}
