//! In-memory worker bus implementation for testing.
//!
//! This module provides [`InMemoryWorkerBus`], a scriptable in-process
//! implementation of the [`WorkerEventBus`] trait suitable for testing and
//! development.
//!
//! ## Limitations
//!
//! - **NOT a worker**: Nothing executes; the bus only records what it was
//!   asked and answers from its script
//! - **Single-process only**: Interactions are not visible across process
//!   boundaries

use std::collections::{BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use capstan_core::{ExecutionPlanId, StepId};

use super::{EventDelivery, StepEventKind, WorkerEventBus};
use crate::error::{Error, Result};

/// Scripted behavior for one registered execution.
#[derive(Debug, Clone)]
pub struct ExecutionScript {
    /// Whether the engine currently reports the execution as cancellable.
    pub cancellable: bool,
    /// Whether the engine currently reports the execution as abortable.
    pub abortable: bool,
    /// Steps the worker recognizes for event delivery.
    pub steps: BTreeSet<StepId>,
    /// When true, step events are received but never acknowledged.
    pub withhold_acks: bool,
}

impl Default for ExecutionScript {
    fn default() -> Self {
        Self {
            cancellable: true,
            abortable: true,
            steps: BTreeSet::new(),
            withhold_acks: false,
        }
    }
}

impl ExecutionScript {
    /// Creates a script that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether the engine reports the execution as cancellable.
    #[must_use]
    pub const fn with_cancellable(mut self, cancellable: bool) -> Self {
        self.cancellable = cancellable;
        self
    }

    /// Sets whether the engine reports the execution as abortable.
    #[must_use]
    pub const fn with_abortable(mut self, abortable: bool) -> Self {
        self.abortable = abortable;
        self
    }

    /// Registers a step the worker recognizes.
    #[must_use]
    pub fn with_step(mut self, step_id: StepId) -> Self {
        self.steps.insert(step_id);
        self
    }

    /// Makes the worker receive step events without ever confirming them.
    #[must_use]
    pub const fn withholding_acks(mut self) -> Self {
        self.withhold_acks = true;
        self
    }
}

/// A step event the bus delivered to a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredStepEvent {
    /// The execution the event was addressed to.
    pub external_id: ExecutionPlanId,
    /// The step the event targeted.
    pub step_id: StepId,
    /// The event kind.
    pub kind: StepEventKind,
}

/// Internal bus state protected by a single lock.
#[derive(Debug, Default)]
struct BusState {
    executions: HashMap<ExecutionPlanId, ExecutionScript>,
    step_events: Vec<DeliveredStepEvent>,
    cancel_requests: Vec<ExecutionPlanId>,
    abort_requests: Vec<ExecutionPlanId>,
    executed_plans: Vec<ExecutionPlanId>,
}

/// In-memory worker bus for testing.
///
/// Executions are registered with an [`ExecutionScript`] describing how the
/// pretend engine answers; every interaction is recorded for assertions.
///
/// ## Example
///
/// ```rust
/// use capstan_control::bus::memory::{ExecutionScript, InMemoryWorkerBus};
/// use capstan_core::StepId;
///
/// let bus = InMemoryWorkerBus::new();
/// bus.register("plan-1", ExecutionScript::new().with_step(StepId::new(3)))
///     .expect("register");
/// ```
#[derive(Debug, Default)]
pub struct InMemoryWorkerBus {
    state: RwLock<BusState>,
}

/// Converts a lock poison error to a dispatch error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::dispatch("worker bus lock poisoned")
}

impl InMemoryWorkerBus {
    /// Creates a bus with no registered executions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an execution with the given script.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn register(
        &self,
        external_id: impl Into<ExecutionPlanId>,
        script: ExecutionScript,
    ) -> Result<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        state.executions.insert(external_id.into(), script);
        drop(state);
        Ok(())
    }

    /// Returns every step event delivered so far.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn step_events(&self) -> Result<Vec<DeliveredStepEvent>> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state.step_events.clone())
    }

    /// Returns every execution a cancel was requested for.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn cancel_requests(&self) -> Result<Vec<ExecutionPlanId>> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state.cancel_requests.clone())
    }

    /// Returns every execution an abort was requested for.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn abort_requests(&self) -> Result<Vec<ExecutionPlanId>> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state.abort_requests.clone())
    }

    /// Returns every plan submitted for (re)start, in submission order.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn executed_plans(&self) -> Result<Vec<ExecutionPlanId>> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state.executed_plans.clone())
    }
}

#[async_trait]
impl WorkerEventBus for InMemoryWorkerBus {
    async fn send_step_event(
        &self,
        external_id: &ExecutionPlanId,
        step_id: StepId,
        kind: StepEventKind,
    ) -> Result<EventDelivery> {
        let withhold = {
            let mut state = self.state.write().map_err(poison_err)?;

            let Some(script) = state.executions.get(external_id) else {
                drop(state);
                return Ok(EventDelivery::unknown_target(format!(
                    "unknown execution {external_id}"
                )));
            };

            if !script.steps.contains(&step_id) {
                let detail =
                    format!("step {step_id} is not active in execution {external_id}");
                drop(state);
                return Ok(EventDelivery::unknown_target(detail));
            }

            let withhold = script.withhold_acks;
            state.step_events.push(DeliveredStepEvent {
                external_id: external_id.clone(),
                step_id,
                kind,
            });
            withhold
        };

        if withhold {
            // The worker got the event but the confirmation never comes.
            std::future::pending::<()>().await;
        }

        Ok(EventDelivery::acknowledged())
    }

    async fn request_cancel(&self, external_id: &ExecutionPlanId) -> Result<bool> {
        let mut state = self.state.write().map_err(poison_err)?;

        let Some(script) = state.executions.get(external_id) else {
            drop(state);
            return Ok(false);
        };

        let accepted = script.cancellable;
        state.cancel_requests.push(external_id.clone());
        drop(state);
        Ok(accepted)
    }

    async fn request_abort(&self, external_id: &ExecutionPlanId) -> Result<bool> {
        let mut state = self.state.write().map_err(poison_err)?;

        let Some(script) = state.executions.get(external_id) else {
            drop(state);
            return Ok(false);
        };

        let accepted = script.abortable;
        state.abort_requests.push(external_id.clone());
        drop(state);
        Ok(accepted)
    }

    async fn execute_plan(&self, plan_id: &ExecutionPlanId) -> Result<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        state.executed_plans.push(plan_id.clone());
        drop(state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn step_event_to_known_step_is_acknowledged() -> Result<()> {
        let bus = InMemoryWorkerBus::new();
        bus.register("plan-1", ExecutionScript::new().with_step(StepId::new(3)))?;

        let delivery = bus
            .send_step_event(
                &ExecutionPlanId::new("plan-1"),
                StepId::new(3),
                StepEventKind::Cancel,
            )
            .await?;
        assert!(delivery.is_acknowledged());

        let events = bus.step_events()?;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].step_id, StepId::new(3));
        assert_eq!(events[0].kind, StepEventKind::Cancel);
        Ok(())
    }

    #[tokio::test]
    async fn step_event_to_unknown_step_reports_target() -> Result<()> {
        let bus = InMemoryWorkerBus::new();
        bus.register("plan-1", ExecutionScript::new())?;

        let delivery = bus
            .send_step_event(
                &ExecutionPlanId::new("plan-1"),
                StepId::new(9),
                StepEventKind::Cancel,
            )
            .await?;
        assert!(matches!(delivery, EventDelivery::UnknownTarget { .. }));
        assert!(bus.step_events()?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn step_event_to_unknown_execution_reports_target() -> Result<()> {
        let bus = InMemoryWorkerBus::new();
        let delivery = bus
            .send_step_event(
                &ExecutionPlanId::new("nowhere"),
                StepId::new(1),
                StepEventKind::Abort,
            )
            .await?;
        assert!(matches!(delivery, EventDelivery::UnknownTarget { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn cancel_follows_script() -> Result<()> {
        let bus = InMemoryWorkerBus::new();
        bus.register("live", ExecutionScript::new())?;
        bus.register("wedged", ExecutionScript::new().with_cancellable(false))?;

        assert!(bus.request_cancel(&ExecutionPlanId::new("live")).await?);
        assert!(!bus.request_cancel(&ExecutionPlanId::new("wedged")).await?);
        assert!(!bus.request_cancel(&ExecutionPlanId::new("missing")).await?);
        assert_eq!(bus.cancel_requests()?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn abort_follows_script() -> Result<()> {
        let bus = InMemoryWorkerBus::new();
        bus.register("stuck", ExecutionScript::new().with_abortable(false))?;

        assert!(!bus.request_abort(&ExecutionPlanId::new("stuck")).await?);
        assert_eq!(bus.abort_requests()?, vec![ExecutionPlanId::new("stuck")]);
        Ok(())
    }

    #[tokio::test]
    async fn execute_plan_records_submissions() -> Result<()> {
        let bus = InMemoryWorkerBus::new();
        bus.execute_plan(&ExecutionPlanId::new("plan-7")).await?;
        bus.execute_plan(&ExecutionPlanId::new("plan-7")).await?;

        assert_eq!(
            bus.executed_plans()?,
            vec![ExecutionPlanId::new("plan-7"), ExecutionPlanId::new("plan-7")]
        );
        Ok(())
    }

    #[tokio::test]
    async fn withheld_ack_never_resolves() -> Result<()> {
        let bus = InMemoryWorkerBus::new();
        bus.register(
            "silent",
            ExecutionScript::new()
                .with_step(StepId::new(1))
                .withholding_acks(),
        )?;

        let wait = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            bus.send_step_event(
                &ExecutionPlanId::new("silent"),
                StepId::new(1),
                StepEventKind::Cancel,
            ),
        )
        .await;
        assert!(wait.is_err(), "event must stay unacknowledged");

        // The event itself was delivered before the worker went quiet.
        assert_eq!(bus.step_events()?.len(), 1);
        Ok(())
    }
}
