//! History replayer.
//!
//! Replays a complete recorded history against the registered workflow
//! code and verifies the code reaches the same close state. The primary
//! tool for validating that a code change is compatible with in-flight
//! executions.

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use windlass_core::history::{EventAttributes, History};
use windlass_core::types::{WorkflowExecution, WorkflowType};
use windlass_core::{
    Decision, DecisionType, GenericError, NonDeterminismReason, NonDeterministicError,
    WindlassError, WindlassResult,
};

use crate::cache::WorkflowCache;
use crate::options::WorkerOptions;
use crate::registry::Registry;
use crate::task_handler::{DecisionTask, WorkflowTaskHandler};

/// Replays recorded histories against registered workflow definitions.
pub struct WorkflowReplayer {
    registry: Arc<Registry>,
    options: WorkerOptions,
}

impl WorkflowReplayer {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self::with_options(registry, WorkerOptions::default())
    }

    pub fn with_options(registry: Arc<Registry>, mut options: WorkerOptions) -> Self {
        // Replay never reuses cached state; that is the point.
        options.disable_sticky_execution = true;
        Self { registry, options }
    }

    /// Replay `history` end to end. Returns an error when the history is
    /// malformed, the workflow type is unregistered, or the re-executed
    /// code diverges from the recorded close state.
    pub fn replay_workflow_history(
        &self,
        domain: &str,
        task_list: &str,
        history: &History,
    ) -> WindlassResult<()> {
        let first = history
            .events
            .first()
            .ok_or_else(|| GenericError::new("history is empty"))?;
        let EventAttributes::WorkflowExecutionStarted(started) = &first.attributes else {
            return Err(GenericError::new(
                "history does not begin with WorkflowExecutionStarted",
            )
            .into());
        };
        let workflow_type = started.workflow_type.clone();
        let last_event_id = history.events.last().map(|e| e.event_id).unwrap_or(0);

        let run_id = Uuid::new_v4().to_string();
        let task = DecisionTask {
            workflow_execution: WorkflowExecution::new(format!("replay-{run_id}"), run_id),
            workflow_type: workflow_type.clone(),
            history: history.clone(),
            previous_started_event_id: last_event_id,
            started_event_id: last_event_id,
            queries: HashMap::new(),
        };

        let handler = WorkflowTaskHandler::new(
            domain,
            task_list,
            self.registry.clone(),
            Arc::new(WorkflowCache::new(1)),
            self.options.clone(),
        );
        let result = handler
            .process_decision_task(task)
            .map_err(|e| WindlassError::Generic(GenericError::new(e.to_string())))?;

        self.verify_close_state(&workflow_type, history, &result.decisions)
    }

    fn verify_close_state(
        &self,
        workflow_type: &WorkflowType,
        history: &History,
        decisions: &[Decision],
    ) -> WindlassResult<()> {
        let recorded_close = history.events.iter().rev().find_map(|e| match &e.attributes {
            EventAttributes::WorkflowExecutionCompleted(attrs) => {
                Some((DecisionType::CompleteWorkflowExecution, attrs.result.clone()))
            }
            EventAttributes::WorkflowExecutionFailed(_) => {
                Some((DecisionType::FailWorkflowExecution, None))
            }
            EventAttributes::WorkflowExecutionCanceled(_) => {
                Some((DecisionType::CancelWorkflowExecution, None))
            }
            EventAttributes::WorkflowExecutionContinuedAsNew(_) => {
                Some((DecisionType::ContinueAsNewWorkflowExecution, None))
            }
            _ => None,
        });

        let Some((recorded_kind, recorded_result)) = recorded_close else {
            // History has no close event, nothing further to compare.
            return Ok(());
        };

        let mismatch = |details: String| -> WindlassError {
            NonDeterministicError {
                reason: NonDeterminismReason::Mismatch,
                workflow_type: workflow_type.name.clone(),
                workflow_id: String::new(),
                run_id: String::new(),
                details: Some(details),
            }
            .into()
        };

        let Some(last_decision) = decisions.last() else {
            return Err(mismatch(format!(
                "history closed with {recorded_kind:?} but replay produced no close decision"
            )));
        };
        if last_decision.decision_type() != recorded_kind {
            return Err(mismatch(format!(
                "history closed with {recorded_kind:?} but replay produced {:?}",
                last_decision.decision_type()
            )));
        }
        if let (Decision::CompleteWorkflowExecution(attrs), Some(recorded)) =
            (last_decision, &recorded_result)
        {
            if attrs.result.as_ref() != Some(recorded) {
                return Err(mismatch(
                    "replayed workflow result differs from recorded result".into(),
                ));
            }
        }
        Ok(())
    }
}
