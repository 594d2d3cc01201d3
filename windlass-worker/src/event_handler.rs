//! The history event handler and replay driver.
//!
//! Single entry point [`WorkflowEventHandler::process_event`]: applies one
//! history event to the decision state machines and the environment, fires
//! waiter callbacks into suspended coroutines, and runs the dispatcher at
//! decision-task boundaries. Every event is processed under panic capture:
//! an illegal state transition aborts the decision task, any other panic
//! becomes a workflow-level `PanicError`.

use std::backtrace::Backtrace;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use windlass_core::encoded::{decode, encode};
use windlass_core::history::{EventAttributes, HistoryEvent, MarkerRecordedEventAttributes};
use windlass_core::types::{QUERY_TYPE_OPEN_SESSIONS, QUERY_TYPE_STACK_TRACE};
use windlass_core::{
    CanceledError, PanicError, TerminatedError, TimeoutError, TimeoutType,
    UnknownExternalWorkflowExecutionError, WindlassError, WindlassResult,
    WorkflowExecutionAlreadyStartedError, WorkflowExecution, WorkflowInfo,
};
use windlass_workflow::cancel::CancellationScope;
use windlass_workflow::context::{SharedEnvironment, WorkflowContext, WorkflowEnvironment};
use windlass_workflow::dispatcher::Dispatcher;
use windlass_workflow::local_activity::{
    last_part_of_name, marker_data_to_result, LocalActivityMarkerData,
};
use windlass_workflow::markers::{
    decode_mutable_side_effect_details, decode_side_effect_details, decode_version_details,
};
use windlass_workflow::state_machine::{
    panic_illegal_state, MachineData, StateMachinePanic, LOCAL_ACTIVITY_MARKER_NAME,
    MUTABLE_SIDE_EFFECT_MARKER_NAME, SIDE_EFFECT_MARKER_NAME, VERSION_MARKER_NAME,
};

use crate::environment::{
    ScheduledActivity, ScheduledCancellation, ScheduledChildWorkflow, ScheduledSignal,
    ScheduledTimer, WorkflowEnv,
};
use crate::options::WorkerOptions;
use crate::registry::Registry;

/// Query results above this size are rejected.
pub const QUERY_RESULT_SIZE_LIMIT: usize = 2_000_000;

/// Errors that abort a decision task. The service will reissue the task,
/// typically on another worker.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("illegal decision state: {0}")]
    IllegalState(String),
    #[error("workflow type \"{0}\" is not registered")]
    WorkflowNotRegistered(String),
    #[error("unknown marker name \"{0}\" for event {1}")]
    UnknownMarker(String, i64),
    #[error("history events out of order: event id {got} after {last}")]
    EventOutOfOrder { got: i64, last: i64 },
    #[error("decision task for uncached workflow does not begin with WorkflowExecutionStarted")]
    PartialHistory,
    #[error(transparent)]
    Windlass(#[from] WindlassError),
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn waiter_data<T: Send + Sync + 'static>(data: Option<MachineData>, kind: &str) -> Arc<T> {
    data.and_then(|d| d.downcast::<T>().ok())
        .unwrap_or_else(|| panic!("decision state machine carries no {kind} data"))
}

/// Route a cache-backed marker (side effect, version, mutable side effect)
/// into the matching replay cache. Returns false for other marker kinds.
fn apply_marker_to_caches(
    env: &mut WorkflowEnv,
    marker_name: &str,
    details: &[u8],
) -> Result<bool, ExecutionError> {
    let converter = env.data_converter();
    match marker_name {
        SIDE_EFFECT_MARKER_NAME => {
            let decoded = decode_side_effect_details(converter.as_ref(), details)
                .map_err(|e| WindlassError::Encoding(e.to_string()))?;
            env.side_effect_results
                .insert(decoded.side_effect_id, decoded.result);
            Ok(true)
        }
        VERSION_MARKER_NAME => {
            let decoded = decode_version_details(converter.as_ref(), details)
                .map_err(|e| WindlassError::Encoding(e.to_string()))?;
            env.change_versions.insert(decoded.change_id, decoded.version);
            Ok(true)
        }
        MUTABLE_SIDE_EFFECT_MARKER_NAME => {
            let decoded = decode_mutable_side_effect_details(converter.as_ref(), details)
                .map_err(|e| WindlassError::Encoding(e.to_string()))?;
            env.mutable_side_effects.insert(decoded.id, decoded.result);
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Drives one workflow execution: owns its dispatcher, its root
/// cancellation scope, and (behind a shared handle) its environment.
pub struct WorkflowEventHandler {
    env: Arc<Mutex<WorkflowEnv>>,
    dispatcher: Dispatcher,
    root_scope: CancellationScope,
    registry: Arc<Registry>,
}

impl WorkflowEventHandler {
    pub fn new(workflow_info: WorkflowInfo, registry: Arc<Registry>, options: &WorkerOptions) -> Self {
        Self {
            env: Arc::new(Mutex::new(WorkflowEnv::new(workflow_info, options))),
            dispatcher: Dispatcher::new(),
            root_scope: CancellationScope::new_root(),
            registry,
        }
    }

    pub(crate) fn env(&self) -> Arc<Mutex<WorkflowEnv>> {
        self.env.clone()
    }

    fn lock_env(&self) -> MutexGuard<'_, WorkflowEnv> {
        self.env.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply one history event. `is_replay` marks events the worker has
    /// decided on before; `is_last` marks the final event of the batch.
    pub fn process_event(
        &mut self,
        event: &HistoryEvent,
        is_replay: bool,
        is_last: bool,
    ) -> Result<(), ExecutionError> {
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.process_event_inner(event, is_replay, is_last)
        }));
        match outcome {
            Ok(result) => result,
            Err(payload) => {
                if let Some(panic) = payload.downcast_ref::<StateMachinePanic>() {
                    tracing::error!(
                        event_id = event.event_id,
                        message = %panic.message,
                        "illegal decision state while processing event"
                    );
                    return Err(ExecutionError::IllegalState(panic.message.clone()));
                }
                let message = panic_message(payload.as_ref());
                let stack_trace = Backtrace::force_capture().to_string();
                tracing::error!(
                    event_id = event.event_id,
                    panic = %message,
                    "workflow panic while processing event"
                );
                self.lock_env()
                    .complete(None, Some(PanicError::new(message, stack_trace).into()));
                Ok(())
            }
        }
    }

    fn process_event_inner(
        &mut self,
        event: &HistoryEvent,
        is_replay: bool,
        is_last: bool,
    ) -> Result<(), ExecutionError> {
        {
            let mut env = self.lock_env();
            env.is_replay = is_replay;
            if env.log_enabled() {
                tracing::trace!(
                    event_id = event.event_id,
                    event_type = event.type_name(),
                    "ProcessEvent"
                );
            }
        }

        match &event.attributes {
            EventAttributes::WorkflowExecutionStarted(attrs) => {
                self.handle_workflow_execution_started(&attrs.input)?;
            }

            EventAttributes::DecisionTaskStarted(_) => {
                self.lock_env().set_current_replay_time(event.timestamp);
                self.dispatcher.run_until_all_blocked();
            }

            // Terminal and bookkeeping events carry no work for the
            // decider.
            EventAttributes::WorkflowExecutionCompleted(_)
            | EventAttributes::WorkflowExecutionFailed(_)
            | EventAttributes::WorkflowExecutionTimedOut(_)
            | EventAttributes::WorkflowExecutionCanceled(_)
            | EventAttributes::WorkflowExecutionTerminated(_)
            | EventAttributes::WorkflowExecutionContinuedAsNew(_)
            | EventAttributes::DecisionTaskScheduled(_)
            | EventAttributes::DecisionTaskCompleted(_)
            | EventAttributes::DecisionTaskTimedOut(_)
            | EventAttributes::DecisionTaskFailed(_)
            | EventAttributes::ActivityTaskStarted(_) => {}

            EventAttributes::ActivityTaskScheduled(attrs) => {
                self.lock_env()
                    .decisions_helper
                    .handle_activity_task_scheduled(event.event_id, &attrs.activity_id);
            }

            EventAttributes::ActivityTaskCompleted(attrs) => {
                let touch = {
                    let mut env = self.lock_env();
                    let activity_id = env.decisions_helper.activity_id_for_event(event);
                    env.decisions_helper.handle_activity_task_closed(&activity_id)
                };
                let activity = waiter_data::<ScheduledActivity>(touch.data, "activity");
                if !activity.waiter.handled() {
                    activity
                        .waiter
                        .handle(Ok(attrs.result.clone().unwrap_or_default()));
                }
            }

            EventAttributes::ActivityTaskFailed(attrs) => {
                let touch = {
                    let mut env = self.lock_env();
                    let activity_id = env.decisions_helper.activity_id_for_event(event);
                    env.decisions_helper.handle_activity_task_closed(&activity_id)
                };
                let activity = waiter_data::<ScheduledActivity>(touch.data, "activity");
                if !activity.waiter.handled() {
                    let error = WindlassError::from_reason(
                        attrs.reason.as_deref().unwrap_or_default(),
                        attrs.details.clone().unwrap_or_default(),
                    );
                    activity.waiter.handle(Err(error));
                }
            }

            EventAttributes::ActivityTaskTimedOut(attrs) => {
                let touch = {
                    let mut env = self.lock_env();
                    let activity_id = env.decisions_helper.activity_id_for_event(event);
                    env.decisions_helper.handle_activity_task_closed(&activity_id)
                };
                let activity = waiter_data::<ScheduledActivity>(touch.data, "activity");
                if !activity.waiter.handled() {
                    let retried_failure = attrs
                        .last_failure_reason
                        .as_deref()
                        .filter(|r| !r.is_empty());
                    let error = match retried_failure {
                        // A retried activity that finally times out
                        // start-to-close reports the last real failure, so
                        // the error type stays stable across attempts.
                        Some(reason) if attrs.timeout_type == TimeoutType::StartToClose => {
                            WindlassError::from_reason(
                                reason,
                                attrs.last_failure_details.clone().unwrap_or_default(),
                            )
                        }
                        _ => {
                            let mut timeout = TimeoutError::new(
                                attrs.timeout_type,
                                attrs.details.clone().unwrap_or_default(),
                            );
                            if attrs.timeout_type == TimeoutType::Heartbeat {
                                timeout = timeout.with_heartbeat_details(
                                    attrs.details.clone().unwrap_or_default(),
                                );
                            }
                            timeout.into()
                        }
                    };
                    activity.waiter.handle(Err(error));
                }
            }

            EventAttributes::ActivityTaskCancelRequested(attrs) => {
                self.lock_env()
                    .decisions_helper
                    .handle_activity_task_cancel_requested(&attrs.activity_id);
            }

            EventAttributes::RequestCancelActivityTaskFailed(attrs) => {
                self.lock_env()
                    .decisions_helper
                    .handle_request_cancel_activity_task_failed(&attrs.activity_id);
            }

            EventAttributes::ActivityTaskCanceled(attrs) => {
                let touch = {
                    let mut env = self.lock_env();
                    let activity_id = env.decisions_helper.activity_id_for_event(event);
                    env.decisions_helper.handle_activity_task_canceled(&activity_id)
                };
                let activity = waiter_data::<ScheduledActivity>(touch.data, "activity");
                if !activity.waiter.handled()
                    && (touch.done || !activity.wait_for_cancel_request)
                {
                    let error = CanceledError::new(attrs.details.clone().unwrap_or_default());
                    activity.waiter.handle(Err(error.into()));
                }
            }

            EventAttributes::TimerStarted(attrs) => {
                self.lock_env()
                    .decisions_helper
                    .handle_timer_started(&attrs.timer_id);
            }

            EventAttributes::TimerFired(attrs) => {
                let touch = self
                    .lock_env()
                    .decisions_helper
                    .handle_timer_closed(&attrs.timer_id);
                let timer = waiter_data::<ScheduledTimer>(touch.data, "timer");
                if !timer.waiter.handled() {
                    timer.waiter.handle(Ok(Vec::new()));
                }
            }

            EventAttributes::TimerCanceled(attrs) => {
                self.lock_env()
                    .decisions_helper
                    .handle_timer_canceled(&attrs.timer_id);
            }

            EventAttributes::CancelTimerFailed(attrs) => {
                self.lock_env()
                    .decisions_helper
                    .handle_cancel_timer_failed(&attrs.timer_id);
            }

            EventAttributes::WorkflowExecutionCancelRequested(_) => {
                self.lock_env().invoke_cancel_handler();
            }

            EventAttributes::WorkflowExecutionSignaled(attrs) => {
                self.lock_env().invoke_signal_handler(
                    &attrs.signal_name,
                    attrs.input.clone().unwrap_or_default(),
                );
            }

            EventAttributes::MarkerRecorded(attrs) => {
                let resumed = self.handle_marker_recorded(event.event_id, attrs)?;
                if resumed {
                    self.dispatcher.run_until_all_blocked();
                }
            }

            EventAttributes::UpsertWorkflowSearchAttributes(attrs) => {
                self.lock_env()
                    .workflow_info
                    .merge_search_attributes(&attrs.search_attributes);
            }

            EventAttributes::RequestCancelExternalWorkflowExecutionInitiated(attrs) => {
                let cancellation_id = attrs.control.clone().unwrap_or_default();
                self.lock_env()
                    .decisions_helper
                    .handle_request_cancel_external_workflow_execution_initiated(
                        event.event_id,
                        &attrs.workflow_execution.workflow_id,
                        &cancellation_id,
                    );
            }

            EventAttributes::ExternalWorkflowExecutionCancelRequested(attrs) => {
                let (is_external, touch) = self
                    .lock_env()
                    .decisions_helper
                    .handle_external_workflow_execution_cancel_requested(
                        attrs.initiated_event_id,
                        &attrs.workflow_execution.workflow_id,
                    );
                if is_external {
                    let cancellation =
                        waiter_data::<ScheduledCancellation>(touch.data, "cancellation");
                    if !cancellation.waiter.handled() {
                        cancellation.waiter.handle(Ok(Vec::new()));
                    }
                }
            }

            EventAttributes::RequestCancelExternalWorkflowExecutionFailed(attrs) => {
                let (is_external, touch) = self
                    .lock_env()
                    .decisions_helper
                    .handle_request_cancel_external_workflow_execution_failed(
                        attrs.initiated_event_id,
                        &attrs.workflow_execution.workflow_id,
                    );
                if is_external {
                    let cancellation =
                        waiter_data::<ScheduledCancellation>(touch.data, "cancellation");
                    if !cancellation.waiter.handled() {
                        cancellation.waiter.handle(Err(WindlassError::Generic(
                            windlass_core::GenericError::new(format!(
                                "cancel external workflow failed: {:?}",
                                attrs.cause
                            )),
                        )));
                    }
                }
            }

            EventAttributes::SignalExternalWorkflowExecutionInitiated(attrs) => {
                let signal_id = attrs.control.clone().unwrap_or_default();
                self.lock_env()
                    .decisions_helper
                    .handle_signal_external_workflow_execution_initiated(
                        event.event_id,
                        &signal_id,
                    );
            }

            EventAttributes::ExternalWorkflowExecutionSignaled(attrs) => {
                let touch = self
                    .lock_env()
                    .decisions_helper
                    .handle_signal_external_workflow_execution_completed(attrs.initiated_event_id);
                let signal = waiter_data::<ScheduledSignal>(touch.data, "signal");
                if !signal.waiter.handled() {
                    signal.waiter.handle(Ok(Vec::new()));
                }
            }

            EventAttributes::SignalExternalWorkflowExecutionFailed(attrs) => {
                let touch = self
                    .lock_env()
                    .decisions_helper
                    .handle_signal_external_workflow_execution_failed(attrs.initiated_event_id);
                let signal = waiter_data::<ScheduledSignal>(touch.data, "signal");
                if !signal.waiter.handled() {
                    use windlass_core::history::SignalExternalWorkflowExecutionFailedCause;
                    let error: WindlassError = match attrs.cause {
                        SignalExternalWorkflowExecutionFailedCause::UnknownExternalWorkflowExecution => {
                            UnknownExternalWorkflowExecutionError.into()
                        }
                        other => windlass_core::GenericError::new(format!(
                            "signal external workflow failed: {other:?}"
                        ))
                        .into(),
                    };
                    signal.waiter.handle(Err(error));
                }
            }

            EventAttributes::StartChildWorkflowExecutionInitiated(attrs) => {
                self.lock_env()
                    .decisions_helper
                    .handle_start_child_workflow_execution_initiated(&attrs.workflow_id);
            }

            EventAttributes::StartChildWorkflowExecutionFailed(attrs) => {
                let touch = self
                    .lock_env()
                    .decisions_helper
                    .handle_start_child_workflow_execution_failed(&attrs.workflow_id);
                let child = waiter_data::<ScheduledChildWorkflow>(touch.data, "child workflow");
                if !child.result.handled() {
                    let error =
                        WorkflowExecutionAlreadyStartedError::new("workflow execution already started");
                    child.handle_started(Err(error.clone().into()));
                    child.result.handle(Err(error.into()));
                }
            }

            EventAttributes::ChildWorkflowExecutionStarted(attrs) => {
                let touch = self
                    .lock_env()
                    .decisions_helper
                    .handle_child_workflow_execution_started(
                        &attrs.workflow_execution.workflow_id,
                    );
                let child = waiter_data::<ScheduledChildWorkflow>(touch.data, "child workflow");
                if !child.result.handled() {
                    child.handle_started(Ok(WorkflowExecution::new(
                        attrs.workflow_execution.workflow_id.clone(),
                        attrs.workflow_execution.run_id.clone(),
                    )));
                }
            }

            EventAttributes::ChildWorkflowExecutionCompleted(attrs) => {
                let touch = self
                    .lock_env()
                    .decisions_helper
                    .handle_child_workflow_execution_closed(
                        &attrs.workflow_execution.workflow_id,
                    );
                let child = waiter_data::<ScheduledChildWorkflow>(touch.data, "child workflow");
                if !child.result.handled() {
                    child
                        .result
                        .handle(Ok(attrs.result.clone().unwrap_or_default()));
                }
            }

            EventAttributes::ChildWorkflowExecutionFailed(attrs) => {
                let touch = self
                    .lock_env()
                    .decisions_helper
                    .handle_child_workflow_execution_closed(
                        &attrs.workflow_execution.workflow_id,
                    );
                let child = waiter_data::<ScheduledChildWorkflow>(touch.data, "child workflow");
                if !child.result.handled() {
                    let error = WindlassError::from_reason(
                        attrs.reason.as_deref().unwrap_or_default(),
                        attrs.details.clone().unwrap_or_default(),
                    );
                    child.result.handle(Err(error));
                }
            }

            EventAttributes::ChildWorkflowExecutionCanceled(attrs) => {
                let touch = self
                    .lock_env()
                    .decisions_helper
                    .handle_child_workflow_execution_canceled(
                        &attrs.workflow_execution.workflow_id,
                    );
                let child = waiter_data::<ScheduledChildWorkflow>(touch.data, "child workflow");
                if !child.result.handled() {
                    let error = CanceledError::new(attrs.details.clone().unwrap_or_default());
                    child.result.handle(Err(error.into()));
                }
            }

            EventAttributes::ChildWorkflowExecutionTimedOut(attrs) => {
                let touch = self
                    .lock_env()
                    .decisions_helper
                    .handle_child_workflow_execution_closed(
                        &attrs.workflow_execution.workflow_id,
                    );
                let child = waiter_data::<ScheduledChildWorkflow>(touch.data, "child workflow");
                if !child.result.handled() {
                    let error = TimeoutError::new(attrs.timeout_type, Vec::new());
                    child.result.handle(Err(error.into()));
                }
            }

            EventAttributes::ChildWorkflowExecutionTerminated(attrs) => {
                let touch = self
                    .lock_env()
                    .decisions_helper
                    .handle_child_workflow_execution_closed(
                        &attrs.workflow_execution.workflow_id,
                    );
                let child = waiter_data::<ScheduledChildWorkflow>(touch.data, "child workflow");
                if !child.result.handled() {
                    child.result.handle(Err(TerminatedError.into()));
                }
            }

            EventAttributes::Unknown { kind } => {
                // Never fail: stay forward compatible with new events.
                tracing::error!(event_id = event.event_id, kind = %kind, "unknown event type");
            }
        }

        // When replaying to answer a query or reconstruct state, the last
        // event of the batch may not be DecisionTaskStarted. Give
        // suspended coroutines a tick anyway so they observe signals and
        // cancel requests delivered earlier in the batch.
        if is_last && !event.is_decision_task_started() {
            self.dispatcher.run_until_all_blocked();
        }

        Ok(())
    }

    fn handle_workflow_execution_started(
        &mut self,
        input: &[u8],
    ) -> Result<(), ExecutionError> {
        let workflow_type = self.lock_env().workflow_info().workflow_type.name;
        let workflow = self
            .registry
            .get_workflow(&workflow_type)
            .ok_or_else(|| ExecutionError::WorkflowNotRegistered(workflow_type.clone()))?;

        let context = WorkflowContext::new(
            self.env.clone() as SharedEnvironment,
            self.dispatcher.handle(),
            self.root_scope.clone(),
        );
        self.lock_env().notify_workflow_start();

        let input = (!input.is_empty()).then(|| input.to_vec());
        let env = self.env.clone();
        self.dispatcher.handle().spawn("workflow-root", async move {
            let result = workflow(context, input).await;
            let mut env = env.lock().unwrap_or_else(PoisonError::into_inner);
            match result {
                Ok(bytes) => env.complete(Some(bytes), None),
                Err(error) => env.complete(None, Some(error)),
            }
        });
        Ok(())
    }

    /// Populate the replay caches from a marker event without driving any
    /// state machine.
    ///
    /// History records markers after the decision-task-started event whose
    /// code produced them, so the task handler preloads each replayed
    /// batch's markers before running that batch's dispatcher tick.
    /// Returns whether the marker was one of the cache-backed kinds.
    pub fn preload_marker(
        &mut self,
        attrs: &MarkerRecordedEventAttributes,
    ) -> Result<bool, ExecutionError> {
        let details = attrs.details.clone().unwrap_or_default();
        let mut env = self.lock_env();
        apply_marker_to_caches(&mut env, &attrs.marker_name, &details)
    }

    /// Returns whether a suspended coroutine was resumed and the
    /// dispatcher needs a tick.
    fn handle_marker_recorded(
        &mut self,
        event_id: i64,
        attrs: &MarkerRecordedEventAttributes,
    ) -> Result<bool, ExecutionError> {
        let details = attrs.details.clone().unwrap_or_default();
        let mut env = self.lock_env();
        let converter = env.data_converter();

        if apply_marker_to_caches(&mut env, &attrs.marker_name, &details)? {
            return Ok(false);
        }

        match attrs.marker_name.as_str() {
            LOCAL_ACTIVITY_MARKER_NAME => {
                let marker: LocalActivityMarkerData = decode(converter.as_ref(), &details)
                    .map_err(|e| WindlassError::Encoding(e.to_string()))?;
                let Some(task) = env.pending_la_tasks.get(&marker.activity_id).cloned() else {
                    return Ok(false);
                };

                if !marker.activity_type.is_empty()
                    && last_part_of_name(&marker.activity_type)
                        != last_part_of_name(&task.params.activity_type.name)
                {
                    // History disagrees with the code about which local
                    // activity ran here.
                    panic_illegal_state(format!(
                        "code executes local activity {}, but history event found {}",
                        task.params.activity_type.name, marker.activity_type
                    ));
                }

                env.decisions_helper
                    .record_local_activity_marker(&marker.activity_id, details.clone());
                env.pending_la_tasks.remove(&marker.activity_id);
                env.unstarted_la_tasks.remove(&marker.activity_id);

                env.set_current_replay_time(marker.replay_time);
                let result = marker_data_to_result(marker);
                if !task.waiter.handled() {
                    task.waiter.handle(result);
                }
                Ok(true)
            }
            other => Err(ExecutionError::UnknownMarker(other.to_string(), event_id)),
        }
    }

    /// Feed a live local-activity result back into the workflow as a
    /// synthesized marker event.
    pub fn process_local_activity_result(
        &mut self,
        activity_id: &str,
        result: Result<Vec<u8>, WindlassError>,
        attempt: i32,
    ) -> Result<(), ExecutionError> {
        let (marker_bytes, replay_time) = {
            let env = self.lock_env();
            let task = env.pending_la_tasks.get(activity_id).ok_or_else(|| {
                ExecutionError::Windlass(WindlassError::InvalidArgument(format!(
                    "no pending local activity with id {activity_id}"
                )))
            })?;
            let replay_time = env.local_activity_replay_time();
            let marker = match result {
                Ok(bytes) => LocalActivityMarkerData::success(
                    activity_id.to_string(),
                    task.params.activity_type.name.clone(),
                    bytes,
                    replay_time,
                    attempt,
                ),
                Err(error) => {
                    let (reason, details) = error.reason_and_details();
                    LocalActivityMarkerData::failure(
                        activity_id.to_string(),
                        task.params.activity_type.name.clone(),
                        reason,
                        Some(details),
                        replay_time,
                        attempt,
                    )
                }
            };
            let bytes = encode(env.data_converter().as_ref(), &marker)
                .map_err(|e| WindlassError::Encoding(e.to_string()))?;
            (bytes, replay_time)
        };

        let marker_event = HistoryEvent::new(
            0,
            replay_time,
            EventAttributes::MarkerRecorded(Box::new(MarkerRecordedEventAttributes {
                marker_name: LOCAL_ACTIVITY_MARKER_NAME.to_string(),
                details: Some(marker_bytes),
                decision_task_completed_event_id: 0,
                header: None,
            })),
        );
        self.process_event(&marker_event, false, false)
    }

    /// Route a query to a built-in or the registered handler. Oversized
    /// results are rejected.
    pub fn process_query(&mut self, query_type: &str, args: Vec<u8>) -> WindlassResult<Vec<u8>> {
        match query_type {
            QUERY_TYPE_STACK_TRACE => {
                let trace = self.dispatcher.stack_trace();
                let env = self.lock_env();
                encode(env.data_converter().as_ref(), &trace)
                    .map_err(|e| WindlassError::Encoding(e.to_string()))
            }
            QUERY_TYPE_OPEN_SESSIONS => {
                let env = self.lock_env();
                let sessions = env.open_session_list();
                encode(env.data_converter().as_ref(), &sessions)
                    .map_err(|e| WindlassError::Encoding(e.to_string()))
            }
            _ => {
                let result = self.lock_env().invoke_query_handler(query_type, args)?;
                if result.len() > QUERY_RESULT_SIZE_LIMIT {
                    tracing::error!(
                        query_type,
                        size = result.len(),
                        "query result size exceeds limit"
                    );
                    return Err(WindlassError::QueryFailed(format!(
                        "query result size ({}) exceeds limit ({})",
                        result.len(),
                        QUERY_RESULT_SIZE_LIMIT
                    )));
                }
                Ok(result)
            }
        }
    }

    /// Dump of every coroutine's state, served by the stack-trace query.
    pub fn stack_trace(&self) -> String {
        self.dispatcher.stack_trace()
    }
}
