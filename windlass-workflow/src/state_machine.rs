//! Decision state machines.
//!
//! Each machine is the local mirror of one intent the workflow has issued:
//! an activity, a timer, a child workflow, an external signal or cancel
//! request, a marker, or a search-attribute upsert. A machine emits the
//! right decision when pending decisions are collected, consumes the
//! history events that confirm or complete the intent, and panics on any
//! transition the protocol does not allow. Those panics carry a typed
//! [`StateMachinePanic`] payload and are caught only by the replay driver,
//! because an illegal transition means the history and the local code have
//! diverged.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use windlass_core::decision::{
    CancelTimerDecisionAttributes, CancelWorkflowExecutionDecisionAttributes,
    CompleteWorkflowExecutionDecisionAttributes, ContinueAsNewWorkflowExecutionDecisionAttributes,
    Decision, FailWorkflowExecutionDecisionAttributes, RecordMarkerDecisionAttributes,
    RequestCancelActivityTaskDecisionAttributes,
    RequestCancelExternalWorkflowExecutionDecisionAttributes,
    ScheduleActivityTaskDecisionAttributes, SignalExternalWorkflowExecutionDecisionAttributes,
    StartChildWorkflowExecutionDecisionAttributes, StartTimerDecisionAttributes,
    UpsertWorkflowSearchAttributesDecisionAttributes,
};
use windlass_core::history::{EventAttributes, HistoryEvent};
use windlass_core::types::{SearchAttributes, WorkflowExecution};

/// Marker names recorded in history. Wire-stable, must not be renamed.
pub const SIDE_EFFECT_MARKER_NAME: &str = "SideEffect";
pub const VERSION_MARKER_NAME: &str = "Version";
pub const LOCAL_ACTIVITY_MARKER_NAME: &str = "LocalActivity";
pub const MUTABLE_SIDE_EFFECT_MARKER_NAME: &str = "MutableSideEffect";

/// Unified state space shared by every machine variant. Variants differ
/// only in which transitions are legal and which decisions they emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionState {
    Created,
    DecisionSent,
    CanceledBeforeInitiated,
    Initiated,
    Started,
    CanceledAfterInitiated,
    CanceledAfterStarted,
    CancellationDecisionSent,
    CompletedAfterCancellationDecisionSent,
    Completed,
}

impl fmt::Display for DecisionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DecisionState::Created => "Created",
            DecisionState::DecisionSent => "DecisionSent",
            DecisionState::CanceledBeforeInitiated => "CanceledBeforeInitiated",
            DecisionState::Initiated => "Initiated",
            DecisionState::Started => "Started",
            DecisionState::CanceledAfterInitiated => "CanceledAfterInitiated",
            DecisionState::CanceledAfterStarted => "CanceledAfterStarted",
            DecisionState::CancellationDecisionSent => "CancellationDecisionSent",
            DecisionState::CompletedAfterCancellationDecisionSent => {
                "CompletedAfterCancellationDecisionSent"
            }
            DecisionState::Completed => "Completed",
        };
        write!(f, "{name}")
    }
}

/// Which kind of intent a machine tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecisionKind {
    Activity,
    ChildWorkflow,
    Cancellation,
    Marker,
    Timer,
    Signal,
    UpsertSearchAttributes,
}

impl fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DecisionKind::Activity => "Activity",
            DecisionKind::ChildWorkflow => "ChildWorkflow",
            DecisionKind::Cancellation => "Cancellation",
            DecisionKind::Marker => "Marker",
            DecisionKind::Timer => "Timer",
            DecisionKind::Signal => "Signal",
            DecisionKind::UpsertSearchAttributes => "UpsertSearchAttributes",
        };
        write!(f, "{name}")
    }
}

/// Key of a machine in the per-workflow collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DecisionId {
    pub kind: DecisionKind,
    pub id: String,
}

impl DecisionId {
    pub fn new(kind: DecisionKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for DecisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DecisionKind: {}, ID: {}", self.kind, self.id)
    }
}

/// Payload carried by illegal-state-transition panics. The replay driver
/// downcasts to this to distinguish protocol breakage from user panics.
#[derive(Debug, Clone)]
pub struct StateMachinePanic {
    pub message: String,
}

pub fn panic_illegal_state(message: String) -> ! {
    std::panic::panic_any(StateMachinePanic { message })
}

/// Arbitrary data attached to a machine by the environment, typically the
/// scheduled waiter holding the result callback.
pub type MachineData = Arc<dyn Any + Send + Sync>;

const EVENT_CANCEL: &str = "cancel";
const EVENT_DECISION_SENT: &str = "handleDecisionSent";
const EVENT_INITIATED: &str = "handleInitiatedEvent";
const EVENT_INITIATION_FAILED: &str = "handleInitiationFailedEvent";
const EVENT_STARTED: &str = "handleStartedEvent";
const EVENT_COMPLETION: &str = "handleCompletionEvent";
const EVENT_CANCEL_INITIATED: &str = "handleCancelInitiatedEvent";
const EVENT_CANCEL_FAILED: &str = "handleCancelFailedEvent";
const EVENT_CANCELED: &str = "handleCanceledEvent";

/// State and diagnostics shared by every machine variant.
pub struct StateMachineBase {
    id: DecisionId,
    state: DecisionState,
    history: Vec<String>,
    data: Option<MachineData>,
}

impl StateMachineBase {
    fn new(kind: DecisionKind, id: impl Into<String>) -> Self {
        Self {
            id: DecisionId::new(kind, id),
            state: DecisionState::Created,
            history: vec![DecisionState::Created.to_string()],
            data: None,
        }
    }

    fn move_state(&mut self, new_state: DecisionState, event: &str) {
        self.history.push(event.to_string());
        self.state = new_state;
        self.history.push(new_state.to_string());
    }

    fn describe(&self) -> String {
        format!(
            "{}, state={}, history={:?}",
            self.id, self.state, self.history
        )
    }

    fn fail_state_transition(&self, event: &str) -> ! {
        // Ill history sequence or nondeterministic decider code.
        panic_illegal_state(format!(
            "invalid state transition: attempt to {event}, {}",
            self.describe()
        ))
    }

    fn cancel_base(&mut self) {
        match self.state {
            // Cancelling after completion is legit: scopes get cancelled
            // after timers and activities are already done.
            DecisionState::Completed | DecisionState::CompletedAfterCancellationDecisionSent => {}
            DecisionState::Created => self.move_state(DecisionState::Completed, EVENT_CANCEL),
            DecisionState::DecisionSent => {
                self.move_state(DecisionState::CanceledBeforeInitiated, EVENT_CANCEL)
            }
            DecisionState::Initiated => {
                self.move_state(DecisionState::CanceledAfterInitiated, EVENT_CANCEL)
            }
            _ => self.fail_state_transition(EVENT_CANCEL),
        }
    }

    fn handle_decision_sent_base(&mut self) {
        if self.state == DecisionState::Created {
            self.move_state(DecisionState::DecisionSent, EVENT_DECISION_SENT);
        }
    }

    fn handle_initiated_base(&mut self) {
        match self.state {
            DecisionState::DecisionSent => {
                self.move_state(DecisionState::Initiated, EVENT_INITIATED)
            }
            DecisionState::CanceledBeforeInitiated => {
                self.move_state(DecisionState::CanceledAfterInitiated, EVENT_INITIATED)
            }
            _ => self.fail_state_transition(EVENT_INITIATED),
        }
    }

    fn handle_initiation_failed_base(&mut self) {
        match self.state {
            DecisionState::Initiated
            | DecisionState::DecisionSent
            | DecisionState::CanceledBeforeInitiated => {
                self.move_state(DecisionState::Completed, EVENT_INITIATION_FAILED)
            }
            _ => self.fail_state_transition(EVENT_INITIATION_FAILED),
        }
    }

    fn handle_started_base(&mut self) {
        self.history.push(EVENT_STARTED.to_string());
    }

    fn handle_completion_base(&mut self) {
        match self.state {
            DecisionState::CanceledAfterInitiated | DecisionState::Initiated => {
                self.move_state(DecisionState::Completed, EVENT_COMPLETION)
            }
            DecisionState::CancellationDecisionSent => self.move_state(
                DecisionState::CompletedAfterCancellationDecisionSent,
                EVENT_COMPLETION,
            ),
            _ => self.fail_state_transition(EVENT_COMPLETION),
        }
    }

    fn handle_cancel_initiated_base(&mut self) {
        self.history.push(EVENT_CANCEL_INITIATED.to_string());
        match self.state {
            DecisionState::CancellationDecisionSent => {} // no state change
            _ => self.fail_state_transition(EVENT_CANCEL_INITIATED),
        }
    }

    fn handle_cancel_failed_base(&mut self) {
        match self.state {
            DecisionState::CompletedAfterCancellationDecisionSent => {
                self.move_state(DecisionState::Completed, EVENT_CANCEL_FAILED)
            }
            _ => self.fail_state_transition(EVENT_CANCEL_FAILED),
        }
    }

    fn handle_canceled_base(&mut self) {
        match self.state {
            DecisionState::CancellationDecisionSent => {
                self.move_state(DecisionState::Completed, EVENT_CANCELED)
            }
            _ => self.fail_state_transition(EVENT_CANCELED),
        }
    }
}

/// One decision state machine. Default methods carry the shared state
/// space; variants override only where their transition table differs.
pub trait DecisionStateMachine: Send {
    fn base(&self) -> &StateMachineBase;
    fn base_mut(&mut self) -> &mut StateMachineBase;

    /// The decision to emit in the current state, if any.
    fn get_decision(&self) -> Option<Decision>;

    fn state(&self) -> DecisionState {
        self.base().state
    }

    fn id(&self) -> &DecisionId {
        &self.base().id
    }

    fn is_done(&self) -> bool {
        matches!(
            self.state(),
            DecisionState::Completed | DecisionState::CompletedAfterCancellationDecisionSent
        )
    }

    fn data(&self) -> Option<MachineData> {
        self.base().data.clone()
    }

    fn set_data(&mut self, data: MachineData) {
        self.base_mut().data = Some(data);
    }

    /// State trail for diagnostics.
    fn trail(&self) -> Vec<String> {
        self.base().history.clone()
    }

    fn cancel(&mut self) {
        self.base_mut().cancel_base()
    }

    fn handle_decision_sent(&mut self) {
        self.base_mut().handle_decision_sent_base()
    }

    fn handle_initiated_event(&mut self) {
        self.base_mut().handle_initiated_base()
    }

    fn handle_initiation_failed_event(&mut self) {
        self.base_mut().handle_initiation_failed_base()
    }

    fn handle_started_event(&mut self) {
        self.base_mut().handle_started_base()
    }

    fn handle_completion_event(&mut self) {
        self.base_mut().handle_completion_base()
    }

    fn handle_cancel_initiated_event(&mut self) {
        self.base_mut().handle_cancel_initiated_base()
    }

    fn handle_cancel_failed_event(&mut self) {
        self.base_mut().handle_cancel_failed_base()
    }

    fn handle_canceled_event(&mut self) {
        self.base_mut().handle_canceled_base()
    }
}

/// Machine for a scheduled activity.
pub struct ActivityStateMachine {
    base: StateMachineBase,
    attributes: ScheduleActivityTaskDecisionAttributes,
}

impl ActivityStateMachine {
    fn new(attributes: ScheduleActivityTaskDecisionAttributes) -> Self {
        Self {
            base: StateMachineBase::new(DecisionKind::Activity, attributes.activity_id.clone()),
            attributes,
        }
    }
}

impl DecisionStateMachine for ActivityStateMachine {
    fn base(&self) -> &StateMachineBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut StateMachineBase {
        &mut self.base
    }

    fn get_decision(&self) -> Option<Decision> {
        match self.base.state {
            DecisionState::Created => Some(Decision::ScheduleActivityTask(Box::new(
                self.attributes.clone(),
            ))),
            DecisionState::CanceledAfterInitiated => Some(Decision::RequestCancelActivityTask(
                Box::new(RequestCancelActivityTaskDecisionAttributes {
                    activity_id: self.attributes.activity_id.clone(),
                }),
            )),
            _ => None,
        }
    }

    fn handle_decision_sent(&mut self) {
        match self.base.state {
            DecisionState::CanceledAfterInitiated => self
                .base
                .move_state(DecisionState::CancellationDecisionSent, EVENT_DECISION_SENT),
            _ => self.base.handle_decision_sent_base(),
        }
    }

    fn handle_cancel_failed_event(&mut self) {
        match self.base.state {
            // Cancel raced the activity finishing: back to in flight.
            DecisionState::CancellationDecisionSent => self
                .base
                .move_state(DecisionState::Initiated, EVENT_CANCEL_FAILED),
            _ => self.base.handle_cancel_failed_base(),
        }
    }
}

/// Machine for a started timer.
pub struct TimerStateMachine {
    base: StateMachineBase,
    attributes: StartTimerDecisionAttributes,
    canceled: bool,
}

impl TimerStateMachine {
    fn new(attributes: StartTimerDecisionAttributes) -> Self {
        Self {
            base: StateMachineBase::new(DecisionKind::Timer, attributes.timer_id.clone()),
            attributes,
            canceled: false,
        }
    }
}

impl DecisionStateMachine for TimerStateMachine {
    fn base(&self) -> &StateMachineBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut StateMachineBase {
        &mut self.base
    }

    /// A cancelled timer is done from the workflow's point of view even
    /// before the server acknowledges the cancellation.
    fn is_done(&self) -> bool {
        self.base.state == DecisionState::Completed || self.canceled
    }

    fn get_decision(&self) -> Option<Decision> {
        match self.base.state {
            DecisionState::Created => {
                Some(Decision::StartTimer(Box::new(self.attributes.clone())))
            }
            DecisionState::CanceledAfterInitiated => Some(Decision::CancelTimer(Box::new(
                CancelTimerDecisionAttributes {
                    timer_id: self.attributes.timer_id.clone(),
                },
            ))),
            _ => None,
        }
    }

    fn cancel(&mut self) {
        self.canceled = true;
        self.base.cancel_base();
    }

    fn handle_decision_sent(&mut self) {
        match self.base.state {
            DecisionState::CanceledAfterInitiated => self
                .base
                .move_state(DecisionState::CancellationDecisionSent, EVENT_DECISION_SENT),
            _ => self.base.handle_decision_sent_base(),
        }
    }

    fn handle_cancel_failed_event(&mut self) {
        match self.base.state {
            // Timer fired before the cancel reached it.
            DecisionState::CancellationDecisionSent => self
                .base
                .move_state(DecisionState::Initiated, EVENT_CANCEL_FAILED),
            _ => self.base.handle_cancel_failed_base(),
        }
    }
}

/// Machine for a child workflow, with a Started sub-state between
/// Initiated and Completed.
pub struct ChildWorkflowStateMachine {
    base: StateMachineBase,
    attributes: StartChildWorkflowExecutionDecisionAttributes,
}

impl ChildWorkflowStateMachine {
    fn new(attributes: StartChildWorkflowExecutionDecisionAttributes) -> Self {
        Self {
            base: StateMachineBase::new(DecisionKind::ChildWorkflow, attributes.workflow_id.clone()),
            attributes,
        }
    }
}

impl DecisionStateMachine for ChildWorkflowStateMachine {
    fn base(&self) -> &StateMachineBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut StateMachineBase {
        &mut self.base
    }

    fn get_decision(&self) -> Option<Decision> {
        match self.base.state {
            DecisionState::Created => Some(Decision::StartChildWorkflowExecution(Box::new(
                self.attributes.clone(),
            ))),
            // Cancelling a running child goes through the external-cancel
            // decision, addressed by workflow id only: the child may have
            // continued-as-new under a different run id.
            DecisionState::CanceledAfterStarted => {
                Some(Decision::RequestCancelExternalWorkflowExecution(Box::new(
                    RequestCancelExternalWorkflowExecutionDecisionAttributes {
                        domain: self.attributes.domain.clone(),
                        workflow_execution: WorkflowExecution::new(
                            self.attributes.workflow_id.clone(),
                            "",
                        ),
                        control: None,
                        child_workflow_only: true,
                    },
                )))
            }
            _ => None,
        }
    }

    fn cancel(&mut self) {
        match self.base.state {
            DecisionState::Started => self
                .base
                .move_state(DecisionState::CanceledAfterStarted, EVENT_CANCEL),
            _ => self.base.cancel_base(),
        }
    }

    fn handle_decision_sent(&mut self) {
        match self.base.state {
            DecisionState::CanceledAfterStarted => self
                .base
                .move_state(DecisionState::CancellationDecisionSent, EVENT_DECISION_SENT),
            _ => self.base.handle_decision_sent_base(),
        }
    }

    fn handle_started_event(&mut self) {
        match self.base.state {
            DecisionState::Initiated => {
                self.base.move_state(DecisionState::Started, EVENT_STARTED)
            }
            DecisionState::CanceledAfterInitiated => self
                .base
                .move_state(DecisionState::CanceledAfterStarted, EVENT_STARTED),
            _ => self.base.handle_started_base(),
        }
    }

    fn handle_completion_event(&mut self) {
        match self.base.state {
            DecisionState::Started | DecisionState::CanceledAfterStarted => {
                self.base.move_state(DecisionState::Completed, EVENT_COMPLETION)
            }
            _ => self.base.handle_completion_base(),
        }
    }

    fn handle_canceled_event(&mut self) {
        match self.base.state {
            DecisionState::Started => {
                self.base.move_state(DecisionState::Completed, EVENT_CANCELED)
            }
            _ => self.base.handle_canceled_base(),
        }
    }

    fn handle_cancel_failed_event(&mut self) {
        match self.base.state {
            DecisionState::CancellationDecisionSent => {
                self.base.move_state(DecisionState::Started, EVENT_CANCEL_FAILED)
            }
            _ => self.base.handle_cancel_failed_base(),
        }
    }
}

/// Machine whose decision payload is fixed at creation and which has no
/// cancel path. External cancels, external signals, markers, and
/// search-attribute upserts build on this.
struct NaiveStateMachine {
    base: StateMachineBase,
    decision: Decision,
}

impl NaiveStateMachine {
    fn new(kind: DecisionKind, id: impl Into<String>, decision: Decision) -> Self {
        Self {
            base: StateMachineBase::new(kind, id),
            decision,
        }
    }

    fn get_decision_if_created(&self) -> Option<Decision> {
        match self.base.state {
            DecisionState::Created => Some(self.decision.clone()),
            _ => None,
        }
    }

    fn unsupported(&self, operation: &str) -> ! {
        panic_illegal_state(format!(
            "unsupported operation {operation} on {}",
            self.base.describe()
        ))
    }
}

/// Cancellation of an external workflow: Created, Sent, Initiated,
/// Completed, nothing else.
pub struct CancelExternalWorkflowStateMachine {
    inner: NaiveStateMachine,
}

impl CancelExternalWorkflowStateMachine {
    fn new(
        attributes: RequestCancelExternalWorkflowExecutionDecisionAttributes,
        cancellation_id: String,
    ) -> Self {
        let decision = Decision::RequestCancelExternalWorkflowExecution(Box::new(attributes));
        Self {
            inner: NaiveStateMachine::new(DecisionKind::Cancellation, cancellation_id, decision),
        }
    }
}

impl DecisionStateMachine for CancelExternalWorkflowStateMachine {
    fn base(&self) -> &StateMachineBase {
        &self.inner.base
    }

    fn base_mut(&mut self) -> &mut StateMachineBase {
        &mut self.inner.base
    }

    fn get_decision(&self) -> Option<Decision> {
        self.inner.get_decision_if_created()
    }

    fn cancel(&mut self) {
        self.inner.unsupported("cancel")
    }

    fn handle_initiated_event(&mut self) {
        match self.inner.base.state {
            DecisionState::DecisionSent => self
                .inner
                .base
                .move_state(DecisionState::Initiated, EVENT_INITIATED),
            _ => self.inner.base.fail_state_transition(EVENT_INITIATED),
        }
    }

    fn handle_completion_event(&mut self) {
        match self.inner.base.state {
            DecisionState::Initiated => self
                .inner
                .base
                .move_state(DecisionState::Completed, EVENT_COMPLETION),
            _ => self.inner.base.fail_state_transition(EVENT_COMPLETION),
        }
    }

    fn handle_initiation_failed_event(&mut self) {
        self.inner.unsupported(EVENT_INITIATION_FAILED)
    }

    fn handle_started_event(&mut self) {
        self.inner.unsupported(EVENT_STARTED)
    }

    fn handle_cancel_initiated_event(&mut self) {
        self.inner.unsupported(EVENT_CANCEL_INITIATED)
    }

    fn handle_cancel_failed_event(&mut self) {
        self.inner.unsupported(EVENT_CANCEL_FAILED)
    }

    fn handle_canceled_event(&mut self) {
        self.inner.unsupported(EVENT_CANCELED)
    }
}

/// Signal to an external workflow. Same linear lifecycle as the external
/// cancel, keyed by signal id.
pub struct SignalExternalWorkflowStateMachine {
    inner: NaiveStateMachine,
}

impl SignalExternalWorkflowStateMachine {
    fn new(
        attributes: SignalExternalWorkflowExecutionDecisionAttributes,
        signal_id: String,
    ) -> Self {
        let decision = Decision::SignalExternalWorkflowExecution(Box::new(attributes));
        Self {
            inner: NaiveStateMachine::new(DecisionKind::Signal, signal_id, decision),
        }
    }
}

impl DecisionStateMachine for SignalExternalWorkflowStateMachine {
    fn base(&self) -> &StateMachineBase {
        &self.inner.base
    }

    fn base_mut(&mut self) -> &mut StateMachineBase {
        &mut self.inner.base
    }

    fn get_decision(&self) -> Option<Decision> {
        self.inner.get_decision_if_created()
    }

    fn cancel(&mut self) {
        self.inner.unsupported("cancel")
    }

    fn handle_initiated_event(&mut self) {
        match self.inner.base.state {
            DecisionState::DecisionSent => self
                .inner
                .base
                .move_state(DecisionState::Initiated, EVENT_INITIATED),
            _ => self.inner.base.fail_state_transition(EVENT_INITIATED),
        }
    }

    fn handle_completion_event(&mut self) {
        match self.inner.base.state {
            DecisionState::Initiated => self
                .inner
                .base
                .move_state(DecisionState::Completed, EVENT_COMPLETION),
            _ => self.inner.base.fail_state_transition(EVENT_COMPLETION),
        }
    }

    fn handle_initiation_failed_event(&mut self) {
        self.inner.unsupported(EVENT_INITIATION_FAILED)
    }

    fn handle_started_event(&mut self) {
        self.inner.unsupported(EVENT_STARTED)
    }

    fn handle_cancel_initiated_event(&mut self) {
        self.inner.unsupported(EVENT_CANCEL_INITIATED)
    }

    fn handle_cancel_failed_event(&mut self) {
        self.inner.unsupported(EVENT_CANCEL_FAILED)
    }

    fn handle_canceled_event(&mut self) {
        self.inner.unsupported(EVENT_CANCELED)
    }
}

/// Marker machine. Complete as soon as the decision is sent: markers get
/// no server confirmation, and marker history events are preloaded into
/// caches before workflow code runs, so nothing else drives this machine.
pub struct MarkerStateMachine {
    inner: NaiveStateMachine,
}

impl MarkerStateMachine {
    fn new(marker_id: String, attributes: RecordMarkerDecisionAttributes) -> Self {
        let decision = Decision::RecordMarker(Box::new(attributes));
        Self {
            inner: NaiveStateMachine::new(DecisionKind::Marker, marker_id, decision),
        }
    }
}

impl DecisionStateMachine for MarkerStateMachine {
    fn base(&self) -> &StateMachineBase {
        &self.inner.base
    }

    fn base_mut(&mut self) -> &mut StateMachineBase {
        &mut self.inner.base
    }

    fn get_decision(&self) -> Option<Decision> {
        self.inner.get_decision_if_created()
    }

    fn cancel(&mut self) {
        self.inner.unsupported("cancel")
    }

    fn handle_decision_sent(&mut self) {
        if self.inner.base.state == DecisionState::Created {
            self.inner
                .base
                .move_state(DecisionState::Completed, EVENT_DECISION_SENT);
        }
    }

    fn handle_initiated_event(&mut self) {
        self.inner.unsupported(EVENT_INITIATED)
    }

    fn handle_initiation_failed_event(&mut self) {
        self.inner.unsupported(EVENT_INITIATION_FAILED)
    }

    fn handle_started_event(&mut self) {
        self.inner.unsupported(EVENT_STARTED)
    }

    fn handle_completion_event(&mut self) {
        self.inner.unsupported(EVENT_COMPLETION)
    }

    fn handle_cancel_initiated_event(&mut self) {
        self.inner.unsupported(EVENT_CANCEL_INITIATED)
    }

    fn handle_cancel_failed_event(&mut self) {
        self.inner.unsupported(EVENT_CANCEL_FAILED)
    }

    fn handle_canceled_event(&mut self) {
        self.inner.unsupported(EVENT_CANCELED)
    }
}

/// Search-attribute upsert machine. Complete once the decision is sent.
pub struct UpsertSearchAttributesStateMachine {
    inner: NaiveStateMachine,
}

impl UpsertSearchAttributesStateMachine {
    fn new(upsert_id: String, attributes: UpsertWorkflowSearchAttributesDecisionAttributes) -> Self {
        let decision = Decision::UpsertWorkflowSearchAttributes(Box::new(attributes));
        Self {
            inner: NaiveStateMachine::new(DecisionKind::UpsertSearchAttributes, upsert_id, decision),
        }
    }
}

impl DecisionStateMachine for UpsertSearchAttributesStateMachine {
    fn base(&self) -> &StateMachineBase {
        &self.inner.base
    }

    fn base_mut(&mut self) -> &mut StateMachineBase {
        &mut self.inner.base
    }

    fn get_decision(&self) -> Option<Decision> {
        self.inner.get_decision_if_created()
    }

    fn cancel(&mut self) {
        self.inner.unsupported("cancel")
    }

    fn handle_decision_sent(&mut self) {
        if self.inner.base.state == DecisionState::Created {
            self.inner
                .base
                .move_state(DecisionState::Completed, EVENT_DECISION_SENT);
        }
    }

    fn handle_initiated_event(&mut self) {
        self.inner.unsupported(EVENT_INITIATED)
    }

    fn handle_initiation_failed_event(&mut self) {
        self.inner.unsupported(EVENT_INITIATION_FAILED)
    }

    fn handle_started_event(&mut self) {
        self.inner.unsupported(EVENT_STARTED)
    }

    fn handle_completion_event(&mut self) {
        self.inner.unsupported(EVENT_COMPLETION)
    }

    fn handle_cancel_initiated_event(&mut self) {
        self.inner.unsupported(EVENT_CANCEL_INITIATED)
    }

    fn handle_cancel_failed_event(&mut self) {
        self.inner.unsupported(EVENT_CANCEL_FAILED)
    }

    fn handle_canceled_event(&mut self) {
        self.inner.unsupported(EVENT_CANCELED)
    }
}

/// Snapshot returned by helper operations so the environment can reach the
/// attached waiter and observe the post-transition state even when the
/// machine completed and was dropped from the collection.
pub struct MachineTouch {
    pub data: Option<MachineData>,
    pub state: DecisionState,
    pub done: bool,
}

/// Insertion-ordered collection of every outstanding machine of one
/// workflow, plus the event-id lookup maps and the close-of-workflow
/// decision.
///
/// Any history-event touch moves the machine to the end of the order
/// before the transition runs. Pending decisions are emitted in this
/// order, which keeps timer-cancel and marker interleavings stable across
/// replays.
pub struct DecisionsHelper {
    order: Vec<DecisionId>,
    machines: HashMap<DecisionId, Box<dyn DecisionStateMachine>>,

    scheduled_event_id_to_activity_id: HashMap<i64, String>,
    scheduled_event_id_to_cancellation_id: HashMap<i64, String>,
    scheduled_event_id_to_signal_id: HashMap<i64, String>,

    close_decision: Option<Decision>,
}

impl DecisionsHelper {
    pub fn new() -> Self {
        Self {
            order: Vec::new(),
            machines: HashMap::new(),
            scheduled_event_id_to_activity_id: HashMap::new(),
            scheduled_event_id_to_cancellation_id: HashMap::new(),
            scheduled_event_id_to_signal_id: HashMap::new(),
            close_decision: None,
        }
    }

    fn add(&mut self, machine: Box<dyn DecisionStateMachine>) {
        let id = machine.id().clone();
        if self.machines.contains_key(&id) {
            panic_illegal_state(format!("adding duplicate decision {id}"));
        }
        self.order.push(id.clone());
        self.machines.insert(id, machine);
    }

    fn promote(&mut self, id: &DecisionId) {
        if let Some(pos) = self.order.iter().position(|d| d == id) {
            let entry = self.order.remove(pos);
            self.order.push(entry);
        }
    }

    /// Touch a machine: promote it to the end of the order, apply the
    /// transition, and drop it from the collection once completed.
    fn touch(
        &mut self,
        id: &DecisionId,
        f: impl FnOnce(&mut dyn DecisionStateMachine),
    ) -> MachineTouch {
        self.promote(id);
        let mut machine = match self.machines.remove(id) {
            Some(machine) => machine,
            None => panic_illegal_state(format!(
                "unknown decision {id}, possible causes are nondeterministic workflow definition \
                 code or incompatible change in the workflow definition"
            )),
        };
        f(machine.as_mut());
        let touch = MachineTouch {
            data: machine.data(),
            state: machine.state(),
            done: machine.is_done(),
        };
        if machine.state() == DecisionState::Completed {
            self.order.retain(|d| d != id);
        } else {
            self.machines.insert(id.clone(), machine);
        }
        touch
    }

    /// Read-only state peek, used by tests and diagnostics. Does not
    /// promote.
    pub fn machine_state(&self, id: &DecisionId) -> Option<DecisionState> {
        self.machines.get(id).map(|m| m.state())
    }

    /// Diagnostics trail of a live machine.
    pub fn machine_trail(&self, id: &DecisionId) -> Option<Vec<String>> {
        self.machines.get(id).map(|m| m.trail())
    }

    pub fn has_machine(&self, id: &DecisionId) -> bool {
        self.machines.contains_key(id)
    }

    // ---- activities ----

    pub fn schedule_activity_task(
        &mut self,
        attributes: ScheduleActivityTaskDecisionAttributes,
        data: MachineData,
    ) {
        let mut machine = Box::new(ActivityStateMachine::new(attributes));
        machine.set_data(data);
        self.add(machine);
    }

    pub fn request_cancel_activity_task(&mut self, activity_id: &str) -> MachineTouch {
        let id = DecisionId::new(DecisionKind::Activity, activity_id);
        self.touch(&id, |m| m.cancel())
    }

    pub fn handle_activity_task_scheduled(&mut self, scheduled_event_id: i64, activity_id: &str) {
        self.scheduled_event_id_to_activity_id
            .insert(scheduled_event_id, activity_id.to_string());
        let id = DecisionId::new(DecisionKind::Activity, activity_id);
        self.touch(&id, |m| m.handle_initiated_event());
    }

    pub fn handle_activity_task_closed(&mut self, activity_id: &str) -> MachineTouch {
        let id = DecisionId::new(DecisionKind::Activity, activity_id);
        self.touch(&id, |m| m.handle_completion_event())
    }

    pub fn handle_activity_task_canceled(&mut self, activity_id: &str) -> MachineTouch {
        let id = DecisionId::new(DecisionKind::Activity, activity_id);
        self.touch(&id, |m| m.handle_canceled_event())
    }

    pub fn handle_activity_task_cancel_requested(&mut self, activity_id: &str) {
        let id = DecisionId::new(DecisionKind::Activity, activity_id);
        self.touch(&id, |m| m.handle_cancel_initiated_event());
    }

    pub fn handle_request_cancel_activity_task_failed(&mut self, activity_id: &str) {
        let id = DecisionId::new(DecisionKind::Activity, activity_id);
        self.touch(&id, |m| m.handle_cancel_failed_event());
    }

    /// Resolve an activity completion event to its activity id through the
    /// scheduled-event-id map.
    pub fn activity_id_for_event(&self, event: &HistoryEvent) -> String {
        let scheduled_event_id = match &event.attributes {
            EventAttributes::ActivityTaskCompleted(a) => a.scheduled_event_id,
            EventAttributes::ActivityTaskFailed(a) => a.scheduled_event_id,
            EventAttributes::ActivityTaskTimedOut(a) => a.scheduled_event_id,
            EventAttributes::ActivityTaskCanceled(a) => a.scheduled_event_id,
            _ => panic_illegal_state(format!(
                "unexpected event type {} while resolving activity id",
                event.type_name()
            )),
        };
        match self.scheduled_event_id_to_activity_id.get(&scheduled_event_id) {
            Some(activity_id) => activity_id.clone(),
            None => panic_illegal_state(format!(
                "unable to find activity ID for event {} (scheduled event id {scheduled_event_id})",
                event.event_id
            )),
        }
    }

    // ---- timers ----

    pub fn start_timer(&mut self, attributes: StartTimerDecisionAttributes, data: MachineData) {
        let mut machine = Box::new(TimerStateMachine::new(attributes));
        machine.set_data(data);
        self.add(machine);
    }

    pub fn cancel_timer(&mut self, timer_id: &str) -> MachineTouch {
        let id = DecisionId::new(DecisionKind::Timer, timer_id);
        self.touch(&id, |m| m.cancel())
    }

    pub fn handle_timer_started(&mut self, timer_id: &str) {
        let id = DecisionId::new(DecisionKind::Timer, timer_id);
        self.touch(&id, |m| m.handle_initiated_event());
    }

    pub fn handle_timer_closed(&mut self, timer_id: &str) -> MachineTouch {
        let id = DecisionId::new(DecisionKind::Timer, timer_id);
        self.touch(&id, |m| m.handle_completion_event())
    }

    pub fn handle_timer_canceled(&mut self, timer_id: &str) {
        let id = DecisionId::new(DecisionKind::Timer, timer_id);
        self.touch(&id, |m| m.handle_canceled_event());
    }

    pub fn handle_cancel_timer_failed(&mut self, timer_id: &str) {
        let id = DecisionId::new(DecisionKind::Timer, timer_id);
        self.touch(&id, |m| m.handle_cancel_failed_event());
    }

    // ---- child workflows ----

    pub fn start_child_workflow_execution(
        &mut self,
        attributes: StartChildWorkflowExecutionDecisionAttributes,
        data: MachineData,
    ) {
        let mut machine = Box::new(ChildWorkflowStateMachine::new(attributes));
        machine.set_data(data);
        self.add(machine);
    }

    pub fn handle_start_child_workflow_execution_initiated(&mut self, workflow_id: &str) {
        let id = DecisionId::new(DecisionKind::ChildWorkflow, workflow_id);
        self.touch(&id, |m| m.handle_initiated_event());
    }

    pub fn handle_start_child_workflow_execution_failed(
        &mut self,
        workflow_id: &str,
    ) -> MachineTouch {
        let id = DecisionId::new(DecisionKind::ChildWorkflow, workflow_id);
        self.touch(&id, |m| m.handle_initiation_failed_event())
    }

    pub fn handle_child_workflow_execution_started(&mut self, workflow_id: &str) -> MachineTouch {
        let id = DecisionId::new(DecisionKind::ChildWorkflow, workflow_id);
        self.touch(&id, |m| m.handle_started_event())
    }

    pub fn handle_child_workflow_execution_closed(&mut self, workflow_id: &str) -> MachineTouch {
        let id = DecisionId::new(DecisionKind::ChildWorkflow, workflow_id);
        self.touch(&id, |m| m.handle_completion_event())
    }

    pub fn handle_child_workflow_execution_canceled(&mut self, workflow_id: &str) -> MachineTouch {
        let id = DecisionId::new(DecisionKind::ChildWorkflow, workflow_id);
        self.touch(&id, |m| m.handle_canceled_event())
    }

    // ---- external workflow cancellation ----

    /// The control field of a cancel-initiated event is empty exactly when
    /// the request targeted a child workflow, which is tracked through its
    /// own machine.
    pub fn is_cancel_event_for_child_workflow(cancellation_id: &str) -> bool {
        cancellation_id.is_empty()
    }

    pub fn request_cancel_external_workflow_execution(
        &mut self,
        domain: &str,
        workflow_id: &str,
        run_id: &str,
        cancellation_id: &str,
        child_workflow_only: bool,
        data: Option<MachineData>,
    ) -> MachineTouch {
        if child_workflow_only {
            // Child cancellation reuses the child machine, addressed by
            // workflow id. Run id is not used: continue-as-new changes it.
            if !cancellation_id.is_empty() {
                panic_illegal_state(
                    "cancellation of child workflow should not use cancellation ID".into(),
                );
            }
            if !run_id.is_empty() {
                panic_illegal_state("cancellation of child workflow should not use run ID".into());
            }
            let id = DecisionId::new(DecisionKind::ChildWorkflow, workflow_id);
            return self.touch(&id, |m| m.cancel());
        }

        // External cancellation needs a generated cancellation id to match
        // the request decision with its response events.
        if cancellation_id.is_empty() {
            panic_illegal_state("cancellation of external workflow should use cancellation ID".into());
        }
        let attributes = RequestCancelExternalWorkflowExecutionDecisionAttributes {
            domain: domain.to_string(),
            workflow_execution: WorkflowExecution::new(workflow_id, run_id),
            control: Some(cancellation_id.to_string()),
            child_workflow_only: false,
        };
        let mut machine = Box::new(CancelExternalWorkflowStateMachine::new(
            attributes,
            cancellation_id.to_string(),
        ));
        if let Some(data) = data {
            machine.set_data(data);
        }
        let touch = MachineTouch {
            data: machine.data(),
            state: machine.state(),
            done: machine.is_done(),
        };
        self.add(machine);
        touch
    }

    pub fn handle_request_cancel_external_workflow_execution_initiated(
        &mut self,
        initiated_event_id: i64,
        workflow_id: &str,
        cancellation_id: &str,
    ) {
        if Self::is_cancel_event_for_child_workflow(cancellation_id) {
            let id = DecisionId::new(DecisionKind::ChildWorkflow, workflow_id);
            self.touch(&id, |m| m.handle_cancel_initiated_event());
        } else {
            self.scheduled_event_id_to_cancellation_id
                .insert(initiated_event_id, cancellation_id.to_string());
            let id = DecisionId::new(DecisionKind::Cancellation, cancellation_id);
            self.touch(&id, |m| m.handle_initiated_event());
        }
    }

    /// Returns whether the event belonged to an external cancellation (as
    /// opposed to a child workflow cancellation) and the touched machine.
    pub fn handle_external_workflow_execution_cancel_requested(
        &mut self,
        initiated_event_id: i64,
        workflow_id: &str,
    ) -> (bool, MachineTouch) {
        match self
            .scheduled_event_id_to_cancellation_id
            .get(&initiated_event_id)
            .cloned()
        {
            Some(cancellation_id) => {
                let id = DecisionId::new(DecisionKind::Cancellation, &cancellation_id);
                (true, self.touch(&id, |m| m.handle_completion_event()))
            }
            None => {
                // Child workflow: no state change, it stays in
                // CancellationDecisionSent until the child closes.
                let id = DecisionId::new(DecisionKind::ChildWorkflow, workflow_id);
                (false, self.touch(&id, |_| {}))
            }
        }
    }

    pub fn handle_request_cancel_external_workflow_execution_failed(
        &mut self,
        initiated_event_id: i64,
        workflow_id: &str,
    ) -> (bool, MachineTouch) {
        match self
            .scheduled_event_id_to_cancellation_id
            .get(&initiated_event_id)
            .cloned()
        {
            Some(cancellation_id) => {
                let id = DecisionId::new(DecisionKind::Cancellation, &cancellation_id);
                (true, self.touch(&id, |m| m.handle_completion_event()))
            }
            None => {
                let id = DecisionId::new(DecisionKind::ChildWorkflow, workflow_id);
                (false, self.touch(&id, |m| m.handle_cancel_failed_event()))
            }
        }
    }

    // ---- external workflow signals ----

    #[allow(clippy::too_many_arguments)]
    pub fn signal_external_workflow_execution(
        &mut self,
        domain: &str,
        workflow_id: &str,
        run_id: &str,
        signal_name: &str,
        input: Vec<u8>,
        signal_id: &str,
        child_workflow_only: bool,
        data: MachineData,
    ) {
        let attributes = SignalExternalWorkflowExecutionDecisionAttributes {
            domain: domain.to_string(),
            workflow_execution: WorkflowExecution::new(workflow_id, run_id),
            signal_name: signal_name.to_string(),
            input: Some(input),
            control: Some(signal_id.to_string()),
            child_workflow_only,
        };
        let mut machine = Box::new(SignalExternalWorkflowStateMachine::new(
            attributes,
            signal_id.to_string(),
        ));
        machine.set_data(data);
        self.add(machine);
    }

    pub fn handle_signal_external_workflow_execution_initiated(
        &mut self,
        initiated_event_id: i64,
        signal_id: &str,
    ) {
        self.scheduled_event_id_to_signal_id
            .insert(initiated_event_id, signal_id.to_string());
        let id = DecisionId::new(DecisionKind::Signal, signal_id);
        self.touch(&id, |m| m.handle_initiated_event());
    }

    pub fn handle_signal_external_workflow_execution_completed(
        &mut self,
        initiated_event_id: i64,
    ) -> MachineTouch {
        let signal_id = self.signal_id_for_event(initiated_event_id);
        let id = DecisionId::new(DecisionKind::Signal, &signal_id);
        self.touch(&id, |m| m.handle_completion_event())
    }

    pub fn handle_signal_external_workflow_execution_failed(
        &mut self,
        initiated_event_id: i64,
    ) -> MachineTouch {
        let signal_id = self.signal_id_for_event(initiated_event_id);
        let id = DecisionId::new(DecisionKind::Signal, &signal_id);
        self.touch(&id, |m| m.handle_completion_event())
    }

    fn signal_id_for_event(&self, initiated_event_id: i64) -> String {
        match self.scheduled_event_id_to_signal_id.get(&initiated_event_id) {
            Some(signal_id) => signal_id.clone(),
            None => panic_illegal_state(format!(
                "unable to find signal ID for initiated event {initiated_event_id}"
            )),
        }
    }

    // ---- markers and search attributes ----

    pub fn record_side_effect_marker(&mut self, side_effect_id: i32, details: Vec<u8>) {
        let marker_id = format!("{SIDE_EFFECT_MARKER_NAME}_{side_effect_id}");
        let attributes = RecordMarkerDecisionAttributes {
            marker_name: SIDE_EFFECT_MARKER_NAME.to_string(),
            details: Some(details),
            header: None,
        };
        self.add(Box::new(MarkerStateMachine::new(marker_id, attributes)));
    }

    pub fn record_version_marker(&mut self, change_id: &str, details: Vec<u8>) {
        let marker_id = format!("{VERSION_MARKER_NAME}_{change_id}");
        let attributes = RecordMarkerDecisionAttributes {
            marker_name: VERSION_MARKER_NAME.to_string(),
            details: Some(details),
            header: None,
        };
        self.add(Box::new(MarkerStateMachine::new(marker_id, attributes)));
    }

    pub fn record_local_activity_marker(&mut self, activity_id: &str, details: Vec<u8>) {
        let marker_id = format!("{LOCAL_ACTIVITY_MARKER_NAME}_{activity_id}");
        let attributes = RecordMarkerDecisionAttributes {
            marker_name: LOCAL_ACTIVITY_MARKER_NAME.to_string(),
            details: Some(details),
            header: None,
        };
        self.add(Box::new(MarkerStateMachine::new(marker_id, attributes)));
    }

    pub fn record_mutable_side_effect_marker(&mut self, mutable_side_effect_id: &str, details: Vec<u8>) {
        let marker_id = format!("{MUTABLE_SIDE_EFFECT_MARKER_NAME}_{mutable_side_effect_id}");
        let attributes = RecordMarkerDecisionAttributes {
            marker_name: MUTABLE_SIDE_EFFECT_MARKER_NAME.to_string(),
            details: Some(details),
            header: None,
        };
        self.add(Box::new(MarkerStateMachine::new(marker_id, attributes)));
    }

    pub fn upsert_search_attributes(&mut self, upsert_id: &str, attributes: SearchAttributes) {
        let decision_attributes = UpsertWorkflowSearchAttributesDecisionAttributes {
            search_attributes: attributes,
        };
        self.add(Box::new(UpsertSearchAttributesStateMachine::new(
            upsert_id.to_string(),
            decision_attributes,
        )));
    }

    // ---- closing the workflow ----

    pub fn complete_workflow_execution(&mut self, result: Option<Vec<u8>>) {
        self.close_decision = Some(Decision::CompleteWorkflowExecution(Box::new(
            CompleteWorkflowExecutionDecisionAttributes { result },
        )));
    }

    pub fn fail_workflow_execution(&mut self, reason: String, details: Vec<u8>) {
        self.close_decision = Some(Decision::FailWorkflowExecution(Box::new(
            FailWorkflowExecutionDecisionAttributes {
                reason: Some(reason),
                details: Some(details),
            },
        )));
    }

    pub fn cancel_workflow_execution(&mut self, details: Option<Vec<u8>>) {
        self.close_decision = Some(Decision::CancelWorkflowExecution(Box::new(
            CancelWorkflowExecutionDecisionAttributes { details },
        )));
    }

    pub fn continue_as_new_workflow_execution(
        &mut self,
        attributes: ContinueAsNewWorkflowExecutionDecisionAttributes,
    ) {
        self.close_decision = Some(Decision::ContinueAsNewWorkflowExecution(Box::new(attributes)));
    }

    pub fn has_close_decision(&self) -> bool {
        self.close_decision.is_some()
    }

    // ---- collection ----

    /// Collect pending decisions in promotion order, optionally marking
    /// them sent, and drop machines that reached Completed. A close
    /// decision, once recorded, is always emitted last.
    pub fn get_decisions(&mut self, mark_as_sent: bool) -> Vec<Decision> {
        let mut result = Vec::new();
        let snapshot: Vec<DecisionId> = self.order.clone();
        for id in snapshot {
            let Some(machine) = self.machines.get_mut(&id) else {
                continue;
            };
            if let Some(decision) = machine.get_decision() {
                result.push(decision);
            }
            if mark_as_sent {
                machine.handle_decision_sent();
            }
            if machine.state() == DecisionState::Completed {
                self.machines.remove(&id);
                self.order.retain(|d| d != &id);
            }
        }
        if let Some(close) = &self.close_decision {
            result.push(close.clone());
        }
        result
    }
}

impl Default for DecisionsHelper {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use windlass_core::DecisionType;

    fn noop_data() -> MachineData {
        Arc::new(())
    }

    fn schedule_activity(helper: &mut DecisionsHelper, activity_id: &str) {
        helper.schedule_activity_task(
            ScheduleActivityTaskDecisionAttributes {
                activity_id: activity_id.to_string(),
                ..Default::default()
            },
            noop_data(),
        );
    }

    fn start_timer(helper: &mut DecisionsHelper, timer_id: &str, seconds: i64) {
        helper.start_timer(
            StartTimerDecisionAttributes {
                timer_id: timer_id.to_string(),
                start_to_fire_timeout_seconds: seconds,
            },
            noop_data(),
        );
    }

    #[test]
    fn activity_lifecycle_to_completion() {
        let mut helper = DecisionsHelper::new();
        schedule_activity(&mut helper, "0");
        let id = DecisionId::new(DecisionKind::Activity, "0");

        let decisions = helper.get_decisions(true);
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].decision_type(), DecisionType::ScheduleActivityTask);
        assert_eq!(helper.machine_state(&id), Some(DecisionState::DecisionSent));

        helper.handle_activity_task_scheduled(5, "0");
        assert_eq!(helper.machine_state(&id), Some(DecisionState::Initiated));

        let touch = helper.handle_activity_task_closed("0");
        assert_eq!(touch.state, DecisionState::Completed);
        assert!(touch.done);
        assert!(!helper.has_machine(&id));
        assert!(helper.get_decisions(true).is_empty());
    }

    #[test]
    fn activity_cancel_before_send_leaks_no_decision() {
        let mut helper = DecisionsHelper::new();
        schedule_activity(&mut helper, "0");

        let touch = helper.request_cancel_activity_task("0");
        assert_eq!(touch.state, DecisionState::Completed);
        assert!(helper.get_decisions(true).is_empty());
    }

    #[test]
    fn activity_cancel_after_initiated_emits_cancel_request() {
        let mut helper = DecisionsHelper::new();
        schedule_activity(&mut helper, "0");
        helper.get_decisions(true);
        helper.handle_activity_task_scheduled(5, "0");

        let touch = helper.request_cancel_activity_task("0");
        assert_eq!(touch.state, DecisionState::CanceledAfterInitiated);
        assert!(!touch.done);

        let decisions = helper.get_decisions(true);
        assert_eq!(decisions.len(), 1);
        assert_eq!(
            decisions[0].decision_type(),
            DecisionType::RequestCancelActivityTask
        );
    }

    #[test]
    fn activity_cancel_failed_returns_to_initiated() {
        let mut helper = DecisionsHelper::new();
        schedule_activity(&mut helper, "0");
        helper.get_decisions(true);
        helper.handle_activity_task_scheduled(5, "0");
        helper.request_cancel_activity_task("0");
        helper.get_decisions(true);

        let id = DecisionId::new(DecisionKind::Activity, "0");
        assert_eq!(
            helper.machine_state(&id),
            Some(DecisionState::CancellationDecisionSent)
        );
        helper.handle_request_cancel_activity_task_failed("0");
        assert_eq!(helper.machine_state(&id), Some(DecisionState::Initiated));
    }

    #[test]
    fn timer_cancel_before_initiated_walks_full_trail() {
        let mut helper = DecisionsHelper::new();
        start_timer(&mut helper, "1", 60);
        let id = DecisionId::new(DecisionKind::Timer, "1");

        // Start decision goes out.
        let decisions = helper.get_decisions(true);
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].decision_type(), DecisionType::StartTimer);
        assert_eq!(helper.machine_state(&id), Some(DecisionState::DecisionSent));

        // Local cancel lands before the server confirms the start.
        let touch = helper.cancel_timer("1");
        assert_eq!(touch.state, DecisionState::CanceledBeforeInitiated);
        assert!(touch.done); // canceled timers read as done immediately

        // Server then confirms the start; the cancel is still pending.
        helper.handle_timer_started("1");
        assert_eq!(
            helper.machine_state(&id),
            Some(DecisionState::CanceledAfterInitiated)
        );

        // Exactly one cancel-timer decision goes out.
        let decisions = helper.get_decisions(true);
        assert_eq!(decisions.len(), 1);
        match &decisions[0] {
            Decision::CancelTimer(attrs) => assert_eq!(attrs.timer_id, "1"),
            other => panic!("expected CancelTimer, got {other:?}"),
        }
        assert_eq!(
            helper.machine_state(&id),
            Some(DecisionState::CancellationDecisionSent)
        );

        let trail = helper.machine_trail(&id).unwrap();
        let states: Vec<&str> = trail
            .iter()
            .map(String::as_str)
            .filter(|s| !s.starts_with("handle") && *s != "cancel")
            .collect();
        assert_eq!(
            states,
            vec![
                "Created",
                "DecisionSent",
                "CanceledBeforeInitiated",
                "CanceledAfterInitiated",
                "CancellationDecisionSent",
            ]
        );

        helper.handle_timer_canceled("1");
        assert!(!helper.has_machine(&id));
    }

    #[test]
    fn timer_cancel_failed_returns_to_initiated() {
        let mut helper = DecisionsHelper::new();
        start_timer(&mut helper, "1", 60);
        helper.get_decisions(true);
        helper.handle_timer_started("1");
        helper.cancel_timer("1");
        helper.get_decisions(true);

        helper.handle_cancel_timer_failed("1");
        let id = DecisionId::new(DecisionKind::Timer, "1");
        assert_eq!(helper.machine_state(&id), Some(DecisionState::Initiated));
    }

    #[test]
    fn child_workflow_cancel_after_started_targets_child_only() {
        let mut helper = DecisionsHelper::new();
        helper.start_child_workflow_execution(
            StartChildWorkflowExecutionDecisionAttributes {
                domain: "unit-test".into(),
                workflow_id: "child-1".into(),
                ..Default::default()
            },
            noop_data(),
        );
        helper.get_decisions(true);
        helper.handle_start_child_workflow_execution_initiated("child-1");
        helper.handle_child_workflow_execution_started("child-1");

        helper.request_cancel_external_workflow_execution(
            "unit-test",
            "child-1",
            "",
            "",
            true,
            None,
        );
        let decisions = helper.get_decisions(true);
        assert_eq!(decisions.len(), 1);
        match &decisions[0] {
            Decision::RequestCancelExternalWorkflowExecution(attrs) => {
                assert!(attrs.child_workflow_only);
                assert!(attrs.control.is_none());
                assert_eq!(attrs.workflow_execution.workflow_id, "child-1");
                assert_eq!(attrs.workflow_execution.run_id, "");
            }
            other => panic!("expected RequestCancelExternalWorkflowExecution, got {other:?}"),
        }
    }

    #[test]
    fn external_cancel_requires_cancellation_id() {
        let mut helper = DecisionsHelper::new();
        let result = catch_unwind(AssertUnwindSafe(|| {
            helper.request_cancel_external_workflow_execution(
                "unit-test",
                "other",
                "run",
                "",
                false,
                None,
            );
        }));
        let payload = result.unwrap_err();
        assert!(payload.downcast_ref::<StateMachinePanic>().is_some());
    }

    #[test]
    fn external_cancel_lifecycle() {
        let mut helper = DecisionsHelper::new();
        helper.request_cancel_external_workflow_execution(
            "unit-test",
            "other",
            "run",
            "3",
            false,
            Some(noop_data()),
        );
        let decisions = helper.get_decisions(true);
        assert_eq!(
            decisions[0].decision_type(),
            DecisionType::RequestCancelExternalWorkflowExecution
        );

        helper.handle_request_cancel_external_workflow_execution_initiated(10, "other", "3");
        let (is_external, touch) =
            helper.handle_external_workflow_execution_cancel_requested(10, "other");
        assert!(is_external);
        assert_eq!(touch.state, DecisionState::Completed);
    }

    #[test]
    fn signal_external_lifecycle() {
        let mut helper = DecisionsHelper::new();
        helper.signal_external_workflow_execution(
            "unit-test",
            "other",
            "run",
            "ping",
            b"payload".to_vec(),
            "4",
            false,
            noop_data(),
        );
        let decisions = helper.get_decisions(true);
        assert_eq!(
            decisions[0].decision_type(),
            DecisionType::SignalExternalWorkflowExecution
        );

        helper.handle_signal_external_workflow_execution_initiated(11, "4");
        let touch = helper.handle_signal_external_workflow_execution_completed(11);
        assert_eq!(touch.state, DecisionState::Completed);
    }

    #[test]
    fn marker_completes_once_sent() {
        let mut helper = DecisionsHelper::new();
        helper.record_side_effect_marker(0, b"result".to_vec());

        let decisions = helper.get_decisions(true);
        assert_eq!(decisions.len(), 1);
        match &decisions[0] {
            Decision::RecordMarker(attrs) => {
                assert_eq!(attrs.marker_name, SIDE_EFFECT_MARKER_NAME)
            }
            other => panic!("expected RecordMarker, got {other:?}"),
        }
        // Swept out after completion, nothing is emitted twice.
        assert!(helper.get_decisions(true).is_empty());
    }

    #[test]
    fn touch_promotes_machine_to_end_of_order() {
        let mut helper = DecisionsHelper::new();
        start_timer(&mut helper, "1", 60);
        helper.get_decisions(true);
        helper.handle_timer_started("1");

        // Marker is recorded after the timer machine existed.
        helper.record_local_activity_marker("la-1", b"result".to_vec());

        // The cancel touches the timer machine, promoting it past the
        // marker: the marker decision must go out before the cancel.
        helper.cancel_timer("1");
        let decisions = helper.get_decisions(true);
        assert_eq!(decisions.len(), 2);
        assert_eq!(decisions[0].decision_type(), DecisionType::RecordMarker);
        assert_eq!(decisions[1].decision_type(), DecisionType::CancelTimer);
    }

    #[test]
    fn close_decision_is_emitted_last() {
        let mut helper = DecisionsHelper::new();
        helper.record_side_effect_marker(0, b"x".to_vec());
        helper.complete_workflow_execution(Some(b"done".to_vec()));

        let decisions = helper.get_decisions(true);
        assert_eq!(decisions.len(), 2);
        assert_eq!(decisions[0].decision_type(), DecisionType::RecordMarker);
        assert_eq!(
            decisions[1].decision_type(),
            DecisionType::CompleteWorkflowExecution
        );
    }

    #[test]
    fn unknown_machine_panics_with_nondeterminism_message() {
        let mut helper = DecisionsHelper::new();
        let result = catch_unwind(AssertUnwindSafe(|| {
            helper.handle_timer_closed("does-not-exist");
        }));
        let payload = result.unwrap_err();
        let panic = payload.downcast_ref::<StateMachinePanic>().unwrap();
        assert!(panic.message.contains("unknown decision"));
        assert!(panic.message.contains("nondeterministic"));
    }

    #[test]
    fn duplicate_machine_panics() {
        let mut helper = DecisionsHelper::new();
        start_timer(&mut helper, "1", 60);
        let result = catch_unwind(AssertUnwindSafe(|| {
            start_timer(&mut helper, "1", 30);
        }));
        let payload = result.unwrap_err();
        let panic = payload.downcast_ref::<StateMachinePanic>().unwrap();
        assert!(panic.message.contains("duplicate decision"));
    }

    #[test]
    fn illegal_transition_panics() {
        let mut helper = DecisionsHelper::new();
        start_timer(&mut helper, "1", 60);
        // Completion before the decision was even sent.
        let result = catch_unwind(AssertUnwindSafe(|| {
            helper.handle_timer_closed("1");
        }));
        let payload = result.unwrap_err();
        let panic = payload.downcast_ref::<StateMachinePanic>().unwrap();
        assert!(panic.message.contains("invalid state transition"));
    }

    #[test]
    fn naive_machine_rejects_cancel() {
        let mut helper = DecisionsHelper::new();
        helper.record_side_effect_marker(0, Vec::new());
        let id = DecisionId::new(DecisionKind::Marker, format!("{SIDE_EFFECT_MARKER_NAME}_0"));
        let result = catch_unwind(AssertUnwindSafe(|| {
            helper.touch(&id, |m| m.cancel());
        }));
        let payload = result.unwrap_err();
        let panic = payload.downcast_ref::<StateMachinePanic>().unwrap();
        assert!(panic.message.contains("unsupported operation"));
    }
}
