//! The per-workflow environment.
//!
//! One `WorkflowEnv` exists per cached workflow execution. It owns the
//! decision state machines, the deterministic sequence counter, the
//! side-effect and version caches, the replay clock, the local-activity
//! table, the open-session table, and the registered signal/query/cancel
//! handlers. Every context primitive lands here.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};

use windlass_core::decision::{ScheduleActivityTaskDecisionAttributes, StartChildWorkflowExecutionDecisionAttributes, StartTimerDecisionAttributes};
use windlass_core::encoded::DataConverter;
use windlass_core::types::{
    Memo, SearchAttributes, SessionInfo, TaskList, Version, WorkflowInfo,
    CHANGE_VERSION_SEARCH_ATTRIBUTE, DEFAULT_VERSION,
};
use windlass_core::error::UnsupportedVersionError;
use windlass_core::{CanceledError, WindlassError, WindlassResult};
use windlass_workflow::context::{
    CancelRequestHandler, ExecuteActivityParams, ExecuteChildWorkflowParams, QueryHandler,
    SignalHandler, StartedHandler, SideEffectFn, ValueEquals, ValueProducer, WorkflowEnvironment,
};
use windlass_workflow::future::ResultHandler;
use windlass_workflow::local_activity::ExecuteLocalActivityParams;
use windlass_workflow::markers::{
    encode_mutable_side_effect_details, encode_side_effect_details, encode_version_details,
};
use windlass_workflow::state_machine::{DecisionsHelper, MachineData};

use crate::options::{WorkerOptions, WorkflowInterceptor};

/// At-most-once holder of a result callback. `handle` panics when the
/// callback was already consumed; event handlers check [`Waiter::handled`]
/// first, which makes post-cancel completion races silent no-ops.
pub(crate) struct Waiter {
    kind: &'static str,
    callback: Mutex<Option<ResultHandler>>,
}

impl Waiter {
    fn new(kind: &'static str, callback: ResultHandler) -> Self {
        Self {
            kind,
            callback: Mutex::new(Some(callback)),
        }
    }

    pub(crate) fn handled(&self) -> bool {
        self.callback.lock().unwrap().is_none()
    }

    pub(crate) fn handle(&self, result: Result<Vec<u8>, WindlassError>) {
        let callback = self.callback.lock().unwrap().take();
        match callback {
            Some(callback) => callback(result),
            None => panic!("{} already handled", self.kind),
        }
    }
}

pub(crate) struct ScheduledTimer {
    pub(crate) waiter: Waiter,
}

pub(crate) struct ScheduledActivity {
    pub(crate) waiter: Waiter,
    pub(crate) wait_for_cancel_request: bool,
}

pub(crate) struct ScheduledChildWorkflow {
    pub(crate) result: Waiter,
    started: Mutex<Option<StartedHandler>>,
    #[allow(dead_code)]
    pub(crate) wait_for_cancellation: bool,
}

impl ScheduledChildWorkflow {
    pub(crate) fn handle_started(
        &self,
        result: Result<windlass_core::WorkflowExecution, WindlassError>,
    ) {
        if let Some(callback) = self.started.lock().unwrap().take() {
            callback(result);
        }
    }
}

pub(crate) struct ScheduledCancellation {
    pub(crate) waiter: Waiter,
}

pub(crate) struct ScheduledSignal {
    pub(crate) waiter: Waiter,
}

/// A local activity waiting to run or to be resolved by a marker. The
/// local-activity executor picks unstarted tasks up from the environment
/// between decision tasks.
pub(crate) struct LocalActivityTask {
    #[allow(dead_code)]
    pub(crate) activity_id: String,
    pub(crate) params: ExecuteLocalActivityParams,
    pub(crate) waiter: Waiter,
    pub(crate) canceled: Mutex<bool>,
}

/// Terminal outcome reported by the workflow coroutine.
pub(crate) struct WorkflowCompletion {
    pub(crate) result: Option<Vec<u8>>,
    pub(crate) error: Option<WindlassError>,
}

/// Implementation of the workflow environment seam.
pub struct WorkflowEnv {
    pub(crate) workflow_info: WorkflowInfo,
    pub(crate) decisions_helper: DecisionsHelper,

    pub(crate) side_effect_results: HashMap<i32, Vec<u8>>,
    pub(crate) mutable_side_effects: HashMap<String, Vec<u8>>,
    pub(crate) change_versions: HashMap<String, Version>,
    pub(crate) pending_la_tasks: HashMap<String, Arc<LocalActivityTask>>,
    pub(crate) unstarted_la_tasks: HashSet<String>,
    open_sessions: HashMap<String, SessionInfo>,

    counter_id: i32,
    current_replay_time: DateTime<Utc>,
    /// Wall-clock instant of the last replay-clock update, used to record
    /// observed drift into local-activity markers.
    current_local_time: DateTime<Utc>,

    signal_handler: Option<SignalHandler>,
    cancel_handler: Option<CancelRequestHandler>,
    query_handler: Option<QueryHandler>,
    pub(crate) completion: Option<WorkflowCompletion>,

    data_converter: Arc<dyn DataConverter>,
    pub(crate) is_replay: bool,
    enable_logging_in_replay: bool,
    interceptors: Vec<Arc<dyn WorkflowInterceptor>>,
}

impl WorkflowEnv {
    pub fn new(workflow_info: WorkflowInfo, options: &WorkerOptions) -> Self {
        let interceptors = options
            .workflow_interceptor_factories
            .iter()
            .map(|factory| factory.new_interceptor(&workflow_info))
            .collect();
        Self {
            workflow_info,
            decisions_helper: DecisionsHelper::new(),
            side_effect_results: HashMap::new(),
            mutable_side_effects: HashMap::new(),
            change_versions: HashMap::new(),
            pending_la_tasks: HashMap::new(),
            unstarted_la_tasks: HashSet::new(),
            open_sessions: HashMap::new(),
            counter_id: 0,
            current_replay_time: Utc.timestamp_opt(0, 0).unwrap(),
            current_local_time: Utc.timestamp_opt(0, 0).unwrap(),
            signal_handler: None,
            cancel_handler: None,
            query_handler: None,
            completion: None,
            data_converter: options.data_converter.clone(),
            is_replay: false,
            enable_logging_in_replay: options.enable_logging_in_replay,
            interceptors,
        }
    }

    /// Whether workflow-scoped logs should be emitted right now.
    pub(crate) fn log_enabled(&self) -> bool {
        !self.is_replay || self.enable_logging_in_replay
    }

    pub(crate) fn notify_workflow_start(&self) {
        for interceptor in &self.interceptors {
            interceptor.on_execute_workflow(&self.workflow_info);
        }
    }

    /// Replay clock update. Moves forward only; a backwards timestamp
    /// (clock skew between events) freezes the clock instead of rewinding
    /// it.
    pub(crate) fn set_current_replay_time(&mut self, replay_time: DateTime<Utc>) {
        if replay_time < self.current_replay_time {
            return;
        }
        self.current_replay_time = replay_time;
        self.current_local_time = Utc::now();
    }

    /// Apparent time for a local-activity marker: the replay clock plus
    /// the wall time that passed since it was last advanced, so replays
    /// observe the same drift.
    pub(crate) fn local_activity_replay_time(&self) -> DateTime<Utc> {
        self.current_replay_time + (Utc::now() - self.current_local_time)
    }

    pub(crate) fn invoke_signal_handler(&mut self, name: &str, input: Vec<u8>) {
        if let Some(handler) = self.signal_handler.as_mut() {
            handler(name, input);
        } else if self.log_enabled() {
            tracing::warn!(signal = name, "signal received before handler registration");
        }
    }

    pub(crate) fn invoke_cancel_handler(&mut self) {
        if let Some(handler) = self.cancel_handler.as_mut() {
            handler();
        }
    }

    pub(crate) fn invoke_query_handler(
        &mut self,
        query_type: &str,
        args: Vec<u8>,
    ) -> WindlassResult<Vec<u8>> {
        match self.query_handler.as_mut() {
            Some(handler) => handler(query_type, args),
            None => Err(WindlassError::QueryFailed(format!(
                "no query handler registered, queryType {query_type}"
            ))),
        }
    }

    pub(crate) fn open_session_list(&self) -> Vec<SessionInfo> {
        let mut sessions: Vec<SessionInfo> = self.open_sessions.values().cloned().collect();
        sessions.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        sessions
    }

    pub(crate) fn take_completion(&mut self) -> Option<WorkflowCompletion> {
        self.completion.take()
    }

    fn merge_search_attributes(&mut self, attributes: &SearchAttributes) {
        self.workflow_info.merge_search_attributes(attributes);
    }

    fn record_mutable_side_effect(&mut self, id: &str, data: Vec<u8>) -> Vec<u8> {
        let details = encode_mutable_side_effect_details(self.data_converter.as_ref(), id, &data)
            .unwrap_or_else(|e| panic!("failed to encode mutable side effect marker: {e}"));
        self.decisions_helper
            .record_mutable_side_effect_marker(id, details);
        self.mutable_side_effects.insert(id.to_string(), data.clone());
        data
    }

    fn change_version_strings(&self, change_id: &str, version: Version) -> Vec<String> {
        // Newest first, then the existing versions in stable order.
        let mut versions = vec![format!("{change_id}-{version}")];
        let mut existing: Vec<(&String, &Version)> = self
            .change_versions
            .iter()
            .filter(|(id, _)| id.as_str() != change_id)
            .collect();
        existing.sort_by(|a, b| a.0.cmp(b.0));
        versions.extend(existing.into_iter().map(|(id, v)| format!("{id}-{v}")));
        versions
    }
}

fn validate_version(
    change_id: &str,
    version: Version,
    min_supported: Version,
    max_supported: Version,
) {
    if version < min_supported || version > max_supported {
        // Recorded history is outside what this binary supports. This is
        // a coding error surfaced through the panic-capture path.
        panic!(
            "{}",
            UnsupportedVersionError {
                change_id: change_id.to_string(),
                version,
                min_supported,
                max_supported,
            }
        );
    }
}

impl WorkflowEnvironment for WorkflowEnv {
    fn workflow_info(&self) -> WorkflowInfo {
        self.workflow_info.clone()
    }

    fn data_converter(&self) -> Arc<dyn DataConverter> {
        self.data_converter.clone()
    }

    fn generate_sequence(&mut self) -> i32 {
        let id = self.counter_id;
        self.counter_id += 1;
        id
    }

    fn generate_sequence_id(&mut self) -> String {
        self.generate_sequence().to_string()
    }

    fn now(&self) -> DateTime<Utc> {
        self.current_replay_time
    }

    fn is_replaying(&self) -> bool {
        self.is_replay
    }

    fn execute_activity(
        &mut self,
        params: ExecuteActivityParams,
        callback: ResultHandler,
    ) -> String {
        let activity_id = match params.options.activity_id.clone().filter(|id| !id.is_empty()) {
            Some(id) => id,
            None => self.generate_sequence_id(),
        };
        let task_list = if params.options.task_list.is_empty() {
            self.workflow_info.task_list.clone()
        } else {
            params.options.task_list.clone()
        };

        let seconds = |d: std::time::Duration| -> Option<i32> {
            let s = d.as_secs() as i32;
            (s > 0).then_some(s)
        };
        let attributes = ScheduleActivityTaskDecisionAttributes {
            activity_id: activity_id.clone(),
            activity_type: params.activity_type.clone(),
            task_list: TaskList::new(task_list),
            input: params.input,
            schedule_to_close_timeout_seconds: seconds(params.options.schedule_to_close_timeout),
            schedule_to_start_timeout_seconds: seconds(params.options.schedule_to_start_timeout),
            start_to_close_timeout_seconds: seconds(params.options.start_to_close_timeout),
            heartbeat_timeout_seconds: seconds(params.options.heartbeat_timeout),
            retry_policy: params.options.retry_policy.clone(),
            header: params.options.header.clone(),
        };

        let data: MachineData = Arc::new(ScheduledActivity {
            waiter: Waiter::new("activity", callback),
            wait_for_cancel_request: params.options.wait_for_cancellation,
        });
        self.decisions_helper.schedule_activity_task(attributes, data);

        for interceptor in &self.interceptors {
            interceptor.on_execute_activity(&params.activity_type.name);
        }
        if self.log_enabled() {
            tracing::debug!(
                activity_id = %activity_id,
                activity_type = %params.activity_type.name,
                "ExecuteActivity"
            );
        }
        activity_id
    }

    fn request_cancel_activity(&mut self, activity_id: &str) {
        let touch = self.decisions_helper.request_cancel_activity_task(activity_id);
        let activity = touch
            .data
            .as_ref()
            .and_then(|d| d.clone().downcast::<ScheduledActivity>().ok())
            .expect("activity machine carries ScheduledActivity data");
        if activity.waiter.handled() {
            return;
        }
        if touch.done || !activity.wait_for_cancel_request {
            activity.waiter.handle(Err(CanceledError::default().into()));
        }
        if self.log_enabled() {
            tracing::debug!(activity_id, "RequestCancelActivity");
        }
    }

    fn execute_local_activity(
        &mut self,
        params: ExecuteLocalActivityParams,
        callback: ResultHandler,
    ) -> String {
        let activity_id = self.generate_sequence_id();
        let task = Arc::new(LocalActivityTask {
            activity_id: activity_id.clone(),
            params,
            waiter: Waiter::new("local activity", callback),
            canceled: Mutex::new(false),
        });
        self.pending_la_tasks.insert(activity_id.clone(), task);
        self.unstarted_la_tasks.insert(activity_id.clone());
        activity_id
    }

    fn request_cancel_local_activity(&mut self, activity_id: &str) {
        if let Some(task) = self.pending_la_tasks.get(activity_id) {
            *task.canceled.lock().unwrap() = true;
            if !task.waiter.handled() {
                task.waiter.handle(Err(CanceledError::default().into()));
            }
        }
    }

    fn new_timer(&mut self, duration: chrono::Duration, callback: ResultHandler) -> Option<String> {
        if duration < chrono::Duration::zero() {
            callback(Err(WindlassError::InvalidArgument(format!(
                "negative timer duration provided: {duration}"
            ))));
            return None;
        }
        if duration.is_zero() {
            callback(Ok(Vec::new()));
            return None;
        }

        let timer_id = self.generate_sequence_id();
        let attributes = StartTimerDecisionAttributes {
            timer_id: timer_id.clone(),
            start_to_fire_timeout_seconds: duration.num_seconds().max(1),
        };
        let data: MachineData = Arc::new(ScheduledTimer {
            waiter: Waiter::new("timer", callback),
        });
        self.decisions_helper.start_timer(attributes, data);

        if self.log_enabled() {
            tracing::debug!(timer_id = %timer_id, duration_ms = duration.num_milliseconds(), "NewTimer");
        }
        Some(timer_id)
    }

    fn request_cancel_timer(&mut self, timer_id: &str) {
        let touch = self.decisions_helper.cancel_timer(timer_id);
        let timer = touch
            .data
            .as_ref()
            .and_then(|d| d.clone().downcast::<ScheduledTimer>().ok())
            .expect("timer machine carries ScheduledTimer data");
        if timer.waiter.handled() {
            return;
        }
        timer.waiter.handle(Err(CanceledError::default().into()));
        if self.log_enabled() {
            tracing::debug!(timer_id, "RequestCancelTimer");
        }
    }

    fn execute_child_workflow(
        &mut self,
        params: ExecuteChildWorkflowParams,
        callback: ResultHandler,
        started_callback: StartedHandler,
    ) -> WindlassResult<String> {
        let workflow_id = if params.options.workflow_id.is_empty() {
            let sequence_id = self.generate_sequence_id();
            format!(
                "{}_{}",
                self.workflow_info.workflow_execution.run_id, sequence_id
            )
        } else {
            params.options.workflow_id.clone()
        };
        let domain = params
            .options
            .domain
            .clone()
            .unwrap_or_else(|| self.workflow_info.domain.clone());
        let task_list = params
            .options
            .task_list
            .clone()
            .unwrap_or_else(|| self.workflow_info.task_list.clone());

        let seconds = |d: std::time::Duration| -> Option<i32> {
            let s = d.as_secs() as i32;
            (s > 0).then_some(s)
        };
        let attributes = StartChildWorkflowExecutionDecisionAttributes {
            domain,
            workflow_id: workflow_id.clone(),
            workflow_type: params.workflow_type.clone(),
            task_list: TaskList::new(task_list),
            input: params.input,
            execution_start_to_close_timeout_seconds: seconds(
                params.options.execution_start_to_close_timeout,
            ),
            task_start_to_close_timeout_seconds: seconds(
                params.options.task_start_to_close_timeout,
            ),
            parent_close_policy: params.options.parent_close_policy,
            workflow_id_reuse_policy: params.options.workflow_id_reuse_policy,
            retry_policy: params.options.retry_policy.clone(),
            cron_schedule: params.options.cron_schedule.clone(),
            memo: params.options.memo.clone().map(|fields| Memo { fields }),
            search_attributes: params
                .options
                .search_attributes
                .clone()
                .map(|indexed_fields| SearchAttributes { indexed_fields }),
            header: params.options.header.clone(),
        };

        let data: MachineData = Arc::new(ScheduledChildWorkflow {
            result: Waiter::new("child workflow", callback),
            started: Mutex::new(Some(started_callback)),
            wait_for_cancellation: params.options.wait_for_cancellation,
        });
        self.decisions_helper
            .start_child_workflow_execution(attributes, data);

        for interceptor in &self.interceptors {
            interceptor.on_execute_child_workflow(&params.workflow_type.name);
        }
        if self.log_enabled() {
            tracing::debug!(
                child_workflow_id = %workflow_id,
                workflow_type = %params.workflow_type.name,
                "ExecuteChildWorkflow"
            );
        }
        Ok(workflow_id)
    }

    fn request_cancel_child_workflow(&mut self, domain: &str, workflow_id: &str) {
        // Child-only cancellation: no cancellation id, no run id.
        self.decisions_helper.request_cancel_external_workflow_execution(
            domain,
            workflow_id,
            "",
            "",
            true,
            None,
        );
    }

    fn request_cancel_external_workflow(
        &mut self,
        domain: &str,
        workflow_id: &str,
        run_id: &str,
        callback: ResultHandler,
    ) {
        let cancellation_id = self.generate_sequence_id();
        let data: MachineData = Arc::new(ScheduledCancellation {
            waiter: Waiter::new("cancellation", callback),
        });
        self.decisions_helper.request_cancel_external_workflow_execution(
            domain,
            workflow_id,
            run_id,
            &cancellation_id,
            false,
            Some(data),
        );
    }

    fn signal_external_workflow(
        &mut self,
        domain: &str,
        workflow_id: &str,
        run_id: &str,
        signal_name: &str,
        input: Vec<u8>,
        child_workflow_only: bool,
        callback: ResultHandler,
    ) {
        let signal_id = self.generate_sequence_id();
        let data: MachineData = Arc::new(ScheduledSignal {
            waiter: Waiter::new("signal", callback),
        });
        self.decisions_helper.signal_external_workflow_execution(
            domain,
            workflow_id,
            run_id,
            signal_name,
            input,
            &signal_id,
            child_workflow_only,
            data,
        );
    }

    fn side_effect(&mut self, f: SideEffectFn) -> WindlassResult<Vec<u8>> {
        let side_effect_id = self.generate_sequence();
        let result = if self.is_replay {
            match self.side_effect_results.get(&side_effect_id) {
                Some(result) => result.clone(),
                None => {
                    let mut known: Vec<i32> = self.side_effect_results.keys().copied().collect();
                    known.sort_unstable();
                    panic!(
                        "no cached result found for side effect id {side_effect_id}, known side \
                         effects: {known:?}. This usually means nondeterministic workflow code"
                    );
                }
            }
        } else {
            f()?
        };

        let details =
            encode_side_effect_details(self.data_converter.as_ref(), side_effect_id, &result)
                .map_err(|e| WindlassError::Encoding(e.to_string()))?;
        self.decisions_helper
            .record_side_effect_marker(side_effect_id, details);

        if self.log_enabled() {
            tracing::debug!(side_effect_id, "SideEffect marker added");
        }
        Ok(result)
    }

    fn mutable_side_effect(&mut self, id: &str, f: ValueProducer, equals: ValueEquals) -> Vec<u8> {
        if let Some(stored) = self.mutable_side_effects.get(id).cloned() {
            if self.is_replay {
                return stored;
            }
            let new_value = f();
            if equals(&new_value, &stored) {
                return stored;
            }
            return self.record_mutable_side_effect(id, new_value);
        }

        if self.is_replay {
            panic!(
                "nondeterministic workflow code change detected: MutableSideEffect call has no \
                 corresponding event in history, id \"{id}\""
            );
        }
        let value = f();
        self.record_mutable_side_effect(id, value)
    }

    fn get_version(
        &mut self,
        change_id: &str,
        min_supported: Version,
        max_supported: Version,
    ) -> Version {
        if let Some(&version) = self.change_versions.get(change_id) {
            validate_version(change_id, version, min_supported, max_supported);
            return version;
        }

        let version = if self.is_replay {
            // First encounter during replay: the recorded history predates
            // the versioned code path.
            DEFAULT_VERSION
        } else {
            let version = max_supported;
            let details =
                encode_version_details(self.data_converter.as_ref(), change_id, version)
                    .unwrap_or_else(|e| panic!("failed to encode version marker: {e}"));
            self.decisions_helper.record_version_marker(change_id, details);

            let change_versions = self.change_version_strings(change_id, version);
            let mut attributes = HashMap::new();
            attributes.insert(
                CHANGE_VERSION_SEARCH_ATTRIBUTE.to_string(),
                serde_json::json!(change_versions),
            );
            if let Err(e) = self.upsert_search_attributes(attributes) {
                if self.log_enabled() {
                    tracing::warn!(change_id, error = %e, "failed to upsert change version");
                }
            }
            version
        };

        validate_version(change_id, version, min_supported, max_supported);
        self.change_versions.insert(change_id.to_string(), version);
        version
    }

    fn upsert_search_attributes(
        &mut self,
        attributes: HashMap<String, serde_json::Value>,
    ) -> WindlassResult<()> {
        if attributes.is_empty() {
            return Err(WindlassError::InvalidArgument(
                "search attributes are empty".into(),
            ));
        }

        // Use the newest change version as upsert id so searchable
        // GetVersion stays backward compatible; everything else gets a
        // sequence id.
        let upsert_id = match attributes
            .get(CHANGE_VERSION_SEARCH_ATTRIBUTE)
            .and_then(|v| v.as_array())
            .and_then(|a| a.first())
            .and_then(|v| v.as_str())
        {
            Some(newest) => newest.to_string(),
            None => self.generate_sequence_id(),
        };

        let mut serialized = SearchAttributes::default();
        for (key, value) in &attributes {
            let bytes = self
                .data_converter
                .to_payload(value)
                .map_err(|e| WindlassError::Encoding(e.to_string()))?;
            serialized.indexed_fields.insert(key.clone(), bytes);
        }

        self.decisions_helper
            .upsert_search_attributes(&upsert_id, serialized.clone());
        self.merge_search_attributes(&serialized);
        Ok(())
    }

    fn register_signal_handler(&mut self, handler: SignalHandler) {
        self.signal_handler = Some(handler);
    }

    fn register_cancel_handler(&mut self, handler: CancelRequestHandler) {
        self.cancel_handler = Some(handler);
    }

    fn register_query_handler(&mut self, handler: QueryHandler) {
        self.query_handler = Some(handler);
    }

    fn add_session(&mut self, info: SessionInfo) {
        self.open_sessions.insert(info.session_id.clone(), info);
    }

    fn remove_session(&mut self, session_id: &str) {
        self.open_sessions.remove(session_id);
    }

    fn complete(&mut self, result: Option<Vec<u8>>, error: Option<WindlassError>) {
        self.completion = Some(WorkflowCompletion { result, error });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use windlass_core::types::{ActivityOptions, WorkflowExecution, WorkflowType};
    use windlass_core::DecisionType;

    fn test_info() -> WorkflowInfo {
        WorkflowInfo {
            workflow_execution: WorkflowExecution::new("wf-1", "run-1"),
            workflow_type: WorkflowType {
                name: "TestWorkflow".into(),
            },
            task_list: "unit-tl".into(),
            domain: "unit-test".into(),
            execution_start_to_close_timeout: std::time::Duration::from_secs(60),
            task_start_to_close_timeout: std::time::Duration::from_secs(10),
            attempt: 1,
            continued_execution_run_id: None,
            parent_workflow_execution: None,
            cron_schedule: None,
            memo: None,
            search_attributes: None,
        }
    }

    fn test_env() -> WorkflowEnv {
        WorkflowEnv::new(test_info(), &WorkerOptions::default())
    }

    fn discard() -> ResultHandler {
        Box::new(|_| {})
    }

    fn capture() -> (ResultHandler, Arc<Mutex<Option<Result<Vec<u8>, WindlassError>>>>) {
        let slot = Arc::new(Mutex::new(None));
        let slot_clone = slot.clone();
        (
            Box::new(move |result| {
                *slot_clone.lock().unwrap() = Some(result);
            }),
            slot,
        )
    }

    #[test]
    fn sequence_ids_are_deterministic() {
        let mut env = test_env();
        assert_eq!(env.generate_sequence_id(), "0");
        assert_eq!(env.generate_sequence_id(), "1");
        assert_eq!(env.generate_sequence_id(), "2");
    }

    #[test]
    fn activity_gets_generated_id_and_workflow_task_list() {
        let mut env = test_env();
        let id = env.execute_activity(
            ExecuteActivityParams {
                activity_type: windlass_core::ActivityType {
                    name: "ToUpper".into(),
                },
                input: None,
                options: ActivityOptions::default(),
            },
            discard(),
        );
        assert_eq!(id, "0");

        let decisions = env.decisions_helper.get_decisions(true);
        match &decisions[0] {
            windlass_core::Decision::ScheduleActivityTask(attrs) => {
                assert_eq!(attrs.activity_id, "0");
                assert_eq!(attrs.task_list.name, "unit-tl");
            }
            other => panic!("expected ScheduleActivityTask, got {other:?}"),
        }
    }

    #[test]
    fn zero_timer_fires_immediately() {
        let mut env = test_env();
        let (callback, slot) = capture();
        let id = env.new_timer(chrono::Duration::zero(), callback);
        assert!(id.is_none());
        assert!(slot.lock().unwrap().take().unwrap().is_ok());
        assert!(env.decisions_helper.get_decisions(true).is_empty());
    }

    #[test]
    fn negative_timer_fails_immediately() {
        let mut env = test_env();
        let (callback, slot) = capture();
        let id = env.new_timer(chrono::Duration::seconds(-5), callback);
        assert!(id.is_none());
        let result = slot.lock().unwrap().take().unwrap();
        assert!(matches!(result, Err(WindlassError::InvalidArgument(_))));
    }

    #[test]
    fn cancel_timer_resolves_waiter_with_canceled() {
        let mut env = test_env();
        let (callback, slot) = capture();
        let id = env.new_timer(chrono::Duration::seconds(60), callback).unwrap();
        env.request_cancel_timer(&id);
        let result = slot.lock().unwrap().take().unwrap();
        assert!(matches!(result, Err(WindlassError::Canceled(_))));

        // Cancelling again is a no-op: the waiter is already handled.
        env.request_cancel_timer(&id);
    }

    #[test]
    fn cancel_activity_without_wait_resolves_immediately() {
        let mut env = test_env();
        let (callback, slot) = capture();
        let id = env.execute_activity(
            ExecuteActivityParams {
                activity_type: windlass_core::ActivityType { name: "A".into() },
                input: None,
                options: ActivityOptions::default(),
            },
            callback,
        );
        env.decisions_helper.get_decisions(true);
        env.decisions_helper.handle_activity_task_scheduled(5, &id);

        env.request_cancel_activity(&id);
        let result = slot.lock().unwrap().take().unwrap();
        assert!(matches!(result, Err(WindlassError::Canceled(_))));
    }

    #[test]
    fn cancel_activity_with_wait_defers_resolution() {
        let mut env = test_env();
        let (callback, slot) = capture();
        let id = env.execute_activity(
            ExecuteActivityParams {
                activity_type: windlass_core::ActivityType { name: "A".into() },
                input: None,
                options: ActivityOptions {
                    wait_for_cancellation: true,
                    ..Default::default()
                },
            },
            callback,
        );
        env.decisions_helper.get_decisions(true);
        env.decisions_helper.handle_activity_task_scheduled(5, &id);

        env.request_cancel_activity(&id);
        assert!(slot.lock().unwrap().is_none());
    }

    #[test]
    fn side_effect_records_marker_live() {
        let mut env = test_env();
        let result = env
            .side_effect(Box::new(|| Ok(b"random".to_vec())))
            .unwrap();
        assert_eq!(result, b"random");
        let decisions = env.decisions_helper.get_decisions(true);
        assert_eq!(decisions[0].decision_type(), DecisionType::RecordMarker);
    }

    #[test]
    fn side_effect_replay_uses_cache() {
        let mut env = test_env();
        env.is_replay = true;
        env.side_effect_results.insert(0, b"recorded".to_vec());
        let result = env
            .side_effect(Box::new(|| panic!("must not execute during replay")))
            .unwrap();
        assert_eq!(result, b"recorded");
    }

    #[test]
    fn side_effect_replay_cache_miss_panics() {
        let mut env = test_env();
        env.is_replay = true;
        let result = catch_unwind(AssertUnwindSafe(|| {
            let _ = env.side_effect(Box::new(|| Ok(Vec::new())));
        }));
        assert!(result.is_err());
    }

    #[test]
    fn mutable_side_effect_records_only_on_change() {
        let mut env = test_env();
        let v1 = env.mutable_side_effect(
            "flag",
            Box::new(|| b"a".to_vec()),
            Box::new(|a, b| a == b),
        );
        assert_eq!(v1, b"a");
        assert_eq!(env.decisions_helper.get_decisions(true).len(), 1);

        // Same value again: no new marker.
        let v2 = env.mutable_side_effect(
            "flag",
            Box::new(|| b"a".to_vec()),
            Box::new(|a, b| a == b),
        );
        assert_eq!(v2, b"a");
        assert!(env.decisions_helper.get_decisions(true).is_empty());

        // Changed value: new marker.
        let v3 = env.mutable_side_effect(
            "flag",
            Box::new(|| b"b".to_vec()),
            Box::new(|a, b| a == b),
        );
        assert_eq!(v3, b"b");
        assert_eq!(env.decisions_helper.get_decisions(true).len(), 1);
    }

    #[test]
    fn mutable_side_effect_replay_miss_panics() {
        let mut env = test_env();
        env.is_replay = true;
        let result = catch_unwind(AssertUnwindSafe(|| {
            env.mutable_side_effect("flag", Box::new(Vec::new), Box::new(|a, b| a == b));
        }));
        assert!(result.is_err());
    }

    #[test]
    fn get_version_live_records_marker_and_search_attribute() {
        let mut env = test_env();
        let version = env.get_version("change-1", DEFAULT_VERSION, 2);
        assert_eq!(version, 2);

        let decisions = env.decisions_helper.get_decisions(true);
        let kinds: Vec<DecisionType> = decisions.iter().map(|d| d.decision_type()).collect();
        assert!(kinds.contains(&DecisionType::RecordMarker));
        assert!(kinds.contains(&DecisionType::UpsertWorkflowSearchAttributes));

        // Repeated call returns the cached version without new decisions.
        assert_eq!(env.get_version("change-1", DEFAULT_VERSION, 2), 2);
        assert!(env.decisions_helper.get_decisions(true).is_empty());

        let attrs = env.workflow_info.search_attributes.as_ref().unwrap();
        assert!(attrs.indexed_fields.contains_key(CHANGE_VERSION_SEARCH_ATTRIBUTE));
    }

    #[test]
    fn get_version_replay_first_encounter_returns_default() {
        let mut env = test_env();
        env.is_replay = true;
        let version = env.get_version("change-1", DEFAULT_VERSION, 2);
        assert_eq!(version, DEFAULT_VERSION);
        assert!(env.decisions_helper.get_decisions(true).is_empty());
    }

    #[test]
    fn get_version_out_of_range_panics() {
        let mut env = test_env();
        env.change_versions.insert("change-1".into(), 1);
        let result = catch_unwind(AssertUnwindSafe(|| {
            env.get_version("change-1", 2, 3);
        }));
        assert!(result.is_err());
    }

    #[test]
    fn upsert_empty_search_attributes_fails_without_decision() {
        let mut env = test_env();
        assert!(env.upsert_search_attributes(HashMap::new()).is_err());
        assert!(env.decisions_helper.get_decisions(true).is_empty());
    }

    #[test]
    fn replay_clock_never_rewinds() {
        let mut env = test_env();
        let later = Utc.timestamp_opt(100, 0).unwrap();
        let earlier = Utc.timestamp_opt(50, 0).unwrap();
        env.set_current_replay_time(later);
        env.set_current_replay_time(earlier);
        assert_eq!(env.now(), later);
    }

    #[test]
    fn double_handle_panics() {
        let waiter = Waiter::new("test", Box::new(|_| {}));
        waiter.handle(Ok(Vec::new()));
        let result = catch_unwind(AssertUnwindSafe(|| {
            waiter.handle(Ok(Vec::new()));
        }));
        assert!(result.is_err());
    }

    #[test]
    fn child_workflow_id_defaults_to_run_id_and_sequence() {
        let mut env = test_env();
        let id = env
            .execute_child_workflow(
                ExecuteChildWorkflowParams {
                    workflow_type: WorkflowType { name: "Child".into() },
                    input: None,
                    options: Default::default(),
                },
                discard(),
                Box::new(|_| {}),
            )
            .unwrap();
        assert_eq!(id, "run-1_0");
    }

    #[test]
    fn sessions_are_tracked_sorted() {
        let mut env = test_env();
        env.add_session(SessionInfo {
            session_id: "b".into(),
            task_list: "tl".into(),
        });
        env.add_session(SessionInfo {
            session_id: "a".into(),
            task_list: "tl".into(),
        });
        let sessions = env.open_session_list();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].session_id, "a");
        env.remove_session("a");
        assert_eq!(env.open_session_list().len(), 1);
    }
}
