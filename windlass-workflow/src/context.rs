//! The workflow context: the API surface user workflow code sees.
//!
//! Every primitive routes through the [`WorkflowEnvironment`] seam, which
//! the worker implements on top of the decision state machines. The
//! context's job is ergonomics: it turns the environment's callback style
//! into awaitable futures, routes signals into channels, and ties
//! in-flight operations to cancellation scopes.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::Poll;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use windlass_core::encoded::{decode, encode, DataConverter};
use windlass_core::types::{
    ActivityOptions, ActivityType, ChildWorkflowOptions, ContinueAsNewOptions, SessionInfo,
    Version, WorkflowExecution, WorkflowInfo, WorkflowType,
};
use windlass_core::{ContinueAsNewError, WindlassError, WindlassResult};

use crate::cancel::CancellationScope;
use crate::channel::{unbounded_channel, Receiver, Sender};
use crate::dispatcher::SpawnHandle;
use crate::future::{completable, ResultHandler, WorkflowFuture};
use crate::local_activity::ExecuteLocalActivityParams;

/// Handler invoked for every signal delivered to the workflow.
pub type SignalHandler = Box<dyn FnMut(&str, Vec<u8>) + Send>;

/// Handler invoked when the service requests workflow cancellation.
pub type CancelRequestHandler = Box<dyn FnMut() + Send>;

/// Handler invoked for queries not served by the built-ins.
pub type QueryHandler = Box<dyn FnMut(&str, Vec<u8>) -> WindlassResult<Vec<u8>> + Send>;

/// Callback fired when a child workflow's first run actually starts.
pub type StartedHandler = Box<dyn FnOnce(Result<WorkflowExecution, WindlassError>) + Send>;

/// Closure recorded by a side effect on first (live) execution.
pub type SideEffectFn = Box<dyn FnOnce() -> WindlassResult<Vec<u8>> + Send>;

/// Closure producing the current encoded value of a mutable side effect.
pub type ValueProducer = Box<dyn FnOnce() -> Vec<u8> + Send>;

/// Equality over encoded values, deciding whether a mutable side effect
/// records a new marker.
pub type ValueEquals = Box<dyn Fn(&[u8], &[u8]) -> bool + Send>;

/// Parameters for scheduling an activity.
#[derive(Debug, Clone)]
pub struct ExecuteActivityParams {
    pub activity_type: ActivityType,
    pub input: Option<Vec<u8>>,
    pub options: ActivityOptions,
}

/// Parameters for starting a child workflow.
#[derive(Debug, Clone)]
pub struct ExecuteChildWorkflowParams {
    pub workflow_type: WorkflowType,
    pub input: Option<Vec<u8>>,
    pub options: ChildWorkflowOptions,
}

/// The per-workflow environment the context routes through. Implemented
/// by the worker; one instance per cached workflow execution.
///
/// Operations take completion callbacks rather than returning futures:
/// the callback fires when the confirming history event is applied, which
/// may be in a later decision task or, during replay, immediately.
pub trait WorkflowEnvironment: Send {
    fn workflow_info(&self) -> WorkflowInfo;
    fn data_converter(&self) -> Arc<dyn DataConverter>;

    /// Advance the deterministic sequence counter.
    fn generate_sequence(&mut self) -> i32;
    fn generate_sequence_id(&mut self) -> String;

    /// Current replay clock.
    fn now(&self) -> DateTime<Utc>;
    fn is_replaying(&self) -> bool;

    /// Returns the activity id.
    fn execute_activity(&mut self, params: ExecuteActivityParams, callback: ResultHandler)
        -> String;
    fn request_cancel_activity(&mut self, activity_id: &str);

    /// Returns the local activity id.
    fn execute_local_activity(
        &mut self,
        params: ExecuteLocalActivityParams,
        callback: ResultHandler,
    ) -> String;
    fn request_cancel_local_activity(&mut self, activity_id: &str);

    /// Returns the timer id, or `None` when the timer resolved
    /// synchronously: zero fires immediately, negative fails immediately.
    fn new_timer(&mut self, duration: chrono::Duration, callback: ResultHandler) -> Option<String>;
    fn request_cancel_timer(&mut self, timer_id: &str);

    /// Returns the child workflow id.
    fn execute_child_workflow(
        &mut self,
        params: ExecuteChildWorkflowParams,
        callback: ResultHandler,
        started_callback: StartedHandler,
    ) -> WindlassResult<String>;
    fn request_cancel_child_workflow(&mut self, domain: &str, workflow_id: &str);
    fn request_cancel_external_workflow(
        &mut self,
        domain: &str,
        workflow_id: &str,
        run_id: &str,
        callback: ResultHandler,
    );
    #[allow(clippy::too_many_arguments)]
    fn signal_external_workflow(
        &mut self,
        domain: &str,
        workflow_id: &str,
        run_id: &str,
        signal_name: &str,
        input: Vec<u8>,
        child_workflow_only: bool,
        callback: ResultHandler,
    );

    /// Live: run the closure and record a marker. Replay: return the
    /// cached marker value; a cache miss is a determinism violation.
    fn side_effect(&mut self, f: SideEffectFn) -> WindlassResult<Vec<u8>>;
    fn mutable_side_effect(&mut self, id: &str, f: ValueProducer, equals: ValueEquals) -> Vec<u8>;
    fn get_version(&mut self, change_id: &str, min_supported: Version, max_supported: Version)
        -> Version;
    fn upsert_search_attributes(
        &mut self,
        attributes: HashMap<String, serde_json::Value>,
    ) -> WindlassResult<()>;

    fn register_signal_handler(&mut self, handler: SignalHandler);
    fn register_cancel_handler(&mut self, handler: CancelRequestHandler);
    fn register_query_handler(&mut self, handler: QueryHandler);

    fn add_session(&mut self, info: SessionInfo);
    fn remove_session(&mut self, session_id: &str);

    /// Close the workflow with a result or an error. A
    /// `ContinueAsNewError` closes it with a continue-as-new decision.
    fn complete(&mut self, result: Option<Vec<u8>>, error: Option<WindlassError>);
}

/// Shared handle to the environment, lockable from workflow coroutines.
pub type SharedEnvironment = Arc<Mutex<dyn WorkflowEnvironment>>;

type NamedSignalChannels = HashMap<String, (Sender<Vec<u8>>, Receiver<Vec<u8>>)>;
type NamedQueryHandlers = HashMap<String, Box<dyn FnMut(Vec<u8>) -> WindlassResult<Vec<u8>> + Send>>;

/// Handle to an in-flight timer.
pub struct TimerHandle {
    /// `None` when the timer resolved synchronously.
    pub timer_id: Option<String>,
    future: WorkflowFuture<Result<Vec<u8>, WindlassError>>,
    context: WorkflowContext,
}

impl TimerHandle {
    /// Suspend until the timer fires or is cancelled.
    pub async fn wait(self) -> WindlassResult<()> {
        let scope = self.context.scope.clone();
        let on_cancel: Option<Box<dyn FnOnce() + Send>> = self.timer_id.clone().map(|timer_id| {
            let env = self.context.env.clone();
            Box::new(move || {
                env.lock().unwrap().request_cancel_timer(&timer_id);
            }) as Box<dyn FnOnce() + Send>
        });
        await_with_cancel(self.future, scope, on_cancel).await.map(|_| ())
    }
}

/// Handle to an in-flight child workflow.
pub struct ChildWorkflowHandle {
    pub workflow_id: String,
    started: WorkflowFuture<Result<WorkflowExecution, WindlassError>>,
    result: WorkflowFuture<Result<Vec<u8>, WindlassError>>,
    context: WorkflowContext,
}

impl ChildWorkflowHandle {
    /// Suspend until the child's first run has actually started.
    pub async fn started(&self) -> WindlassResult<WorkflowExecution> {
        self.started.clone().await
    }

    /// Suspend until the child closes.
    pub async fn result(self) -> WindlassResult<Vec<u8>> {
        let scope = self.context.scope.clone();
        let env = self.context.env.clone();
        let domain = self.context.workflow_info().domain;
        let workflow_id = self.workflow_id.clone();
        let on_cancel: Box<dyn FnOnce() + Send> = Box::new(move || {
            env.lock()
                .unwrap()
                .request_cancel_child_workflow(&domain, &workflow_id);
        });
        await_with_cancel(self.result, scope, Some(on_cancel)).await
    }
}

/// Context handle passed to every workflow function.
#[derive(Clone)]
pub struct WorkflowContext {
    env: SharedEnvironment,
    spawner: SpawnHandle,
    scope: CancellationScope,
    signal_channels: Arc<Mutex<NamedSignalChannels>>,
    query_handlers: Arc<Mutex<NamedQueryHandlers>>,
}

impl WorkflowContext {
    /// Build a context over an environment and register the default
    /// signal, query, and cancel routing.
    pub fn new(env: SharedEnvironment, spawner: SpawnHandle, scope: CancellationScope) -> Self {
        let signal_channels: Arc<Mutex<NamedSignalChannels>> = Arc::new(Mutex::new(HashMap::new()));
        let query_handlers: Arc<Mutex<NamedQueryHandlers>> = Arc::new(Mutex::new(HashMap::new()));

        {
            let mut guard = env.lock().unwrap();

            let channels = signal_channels.clone();
            guard.register_signal_handler(Box::new(move |name, input| {
                let mut map = channels.lock().unwrap();
                let (tx, _) = map
                    .entry(name.to_string())
                    .or_insert_with(unbounded_channel);
                if tx.try_send(input).is_err() {
                    tracing::warn!(signal = name, "dropping signal delivered to closed channel");
                }
            }));

            let handlers = query_handlers.clone();
            guard.register_query_handler(Box::new(move |query_type, args| {
                let mut map = handlers.lock().unwrap();
                match map.get_mut(query_type) {
                    Some(handler) => handler(args),
                    None => Err(WindlassError::QueryFailed(format!(
                        "unknown queryType {query_type}"
                    ))),
                }
            }));

            let root = scope.clone();
            guard.register_cancel_handler(Box::new(move || root.cancel()));
        }

        Self {
            env,
            spawner,
            scope,
            signal_channels,
            query_handlers,
        }
    }

    pub fn workflow_info(&self) -> WorkflowInfo {
        self.env.lock().unwrap().workflow_info()
    }

    /// Current workflow time. Deterministic: advances with the replay
    /// clock, never with the host clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.env.lock().unwrap().now()
    }

    pub fn is_replaying(&self) -> bool {
        self.env.lock().unwrap().is_replaying()
    }

    /// Spawn a child coroutine on the workflow's dispatcher.
    pub fn spawn<F>(&self, name: impl Into<String>, future: F) -> u64
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.spawner.spawn(name, future)
    }

    /// The scope governing this context.
    pub fn scope(&self) -> &CancellationScope {
        &self.scope
    }

    /// Derive a context whose operations are governed by a child scope.
    pub fn with_child_scope(&self) -> (WorkflowContext, CancellationScope) {
        let child = self.scope.child();
        let mut ctx = self.clone();
        ctx.scope = child.clone();
        (ctx, child)
    }

    /// Suspend until the workflow is cancelled.
    pub async fn canceled(&self) {
        self.scope.canceled().await
    }

    /// Deterministic channel scoped to this workflow.
    pub fn new_channel<T>(&self, capacity: usize) -> (Sender<T>, Receiver<T>) {
        crate::channel::channel(capacity)
    }

    /// Receiver of the named signal channel. Signals delivered before the
    /// first call are buffered.
    pub fn signal_channel(&self, name: &str) -> Receiver<Vec<u8>> {
        let mut map = self.signal_channels.lock().unwrap();
        let (_, rx) = map
            .entry(name.to_string())
            .or_insert_with(unbounded_channel);
        rx.clone()
    }

    /// Register a query handler for the given query type.
    pub fn set_query_handler<F>(&self, query_type: &str, handler: F)
    where
        F: FnMut(Vec<u8>) -> WindlassResult<Vec<u8>> + Send + 'static,
    {
        self.query_handlers
            .lock()
            .unwrap()
            .insert(query_type.to_string(), Box::new(handler));
    }

    /// Schedule an activity and suspend until it closes.
    pub async fn execute_activity(
        &self,
        activity_type: &str,
        input: Option<Vec<u8>>,
        options: ActivityOptions,
    ) -> WindlassResult<Vec<u8>> {
        let (future, completer) = completable();
        let activity_id = {
            let mut env = self.env.lock().unwrap();
            env.execute_activity(
                ExecuteActivityParams {
                    activity_type: ActivityType {
                        name: activity_type.to_string(),
                    },
                    input,
                    options,
                },
                completer.into_result_handler(),
            )
        };

        let env = self.env.clone();
        let on_cancel: Box<dyn FnOnce() + Send> = Box::new(move || {
            env.lock().unwrap().request_cancel_activity(&activity_id);
        });
        await_with_cancel(future, self.scope.clone(), Some(on_cancel)).await
    }

    /// Run a local activity and suspend until its marker resolves.
    pub async fn execute_local_activity(
        &self,
        params: ExecuteLocalActivityParams,
    ) -> WindlassResult<Vec<u8>> {
        let (future, completer) = completable();
        let activity_id = {
            let mut env = self.env.lock().unwrap();
            env.execute_local_activity(params, completer.into_result_handler())
        };

        let env = self.env.clone();
        let on_cancel: Box<dyn FnOnce() + Send> = Box::new(move || {
            env.lock().unwrap().request_cancel_local_activity(&activity_id);
        });
        await_with_cancel(future, self.scope.clone(), Some(on_cancel)).await
    }

    /// Start a timer. The handle exposes the timer id for explicit
    /// cancellation.
    pub fn start_timer(&self, duration: Duration) -> TimerHandle {
        let (future, completer) = completable();
        let duration =
            chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX);
        let timer_id = {
            let mut env = self.env.lock().unwrap();
            env.new_timer(duration, completer.into_result_handler())
        };
        TimerHandle {
            timer_id,
            future,
            context: self.clone(),
        }
    }

    /// Suspend for the given duration of workflow time.
    pub async fn sleep(&self, duration: Duration) -> WindlassResult<()> {
        self.start_timer(duration).wait().await
    }

    /// Cancel a timer by id. The awaiting coroutine resolves with
    /// `CanceledError` without waiting for server acknowledgement.
    pub fn cancel_timer(&self, timer_id: &str) {
        self.env.lock().unwrap().request_cancel_timer(timer_id);
    }

    /// Start a child workflow, returning a handle exposing both the
    /// started and the result futures.
    pub fn start_child_workflow(
        &self,
        workflow_type: &str,
        input: Option<Vec<u8>>,
        options: ChildWorkflowOptions,
    ) -> WindlassResult<ChildWorkflowHandle> {
        let (result_future, result_completer) = completable();
        let (started_future, started_completer) = completable();

        let workflow_id = {
            let mut env = self.env.lock().unwrap();
            env.execute_child_workflow(
                ExecuteChildWorkflowParams {
                    workflow_type: WorkflowType {
                        name: workflow_type.to_string(),
                    },
                    input,
                    options,
                },
                result_completer.into_result_handler(),
                Box::new(move |started| started_completer.complete(started)),
            )?
        };

        Ok(ChildWorkflowHandle {
            workflow_id,
            started: started_future,
            result: result_future,
            context: self.clone(),
        })
    }

    /// Start a child workflow and suspend until it closes.
    pub async fn execute_child_workflow(
        &self,
        workflow_type: &str,
        input: Option<Vec<u8>>,
        options: ChildWorkflowOptions,
    ) -> WindlassResult<Vec<u8>> {
        self.start_child_workflow(workflow_type, input, options)?
            .result()
            .await
    }

    /// Signal another workflow execution and suspend until the service
    /// accepts or rejects the signal.
    pub async fn signal_external_workflow(
        &self,
        domain: &str,
        workflow_id: &str,
        run_id: &str,
        signal_name: &str,
        input: Vec<u8>,
    ) -> WindlassResult<()> {
        let (future, completer) = completable();
        {
            let mut env = self.env.lock().unwrap();
            env.signal_external_workflow(
                domain,
                workflow_id,
                run_id,
                signal_name,
                input,
                false,
                completer.into_result_handler(),
            );
        }
        future.await.map(|_| ())
    }

    /// Request cancellation of another workflow execution and suspend
    /// until the request is delivered.
    pub async fn request_cancel_external_workflow(
        &self,
        domain: &str,
        workflow_id: &str,
        run_id: &str,
    ) -> WindlassResult<()> {
        let (future, completer) = completable();
        {
            let mut env = self.env.lock().unwrap();
            env.request_cancel_external_workflow(
                domain,
                workflow_id,
                run_id,
                completer.into_result_handler(),
            );
        }
        future.await.map(|_| ())
    }

    /// Execute a non-deterministic closure exactly once, recording its
    /// value in history. Replays return the recorded value.
    pub fn side_effect<T, F>(&self, f: F) -> WindlassResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T + Send + 'static,
    {
        let mut env = self.env.lock().unwrap();
        let converter = env.data_converter();
        let encoder = converter.clone();
        let bytes = env.side_effect(Box::new(move || {
            encode(encoder.as_ref(), &f()).map_err(|e| WindlassError::Encoding(e.to_string()))
        }))?;
        decode(converter.as_ref(), &bytes).map_err(|e| WindlassError::Encoding(e.to_string()))
    }

    /// Like [`WorkflowContext::side_effect`], but re-evaluated on every
    /// live execution and recorded only when the encoded value changes.
    pub fn mutable_side_effect<T, F>(&self, id: &str, f: F) -> WindlassResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T + Send + 'static,
    {
        let mut env = self.env.lock().unwrap();
        let converter = env.data_converter();
        let encoder = converter.clone();
        let bytes = env.mutable_side_effect(
            id,
            Box::new(move || {
                encode(encoder.as_ref(), &f()).expect("failed to encode mutable side effect value")
            }),
            Box::new(|a, b| a == b),
        );
        decode(converter.as_ref(), &bytes).map_err(|e| WindlassError::Encoding(e.to_string()))
    }

    /// Version gate for backwards-incompatible workflow code changes.
    pub fn get_version(
        &self,
        change_id: &str,
        min_supported: Version,
        max_supported: Version,
    ) -> Version {
        self.env
            .lock()
            .unwrap()
            .get_version(change_id, min_supported, max_supported)
    }

    /// Upsert search attributes on this execution. Fails on an empty map
    /// without emitting a decision.
    pub fn upsert_search_attributes(
        &self,
        attributes: HashMap<String, serde_json::Value>,
    ) -> WindlassResult<()> {
        self.env.lock().unwrap().upsert_search_attributes(attributes)
    }

    /// Build the continue-as-new control signal for the caller to return
    /// as its error.
    pub fn continue_as_new(
        &self,
        workflow_type: &str,
        input: Vec<u8>,
        mut options: ContinueAsNewOptions,
    ) -> WindlassError {
        if options.task_list.is_empty() {
            options.task_list = self.workflow_info().task_list;
        }
        ContinueAsNewError::new(workflow_type, input, options).into()
    }
}

/// Await an environment-backed future under a cancellation scope. The
/// first poll after the scope cancels fires `on_cancel` exactly once; the
/// future itself still resolves through the operation's waiter, which
/// reports `CanceledError` unless the operation waits for confirmation.
async fn await_with_cancel(
    future: WorkflowFuture<Result<Vec<u8>, WindlassError>>,
    scope: CancellationScope,
    mut on_cancel: Option<Box<dyn FnOnce() + Send>>,
) -> WindlassResult<Vec<u8>> {
    let mut future = future;
    std::future::poll_fn(move |cx| {
        if let Poll::Ready(result) = Pin::new(&mut future).poll(cx) {
            return Poll::Ready(result);
        }
        if scope.is_canceled() {
            if let Some(cancel) = on_cancel.take() {
                cancel();
            }
            // Poll again: the cancel may have resolved the waiter
            // synchronously.
            if let Poll::Ready(result) = Pin::new(&mut future).poll(cx) {
                return Poll::Ready(result);
            }
        } else {
            scope.register_waker(cx.waker());
        }
        Poll::Pending
    })
    .await
}
