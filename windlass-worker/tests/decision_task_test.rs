//! Decision task scenarios driven end to end through the task handler,
//! against hand-built histories.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;

use windlass_core::error::is_canceled_error;
use windlass_core::types::{ActivityOptions, ChildWorkflowOptions, NonDeterministicWorkflowPolicy};
use windlass_core::{Decision, DecisionType, WindlassError};
use windlass_core::history::{
    ChildWorkflowExecutionCompletedEventAttributes, ChildWorkflowExecutionStartedEventAttributes,
    EventAttributes, StartChildWorkflowExecutionFailedEventAttributes,
    StartChildWorkflowExecutionInitiatedEventAttributes,
};
use windlass_worker::{
    ExecutionError, QueryTaskResult, Registry, WorkerOptions, WorkflowExecutionKey,
};
use windlass_workflow::state_machine::LOCAL_ACTIVITY_MARKER_NAME;

fn upper_chain_registry() -> Arc<Registry> {
    let registry = Arc::new(Registry::new());
    registry
        .register_workflow("UpperChain", |ctx, input| async move {
            let first = ctx
                .execute_activity("toUpperWithDelay", input, ActivityOptions::default())
                .await?;
            let second = ctx
                .execute_activity("toUpper", Some(first), ActivityOptions::default())
                .await?;
            Ok(second)
        })
        .unwrap();
    registry
}

#[test]
fn activity_chain_emits_one_schedule_per_task() {
    let worker = test_worker(upper_chain_registry(), WorkerOptions::default());

    // Task 1: fresh start, workflow blocks on the first activity.
    let task1 = decision_task(
        "wf-chain",
        "run-chain",
        "UpperChain",
        vec![
            workflow_started(1, "UpperChain", b"hello"),
            decision_task_scheduled(2),
            decision_task_started(3),
        ],
        0,
    );
    let result1 = worker.handler.process_decision_task(task1).unwrap();
    assert_eq!(result1.decisions.len(), 1);
    match &result1.decisions[0] {
        Decision::ScheduleActivityTask(attrs) => {
            assert_eq!(attrs.activity_id, "0");
            assert_eq!(attrs.activity_type.name, "toUpperWithDelay");
            assert_eq!(attrs.task_list.name, TEST_TASK_LIST);
        }
        other => panic!("expected ScheduleActivityTask, got {other:?}"),
    }

    // Task 2: first activity completed, workflow schedules the second.
    let task2 = decision_task(
        "wf-chain",
        "run-chain",
        "UpperChain",
        vec![
            workflow_started(1, "UpperChain", b"hello"),
            decision_task_scheduled(2),
            decision_task_started(3),
            decision_task_completed(4),
            activity_scheduled(5, "0", "toUpperWithDelay"),
            activity_started(6, 5),
            activity_completed(7, 5, b"HELLO"),
            decision_task_scheduled(8),
            decision_task_started(9),
        ],
        3,
    );
    let result2 = worker.handler.process_decision_task(task2).unwrap();
    assert_eq!(result2.decisions.len(), 1);
    match &result2.decisions[0] {
        Decision::ScheduleActivityTask(attrs) => {
            assert_eq!(attrs.activity_id, "1");
            assert_eq!(attrs.activity_type.name, "toUpper");
            assert_eq!(attrs.input, Some(b"HELLO".to_vec()));
        }
        other => panic!("expected ScheduleActivityTask, got {other:?}"),
    }

    // Task 3: second activity completed, workflow closes.
    let task3 = decision_task(
        "wf-chain",
        "run-chain",
        "UpperChain",
        vec![
            workflow_started(1, "UpperChain", b"hello"),
            decision_task_scheduled(2),
            decision_task_started(3),
            decision_task_completed(4),
            activity_scheduled(5, "0", "toUpperWithDelay"),
            activity_started(6, 5),
            activity_completed(7, 5, b"HELLO"),
            decision_task_scheduled(8),
            decision_task_started(9),
            decision_task_completed(10),
            activity_scheduled(11, "1", "toUpper"),
            activity_started(12, 11),
            activity_completed(13, 11, b"HELLO"),
            decision_task_scheduled(14),
            decision_task_started(15),
        ],
        9,
    );
    let result3 = worker.handler.process_decision_task(task3).unwrap();
    assert_eq!(result3.decisions.len(), 1);
    match &result3.decisions[0] {
        Decision::CompleteWorkflowExecution(attrs) => {
            assert_eq!(attrs.result, Some(b"HELLO".to_vec()));
        }
        other => panic!("expected CompleteWorkflowExecution, got {other:?}"),
    }

    // Closed workflows leave the sticky cache.
    assert!(worker
        .cache
        .get(&WorkflowExecutionKey {
            workflow_id: "wf-chain".into(),
            run_id: "run-chain".into(),
        })
        .is_none());
}

#[test]
fn sticky_and_full_replay_produce_identical_decisions() {
    let full_history = |n: usize| -> Vec<_> {
        let events = vec![
            workflow_started(1, "UpperChain", b"hello"),
            decision_task_scheduled(2),
            decision_task_started(3),
            decision_task_completed(4),
            activity_scheduled(5, "0", "toUpperWithDelay"),
            activity_started(6, 5),
            activity_completed(7, 5, b"HELLO"),
            decision_task_scheduled(8),
            decision_task_started(9),
        ];
        events.into_iter().take(n).collect()
    };

    // Sticky worker: two incremental tasks.
    let sticky = test_worker(upper_chain_registry(), WorkerOptions::default());
    sticky
        .handler
        .process_decision_task(decision_task(
            "wf-s",
            "run-s",
            "UpperChain",
            full_history(3),
            0,
        ))
        .unwrap();
    let sticky_result = sticky
        .handler
        .process_decision_task(decision_task(
            "wf-s",
            "run-s",
            "UpperChain",
            full_history(9),
            3,
        ))
        .unwrap();

    // Non-sticky worker: cold replay of the same full history.
    let cold = test_worker(
        upper_chain_registry(),
        WorkerOptions {
            disable_sticky_execution: true,
            ..Default::default()
        },
    );
    let cold_result = cold
        .handler
        .process_decision_task(decision_task(
            "wf-c",
            "run-c",
            "UpperChain",
            full_history(9),
            3,
        ))
        .unwrap();

    assert_eq!(sticky_result.decisions, cold_result.decisions);
}

#[test]
fn failed_activity_fails_workflow_with_original_reason() {
    let registry = Arc::new(Registry::new());
    registry
        .register_workflow("FailChain", |ctx, _input| async move {
            let result = ctx
                .execute_activity("Fail", None, ActivityOptions::default())
                .await?;
            Ok(result)
        })
        .unwrap();
    let worker = test_worker(registry, WorkerOptions::default());

    worker
        .handler
        .process_decision_task(decision_task(
            "wf-fail",
            "run-fail",
            "FailChain",
            vec![
                workflow_started(1, "FailChain", b""),
                decision_task_scheduled(2),
                decision_task_started(3),
            ],
            0,
        ))
        .unwrap();

    let result = worker
        .handler
        .process_decision_task(decision_task(
            "wf-fail",
            "run-fail",
            "FailChain",
            vec![
                workflow_started(1, "FailChain", b""),
                decision_task_scheduled(2),
                decision_task_started(3),
                decision_task_completed(4),
                activity_scheduled(5, "0", "Fail"),
                activity_started(6, 5),
                activity_failed(7, 5, "failing-on-purpose", b"attempt-3"),
                decision_task_scheduled(8),
                decision_task_started(9),
            ],
            3,
        ))
        .unwrap();

    assert_eq!(result.decisions.len(), 1);
    match &result.decisions[0] {
        Decision::FailWorkflowExecution(attrs) => {
            assert_eq!(attrs.reason.as_deref(), Some("failing-on-purpose"));
            assert_eq!(attrs.details, Some(b"attempt-3".to_vec()));
        }
        other => panic!("expected FailWorkflowExecution, got {other:?}"),
    }
}

#[test]
fn timer_cancel_emits_exactly_one_cancel_decision() {
    let registry = Arc::new(Registry::new());
    registry
        .register_workflow("TimerCancel", |ctx, _input| async move {
            let timer = ctx.start_timer(Duration::from_secs(60));
            let timer_id = timer.timer_id.clone().expect("timer was scheduled");
            let cancel_signal = ctx.signal_channel("cancel-timer");
            let _ = cancel_signal.recv().await;
            ctx.cancel_timer(&timer_id);
            match timer.wait().await {
                Err(e) if is_canceled_error(&e) => Ok(b"timer-canceled".to_vec()),
                Err(e) => Err(e),
                Ok(()) => Ok(b"timer-fired".to_vec()),
            }
        })
        .unwrap();
    let worker = test_worker(registry, WorkerOptions::default());

    let result1 = worker
        .handler
        .process_decision_task(decision_task(
            "wf-timer",
            "run-timer",
            "TimerCancel",
            vec![
                workflow_started(1, "TimerCancel", b""),
                decision_task_scheduled(2),
                decision_task_started(3),
            ],
            0,
        ))
        .unwrap();
    assert_eq!(result1.decisions.len(), 1);
    assert_eq!(result1.decisions[0].decision_type(), DecisionType::StartTimer);

    let result2 = worker
        .handler
        .process_decision_task(decision_task(
            "wf-timer",
            "run-timer",
            "TimerCancel",
            vec![
                workflow_started(1, "TimerCancel", b""),
                decision_task_scheduled(2),
                decision_task_started(3),
                decision_task_completed(4),
                timer_started(5, "0"),
                workflow_signaled(6, "cancel-timer", b"go"),
                decision_task_scheduled(7),
                decision_task_started(8),
            ],
            3,
        ))
        .unwrap();

    let cancel_decisions: Vec<&Decision> = result2
        .decisions
        .iter()
        .filter(|d| d.decision_type() == DecisionType::CancelTimer)
        .collect();
    assert_eq!(cancel_decisions.len(), 1);
    match cancel_decisions[0] {
        Decision::CancelTimer(attrs) => assert_eq!(attrs.timer_id, "0"),
        other => panic!("expected CancelTimer, got {other:?}"),
    }
    match result2.decisions.last().unwrap() {
        Decision::CompleteWorkflowExecution(attrs) => {
            assert_eq!(attrs.result, Some(b"timer-canceled".to_vec()));
        }
        other => panic!("expected CompleteWorkflowExecution, got {other:?}"),
    }
}

#[test]
fn signal_buffered_in_history_reaches_channel() {
    let registry = Arc::new(Registry::new());
    registry
        .register_workflow("SignalEcho", |ctx, _input| async move {
            let signals = ctx.signal_channel("echo");
            let payload = signals.recv().await.unwrap_or_default();
            Ok(payload)
        })
        .unwrap();
    let worker = test_worker(registry, WorkerOptions::default());

    let result1 = worker
        .handler
        .process_decision_task(decision_task(
            "wf-sig",
            "run-sig",
            "SignalEcho",
            vec![
                workflow_started(1, "SignalEcho", b""),
                decision_task_scheduled(2),
                decision_task_started(3),
            ],
            0,
        ))
        .unwrap();
    assert!(result1.decisions.is_empty());

    let result2 = worker
        .handler
        .process_decision_task(decision_task(
            "wf-sig",
            "run-sig",
            "SignalEcho",
            vec![
                workflow_started(1, "SignalEcho", b""),
                decision_task_scheduled(2),
                decision_task_started(3),
                decision_task_completed(4),
                workflow_signaled(5, "echo", b"ping"),
                decision_task_scheduled(6),
                decision_task_started(7),
            ],
            3,
        ))
        .unwrap();
    match result2.decisions.last().unwrap() {
        Decision::CompleteWorkflowExecution(attrs) => {
            assert_eq!(attrs.result, Some(b"ping".to_vec()));
        }
        other => panic!("expected CompleteWorkflowExecution, got {other:?}"),
    }
}

#[test]
fn cancel_request_cancels_workflow() {
    let registry = Arc::new(Registry::new());
    registry
        .register_workflow("CancelAware", |ctx, _input| async move {
            ctx.canceled().await;
            Err(windlass_core::CanceledError::default().into())
        })
        .unwrap();
    let worker = test_worker(registry, WorkerOptions::default());

    let result1 = worker
        .handler
        .process_decision_task(decision_task(
            "wf-cancel",
            "run-cancel",
            "CancelAware",
            vec![
                workflow_started(1, "CancelAware", b""),
                decision_task_scheduled(2),
                decision_task_started(3),
            ],
            0,
        ))
        .unwrap();
    assert!(result1.decisions.is_empty());

    let result2 = worker
        .handler
        .process_decision_task(decision_task(
            "wf-cancel",
            "run-cancel",
            "CancelAware",
            vec![
                workflow_started(1, "CancelAware", b""),
                decision_task_scheduled(2),
                decision_task_started(3),
                decision_task_completed(4),
                cancel_requested(5),
                decision_task_scheduled(6),
                decision_task_started(7),
            ],
            3,
        ))
        .unwrap();
    assert_eq!(result2.decisions.len(), 1);
    assert_eq!(
        result2.decisions[0].decision_type(),
        DecisionType::CancelWorkflowExecution
    );
}

#[test]
fn child_workflow_result_flows_back() {
    let registry = Arc::new(Registry::new());
    registry
        .register_workflow("ChildRunner", |ctx, _input| async move {
            ctx.execute_child_workflow(
                "ChildJob",
                Some(b"child-input".to_vec()),
                ChildWorkflowOptions {
                    workflow_id: "child-1".into(),
                    ..Default::default()
                },
            )
            .await
        })
        .unwrap();
    let worker = test_worker(registry, WorkerOptions::default());

    let result1 = worker
        .handler
        .process_decision_task(decision_task(
            "wf-parent",
            "run-parent",
            "ChildRunner",
            vec![
                workflow_started(1, "ChildRunner", b""),
                decision_task_scheduled(2),
                decision_task_started(3),
            ],
            0,
        ))
        .unwrap();
    assert_eq!(result1.decisions.len(), 1);
    match &result1.decisions[0] {
        Decision::StartChildWorkflowExecution(attrs) => {
            assert_eq!(attrs.workflow_id, "child-1");
            assert_eq!(attrs.workflow_type.name, "ChildJob");
        }
        other => panic!("expected StartChildWorkflowExecution, got {other:?}"),
    }

    let child_execution = windlass_core::WorkflowExecution::new("child-1", "child-run-1");
    let result2 = worker
        .handler
        .process_decision_task(decision_task(
            "wf-parent",
            "run-parent",
            "ChildRunner",
            vec![
                workflow_started(1, "ChildRunner", b""),
                decision_task_scheduled(2),
                decision_task_started(3),
                decision_task_completed(4),
                event(
                    5,
                    EventAttributes::StartChildWorkflowExecutionInitiated(Box::new(
                        StartChildWorkflowExecutionInitiatedEventAttributes {
                            domain: TEST_DOMAIN.into(),
                            workflow_id: "child-1".into(),
                            decision_task_completed_event_id: 4,
                            ..Default::default()
                        },
                    )),
                ),
                event(
                    6,
                    EventAttributes::ChildWorkflowExecutionStarted(Box::new(
                        ChildWorkflowExecutionStartedEventAttributes {
                            domain: TEST_DOMAIN.into(),
                            initiated_event_id: 5,
                            workflow_execution: child_execution.clone(),
                            ..Default::default()
                        },
                    )),
                ),
                event(
                    7,
                    EventAttributes::ChildWorkflowExecutionCompleted(Box::new(
                        ChildWorkflowExecutionCompletedEventAttributes {
                            result: Some(b"child-done".to_vec()),
                            domain: TEST_DOMAIN.into(),
                            workflow_execution: child_execution,
                            initiated_event_id: 5,
                            started_event_id: 6,
                            ..Default::default()
                        },
                    )),
                ),
                decision_task_scheduled(8),
                decision_task_started(9),
            ],
            3,
        ))
        .unwrap();
    match result2.decisions.last().unwrap() {
        Decision::CompleteWorkflowExecution(attrs) => {
            assert_eq!(attrs.result, Some(b"child-done".to_vec()));
        }
        other => panic!("expected CompleteWorkflowExecution, got {other:?}"),
    }
}

#[test]
fn child_already_started_surfaces_typed_error() {
    let registry = Arc::new(Registry::new());
    registry
        .register_workflow("ChildRunner", |ctx, _input| async move {
            match ctx
                .execute_child_workflow("ChildJob", None, ChildWorkflowOptions {
                    workflow_id: "child-1".into(),
                    ..Default::default()
                })
                .await
            {
                Err(WindlassError::WorkflowAlreadyStarted(_)) => Ok(b"already-started".to_vec()),
                Err(other) => Err(other),
                Ok(result) => Ok(result),
            }
        })
        .unwrap();
    let worker = test_worker(registry, WorkerOptions::default());

    worker
        .handler
        .process_decision_task(decision_task(
            "wf-dup",
            "run-dup",
            "ChildRunner",
            vec![
                workflow_started(1, "ChildRunner", b""),
                decision_task_scheduled(2),
                decision_task_started(3),
            ],
            0,
        ))
        .unwrap();

    let result = worker
        .handler
        .process_decision_task(decision_task(
            "wf-dup",
            "run-dup",
            "ChildRunner",
            vec![
                workflow_started(1, "ChildRunner", b""),
                decision_task_scheduled(2),
                decision_task_started(3),
                decision_task_completed(4),
                event(
                    5,
                    EventAttributes::StartChildWorkflowExecutionFailed(Box::new(
                        StartChildWorkflowExecutionFailedEventAttributes {
                            domain: TEST_DOMAIN.into(),
                            workflow_id: "child-1".into(),
                            initiated_event_id: 0,
                            decision_task_completed_event_id: 4,
                            ..Default::default()
                        },
                    )),
                ),
                decision_task_scheduled(6),
                decision_task_started(7),
            ],
            3,
        ))
        .unwrap();
    match result.decisions.last().unwrap() {
        Decision::CompleteWorkflowExecution(attrs) => {
            assert_eq!(attrs.result, Some(b"already-started".to_vec()));
        }
        other => panic!("expected CompleteWorkflowExecution, got {other:?}"),
    }
}

#[test]
fn workflow_panic_blocks_workflow_by_default() {
    let registry = Arc::new(Registry::new());
    registry
        .register_workflow("Panics", |_ctx, _input| async move {
            if true {
                panic!("workflow bug");
            }
            Ok(Vec::new())
        })
        .unwrap();
    let worker = test_worker(registry, WorkerOptions::default());

    let result = worker.handler.process_decision_task(decision_task(
        "wf-panic",
        "run-panic",
        "Panics",
        vec![
            workflow_started(1, "Panics", b""),
            decision_task_scheduled(2),
            decision_task_started(3),
        ],
        0,
    ));
    match result {
        Err(ExecutionError::Windlass(WindlassError::Panic(p))) => {
            assert!(p.message.contains("workflow bug"));
        }
        other => panic!("expected workflow panic to fail the task, got {other:?}"),
    }
}

#[test]
fn workflow_panic_fails_workflow_under_fail_policy() {
    let registry = Arc::new(Registry::new());
    registry
        .register_workflow("Panics", |_ctx, _input| async move {
            if true {
                panic!("workflow bug");
            }
            Ok(Vec::new())
        })
        .unwrap();
    let worker = test_worker(
        registry,
        WorkerOptions {
            non_deterministic_workflow_policy: NonDeterministicWorkflowPolicy::FailWorkflow,
            ..Default::default()
        },
    );

    let result = worker
        .handler
        .process_decision_task(decision_task(
            "wf-panic",
            "run-panic",
            "Panics",
            vec![
                workflow_started(1, "Panics", b""),
                decision_task_scheduled(2),
                decision_task_started(3),
            ],
            0,
        ))
        .unwrap();
    assert_eq!(result.decisions.len(), 1);
    match &result.decisions[0] {
        Decision::FailWorkflowExecution(attrs) => {
            assert_eq!(attrs.reason.as_deref(), Some("cadenceInternal:Panic"));
        }
        other => panic!("expected FailWorkflowExecution, got {other:?}"),
    }
}

#[test]
fn mismatched_history_aborts_decision_task() {
    let worker = test_worker(upper_chain_registry(), WorkerOptions::default());

    // The code schedules an activity, but history claims a timer started.
    let result = worker.handler.process_decision_task(decision_task(
        "wf-div",
        "run-div",
        "UpperChain",
        vec![
            workflow_started(1, "UpperChain", b"hello"),
            decision_task_scheduled(2),
            decision_task_started(3),
            decision_task_completed(4),
            timer_started(5, "0"),
            decision_task_scheduled(6),
            decision_task_started(7),
        ],
        3,
    ));
    match result {
        Err(ExecutionError::IllegalState(message)) => {
            assert!(message.contains("unknown decision"));
        }
        other => panic!("expected IllegalState, got {other:?}"),
    }
}

#[test]
fn oversized_query_result_is_rejected() {
    let registry = Arc::new(Registry::new());
    registry
        .register_workflow("LargeQuery", |ctx, _input| async move {
            ctx.set_query_handler("large_query", |_args| Ok(vec![0u8; 3_000_000]));
            ctx.set_query_handler("small_query", |_args| Ok(b"ok".to_vec()));
            // Park forever; this workflow only answers queries.
            let _ = ctx.signal_channel("never").recv().await;
            Ok(Vec::new())
        })
        .unwrap();
    let worker = test_worker(registry, WorkerOptions::default());

    let task = with_query(
        with_query(
            decision_task(
                "wf-query",
                "run-query",
                "LargeQuery",
                vec![
                    workflow_started(1, "LargeQuery", b""),
                    decision_task_scheduled(2),
                    decision_task_started(3),
                ],
                0,
            ),
            "q-large",
            "large_query",
        ),
        "q-small",
        "small_query",
    );

    let result = worker.handler.process_decision_task(task).unwrap();
    assert_eq!(
        result.query_results["q-large"],
        QueryTaskResult::Failed(
            "query result size (3000000) exceeds limit (2000000)".to_string()
        )
    );
    assert_eq!(
        result.query_results["q-small"],
        QueryTaskResult::Answered(b"ok".to_vec())
    );
}

#[test]
fn stack_trace_query_reports_coroutines() {
    let registry = Arc::new(Registry::new());
    registry
        .register_workflow("Parked", |ctx, _input| async move {
            let _ = ctx.signal_channel("never").recv().await;
            Ok(Vec::new())
        })
        .unwrap();
    let worker = test_worker(registry, WorkerOptions::default());

    let task = with_query(
        decision_task(
            "wf-trace",
            "run-trace",
            "Parked",
            vec![
                workflow_started(1, "Parked", b""),
                decision_task_scheduled(2),
                decision_task_started(3),
            ],
            0,
        ),
        "q-trace",
        "__stack_trace",
    );

    let result = worker.handler.process_decision_task(task).unwrap();
    match &result.query_results["q-trace"] {
        QueryTaskResult::Answered(bytes) => {
            let trace: String = serde_json::from_slice(bytes).unwrap();
            assert!(trace.contains("workflow-root"));
            assert!(trace.contains("blocked"));
        }
        other => panic!("expected answered stack trace, got {other:?}"),
    }
}

#[test]
fn local_activity_resolves_through_marker() {
    let registry = Arc::new(Registry::new());
    registry
        .register_workflow("LocalCompute", |ctx, _input| async move {
            ctx.execute_local_activity(
                windlass_workflow::local_activity::ExecuteLocalActivityParams {
                    activity_type: windlass_core::ActivityType {
                        name: "Compute".into(),
                    },
                    input: None,
                    options: Default::default(),
                    attempt: 0,
                },
            )
            .await
        })
        .unwrap();
    let worker = test_worker(registry, WorkerOptions::default());

    // Task 1: the workflow parks on the pending local activity.
    let result1 = worker
        .handler
        .process_decision_task(decision_task(
            "wf-la",
            "run-la",
            "LocalCompute",
            vec![
                workflow_started(1, "LocalCompute", b""),
                decision_task_scheduled(2),
                decision_task_started(3),
            ],
            0,
        ))
        .unwrap();
    assert!(result1.decisions.is_empty());

    // The local activity worker finishes and feeds the result back in.
    let key = WorkflowExecutionKey {
        workflow_id: "wf-la".into(),
        run_id: "run-la".into(),
    };
    let entry = worker.cache.get(&key).expect("execution stays cached");
    {
        let mut cached = entry.lock().unwrap();
        cached
            .handler
            .process_local_activity_result("0", Ok(b"42".to_vec()), 0)
            .unwrap();
    }

    // Task 2: the marker decision and the completion go out together.
    let result2 = worker
        .handler
        .process_decision_task(decision_task(
            "wf-la",
            "run-la",
            "LocalCompute",
            vec![
                workflow_started(1, "LocalCompute", b""),
                decision_task_scheduled(2),
                decision_task_started(3),
                decision_task_completed(4),
                decision_task_scheduled(5),
                decision_task_started(6),
            ],
            3,
        ))
        .unwrap();

    assert_eq!(result2.decisions.len(), 2);
    match &result2.decisions[0] {
        Decision::RecordMarker(attrs) => {
            assert_eq!(attrs.marker_name, LOCAL_ACTIVITY_MARKER_NAME);
        }
        other => panic!("expected RecordMarker, got {other:?}"),
    }
    match &result2.decisions[1] {
        Decision::CompleteWorkflowExecution(attrs) => {
            assert_eq!(attrs.result, Some(b"42".to_vec()));
        }
        other => panic!("expected CompleteWorkflowExecution, got {other:?}"),
    }
}
