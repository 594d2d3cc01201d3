//! Deterministic cooperative task dispatcher.
//!
//! One workflow runs on exactly one logical thread. The dispatcher owns
//! every coroutine of that workflow and polls them in spawn order until all
//! are blocked at a suspension point, which makes execution reproducible
//! during replay: the same history always drives the same interleaving.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

use futures::task::ArcWake;

/// Task state as seen by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Ready,
    Blocked,
    Completed,
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskState::Ready => write!(f, "ready"),
            TaskState::Blocked => write!(f, "blocked"),
            TaskState::Completed => write!(f, "completed"),
        }
    }
}

struct WakeFlag(AtomicBool);

impl ArcWake for WakeFlag {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.0.store(true, Ordering::SeqCst);
    }
}

/// A coroutine owned by the dispatcher.
struct WorkflowTask {
    id: u64,
    name: String,
    future: Pin<Box<dyn Future<Output = ()> + Send>>,
    state: TaskState,
    /// Set by wakers from channels, futures, and scopes. New tasks start
    /// flagged so they get their first poll.
    wake_flag: Arc<WakeFlag>,
}

impl WorkflowTask {
    fn new<F>(id: u64, name: String, future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            id,
            name,
            future: Box::pin(future),
            state: TaskState::Ready,
            wake_flag: Arc::new(WakeFlag(AtomicBool::new(true))),
        }
    }
}

struct SpawnQueue {
    pending: Mutex<Vec<WorkflowTask>>,
    sequence: AtomicU64,
}

/// Clonable handle for spawning coroutines, usable from inside running
/// workflow code. Spawned tasks join the poll order at the next pass.
#[derive(Clone)]
pub struct SpawnHandle {
    queue: Arc<SpawnQueue>,
}

impl SpawnHandle {
    /// Spawn a coroutine. Ids are assigned in spawn order and determine
    /// polling priority.
    pub fn spawn<F>(&self, name: impl Into<String>, future: F) -> u64
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let id = self.queue.sequence.fetch_add(1, Ordering::SeqCst);
        let task = WorkflowTask::new(id, name.into(), future);
        self.queue.pending.lock().unwrap().push(task);
        id
    }
}

/// Deterministic scheduler for one workflow execution.
pub struct Dispatcher {
    tasks: Vec<WorkflowTask>,
    queue: Arc<SpawnQueue>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            queue: Arc::new(SpawnQueue {
                pending: Mutex::new(Vec::new()),
                sequence: AtomicU64::new(0),
            }),
        }
    }

    pub fn handle(&self) -> SpawnHandle {
        SpawnHandle {
            queue: self.queue.clone(),
        }
    }

    fn drain_pending(&mut self) -> bool {
        let mut pending = self.queue.pending.lock().unwrap();
        if pending.is_empty() {
            return false;
        }
        tracing::trace!(count = pending.len(), "adding spawned tasks");
        self.tasks.append(&mut pending);
        true
    }

    /// Run every woken task in spawn order until no task has a pending
    /// wake. Returns true when every task has completed.
    ///
    /// Each pass polls tasks whose wake flag is set; wakes raised during a
    /// pass (channel sends, future completions) are picked up by the next
    /// pass, so resumption order equals the order tasks became runnable
    /// with ties broken by spawn order.
    pub fn run_until_all_blocked(&mut self) -> bool {
        loop {
            let spawned = self.drain_pending();
            let mut polled_any = false;

            for task in &mut self.tasks {
                if task.state == TaskState::Completed {
                    continue;
                }
                if !task.wake_flag.0.swap(false, Ordering::SeqCst) {
                    continue;
                }
                polled_any = true;

                let waker: Waker = futures::task::waker(task.wake_flag.clone());
                let mut cx = Context::from_waker(&waker);
                tracing::trace!(task_id = task.id, name = %task.name, "polling task");
                match task.future.as_mut().poll(&mut cx) {
                    Poll::Ready(()) => {
                        tracing::trace!(task_id = task.id, name = %task.name, "task completed");
                        task.state = TaskState::Completed;
                    }
                    Poll::Pending => {
                        task.state = TaskState::Blocked;
                    }
                }
            }

            if !polled_any && !spawned && self.queue.pending.lock().unwrap().is_empty() {
                break;
            }
        }

        self.tasks.iter().all(|t| t.state == TaskState::Completed)
    }

    /// Human-readable dump of every coroutine, for the stack-trace query.
    pub fn stack_trace(&self) -> String {
        let mut out = String::new();
        for task in &self.tasks {
            out.push_str(&format!(
                "coroutine {} [{}]: {}\n",
                task.id, task.name, task.state
            ));
        }
        out
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn blocked_task_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.state == TaskState::Blocked)
            .count()
    }

    pub fn completed_task_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.state == TaskState::Completed)
            .count()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
