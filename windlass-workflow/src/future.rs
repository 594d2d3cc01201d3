//! Completable futures bridging the environment's callback style into
//! `async` workflow code.
//!
//! Environment operations (schedule activity, start timer, ...) take a
//! completion callback that fires when the matching history event is
//! applied. Workflow code wants to `.await`. A [`WorkflowFuture`] is the
//! awaitable half; its [`Completer`] is consumed on completion, so a result
//! can be delivered at most once by construction.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

use windlass_core::WindlassError;

/// Callback fired with the outcome of an environment operation.
pub type ResultHandler = Box<dyn FnOnce(Result<Vec<u8>, WindlassError>) + Send>;

enum State<T> {
    Pending(VecDeque<Waker>),
    Ready(T),
    Taken,
}

struct Shared<T> {
    state: State<T>,
}

/// Awaitable half of a completable pair.
pub struct WorkflowFuture<T> {
    shared: Arc<Mutex<Shared<T>>>,
}

impl<T> Clone for WorkflowFuture<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> WorkflowFuture<T> {
    /// Whether a result has been delivered (and possibly already taken).
    pub fn is_ready(&self) -> bool {
        !matches!(
            self.shared.lock().unwrap().state,
            State::Pending(_)
        )
    }
}

impl<T> Future for WorkflowFuture<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut shared = self.shared.lock().unwrap();
        match &mut shared.state {
            State::Pending(wakers) => {
                wakers.push_back(cx.waker().clone());
                Poll::Pending
            }
            State::Ready(_) => {
                let State::Ready(value) = std::mem::replace(&mut shared.state, State::Taken)
                else {
                    unreachable!()
                };
                Poll::Ready(value)
            }
            State::Taken => panic!("workflow future polled after completion was taken"),
        }
    }
}

/// Completing half. Consumed on completion, so double delivery cannot
/// compile.
pub struct Completer<T> {
    shared: Arc<Mutex<Shared<T>>>,
}

impl<T> Completer<T> {
    pub fn complete(self, value: T) {
        let mut shared = self.shared.lock().unwrap();
        let previous = std::mem::replace(&mut shared.state, State::Ready(value));
        match previous {
            State::Pending(wakers) => {
                drop(shared);
                for waker in wakers {
                    waker.wake();
                }
            }
            _ => panic!("workflow future completed twice"),
        }
    }
}

impl Completer<Result<Vec<u8>, WindlassError>> {
    /// Adapt into the callback shape the environment expects.
    pub fn into_result_handler(self) -> ResultHandler {
        Box::new(move |result| self.complete(result))
    }
}

/// Create a connected future/completer pair.
pub fn completable<T>() -> (WorkflowFuture<T>, Completer<T>) {
    let shared = Arc::new(Mutex::new(Shared {
        state: State::Pending(VecDeque::new()),
    }));
    (
        WorkflowFuture {
            shared: shared.clone(),
        },
        Completer { shared },
    )
}
