//! Cancellation scopes.
//!
//! Scopes form a tree rooted at the workflow itself. Cancelling a scope
//! marks every descendant cancelled and wakes every coroutine waiting on
//! it; operations awaited under a cancelled scope resolve with
//! `CanceledError`. Cancelling an already-cancelled scope is a no-op.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

struct ScopeState {
    canceled: bool,
    children: Vec<CancellationScope>,
    wakers: VecDeque<Waker>,
}

/// One node in the cancellation tree.
#[derive(Clone)]
pub struct CancellationScope {
    inner: Arc<Mutex<ScopeState>>,
}

impl CancellationScope {
    /// Root scope of a workflow execution.
    pub fn new_root() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ScopeState {
                canceled: false,
                children: Vec::new(),
                wakers: VecDeque::new(),
            })),
        }
    }

    /// Create a child scope. A child born under a cancelled parent starts
    /// cancelled.
    pub fn child(&self) -> Self {
        let mut inner = self.inner.lock().unwrap();
        let child = Self {
            inner: Arc::new(Mutex::new(ScopeState {
                canceled: inner.canceled,
                children: Vec::new(),
                wakers: VecDeque::new(),
            })),
        };
        inner.children.push(child.clone());
        child
    }

    /// Cancel this scope and every descendant.
    pub fn cancel(&self) {
        let (children, wakers) = {
            let mut inner = self.inner.lock().unwrap();
            if inner.canceled {
                return;
            }
            inner.canceled = true;
            (
                std::mem::take(&mut inner.children),
                std::mem::take(&mut inner.wakers),
            )
        };
        for waker in wakers {
            waker.wake();
        }
        for child in children {
            child.cancel();
        }
    }

    pub fn is_canceled(&self) -> bool {
        self.inner.lock().unwrap().canceled
    }

    /// Future resolving when this scope is cancelled.
    pub fn canceled(&self) -> CanceledFuture {
        CanceledFuture {
            scope: self.clone(),
        }
    }

    /// Register a waker to fire on cancellation. No-op when already
    /// cancelled; callers check [`CancellationScope::is_canceled`] first.
    pub fn register_waker(&self, waker: &Waker) {
        let mut inner = self.inner.lock().unwrap();
        if !inner.canceled {
            inner.wakers.push_back(waker.clone());
        }
    }
}

/// Future resolving when the scope is cancelled.
pub struct CanceledFuture {
    scope: CancellationScope,
}

impl Future for CanceledFuture {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut inner = self.scope.inner.lock().unwrap();
        if inner.canceled {
            Poll::Ready(())
        } else {
            inner.wakers.push_back(cx.waker().clone());
            Poll::Pending
        }
    }
}
