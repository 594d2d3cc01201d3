//! Multi-way wait over channels and futures.
//!
//! A selector suspends the calling coroutine until one of its registered
//! cases is ready. Cases are evaluated in registration order on every
//! poll, so when several become ready in the same tick the earliest
//! registered one wins on every replay.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::channel::Receiver;

type Case<T> = Box<dyn FnMut(&mut Context<'_>) -> Poll<T> + Send>;

/// Builder-style multi-way wait producing a value of type `T`.
pub struct Selector<T> {
    cases: Vec<Case<T>>,
    default_case: Option<Box<dyn FnOnce() -> T + Send>>,
}

impl<T: Send + 'static> Selector<T> {
    pub fn new() -> Self {
        Self {
            cases: Vec::new(),
            default_case: None,
        }
    }

    /// Wait for a receive on `receiver`. `f` maps the received value
    /// (`None` when the channel closed) to the selector result.
    pub fn add_recv<U, F>(mut self, receiver: &Receiver<U>, mut f: F) -> Self
    where
        U: Send + 'static,
        F: FnMut(Option<U>) -> T + Send + 'static,
    {
        let receiver = receiver.clone();
        self.cases.push(Box::new(move |cx| {
            let mut recv = receiver.recv();
            match Pin::new(&mut recv).poll(cx) {
                Poll::Ready(value) => Poll::Ready(f(value)),
                Poll::Pending => Poll::Pending,
            }
        }));
        self
    }

    /// Wait for `future`. `f` maps its output to the selector result.
    pub fn add_future<U, Fut, F>(mut self, future: Fut, f: F) -> Self
    where
        U: Send + 'static,
        Fut: Future<Output = U> + Send + 'static,
        F: FnOnce(U) -> T + Send + 'static,
    {
        let mut mapped: Pin<Box<dyn Future<Output = T> + Send>> =
            Box::pin(async move { f(future.await) });
        self.cases.push(Box::new(move |cx| mapped.as_mut().poll(cx)));
        self
    }

    /// Result produced when no case is ready at the first poll. Without a
    /// default the selector suspends instead.
    pub fn with_default<F>(mut self, f: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        self.default_case = Some(Box::new(f));
        self
    }

    /// Suspend until a case is ready and return its mapped result.
    pub async fn select(self) -> T {
        SelectFuture { selector: self }.await
    }
}

impl<T: Send + 'static> Default for Selector<T> {
    fn default() -> Self {
        Self::new()
    }
}

struct SelectFuture<T> {
    selector: Selector<T>,
}

impl<T: Send + 'static> Future for SelectFuture<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        for case in this.selector.cases.iter_mut() {
            if let Poll::Ready(value) = case(cx) {
                return Poll::Ready(value);
            }
        }
        if let Some(default_case) = this.selector.default_case.take() {
            return Poll::Ready(default_case());
        }
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::channel;
    use crate::future::completable;

    #[tokio::test]
    async fn ready_channel_wins() {
        let (tx, rx) = channel(1);
        tx.try_send(5).unwrap();

        let result = Selector::new()
            .add_recv(&rx, |v| format!("recv {}", v.unwrap()))
            .select()
            .await;
        assert_eq!(result, "recv 5");
    }

    #[tokio::test]
    async fn registration_order_breaks_ties() {
        let (tx_a, rx_a) = channel(1);
        let (tx_b, rx_b) = channel(1);
        tx_a.try_send("a").unwrap();
        tx_b.try_send("b").unwrap();

        let result = Selector::new()
            .add_recv(&rx_a, |v| v.unwrap())
            .add_recv(&rx_b, |v| v.unwrap())
            .select()
            .await;
        assert_eq!(result, "a");
    }

    #[tokio::test]
    async fn default_fires_when_nothing_ready() {
        let (_tx, rx) = channel::<i32>(1);
        let result = Selector::new()
            .add_recv(&rx, |_| "recv")
            .with_default(|| "default")
            .select()
            .await;
        assert_eq!(result, "default");
    }

    #[tokio::test]
    async fn future_case_resolves() {
        let (future, completer) = completable::<i32>();
        completer.complete(11);
        let result = Selector::new()
            .add_future(future, |v| v * 2)
            .select()
            .await;
        assert_eq!(result, 22);
    }
}
