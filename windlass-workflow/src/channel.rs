//! Deterministic channels for coordinating workflow coroutines.
//!
//! Channels are ephemeral, in-memory only, and never recorded to history.
//! They support fan-out/fan-in and pipeline patterns inside a workflow
//! while staying replay-safe: blocked senders and receivers are woken in
//! strict FIFO registration order, so the same interleaving falls out of
//! every replay.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

/// Error returned when sending on a closed channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendError<T>(pub T);

impl<T> fmt::Display for SendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel closed")
    }
}

impl<T: fmt::Debug> std::error::Error for SendError<T> {}

/// Error returned by [`Sender::try_send`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrySendError<T> {
    Full(T),
    Closed(T),
}

impl<T> fmt::Display for TrySendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrySendError::Full(_) => write!(f, "channel full"),
            TrySendError::Closed(_) => write!(f, "channel closed"),
        }
    }
}

impl<T: fmt::Debug> std::error::Error for TrySendError<T> {}

/// Error returned by [`Receiver::try_recv`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryRecvError {
    Empty,
    Closed,
}

impl fmt::Display for TryRecvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TryRecvError::Empty => write!(f, "channel empty"),
            TryRecvError::Closed => write!(f, "channel closed"),
        }
    }
}

impl std::error::Error for TryRecvError {}

struct ChannelInner<T> {
    buffer: VecDeque<T>,
    /// Zero means unbuffered: a send completes only against a waiting
    /// receiver.
    capacity: usize,
    closed: bool,
    sender_count: usize,
    blocked_sends: VecDeque<Waker>,
    blocked_recvs: VecDeque<Waker>,
}

impl<T> ChannelInner<T> {
    fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::new(),
            capacity,
            closed: false,
            sender_count: 1,
            blocked_sends: VecDeque::new(),
            blocked_recvs: VecDeque::new(),
        }
    }

    fn can_send(&self) -> bool {
        if self.closed {
            return false;
        }
        if self.capacity == 0 {
            !self.blocked_recvs.is_empty()
        } else {
            self.buffer.len() < self.capacity
        }
    }

    fn is_closed_for_recv(&self) -> bool {
        self.closed && self.buffer.is_empty()
    }

    fn wake_one_receiver(&mut self) {
        if let Some(waker) = self.blocked_recvs.pop_front() {
            waker.wake();
        }
    }

    fn wake_one_sender(&mut self) {
        if let Some(waker) = self.blocked_sends.pop_front() {
            waker.wake();
        }
    }

    fn wake_all_receivers(&mut self) {
        for waker in self.blocked_recvs.drain(..) {
            waker.wake();
        }
    }
}

/// Sending half of a channel.
pub struct Sender<T> {
    inner: Arc<Mutex<ChannelInner<T>>>,
}

impl<T> Sender<T> {
    /// Send a value, suspending while the buffer is full (or, on an
    /// unbuffered channel, until a receiver is waiting).
    pub fn send(&self, value: T) -> SendFuture<T> {
        SendFuture {
            inner: self.inner.clone(),
            value: Some(value),
        }
    }

    /// Send without suspending.
    pub fn try_send(&self, value: T) -> Result<(), TrySendError<T>> {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            return Err(TrySendError::Closed(value));
        }
        if !inner.can_send() {
            return Err(TrySendError::Full(value));
        }
        inner.buffer.push_back(value);
        inner.wake_one_receiver();
        Ok(())
    }

    /// Close the channel. Pending buffered values remain receivable.
    pub fn close(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.closed = true;
        inner.wake_all_receivers();
    }
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        self.inner.lock().unwrap().sender_count += 1;
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Drop for Sender<T> {
    fn drop(&mut self) {
        let mut inner = self.inner.lock().unwrap();
        inner.sender_count -= 1;
        if inner.sender_count == 0 {
            inner.closed = true;
            inner.wake_all_receivers();
        }
    }
}

/// Receiving half of a channel.
pub struct Receiver<T> {
    inner: Arc<Mutex<ChannelInner<T>>>,
}

impl<T> Receiver<T> {
    /// Receive a value, suspending while the channel is empty. Returns
    /// `None` once the channel is closed and drained.
    pub fn recv(&self) -> RecvFuture<T> {
        RecvFuture {
            inner: self.inner.clone(),
        }
    }

    /// Receive without suspending.
    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(value) = inner.buffer.pop_front() {
            inner.wake_one_sender();
            return Ok(value);
        }
        if inner.is_closed_for_recv() {
            Err(TryRecvError::Closed)
        } else {
            Err(TryRecvError::Empty)
        }
    }
}

impl<T> Clone for Receiver<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Future returned by [`Sender::send`].
pub struct SendFuture<T> {
    inner: Arc<Mutex<ChannelInner<T>>>,
    value: Option<T>,
}

impl<T: Unpin> Future for SendFuture<T> {
    type Output = Result<(), SendError<T>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let mut inner = this.inner.lock().unwrap();

        if inner.closed {
            let value = this.value.take().expect("send future polled after ready");
            return Poll::Ready(Err(SendError(value)));
        }
        if inner.can_send() {
            let value = this.value.take().expect("send future polled after ready");
            inner.buffer.push_back(value);
            inner.wake_one_receiver();
            return Poll::Ready(Ok(()));
        }
        inner.blocked_sends.push_back(cx.waker().clone());
        Poll::Pending
    }
}

/// Future returned by [`Receiver::recv`].
pub struct RecvFuture<T> {
    inner: Arc<Mutex<ChannelInner<T>>>,
}

impl<T> Future for RecvFuture<T> {
    type Output = Option<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(value) = inner.buffer.pop_front() {
            inner.wake_one_sender();
            return Poll::Ready(Some(value));
        }
        if inner.is_closed_for_recv() {
            return Poll::Ready(None);
        }
        inner.blocked_recvs.push_back(cx.waker().clone());
        Poll::Pending
    }
}

/// Create a channel with the given buffer capacity. Zero makes it
/// unbuffered.
pub fn channel<T>(capacity: usize) -> (Sender<T>, Receiver<T>) {
    let inner = Arc::new(Mutex::new(ChannelInner::new(capacity)));
    (
        Sender {
            inner: inner.clone(),
        },
        Receiver { inner },
    )
}

/// Create a channel whose sends never block. Signal routing uses this:
/// the service can deliver any number of signals in one task.
pub fn unbounded_channel<T>() -> (Sender<T>, Receiver<T>) {
    channel(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn buffered_send_recv() {
        let (tx, rx) = channel(2);
        tx.send(1).await.unwrap();
        tx.send(2).await.unwrap();
        assert_eq!(rx.recv().await, Some(1));
        assert_eq!(rx.recv().await, Some(2));
    }

    #[tokio::test]
    async fn closes_when_last_sender_dropped() {
        let (tx, rx) = channel::<i32>(1);
        let tx2 = tx.clone();
        drop(tx);
        tx2.send(9).await.unwrap();
        drop(tx2);
        assert_eq!(rx.recv().await, Some(9));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn try_send_reports_full_and_closed() {
        let (tx, rx) = channel(1);
        tx.try_send(1).unwrap();
        assert!(matches!(tx.try_send(2), Err(TrySendError::Full(2))));
        tx.close();
        assert!(matches!(tx.try_send(3), Err(TrySendError::Closed(3))));
        assert_eq!(rx.try_recv(), Ok(1));
        assert_eq!(rx.try_recv(), Err(TryRecvError::Closed));
    }

    #[tokio::test]
    async fn try_recv_empty() {
        let (_tx, rx) = channel::<i32>(1);
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn receivers_wake_in_fifo_order() {
        use crate::dispatcher::Dispatcher;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let mut dispatcher = Dispatcher::new();
        let handle = dispatcher.handle();
        let (tx, rx) = channel::<usize>(4);
        let order = Arc::new(Mutex::new(Vec::new()));
        let delivered = Arc::new(AtomicUsize::new(0));

        for i in 0..3 {
            let rx = rx.clone();
            let order = order.clone();
            let delivered = delivered.clone();
            handle.spawn(format!("recv-{i}"), async move {
                let value = rx.recv().await.unwrap();
                order.lock().unwrap().push((i, value));
                delivered.fetch_add(1, Ordering::SeqCst);
            });
        }

        // All receivers block first, in spawn order.
        assert!(!dispatcher.run_until_all_blocked());

        tx.try_send(100).unwrap();
        tx.try_send(200).unwrap();
        tx.try_send(300).unwrap();
        dispatcher.run_until_all_blocked();

        assert_eq!(delivered.load(Ordering::SeqCst), 3);
        // First blocked receiver gets the first value.
        assert_eq!(*order.lock().unwrap(), vec![(0, 100), (1, 200), (2, 300)]);
    }
}
