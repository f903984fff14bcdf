//! Poll-scoped propagation for futures and streams.

use crate::context::{ContextManager, Snapshot};
use futures::Stream;
use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

pin_project! {
    /// A future polled with a captured snapshot installed.
    ///
    /// Each `poll` pushes the snapshot on whatever worker thread polls it and
    /// restores that thread's previous binding before returning.
    #[derive(Debug)]
    #[must_use = "futures do nothing unless polled"]
    pub struct PropagatedFuture<Fut> {
        snapshot: Snapshot,
        #[pin]
        inner: Fut,
    }
}

impl<Fut: Future> Future for PropagatedFuture<Fut> {
    type Output = Fut::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        this.snapshot.run(|| this.inner.poll(cx))
    }
}

pin_project! {
    /// A stream polled with a captured snapshot installed.
    #[derive(Debug)]
    #[must_use = "streams do nothing unless polled"]
    pub struct PropagatedStream<S> {
        snapshot: Snapshot,
        #[pin]
        inner: S,
    }
}

impl<S: Stream> Stream for PropagatedStream<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        this.snapshot.run(|| this.inner.poll_next(cx))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl Snapshot {
    /// Scopes every poll of `fut` to this snapshot.
    pub fn scope_future<Fut: Future>(&self, fut: Fut) -> PropagatedFuture<Fut> {
        PropagatedFuture {
            snapshot: self.clone(),
            inner: fut,
        }
    }

    /// Scopes every poll of `stream` to this snapshot.
    pub fn scope_stream<S: Stream>(&self, stream: S) -> PropagatedStream<S> {
        PropagatedStream {
            snapshot: self.clone(),
            inner: stream,
        }
    }
}

impl ContextManager {
    /// Scopes every poll of `fut` to the calling thread's current snapshot.
    pub fn scope_future<Fut: Future>(&self, fut: Fut) -> PropagatedFuture<Fut> {
        self.current().scope_future(fut)
    }

    /// Scopes every poll of `stream` to the calling thread's current snapshot.
    pub fn scope_stream<S: Stream>(&self, stream: S) -> PropagatedStream<S> {
        self.current().scope_stream(stream)
    }
}
