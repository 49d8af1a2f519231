//! Timeout enforcement.
//!
//! # Responsibilities
//! - Bound the wait for an upstream response head, counted from the moment
//!   the request body has been handed over in full
//! - Bound idle gaps between body frames in either direction
//! - Report which phase timed out so callers can map it to 504
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors
//! - Idle deadlines restart on every frame; a slow but live stream never trips them

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::BoxError;
use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};
use tokio::sync::oneshot;
use tokio::time::{Instant, Sleep};

/// Which leg of the exchange ran out of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutPhase {
    Connect,
    Write,
    Read,
}

impl fmt::Display for TimeoutPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TimeoutPhase::Connect => "connect",
            TimeoutPhase::Write => "write",
            TimeoutPhase::Read => "read",
        })
    }
}

/// An upstream exceeded one of its policy timeouts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("upstream {phase} timeout after {after:?}")]
pub struct UpstreamTimeout {
    pub phase: TimeoutPhase,
    pub after: Duration,
}

/// Run `fut` with a deadline.
pub async fn with_deadline<F, T>(
    after: Duration,
    phase: TimeoutPhase,
    fut: F,
) -> Result<T, UpstreamTimeout>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(after, fut)
        .await
        .map_err(|_| UpstreamTimeout { phase, after })
}

/// Run `fut`, starting the deadline only once `armed` resolves.
///
/// A dropped sender arms the deadline as well.
pub async fn with_deadline_after<F, T>(
    armed: oneshot::Receiver<()>,
    after: Duration,
    phase: TimeoutPhase,
    fut: F,
) -> Result<T, UpstreamTimeout>
where
    F: Future<Output = T>,
{
    tokio::pin!(fut);
    tokio::select! {
        biased;
        output = &mut fut => return Ok(output),
        _ = armed => {}
    }
    with_deadline(after, phase, fut).await
}

/// Body wrapper reporting when its last frame has been handed out.
pub struct CompletionBody<B> {
    inner: B,
    done: Option<oneshot::Sender<()>>,
}

impl<B: Body> CompletionBody<B> {
    /// Wrap `inner`; the receiver resolves once the body is exhausted.
    pub fn new(inner: B) -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        let mut body = Self {
            inner,
            done: Some(tx),
        };
        if body.inner.is_end_stream() {
            body.finish();
        }
        (body, rx)
    }

    fn finish(&mut self) {
        if let Some(done) = self.done.take() {
            let _ = done.send(());
        }
    }
}

impl<B> Body for CompletionBody<B>
where
    B: Body<Data = Bytes> + Unpin,
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = &mut *self;
        let polled = Pin::new(&mut this.inner).poll_frame(cx);
        match &polled {
            Poll::Ready(None) => this.finish(),
            Poll::Ready(Some(Ok(_))) if this.inner.is_end_stream() => this.finish(),
            _ => {}
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// Body wrapper failing with [`UpstreamTimeout`] when no frame arrives
/// within `timeout` of the previous one.
pub struct IdleTimeoutBody<B> {
    inner: B,
    timeout: Duration,
    phase: TimeoutPhase,
    sleep: Pin<Box<Sleep>>,
    waiting: bool,
}

impl<B> IdleTimeoutBody<B> {
    pub fn new(inner: B, timeout: Duration, phase: TimeoutPhase) -> Self {
        Self {
            inner,
            timeout,
            phase,
            sleep: Box::pin(tokio::time::sleep(timeout)),
            waiting: false,
        }
    }
}

impl<B> Body for IdleTimeoutBody<B>
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: Into<BoxError>,
{
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = &mut *self;

        if let Poll::Ready(frame) = Pin::new(&mut this.inner).poll_frame(cx) {
            this.waiting = false;
            return Poll::Ready(frame.map(|result| result.map_err(Into::into)));
        }

        if !this.waiting {
            this.waiting = true;
            this.sleep.as_mut().reset(Instant::now() + this.timeout);
        }

        match this.sleep.as_mut().poll(cx) {
            Poll::Ready(()) => Poll::Ready(Some(Err(Box::new(UpstreamTimeout {
                phase: this.phase,
                after: this.timeout,
            })))),
            Poll::Pending => Poll::Pending,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
