//! Capture adapters for streaming bodies.
//!
//! [`capture_stream`] drains a stream into a [`BoundedBuffer`].
//! [`CaptureBody`] sits inside an `http_body::Body` pipeline, forwarding
//! every frame untouched while copying data into a buffer; the finished
//! capture arrives later through a [`PendingBody`].

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::{Stream, StreamExt};
use http_body::{Body, Frame, SizeHint};
use tokio::sync::oneshot;

use crate::core::CapturedBody;

use super::{BodyMode, BoundedBuffer};

/// Stream failed mid-capture. Holds what was captured before the failure.
#[derive(Debug)]
pub struct CaptureError<E> {
    /// Bytes seen before the failure, marked truncated.
    pub partial: CapturedBody,
    /// The stream's error.
    pub source: E,
}

impl<E: fmt::Display> fmt::Display for CaptureError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "body stream failed after {} bytes: {}",
            self.partial.total_bytes, self.source
        )
    }
}

impl<E: std::error::Error + 'static> std::error::Error for CaptureError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Drain a stream of byte chunks into a bounded capture.
///
/// The whole stream is consumed so that `total_bytes` is exact; only the
/// first `limit` bytes are kept.
pub async fn capture_stream<S, T, E>(
    mut stream: S,
    limit: usize,
    mode: BodyMode,
) -> Result<CapturedBody, CaptureError<E>>
where
    S: Stream<Item = Result<T, E>> + Unpin,
    T: AsRef<[u8]>,
{
    let mut buffer = BoundedBuffer::new(limit);

    while let Some(item) = stream.next().await {
        match item {
            Ok(chunk) => buffer.write(chunk.as_ref()),
            Err(source) => {
                buffer.mark_truncated();
                return Err(CaptureError {
                    partial: buffer.into_captured_body(mode),
                    source,
                });
            }
        }
    }

    Ok(buffer.into_captured_body(mode))
}

/// A body capture that completes after the body has been fully streamed.
#[derive(Debug)]
pub struct PendingBody {
    rx: oneshot::Receiver<CapturedBody>,
}

impl PendingBody {
    /// Wait for the capture. `None` if the capturing body vanished without
    /// reporting, which only happens if it was leaked.
    pub async fn resolve(self) -> Option<CapturedBody> {
        self.rx.await.ok()
    }

    /// Take the capture if it has already completed.
    pub fn try_resolve(&mut self) -> Option<CapturedBody> {
        self.rx.try_recv().ok()
    }
}

/// `http_body::Body` wrapper that tees data frames into a bounded buffer.
///
/// The capture is delivered when the inner body ends, fails (marked
/// truncated), or the wrapper is dropped early (kept as-is: a cancelled
/// transfer is still a valid capture of the bytes that were seen).
pub struct CaptureBody<B> {
    inner: B,
    mode: BodyMode,
    buffer: Option<BoundedBuffer>,
    tx: Option<oneshot::Sender<CapturedBody>>,
}

impl<B> CaptureBody<B> {
    /// Wrap `inner`, keeping at most `limit` bytes.
    pub fn new(inner: B, limit: usize, mode: BodyMode) -> (Self, PendingBody) {
        let (tx, rx) = oneshot::channel();
        let body = Self {
            inner,
            mode,
            buffer: Some(BoundedBuffer::new(limit)),
            tx: Some(tx),
        };
        (body, PendingBody { rx })
    }

    fn deliver(&mut self) {
        if let (Some(buffer), Some(tx)) = (self.buffer.take(), self.tx.take()) {
            // Receiver may be gone; nobody wants the capture then.
            let _ = tx.send(buffer.into_captured_body(self.mode));
        }
    }
}

impl<B> Body for CaptureBody<B>
where
    B: Body + Unpin,
    B::Data: AsRef<[u8]>,
{
    type Data = B::Data;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_frame(cx);

        match &polled {
            Poll::Ready(Some(Ok(frame))) => {
                if let (Some(data), Some(buffer)) = (frame.data_ref(), this.buffer.as_mut()) {
                    buffer.write(data.as_ref());
                }
            }
            Poll::Ready(Some(Err(_))) => {
                if let Some(buffer) = this.buffer.as_mut() {
                    buffer.mark_truncated();
                }
                this.deliver();
            }
            Poll::Ready(None) => this.deliver(),
            Poll::Pending => {}
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

impl<B> Drop for CaptureBody<B> {
    fn drop(&mut self) {
        self.deliver();
    }
}

impl<B> fmt::Debug for CaptureBody<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureBody")
            .field("mode", &self.mode)
            .field("buffer", &self.buffer)
            .finish()
    }
}
