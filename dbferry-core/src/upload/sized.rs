//! Length-enforcing body adapter.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;

use crate::Result;
use crate::error::DbFerryError;

/// Byte stream that must carry exactly `declared` bytes.
///
/// Passing the declared length yields a `SizeMismatch` error immediately;
/// ending short of it yields a `SizeMismatch` error in place of the end of
/// the stream. After an error the stream is finished.
pub struct SizedBody {
    inner: Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>,
    declared: u64,
    written: u64,
    done: bool,
}

impl std::fmt::Debug for SizedBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SizedBody")
            .field("declared", &self.declared)
            .field("written", &self.written)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl SizedBody {
    /// Wraps `inner`, declaring its exact length.
    pub fn new<S>(inner: S, declared: u64) -> Self
    where
        S: Stream<Item = Result<Bytes>> + Send + 'static,
    {
        Self {
            inner: Box::pin(inner),
            declared,
            written: 0,
            done: false,
        }
    }

    /// Declared content length.
    pub fn declared(&self) -> u64 {
        self.declared
    }

    /// Bytes passed through so far.
    pub fn written(&self) -> u64 {
        self.written
    }
}

impl Stream for SizedBody {
    type Item = Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }

        match self.inner.as_mut().poll_next(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Ok(chunk))) => {
                self.written = self.written.saturating_add(chunk.len() as u64);
                if self.written > self.declared {
                    self.done = true;
                    let (declared, written) = (self.declared, self.written);
                    return Poll::Ready(Some(Err(DbFerryError::size_mismatch(declared, written))));
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                self.done = true;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                self.done = true;
                if self.written == self.declared {
                    Poll::Ready(None)
                } else {
                    let (declared, written) = (self.declared, self.written);
                    Poll::Ready(Some(Err(DbFerryError::size_mismatch(declared, written))))
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
