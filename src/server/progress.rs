//! Byte-level transfer progress with throttled observations.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::Stream;

use crate::common::{SharedEventSink, TransferEvent};

/// Minimum spacing between two non-terminal observations.
pub const EMIT_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressObservation {
    pub total: u64,
    pub transferred: u64,
    /// Whole percent, saturating at 100
    pub percent: u8,
}

/// Counts transferred bytes and forwards observations to an event sink.
///
/// Emits when the transfer reaches 100% or when at least [`EMIT_INTERVAL`]
/// passed since the previous emission. Once the 100% observation went out
/// nothing further is emitted.
pub struct ProgressTracker {
    total: Option<u64>,
    transferred: u64,
    last_emit: Option<Instant>,
    finished: bool,
    sink: SharedEventSink,
}

impl ProgressTracker {
    pub fn new(total: u64, sink: SharedEventSink) -> Self {
        Self {
            total: Some(total),
            transferred: 0,
            last_emit: None,
            finished: false,
            sink,
        }
    }

    /// Tracker for a transfer whose size is only known once it ends.
    /// Reports 0% until [`finish`](Self::finish).
    pub fn without_total(sink: SharedEventSink) -> Self {
        Self {
            total: None,
            ..Self::new(0, sink)
        }
    }

    pub fn advance(&mut self, bytes: u64) {
        self.advance_at(bytes, Instant::now());
    }

    pub fn advance_at(&mut self, bytes: u64, now: Instant) {
        self.transferred = self.transferred.saturating_add(bytes);
        if self.finished {
            return;
        }

        let percent = self.percent();
        let due = self
            .last_emit
            .map_or(true, |last| now.saturating_duration_since(last) >= EMIT_INTERVAL);

        if percent == 100 || due {
            self.emit(percent, now);
        }
    }

    /// Emit the terminal observation if it has not gone out yet. The byte
    /// count seen so far becomes the total, since an estimate (such as a
    /// multipart request length) may not match the payload exactly.
    pub fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.total = Some(self.transferred);
        self.emit(100, Instant::now());
    }

    pub fn transferred(&self) -> u64 {
        self.transferred
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Whether every expected byte has been counted.
    pub fn reached_total(&self) -> bool {
        self.total.is_some_and(|total| self.transferred >= total)
    }

    pub fn percent(&self) -> u8 {
        match self.total {
            None => 0,
            Some(0) => 100,
            Some(total) => {
                let pct = u128::from(self.transferred) * 100 / u128::from(total);
                pct.min(100) as u8
            }
        }
    }

    fn emit(&mut self, percent: u8, now: Instant) {
        self.last_emit = Some(now);
        if percent == 100 {
            self.finished = true;
        }
        self.sink.emit(TransferEvent::Progress(ProgressObservation {
            total: self.total.unwrap_or(self.transferred),
            transferred: self.transferred,
            percent,
        }));
    }
}

/// How a tracked body stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed,
    Failed,
    /// Dropped before all bytes went out (client went away)
    Truncated,
}

type FinishHook = Box<dyn FnOnce(StreamOutcome) + Send + 'static>;

/// Stream adapter that feeds every chunk through a [`ProgressTracker`] and
/// runs a hook exactly once when the stream ends, fails, or is dropped.
pub struct ProgressStream<S> {
    inner: S,
    tracker: ProgressTracker,
    on_finish: Option<FinishHook>,
}

impl<S> ProgressStream<S> {
    pub fn new(inner: S, tracker: ProgressTracker) -> Self {
        Self {
            inner,
            tracker,
            on_finish: None,
        }
    }

    pub fn on_finish(mut self, hook: impl FnOnce(StreamOutcome) + Send + 'static) -> Self {
        self.on_finish = Some(Box::new(hook));
        self
    }

    fn complete(&mut self, outcome: StreamOutcome) {
        if outcome == StreamOutcome::Completed {
            self.tracker.finish();
        }
        if let Some(hook) = self.on_finish.take() {
            hook(outcome);
        }
    }
}

impl<S> Stream for ProgressStream<S>
where
    S: Stream<Item = io::Result<Bytes>> + Unpin,
{
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.tracker.advance(chunk.len() as u64);
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(err))) => {
                tracing::warn!("transfer read failed: {}", err);
                this.complete(StreamOutcome::Failed);
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                this.complete(StreamOutcome::Completed);
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<S> Drop for ProgressStream<S> {
    fn drop(&mut self) {
        if self.on_finish.is_none() {
            return;
        }
        // The transport may stop polling once Content-Length bytes went out
        if self.tracker.reached_total() {
            self.complete(StreamOutcome::Completed);
        } else {
            tracing::info!(
                transferred = self.tracker.transferred(),
                "transfer truncated, client disconnected"
            );
            self.complete(StreamOutcome::Truncated);
        }
    }
}
