//! Transfer progress metering for media streams.
//!
//! [`ProgressMeter`] wraps a byte stream without buffering or altering it,
//! counting transferred bytes as reads complete. Snapshots are emitted on a
//! fixed interval plus exactly one terminal 100% snapshot when the
//! underlying stream ends, even if the interval has not elapsed since the
//! previous snapshot. An optional inactivity deadline turns a silent stream
//! into a read error so stalled transfers fail instead of hanging forever.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::mpsc;
use tokio::time::Sleep;

/// Point-in-time measurement of one stream's transfer progress.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    /// Bytes transferred so far
    pub transferred_bytes: u64,
    /// Time elapsed since the transfer began
    pub elapsed: Duration,
    /// Average throughput over the whole transfer
    pub bytes_per_second: f64,
    /// Completion percentage in [0, 100]; None while the total stream
    /// length is unknown. The terminal snapshot always carries 100.
    pub percentage: Option<f64>,
}

impl ProgressSnapshot {
    /// Returns true for the terminal snapshot emitted at end of stream.
    pub fn is_terminal(&self) -> bool {
        self.percentage == Some(100.0)
    }
}

/// Pass-through reader that measures transfer progress.
///
/// Bytes are handed through unmodified and in order; nothing is buffered.
/// Snapshots are delivered on the receiver returned by [`ProgressMeter::new`]
/// and stop when either side of the channel is dropped.
pub struct ProgressMeter<R> {
    inner: R,
    snapshots: mpsc::UnboundedSender<ProgressSnapshot>,
    total_bytes: Option<u64>,
    interval: Duration,
    stall_timeout: Option<Duration>,
    stall_deadline: Option<Pin<Box<Sleep>>>,
    started: Instant,
    last_snapshot: Instant,
    transferred: u64,
    finished: bool,
}

impl<R: AsyncRead + Unpin> ProgressMeter<R> {
    /// Wraps `inner`, returning the meter and the snapshot receiver.
    ///
    /// `total_bytes` is the header-derived stream length when known;
    /// without it the percentage stays indeterminate until the terminal
    /// snapshot. `stall_timeout` bounds how long the stream may go without
    /// producing bytes before reads fail with `io::ErrorKind::TimedOut`.
    pub fn new(
        inner: R,
        total_bytes: Option<u64>,
        interval: Duration,
        stall_timeout: Option<Duration>,
    ) -> (Self, mpsc::UnboundedReceiver<ProgressSnapshot>) {
        let (snapshots, receiver) = mpsc::unbounded_channel();
        let now = Instant::now();
        let meter = Self {
            inner,
            snapshots,
            total_bytes,
            interval,
            stall_timeout,
            stall_deadline: stall_timeout.map(|timeout| Box::pin(tokio::time::sleep(timeout))),
            started: now,
            last_snapshot: now,
            transferred: 0,
            finished: false,
        };
        (meter, receiver)
    }

    /// Bytes transferred through the meter so far.
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred
    }

    fn snapshot(&self, terminal: bool) -> ProgressSnapshot {
        let elapsed = self.started.elapsed();
        let seconds = elapsed.as_secs_f64();
        let bytes_per_second = if seconds > 0.0 {
            self.transferred as f64 / seconds
        } else {
            0.0
        };
        let percentage = if terminal {
            Some(100.0)
        } else {
            self.total_bytes
                .filter(|total| *total > 0)
                .map(|total| (self.transferred as f64 / total as f64 * 100.0).min(100.0))
        };

        ProgressSnapshot {
            transferred_bytes: self.transferred,
            elapsed,
            bytes_per_second,
            percentage,
        }
    }

    fn emit(&mut self, terminal: bool) {
        let snapshot = self.snapshot(terminal);
        self.last_snapshot = Instant::now();
        // A dropped receiver just means nobody is watching anymore
        let _ = self.snapshots.send(snapshot);
    }

    fn rearm_stall_deadline(&mut self) {
        if let (Some(timeout), Some(deadline)) = (self.stall_timeout, self.stall_deadline.as_mut())
        {
            deadline
                .as_mut()
                .reset(tokio::time::Instant::now() + timeout);
        }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for ProgressMeter<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();

        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Pending => {
                if let Some(deadline) = this.stall_deadline.as_mut() {
                    if deadline.as_mut().poll(cx).is_ready() {
                        let idle = this.stall_timeout.unwrap_or_default();
                        return Poll::Ready(Err(io::Error::new(
                            io::ErrorKind::TimedOut,
                            format!("no bytes received for {idle:?}"),
                        )));
                    }
                }
                Poll::Pending
            }
            Poll::Ready(Err(error)) => Poll::Ready(Err(error)),
            Poll::Ready(Ok(())) => {
                let read = buf.filled().len() - before;
                if read == 0 {
                    if !this.finished {
                        this.finished = true;
                        this.emit(true);
                    }
                } else {
                    this.transferred += read as u64;
                    this.rearm_stall_deadline();
                    if this.last_snapshot.elapsed() >= this.interval {
                        this.emit(false);
                    }
                }
                Poll::Ready(Ok(()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt;

    use super::*;

    #[tokio::test]
    async fn test_bytes_pass_through_unmodified() {
        let stream = tokio_test::io::Builder::new()
            .read(b"hello ")
            .read(b"world")
            .build();
        let (mut meter, mut snapshots) =
            ProgressMeter::new(stream, Some(11), Duration::from_secs(60), None);

        let mut output = Vec::new();
        meter.read_to_end(&mut output).await.unwrap();

        assert_eq!(output, b"hello world");
        assert_eq!(meter.transferred_bytes(), 11);

        // Long interval: only the terminal snapshot fires
        let snapshot = snapshots.recv().await.unwrap();
        assert!(snapshot.is_terminal());
        assert_eq!(snapshot.transferred_bytes, 11);
        assert!(snapshots.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_snapshots_are_monotonic() {
        let stream = tokio_test::io::Builder::new()
            .read(&[0u8; 100])
            .read(&[0u8; 100])
            .read(&[0u8; 100])
            .build();
        // Zero interval: every completed read emits a snapshot
        let (mut meter, mut snapshots) =
            ProgressMeter::new(stream, Some(300), Duration::ZERO, None);

        let mut sink = Vec::new();
        meter.read_to_end(&mut sink).await.unwrap();
        drop(meter);

        let mut seen = Vec::new();
        while let Some(snapshot) = snapshots.recv().await {
            seen.push(snapshot);
        }

        assert!(seen.len() >= 2);
        for pair in seen.windows(2) {
            assert!(pair[1].transferred_bytes >= pair[0].transferred_bytes);
            assert!(pair[1].elapsed >= pair[0].elapsed);
        }
        let last = seen.last().unwrap();
        assert!(last.is_terminal());
        assert_eq!(last.transferred_bytes, 300);
    }

    #[tokio::test]
    async fn test_unknown_length_reports_indeterminate_percentage() {
        let stream = tokio_test::io::Builder::new()
            .read(&[1u8; 50])
            .read(&[2u8; 50])
            .build();
        let (mut meter, mut snapshots) = ProgressMeter::new(stream, None, Duration::ZERO, None);

        let mut sink = Vec::new();
        meter.read_to_end(&mut sink).await.unwrap();
        drop(meter);

        let mut seen = Vec::new();
        while let Some(snapshot) = snapshots.recv().await {
            seen.push(snapshot);
        }

        let (terminal, in_flight): (Vec<_>, Vec<_>) =
            seen.into_iter().partition(ProgressSnapshot::is_terminal);
        assert_eq!(terminal.len(), 1);
        assert!(in_flight.iter().all(|s| s.percentage.is_none()));
    }

    #[tokio::test]
    async fn test_terminal_snapshot_emitted_once() {
        let stream = tokio_test::io::Builder::new().read(b"x").build();
        let (mut meter, mut snapshots) =
            ProgressMeter::new(stream, Some(1), Duration::from_secs(60), None);

        let mut sink = Vec::new();
        meter.read_to_end(&mut sink).await.unwrap();
        // A second read at EOF must not emit another terminal snapshot
        let mut buf = [0u8; 8];
        assert_eq!(meter.read(&mut buf).await.unwrap(), 0);
        drop(meter);

        let mut terminals = 0;
        while let Some(snapshot) = snapshots.recv().await {
            if snapshot.is_terminal() {
                terminals += 1;
            }
        }
        assert_eq!(terminals, 1);
    }

    #[tokio::test]
    async fn test_stalled_stream_fails_with_timeout() {
        let stream = tokio_test::io::Builder::new()
            .read(b"abc")
            .wait(Duration::from_millis(500))
            .read(b"def")
            .build();
        let (mut meter, _snapshots) = ProgressMeter::new(
            stream,
            Some(6),
            Duration::from_secs(60),
            Some(Duration::from_millis(20)),
        );

        let mut sink = Vec::new();
        let error = meter.read_to_end(&mut sink).await.unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::TimedOut);
        assert_eq!(meter.transferred_bytes(), 3);
    }
}
