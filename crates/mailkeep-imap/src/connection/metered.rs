//! Stream wrapper that reports every transferred chunk and gives up on a
//! peer that stops moving data.

use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::time::Sleep;

/// Receives one call per chunk read from or written to the wire.
pub trait TransferObserver: Send + Sync {
    /// `bytes` moved in one chunk, `elapsed` from the first poll of that
    /// chunk to its completion.
    fn on_transfer(&self, bytes: usize, elapsed: Duration);
}

/// Cause of the `TimedOut` I/O error raised by a stalled [`MeteredStream`].
#[derive(Debug, thiserror::Error)]
#[error("no data moved for {0:?}")]
pub(crate) struct Stalled(pub(crate) Duration);

/// Wraps a stream and reports throughput to a [`TransferObserver`].
///
/// With a stall limit set, a single read, write or flush that stays pending
/// longer than the limit fails with [`io::ErrorKind::TimedOut`]. The clock
/// restarts on every completed operation, so a slow transfer that keeps
/// moving never times out.
pub struct MeteredStream<S> {
    inner: S,
    observer: Arc<dyn TransferObserver>,
    read_started: Option<Instant>,
    write_started: Option<Instant>,
    stall_limit: Option<Duration>,
    read_timer: Option<Pin<Box<Sleep>>>,
    write_timer: Option<Pin<Box<Sleep>>>,
}

impl<S> MeteredStream<S> {
    /// Wraps `inner`, reporting to `observer`.
    pub fn new(inner: S, observer: Arc<dyn TransferObserver>) -> Self {
        Self {
            inner,
            observer,
            read_started: None,
            write_started: None,
            stall_limit: None,
            read_timer: None,
            write_timer: None,
        }
    }

    /// Fails any single operation that makes no progress for `limit`.
    #[must_use]
    pub fn with_stall_limit(mut self, limit: Duration) -> Self {
        self.stall_limit = Some(limit);
        self
    }

    /// Returns the wrapped stream.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S> fmt::Debug for MeteredStream<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeteredStream").finish_non_exhaustive()
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for MeteredStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let started = *this.read_started.get_or_insert_with(Instant::now);
        let before = buf.filled().len();

        let poll = Pin::new(&mut this.inner).poll_read(cx, buf);
        match &poll {
            Poll::Ready(result) => {
                this.read_started = None;
                this.read_timer = None;
                let n = buf.filled().len() - before;
                if result.is_ok() && n > 0 {
                    this.observer.on_transfer(n, started.elapsed());
                }
            }
            Poll::Pending => {
                if let Poll::Ready(err) = poll_stall(&mut this.read_timer, this.stall_limit, cx) {
                    this.read_started = None;
                    return Poll::Ready(Err(err));
                }
            }
        }
        poll
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for MeteredStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let started = *this.write_started.get_or_insert_with(Instant::now);

        let poll = Pin::new(&mut this.inner).poll_write(cx, buf);
        match &poll {
            Poll::Ready(result) => {
                this.write_started = None;
                this.write_timer = None;
                if let Ok(n) = result
                    && *n > 0
                {
                    this.observer.on_transfer(*n, started.elapsed());
                }
            }
            Poll::Pending => {
                if let Poll::Ready(err) = poll_stall(&mut this.write_timer, this.stall_limit, cx) {
                    this.write_started = None;
                    return Poll::Ready(Err(err));
                }
            }
        }
        poll
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let poll = Pin::new(&mut this.inner).poll_flush(cx);
        if poll.is_ready() {
            this.write_timer = None;
        } else if let Poll::Ready(err) = poll_stall(&mut this.write_timer, this.stall_limit, cx) {
            return Poll::Ready(Err(err));
        }
        poll
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

/// Runs the stall timer of a pending operation, arming it on first use.
/// Ready with the error to return once the limit has passed.
fn poll_stall(
    timer: &mut Option<Pin<Box<Sleep>>>,
    limit: Option<Duration>,
    cx: &mut Context<'_>,
) -> Poll<io::Error> {
    let Some(limit) = limit else {
        return Poll::Pending;
    };
    let sleep = timer.get_or_insert_with(|| Box::pin(tokio::time::sleep(limit)));
    ready!(sleep.as_mut().poll(cx));
    *timer = None;
    Poll::Ready(io::Error::new(io::ErrorKind::TimedOut, Stalled(limit)))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use std::sync::Mutex;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    #[derive(Default)]
    struct Recorder {
        chunks: Mutex<Vec<usize>>,
    }

    impl TransferObserver for Recorder {
        fn on_transfer(&self, bytes: usize, _elapsed: Duration) {
            self.chunks.lock().unwrap().push(bytes);
        }
    }

    #[tokio::test]
    async fn test_reports_reads_and_writes() {
        let recorder = Arc::new(Recorder::default());
        let mock = tokio_test::io::Builder::new()
            .write(b"A0001 NOOP\r\n")
            .read(b"A0001 OK\r\n")
            .build();
        let mut stream = MeteredStream::new(mock, recorder.clone());

        stream.write_all(b"A0001 NOOP\r\n").await.unwrap();
        let mut buf = [0u8; 64];
        let n = stream.read(&mut buf).await.unwrap();

        assert_eq!(&buf[..n], b"A0001 OK\r\n");
        assert_eq!(*recorder.chunks.lock().unwrap(), vec![12, 10]);
    }

    #[tokio::test]
    async fn test_eof_not_reported() {
        let recorder = Arc::new(Recorder::default());
        let mock = tokio_test::io::Builder::new().build();
        let mut stream = MeteredStream::new(mock, recorder.clone());

        let mut buf = [0u8; 8];
        assert_eq!(stream.read(&mut buf).await.unwrap(), 0);
        assert!(recorder.chunks.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_but_steady_reads_never_stall() {
        let recorder = Arc::new(Recorder::default());
        let mut builder = tokio_test::io::Builder::new();
        for _ in 0..20 {
            builder.wait(Duration::from_millis(40)).read(&[b'x'; 64]);
        }
        let mut stream = MeteredStream::new(builder.build(), recorder.clone())
            .with_stall_limit(Duration::from_millis(100));

        let mut body = Vec::new();
        stream.read_to_end(&mut body).await.unwrap();

        assert_eq!(body.len(), 20 * 64);
        assert_eq!(recorder.chunks.lock().unwrap().iter().sum::<usize>(), 20 * 64);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_peer_stalls() {
        let mock = tokio_test::io::Builder::new()
            .read(b"* 1 FETCH (BODY[] {100}\r\n")
            .wait(Duration::from_secs(5))
            .build();
        let mut stream = MeteredStream::new(mock, Arc::new(Recorder::default()))
            .with_stall_limit(Duration::from_millis(100));

        let mut buf = [0u8; 64];
        stream.read(&mut buf).await.unwrap();
        let err = stream.read(&mut buf).await.unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        assert!(matches!(
            crate::Error::from(err),
            crate::Error::Timeout(limit) if limit == Duration::from_millis(100)
        ));
    }
}
