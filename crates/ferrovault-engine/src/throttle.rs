//! Aggregate write-rate limiting
//!
//! A [`RateLimiter`] is shared by every worker of a run. Each chunk reserves
//! its slot on a single timeline, so the combined rate of all writers stays
//! at or below the limit however many readers draw from it.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{ready, Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::time::{Instant, Sleep};

/// Largest chunk released per reservation (16KB)
pub const THROTTLE_CHUNK_SIZE: usize = 16 * 1024;

/// Shared reservation timeline for a byte rate
#[derive(Debug)]
pub struct RateLimiter {
    bytes_per_sec: u64,
    next_free: Mutex<Instant>,
}

impl RateLimiter {
    /// Limiter allowing `bytes_per_sec` in aggregate; `None` when unbounded
    pub fn new(bytes_per_sec: u64) -> Option<Arc<Self>> {
        (bytes_per_sec > 0).then(|| {
            Arc::new(Self {
                bytes_per_sec,
                next_free: Mutex::new(Instant::now()),
            })
        })
    }

    /// Configured rate
    pub fn bytes_per_sec(&self) -> u64 {
        self.bytes_per_sec
    }

    /// Reserve `bytes` and return the instant at which they may be released
    pub fn reserve(&self, bytes: usize) -> Instant {
        let cost = Duration::from_secs_f64(bytes as f64 / self.bytes_per_sec as f64);
        let now = Instant::now();
        let mut next_free = self.next_free.lock().unwrap_or_else(PoisonError::into_inner);
        let start = (*next_free).max(now);
        *next_free = start + cost;
        *next_free
    }
}

/// Reader that releases bytes no faster than a shared [`RateLimiter`] allows
pub struct ThrottledReader<R> {
    inner: R,
    limiter: Option<Arc<RateLimiter>>,
    buffer: Box<[u8]>,
    start: usize,
    end: usize,
    delay: Option<Pin<Box<Sleep>>>,
}

impl<R> ThrottledReader<R> {
    /// Wrap `inner`; with no limiter reads pass straight through
    pub fn new(inner: R, limiter: Option<Arc<RateLimiter>>) -> Self {
        let capacity = if limiter.is_some() {
            THROTTLE_CHUNK_SIZE
        } else {
            0
        };
        Self {
            inner,
            limiter,
            buffer: vec![0u8; capacity].into_boxed_slice(),
            start: 0,
            end: 0,
            delay: None,
        }
    }

    /// Unwrap the inner reader
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for ThrottledReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let Some(limiter) = this.limiter.clone() else {
            return Pin::new(&mut this.inner).poll_read(cx, buf);
        };

        loop {
            if let Some(delay) = this.delay.as_mut() {
                ready!(delay.as_mut().poll(cx));
                this.delay = None;
            }

            if this.start < this.end {
                let n = (this.end - this.start).min(buf.remaining());
                buf.put_slice(&this.buffer[this.start..this.start + n]);
                this.start += n;
                return Poll::Ready(Ok(()));
            }

            let mut chunk = ReadBuf::new(&mut this.buffer);
            ready!(Pin::new(&mut this.inner).poll_read(cx, &mut chunk))?;
            let filled = chunk.filled().len();
            if filled == 0 {
                return Poll::Ready(Ok(()));
            }
            this.start = 0;
            this.end = filled;

            let release_at = limiter.reserve(filled);
            if release_at > Instant::now() {
                this.delay = Some(Box::pin(tokio::time::sleep_until(release_at)));
            }
        }
    }
}
