// src/system/capture.rs

//! Background draining of a child's stdout/stderr into shared buffers.
//!
//! Readers always drain their pipe to EOF, even past the capture limit, so a
//! chatty child never blocks on a full pipe.

use crate::constants::READ_CHUNK_SIZE;
use crate::system::backend::BoxedReader;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::task::JoinHandle;
use tokio::time;

#[derive(Debug, Default)]
struct CaptureState {
    bytes: Vec<u8>,
    discarded: usize,
}

/// Bytes captured from one stream, shared between the reader task and its owner.
#[derive(Debug, Clone, Default)]
pub struct SharedCapture {
    state: Arc<Mutex<CaptureState>>,
    limit: Option<usize>,
}

impl SharedCapture {
    /// A capture that keeps at most `limit` bytes (everything when `None`).
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            state: Arc::default(),
            limit,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CaptureState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn append(&self, chunk: &[u8]) {
        let mut state = self.lock();
        let room = match self.limit {
            Some(limit) => limit.saturating_sub(state.bytes.len()),
            None => chunk.len(),
        };
        let (kept, dropped) = chunk.split_at(room.min(chunk.len()));
        state.bytes.extend_from_slice(kept);
        state.discarded += dropped.len();
    }

    /// Copy of everything captured so far.
    pub fn snapshot(&self) -> Vec<u8> {
        self.lock().bytes.clone()
    }

    /// Moves the captured bytes out, leaving the buffer empty.
    pub fn take(&self) -> Vec<u8> {
        std::mem::take(&mut self.lock().bytes)
    }

    /// Number of bytes read but not kept because of the limit.
    pub fn discarded(&self) -> usize {
        self.lock().discarded
    }
}

/// Spawns a task on the current runtime that drains `reader` into `capture`.
///
/// A missing reader yields a task that finishes immediately.
pub fn spawn_reader(
    reader: Option<BoxedReader>,
    capture: SharedCapture,
    stream: &'static str,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let Some(mut reader) = reader else {
            return;
        };
        let mut chunk = Vec::with_capacity(READ_CHUNK_SIZE);
        let mut total = 0usize;
        loop {
            chunk.clear();
            match reader.read_buf(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => {
                    total += n;
                    capture.append(&chunk);
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::warn!("Error reading {}: {}", stream, e);
                    break;
                }
            }
        }
        log::trace!(
            "Finished reading {}: {} bytes ({} discarded)",
            stream,
            total,
            capture.discarded()
        );
    })
}

/// Waits for a reader task to hit EOF.
///
/// With `grace` set the wait is bounded: a reader can outlive its process when a
/// descendant inherited the pipe, and such readers are aborted once the grace
/// period runs out. Without it the wait lasts until every holder closes the pipe.
pub async fn wait_reader(mut reader: JoinHandle<()>, grace: Option<Duration>, stream: &'static str) {
    let Some(grace) = grace else {
        if let Err(e) = reader.await {
            log::warn!("{} reader stopped abnormally: {}", stream, e);
        }
        return;
    };
    if time::timeout(grace, &mut reader).await.is_err() {
        log::warn!(
            "{} still open {:?} after the process ended (inherited by a descendant?); giving up on it.",
            stream,
            grace
        );
        reader.abort();
    }
}

/// Waits for a reader task (see [`wait_reader`]), then returns what was captured.
pub async fn finish(
    reader: JoinHandle<()>,
    capture: &SharedCapture,
    grace: Option<Duration>,
    stream: &'static str,
) -> Vec<u8> {
    wait_reader(reader, grace, stream).await;
    capture.take()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_respects_limit() {
        let capture = SharedCapture::new(Some(5));
        capture.append(b"abc");
        capture.append(b"defg");
        capture.append(b"h");

        assert_eq!(capture.snapshot(), b"abcde");
        assert_eq!(capture.discarded(), 3);
    }

    #[test]
    fn test_append_unbounded() {
        let capture = SharedCapture::new(None);
        capture.append(b"abc");
        capture.append(b"def");

        assert_eq!(capture.take(), b"abcdef");
        assert!(capture.take().is_empty());
        assert_eq!(capture.discarded(), 0);
    }

    #[tokio::test]
    async fn test_reader_drains_to_eof() {
        let data: &'static [u8] = b"hello\nworld\n";
        let capture = SharedCapture::new(None);
        let reader = spawn_reader(Some(Box::new(data)), capture.clone(), "stdout");

        let bytes = finish(reader, &capture, Some(Duration::from_secs(5)), "stdout").await;
        assert_eq!(bytes, data);
    }

    #[tokio::test]
    async fn test_missing_reader_finishes_empty() {
        let capture = SharedCapture::new(None);
        let reader = spawn_reader(None, capture.clone(), "stderr");

        let bytes = finish(reader, &capture, None, "stderr").await;
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn test_bounded_wait_aborts_stuck_reader() {
        // --- Setup ---
        // The write half stays alive, so the reader never sees EOF.
        let (_writer, pipe) = tokio::io::duplex(64);
        let capture = SharedCapture::new(None);
        let reader = spawn_reader(Some(Box::new(pipe)), capture.clone(), "stdout");

        let bytes = finish(reader, &capture, Some(Duration::from_millis(100)), "stdout").await;
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn test_unbounded_wait_keeps_late_output() {
        // --- Setup ---
        let (mut writer, pipe) = tokio::io::duplex(64);
        let capture = SharedCapture::new(None);
        let reader = spawn_reader(Some(Box::new(pipe)), capture.clone(), "stdout");

        tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            tokio::time::sleep(Duration::from_millis(300)).await;
            let _ = writer.write_all(b"late").await;
        });

        let bytes = finish(reader, &capture, None, "stdout").await;
        assert_eq!(bytes, b"late");
    }
}
