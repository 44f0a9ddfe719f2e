//! Scripted mock controller link for driver tests
//!
//! [`MockSerialPort`] implements `AsyncRead` and `AsyncWrite` and is handed to
//! the driver under test in place of a real port. The test keeps the matching
//! [`MockDeviceHarness`] and plays the controller: it asserts on what the
//! driver wrote and sends back replies.
//!
//! # Architecture
//!
//! A pair of unbounded channels carries bytes in each direction. Dropping the
//! harness makes the port report end-of-file on read and `BrokenPipe` on write,
//! which is how tests simulate a controller dropping off the line.
//!
//! # Example
//!
//! ```rust,ignore
//! use motor_core::mock_serial;
//!
//! let (port, mut harness) = mock_serial::new();
//! let driver_task = tokio::spawn(async move { drive(port).await });
//!
//! harness.expect_and_respond(b"PR P\r", b"1200\r\n").await;
//! ```

#![allow(clippy::expect_used, clippy::panic)]

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// How long harness expectations wait before failing the test.
const EXPECT_TIMEOUT: Duration = Duration::from_secs(2);

/// The driver-facing side of the mock link
#[derive(Debug)]
pub struct MockSerialPort {
    /// Bytes written by the driver, forwarded to the harness
    writes_tx: UnboundedSender<Vec<u8>>,
    /// Bytes sent by the harness for the driver to read
    reads_rx: UnboundedReceiver<Vec<u8>>,
    /// Received from the harness but not yet read
    read_buffer: VecDeque<u8>,
    /// Number of upcoming writes that fail with `BrokenPipe`
    failing_writes: Arc<AtomicUsize>,
}

/// The test-facing side that plays the controller
#[derive(Debug)]
pub struct MockDeviceHarness {
    writes_rx: UnboundedReceiver<Vec<u8>>,
    reads_tx: UnboundedSender<Vec<u8>>,
    /// Written by the driver but not yet asserted by the test
    write_buffer: Vec<u8>,
    failing_writes: Arc<AtomicUsize>,
}

/// Create a connected port/harness pair.
pub fn new() -> (MockSerialPort, MockDeviceHarness) {
    let (client_to_harness_tx, client_to_harness_rx) = mpsc::unbounded_channel();
    let (harness_to_client_tx, harness_to_client_rx) = mpsc::unbounded_channel();
    let failing_writes = Arc::new(AtomicUsize::new(0));

    let port = MockSerialPort {
        writes_tx: client_to_harness_tx,
        reads_rx: harness_to_client_rx,
        read_buffer: VecDeque::new(),
        failing_writes: failing_writes.clone(),
    };

    let harness = MockDeviceHarness {
        writes_rx: client_to_harness_rx,
        reads_tx: harness_to_client_tx,
        write_buffer: Vec::new(),
        failing_writes,
    };

    (port, harness)
}

// =============================================================================
// MockSerialPort Implementations
// =============================================================================

impl MockSerialPort {
    fn fill_from_buffer(&mut self, buf: &mut ReadBuf<'_>) {
        let to_read = std::cmp::min(buf.remaining(), self.read_buffer.len());
        let chunk: Vec<u8> = self.read_buffer.drain(..to_read).collect();
        buf.put_slice(&chunk);
    }
}

impl AsyncRead for MockSerialPort {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if !self.read_buffer.is_empty() {
            self.fill_from_buffer(buf);
            return Poll::Ready(Ok(()));
        }

        match self.reads_rx.poll_recv(cx) {
            Poll::Ready(Some(chunk)) => {
                self.read_buffer.extend(chunk);
                self.fill_from_buffer(buf);
                Poll::Ready(Ok(()))
            }
            // Harness dropped: end-of-file
            Poll::Ready(None) => Poll::Ready(Ok(())),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl AsyncWrite for MockSerialPort {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let injected = self
            .failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "injected write failure",
            )));
        }

        match self.writes_tx.send(buf.to_vec()) {
            Ok(_) => Poll::Ready(Ok(buf.len())),
            Err(_) => Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "mock device harness disconnected",
            ))),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

// =============================================================================
// MockDeviceHarness Implementations
// =============================================================================

impl MockDeviceHarness {
    /// Send bytes for the driver to read.
    ///
    /// # Errors
    /// Returns error if the port has been dropped
    pub fn send_response(&self, data: &[u8]) -> Result<(), &'static str> {
        self.reads_tx
            .send(data.to_vec())
            .map_err(|_| "Failed to send response: client port disconnected")
    }

    /// Make the next `count` driver writes fail with `BrokenPipe`.
    ///
    /// Failed writes never reach the harness.
    pub fn fail_next_writes(&self, count: usize) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    /// Wait for the driver to write `expected` and assert on it.
    ///
    /// Excess bytes are kept for the next expectation.
    ///
    /// # Panics
    /// Panics on mismatch or if the bytes do not arrive within 2 seconds.
    pub async fn expect_write(&mut self, expected: &[u8]) {
        while self.write_buffer.len() < expected.len() {
            match tokio::time::timeout(EXPECT_TIMEOUT, self.writes_rx.recv()).await {
                Ok(Some(chunk)) => self.write_buffer.extend_from_slice(&chunk),
                Ok(None) => panic!("Client-side port closed while expecting a write."),
                Err(_) => {
                    panic!(
                        "Timeout waiting for write. Expected `{:?}` ({} bytes), but only received `{:?}` ({} bytes).",
                        String::from_utf8_lossy(expected),
                        expected.len(),
                        String::from_utf8_lossy(&self.write_buffer),
                        self.write_buffer.len()
                    );
                }
            }
        }

        let actual = &self.write_buffer[..expected.len()];
        assert_eq!(
            actual,
            expected,
            "Mismatch in expected write. Expected `{:?}`, got `{:?}`.",
            String::from_utf8_lossy(expected),
            String::from_utf8_lossy(actual)
        );

        self.write_buffer.drain(..expected.len());
    }

    /// Expect a write, then reply.
    pub async fn expect_and_respond(&mut self, expected: &[u8], response: &[u8]) {
        self.expect_write(expected).await;
        self.send_response(response)
            .expect("Failed to send response");
    }

    /// Assert that the driver writes nothing for `quiet`.
    ///
    /// # Panics
    /// Panics if any bytes arrive (or are already buffered).
    pub async fn expect_no_write(&mut self, quiet: Duration) {
        if let Ok(Some(chunk)) = tokio::time::timeout(quiet, self.writes_rx.recv()).await {
            self.write_buffer.extend_from_slice(&chunk);
        }
        assert!(
            self.write_buffer.is_empty(),
            "Unexpected write: `{:?}`",
            String::from_utf8_lossy(&self.write_buffer)
        );
    }

    /// Discard pending writes without asserting on them.
    pub async fn drain_writes(&mut self) {
        let short_timeout = Duration::from_millis(50);

        while let Ok(Some(chunk)) = tokio::time::timeout(short_timeout, self.writes_rx.recv()).await
        {
            self.write_buffer.extend_from_slice(&chunk);
        }
        self.write_buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    #[tokio::test]
    async fn test_command_response() {
        let (port, mut harness) = new();
        let mut port = BufReader::new(port);

        let app_task = tokio::spawn(async move {
            port.write_all(b"PR P\r").await.unwrap();
            let mut response = String::new();
            port.read_line(&mut response).await.unwrap();
            response
        });

        harness.expect_and_respond(b"PR P\r", b"1200\r\n").await;

        assert_eq!(app_task.await.unwrap(), "1200\r\n");
    }

    #[tokio::test]
    async fn test_injected_write_failure() {
        let (mut port, mut harness) = new();
        harness.fail_next_writes(1);

        let err = port.write_all(b"MV\r").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);

        port.write_all(b"PR MV\r").await.unwrap();
        harness.expect_write(b"PR MV\r").await;
    }

    #[tokio::test]
    async fn test_dropped_harness_is_eof() {
        let (port, harness) = new();
        let mut port = BufReader::new(port);
        drop(harness);

        let mut response = String::new();
        let n = port.read_line(&mut response).await.unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_expect_no_write() {
        let (_port, mut harness) = new();
        harness.expect_no_write(Duration::from_millis(20)).await;
    }
}
