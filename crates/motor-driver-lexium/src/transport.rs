//! Transport Session: one byte-stream link to one Lexium controller.
//!
//! The controller frames its traffic in two ways:
//!
//! - **Normal mode**: commands end with `\r`, responses end with `\r\n`.
//! - **Raw mode**: the input terminator is disabled. Only `PR IS` uses it,
//!   since that query answers with an unknown number of `\r\n`-terminated
//!   lines. The read ends when the deadline expires (or the response buffer
//!   fills), and reaching the deadline with data in hand counts as success.
//!
//! [`Transport::write_read_raw`] switches the input terminator off through a
//! scoped guard held for the whole exchange. The guard restores the previous
//! terminator on every exit path, including errors and a cancelled future.

use motor_core::error::TransportError;
use motor_core::serial::{self, ConnectionTarget, DynSerial, SerialPortIO};
use std::ops::{Deref, DerefMut};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Per-call deadline for normal exchanges.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Response buffer size; a read stops once this many bytes arrive.
pub const MAX_RESPONSE_LEN: usize = 80;

/// Input terminator in normal mode.
pub const NORMAL_INPUT_EOS: &str = "\r\n";

/// Output terminator appended to every command.
pub const OUTPUT_EOS: &str = "\r";

/// How long the pre-command input flush listens for late bytes.
pub const FLUSH_WINDOW: Duration = Duration::from_millis(2);

/// End-of-string delimiters for each direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Framing {
    /// Terminator that ends a response. Empty disables terminator detection.
    pub input: String,
    /// Terminator appended to each command.
    pub output: String,
}

impl Framing {
    /// The controller's normal framing (`\r\n` in, `\r` out).
    pub fn normal() -> Self {
        Self {
            input: NORMAL_INPUT_EOS.to_string(),
            output: OUTPUT_EOS.to_string(),
        }
    }

    /// Returns true when the input terminator is disabled.
    pub fn is_raw(&self) -> bool {
        self.input.is_empty()
    }
}

impl Default for Framing {
    fn default() -> Self {
        Self::normal()
    }
}

/// Why a read stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Input terminator seen (stripped from the response text)
    Eos,
    /// Deadline expired with data received (raw mode only)
    Timeout,
    /// Response buffer filled
    MaxChars,
}

/// One response read from the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Response text without the input terminator
    pub text: String,
    /// Why the read stopped
    pub termination: Termination,
}

struct Link {
    port: BufReader<DynSerial>,
    framing: Framing,
}

/// Disables the input terminator until dropped.
struct RawInputGuard<'a> {
    link: &'a mut Link,
    saved: String,
}

impl<'a> RawInputGuard<'a> {
    fn new(link: &'a mut Link) -> Self {
        let saved = std::mem::take(&mut link.framing.input);
        Self { link, saved }
    }
}

impl Deref for RawInputGuard<'_> {
    type Target = Link;

    fn deref(&self) -> &Link {
        self.link
    }
}

impl DerefMut for RawInputGuard<'_> {
    fn deref_mut(&mut self) -> &mut Link {
        self.link
    }
}

impl Drop for RawInputGuard<'_> {
    fn drop(&mut self) {
        self.link.framing.input = std::mem::take(&mut self.saved);
    }
}

/// Exclusive, framed link to one controller.
pub struct Transport {
    link: Mutex<Link>,
}

impl Transport {
    /// Open a serial or TCP link with normal framing.
    pub async fn open(
        target: &ConnectionTarget,
        baud_rate: u32,
        device_name: &str,
    ) -> Result<Self, TransportError> {
        let port = serial::open_target(target, baud_rate, device_name).await?;
        Ok(Self::from_port(port))
    }

    /// Wrap an already-open stream with normal framing.
    pub fn new<P: SerialPortIO + 'static>(port: P) -> Self {
        Self::from_port(Box::new(port))
    }

    /// Wrap a type-erased stream with normal framing.
    pub fn from_port(port: DynSerial) -> Self {
        Self {
            link: Mutex::new(Link {
                port: BufReader::new(port),
                framing: Framing::normal(),
            }),
        }
    }

    /// Replace the framing used by subsequent exchanges.
    pub async fn set_framing(&self, framing: Framing) {
        self.link.lock().await.framing = framing;
    }

    /// Framing currently in effect.
    pub async fn framing(&self) -> Framing {
        self.link.lock().await.framing.clone()
    }

    /// Discard anything the controller sent before we started talking.
    ///
    /// Returns the number of bytes dropped.
    pub async fn drain_input(&self, quiet: Duration) -> usize {
        let mut link = self.link.lock().await;
        let buffered = discard_buffered(&mut link.port);
        buffered + serial::drain_serial_buffer(&mut link.port, quiet.as_millis() as u64).await
    }

    /// Send one command without reading a response.
    pub async fn write(&self, command: &str, timeout: Duration) -> Result<(), TransportError> {
        let mut link = self.link.lock().await;
        flush_input(&mut link).await;
        write_frame(&mut link, command, timeout).await
    }

    /// Send one command and read its response.
    pub async fn write_read(
        &self,
        command: &str,
        max_chars: usize,
        timeout: Duration,
    ) -> Result<Response, TransportError> {
        let mut link = self.link.lock().await;
        exchange(&mut link, command, max_chars, timeout).await
    }

    /// Send one command and collect everything that arrives before `timeout`.
    ///
    /// The input terminator is disabled for this exchange only.
    pub async fn write_read_raw(
        &self,
        command: &str,
        max_chars: usize,
        timeout: Duration,
    ) -> Result<Response, TransportError> {
        let mut link = self.link.lock().await;
        let mut raw = RawInputGuard::new(&mut link);
        exchange(&mut raw, command, max_chars, timeout).await
    }
}

fn discard_buffered(port: &mut BufReader<DynSerial>) -> usize {
    let stale = port.buffer().len();
    port.consume(stale);
    stale
}

/// Drop everything received since the last exchange.
///
/// Covers both the read buffer and bytes still pending on the stream, such as
/// a reply that arrived after its exchange had already timed out.
async fn flush_input(link: &mut Link) {
    let buffered = discard_buffered(&mut link.port);
    let pending =
        serial::drain_serial_buffer(link.port.get_mut(), FLUSH_WINDOW.as_millis() as u64).await;
    if buffered + pending > 0 {
        debug!(bytes = buffered + pending, "Discarded stale input");
    }
}

async fn exchange(
    link: &mut Link,
    command: &str,
    max_chars: usize,
    timeout: Duration,
) -> Result<Response, TransportError> {
    flush_input(link).await;
    write_frame(link, command, timeout).await?;
    let response = read_response(link, max_chars, timeout).await?;
    trace!(command, response = %response.text, termination = ?response.termination, "Exchange complete");
    Ok(response)
}

async fn write_frame(link: &mut Link, command: &str, timeout: Duration) -> Result<(), TransportError> {
    let mut frame = String::with_capacity(command.len() + link.framing.output.len());
    frame.push_str(command);
    frame.push_str(&link.framing.output);

    trace!(command, "Write");
    let writer = link.port.get_mut();
    let write = async {
        writer.write_all(frame.as_bytes()).await?;
        writer.flush().await
    };

    match tokio::time::timeout(timeout, write).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(TransportError::Write(e)),
        Err(_) => Err(TransportError::Timeout {
            timeout,
            received: 0,
        }),
    }
}

async fn read_response(
    link: &mut Link,
    max_chars: usize,
    timeout: Duration,
) -> Result<Response, TransportError> {
    let deadline = Instant::now() + timeout;
    let eos = link.framing.input.as_bytes().to_vec();
    let mut buf: Vec<u8> = Vec::with_capacity(max_chars.min(MAX_RESPONSE_LEN));

    loop {
        if !eos.is_empty() && buf.ends_with(&eos) {
            buf.truncate(buf.len() - eos.len());
            return Ok(finish(buf, Termination::Eos));
        }
        if buf.len() >= max_chars {
            return Ok(finish(buf, Termination::MaxChars));
        }

        let chunk = match tokio::time::timeout_at(deadline, link.port.fill_buf()).await {
            Ok(Ok([])) => return Err(TransportError::Disconnected),
            Ok(Ok(chunk)) => chunk,
            Ok(Err(e)) => return Err(TransportError::Read(e)),
            Err(_) if eos.is_empty() && !buf.is_empty() => {
                return Ok(finish(buf, Termination::Timeout));
            }
            Err(_) => {
                return Err(TransportError::Timeout {
                    timeout,
                    received: buf.len(),
                })
            }
        };

        // Take bytes up to the terminator or the buffer limit, leave the rest
        let mut used = 0;
        for &byte in chunk {
            buf.push(byte);
            used += 1;
            if (!eos.is_empty() && buf.ends_with(&eos)) || buf.len() >= max_chars {
                break;
            }
        }
        link.port.consume(used);
    }
}

fn finish(buf: Vec<u8>, termination: Termination) -> Response {
    Response {
        text: String::from_utf8_lossy(&buf).into_owned(),
        termination,
    }
}
