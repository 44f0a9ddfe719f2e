//! Byte-Stream Abstractions for Controller Links
//!
//! Controllers are reached either over an RS-232/RS-485 serial line or through
//! a TCP terminal server / Ethernet-equipped drive. Both are plain byte streams,
//! so drivers are written against [`SerialPortIO`] and never see which one they
//! got.
//!
//! # Types
//!
//! - [`SerialPortIO`]: Trait alias combining AsyncRead + AsyncWrite
//! - [`DynSerial`]: Type-erased boxed stream
//! - [`ConnectionTarget`]: Parsed connection string (serial path or `host:port`)
//!
//! # Utilities
//!
//! - [`open_serial_async`]: Open a serial port with spawn_blocking
//! - [`open_tcp_async`]: Connect to a TCP endpoint with a deadline
//! - [`open_target`]: Open whichever kind of link a [`ConnectionTarget`] names
//! - [`drain_serial_buffer`]: Drain stale data from a stream
//!
//! # Example
//!
//! ```rust,ignore
//! use motor_core::serial::{open_target, ConnectionTarget};
//!
//! let target: ConnectionTarget = "/dev/ttyUSB0".parse()?;
//! let port = open_target(&target, 9600, "Lexium").await?;
//! ```

use crate::error::TransportError;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};

/// Deadline for establishing a TCP connection.
pub const TCP_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Serial Port Trait
// =============================================================================

/// Trait alias for async byte-stream I/O.
///
/// Any type implementing `AsyncRead + AsyncWrite + Unpin + Send` can be used
/// as a controller link. This includes:
/// - `tokio_serial::SerialStream` (serial hardware)
/// - `tokio::net::TcpStream` (terminal servers, Ethernet drives)
/// - `tokio::io::DuplexStream` and the mock serial port (testing)
pub trait SerialPortIO: AsyncRead + AsyncWrite + Unpin + Send {}

// Blanket implementation for all types meeting the requirements
impl<T: AsyncRead + AsyncWrite + Unpin + Send> SerialPortIO for T {}

/// Type-erased boxed controller link.
pub type DynSerial = Box<dyn SerialPortIO>;

// =============================================================================
// Connection Target
// =============================================================================

/// Where a controller is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionTarget {
    /// Serial device path (e.g. `/dev/ttyUSB0`, `COM3`)
    Serial(String),
    /// TCP endpoint as `host:port`
    Tcp(String),
}

impl FromStr for ConnectionTarget {
    type Err = TransportError;

    /// Parse a connection string.
    ///
    /// `tcp://host:port` and `host:port` (where the part after the last colon
    /// is a port number and the string is not a filesystem path) select TCP.
    /// Everything else is treated as a serial device path.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TransportError::Connect {
                target: String::new(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "empty connection target",
                ),
            });
        }

        if let Some(addr) = s.strip_prefix("tcp://") {
            return Ok(Self::Tcp(addr.to_string()));
        }

        let looks_like_path = s.starts_with('/') || s.starts_with('\\');
        let has_port = s
            .rsplit_once(':')
            .map(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok())
            .unwrap_or(false);

        if has_port && !looks_like_path {
            Ok(Self::Tcp(s.to_string()))
        } else {
            Ok(Self::Serial(s.to_string()))
        }
    }
}

impl fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial(path) => write!(f, "{}", path),
            Self::Tcp(addr) => write!(f, "tcp://{}", addr),
        }
    }
}

// =============================================================================
// Opening Links
// =============================================================================

/// Open a serial port asynchronously using spawn_blocking.
///
/// Port initialization can block, so it runs off the async runtime. Standard
/// settings are applied: 8N1, no flow control.
///
/// # Errors
///
/// Returns [`TransportError::Connect`] if the port cannot be opened.
pub async fn open_serial_async(
    port_path: &str,
    baud_rate: u32,
    device_name: &str,
) -> Result<tokio_serial::SerialStream, TransportError> {
    use tokio::task::spawn_blocking;
    use tokio_serial::SerialPortBuilderExt;

    let port_path_owned = port_path.to_string();

    let opened = spawn_blocking(move || {
        tokio_serial::new(&port_path_owned, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
    })
    .await
    .map_err(|e| TransportError::Connect {
        target: port_path.to_string(),
        source: std::io::Error::other(e),
    })?;

    let port = opened.map_err(|e| TransportError::Connect {
        target: port_path.to_string(),
        source: e.into(),
    })?;

    tracing::info!(device = device_name, port = port_path, baud_rate, "Opened serial port");
    Ok(port)
}

/// Connect to a TCP endpoint, bounded by [`TCP_CONNECT_TIMEOUT`].
///
/// Nagle is disabled since every command is a few bytes awaiting a reply.
pub async fn open_tcp_async(
    addr: &str,
    device_name: &str,
) -> Result<tokio::net::TcpStream, TransportError> {
    let connect_error = |source: std::io::Error| TransportError::Connect {
        target: addr.to_string(),
        source,
    };

    let stream = tokio::time::timeout(TCP_CONNECT_TIMEOUT, tokio::net::TcpStream::connect(addr))
        .await
        .map_err(|_| {
            connect_error(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "connection attempt timed out",
            ))
        })?
        .map_err(connect_error)?;
    stream.set_nodelay(true).map_err(connect_error)?;

    tracing::info!(device = device_name, addr, "Connected TCP link");
    Ok(stream)
}

/// Open the link named by `target`.
///
/// `baud_rate` only applies to serial targets.
pub async fn open_target(
    target: &ConnectionTarget,
    baud_rate: u32,
    device_name: &str,
) -> Result<DynSerial, TransportError> {
    match target {
        ConnectionTarget::Serial(path) => {
            let port = open_serial_async(path, baud_rate, device_name).await?;
            Ok(Box::new(port))
        }
        ConnectionTarget::Tcp(addr) => {
            let stream = open_tcp_async(addr, device_name).await?;
            Ok(Box::new(stream))
        }
    }
}

/// Drain stale data from a stream.
///
/// Reads and discards data until nothing more arrives within `timeout_ms`.
/// Useful right after opening a link, when the controller may still have
/// output pending from before the host connected.
///
/// Returns the total number of bytes discarded.
pub async fn drain_serial_buffer<R: AsyncRead + Unpin>(port: &mut R, timeout_ms: u64) -> usize {
    let mut discard = [0u8; 256];
    let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
    let mut total_discarded = 0usize;

    loop {
        if tokio::time::Instant::now() >= deadline {
            break;
        }

        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        match tokio::time::timeout(remaining, port.read(&mut discard)).await {
            Ok(Ok(0)) => break, // EOF
            Ok(Ok(n)) => {
                total_discarded += n;
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::WouldBlock => break,
            Ok(Err(_)) => break, // Real I/O error, abort drain
            Err(_) => break,     // Timeout, no more immediate data
        }
    }

    total_discarded
}
