//! MCode command vocabulary and response parsing.
//!
//! Commands are short ASCII strings. Integer arguments are rendered in base 10
//! with no padding; fractional device units are truncated toward zero before
//! formatting, the same as the controller does when it receives them.
//!
//! Responses to queries are bare numbers terminated by `\r\n`. Parsing is
//! lenient: anything that does not start with a number parses as zero rather
//! than failing the exchange.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Longest command body the controller accepts, address prefix included.
pub const MAX_COMMAND_LEN: usize = 70;

/// Divisor of the fixed motor-count to encoder-count ratio used for `C2`.
const COUNTER2_MOTOR_COUNTS: i64 = 51200;
/// Dividend of the fixed motor-count to encoder-count ratio used for `C2`.
const COUNTER2_ENCODER_COUNTS: i64 = 4000;

static LEADING_INT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([+-]?\d+)").expect("Invalid integer regex"));

static LEADING_FLOAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?)").expect("Invalid float regex")
});

/// Search direction for `HM`.
///
/// The controller numbers its homing modes so that seeking home in the
/// positive direction is mode 3, and the negative direction is mode 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomeDirection {
    /// Seek home in the negative direction (`HM 1`)
    Reverse = 1,
    /// Seek home in the positive direction (`HM 3`)
    Forward = 3,
}

impl HomeDirection {
    /// Map the host's `forwards` flag to a homing mode.
    pub fn from_forwards(forwards: bool) -> Self {
        if forwards {
            Self::Forward
        } else {
            Self::Reverse
        }
    }

    /// Numeric mode sent on the wire.
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// One MCode command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `PR VR` - firmware version
    VersionQuery,
    /// `PR EE` - encoder enable flag
    EncoderQuery,
    /// `PR P` - position counter
    PositionQuery,
    /// `PR MV` - moving flag
    MovingQuery,
    /// `PR ER` - last error code
    ErrorQuery,
    /// `PR I<n>` - state of input `n`
    InputQuery(u8),
    /// `PR IS` - input configuration, one `IS = ...` record per line
    InputSettingsQuery,
    /// `PR VI` - configured base velocity
    BaseVelocityQuery,
    /// `VI=<n>`
    SetBaseVelocity(i64),
    /// `VM=<n>`
    SetMaxVelocity(i64),
    /// `A=<n>`
    SetAcceleration(i64),
    /// `MA <n>`
    MoveAbsolute(i64),
    /// `MR <n>`
    MoveRelative(i64),
    /// `SL <n>` - slew at constant velocity, `SL 0` stops
    Slew(i64),
    /// `HM <mode>`
    Home(HomeDirection),
    /// `P=<n>`
    SetPosition(i64),
    /// `C1=<n>` - motor counter
    SetCounter1(i64),
    /// `C2=<n>` - encoder counter
    SetCounter2(i64),
    /// `S` - save to nonvolatile memory
    SaveToNvm,
}

impl Command {
    /// Slew command that stops the axis.
    pub const STOP: Command = Command::Slew(0);

    /// Whether the controller answers this command with a response line.
    pub fn expects_response(&self) -> bool {
        matches!(
            self,
            Self::VersionQuery
                | Self::EncoderQuery
                | Self::PositionQuery
                | Self::MovingQuery
                | Self::ErrorQuery
                | Self::InputQuery(_)
                | Self::InputSettingsQuery
                | Self::BaseVelocityQuery
        )
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VersionQuery => f.write_str("PR VR"),
            Self::EncoderQuery => f.write_str("PR EE"),
            Self::PositionQuery => f.write_str("PR P"),
            Self::MovingQuery => f.write_str("PR MV"),
            Self::ErrorQuery => f.write_str("PR ER"),
            Self::InputQuery(n) => write!(f, "PR I{}", n),
            Self::InputSettingsQuery => f.write_str("PR IS"),
            Self::BaseVelocityQuery => f.write_str("PR VI"),
            Self::SetBaseVelocity(v) => write!(f, "VI={}", v),
            Self::SetMaxVelocity(v) => write!(f, "VM={}", v),
            Self::SetAcceleration(a) => write!(f, "A={}", a),
            Self::MoveAbsolute(p) => write!(f, "MA {}", p),
            Self::MoveRelative(p) => write!(f, "MR {}", p),
            Self::Slew(v) => write!(f, "SL {}", v),
            Self::Home(dir) => write!(f, "HM {}", dir.code()),
            Self::SetPosition(p) => write!(f, "P={}", p),
            Self::SetCounter1(p) => write!(f, "C1={}", p),
            Self::SetCounter2(p) => write!(f, "C2={}", p),
            Self::SaveToNvm => f.write_str("S"),
        }
    }
}

/// Truncate device units to the integer the controller is sent.
pub fn device_units(value: f64) -> i64 {
    value as i64
}

/// Encoder counter value matching a motor position of `position` counts.
///
/// Integer arithmetic, so the result truncates toward zero.
pub fn counter2_for_position(position: i64) -> i64 {
    position.saturating_mul(COUNTER2_ENCODER_COUNTS) / COUNTER2_MOTOR_COUNTS
}

/// Prefix a command with the multidrop device address.
///
/// An empty address leaves the command unchanged.
pub fn prepend_device_address(address: &str, command: &str) -> String {
    let mut framed = String::with_capacity(address.len() + command.len());
    framed.push_str(address);
    framed.push_str(command);
    debug_assert!(
        framed.len() <= MAX_COMMAND_LEN,
        "command exceeds {} bytes: {:?}",
        MAX_COMMAND_LEN,
        framed
    );
    framed
}

/// Parse the leading integer of a response, or 0 if there is none.
pub fn parse_int(response: &str) -> i64 {
    LEADING_INT
        .captures(response)
        .and_then(|caps| caps.get(1))
        .map(|m| {
            m.as_str().parse::<i64>().unwrap_or_else(|_| {
                if m.as_str().starts_with('-') {
                    i64::MIN
                } else {
                    i64::MAX
                }
            })
        })
        .unwrap_or(0)
}

/// Parse the leading decimal number of a response, or 0.0 if there is none.
pub fn parse_float(response: &str) -> f64 {
    LEADING_FLOAT
        .captures(response)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(0.0)
}
