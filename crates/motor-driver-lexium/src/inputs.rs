//! Home and limit switch input assignments.
//!
//! `PR IS` answers with one record per configurable input:
//!
//! ```text
//! IS = 1, 1, 1
//! IS = 2, 2, 1
//! IS = 3, 3, 1
//! IS = 4, 0, 0
//! ```
//!
//! The fields are input number, input type, and active level. Types 1, 2, and
//! 3 mark the home, positive limit, and negative limit switch inputs; type 0 is
//! a general-purpose input.

use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

/// Most records read from one `PR IS` response.
pub const MAX_INPUT_RECORDS: usize = 5;

static IS_RECORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*IS\s*=\s*([+-]?\d+)\s*,\s*([+-]?\d+)\s*,\s*([+-]?\d+)\s*")
        .expect("Invalid IS record regex")
});

/// One `IS = <input>, <type>, <level>` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSetting {
    /// Input number
    pub input: i64,
    /// Input type code
    pub kind: i64,
    /// Active level
    pub active_level: i64,
}

/// Function assigned to an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputRole {
    /// Type 0
    GeneralPurpose,
    /// Type 1
    Home,
    /// Type 2
    PositiveLimit,
    /// Type 3
    NegativeLimit,
}

impl InputRole {
    /// Map an input type code, `None` for codes the driver does not know.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::GeneralPurpose),
            1 => Some(Self::Home),
            2 => Some(Self::PositiveLimit),
            3 => Some(Self::NegativeLimit),
            _ => None,
        }
    }
}

/// Input numbers wired to the home and limit switches.
///
/// `None` means no input has that role, and the poll cycle skips it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputAssignments {
    /// Home switch input
    pub home: Option<u8>,
    /// Positive limit switch input
    pub positive_limit: Option<u8>,
    /// Negative limit switch input
    pub negative_limit: Option<u8>,
}

impl InputAssignments {
    /// Resolve assignments from a raw `PR IS` response.
    pub fn from_response(response: &str) -> Self {
        let mut assignments = Self::default();
        assignments.apply(&parse_input_settings(response));
        assignments
    }

    /// Assign roles from `settings`. Roles not mentioned keep their value.
    pub fn apply(&mut self, settings: &[InputSetting]) {
        for setting in settings {
            let role = match InputRole::from_code(setting.kind) {
                Some(role) => role,
                None => {
                    warn!(
                        input = setting.input,
                        kind = setting.kind,
                        "Invalid input type in IS setting"
                    );
                    continue;
                }
            };

            let slot = match role {
                InputRole::GeneralPurpose => continue,
                InputRole::Home => &mut self.home,
                InputRole::PositiveLimit => &mut self.positive_limit,
                InputRole::NegativeLimit => &mut self.negative_limit,
            };

            match u8::try_from(setting.input) {
                Ok(input) if input > 0 => *slot = Some(input),
                _ => warn!(input = setting.input, ?role, "Input number out of range"),
            }
        }
    }
}

/// Parse up to [`MAX_INPUT_RECORDS`] consecutive `IS` records.
///
/// Parsing stops at the first text that is not a well-formed record.
pub fn parse_input_settings(response: &str) -> Vec<InputSetting> {
    let mut settings = Vec::with_capacity(MAX_INPUT_RECORDS);
    let mut cursor = 0;

    while settings.len() < MAX_INPUT_RECORDS {
        let Some(caps) = IS_RECORD.captures(&response[cursor..]) else {
            break;
        };
        let field = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<i64>().ok());
        let (Some(input), Some(kind), Some(active_level)) = (field(1), field(2), field(3)) else {
            break;
        };

        settings.push(InputSetting {
            input,
            kind,
            active_level,
        });
        cursor += caps.get(0).map_or(0, |m| m.end());
    }

    settings
}
