//! Lexium MDrive error codes.
//!
//! The controller reports the last fault through `PR ER` as a bare integer.
//! Descriptions follow the MCode programming manual.

use std::fmt;

/// Description used for codes missing from [`ERROR_CODES`].
pub const UNKNOWN_ERROR: &str = "Unknown error code";

/// Code-to-description table, sorted by code.
pub static ERROR_CODES: &[(i64, &str)] = &[
    (0, "No Error"),
    // I/O errors
    (6, "An I/O is already set to this type. Applies to non-General Purpose I/O"),
    (8, "Tried to set an I/O to an incorrect I/O type"),
    (9, "Tried to write to I/O set as Input or is 'TYPED'"),
    (10, "Illegal I/O number"),
    (11, "Incorrect CLOCK type"),
    (12, "Illegal Trip/Capture"),
    // Data errors
    (20, "Tried to set unknown variable or flag"),
    (21, "Tried to set an incorrect value"),
    (22, "VI is set greater than or equal to VM"),
    (23, "VM is set less than or equal to VI"),
    (24, "Illegal data entered"),
    (25, "Variable or flag is read only"),
    (26, "Variable or flag is not allowed to be incremented or decremented"),
    (27, "Trip not defined"),
    (28, "Trying to redefine a program label or variable"),
    (29, "Trying to redefine a build in command, variable, or flag"),
    (30, "Unknown label or user variable"),
    (31, "Program label or user variable table is full"),
    (32, "Trying to set a label"),
    (33, "Trying to set and instruction"),
    (34, "Trying to execute a variable or flag"),
    (35, "Trying to print illegal variable or flag"),
    (36, "Illegal motor count to encoder count ratio"),
    (37, "Command, variable, or flag not available in drive"),
    (38, "Missing parameter separator"),
    (39, "Trip on position and trip on relative distance not allowed together"),
    // Program errors
    (40, "Program not running"),
    (41, "Stack overflow"),
    (42, "Illegal program address"),
    (43, "Tried to overflow program stack"),
    (44, "Program locked"),
    (45, "Trying to overflow program space"),
    (46, "Not in program mode"),
    (47, "Tried to write in illegal flash address"),
    (48, "Program execution stopped by I/O set as stop"),
    // Communications errors
    (61, "Trying to set illegal baud rate"),
    (62, "IV already pending or IF flag already true"),
    (63, "Character over-run"),
    (64, "Startup calibration failed"),
    // System errors
    (70, "Flash check sum failed"),
    (71, "Internal temperature warning, 10 C to shutdown"),
    (72, "Internal over temp fault, disabling drive"),
    (73, "Tried to save while moving"),
    (74, "Tried to initialize parameters or clear program while moving"),
    (75, "Linear over temperature error"),
    // Motion errors
    (80, "Home switch not defined"),
    (81, "Home type not defined"),
    (82, "Went to both limits and did not find home"),
    (83, "Reached plus limit switch"),
    (84, "Reached minus limit switch"),
    (85, "MA or MR isn't allowed during home and home isn't allowed while moving"),
    (86, "Stall detected"),
    (87, "In clock mode"),
    (88, "Following error"),
    (90, "Motion variables are too low switching to EE=1"),
    (91, "Motion stopped by I/O set as stop"),
    (92, "Position error in closed loop"),
    (93, "MR or MA not allowed while correcting position"),
    // Closed-loop errors
    (100, "Configuration test done, encoder resolution mismatch"),
    (101, "Configuration test done, encoder direction incorrect"),
    (102, "Configuration test done, encoder resolution and direction incorrect"),
    (103, "Configuration not done, drive not enabled"),
    (104, "Locked rotor, send CF to clear"),
    (105, "Maximum position count reached"),
    (106, "Lead limit reached"),
    (107, "Lag limit reached"),
    (108, "Lead/lag not zero at the end of a move"),
    (109, "Calibration failed because drive not enabled"),
    (110, "Make-up disabled"),
    (111, "Factory calibration failed"),
];

/// Error code read back from the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DeviceErrorCode(pub i64);

impl DeviceErrorCode {
    /// Returns true for code 0 ("No Error").
    pub fn is_ok(&self) -> bool {
        self.0 == 0
    }

    /// Human-readable description, or [`UNKNOWN_ERROR`] for unmapped codes.
    pub fn description(&self) -> &'static str {
        ERROR_CODES
            .binary_search_by_key(&self.0, |&(code, _)| code)
            .map(|idx| ERROR_CODES[idx].1)
            .unwrap_or(UNKNOWN_ERROR)
    }
}

impl fmt::Display for DeviceErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:'{}'", self.0, self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_sorted_and_unique() {
        assert!(ERROR_CODES.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn known_codes_have_descriptions() {
        assert_eq!(DeviceErrorCode(0).description(), "No Error");
        assert_eq!(
            DeviceErrorCode(22).description(),
            "VI is set greater than or equal to VM"
        );
        assert_eq!(DeviceErrorCode(86).description(), "Stall detected");
        assert_eq!(
            DeviceErrorCode(111).description(),
            "Factory calibration failed"
        );
    }

    #[test]
    fn unmapped_codes_fall_back() {
        for code in [1, 7, 49, 60, 89, 112, -1] {
            assert_eq!(DeviceErrorCode(code).description(), UNKNOWN_ERROR);
        }
    }

    #[test]
    fn display_combines_code_and_description() {
        assert_eq!(
            DeviceErrorCode(83).to_string(),
            "83:'Reached plus limit switch'"
        );
        assert!(DeviceErrorCode(0).is_ok());
        assert!(!DeviceErrorCode(83).is_ok());
    }
}
