//! Calibration command parsing
//!
//! One command, argument-driven mode selection:
//!
//! - `B`: backlash-only calibration
//! - `T[<index>]`: single-toolhead calibration (default: active tool)
//! - `V`: verify, probe and report without persistent changes
//! - `U<value>`: override the probing standoff distance (mm)
//! - no arguments: full calibration sequence

use crate::error::{Error, Result};

/// Selected calibration mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Backlash-only calibration
    Backlash,
    /// Single-toolhead calibration; `None` means the active tool
    Toolhead(Option<usize>),
    /// Probe and report, no persistent changes
    Verify,
    /// Full sequence: rough pass, backlash, settle, precise pass
    Full,
}

/// A parsed calibration command
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationCommand {
    pub mode: Mode,
    /// Standoff distance override (mm)
    pub uncertainty: Option<f32>,
}

impl CalibrationCommand {
    /// Full sequence with default standoff
    pub fn full() -> Self {
        Self {
            mode: Mode::Full,
            uncertainty: None,
        }
    }

    /// Parse argument words.
    ///
    /// When several mode letters appear, `B` wins over `T`, which wins
    /// over `V`; `U` combines with any mode.
    pub fn parse<S: AsRef<str>>(args: &[S]) -> Result<Self> {
        let mut backlash = false;
        let mut toolhead: Option<Option<usize>> = None;
        let mut verify = false;
        let mut uncertainty = None;

        for arg in args {
            let arg = arg.as_ref().trim();
            if arg.is_empty() {
                continue;
            }
            if !arg.is_ascii() {
                return Err(Error::InvalidArgument(arg.to_string()));
            }
            let value = &arg[1..];
            match arg.as_bytes()[0].to_ascii_uppercase() {
                b'B' if value.is_empty() => backlash = true,
                b'T' => {
                    let index = if value.is_empty() {
                        None
                    } else {
                        Some(value.parse::<usize>().map_err(|_| {
                            Error::InvalidArgument(format!("bad tool index in '{}'", arg))
                        })?)
                    };
                    toolhead = Some(index);
                }
                b'V' if value.is_empty() => verify = true,
                b'U' => {
                    let parsed: f32 = value.parse().map_err(|_| {
                        Error::InvalidArgument(format!("bad distance in '{}'", arg))
                    })?;
                    if !parsed.is_finite() || parsed <= 0.0 {
                        return Err(Error::InvalidArgument(format!(
                            "distance must be positive in '{}'",
                            arg
                        )));
                    }
                    uncertainty = Some(parsed);
                }
                _ => {
                    return Err(Error::InvalidArgument(arg.to_string()));
                }
            }
        }

        let mode = if backlash {
            Mode::Backlash
        } else if let Some(tool) = toolhead {
            Mode::Toolhead(tool)
        } else if verify {
            Mode::Verify
        } else {
            Mode::Full
        };

        Ok(Self { mode, uncertainty })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_args_is_full_sequence() {
        let cmd = CalibrationCommand::parse::<&str>(&[]).unwrap();
        assert_eq!(cmd.mode, Mode::Full);
        assert_eq!(cmd.uncertainty, None);
    }

    #[test]
    fn test_mode_letters() {
        assert_eq!(
            CalibrationCommand::parse(&["B"]).unwrap().mode,
            Mode::Backlash
        );
        assert_eq!(
            CalibrationCommand::parse(&["T"]).unwrap().mode,
            Mode::Toolhead(None)
        );
        assert_eq!(
            CalibrationCommand::parse(&["T1"]).unwrap().mode,
            Mode::Toolhead(Some(1))
        );
        assert_eq!(
            CalibrationCommand::parse(&["v"]).unwrap().mode,
            Mode::Verify
        );
    }

    #[test]
    fn test_uncertainty_override() {
        let cmd = CalibrationCommand::parse(&["T0", "U0.5"]).unwrap();
        assert_eq!(cmd.mode, Mode::Toolhead(Some(0)));
        assert_eq!(cmd.uncertainty, Some(0.5));
    }

    #[test]
    fn test_mode_precedence() {
        // B beats T beats V, regardless of order
        let cmd = CalibrationCommand::parse(&["V", "T2", "B"]).unwrap();
        assert_eq!(cmd.mode, Mode::Backlash);
        let cmd = CalibrationCommand::parse(&["V", "T2"]).unwrap();
        assert_eq!(cmd.mode, Mode::Toolhead(Some(2)));
    }

    #[test]
    fn test_invalid_arguments() {
        assert!(CalibrationCommand::parse(&["X"]).is_err());
        assert!(CalibrationCommand::parse(&["Tfoo"]).is_err());
        assert!(CalibrationCommand::parse(&["U-1"]).is_err());
        assert!(CalibrationCommand::parse(&["U"]).is_err());
    }
}
