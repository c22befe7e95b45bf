//! Measurement and calibration engine
//!
//! Probes a reference object of known position and dimensions to determine
//! its true center, per-axis backlash, and per-tool positional offsets,
//! then corrects the machine's coordinate system and tool offset table.
//!
//! Entry point is [`Calibrator::run`] with a parsed [`CalibrationCommand`].

pub mod command;
pub mod measurement;
pub mod probe;
pub mod report;
pub mod session;

pub use command::{CalibrationCommand, Mode};
pub use measurement::{Measurements, Side, NUM_SIDES};
pub use report::CalibrationReport;
pub use session::Calibrator;

use crate::config::ProbeConfig;

/// Probing confidence tier
///
/// Controls how far from the object probing starts, the step size, and
/// whether backlash is measured along the way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    /// No real notion of where the object is: coarse, fast search
    Unknown,
    /// Location roughly known but backlash makes it uncertain: slow probe,
    /// backlash measured
    Uncertain,
    /// Backlash compensation active: slow probe from close in
    Certain,
}

impl Confidence {
    /// Standoff distance for this tier (mm)
    pub fn distance(self, probe: &ProbeConfig) -> f32 {
        match self {
            Confidence::Unknown => probe.unknown_mm,
            Confidence::Uncertain => probe.uncertain_mm,
            Confidence::Certain => probe.certain_mm,
        }
    }

    /// Fast tier: coarse steps, wide travel limit, no backlash measurement
    pub fn is_fast(self) -> bool {
        matches!(self, Confidence::Unknown)
    }
}
