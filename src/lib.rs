//! sparsh-cal - touch-probe calibration engine for multi-tool motion platforms
//!
//! Probes a reference object of precisely known position and dimensions to
//! determine the object's true center, per-axis mechanical backlash, and
//! each tool's positional offset, then corrects the machine's coordinate
//! system and tool offset table.
//!
//! The engine drives hardware only through the [`machine::Machine`] trait;
//! [`devices::SimulatedMachine`] implements it for hardware-free runs.

pub mod calibration;
pub mod config;
pub mod devices;
pub mod error;
pub mod machine;
pub mod types;

// Re-export commonly used types
pub use calibration::{
    CalibrationCommand, CalibrationReport, Calibrator, Confidence, Measurements, Mode, Side,
};
pub use config::CalibrationConfig;
pub use devices::SimulatedMachine;
pub use error::{Error, Result};
pub use machine::{BacklashComp, Machine, ToolOffsets};
pub use types::{Axis, Vec2, Vec3};
