//! Machine platform abstraction
//!
//! The calibration engine drives hardware only through the [`Machine`]
//! trait: blocking motion, queue drain, the probe contact pin, tool
//! changes, and the process-wide state it is allowed to correct (tool
//! offsets, backlash compensation, coordinate origin). Real platform
//! adapters and the simulated machine both implement it.

pub mod state;

pub use state::{BacklashComp, ToolOffsets};

use crate::error::Result;
use crate::types::Vec3;

/// Motion platform consumed by the calibration engine
///
/// All motion is synchronous from the engine's point of view: a probing
/// step is `move_to` followed by `synchronize` followed by a pin sample.
/// No operation is cancellable mid-probe.
pub trait Machine {
    /// Current logical position of the active tool
    fn position(&self) -> Vec3;

    /// Queue a linear move to `target` at `feedrate_mm_min`
    fn move_to(&mut self, target: Vec3, feedrate_mm_min: f32) -> Result<()>;

    /// Block until all queued motion has physically completed
    fn synchronize(&mut self) -> Result<()>;

    /// Instantaneous probe contact state
    fn probe_triggered(&self) -> bool;

    /// All axes have been homed
    fn is_homed(&self) -> bool;

    /// Index of the active tool
    fn active_tool(&self) -> usize;

    /// Number of tools on the platform
    fn tool_count(&self) -> usize;

    /// Switch the active tool, blocking until mechanically complete
    fn change_tool(&mut self, tool: usize) -> Result<()>;

    /// Shift the logical coordinate system by `delta` without motion.
    ///
    /// The physical position is unchanged; the machine's notion of where
    /// it is moves by `delta`. Used to fold a measured positional error
    /// into the coordinate origin.
    fn offset_position(&mut self, delta: Vec3);

    /// Backlash compensation state
    fn backlash(&self) -> &BacklashComp;

    /// Mutable backlash compensation state
    fn backlash_mut(&mut self) -> &mut BacklashComp;

    /// Per-tool offset table
    fn tool_offsets(&self) -> &ToolOffsets;

    /// Mutable per-tool offset table
    fn tool_offsets_mut(&mut self) -> &mut ToolOffsets;

    /// Loosen or re-enforce soft endstops for the calibration session
    fn set_soft_endstops_loose(&mut self, loose: bool);

    /// Enable or disable leveling compensation; returns the prior state
    fn set_leveling_enabled(&mut self, enabled: bool) -> bool;
}
