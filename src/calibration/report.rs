//! Measurement report for verify mode
//!
//! Verify probes the object and reports everything it measured without
//! persisting offset changes; the tool offset table is normalized on a
//! copy for display only.

use crate::calibration::measurement::{Measurements, Side, NUM_SIDES};
use crate::config::CalibrationConfig;
use crate::machine::ToolOffsets;
use crate::types::{Vec2, Vec3};
use std::fmt;

/// Everything measured by one verify pass
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationReport {
    /// Raw face coordinates; `None` for faces not probed
    pub obj_side: [Option<f32>; NUM_SIDES],
    /// Measured object center
    pub obj_center: Vec3,
    /// Per-face backlash; `None` for faces not probed
    pub backlash: [Option<f32>; NUM_SIDES],
    /// Known-minus-measured positional error
    pub pos_error: Vec3,
    /// Effective probe contact dimensions
    pub nozzle_outer_dimension: Vec2,
    /// Whether a paired-face center exists per plane axis
    pub has_x_center: bool,
    pub has_y_center: bool,
    /// Tool the pass was probed with
    pub active_tool: usize,
    /// Display-normalized copy of the tool offset table
    pub tool_offsets: Vec<Vec3>,
}

impl CalibrationReport {
    /// Snapshot a measurement record for reporting
    pub fn new(
        config: &CalibrationConfig,
        m: &Measurements,
        active_tool: usize,
        offsets: &ToolOffsets,
    ) -> Self {
        let mut obj_side = [None; NUM_SIDES];
        let mut backlash = [None; NUM_SIDES];
        for side in Side::PROBE_ORDER {
            if side.enabled_in(config) {
                obj_side[side.index()] = Some(m.obj_side[side.index()]);
                backlash[side.index()] = Some(m.backlash[side.index()]);
            }
        }

        // Normalize a copy so the display shows tool-relative offsets
        // without touching the live table
        let mut display_offsets = offsets.clone();
        display_offsets.normalize();

        Self {
            obj_side,
            obj_center: m.obj_center,
            backlash,
            pos_error: m.pos_error,
            nozzle_outer_dimension: m.nozzle_outer_dimension,
            has_x_center: config.has_x_center(),
            has_y_center: config.has_y_center(),
            active_tool,
            tool_offsets: display_offsets.iter().copied().collect(),
        }
    }

    /// Emit the report line by line through the logger
    pub fn log(&self) {
        for line in self.to_string().lines() {
            log::info!("{}", line);
        }
    }
}

impl fmt::Display for CalibrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Sides:")?;
        for side in Side::PROBE_ORDER {
            if let Some(value) = self.obj_side[side.index()] {
                writeln!(f, "  {}: {:.3}", side.name(), value)?;
            }
        }

        writeln!(f, "Center:")?;
        if self.has_x_center {
            writeln!(f, "  X: {:.3}", self.obj_center.x)?;
        }
        if self.has_y_center {
            writeln!(f, "  Y: {:.3}", self.obj_center.y)?;
        }
        writeln!(f, "  Z: {:.3}", self.obj_center.z)?;

        writeln!(f, "Backlash:")?;
        for side in Side::PROBE_ORDER {
            if let Some(value) = self.backlash[side.index()] {
                writeln!(f, "  {}: {:.3}", side.name(), value)?;
            }
        }

        writeln!(f, "Nozzle Tip Outer Dimensions:")?;
        if self.has_x_center {
            writeln!(f, "  X: {:.3}", self.nozzle_outer_dimension.x)?;
        }
        if self.has_y_center {
            writeln!(f, "  Y: {:.3}", self.nozzle_outer_dimension.y)?;
        }

        writeln!(f, "T{} Positional Error:", self.active_tool)?;
        if self.has_x_center {
            writeln!(f, "  X: {:.3}", self.pos_error.x)?;
        }
        if self.has_y_center {
            writeln!(f, "  Y: {:.3}", self.pos_error.y)?;
        }
        writeln!(f, "  Z: {:.3}", self.pos_error.z)?;

        if self.tool_offsets.len() > 1 {
            writeln!(f, "Tool Offsets:")?;
            for (tool, offset) in self.tool_offsets.iter().enumerate().skip(1) {
                writeln!(
                    f,
                    "  T{} X: {:.3} Y: {:.3} Z: {:.3}",
                    tool, offset.x, offset.y, offset.z
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_faces_omitted() {
        let mut config = CalibrationConfig::cube_defaults();
        config.faces.front = false;
        config.faces.back = false;

        let m = Measurements::new(&config);
        let offsets = ToolOffsets::new(2);
        let report = CalibrationReport::new(&config, &m, 0, &offsets);

        assert!(report.obj_side[Side::Left.index()].is_some());
        assert!(report.obj_side[Side::Front.index()].is_none());
        assert!(report.obj_side[Side::Back.index()].is_none());
        assert!(!report.has_y_center);
    }

    #[test]
    fn test_display_normalization_leaves_table_alone() {
        let config = CalibrationConfig::cube_defaults();
        let m = Measurements::new(&config);

        let mut offsets = ToolOffsets::new(2);
        *offsets.get_mut(0) = Vec3::new(0.1, 0.2, 0.3);
        *offsets.get_mut(1) = Vec3::new(0.5, 0.0, -0.1);
        let before = offsets.clone();

        let report = CalibrationReport::new(&config, &m, 0, &offsets);
        assert_eq!(offsets, before);
        assert_eq!(report.tool_offsets[0], Vec3::ZERO);
        assert_eq!(report.tool_offsets[1], Vec3::new(0.4, -0.2, -0.4));
    }

    #[test]
    fn test_display_contains_sections() {
        let config = CalibrationConfig::cube_defaults();
        let m = Measurements::new(&config);
        let offsets = ToolOffsets::new(2);
        let text = CalibrationReport::new(&config, &m, 0, &offsets).to_string();

        assert!(text.contains("Sides:"));
        assert!(text.contains("Center:"));
        assert!(text.contains("Backlash:"));
        assert!(text.contains("T0 Positional Error:"));
        assert!(text.contains("Tool Offsets:"));
    }
}
