//! Process-wide machine state corrected by calibration
//!
//! These live for the whole process and are mutated only by the
//! calibration step that owns them; the engine is single-threaded so no
//! locking is needed.

use crate::types::Vec3;

/// Per-tool offset table
///
/// Tool 0 is the reference tool: its offset defines the coordinate origin
/// and is the zero vector after any [`ToolOffsets::normalize`].
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOffsets {
    offsets: Vec<Vec3>,
}

impl ToolOffsets {
    /// Create a zeroed table for `tool_count` tools
    pub fn new(tool_count: usize) -> Self {
        Self {
            offsets: vec![Vec3::ZERO; tool_count],
        }
    }

    /// Number of tools in the table
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Table has no tools
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Offset of `tool`
    pub fn get(&self, tool: usize) -> Vec3 {
        self.offsets[tool]
    }

    /// Mutable offset of `tool`
    pub fn get_mut(&mut self, tool: usize) -> &mut Vec3 {
        &mut self.offsets[tool]
    }

    /// Zero every offset
    pub fn reset_all(&mut self) {
        for offset in &mut self.offsets {
            *offset = Vec3::ZERO;
        }
    }

    /// Make all offsets relative to tool 0 and force tool 0 to exact zero
    pub fn normalize(&mut self) {
        if self.offsets.is_empty() {
            return;
        }
        let base = self.offsets[0];
        for offset in &mut self.offsets[1..] {
            *offset -= base;
        }
        self.offsets[0] = Vec3::ZERO;
    }

    /// Iterate over all offsets in tool order
    pub fn iter(&self) -> impl Iterator<Item = &Vec3> {
        self.offsets.iter()
    }
}

/// Backlash compensation state
///
/// Owned by the machine; the backlash calibrator writes `distance` and
/// scoped overrides toggle `correction`/`smoothing_mm` around probe passes.
#[derive(Debug, Clone, PartialEq)]
pub struct BacklashComp {
    /// Measured backlash distance per axis (mm)
    pub distance: Vec3,
    /// Compensation fraction: 0.0 = off, 1.0 = full
    pub correction: f32,
    /// Smoothing distance over which compensation is spread (mm)
    pub smoothing_mm: f32,
}

impl Default for BacklashComp {
    fn default() -> Self {
        Self {
            distance: Vec3::ZERO,
            correction: 1.0,
            smoothing_mm: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_zeroes_reference_tool() {
        let mut offsets = ToolOffsets::new(3);
        *offsets.get_mut(0) = Vec3::new(0.1, -0.2, 0.3);
        *offsets.get_mut(1) = Vec3::new(1.0, 2.0, 3.0);
        *offsets.get_mut(2) = Vec3::new(-0.5, 0.5, 0.0);

        let rel_before = offsets.get(2) - offsets.get(1);
        offsets.normalize();

        assert_eq!(offsets.get(0), Vec3::ZERO);
        assert_eq!(offsets.get(1), Vec3::new(0.9, 2.2, 2.7));
        // Relative offsets between non-reference tools are preserved
        assert_eq!(offsets.get(2) - offsets.get(1), rel_before);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let mut offsets = ToolOffsets::new(2);
        *offsets.get_mut(0) = Vec3::new(0.3, 0.0, -0.1);
        *offsets.get_mut(1) = Vec3::new(0.7, 0.2, 0.4);

        offsets.normalize();
        let snapshot = offsets.clone();
        offsets.normalize();
        assert_eq!(offsets, snapshot);
    }

    #[test]
    fn test_reset_all() {
        let mut offsets = ToolOffsets::new(2);
        *offsets.get_mut(1) = Vec3::new(1.0, 1.0, 1.0);
        offsets.reset_all();
        assert_eq!(offsets.get(1), Vec3::ZERO);
    }
}
