//! Object faces and the per-invocation measurement record

use crate::config::CalibrationConfig;
use crate::types::{Axis, Vec2, Vec3};

/// Number of measurable faces
pub const NUM_SIDES: usize = 5;

/// A face of the calibration object
///
/// Each face maps to the axis it is probed along, the direction of travel
/// toward it, and an optional opposite face for center computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Top = 0,
    Right = 1,
    Front = 2,
    Left = 3,
    Back = 4,
}

impl Side {
    /// Fixed probing order. TOP comes first because it establishes the Z
    /// reference that side probes use for their plunge depth.
    pub const PROBE_ORDER: [Side; NUM_SIDES] = [
        Side::Top,
        Side::Right,
        Side::Front,
        Side::Left,
        Side::Back,
    ];

    /// Index into the per-side measurement arrays
    pub fn index(self) -> usize {
        self as usize
    }

    /// Axis the face is probed along
    pub fn axis(self) -> Axis {
        match self {
            Side::Top => Axis::Z,
            Side::Left | Side::Right => Axis::X,
            Side::Front | Side::Back => Axis::Y,
        }
    }

    /// Direction of probe travel toward the face (+1 or -1)
    pub fn probe_dir(self) -> f32 {
        match self {
            Side::Left | Side::Front => 1.0,
            Side::Top | Side::Right | Side::Back => -1.0,
        }
    }

    /// Opposite face of the same axis pair, if any
    pub fn paired(self) -> Option<Side> {
        match self {
            Side::Left => Some(Side::Right),
            Side::Right => Some(Side::Left),
            Side::Front => Some(Side::Back),
            Side::Back => Some(Side::Front),
            Side::Top => None,
        }
    }

    /// Face name for diagnostics
    pub fn name(self) -> &'static str {
        match self {
            Side::Top => "Top",
            Side::Right => "Right",
            Side::Front => "Front",
            Side::Left => "Left",
            Side::Back => "Back",
        }
    }

    /// Face is measured under this configuration (axis calibratable and
    /// face selected)
    pub fn enabled_in(self, config: &CalibrationConfig) -> bool {
        match self {
            Side::Top => config.axes.z,
            Side::Left => config.axes.x && config.faces.left,
            Side::Right => config.axes.x && config.faces.right,
            Side::Front => config.axes.y && config.faces.front,
            Side::Back => config.axes.y && config.faces.back,
        }
    }
}

/// Measurement record threaded through one calibration invocation
///
/// Stack-scoped to the command that created it; per-face entries are only
/// meaningful for faces enabled by configuration.
#[derive(Debug, Clone)]
pub struct Measurements {
    /// Best estimate of the object center, initialized to the known center
    pub obj_center: Vec3,
    /// Raw probe-trigger coordinate per face, indexed by [`Side::index`]
    pub obj_side: [f32; NUM_SIDES],
    /// Axis backlash observed while probing each face
    pub backlash: [f32; NUM_SIDES],
    /// Known-minus-measured center deviation, recomputed each probe pass
    pub pos_error: Vec3,
    /// Effective probe-tip contact diameter inferred from paired faces
    pub nozzle_outer_dimension: Vec2,
}

impl Measurements {
    /// New record seeded from the configured ground truth
    pub fn new(config: &CalibrationConfig) -> Self {
        Self {
            obj_center: config.object.center(),
            obj_side: [0.0; NUM_SIDES],
            backlash: [0.0; NUM_SIDES],
            pos_error: Vec3::ZERO,
            nozzle_outer_dimension: Vec2::splat(config.probe.nozzle_diameter_mm),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_descriptors() {
        assert_eq!(Side::Top.axis(), Axis::Z);
        assert_eq!(Side::Top.probe_dir(), -1.0);
        assert_eq!(Side::Left.axis(), Axis::X);
        assert_eq!(Side::Left.probe_dir(), 1.0);
        assert_eq!(Side::Right.probe_dir(), -1.0);
        assert_eq!(Side::Front.axis(), Axis::Y);
        assert_eq!(Side::Back.probe_dir(), -1.0);
    }

    #[test]
    fn test_side_pairing() {
        assert_eq!(Side::Left.paired(), Some(Side::Right));
        assert_eq!(Side::Back.paired(), Some(Side::Front));
        assert_eq!(Side::Top.paired(), None);
    }

    #[test]
    fn test_probe_order_indices() {
        // Array indexing relies on the discriminants matching PROBE_ORDER
        for (i, side) in Side::PROBE_ORDER.iter().enumerate() {
            assert_eq!(side.index(), i);
        }
    }

    #[test]
    fn test_enabled_in_respects_axis_support() {
        let mut config = CalibrationConfig::cube_defaults();
        assert!(Side::Left.enabled_in(&config));
        config.axes.x = false;
        assert!(!Side::Left.enabled_in(&config));
        assert!(!Side::Right.enabled_in(&config));
        assert!(Side::Front.enabled_in(&config));
    }

    #[test]
    fn test_record_seeded_from_config() {
        let config = CalibrationConfig::cube_defaults();
        let m = Measurements::new(&config);
        assert_eq!(m.obj_center, config.object.center());
        assert_eq!(
            m.nozzle_outer_dimension.x,
            config.probe.nozzle_diameter_mm
        );
        assert_eq!(m.pos_error, Vec3::ZERO);
    }
}
