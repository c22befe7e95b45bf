//! Configuration for the calibration engine
//!
//! Loads calibration constants from a TOML file: reference object geometry,
//! probe parameters, feedrate tiers, face/axis enablement, feature flags,
//! and the simulated-machine parameters used by tests and the demo binary.

use crate::error::Result;
use crate::types::{Axis, Vec3};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level calibration configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CalibrationConfig {
    pub object: ObjectConfig,
    pub probe: ProbeConfig,
    pub feedrate: FeedrateConfig,
    pub faces: FaceConfig,
    pub axes: AxisConfig,
    pub features: FeatureConfig,
    #[serde(default)]
    pub machine: MachineConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Reference object geometry (known ground truth)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObjectConfig {
    /// True center of the calibration object (mm)
    pub center: [f32; 3],
    /// Object dimensions along X/Y/Z (mm)
    pub dimensions: [f32; 3],
}

impl ObjectConfig {
    /// True center as a vector
    pub fn center(&self) -> Vec3 {
        Vec3::from(self.center)
    }

    /// Dimensions as a vector
    pub fn dimensions(&self) -> Vec3 {
        Vec3::from(self.dimensions)
    }
}

/// Probe and measurement parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProbeConfig {
    /// Nominal outer diameter of the nozzle where it contacts the object (mm)
    pub nozzle_diameter_mm: f32,
    /// Height of the conical nozzle tip; sides are probed at 70% of this
    /// depth below the measured top (mm)
    pub nozzle_tip_height_mm: f32,
    /// Step size of slow (precise) probing moves (mm)
    pub resolution_mm: f32,
    /// Standoff distance when the object location is unknown (mm)
    pub unknown_mm: f32,
    /// Standoff distance when backlash makes measurements uncertain (mm)
    pub uncertain_mm: f32,
    /// Standoff distance with backlash compensation active (mm)
    pub certain_mm: f32,
}

/// Feedrate tiers (mm/min)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeedrateConfig {
    /// Travel moves between probe positions
    pub travel_mm_min: f32,
    /// Fast (coarse search) probing moves
    pub fast_mm_min: f32,
    /// Slow (precise) probing moves
    pub slow_mm_min: f32,
}

/// Which faces of the object are measured
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FaceConfig {
    pub left: bool,
    pub right: bool,
    pub front: bool,
    pub back: bool,
    /// Probe the top near each face edge instead of trusting the center
    /// measurement (for objects whose top is not flat, e.g. washers)
    pub top_at_edge: bool,
}

/// Which axes the platform can calibrate (probe along)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AxisConfig {
    pub x: bool,
    pub y: bool,
    pub z: bool,
}

impl AxisConfig {
    /// Whether probing moves are supported along `axis`
    pub fn can_calibrate(&self, axis: Axis) -> bool {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }
}

/// Optional platform features
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeatureConfig {
    /// Backlash measurement and compensation state is available
    pub backlash_compensation: bool,
    /// Per-tool offset table is available (multi-tool platforms)
    pub tool_offsets: bool,
}

/// Machine geometry unrelated to the calibration object
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MachineConfig {
    /// X coordinate to park at after a full calibration sequence (mm)
    pub park_x_mm: f32,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self { park_x_mm: 150.0 }
    }
}

/// Simulated machine parameters (tests and the demo binary)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationConfig {
    /// Number of tools on the simulated machine
    pub tools: usize,
    /// Physical-minus-known displacement of the object (mm)
    pub object_displacement: [f32; 3],
    /// Mechanical backlash per axis (mm)
    pub backlash: [f32; 3],
    /// Per-tool mechanical offset error (mm); missing entries are zero
    pub tool_error: Vec<[f32; 3]>,
    /// Effective probe-tip contact diameter; defaults to the nominal
    /// nozzle diameter when absent (mm)
    pub contact_diameter_mm: Option<f32>,
    /// Uniform jitter applied to the contact threshold (mm, 0 = none)
    pub trigger_jitter_mm: f32,
    /// Initial logical position; defaults to a safe spot above the object
    pub start_position: Option<[f32; 3]>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tools: 2,
            object_displacement: [0.0, 0.0, 0.0],
            backlash: [0.0, 0.0, 0.0],
            tool_error: Vec::new(),
            contact_diameter_mm: None,
            trigger_jitter_mm: 0.0,
            start_position: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl CalibrationConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: CalibrationConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Default configuration: a 10mm cube at (100, 100, 0) on a two-tool
    /// cartesian platform, all four side faces measured.
    pub fn cube_defaults() -> Self {
        Self {
            object: ObjectConfig {
                center: [100.0, 100.0, 0.0],
                dimensions: [10.0, 10.0, 10.0],
            },
            probe: ProbeConfig {
                nozzle_diameter_mm: 2.0,
                nozzle_tip_height_mm: 1.0,
                resolution_mm: 0.01,
                unknown_mm: 5.0,
                uncertain_mm: 1.0,
                certain_mm: 0.5,
            },
            feedrate: FeedrateConfig {
                travel_mm_min: 3000.0,
                fast_mm_min: 1200.0,
                slow_mm_min: 60.0,
            },
            faces: FaceConfig {
                left: true,
                right: true,
                front: true,
                back: true,
                top_at_edge: false,
            },
            axes: AxisConfig {
                x: true,
                y: true,
                z: true,
            },
            features: FeatureConfig {
                backlash_compensation: true,
                tool_offsets: true,
            },
            machine: MachineConfig::default(),
            simulation: SimulationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Both faces of the X pair are measured, so an X center can be computed
    pub fn has_x_center(&self) -> bool {
        self.axes.x && self.faces.left && self.faces.right
    }

    /// Both faces of the Y pair are measured, so a Y center can be computed
    pub fn has_y_center(&self) -> bool {
        self.axes.y && self.faces.front && self.faces.back
    }

    /// Whether a paired-face center exists on `axis` (always false for Z;
    /// the top face alone fixes the Z center)
    pub fn has_center(&self, axis: Axis) -> bool {
        match axis {
            Axis::X => self.has_x_center(),
            Axis::Y => self.has_y_center(),
            Axis::Z => false,
        }
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self::cube_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CalibrationConfig::cube_defaults();
        assert_eq!(config.object.center, [100.0, 100.0, 0.0]);
        assert_eq!(config.probe.resolution_mm, 0.01);
        assert_eq!(config.probe.unknown_mm, 5.0);
        assert!(config.has_x_center());
        assert!(config.has_y_center());
        assert!(!config.has_center(Axis::Z));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = CalibrationConfig::cube_defaults();
        let toml_string = toml::to_string_pretty(&config).unwrap();

        assert!(toml_string.contains("[object]"));
        assert!(toml_string.contains("[probe]"));
        assert!(toml_string.contains("[feedrate]"));
        assert!(toml_string.contains("[faces]"));

        let parsed: CalibrationConfig = toml::from_str(&toml_string).unwrap();
        assert_eq!(parsed.object.center, config.object.center);
        assert_eq!(parsed.feedrate.slow_mm_min, config.feedrate.slow_mm_min);
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_content = r#"
[object]
center = [150.0, 150.0, 0.0]
dimensions = [10.0, 10.0, 10.0]

[probe]
nozzle_diameter_mm = 0.4
nozzle_tip_height_mm = 1.0
resolution_mm = 0.005
unknown_mm = 5.0
uncertain_mm = 1.0
certain_mm = 0.5

[feedrate]
travel_mm_min = 3000.0
fast_mm_min = 1200.0
slow_mm_min = 60.0

[faces]
left = true
right = true
front = false
back = false
top_at_edge = true

[axes]
x = true
y = true
z = true

[features]
backlash_compensation = false
tool_offsets = true
"#;

        let config: CalibrationConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.probe.nozzle_diameter_mm, 0.4);
        assert!(config.faces.top_at_edge);
        assert!(config.has_x_center());
        assert!(!config.has_y_center());
        // Defaulted sections
        assert_eq!(config.simulation.tools, 2);
        assert_eq!(config.machine.park_x_mm, 150.0);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_single_face_disables_center() {
        let mut config = CalibrationConfig::cube_defaults();
        config.faces.right = false;
        assert!(!config.has_x_center());
        config.axes.y = false;
        assert!(!config.has_y_center());
    }
}
