//! Simulated machine for hardware-free calibration runs
//!
//! Models just enough physics for the engine to calibrate against:
//!
//! - box contact: the probe triggers when the nozzle square intersects the
//!   object footprint at or below the object top
//! - per-axis backlash hysteresis: the physical position trails the
//!   commanded position by up to the mechanical slack, reduced by active
//!   compensation
//! - per-tool mechanical offset error and a physical-vs-known object
//!   displacement, both of which a full calibration should recover
//!
//! Every probe contact is recorded so tests can assert on probing order.

use crate::config::CalibrationConfig;
use crate::error::{Error, Result};
use crate::machine::{BacklashComp, Machine, ToolOffsets};
use crate::types::{Axis, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A probe rising edge observed during a move
#[derive(Debug, Clone, Copy)]
pub struct ContactEvent {
    /// Axis that was moving when contact was made
    pub axis: Axis,
    /// Direction of that move (+1 or -1)
    pub dir: f32,
    /// Physical tip position at contact
    pub position: Vec3,
}

/// Simulated multi-tool cartesian platform
pub struct SimulatedMachine {
    /// Logical commanded position
    position: Vec3,
    /// Physical position after backlash hysteresis
    actual: Vec3,
    /// Physical tip minus logical position for the active tool. Updated
    /// when the logical frame shifts and when a tool change consumes the
    /// offset table; editing the table alone leaves it untouched, exactly
    /// like firmware that applies offsets only at tool change.
    frame_error: Vec3,
    /// Physical location of the object
    object_center: Vec3,
    object_dimensions: Vec3,
    /// Effective probe-tip contact diameter
    contact_diameter: f32,
    /// Mechanical slack per axis
    slack: Vec3,
    /// Per-tool mechanical offset error
    tool_error: Vec<Vec3>,
    active_tool: usize,
    homed: bool,
    backlash: BacklashComp,
    tool_offsets: ToolOffsets,
    soft_endstops_loose: bool,
    leveling_enabled: bool,
    /// Contact-threshold jitter amplitude; resampled per move
    jitter: f32,
    margin: f32,
    rng: StdRng,
    contacts: Vec<ContactEvent>,
}

impl SimulatedMachine {
    /// Build a simulated machine from the `[object]` and `[simulation]`
    /// config sections
    pub fn new(config: &CalibrationConfig) -> Self {
        let sim = &config.simulation;
        let known_center = config.object.center();
        let dimensions = config.object.dimensions();

        let mut tool_error: Vec<Vec3> =
            sim.tool_error.iter().map(|&e| Vec3::from(e)).collect();
        tool_error.resize(sim.tools.max(1), Vec3::ZERO);

        let start = sim
            .start_position
            .map(Vec3::from)
            .unwrap_or_else(|| {
                known_center + Vec3::new(0.0, 0.0, dimensions.z / 2.0 + 10.0)
            });

        // Offsets start zeroed, so the initial frame carries only the
        // first tool's mechanical error
        let frame_error = tool_error[0];

        Self {
            position: start,
            actual: start,
            frame_error,
            object_center: known_center + Vec3::from(sim.object_displacement),
            object_dimensions: dimensions,
            contact_diameter: sim
                .contact_diameter_mm
                .unwrap_or(config.probe.nozzle_diameter_mm),
            slack: Vec3::from(sim.backlash),
            tool_error,
            active_tool: 0,
            homed: true,
            backlash: BacklashComp::default(),
            tool_offsets: ToolOffsets::new(sim.tools.max(1)),
            soft_endstops_loose: false,
            leveling_enabled: true,
            jitter: sim.trigger_jitter_mm,
            margin: 0.0,
            rng: StdRng::seed_from_u64(0x5ca1ab1e),
            contacts: Vec::new(),
        }
    }

    /// Mark the machine as homed or not (tests)
    pub fn set_homed(&mut self, homed: bool) {
        self.homed = homed;
    }

    /// Teleport the logical position, clearing hysteresis (tests)
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.actual = position;
    }

    /// Frame error of the carriage itself, with the active tool's error
    /// and applied offset factored out
    fn carriage_error(&self) -> Vec3 {
        self.frame_error - self.tool_error[self.active_tool]
            + self.tool_offsets.get(self.active_tool)
    }

    /// Introduce a coordinate misalignment the calibration should remove
    pub fn set_origin_error(&mut self, error: Vec3) {
        self.frame_error =
            error + self.tool_error[self.active_tool] - self.tool_offsets.get(self.active_tool);
    }

    /// Remaining coordinate misalignment of the carriage frame
    pub fn origin_error(&self) -> Vec3 {
        self.carriage_error()
    }

    /// Soft endstop enforcement currently loosened
    pub fn soft_endstops_loose(&self) -> bool {
        self.soft_endstops_loose
    }

    /// Leveling compensation currently enabled
    pub fn leveling_enabled(&self) -> bool {
        self.leveling_enabled
    }

    /// Probe rising edges observed so far
    pub fn contacts(&self) -> &[ContactEvent] {
        &self.contacts
    }

    /// Forget recorded contacts (tests)
    pub fn clear_contacts(&mut self) {
        self.contacts.clear();
    }

    /// Physical probe tip position: hysteresis-lagged position plus the
    /// active tool's frame error
    fn tip(&self) -> Vec3 {
        self.actual + self.frame_error
    }

    /// Nozzle square intersects the object at or below its top
    fn tip_in_contact(&self) -> bool {
        let tip = self.tip();
        let half_x =
            self.object_dimensions.x / 2.0 + self.contact_diameter / 2.0 + self.margin;
        let half_y =
            self.object_dimensions.y / 2.0 + self.contact_diameter / 2.0 + self.margin;
        let top_z = self.object_center.z + self.object_dimensions.z / 2.0;

        (tip.x - self.object_center.x).abs() <= half_x
            && (tip.y - self.object_center.y).abs() <= half_y
            && tip.z <= top_z + self.margin
    }

    /// Slack remaining after compensation on `axis`
    fn effective_slack(&self, axis: Axis) -> f32 {
        let compensated = self.backlash.correction * self.backlash.distance[axis];
        (self.slack[axis] - compensated).max(0.0)
    }
}

impl Machine for SimulatedMachine {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn move_to(&mut self, target: Vec3, _feedrate_mm_min: f32) -> Result<()> {
        if self.jitter > 0.0 {
            self.margin = self.rng.gen_range(-self.jitter..=self.jitter);
        }

        for axis in Axis::ALL {
            let from = self.position[axis];
            let to = target[axis];
            if (to - from).abs() < f32::EPSILON {
                continue;
            }

            let was_triggered = self.tip_in_contact();
            let slack = self.effective_slack(axis);

            self.position[axis] = to;
            // Hysteresis: the physical axis sits within [to - slack, to];
            // reversing direction spends the slack before anything moves
            self.actual[axis] = self.actual[axis].clamp(to - slack, to);

            if !was_triggered && self.tip_in_contact() {
                self.contacts.push(ContactEvent {
                    axis,
                    dir: (to - from).signum(),
                    position: self.tip(),
                });
            }
        }
        Ok(())
    }

    fn synchronize(&mut self) -> Result<()> {
        Ok(())
    }

    fn probe_triggered(&self) -> bool {
        self.tip_in_contact()
    }

    fn is_homed(&self) -> bool {
        self.homed
    }

    fn active_tool(&self) -> usize {
        self.active_tool
    }

    fn tool_count(&self) -> usize {
        self.tool_error.len()
    }

    fn change_tool(&mut self, tool: usize) -> Result<()> {
        if tool >= self.tool_error.len() {
            return Err(Error::InvalidTool {
                index: tool,
                count: self.tool_error.len(),
            });
        }
        // The carriage stays put; the new tool lands wherever its true
        // error and the current offset table put it
        let carriage = self.carriage_error();
        self.active_tool = tool;
        self.frame_error = carriage + self.tool_error[tool] - self.tool_offsets.get(tool);
        Ok(())
    }

    fn offset_position(&mut self, delta: Vec3) {
        // Logical coordinates shift; the physical state must not
        self.position += delta;
        self.actual += delta;
        self.frame_error -= delta;
    }

    fn backlash(&self) -> &BacklashComp {
        &self.backlash
    }

    fn backlash_mut(&mut self) -> &mut BacklashComp {
        &mut self.backlash
    }

    fn tool_offsets(&self) -> &ToolOffsets {
        &self.tool_offsets
    }

    fn tool_offsets_mut(&mut self) -> &mut ToolOffsets {
        &mut self.tool_offsets
    }

    fn set_soft_endstops_loose(&mut self, loose: bool) {
        self.soft_endstops_loose = loose;
    }

    fn set_leveling_enabled(&mut self, enabled: bool) -> bool {
        std::mem::replace(&mut self.leveling_enabled, enabled)
    }
}

impl ContactEvent {
    /// Classify which face this contact belongs to from the moving axis
    /// and its direction
    pub fn side(&self) -> Option<crate::calibration::Side> {
        use crate::calibration::Side;
        match (self.axis, self.dir > 0.0) {
            (Axis::Z, false) => Some(Side::Top),
            (Axis::X, true) => Some(Side::Left),
            (Axis::X, false) => Some(Side::Right),
            (Axis::Y, true) => Some(Side::Front),
            (Axis::Y, false) => Some(Side::Back),
            (Axis::Z, true) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sim_config() -> CalibrationConfig {
        let mut config = CalibrationConfig::cube_defaults();
        config.probe.nozzle_diameter_mm = 0.4;
        config
    }

    #[test]
    fn test_contact_on_top() {
        let config = sim_config();
        let mut machine = SimulatedMachine::new(&config);

        // Above the center: not in contact
        assert!(!machine.probe_triggered());

        // Descend onto the object top (z = 5)
        machine
            .move_to(Vec3::new(100.0, 100.0, 4.9), 1200.0)
            .unwrap();
        assert!(machine.probe_triggered());
        assert_eq!(machine.contacts().len(), 1);
    }

    #[test]
    fn test_contact_on_side_includes_nozzle_radius() {
        let config = sim_config();
        let mut machine = SimulatedMachine::new(&config);

        machine.set_position(Vec3::new(93.0, 100.0, 3.0));
        assert!(!machine.probe_triggered());
        // Left face at x=95; contact starts at 95 - 0.2
        machine.move_to(Vec3::new(94.85, 100.0, 3.0), 60.0).unwrap();
        assert!(machine.probe_triggered());
        machine.move_to(Vec3::new(94.75, 100.0, 3.0), 60.0).unwrap();
        assert!(!machine.probe_triggered());
    }

    #[test]
    fn test_backlash_hysteresis() {
        let mut config = sim_config();
        config.simulation.backlash = [0.5, 0.0, 0.0];
        let mut machine = SimulatedMachine::new(&config);

        machine.set_position(Vec3::new(10.0, 10.0, 20.0));
        // Forward 2mm: physical lags by the slack
        machine.move_to(Vec3::new(12.0, 10.0, 20.0), 60.0).unwrap();
        assert_abs_diff_eq!(machine.tip().x, 11.5, epsilon = 1e-4);
        // Reverse 0.3mm: still inside the slack band, no physical motion
        machine.move_to(Vec3::new(11.7, 10.0, 20.0), 60.0).unwrap();
        assert_abs_diff_eq!(machine.tip().x, 11.5, epsilon = 1e-4);
        // Reverse past the band: physical follows
        machine.move_to(Vec3::new(11.0, 10.0, 20.0), 60.0).unwrap();
        assert_abs_diff_eq!(machine.tip().x, 11.0, epsilon = 1e-4);
    }

    #[test]
    fn test_compensation_cancels_slack() {
        let mut config = sim_config();
        config.simulation.backlash = [0.5, 0.0, 0.0];
        let mut machine = SimulatedMachine::new(&config);
        machine.backlash_mut().distance.x = 0.5;
        machine.backlash_mut().correction = 1.0;

        machine.set_position(Vec3::new(10.0, 10.0, 20.0));
        machine.move_to(Vec3::new(12.0, 10.0, 20.0), 60.0).unwrap();
        assert_abs_diff_eq!(machine.tip().x, 12.0, epsilon = 1e-4);
    }

    #[test]
    fn test_offset_position_keeps_physical_state() {
        let config = sim_config();
        let mut machine = SimulatedMachine::new(&config);
        machine.set_origin_error(Vec3::new(0.2, 0.0, -0.1));

        let tip_before = machine.tip();
        machine.offset_position(Vec3::new(0.2, 0.0, -0.1));
        assert_abs_diff_eq!(machine.tip().x, tip_before.x, epsilon = 1e-6);
        assert_abs_diff_eq!(machine.tip().z, tip_before.z, epsilon = 1e-6);
        assert_abs_diff_eq!(machine.origin_error().x, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_tool_error_shifts_tip() {
        let mut config = sim_config();
        config.simulation.tools = 2;
        config.simulation.tool_error = vec![[0.0, 0.0, 0.0], [0.3, -0.2, 0.1]];
        let mut machine = SimulatedMachine::new(&config);

        let tip0 = machine.tip();
        machine.change_tool(1).unwrap();
        let tip1 = machine.tip();
        assert_abs_diff_eq!(tip1.x - tip0.x, 0.3, epsilon = 1e-4);
        assert_abs_diff_eq!(tip1.y - tip0.y, -0.2, epsilon = 1e-4);
    }

    #[test]
    fn test_offsets_applied_at_tool_change() {
        let mut config = sim_config();
        config.simulation.tools = 2;
        config.simulation.tool_error = vec![[0.0, 0.0, 0.0], [0.3, 0.0, 0.0]];
        let mut machine = SimulatedMachine::new(&config);

        let tip0 = machine.tip();
        machine.change_tool(1).unwrap();
        assert_abs_diff_eq!(machine.tip().x - tip0.x, 0.3, epsilon = 1e-4);

        // Correcting the table while the tool is active moves nothing
        machine.tool_offsets_mut().get_mut(1).x = 0.3;
        assert_abs_diff_eq!(machine.tip().x - tip0.x, 0.3, epsilon = 1e-4);

        // The correction takes hold the next time the tool is selected
        machine.change_tool(0).unwrap();
        machine.change_tool(1).unwrap();
        assert_abs_diff_eq!(machine.tip().x, tip0.x, epsilon = 1e-4);
    }

    #[test]
    fn test_change_tool_out_of_range() {
        let config = sim_config();
        let mut machine = SimulatedMachine::new(&config);
        assert!(matches!(
            machine.change_tool(9),
            Err(Error::InvalidTool { index: 9, count: 2 })
        ));
    }
}
