//! Calibration session
//!
//! [`Calibrator`] owns a borrowed machine and configuration for the length
//! of one command and sequences the probing passes: per-side probing,
//! whole-object center/error computation, backlash extraction, per-tool
//! offset correction, and the rough-then-precise full sequence.

use crate::calibration::command::{CalibrationCommand, Mode};
use crate::calibration::measurement::{Measurements, Side};
use crate::calibration::probe;
use crate::calibration::report::CalibrationReport;
use crate::calibration::Confidence;
use crate::config::CalibrationConfig;
use crate::error::{Error, Result};
use crate::machine::Machine;
use crate::types::{Axis, Vec3};

/// Round-trip distance used to take up mechanical slack after backlash
/// calibration (mm)
const SLACK_TAKEUP_MM: f32 = 3.0;

/// Calibration engine bound to one machine and configuration
pub struct Calibrator<'a, M: Machine + ?Sized> {
    machine: &'a mut M,
    config: &'a CalibrationConfig,
}

impl<'a, M: Machine + ?Sized> Calibrator<'a, M> {
    /// Bind the engine to a machine and configuration
    pub fn new(machine: &'a mut M, config: &'a CalibrationConfig) -> Self {
        Self { machine, config }
    }

    /// Execute a parsed calibration command.
    ///
    /// Checks the homing precondition before any motion, then runs the
    /// selected mode inside a session guard that loosens soft endstops and
    /// disables leveling compensation, restoring both on every exit path.
    /// Verify mode returns a report; the other modes return `None`.
    pub fn run(&mut self, command: &CalibrationCommand) -> Result<Option<CalibrationReport>> {
        if !self.machine.is_homed() {
            return Err(Error::NotHomed);
        }

        let uncertainty = command
            .uncertainty
            .unwrap_or_else(|| Confidence::Uncertain.distance(&self.config.probe));
        // An explicit override equal to the unknown-tier distance selects
        // the fast search, same as when the object location is unknown.
        let confidence = if uncertainty >= Confidence::Unknown.distance(&self.config.probe) {
            Confidence::Unknown
        } else {
            Confidence::Uncertain
        };

        self.with_session_guard(|cal| match command.mode {
            Mode::Backlash => {
                log::info!("Calibrator: backlash calibration (U={:.2}mm)", uncertainty);
                let mut m = Measurements::new(cal.config);
                cal.calibrate_backlash(&mut m, uncertainty, confidence)?;
                Ok(None)
            }
            Mode::Toolhead(tool) => {
                let tool = tool.unwrap_or_else(|| cal.machine.active_tool());
                log::info!(
                    "Calibrator: toolhead T{} calibration (U={:.2}mm)",
                    tool,
                    uncertainty
                );
                let mut m = Measurements::new(cal.config);
                cal.calibrate_toolhead(&mut m, uncertainty, confidence, tool)?;
                Ok(None)
            }
            Mode::Verify => {
                log::info!("Calibrator: verify pass (U={:.2}mm)", uncertainty);
                let mut m = Measurements::new(cal.config);
                cal.probe_sides(&mut m, uncertainty, confidence)?;
                let report = CalibrationReport::new(
                    cal.config,
                    &m,
                    cal.machine.active_tool(),
                    cal.machine.tool_offsets(),
                );
                report.log();
                Ok(Some(report))
            }
            Mode::Full => {
                log::info!("Calibrator: full calibration sequence");
                cal.calibrate_all()?;
                Ok(None)
            }
        })
    }

    /// Probe one face of the object, updating the side measurement and
    /// shifting the center estimate along the probed axis.
    ///
    /// Faces whose axis is not calibratable are no-ops. With
    /// `probe_top_at_edge`, side probes first re-measure the top near the
    /// face edge instead of trusting the center top estimate.
    pub fn probe_side(
        &mut self,
        m: &mut Measurements,
        uncertainty: f32,
        confidence: Confidence,
        side: Side,
        probe_top_at_edge: bool,
    ) -> Result<()> {
        let dimensions = self.config.object.dimensions();

        self.park_above_object(m, uncertainty)?;

        if side == Side::Top {
            if !self.config.axes.z {
                return Ok(());
            }
            let measured = self.measure_face(m, Side::Top, confidence)?;
            m.obj_center.z = measured - dimensions.z / 2.0;
            m.obj_side[Side::Top.index()] = measured;
            log::debug!("Calibrator: top at z={:.3}", measured);
            return Ok(());
        }

        if !side.enabled_in(self.config) {
            return Ok(());
        }

        let axis = side.axis();
        let dir = side.probe_dir();

        if probe_top_at_edge && self.config.axes.z {
            // Re-probe the top nearest the face being probed; tolerates
            // objects whose top is only flat near the edges.
            let mut destination = self.machine.position();
            destination[axis] = m.obj_center[axis]
                + (-dir) * (dimensions[axis] / 2.0 - m.nozzle_outer_dimension[axis]);
            self.calibration_move(destination)?;

            let measured = self.measure_face(m, Side::Top, confidence)?;
            m.obj_side[Side::Top.index()] = measured;
            m.obj_center.z = measured - dimensions.z / 2.0;
        }

        // Move to a safe standoff beside the face
        let mut destination = self.machine.position();
        destination[axis] = m.obj_center[axis]
            + (-dir)
                * (dimensions[axis] / 2.0 + m.nozzle_outer_dimension[axis] / 2.0 + uncertainty);
        self.calibration_move(destination)?;

        // Plunge below the object top so the nozzle flank contacts the face
        let mut destination = self.machine.position();
        destination.z =
            m.obj_side[Side::Top.index()] - self.config.probe.nozzle_tip_height_mm * 0.7;
        self.calibration_move(destination)?;

        let measured = self.measure_face(m, side, confidence)?;
        m.obj_center[axis] =
            measured + dir * (dimensions[axis] / 2.0 + m.nozzle_outer_dimension[axis] / 2.0);
        m.obj_side[side.index()] = measured;
        log::debug!("Calibrator: {} face at {}={:.3}", side.name(), axis, measured);
        Ok(())
    }

    /// Probe all enabled faces in fixed order, then derive the object
    /// center, the probe contact dimensions, and the positional error.
    pub fn probe_sides(
        &mut self,
        m: &mut Measurements,
        uncertainty: f32,
        confidence: Confidence,
    ) -> Result<()> {
        let probe_top_at_edge = self.config.faces.top_at_edge;
        let dimensions = self.config.object.dimensions();

        for side in Side::PROBE_ORDER {
            if side == Side::Top {
                // Probing at the exact center only works when the top is
                // flat; in edge mode the top is re-probed per side instead.
                if !probe_top_at_edge {
                    self.probe_side(m, uncertainty, confidence, Side::Top, false)?;
                }
                continue;
            }
            if side.enabled_in(self.config) {
                self.probe_side(m, uncertainty, confidence, side, probe_top_at_edge)?;
            }
        }

        // Measured center on axes with both faces of the pair, and the
        // outer dimension of the nozzle at contact height: how far the
        // object's apparent size exceeds its true size.
        if self.config.has_x_center() {
            m.obj_center.x =
                (m.obj_side[Side::Left.index()] + m.obj_side[Side::Right.index()]) / 2.0;
            m.nozzle_outer_dimension.x =
                m.obj_side[Side::Right.index()] - m.obj_side[Side::Left.index()] - dimensions.x;
        }
        if self.config.has_y_center() {
            m.obj_center.y =
                (m.obj_side[Side::Front.index()] + m.obj_side[Side::Back.index()]) / 2.0;
            m.nozzle_outer_dimension.y =
                m.obj_side[Side::Back.index()] - m.obj_side[Side::Front.index()] - dimensions.y;
        }

        self.park_above_object(m, uncertainty)?;

        let true_center = self.config.object.center();
        m.pos_error.x = if self.config.has_x_center() {
            true_center.x - m.obj_center.x
        } else {
            0.0
        };
        m.pos_error.y = if self.config.has_y_center() {
            true_center.y - m.obj_center.y
        } else {
            0.0
        };
        m.pos_error.z = true_center.z - m.obj_center.z;

        log::debug!(
            "Calibrator: center={} error={}",
            m.obj_center,
            m.pos_error
        );
        Ok(())
    }

    /// Measure backlash on every enabled face and write the per-axis
    /// result into the machine's compensation state, then exercise each
    /// axis to take up remaining slack.
    pub fn calibrate_backlash(
        &mut self,
        m: &mut Measurements,
        uncertainty: f32,
        confidence: Confidence,
    ) -> Result<()> {
        // Compensation must be off while measuring backlash
        self.with_backlash_override(0.0, |cal| {
            cal.probe_sides(m, uncertainty, confidence)?;

            if cal.config.features.backlash_compensation {
                let x = cal.paired_backlash(m, Side::Left, Side::Right);
                let y = cal.paired_backlash(m, Side::Front, Side::Back);
                let z = if cal.config.axes.z {
                    Some(m.backlash[Side::Top.index()])
                } else {
                    None
                };

                let distance = &mut cal.machine.backlash_mut().distance;
                if let Some(x) = x {
                    distance.x = x;
                }
                if let Some(y) = y {
                    distance.y = y;
                }
                if let Some(z) = z {
                    distance.z = z;
                }
                log::info!("Calibrator: backlash distance set to {}", distance);
            }
            Ok(())
        })?;

        if self.config.features.backlash_compensation {
            // With compensation on, move out and back on every calibratable
            // axis so the mechanism settles against its slack.
            self.with_backlash_override(1.0, |cal| {
                let takeup = Vec3::new(
                    if cal.config.axes.x { SLACK_TAKEUP_MM } else { 0.0 },
                    if cal.config.axes.y { SLACK_TAKEUP_MM } else { 0.0 },
                    if cal.config.axes.z { SLACK_TAKEUP_MM } else { 0.0 },
                );
                let start = cal.machine.position();
                cal.calibration_move(start + takeup)?;
                cal.calibration_move(start)?;
                Ok(())
            })?;
        }
        Ok(())
    }

    /// Probe the object with one tool and correct that tool's offset and
    /// the shared coordinate system from the measured positional error.
    pub fn calibrate_toolhead(
        &mut self,
        m: &mut Measurements,
        uncertainty: f32,
        confidence: Confidence,
        tool: usize,
    ) -> Result<()> {
        let count = self.machine.tool_count();
        if tool >= count {
            return Err(Error::InvalidTool { index: tool, count });
        }

        self.with_backlash_override(1.0, |cal| {
            if count > 1 {
                cal.set_tool(m, tool)?;
            }

            cal.probe_sides(m, uncertainty, confidence)?;

            let has_x = cal.config.has_x_center();
            let has_y = cal.config.has_y_center();
            let has_z = cal.config.axes.z;

            if cal.config.features.tool_offsets {
                {
                    let offset = cal.machine.tool_offsets_mut().get_mut(tool);
                    if has_x {
                        offset.x += m.pos_error.x;
                    }
                    if has_y {
                        offset.y += m.pos_error.y;
                    }
                    if has_z {
                        offset.z += m.pos_error.z;
                    }
                }
                cal.machine.tool_offsets_mut().normalize();
                log::info!(
                    "Calibrator: T{} offset now {}",
                    tool,
                    cal.machine.tool_offsets().get(tool)
                );
            }

            // Fold the remaining error into the coordinate system so the
            // object sits at its known location. Must follow the offset
            // adjustment: it consumes the pre-fold error value.
            cal.machine.synchronize()?;
            if has_x {
                cal.fold_error_into_origin(m, Axis::X);
            }
            if has_y {
                cal.fold_error_into_origin(m, Axis::Y);
            }
            if has_z {
                cal.fold_error_into_origin(m, Axis::Z);
            }
            Ok(())
        })
    }

    /// Calibrate every toolhead, then re-normalize offsets and return to
    /// the reference tool.
    pub fn calibrate_all_toolheads(
        &mut self,
        m: &mut Measurements,
        uncertainty: f32,
        confidence: Confidence,
    ) -> Result<()> {
        self.with_backlash_override(1.0, |cal| {
            for tool in 0..cal.machine.tool_count() {
                cal.calibrate_toolhead(m, uncertainty, confidence, tool)?;
            }
            if cal.config.features.tool_offsets {
                cal.machine.tool_offsets_mut().normalize();
            }
            if cal.machine.tool_count() > 1 {
                cal.set_tool(m, 0)?;
            }
            Ok(())
        })
    }

    /// Full auto-calibration sequence:
    ///
    /// 1. Reset tool offsets and do a fast, rough pass over every tool.
    /// 2. Measure backlash with the reference tool (if supported).
    /// 3. Cycle the toolheads so the mechanism settles into its rest state.
    /// 4. Slow, precise pass over every tool.
    /// 5. Park clear of the object.
    pub fn calibrate_all(&mut self) -> Result<()> {
        let mut m = Measurements::new(self.config);

        if self.config.features.tool_offsets {
            self.machine.tool_offsets_mut().reset_all();
        }

        let unknown = Confidence::Unknown.distance(&self.config.probe);
        let uncertain = Confidence::Uncertain.distance(&self.config.probe);

        self.with_backlash_override(1.0, |cal| {
            cal.calibrate_all_toolheads(&mut m, unknown, Confidence::Unknown)?;

            if cal.config.features.backlash_compensation {
                cal.calibrate_backlash(&mut m, uncertain, Confidence::Uncertain)?;
            }

            if cal.machine.tool_count() > 1 {
                for tool in 0..cal.machine.tool_count() {
                    cal.set_tool(&mut m, tool)?;
                }
            }

            cal.calibrate_all_toolheads(&mut m, uncertain, Confidence::Uncertain)?;

            // Park the nozzle away from the calibration object
            let mut destination = cal.machine.position();
            destination.x = cal.config.machine.park_x_mm;
            cal.calibration_move(destination)?;
            Ok(())
        })
    }

    /// Park at a safe height above the estimated object center
    fn park_above_object(&mut self, m: &Measurements, uncertainty: f32) -> Result<()> {
        probe::park_above_object(self.machine, self.config, m, uncertainty)
    }

    /// Switch tools, parking above the object first so the change cannot
    /// collide with it
    fn set_tool(&mut self, m: &Measurements, tool: usize) -> Result<()> {
        if tool != self.machine.active_tool() {
            self.park_above_object(m, Confidence::Unknown.distance(&self.config.probe))?;
            self.machine.change_tool(tool)?;
        }
        Ok(())
    }

    /// Probe toward `side`, recording its backlash entry
    fn measure_face(
        &mut self,
        m: &mut Measurements,
        side: Side,
        confidence: Confidence,
    ) -> Result<f32> {
        probe::measure(
            self.machine,
            self.config,
            side.axis(),
            side.probe_dir(),
            true,
            Some(&mut m.backlash[side.index()]),
            confidence,
        )
    }

    /// Travel move with queue drain
    fn calibration_move(&mut self, destination: Vec3) -> Result<()> {
        self.machine
            .move_to(destination, self.config.feedrate.travel_mm_min)?;
        self.machine.synchronize()
    }

    /// Backlash for one axis pair: the average when both faces were
    /// measured, the single enabled face otherwise, `None` when the axis
    /// is not measured at all
    fn paired_backlash(&self, m: &Measurements, near: Side, far: Side) -> Option<f32> {
        let near_enabled = near.enabled_in(self.config);
        let far_enabled = far.enabled_in(self.config);
        match (near_enabled, far_enabled) {
            (true, true) => {
                Some((m.backlash[near.index()] + m.backlash[far.index()]) / 2.0)
            }
            (true, false) => Some(m.backlash[near.index()]),
            (false, true) => Some(m.backlash[far.index()]),
            (false, false) => None,
        }
    }

    /// Shift the live position by the measured error on one axis and reset
    /// the record so the object is at its known location
    fn fold_error_into_origin(&mut self, m: &mut Measurements, axis: Axis) {
        let mut delta = Vec3::ZERO;
        delta[axis] = m.pos_error[axis];
        self.machine.offset_position(delta);
        m.obj_center[axis] = self.config.object.center()[axis];
        m.pos_error[axis] = 0.0;
    }

    /// Run `body` with backlash correction forced to `correction` and
    /// smoothing disabled, restoring the prior values on every exit path
    fn with_backlash_override<T>(
        &mut self,
        correction: f32,
        body: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let saved = if self.config.features.backlash_compensation {
            let backlash = self.machine.backlash_mut();
            let saved = (backlash.correction, backlash.smoothing_mm);
            backlash.correction = correction;
            backlash.smoothing_mm = 0.0;
            Some(saved)
        } else {
            None
        };

        let result = body(self);

        if let Some((correction, smoothing)) = saved {
            let backlash = self.machine.backlash_mut();
            backlash.correction = correction;
            backlash.smoothing_mm = smoothing;
        }
        result
    }

    /// Run `body` with soft endstops loosened and leveling compensation
    /// disabled, restoring both on every exit path
    fn with_session_guard<T>(
        &mut self,
        body: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let leveling_was = self.machine.set_leveling_enabled(false);
        self.machine.set_soft_endstops_loose(true);

        let result = body(self);

        self.machine.set_soft_endstops_loose(false);
        self.machine.set_leveling_enabled(leveling_was);
        result
    }
}
