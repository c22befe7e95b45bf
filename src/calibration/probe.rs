//! Directional probe primitive
//!
//! Moves one axis in one direction in small steps until the probe signal
//! reaches a target state, optionally measuring backlash by reversing
//! until the signal inverts. Every probe restores the tool to its
//! pre-probe coordinate along the probed axis.

use crate::calibration::measurement::Measurements;
use crate::calibration::Confidence;
use crate::config::CalibrationConfig;
use crate::error::Result;
use crate::machine::Machine;
use crate::types::Axis;

/// Step size of fast (coarse search) probing moves (mm)
const FAST_STEP_MM: f32 = 0.25;

/// Travel limit before a fast probe gives up (mm)
const FAST_TRAVEL_LIMIT_MM: f32 = 50.0;

/// Travel limit before a slow probe gives up (mm)
const SLOW_TRAVEL_LIMIT_MM: f32 = 5.0;

/// Move along `axis` in `dir` until the probe signal equals `stop_state`,
/// then return the stopping coordinate.
///
/// If the travel limit is exhausted without a signal transition the last
/// attempted coordinate is returned as a best-effort result, with a
/// warning; there is no distinct failure value.
pub fn measuring_movement<M: Machine + ?Sized>(
    machine: &mut M,
    config: &CalibrationConfig,
    axis: Axis,
    dir: f32,
    stop_state: bool,
    fast: bool,
) -> Result<f32> {
    let step = if fast {
        FAST_STEP_MM
    } else {
        config.probe.resolution_mm
    };
    let feedrate = if fast {
        config.feedrate.fast_mm_min
    } else {
        config.feedrate.slow_mm_min
    };
    let limit = if fast {
        FAST_TRAVEL_LIMIT_MM
    } else {
        SLOW_TRAVEL_LIMIT_MM
    };

    let mut destination = machine.position();
    let mut travel = 0.0f32;
    let mut transitioned = false;
    while travel < limit {
        destination[axis] += dir * step;
        machine.move_to(destination, feedrate)?;
        machine.synchronize()?;
        if machine.probe_triggered() == stop_state {
            transitioned = true;
            break;
        }
        travel += step;
    }

    if !transitioned {
        log::warn!(
            "Probe: no signal transition within {:.1}mm on {}{}; using last position {:.3}",
            limit,
            if dir > 0.0 { "+" } else { "-" },
            axis,
            destination[axis]
        );
    }

    Ok(destination[axis])
}

/// Probe along `axis` until the signal reaches `stop_state`, optionally
/// measure backlash by reversing, then return the tool to its starting
/// coordinate and report the measured position.
///
/// Backlash is only measured in the slow tiers; fast probes leave
/// `backlash` untouched.
pub fn measure<M: Machine + ?Sized>(
    machine: &mut M,
    config: &CalibrationConfig,
    axis: Axis,
    dir: f32,
    stop_state: bool,
    backlash: Option<&mut f32>,
    confidence: Confidence,
) -> Result<f32> {
    let fast = confidence.is_fast();

    // A contact envelope wider than the nominal nozzle can put the
    // standoff already inside the trigger zone; back off until the signal
    // releases so the approach measures a real transition.
    if machine.probe_triggered() == stop_state {
        measuring_movement(machine, config, axis, -dir, !stop_state, fast)?;
    }
    let start = machine.position()[axis];

    let measured = measuring_movement(machine, config, axis, dir, stop_state, fast)?;

    if let Some(backlash) = backlash {
        if !fast {
            let release =
                measuring_movement(machine, config, axis, -dir, !stop_state, fast)?;
            *backlash = (release - measured).abs();
        }
    }

    // Return to the pre-probe coordinate on this axis
    let mut destination = machine.position();
    destination[axis] = start;
    machine.move_to(destination, config.feedrate.travel_mm_min)?;
    machine.synchronize()?;

    Ok(measured)
}

/// Park the tool at a safe height above the estimated object center:
/// first Z to top-of-object plus `uncertainty`, then XY to the center.
pub fn park_above_object<M: Machine + ?Sized>(
    machine: &mut M,
    config: &CalibrationConfig,
    m: &Measurements,
    uncertainty: f32,
) -> Result<()> {
    let travel = config.feedrate.travel_mm_min;

    let mut destination = machine.position();
    destination.z = m.obj_center.z + config.object.dimensions().z / 2.0 + uncertainty;
    machine.move_to(destination, travel)?;

    destination.x = m.obj_center.x;
    destination.y = m.obj_center.y;
    machine.move_to(destination, travel)?;
    machine.synchronize()?;
    Ok(())
}
