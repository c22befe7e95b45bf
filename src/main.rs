//! sparsh-cal - run the calibration engine against the simulated machine
//!
//! Usage: `sparsh-cal [--config <path>] [B | T[n] | V] [U<mm>]`
//!
//! With no mode argument the full calibration sequence runs: a rough pass
//! over every tool, backlash calibration, a settle cycle, and a precise
//! pass. The simulated machine's imperfections come from the config's
//! `[simulation]` section.

use sparsh_cal::{CalibrationCommand, CalibrationConfig, Calibrator, Machine, SimulatedMachine};
use std::env;

/// Split command line into an optional config path and calibration words.
///
/// Supports `sparsh-cal --config <path> ...` and `sparsh-cal -c <path> ...`;
/// everything else is passed to the command parser.
fn parse_args() -> (Option<String>, Vec<String>) {
    let args: Vec<String> = env::args().skip(1).collect();
    let mut config_path = None;
    let mut command_args = Vec::new();

    let mut i = 0;
    while i < args.len() {
        if (args[i] == "--config" || args[i] == "-c") && i + 1 < args.len() {
            config_path = Some(args[i + 1].clone());
            i += 2;
        } else {
            command_args.push(args[i].clone());
            i += 1;
        }
    }
    (config_path, command_args)
}

fn main() -> sparsh_cal::Result<()> {
    let (config_path, command_args) = parse_args();

    let config = match &config_path {
        Some(path) => CalibrationConfig::from_file(path)?,
        None => CalibrationConfig::default(),
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();
    if let Some(path) = &config_path {
        log::info!("Using config: {}", path);
    }

    let command = CalibrationCommand::parse(&command_args)?;
    log::info!(
        "Calibration object at {} ({}x{}x{}mm), {} simulated tool(s)",
        config.object.center(),
        config.object.dimensions[0],
        config.object.dimensions[1],
        config.object.dimensions[2],
        config.simulation.tools
    );

    let mut machine = SimulatedMachine::new(&config);
    Calibrator::new(&mut machine, &config).run(&command)?;

    log::info!("Residual origin error: {}", machine.origin_error());
    log::info!("Backlash distance: {}", machine.backlash().distance);
    for (tool, offset) in machine.tool_offsets().iter().enumerate() {
        log::info!("T{} offset: {}", tool, offset);
    }
    Ok(())
}
