//! Machine implementations
//!
//! Only the simulated machine lives here; real platform adapters implement
//! [`crate::machine::Machine`] out of tree.

pub mod sim;

pub use sim::SimulatedMachine;
