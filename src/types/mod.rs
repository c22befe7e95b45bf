//! Core geometry types shared by the calibration engine and machine layer

pub mod geometry;

pub use geometry::{Axis, Vec2, Vec3};
