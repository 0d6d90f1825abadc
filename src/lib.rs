//! Orb Field - a decorative 3D field of glowing orbs
//!
//! Core modules:
//! - `sim`: Spatial simulation (cell grid, orb physics, collisions, lifecycle)
//! - `renderer`: Read-only extraction of per-orb render instances
//! - `settings`: Tunable simulation constants

pub mod renderer;
pub mod settings;
pub mod sim;

pub use settings::Settings;

use glam::Vec3;
use rand::Rng;
use rand::distr::uniform::SampleUniform;

/// Frame timing constants
pub mod consts {
    /// Reference frame rate for frame-rate independent decay curves
    pub const REFERENCE_FPS: f32 = 60.0;
    /// Largest frame delta the simulation accepts (seconds)
    pub const MAX_DT: f32 = 1.0;
    /// Frame spacing of the headless native driver (ms)
    pub const HEADLESS_FRAME_MS: f64 = 1000.0 / REFERENCE_FPS as f64;
}

/// Wrap a phase into [0, 2π)
#[inline]
pub fn wrap_phase(phase: f32) -> f32 {
    use std::f32::consts::TAU;
    let wrapped = phase.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU
    if wrapped >= TAU { 0.0 } else { wrapped }
}

/// Uniform sample from an inclusive `(min, max)` range; degenerate ranges return `min`
#[inline]
pub fn random_in<T>(rng: &mut impl Rng, range: (T, T)) -> T
where
    T: SampleUniform + PartialOrd + Copy,
{
    if range.0 < range.1 {
        rng.random_range(range.0..=range.1)
    } else {
        range.0
    }
}

/// Uniformly distributed unit vector
pub fn random_unit_vec3(rng: &mut impl Rng) -> Vec3 {
    let z: f32 = rng.random_range(-1.0..=1.0);
    let theta: f32 = rng.random_range(0.0..std::f32::consts::TAU);
    let r = (1.0 - z * z).max(0.0).sqrt();
    Vec3::new(r * theta.cos(), r * theta.sin(), z)
}
