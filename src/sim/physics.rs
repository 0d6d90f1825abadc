//! Per-orb kinematics
//!
//! Integration, speed capping, wander drift, depth-layer attraction and
//! projecting an orb's footprint onto the grid.

use glam::{Vec2, Vec3};

use super::grid::{SpatialGrid, cell, for_each_in_sphere};
use super::orb::Orb;
use crate::consts::{MAX_DT, REFERENCE_FPS};
use crate::settings::PhysicsSettings;
use crate::wrap_phase;

/// Frame deltas outside (0, 1] seconds or non-finite are skipped
#[inline]
pub fn is_valid_dt(dt: f32) -> bool {
    dt.is_finite() && dt > 0.0 && dt <= MAX_DT
}

/// Euler step on all three axes
pub fn update_position(orb: &mut Orb, dt: f32) {
    if !is_valid_dt(dt) {
        return;
    }
    orb.pos += orb.vel * dt;
    orb.z += orb.vz * dt;
}

/// Size-derived speed cap: bigger orbs are heavier and slower
#[inline]
pub fn max_speed(size: u32, settings: &PhysicsSettings) -> f32 {
    (settings.base_max_speed / (size.max(1) as f32).sqrt()).max(settings.min_max_speed)
}

/// Planar speed combined with Z velocity scaled into px/s
#[inline]
pub fn pseudo_speed(orb: &Orb, z_speed_scale: f32) -> f32 {
    Vec3::new(orb.vel.x, orb.vel.y, orb.vz * z_speed_scale).length()
}

/// Decelerate toward the speed cap. Returns true if the orb was over the cap.
///
/// The excess shrinks by `1 - (1 - rate)^(dt * 60)`, which decays the same
/// amount per second at any frame rate.
pub fn apply_speed_limit(orb: &mut Orb, dt: f32, settings: &PhysicsSettings) -> bool {
    if !is_valid_dt(dt) {
        return false;
    }
    let speed = pseudo_speed(orb, settings.z_speed_scale);
    let cap = max_speed(orb.size, settings);
    if !speed.is_finite() || speed <= cap {
        return false;
    }

    let factor = 1.0 - (1.0 - settings.speed_limit_rate).powf(dt * REFERENCE_FPS);
    let target = speed - (speed - cap) * factor;
    let scale = target / speed;
    orb.vel *= scale;
    orb.vz *= scale;
    orb.sync_polar();
    true
}

/// Rotate the planar velocity by a slowly varying angle, keeping its magnitude
pub fn apply_wander(orb: &mut Orb, dt: f32, settings: &PhysicsSettings) {
    if !is_valid_dt(dt) {
        return;
    }
    let speed = orb.vel.length();
    if speed < settings.wander_speed_floor {
        return;
    }

    let w = &mut orb.wander;
    w.phase = wrap_phase(w.phase + w.speed * dt);
    w.modulation_phase = wrap_phase(w.modulation_phase + w.modulation_speed * dt);

    // 0.6 ± 0.4 keeps modulation in [0.2, 1.0]
    let modulation = 0.6 + 0.4 * w.modulation_phase.sin();
    let nudge = w.phase.sin() * w.strength * modulation * dt;

    let rotated = Vec2::from_angle(nudge).rotate(orb.vel);
    // Renormalize so rounding never drifts the speed
    orb.vel = rotated.normalize_or_zero() * speed;
    orb.sync_polar();
}

/// Depth an orb of `size` settles toward.
///
/// Logarithmic so small orbs cluster in front and big ones at the back.
pub fn preferred_layer(size: u32, max_size: u32, total_layers: u32) -> f32 {
    if max_size <= 1 || total_layers <= 1 {
        return 0.0;
    }
    let size = size.clamp(1, max_size) as f32;
    (total_layers - 1) as f32 * size.ln() / (max_size as f32).ln()
}

/// Spring `vz` toward the preferred layer.
///
/// The spring never accelerates `|vz|` past `max_drift`, but leaves faster
/// motion from collisions alone.
pub fn apply_layer_attraction(
    orb: &mut Orb,
    max_size: u32,
    total_layers: u32,
    strength: f32,
    max_drift: f32,
    dt: f32,
) {
    if !is_valid_dt(dt) {
        return;
    }
    let target = preferred_layer(orb.size, max_size, total_layers);
    let accel = (target - orb.z) * strength;
    let old = orb.vz;
    let mut vz = old + accel * dt;
    if vz.abs() > max_drift && vz.abs() > old.abs() {
        vz = vz.signum() * old.abs().max(max_drift);
    }
    if vz.is_finite() {
        orb.vz = vz;
    }
}

/// Mark body cells `FILLED` and the surrounding shell `PROXIMITY`
pub fn mark_orb_circular(orb: &Orb, grid: &mut SpatialGrid) {
    let center = grid.pixel_to_cell(orb.pos, orb.z);
    let body_r2 = orb.body_radius() * orb.body_radius();
    for_each_in_sphere(center, orb.avoidance_radius(), |c| {
        let flag = if (c - center).length_squared() <= body_r2 {
            cell::FILLED
        } else {
            cell::PROXIMITY
        };
        grid.add_cell_flag(c.x, c.y, c.z, flag);
    });
}

/// Remove an orb's body and shell marks
pub fn clear_orb_circular(orb: &Orb, grid: &mut SpatialGrid) {
    let center = grid.pixel_to_cell(orb.pos, orb.z);
    for_each_in_sphere(center, orb.avoidance_radius(), |c| {
        grid.remove_cell_flag(c.x, c.y, c.z, cell::DYNAMIC);
    });
}
