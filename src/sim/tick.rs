//! Per-frame simulation step
//!
//! One call advances the field by the effective time since the previous
//! frame. Phase order matters: forces first, then pairwise contact, then
//! wall-checked integration, then bookkeeping and lifecycle.

use glam::Vec2;
use serde::Serialize;

use super::collision::{
    apply_avoidance_repulsion, apply_pointer_repulsion, apply_reflection, check_move,
    resolve_orb_orb_collisions, unstick_from_wall,
};
use super::manager::SpawnScheduler;
use super::physics::{
    apply_layer_attraction, apply_speed_limit, apply_wander, clear_orb_circular, is_valid_dt,
    mark_orb_circular, update_position,
};
use super::state::FieldState;

/// Host input for a single frame
#[derive(Debug, Clone)]
pub struct TickInput {
    /// Wall-clock time of this frame (ms)
    pub now: f64,
    /// Pointer position (px), if over the field
    pub pointer: Option<Vec2>,
    /// Page visibility; hidden pages don't top up the population
    pub visible: bool,
    /// Freeze physics and time
    pub paused: bool,
}

impl Default for TickInput {
    fn default() -> Self {
        Self {
            now: 0.0,
            pointer: None,
            visible: true,
            paused: false,
        }
    }
}

impl TickInput {
    pub fn at(now: f64) -> Self {
        Self {
            now,
            ..Default::default()
        }
    }
}

/// What happened during one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TickReport {
    pub frame: u64,
    /// Effective seconds simulated; 0 when motion was skipped
    pub dt: f32,
    pub paused: bool,
    pub live: usize,
    pub spawned: usize,
    pub expired: usize,
    pub reflections: usize,
    pub unstuck: usize,
    pub speed_limited: usize,
    pub avoidance_pairs: usize,
    pub collision_pairs: usize,
    pub pointer_pushed: usize,
}

/// Advance the field by one frame
pub fn tick(state: &mut FieldState, input: &TickInput) -> TickReport {
    state.clock.set_paused(input.paused, input.now);
    let now = state.clock.effective_now(input.now);
    let dt = state.clock.frame_dt(input.now);
    state.frame += 1;

    let mut report = TickReport {
        frame: state.frame,
        paused: input.paused,
        ..Default::default()
    };

    // Occupancy from current positions (also picks up a resized grid)
    state.manager.remark_all(&mut state.grid);

    if input.paused {
        report.live = state.manager.len();
        return report;
    }

    let FieldState {
        settings,
        viewport,
        grid,
        manager,
        scheduler,
        rng,
        ..
    } = state;

    // A bad delta skips motion only; lifetimes run on effective time
    let step = is_valid_dt(dt);
    if step {
        report.dt = dt;
        let layers = grid.config().layers;
        let orbs = manager.orbs_mut();

        if let Some(pointer) = input.pointer {
            report.pointer_pushed = apply_pointer_repulsion(orbs, pointer, dt, &settings.collision);
        }

        for orb in orbs.iter_mut() {
            if apply_speed_limit(orb, dt, &settings.physics) {
                report.speed_limited += 1;
            }
            apply_wander(orb, dt, &settings.physics);
            apply_layer_attraction(
                orb,
                settings.physics.max_orb_size,
                layers,
                settings.physics.layer_attraction_strength,
                settings.physics.max_layer_drift_speed,
                dt,
            );
        }

        report.avoidance_pairs =
            apply_avoidance_repulsion(orbs, grid.config(), dt, &settings.collision, rng);
        report.collision_pairs =
            resolve_orb_orb_collisions(orbs, grid.config(), &settings.collision, rng);

        // Each orb tests its move against everything but itself
        for orb in orbs.iter_mut() {
            clear_orb_circular(orb, grid);
            let check = check_move(orb, dt, grid);
            mark_orb_circular(orb, grid);
            if check.blocked {
                apply_reflection(orb, check.reflect_x, check.reflect_y, check.reflect_z);
                report.reflections += 1;
            }
            update_position(orb, dt);
        }

        for orb in orbs.iter_mut() {
            clear_orb_circular(orb, grid);
            if unstick_from_wall(orb, grid, &settings.collision, rng) {
                report.unstuck += 1;
            }
            mark_orb_circular(orb, grid);
        }
    } else if dt != 0.0 {
        log::debug!("Skipping motion for frame dt {dt}");
    }

    manager.remark_all(grid);
    report.expired = manager.remove_expired(now, grid);

    if input.visible {
        let target = SpawnScheduler::target_count(viewport, settings);
        let credit_dt = if step { dt } else { 0.0 };
        let due = scheduler.spawns_due(manager.len(), target, credit_dt, settings);
        if due > 0 {
            report.spawned = manager.spawn_random_orbs(due, viewport, now, grid, settings, rng);
        }
    }

    report.live = manager.len();
    log::trace!("{:?}", report);
    report
}
