//! Collision detection and response on the cell grid
//!
//! Wall collision goes through the grid (`BORDER` and out-of-bounds cells).
//! Orb-orb interaction is pairwise over the orb slice and never looks at
//! `FILLED` cells, so orbs don't bounce off each other as if they were walls.
//!
//! Pair math happens in cell space: X/Y divided by the cell size in pixels,
//! Z already in layers (one layer = one cell).

use glam::{IVec3, Vec2, Vec3};
use rand::Rng;

use super::grid::{GridConfig, SpatialGrid, any_in_sphere, for_each_in_sphere};
use super::orb::Orb;
use super::physics::is_valid_dt;
use crate::consts::REFERENCE_FPS;
use crate::random_unit_vec3;
use crate::settings::CollisionSettings;

/// Distances below this (cells) count as coincident
const COINCIDENT_EPS: f32 = 1e-4;

/// Which axes of a planned move hit a wall
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveCheck {
    pub blocked: bool,
    pub reflect_x: bool,
    pub reflect_y: bool,
    pub reflect_z: bool,
}

/// Pixel/layer ↔ cell conversion for one grid
#[derive(Debug, Clone, Copy)]
pub struct CellSpace {
    cell_px: Vec2,
}

impl CellSpace {
    pub fn new(config: &GridConfig) -> Self {
        Self {
            cell_px: config.cell_size_px(),
        }
    }

    /// Orb position in cells
    #[inline]
    pub fn position(&self, orb: &Orb) -> Vec3 {
        (orb.pos / self.cell_px).extend(orb.z)
    }

    /// Orb velocity in cells/s
    #[inline]
    pub fn velocity(&self, orb: &Orb) -> Vec3 {
        (orb.vel / self.cell_px).extend(orb.vz)
    }

    /// Cell-space vector → (pixels, layers)
    #[inline]
    pub fn to_world(&self, v: Vec3) -> (Vec2, f32) {
        (v.truncate() * self.cell_px, v.z)
    }

    /// Pixels per layer, for converting px/s² strengths into cells/s²
    #[inline]
    pub fn layer_px(&self) -> f32 {
        (self.cell_px.x + self.cell_px.y) * 0.5
    }
}

#[inline]
fn footprint_hits_wall(grid: &SpatialGrid, center: IVec3, radius: i32) -> bool {
    if radius <= 0 {
        grid.is_wall_at(center)
    } else {
        any_in_sphere(center, radius, |c| grid.is_wall_at(c))
    }
}

/// True if any body cell of the orb overlaps a wall
pub fn orb_touches_wall(orb: &Orb, grid: &SpatialGrid) -> bool {
    let center = grid.pixel_to_cell(orb.pos, orb.z);
    footprint_hits_wall(grid, center, orb.body_radius())
}

/// Test the next position against walls, one axis at a time.
///
/// Each axis moves alone while the other two stay at the current cell, so a
/// diagonal orb grazing a side wall only reflects the blocked axis.
pub fn check_move(orb: &Orb, dt: f32, grid: &SpatialGrid) -> MoveCheck {
    if !is_valid_dt(dt) {
        return MoveCheck::default();
    }
    let current = grid.pixel_to_cell(orb.pos, orb.z);
    let next = grid.pixel_to_cell(orb.pos + orb.vel * dt, orb.z + orb.vz * dt);
    let radius = orb.body_radius();

    let reflect_x = orb.vel.x != 0.0
        && footprint_hits_wall(grid, IVec3::new(next.x, current.y, current.z), radius);
    let reflect_y = orb.vel.y != 0.0
        && footprint_hits_wall(grid, IVec3::new(current.x, next.y, current.z), radius);
    let reflect_z = orb.vz != 0.0
        && footprint_hits_wall(grid, IVec3::new(current.x, current.y, next.z), radius);

    MoveCheck {
        blocked: reflect_x || reflect_y || reflect_z,
        reflect_x,
        reflect_y,
        reflect_z,
    }
}

/// True if an orb of `size` fits at the position without touching a wall,
/// the grid edge or another orb's body
pub fn can_spawn(pos: Vec2, z: f32, size: u32, grid: &SpatialGrid) -> bool {
    let center = grid.pixel_to_cell(pos, z);
    let radius = size.max(1) as i32 - 1;
    !any_in_sphere(center, radius, |c| grid.is_blocking_at(c))
}

/// Negate the velocity on the given axes
pub fn apply_reflection(orb: &mut Orb, reflect_x: bool, reflect_y: bool, reflect_z: bool) {
    if reflect_x {
        orb.vel.x = -orb.vel.x;
    }
    if reflect_y {
        orb.vel.y = -orb.vel.y;
    }
    if reflect_z {
        orb.vz = -orb.vz;
    }
    orb.sync_polar();
}

/// Direction out of the walls an orb overlaps, in cell space (not normalized)
fn wall_escape_direction(grid: &SpatialGrid, center: IVec3, radius: i32) -> Vec3 {
    let mut away = Vec3::ZERO;
    for_each_in_sphere(center, radius, |c| {
        if grid.is_wall_at(c) {
            away += (center - c).as_vec3();
        }
    });

    // A wall cell under the center contributes nothing; use the grid edges
    let config = grid.config();
    let edge = |v: i32, n: u32| -> f32 {
        if v <= 0 {
            1.0
        } else if v >= n as i32 - 1 {
            -1.0
        } else {
            0.0
        }
    };
    away.x += edge(center.x, config.cells_x);
    away.y += edge(center.y, config.cells_y);
    away
}

/// Move an orb whose body overlaps a wall back into open space.
///
/// The push goes against the current velocity when that leads away from the
/// wall, otherwise straight out of it, and at random for a motionless orb
/// with no usable wall direction. Returns true if the orb was moved.
pub fn unstick_from_wall(
    orb: &mut Orb,
    grid: &SpatialGrid,
    settings: &CollisionSettings,
    rng: &mut impl Rng,
) -> bool {
    let center = grid.pixel_to_cell(orb.pos, orb.z);
    let radius = orb.body_radius();
    if !footprint_hits_wall(grid, center, radius) {
        return false;
    }

    let space = CellSpace::new(grid.config());
    let away = wall_escape_direction(grid, center, radius).normalize_or_zero();
    let mut dir = -space.velocity(orb).normalize_or_zero();
    if dir == Vec3::ZERO || (away != Vec3::ZERO && dir.dot(away) <= 0.0) {
        dir = away;
    }
    if dir == Vec3::ZERO {
        dir = random_unit_vec3(rng);
    }

    let (shift, shift_z) = space.to_world(dir * settings.unstick_distance_cells);
    let speed = orb.speed.max(settings.unstick_min_speed);
    let (dir_px, _) = space.to_world(dir);
    let new_vel = dir_px.normalize_or_zero() * speed;
    let new_vz = if dir.z.abs() > COINCIDENT_EPS {
        dir.z.signum() * orb.vz.abs().max(1.0)
    } else {
        orb.vz
    };

    let pos = orb.pos + shift;
    let z = orb.z + shift_z;
    if !(pos.is_finite() && z.is_finite() && new_vel.is_finite() && new_vz.is_finite()) {
        return false;
    }
    orb.pos = pos;
    orb.z = z;
    if new_vel != Vec2::ZERO {
        orb.vel = new_vel;
    }
    orb.vz = new_vz;
    orb.sync_polar();
    true
}

#[inline]
fn pair_mut(orbs: &mut [Orb], i: usize, j: usize) -> (&mut Orb, &mut Orb) {
    debug_assert!(i < j);
    let (head, tail) = orbs.split_at_mut(j);
    (&mut head[i], &mut tail[0])
}

/// Soft pairwise repulsion between overlapping avoidance shells.
///
/// Force grows with the square of the normalized overlap and is split by the
/// other orb's share of the total mass. Returns the number of repelled pairs.
pub fn apply_avoidance_repulsion(
    orbs: &mut [Orb],
    config: &GridConfig,
    dt: f32,
    settings: &CollisionSettings,
    rng: &mut impl Rng,
) -> usize {
    if !is_valid_dt(dt) {
        return 0;
    }
    let space = CellSpace::new(config);
    let strength = settings.avoidance_strength / space.layer_px();
    let mut pairs = 0;

    for j in 1..orbs.len() {
        for i in 0..j {
            let (a, b) = pair_mut(orbs, i, j);
            let delta = space.position(b) - space.position(a);
            let dist = delta.length();
            if !dist.is_finite() {
                continue;
            }
            let combined_avoidance = (a.size + b.size) as f32;
            if dist >= combined_avoidance {
                continue;
            }
            let normal = if dist < COINCIDENT_EPS {
                random_unit_vec3(rng)
            } else {
                delta / dist
            };

            let overlap = (combined_avoidance - dist) / combined_avoidance;
            let combined_body = (a.size + b.size - 1) as f32;
            let multiplier = if dist < combined_body {
                settings.avoidance_body_multiplier
            } else {
                1.0
            };
            let accel = strength * overlap * overlap * multiplier;
            let (ma, mb) = (a.mass(), b.mass());
            let total = ma + mb;

            let (dva, dvza) = space.to_world(-normal * accel * (mb / total) * dt);
            let (dvb, dvzb) = space.to_world(normal * accel * (ma / total) * dt);
            let (va, vza) = (a.vel + dva, a.vz + dvza);
            let (vb, vzb) = (b.vel + dvb, b.vz + dvzb);
            if !(va.is_finite() && vb.is_finite() && vza.is_finite() && vzb.is_finite()) {
                continue;
            }
            a.vel = va;
            a.vz = vza;
            b.vel = vb;
            b.vz = vzb;
            a.sync_polar();
            b.sync_polar();
            pairs += 1;
        }
    }
    pairs
}

/// Hard pairwise resolution for overlapping bodies.
///
/// Positions are always pushed apart by mass share and overlap depth.
/// Approaching pairs get an elastic impulse along the normal; pairs that are
/// already separating but still deeply overlapped get a small kick. A pair
/// whose math goes non-finite is left untouched for this frame.
/// Returns the number of colliding pairs.
pub fn resolve_orb_orb_collisions(
    orbs: &mut [Orb],
    config: &GridConfig,
    settings: &CollisionSettings,
    rng: &mut impl Rng,
) -> usize {
    let space = CellSpace::new(config);
    let mut pairs = 0;

    for j in 1..orbs.len() {
        for i in 0..j {
            let (a, b) = pair_mut(orbs, i, j);
            let delta = space.position(b) - space.position(a);
            let dist = delta.length();
            if !dist.is_finite() {
                continue;
            }
            let combined_body = (a.size + b.size - 1) as f32;
            if dist >= combined_body {
                continue;
            }
            let normal = if dist < COINCIDENT_EPS {
                random_unit_vec3(rng)
            } else {
                delta / dist
            };

            let (ma, mb) = (a.mass(), b.mass());
            let total = ma + mb;
            let overlap = combined_body - dist;
            let overlap_ratio = (overlap / combined_body).clamp(0.0, 1.0);
            let multiplier = settings.min_correction_multiplier
                + (settings.max_correction_multiplier - settings.min_correction_multiplier)
                    * overlap_ratio;

            // Positional correction, lighter orb moves more
            let push_a = overlap * (mb / total) * multiplier * 0.5;
            let push_b = overlap * (ma / total) * multiplier * 0.5;
            let (shift_a, shift_za) = space.to_world(-normal * push_a);
            let (shift_b, shift_zb) = space.to_world(normal * push_b);

            // Velocity correction
            let mut va = space.velocity(a);
            let mut vb = space.velocity(b);
            let approach = (va - vb).dot(normal);
            if approach > 0.0 {
                let impulse = (1.0 + settings.elasticity) * approach / (1.0 / ma + 1.0 / mb);
                va -= normal * (impulse / ma);
                vb += normal * (impulse / mb);
            } else if overlap_ratio > settings.stuck_overlap_ratio {
                let kick = settings.min_separation_speed * overlap_ratio;
                va -= normal * kick * (mb / total);
                vb += normal * kick * (ma / total);
            }
            let (vel_a, vz_a) = space.to_world(va);
            let (vel_b, vz_b) = space.to_world(vb);

            let pos_a = a.pos + shift_a;
            let pos_b = b.pos + shift_b;
            let (z_a, z_b) = (a.z + shift_za, b.z + shift_zb);
            let finite = pos_a.is_finite()
                && pos_b.is_finite()
                && z_a.is_finite()
                && z_b.is_finite()
                && vel_a.is_finite()
                && vel_b.is_finite()
                && vz_a.is_finite()
                && vz_b.is_finite();
            if !finite {
                continue;
            }

            a.pos = pos_a;
            a.z = z_a;
            a.vel = vel_a;
            a.vz = vz_a;
            b.pos = pos_b;
            b.z = z_b;
            b.vel = vel_b;
            b.vz = vz_b;
            a.sync_polar();
            b.sync_polar();
            pairs += 1;
        }
    }
    pairs
}

/// Push orbs away from the pointer on X/Y only.
///
/// Falloff is quadratic from full strength at the pointer to zero at the
/// radius. Returns the number of orbs pushed.
pub fn apply_pointer_repulsion(
    orbs: &mut [Orb],
    pointer: Vec2,
    dt: f32,
    settings: &CollisionSettings,
) -> usize {
    if !is_valid_dt(dt) || !pointer.is_finite() || settings.pointer_radius <= 0.0 {
        return 0;
    }
    let mut pushed = 0;
    for orb in orbs.iter_mut() {
        let offset = orb.pos - pointer;
        let dist = offset.length();
        if !dist.is_finite() || dist >= settings.pointer_radius || dist < settings.pointer_min_distance {
            continue;
        }
        let falloff = 1.0 - dist / settings.pointer_radius;
        let dv = settings.pointer_strength * falloff * falloff * dt * REFERENCE_FPS;
        let vel = orb.vel + offset / dist * dv;
        if vel.is_finite() {
            orb.vel = vel;
            orb.sync_polar();
            pushed += 1;
        }
    }
    pushed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::grid::cell;
    use crate::sim::physics::mark_orb_circular;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    const CELL: f32 = 10.0;

    fn grid() -> SpatialGrid {
        SpatialGrid::new(GridConfig::with_cells(40, 40, 10, CELL))
    }

    /// Pixel center of a cell
    fn at(x: i32, y: i32) -> Vec2 {
        Vec2::new((x as f32 + 0.5) * CELL, (y as f32 + 0.5) * CELL)
    }

    fn rng() -> Pcg32 {
        Pcg32::seed_from_u64(42)
    }

    #[test]
    fn test_check_move_axis_independent() {
        let grid = grid();
        // One cell from the right wall, moving diagonally
        let orb = Orb::new(1, at(38, 20), 5.0, 1, 0.0).with_velocity(Vec2::new(600.0, 300.0), 0.0);
        let check = check_move(&orb, 1.0 / 60.0, &grid);
        assert!(check.blocked);
        assert!(check.reflect_x);
        assert!(!check.reflect_y);
        assert!(!check.reflect_z);
    }

    #[test]
    fn test_check_move_free_space() {
        let grid = grid();
        let orb = Orb::new(1, at(20, 20), 5.0, 3, 0.0).with_velocity(Vec2::new(100.0, 100.0), 1.0);
        assert_eq!(check_move(&orb, 1.0 / 60.0, &grid), MoveCheck::default());
    }

    #[test]
    fn test_check_move_large_orb_footprint() {
        let grid = grid();
        // Radius 3 body: center at 35 reaches 38; moving to 36 touches the wall at 39
        let orb = Orb::new(1, at(35, 20), 5.0, 4, 0.0).with_velocity(Vec2::new(0.0, 0.0), 0.0);
        let mut moving = orb.clone();
        moving.vel = Vec2::new(CELL * 60.0, 0.0);
        assert!(check_move(&moving, 1.0 / 60.0, &grid).reflect_x);
        assert!(!check_move(&orb, 1.0 / 60.0, &grid).blocked);
    }

    #[test]
    fn test_check_move_ignores_other_orbs() {
        let mut grid = grid();
        let other = Orb::new(2, at(21, 20), 5.0, 1, 0.0);
        mark_orb_circular(&other, &mut grid);
        let orb = Orb::new(1, at(20, 20), 5.0, 1, 0.0).with_velocity(Vec2::new(600.0, 0.0), 0.0);
        assert!(!check_move(&orb, 1.0 / 60.0, &grid).blocked);
    }

    #[test]
    fn test_check_move_no_floor_or_ceiling() {
        let grid = grid();
        let orb = Orb::new(1, at(20, 20), 9.0, 1, 0.0).with_velocity(Vec2::ZERO, 60.0);
        assert!(!check_move(&orb, 1.0 / 60.0, &grid).blocked);
        // Still blocked by the side wall while beyond the last layer
        let orb = Orb::new(2, at(38, 20), 12.0, 1, 0.0).with_velocity(Vec2::new(600.0, 0.0), 0.0);
        assert!(check_move(&orb, 1.0 / 60.0, &grid).reflect_x);
    }

    #[test]
    fn test_can_spawn() {
        let mut grid = grid();
        assert!(can_spawn(at(20, 20), 5.0, 3, &grid));
        // Border
        assert!(!can_spawn(at(0, 20), 5.0, 1, &grid));
        // Footprint reaches the border
        assert!(!can_spawn(at(2, 20), 5.0, 3, &grid));
        // Beyond the last layer is open
        assert!(can_spawn(at(20, 20), 10.0, 1, &grid));
        assert!(!can_spawn(at(0, 20), 10.0, 1, &grid));
        // Another orb's body
        mark_orb_circular(&Orb::new(9, at(20, 20), 5.0, 1, 0.0), &mut grid);
        assert!(!can_spawn(at(20, 20), 5.0, 1, &grid));
        // Avoidance shell alone doesn't block
        assert!(can_spawn(at(21, 20), 5.0, 1, &grid));
    }

    #[test]
    fn test_apply_reflection() {
        let mut orb = Orb::new(1, at(20, 20), 5.0, 1, 0.0).with_velocity(Vec2::new(3.0, 4.0), 1.0);
        apply_reflection(&mut orb, true, false, true);
        assert_eq!(orb.vel, Vec2::new(-3.0, 4.0));
        assert_eq!(orb.vz, -1.0);
        assert!((orb.angle - 4.0f32.atan2(-3.0)).abs() < 1e-6);
    }

    #[test]
    fn test_unstick_from_wall() {
        let grid = grid();
        let settings = CollisionSettings::default();
        // Sitting on the right border, already moving away from it
        let mut orb = Orb::new(1, at(39, 20), 5.0, 1, 0.0).with_velocity(Vec2::new(-50.0, 0.0), 0.0);
        assert!(orb_touches_wall(&orb, &grid));
        assert!(unstick_from_wall(&mut orb, &grid, &settings, &mut rng()));
        assert!(!orb_touches_wall(&orb, &grid));
        assert!(orb.vel.x < 0.0);

        // Moving into the wall: pushed out anyway
        let mut orb = Orb::new(2, at(39, 20), 5.0, 1, 0.0).with_velocity(Vec2::new(50.0, 0.0), 0.0);
        assert!(unstick_from_wall(&mut orb, &grid, &settings, &mut rng()));
        assert!(!orb_touches_wall(&orb, &grid));
        assert!(orb.vel.x < 0.0);

        // Motionless orb outside the grid
        let mut orb = Orb::new(3, at(-1, 20), 5.0, 1, 0.0);
        assert!(unstick_from_wall(&mut orb, &grid, &settings, &mut rng()));
        assert!(orb.pos.x > 0.0);
        assert!(orb.speed >= settings.unstick_min_speed - 1e-3);
    }

    #[test]
    fn test_unstick_leaves_free_orbs() {
        let grid = grid();
        let mut orb = Orb::new(1, at(20, 20), 5.0, 2, 0.0).with_velocity(Vec2::new(5.0, 0.0), 0.0);
        let before = orb.clone();
        assert!(!unstick_from_wall(&mut orb, &grid, &CollisionSettings::default(), &mut rng()));
        assert_eq!(orb.pos, before.pos);
        assert_eq!(orb.vel, before.vel);
    }

    #[test]
    fn test_avoidance_mass_weighted() {
        let config = GridConfig::with_cells(40, 40, 10, CELL);
        let mut orbs = vec![
            Orb::new(1, at(20, 20), 5.0, 1, 0.0),
            Orb::new(2, at(22, 20), 5.0, 4, 0.0),
        ];
        let settings = CollisionSettings::default();
        let pairs = apply_avoidance_repulsion(&mut orbs, &config, 1.0 / 60.0, &settings, &mut rng());
        assert_eq!(pairs, 1);
        assert!(orbs[0].vel.x < 0.0);
        assert!(orbs[1].vel.x > 0.0);
        assert!(orbs[0].vel.x.abs() > orbs[1].vel.x.abs());
        assert_eq!(orbs[0].vel.y, 0.0);
    }

    #[test]
    fn test_avoidance_out_of_range() {
        let config = GridConfig::with_cells(40, 40, 10, CELL);
        let mut orbs = vec![
            Orb::new(1, at(10, 20), 5.0, 1, 0.0),
            Orb::new(2, at(13, 20), 5.0, 1, 0.0),
        ];
        let pairs =
            apply_avoidance_repulsion(&mut orbs, &config, 1.0 / 60.0, &CollisionSettings::default(), &mut rng());
        assert_eq!(pairs, 0);
        assert_eq!(orbs[0].vel, Vec2::ZERO);
    }

    #[test]
    fn test_avoidance_body_overlap_is_stronger() {
        let config = GridConfig::with_cells(40, 40, 10, CELL);
        let settings = CollisionSettings::default();
        let push_at = |gap: f32| {
            let mut orbs = vec![
                Orb::new(1, at(20, 20), 5.0, 2, 0.0),
                Orb::new(2, at(20, 20) + Vec2::new(gap * CELL, 0.0), 5.0, 2, 0.0),
            ];
            apply_avoidance_repulsion(&mut orbs, &config, 1.0 / 60.0, &settings, &mut rng());
            orbs[1].vel.x
        };
        // combined body = 3; just inside vs just outside
        let inside = push_at(2.9);
        let outside = push_at(3.1);
        assert!(inside > outside * 2.5);
    }

    #[test]
    fn test_coincident_pairs_separate() {
        let config = GridConfig::with_cells(40, 40, 10, CELL);
        let settings = CollisionSettings::default();
        let mut orbs = vec![
            Orb::new(1, at(20, 20), 5.0, 2, 0.0),
            Orb::new(2, at(20, 20), 5.0, 2, 0.0),
        ];
        apply_avoidance_repulsion(&mut orbs, &config, 1.0 / 60.0, &settings, &mut rng());
        resolve_orb_orb_collisions(&mut orbs, &config, &settings, &mut rng());
        assert!(orbs.iter().all(|o| o.pos.is_finite() && o.vel.is_finite() && o.vz.is_finite()));
        let dx = (orbs[0].pos - orbs[1].pos).length() / CELL;
        let dz = orbs[0].z - orbs[1].z;
        assert!((dx * dx + dz * dz).sqrt() > 0.1);
    }

    #[test]
    fn test_collision_mass_weighted_separation() {
        let config = GridConfig::with_cells(40, 40, 10, CELL);
        let small_start = at(20, 20);
        let big_start = at(22, 20);
        let mut orbs = vec![
            Orb::new(1, small_start, 5.0, 1, 0.0),
            Orb::new(2, big_start, 5.0, 4, 0.0),
        ];
        let pairs = resolve_orb_orb_collisions(&mut orbs, &config, &CollisionSettings::default(), &mut rng());
        assert_eq!(pairs, 1);
        let small_moved = (orbs[0].pos - small_start).length();
        let big_moved = (orbs[1].pos - big_start).length();
        assert!(small_moved > big_moved);
        assert!(orbs[0].pos.x < small_start.x);
        assert!(orbs[1].pos.x > big_start.x);
    }

    #[test]
    fn test_collision_elastic_bounce() {
        let config = GridConfig::with_cells(40, 40, 10, CELL);
        let mut orbs = vec![
            Orb::new(1, at(20, 20), 5.0, 2, 0.0).with_velocity(Vec2::new(50.0, 0.0), 0.0),
            Orb::new(2, at(22, 20), 5.0, 2, 0.0).with_velocity(Vec2::new(-50.0, 0.0), 0.0),
        ];
        resolve_orb_orb_collisions(&mut orbs, &config, &CollisionSettings::default(), &mut rng());
        // Equal masses, e = 0.8: velocities swap and shrink
        assert!((orbs[0].vel.x + 40.0).abs() < 1e-3);
        assert!((orbs[1].vel.x - 40.0).abs() < 1e-3);
    }

    #[test]
    fn test_collision_stuck_pair_gets_kick() {
        let config = GridConfig::with_cells(40, 40, 10, CELL);
        let mut orbs = vec![
            Orb::new(1, at(20, 20), 5.0, 3, 0.0),
            Orb::new(2, at(21, 20), 5.0, 3, 0.0),
        ];
        resolve_orb_orb_collisions(&mut orbs, &config, &CollisionSettings::default(), &mut rng());
        assert!(orbs[0].vel.x < 0.0);
        assert!(orbs[1].vel.x > 0.0);
    }

    #[test]
    fn test_collision_non_finite_pair_isolated() {
        let config = GridConfig::with_cells(40, 40, 10, CELL);
        let mut broken = Orb::new(1, at(20, 20), 5.0, 2, 0.0);
        broken.vel = Vec2::new(f32::INFINITY, 0.0);
        let mut orbs = vec![
            broken,
            Orb::new(2, at(21, 20), 5.0, 2, 0.0),
            Orb::new(3, at(30, 30), 5.0, 2, 0.0),
            Orb::new(4, at(31, 30), 5.0, 2, 0.0),
        ];
        let before = orbs[1].clone();
        let pairs = resolve_orb_orb_collisions(&mut orbs, &config, &CollisionSettings::default(), &mut rng());
        assert_eq!(pairs, 1);
        assert_eq!(orbs[1].pos, before.pos);
        assert_eq!(orbs[1].vel, before.vel);
        assert!(orbs[2].pos.x < at(30, 30).x);
    }

    #[test]
    fn test_pointer_repulsion() {
        let settings = CollisionSettings::default();
        let pointer = Vec2::new(200.0, 200.0);
        let mut orbs = vec![
            Orb::new(1, pointer + Vec2::new(50.0, 0.0), 5.0, 1, 0.0).with_velocity(Vec2::ZERO, 1.0),
            Orb::new(2, pointer + Vec2::new(0.0, 200.0), 5.0, 1, 0.0),
            Orb::new(3, pointer + Vec2::new(0.5, 0.0), 5.0, 1, 0.0),
        ];
        let pushed = apply_pointer_repulsion(&mut orbs, pointer, 1.0 / 60.0, &settings);
        assert_eq!(pushed, 1);
        assert!(orbs[0].vel.x > 0.0);
        assert_eq!(orbs[0].vel.y, 0.0);
        assert_eq!(orbs[0].vz, 1.0);
        assert_eq!(orbs[1].vel, Vec2::ZERO);
        assert_eq!(orbs[2].vel, Vec2::ZERO);

        assert_eq!(apply_pointer_repulsion(&mut orbs, Vec2::new(f32::NAN, 0.0), 1.0 / 60.0, &settings), 0);
    }

    #[test]
    fn test_pointer_falloff() {
        let settings = CollisionSettings::default();
        let pointer = Vec2::ZERO;
        let mut orbs = vec![
            Orb::new(1, Vec2::new(30.0, 0.0), 5.0, 1, 0.0),
            Orb::new(2, Vec2::new(0.0, 120.0), 5.0, 1, 0.0),
        ];
        apply_pointer_repulsion(&mut orbs, pointer, 1.0 / 60.0, &settings);
        assert!(orbs[0].vel.x > orbs[1].vel.y);
    }

    proptest! {
        #[test]
        fn prop_can_spawn_matches_footprint(
            x in -20.0f32..420.0,
            y in -20.0f32..420.0,
            z in -1.0f32..11.0,
            size in 1u32..6,
            others in proptest::collection::vec((20.0f32..380.0, 20.0f32..380.0, 0.0f32..9.0, 1u32..4), 0..6),
        ) {
            let mut grid = grid();
            for (k, &(ox, oy, oz, os)) in others.iter().enumerate() {
                mark_orb_circular(&Orb::new(k as u32, Vec2::new(ox, oy), oz, os, 0.0), &mut grid);
            }
            let center = grid.pixel_to_cell(Vec2::new(x, y), z);
            let r = size as i32 - 1;
            let mut blocked = false;
            for dz in -r..=r {
                for dy in -r..=r {
                    for dx in -r..=r {
                        if dx * dx + dy * dy + dz * dz > r * r {
                            continue;
                        }
                        let c = center + IVec3::new(dx, dy, dz);
                        let layer = c.z.clamp(0, 9);
                        let flags = grid.get_cell(c.x, c.y, layer);
                        if !grid.in_bounds(c.x, c.y, layer) || flags & (cell::BORDER | cell::FILLED) != 0 {
                            blocked = true;
                        }
                    }
                }
            }
            prop_assert_eq!(can_spawn(Vec2::new(x, y), z, size, &grid), !blocked);
        }
    }
}
