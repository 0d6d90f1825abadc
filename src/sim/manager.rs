//! Orb lifecycle
//!
//! The manager owns the orb collection: it creates orbs (manual, burst and
//! continuous), ages them and removes them. Every creation is validated with
//! [`can_spawn`] and marked on the grid right away so later spawns in the
//! same batch see it. Every removal clears the grid footprint first.

use glam::Vec2;
use rand::Rng;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;

use super::collision::can_spawn;
use super::grid::{SpatialGrid, Viewport};
use super::orb::{Orb, Wander};
use super::physics::{clear_orb_circular, mark_orb_circular, preferred_layer};
use crate::random_in;
use crate::random_unit_vec3;
use crate::settings::{PhysicsSettings, Settings};

/// Continuous-spawn pacing
#[derive(Debug, Clone, Default)]
pub struct SpawnScheduler {
    /// Fractional spawns carried between frames
    credit: f32,
}

impl SpawnScheduler {
    /// Live orb count the field tops up to for this viewport
    pub fn target_count(viewport: &Viewport, settings: &Settings) -> usize {
        let target = settings.spawn.orbs_per_megapixel * viewport.area() / 1_000_000.0;
        (target.max(0.0) as usize).min(settings.spawn.max_target_orbs as usize)
    }

    /// Orbs to spawn this frame. The rate grows with the deficit and the
    /// per-frame count is capped.
    pub fn spawns_due(&mut self, live: usize, target: usize, dt: f32, settings: &Settings) -> usize {
        if live >= target {
            self.credit = 0.0;
            return 0;
        }
        let deficit = (target - live) as f32;
        let rate = settings.spawn.base_spawn_rate + deficit * settings.spawn.catch_up_rate;
        self.credit = (self.credit + rate * dt).min(deficit);
        let due = (self.credit.floor() as usize)
            .min(settings.spawn.max_spawns_per_frame as usize)
            .min(target - live);
        self.credit -= due as f32;
        due
    }
}

/// Owner of the live orb collection
#[derive(Debug, Clone)]
pub struct OrbManager {
    orbs: Vec<Orb>,
    next_id: u32,
    /// Inverse-square weights over sizes `1..=max_orb_size`
    size_weights: Option<WeightedIndex<f32>>,
}

impl OrbManager {
    pub fn new(settings: &PhysicsSettings) -> Self {
        let weights = (1..=settings.max_orb_size.max(1)).map(|s| 1.0 / (s * s) as f32);
        Self {
            orbs: Vec::new(),
            next_id: 1,
            size_weights: WeightedIndex::new(weights).ok(),
        }
    }

    #[inline]
    pub fn orbs(&self) -> &[Orb] {
        &self.orbs
    }

    #[inline]
    pub fn orbs_mut(&mut self) -> &mut [Orb] {
        &mut self.orbs
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.orbs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.orbs.is_empty()
    }

    pub fn get(&self, id: u32) -> Option<&Orb> {
        self.orbs.iter().find(|o| o.id == id)
    }

    /// Allocate a new orb ID
    pub fn next_entity_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Random size, small sizes much more likely than large
    pub fn random_size(&self, rng: &mut impl Rng) -> u32 {
        self.size_weights
            .as_ref()
            .map_or(1, |dist| dist.sample(rng) as u32 + 1)
    }

    fn insert(&mut self, orb: Orb, grid: &mut SpatialGrid) -> u32 {
        mark_orb_circular(&orb, grid);
        let id = orb.id;
        self.orbs.push(orb);
        id
    }

    fn animated(mut orb: Orb, settings: &Settings, rng: &mut impl Rng) -> Orb {
        orb.wander = Wander::random(rng, &settings.physics);
        orb.spawn_anim_ms = random_in(rng, settings.spawn.spawn_anim_ms);
        orb.despawn_anim_ms = random_in(rng, settings.spawn.despawn_anim_ms);
        orb
    }

    /// Place a single orb that lives until deleted.
    ///
    /// Returns the new ID, or `None` if the spot is occupied or off the grid.
    #[allow(clippy::too_many_arguments)]
    pub fn create_orb(
        &mut self,
        pos: Vec2,
        z: f32,
        size: u32,
        now: f64,
        grid: &mut SpatialGrid,
        settings: &Settings,
        rng: &mut impl Rng,
    ) -> Option<u32> {
        let size = size.max(1);
        if !pos.is_finite() || !z.is_finite() || !can_spawn(pos, z, size, grid) {
            log::debug!("Rejected orb at ({:.0}, {:.0}, {:.1}) size {}", pos.x, pos.y, z, size);
            return None;
        }
        let dir = random_unit_vec3(rng);
        let speed = random_in(rng, settings.spawn.manual_speed);
        let vel = dir.truncate() * speed;
        let vz = dir.z * speed / settings.physics.z_speed_scale.max(f32::EPSILON);

        let id = self.next_entity_id();
        let orb = Orb::new(id, pos, z, size, now).with_velocity(vel, vz);
        let orb = Self::animated(orb, settings, rng);
        Some(self.insert(orb, grid))
    }

    /// Orb for the burst/continuous paths: size-scaled speed along `heading`,
    /// finite random lifetime
    #[allow(clippy::too_many_arguments)]
    fn spawned_orb(
        &mut self,
        pos: Vec2,
        size: u32,
        layer: f32,
        heading: f32,
        now: f64,
        settings: &Settings,
        rng: &mut impl Rng,
    ) -> Orb {
        let speed = random_in(rng, settings.spawn.spawn_speed) / (size as f32).sqrt();
        let lifetime = random_in(rng, settings.spawn.lifetime_ms);
        let id = self.next_entity_id();
        let mut orb = Orb::new(id, pos, layer, size, now).with_lifetime(lifetime);
        orb.set_heading(heading, speed);
        Self::animated(orb, settings, rng)
    }

    /// Scatter `burst_count` orbs around `center`, moving radially outward.
    ///
    /// Each orb gets up to `spawn_retries` random positions; an orb that never
    /// fits is skipped. Returns how many were placed.
    pub fn spawn_orb_burst(
        &mut self,
        center: Vec2,
        now: f64,
        grid: &mut SpatialGrid,
        settings: &Settings,
        rng: &mut impl Rng,
    ) -> usize {
        let layers = grid.config().layers;
        let max_size = settings.physics.max_orb_size;
        let radius = settings.spawn.burst_radius.max(0.0);
        let mut placed = 0;

        for _ in 0..settings.spawn.burst_count {
            let size = self.random_size(rng);
            let layer = preferred_layer(size, max_size, layers);

            let mut spot = None;
            for _ in 0..settings.spawn.spawn_retries {
                let angle = rng.random_range(0.0..std::f32::consts::TAU);
                // sqrt for uniform density over the disc
                let dist = radius * rng.random::<f32>().sqrt();
                let pos = center + Vec2::from_angle(angle) * dist;
                if can_spawn(pos, layer, size, grid) {
                    spot = Some((pos, angle));
                    break;
                }
            }
            let Some((pos, angle)) = spot else {
                continue;
            };

            let orb = self.spawned_orb(pos, size, layer, angle, now, settings, rng);
            self.insert(orb, grid);
            placed += 1;
        }

        log::info!(
            "Burst at ({:.0}, {:.0}): {}/{} orbs placed",
            center.x,
            center.y,
            placed,
            settings.spawn.burst_count
        );
        placed
    }

    /// Spawn up to `count` orbs at uniform random spots inside the viewport
    /// edge margin, heading in random directions. Returns how many were placed.
    pub fn spawn_random_orbs(
        &mut self,
        count: usize,
        viewport: &Viewport,
        now: f64,
        grid: &mut SpatialGrid,
        settings: &Settings,
        rng: &mut impl Rng,
    ) -> usize {
        let layers = grid.config().layers;
        let max_size = settings.physics.max_orb_size;
        let margin = settings.spawn.edge_margin_px.max(0.0);
        let span = |extent: f32| {
            if extent > 2.0 * margin {
                (margin, extent - margin)
            } else {
                (0.0, extent)
            }
        };
        let (x_range, y_range) = (span(viewport.width), span(viewport.height));
        let mut placed = 0;

        for _ in 0..count {
            let size = self.random_size(rng);
            let layer = preferred_layer(size, max_size, layers);

            let mut spot = None;
            for _ in 0..settings.spawn.spawn_retries {
                let pos = Vec2::new(random_in(rng, x_range), random_in(rng, y_range));
                if can_spawn(pos, layer, size, grid) {
                    spot = Some(pos);
                    break;
                }
            }
            let Some(pos) = spot else {
                continue;
            };

            let heading = rng.random_range(0.0..std::f32::consts::TAU);
            let orb = self.spawned_orb(pos, size, layer, heading, now, settings, rng);
            self.insert(orb, grid);
            placed += 1;
        }

        if placed > 0 {
            log::debug!("Spawned {}/{} background orbs", placed, count);
        }
        placed
    }

    /// Remove an orb and its grid footprint
    pub fn delete_orb(&mut self, id: u32, grid: &mut SpatialGrid) -> bool {
        let Some(index) = self.orbs.iter().position(|o| o.id == id) else {
            return false;
        };
        let orb = self.orbs.remove(index);
        self.forget(&orb, grid);
        true
    }

    /// Remove orbs whose lifetime has elapsed at effective time `now`.
    /// Returns how many were removed.
    pub fn remove_expired(&mut self, now: f64, grid: &mut SpatialGrid) -> usize {
        let before = self.orbs.len();
        self.orbs.retain(|orb| !orb.is_expired(now));
        let removed = before - self.orbs.len();
        if removed > 0 {
            // Cleared shells may have overlapped survivors
            self.remark_all(grid);
            log::debug!("Expired {} orbs, {} live", removed, self.orbs.len());
        }
        removed
    }

    /// Clear a removed orb's footprint and restore any survivor it overlapped
    fn forget(&self, removed: &Orb, grid: &mut SpatialGrid) {
        clear_orb_circular(removed, grid);
        let center = grid.pixel_to_cell(removed.pos, removed.z);
        let reach = removed.avoidance_radius();
        for orb in &self.orbs {
            let d = grid.pixel_to_cell(orb.pos, orb.z) - center;
            let r = reach + orb.avoidance_radius();
            if d.length_squared() <= r * r {
                mark_orb_circular(orb, grid);
            }
        }
    }

    /// Rebuild all dynamic grid flags from current orb positions
    pub fn remark_all(&self, grid: &mut SpatialGrid) {
        grid.clear_dynamic();
        for orb in &self.orbs {
            mark_orb_circular(orb, grid);
        }
    }

    /// Insert a fully built orb without spawn validation, reassigning its ID
    pub fn adopt(&mut self, mut orb: Orb, grid: &mut SpatialGrid) -> u32 {
        orb.id = self.next_entity_id();
        self.insert(orb, grid)
    }
}
