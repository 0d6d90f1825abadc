//! Field state
//!
//! Everything one orb field owns: settings, viewport, grid, orbs, clock and
//! RNG. Hosts call the imperative entry points here strictly between ticks.

use glam::{IVec3, Vec2};
use rand::SeedableRng;
use rand_pcg::Pcg32;

use super::clock::SimClock;
use super::grid::{GridConfig, SpatialGrid, Viewport};
use super::manager::{OrbManager, SpawnScheduler};
use super::orb::{Orb, OrbSnapshot};
use crate::settings::Settings;

/// Complete simulation state for one field
#[derive(Debug, Clone)]
pub struct FieldState {
    /// Seed the RNG was created from
    pub seed: u64,
    pub(crate) settings: Settings,
    pub(crate) viewport: Viewport,
    pub(crate) grid: SpatialGrid,
    pub(crate) manager: OrbManager,
    pub(crate) clock: SimClock,
    pub(crate) scheduler: SpawnScheduler,
    pub(crate) rng: Pcg32,
    /// Ticks run so far
    pub(crate) frame: u64,
}

impl FieldState {
    /// Create an empty field sized to the viewport
    pub fn new(viewport: Viewport, settings: Settings, seed: u64) -> Self {
        let settings = settings.sanitized();
        let grid = SpatialGrid::new(GridConfig::from_viewport(&viewport, &settings.grid));
        Self::assemble(viewport, grid, settings, seed)
    }

    /// Create an empty field on an explicitly sized grid
    pub fn with_grid(config: GridConfig, settings: Settings, seed: u64) -> Self {
        let settings = settings.sanitized();
        let (min, max) = config.px_bounds();
        let size = max - min;
        let viewport = Viewport::new(size.x, size.y, config.device_pixel_ratio);
        Self::assemble(viewport, SpatialGrid::new(config), settings, seed)
    }

    fn assemble(viewport: Viewport, grid: SpatialGrid, settings: Settings, seed: u64) -> Self {
        Self {
            seed,
            manager: OrbManager::new(&settings.physics),
            settings,
            viewport,
            grid,
            clock: SimClock::new(),
            scheduler: SpawnScheduler::default(),
            rng: Pcg32::seed_from_u64(seed),
            frame: 0,
        }
    }

    /// Replace the grid for a new viewport size.
    ///
    /// The old grid and its occupancy are dropped; orbs keep their pixel
    /// positions and are marked on the new grid right away, so placements
    /// before the next tick see them.
    pub fn resize(&mut self, viewport: Viewport) {
        if viewport == self.viewport {
            return;
        }
        log::info!(
            "Viewport {}x{} -> {}x{} (dpr {})",
            self.viewport.width,
            self.viewport.height,
            viewport.width,
            viewport.height,
            viewport.device_pixel_ratio
        );
        self.viewport = viewport;
        self.grid = SpatialGrid::new(GridConfig::from_viewport(&viewport, &self.settings.grid));
        self.manager.remark_all(&mut self.grid);
    }

    #[inline]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[inline]
    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    #[inline]
    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    #[inline]
    pub fn grid_config(&self) -> &GridConfig {
        self.grid.config()
    }

    #[inline]
    pub fn orbs(&self) -> &[Orb] {
        self.manager.orbs()
    }

    #[inline]
    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Effective (pause-adjusted) time for wall-clock `now`
    #[inline]
    pub fn effective_now(&self, now: f64) -> f64 {
        self.clock.effective_now(now)
    }

    /// Place an orb at pixel `(x, y)` and layer `z`. Lives until deleted.
    pub fn create_orb(&mut self, x: f32, y: f32, z: f32, size: u32, now: f64) -> Option<u32> {
        let now = self.clock.effective_now(now);
        self.manager.create_orb(
            Vec2::new(x, y),
            z,
            size,
            now,
            &mut self.grid,
            &self.settings,
            &mut self.rng,
        )
    }

    pub fn delete_orb(&mut self, id: u32) -> bool {
        self.manager.delete_orb(id, &mut self.grid)
    }

    /// Burst of orbs around `center`; returns how many were placed
    pub fn spawn_burst(&mut self, center: Vec2, now: f64) -> usize {
        let now = self.clock.effective_now(now);
        self.manager
            .spawn_orb_burst(center, now, &mut self.grid, &self.settings, &mut self.rng)
    }

    /// Insert a prebuilt orb without spawn validation; its ID is reassigned
    pub fn insert_orb(&mut self, orb: Orb) -> u32 {
        self.manager.adopt(orb, &mut self.grid)
    }

    /// Read-only view of every live orb
    pub fn snapshot(&self) -> Vec<OrbSnapshot> {
        self.manager.orbs().iter().map(Orb::snapshot).collect()
    }

    /// Cell under a pixel on a layer, with its flags (hover lookup)
    pub fn cell_at_pixel(&self, x: f32, y: f32, layer: f32) -> Option<(IVec3, u8)> {
        let c = self.grid.pixel_to_cell(Vec2::new(x, y), layer);
        self.grid
            .in_bounds(c.x, c.y, c.z)
            .then(|| (c, self.grid.get_cell(c.x, c.y, c.z)))
    }
}
