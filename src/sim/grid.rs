//! 3D cell grid
//!
//! A flat byte array of per-cell flag bits, indexed
//! `layer * cells_y * cells_x + y * cells_x + x`. X/Y are spatial cells,
//! the third axis is a discrete depth layer.
//!
//! `BORDER` is stamped once at construction on the X/Y edges of every layer.
//! `FILLED`/`PROXIMITY` are rebuilt every frame via [`SpatialGrid::clear_dynamic`]
//! followed by re-marking each orb. Out-of-bounds reads return `EMPTY` and
//! out-of-bounds writes are ignored; collision code treats leaving the grid on
//! X/Y as hitting a wall. There is no floor or ceiling in Z.

use glam::{IVec2, IVec3, Vec2};
use serde::{Deserialize, Serialize};

use crate::settings::GridSettings;

/// Cell flag bits
pub mod cell {
    pub const EMPTY: u8 = 0;
    /// Part of an orb body
    pub const FILLED: u8 = 1 << 0;
    /// Part of an orb's avoidance shell
    pub const PROXIMITY: u8 = 1 << 1;
    /// Permanent wall
    pub const BORDER: u8 = 1 << 2;
    /// Bits reset every frame
    pub const DYNAMIC: u8 = FILLED | PROXIMITY;
}

/// Host viewport in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    pub device_pixel_ratio: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32, device_pixel_ratio: f32) -> Self {
        Self {
            width: width.max(1.0),
            height: height.max(1.0),
            device_pixel_ratio: if device_pixel_ratio > 0.0 { device_pixel_ratio } else { 1.0 },
        }
    }

    /// Area in CSS pixels²
    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width * 0.5, self.height * 0.5)
    }
}

/// Grid dimensions and coordinate conversion for one viewport size.
///
/// Never mutated: a resize builds a new config and a new grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    pub cells_x: u32,
    pub cells_y: u32,
    pub layers: u32,
    /// Cell edge length in world centimetres
    pub cell_size_x_cm: f32,
    pub cell_size_y_cm: f32,
    /// World bounding box (cm), including the off-screen extension
    pub min_x_cm: f32,
    pub max_x_cm: f32,
    pub min_y_cm: f32,
    pub max_y_cm: f32,
    /// CSS pixels per centimetre
    pub px_per_cm: f32,
    pub device_pixel_ratio: f32,
}

impl GridConfig {
    /// Size a grid to cover the viewport plus the extension margin
    pub fn from_viewport(viewport: &Viewport, settings: &GridSettings) -> Self {
        let ext = settings.extension_px;
        let world_w = viewport.width + 2.0 * ext;
        let world_h = viewport.height + 2.0 * ext;
        // At least one interior cell inside the border ring
        let cells_x = ((world_w / settings.cell_size_px).ceil() as u32).max(3);
        let cells_y = ((world_h / settings.cell_size_px).ceil() as u32).max(3);

        let px_per_cm = settings.px_per_cm;
        let min_x_cm = -ext / px_per_cm;
        let max_x_cm = (viewport.width + ext) / px_per_cm;
        let min_y_cm = -ext / px_per_cm;
        let max_y_cm = (viewport.height + ext) / px_per_cm;

        Self {
            cells_x,
            cells_y,
            layers: settings.layers.max(1),
            cell_size_x_cm: (max_x_cm - min_x_cm) / cells_x as f32,
            cell_size_y_cm: (max_y_cm - min_y_cm) / cells_y as f32,
            min_x_cm,
            max_x_cm,
            min_y_cm,
            max_y_cm,
            px_per_cm,
            device_pixel_ratio: viewport.device_pixel_ratio,
        }
    }

    /// Explicit cell counts with the world origin at pixel (0, 0)
    pub fn with_cells(cells_x: u32, cells_y: u32, layers: u32, cell_size_px: f32) -> Self {
        let px_per_cm = GridSettings::default().px_per_cm;
        let cell_cm = cell_size_px / px_per_cm;
        Self {
            cells_x,
            cells_y,
            layers: layers.max(1),
            cell_size_x_cm: cell_cm,
            cell_size_y_cm: cell_cm,
            min_x_cm: 0.0,
            max_x_cm: cells_x as f32 * cell_cm,
            min_y_cm: 0.0,
            max_y_cm: cells_y as f32 * cell_cm,
            px_per_cm,
            device_pixel_ratio: 1.0,
        }
    }

    #[inline]
    pub fn total_cells(&self) -> usize {
        self.cells_x as usize * self.cells_y as usize * self.layers as usize
    }

    /// Cell edge lengths in pixels
    #[inline]
    pub fn cell_size_px(&self) -> Vec2 {
        Vec2::new(self.cell_size_x_cm, self.cell_size_y_cm) * self.px_per_cm
    }

    #[inline]
    pub fn px_to_world(&self, px: Vec2) -> Vec2 {
        px / self.px_per_cm
    }

    #[inline]
    pub fn world_to_px(&self, cm: Vec2) -> Vec2 {
        cm * self.px_per_cm
    }

    /// Pixel-space bounds of the grid (min, max)
    pub fn px_bounds(&self) -> (Vec2, Vec2) {
        (
            self.world_to_px(Vec2::new(self.min_x_cm, self.min_y_cm)),
            self.world_to_px(Vec2::new(self.max_x_cm, self.max_y_cm)),
        )
    }

    /// Center of the grid volume in pixels
    pub fn center_px(&self) -> Vec2 {
        let (min, max) = self.px_bounds();
        (min + max) * 0.5
    }
}

/// Calls `f` for every cell within Euclidean `radius` of `center`.
#[inline]
pub fn for_each_in_sphere(center: IVec3, radius: i32, mut f: impl FnMut(IVec3)) {
    let r2 = radius * radius;
    for dz in -radius..=radius {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy + dz * dz <= r2 {
                    f(center + IVec3::new(dx, dy, dz));
                }
            }
        }
    }
}

/// True if `pred` holds for any cell within Euclidean `radius` of `center`.
#[inline]
pub fn any_in_sphere(center: IVec3, radius: i32, mut pred: impl FnMut(IVec3) -> bool) -> bool {
    let r2 = radius * radius;
    for dz in -radius..=radius {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy + dz * dz <= r2 && pred(center + IVec3::new(dx, dy, dz)) {
                    return true;
                }
            }
        }
    }
    false
}

/// The occupancy grid
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    config: GridConfig,
    cells: Vec<u8>,
}

impl SpatialGrid {
    pub fn new(config: GridConfig) -> Self {
        let mut grid = Self {
            config,
            cells: vec![cell::EMPTY; config.total_cells()],
        };
        grid.initialize_border();
        log::info!(
            "Grid {}x{}x{} ({} cells, cell {:.2}x{:.2} cm)",
            config.cells_x,
            config.cells_y,
            config.layers,
            grid.cells.len(),
            config.cell_size_x_cm,
            config.cell_size_y_cm
        );
        grid
    }

    #[inline]
    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    #[inline]
    pub fn in_bounds(&self, x: i32, y: i32, z: i32) -> bool {
        x >= 0
            && y >= 0
            && z >= 0
            && (x as u32) < self.config.cells_x
            && (y as u32) < self.config.cells_y
            && (z as u32) < self.config.layers
    }

    #[inline]
    fn index(&self, x: i32, y: i32, z: i32) -> Option<usize> {
        if !self.in_bounds(x, y, z) {
            return None;
        }
        let (cx, cy) = (self.config.cells_x as usize, self.config.cells_y as usize);
        Some(z as usize * cy * cx + y as usize * cx + x as usize)
    }

    /// Flags at a cell; `EMPTY` when out of bounds
    #[inline]
    pub fn get_cell(&self, x: i32, y: i32, z: i32) -> u8 {
        self.index(x, y, z).map_or(cell::EMPTY, |i| self.cells[i])
    }

    #[inline]
    pub fn set_cell(&mut self, x: i32, y: i32, z: i32, flags: u8) {
        if let Some(i) = self.index(x, y, z) {
            self.cells[i] = flags;
        }
    }

    #[inline]
    pub fn add_cell_flag(&mut self, x: i32, y: i32, z: i32, flag: u8) {
        if let Some(i) = self.index(x, y, z) {
            self.cells[i] |= flag;
        }
    }

    #[inline]
    pub fn remove_cell_flag(&mut self, x: i32, y: i32, z: i32, flag: u8) {
        if let Some(i) = self.index(x, y, z) {
            self.cells[i] &= !flag;
        }
    }

    /// World cm → cell (floored)
    #[inline]
    pub fn world_to_grid(&self, world: Vec2) -> IVec2 {
        let c = &self.config;
        IVec2::new(
            ((world.x - c.min_x_cm) / c.cell_size_x_cm).floor() as i32,
            ((world.y - c.min_y_cm) / c.cell_size_y_cm).floor() as i32,
        )
    }

    /// Cell → world cm at the cell center
    #[inline]
    pub fn grid_to_world(&self, cell: IVec2) -> Vec2 {
        let c = &self.config;
        Vec2::new(
            c.min_x_cm + (cell.x as f32 + 0.5) * c.cell_size_x_cm,
            c.min_y_cm + (cell.y as f32 + 0.5) * c.cell_size_y_cm,
        )
    }

    /// Pixel position plus fractional layer → cell (layer rounded to nearest)
    #[inline]
    pub fn pixel_to_cell(&self, px: Vec2, z: f32) -> IVec3 {
        let xy = self.world_to_grid(self.config.px_to_world(px));
        xy.extend(z.round() as i32)
    }

    /// Cell center in pixels
    #[inline]
    pub fn cell_center_px(&self, cell: IVec2) -> Vec2 {
        self.config.world_to_px(self.grid_to_world(cell))
    }

    /// Stamp `BORDER` on the outer X/Y ring of every layer
    pub fn initialize_border(&mut self) {
        let (cx, cy) = (self.config.cells_x as i32, self.config.cells_y as i32);
        for z in 0..self.config.layers as i32 {
            for x in 0..cx {
                self.add_cell_flag(x, 0, z, cell::BORDER);
                self.add_cell_flag(x, cy - 1, z, cell::BORDER);
            }
            for y in 0..cy {
                self.add_cell_flag(0, y, z, cell::BORDER);
                self.add_cell_flag(cx - 1, y, z, cell::BORDER);
            }
        }
    }

    /// Reset `FILLED`/`PROXIMITY` everywhere, keeping `BORDER`
    pub fn clear_dynamic(&mut self) {
        for c in &mut self.cells {
            *c &= !cell::DYNAMIC;
        }
    }

    /// Index for wall/blocking tests: walls extend infinitely in Z, so the
    /// layer is clamped and only X/Y can leave the grid
    #[inline]
    fn column_index(&self, x: i32, y: i32, z: i32) -> Option<usize> {
        let z = z.clamp(0, self.config.layers as i32 - 1);
        self.index(x, y, z)
    }

    /// Off the X/Y edge, orb body or wall
    #[inline]
    pub fn is_blocking(&self, x: i32, y: i32, z: i32) -> bool {
        match self.column_index(x, y, z) {
            None => true,
            Some(i) => self.cells[i] & (cell::FILLED | cell::BORDER) != 0,
        }
    }

    /// Off the X/Y edge or wall; other orbs don't count
    #[inline]
    pub fn is_wall(&self, x: i32, y: i32, z: i32) -> bool {
        match self.column_index(x, y, z) {
            None => true,
            Some(i) => self.cells[i] & cell::BORDER != 0,
        }
    }

    #[inline]
    pub fn is_wall_at(&self, cell: IVec3) -> bool {
        self.is_wall(cell.x, cell.y, cell.z)
    }

    #[inline]
    pub fn is_blocking_at(&self, cell: IVec3) -> bool {
        self.is_blocking(cell.x, cell.y, cell.z)
    }

    /// Number of cells with any of `flags` set
    pub fn count_flag(&self, flags: u8) -> usize {
        self.cells.iter().filter(|&&c| c & flags != 0).count()
    }

    /// Raw cell bytes in index order
    pub fn cells(&self) -> &[u8] {
        &self.cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn grid_10() -> SpatialGrid {
        SpatialGrid::new(GridConfig::with_cells(10, 8, 4, 10.0))
    }

    #[test]
    fn test_border_on_every_layer() {
        let grid = grid_10();
        for z in 0..4 {
            assert!(grid.get_cell(0, 3, z) & cell::BORDER != 0);
            assert!(grid.get_cell(9, 3, z) & cell::BORDER != 0);
            assert!(grid.get_cell(4, 0, z) & cell::BORDER != 0);
            assert!(grid.get_cell(4, 7, z) & cell::BORDER != 0);
            assert_eq!(grid.get_cell(4, 4, z), cell::EMPTY);
        }
        // 2*10 + 2*6 ring cells per layer
        assert_eq!(grid.count_flag(cell::BORDER), 32 * 4);
    }

    #[test]
    fn test_out_of_bounds_access() {
        let mut grid = grid_10();
        assert_eq!(grid.get_cell(-1, 0, 0), cell::EMPTY);
        assert_eq!(grid.get_cell(0, 0, 4), cell::EMPTY);
        grid.set_cell(100, 100, 0, cell::FILLED);
        grid.add_cell_flag(-5, 2, 1, cell::FILLED);
        assert_eq!(grid.count_flag(cell::FILLED), 0);
        assert!(grid.is_wall(-1, 3, 0));
        assert!(grid.is_blocking(3, 8, 0));
        // No floor or ceiling: Z beyond the layers behaves like the nearest layer
        assert!(!grid.is_wall(3, 3, -1));
        assert!(!grid.is_blocking(3, 3, 4));
        assert!(grid.is_wall(0, 3, 7));
    }

    #[test]
    fn test_flags_are_independent() {
        let mut grid = grid_10();
        grid.add_cell_flag(0, 3, 1, cell::FILLED);
        assert_eq!(grid.get_cell(0, 3, 1), cell::BORDER | cell::FILLED);
        grid.remove_cell_flag(0, 3, 1, cell::FILLED);
        assert_eq!(grid.get_cell(0, 3, 1), cell::BORDER);
    }

    #[test]
    fn test_wall_ignores_filled() {
        let mut grid = grid_10();
        grid.add_cell_flag(4, 4, 1, cell::FILLED);
        assert!(!grid.is_wall(4, 4, 1));
        assert!(grid.is_blocking(4, 4, 1));
        grid.add_cell_flag(5, 5, 1, cell::PROXIMITY);
        assert!(!grid.is_blocking(5, 5, 1));
    }

    #[test]
    fn test_clear_dynamic_preserves_border() {
        let mut grid = grid_10();
        let before = grid.cells().to_vec();
        grid.add_cell_flag(0, 0, 0, cell::FILLED | cell::PROXIMITY);
        grid.add_cell_flag(3, 3, 2, cell::FILLED);
        grid.add_cell_flag(4, 3, 2, cell::PROXIMITY);
        grid.clear_dynamic();
        assert_eq!(grid.cells(), &before[..]);
    }

    #[test]
    fn test_world_grid_conversion() {
        let grid = grid_10();
        let cell_cm = grid.config().cell_size_x_cm;
        let c = grid.world_to_grid(Vec2::new(cell_cm * 3.2, cell_cm * 0.99));
        assert_eq!(c, IVec2::new(3, 0));
        let back = grid.grid_to_world(IVec2::new(3, 0));
        assert!((back.x - cell_cm * 3.5).abs() < 1e-4);
        assert!((back.y - cell_cm * 0.5).abs() < 1e-4);
        // Negative coordinates floor downward
        assert_eq!(grid.world_to_grid(Vec2::new(-0.01, 0.0)).x, -1);
    }

    #[test]
    fn test_pixel_to_cell_rounds_layer() {
        let grid = grid_10();
        assert_eq!(grid.pixel_to_cell(Vec2::new(25.0, 35.0), 1.6), IVec3::new(2, 3, 2));
        assert_eq!(grid.pixel_to_cell(Vec2::new(25.0, 35.0), 1.4), IVec3::new(2, 3, 1));
    }

    #[test]
    fn test_sphere_footprint() {
        let mut n = 0;
        for_each_in_sphere(IVec3::ZERO, 0, |_| n += 1);
        assert_eq!(n, 1);
        n = 0;
        for_each_in_sphere(IVec3::ZERO, 1, |_| n += 1);
        // center + 6 face neighbours
        assert_eq!(n, 7);
        // Corners of the bounding box are not in the sphere
        assert!(!any_in_sphere(IVec3::ZERO, 1, |c| c == IVec3::ONE));
    }

    #[test]
    fn test_from_viewport_covers_extension() {
        let settings = GridSettings::default();
        let config = GridConfig::from_viewport(&Viewport::new(1000.0, 600.0, 2.0), &settings);
        let (min, max) = config.px_bounds();
        assert!((min.x + settings.extension_px).abs() < 0.01);
        assert!((max.y - (600.0 + settings.extension_px)).abs() < 0.01);
        assert_eq!(config.cells_x, 60);
        assert_eq!(config.cells_y, 40);
        assert_eq!(config.layers, 100);
        assert!((config.cell_size_px().x - 20.0).abs() < 0.01);
    }

    proptest! {
        #[test]
        fn prop_clear_dynamic_only_resets_dynamic(
            marks in proptest::collection::vec((0i32..10, 0i32..8, 0i32..4, 1u8..4), 0..64)
        ) {
            let mut grid = grid_10();
            for &(x, y, z, flag) in &marks {
                grid.add_cell_flag(x, y, z, flag & cell::DYNAMIC);
            }
            grid.clear_dynamic();
            prop_assert_eq!(grid.count_flag(cell::DYNAMIC), 0);
            prop_assert_eq!(grid.count_flag(cell::BORDER), 32 * 4);
        }
    }
}
