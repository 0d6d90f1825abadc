//! Simulation settings
//!
//! Every tunable constant of the orb field lives here. Settings are plain data
//! passed into constructors; nothing reads them from global state.

use serde::{Deserialize, Serialize};

/// Grid sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSettings {
    /// Number of depth layers (Z cells)
    pub layers: u32,
    /// Target cell edge length in CSS pixels
    pub cell_size_px: f32,
    /// CSS pixels per world centimetre (96 dpi)
    pub px_per_cm: f32,
    /// Margin beyond each viewport edge where orbs may still live (pixels)
    pub extension_px: f32,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            layers: 100,
            cell_size_px: 20.0,
            px_per_cm: 96.0 / 2.54,
            extension_px: 100.0,
        }
    }
}

/// Per-orb kinematics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsSettings {
    /// Speed cap of a size-1 orb (px/s); larger orbs get `base / sqrt(size)`
    pub base_max_speed: f32,
    /// Floor for the size-derived speed cap (px/s)
    pub min_max_speed: f32,
    /// Fraction of the excess speed removed per 60 Hz frame
    pub speed_limit_rate: f32,
    /// Pixels-per-second equivalent of one layer per second.
    /// Visual tuning constant, not a physical conversion.
    pub z_speed_scale: f32,
    /// Orbs slower than this (px/s) don't wander
    pub wander_speed_floor: f32,
    /// Wander nudge amplitude range (rad/s)
    pub wander_strength: (f32, f32),
    /// Wander direction phase speed range (rad/s)
    pub wander_speed: (f32, f32),
    /// Wander intensity modulation phase speed range (rad/s)
    pub wander_modulation_speed: (f32, f32),
    /// Spring constant pulling `z` toward the preferred layer (1/s²)
    pub layer_attraction_strength: f32,
    /// Attraction never pushes `|vz|` beyond this (layers/s)
    pub max_layer_drift_speed: f32,
    /// Largest orb size that spawning produces
    pub max_orb_size: u32,
}

impl Default for PhysicsSettings {
    fn default() -> Self {
        Self {
            base_max_speed: 150.0,
            min_max_speed: 25.0,
            speed_limit_rate: 0.1,
            z_speed_scale: 20.0,
            wander_speed_floor: 1.0,
            wander_strength: (0.2, 0.8),
            wander_speed: (0.3, 1.2),
            wander_modulation_speed: (0.05, 0.3),
            layer_attraction_strength: 0.5,
            max_layer_drift_speed: 3.0,
            max_orb_size: 8,
        }
    }
}

/// Collision, avoidance and pointer response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionSettings {
    /// Soft repulsion strength (px/s²)
    pub avoidance_strength: f32,
    /// Repulsion multiplier when the bodies also overlap
    pub avoidance_body_multiplier: f32,
    /// Restitution for orb-orb impulses
    pub elasticity: f32,
    /// Positional correction multiplier for a barely touching pair
    pub min_correction_multiplier: f32,
    /// Positional correction multiplier for a fully overlapping pair
    pub max_correction_multiplier: f32,
    /// Overlap ratio beyond which a separating pair gets a kick
    pub stuck_overlap_ratio: f32,
    /// Separation kick speed (cells/s)
    pub min_separation_speed: f32,
    /// Pointer influence radius (px)
    pub pointer_radius: f32,
    /// Pointer push (px/s gained per 60 Hz frame at the pointer)
    pub pointer_strength: f32,
    /// Orbs nearer than this to the pointer (px) are left alone
    pub pointer_min_distance: f32,
    /// How far an orb stuck in a wall is moved out (cells)
    pub unstick_distance_cells: f32,
    /// Speed given to an unstuck orb if it was slower (px/s)
    pub unstick_min_speed: f32,
}

impl Default for CollisionSettings {
    fn default() -> Self {
        Self {
            avoidance_strength: 200.0,
            avoidance_body_multiplier: 3.0,
            elasticity: 0.8,
            min_correction_multiplier: 1.2,
            max_correction_multiplier: 2.0,
            stuck_overlap_ratio: 0.3,
            min_separation_speed: 2.0,
            pointer_radius: 150.0,
            pointer_strength: 80.0,
            pointer_min_distance: 1.0,
            unstick_distance_cells: 2.0,
            unstick_min_speed: 20.0,
        }
    }
}

/// Orb creation and lifetime
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnSettings {
    /// Speed range of manually placed orbs (px/s)
    pub manual_speed: (f32, f32),
    /// Orbs per burst
    pub burst_count: u32,
    /// Burst scatter radius (px)
    pub burst_radius: f32,
    /// Random positions tried per orb before giving up on it
    pub spawn_retries: u32,
    /// Speed range of burst/continuous orbs before size scaling (px/s)
    pub spawn_speed: (f32, f32),
    /// Lifetime range of burst/continuous orbs (ms)
    pub lifetime_ms: (f64, f64),
    /// Continuous spawns keep this far from the viewport edge (px)
    pub edge_margin_px: f32,
    /// Continuous target density
    pub orbs_per_megapixel: f32,
    /// Continuous target ceiling
    pub max_target_orbs: u32,
    /// Spawn rate with no deficit (orbs/s)
    pub base_spawn_rate: f32,
    /// Extra spawn rate per missing orb (orbs/s)
    pub catch_up_rate: f32,
    /// Continuous spawns per tick ceiling
    pub max_spawns_per_frame: u32,
    /// Fade-in duration range (ms)
    pub spawn_anim_ms: (f64, f64),
    /// Fade-out duration range (ms)
    pub despawn_anim_ms: (f64, f64),
}

impl Default for SpawnSettings {
    fn default() -> Self {
        Self {
            manual_speed: (20.0, 60.0),
            burst_count: 87,
            burst_radius: 120.0,
            spawn_retries: 20,
            spawn_speed: (40.0, 120.0),
            lifetime_ms: (10_000.0, 180_000.0),
            edge_margin_px: 40.0,
            orbs_per_megapixel: 60.0,
            max_target_orbs: 300,
            base_spawn_rate: 0.5,
            catch_up_rate: 0.2,
            max_spawns_per_frame: 3,
            spawn_anim_ms: (400.0, 1200.0),
            despawn_anim_ms: (600.0, 1600.0),
        }
    }
}

/// Depth effects for render extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Layer that renders sharp
    pub focal_layer: f32,
    /// Blur at the farthest distance from the focal layer (px)
    pub max_blur_px: f32,
    /// Parallax shift fraction for front-most orbs
    pub parallax_strength: f32,
    /// Radius scale of the back-most layer relative to the front
    pub far_scale: f32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            focal_layer: 0.0,
            max_blur_px: 12.0,
            parallax_strength: 0.05,
            far_scale: 0.5,
        }
    }
}

/// Full simulation settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub grid: GridSettings,
    pub physics: PhysicsSettings,
    pub collision: CollisionSettings,
    pub spawn: SpawnSettings,
    pub render: RenderSettings,
}

fn ordered<T: PartialOrd + Copy>(range: (T, T)) -> (T, T) {
    if range.0 <= range.1 {
        range
    } else {
        (range.1, range.0)
    }
}

impl Settings {
    /// Parse settings from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<Self>(json).map(Self::sanitized)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Clamp values the simulation can't work with
    pub fn sanitized(mut self) -> Self {
        let g = &mut self.grid;
        g.layers = g.layers.max(1);
        if !(g.cell_size_px > 0.0) {
            log::warn!("cell_size_px {} rejected, using default", g.cell_size_px);
            g.cell_size_px = GridSettings::default().cell_size_px;
        }
        if !(g.px_per_cm > 0.0) {
            g.px_per_cm = GridSettings::default().px_per_cm;
        }
        g.extension_px = g.extension_px.max(0.0);

        let p = &mut self.physics;
        p.max_orb_size = p.max_orb_size.max(1);
        p.min_max_speed = p.min_max_speed.max(0.0);
        p.speed_limit_rate = p.speed_limit_rate.clamp(0.0, 1.0);
        p.wander_strength = ordered(p.wander_strength);
        p.wander_speed = ordered(p.wander_speed);
        p.wander_modulation_speed = ordered(p.wander_modulation_speed);
        p.max_layer_drift_speed = p.max_layer_drift_speed.max(0.0);

        let c = &mut self.collision;
        c.elasticity = c.elasticity.clamp(0.0, 1.0);
        if c.min_correction_multiplier > c.max_correction_multiplier {
            std::mem::swap(&mut c.min_correction_multiplier, &mut c.max_correction_multiplier);
        }

        let s = &mut self.spawn;
        s.manual_speed = ordered(s.manual_speed);
        s.spawn_speed = ordered(s.spawn_speed);
        s.lifetime_ms = ordered(s.lifetime_ms);
        s.spawn_anim_ms = ordered(s.spawn_anim_ms);
        s.despawn_anim_ms = ordered(s.despawn_anim_ms);
        s.spawn_retries = s.spawn_retries.max(1);

        self
    }

    /// Load settings from a JSON file, falling back to defaults
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load(path: &std::path::Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(json) => match Self::from_json(&json) {
                Ok(settings) => {
                    log::info!("Loaded settings from {}", path.display());
                    settings
                }
                Err(e) => {
                    log::warn!("Invalid settings in {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("Could not read {}: {}, using defaults", path.display(), e);
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let settings = Settings::from_json(r#"{ "collision": { "elasticity": 0.5 } }"#).unwrap();
        assert_eq!(settings.collision.elasticity, 0.5);
        assert_eq!(settings.collision.avoidance_strength, 200.0);
        assert_eq!(settings.spawn.burst_count, 87);
        assert_eq!(settings.grid.layers, 100);
    }

    #[test]
    fn test_sanitized_fixes_ranges() {
        let mut settings = Settings::default();
        settings.spawn.lifetime_ms = (5000.0, 1000.0);
        settings.grid.layers = 0;
        settings.grid.cell_size_px = -3.0;
        settings.physics.max_orb_size = 0;
        let settings = settings.sanitized();
        assert_eq!(settings.spawn.lifetime_ms, (1000.0, 5000.0));
        assert_eq!(settings.grid.layers, 1);
        assert!(settings.grid.cell_size_px > 0.0);
        assert_eq!(settings.physics.max_orb_size, 1);
    }

    #[test]
    fn test_json_round_trip() {
        let json = Settings::default().to_json().unwrap();
        let parsed = Settings::from_json(&json).unwrap();
        assert_eq!(parsed.physics.z_speed_scale, 20.0);
        assert_eq!(parsed.collision.pointer_radius, 150.0);
    }

    #[test]
    fn test_invalid_json_is_error() {
        assert!(Settings::from_json("{ not json").is_err());
    }
}
