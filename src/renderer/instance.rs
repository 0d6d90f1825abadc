//! Per-orb render instances
//!
//! Flattens the live orbs into a GPU/canvas friendly buffer. Extraction only
//! reads the field; drawing is up to the host.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;

use crate::settings::RenderSettings;
use crate::sim::orb::Orb;
use crate::sim::state::FieldState;

/// One orb as the host draws it, in device pixels
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct OrbInstance {
    /// Parallax-shifted center
    pub pos: [f32; 2],
    /// Depth-scaled radius
    pub radius: f32,
    /// Blur from distance to the focal layer
    pub blur: f32,
    /// Spawn fade-in times despawn fade-out
    pub alpha: f32,
    /// 0 = front layer, 1 = back layer
    pub depth: f32,
    /// Planar speed (px/s) for glow intensity
    pub speed: f32,
    /// Pads the struct to 32 bytes
    pub _pad: f32,
}

impl OrbInstance {
    /// f32 lanes per instance in a flattened buffer
    pub const FLOATS: usize = std::mem::size_of::<Self>() / std::mem::size_of::<f32>();
}

/// Normalized depth of a layer position, clamped to the grid
#[inline]
fn normalized_depth(z: f32, layers: u32) -> f32 {
    let back = layers.saturating_sub(1).max(1) as f32;
    (z / back).clamp(0.0, 1.0)
}

#[inline]
fn smoothstep(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Fade-in over the spawn animation, fade-out over the last stretch of a
/// finite lifetime
pub fn orb_alpha(orb: &Orb, now: f64) -> f32 {
    let age = orb.age_ms(now).max(0.0);
    let fade_in = if orb.spawn_anim_ms > 0.0 {
        (age / orb.spawn_anim_ms) as f32
    } else {
        1.0
    };
    let fade_out = match orb.lifetime_ms {
        Some(life) if orb.despawn_anim_ms > 0.0 => ((life - age) / orb.despawn_anim_ms) as f32,
        Some(life) if age > life => 0.0,
        _ => 1.0,
    };
    smoothstep(fade_in) * smoothstep(fade_out)
}

fn build_instance(
    orb: &Orb,
    layers: u32,
    cell_px: f32,
    dpr: f32,
    parallax_offset: Vec2,
    settings: &RenderSettings,
    now: f64,
) -> OrbInstance {
    let depth = normalized_depth(orb.z, layers);
    let focal = normalized_depth(settings.focal_layer, layers);
    let scale = 1.0 + (settings.far_scale - 1.0) * depth;
    // Near orbs shift more than far ones
    let shift = parallax_offset * settings.parallax_strength * (1.0 - depth);
    let pos = (orb.pos + shift) * dpr;

    OrbInstance {
        pos: pos.to_array(),
        radius: orb.size as f32 * cell_px * 0.5 * scale * dpr,
        blur: (depth - focal).abs() * settings.max_blur_px * dpr,
        alpha: orb_alpha(orb, now),
        depth,
        speed: orb.speed,
        _pad: 0.0,
    }
}

/// Build one instance per live orb at wall-clock `now` (ms).
///
/// Back orbs come first so hosts can draw in order.
pub fn extract_instances(state: &FieldState, parallax_offset: Vec2, now: f64) -> Vec<OrbInstance> {
    let config = state.grid_config();
    let cell_px = config.cell_size_px();
    let cell_px = (cell_px.x + cell_px.y) * 0.5;
    let now = state.effective_now(now);
    let render = &state.settings().render;

    let mut instances: Vec<OrbInstance> = state
        .orbs()
        .iter()
        .map(|orb| {
            build_instance(
                orb,
                config.layers,
                cell_px,
                config.device_pixel_ratio,
                parallax_offset,
                render,
                now,
            )
        })
        .collect();
    instances.sort_by(|a, b| b.depth.total_cmp(&a.depth));
    instances
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use crate::sim::grid::{GridConfig, Viewport};

    fn field() -> FieldState {
        FieldState::with_grid(GridConfig::with_cells(40, 40, 11, 10.0), Settings::default(), 1)
    }

    #[test]
    fn test_instance_layout() {
        assert_eq!(std::mem::size_of::<OrbInstance>(), 32);
        assert_eq!(OrbInstance::FLOATS, 8);
        let instances = [OrbInstance::default(); 3];
        let floats: &[f32] = bytemuck::cast_slice(&instances);
        assert_eq!(floats.len(), 24);
    }

    #[test]
    fn test_alpha_fades() {
        let mut orb = Orb::new(1, Vec2::ZERO, 0.0, 1, 0.0).with_lifetime(10_000.0);
        orb.spawn_anim_ms = 1000.0;
        orb.despawn_anim_ms = 1000.0;
        assert_eq!(orb_alpha(&orb, 0.0), 0.0);
        assert!((orb_alpha(&orb, 500.0) - 0.5).abs() < 1e-6);
        assert_eq!(orb_alpha(&orb, 5000.0), 1.0);
        assert!((orb_alpha(&orb, 9500.0) - 0.5).abs() < 1e-6);
        assert_eq!(orb_alpha(&orb, 10_500.0), 0.0);
    }

    #[test]
    fn test_persistent_orb_stays_opaque() {
        let orb = Orb::new(1, Vec2::ZERO, 0.0, 1, 0.0);
        assert_eq!(orb_alpha(&orb, 1e9), 1.0);
    }

    #[test]
    fn test_depth_scale_blur_parallax() {
        let mut field = field();
        field.insert_orb(Orb::new(0, Vec2::new(100.0, 100.0), 0.0, 2, 0.0));
        field.insert_orb(Orb::new(0, Vec2::new(300.0, 300.0), 10.0, 2, 0.0));

        let instances = extract_instances(&field, Vec2::new(100.0, 0.0), 0.0);
        assert_eq!(instances.len(), 2);
        // Sorted back to front
        let (back, front) = (instances[0], instances[1]);
        assert_eq!(back.depth, 1.0);
        assert_eq!(front.depth, 0.0);

        assert!((front.radius - 10.0).abs() < 1e-4);
        assert!((back.radius - 5.0).abs() < 1e-4);
        assert_eq!(front.blur, 0.0);
        assert!((back.blur - 12.0).abs() < 1e-4);
        // 100 px offset * 0.05 on the front layer, none at the back
        assert!((front.pos[0] - 105.0).abs() < 1e-4);
        assert!((back.pos[0] - 300.0).abs() < 1e-4);
    }

    #[test]
    fn test_device_pixel_ratio() {
        let mut field = FieldState::new(Viewport::new(800.0, 600.0, 2.0), Settings::default(), 1);
        field.create_orb(400.0, 300.0, 0.0, 1, 0.0).unwrap();
        let instance = extract_instances(&field, Vec2::ZERO, 0.0)[0];
        assert!((instance.pos[0] - 800.0).abs() < 1e-3);
        assert!((instance.pos[1] - 600.0).abs() < 1e-3);
    }

    #[test]
    fn test_extraction_is_read_only() {
        let mut field = field();
        field.insert_orb(Orb::new(0, Vec2::new(100.0, 100.0), 3.0, 1, 0.0));
        let before = field.snapshot();
        let _ = extract_instances(&field, Vec2::new(5.0, 5.0), 100.0);
        assert_eq!(field.snapshot(), before);
    }
}
