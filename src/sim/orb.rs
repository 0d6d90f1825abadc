//! Orb entity
//!
//! Positions are in CSS pixels on X/Y and fractional layers on Z.
//! Velocities follow the same units per second.

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::settings::PhysicsSettings;
use crate::{random_in, wrap_phase};

/// Per-orb organic drift signature
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Wander {
    /// Nudge amplitude (rad/s)
    pub strength: f32,
    /// Direction-change phase, kept in [0, 2π)
    pub phase: f32,
    /// Direction-change phase speed (rad/s)
    pub speed: f32,
    /// Intensity modulation phase speed (rad/s)
    pub modulation_speed: f32,
    /// Intensity modulation phase, kept in [0, 2π)
    pub modulation_phase: f32,
}

impl Wander {
    pub fn random(rng: &mut impl Rng, settings: &PhysicsSettings) -> Self {
        Self {
            strength: random_in(rng, settings.wander_strength),
            phase: wrap_phase(rng.random::<f32>() * std::f32::consts::TAU),
            speed: random_in(rng, settings.wander_speed),
            modulation_speed: random_in(rng, settings.wander_modulation_speed),
            modulation_phase: wrap_phase(rng.random::<f32>() * std::f32::consts::TAU),
        }
    }
}

/// A simulated orb
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Orb {
    pub id: u32,
    /// Position (px)
    pub pos: Vec2,
    /// Depth (layers)
    pub z: f32,
    /// Planar velocity (px/s)
    pub vel: Vec2,
    /// Depth velocity (layers/s)
    pub vz: f32,
    /// `|vel|`, kept in sync by [`Orb::sync_polar`]
    pub speed: f32,
    /// `atan2(vel.y, vel.x)`
    pub angle: f32,
    /// Diameter in cells, also the collision mass. Always >= 1.
    pub size: u32,
    /// Effective time of creation (ms)
    pub created_at: f64,
    /// `None` lives until deleted
    pub lifetime_ms: Option<f64>,
    pub spawn_anim_ms: f64,
    pub despawn_anim_ms: f64,
    pub wander: Wander,
}

impl Orb {
    pub fn new(id: u32, pos: Vec2, z: f32, size: u32, created_at: f64) -> Self {
        Self {
            id,
            pos,
            z,
            vel: Vec2::ZERO,
            vz: 0.0,
            speed: 0.0,
            angle: 0.0,
            size: size.max(1),
            created_at,
            lifetime_ms: None,
            spawn_anim_ms: 0.0,
            despawn_anim_ms: 0.0,
            wander: Wander::default(),
        }
    }

    pub fn with_velocity(mut self, vel: Vec2, vz: f32) -> Self {
        self.vel = vel;
        self.vz = vz;
        self.sync_polar();
        self
    }

    pub fn with_lifetime(mut self, lifetime_ms: f64) -> Self {
        self.lifetime_ms = Some(lifetime_ms);
        self
    }

    /// Recompute `speed`/`angle` after editing `vel`
    #[inline]
    pub fn sync_polar(&mut self) {
        self.speed = self.vel.length();
        self.angle = self.vel.y.atan2(self.vel.x);
    }

    /// Set `vel` from a heading and planar speed
    #[inline]
    pub fn set_heading(&mut self, angle: f32, speed: f32) {
        self.vel = Vec2::from_angle(angle) * speed;
        self.angle = angle;
        self.speed = speed;
    }

    /// Body radius in cells
    #[inline]
    pub fn body_radius(&self) -> i32 {
        self.size as i32 - 1
    }

    /// Avoidance shell radius in cells
    #[inline]
    pub fn avoidance_radius(&self) -> i32 {
        ((self.size as f32).sqrt() + (self.size as f32 - 1.0) + 1.0).floor() as i32
    }

    #[inline]
    pub fn mass(&self) -> f32 {
        self.size as f32
    }

    /// Milliseconds since creation at effective time `now`
    #[inline]
    pub fn age_ms(&self, now: f64) -> f64 {
        now - self.created_at
    }

    #[inline]
    pub fn is_expired(&self, now: f64) -> bool {
        self.lifetime_ms.is_some_and(|life| self.age_ms(now) > life)
    }

    pub fn snapshot(&self) -> OrbSnapshot {
        OrbSnapshot {
            id: self.id,
            x: self.pos.x,
            y: self.pos.y,
            z: self.z,
            vx: self.vel.x,
            vy: self.vel.y,
            vz: self.vz,
            size: self.size,
            speed: self.speed,
            angle: self.angle,
        }
    }
}

/// Read-only orb view for rendering and debug inspection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrbSnapshot {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub vx: f32,
    pub vy: f32,
    pub vz: f32,
    pub size: u32,
    pub speed: f32,
    pub angle: f32,
}
