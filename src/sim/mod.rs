//! Spatial simulation module
//!
//! Everything that moves orbs lives here. This module stays free of
//! rendering and platform code:
//! - Seeded RNG only
//! - Time comes in through [`TickInput`], never read from a clock
//! - Stable iteration order (insertion order of orbs)

pub mod clock;
pub mod collision;
pub mod grid;
pub mod manager;
pub mod orb;
pub mod physics;
pub mod state;
pub mod tick;

pub use clock::SimClock;
pub use collision::{MoveCheck, can_spawn, check_move, orb_touches_wall};
pub use grid::{GridConfig, SpatialGrid, Viewport, cell};
pub use manager::{OrbManager, SpawnScheduler};
pub use orb::{Orb, OrbSnapshot, Wander};
pub use state::FieldState;
pub use tick::{TickInput, TickReport, tick};
