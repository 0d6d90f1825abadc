//! Render read interface
//!
//! Turns the simulation into flat per-orb instances. Nothing here mutates
//! the field.

pub mod instance;

pub use instance::{OrbInstance, extract_instances};
