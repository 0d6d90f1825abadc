//! Orb Field entry point
//!
//! Handles platform-specific initialization. On the web the page drives the
//! field through [`OrbFieldHandle`]; natively a headless run logs tick reports.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_field {
    use glam::Vec2;
    use wasm_bindgen::prelude::*;

    use orb_field::Settings;
    use orb_field::renderer::extract_instances;
    use orb_field::sim::{FieldState, TickInput, TickReport, Viewport, tick};

    /// One orb field, owned by the page's animation loop.
    ///
    /// Every method runs synchronously between animation frames.
    #[wasm_bindgen]
    pub struct OrbFieldHandle {
        state: FieldState,
        pointer: Option<Vec2>,
        paused: bool,
        visible: bool,
        last_report: TickReport,
    }

    #[wasm_bindgen]
    impl OrbFieldHandle {
        /// `settings_json` may be empty for defaults
        #[wasm_bindgen(constructor)]
        pub fn new(width: f32, height: f32, device_pixel_ratio: f32, seed: u32, settings_json: &str) -> Self {
            let settings = if settings_json.trim().is_empty() {
                Settings::default()
            } else {
                Settings::from_json(settings_json).unwrap_or_else(|e| {
                    log::warn!("Invalid settings JSON ({e}), using defaults");
                    Settings::default()
                })
            };
            let viewport = Viewport::new(width, height, device_pixel_ratio);
            log::info!("Orb field {}x{} (dpr {}) seed {}", width, height, device_pixel_ratio, seed);
            Self {
                state: FieldState::new(viewport, settings, seed as u64),
                pointer: None,
                paused: false,
                visible: true,
                last_report: TickReport::default(),
            }
        }

        pub fn resize(&mut self, width: f32, height: f32, device_pixel_ratio: f32) {
            self.state.resize(Viewport::new(width, height, device_pixel_ratio));
        }

        pub fn set_pointer(&mut self, x: f32, y: f32) {
            self.pointer = Some(Vec2::new(x, y));
        }

        pub fn clear_pointer(&mut self) {
            self.pointer = None;
        }

        pub fn set_paused(&mut self, paused: bool) {
            self.paused = paused;
        }

        pub fn set_visible(&mut self, visible: bool) {
            self.visible = visible;
        }

        /// Advance one animation frame; returns the live orb count
        pub fn tick(&mut self, now: f64) -> usize {
            let input = TickInput {
                now,
                pointer: self.pointer,
                visible: self.visible,
                paused: self.paused,
            };
            self.last_report = tick(&mut self.state, &input);
            self.last_report.live
        }

        pub fn create_orb(&mut self, x: f32, y: f32, z: f32, size: u32, now: f64) -> Option<u32> {
            self.state.create_orb(x, y, z, size, now)
        }

        pub fn delete_orb(&mut self, id: u32) -> bool {
            self.state.delete_orb(id)
        }

        pub fn spawn_burst(&mut self, x: f32, y: f32, now: f64) -> usize {
            self.state.spawn_burst(Vec2::new(x, y), now)
        }

        /// Flattened [`orb_field::renderer::OrbInstance`] lanes, back to front
        pub fn instances(&self, parallax_x: f32, parallax_y: f32, now: f64) -> js_sys::Float32Array {
            let instances = extract_instances(&self.state, Vec2::new(parallax_x, parallax_y), now);
            js_sys::Float32Array::from(bytemuck::cast_slice::<_, f32>(&instances))
        }

        pub fn snapshot_json(&self) -> String {
            serde_json::to_string(&self.state.snapshot()).unwrap_or_default()
        }

        pub fn grid_json(&self) -> String {
            serde_json::to_string(self.state.grid_config()).unwrap_or_default()
        }

        pub fn report_json(&self) -> String {
            serde_json::to_string(&self.last_report).unwrap_or_default()
        }

        /// Hover lookup: `[x, y, z, flags]`, empty when off the grid
        pub fn cell_at(&self, x: f32, y: f32, layer: f32) -> Vec<i32> {
            self.state
                .cell_at_pixel(x, y, layer)
                .map(|(c, flags)| vec![c.x, c.y, c.z, flags as i32])
                .unwrap_or_default()
        }
    }

    pub fn init() {
        console_error_panic_hook::set_once();
        if let Err(e) = console_log::init_with_level(log::Level::Info) {
            web_log(&format!("Logger init failed: {e}"));
        }
        log::info!("Orb field module loaded");
    }

    #[wasm_bindgen]
    extern "C" {
        #[wasm_bindgen(js_namespace = console, js_name = log)]
        fn web_log(s: &str);
    }
}

#[cfg(target_arch = "wasm32")]
pub use wasm_field::OrbFieldHandle;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_main() {
    wasm_field::init();
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Orb field (native) starting...");
    log::info!("Native mode runs headless - build for wasm32 to draw the field");

    let settings = match std::env::args().nth(1) {
        Some(path) => orb_field::Settings::load(std::path::Path::new(&path)),
        None => orb_field::Settings::default(),
    };
    headless_run(settings, 10.0);
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

/// Burst in the middle of a 1280x720 field, a pointer sweeping across it and
/// continuous spawning, at a steady 60 Hz
#[cfg(not(target_arch = "wasm32"))]
fn headless_run(settings: orb_field::Settings, seconds: f64) {
    use glam::Vec2;
    use orb_field::consts::HEADLESS_FRAME_MS;
    use orb_field::sim::{FieldState, TickInput, Viewport, tick};

    let viewport = Viewport::new(1280.0, 720.0, 1.0);
    let mut state = FieldState::new(viewport, settings, 0x0ab5_eed);
    let center = viewport.center();
    state.spawn_burst(center, 0.0);

    let frames = (seconds * 1000.0 / HEADLESS_FRAME_MS) as u64;
    for frame in 0..frames {
        let now = frame as f64 * HEADLESS_FRAME_MS;
        let sweep = (frame % 240) as f32 / 240.0;
        let input = TickInput {
            now,
            pointer: Some(Vec2::new(sweep * viewport.width, center.y)),
            ..Default::default()
        };
        let report = tick(&mut state, &input);
        if frame % 60 == 0 {
            match serde_json::to_string(&report) {
                Ok(json) => log::info!("{json}"),
                Err(e) => log::warn!("Report serialization failed: {e}"),
            }
        }
    }
    log::info!("Finished {} frames with {} live orbs", frames, state.orbs().len());
}
