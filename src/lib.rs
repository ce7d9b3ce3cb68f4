//! homd
//!
//! A minimal real-time rendering harness: a frame loop driving a stack of
//! interchangeable scenes, a small column-major 4×4 transform library and a
//! procedural gear generator that exercises the pipeline.
//!
//! High-level modules
//! - `config`: engine settings and their environment overrides
//! - `context`: GPU surface, device and queue owned by the renderer
//! - `data_structures`: gear meshes and the depth attachment
//! - `flow`: the `Scene` trait and the `GameLoop` over the scene stack
//! - `math`: flat 16-float transform matrices
//! - `pipelines`: render pipeline construction for linked programs
//! - `platform`: window and input collaborators backed by winit
//! - `renderer`: the `Renderer` facade, its wgpu implementation and shader reflection
//! - `scenes`: the gears and triangle scenes
//! - `timing`: frame timer and gear animation state
//!

pub mod config;
pub mod context;
pub mod data_structures;
pub mod flow;
pub mod math;
pub mod pipelines;
pub mod platform;
pub mod renderer;
pub mod scenes;
pub mod timing;

use anyhow::Context as _;

use crate::{
    config::EngineConfig,
    flow::GameLoop,
    platform::WinitPlatform,
    renderer::gpu::GpuRenderer,
};

/// Open the window, push the configured seed scene and run until the stack
/// empties or the window is closed.
pub fn run(config: EngineConfig) -> anyhow::Result<()> {
    if let Err(e) = env_logger::try_init() {
        println!("Warning: Could not initialize logger: {}", e);
    };

    let platform = WinitPlatform::new(&config)?;
    let mut renderer =
        GpuRenderer::new(platform.window(), config.vsync).context("cannot create the renderer")?;

    let seed = match scenes::build(config.scene, &mut renderer, &config) {
        Ok(scene) => scene,
        Err(e) => {
            log::error!("scene construction failed: {e:#}");
            return Err(e.context(format!("cannot construct the `{}` scene", config.scene)));
        }
    };

    GameLoop::new(platform, renderer, seed).run();
    log::info!("bye");
    Ok(())
}
