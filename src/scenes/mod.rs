//! Scenes shipped with the engine.
//!
//! - [`GearsScene`]: three animated, lit gears
//! - [`TriangleScene`]: a flat white triangle, useful to check a new setup

mod gears;
mod triangle;

pub use gears::GearsScene;
pub use triangle::TriangleScene;

use crate::{
    config::{EngineConfig, SceneChoice},
    flow::Scene,
    renderer::Renderer,
};

/// Construct the scene selected by `choice`.
pub fn build(
    choice: SceneChoice,
    renderer: &mut dyn Renderer,
    config: &EngineConfig,
) -> anyhow::Result<Box<dyn Scene>> {
    let scene: Box<dyn Scene> = match choice {
        SceneChoice::Gears => Box::new(GearsScene::new(renderer, config)?),
        SceneChoice::Triangle => Box::new(TriangleScene::new(renderer, config)?),
    };
    Ok(scene)
}
