//! Scene stack and frame loop.
//!
//! A [`Scene`] is a self-contained piece of visual behaviour: it owns the
//! geometry and shader program it created, draws itself once per frame and
//! raises its [`destroy`](Scene::destroy) flag when it wants to be removed.
//! The [`GameLoop`] owns a LIFO stack of scenes and only ever drives the top
//! one.
//!
//! # Lifecycle
//!
//! Every iteration of the loop performs, in order:
//! 1. refresh the cached window dimensions
//! 2. poll the termination signal; a close request ends the loop
//! 3. end the loop if the stack is empty
//! 4. if the top scene asked to be destroyed, pop and release it (ending the
//!    loop right away if that emptied the stack)
//! 5. otherwise draw the top scene exactly once
//!
//! Scenes are released synchronously when they are popped, so nothing they
//! own is touched afterwards.

use instant::Instant;

use crate::{
    platform::{InputEvents, WindowDimensions},
    renderer::{RenderError, Renderer},
};

/// Everything a scene gets to see while drawing one frame.
pub struct Frame<'a> {
    pub renderer: &'a mut dyn Renderer,
    /// Drawable size in physical pixels.
    pub width: u32,
    pub height: u32,
    /// Seconds since the loop started.
    pub now: f64,
}

/// A unit of visual behaviour managed by the [`GameLoop`].
pub trait Scene {
    /// Short name used in log messages.
    fn name(&self) -> &str {
        "scene"
    }

    /// Render one frame and present it.
    ///
    /// An error is fatal for this scene only: the loop logs it, pops the
    /// scene and releases it.
    fn draw(&mut self, frame: &mut Frame<'_>) -> Result<(), RenderError>;

    /// Whether the scene asks to be popped before its next draw.
    fn destroy(&self) -> bool;

    /// Give back the device resources owned by the scene.
    ///
    /// Called exactly once, right after the scene leaves the stack.
    fn release(self: Box<Self>, _renderer: &mut dyn Renderer) {}
}

/// The two states of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Done,
}

/// Drives the frame loop over a stack of scenes.
pub struct GameLoop<P, R> {
    platform: P,
    renderer: R,
    scenes: Vec<Box<dyn Scene>>,
    state: LoopState,
    started: Instant,
}

impl<P, R> GameLoop<P, R>
where
    P: WindowDimensions + InputEvents,
    R: Renderer,
{
    /// Create a running loop with `seed` as its only scene.
    pub fn new(platform: P, renderer: R, seed: Box<dyn Scene>) -> Self {
        log::info!("starting with scene `{}`", seed.name());
        Self {
            platform,
            renderer,
            scenes: vec![seed],
            state: LoopState::Running,
            started: Instant::now(),
        }
    }

    /// Put `scene` on top of the stack; it is drawn from the next iteration on.
    pub fn push(&mut self, scene: Box<dyn Scene>) {
        log::info!("pushing scene `{}`", scene.name());
        self.scenes.push(scene);
    }

    /// Construct a scene against the loop's renderer and push it.
    ///
    /// A failed construction is logged and nothing is pushed. Returns whether
    /// the scene made it onto the stack.
    pub fn push_with<F, E>(&mut self, constructor: F) -> bool
    where
        F: FnOnce(&mut dyn Renderer) -> Result<Box<dyn Scene>, E>,
        E: std::fmt::Display,
    {
        match constructor(&mut self.renderer) {
            Ok(scene) => {
                self.push(scene);
                true
            }
            Err(e) => {
                log::error!("scene construction failed: {e}");
                false
            }
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Number of scenes on the stack.
    pub fn depth(&self) -> usize {
        self.scenes.len()
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Run a single iteration and report the resulting state.
    ///
    /// Once the loop is [`LoopState::Done`] further calls do nothing.
    pub fn step(&mut self) -> LoopState {
        if self.state == LoopState::Done {
            return self.state;
        }

        self.platform.update_dimensions();

        if self.platform.poll_termination_signal() {
            log::info!("termination requested");
            self.state = LoopState::Done;
            return self.state;
        }

        let Some(top) = self.scenes.last_mut() else {
            self.state = LoopState::Done;
            return self.state;
        };

        if top.destroy() {
            self.pop_and_release();
        } else {
            let mut frame = Frame {
                renderer: &mut self.renderer,
                width: self.platform.width(),
                height: self.platform.height(),
                now: self.started.elapsed().as_secs_f64(),
            };
            if let Err(e) = top.draw(&mut frame) {
                log::error!("scene `{}` failed to draw: {e}", top.name());
                self.pop_and_release();
            }
        }

        if self.scenes.is_empty() {
            log::info!("scene stack is empty");
            self.state = LoopState::Done;
        }
        self.state
    }

    /// Iterate until the loop is done, then release whatever is still stacked.
    ///
    /// Hands the platform and renderer back to the caller.
    pub fn run(mut self) -> (P, R) {
        while self.step() == LoopState::Running {}
        self.shutdown()
    }

    /// Release every remaining scene, top first.
    pub fn shutdown(mut self) -> (P, R) {
        while !self.scenes.is_empty() {
            self.pop_and_release();
        }
        (self.platform, self.renderer)
    }

    fn pop_and_release(&mut self) {
        if let Some(scene) = self.scenes.pop() {
            log::info!("popping scene `{}`", scene.name());
            scene.release(&mut self.renderer);
        }
    }
}
