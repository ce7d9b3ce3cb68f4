//! Window and input collaborators.
//!
//! The frame loop only needs two small capabilities from the windowing
//! system: the current drawable size ([`WindowDimensions`]) and whether the
//! user asked to quit ([`InputEvents`]). [`WinitPlatform`] provides both on
//! top of `winit`, pumping the event loop once per poll instead of handing
//! control over to `run_app`.

use std::{sync::Arc, time::Duration};

use anyhow::Context as _;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    window::{Window, WindowAttributes, WindowId},
};

use crate::config::EngineConfig;

pub trait WindowDimensions {
    /// Re-read the drawable size from the window system.
    fn update_dimensions(&mut self);
    /// Width as of the last [`update_dimensions`](Self::update_dimensions).
    fn width(&self) -> u32;
    /// Height as of the last [`update_dimensions`](Self::update_dimensions).
    fn height(&self) -> u32;
}

pub trait InputEvents {
    /// Drain pending input and report whether a quit or close was observed.
    fn poll_termination_signal(&mut self) -> bool;
}

#[derive(Default)]
struct PlatformApp {
    attributes: Option<WindowAttributes>,
    window: Option<Arc<Window>>,
    create_error: Option<winit::error::OsError>,
    close_requested: bool,
}

impl ApplicationHandler for PlatformApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some(attributes) = self.attributes.take() else {
            return;
        };
        match event_loop.create_window(attributes) {
            Ok(window) => self.window = Some(Arc::new(window)),
            Err(e) => {
                self.create_error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => self.close_requested = true,
            WindowEvent::Resized(size) => log::debug!("window resized to {}x{}", size.width, size.height),
            _ => (),
        }
    }
}

// Test harnesses run off the main thread
#[cfg(all(feature = "integration-tests", target_os = "linux"))]
fn build_event_loop() -> Result<EventLoop<()>, winit::error::EventLoopError> {
    use winit::platform::wayland::EventLoopBuilderExtWayland;

    EventLoop::builder().with_any_thread(true).build()
}

#[cfg(all(feature = "integration-tests", target_os = "windows"))]
fn build_event_loop() -> Result<EventLoop<()>, winit::error::EventLoopError> {
    use winit::platform::windows::EventLoopBuilderExtWindows;

    EventLoop::builder().with_any_thread(true).build()
}

#[cfg(not(all(feature = "integration-tests", any(target_os = "linux", target_os = "windows"))))]
fn build_event_loop() -> Result<EventLoop<()>, winit::error::EventLoopError> {
    EventLoop::new()
}

/// A single `winit` window driven by pumping its event loop.
pub struct WinitPlatform {
    event_loop: EventLoop<()>,
    app: PlatformApp,
    window: Arc<Window>,
    size: PhysicalSize<u32>,
    exited: bool,
}

impl WinitPlatform {
    /// Open the main window described by `config`.
    pub fn new(config: &EngineConfig) -> anyhow::Result<Self> {
        let mut event_loop = build_event_loop().context("failed to create an event loop")?;

        let attributes = Window::default_attributes()
            .with_title(config.title.as_str())
            .with_inner_size(PhysicalSize::new(config.width, config.height))
            .with_resizable(config.resizable)
            .with_maximized(config.maximized);
        let mut app = PlatformApp {
            attributes: Some(attributes),
            ..Default::default()
        };

        // The window only exists once the loop has been resumed
        let window = loop {
            let status = event_loop.pump_app_events(Some(Duration::from_millis(10)), &mut app);
            if let Some(e) = app.create_error.take() {
                return Err(e).context("failed to create the main window");
            }
            if let Some(window) = &app.window {
                break window.clone();
            }
            if let PumpStatus::Exit(code) = status {
                anyhow::bail!("event loop exited with code {code} before a window was created");
            }
        };

        let size = window.inner_size();
        log::info!("window `{}` opened at {}x{}", config.title, size.width, size.height);
        Ok(Self {
            event_loop,
            app,
            window,
            size,
            exited: false,
        })
    }

    pub fn window(&self) -> Arc<Window> {
        self.window.clone()
    }
}

impl WindowDimensions for WinitPlatform {
    fn update_dimensions(&mut self) {
        self.size = self.window.inner_size();
    }

    fn width(&self) -> u32 {
        self.size.width
    }

    fn height(&self) -> u32 {
        self.size.height
    }
}

impl InputEvents for WinitPlatform {
    fn poll_termination_signal(&mut self) -> bool {
        if !self.exited {
            let status = self
                .event_loop
                .pump_app_events(Some(Duration::ZERO), &mut self.app);
            if let PumpStatus::Exit(code) = status {
                log::debug!("event loop exited with code {code}");
                self.exited = true;
            }
        }
        std::mem::take(&mut self.app.close_requested) || self.exited
    }
}
