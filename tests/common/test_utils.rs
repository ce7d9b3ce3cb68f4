#![allow(dead_code)]

use std::{cell::RefCell, rc::Rc};

use homd::{
    data_structures::gear::VertexStrip,
    flow::{Frame, Scene},
    math::Mat4,
    platform::{InputEvents, WindowDimensions},
    renderer::{
        BufferId, ProgramId, RenderError, Renderer, ShaderStage, UniformKind, UniformLocation,
        reflect::{self, ProgramInterface, StageInterface},
    },
};

pub(crate) const EPSILON: f32 = 1e-5;

pub(crate) fn assert_mat_eq(actual: &Mat4, expected: &Mat4) {
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!(
            (a - e).abs() < EPSILON,
            "element {i} differs: {a} != {e}\nactual:   {actual:?}\nexpected: {expected:?}"
        );
    }
}

/// A facade call as seen by [`RecordingRenderer`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Compile(ShaderStage),
    BindAttribute(u32, String),
    Link(ProgramId),
    UseProgram(ProgramId),
    SetVec4(UniformLocation, [f32; 4]),
    SetMat4(UniformLocation, Mat4),
    Upload(BufferId, usize),
    DrawStrip(BufferId, VertexStrip),
    DrawBuffer(BufferId),
    Viewport(u32, u32),
    Clear([f32; 4]),
    Present,
    ReleaseBuffer(BufferId),
    ReleaseProgram(ProgramId),
}

/// A headless [`Renderer`] that records every call.
///
/// Shader stages are reflected with the real WGSL front-end, so uniform and
/// attribute names used by scenes are checked against their shaders.
#[derive(Default)]
pub(crate) struct RecordingRenderer {
    pub(crate) calls: Vec<Call>,
    pending: (Option<StageInterface>, Option<StageInterface>),
    bindings: Vec<(u32, String)>,
    programs: Vec<Option<ProgramInterface>>,
    buffers: Vec<Option<usize>>,
    current: Option<ProgramId>,
    /// Make every upload fail with this many uploads still succeeding first.
    pub(crate) fail_upload_after: Option<usize>,
}

impl RecordingRenderer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn presents(&self) -> usize {
        self.calls.iter().filter(|c| **c == Call::Present).count()
    }

    pub(crate) fn live_buffers(&self) -> usize {
        self.buffers.iter().flatten().count()
    }

    pub(crate) fn live_programs(&self) -> usize {
        self.programs.iter().flatten().count()
    }

    /// Calls of the last completed frame, present excluded.
    pub(crate) fn last_frame(&self) -> &[Call] {
        let mut presents = self
            .calls
            .iter()
            .enumerate()
            .filter(|(_, c)| **c == Call::Present)
            .map(|(i, _)| i)
            .rev();
        match (presents.next(), presents.next()) {
            (Some(end), Some(start)) => &self.calls[start + 1..end],
            (Some(end), None) => &self.calls[..end],
            _ => &[],
        }
    }

    fn buffer_len(&self, buffer: BufferId) -> Result<usize, RenderError> {
        self.buffers
            .get(buffer.0 as usize)
            .copied()
            .flatten()
            .ok_or(RenderError::UnknownBuffer(buffer))
    }

    fn stride(&self) -> Result<usize, RenderError> {
        let id = self.current.ok_or(RenderError::NoProgram)?;
        let program = self
            .programs
            .get(id.0 as usize)
            .and_then(Option::as_ref)
            .ok_or(RenderError::UnknownProgram(id))?;
        Ok(program.stride.max(1) as usize)
    }
}

impl Renderer for RecordingRenderer {
    fn compile_shader(&mut self, source: &str, stage: ShaderStage) -> Result<(), RenderError> {
        self.calls.push(Call::Compile(stage));
        let interface = reflect::reflect_stage(source, stage)?;
        match stage {
            ShaderStage::Vertex => self.pending.0 = Some(interface),
            ShaderStage::Fragment => self.pending.1 = Some(interface),
        }
        Ok(())
    }

    fn bind_attribute(&mut self, slot: u32, name: &str) {
        self.calls.push(Call::BindAttribute(slot, name.to_string()));
        self.bindings.push((slot, name.to_string()));
    }

    fn link_program(&mut self) -> Result<ProgramId, RenderError> {
        let (vertex, fragment) = std::mem::take(&mut self.pending);
        let bindings = std::mem::take(&mut self.bindings);
        let (Some(vertex), Some(fragment)) = (vertex, fragment) else {
            return Err(RenderError::Link("missing stage".to_string()));
        };
        let interface = ProgramInterface::link(&vertex, &fragment, &bindings)?;
        let id = ProgramId(self.programs.len() as u32);
        self.programs.push(Some(interface));
        self.current = Some(id);
        self.calls.push(Call::Link(id));
        Ok(id)
    }

    fn use_program(&mut self, program: ProgramId) -> Result<(), RenderError> {
        self.calls.push(Call::UseProgram(program));
        match self.programs.get(program.0 as usize) {
            Some(Some(_)) => {
                self.current = Some(program);
                Ok(())
            }
            _ => Err(RenderError::UnknownProgram(program)),
        }
    }

    fn uniform_location(
        &self,
        program: ProgramId,
        name: &str,
    ) -> Result<UniformLocation, RenderError> {
        self.programs
            .get(program.0 as usize)
            .and_then(Option::as_ref)
            .ok_or(RenderError::UnknownProgram(program))?
            .uniform(name)
    }

    fn set_uniform_vec4(
        &mut self,
        location: UniformLocation,
        value: &[f32; 4],
    ) -> Result<(), RenderError> {
        self.current.ok_or(RenderError::NoProgram)?;
        if location.kind != UniformKind::Vec4 {
            return Err(RenderError::UniformKind {
                expected: location.kind,
                found: UniformKind::Vec4,
            });
        }
        self.calls.push(Call::SetVec4(location, *value));
        Ok(())
    }

    fn set_uniform_mat4(
        &mut self,
        location: UniformLocation,
        value: &Mat4,
    ) -> Result<(), RenderError> {
        self.current.ok_or(RenderError::NoProgram)?;
        if location.kind != UniformKind::Mat4 {
            return Err(RenderError::UniformKind {
                expected: location.kind,
                found: UniformKind::Mat4,
            });
        }
        self.calls.push(Call::SetMat4(location, *value));
        Ok(())
    }

    fn upload_vertices(&mut self, bytes: &[u8]) -> Result<BufferId, RenderError> {
        if let Some(remaining) = self.fail_upload_after.as_mut() {
            if *remaining == 0 {
                return Err(RenderError::Device("out of memory".to_string()));
            }
            *remaining -= 1;
        }
        let id = BufferId(self.buffers.len() as u32);
        self.buffers.push(Some(bytes.len()));
        self.calls.push(Call::Upload(id, bytes.len()));
        Ok(id)
    }

    fn draw_strip(&mut self, buffer: BufferId, strip: VertexStrip) -> Result<(), RenderError> {
        let len = (self.buffer_len(buffer)? / self.stride()?) as u32;
        let end = strip.first.saturating_add(strip.count);
        if end > len {
            return Err(RenderError::StripOutOfRange {
                first: strip.first,
                end,
                len,
            });
        }
        self.calls.push(Call::DrawStrip(buffer, strip));
        Ok(())
    }

    fn draw_buffer(&mut self, buffer: BufferId) -> Result<(), RenderError> {
        self.buffer_len(buffer)?;
        self.stride()?;
        self.calls.push(Call::DrawBuffer(buffer));
        Ok(())
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.calls.push(Call::Viewport(width, height));
    }

    fn clear(&mut self, colour: [f32; 4]) {
        self.calls.push(Call::Clear(colour));
    }

    fn present(&mut self) -> Result<(), RenderError> {
        self.calls.push(Call::Present);
        Ok(())
    }

    fn release_buffer(&mut self, buffer: BufferId) {
        if let Some(slot) = self.buffers.get_mut(buffer.0 as usize) {
            assert!(slot.take().is_some(), "{buffer:?} released twice");
        }
        self.calls.push(Call::ReleaseBuffer(buffer));
    }

    fn release_program(&mut self, program: ProgramId) {
        if let Some(slot) = self.programs.get_mut(program.0 as usize) {
            assert!(slot.take().is_some(), "{program:?} released twice");
        }
        if self.current == Some(program) {
            self.current = None;
        }
        self.calls.push(Call::ReleaseProgram(program));
    }
}

/// A window of fixed (but adjustable) size whose close request arrives on a
/// chosen poll.
pub(crate) struct ScriptedPlatform {
    size: (u32, u32),
    cached: (u32, u32),
    polls: usize,
    /// The 1-based poll that reports a close request.
    pub(crate) close_on_poll: Option<usize>,
    pub(crate) dimension_updates: usize,
}

impl ScriptedPlatform {
    pub(crate) fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            cached: (0, 0),
            polls: 0,
            close_on_poll: None,
            dimension_updates: 0,
        }
    }

    /// Resize the window; visible after the next dimension update.
    pub(crate) fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    pub(crate) fn polls(&self) -> usize {
        self.polls
    }
}

impl WindowDimensions for ScriptedPlatform {
    fn update_dimensions(&mut self) {
        self.dimension_updates += 1;
        self.cached = self.size;
    }

    fn width(&self) -> u32 {
        self.cached.0
    }

    fn height(&self) -> u32 {
        self.cached.1
    }
}

impl InputEvents for ScriptedPlatform {
    fn poll_termination_signal(&mut self) -> bool {
        self.polls += 1;
        self.close_on_poll == Some(self.polls)
    }
}

pub(crate) type EventLog = Rc<RefCell<Vec<String>>>;

/// A scene that logs what happens to it and whose destroy flag is shared with
/// the test.
pub(crate) struct ProbeScene {
    name: &'static str,
    log: EventLog,
    pub(crate) destroy: Rc<RefCell<bool>>,
    /// Fail the draw with this 1-based number.
    pub(crate) fail_on_draw: Option<usize>,
    draws: usize,
}

impl ProbeScene {
    pub(crate) fn new(name: &'static str, log: &EventLog) -> Self {
        Self {
            name,
            log: log.clone(),
            destroy: Rc::new(RefCell::new(false)),
            fail_on_draw: None,
            draws: 0,
        }
    }

    pub(crate) fn destroy_flag(&self) -> Rc<RefCell<bool>> {
        self.destroy.clone()
    }
}

impl Scene for ProbeScene {
    fn name(&self) -> &str {
        self.name
    }

    fn draw(&mut self, frame: &mut Frame<'_>) -> Result<(), RenderError> {
        self.draws += 1;
        self.log
            .borrow_mut()
            .push(format!("{}.draw {}x{}", self.name, frame.width, frame.height));
        if self.fail_on_draw == Some(self.draws) {
            return Err(RenderError::NoProgram);
        }
        frame.renderer.present()
    }

    fn destroy(&self) -> bool {
        *self.destroy.borrow()
    }

    fn release(self: Box<Self>, _renderer: &mut dyn Renderer) {
        self.log.borrow_mut().push(format!("{}.release", self.name));
    }
}
