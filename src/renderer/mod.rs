//! The rendering capability consumed by scenes.
//!
//! [`Renderer`] is a small, OpenGL-flavoured immediate interface: a scene
//! compiles its shader stages, binds attribute slots, links a program,
//! resolves uniform locations by name, uploads vertex data once, and then
//! issues strip draws every frame before presenting.
//!
//! - [`gpu::GpuRenderer`] implements it over `wgpu`
//! - [`reflect`] derives attribute layouts and uniform offsets from WGSL

pub mod gpu;
pub mod reflect;
mod slots;

use crate::{data_structures::gear::VertexStrip, math::Mat4};

/// The kind of a shader stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Handle to a linked shader program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u32);

/// Handle to an uploaded vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub u32);

/// The shape of a uniform value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    Vec4,
    Mat4,
}

impl UniformKind {
    /// Size of the value in bytes.
    pub fn size(self) -> u32 {
        match self {
            UniformKind::Vec4 => 16,
            UniformKind::Mat4 => 64,
        }
    }
}

/// Where a named uniform lives inside its program's uniform block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformLocation {
    pub offset: u32,
    pub kind: UniformKind,
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("{stage} shader failed to compile:\n{log}")]
    Compile { stage: ShaderStage, log: String },
    #[error("program failed to link: {0}")]
    Link(String),
    #[error("uniform `{0}` is not declared by the program")]
    UnknownUniform(String),
    #[error("uniform is a {expected:?} but a {found:?} was supplied")]
    UniformKind {
        expected: UniformKind,
        found: UniformKind,
    },
    #[error("no program is in use")]
    NoProgram,
    #[error("unknown program {0:?}")]
    UnknownProgram(ProgramId),
    #[error("unknown vertex buffer {0:?}")]
    UnknownBuffer(BufferId),
    #[error("strip {first}..{end} lies outside a buffer of {len} vertices")]
    StripOutOfRange { first: u32, end: u32, len: u32 },
    #[error("graphics device setup failed: {0}")]
    Device(String),
    #[error("surface error: {0}")]
    Surface(String),
}

/// Rendering operations available to scenes.
///
/// State follows the OpenGL model: uniform writes and draws apply to the
/// program most recently passed to [`use_program`](Self::use_program) (or
/// produced by [`link_program`](Self::link_program)), and draws are only
/// guaranteed to reach the screen after [`present`](Self::present).
pub trait Renderer {
    /// Compile one stage of the pending program.
    ///
    /// The returned error carries the compiler diagnostics.
    fn compile_shader(&mut self, source: &str, stage: ShaderStage) -> Result<(), RenderError>;

    /// Bind the vertex input called `name` to attribute `slot` of the pending program.
    fn bind_attribute(&mut self, slot: u32, name: &str);

    /// Link the pending stages and attribute bindings, and make the result current.
    fn link_program(&mut self) -> Result<ProgramId, RenderError>;

    /// Make a previously linked program current.
    fn use_program(&mut self, program: ProgramId) -> Result<(), RenderError>;

    /// Resolve the location of a named uniform of `program`.
    fn uniform_location(
        &self,
        program: ProgramId,
        name: &str,
    ) -> Result<UniformLocation, RenderError>;

    /// Set a 4-float uniform of the current program.
    fn set_uniform_vec4(
        &mut self,
        location: UniformLocation,
        value: &[f32; 4],
    ) -> Result<(), RenderError>;

    /// Set a 16-float (column-major matrix) uniform of the current program.
    fn set_uniform_mat4(
        &mut self,
        location: UniformLocation,
        value: &Mat4,
    ) -> Result<(), RenderError>;

    /// Upload vertex data laid out as the current program's attributes.
    fn upload_vertices(&mut self, bytes: &[u8]) -> Result<BufferId, RenderError>;

    /// Draw the vertices `strip.first..strip.first + strip.count` as a triangle strip.
    fn draw_strip(&mut self, buffer: BufferId, strip: VertexStrip) -> Result<(), RenderError>;

    /// Draw every vertex of `buffer` as one triangle strip.
    fn draw_buffer(&mut self, buffer: BufferId) -> Result<(), RenderError>;

    /// Resize the drawable area.
    fn set_viewport(&mut self, width: u32, height: u32);

    /// Colour the next presented frame is cleared to.
    fn clear(&mut self, colour: [f32; 4]);

    /// Submit the recorded frame and swap buffers.
    fn present(&mut self) -> Result<(), RenderError>;

    fn release_buffer(&mut self, buffer: BufferId);

    fn release_program(&mut self, program: ProgramId);
}
