use crate::{
    config::EngineConfig,
    flow::{Frame, Scene},
    renderer::{BufferId, ProgramId, RenderError, Renderer, ShaderStage},
};

const VERTEX_SHADER: &str = include_str!("triangle_vertex.wgsl");
const FRAGMENT_SHADER: &str = include_str!("triangle_fragment.wgsl");

/// Clip-space corners, counter-clockwise.
const VERTICES: [[f32; 2]; 3] = [[0.0, 0.8], [-0.8, -0.8], [0.8, -0.8]];

/// A white triangle, drawn as one strip over its whole vertex buffer.
pub struct TriangleScene {
    program: ProgramId,
    buffer: BufferId,
    size: (u32, u32),
    clear_colour: [f32; 4],
}

impl TriangleScene {
    pub fn new(renderer: &mut dyn Renderer, config: &EngineConfig) -> Result<Self, RenderError> {
        renderer.compile_shader(VERTEX_SHADER, ShaderStage::Vertex)?;
        renderer.compile_shader(FRAGMENT_SHADER, ShaderStage::Fragment)?;
        renderer.bind_attribute(0, "position");
        let program = renderer.link_program()?;
        let buffer = match renderer.upload_vertices(bytemuck::cast_slice(&VERTICES)) {
            Ok(buffer) => buffer,
            Err(e) => {
                renderer.release_program(program);
                return Err(e);
            }
        };
        Ok(Self {
            program,
            buffer,
            size: (0, 0),
            clear_colour: config.clear_colour,
        })
    }
}

impl Scene for TriangleScene {
    fn name(&self) -> &str {
        "triangle"
    }

    fn draw(&mut self, frame: &mut Frame<'_>) -> Result<(), RenderError> {
        if (frame.width, frame.height) != self.size {
            self.size = (frame.width, frame.height);
            frame.renderer.set_viewport(frame.width, frame.height);
        }
        frame.renderer.clear(self.clear_colour);
        frame.renderer.use_program(self.program)?;
        frame.renderer.draw_buffer(self.buffer)?;
        frame.renderer.present()
    }

    fn destroy(&self) -> bool {
        false
    }

    fn release(self: Box<Self>, renderer: &mut dyn Renderer) {
        renderer.release_buffer(self.buffer);
        renderer.release_program(self.program);
    }
}
