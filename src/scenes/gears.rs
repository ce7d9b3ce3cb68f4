//! Three meshing gears, lit by a single directional light.

use cgmath::Deg;

use crate::{
    config::EngineConfig,
    data_structures::gear::{Gear, GearError, GearParams},
    flow::{Frame, Scene},
    math::{self, IDENTITY, Mat4},
    renderer::{ProgramId, RenderError, Renderer, ShaderStage, UniformLocation},
    timing::{FrameTimer, GearAnimation},
};

const VERTEX_SHADER: &str = include_str!("gears_vertex.wgsl");
const FRAGMENT_SHADER: &str = include_str!("gears_fragment.wgsl");

const LIGHT_SOURCE_POSITION: [f32; 4] = [5.0, 5.0, 10.0, 1.0];
/// Degrees about x, y and z.
const VIEW_ROTATION: [f32; 3] = [20.0, 30.0, 0.0];
const VIEW_DISTANCE: f32 = 20.0;
const FIELD_OF_VIEW: f32 = 60.0;
const NEAR: f32 = 1.0;
const FAR: f32 = 1024.0;

/// One wheel of the train.
struct GearSpec {
    params: GearParams,
    x: f32,
    y: f32,
    /// The wheel turns at `speed * angle + phase` degrees.
    speed: f32,
    phase: f32,
    color: [f32; 4],
}

const GEAR_TRAIN: [GearSpec; 3] = [
    GearSpec {
        params: GearParams {
            inner_radius: 1.0,
            outer_radius: 4.0,
            width: 1.0,
            teeth: 20,
            tooth_depth: 0.7,
        },
        x: -3.0,
        y: -2.0,
        speed: 1.0,
        phase: 0.0,
        color: [0.8, 0.1, 0.0, 1.0],
    },
    GearSpec {
        params: GearParams {
            inner_radius: 0.5,
            outer_radius: 2.0,
            width: 2.0,
            teeth: 10,
            tooth_depth: 0.7,
        },
        x: 3.1,
        y: -2.0,
        speed: -2.0,
        phase: -9.0,
        color: [0.0, 0.8, 0.2, 1.0],
    },
    GearSpec {
        params: GearParams {
            inner_radius: 1.3,
            outer_radius: 2.0,
            width: 0.5,
            teeth: 10,
            tooth_depth: 0.7,
        },
        x: -3.1,
        y: 4.2,
        speed: -2.0,
        phase: -25.0,
        color: [0.2, 0.2, 1.0, 1.0],
    },
];

struct GearUniforms {
    model_view_projection: UniformLocation,
    normal_matrix: UniformLocation,
    light_source_position: UniformLocation,
    material_color: UniformLocation,
}

impl GearUniforms {
    fn resolve(renderer: &dyn Renderer, program: ProgramId) -> Result<Self, RenderError> {
        Ok(Self {
            model_view_projection: renderer.uniform_location(program, "model_view_projection")?,
            normal_matrix: renderer.uniform_location(program, "normal_matrix")?,
            light_source_position: renderer.uniform_location(program, "light_source_position")?,
            material_color: renderer.uniform_location(program, "material_color")?,
        })
    }
}

pub struct GearsScene {
    program: ProgramId,
    uniforms: GearUniforms,
    gears: Vec<Gear>,
    projection: Mat4,
    /// Drawable size the projection was built for.
    size: (u32, u32),
    animation: GearAnimation,
    timer: FrameTimer,
    clear_colour: [f32; 4],
}

impl GearsScene {
    /// Compile the lighting program and upload the three gear meshes.
    ///
    /// Anything already created is released again if a later step fails.
    pub fn new(renderer: &mut dyn Renderer, config: &EngineConfig) -> Result<Self, GearError> {
        renderer.compile_shader(VERTEX_SHADER, ShaderStage::Vertex)?;
        renderer.compile_shader(FRAGMENT_SHADER, ShaderStage::Fragment)?;
        renderer.bind_attribute(0, "position");
        renderer.bind_attribute(1, "normal");
        let program = renderer.link_program()?;

        let uniforms = match GearUniforms::resolve(renderer, program).and_then(|uniforms| {
            renderer.set_uniform_vec4(uniforms.light_source_position, &LIGHT_SOURCE_POSITION)?;
            Ok(uniforms)
        }) {
            Ok(uniforms) => uniforms,
            Err(e) => {
                renderer.release_program(program);
                return Err(e.into());
            }
        };

        let mut gears = Vec::with_capacity(GEAR_TRAIN.len());
        for spec in &GEAR_TRAIN {
            match Gear::new(renderer, spec.params) {
                Ok(gear) => gears.push(gear),
                Err(e) => {
                    for gear in gears {
                        gear.release(renderer);
                    }
                    renderer.release_program(program);
                    return Err(e);
                }
            }
        }

        Ok(Self {
            program,
            uniforms,
            gears,
            projection: IDENTITY,
            size: (0, 0),
            animation: GearAnimation::default(),
            timer: FrameTimer::new(config.fps_report_period),
            clear_colour: config.clear_colour,
        })
    }

    pub fn gears(&self) -> &[Gear] {
        &self.gears
    }

    /// Current rotation of the first gear, in degrees.
    pub fn angle(&self) -> f32 {
        self.animation.angle
    }

    pub fn projection(&self) -> &Mat4 {
        &self.projection
    }

    /// Rebuild the projection when the drawable size changed.
    fn reshape(&mut self, renderer: &mut dyn Renderer, width: u32, height: u32) {
        if (width, height) == self.size || width == 0 || height == 0 {
            return;
        }
        let aspect = width as f32 / height as f32;
        match math::build_perspective(&mut self.projection, Deg(FIELD_OF_VIEW), aspect, NEAR, FAR) {
            Ok(()) => {
                self.size = (width, height);
                renderer.set_viewport(width, height);
            }
            Err(e) => log::warn!("keeping the previous projection: {e}"),
        }
    }

    fn view(&self) -> Mat4 {
        let mut view = IDENTITY;
        math::translate(&mut view, 0.0, 0.0, -VIEW_DISTANCE);
        math::rotate(&mut view, Deg(VIEW_ROTATION[0]), 1.0, 0.0, 0.0);
        math::rotate(&mut view, Deg(VIEW_ROTATION[1]), 0.0, 1.0, 0.0);
        math::rotate(&mut view, Deg(VIEW_ROTATION[2]), 0.0, 0.0, 1.0);
        view
    }

    fn draw_gear(
        &self,
        renderer: &mut dyn Renderer,
        gear: &Gear,
        spec: &GearSpec,
        view: &Mat4,
    ) -> Result<(), RenderError> {
        let angle = spec.speed * self.animation.angle + spec.phase;

        let mut model_view = *view;
        math::translate(&mut model_view, spec.x, spec.y, 0.0);
        math::rotate(&mut model_view, Deg(angle), 0.0, 0.0, 1.0);

        let mut model_view_projection = self.projection;
        math::multiply(&mut model_view_projection, &model_view);
        renderer.set_uniform_mat4(self.uniforms.model_view_projection, &model_view_projection)?;

        // Inverse transpose of the model-view matrix
        let mut normal_matrix = model_view;
        math::invert_rigid(&mut normal_matrix);
        math::transpose(&mut normal_matrix);
        renderer.set_uniform_mat4(self.uniforms.normal_matrix, &normal_matrix)?;

        renderer.set_uniform_vec4(self.uniforms.material_color, &spec.color)?;
        gear.draw(renderer)
    }
}

impl Scene for GearsScene {
    fn name(&self) -> &str {
        "gears"
    }

    fn draw(&mut self, frame: &mut Frame<'_>) -> Result<(), RenderError> {
        self.reshape(frame.renderer, frame.width, frame.height);

        let renderer = &mut *frame.renderer;
        renderer.clear(self.clear_colour);
        renderer.use_program(self.program)?;

        let view = self.view();
        for (gear, spec) in self.gears.iter().zip(&GEAR_TRAIN) {
            self.draw_gear(renderer, gear, spec, &view)?;
        }
        renderer.present()?;

        let tick = self.timer.tick(frame.now);
        self.animation.advance(tick.dt);
        if let Some(report) = tick.report {
            log::info!("{report}");
        }
        Ok(())
    }

    fn destroy(&self) -> bool {
        false
    }

    fn release(self: Box<Self>, renderer: &mut dyn Renderer) {
        let GearsScene { program, gears, .. } = *self;
        for gear in gears {
            gear.release(renderer);
        }
        renderer.release_program(program);
    }
}
