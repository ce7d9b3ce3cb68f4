//! [`Renderer`] over `wgpu`.
//!
//! The facade is immediate (set a uniform, draw, set a uniform, draw) while
//! wgpu records whole passes. The renderer bridges the two by recording:
//!
//! 1. Uniform writes update the current program's staging block.
//! 2. A draw snapshots that block (only if it changed since the previous
//!    snapshot) and records the program, buffer, vertex range and snapshot
//!    index.
//! 3. `present` uploads every snapshot into one uniform buffer at aligned
//!    offsets, encodes a single render pass that replays the draws with
//!    dynamic offsets, submits it and presents the surface texture.

use std::{iter, ops::Range, sync::Arc};

use wgpu::util::DeviceExt;
use winit::window::Window;

use super::{
    BufferId, ProgramId, RenderError, Renderer, ShaderStage, UniformLocation,
    reflect::{self, ProgramInterface, StageInterface},
    slots::Slots,
};
use crate::{
    context::GpuContext,
    data_structures::gear::VertexStrip,
    math::Mat4,
    pipelines::strip::{mk_strip_pipeline, mk_uniform_layout},
};

struct CompiledStage {
    interface: StageInterface,
    module: wgpu::ShaderModule,
}

#[derive(Default)]
struct PendingProgram {
    vertex: Option<CompiledStage>,
    fragment: Option<CompiledStage>,
    attributes: Vec<(u32, String)>,
}

struct Program {
    interface: ProgramInterface,
    pipeline: wgpu::RenderPipeline,
    uniform_layout: Option<wgpu::BindGroupLayout>,
    /// Values written since the last snapshot.
    staging: Vec<u8>,
    /// Index into the frame's snapshots, if `staging` has not changed since.
    snapshot: Option<usize>,
}

struct VertexBuffer {
    buffer: wgpu::Buffer,
    len: u64,
}

struct DrawCall {
    program: ProgramId,
    buffer: BufferId,
    vertices: Range<u32>,
    snapshot: Option<usize>,
}

#[derive(Default)]
struct Frame {
    draws: Vec<DrawCall>,
    snapshots: Vec<Vec<u8>>,
}

pub struct GpuRenderer {
    ctx: GpuContext,
    clear_colour: wgpu::Color,
    pending: PendingProgram,
    programs: Slots<Program>,
    current: Option<ProgramId>,
    buffers: Slots<VertexBuffer>,
    frame: Frame,
    uniform_buffer: Option<wgpu::Buffer>,
}

impl GpuRenderer {
    /// Open the graphics device for `window`.
    pub fn new(window: Arc<Window>, vsync: bool) -> Result<Self, RenderError> {
        let ctx = futures::executor::block_on(GpuContext::new(window, vsync))?;
        Ok(Self {
            ctx,
            clear_colour: wgpu::Color::BLACK,
            pending: PendingProgram::default(),
            programs: Slots::default(),
            current: None,
            buffers: Slots::default(),
            frame: Frame::default(),
            uniform_buffer: None,
        })
    }

    fn program(&self, id: ProgramId) -> Result<&Program, RenderError> {
        self.programs
            .get(id.0)
            .ok_or(RenderError::UnknownProgram(id))
    }

    fn current_program_mut(&mut self) -> Result<&mut Program, RenderError> {
        let id = self.current.ok_or(RenderError::NoProgram)?;
        self.programs
            .get_mut(id.0)
            .ok_or(RenderError::UnknownProgram(id))
    }

    fn write_uniform(
        &mut self,
        location: UniformLocation,
        found: super::UniformKind,
        bytes: &[u8],
    ) -> Result<(), RenderError> {
        if location.kind != found {
            return Err(RenderError::UniformKind {
                expected: location.kind,
                found,
            });
        }
        let program = self.current_program_mut()?;
        let start = location.offset as usize;
        let end = start + bytes.len();
        if end > program.staging.len() {
            return Err(RenderError::UnknownUniform(format!("at offset {start}")));
        }
        program.staging[start..end].copy_from_slice(bytes);
        program.snapshot = None;
        Ok(())
    }

    fn record_draw(&mut self, buffer: BufferId, vertices: Range<u32>) -> Result<(), RenderError> {
        let program_id = self.current.ok_or(RenderError::NoProgram)?;
        let vertex_buffer = self
            .buffers
            .get(buffer.0)
            .ok_or(RenderError::UnknownBuffer(buffer))?;
        let buffer_len = vertex_buffer.len;

        let snapshots = &mut self.frame.snapshots;
        let program = self
            .programs
            .get_mut(program_id.0)
            .ok_or(RenderError::UnknownProgram(program_id))?;

        let stride = u64::from(program.interface.stride.max(1));
        let len = (buffer_len / stride) as u32;
        if vertices.end > len {
            return Err(RenderError::StripOutOfRange {
                first: vertices.start,
                end: vertices.end,
                len,
            });
        }

        let snapshot = match program.snapshot {
            _ if program.staging.is_empty() => None,
            Some(index) => Some(index),
            None => {
                snapshots.push(program.staging.clone());
                let index = snapshots.len() - 1;
                program.snapshot = Some(index);
                Some(index)
            }
        };

        self.frame.draws.push(DrawCall {
            program: program_id,
            buffer,
            vertices,
            snapshot,
        });
        Ok(())
    }

    /// Upload all snapshots of the frame, growing the shared buffer if needed.
    /// Returns the distance between consecutive snapshots.
    fn upload_snapshots(&mut self) -> u64 {
        let alignment = u64::from(self.ctx.device.limits().min_uniform_buffer_offset_alignment);
        let largest = self
            .frame
            .snapshots
            .iter()
            .map(|s| s.len() as u64)
            .max()
            .unwrap_or(0);
        let stride = largest.div_ceil(alignment).max(1) * alignment;
        let needed = stride * self.frame.snapshots.len().max(1) as u64;

        let too_small = self
            .uniform_buffer
            .as_ref()
            .is_none_or(|buffer| buffer.size() < needed);
        if too_small {
            self.uniform_buffer = Some(self.ctx.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Uniform Snapshot Buffer"),
                size: needed.next_power_of_two(),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
        }

        if let Some(buffer) = &self.uniform_buffer {
            for (i, snapshot) in self.frame.snapshots.iter().enumerate() {
                self.ctx
                    .queue
                    .write_buffer(buffer, stride * i as u64, snapshot);
            }
        }
        stride
    }
}

impl Renderer for GpuRenderer {
    fn compile_shader(&mut self, source: &str, stage: ShaderStage) -> Result<(), RenderError> {
        let interface = match reflect::reflect_stage(source, stage) {
            Ok(interface) => interface,
            Err(e) => {
                log::error!("{e}");
                return Err(e);
            }
        };
        let module = self
            .ctx
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(match stage {
                    ShaderStage::Vertex => "Vertex Shader",
                    ShaderStage::Fragment => "Fragment Shader",
                }),
                source: wgpu::ShaderSource::Wgsl(source.to_owned().into()),
            });
        log::debug!("compiled {stage} stage, entry point `{}`", interface.entry_point);

        let compiled = Some(CompiledStage { interface, module });
        match stage {
            ShaderStage::Vertex => self.pending.vertex = compiled,
            ShaderStage::Fragment => self.pending.fragment = compiled,
        }
        Ok(())
    }

    fn bind_attribute(&mut self, slot: u32, name: &str) {
        self.pending.attributes.retain(|(s, _)| *s != slot);
        self.pending.attributes.push((slot, name.to_string()));
    }

    fn link_program(&mut self) -> Result<ProgramId, RenderError> {
        let pending = std::mem::take(&mut self.pending);
        let (Some(vertex), Some(fragment)) = (pending.vertex, pending.fragment) else {
            let e = RenderError::Link("both a vertex and a fragment stage are required".into());
            log::error!("{e}");
            return Err(e);
        };

        let interface =
            ProgramInterface::link(&vertex.interface, &fragment.interface, &pending.attributes)
                .inspect_err(|e| log::error!("{e}"))?;

        let uniform_size = interface.uniforms.size;
        let uniform_layout =
            (uniform_size > 0).then(|| mk_uniform_layout(&self.ctx.device, uniform_size));
        let pipeline = mk_strip_pipeline(
            &self.ctx.device,
            self.ctx.config.format,
            &interface,
            &vertex.module,
            &fragment.module,
            uniform_layout.as_ref(),
        );

        let id = ProgramId(self.programs.next_index());
        log::info!(
            "linked program {:?}: {} attributes, stride {} bytes, {} uniform bytes",
            id,
            interface.attributes.len(),
            interface.stride,
            uniform_size
        );
        self.programs.insert(Program {
            staging: vec![0; uniform_size as usize],
            interface,
            pipeline,
            uniform_layout,
            snapshot: None,
        });
        self.current = Some(id);
        Ok(id)
    }

    fn use_program(&mut self, program: ProgramId) -> Result<(), RenderError> {
        self.program(program)?;
        self.current = Some(program);
        Ok(())
    }

    fn uniform_location(
        &self,
        program: ProgramId,
        name: &str,
    ) -> Result<UniformLocation, RenderError> {
        self.program(program)?.interface.uniform(name)
    }

    fn set_uniform_vec4(
        &mut self,
        location: UniformLocation,
        value: &[f32; 4],
    ) -> Result<(), RenderError> {
        self.write_uniform(location, super::UniformKind::Vec4, bytemuck::cast_slice(value))
    }

    fn set_uniform_mat4(
        &mut self,
        location: UniformLocation,
        value: &Mat4,
    ) -> Result<(), RenderError> {
        self.write_uniform(location, super::UniformKind::Mat4, bytemuck::cast_slice(value))
    }

    fn upload_vertices(&mut self, bytes: &[u8]) -> Result<BufferId, RenderError> {
        let id = BufferId(self.buffers.next_index());
        let buffer = self
            .ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{id:?} Vertex Buffer")),
                contents: bytes,
                usage: wgpu::BufferUsages::VERTEX,
            });
        self.buffers.insert(VertexBuffer {
            buffer,
            len: bytes.len() as u64,
        });
        Ok(id)
    }

    fn draw_strip(&mut self, buffer: BufferId, strip: VertexStrip) -> Result<(), RenderError> {
        // An overflowing end is past every buffer and fails the range check
        let end = strip.first.saturating_add(strip.count);
        self.record_draw(buffer, strip.first..end)
    }

    fn draw_buffer(&mut self, buffer: BufferId) -> Result<(), RenderError> {
        let stride = {
            let id = self.current.ok_or(RenderError::NoProgram)?;
            u64::from(self.program(id)?.interface.stride.max(1))
        };
        let len = self
            .buffers
            .get(buffer.0)
            .ok_or(RenderError::UnknownBuffer(buffer))?
            .len;
        self.record_draw(buffer, 0..(len / stride) as u32)
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        if (width, height) != (self.ctx.config.width, self.ctx.config.height) {
            self.ctx.resize(width, height);
        }
    }

    fn clear(&mut self, colour: [f32; 4]) {
        self.clear_colour = wgpu::Color {
            r: f64::from(colour[0]),
            g: f64::from(colour[1]),
            b: f64::from(colour[2]),
            a: f64::from(colour[3]),
        };
    }

    fn present(&mut self) -> Result<(), RenderError> {
        let output = match self.ctx.surface.get_current_texture() {
            Ok(output) => output,
            // Reconfigure the surface if it's lost or outdated and skip this frame
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::warn!("surface lost or outdated, reconfiguring");
                self.ctx.reconfigure();
                self.end_frame();
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("timed out waiting for the next surface texture");
                self.end_frame();
                return Ok(());
            }
            Err(e) => {
                self.end_frame();
                return Err(RenderError::Surface(e.to_string()));
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let stride = self.upload_snapshots();
        let bind_groups: Vec<Option<wgpu::BindGroup>> = (0..self.programs.capacity() as u32)
            .map(|index| {
                let program = self.programs.get(index)?;
                let layout = program.uniform_layout.as_ref()?;
                let buffer = self.uniform_buffer.as_ref()?;
                Some(self.ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    layout,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                            buffer,
                            offset: 0,
                            size: wgpu::BufferSize::new(u64::from(program.interface.uniforms.size)),
                        }),
                    }],
                    label: Some("uniform_bind_group"),
                }))
            })
            .collect();

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_colour),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.ctx.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
                ..Default::default()
            });

            for draw in &self.frame.draws {
                let Some(program) = self.programs.get(draw.program.0) else {
                    continue;
                };
                let Some(vertex_buffer) = self.buffers.get(draw.buffer.0) else {
                    continue;
                };
                render_pass.set_pipeline(&program.pipeline);
                if let (Some(Some(bind_group)), Some(snapshot)) =
                    (bind_groups.get(draw.program.0 as usize), draw.snapshot)
                {
                    render_pass.set_bind_group(0, bind_group, &[(stride * snapshot as u64) as u32]);
                }
                render_pass.set_vertex_buffer(0, vertex_buffer.buffer.slice(..));
                render_pass.draw(draw.vertices.clone(), 0..1);
            }
        }

        self.ctx.queue.submit(iter::once(encoder.finish()));
        self.ctx.window.pre_present_notify();
        output.present();
        self.end_frame();
        Ok(())
    }

    fn release_buffer(&mut self, buffer: BufferId) {
        if let Some(released) = self.buffers.remove(buffer.0) {
            released.buffer.destroy();
            // The slot may be handed out again before this frame is presented
            self.frame.draws.retain(|draw| draw.buffer != buffer);
            log::debug!("released {buffer:?}");
        }
    }

    fn release_program(&mut self, program: ProgramId) {
        if self.programs.remove(program.0).is_some() {
            self.frame.draws.retain(|draw| draw.program != program);
            log::debug!("released {program:?}");
        }
        if self.current == Some(program) {
            self.current = None;
        }
    }
}

impl GpuRenderer {
    fn end_frame(&mut self) {
        self.frame.draws.clear();
        self.frame.snapshots.clear();
        for program in self.programs.iter_mut() {
            program.snapshot = None;
        }
    }
}
