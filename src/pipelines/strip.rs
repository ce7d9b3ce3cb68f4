use crate::{
    data_structures::texture::DepthTexture,
    renderer::reflect::{AttributeFormat, ProgramInterface},
};

fn vertex_format(format: AttributeFormat) -> wgpu::VertexFormat {
    match format {
        AttributeFormat::Float32 => wgpu::VertexFormat::Float32,
        AttributeFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
        AttributeFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
        AttributeFormat::Float32x4 => wgpu::VertexFormat::Float32x4,
    }
}

/// Layout of a program's single uniform block, bound with a dynamic offset
/// so every draw of a frame can use its own snapshot of the values.
pub fn mk_uniform_layout(device: &wgpu::Device, size: u32) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: true,
                min_binding_size: wgpu::BufferSize::new(u64::from(size)),
            },
            count: None,
        }],
        label: Some("uniform_bind_group_layout"),
    })
}

/// Build the triangle-strip pipeline for a linked program.
pub fn mk_strip_pipeline(
    device: &wgpu::Device,
    color_format: wgpu::TextureFormat,
    interface: &ProgramInterface,
    vertex_shader: &wgpu::ShaderModule,
    fragment_shader: &wgpu::ShaderModule,
    uniform_layout: Option<&wgpu::BindGroupLayout>,
) -> wgpu::RenderPipeline {
    let bind_group_layouts: Vec<&wgpu::BindGroupLayout> = uniform_layout.into_iter().collect();
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Strip Pipeline Layout"),
        bind_group_layouts: &bind_group_layouts,
        ..Default::default()
    });

    let attributes: Vec<wgpu::VertexAttribute> = interface
        .attributes
        .iter()
        .map(|attribute| wgpu::VertexAttribute {
            format: vertex_format(attribute.format),
            offset: u64::from(attribute.offset),
            shader_location: attribute.slot,
        })
        .collect();
    let vertex_layouts = if attributes.is_empty() {
        Vec::new()
    } else {
        vec![wgpu::VertexBufferLayout {
            array_stride: u64::from(interface.stride),
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &attributes,
        }]
    };

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        cache: None,
        label: Some("Strip Pipeline"),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: vertex_shader,
            entry_point: Some(&interface.vertex_entry),
            buffers: &vertex_layouts,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: fragment_shader,
            entry_point: Some(&interface.fragment_entry),
            targets: &[Some(wgpu::ColorTargetState {
                format: color_format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleStrip,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: Some(wgpu::Face::Back),
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DepthTexture::DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
    })
}
