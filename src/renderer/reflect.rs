//! Shader interface reflection.
//!
//! WGSL declares attribute locations and uniform layouts itself, so instead
//! of asking a driver (as `glGetUniformLocation` would) the renderer parses
//! each stage with `naga` and reads the interface out of the module:
//!
//! - vertex inputs of the vertex entry point become attributes, keyed by
//!   `@location` and name
//! - the `var<uniform>` at `@group(0) @binding(0)` becomes the uniform block;
//!   members of a struct block (or the variable itself) become named
//!   locations with their byte offsets
//!
//! Only `f32` scalars and vectors are accepted as attributes, and only
//! `vec4<f32>` / `mat4x4<f32>` values are addressable as uniforms.

use naga::{Binding, Module, Scalar, TypeInner, VectorSize};

use super::{RenderError, ShaderStage, UniformKind, UniformLocation};

/// The format of one vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeFormat {
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
}

impl AttributeFormat {
    pub fn size(self) -> u32 {
        match self {
            AttributeFormat::Float32 => 4,
            AttributeFormat::Float32x2 => 8,
            AttributeFormat::Float32x3 => 12,
            AttributeFormat::Float32x4 => 16,
        }
    }
}

/// A vertex input declared by the vertex entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexInput {
    pub location: u32,
    pub name: String,
    pub format: AttributeFormat,
}

/// A named, addressable member of a uniform block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformMember {
    pub name: String,
    pub location: UniformLocation,
}

/// The uniform block at `@group(0) @binding(0)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UniformBlock {
    /// Size of the whole block in bytes, padding included.
    pub size: u32,
    pub members: Vec<UniformMember>,
}

impl UniformBlock {
    pub fn location(&self, name: &str) -> Option<UniformLocation> {
        self.members
            .iter()
            .find(|member| member.name == name)
            .map(|member| member.location)
    }
}

/// Everything the renderer needs to know about one compiled stage.
#[derive(Debug, Clone)]
pub struct StageInterface {
    pub stage: ShaderStage,
    pub entry_point: String,
    /// Empty for fragment stages.
    pub inputs: Vec<VertexInput>,
    pub uniforms: Option<UniformBlock>,
}

/// Parse, validate and reflect one shader stage.
pub fn reflect_stage(source: &str, stage: ShaderStage) -> Result<StageInterface, RenderError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| RenderError::Compile {
        stage,
        log: e.emit_to_string(source),
    })?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::empty(),
    )
    .validate(&module)
    .map_err(|e| RenderError::Compile {
        stage,
        log: e.as_inner().to_string(),
    })?;

    let naga_stage = match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
    };
    let mut entry_points = module.entry_points.iter().filter(|ep| ep.stage == naga_stage);
    let entry_point = match (entry_points.next(), entry_points.next()) {
        (Some(ep), None) => ep,
        (None, _) => {
            return Err(RenderError::Compile {
                stage,
                log: format!("no @{stage} entry point found"),
            });
        }
        (Some(_), Some(_)) => {
            return Err(RenderError::Compile {
                stage,
                log: format!("more than one @{stage} entry point found"),
            });
        }
    };

    let inputs = match stage {
        ShaderStage::Vertex => vertex_inputs(&module, &entry_point.function, stage)?,
        ShaderStage::Fragment => Vec::new(),
    };

    Ok(StageInterface {
        stage,
        entry_point: entry_point.name.clone(),
        inputs,
        uniforms: uniform_block(&module, stage)?,
    })
}

fn vertex_inputs(
    module: &Module,
    function: &naga::Function,
    stage: ShaderStage,
) -> Result<Vec<VertexInput>, RenderError> {
    let mut inputs = Vec::new();
    for argument in &function.arguments {
        match (&argument.binding, &module.types[argument.ty].inner) {
            (Some(binding), inner) => {
                if let Some(input) = vertex_input(binding, argument.name.as_deref(), inner, stage)? {
                    inputs.push(input);
                }
            }
            (None, TypeInner::Struct { members, .. }) => {
                for member in members {
                    let Some(binding) = &member.binding else {
                        continue;
                    };
                    let inner = &module.types[member.ty].inner;
                    if let Some(input) = vertex_input(binding, member.name.as_deref(), inner, stage)?
                    {
                        inputs.push(input);
                    }
                }
            }
            (None, _) => (),
        }
    }
    inputs.sort_by_key(|input| input.location);
    Ok(inputs)
}

fn vertex_input(
    binding: &Binding,
    name: Option<&str>,
    inner: &TypeInner,
    stage: ShaderStage,
) -> Result<Option<VertexInput>, RenderError> {
    // Builtins such as vertex_index are not fed from buffers
    let Binding::Location { location, .. } = binding else {
        return Ok(None);
    };
    let name = name.unwrap_or_default().to_string();
    let format = match inner {
        TypeInner::Scalar(scalar) if *scalar == Scalar::F32 => AttributeFormat::Float32,
        TypeInner::Vector { size, scalar } if *scalar == Scalar::F32 => match size {
            VectorSize::Bi => AttributeFormat::Float32x2,
            VectorSize::Tri => AttributeFormat::Float32x3,
            VectorSize::Quad => AttributeFormat::Float32x4,
        },
        _ => {
            return Err(RenderError::Compile {
                stage,
                log: format!("vertex input `{name}` at location {location} is not an f32 scalar or vector"),
            });
        }
    };
    Ok(Some(VertexInput {
        location: *location,
        name,
        format,
    }))
}

fn uniform_kind(inner: &TypeInner) -> Option<UniformKind> {
    match inner {
        TypeInner::Vector {
            size: VectorSize::Quad,
            scalar,
        } if *scalar == Scalar::F32 => Some(UniformKind::Vec4),
        TypeInner::Matrix {
            columns: VectorSize::Quad,
            rows: VectorSize::Quad,
            scalar,
        } if *scalar == Scalar::F32 => Some(UniformKind::Mat4),
        _ => None,
    }
}

fn uniform_block(module: &Module, stage: ShaderStage) -> Result<Option<UniformBlock>, RenderError> {
    let mut block = None;
    for (_, var) in module.global_variables.iter() {
        if var.space != naga::AddressSpace::Uniform {
            continue;
        }
        let Some(binding) = &var.binding else {
            continue;
        };
        if binding.group != 0 || binding.binding != 0 {
            return Err(RenderError::Compile {
                stage,
                log: format!(
                    "uniforms must live at @group(0) @binding(0), found @group({}) @binding({})",
                    binding.group, binding.binding
                ),
            });
        }

        let inner = &module.types[var.ty].inner;
        let parsed = match inner {
            TypeInner::Struct { members, span } => {
                let members = members
                    .iter()
                    .filter_map(|member| {
                        let name = member.name.clone()?;
                        match uniform_kind(&module.types[member.ty].inner) {
                            Some(kind) => Some(UniformMember {
                                name,
                                location: UniformLocation {
                                    offset: member.offset,
                                    kind,
                                },
                            }),
                            None => {
                                log::warn!("uniform member `{name}` has an unsupported type and cannot be set");
                                None
                            }
                        }
                    })
                    .collect();
                UniformBlock {
                    size: *span,
                    members,
                }
            }
            inner => {
                let kind = uniform_kind(inner).ok_or_else(|| RenderError::Compile {
                    stage,
                    log: "uniform must be a struct, vec4<f32> or mat4x4<f32>".to_string(),
                })?;
                UniformBlock {
                    size: kind.size(),
                    members: vec![UniformMember {
                        name: var.name.clone().unwrap_or_default(),
                        location: UniformLocation { offset: 0, kind },
                    }],
                }
            }
        };
        block = Some(parsed);
    }
    Ok(block)
}

/// The linked interface of a vertex + fragment program.
#[derive(Debug, Clone)]
pub struct ProgramInterface {
    pub vertex_entry: String,
    pub fragment_entry: String,
    /// Bound attributes in slot order.
    pub attributes: Vec<BoundAttribute>,
    /// Bytes per vertex.
    pub stride: u32,
    pub uniforms: UniformBlock,
}

/// An attribute placed inside the interleaved vertex layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundAttribute {
    pub slot: u32,
    pub name: String,
    pub format: AttributeFormat,
    pub offset: u32,
}

impl ProgramInterface {
    /// Check the attribute bindings against the vertex inputs and merge the
    /// uniform blocks of both stages.
    ///
    /// Every vertex input has to be bound, and a binding has to name the
    /// input declared at its slot. Attributes are packed tightly in slot
    /// order.
    pub fn link(
        vertex: &StageInterface,
        fragment: &StageInterface,
        bindings: &[(u32, String)],
    ) -> Result<Self, RenderError> {
        let mut attributes = Vec::with_capacity(vertex.inputs.len());
        for (slot, name) in bindings {
            let input = vertex
                .inputs
                .iter()
                .find(|input| input.location == *slot)
                .ok_or_else(|| {
                    RenderError::Link(format!(
                        "attribute `{name}` is bound to slot {slot}, but the vertex stage declares nothing there"
                    ))
                })?;
            if input.name != *name {
                return Err(RenderError::Link(format!(
                    "attribute `{name}` is bound to slot {slot}, but the vertex stage declares `{}` there",
                    input.name
                )));
            }
            if attributes.iter().any(|a: &BoundAttribute| a.slot == *slot) {
                return Err(RenderError::Link(format!("slot {slot} is bound twice")));
            }
            attributes.push(BoundAttribute {
                slot: *slot,
                name: name.clone(),
                format: input.format,
                offset: 0,
            });
        }
        if let Some(unbound) = vertex
            .inputs
            .iter()
            .find(|input| !attributes.iter().any(|a| a.slot == input.location))
        {
            return Err(RenderError::Link(format!(
                "vertex input `{}` at location {} has no bound attribute",
                unbound.name, unbound.location
            )));
        }

        attributes.sort_by_key(|a| a.slot);
        let mut stride = 0;
        for attribute in attributes.iter_mut() {
            attribute.offset = stride;
            stride += attribute.format.size();
        }

        let uniforms = match (&vertex.uniforms, &fragment.uniforms) {
            (None, None) => UniformBlock::default(),
            (Some(block), None) | (None, Some(block)) => block.clone(),
            (Some(v), Some(f)) => {
                if v.size != f.size {
                    return Err(RenderError::Link(format!(
                        "vertex and fragment uniform blocks differ in size ({} vs {} bytes)",
                        v.size, f.size
                    )));
                }
                let mut merged = v.clone();
                for member in &f.members {
                    match merged.location(&member.name) {
                        Some(location) if location != member.location => {
                            return Err(RenderError::Link(format!(
                                "uniform `{}` has different layouts in the two stages",
                                member.name
                            )));
                        }
                        Some(_) => (),
                        None => merged.members.push(member.clone()),
                    }
                }
                merged
            }
        };

        Ok(Self {
            vertex_entry: vertex.entry_point.clone(),
            fragment_entry: fragment.entry_point.clone(),
            attributes,
            stride,
            uniforms,
        })
    }

    pub fn uniform(&self, name: &str) -> Result<UniformLocation, RenderError> {
        self.uniforms
            .location(name)
            .ok_or_else(|| RenderError::UnknownUniform(name.to_string()))
    }
}
