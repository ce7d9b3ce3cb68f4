//! Procedural gear meshes.
//!
//! A gear is built tooth by tooth. Each tooth is described by seven planar
//! points and emitted as seven triangle strips (front face, bore, back face
//! and four flanks), all appended to one growing vertex sequence. The strip
//! layout is data: [`TOOTH_STRIPS`] lists, per strip, which point goes on
//! which side of the gear and what normal it carries, and a single loop
//! walks that table for every tooth.

use std::f64::consts::PI;

use crate::renderer::{BufferId, RenderError, Renderer};

/// One interleaved vertex: position followed by normal.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GearVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

/// A contiguous run of vertices drawn as one triangle strip.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct VertexStrip {
    pub first: u32,
    pub count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    /// `z = +width / 2`
    Front,
    /// `z = -width / 2`
    Back,
}

impl Side {
    fn sign(self) -> f32 {
        match self {
            Side::Front => 1.0,
            Side::Back => -1.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Facing {
    Front,
    Back,
    /// Perpendicular to the planar edge between two tooth points.
    Edge(usize, usize),
}

struct StripSpec {
    facing: Facing,
    emit: &'static [(usize, Side)],
}

use Side::{Back, Front};

/// Strips emitted for every tooth, in order.
const TOOTH_STRIPS: [StripSpec; 7] = [
    StripSpec {
        facing: Facing::Front,
        emit: &[(0, Front), (1, Front), (2, Front), (3, Front), (4, Front), (5, Front), (6, Front)],
    },
    StripSpec {
        facing: Facing::Edge(4, 6),
        emit: &[(4, Back), (4, Front), (6, Back), (6, Front)],
    },
    StripSpec {
        facing: Facing::Back,
        emit: &[(6, Back), (5, Back), (4, Back), (3, Back), (2, Back), (1, Back), (0, Back)],
    },
    StripSpec {
        facing: Facing::Edge(0, 2),
        emit: &[(0, Back), (0, Front), (2, Back), (2, Front)],
    },
    StripSpec {
        facing: Facing::Edge(1, 0),
        emit: &[(1, Back), (1, Front), (0, Back), (0, Front)],
    },
    StripSpec {
        facing: Facing::Edge(3, 1),
        emit: &[(3, Back), (3, Front), (1, Back), (1, Front)],
    },
    StripSpec {
        facing: Facing::Edge(5, 3),
        emit: &[(5, Back), (5, Front), (3, Back), (3, Front)],
    },
];

pub const STRIPS_PER_TOOTH: usize = TOOTH_STRIPS.len();

pub const VERTICES_PER_TOOTH: usize = {
    let mut total = 0;
    let mut i = 0;
    while i < TOOTH_STRIPS.len() {
        total += TOOTH_STRIPS[i].emit.len();
        i += 1;
    }
    total
};

/// Largest tooth count whose vertices can still be addressed by a `u32`.
pub const MAX_TEETH: u32 = (u32::MAX as usize / VERTICES_PER_TOOTH) as u32;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MeshError {
    #[error("invalid gear parameter `{name}`: {reason}")]
    InvalidParameter {
        name: &'static str,
        reason: &'static str,
    },
}

/// Dimensions of a gear wheel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GearParams {
    /// Radius of the hole at the center.
    pub inner_radius: f32,
    /// Radius at the middle of the teeth.
    pub outer_radius: f32,
    pub width: f32,
    pub teeth: u32,
    pub tooth_depth: f32,
}

impl GearParams {
    pub fn new(inner_radius: f32, outer_radius: f32, width: f32, teeth: u32, tooth_depth: f32) -> Self {
        Self {
            inner_radius,
            outer_radius,
            width,
            teeth,
            tooth_depth,
        }
    }

    fn validate(&self) -> Result<(), MeshError> {
        if self.teeth == 0 {
            return Err(MeshError::InvalidParameter {
                name: "teeth",
                reason: "a gear needs at least one tooth",
            });
        }
        if self.teeth > MAX_TEETH {
            return Err(MeshError::InvalidParameter {
                name: "teeth",
                reason: "vertex indices would not fit in 32 bits",
            });
        }
        let finite = [
            ("inner_radius", self.inner_radius),
            ("outer_radius", self.outer_radius),
            ("width", self.width),
            ("tooth_depth", self.tooth_depth),
        ];
        for (name, value) in finite {
            if !value.is_finite() {
                return Err(MeshError::InvalidParameter {
                    name,
                    reason: "value is not finite",
                });
            }
        }
        Ok(())
    }
}

/// The CPU-side geometry of a gear.
#[derive(Debug, Clone)]
pub struct GearMesh {
    vertices: Vec<GearVertex>,
    strips: Vec<VertexStrip>,
}

impl GearMesh {
    pub fn generate(params: GearParams) -> Result<Self, MeshError> {
        params.validate()?;

        let teeth = params.teeth as usize;
        let r0 = params.inner_radius;
        let r1 = params.outer_radius - params.tooth_depth / 2.0;
        let r2 = params.outer_radius + params.tooth_depth / 2.0;
        let da = 2.0 * PI / f64::from(params.teeth) / 4.0;
        let half_width = params.width * 0.5;

        let mut vertices = Vec::with_capacity(teeth * VERTICES_PER_TOOTH);
        let mut strips = Vec::with_capacity(teeth * STRIPS_PER_TOOTH);

        for i in 0..teeth {
            let base = i as f64 * 2.0 * PI / f64::from(params.teeth);
            let angles: [(f64, f64); 5] = std::array::from_fn(|k| (base + k as f64 * da).sin_cos());
            let point = |radius: f32, k: usize| {
                let (sin, cos) = angles[k];
                [(f64::from(radius) * cos) as f32, (f64::from(radius) * sin) as f32]
            };

            let points = [
                point(r2, 1),
                point(r2, 2),
                point(r1, 0),
                point(r1, 3),
                point(r0, 0),
                point(r1, 4),
                point(r0, 4),
            ];

            for spec in &TOOTH_STRIPS {
                let normal = match spec.facing {
                    Facing::Front => [0.0, 0.0, 1.0],
                    Facing::Back => [0.0, 0.0, -1.0],
                    Facing::Edge(a, b) => [
                        points[a][1] - points[b][1],
                        -(points[a][0] - points[b][0]),
                        0.0,
                    ],
                };
                let first = vertices.len() as u32;
                vertices.extend(spec.emit.iter().map(|&(p, side)| GearVertex {
                    position: [points[p][0], points[p][1], side.sign() * half_width],
                    normal,
                }));
                strips.push(VertexStrip {
                    first,
                    count: vertices.len() as u32 - first,
                });
            }
        }

        debug_assert_eq!(vertices.len(), teeth * VERTICES_PER_TOOTH);

        Ok(Self { vertices, strips })
    }

    pub fn vertices(&self) -> &[GearVertex] {
        &self.vertices
    }

    pub fn strips(&self) -> &[VertexStrip] {
        &self.strips
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GearError {
    #[error(transparent)]
    Mesh(#[from] MeshError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// A gear whose vertices live on the graphics device.
///
/// The device copy is released by [`Gear::release`]; the owning scene calls
/// it when it is popped.
#[derive(Debug)]
pub struct Gear {
    mesh: GearMesh,
    buffer: BufferId,
}

impl Gear {
    /// Generate the mesh and upload it once.
    pub fn new(renderer: &mut dyn Renderer, params: GearParams) -> Result<Self, GearError> {
        let mesh = GearMesh::generate(params)?;
        let buffer = renderer.upload_vertices(mesh.as_bytes())?;
        log::debug!(
            "uploaded gear with {} teeth: {} vertices in {} strips",
            params.teeth,
            mesh.vertices().len(),
            mesh.strips().len()
        );
        Ok(Self { mesh, buffer })
    }

    pub fn mesh(&self) -> &GearMesh {
        &self.mesh
    }

    pub fn buffer(&self) -> BufferId {
        self.buffer
    }

    /// Issue one strip draw per stored strip with the current uniforms.
    pub fn draw(&self, renderer: &mut dyn Renderer) -> Result<(), RenderError> {
        for strip in self.mesh.strips() {
            renderer.draw_strip(self.buffer, *strip)?;
        }
        Ok(())
    }

    pub fn release(self, renderer: &mut dyn Renderer) {
        renderer.release_buffer(self.buffer);
    }
}
