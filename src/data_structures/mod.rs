//! Engine data structures: generated meshes and GPU textures.
//!
//! - `gear` contains the procedural gear generator and its uploaded form
//! - `texture` wraps the depth attachment used by the GPU renderer

pub mod gear;
pub mod texture;
