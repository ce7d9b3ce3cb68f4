//! Rigid-transform matrix toolkit.
//!
//! All matrices are flat `[f32; 16]` buffers in column-major order: the
//! element at row `r`, column `c` lives at index `c * 4 + r`, so the
//! translation of an affine transform occupies indices 12, 13 and 14. This is
//! the layout WGSL's `mat4x4<f32>` expects, so matrices are uploaded as-is.
//!
//! Every mutating operation composes on the right: `multiply(m, n)` leaves
//! `m · n` in `m`, which applied to a column vector performs `n` first and
//! `m` second. `translate` and `rotate` follow the same rule, so a chain of
//! calls on a view matrix reads outermost-first.
//!
//! This is not a general linear algebra library. [`invert_rigid`] only
//! inverts rotation-plus-translation matrices; use `cgmath` when a general
//! inverse is needed (see [`to_cgmath`]).

use cgmath::{Deg, Rad};

/// A 4×4 column-major matrix.
pub type Mat4 = [f32; 16];

/// The multiplicative identity.
pub const IDENTITY: Mat4 = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0, //
];

/// Errors raised by matrix construction.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MathError {
    /// A projection parameter would produce a degenerate matrix.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        name: &'static str,
        reason: &'static str,
    },
}

/// Set `m` to the identity matrix.
pub fn identity(m: &mut Mat4) {
    *m = IDENTITY;
}

/// Replace `m` with `m · n`.
pub fn multiply(m: &mut Mat4, n: &Mat4) {
    let mut tmp = [0.0f32; 16];
    for (i, out) in tmp.iter_mut().enumerate() {
        let (column, row) = (i / 4, i % 4);
        *out = (0..4).map(|j| m[j * 4 + row] * n[column * 4 + j]).sum();
    }
    *m = tmp;
}

/// Compose a translation by `(x, y, z)` onto `m`.
pub fn translate(m: &mut Mat4, x: f32, y: f32, z: f32) {
    let t = [
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        x, y, z, 1.0,
    ];
    multiply(m, &t);
}

/// Compose a rotation of `angle` around the axis `(x, y, z)` onto `m`.
///
/// The axis is normalized first. A zero-length axis has no direction to
/// rotate around and leaves `m` untouched.
pub fn rotate<A: Into<Rad<f32>>>(m: &mut Mat4, angle: A, x: f32, y: f32, z: f32) {
    let len = (x * x + y * y + z * z).sqrt();
    if len == 0.0 || !len.is_finite() {
        log::debug!("rotate called with a degenerate axis ({x}, {y}, {z})");
        return;
    }
    let (x, y, z) = (
        f64::from(x / len),
        f64::from(y / len),
        f64::from(z / len),
    );
    let Rad(angle) = angle.into();
    let (sin, cos) = f64::from(angle).sin_cos();
    let c1 = 1.0 - cos;

    let r = [
        (x * x * c1 + cos) as f32,
        (y * x * c1 + z * sin) as f32,
        (x * z * c1 - y * sin) as f32,
        0.0,
        (x * y * c1 - z * sin) as f32,
        (y * y * c1 + cos) as f32,
        (y * z * c1 + x * sin) as f32,
        0.0,
        (x * z * c1 + y * sin) as f32,
        (y * z * c1 - x * sin) as f32,
        (z * z * c1 + cos) as f32,
        0.0,
        0.0,
        0.0,
        0.0,
        1.0,
    ];
    multiply(m, &r);
}

/// Transpose `m` in place.
pub fn transpose(m: &mut Mat4) {
    for column in 0..4 {
        for row in (column + 1)..4 {
            m.swap(column * 4 + row, row * 4 + column);
        }
    }
}

/// Invert a rigid transform in place.
///
/// `m` must contain only a rotation and a translation. The translation is
/// inverted by negation and the rotation by transposition, and the two are
/// recombined as `inverse(rotation) · inverse(translation)`. Any scale or
/// shear in `m` produces a wrong result without warning.
pub fn invert_rigid(m: &mut Mat4) {
    let mut t = IDENTITY;
    t[12] = -m[12];
    t[13] = -m[13];
    t[14] = -m[14];

    m[12] = 0.0;
    m[13] = 0.0;
    m[14] = 0.0;
    transpose(m);

    multiply(m, &t);
}

/// Write an OpenGL-style perspective projection into `m`.
///
/// `fovy` is the full vertical field of view. The clip-space depth range is
/// `-1..1`; shaders targeting wgpu remap it to `0..1`.
///
/// Degenerate input (`far == near`, a field of view whose half-angle has zero
/// sine, or a zero aspect ratio) is rejected and `m` is left exactly as it
/// was.
pub fn build_perspective<A: Into<Deg<f32>>>(
    m: &mut Mat4,
    fovy: A,
    aspect: f32,
    near: f32,
    far: f32,
) -> Result<(), MathError> {
    let Deg(fovy) = fovy.into();
    let radians = f64::from(fovy) / 2.0 * std::f64::consts::PI / 180.0;
    let delta_z = f64::from(far) - f64::from(near);
    let (sine, cosine) = radians.sin_cos();

    if delta_z == 0.0 {
        return Err(MathError::InvalidParameter {
            name: "far",
            reason: "far and near planes coincide",
        });
    }
    if sine == 0.0 {
        return Err(MathError::InvalidParameter {
            name: "fovy",
            reason: "field of view has no extent",
        });
    }
    if aspect == 0.0 {
        return Err(MathError::InvalidParameter {
            name: "aspect",
            reason: "aspect ratio is zero",
        });
    }

    let cotangent = cosine / sine;
    let (near, far) = (f64::from(near), f64::from(far));

    let mut tmp = [0.0f32; 16];
    tmp[0] = (cotangent / f64::from(aspect)) as f32;
    tmp[5] = cotangent as f32;
    tmp[10] = (-(far + near) / delta_z) as f32;
    tmp[11] = -1.0;
    tmp[14] = (-2.0 * near * far / delta_z) as f32;
    tmp[15] = 0.0;

    *m = tmp;
    Ok(())
}

/// View `m` as a `cgmath` matrix.
pub fn to_cgmath(m: &Mat4) -> cgmath::Matrix4<f32> {
    cgmath::Matrix4::new(
        m[0], m[1], m[2], m[3], m[4], m[5], m[6], m[7], m[8], m[9], m[10], m[11], m[12], m[13],
        m[14], m[15],
    )
}

/// Flatten a `cgmath` matrix into the column-major layout used here.
pub fn from_cgmath(m: cgmath::Matrix4<f32>) -> Mat4 {
    let columns: [[f32; 4]; 4] = m.into();
    let mut out = [0.0; 16];
    for (c, column) in columns.iter().enumerate() {
        out[c * 4..c * 4 + 4].copy_from_slice(column);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transpose_swaps_rows_and_columns() {
        let mut m: Mat4 = std::array::from_fn(|i| i as f32);
        transpose(&mut m);
        assert_eq!(m[1], 4.0);
        assert_eq!(m[4], 1.0);
        assert_eq!(m[12], 3.0);
        assert_eq!(m[15], 15.0);
    }

    #[test]
    fn zero_axis_rotation_is_ignored() {
        let mut m = IDENTITY;
        translate(&mut m, 1.0, 2.0, 3.0);
        let before = m;
        rotate(&mut m, Deg(45.0), 0.0, 0.0, 0.0);
        assert_eq!(m, before);
    }
}
