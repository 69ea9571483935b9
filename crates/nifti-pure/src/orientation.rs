//! Quaternion ↔ affine conversion and the qform/sform precedence rule.
//!
//! NIfTI encodes the voxel-to-world transform either as a quaternion
//! (`quatern_b/c/d`, `qoffset_*`, spacing in `pixdim`, handedness in
//! `pixdim[0]`) or as three explicit affine rows (`srow_x/y/z`). When both
//! are present the quaternion wins; headers with neither are rejected rather
//! than defaulted to identity, because a silently wrong orientation is the
//! failure mode this crate exists to prevent.

use libm::sqrt;

use crate::error::{Error, Result};
use crate::header::RawNiftiHeader;

/// A 4×4 voxel-to-world transform, row-major, last row `[0, 0, 0, 1]`.
pub type Affine = [[f64; 4]; 4];

/// The identity transform.
pub const IDENTITY: Affine = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// The quaternion form of an orientation: rotation (b, c, d with the a
/// component implied), handedness factor, voxel spacing, and translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub b: f64,
    pub c: f64,
    pub d: f64,
    /// ±1; −1 flips the third axis to keep a proper rotation with a
    /// left-handed voxel grid.
    pub qfac: f64,
    /// Voxel spacing along the three spatial axes, all positive.
    pub spacing: [f64; 3],
    /// World coordinates of voxel (0, 0, 0).
    pub offset: [f64; 3],
}

/// Apply an affine to a voxel index, returning world coordinates.
pub fn transform_point(m: &Affine, p: [f64; 3]) -> [f64; 3] {
    let mut out = [0.0; 3];
    for (i, row) in m.iter().take(3).enumerate() {
        out[i] = row[0] * p[0] + row[1] * p[1] + row[2] * p[2] + row[3];
    }
    out
}

/// Build the voxel-to-world affine from a quaternion orientation.
///
/// `a² = 1 − b² − c² − d²`; a degenerate rotation (`a² ≤ 0`) clamps `a` to
/// zero instead of failing, so float-rounded headers still decode.
pub fn quaternion_to_affine(q: &Quaternion) -> Affine {
    let (b, c, d) = (q.b, q.c, q.d);
    let a_sq = 1.0 - (b * b + c * c + d * d);
    let a = if a_sq <= 0.0 { 0.0 } else { sqrt(a_sq) };

    let [sx, sy, sz] = q.spacing;
    let zf = sz * q.qfac;

    [
        [
            (a * a + b * b - c * c - d * d) * sx,
            2.0 * (b * c - a * d) * sy,
            2.0 * (b * d + a * c) * zf,
            q.offset[0],
        ],
        [
            2.0 * (b * c + a * d) * sx,
            (a * a + c * c - b * b - d * d) * sy,
            2.0 * (c * d - a * b) * zf,
            q.offset[1],
        ],
        [
            2.0 * (b * d - a * c) * sx,
            2.0 * (c * d + a * b) * sy,
            (a * a + d * d - b * b - c * c) * zf,
            q.offset[2],
        ],
        [0.0, 0.0, 0.0, 1.0],
    ]
}

/// Decompose an affine into the quaternion form.
///
/// Extracts per-column scale, detects a reflection (negative determinant ⇒
/// `qfac = −1`, third column flipped), and converts the remaining proper
/// rotation to a quaternion via the trace/largest-diagonal method.
pub fn affine_to_quaternion(m: &Affine) -> Quaternion {
    let offset = [m[0][3], m[1][3], m[2][3]];

    // Column norms are the voxel spacings.
    let mut spacing = [0.0f64; 3];
    for (j, s) in spacing.iter_mut().enumerate() {
        *s = sqrt(m[0][j] * m[0][j] + m[1][j] * m[1][j] + m[2][j] * m[2][j]);
        if *s == 0.0 {
            *s = 1.0;
        }
    }

    // Normalized 3×3 rotation (possibly improper).
    let mut r = [[0.0f64; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            r[i][j] = m[i][j] / spacing[j];
        }
    }

    let det = r[0][0] * (r[1][1] * r[2][2] - r[1][2] * r[2][1])
        - r[0][1] * (r[1][0] * r[2][2] - r[1][2] * r[2][0])
        + r[0][2] * (r[1][0] * r[2][1] - r[1][1] * r[2][0]);

    let qfac = if det < 0.0 {
        for row in &mut r {
            row[2] = -row[2];
        }
        -1.0
    } else {
        1.0
    };

    let trace = r[0][0] + r[1][1] + r[2][2] + 1.0;
    let (b, c, d);
    if trace > 0.5 {
        let s = 0.5 * sqrt(trace);
        b = 0.25 * (r[2][1] - r[1][2]) / s;
        c = 0.25 * (r[0][2] - r[2][0]) / s;
        d = 0.25 * (r[1][0] - r[0][1]) / s;
    } else {
        let xd = 1.0 + r[0][0] - (r[1][1] + r[2][2]);
        let yd = 1.0 + r[1][1] - (r[0][0] + r[2][2]);
        let zd = 1.0 + r[2][2] - (r[0][0] + r[1][1]);
        let (aa, mut bb, mut cc, mut dd);
        if xd > 1.0 {
            bb = 0.5 * sqrt(xd);
            cc = 0.25 * (r[0][1] + r[1][0]) / bb;
            dd = 0.25 * (r[0][2] + r[2][0]) / bb;
            aa = 0.25 * (r[2][1] - r[1][2]) / bb;
        } else if yd > 1.0 {
            cc = 0.5 * sqrt(yd);
            bb = 0.25 * (r[0][1] + r[1][0]) / cc;
            dd = 0.25 * (r[1][2] + r[2][1]) / cc;
            aa = 0.25 * (r[0][2] - r[2][0]) / cc;
        } else {
            dd = 0.5 * sqrt(zd);
            bb = 0.25 * (r[0][2] + r[2][0]) / dd;
            cc = 0.25 * (r[1][2] + r[2][1]) / dd;
            aa = 0.25 * (r[1][0] - r[0][1]) / dd;
        }
        // Canonical form keeps the implied component non-negative.
        if aa < 0.0 {
            bb = -bb;
            cc = -cc;
            dd = -dd;
        }
        b = bb;
        c = cc;
        d = dd;
    }

    Quaternion {
        b,
        c,
        d,
        qfac,
        spacing,
        offset,
    }
}

/// Read the handedness factor from `pixdim[0]`.
///
/// Anything other than −1 defaults to +1; non-±1 values are a recoverable
/// anomaly, logged but never fatal.
pub fn qfac_from_pixdim(pixdim0: f64) -> f64 {
    if pixdim0 == -1.0 {
        -1.0
    } else {
        if pixdim0 != 1.0 {
            log::warn!("pixdim[0] is {pixdim0}, defaulting qfac to +1");
        }
        1.0
    }
}

/// Extract the quaternion orientation from a header's qform fields.
pub fn quaternion_from_header(header: &RawNiftiHeader) -> Quaternion {
    Quaternion {
        b: header.quatern_b,
        c: header.quatern_c,
        d: header.quatern_d,
        qfac: qfac_from_pixdim(header.pixdim[0]),
        spacing: [header.pixdim[1], header.pixdim[2], header.pixdim[3]],
        offset: [header.qoffset_x, header.qoffset_y, header.qoffset_z],
    }
}

/// Derive the primary voxel-to-world transform for a header.
///
/// Precedence: a positive `qform_code` selects the quaternion method; else a
/// positive `sform_code` selects the explicit `srow` rows; else the header
/// carries no usable orientation and decoding fails with
/// [`Error::MissingOrientation`].
pub fn voxel_to_world(header: &RawNiftiHeader) -> Result<Affine> {
    if header.qform_code > 0 {
        return Ok(quaternion_to_affine(&quaternion_from_header(header)));
    }
    if header.sform_code > 0 {
        return Ok([
            header.srow_x,
            header.srow_y,
            header.srow_z,
            [0.0, 0.0, 0.0, 1.0],
        ]);
    }
    Err(Error::MissingOrientation)
}

/// Store an affine into a header's qform fields (and mirror it into the
/// srow fields), used when serializing an image built from an explicit
/// transform.
pub fn apply_affine(header: &mut RawNiftiHeader, m: &Affine) {
    let q = affine_to_quaternion(m);
    header.quatern_b = q.b;
    header.quatern_c = q.c;
    header.quatern_d = q.d;
    header.qoffset_x = q.offset[0];
    header.qoffset_y = q.offset[1];
    header.qoffset_z = q.offset[2];
    header.pixdim[0] = q.qfac;
    header.pixdim[1] = q.spacing[0];
    header.pixdim[2] = q.spacing[1];
    header.pixdim[3] = q.spacing[2];
    header.srow_x = m[0];
    header.srow_y = m[1];
    header.srow_z = m[2];
}
