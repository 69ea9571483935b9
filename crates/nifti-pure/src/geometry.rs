//! Logical image geometry: validated sizes, the decoded header view, and
//! tolerance-based orientation comparison.

use alloc::string::String;

use crate::error::{Error, Result};
use crate::header::RawNiftiHeader;
use crate::orientation::{self, Affine};

/// A validated image extent. All axes are at least 1; a plain 3-D image has
/// `volumes == 1`. Fields are private so [`ImageSize::new`] is the only way
/// in; nothing can hold an unvalidated extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageSize {
    x: u64,
    y: u64,
    z: u64,
    volumes: u64,
}

impl ImageSize {
    /// Build a size, rejecting any axis below 1.
    pub fn new(x: u64, y: u64, z: u64, volumes: u64) -> Result<ImageSize> {
        if x < 1 || y < 1 || z < 1 || volumes < 1 {
            return Err(Error::InvalidImageSize);
        }
        Ok(ImageSize { x, y, z, volumes })
    }

    pub fn x(&self) -> u64 {
        self.x
    }

    pub fn y(&self) -> u64 {
        self.y
    }

    pub fn z(&self) -> u64 {
        self.z
    }

    pub fn volumes(&self) -> u64 {
        self.volumes
    }

    /// 4 when the image is a multi-volume series, 3 otherwise.
    pub fn ndims(&self) -> usize {
        if self.volumes > 1 {
            4
        } else {
            3
        }
    }

    /// Voxels in a single volume.
    pub fn volume_voxel_count(&self) -> u64 {
        self.x * self.y * self.z
    }

    /// Voxels across all volumes.
    pub fn voxel_count(&self) -> u64 {
        self.volume_voxel_count() * self.volumes
    }

    /// The same extent with the volume axis collapsed.
    pub fn single_volume(&self) -> ImageSize {
        ImageSize {
            volumes: 1,
            ..*self
        }
    }
}

/// The reference frame a transform maps into (`qform_code` / `sform_code`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XformCode {
    Unknown,
    ScannerAnat,
    AlignedAnat,
    Talairach,
    Mni152,
}

impl XformCode {
    pub fn from_code(code: i32) -> XformCode {
        match code {
            1 => XformCode::ScannerAnat,
            2 => XformCode::AlignedAnat,
            3 => XformCode::Talairach,
            4 => XformCode::Mni152,
            _ => XformCode::Unknown,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            XformCode::Unknown => 0,
            XformCode::ScannerAnat => 1,
            XformCode::AlignedAnat => 2,
            XformCode::Talairach => 3,
            XformCode::Mni152 => 4,
        }
    }
}

/// The decoded, validated view of a header: extent, voxel-to-world transform,
/// and the acquisition axes unpacked from `dim_info`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageHeader {
    pub size: ImageSize,
    pub affine: Affine,
    /// The frame of the transform that won the qform/sform precedence.
    pub frame: XformCode,
    /// Frequency-encoding axis (1..=3), 0 if unset.
    pub freq_dim: u8,
    /// Phase-encoding axis (1..=3), 0 if unset.
    pub phase_dim: u8,
    /// Slice axis (1..=3), 0 if unset.
    pub slice_dim: u8,
}

impl ImageHeader {
    /// Decode the logical geometry from a raw header.
    ///
    /// Dimensions 5..7 carry vector/statistical payloads this crate does not
    /// model; any such axis above 1 is rejected.
    pub fn from_raw(raw: &RawNiftiHeader) -> Result<ImageHeader> {
        let nd = raw.ndim();
        if nd < 1 {
            return Err(Error::InvalidImageSize);
        }
        let axis = |i: usize| -> Result<u64> {
            let v = if i <= nd { raw.dim[i] } else { 1 };
            if v < 1 {
                return Err(Error::InvalidImageSize);
            }
            Ok(v as u64)
        };
        for i in 5..=7 {
            if i <= nd && raw.dim[i] > 1 {
                return Err(Error::DimensionMismatch(
                    "dimensions above 4 are not supported",
                ));
            }
        }
        let size = ImageSize::new(axis(1)?, axis(2)?, axis(3)?, axis(4)?)?;

        let affine = orientation::voxel_to_world(raw)?;
        let frame = if raw.qform_code > 0 {
            XformCode::from_code(raw.qform_code)
        } else {
            XformCode::from_code(raw.sform_code)
        };

        Ok(ImageHeader {
            size,
            affine,
            frame,
            freq_dim: raw.dim_info & 0x03,
            phase_dim: (raw.dim_info >> 2) & 0x03,
            slice_dim: (raw.dim_info >> 4) & 0x03,
        })
    }

    /// Voxel spacing along each spatial axis (affine column norms).
    pub fn spacing(&self) -> [f64; 3] {
        let m = &self.affine;
        let mut s = [0.0f64; 3];
        for (j, out) in s.iter_mut().enumerate() {
            *out = libm::sqrt(
                m[0][j] * m[0][j] + m[1][j] * m[1][j] + m[2][j] * m[2][j],
            );
        }
        s
    }

    /// Default comparison tolerance: a thousandth of the smallest voxel
    /// spacing, so headers that differ by float-serialization noise compare
    /// equal while sub-voxel misregistrations do not.
    pub fn default_tolerance(&self) -> f64 {
        let s = self.spacing();
        let min = s[0].min(s[1]).min(s[2]);
        if min > 0.0 {
            min / 1000.0
        } else {
            1e-6
        }
    }

    fn sample_points(&self) -> ([[f64; 3]; 3], usize) {
        let (x, y, z) = (self.size.x as f64, self.size.y as f64, self.size.z as f64);
        let mut points = [[0.0, 0.0, 0.0], [x, y, z], [0.0, 0.0, 0.0]];
        let mut count = 2;
        // Probing the origin and the far corner catches translation and any
        // rotation/scale difference that grows across the grid. When two
        // extents coincide, distinct affines (e.g. an axis swap) can agree at
        // both corners, so an off-diagonal interior point breaks the tie.
        // Clamped inside the grid so thin slabs never probe past their edge.
        if x == y || y == z || x == z {
            points[2] = [
                1.0f64.min(x - 1.0).max(0.0),
                3.0f64.min(y - 1.0).max(0.0),
                5.0f64.min(z - 1.0).max(0.0),
            ];
            count = 3;
        }
        (points, count)
    }

    fn affine_matches(&self, other: &ImageHeader, tolerance: f64) -> bool {
        let (points, count) = self.sample_points();
        for p in &points[..count] {
            let a = orientation::transform_point(&self.affine, *p);
            let b = orientation::transform_point(&other.affine, *p);
            for i in 0..3 {
                if (a[i] - b[i]).abs() > tolerance {
                    return false;
                }
            }
        }
        true
    }

    /// Whether two headers describe the same sampling grid: identical sizes
    /// and world positions agreeing within `tolerance` at the sample points.
    pub fn matches_within(&self, other: &ImageHeader, tolerance: f64) -> bool {
        self.size == other.size && self.affine_matches(other, tolerance)
    }

    /// Like [`matches_within`](Self::matches_within) with the default
    /// tolerance.
    pub fn matches(&self, other: &ImageHeader) -> bool {
        self.matches_within(other, self.default_tolerance())
    }

    /// Grid equality that ignores the number of volumes, for binding a 4-D
    /// series into a space declared by a 3-D image.
    pub fn matches_ignoring_volumes(&self, other: &ImageHeader) -> bool {
        self.size.single_volume() == other.size.single_volume()
            && self.affine_matches(other, self.default_tolerance())
    }

    /// Short human-readable description used in mismatch errors.
    pub fn describe(&self) -> String {
        use alloc::format;
        format!(
            "{}x{}x{} ({} volume(s))",
            self.size.x, self.size.y, self.size.z, self.size.volumes
        )
    }
}
