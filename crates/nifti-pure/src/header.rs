//! Fixed-layout NIfTI-1 / NIfTI-2 header parsing, serialization, and
//! validation.
//!
//! Both versions are held in one width-independent [`RawNiftiHeader`] (i64
//! dims, f64 floats); the [`NiftiVersion`] tag decides the on-disk field
//! widths. Serialization mirrors the layout byte for byte, including the two
//! reserved padding regions of the NIfTI-1 layout, and recomputes
//! `vox_offset` from the extension list.

use alloc::vec;
use alloc::vec::Vec;
use core::str;

use crate::datatype::DataType;
use crate::endian::{
    read_f32_le, read_f64_le, read_i16_le, read_i32_le, read_i64_le, read_u8, write_f32_le,
    write_f64_le, write_i16_le, write_i32_le, write_i64_le, write_u8,
};
use crate::error::{Error, Result};
use crate::extension::{self, Extension};

/// NIfTI-1 fixed header size in bytes.
pub const NIFTI1_HEADER_SIZE: usize = 348;

/// NIfTI-2 fixed header size in bytes.
pub const NIFTI2_HEADER_SIZE: usize = 540;

/// The value 348 read with the wrong byte order; marks a big-endian file.
pub const BYTE_SWAPPED_SIZE: i32 = 1543569408;

/// Magic for a single-file NIfTI-1 image (`.nii`).
pub const MAGIC_NIFTI1_SINGLE: [u8; 4] = *b"n+1\0";
/// Magic for a paired NIfTI-1 image (`.hdr` + `.img`).
pub const MAGIC_NIFTI1_PAIR: [u8; 4] = *b"ni1\0";
/// Leading magic for a single-file NIfTI-2 image.
pub const MAGIC_NIFTI2_SINGLE: [u8; 4] = *b"n+2\0";
/// Signature tail following the NIfTI-2 magic (newline-corruption check).
const NIFTI2_MAGIC_TAIL: [u8; 4] = *b"\r\n\x1a\n";

/// Which fixed-layout variant a header uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NiftiVersion {
    /// 348-byte header, 16-bit dims, 32-bit floats.
    Nifti1,
    /// 540-byte header, 64-bit dims, 64-bit floats.
    Nifti2,
}

impl NiftiVersion {
    /// Fixed header size for this version.
    pub fn header_size(self) -> usize {
        match self {
            NiftiVersion::Nifti1 => NIFTI1_HEADER_SIZE,
            NiftiVersion::Nifti2 => NIFTI2_HEADER_SIZE,
        }
    }
}

/// The full on-disk NIfTI header field set, plus the extension list.
///
/// Created fresh per read/write call; converted to the logical
/// [`crate::geometry::ImageHeader`] at the decode boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct RawNiftiHeader {
    pub version: NiftiVersion,
    /// Packed frequency/phase/slice encoding dims (2 bits each).
    pub dim_info: u8,
    /// `dim[0]` is the dimensionality; `dim[1..=dim[0]]` are the extents.
    pub dim: [i64; 8],
    pub intent_p1: f64,
    pub intent_p2: f64,
    pub intent_p3: f64,
    pub intent_code: i32,
    pub datatype: i16,
    pub bitpix: i16,
    pub slice_start: i64,
    /// `pixdim[0]` carries qfac (±1); `pixdim[1..=3]` are voxel spacings.
    pub pixdim: [f64; 8],
    /// Byte offset of the voxel data; recomputed on write.
    pub vox_offset: i64,
    pub scl_slope: f64,
    pub scl_inter: f64,
    pub slice_end: i64,
    pub slice_code: i32,
    pub xyzt_units: i32,
    pub cal_max: f64,
    pub cal_min: f64,
    pub slice_duration: f64,
    pub toffset: f64,
    /// Free-form description, null-padded.
    pub descrip: [u8; 80],
    /// Auxiliary filename, null-padded.
    pub aux_file: [u8; 24],
    pub qform_code: i32,
    pub sform_code: i32,
    pub quatern_b: f64,
    pub quatern_c: f64,
    pub quatern_d: f64,
    pub qoffset_x: f64,
    pub qoffset_y: f64,
    pub qoffset_z: f64,
    pub srow_x: [f64; 4],
    pub srow_y: [f64; 4],
    pub srow_z: [f64; 4],
    pub intent_name: [u8; 16],
    pub magic: [u8; 4],
    pub extensions: Vec<Extension>,
}

impl Default for RawNiftiHeader {
    fn default() -> Self {
        RawNiftiHeader {
            version: NiftiVersion::Nifti1,
            dim_info: 0,
            dim: [3, 1, 1, 1, 1, 1, 1, 1],
            intent_p1: 0.0,
            intent_p2: 0.0,
            intent_p3: 0.0,
            intent_code: 0,
            datatype: DataType::Uint8.code(),
            bitpix: DataType::Uint8.bitpix(),
            slice_start: 0,
            pixdim: [1.0; 8],
            vox_offset: 0,
            scl_slope: 1.0,
            scl_inter: 0.0,
            slice_end: 0,
            slice_code: 0,
            xyzt_units: 0,
            cal_max: 0.0,
            cal_min: 0.0,
            slice_duration: 0.0,
            toffset: 0.0,
            descrip: [0; 80],
            aux_file: [0; 24],
            qform_code: 0,
            sform_code: 0,
            quatern_b: 0.0,
            quatern_c: 0.0,
            quatern_d: 0.0,
            qoffset_x: 0.0,
            qoffset_y: 0.0,
            qoffset_z: 0.0,
            srow_x: [0.0; 4],
            srow_y: [0.0; 4],
            srow_z: [0.0; 4],
            intent_name: [0; 16],
            magic: MAGIC_NIFTI1_SINGLE,
            extensions: Vec::new(),
        }
    }
}

/// Copy a string into a fixed-width null-padded field, truncating if needed.
fn fixed_str<const N: usize>(s: &str) -> [u8; N] {
    let mut buf = [0u8; N];
    let bytes = s.as_bytes();
    let len = bytes.len().min(N);
    buf[..len].copy_from_slice(&bytes[..len]);
    buf
}

/// Trim a fixed-width field at the first null and decode as UTF-8.
fn trim_fixed(field: &[u8]) -> &str {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    str::from_utf8(&field[..end]).unwrap_or("")
}

impl RawNiftiHeader {
    /// The declared voxel datatype.
    pub fn data_type(&self) -> Result<DataType> {
        DataType::from_code(self.datatype)
    }

    /// Number of used dimensions (`dim[0]`).
    pub fn ndim(&self) -> usize {
        self.dim[0].clamp(0, 7) as usize
    }

    /// Total number of voxels: the product of `dim[1..=dim[0]]`.
    pub fn voxel_count(&self) -> Result<u64> {
        let nd = self.ndim();
        if nd == 0 {
            return Err(Error::InvalidImageSize);
        }
        let mut count: u64 = 1;
        for &d in &self.dim[1..=nd] {
            if d < 1 {
                return Err(Error::InvalidImageSize);
            }
            count = count
                .checked_mul(d as u64)
                .ok_or(Error::InvalidImageSize)?;
        }
        Ok(count)
    }

    /// Voxel payload size in bytes.
    pub fn data_byte_count(&self) -> Result<u64> {
        self.voxel_count()?
            .checked_mul(self.data_type()?.byte_size() as u64)
            .ok_or(Error::InvalidImageSize)
    }

    /// Description field trimmed at the first null.
    pub fn descrip_str(&self) -> &str {
        trim_fixed(&self.descrip)
    }

    /// Auxiliary filename trimmed at the first null.
    pub fn aux_file_str(&self) -> &str {
        trim_fixed(&self.aux_file)
    }

    /// Intent name trimmed at the first null.
    pub fn intent_name_str(&self) -> &str {
        trim_fixed(&self.intent_name)
    }

    /// Set the description field (truncated to 80 bytes).
    pub fn set_descrip(&mut self, s: &str) {
        self.descrip = fixed_str(s);
    }

    /// Byte offset at which voxel data will land when this header is
    /// serialized: the fixed header plus the extension bytes (a 4-byte zero
    /// extender when the list is empty).
    pub fn serialized_vox_offset(&self) -> usize {
        self.version.header_size() + extension::serialized_len(&self.extensions)
    }

    /// Parse a header (fixed fields plus extension records) from the start
    /// of an uncompressed NIfTI byte stream.
    pub fn parse(data: &[u8]) -> Result<RawNiftiHeader> {
        if data.len() < 4 {
            return Err(Error::UnexpectedEof);
        }
        let sizeof_hdr = read_i32_le(data);
        let version = match sizeof_hdr {
            s if s == NIFTI1_HEADER_SIZE as i32 => NiftiVersion::Nifti1,
            s if s == NIFTI2_HEADER_SIZE as i32 => NiftiVersion::Nifti2,
            BYTE_SWAPPED_SIZE => return Err(Error::BigEndianFile),
            other => return Err(Error::InvalidHeaderSize(other)),
        };
        if data.len() < version.header_size() {
            return Err(Error::UnexpectedEof);
        }

        let mut header = match version {
            NiftiVersion::Nifti1 => parse_nifti1_fixed(data)?,
            NiftiVersion::Nifti2 => parse_nifti2_fixed(data)?,
        };

        if header.scl_slope == 0.0 {
            // Format convention: a zero slope means "no rescaling".
            log::warn!("scl_slope is 0, normalizing to slope 1 / intercept 0");
            header.scl_slope = 1.0;
            header.scl_inter = 0.0;
        }

        let (extensions, _) = extension::parse_extensions(&data[version.header_size()..])?;
        header.extensions = extensions;
        Ok(header)
    }

    /// Serialize the header: fixed fields, extension records, recomputed
    /// `vox_offset`. The returned buffer ends where voxel data begins.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let vox_offset = self.serialized_vox_offset() as i64;
        let mut out = match self.version {
            NiftiVersion::Nifti1 => serialize_nifti1_fixed(self, vox_offset)?,
            NiftiVersion::Nifti2 => serialize_nifti2_fixed(self, vox_offset)?,
        };
        out.extend_from_slice(&extension::serialize_extensions(&self.extensions));
        debug_assert_eq!(out.len(), vox_offset as usize);
        Ok(out)
    }
}

// ── NIfTI-1 fixed layout ──

fn parse_nifti1_fixed(d: &[u8]) -> Result<RawNiftiHeader> {
    let magic: [u8; 4] = d[344..348].try_into().unwrap();
    if magic != MAGIC_NIFTI1_SINGLE && magic != MAGIC_NIFTI1_PAIR {
        return Err(Error::InvalidMagic(magic));
    }

    let mut dim = [0i64; 8];
    for (i, v) in dim.iter_mut().enumerate() {
        *v = read_i16_le(&d[40 + i * 2..]) as i64;
    }
    let mut pixdim = [0f64; 8];
    for (i, v) in pixdim.iter_mut().enumerate() {
        *v = read_f32_le(&d[76 + i * 4..]) as f64;
    }
    let mut srow_x = [0f64; 4];
    let mut srow_y = [0f64; 4];
    let mut srow_z = [0f64; 4];
    for i in 0..4 {
        srow_x[i] = read_f32_le(&d[280 + i * 4..]) as f64;
        srow_y[i] = read_f32_le(&d[296 + i * 4..]) as f64;
        srow_z[i] = read_f32_le(&d[312 + i * 4..]) as f64;
    }

    Ok(RawNiftiHeader {
        version: NiftiVersion::Nifti1,
        dim_info: read_u8(&d[39..]),
        dim,
        intent_p1: read_f32_le(&d[56..]) as f64,
        intent_p2: read_f32_le(&d[60..]) as f64,
        intent_p3: read_f32_le(&d[64..]) as f64,
        intent_code: read_i16_le(&d[68..]) as i32,
        datatype: read_i16_le(&d[70..]),
        bitpix: read_i16_le(&d[72..]),
        slice_start: read_i16_le(&d[74..]) as i64,
        pixdim,
        vox_offset: read_f32_le(&d[108..]) as i64,
        scl_slope: read_f32_le(&d[112..]) as f64,
        scl_inter: read_f32_le(&d[116..]) as f64,
        slice_end: read_i16_le(&d[120..]) as i64,
        slice_code: read_u8(&d[122..]) as i32,
        xyzt_units: read_u8(&d[123..]) as i32,
        cal_max: read_f32_le(&d[124..]) as f64,
        cal_min: read_f32_le(&d[128..]) as f64,
        slice_duration: read_f32_le(&d[132..]) as f64,
        toffset: read_f32_le(&d[136..]) as f64,
        descrip: d[148..228].try_into().unwrap(),
        aux_file: d[228..252].try_into().unwrap(),
        qform_code: read_i16_le(&d[252..]) as i32,
        sform_code: read_i16_le(&d[254..]) as i32,
        quatern_b: read_f32_le(&d[256..]) as f64,
        quatern_c: read_f32_le(&d[260..]) as f64,
        quatern_d: read_f32_le(&d[264..]) as f64,
        qoffset_x: read_f32_le(&d[268..]) as f64,
        qoffset_y: read_f32_le(&d[272..]) as f64,
        qoffset_z: read_f32_le(&d[276..]) as f64,
        srow_x,
        srow_y,
        srow_z,
        intent_name: d[328..344].try_into().unwrap(),
        magic,
        extensions: Vec::new(),
    })
}

fn serialize_nifti1_fixed(h: &RawNiftiHeader, vox_offset: i64) -> Result<Vec<u8>> {
    for &d in &h.dim {
        if d > i16::MAX as i64 || d < i16::MIN as i64 {
            return Err(Error::DimensionMismatch("dims exceed the NIfTI-1 range"));
        }
    }
    if h.magic != MAGIC_NIFTI1_SINGLE && h.magic != MAGIC_NIFTI1_PAIR {
        return Err(Error::InvalidMagic(h.magic));
    }

    // Bytes 4..40 (old ANALYZE fields) and 140..148 (glmax/glmin) are the
    // reserved padding regions, left zeroed.
    let mut d = vec![0u8; NIFTI1_HEADER_SIZE];
    write_i32_le(&mut d[0..], NIFTI1_HEADER_SIZE as i32);
    write_u8(&mut d[39..], h.dim_info);
    for (i, &v) in h.dim.iter().enumerate() {
        write_i16_le(&mut d[40 + i * 2..], v as i16);
    }
    write_f32_le(&mut d[56..], h.intent_p1 as f32);
    write_f32_le(&mut d[60..], h.intent_p2 as f32);
    write_f32_le(&mut d[64..], h.intent_p3 as f32);
    write_i16_le(&mut d[68..], h.intent_code as i16);
    write_i16_le(&mut d[70..], h.datatype);
    write_i16_le(&mut d[72..], h.bitpix);
    write_i16_le(&mut d[74..], h.slice_start as i16);
    for (i, &v) in h.pixdim.iter().enumerate() {
        write_f32_le(&mut d[76 + i * 4..], v as f32);
    }
    write_f32_le(&mut d[108..], vox_offset as f32);
    write_f32_le(&mut d[112..], h.scl_slope as f32);
    write_f32_le(&mut d[116..], h.scl_inter as f32);
    write_i16_le(&mut d[120..], h.slice_end as i16);
    write_u8(&mut d[122..], h.slice_code as u8);
    write_u8(&mut d[123..], h.xyzt_units as u8);
    write_f32_le(&mut d[124..], h.cal_max as f32);
    write_f32_le(&mut d[128..], h.cal_min as f32);
    write_f32_le(&mut d[132..], h.slice_duration as f32);
    write_f32_le(&mut d[136..], h.toffset as f32);
    d[148..228].copy_from_slice(&h.descrip);
    d[228..252].copy_from_slice(&h.aux_file);
    write_i16_le(&mut d[252..], h.qform_code as i16);
    write_i16_le(&mut d[254..], h.sform_code as i16);
    write_f32_le(&mut d[256..], h.quatern_b as f32);
    write_f32_le(&mut d[260..], h.quatern_c as f32);
    write_f32_le(&mut d[264..], h.quatern_d as f32);
    write_f32_le(&mut d[268..], h.qoffset_x as f32);
    write_f32_le(&mut d[272..], h.qoffset_y as f32);
    write_f32_le(&mut d[276..], h.qoffset_z as f32);
    for i in 0..4 {
        write_f32_le(&mut d[280 + i * 4..], h.srow_x[i] as f32);
        write_f32_le(&mut d[296 + i * 4..], h.srow_y[i] as f32);
        write_f32_le(&mut d[312 + i * 4..], h.srow_z[i] as f32);
    }
    d[328..344].copy_from_slice(&h.intent_name);
    d[344..348].copy_from_slice(&h.magic);
    Ok(d)
}

// ── NIfTI-2 fixed layout ──

fn parse_nifti2_fixed(d: &[u8]) -> Result<RawNiftiHeader> {
    let magic: [u8; 4] = d[4..8].try_into().unwrap();
    let tail: [u8; 4] = d[8..12].try_into().unwrap();
    if magic != MAGIC_NIFTI2_SINGLE || tail != NIFTI2_MAGIC_TAIL {
        return Err(Error::InvalidMagic(magic));
    }

    let mut dim = [0i64; 8];
    for (i, v) in dim.iter_mut().enumerate() {
        *v = read_i64_le(&d[16 + i * 8..]);
    }
    let mut pixdim = [0f64; 8];
    for (i, v) in pixdim.iter_mut().enumerate() {
        *v = read_f64_le(&d[104 + i * 8..]);
    }
    let mut srow_x = [0f64; 4];
    let mut srow_y = [0f64; 4];
    let mut srow_z = [0f64; 4];
    for i in 0..4 {
        srow_x[i] = read_f64_le(&d[400 + i * 8..]);
        srow_y[i] = read_f64_le(&d[432 + i * 8..]);
        srow_z[i] = read_f64_le(&d[464 + i * 8..]);
    }

    Ok(RawNiftiHeader {
        version: NiftiVersion::Nifti2,
        dim_info: read_u8(&d[524..]),
        dim,
        intent_p1: read_f64_le(&d[80..]),
        intent_p2: read_f64_le(&d[88..]),
        intent_p3: read_f64_le(&d[96..]),
        intent_code: read_i32_le(&d[504..]),
        datatype: read_i16_le(&d[12..]),
        bitpix: read_i16_le(&d[14..]),
        slice_start: read_i64_le(&d[224..]),
        pixdim,
        vox_offset: read_i64_le(&d[168..]),
        scl_slope: read_f64_le(&d[176..]),
        scl_inter: read_f64_le(&d[184..]),
        slice_end: read_i64_le(&d[232..]),
        slice_code: read_i32_le(&d[496..]),
        xyzt_units: read_i32_le(&d[500..]),
        cal_max: read_f64_le(&d[192..]),
        cal_min: read_f64_le(&d[200..]),
        slice_duration: read_f64_le(&d[208..]),
        toffset: read_f64_le(&d[216..]),
        descrip: d[240..320].try_into().unwrap(),
        aux_file: d[320..344].try_into().unwrap(),
        qform_code: read_i32_le(&d[344..]),
        sform_code: read_i32_le(&d[348..]),
        quatern_b: read_f64_le(&d[352..]),
        quatern_c: read_f64_le(&d[360..]),
        quatern_d: read_f64_le(&d[368..]),
        qoffset_x: read_f64_le(&d[376..]),
        qoffset_y: read_f64_le(&d[384..]),
        qoffset_z: read_f64_le(&d[392..]),
        srow_x,
        srow_y,
        srow_z,
        intent_name: d[508..524].try_into().unwrap(),
        magic,
        extensions: Vec::new(),
    })
}

fn serialize_nifti2_fixed(h: &RawNiftiHeader, vox_offset: i64) -> Result<Vec<u8>> {
    if h.magic != MAGIC_NIFTI2_SINGLE {
        return Err(Error::InvalidMagic(h.magic));
    }

    let mut d = vec![0u8; NIFTI2_HEADER_SIZE];
    write_i32_le(&mut d[0..], NIFTI2_HEADER_SIZE as i32);
    d[4..8].copy_from_slice(&h.magic);
    d[8..12].copy_from_slice(&NIFTI2_MAGIC_TAIL);
    write_i16_le(&mut d[12..], h.datatype);
    write_i16_le(&mut d[14..], h.bitpix);
    for (i, &v) in h.dim.iter().enumerate() {
        write_i64_le(&mut d[16 + i * 8..], v);
    }
    write_f64_le(&mut d[80..], h.intent_p1);
    write_f64_le(&mut d[88..], h.intent_p2);
    write_f64_le(&mut d[96..], h.intent_p3);
    for (i, &v) in h.pixdim.iter().enumerate() {
        write_f64_le(&mut d[104 + i * 8..], v);
    }
    write_i64_le(&mut d[168..], vox_offset);
    write_f64_le(&mut d[176..], h.scl_slope);
    write_f64_le(&mut d[184..], h.scl_inter);
    write_f64_le(&mut d[192..], h.cal_max);
    write_f64_le(&mut d[200..], h.cal_min);
    write_f64_le(&mut d[208..], h.slice_duration);
    write_f64_le(&mut d[216..], h.toffset);
    write_i64_le(&mut d[224..], h.slice_start);
    write_i64_le(&mut d[232..], h.slice_end);
    d[240..320].copy_from_slice(&h.descrip);
    d[320..344].copy_from_slice(&h.aux_file);
    write_i32_le(&mut d[344..], h.qform_code);
    write_i32_le(&mut d[348..], h.sform_code);
    write_f64_le(&mut d[352..], h.quatern_b);
    write_f64_le(&mut d[360..], h.quatern_c);
    write_f64_le(&mut d[368..], h.quatern_d);
    write_f64_le(&mut d[376..], h.qoffset_x);
    write_f64_le(&mut d[384..], h.qoffset_y);
    write_f64_le(&mut d[392..], h.qoffset_z);
    for i in 0..4 {
        write_f64_le(&mut d[400 + i * 8..], h.srow_x[i]);
        write_f64_le(&mut d[432 + i * 8..], h.srow_y[i]);
        write_f64_le(&mut d[464 + i * 8..], h.srow_z[i]);
    }
    write_i32_le(&mut d[496..], h.slice_code);
    write_i32_le(&mut d[500..], h.xyzt_units);
    write_i32_le(&mut d[504..], h.intent_code);
    d[508..524].copy_from_slice(&h.intent_name);
    write_u8(&mut d[524..], h.dim_info);
    // Bytes 525..540 are the reserved unused region, left zeroed.
    Ok(d)
}
