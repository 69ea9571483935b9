//! Intensity rescaling of raw voxel bytes (`scl_slope` / `scl_inter`).
//!
//! Stored values map to real-world values as `real = stored * slope + inter`.
//! The output is always floating point; the width is chosen so that no stored
//! value loses precision: 64-bit source types widen to `f64`, everything else
//! fits in `f32`.

use alloc::vec::Vec;

use bytemuck::pod_collect_to_vec;

use crate::datatype::DataType;
use crate::error::Result;

/// Rescaled voxel data at the promoted precision.
#[derive(Debug, Clone, PartialEq)]
pub enum RescaledData {
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl RescaledData {
    /// Number of voxels in the buffer.
    pub fn len(&self) -> usize {
        match self {
            RescaledData::F32(v) => v.len(),
            RescaledData::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The floating-point width a datatype rescales into.
pub fn promoted_width(datatype: DataType) -> usize {
    match datatype {
        DataType::Int64 | DataType::Uint64 | DataType::Float64 => 8,
        _ => 4,
    }
}

fn rescale_f32<T, F>(raw: &[u8], slope: f64, inter: f64, convert: F) -> Vec<f32>
where
    T: bytemuck::Pod,
    F: Fn(T) -> f32,
{
    let values: Vec<T> = pod_collect_to_vec(raw);
    let (s, i) = (slope as f32, inter as f32);
    values.into_iter().map(|v| convert(v) * s + i).collect()
}

fn rescale_f64<T, F>(raw: &[u8], slope: f64, inter: f64, convert: F) -> Vec<f64>
where
    T: bytemuck::Pod,
    F: Fn(T) -> f64,
{
    let values: Vec<T> = pod_collect_to_vec(raw);
    values.into_iter().map(|v| convert(v) * slope + inter).collect()
}

/// Apply the slope/intercept rescale to little-endian voxel bytes.
///
/// `slope` is expected to already be normalized (a stored value of 0 means
/// "no scaling" and is rewritten to 1 at header parse time). `raw` must be a
/// whole number of elements; `pod_collect_to_vec` asserts the length and
/// handles any alignment by copying.
pub fn rescale(raw: &[u8], datatype: DataType, slope: f64, inter: f64) -> Result<RescaledData> {
    let out = match datatype {
        DataType::Uint8 => {
            RescaledData::F32(rescale_f32::<u8, _>(raw, slope, inter, |v| v as f32))
        }
        DataType::Int8 => {
            RescaledData::F32(rescale_f32::<i8, _>(raw, slope, inter, |v| v as f32))
        }
        DataType::Int16 => RescaledData::F32(rescale_f32::<i16, _>(raw, slope, inter, |v| {
            i16::from_le(v) as f32
        })),
        DataType::Uint16 => RescaledData::F32(rescale_f32::<u16, _>(raw, slope, inter, |v| {
            u16::from_le(v) as f32
        })),
        DataType::Int32 => RescaledData::F32(rescale_f32::<i32, _>(raw, slope, inter, |v| {
            i32::from_le(v) as f32
        })),
        DataType::Uint32 => RescaledData::F32(rescale_f32::<u32, _>(raw, slope, inter, |v| {
            u32::from_le(v) as f32
        })),
        DataType::Float32 => RescaledData::F32(rescale_f32::<u32, _>(raw, slope, inter, |v| {
            f32::from_bits(u32::from_le(v))
        })),
        DataType::Int64 => RescaledData::F64(rescale_f64::<i64, _>(raw, slope, inter, |v| {
            i64::from_le(v) as f64
        })),
        DataType::Uint64 => RescaledData::F64(rescale_f64::<u64, _>(raw, slope, inter, |v| {
            u64::from_le(v) as f64
        })),
        DataType::Float64 => RescaledData::F64(rescale_f64::<u64, _>(raw, slope, inter, |v| {
            f64::from_bits(u64::from_le(v))
        })),
    };
    Ok(out)
}
