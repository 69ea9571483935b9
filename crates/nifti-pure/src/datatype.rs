//! NIfTI datatype codes and their storage properties.

use crate::error::{Error, Result};

/// A supported NIfTI voxel datatype.
///
/// The numeric values are the on-disk `datatype` codes. Code 1 (bit-packed
/// boolean) is deliberately absent: boolean arrays must be converted to a
/// byte-addressable type before writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Uint8 = 2,
    Int16 = 4,
    Int32 = 8,
    Float32 = 16,
    Float64 = 64,
    Int8 = 256,
    Uint16 = 512,
    Uint32 = 768,
    Int64 = 1024,
    Uint64 = 1280,
}

impl DataType {
    /// Resolve an on-disk datatype code.
    pub fn from_code(code: i16) -> Result<DataType> {
        match code {
            2 => Ok(DataType::Uint8),
            4 => Ok(DataType::Int16),
            8 => Ok(DataType::Int32),
            16 => Ok(DataType::Float32),
            64 => Ok(DataType::Float64),
            256 => Ok(DataType::Int8),
            512 => Ok(DataType::Uint16),
            768 => Ok(DataType::Uint32),
            1024 => Ok(DataType::Int64),
            1280 => Ok(DataType::Uint64),
            other => Err(Error::UnsupportedDataType(other)),
        }
    }

    /// The on-disk datatype code.
    pub fn code(self) -> i16 {
        self as i16
    }

    /// Bits per voxel, matching the header's `bitpix` field.
    pub fn bitpix(self) -> i16 {
        (self.byte_size() * 8) as i16
    }

    /// Bytes per voxel.
    pub fn byte_size(self) -> usize {
        match self {
            DataType::Uint8 | DataType::Int8 => 1,
            DataType::Int16 | DataType::Uint16 => 2,
            DataType::Int32 | DataType::Uint32 | DataType::Float32 => 4,
            DataType::Int64 | DataType::Uint64 | DataType::Float64 => 8,
        }
    }
}
