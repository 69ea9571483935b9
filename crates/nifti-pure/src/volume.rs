//! Whole-file codec and volume-series assembly.
//!
//! A [`NiftiVolume`] pairs a parsed header with the raw little-endian voxel
//! payload. Series operations stack 3-D images into a 4-D series, concatenate
//! 4-D series, and pull single volumes back out; all of them move payload
//! bytes verbatim without touching voxel values.

use alloc::vec::Vec;

use crate::error::{Error, Result};
use crate::gzip;
use crate::header::RawNiftiHeader;

/// A parsed NIfTI image: header plus the raw voxel bytes, exactly as stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NiftiVolume {
    pub header: RawNiftiHeader,
    pub data: Vec<u8>,
}

impl NiftiVolume {
    /// Bytes per single 3-D volume.
    pub fn bytes_per_volume(&self) -> Result<u64> {
        let per_voxel = self.header.data_type()?.byte_size() as u64;
        let mut count: u64 = 1;
        let spatial = self.header.ndim().min(3);
        for &d in &self.header.dim[1..=spatial] {
            count = count
                .checked_mul(d.max(1) as u64)
                .ok_or(Error::InvalidImageSize)?;
        }
        count.checked_mul(per_voxel).ok_or(Error::InvalidImageSize)
    }
}

/// Parse a NIfTI byte stream, transparently inflating gzip.
///
/// The voxel payload starts at `vox_offset` and must hold exactly
/// `voxel_count × byte_size` bytes; a shorter stream is an error, trailing
/// bytes beyond the payload are ignored.
pub fn parse_nifti(bytes: &[u8]) -> Result<NiftiVolume> {
    let plain;
    let bytes = if gzip::is_gzip(bytes) {
        plain = gzip::decompress(bytes)?;
        &plain[..]
    } else {
        bytes
    };

    let header = RawNiftiHeader::parse(bytes)?;
    let offset = header.vox_offset;
    if offset < header.version.header_size() as i64 {
        return Err(Error::UnexpectedEof);
    }
    let offset = offset as usize;
    let need = header.data_byte_count()? as usize;
    if bytes.len() < offset + need {
        return Err(Error::UnexpectedEof);
    }
    let data = bytes[offset..offset + need].to_vec();
    Ok(NiftiVolume { header, data })
}

/// Serialize a volume to the uncompressed single-file layout.
///
/// `vox_offset` is recomputed from the extension list; the payload is
/// appended verbatim.
pub fn serialize_nifti(volume: &NiftiVolume) -> Result<Vec<u8>> {
    let expected = volume.header.data_byte_count()? as usize;
    if volume.data.len() != expected {
        return Err(Error::DimensionMismatch(
            "payload length does not match the header dims",
        ));
    }
    let mut out = volume.header.serialize()?;
    out.reserve(volume.data.len());
    out.extend_from_slice(&volume.data);
    Ok(out)
}

/// Serialize a volume and gzip the assembled stream (`.nii.gz` layout).
pub fn serialize_nifti_gz(volume: &NiftiVolume) -> Result<Vec<u8>> {
    Ok(gzip::compress(&serialize_nifti(volume)?))
}

/// Whether two headers carry bit-for-bit identical orientation fields
/// (quaternion, offsets, spacings, and srow rows).
fn orientation_identical(a: &RawNiftiHeader, b: &RawNiftiHeader) -> bool {
    a.qform_code == b.qform_code
        && a.sform_code == b.sform_code
        && a.quatern_b.to_bits() == b.quatern_b.to_bits()
        && a.quatern_c.to_bits() == b.quatern_c.to_bits()
        && a.quatern_d.to_bits() == b.quatern_d.to_bits()
        && a.qoffset_x.to_bits() == b.qoffset_x.to_bits()
        && a.qoffset_y.to_bits() == b.qoffset_y.to_bits()
        && a.qoffset_z.to_bits() == b.qoffset_z.to_bits()
        && a.pixdim.iter().zip(&b.pixdim).all(|(x, y)| x.to_bits() == y.to_bits())
        && a.srow_x.iter().zip(&b.srow_x).all(|(x, y)| x.to_bits() == y.to_bits())
        && a.srow_y.iter().zip(&b.srow_y).all(|(x, y)| x.to_bits() == y.to_bits())
        && a.srow_z.iter().zip(&b.srow_z).all(|(x, y)| x.to_bits() == y.to_bits())
}

fn check_compatible(
    first: &NiftiVolume,
    other: &NiftiVolume,
    ignore_orientation: bool,
) -> Result<()> {
    if other.header.datatype != first.header.datatype {
        return Err(Error::DimensionMismatch("datatype differs between inputs"));
    }
    if other.header.bitpix != first.header.bitpix {
        return Err(Error::DimensionMismatch("bitpix differs between inputs"));
    }
    if other.header.dim[1..=3] != first.header.dim[1..=3] {
        return Err(Error::DimensionMismatch(
            "spatial dims differ between inputs",
        ));
    }
    if !ignore_orientation && !orientation_identical(&first.header, &other.header) {
        return Err(Error::DimensionMismatch(
            "orientation differs between inputs",
        ));
    }
    Ok(())
}

/// Stack 3-D volumes into a 4-D series.
///
/// All inputs must be 3-D with equal datatype, bitpix, and spatial dims, and
/// (unless `ignore_orientation`) bit-for-bit identical orientation fields.
/// The output clones the first header with `dim[0] = 4` and `dim[4]` set to
/// the input count; payloads are appended in input order.
pub fn stack_volumes(inputs: &[NiftiVolume], ignore_orientation: bool) -> Result<NiftiVolume> {
    let first = inputs
        .first()
        .ok_or(Error::DimensionMismatch("no input volumes"))?;
    for vol in inputs {
        if vol.header.ndim() != 3 {
            return Err(Error::DimensionMismatch("inputs must be 3-D volumes"));
        }
        check_compatible(first, vol, ignore_orientation)?;
    }

    let mut header = first.header.clone();
    header.dim[0] = 4;
    header.dim[4] = inputs.len() as i64;

    let mut data = Vec::with_capacity(inputs.iter().map(|v| v.data.len()).sum());
    for vol in inputs {
        data.extend_from_slice(&vol.data);
    }
    Ok(NiftiVolume { header, data })
}

/// Concatenate 4-D series along the volume axis.
///
/// Compatibility rules match [`stack_volumes`]; the output `dim[4]` is the
/// sum of the inputs'. 3-D inputs are rejected, use [`stack_volumes`] first.
pub fn concat_series(inputs: &[NiftiVolume], ignore_orientation: bool) -> Result<NiftiVolume> {
    let first = inputs
        .first()
        .ok_or(Error::DimensionMismatch("no input series"))?;
    let mut total_volumes: i64 = 0;
    for vol in inputs {
        if vol.header.ndim() != 4 {
            return Err(Error::DimensionMismatch("inputs must be 4-D series"));
        }
        check_compatible(first, vol, ignore_orientation)?;
        total_volumes += vol.header.dim[4].max(0);
    }

    let mut header = first.header.clone();
    header.dim[4] = total_volumes;

    let mut data = Vec::with_capacity(inputs.iter().map(|v| v.data.len()).sum());
    for vol in inputs {
        data.extend_from_slice(&vol.data);
    }
    Ok(NiftiVolume { header, data })
}

/// Extract one 3-D volume out of a 4-D series.
///
/// The payload is the contiguous block at `index × bytes_per_volume`; the
/// header is the series header collapsed back to 3-D.
pub fn extract_volume(series: &NiftiVolume, index: u64) -> Result<NiftiVolume> {
    if series.header.ndim() != 4 {
        return Err(Error::DimensionMismatch("input must be a 4-D series"));
    }
    let count = series.header.dim[4].max(0) as u64;
    if index >= count {
        return Err(Error::DimensionMismatch("volume index out of range"));
    }

    let per_volume = series.bytes_per_volume()? as usize;
    let start = index as usize * per_volume;
    if series.data.len() < start + per_volume {
        return Err(Error::UnexpectedEof);
    }

    let mut header = series.header.clone();
    header.dim[0] = 3;
    header.dim[4] = 1;
    Ok(NiftiVolume {
        header,
        data: series.data[start..start + per_volume].to_vec(),
    })
}
