//! Transparent gzip wrapping for `.nii.gz` / `.hdr.gz` byte streams.
//!
//! A gzipped NIfTI file is an ordinary single-member gzip stream around the
//! exact same byte layout as the uncompressed file. Compression always runs
//! over a fully assembled in-memory buffer.

use alloc::vec::Vec;

use crate::error::{Error, Result};

/// Gzip member magic bytes.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Returns `true` if the byte stream starts with the gzip magic.
pub fn is_gzip(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == GZIP_MAGIC[0] && data[1] == GZIP_MAGIC[1]
}

/// Skip the gzip member header and return the raw deflate payload
/// (with the 8-byte CRC32 + ISIZE trailer stripped).
fn strip_member_header(data: &[u8]) -> Result<&[u8]> {
    if data.len() < 18 {
        return Err(Error::DecompressionError);
    }
    if data[2] != 8 {
        // Unknown compression method.
        return Err(Error::DecompressionError);
    }
    let flg = data[3];
    let mut pos = 10;
    if flg & 0x04 != 0 {
        // FEXTRA: 2-byte little-endian length plus payload.
        if data.len() < pos + 2 {
            return Err(Error::DecompressionError);
        }
        let xlen = u16::from_le_bytes([data[pos], data[pos + 1]]) as usize;
        pos += 2 + xlen;
    }
    if flg & 0x08 != 0 {
        // FNAME: skip null-terminated string.
        while pos < data.len() && data[pos] != 0 {
            pos += 1;
        }
        pos += 1;
    }
    if flg & 0x10 != 0 {
        // FCOMMENT: skip null-terminated string.
        while pos < data.len() && data[pos] != 0 {
            pos += 1;
        }
        pos += 1;
    }
    if flg & 0x02 != 0 {
        // FHCRC
        pos += 2;
    }
    if pos >= data.len() || data.len() < pos + 8 {
        return Err(Error::DecompressionError);
    }
    Ok(&data[pos..data.len() - 8])
}

/// Decompress a gzip member into its original bytes.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    if !is_gzip(data) {
        return Err(Error::DecompressionError);
    }
    let deflate_payload = strip_member_header(data)?;
    let out = miniz_oxide::inflate::decompress_to_vec(deflate_payload)
        .map_err(|_| Error::DecompressionError)?;
    let stored_crc = u32::from_le_bytes([
        data[data.len() - 8],
        data[data.len() - 7],
        data[data.len() - 6],
        data[data.len() - 5],
    ]);
    if stored_crc != crc32(&out) {
        return Err(Error::DecompressionError);
    }
    // ISIZE trailer: original length mod 2^32.
    let stored_len = u32::from_le_bytes([
        data[data.len() - 4],
        data[data.len() - 3],
        data[data.len() - 2],
        data[data.len() - 1],
    ]);
    if stored_len != out.len() as u32 {
        return Err(Error::DecompressionError);
    }
    Ok(out)
}

/// Compress bytes into a single-member gzip stream.
pub fn compress(data: &[u8]) -> Vec<u8> {
    let deflated = miniz_oxide::deflate::compress_to_vec(data, 6);
    let mut out = Vec::with_capacity(deflated.len() + 18);
    // Fixed member header: magic, deflate method, no flags, zero mtime,
    // default XFL, unknown OS.
    out.extend_from_slice(&[GZIP_MAGIC[0], GZIP_MAGIC[1], 8, 0, 0, 0, 0, 0, 0, 0xff]);
    out.extend_from_slice(&deflated);
    out.extend_from_slice(&crc32(data).to_le_bytes());
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out
}

/// CRC-32 (IEEE 802.3 polynomial, reflected) over the whole buffer.
fn crc32(data: &[u8]) -> u32 {
    let mut crc: u32 = 0xFFFF_FFFF;
    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xEDB8_8320 & mask);
        }
    }
    !crc
}
