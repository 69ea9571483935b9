//! Little-endian byte conversion for NIfTI data.
//!
//! NIfTI files supported by this crate store all binary fields little-endian
//! (most-significant byte last). Big-endian files are detected by the header
//! codec and rejected explicitly rather than misread here.

/// Read a `u8` from the first byte of the slice.
#[inline]
pub fn read_u8(buf: &[u8]) -> u8 {
    buf[0]
}

/// Read a little-endian `i16` from the first 2 bytes of the slice.
#[inline]
pub fn read_i16_le(buf: &[u8]) -> i16 {
    i16::from_le_bytes([buf[0], buf[1]])
}

/// Read a little-endian `u16` from the first 2 bytes of the slice.
#[inline]
pub fn read_u16_le(buf: &[u8]) -> u16 {
    u16::from_le_bytes([buf[0], buf[1]])
}

/// Read a little-endian `i32` from the first 4 bytes of the slice.
#[inline]
pub fn read_i32_le(buf: &[u8]) -> i32 {
    i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]])
}

/// Read a little-endian `u32` from the first 4 bytes of the slice.
#[inline]
pub fn read_u32_le(buf: &[u8]) -> u32 {
    u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]])
}

/// Read a little-endian `i64` from the first 8 bytes of the slice.
#[inline]
pub fn read_i64_le(buf: &[u8]) -> i64 {
    i64::from_le_bytes([
        buf[0], buf[1], buf[2], buf[3], buf[4], buf[5], buf[6], buf[7],
    ])
}

/// Read a little-endian `u64` from the first 8 bytes of the slice.
#[inline]
pub fn read_u64_le(buf: &[u8]) -> u64 {
    u64::from_le_bytes([
        buf[0], buf[1], buf[2], buf[3], buf[4], buf[5], buf[6], buf[7],
    ])
}

/// Read a little-endian `f32` (IEEE 754) from the first 4 bytes of the slice.
#[inline]
pub fn read_f32_le(buf: &[u8]) -> f32 {
    f32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]])
}

/// Read a little-endian `f64` (IEEE 754) from the first 8 bytes of the slice.
#[inline]
pub fn read_f64_le(buf: &[u8]) -> f64 {
    f64::from_le_bytes([
        buf[0], buf[1], buf[2], buf[3], buf[4], buf[5], buf[6], buf[7],
    ])
}

// --- Single-value writes ---

/// Write a `u8` into the first byte of the slice.
#[inline]
pub fn write_u8(buf: &mut [u8], val: u8) {
    buf[0] = val;
}

/// Write an `i16` in little-endian format into the first 2 bytes of the slice.
#[inline]
pub fn write_i16_le(buf: &mut [u8], val: i16) {
    buf[..2].copy_from_slice(&val.to_le_bytes());
}

/// Write a `u16` in little-endian format into the first 2 bytes of the slice.
#[inline]
pub fn write_u16_le(buf: &mut [u8], val: u16) {
    buf[..2].copy_from_slice(&val.to_le_bytes());
}

/// Write an `i32` in little-endian format into the first 4 bytes of the slice.
#[inline]
pub fn write_i32_le(buf: &mut [u8], val: i32) {
    buf[..4].copy_from_slice(&val.to_le_bytes());
}

/// Write a `u32` in little-endian format into the first 4 bytes of the slice.
#[inline]
pub fn write_u32_le(buf: &mut [u8], val: u32) {
    buf[..4].copy_from_slice(&val.to_le_bytes());
}

/// Write an `i64` in little-endian format into the first 8 bytes of the slice.
#[inline]
pub fn write_i64_le(buf: &mut [u8], val: i64) {
    buf[..8].copy_from_slice(&val.to_le_bytes());
}

/// Write a `u64` in little-endian format into the first 8 bytes of the slice.
#[inline]
pub fn write_u64_le(buf: &mut [u8], val: u64) {
    buf[..8].copy_from_slice(&val.to_le_bytes());
}

/// Write an `f32` in little-endian format into the first 4 bytes of the slice.
#[inline]
pub fn write_f32_le(buf: &mut [u8], val: f32) {
    buf[..4].copy_from_slice(&val.to_le_bytes());
}

/// Write an `f64` in little-endian format into the first 8 bytes of the slice.
#[inline]
pub fn write_f64_le(buf: &mut [u8], val: f64) {
    buf[..8].copy_from_slice(&val.to_le_bytes());
}
