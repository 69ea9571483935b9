//! NIfTI header extension records (TLV blocks between the fixed header and
//! the voxel data).
//!
//! Each record is preceded by a 4-byte flag group; a zero flag byte ends the
//! list. Record sizes are rounded up to 16-byte multiples and null-padded.

use alloc::vec::Vec;

use crate::endian::{read_i32_le, write_i32_le};
use crate::error::{Error, Result};

/// A single header extension record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    /// The ecode identifying the payload format (e.g. 4 = AFNI, 6 = comment,
    /// 32 = CIfTI).
    pub code: i32,
    /// Payload bytes exactly as stored, including any trailing null padding.
    pub payload: Vec<u8>,
}

impl Extension {
    /// Create an extension, null-padding the payload so that the on-disk
    /// record size (payload + 8 bytes of esize/ecode) is a 16-byte multiple.
    pub fn new(code: i32, mut payload: Vec<u8>) -> Extension {
        let record = 8 + payload.len();
        let padded = record.div_ceil(16) * 16;
        payload.resize(padded - 8, 0);
        Extension { code, payload }
    }

    /// On-disk record size: esize + ecode fields plus the payload.
    pub fn record_size(&self) -> usize {
        8 + self.payload.len()
    }
}

/// Total bytes the extension list occupies on disk, including the per-record
/// flag groups and the terminating zero flag group.
pub fn serialized_len(extensions: &[Extension]) -> usize {
    extensions
        .iter()
        .map(|e| 4 + e.record_size())
        .sum::<usize>()
        + 4
}

/// Parse the extension list that follows the fixed header.
///
/// Returns the records and the number of bytes consumed. Reading stops at
/// the first zero flag byte; `data` running out mid-record is an error.
pub fn parse_extensions(data: &[u8]) -> Result<(Vec<Extension>, usize)> {
    let mut extensions = Vec::new();
    let mut pos = 0;

    loop {
        if data.len() < pos + 4 {
            return Err(Error::UnexpectedEof);
        }
        let flag = data[pos];
        pos += 4; // flag byte plus 3 reserved bytes
        if flag == 0 {
            return Ok((extensions, pos));
        }

        if data.len() < pos + 8 {
            return Err(Error::UnexpectedEof);
        }
        let esize = read_i32_le(&data[pos..]);
        let code = read_i32_le(&data[pos + 4..]);
        pos += 8;

        if esize < 8 {
            return Err(Error::UnexpectedEof);
        }
        let payload_len = (esize - 8) as usize;
        if data.len() < pos + payload_len {
            return Err(Error::UnexpectedEof);
        }
        extensions.push(Extension {
            code,
            payload: data[pos..pos + payload_len].to_vec(),
        });
        pos += payload_len;
    }
}

/// Serialize the extension list, terminated by a zero flag group.
pub fn serialize_extensions(extensions: &[Extension]) -> Vec<u8> {
    let mut out = Vec::with_capacity(serialized_len(extensions));
    for ext in extensions {
        out.extend_from_slice(&[1, 0, 0, 0]);
        let mut size_buf = [0u8; 4];
        write_i32_le(&mut size_buf, ext.record_size() as i32);
        out.extend_from_slice(&size_buf);
        write_i32_le(&mut size_buf, ext.code);
        out.extend_from_slice(&size_buf);
        out.extend_from_slice(&ext.payload);
    }
    out.extend_from_slice(&[0, 0, 0, 0]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn new_pads_to_16_byte_multiple() {
        let ext = Extension::new(6, b"hello".to_vec());
        // 8 + 5 = 13 rounds up to 16, so the payload grows to 8 bytes.
        assert_eq!(ext.record_size(), 16);
        assert_eq!(&ext.payload[..5], b"hello");
        assert!(ext.payload[5..].iter().all(|&b| b == 0));
    }

    #[test]
    fn new_exact_multiple_unchanged() {
        let ext = Extension::new(4, vec![0xAA; 8]);
        assert_eq!(ext.record_size(), 16);
        assert_eq!(ext.payload.len(), 8);
    }

    #[test]
    fn new_empty_payload() {
        let ext = Extension::new(6, Vec::new());
        // 8 bytes of esize/ecode round up to 16.
        assert_eq!(ext.record_size(), 16);
        assert_eq!(ext.payload.len(), 8);
    }

    #[test]
    fn empty_list_is_zero_extender() {
        let bytes = serialize_extensions(&[]);
        assert_eq!(bytes, vec![0, 0, 0, 0]);
        let (exts, consumed) = parse_extensions(&bytes).unwrap();
        assert!(exts.is_empty());
        assert_eq!(consumed, 4);
    }

    #[test]
    fn roundtrip_two_records() {
        let a = Extension::new(6, b"a comment".to_vec());
        let b = Extension::new(4, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        let bytes = serialize_extensions(&[a.clone(), b.clone()]);

        let (parsed, consumed) = parse_extensions(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(parsed, vec![a, b]);
    }

    #[test]
    fn serialized_len_matches() {
        let exts = [
            Extension::new(6, b"x".to_vec()),
            Extension::new(32, vec![0; 40]),
        ];
        assert_eq!(serialized_len(&exts), serialize_extensions(&exts).len());
    }

    #[test]
    fn parse_stops_at_zero_flag() {
        let mut bytes = serialize_extensions(&[Extension::new(6, b"data".to_vec())]);
        // Voxel bytes after the terminator must not be consumed.
        let list_len = bytes.len();
        bytes.extend_from_slice(&[0xEE; 32]);
        let (exts, consumed) = parse_extensions(&bytes).unwrap();
        assert_eq!(exts.len(), 1);
        assert_eq!(consumed, list_len);
    }

    #[test]
    fn truncated_flag_group_errors() {
        assert!(matches!(
            parse_extensions(&[1, 0]),
            Err(Error::UnexpectedEof)
        ));
    }

    #[test]
    fn truncated_payload_errors() {
        let bytes = serialize_extensions(&[Extension::new(6, vec![0; 24])]);
        assert!(matches!(
            parse_extensions(&bytes[..bytes.len() - 10]),
            Err(Error::UnexpectedEof)
        ));
    }

    #[test]
    fn bogus_esize_errors() {
        // flag group, then esize = 4 which cannot even hold its own fields
        let mut bytes = vec![1, 0, 0, 0];
        bytes.extend_from_slice(&4i32.to_le_bytes());
        bytes.extend_from_slice(&6i32.to_le_bytes());
        assert!(parse_extensions(&bytes).is_err());
    }
}
