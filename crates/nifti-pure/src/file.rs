//! Filesystem convenience layer: path-based read/write with suffix-driven
//! gzip, and a streaming reader that never trusts a length field with an
//! unbounded allocation.

use std::io::Read;
use std::path::Path;

use crate::error::{Error, Result};
use crate::gzip;
use crate::header::{
    RawNiftiHeader, BYTE_SWAPPED_SIZE, NIFTI1_HEADER_SIZE, NIFTI2_HEADER_SIZE,
};
use crate::volume::{self, NiftiVolume};

/// Streaming payload reads happen in chunks of this size, so a corrupt or
/// hostile header cannot trigger one giant upfront allocation.
const READ_CHUNK: usize = 1 << 20;

fn map_eof(e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        Error::UnexpectedEof
    } else {
        Error::Io(e)
    }
}

/// Read a NIfTI image from a path. Gzip is detected from the content magic,
/// so a mislabeled `.nii` that is actually compressed still loads.
pub fn read_path<P: AsRef<Path>>(path: P) -> Result<NiftiVolume> {
    let file = std::fs::File::open(path)?;
    parse_nifti_reader(std::io::BufReader::new(file))
}

/// Write a NIfTI image to a path; a name ending in `.gz` selects the
/// compressed layout.
pub fn write_path<P: AsRef<Path>>(path: P, volume: &NiftiVolume) -> Result<()> {
    let path = path.as_ref();
    let compressed = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("gz"));
    let bytes = if compressed {
        volume::serialize_nifti_gz(volume)?
    } else {
        volume::serialize_nifti(volume)?
    };
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Parse a NIfTI image from any `Read` source.
///
/// The header and extensions are read exactly; the voxel payload is pulled
/// in [`READ_CHUNK`] pieces up to the byte count the dims imply. A gzipped
/// source offers no random access, so it is inflated whole first.
pub fn parse_nifti_reader<R: Read>(mut reader: R) -> Result<NiftiVolume> {
    let mut head = [0u8; 4];
    reader.read_exact(&mut head).map_err(map_eof)?;
    if gzip::is_gzip(&head) {
        let mut packed = head.to_vec();
        reader.read_to_end(&mut packed)?;
        return volume::parse_nifti(&packed);
    }

    // Pull the rest of the fixed header, then the extension records, into
    // one prefix buffer so the slice parser stays the single code path.
    let sizeof_hdr = i32::from_le_bytes(head);
    let header_size = match sizeof_hdr {
        s if s == NIFTI1_HEADER_SIZE as i32 => NIFTI1_HEADER_SIZE,
        s if s == NIFTI2_HEADER_SIZE as i32 => NIFTI2_HEADER_SIZE,
        BYTE_SWAPPED_SIZE => return Err(Error::BigEndianFile),
        other => return Err(Error::InvalidHeaderSize(other)),
    };
    let mut prefix = head.to_vec();
    prefix.resize(header_size, 0);
    reader.read_exact(&mut prefix[4..]).map_err(map_eof)?;

    loop {
        let mut flags = [0u8; 4];
        reader.read_exact(&mut flags).map_err(map_eof)?;
        prefix.extend_from_slice(&flags);
        if flags[0] == 0 {
            break;
        }
        let mut sizes = [0u8; 8];
        reader.read_exact(&mut sizes).map_err(map_eof)?;
        prefix.extend_from_slice(&sizes);
        let esize = i32::from_le_bytes([sizes[0], sizes[1], sizes[2], sizes[3]]);
        if esize < 8 {
            return Err(Error::UnexpectedEof);
        }
        // Pull the payload in pieces, so a hostile esize runs the source
        // dry instead of forcing one multi-gigabyte allocation up front.
        let mut payload_remaining = (esize - 8) as u64;
        while payload_remaining > 0 {
            let take = payload_remaining.min(READ_CHUNK as u64) as usize;
            let start = prefix.len();
            prefix.resize(start + take, 0);
            reader.read_exact(&mut prefix[start..]).map_err(map_eof)?;
            payload_remaining -= take as u64;
        }
    }

    let header = RawNiftiHeader::parse(&prefix)?;

    // Skip any slack between the extension list and the declared offset.
    let offset = header.vox_offset;
    if offset < prefix.len() as i64 {
        return Err(Error::UnexpectedEof);
    }
    let mut slack = offset as u64 - prefix.len() as u64;
    let mut buf = vec![0u8; READ_CHUNK];
    while slack > 0 {
        let take = slack.min(READ_CHUNK as u64) as usize;
        reader.read_exact(&mut buf[..take]).map_err(map_eof)?;
        slack -= take as u64;
    }

    let mut remaining = header.data_byte_count()?;
    let mut data = Vec::new();
    while remaining > 0 {
        let take = remaining.min(READ_CHUNK as u64) as usize;
        reader.read_exact(&mut buf[..take]).map_err(map_eof)?;
        data.extend_from_slice(&buf[..take]);
        remaining -= take as u64;
    }

    Ok(NiftiVolume { header, data })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatype::DataType;
    use crate::extension::Extension;
    use std::io::Cursor;

    fn small_volume() -> NiftiVolume {
        let header = RawNiftiHeader {
            dim: [3, 4, 4, 2, 1, 1, 1, 1],
            datatype: DataType::Int16.code(),
            bitpix: DataType::Int16.bitpix(),
            qform_code: 1,
            ..RawNiftiHeader::default()
        };
        let data: Vec<u8> = (0..4 * 4 * 2 * 2).map(|i| i as u8).collect();
        NiftiVolume { header, data }
    }

    #[test]
    fn path_roundtrip_plain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.nii");
        let vol = small_volume();

        write_path(&path, &vol).unwrap();
        let back = read_path(&path).unwrap();
        assert_eq!(back.data, vol.data);
        assert_eq!(back.header.dim, vol.header.dim);
    }

    #[test]
    fn path_roundtrip_gzipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.nii.gz");
        let vol = small_volume();

        write_path(&path, &vol).unwrap();
        // The file on disk really is gzip.
        let raw = std::fs::read(&path).unwrap();
        assert!(gzip::is_gzip(&raw));

        let back = read_path(&path).unwrap();
        assert_eq!(back.data, vol.data);
    }

    #[test]
    fn gzip_detected_by_content_not_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mislabeled.nii");
        let vol = small_volume();
        let packed = volume::serialize_nifti_gz(&vol).unwrap();
        std::fs::write(&path, packed).unwrap();

        let back = read_path(&path).unwrap();
        assert_eq!(back.data, vol.data);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = read_path("/nonexistent/image.nii").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn reader_roundtrip_with_extensions() {
        let mut vol = small_volume();
        vol.header.extensions = vec![Extension::new(6, b"streamed".to_vec())];
        let bytes = volume::serialize_nifti(&vol).unwrap();

        let back = parse_nifti_reader(Cursor::new(bytes)).unwrap();
        assert_eq!(back.header.extensions, vol.header.extensions);
        assert_eq!(back.data, vol.data);
    }

    #[test]
    fn reader_truncated_payload() {
        let vol = small_volume();
        let bytes = volume::serialize_nifti(&vol).unwrap();
        let cut = &bytes[..bytes.len() - 3];
        assert!(matches!(
            parse_nifti_reader(Cursor::new(cut.to_vec())),
            Err(Error::UnexpectedEof)
        ));
    }

    #[test]
    fn reader_hostile_extension_size_runs_dry() {
        // An esize claiming ~2 GiB with only a handful of bytes behind it
        // must fail on EOF without allocating anywhere near the claim.
        let vol = small_volume();
        let fixed = vol.header.serialize().unwrap();
        let mut bytes = fixed[..348].to_vec();
        bytes.extend_from_slice(&[1, 0, 0, 0]);
        bytes.extend_from_slice(&i32::MAX.to_le_bytes());
        bytes.extend_from_slice(&6i32.to_le_bytes());
        bytes.extend_from_slice(&[0xAA; 32]);

        assert!(matches!(
            parse_nifti_reader(Cursor::new(bytes)),
            Err(Error::UnexpectedEof)
        ));
    }

    #[test]
    fn reader_bad_size_field() {
        let bytes = vec![9u8, 9, 9, 9];
        assert!(matches!(
            parse_nifti_reader(Cursor::new(bytes)),
            Err(Error::InvalidHeaderSize(_))
        ));
    }

    #[test]
    fn reader_payload_larger_than_chunk() {
        // 128x128x128 u8 = 2 MiB, spanning several read chunks.
        let header = RawNiftiHeader {
            dim: [3, 128, 128, 128, 1, 1, 1, 1],
            datatype: DataType::Uint8.code(),
            bitpix: DataType::Uint8.bitpix(),
            qform_code: 1,
            ..RawNiftiHeader::default()
        };
        let data: Vec<u8> = (0..128usize * 128 * 128).map(|i| (i % 251) as u8).collect();
        let vol = NiftiVolume { header, data };
        let bytes = volume::serialize_nifti(&vol).unwrap();

        let back = parse_nifti_reader(Cursor::new(bytes)).unwrap();
        assert_eq!(back.data, vol.data);
    }
}
