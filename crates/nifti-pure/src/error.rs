use alloc::string::String;

/// All errors that can occur during NIfTI I/O and space-registry operations.
#[derive(Debug)]
pub enum Error {
    /// The leading size field is neither 348 (NIfTI-1) nor 540 (NIfTI-2).
    InvalidHeaderSize(i32),
    /// The size field reads as a byte-swapped 348: the file is big-endian,
    /// which this crate refuses to misread silently.
    BigEndianFile,
    /// The magic bytes do not name a NIfTI file of the declared version.
    InvalidMagic([u8; 4]),
    /// Premature end of data while reading.
    UnexpectedEof,
    /// The datatype code is not in the supported set (includes code 1,
    /// bit-packed boolean, which the writer rejects as well).
    UnsupportedDataType(i16),
    /// Neither qform_code nor sform_code is positive; the header carries no
    /// usable voxel-to-world transform.
    MissingOrientation,
    /// Two spaces that must share an orientation disagree beyond tolerance.
    OrientationMismatch {
        /// The space being initialised.
        space: String,
        /// The already-bound space (or the same space on re-initialise).
        other: String,
    },
    /// An image dimension is zero or negative.
    InvalidImageSize,
    /// A multi-volume header was bound to a space declared inherently 3-D.
    ThreeDimensionalSpace(String),
    /// Series assembly received incompatible inputs.
    DimensionMismatch(&'static str),
    /// A gzip stream could not be decompressed.
    DecompressionError,
    /// An I/O error from the standard library.
    #[cfg(feature = "std")]
    Io(std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::InvalidHeaderSize(v) => write!(f, "invalid NIfTI header size: {v}"),
            Error::BigEndianFile => write!(f, "big-endian NIfTI files are not supported"),
            Error::InvalidMagic(m) => write!(f, "invalid NIfTI magic bytes: {m:02x?}"),
            Error::UnexpectedEof => write!(f, "unexpected end of file"),
            Error::UnsupportedDataType(code) => write!(f, "unsupported datatype code: {code}"),
            Error::MissingOrientation => {
                write!(f, "header carries neither a qform nor an sform transform")
            }
            Error::OrientationMismatch { space, other } => {
                write!(f, "orientation of space '{space}' does not match '{other}'")
            }
            Error::InvalidImageSize => write!(f, "image dimensions must all be at least 1"),
            Error::ThreeDimensionalSpace(space) => {
                write!(f, "space '{space}' is 3-D only and cannot hold a multi-volume image")
            }
            Error::DimensionMismatch(what) => write!(f, "dimension mismatch: {what}"),
            Error::DecompressionError => write!(f, "gzip decompression failed"),
            #[cfg(feature = "std")]
            Error::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(feature = "std")]
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}
