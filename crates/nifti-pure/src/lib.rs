#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod datatype;
pub mod endian;
pub mod error;
pub mod extension;
pub mod geometry;
pub mod gzip;
pub mod header;
pub mod orientation;
pub mod rescale;
pub mod volume;

pub use datatype::DataType;
pub use error::{Error, Result};
pub use geometry::{ImageHeader, ImageSize};
pub use header::{NiftiVersion, RawNiftiHeader, NIFTI1_HEADER_SIZE, NIFTI2_HEADER_SIZE};
pub use orientation::Affine;
pub use volume::NiftiVolume;

#[cfg(feature = "std")]
pub mod file;
#[cfg(feature = "std")]
pub mod space;

#[cfg(feature = "std")]
pub use space::SpaceRegistry;
