//! Integration tests for the space registry, driven through the full
//! decode path: bytes → header → geometry → registry binding.

use std::sync::Arc;
use std::thread;

use nifti_pure::datatype::DataType;
use nifti_pure::geometry::ImageHeader;
use nifti_pure::header::RawNiftiHeader;
use nifti_pure::volume::{parse_nifti, serialize_nifti, NiftiVolume};
use nifti_pure::{Error, SpaceRegistry};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Encode and decode a T1-like volume, returning its logical geometry.
fn decoded_header(volumes: i64, qoffset_x: f64) -> ImageHeader {
    let header = RawNiftiHeader {
        dim: if volumes > 1 {
            [4, 64, 64, 30, volumes, 1, 1, 1]
        } else {
            [3, 64, 64, 30, 1, 1, 1, 1]
        },
        datatype: DataType::Uint8.code(),
        bitpix: DataType::Uint8.bitpix(),
        qform_code: 1,
        pixdim: [1.0, 1.0, 1.0, 2.5, 1.0, 1.0, 1.0, 1.0],
        qoffset_x,
        ..RawNiftiHeader::default()
    };
    let data = vec![0u8; (64 * 64 * 30 * volumes) as usize];
    let bytes = serialize_nifti(&NiftiVolume { header, data }).unwrap();
    let parsed = parse_nifti(&bytes).unwrap();
    ImageHeader::from_raw(&parsed.header).unwrap()
}

// ===========================================================================
// Binding and idempotence
// ===========================================================================

#[test]
fn matching_reinitialise_is_silent() {
    let registry = SpaceRegistry::new();
    registry.initialise("BrainT1", &decoded_header(1, -90.0)).unwrap();
    registry.initialise("BrainT1", &decoded_header(1, -90.0)).unwrap();
}

#[test]
fn ten_millimetre_shift_fails_nanometre_shift_passes() {
    let registry = SpaceRegistry::new();
    registry.initialise("BrainT1", &decoded_header(1, -90.0)).unwrap();

    // 10 mm away: a different physical space.
    let err = registry
        .initialise("BrainT1", &decoded_header(1, -80.0))
        .unwrap_err();
    assert!(matches!(err, Error::OrientationMismatch { .. }));

    // 1e-6 mm away: serialization noise, accepted.
    registry
        .initialise("BrainT1", &decoded_header(1, -90.0 + 1e-6))
        .unwrap();
}

#[test]
fn three_d_only_space_rejects_series() {
    let registry = SpaceRegistry::new();
    registry.mark_three_dimensional("BrainT1");
    registry.initialise("BrainT1", &decoded_header(1, 0.0)).unwrap();

    let err = registry
        .initialise("BrainT1", &decoded_header(100, 0.0))
        .unwrap_err();
    assert!(matches!(err, Error::ThreeDimensionalSpace(name) if name == "BrainT1"));
}

#[test]
fn bold_series_must_sit_on_anatomical_grid() {
    let registry = SpaceRegistry::new();
    registry.declare_matches("BrainBold", "BrainT1");
    registry.initialise("BrainT1", &decoded_header(1, -90.0)).unwrap();

    // Same grid with many volumes binds fine.
    registry
        .initialise("BrainBold", &decoded_header(200, -90.0))
        .unwrap();

    let registry = SpaceRegistry::new();
    registry.declare_matches("BrainBold", "BrainT1");
    registry.initialise("BrainT1", &decoded_header(1, -90.0)).unwrap();
    let err = registry
        .initialise("BrainBold", &decoded_header(200, -50.0))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::OrientationMismatch { space, other }
            if space == "BrainBold" && other == "BrainT1"
    ));
}

// ===========================================================================
// Concurrency
// ===========================================================================

#[test]
fn parallel_initialise_of_one_space() {
    let registry = Arc::new(SpaceRegistry::new());
    let handles: Vec<_> = (0..16)
        .map(|_| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || registry.initialise("Shared", &decoded_header(1, -90.0)))
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }
    assert!(registry.get("Shared").is_some());
}

#[test]
fn parallel_initialise_across_related_spaces() {
    let registry = Arc::new(SpaceRegistry::new());
    registry.declare_matches("BrainBold", "BrainT1");

    let t1 = {
        let registry = Arc::clone(&registry);
        thread::spawn(move || registry.initialise("BrainT1", &decoded_header(1, -90.0)))
    };
    let bold = {
        let registry = Arc::clone(&registry);
        thread::spawn(move || registry.initialise("BrainBold", &decoded_header(50, -90.0)))
    };
    t1.join().unwrap().unwrap();
    bold.join().unwrap().unwrap();
}
