//! Process-wide binding of named acquisition spaces to image geometry.
//!
//! A *space* is a name (e.g. `"BrainT1"`) that many images claim to share.
//! The registry binds the first geometry seen for each space and holds every
//! later claimant to it within tolerance, so two images that disagree about
//! where the brain sits fail loudly at load time instead of silently
//! misaligning downstream.
//!
//! The registry is an explicit object handed to whoever needs it; there is
//! no global singleton. One mutex covers the whole state, held only for a
//! handful of comparisons per call.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::geometry::ImageHeader;

#[derive(Default)]
struct RegistryState {
    /// Space name → the geometry it was first initialised with.
    bound: HashMap<String, ImageHeader>,
    /// Spaces that may only ever hold single-volume images.
    three_d_only: HashSet<String>,
    /// child → parents edges declared via `declare_matches`.
    parents: HashMap<String, Vec<String>>,
}

impl RegistryState {
    /// Names reachable from `space` along the given edge direction,
    /// transitively, excluding `space` itself. The declarations form a DAG
    /// but a visited set keeps accidental cycles from spinning.
    fn reachable(&self, space: &str, upward: bool) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(space.to_string());
        seen.insert(space.to_string());
        let mut out = Vec::new();

        while let Some(current) = queue.pop_front() {
            let next: Vec<String> = if upward {
                self.parents.get(&current).cloned().unwrap_or_default()
            } else {
                self.parents
                    .iter()
                    .filter(|(_, ps)| ps.iter().any(|p| p == &current))
                    .map(|(child, _)| child.clone())
                    .collect()
            };
            for name in next {
                if seen.insert(name.clone()) {
                    out.push(name.clone());
                    queue.push_back(name);
                }
            }
        }
        out
    }
}

/// Registry of named spaces and the geometry bound to each.
pub struct SpaceRegistry {
    state: Mutex<RegistryState>,
}

impl Default for SpaceRegistry {
    fn default() -> Self {
        SpaceRegistry::new()
    }
}

impl SpaceRegistry {
    pub fn new() -> SpaceRegistry {
        SpaceRegistry {
            state: Mutex::new(RegistryState::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RegistryState> {
        // A panic while holding the lock leaves the state usable; recover
        // the guard rather than cascading the poison.
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Declare that `child` must share its spatial orientation with
    /// `parent` (e.g. a BOLD series acquired in the session's anatomical
    /// space). Declarations are static structure, made before images load.
    pub fn declare_matches(&self, child: &str, parent: &str) {
        let mut state = self.lock();
        let parents = state.parents.entry(child.to_string()).or_default();
        if !parents.iter().any(|p| p == parent) {
            parents.push(parent.to_string());
        }
    }

    /// Restrict `space` to single-volume images.
    pub fn mark_three_dimensional(&self, space: &str) {
        self.lock().three_d_only.insert(space.to_string());
    }

    /// Bind `space` to `header`, or verify an existing binding.
    ///
    /// First initialisation binds after checking every already-bound
    /// ancestor and descendant agrees with the 3-D sub-orientation within
    /// tolerance. Re-initialising with a matching geometry is a silent
    /// no-op; any disagreement is an [`Error::OrientationMismatch`] naming
    /// both spaces.
    pub fn initialise(&self, space: &str, header: &ImageHeader) -> Result<()> {
        // `ImageHeader` construction already rejects empty extents, so state
        // is only ever touched with a valid geometry.
        let mut state = self.lock();

        if header.size.volumes() > 1 && state.three_d_only.contains(space) {
            return Err(Error::ThreeDimensionalSpace(space.to_string()));
        }

        // Related spaces share the 3-D grid; volume counts may differ.
        let mut related = state.reachable(space, true);
        related.extend(state.reachable(space, false));
        for name in related {
            if let Some(bound) = state.bound.get(&name) {
                if !header.matches_ignoring_volumes(bound) {
                    return Err(Error::OrientationMismatch {
                        space: space.to_string(),
                        other: name,
                    });
                }
            }
        }

        match state.bound.get(space) {
            None => {
                state.bound.insert(space.to_string(), header.clone());
                Ok(())
            }
            Some(bound) if header.matches(bound) => Ok(()),
            Some(_) => Err(Error::OrientationMismatch {
                space: space.to_string(),
                other: space.to_string(),
            }),
        }
    }

    /// The geometry currently bound to `space`, if any.
    pub fn get(&self, space: &str) -> Option<ImageHeader> {
        self.lock().bound.get(space).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{ImageSize, XformCode};
    use crate::orientation::IDENTITY;
    use std::sync::Arc;

    fn brain_header(volumes: u64) -> ImageHeader {
        ImageHeader {
            size: ImageSize::new(64, 64, 30, volumes).unwrap(),
            affine: IDENTITY,
            frame: XformCode::ScannerAnat,
            freq_dim: 0,
            phase_dim: 0,
            slice_dim: 0,
        }
    }

    #[test]
    fn first_initialise_binds() {
        let registry = SpaceRegistry::new();
        assert!(registry.get("BrainT1").is_none());
        registry.initialise("BrainT1", &brain_header(1)).unwrap();
        assert_eq!(registry.get("BrainT1").unwrap(), brain_header(1));
    }

    #[test]
    fn reinitialise_matching_is_noop() {
        let registry = SpaceRegistry::new();
        let header = brain_header(1);
        registry.initialise("BrainT1", &header).unwrap();
        registry.initialise("BrainT1", &header).unwrap();

        // A sub-tolerance nudge (1e-6 mm against a 1 mm grid) also passes.
        let mut nudged = header.clone();
        nudged.affine[0][3] += 1e-6;
        registry.initialise("BrainT1", &nudged).unwrap();
    }

    #[test]
    fn reinitialise_shifted_fails() {
        let registry = SpaceRegistry::new();
        let header = brain_header(1);
        registry.initialise("BrainT1", &header).unwrap();

        let mut shifted = header.clone();
        shifted.affine[0][3] += 10.0;
        let err = registry.initialise("BrainT1", &shifted).unwrap_err();
        assert!(matches!(
            err,
            Error::OrientationMismatch { space, other }
                if space == "BrainT1" && other == "BrainT1"
        ));
        // The original binding survives.
        assert_eq!(registry.get("BrainT1").unwrap(), header);
    }

    #[test]
    fn three_d_only_rejects_series() {
        let registry = SpaceRegistry::new();
        registry.mark_three_dimensional("BrainT1");
        registry.initialise("BrainT1", &brain_header(1)).unwrap();
        assert!(matches!(
            registry.initialise("BrainT1", &brain_header(5)),
            Err(Error::ThreeDimensionalSpace(_))
        ));
    }

    #[test]
    fn declared_parent_must_match() {
        let registry = SpaceRegistry::new();
        registry.declare_matches("BrainBold", "BrainT1");
        registry.initialise("BrainT1", &brain_header(1)).unwrap();

        // Same grid, more volumes: fine.
        registry.initialise("BrainBold", &brain_header(100)).unwrap();

        let registry = SpaceRegistry::new();
        registry.declare_matches("BrainBold", "BrainT1");
        registry.initialise("BrainT1", &brain_header(1)).unwrap();
        let mut moved = brain_header(100);
        moved.affine[2][3] += 4.0;
        let err = registry.initialise("BrainBold", &moved).unwrap_err();
        assert!(matches!(
            err,
            Error::OrientationMismatch { space, other }
                if space == "BrainBold" && other == "BrainT1"
        ));
    }

    #[test]
    fn descendant_binding_checked_from_parent_side() {
        let registry = SpaceRegistry::new();
        registry.declare_matches("BrainBold", "BrainT1");
        // The child binds first; the parent must then agree with it.
        registry.initialise("BrainBold", &brain_header(100)).unwrap();

        let mut moved = brain_header(1);
        moved.affine[0][3] += 2.0;
        assert!(registry.initialise("BrainT1", &moved).is_err());
        registry.initialise("BrainT1", &brain_header(1)).unwrap();
    }

    #[test]
    fn transitive_ancestors_checked() {
        let registry = SpaceRegistry::new();
        registry.declare_matches("B", "A");
        registry.declare_matches("C", "B");
        registry.initialise("A", &brain_header(1)).unwrap();

        let mut moved = brain_header(1);
        moved.affine[1][3] += 3.0;
        let err = registry.initialise("C", &moved).unwrap_err();
        assert!(matches!(err, Error::OrientationMismatch { .. }));
    }

    #[test]
    fn unrelated_spaces_do_not_interact() {
        let registry = SpaceRegistry::new();
        registry.initialise("BrainT1", &brain_header(1)).unwrap();

        let mut other = brain_header(1);
        other.affine[0][3] += 50.0;
        registry.initialise("Phantom", &other).unwrap();
    }

    #[test]
    fn concurrent_initialise_agrees() {
        let registry = Arc::new(SpaceRegistry::new());
        let header = brain_header(1);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let header = header.clone();
                std::thread::spawn(move || registry.initialise("Shared", &header))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }
        assert_eq!(registry.get("Shared").unwrap(), header);
    }

    #[test]
    fn concurrent_mismatch_binds_exactly_one() {
        let registry = Arc::new(SpaceRegistry::new());
        let a = brain_header(1);
        let mut b = brain_header(1);
        b.affine[0][3] += 10.0;

        let handles: Vec<_> = [a.clone(), b.clone(), a.clone(), b.clone()]
            .into_iter()
            .map(|h| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.initialise("Contested", &h))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        // Whichever geometry won, its duplicate succeeded and the other
        // geometry's attempts failed.
        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 2);
        let bound = registry.get("Contested").unwrap();
        assert!(bound == a || bound == b);
    }
}
