//! Virtual-source descriptors: one entry per enumerated path, keyed by a
//! stable string built from the path's reflection/diffraction sequence.

use std::collections::HashMap;
use std::fmt::Write as _;

use sonido_geometry::{DiffractionPath, Id, Wall, room::Edge};

const NUM_BANDS: usize = 4;

/// One hop in a path: a reflection off a wall, or a diffraction around an
/// edge, left-to-right from source to listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathPart {
    Reflection(Id<Wall>),
    Diffraction(Id<Edge>),
}

impl PathPart {
    fn write_key(self, out: &mut String) {
        match self {
            PathPart::Reflection(id) => {
                let _ = write!(out, "{}r", id.raw());
            }
            PathPart::Diffraction(id) => {
                let _ = write!(out, "{}d", id.raw());
            }
        }
    }
}

/// Build the stable path key: "{id}r"/"{id}d" concatenated left to right.
#[must_use]
pub fn path_key(parts: &[PathPart]) -> String {
    let mut key = String::with_capacity(parts.len() * 8);
    for part in parts {
        part.write_key(&mut key);
    }
    key
}

/// One enumerated, geometrically valid and unobstructed path from a
/// source to the listener.
#[derive(Debug, Clone)]
pub struct VsDescriptor {
    pub parts: Vec<PathPart>,
    pub key: String,
    /// Reflected/apex position the spatialiser renders from.
    pub image_position: sonido_geometry::Vec3,
    /// Product of per-band reflectances along reflection segments only.
    pub accumulated_reflectance: [f32; NUM_BANDS],
    /// Present iff the path's last hop is a diffraction.
    pub diffraction_path: Option<DiffractionPath>,
    /// Total propagation distance, for delay and air absorption.
    pub total_distance: f32,
    /// Whether this VS also feeds the FDN's input row.
    pub feeds_fdn: bool,
    /// Allocated lazily when `feeds_fdn` is true; released when the VS
    /// is dropped from the map (see [`crate::channel::FdnChannelAllocator`]).
    pub fdn_channel: Option<usize>,
}

impl VsDescriptor {
    #[must_use]
    pub fn direct(source_position: sonido_geometry::Vec3, distance: f32) -> Self {
        Self {
            parts: Vec::new(),
            key: String::new(),
            image_position: source_position,
            accumulated_reflectance: [1.0; NUM_BANDS],
            diffraction_path: None,
            total_distance: distance,
            feeds_fdn: false,
            fdn_channel: None,
        }
    }
}

/// Per-source set of currently live VS, keyed by path key.
#[derive(Debug, Clone, Default)]
pub struct VsMap {
    pub entries: HashMap<String, VsDescriptor>,
}

/// Result of diffing a new IEM snapshot against the audio thread's
/// previous VS map for one source.
#[derive(Debug, Default)]
pub struct VsMapDiff {
    /// Keys new in this snapshot: create with zero gain, target 1.
    pub added: Vec<VsDescriptor>,
    /// Keys present before and now: retarget geometry/filters in place.
    pub updated: Vec<VsDescriptor>,
    /// Keys absent from the new snapshot: start a fade to zero gain.
    pub removed: Vec<String>,
}

impl VsMap {
    #[must_use]
    pub fn diff_against(&self, previous_keys: &std::collections::HashSet<String>) -> VsMapDiff {
        let mut diff = VsMapDiff::default();
        for (key, descriptor) in &self.entries {
            if previous_keys.contains(key) {
                diff.updated.push(descriptor.clone());
            } else {
                diff.added.push(descriptor.clone());
            }
        }
        for key in previous_keys {
            if !self.entries.contains_key(key) {
                diff.removed.push(key.clone());
            }
        }
        diff
    }

    #[must_use]
    pub fn keys(&self) -> std::collections::HashSet<String> {
        self.entries.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_key_concatenates_reflection_then_diffraction() {
        let parts = [PathPart::Reflection(Id::<Wall>::from_raw(3)), PathPart::Diffraction(Id::<Edge>::from_raw(7))];
        assert_eq!(path_key(&parts), "3r7d");
    }

    #[test]
    fn diff_classifies_added_updated_removed() {
        let mut map = VsMap::default();
        map.entries.insert("1r".to_string(), VsDescriptor::direct(sonido_geometry::Vec3::ZERO, 1.0));
        map.entries.insert("2r".to_string(), VsDescriptor::direct(sonido_geometry::Vec3::ZERO, 2.0));

        let mut previous = std::collections::HashSet::new();
        previous.insert("1r".to_string());
        previous.insert("9r".to_string());

        let diff = map.diff_against(&previous);
        assert_eq!(diff.updated.len(), 1);
        assert_eq!(diff.added.len(), 1);
        assert_eq!(diff.removed, vec!["9r".to_string()]);
    }
}
