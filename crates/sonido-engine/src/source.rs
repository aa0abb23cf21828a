//! Sources, their per-VS audio chains, and the shared/exclusive source
//! list.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use sonido_geometry::Vec3;
use sonido_iem::{SceneSnapshotProvider, SourceQuery, VsMap};

use crate::directivity::Directivity;
use crate::quaternion::Quat;
use crate::spatializer::SpatialPose;
use crate::vs_chain::VsChain;

/// A sound source's pose and radiation pattern. Cheap to copy; the heavy
/// per-VS DSP state lives in [`SourceAudioData`], behind its own mutex
/// kept separate from the source list's lock.
#[derive(Debug, Clone, Copy)]
pub struct Source {
    pub id: u64,
    pub position: Vec3,
    pub orientation: Quat,
    pub directivity: Directivity,
}

impl Source {
    #[must_use]
    fn query(self) -> SourceQuery {
        SourceQuery { id: self.id, position: self.position, reverb_energy: self.directivity.reverb_energy() }
    }
}

/// The audio-thread-only state for one source: a VS chain per live path
/// key, and the fade/removal bookkeeping a "go silent before reclaim"
/// lifecycle needs.
struct SourceAudioData {
    chains: HashMap<String, VsChain>,
    previous_keys: std::collections::HashSet<String>,
    marked_for_removal: bool,
}

impl SourceAudioData {
    fn new() -> Self {
        Self { chains: HashMap::new(), previous_keys: std::collections::HashSet::new(), marked_for_removal: false }
    }
}

/// Live sources plus their audio-thread state, guarded by a two-tier lock:
/// a shared/exclusive lock over the source list (read for iteration every
/// block, write only on add/remove) and one `audio_data` mutex per source.
pub struct SourceManager {
    sources: RwLock<HashMap<u64, Source>>,
    /// Keyed by source id; an inner `Arc` so a reference can be taken out
    /// and locked without holding the outer map lock across the call.
    audio_data: RwLock<HashMap<u64, Arc<Mutex<SourceAudioData>>>>,
    next_id: std::sync::atomic::AtomicU64,
    listener_position: RwLock<Vec3>,
    listener_orientation: RwLock<Quat>,
}

impl SourceManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sources: RwLock::new(HashMap::new()),
            audio_data: RwLock::new(HashMap::new()),
            next_id: std::sync::atomic::AtomicU64::new(1),
            listener_position: RwLock::new(Vec3::ZERO),
            listener_orientation: RwLock::new(Quat::IDENTITY),
        }
    }

    pub fn set_listener_pose(&self, position: Vec3, orientation: Quat) {
        *self.listener_position.write() = position;
        *self.listener_orientation.write() = orientation;
    }

    #[must_use]
    pub fn listener_position(&self) -> Vec3 {
        *self.listener_position.read()
    }

    #[must_use]
    pub fn listener_orientation(&self) -> Quat {
        *self.listener_orientation.read()
    }

    /// Register a new source, allocating a fresh id. Takes `&self` (the
    /// source list and the audio-data map are each behind their own
    /// shared/exclusive lock) so the manager can live behind one `Arc`
    /// shared with the background IEM thread.
    pub fn init_source(&self, position: Vec3, orientation: Quat, directivity: Directivity) -> u64 {
        let id = self.next_id.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.sources.write().insert(id, Source { id, position, orientation, directivity });
        self.audio_data.write().insert(id, Arc::new(Mutex::new(SourceAudioData::new())));
        id
    }

    pub fn update_source(&self, id: u64, position: Vec3, orientation: Quat) {
        if let Some(source) = self.sources.write().get_mut(&id) {
            source.position = position;
            source.orientation = orientation;
        }
    }

    pub fn update_source_directivity(&self, id: u64, directivity: Directivity) {
        if let Some(source) = self.sources.write().get_mut(&id) {
            source.directivity = directivity;
        }
    }

    /// Mark a source for removal: its VS chains fade to zero gain over
    /// subsequent blocks rather than being dropped immediately, per the
    /// "drains live VS state... before releasing DSP state" lifecycle.
    pub fn remove_source(&self, id: u64) {
        self.sources.write().remove(&id);
        if let Some(data) = self.audio_data.read().get(&id) {
            data.lock().marked_for_removal = true;
        }
    }

    #[must_use]
    pub fn get(&self, id: u64) -> Option<Source> {
        self.sources.read().get(&id).copied()
    }

    #[must_use]
    pub fn ids(&self) -> Vec<u64> {
        self.sources.read().keys().copied().collect()
    }

    /// Reconcile one source's VS chains against its freshly-published IEM
    /// map: create chains for new keys (silent, fading in), retarget
    /// geometry for existing keys, fade out chains whose key dropped out.
    /// Sources marked for removal are fully reclaimed once every chain has
    /// settled silent.
    pub fn sync_vs_chains(
        &self,
        id: u64,
        vs_map: &VsMap,
        sample_rate: f32,
        band_freqs: &[f32],
        max_delay_seconds: f32,
        diffraction_model: sonido_effects::diffraction::DiffractionModelKind,
    ) {
        let Some(data_lock) = self.audio_data.read().get(&id).cloned() else { return };
        let mut data = data_lock.lock();

        let new_keys: std::collections::HashSet<String> = vs_map.entries.keys().cloned().collect();

        for (key, vs) in &vs_map.entries {
            let chain = data.chains.entry(key.clone()).or_insert_with(|| VsChain::new(sample_rate, band_freqs, max_delay_seconds));
            if vs.diffraction_path.is_some() {
                chain.set_diffraction_model(diffraction_model);
            }
            chain.apply_update(vs, band_freqs);
            if !data.previous_keys.contains(key) {
                chain.set_target_gain(0.0);
                chain.reset();
            }
            chain.set_target_gain(1.0);
        }

        for key in &data.previous_keys {
            if !new_keys.contains(key) {
                if let Some(chain) = data.chains.get_mut(key) {
                    chain.set_target_gain(0.0);
                }
            }
        }

        data.chains.retain(|key, chain| new_keys.contains(key) || !chain.is_settled_at_zero());
        data.previous_keys = new_keys;
    }

    #[must_use]
    pub fn is_fully_drained(&self, id: u64) -> bool {
        self.audio_data.read().get(&id).is_none_or(|data| {
            let data = data.lock();
            data.marked_for_removal && data.chains.values().all(VsChain::is_settled_at_zero)
        })
    }

    /// Drop the audio-thread state for every source that's been marked for
    /// removal and has fully drained; called once per block after
    /// processing, never from the audio callback's hot path itself.
    pub fn reap_drained(&self) {
        let drained: Vec<u64> = self
            .audio_data
            .read()
            .iter()
            .filter(|(_, d)| {
                let d = d.lock();
                d.marked_for_removal && d.chains.values().all(VsChain::is_settled_at_zero)
            })
            .map(|(&id, _)| id)
            .collect();
        if drained.is_empty() {
            return;
        }
        let mut audio_data = self.audio_data.write();
        for id in drained {
            audio_data.remove(&id);
        }
    }

    /// Run every live source's VS chains for one sample, spatialising each
    /// and accumulating the FDN's per-channel input row.
    #[allow(clippy::too_many_arguments)]
    pub fn process_sample(
        &self,
        id: u64,
        input: f32,
        spatializer: &mut dyn crate::spatializer::Spatializer,
        stereo_out: &mut [(f32, f32)],
        fdn_inputs: &mut [f32],
        listener_position: Vec3,
    ) {
        let Some(source) = self.get(id) else { return };
        let Some(data_lock) = self.audio_data.read().get(&id).cloned() else { return };
        let mut data = data_lock.lock();

        let world_relative = source.position - listener_position;
        let distance = world_relative.length();
        let direction_to_listener = if distance > 1e-6 { world_relative * (-1.0 / distance) } else { Vec3::new(0.0, 0.0, -1.0) };
        let directivity_gain = source.directivity.gain(source.orientation.forward(), direction_to_listener);
        let local_relative = self.listener_orientation().inverse_rotate(world_relative);

        for (key, chain) in &mut data.chains {
            let output = chain.process(input) * directivity_gain;
            let pose = SpatialPose { relative_position: local_relative };
            spatializer.spatialize(voice_id(id, key), &[output], pose, stereo_out);

            if let Some(scale) = chain.fdn_feed_scale(distance, source.directivity.reverb_energy(), fdn_inputs.len()) {
                let feed = output * scale;
                for slot in fdn_inputs.iter_mut() {
                    *slot += feed;
                }
            }
        }
    }
}

/// A stable per-VS voice id for the spatialiser's internal state keying:
/// the source id in the high bits, a hash of the path key in the low bits.
fn voice_id(source_id: u64, path_key: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    path_key.hash(&mut hasher);
    (source_id << 32) ^ (hasher.finish() & 0xFFFF_FFFF)
}

impl Default for SourceManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Adapts [`SourceManager`] to the IEM's read-only scene view. Held behind
/// an `Arc` so the background thread and the audio thread can share one
/// manager without cloning source state.
pub struct SceneView(pub Arc<SourceManager>);

impl SceneSnapshotProvider for SceneView {
    fn listener_position(&self) -> Vec3 {
        self.0.listener_position()
    }

    fn sources(&self) -> Vec<SourceQuery> {
        self.0.ids().into_iter().filter_map(|id| self.0.get(id)).map(Source::query).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_then_remove_marks_for_removal_without_panicking() {
        let mgr = SourceManager::new();
        let id = mgr.init_source(Vec3::ZERO, Quat::IDENTITY, Directivity::Omni);
        assert!(mgr.get(id).is_some());
        mgr.remove_source(id);
        assert!(mgr.get(id).is_none());
        assert!(mgr.is_fully_drained(id));
    }

    #[test]
    fn sync_vs_chains_creates_and_fades_out_keys() {
        let mgr = SourceManager::new();
        let id = mgr.init_source(Vec3::new(0.0, 0.0, 3.0), Quat::IDENTITY, Directivity::Omni);

        let mut map = VsMap::default();
        map.entries.insert("".to_string(), sonido_iem::VsDescriptor::direct(Vec3::new(0.0, 0.0, 3.0), 3.0));
        let model = sonido_effects::diffraction::DiffractionModelKind::Attenuate;
        mgr.sync_vs_chains(id, &map, 48000.0, &[250.0, 1000.0, 4000.0], 1.0, model);

        mgr.sync_vs_chains(id, &VsMap::default(), 48000.0, &[250.0, 1000.0, 4000.0], 1.0, model);
        assert!(!mgr.is_fully_drained(id), "fresh removal shouldn't be drained before the fade settles");
    }

    #[test]
    fn scene_view_reports_live_sources() {
        let mgr = SourceManager::new();
        mgr.init_source(Vec3::new(1.0, 0.0, 0.0), Quat::IDENTITY, Directivity::Omni);
        let view = SceneView(Arc::new(mgr));
        assert_eq!(view.sources().len(), 1);
    }
}
