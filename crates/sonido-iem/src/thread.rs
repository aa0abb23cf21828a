//! The background IEM thread: on every scene change it snapshots the
//! room and scene, searches paths per source, and publishes a VS map
//! snapshot the audio thread reads atomically.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use sonido_geometry::{RoomStore, Vec3};

use crate::channel::FdnChannelAllocator;
use crate::config::IemConfig;
use crate::path::{VsMap, path_key};
use crate::search::{self, RoomSnapshot};

/// One source as the IEM needs to see it: identity, pose, and the
/// reverb-energy scalar the source-side chain scales its FDN feed by.
#[derive(Debug, Clone, Copy)]
pub struct SourceQuery {
    pub id: u64,
    pub position: Vec3,
    pub reverb_energy: f32,
}

/// What the IEM thread reads from the scene each tick. Implemented by the
/// engine's source manager; kept as a trait so this crate doesn't need to
/// know about the full source/audio-data model.
pub trait SceneSnapshotProvider: Send + Sync {
    fn listener_position(&self) -> Vec3;
    fn sources(&self) -> Vec<SourceQuery>;
}

/// How long the IEM sleeps between polls of `RoomStore::has_changed` /
/// the scene's dirty flag when nothing has signalled a change. Bounded
/// below by scene-change signalling ; this is the fallback
/// poll period so listener/source motion (which doesn't touch the room)
/// still gets picked up.
const POLL_PERIOD: Duration = Duration::from_millis(20);

/// Per-source state the IEM thread carries between ticks: which keys
/// were live last tick (for diffing) and the FDN channel free list.
struct SourceTickState {
    /// FDN channel assigned to each currently live, FDN-feeding VS key;
    /// released back to `channels` once its key drops out of the map.
    key_channels: HashMap<String, usize>,
    channels: FdnChannelAllocator,
}

impl SourceTickState {
    fn new(num_fdn_channels: usize) -> Self {
        Self { key_channels: HashMap::new(), channels: FdnChannelAllocator::new(num_fdn_channels) }
    }
}

/// Owns the background thread and the published per-source VS maps. The
/// audio thread reads [`Self::vs_map`] at the top of each block; never
/// blocks on the IEM.
pub struct IemThread {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    published: Arc<Mutex<HashMap<u64, Arc<ArcSwap<VsMap>>>>>,
}

impl IemThread {
    #[must_use]
    pub fn spawn(
        room: Arc<RoomStore>,
        config: Arc<Mutex<IemConfig>>,
        scene: Arc<dyn SceneSnapshotProvider>,
        num_fdn_channels: usize,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let published: Arc<Mutex<HashMap<u64, Arc<ArcSwap<VsMap>>>>> = Arc::new(Mutex::new(HashMap::new()));

        let thread_stop = stop.clone();
        let thread_published = published.clone();
        let handle = std::thread::Builder::new()
            .name("sonido-iem".into())
            .spawn(move || {
                let mut state: HashMap<u64, SourceTickState> = HashMap::new();
                while !thread_stop.load(Ordering::Acquire) {
                    if room.has_changed() {
                        tick(&room, &config, scene.as_ref(), &thread_published, &mut state, num_fdn_channels);
                    }
                    std::thread::sleep(POLL_PERIOD);
                    if thread_stop.load(Ordering::Acquire) {
                        break;
                    }
                }
            })
            .expect("failed to spawn IEM thread");

        Self { stop, handle: Some(handle), published }
    }

    /// The current published VS map for `source_id`, or an empty map if
    /// the IEM hasn't published one yet (e.g. the source was just added).
    #[must_use]
    pub fn vs_map(&self, source_id: u64) -> Arc<VsMap> {
        self.published.lock().get(&source_id).map(|slot| slot.load_full()).unwrap_or_default()
    }

    /// Signal the background thread to stop; honoured within one tick.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }
}

impl Drop for IemThread {
    fn drop(&mut self) {
        self.request_stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn tick(
    room: &RoomStore,
    config: &Mutex<IemConfig>,
    scene: &dyn SceneSnapshotProvider,
    published: &Mutex<HashMap<u64, Arc<ArcSwap<VsMap>>>>,
    state: &mut HashMap<u64, SourceTickState>,
    num_fdn_channels: usize,
) {
    let snapshot = RoomSnapshot::capture(room);
    let listener = scene.listener_position();
    let config = *config.lock();

    for source in scene.sources() {
        let tick_state = state.entry(source.id).or_insert_with(|| SourceTickState::new(num_fdn_channels));

        let mut map = VsMap::default();
        if let Some(vs) = search::direct_sound(&snapshot, &config, source.position, listener) {
            map.entries.insert(String::new(), vs);
        }
        for mut vs in search::reflections(&snapshot, source.position, listener, config.reflection_order) {
            vs.key = path_key(&vs.parts);
            vs.feeds_fdn = config.late_reverb;
            map.entries.insert(vs.key.clone(), vs);
        }
        for mut vs in search::diffraction(&snapshot, source.position, listener, config.min_edge_length, config.shadow_diffraction_order) {
            vs.key = path_key(&vs.parts);
            vs.feeds_fdn = config.late_reverb;
            map.entries.insert(vs.key.clone(), vs);
        }
        let specular_diffraction_order = config.effective_specular_diffraction_order(config.diffraction_model);
        for mut vs in search::combined_specular_diffraction(&snapshot, source.position, listener, specular_diffraction_order, config.min_edge_length) {
            vs.key = path_key(&vs.parts);
            vs.feeds_fdn = config.late_reverb;
            map.entries.insert(vs.key.clone(), vs);
        }

        let new_keys: HashSet<String> = map.keys();
        for (old_key, &channel) in &tick_state.key_channels {
            if !new_keys.contains(old_key) {
                tick_state.channels.release(channel);
            }
        }
        tick_state.key_channels.retain(|key, _| new_keys.contains(key));

        for (key, vs) in &mut map.entries {
            if !vs.feeds_fdn {
                continue;
            }
            let channel = *tick_state.key_channels.entry(key.clone()).or_insert_with(|| tick_state.channels.allocate());
            vs.fdn_channel = Some(channel);
        }

        let mut published = published.lock();
        let slot = published.entry(source.id).or_insert_with(|| Arc::new(ArcSwap::from_pointee(VsMap::default())));
        slot.store(Arc::new(map));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticScene {
        listener: Vec3,
        sources: Vec<SourceQuery>,
    }

    impl SceneSnapshotProvider for StaticScene {
        fn listener_position(&self) -> Vec3 {
            self.listener
        }
        fn sources(&self) -> Vec<SourceQuery> {
            self.sources.clone()
        }
    }

    #[test]
    fn tick_publishes_direct_sound_for_an_empty_room() {
        let room = RoomStore::new();
        let config = Mutex::new(IemConfig::default());
        let scene = StaticScene {
            listener: Vec3::new(0.0, 0.0, 0.0),
            sources: vec![SourceQuery { id: 7, position: Vec3::new(0.0, 0.0, 3.0), reverb_energy: 1.0 }],
        };
        let published: Mutex<HashMap<u64, Arc<ArcSwap<VsMap>>>> = Mutex::new(HashMap::new());
        let mut state = HashMap::new();

        tick(&room, &config, &scene, &published, &mut state, 8);

        let slot = published.lock().get(&7).unwrap().load_full();
        assert!(slot.entries.contains_key(""), "direct sound should publish under the empty key");
    }

    #[test]
    fn spawned_thread_stops_promptly_on_drop() {
        let room = Arc::new(RoomStore::new());
        let config = Arc::new(Mutex::new(IemConfig::default()));
        let scene: Arc<dyn SceneSnapshotProvider> = Arc::new(StaticScene { listener: Vec3::ZERO, sources: Vec::new() });
        let iem = IemThread::spawn(room, config, scene, 4);
        iem.request_stop();
        drop(iem);
    }
}
