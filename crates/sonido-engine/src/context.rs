//! `Context`: the single owner of engine state - scene API, audio I/O, and the atomic mode
//! switches, wired to the room store, the background IEM thread, the FDN,
//! and the spatialiser.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::SeedableRng;
use rand::rngs::StdRng;
use sonido_effects::diffraction::DiffractionModelKind;
use sonido_geometry::{Id, RoomStore, Vec3, Wall, eyring_t60, sabine_t60};
use sonido_iem::{IemConfig, IemThread};
use sonido_reverb::{Fdn, MixMatrixKind};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::directivity::Directivity;
use crate::error::ConfigError;
use crate::quaternion::Quat;
use crate::source::{SceneView, SourceManager};
use crate::spatializer::{PanningSpatializer, SpatialisationMode, Spatializer};

/// Which statistical formula turns room volume/absorption into a target
/// `T60` when no explicit override is set via [`Context::set_reverb_time`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReverbFormula {
    Sabine,
    Eyring,
}

impl Default for ReverbFormula {
    fn default() -> Self {
        ReverbFormula::Sabine
    }
}

/// Everything needed to re-derive the FDN: dimensions for delay-line
/// sizing, the mixing matrix choice, and the seed `RandomOrthogonal` uses.
struct FdnSpec {
    room_dimensions: Vec<f32>,
    matrix_kind: MixMatrixKind,
    seed: u64,
}

/// The running engine: owns every piece of state the scene/audio API
/// touches. Constructed by [`Context::new`], torn down by `Drop`: stops
/// the IEM thread first, drains live VS state, then releases DSP state.
pub struct Context {
    config: EngineConfig,
    room: Arc<RoomStore>,
    iem_config: Arc<Mutex<IemConfig>>,
    sources: Arc<SourceManager>,
    iem_thread: IemThread,
    fdn: Fdn,
    fdn_spec: FdnSpec,
    /// Room volume supplied independently via [`Context::update_room`]
    /// rather than re-derived from dimensions, so non-box rooms still get
    /// a correct `T60`.
    room_volume: f32,
    reverb_formula: ReverbFormula,
    manual_t60: Option<Vec<f32>>,
    diffraction_model: DiffractionModelKind,
    spatializer: Box<dyn Spatializer>,
    impulse_response_mode: bool,
    rng: StdRng,
    /// Per-source queues of submitted mono samples awaiting the next
    /// `get_output` call.
    pending_audio: Mutex<HashMap<u64, std::collections::VecDeque<f32>>>,
}

impl Context {
    /// Construct a running engine. Fails only on
    /// configuration errors; everything else about construction is
    /// infallible by design (no partial construction).
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        let config = config.validated()?;
        let room = Arc::new(RoomStore::new());
        let iem_config = Arc::new(Mutex::new(IemConfig::default()));
        let sources = Arc::new(SourceManager::new());

        let scene_view: Arc<dyn sonido_iem::SceneSnapshotProvider> = Arc::new(SceneView(sources.clone()));
        let iem_thread = IemThread::spawn(room.clone(), iem_config.clone(), scene_view, config.num_reverb_sources);

        let mut rng = StdRng::seed_from_u64(0);
        let fdn_spec = FdnSpec { room_dimensions: vec![5.0, 3.0, 4.0], matrix_kind: MixMatrixKind::Householder, seed: 0 };
        let fdn = Fdn::new(
            config.sample_rate,
            config.num_reverb_sources,
            &fdn_spec.room_dimensions,
            &config.frequency_bands,
            fdn_spec.matrix_kind,
            fdn_spec.seed,
            &mut rng,
        );

        debug!(sample_rate = config.sample_rate, block_size = config.block_size, reverb_sources = config.num_reverb_sources, "engine constructed");

        Ok(Self {
            config,
            room,
            iem_config,
            sources,
            iem_thread,
            fdn,
            room_volume: fdn_spec.room_dimensions.iter().product::<f32>().max(1.0),
            fdn_spec,
            reverb_formula: ReverbFormula::default(),
            manual_t60: None,
            diffraction_model: DiffractionModelKind::Attenuate,
            spatializer: Box::new(PanningSpatializer::new()),
            impulse_response_mode: false,
            rng,
            pending_audio: Mutex::new(HashMap::new()),
        })
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ---- Scene API ----------------------------------------

    pub fn update_listener(&self, position: Vec3, orientation: Quat) {
        self.sources.set_listener_pose(position, orientation);
    }

    #[must_use]
    pub fn init_source(&self, position: Vec3, orientation: Quat, directivity: Directivity) -> u64 {
        self.sources.init_source(position, orientation, directivity)
    }

    pub fn update_source(&self, id: u64, position: Vec3, orientation: Quat) {
        self.sources.update_source(id, position, orientation);
    }

    pub fn update_source_directivity(&self, id: u64, directivity: Directivity) {
        self.sources.update_source_directivity(id, directivity);
    }

    pub fn remove_source(&self, id: u64) {
        self.sources.remove_source(id);
    }

    pub fn init_wall(&self, vertices: [Vec3; 3], absorption: [f32; 4]) -> Option<Id<Wall>> {
        self.room.add_wall(vertices, absorption, None)
    }

    pub fn update_wall(&self, id: Id<Wall>, vertices: [Vec3; 3]) {
        self.room.update_wall(id, vertices);
    }

    pub fn update_wall_absorption(&self, id: Id<Wall>, absorption: [f32; 4]) {
        self.room.update_wall_absorption(id, absorption);
    }

    pub fn remove_wall(&self, id: Id<Wall>) {
        self.room.remove_wall(id);
    }

    /// Force edge re-discovery across the whole room, e.g. after a batch
    /// of wall edits made with individual `update_wall` calls that each
    /// only re-derive edges touching their own wall.
    pub fn update_planes_and_edges(&self) {
        let wall_ids: Vec<Id<Wall>> = self.room.with_walls(|walls| walls.keys().copied().collect());
        for id in wall_ids {
            let vertices = self.room.with_walls(|walls| walls.get(&id).map(|w| w.vertices));
            if let Some(vertices) = vertices {
                self.room.update_wall(id, vertices);
            }
        }
    }

    // ---- Mode switches -------

    pub fn set_spatialisation_mode(&mut self, mode: SpatialisationMode) {
        self.spatializer.set_mode(mode);
    }

    /// Leaves the previous HRTF data active on failure.
    #[must_use]
    pub fn load_spatialisation_files(&mut self, resampling_step: u32, file_paths: &[String]) -> bool {
        self.spatializer.load_files(resampling_step, file_paths)
    }

    pub fn set_diffraction_model(&mut self, model: DiffractionModelKind) {
        self.diffraction_model = model;
        self.iem_config.lock().diffraction_model = model;
    }

    #[must_use]
    pub fn diffraction_model(&self) -> DiffractionModelKind {
        self.diffraction_model
    }

    pub fn set_iem_config(&self, config: IemConfig) {
        *self.iem_config.lock() = config;
    }

    pub fn set_reverb_formula(&mut self, formula: ReverbFormula) {
        self.reverb_formula = formula;
        if self.manual_t60.is_none() {
            self.recompute_t60();
        }
    }

    /// Explicit per-band `T60` override; clears when `update_room` is
    /// called with no override still pending.
    pub fn set_reverb_time(&mut self, t60_per_band: Vec<f32>) {
        self.manual_t60 = Some(t60_per_band.clone());
        self.fdn.set_target_t60(&t60_per_band);
    }

    /// Recompute target `T60` from the room's current walls via the
    /// active formula and push it to the FDN. Disables the FDN
    /// non-fatally if the room has no absorbing surface area.
    fn recompute_t60(&mut self) {
        let (total_area, weighted_absorption) = self.room.with_walls(|walls| {
            let mut area = 0.0f32;
            let mut absorption = [0.0f32; 4];
            for wall in walls.values() {
                area += wall.area;
                for (a, &r) in absorption.iter_mut().zip(wall.reflectance.iter()) {
                    *a += wall.area * (1.0 - r * r);
                }
            }
            (area, absorption)
        });

        if total_area < 1e-6 {
            self.fdn.set_target_t60(&[0.0; 4]);
            return;
        }

        let volume = self.room_volume.max(1.0);
        let mean_absorption: f32 = weighted_absorption.iter().sum::<f32>() / (4.0 * total_area);

        let t60s: Vec<f32> = weighted_absorption
            .iter()
            .map(|&a| {
                let t60 = match self.reverb_formula {
                    ReverbFormula::Sabine => sabine_t60(volume, a),
                    ReverbFormula::Eyring => eyring_t60(volume, total_area, mean_absorption),
                };
                t60.unwrap_or(0.0)
            })
            .collect();

        self.fdn.set_target_t60(&t60s);
    }

    pub fn init_fdn_matrix(&mut self, kind: MixMatrixKind, seed: u64) {
        self.fdn_spec.matrix_kind = kind;
        self.fdn_spec.seed = seed;
        self.rebuild_fdn();
    }

    /// Update the room's volume and dimensions independently: volume isn't
    /// re-derived from `dimensions` since that product is only correct for
    /// an axis-aligned box room.
    pub fn update_room(&mut self, volume: f32, dimensions: [f32; 3]) {
        self.room_volume = volume;
        self.fdn_spec.room_dimensions = dimensions.to_vec();
        if self.manual_t60.is_none() {
            self.recompute_t60();
        }
    }

    /// Rebuild the FDN from scratch (delay lines, decay filters, mixing
    /// matrix), per `reset_fdn` operation.
    pub fn reset_fdn(&mut self) {
        self.rebuild_fdn();
        if let Some(t60) = self.manual_t60.clone() {
            self.fdn.set_target_t60(&t60);
        } else {
            self.recompute_t60();
        }
    }

    fn rebuild_fdn(&mut self) {
        self.fdn = Fdn::new(
            self.config.sample_rate,
            self.config.num_reverb_sources,
            &self.fdn_spec.room_dimensions,
            &self.config.frequency_bands,
            self.fdn_spec.matrix_kind,
            self.fdn_spec.seed,
            &mut self.rng,
        );
    }

    pub fn set_impulse_response_mode(&mut self, enabled: bool) {
        self.impulse_response_mode = enabled;
    }

    // ---- Audio I/O -----------------------------------------

    /// Queue mono samples for `source_id`, consumed by the next
    /// `get_output` calls. Never blocks or allocates past the initial
    /// queue growth; an unknown source id is silently dropped.
    pub fn submit_audio(&self, source_id: u64, samples: &[f32]) {
        let mut pending = self.pending_audio.lock();
        let queue = pending.entry(source_id).or_default();
        queue.extend(samples.iter().copied());
    }

    /// Render one block of stereo output. Never blocks on the IEM thread;
    /// if a source's VS map hasn't been published yet it's silent this
    /// block.
    pub fn get_output(&mut self, stereo_out: &mut [(f32, f32)]) {
        stereo_out.iter_mut().for_each(|s| *s = (0.0, 0.0));

        let ids = self.sources.ids();
        for id in ids {
            let vs_map = self.iem_thread.vs_map(id);
            self.sources.sync_vs_chains(id, &vs_map, self.config.sample_rate, &self.config.frequency_bands, 1.0, self.diffraction_model);
        }

        let num_fdn = self.fdn.num_channels();
        let mut fdn_inputs = vec![0.0f32; num_fdn];
        let mut fdn_taps = vec![0.0f32; num_fdn];
        let directions = self.fdn.directions().to_vec();

        for sample_idx in 0..stereo_out.len() {
            fdn_inputs.iter_mut().for_each(|s| *s = 0.0);

            for id in self.sources.ids() {
                let input = self.next_submitted_sample(id);
                self.sources.process_sample(
                    id,
                    input,
                    self.spatializer.as_mut(),
                    std::slice::from_mut(&mut stereo_out[sample_idx]),
                    &mut fdn_inputs,
                    self.sources.listener_position(),
                );
            }

            self.fdn.process(&fdn_inputs, &mut fdn_taps);
            if !self.impulse_response_mode {
                for (tap, direction) in fdn_taps.iter().zip(directions.iter()) {
                    let pose = crate::spatializer::SpatialPose { relative_position: *direction };
                    self.spatializer.spatialize(u64::MAX, std::slice::from_ref(tap), pose, std::slice::from_mut(&mut stereo_out[sample_idx]));
                }
            }
        }

        self.sources.reap_drained();
    }

    fn next_submitted_sample(&self, id: u64) -> f32 {
        self.pending_audio.lock().get_mut(&id).and_then(std::collections::VecDeque::pop_front).unwrap_or(0.0)
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        // Stop the IEM thread before tearing down DSP state.
        self.iem_thread.request_stop();
        warn!("context dropped with {} live source(s)", self.sources.ids().len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_rejects_bad_config() {
        let cfg = EngineConfig { block_size: 0, ..EngineConfig::default() };
        assert!(Context::new(cfg).is_err());
    }

    #[test]
    fn empty_scene_renders_silence() {
        let mut ctx = Context::new(EngineConfig::default()).unwrap();
        let mut out = vec![(1.0, 1.0); 32];
        ctx.get_output(&mut out);
        assert!(out.iter().all(|&(l, r)| l == 0.0 && r == 0.0));
    }

    #[test]
    fn scene_edits_do_not_panic() {
        let mut ctx = Context::new(EngineConfig::default()).unwrap();
        let wall = ctx
            .init_wall([Vec3::new(-2.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 4.0)], [0.2, 0.2, 0.2, 0.2])
            .expect("non-degenerate triangle");
        ctx.update_wall_absorption(wall, [0.5, 0.5, 0.5, 0.5]);
        ctx.update_planes_and_edges();

        let id = ctx.init_source(Vec3::new(0.0, 0.0, 2.0), Quat::IDENTITY, Directivity::Omni);
        ctx.update_source(id, Vec3::new(0.5, 0.0, 2.0), Quat::IDENTITY);
        ctx.submit_audio(id, &[0.5; 16]);

        let mut out = vec![(0.0, 0.0); 16];
        ctx.get_output(&mut out);

        ctx.remove_wall(wall);
        ctx.remove_source(id);
    }

    #[test]
    fn manual_reverb_time_overrides_the_formula() {
        let mut ctx = Context::new(EngineConfig::default()).unwrap();
        ctx.set_reverb_formula(ReverbFormula::Eyring);
        ctx.set_reverb_time(vec![1.2, 1.2, 1.2, 1.2]);
        assert!(ctx.fdn.is_enabled());
    }

    #[test]
    fn reset_fdn_rebuilds_without_panicking() {
        let mut ctx = Context::new(EngineConfig::default()).unwrap();
        ctx.init_fdn_matrix(MixMatrixKind::RandomOrthogonal, 7);
        ctx.update_room(90.0, [6.0, 3.0, 5.0]);
        ctx.reset_fdn();
    }
}
