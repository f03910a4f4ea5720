//! Resolved, playable emitter objects.

use crate::audio_data::ResonaAudioData;
use crate::document::DistanceModel;
use crate::math::WorldPose;
use std::cell::{Cell, RefCell};
use std::sync::Arc;
use uuid::Uuid;

/// Playback state of a single voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    Playing,
    Paused,
    Stopped,
}

/// Cone parameters in the panner convention (degrees).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConeParams {
    pub inner_angle_deg: f32,
    pub outer_angle_deg: f32,
    pub outer_gain: f32,
}

/// Distance attenuation parameters in the panner convention: degrees for
/// angles, a large finite value in place of the document's "infinite" max
/// distance sentinel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PannerParams {
    pub ref_distance: f32,
    pub rolloff_factor: f32,
    pub distance_model: DistanceModel,
    pub max_distance: f32,
    pub cone: ConeParams,
}

/// Whether an emitter is ambient or spatialized. Decided once at
/// construction; never inferred from object capabilities afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EmitterKind {
    Global,
    Positional(PannerParams),
}

impl EmitterKind {
    pub fn is_positional(&self) -> bool {
        matches!(self, EmitterKind::Positional(_))
    }

    pub fn panner(&self) -> Option<&PannerParams> {
        match self {
            EmitterKind::Positional(params) => Some(params),
            EmitterKind::Global => None,
        }
    }
}

/// One sub-voice of an emitter: a decoded buffer (shared through the resolver
/// cache) plus its per-use playback parameters.
#[derive(Debug)]
pub struct Voice {
    source_index: usize,
    data: Option<Arc<ResonaAudioData>>,
    looped: bool,
    autoplay: bool,
    gain: f32,
    playback_rate: f32,
    state: Cell<PlayState>,
}

impl Voice {
    pub(crate) fn new(
        source_index: usize,
        data: Option<Arc<ResonaAudioData>>,
        looped: bool,
        autoplay: bool,
        gain: f32,
        playback_rate: f32,
    ) -> Self {
        Self {
            source_index,
            data,
            looped,
            autoplay,
            gain,
            playback_rate,
            state: Cell::new(PlayState::Stopped),
        }
    }

    pub fn source_index(&self) -> usize {
        self.source_index
    }

    pub fn data(&self) -> Option<&Arc<ResonaAudioData>> {
        self.data.as_ref()
    }

    pub fn looped(&self) -> bool {
        self.looped
    }

    pub fn autoplay(&self) -> bool {
        self.autoplay
    }

    /// Effective voice gain after the document's gain-composition rule.
    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn playback_rate(&self) -> f32 {
        self.playback_rate
    }

    pub fn state(&self) -> PlayState {
        self.state.get()
    }

    fn has_audible_data(&self) -> bool {
        self.data.as_ref().is_some_and(|d| !d.is_empty())
    }

    /// Starting a voice without decoded data is a no-op, not an error.
    pub fn play(&self) {
        if self.has_audible_data() {
            self.state.set(PlayState::Playing);
        }
    }

    pub fn pause(&self) {
        if self.state.get() == PlayState::Playing {
            self.state.set(PlayState::Paused);
        }
    }

    pub fn stop(&self) {
        self.state.set(PlayState::Stopped);
    }
}

/// A fully resolved emitter: the runtime counterpart of one emitter
/// definition, shared between every node and scene that references it.
#[derive(Debug)]
pub struct ResolvedEmitter {
    id: Uuid,
    index: usize,
    name: String,
    kind: EmitterKind,
    gain: f32,
    voices: Vec<Voice>,
    pose: RefCell<Option<WorldPose>>,
}

impl ResolvedEmitter {
    pub(crate) fn new(
        index: usize,
        name: String,
        kind: EmitterKind,
        gain: f32,
        voices: Vec<Voice>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            index,
            name,
            kind,
            gain,
            voices,
            pose: RefCell::new(None),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Index of the emitter definition this instance was resolved from.
    pub fn definition_index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn kind(&self) -> &EmitterKind {
        &self.kind
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    /// True if any voice is marked autoplay.
    pub fn autoplay(&self) -> bool {
        self.voices.iter().any(Voice::autoplay)
    }

    pub fn is_playing(&self) -> bool {
        self.voices.iter().any(|v| v.state() == PlayState::Playing)
    }

    pub fn play(&self) {
        for voice in &self.voices {
            voice.play();
        }
    }

    pub fn pause(&self) {
        for voice in &self.voices {
            voice.pause();
        }
    }

    pub fn stop(&self) {
        for voice in &self.voices {
            voice.stop();
        }
    }

    /// Apply a world pose to the panner as instantaneous values. Global
    /// emitters ignore poses.
    pub fn set_pose_instant(&self, pose: WorldPose) {
        if self.kind.is_positional() {
            *self.pose.borrow_mut() = Some(pose);
        }
    }

    /// Last pose applied to the panner, if any.
    pub fn pose(&self) -> Option<WorldPose> {
        *self.pose.borrow()
    }
}
