//! Construction of resolved emitters from definitions and decoded data.

use crate::audio_data::ResonaAudioData;
use crate::document::{
    AudioEmitterDef, EmitterType, GainRule, PositionalDef, ResonaDocument, SchemaVariant,
};
use crate::emitter::{ConeParams, EmitterKind, PannerParams, ResolvedEmitter, Voice};
use crate::error::Result;
use std::sync::Arc;

pub const DEFAULT_GAIN: f32 = 1.0;
pub const DEFAULT_PLAYBACK_RATE: f32 = 1.0;
pub const DEFAULT_REF_DISTANCE: f32 = 1.0;
pub const DEFAULT_ROLLOFF_FACTOR: f32 = 1.0;
/// Cone angles default to a full circle, in the document's radians.
pub const DEFAULT_CONE_ANGLE: f32 = std::f32::consts::TAU;
pub const DEFAULT_CONE_OUTER_GAIN: f32 = 0.0;
/// Stand-in for an infinite max distance (document value `0` or absent).
/// Panners reject true infinity, so the largest value they tolerate is used.
pub const MAX_DISTANCE_SENTINEL: f32 = 1.0e6;

/// Builds [`ResolvedEmitter`]s, applying the default-value table and the
/// document's gain-composition rule. Construction only; never starts
/// playback.
#[derive(Debug, Clone, Copy)]
pub struct EmitterBuilder {
    gain_rule: GainRule,
}

impl EmitterBuilder {
    pub fn new(variant: SchemaVariant) -> Self {
        Self {
            gain_rule: variant.gain_rule(),
        }
    }

    pub fn gain_rule(&self) -> GainRule {
        self.gain_rule
    }

    /// Assemble one emitter from its definition plus the decoded data of each
    /// of its sources, in source order.
    pub fn build(
        &self,
        document: &ResonaDocument,
        index: usize,
        loaded: Vec<Option<Arc<ResonaAudioData>>>,
    ) -> Result<ResolvedEmitter> {
        let def = document.emitter_at(index)?;
        let kind = match def.kind {
            EmitterType::Global => EmitterKind::Global,
            EmitterType::Positional => EmitterKind::Positional(panner_params(&def.positional)),
        };
        let emitter_gain = def.gain.unwrap_or(DEFAULT_GAIN);

        let mut voices = Vec::with_capacity(def.sources.len());
        for (&source_index, data) in def.sources.iter().zip(loaded) {
            let source = document.source_at(source_index)?;
            voices.push(Voice::new(
                source_index,
                data,
                def.looped.unwrap_or(source.looped),
                def.autoplay.unwrap_or(source.autoplay),
                self.voice_gain(emitter_gain, source.gain),
                source.playback_rate,
            ));
        }

        Ok(ResolvedEmitter::new(
            index,
            def.name.clone(),
            kind,
            emitter_gain,
            voices,
        ))
    }

    fn voice_gain(&self, emitter_gain: f32, source_gain: f32) -> f32 {
        match self.gain_rule {
            GainRule::EmitterTimesSource => emitter_gain * source_gain,
            GainRule::EmitterOnly => emitter_gain,
        }
    }
}

/// Apply the positional default table and convert to the panner convention:
/// angles from radians to degrees, the infinite-distance sentinel clamped to
/// the largest finite value the panner accepts.
fn panner_params(def: &PositionalDef) -> PannerParams {
    let max_distance = match def.max_distance {
        None => MAX_DISTANCE_SENTINEL,
        Some(d) if d <= 0.0 => MAX_DISTANCE_SENTINEL,
        Some(d) => d.min(MAX_DISTANCE_SENTINEL),
    };
    PannerParams {
        ref_distance: def.ref_distance.unwrap_or(DEFAULT_REF_DISTANCE),
        rolloff_factor: def.rolloff_factor.unwrap_or(DEFAULT_ROLLOFF_FACTOR),
        distance_model: def.distance_model.unwrap_or_default(),
        max_distance,
        cone: ConeParams {
            inner_angle_deg: def.cone_inner_angle.unwrap_or(DEFAULT_CONE_ANGLE).to_degrees(),
            outer_angle_deg: def.cone_outer_angle.unwrap_or(DEFAULT_CONE_ANGLE).to_degrees(),
            outer_gain: def.cone_outer_gain.unwrap_or(DEFAULT_CONE_OUTER_GAIN),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DistanceModel;
    use serde_json::json;

    fn parse(root: serde_json::Value, variant: SchemaVariant) -> ResonaDocument {
        ResonaDocument::parse(&root, variant).unwrap().unwrap()
    }

    #[test]
    fn test_defaults_are_deterministic() {
        let doc = parse(
            json!({
                "extensions": { "KHR_audio_emitter": {
                    "audioSources": [{}],
                    "audioEmitters": [{ "type": "positional", "sources": [0] }]
                }}
            }),
            SchemaVariant::Unified,
        );
        let builder = EmitterBuilder::new(SchemaVariant::Unified);
        let emitter = builder.build(&doc, 0, vec![None]).unwrap();

        let params = emitter.kind().panner().expect("positional emitter");
        assert_eq!(params.ref_distance, 1.0);
        assert_eq!(params.rolloff_factor, 1.0);
        assert_eq!(params.distance_model, DistanceModel::Inverse);
        assert_eq!(params.max_distance, MAX_DISTANCE_SENTINEL);
        assert_eq!(params.cone.inner_angle_deg, 360.0);
        assert_eq!(params.cone.outer_angle_deg, 360.0);
        assert_eq!(params.cone.outer_gain, 0.0);
        assert_eq!(emitter.gain(), 1.0);

        let voice = &emitter.voices()[0];
        assert!(!voice.looped());
        assert!(!voice.autoplay());
        assert_eq!(voice.gain(), 1.0);
        assert_eq!(voice.playback_rate(), 1.0);
    }

    #[test]
    fn test_cone_angles_convert_to_degrees() {
        let doc = parse(
            json!({
                "extensions": { "KHR_audio_emitter": {
                    "audioEmitters": [{
                        "type": "positional",
                        "positional": { "coneInnerAngle": std::f32::consts::PI }
                    }]
                }}
            }),
            SchemaVariant::Unified,
        );
        let builder = EmitterBuilder::new(SchemaVariant::Unified);
        let emitter = builder.build(&doc, 0, vec![]).unwrap();
        let params = emitter.kind().panner().unwrap();
        assert!((params.cone.inner_angle_deg - 180.0).abs() < 1e-3);
    }

    #[test]
    fn test_zero_max_distance_means_infinite() {
        let doc = parse(
            json!({
                "extensions": { "KHR_audio_emitter": {
                    "audioEmitters": [{
                        "type": "positional",
                        "positional": { "maxDistance": 0.0 }
                    }]
                }}
            }),
            SchemaVariant::Unified,
        );
        let builder = EmitterBuilder::new(SchemaVariant::Unified);
        let emitter = builder.build(&doc, 0, vec![]).unwrap();
        assert_eq!(
            emitter.kind().panner().unwrap().max_distance,
            MAX_DISTANCE_SENTINEL
        );
    }

    #[test]
    fn test_unified_gain_composes_emitter_and_source() {
        let doc = parse(
            json!({
                "extensions": { "KHR_audio_emitter": {
                    "audioSources": [{ "gain": 0.5 }],
                    "audioEmitters": [{ "type": "global", "gain": 0.5, "sources": [0] }]
                }}
            }),
            SchemaVariant::Unified,
        );
        let builder = EmitterBuilder::new(SchemaVariant::Unified);
        let emitter = builder.build(&doc, 0, vec![None]).unwrap();
        assert_eq!(emitter.voices()[0].gain(), 0.25);
    }

    #[test]
    fn test_legacy_gain_is_emitter_only() {
        let doc = parse(
            json!({
                "extensions": { "OMI_audio_emitter": {
                    "audioSources": [{ "uri": "a.mp3", "gain": 0.5 }],
                    "audioEmitters": [{ "type": "global", "source": 0, "gain": 0.5 }]
                }}
            }),
            SchemaVariant::OmiLegacy,
        );
        let builder = EmitterBuilder::new(SchemaVariant::OmiLegacy);
        let emitter = builder.build(&doc, 0, vec![None]).unwrap();
        assert_eq!(emitter.voices()[0].gain(), 0.5);
    }

    #[test]
    fn test_legacy_emitter_flags_override_source_flags() {
        let doc = parse(
            json!({
                "extensions": { "OMI_audio_emitter": {
                    "audioSources": [{ "uri": "a.mp3" }],
                    "audioEmitters": [{
                        "type": "global", "source": 0, "loop": true, "playing": true
                    }]
                }}
            }),
            SchemaVariant::OmiLegacy,
        );
        let builder = EmitterBuilder::new(SchemaVariant::OmiLegacy);
        let emitter = builder.build(&doc, 0, vec![None]).unwrap();
        let voice = &emitter.voices()[0];
        assert!(voice.looped());
        assert!(voice.autoplay());
    }
}
