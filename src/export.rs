//! Export of live emitters back into a glTF document.
//!
//! The inverse of resolution: walk resolved emitters, assign fresh indices,
//! deduplicate identical records, append encoded payloads as binary chunks,
//! and write the extension block with every default-valued field omitted so
//! that a load/export cycle round-trips exactly.

use crate::audio_data::ResonaAudioData;
use crate::builder::MAX_DISTANCE_SENTINEL;
use crate::document::{DistanceModel, GainRule, SchemaVariant};
use crate::emitter::{EmitterKind, ResolvedEmitter, Voice};
use crate::error::{ResonaError, Result};
use crate::graph::AttachPoint;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

const CMP_EPSILON: f32 = 1e-5;

/// An encoded audio payload ready for embedding.
pub struct EncodedAudio {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// Host capability that turns decoded PCM back into an encoded payload.
pub trait AudioEncoder {
    fn encode(&self, data: &ResonaAudioData) -> anyhow::Result<EncodedAudio>;
}

/// Where an appended chunk landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSlice {
    pub buffer_view: usize,
    pub byte_offset: usize,
    pub byte_length: usize,
}

/// Opaque append-bytes-get-offset service for the document's binary buffer.
/// The exporter hands over already-padded chunks.
pub trait BinaryChunkSink {
    fn append_chunk(&mut self, bytes: &[u8]) -> ChunkSlice;
}

/// Writes resolved emitters into a glTF root as a unified-scheme extension
/// block.
pub struct AudioEmitterExporter<'a> {
    encoder: &'a dyn AudioEncoder,
    gain_rule: GainRule,
}

impl<'a> AudioEmitterExporter<'a> {
    pub fn new(encoder: &'a dyn AudioEncoder) -> Self {
        Self {
            encoder,
            gain_rule: SchemaVariant::Unified.gain_rule(),
        }
    }

    /// Export emitters and their attachment points into `root`.
    pub fn export_document(
        &self,
        root: &mut Value,
        emitters: &[(Rc<ResolvedEmitter>, AttachPoint)],
        sink: &mut dyn BinaryChunkSink,
    ) -> Result<()> {
        if emitters.is_empty() {
            return Ok(());
        }

        let mut audio_data_records: Vec<Value> = Vec::new();
        let mut source_records: Vec<Value> = Vec::new();
        let mut emitter_records: Vec<Value> = Vec::new();
        // Payloads are keyed by buffer identity so a buffer shared between
        // voices is encoded and appended once.
        let mut chunk_indices: HashMap<*const f32, usize> = HashMap::new();
        let mut emitter_indices: HashMap<uuid::Uuid, usize> = HashMap::new();

        for (emitter, point) in emitters {
            let index = match emitter_indices.get(&emitter.id()) {
                Some(&index) => index,
                None => {
                    let record = self.write_emitter(
                        emitter,
                        &mut audio_data_records,
                        &mut source_records,
                        &mut chunk_indices,
                        sink,
                    )?;
                    let index = insert_unique(&mut emitter_records, record);
                    emitter_indices.insert(emitter.id(), index);
                    index
                }
            };
            write_attachment(root, *point, index)?;
        }

        let extension = root
            .as_object_mut()
            .ok_or_else(|| ResonaError::MalformedDocument("glTF root is not an object".into()))?
            .entry("extensions")
            .or_insert_with(|| json!({}));
        let mut block = serde_json::Map::new();
        if !audio_data_records.is_empty() {
            block.insert("audioData".into(), Value::Array(audio_data_records));
        }
        if !source_records.is_empty() {
            block.insert("audioSources".into(), Value::Array(source_records));
        }
        block.insert("audioEmitters".into(), Value::Array(emitter_records));
        extension
            .as_object_mut()
            .ok_or_else(|| ResonaError::MalformedDocument("extensions is not an object".into()))?
            .insert(
                SchemaVariant::Unified.extension_name().to_string(),
                Value::Object(block),
            );

        register_extension_used(root, SchemaVariant::Unified.extension_name());
        Ok(())
    }

    fn write_emitter(
        &self,
        emitter: &ResolvedEmitter,
        audio_data_records: &mut Vec<Value>,
        source_records: &mut Vec<Value>,
        chunk_indices: &mut HashMap<*const f32, usize>,
        sink: &mut dyn BinaryChunkSink,
    ) -> Result<Value> {
        let mut source_indices = Vec::with_capacity(emitter.voices().len());
        for voice in emitter.voices() {
            let record =
                self.write_source(emitter, voice, audio_data_records, chunk_indices, sink)?;
            source_indices.push(insert_unique(source_records, record));
        }

        let mut record = serde_json::Map::new();
        match emitter.kind() {
            EmitterKind::Global => {
                record.insert("type".into(), json!("global"));
            }
            EmitterKind::Positional(params) => {
                record.insert("type".into(), json!("positional"));
                let mut positional = serde_json::Map::new();
                if !is_equal_approx(params.ref_distance, 1.0) {
                    positional.insert("refDistance".into(), json!(params.ref_distance));
                }
                if !is_equal_approx(params.rolloff_factor, 1.0) {
                    positional.insert("rolloffFactor".into(), json!(params.rolloff_factor));
                }
                if params.distance_model != DistanceModel::Inverse {
                    positional.insert(
                        "distanceModel".into(),
                        json!(params.distance_model.as_str()),
                    );
                }
                // The sentinel means "infinite", serialized as omission.
                if !is_equal_approx(params.max_distance, MAX_DISTANCE_SENTINEL) {
                    positional.insert("maxDistance".into(), json!(params.max_distance));
                }
                let inner = params.cone.inner_angle_deg.to_radians();
                let outer = params.cone.outer_angle_deg.to_radians();
                if !is_equal_approx(inner, std::f32::consts::TAU) {
                    positional.insert("coneInnerAngle".into(), json!(inner));
                }
                if !is_equal_approx(outer, std::f32::consts::TAU) {
                    positional.insert("coneOuterAngle".into(), json!(outer));
                }
                if !is_equal_approx(params.cone.outer_gain, 0.0) {
                    positional.insert("coneOuterGain".into(), json!(params.cone.outer_gain));
                }
                if !positional.is_empty() {
                    record.insert("positional".into(), Value::Object(positional));
                }
            }
        }
        if !emitter.name().is_empty() {
            record.insert("name".into(), json!(emitter.name()));
        }
        if !is_equal_approx(emitter.gain(), 1.0) {
            record.insert("gain".into(), json!(emitter.gain()));
        }
        record.insert("sources".into(), json!(source_indices));
        Ok(Value::Object(record))
    }

    fn write_source(
        &self,
        emitter: &ResolvedEmitter,
        voice: &Voice,
        audio_data_records: &mut Vec<Value>,
        chunk_indices: &mut HashMap<*const f32, usize>,
        sink: &mut dyn BinaryChunkSink,
    ) -> Result<Value> {
        let mut record = serde_json::Map::new();

        if let Some(data) = voice.data().filter(|d| !d.is_empty()) {
            let key = data.samples().as_ptr();
            let data_index = match chunk_indices.get(&key) {
                Some(&index) => index,
                None => {
                    let index = self.write_audio_data(data, audio_data_records, sink)?;
                    chunk_indices.insert(key, index);
                    index
                }
            };
            record.insert("audio".into(), json!(data_index));
        }

        if voice.autoplay() {
            record.insert("autoplay".into(), json!(true));
        }
        if voice.looped() {
            record.insert("loop".into(), json!(true));
        }
        let source_gain = self.source_gain(emitter.gain(), voice.gain());
        if !is_equal_approx(source_gain, 1.0) {
            record.insert("gain".into(), json!(source_gain));
        }
        if !is_equal_approx(voice.playback_rate(), 1.0) {
            record.insert("playbackRate".into(), json!(voice.playback_rate()));
        }
        Ok(Value::Object(record))
    }

    fn write_audio_data_record(
        &self,
        data: &Arc<ResonaAudioData>,
        sink: &mut dyn BinaryChunkSink,
    ) -> Result<Value> {
        let encoded = self
            .encoder
            .encode(data)
            .map_err(|e| ResonaError::DecodeFailed(format!("encode failed: {e:#}")))?;
        let slice = sink.append_chunk(&padded(&encoded.bytes));
        let record = json!({
            "bufferView": slice.buffer_view,
            "mimeType": encoded.mime_type,
        });
        Ok(record)
    }

    fn write_audio_data(
        &self,
        data: &Arc<ResonaAudioData>,
        audio_data_records: &mut Vec<Value>,
        sink: &mut dyn BinaryChunkSink,
    ) -> Result<usize> {
        let record = self.write_audio_data_record(data, sink)?;
        Ok(insert_unique(audio_data_records, record))
    }

    /// Recover the source-level gain the loader composed away, so the
    /// emitter/source split round-trips under the unified gain rule.
    fn source_gain(&self, emitter_gain: f32, voice_gain: f32) -> f32 {
        match self.gain_rule {
            GainRule::EmitterTimesSource if emitter_gain != 0.0 => voice_gain / emitter_gain,
            _ => 1.0,
        }
    }
}

/// Insert a record unless a structurally identical one already exists,
/// returning the index either way.
fn insert_unique(records: &mut Vec<Value>, record: Value) -> usize {
    match records.iter().position(|existing| *existing == record) {
        Some(index) => index,
        None => {
            records.push(record);
            records.len() - 1
        }
    }
}

fn write_attachment(root: &mut Value, point: AttachPoint, emitter_index: usize) -> Result<()> {
    let (section, index, key, as_list) = match point {
        AttachPoint::Node(node) => ("nodes", node, "emitter", false),
        AttachPoint::Scene(scene) => ("scenes", scene, "emitters", true),
    };
    let target = root
        .get_mut(section)
        .and_then(Value::as_array_mut)
        .and_then(|entries| entries.get_mut(index))
        .ok_or_else(|| {
            ResonaError::MalformedDocument(format!("{section} entry {index} does not exist"))
        })?;
    let ext = target
        .as_object_mut()
        .ok_or_else(|| {
            ResonaError::MalformedDocument(format!("{section} entry {index} is not an object"))
        })?
        .entry("extensions")
        .or_insert_with(|| json!({}))
        .as_object_mut()
        .ok_or_else(|| ResonaError::MalformedDocument("extensions is not an object".into()))?
        .entry(SchemaVariant::Unified.extension_name())
        .or_insert_with(|| json!({}));
    let block = ext
        .as_object_mut()
        .ok_or_else(|| ResonaError::MalformedDocument("extension block is not an object".into()))?;
    if as_list {
        let list = block
            .entry(key)
            .or_insert_with(|| json!([]))
            .as_array_mut()
            .ok_or_else(|| {
                ResonaError::MalformedDocument(format!("{key} is not an array"))
            })?;
        let value = json!(emitter_index);
        if !list.contains(&value) {
            list.push(value);
        }
    } else {
        block.insert(key.to_string(), json!(emitter_index));
    }
    Ok(())
}

fn register_extension_used(root: &mut Value, name: &str) {
    let Some(object) = root.as_object_mut() else {
        return;
    };
    let used = object
        .entry("extensionsUsed")
        .or_insert_with(|| json!([]));
    if let Some(list) = used.as_array_mut() {
        let value = json!(name);
        if !list.contains(&value) {
            list.push(value);
        }
    }
}

/// Pad to a four-byte boundary, the alignment glTF buffer views expect.
fn padded(bytes: &[u8]) -> Vec<u8> {
    let mut out = bytes.to_vec();
    out.resize(bytes.len().div_ceil(4) * 4, 0);
    out
}

/// Approximate float equality with an exact-equality short circuit so that
/// infinities and sentinels compare cleanly.
fn is_equal_approx(left: f32, right: f32) -> bool {
    if left == right {
        return true;
    }
    let tolerance = (left.abs() * CMP_EPSILON).max(CMP_EPSILON);
    (left - right).abs() < tolerance
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::EmitterBuilder;
    use crate::document::{ResonaDocument, SchemaVariant, SourceData};
    use crate::emitter::{ConeParams, PannerParams};

    struct FakeEncoder;

    impl AudioEncoder for FakeEncoder {
        fn encode(&self, data: &ResonaAudioData) -> anyhow::Result<EncodedAudio> {
            Ok(EncodedAudio {
                bytes: vec![0xAB; data.len().max(1)],
                mime_type: "audio/mpeg".to_string(),
            })
        }
    }

    #[derive(Default)]
    struct FakeSink {
        chunks: Vec<Vec<u8>>,
        offset: usize,
    }

    impl BinaryChunkSink for FakeSink {
        fn append_chunk(&mut self, bytes: &[u8]) -> ChunkSlice {
            let slice = ChunkSlice {
                buffer_view: self.chunks.len(),
                byte_offset: self.offset,
                byte_length: bytes.len(),
            };
            self.offset += bytes.len();
            self.chunks.push(bytes.to_vec());
            slice
        }
    }

    fn positional_emitter(gain: f32, looped: bool) -> Rc<ResolvedEmitter> {
        let params = PannerParams {
            ref_distance: 5.0,
            rolloff_factor: 2.0,
            distance_model: DistanceModel::Inverse,
            max_distance: MAX_DISTANCE_SENTINEL,
            cone: ConeParams {
                inner_angle_deg: 360.0,
                outer_angle_deg: 360.0,
                outer_gain: 0.0,
            },
        };
        let data = Arc::new(ResonaAudioData::new(vec![0.5; 32], 48_000, 1));
        let voice = Voice::new(0, Some(data), looped, false, gain, 1.0);
        Rc::new(ResolvedEmitter::new(
            0,
            String::new(),
            EmitterKind::Positional(params),
            gain,
            vec![voice],
        ))
    }

    fn scaffold_root() -> Value {
        json!({ "nodes": [{}], "scenes": [{}] })
    }

    #[test]
    fn test_round_trip_non_default_values() {
        let emitter = positional_emitter(0.5, true);
        let mut root = scaffold_root();
        let encoder = FakeEncoder;
        let exporter = AudioEmitterExporter::new(&encoder);
        let mut sink = FakeSink::default();
        exporter
            .export_document(&mut root, &[(emitter, AttachPoint::Node(0))], &mut sink)
            .unwrap();

        let doc = ResonaDocument::parse(&root, SchemaVariant::Unified)
            .unwrap()
            .unwrap();
        let def = doc.emitter_at(0).unwrap();
        assert_eq!(def.gain, Some(0.5));
        assert_eq!(def.positional.ref_distance, Some(5.0));
        assert_eq!(def.positional.rolloff_factor, Some(2.0));
        // Everything else stayed at its default (omitted).
        assert_eq!(def.positional.distance_model, None);
        assert_eq!(def.positional.max_distance, None);
        assert_eq!(def.positional.cone_inner_angle, None);

        let source = doc.source_at(def.sources[0]).unwrap();
        assert!(source.looped);
        assert!(!source.autoplay);
        assert_eq!(source.gain, 1.0);
        assert_eq!(source.data, SourceData::Single(0));

        assert_eq!(doc.node_attachment(0), Some(0));
        assert_eq!(
            root["extensionsUsed"],
            json!(["KHR_audio_emitter"])
        );
    }

    #[test]
    fn test_cone_angle_round_trips_through_degrees() {
        let params = PannerParams {
            ref_distance: 1.0,
            rolloff_factor: 1.0,
            distance_model: DistanceModel::Inverse,
            max_distance: MAX_DISTANCE_SENTINEL,
            cone: ConeParams {
                inner_angle_deg: 180.0,
                outer_angle_deg: 360.0,
                outer_gain: 0.0,
            },
        };
        let emitter = Rc::new(ResolvedEmitter::new(
            0,
            String::new(),
            EmitterKind::Positional(params),
            1.0,
            vec![],
        ));
        let mut root = scaffold_root();
        let encoder = FakeEncoder;
        let exporter = AudioEmitterExporter::new(&encoder);
        let mut sink = FakeSink::default();
        exporter
            .export_document(&mut root, &[(emitter, AttachPoint::Node(0))], &mut sink)
            .unwrap();

        let doc = ResonaDocument::parse(&root, SchemaVariant::Unified)
            .unwrap()
            .unwrap();
        let inner = doc.emitter_at(0).unwrap().positional.cone_inner_angle;
        assert!((inner.unwrap() - std::f32::consts::PI).abs() < 1e-5);

        // And back to 180 degrees through the builder.
        let builder = EmitterBuilder::new(SchemaVariant::Unified);
        let rebuilt = builder.build(&doc, 0, vec![]).unwrap();
        let rebuilt_inner = rebuilt.kind().panner().unwrap().cone.inner_angle_deg;
        assert!((rebuilt_inner - 180.0).abs() < 1e-3);
    }

    #[test]
    fn test_shared_buffer_encodes_once_and_records_dedup() {
        let data = Arc::new(ResonaAudioData::new(vec![0.25; 16], 48_000, 1));
        let make = |index| {
            let voice = Voice::new(0, Some(data.clone()), false, false, 1.0, 1.0);
            Rc::new(ResolvedEmitter::new(
                index,
                String::new(),
                EmitterKind::Global,
                1.0,
                vec![voice],
            ))
        };
        let mut root = json!({ "nodes": [{}, {}] });
        let encoder = FakeEncoder;
        let exporter = AudioEmitterExporter::new(&encoder);
        let mut sink = FakeSink::default();
        exporter
            .export_document(
                &mut root,
                &[
                    (make(0), AttachPoint::Node(0)),
                    (make(1), AttachPoint::Node(1)),
                ],
                &mut sink,
            )
            .unwrap();

        assert_eq!(sink.chunks.len(), 1);
        let ext = &root["extensions"]["KHR_audio_emitter"];
        assert_eq!(ext["audioData"].as_array().unwrap().len(), 1);
        // Identical sources and emitters collapse into one record each; both
        // nodes reference emitter 0.
        assert_eq!(ext["audioSources"].as_array().unwrap().len(), 1);
        assert_eq!(ext["audioEmitters"].as_array().unwrap().len(), 1);
        assert_eq!(
            root["nodes"][1]["extensions"]["KHR_audio_emitter"]["emitter"],
            json!(0)
        );
    }

    #[test]
    fn test_all_default_emitter_serializes_minimally() {
        let emitter = Rc::new(ResolvedEmitter::new(
            0,
            String::new(),
            EmitterKind::Global,
            1.0,
            vec![Voice::new(0, None, false, false, 1.0, 1.0)],
        ));
        let mut root = json!({ "scenes": [{}] });
        let encoder = FakeEncoder;
        let exporter = AudioEmitterExporter::new(&encoder);
        let mut sink = FakeSink::default();
        exporter
            .export_document(&mut root, &[(emitter, AttachPoint::Scene(0))], &mut sink)
            .unwrap();

        let ext = &root["extensions"]["KHR_audio_emitter"];
        assert_eq!(
            ext["audioEmitters"][0],
            json!({ "type": "global", "sources": [0] })
        );
        // A silent voice produces a source record with no payload reference.
        assert_eq!(ext["audioSources"][0], json!({}));
        assert!(ext.get("audioData").is_none());
        assert_eq!(
            root["scenes"][0]["extensions"]["KHR_audio_emitter"]["emitters"],
            json!([0])
        );
    }

    #[test]
    fn test_chunks_are_padded_to_four_bytes() {
        assert_eq!(padded(&[1, 2, 3]).len(), 4);
        assert_eq!(padded(&[1, 2, 3, 4]).len(), 4);
        assert_eq!(padded(&[1, 2, 3, 4, 5]).len(), 8);
    }

    #[test]
    fn test_is_equal_approx() {
        assert!(is_equal_approx(1.0, 1.0));
        assert!(is_equal_approx(1.0, 1.0 + 1e-7));
        assert!(!is_equal_approx(1.0, 1.1));
        assert!(is_equal_approx(f32::INFINITY, f32::INFINITY));
    }
}
