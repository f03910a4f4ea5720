//! Typed view over the audio emitter extension block of a glTF document.
//!
//! The extension shipped in several near-identical revisions that moved the
//! same data between differently named sections. [`SchemaVariant`] captures
//! those differences as configuration so that one parser and one resolver
//! serve every revision.

use crate::error::{ResonaError, Result, Section};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which revision of the extension a document uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchemaVariant {
    /// The unified `KHR_audio_emitter` shape: `audioData` / `audioSources` /
    /// `audioEmitters` sections, multi-source emitters, nested `positional`
    /// block, emitter gain composed with source gain.
    #[default]
    Unified,
    /// Legacy `OMI_audio_emitter`: source and raw-data records merged into
    /// one `audioSources` section, single `source` per emitter, flat
    /// positional fields, loop/playing flags on the emitter.
    OmiLegacy,
    /// Oldest `OMI_audio_emitter` revision: `audioClips` holding ordered
    /// MIME-typed candidate lists, `clip` reference, `volume` / `autoPlay`
    /// field names.
    OmiClips,
}

/// How emitter-level and source-level gain combine into a voice gain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GainRule {
    /// Voice gain is emitter gain multiplied by source gain.
    EmitterTimesSource,
    /// Voice gain is the emitter gain alone.
    EmitterOnly,
}

impl SchemaVariant {
    pub fn extension_name(self) -> &'static str {
        match self {
            SchemaVariant::Unified => "KHR_audio_emitter",
            SchemaVariant::OmiLegacy | SchemaVariant::OmiClips => "OMI_audio_emitter",
        }
    }

    pub fn gain_rule(self) -> GainRule {
        match self {
            SchemaVariant::Unified => GainRule::EmitterTimesSource,
            SchemaVariant::OmiLegacy | SchemaVariant::OmiClips => GainRule::EmitterOnly,
        }
    }

    /// Whether an emitter may reference several sources (each a sub-voice).
    pub fn multi_source(self) -> bool {
        matches!(self, SchemaVariant::Unified)
    }

    fn positional_nested(self) -> bool {
        matches!(self, SchemaVariant::Unified)
    }

    fn node_key(self) -> &'static str {
        match self {
            SchemaVariant::Unified => "emitter",
            SchemaVariant::OmiLegacy | SchemaVariant::OmiClips => "audioEmitter",
        }
    }

    fn scene_key(self) -> &'static str {
        match self {
            SchemaVariant::Unified => "emitters",
            SchemaVariant::OmiLegacy | SchemaVariant::OmiClips => "audioEmitters",
        }
    }
}

/// Attenuation curve of a positional emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceModel {
    Linear,
    #[default]
    Inverse,
    Exponential,
}

impl DistanceModel {
    pub fn as_str(self) -> &'static str {
        match self {
            DistanceModel::Linear => "linear",
            DistanceModel::Inverse => "inverse",
            DistanceModel::Exponential => "exponential",
        }
    }
}

/// Raw audio payload reference: a URI or an embedded buffer view. Exactly one
/// of the two forms is valid; entries violating that surface as errors when a
/// source references them, not at parse time.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawAudioDataDef {
    pub uri: Option<String>,
    pub buffer_view: Option<usize>,
    pub mime_type: Option<String>,
}

/// The structurally valid forms of a [`RawAudioDataDef`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AudioDataForm<'a> {
    Uri(&'a str),
    BufferView { index: usize, mime_type: &'a str },
}

impl RawAudioDataDef {
    pub fn from_uri(uri: impl Into<String>) -> Self {
        Self {
            uri: Some(uri.into()),
            ..Default::default()
        }
    }

    pub fn from_buffer_view(index: usize, mime_type: impl Into<String>) -> Self {
        Self {
            uri: None,
            buffer_view: Some(index),
            mime_type: Some(mime_type.into()),
        }
    }

    /// Classify the entry, or `None` when it is malformed (both forms, or
    /// neither, or a buffer view without a MIME type).
    pub fn form(&self) -> Option<AudioDataForm<'_>> {
        match (&self.uri, self.buffer_view) {
            (Some(uri), None) => Some(AudioDataForm::Uri(uri)),
            (None, Some(index)) => self
                .mime_type
                .as_deref()
                .map(|mime_type| AudioDataForm::BufferView { index, mime_type }),
            _ => None,
        }
    }
}

/// One entry in a legacy candidate list: an encoding plus its payload.
#[derive(Debug, Clone, PartialEq)]
pub struct MimeCandidate {
    pub mime_type: String,
    pub data: RawAudioDataDef,
}

/// What an audio source points at.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SourceData {
    /// No payload: a silent placeholder source.
    #[default]
    None,
    /// Index into the raw audio data section.
    Single(usize),
    /// Ordered candidate encodings; the first playable one wins.
    Candidates(Vec<MimeCandidate>),
}

/// Per-use playback parameters plus the payload reference.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSourceDef {
    pub name: String,
    pub data: SourceData,
    pub autoplay: bool,
    pub looped: bool,
    pub gain: f32,
    pub playback_rate: f32,
}

impl Default for AudioSourceDef {
    fn default() -> Self {
        Self {
            name: String::new(),
            data: SourceData::None,
            autoplay: false,
            looped: false,
            gain: 1.0,
            playback_rate: 1.0,
        }
    }
}

/// Ambient vs spatialized emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmitterType {
    Global,
    Positional,
}

/// Positional attenuation and cone parameters as they appear in the document:
/// optional, radians, with `0`/absent max distance meaning "infinite".
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PositionalDef {
    pub cone_inner_angle: Option<f32>,
    pub cone_outer_angle: Option<f32>,
    pub cone_outer_gain: Option<f32>,
    pub distance_model: Option<DistanceModel>,
    pub max_distance: Option<f32>,
    pub ref_distance: Option<f32>,
    pub rolloff_factor: Option<f32>,
}

/// An emitter definition, normalized across revisions.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioEmitterDef {
    pub name: String,
    pub kind: EmitterType,
    pub gain: Option<f32>,
    /// Ordered source indices; each becomes a sub-voice.
    pub sources: Vec<usize>,
    pub positional: PositionalDef,
    /// Legacy revisions keep loop/autoplay on the emitter instead of the
    /// source. When present these override the source-level flags.
    pub looped: Option<bool>,
    pub autoplay: Option<bool>,
}

/// A node declaring an emitter attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeAttachment {
    pub node: usize,
    pub emitter: usize,
}

/// A scene declaring ambient emitter attachments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneAttachment {
    pub scene: usize,
    pub emitters: Vec<usize>,
}

// Intermediate serde shapes. Field aliases absorb the renames between
// revisions; variant-specific normalization does the rest.

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawSourceDef {
    name: Option<String>,
    #[serde(alias = "audioData")]
    audio: Option<usize>,
    #[serde(alias = "autoPlay")]
    autoplay: Option<bool>,
    #[serde(rename = "loop")]
    looped: Option<bool>,
    gain: Option<f32>,
    playback_rate: Option<f32>,
    // Legacy merged source+data records carry the payload inline.
    uri: Option<String>,
    buffer_view: Option<usize>,
    mime_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawClipDef {
    name: Option<String>,
    sources: Vec<RawCandidateDef>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawCandidateDef {
    mime_type: Option<String>,
    uri: Option<String>,
    buffer_view: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawEmitterDef {
    name: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(alias = "volume")]
    gain: Option<f32>,
    sources: Option<Vec<usize>>,
    #[serde(alias = "clip")]
    source: Option<usize>,
    #[serde(rename = "loop")]
    looped: Option<bool>,
    #[serde(alias = "autoPlay", alias = "playing")]
    autoplay: Option<bool>,
    positional: Option<PositionalDef>,
    #[serde(flatten)]
    flat_positional: PositionalDef,
}

/// Parsed, read-only view of one document's extension data.
#[derive(Debug, Clone)]
pub struct ResonaDocument {
    variant: SchemaVariant,
    audio_data: Vec<RawAudioDataDef>,
    sources: Vec<AudioSourceDef>,
    emitters: Vec<AudioEmitterDef>,
    node_attachments: Vec<NodeAttachment>,
    scene_attachments: Vec<SceneAttachment>,
}

impl ResonaDocument {
    /// Parse the extension block out of a glTF root.
    ///
    /// Returns `Ok(None)` when the document does not declare the extension at
    /// all; a declared-but-empty block parses to an empty document. Both are
    /// distinct from structural errors, which are `MalformedDocument`.
    pub fn parse(root: &Value, variant: SchemaVariant) -> Result<Option<Self>> {
        let Some(ext) = root
            .get("extensions")
            .and_then(|e| e.get(variant.extension_name()))
        else {
            return Ok(None);
        };
        if !ext.is_object() {
            return Err(ResonaError::MalformedDocument(format!(
                "extension {} is not an object",
                variant.extension_name()
            )));
        }

        let (audio_data, sources, emitters) = match variant {
            SchemaVariant::Unified => Self::parse_unified(ext)?,
            SchemaVariant::OmiLegacy => Self::parse_omi_legacy(ext)?,
            SchemaVariant::OmiClips => Self::parse_omi_clips(ext)?,
        };

        let node_attachments = Self::parse_node_attachments(root, variant)?;
        let scene_attachments = Self::parse_scene_attachments(root, variant)?;

        log::debug!(
            "parsed {} document: {} audio data, {} sources, {} emitters, {} node / {} scene attachments",
            variant.extension_name(),
            audio_data.len(),
            sources.len(),
            emitters.len(),
            node_attachments.len(),
            scene_attachments.len(),
        );

        Ok(Some(Self {
            variant,
            audio_data,
            sources,
            emitters,
            node_attachments,
            scene_attachments,
        }))
    }

    fn section<T: serde::de::DeserializeOwned>(
        ext: &Value,
        keys: &[&str],
        what: &str,
    ) -> Result<Vec<T>> {
        let Some(value) = keys.iter().find_map(|k| ext.get(*k)) else {
            return Ok(Vec::new());
        };
        serde_json::from_value(value.clone())
            .map_err(|e| ResonaError::MalformedDocument(format!("invalid {what} section: {e}")))
    }

    fn parse_unified(
        ext: &Value,
    ) -> Result<(Vec<RawAudioDataDef>, Vec<AudioSourceDef>, Vec<AudioEmitterDef>)> {
        let audio_data: Vec<RawAudioDataDef> =
            Self::section(ext, &["audioData", "audio"], "audio data")?;
        let raw_sources: Vec<RawSourceDef> =
            Self::section(ext, &["audioSources", "sources"], "audio source")?;
        let raw_emitters: Vec<RawEmitterDef> =
            Self::section(ext, &["audioEmitters", "emitters"], "audio emitter")?;

        let sources = raw_sources
            .into_iter()
            .map(|raw| AudioSourceDef {
                name: raw.name.unwrap_or_default(),
                data: raw.audio.map_or(SourceData::None, SourceData::Single),
                autoplay: raw.autoplay.unwrap_or(false),
                looped: raw.looped.unwrap_or(false),
                gain: raw.gain.unwrap_or(1.0),
                playback_rate: raw.playback_rate.unwrap_or(1.0),
            })
            .collect();

        let emitters = raw_emitters
            .into_iter()
            .map(|raw| Self::normalize_emitter(raw, SchemaVariant::Unified))
            .collect::<Result<Vec<_>>>()?;

        Ok((audio_data, sources, emitters))
    }

    fn parse_omi_legacy(
        ext: &Value,
    ) -> Result<(Vec<RawAudioDataDef>, Vec<AudioSourceDef>, Vec<AudioEmitterDef>)> {
        let raw_sources: Vec<RawSourceDef> =
            Self::section(ext, &["audioSources"], "audio source")?;
        let raw_emitters: Vec<RawEmitterDef> =
            Self::section(ext, &["audioEmitters"], "audio emitter")?;

        // Merged records: split each entry into a raw-data record and a
        // source referencing it at the same index.
        let mut audio_data = Vec::with_capacity(raw_sources.len());
        let mut sources = Vec::with_capacity(raw_sources.len());
        for (index, raw) in raw_sources.into_iter().enumerate() {
            audio_data.push(RawAudioDataDef {
                uri: raw.uri,
                buffer_view: raw.buffer_view,
                mime_type: raw.mime_type,
            });
            sources.push(AudioSourceDef {
                name: raw.name.unwrap_or_default(),
                data: SourceData::Single(index),
                autoplay: raw.autoplay.unwrap_or(false),
                looped: raw.looped.unwrap_or(false),
                gain: raw.gain.unwrap_or(1.0),
                playback_rate: raw.playback_rate.unwrap_or(1.0),
            });
        }

        let emitters = raw_emitters
            .into_iter()
            .map(|raw| Self::normalize_emitter(raw, SchemaVariant::OmiLegacy))
            .collect::<Result<Vec<_>>>()?;

        Ok((audio_data, sources, emitters))
    }

    fn parse_omi_clips(
        ext: &Value,
    ) -> Result<(Vec<RawAudioDataDef>, Vec<AudioSourceDef>, Vec<AudioEmitterDef>)> {
        let raw_clips: Vec<RawClipDef> = Self::section(ext, &["audioClips"], "audio clip")?;
        let raw_emitters: Vec<RawEmitterDef> =
            Self::section(ext, &["audioEmitters"], "audio emitter")?;

        let sources = raw_clips
            .into_iter()
            .map(|clip| {
                let candidates = clip
                    .sources
                    .into_iter()
                    .map(|c| {
                        let mime_type = c.mime_type.ok_or_else(|| {
                            ResonaError::MalformedDocument(
                                "audio clip candidate without a mimeType".to_string(),
                            )
                        })?;
                        Ok(MimeCandidate {
                            data: RawAudioDataDef {
                                uri: c.uri,
                                buffer_view: c.buffer_view,
                                mime_type: Some(mime_type.clone()),
                            },
                            mime_type,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(AudioSourceDef {
                    name: clip.name.unwrap_or_default(),
                    data: SourceData::Candidates(candidates),
                    ..Default::default()
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let emitters = raw_emitters
            .into_iter()
            .map(|raw| Self::normalize_emitter(raw, SchemaVariant::OmiClips))
            .collect::<Result<Vec<_>>>()?;

        Ok((Vec::new(), sources, emitters))
    }

    fn normalize_emitter(raw: RawEmitterDef, variant: SchemaVariant) -> Result<AudioEmitterDef> {
        let kind = match raw.kind.as_deref() {
            Some("global") => EmitterType::Global,
            Some("positional") => EmitterType::Positional,
            other => {
                return Err(ResonaError::MalformedDocument(format!(
                    "unknown audio emitter type: {other:?}"
                )));
            }
        };
        let sources = if variant.multi_source() {
            raw.sources
                .or_else(|| raw.source.map(|s| vec![s]))
                .unwrap_or_default()
        } else {
            raw.source.into_iter().collect()
        };
        let positional = if variant.positional_nested() {
            raw.positional.unwrap_or_default()
        } else {
            raw.flat_positional
        };
        Ok(AudioEmitterDef {
            name: raw.name.unwrap_or_default(),
            kind,
            gain: raw.gain,
            sources,
            positional,
            looped: raw.looped,
            autoplay: raw.autoplay,
        })
    }

    fn parse_node_attachments(
        root: &Value,
        variant: SchemaVariant,
    ) -> Result<Vec<NodeAttachment>> {
        let mut attachments = Vec::new();
        let Some(nodes) = root.get("nodes").and_then(Value::as_array) else {
            return Ok(attachments);
        };
        for (node, def) in nodes.iter().enumerate() {
            let Some(ext) = def
                .get("extensions")
                .and_then(|e| e.get(variant.extension_name()))
            else {
                continue;
            };
            let Some(reference) = ext.get(variant.node_key()) else {
                continue;
            };
            let emitter = reference.as_u64().ok_or_else(|| {
                ResonaError::MalformedDocument(format!(
                    "node {node} emitter reference is not an index"
                ))
            })? as usize;
            attachments.push(NodeAttachment { node, emitter });
        }
        Ok(attachments)
    }

    fn parse_scene_attachments(
        root: &Value,
        variant: SchemaVariant,
    ) -> Result<Vec<SceneAttachment>> {
        let mut attachments = Vec::new();
        let Some(scenes) = root.get("scenes").and_then(Value::as_array) else {
            return Ok(attachments);
        };
        for (scene, def) in scenes.iter().enumerate() {
            let Some(ext) = def
                .get("extensions")
                .and_then(|e| e.get(variant.extension_name()))
            else {
                continue;
            };
            let Some(list) = ext.get(variant.scene_key()).and_then(Value::as_array) else {
                continue;
            };
            let emitters = list
                .iter()
                .map(|v| {
                    v.as_u64().map(|i| i as usize).ok_or_else(|| {
                        ResonaError::MalformedDocument(format!(
                            "scene {scene} emitter reference is not an index"
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            attachments.push(SceneAttachment { scene, emitters });
        }
        Ok(attachments)
    }

    pub fn variant(&self) -> SchemaVariant {
        self.variant
    }

    pub fn audio_data(&self) -> &[RawAudioDataDef] {
        &self.audio_data
    }

    pub fn sources(&self) -> &[AudioSourceDef] {
        &self.sources
    }

    pub fn emitters(&self) -> &[AudioEmitterDef] {
        &self.emitters
    }

    pub fn audio_data_at(&self, index: usize) -> Result<&RawAudioDataDef> {
        self.audio_data
            .get(index)
            .ok_or_else(|| ResonaError::unknown_index(Section::AudioData, index))
    }

    pub fn source_at(&self, index: usize) -> Result<&AudioSourceDef> {
        self.sources
            .get(index)
            .ok_or_else(|| ResonaError::unknown_index(Section::AudioSource, index))
    }

    pub fn emitter_at(&self, index: usize) -> Result<&AudioEmitterDef> {
        self.emitters
            .get(index)
            .ok_or_else(|| ResonaError::unknown_index(Section::AudioEmitter, index))
    }

    /// Emitter attached to a node, if the node declares one.
    pub fn node_attachment(&self, node: usize) -> Option<usize> {
        self.node_attachments
            .iter()
            .find(|a| a.node == node)
            .map(|a| a.emitter)
    }

    /// Ambient emitters attached to a scene, in declaration order.
    pub fn scene_attachment(&self, scene: usize) -> &[usize] {
        self.scene_attachments
            .iter()
            .find(|a| a.scene == scene)
            .map(|a| a.emitters.as_slice())
            .unwrap_or(&[])
    }

    pub fn node_attachments(&self) -> &[NodeAttachment] {
        &self.node_attachments
    }

    pub fn scene_attachments(&self) -> &[SceneAttachment] {
        &self.scene_attachments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_absent_extension_is_not_an_error() {
        let root = json!({ "asset": { "version": "2.0" } });
        let doc = ResonaDocument::parse(&root, SchemaVariant::Unified).unwrap();
        assert!(doc.is_none());
    }

    #[test]
    fn test_present_but_empty_extension() {
        let root = json!({ "extensions": { "KHR_audio_emitter": {} } });
        let doc = ResonaDocument::parse(&root, SchemaVariant::Unified)
            .unwrap()
            .expect("extension is declared");
        assert!(doc.emitters().is_empty());
        assert!(doc.sources().is_empty());
        assert!(doc.audio_data().is_empty());
    }

    #[test]
    fn test_parse_unified_document() {
        let root = json!({
            "extensions": {
                "KHR_audio_emitter": {
                    "audioData": [{ "uri": "chime.mp3" }],
                    "audioSources": [
                        { "audio": 0, "autoplay": true, "loop": true, "gain": 0.5 }
                    ],
                    "audioEmitters": [{
                        "type": "positional",
                        "name": "bell",
                        "gain": 0.8,
                        "sources": [0],
                        "positional": { "refDistance": 5.0, "maxDistance": 0.0 }
                    }]
                }
            },
            "nodes": [
                {},
                { "extensions": { "KHR_audio_emitter": { "emitter": 0 } } }
            ],
            "scenes": [
                { "extensions": { "KHR_audio_emitter": { "emitters": [0] } } }
            ]
        });
        let doc = ResonaDocument::parse(&root, SchemaVariant::Unified)
            .unwrap()
            .unwrap();

        let source = doc.source_at(0).unwrap();
        assert_eq!(source.data, SourceData::Single(0));
        assert!(source.autoplay);
        assert!(source.looped);
        assert_eq!(source.gain, 0.5);
        assert_eq!(source.playback_rate, 1.0);

        let emitter = doc.emitter_at(0).unwrap();
        assert_eq!(emitter.kind, EmitterType::Positional);
        assert_eq!(emitter.name, "bell");
        assert_eq!(emitter.sources, vec![0]);
        assert_eq!(emitter.positional.ref_distance, Some(5.0));
        assert_eq!(emitter.positional.max_distance, Some(0.0));
        assert_eq!(emitter.positional.rolloff_factor, None);

        assert_eq!(doc.node_attachment(0), None);
        assert_eq!(doc.node_attachment(1), Some(0));
        assert_eq!(doc.scene_attachment(0), &[0]);
        assert_eq!(doc.scene_attachment(7), &[] as &[usize]);
    }

    #[test]
    fn test_parse_omi_legacy_document() {
        let root = json!({
            "extensions": {
                "OMI_audio_emitter": {
                    "audioSources": [
                        { "bufferView": 3, "mimeType": "audio/mpeg" }
                    ],
                    "audioEmitters": [{
                        "type": "positional",
                        "source": 0,
                        "loop": true,
                        "playing": true,
                        "gain": 0.25,
                        "refDistance": 2.0
                    }]
                }
            },
            "nodes": [
                { "extensions": { "OMI_audio_emitter": { "audioEmitter": 0 } } }
            ]
        });
        let doc = ResonaDocument::parse(&root, SchemaVariant::OmiLegacy)
            .unwrap()
            .unwrap();

        // Merged records split into raw data + source at the same index.
        let data = doc.audio_data_at(0).unwrap();
        assert_eq!(
            data.form(),
            Some(AudioDataForm::BufferView {
                index: 3,
                mime_type: "audio/mpeg"
            })
        );
        assert_eq!(doc.source_at(0).unwrap().data, SourceData::Single(0));

        let emitter = doc.emitter_at(0).unwrap();
        assert_eq!(emitter.sources, vec![0]);
        assert_eq!(emitter.looped, Some(true));
        assert_eq!(emitter.autoplay, Some(true));
        // Flat positional fields land on the positional block.
        assert_eq!(emitter.positional.ref_distance, Some(2.0));
        assert_eq!(doc.node_attachment(0), Some(0));
    }

    #[test]
    fn test_parse_omi_clips_document() {
        let root = json!({
            "extensions": {
                "OMI_audio_emitter": {
                    "audioClips": [{
                        "name": "music",
                        "sources": [
                            { "mimeType": "audio/ogg", "uri": "music.ogg" },
                            { "mimeType": "audio/mpeg", "uri": "music.mp3" }
                        ]
                    }],
                    "audioEmitters": [{
                        "type": "global",
                        "clip": 0,
                        "volume": 0.5,
                        "autoPlay": true
                    }]
                }
            }
        });
        let doc = ResonaDocument::parse(&root, SchemaVariant::OmiClips)
            .unwrap()
            .unwrap();

        let source = doc.source_at(0).unwrap();
        let SourceData::Candidates(candidates) = &source.data else {
            panic!("expected candidate list");
        };
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].mime_type, "audio/ogg");
        assert_eq!(candidates[1].mime_type, "audio/mpeg");

        let emitter = doc.emitter_at(0).unwrap();
        assert_eq!(emitter.kind, EmitterType::Global);
        assert_eq!(emitter.sources, vec![0]);
        assert_eq!(emitter.gain, Some(0.5));
        assert_eq!(emitter.autoplay, Some(true));
    }

    #[test]
    fn test_unknown_emitter_type_is_malformed() {
        let root = json!({
            "extensions": {
                "KHR_audio_emitter": {
                    "audioEmitters": [{ "type": "ambisonic" }]
                }
            }
        });
        let err = ResonaDocument::parse(&root, SchemaVariant::Unified).unwrap_err();
        assert!(matches!(err, ResonaError::MalformedDocument(_)));
    }

    #[test]
    fn test_index_accessors_reject_out_of_range() {
        let root = json!({ "extensions": { "KHR_audio_emitter": {} } });
        let doc = ResonaDocument::parse(&root, SchemaVariant::Unified)
            .unwrap()
            .unwrap();
        assert_eq!(
            doc.emitter_at(99).unwrap_err(),
            ResonaError::UnknownIndex {
                section: Section::AudioEmitter,
                index: 99
            }
        );
    }

    #[test]
    fn test_audio_data_form_rejects_ambiguous_entries() {
        let both = RawAudioDataDef {
            uri: Some("a.mp3".into()),
            buffer_view: Some(0),
            mime_type: Some("audio/mpeg".into()),
        };
        assert_eq!(both.form(), None);
        assert_eq!(RawAudioDataDef::default().form(), None);
        let no_mime = RawAudioDataDef {
            uri: None,
            buffer_view: Some(0),
            mime_type: None,
        };
        assert_eq!(no_mime.form(), None);
    }
}
