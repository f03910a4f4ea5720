//! Default decoder implementation using the Symphonia decoder library.

use crate::audio_data::ResonaAudioData;
use crate::loader::AudioDecoder;
use anyhow::{Context, anyhow};
use async_trait::async_trait;
use std::io::Cursor;
use std::sync::Arc;
use symphonia::{
    core::{
        audio::SampleBuffer, codecs::DecoderOptions, errors::Error, formats::FormatOptions,
        io::MediaSourceStream, meta::MetadataOptions, probe::Hint,
    },
    default::{get_codecs, get_probe},
};

/// MIME types Symphonia handles, with the extension hint each maps to.
/// Parameters after `;` are ignored when matching.
const SUPPORTED_MIME_TYPES: &[(&str, &str)] = &[
    ("audio/mpeg", "mp3"),
    ("audio/mp3", "mp3"),
    ("audio/wav", "wav"),
    ("audio/x-wav", "wav"),
    ("audio/wave", "wav"),
    ("audio/ogg", "ogg"),
    ("audio/vorbis", "ogg"),
    ("audio/flac", "flac"),
    ("audio/x-flac", "flac"),
    ("audio/aac", "aac"),
    ("audio/mp4", "mp4"),
];

/// Decoder for in-memory encoded audio (MP3, WAV, OGG, FLAC, AAC) producing
/// interleaved f32 PCM.
#[derive(Debug, Default)]
pub struct SymphoniaDecoder;

impl SymphoniaDecoder {
    fn extension_hint(mime_type: &str) -> Option<&'static str> {
        let essence = mime_type.split(';').next().unwrap_or(mime_type).trim();
        SUPPORTED_MIME_TYPES
            .iter()
            .find(|(mime, _)| mime.eq_ignore_ascii_case(essence))
            .map(|(_, ext)| *ext)
    }

    fn decode_bytes(
        bytes: Vec<u8>,
        mime_type: Option<&str>,
    ) -> anyhow::Result<Arc<ResonaAudioData>> {
        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = mime_type.and_then(Self::extension_hint) {
            hint.with_extension(ext);
        }

        let probed = get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| anyhow!("failed to probe audio format: {e:?}"))?;

        let mut format = probed.format;

        let track = format
            .default_track()
            .context("no default audio track found")?;
        let sample_rate = track
            .codec_params
            .sample_rate
            .context("sample rate not found")?;
        let channels = track
            .codec_params
            .channels
            .context("channel count not found")?
            .count() as u16;

        let mut decoder = get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| anyhow!("failed to create decoder: {e:?}"))?;

        let mut samples: Vec<f32> = Vec::new();

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(Error::IoError(_)) => break, // end-of-stream
                Err(e) => return Err(anyhow!("error reading packet: {e:?}")),
            };

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(Error::IoError(_)) => break, // also EOF in some formats
                Err(Error::DecodeError(_)) => continue, // recoverable corruption
                Err(e) => return Err(anyhow!("error decoding packet: {e:?}")),
            };

            let spec = *decoded.spec();
            let capacity = decoded.capacity();
            let mut tmp = SampleBuffer::<f32>::new(capacity as u64, spec);
            tmp.copy_interleaved_ref(decoded);
            samples.extend_from_slice(tmp.samples());
        }

        Ok(Arc::new(ResonaAudioData::new(samples, sample_rate, channels)))
    }
}

#[async_trait(?Send)]
impl AudioDecoder for SymphoniaDecoder {
    async fn decode(
        &self,
        bytes: Vec<u8>,
        mime_type: Option<&str>,
    ) -> anyhow::Result<Arc<ResonaAudioData>> {
        Self::decode_bytes(bytes, mime_type)
    }

    fn supports(&self, mime_type: &str) -> bool {
        Self::extension_hint(mime_type).is_some()
    }
}
