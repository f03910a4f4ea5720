//! Asynchronous resolution of one audio source into decoded audio data.

mod capability;
mod symphonia_decoder;

pub use capability::{AudioDecoder, AudioFetcher, BufferViewProvider};
pub use symphonia_decoder::SymphoniaDecoder;

use crate::audio_data::ResonaAudioData;
use crate::document::{AudioDataForm, RawAudioDataDef, ResonaDocument, SourceData};
use crate::error::{ResonaError, Result};
use std::rc::Rc;
use std::sync::Arc;

/// Resolves audio source definitions into decoded buffers by delegating to
/// the host's fetch/decode/buffer-view capabilities.
pub struct SourceLoader {
    document: Rc<ResonaDocument>,
    fetcher: Rc<dyn AudioFetcher>,
    decoder: Rc<dyn AudioDecoder>,
    buffer_views: Rc<dyn BufferViewProvider>,
    base_path: String,
}

impl SourceLoader {
    pub fn new(
        document: Rc<ResonaDocument>,
        fetcher: Rc<dyn AudioFetcher>,
        decoder: Rc<dyn AudioDecoder>,
        buffer_views: Rc<dyn BufferViewProvider>,
        base_path: impl Into<String>,
    ) -> Self {
        Self {
            document,
            fetcher,
            decoder,
            buffer_views,
            base_path: base_path.into(),
        }
    }

    /// Load the decoded audio for one source definition.
    ///
    /// `Ok(None)` means the source references no raw audio data at all: a
    /// silent placeholder, not a failure.
    pub async fn load_source(&self, index: usize) -> Result<Option<Arc<ResonaAudioData>>> {
        let source = self.document.source_at(index)?.clone();
        match &source.data {
            SourceData::None => {
                log::debug!("audio source {index} has no data, resolving as silent");
                Ok(None)
            }
            SourceData::Single(data_index) => {
                let def = self.document.audio_data_at(*data_index)?.clone();
                self.load_data(&def, *data_index).await.map(Some)
            }
            SourceData::Candidates(candidates) => {
                // Probe in document order; the first playable encoding wins.
                for candidate in candidates {
                    if self.decoder.supports(&candidate.mime_type) {
                        return self.load_data(&candidate.data, index).await.map(Some);
                    }
                    log::debug!(
                        "audio source {index}: skipping unplayable candidate {}",
                        candidate.mime_type
                    );
                }
                Err(ResonaError::UnsupportedEncoding(format!(
                    "no playable candidate for audio source {index} ({:?})",
                    source.name
                )))
            }
        }
    }

    async fn load_data(
        &self,
        def: &RawAudioDataDef,
        index: usize,
    ) -> Result<Arc<ResonaAudioData>> {
        match def.form() {
            None => Err(ResonaError::MissingData(format!(
                "audio data {index} has neither a uri nor a bufferView with mimeType"
            ))),
            Some(AudioDataForm::Uri(uri)) => {
                let url = resolve_uri(uri, &self.base_path);
                log::debug!("fetching audio data {index} from {url}");
                let bytes = self
                    .fetcher
                    .fetch(&url)
                    .await
                    .map_err(|e| ResonaError::FetchFailed(format!("{url}: {e:#}")))?;
                self.decode(bytes, def.mime_type.as_deref(), index).await
            }
            Some(AudioDataForm::BufferView {
                index: view,
                mime_type,
            }) => {
                let chunk = self
                    .buffer_views
                    .buffer_view(view)
                    .map_err(|e| ResonaError::FetchFailed(format!("buffer view {view}: {e:#}")))?;
                // Decoding may consume and invalidate the buffer, so hand the
                // decoder its own copy.
                let bytes = chunk.to_vec();
                self.decode(bytes, Some(mime_type), index).await
            }
        }
    }

    async fn decode(
        &self,
        bytes: Vec<u8>,
        mime_type: Option<&str>,
        index: usize,
    ) -> Result<Arc<ResonaAudioData>> {
        self.decoder.decode(bytes, mime_type).await.map_err(|e| {
            log::error!("audio data {index} failed to decode: {e:#}");
            ResonaError::DecodeFailed(format!("audio data {index}: {e:#}"))
        })
    }
}

/// Resolve a document URI against the document's base path. Absolute URLs
/// and `data:` / `blob:` URIs pass through untouched.
pub(crate) fn resolve_uri(uri: &str, base_path: &str) -> String {
    if uri.starts_with("data:") || uri.starts_with("blob:") || uri.contains("://") {
        return uri.to_string();
    }
    if base_path.is_empty() {
        return uri.to_string();
    }
    format!(
        "{}/{}",
        base_path.trim_end_matches('/'),
        uri.trim_start_matches("./")
    )
}
