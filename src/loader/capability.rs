//! Host capabilities the loader delegates to.
//!
//! These traits are the seams to the embedding application: how bytes are
//! fetched, how encoded audio becomes PCM, and where embedded binary chunks
//! come from. Resona ships a decoder implementation
//! ([`SymphoniaDecoder`](super::SymphoniaDecoder)); fetching and buffer
//! views are always the host's.

use crate::audio_data::ResonaAudioData;
use async_trait::async_trait;
use std::sync::Arc;

/// Fetches the bytes behind an already-resolved URL.
///
/// The loader hands over absolute URLs as-is (`data:`, `blob:`, scheme URLs)
/// and base-path-joined relative URIs otherwise. Transport policy, caching
/// and timeouts are entirely the implementor's business.
#[async_trait(?Send)]
pub trait AudioFetcher {
    async fn fetch(&self, url: &str) -> anyhow::Result<Vec<u8>>;
}

/// Decodes encoded audio bytes into PCM, and answers which encodings it can
/// play at all.
#[async_trait(?Send)]
pub trait AudioDecoder {
    /// Decode a complete encoded payload. `mime_type` is a hint, not a
    /// guarantee; decoders are free to probe the bytes instead.
    async fn decode(
        &self,
        bytes: Vec<u8>,
        mime_type: Option<&str>,
    ) -> anyhow::Result<Arc<ResonaAudioData>>;

    /// Playability predicate used to pick among legacy candidate encodings.
    fn supports(&self, mime_type: &str) -> bool;
}

/// Provides the document's embedded binary chunks, keyed by buffer view
/// index. The returned slice stays owned by the provider; the loader copies
/// it before decoding.
pub trait BufferViewProvider {
    fn buffer_view(&self, index: usize) -> anyhow::Result<&[u8]>;
}
