//! Error types for Resona

use thiserror::Error;

/// Document section (or host-side table) that an index points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    AudioData,
    AudioSource,
    AudioEmitter,
    BufferView,
    Node,
    Scene,
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Section::AudioData => "audio data",
            Section::AudioSource => "audio source",
            Section::AudioEmitter => "audio emitter",
            Section::BufferView => "buffer view",
            Section::Node => "node",
            Section::Scene => "scene",
        };
        f.write_str(name)
    }
}

/// Errors are `Clone` because resolution results are delivered through shared
/// futures: every attachment awaiting the same emitter receives its own copy
/// of the failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResonaError {
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    #[error("Unknown {section} index: {index}")]
    UnknownIndex { section: Section, index: usize },

    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("Audio decode error: {0}")]
    DecodeFailed(String),

    #[error("Audio fetch error: {0}")]
    FetchFailed(String),

    #[error("Missing audio data: {0}")]
    MissingData(String),
}

impl ResonaError {
    pub(crate) fn unknown_index(section: Section, index: usize) -> Self {
        Self::UnknownIndex { section, index }
    }
}

pub type Result<T> = std::result::Result<T, ResonaError>;
