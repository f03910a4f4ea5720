pub mod audio_data;
pub mod builder;
pub mod document;
pub mod emitter;
pub mod error;
pub mod export;
pub mod graph;
pub mod loader;
pub mod math;
pub mod resolver;
pub mod scheduler;

pub use audio_data::ResonaAudioData;
pub use builder::EmitterBuilder;
pub use document::{
    AudioEmitterDef, AudioSourceDef, DistanceModel, EmitterType, GainRule, ResonaDocument,
    SchemaVariant, SourceData,
};
pub use emitter::{ConeParams, EmitterKind, PannerParams, PlayState, ResolvedEmitter, Voice};
pub use error::{ResonaError, Result, Section};
pub use export::{AudioEmitterExporter, AudioEncoder, BinaryChunkSink, ChunkSlice, EncodedAudio};
pub use graph::{AttachPoint, SceneGraph};
pub use loader::{AudioDecoder, AudioFetcher, BufferViewProvider, SourceLoader, SymphoniaDecoder};
pub use math::WorldPose;
pub use resolver::{DocumentResolution, EmitterFuture, EmitterResolver};
pub use scheduler::AutoplayGate;
