// Audio processing: filter programs, the transformation chain, ffmpeg
// execution, signal stages and analysis of the result.

pub mod analysis;
pub mod chain;
pub mod decode;
pub mod ffmpeg;
pub mod filters;
pub mod stages;

pub use analysis::{EmotionClassifier, ProsodyClassifier, analyze};
pub use chain::{ChainStage, build_filter_program, build_stages};
pub use decode::{DecodedAudio, decode_audio};
pub use ffmpeg::{FfmpegExecutor, FilterGraphExecutor};
pub use filters::{AudioFilter, CompressorSettings, FilterProgram};
pub use stages::{FilterChainStage, FilterGraphEnhancer, PassThroughStage, SignalStage, UnwiredStage};
