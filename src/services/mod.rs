// Services module
// Contains business logic separated by domain areas

pub mod audio;      // Signal stages, filter chain, analysis
pub mod cache;      // Result cache over the key-value store
pub mod library;    // Text-to-speech generation and stored files
pub mod presets;    // Voice presets
pub mod processing; // Transformation of stored audio
pub mod quota;      // Daily and storage limits
pub mod store;      // Key-value, document and object storage
pub mod tts;        // Speech providers

pub use cache::{CachedResult, ResultCache};
pub use library::{AudioLibrary, AudioUpdate, GenerateRequest};
pub use presets::PresetService;
pub use processing::{ProcessedAudio, StagePipeline, VoiceProcessor};
pub use quota::{Admission, QuotaLedger};

#[cfg(test)]
mod tests;
