// TTS services module
// Speech providers and the selector that picks between them

use bytes::Bytes;

use crate::errors::AppResult;

pub mod chunking;
pub mod google;
pub mod selector;
pub mod voicerss;

pub use chunking::split_text_into_chunks;
pub use google::GoogleTranslateProvider;
pub use selector::{BaseAudio, SynthesisSelector};
pub use voicerss::VoiceRssProvider;

/// Trait that all speech backends implement
#[async_trait::async_trait]
pub trait SpeechProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Longest text accepted in one call; `None` means no limit.
    fn max_text_length(&self) -> Option<usize> {
        None
    }

    /// Encoded audio (mp3) for `text`.
    async fn synthesize(&self, text: &str, voice_id: &str) -> AppResult<Bytes>;
}
