// Domain models module
// Contains core data structures used throughout the pipeline

pub mod audio;
pub mod voice;

// Экспортируем основные типы для удобства использования
pub use audio::{
    AudioFile, EmotionalMarkers, EnergyProfile, GeneratedAudio, NewPreset, PitchStats,
    ProcessedVoiceResult, QualityScores, QuotaSnapshot, TempoStats, VoiceAnalysis, VoicePreset,
};
pub use voice::{
    AdvancedModifications, AudioEnhancement, BackgroundNoise, ChorusEffect, EchoEffect, Emotion,
    ReverbEffect, VoiceCharacteristics, VoiceEffects, VoiceEmotions, VoiceTransformation,
};
