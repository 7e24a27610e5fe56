use std::sync::Arc;

use super::support::{Harness, HarnessOptions, speech_wav};
use crate::errors::AppError;
use crate::models::{
    AdvancedModifications, AudioEnhancement, AudioFile, Emotion, NewPreset, ProcessedVoiceResult,
    VoiceEmotions, VoiceTransformation,
};
use crate::services::audio::chain::emotion_bundle;
use crate::services::audio::{FilterProgram, UnwiredStage};
use crate::services::store::documents::list_typed;
use crate::services::store::{Collection, Query};

async fn uploaded(h: &Harness, user_id: &str) -> AudioFile {
    h.library
        .upload(user_id, speech_wav(), "Source", "wav")
        .await
        .unwrap()
}

async fn processed(h: &Harness) -> Vec<ProcessedVoiceResult> {
    list_typed(h.documents.as_ref(), Collection::ProcessedVoices, &Query::new())
        .await
        .unwrap()
}

fn happy_pitch_up() -> VoiceTransformation {
    let mut emotions = VoiceEmotions::default();
    emotions.set(Emotion::Happiness, 0.8);
    emotions.set(Emotion::Sadness, 0.2);
    VoiceTransformation {
        pitch: Some(10.0),
        emotions: Some(emotions),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_process_runs_basic_then_chain_and_persists() {
    let h = Harness::new();
    let audio = uploaded(&h, "u1").await;

    let result = h
        .processor
        .process(&audio.id, "u1", &happy_pitch_up(), None)
        .await
        .unwrap();

    let happiness = FilterProgram::from(emotion_bundle(Emotion::Happiness)).to_filter_graph(44_100);
    assert_eq!(
        h.executor.graphs(),
        vec!["asetrate=48510,aresample=44100".to_string(), happiness]
    );

    assert_eq!(result.original_audio_id, audio.id);
    assert_eq!(result.format, "mp3");
    assert!((result.duration - 0.5).abs() < 0.01);
    assert!(result.url.starts_with("http://files.test/processed/u1/"));
    assert_eq!(processed(&h).await, vec![result]);

    // промежуточный объект удалён, исходный остался
    assert_eq!(h.objects_in("audio/u1"), 1);
    assert_eq!(h.objects_in("processed/u1"), 1);
}

#[tokio::test]
async fn test_unavailable_enhancement_fails_loudly() {
    let h = Harness::new();
    let audio = uploaded(&h, "u1").await;
    let t = VoiceTransformation {
        pitch: Some(5.0),
        enhancement: Some(AudioEnhancement {
            noise_suppression: Some(true),
            dereverberation: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    };

    let err = h.processor.process(&audio.id, "u1", &t, None).await.unwrap_err();
    assert!(matches!(err, AppError::Unimplemented(_)));
    assert!(processed(&h).await.is_empty());
    assert_eq!(h.objects_in("processed"), 0);
    assert_eq!(h.objects_in("audio/u1"), 1);
}

#[tokio::test]
async fn test_advanced_modifications_without_backend() {
    let h = Harness::with(HarnessOptions {
        advanced: Arc::new(UnwiredStage::new("Formant shifting")),
        ..Default::default()
    });
    let audio = uploaded(&h, "u1").await;
    let t = VoiceTransformation {
        advanced: Some(AdvancedModifications {
            formant: Some(10.0),
            ..Default::default()
        }),
        ..Default::default()
    };

    let err = h.processor.process(&audio.id, "u1", &t, None).await.unwrap_err();
    assert_eq!(err.to_string(), "Formant shifting is not available");
    assert!(processed(&h).await.is_empty());
    assert_eq!(h.objects_in("audio/u1"), 1);

    // без запроса advanced стадия не вызывается
    let plain = VoiceTransformation {
        pitch: Some(10.0),
        ..Default::default()
    };
    assert!(h.processor.process(&audio.id, "u1", &plain, None).await.is_ok());
}

#[tokio::test]
async fn test_request_overrides_preset() {
    let h = Harness::new();
    let audio = uploaded(&h, "u1").await;
    let preset = h
        .presets
        .create(
            "u1",
            NewPreset {
                name: "Chipmunk".to_string(),
                transformation: VoiceTransformation {
                    pitch: Some(15.0),
                    speed: Some(1.2),
                    ..Default::default()
                },
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let request = VoiceTransformation {
        speed: Some(0.8),
        volume: Some(10.0),
        ..Default::default()
    };
    let result = h
        .processor
        .process(&audio.id, "u1", &request, Some(&preset.id))
        .await
        .unwrap();

    assert_eq!(result.transformation.pitch, Some(15.0));
    assert_eq!(result.transformation.speed, Some(0.8));
    assert_eq!(result.transformation.volume, Some(10.0));
    assert_eq!(result.preset.map(|p| p.id), Some(preset.id));
}

#[tokio::test]
async fn test_foreign_audio_and_private_preset_are_not_found() {
    let h = Harness::new();
    let audio = uploaded(&h, "owner").await;
    let t = VoiceTransformation {
        pitch: Some(10.0),
        ..Default::default()
    };

    let err = h.processor.process(&audio.id, "intruder", &t, None).await.unwrap_err();
    assert_eq!(err.to_string(), "Audio not found");

    let private = h
        .presets
        .create(
            "owner",
            NewPreset {
                name: "Secret".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let own_audio = uploaded(&h, "intruder").await;
    let err = h
        .processor
        .process(&own_audio.id, "intruder", &t, Some(&private.id))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert!(h.executor.graphs().is_empty());
    assert!(processed(&h).await.is_empty());
}
