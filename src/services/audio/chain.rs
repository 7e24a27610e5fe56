//! # Цепочка преобразований
//!
//! Преобразование голоса раскладывается на именованные стадии, которые
//! всегда выполняются в порядке [`ChainStage::ORDER`]. Каждая стадия это
//! чистая функция `(FilterProgram, &VoiceTransformation) -> FilterProgram`,
//! которая ничего не делает, если соответствующего поля нет.
//!
//! Значения, совпадающие с "без изменений" (pitch 0, speed 1, volume 0,
//! gender 0), фильтров не порождают. Возраст 0 тоже пропускается: множитель
//! `age/50` дал бы нулевую частоту дискретизации.

use log::debug;

use super::filters::{AudioFilter, CompressorSettings, FilterProgram};
use crate::models::{Emotion, VoiceTransformation};

// Константы эффектов
const REVERB_IN_GAIN: f64 = 0.8;
const REVERB_OUT_GAIN: f64 = 0.9;
const REVERB_DECAY: f64 = 0.5;
const REVERB_DEFAULT_DELAY: f64 = 40.0;

const ECHO_IN_GAIN: f64 = 0.8;
const ECHO_OUT_GAIN: f64 = 0.88;
const ECHO_DEFAULT_DELAY: f64 = 60.0;
const ECHO_DEFAULT_FEEDBACK: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainStage {
    Basic,
    Emotion,
    Characteristics,
    Effects,
}

impl ChainStage {
    /// Later stages assume the earlier ones already ran.
    pub const ORDER: [ChainStage; 4] = [
        ChainStage::Basic,
        ChainStage::Emotion,
        ChainStage::Characteristics,
        ChainStage::Effects,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ChainStage::Basic => "basic",
            ChainStage::Emotion => "emotion",
            ChainStage::Characteristics => "characteristics",
            ChainStage::Effects => "effects",
        }
    }

    pub fn apply(&self, program: FilterProgram, t: &VoiceTransformation) -> FilterProgram {
        match self {
            ChainStage::Basic => basic_stage(program, t),
            ChainStage::Emotion => emotion_stage(program, t),
            ChainStage::Characteristics => characteristics_stage(program, t),
            ChainStage::Effects => effects_stage(program, t),
        }
    }
}

/// Full program: every stage in [`ChainStage::ORDER`].
pub fn build_filter_program(t: &VoiceTransformation) -> FilterProgram {
    build_stages(t, &ChainStage::ORDER)
}

/// Only the selected stages, still in canonical order whatever order `stages` lists them in.
pub fn build_stages(t: &VoiceTransformation, stages: &[ChainStage]) -> FilterProgram {
    let program = ChainStage::ORDER
        .iter()
        .filter(|stage| stages.contains(stage))
        .fold(FilterProgram::new(), |program, stage| stage.apply(program, t));
    debug!("Built filter program with {} filters", program.filters().len());
    program
}

pub fn basic_stage(mut program: FilterProgram, t: &VoiceTransformation) -> FilterProgram {
    if let Some(pitch) = t.pitch.filter(|p| *p != 0.0) {
        program.push(AudioFilter::Resample {
            factor: 1.0 + pitch / 100.0,
        });
    }
    if let Some(speed) = t.speed.filter(|s| *s != 1.0) {
        program.push(AudioFilter::Tempo { factor: speed });
    }
    if let Some(volume) = t.volume.filter(|v| *v != 0.0) {
        program.push(AudioFilter::Gain {
            factor: 1.0 + volume / 100.0,
        });
    }
    program
}

/// Filter bundle for a single emotion.
pub fn emotion_bundle(emotion: Emotion) -> Vec<AudioFilter> {
    match emotion {
        Emotion::Happiness => vec![
            AudioFilter::Resample { factor: 1.1 },
            AudioFilter::Tempo { factor: 1.1 },
        ],
        Emotion::Sadness => vec![
            AudioFilter::Resample { factor: 0.9 },
            AudioFilter::Tempo { factor: 0.9 },
        ],
        Emotion::Anger => vec![
            AudioFilter::Compressor(CompressorSettings::default()),
            AudioFilter::Vibrato {
                frequency: 4.0,
                depth: 0.2,
            },
        ],
        Emotion::Fear => vec![AudioFilter::Tremolo {
            frequency: 6.0,
            depth: 0.3,
        }],
        Emotion::Surprise | Emotion::Neutral => Vec::new(),
    }
}

pub fn emotion_stage(mut program: FilterProgram, t: &VoiceTransformation) -> FilterProgram {
    let Some((emotion, _)) = t.emotions.as_ref().and_then(|e| e.dominant()) else {
        return program;
    };
    for filter in emotion_bundle(emotion) {
        program.push(filter);
    }
    program
}

pub fn characteristics_stage(mut program: FilterProgram, t: &VoiceTransformation) -> FilterProgram {
    let Some(characteristics) = &t.characteristics else {
        return program;
    };
    if let Some(age) = characteristics.age.filter(|a| *a > 0.0) {
        program.push(AudioFilter::Resample { factor: age / 50.0 });
    }
    if let Some(gender) = characteristics.gender.filter(|g| *g != 0.0) {
        program.push(AudioFilter::Resample {
            factor: 1.0 + gender / 200.0,
        });
    }
    program
}

pub fn effects_stage(mut program: FilterProgram, t: &VoiceTransformation) -> FilterProgram {
    let Some(effects) = &t.effects else {
        return program;
    };

    if let Some(reverb) = effects.reverb.as_ref().filter(|r| r.enabled) {
        let delay = reverb
            .decay
            .filter(|d| *d > 0.0)
            .unwrap_or(REVERB_DEFAULT_DELAY);
        program.push(AudioFilter::Echo {
            in_gain: REVERB_IN_GAIN,
            out_gain: REVERB_OUT_GAIN,
            delay_ms: delay,
            decay: REVERB_DECAY,
        });
    }

    if let Some(echo) = effects.echo.as_ref().filter(|e| e.enabled) {
        program.push(AudioFilter::Echo {
            in_gain: ECHO_IN_GAIN,
            out_gain: ECHO_OUT_GAIN,
            delay_ms: echo.delay.filter(|d| *d > 0.0).unwrap_or(ECHO_DEFAULT_DELAY),
            decay: echo
                .feedback
                .filter(|f| *f > 0.0)
                .unwrap_or(ECHO_DEFAULT_FEEDBACK),
        });
    }

    if effects.chorus.as_ref().is_some_and(|c| c.enabled) {
        program.push(AudioFilter::Chorus);
    }

    program
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ChorusEffect, EchoEffect, ReverbEffect, VoiceCharacteristics, VoiceEffects, VoiceEmotions,
    };

    fn with_emotions(pairs: &[(Emotion, f64)]) -> VoiceTransformation {
        let mut emotions = VoiceEmotions::default();
        for (emotion, weight) in pairs {
            emotions.set(*emotion, *weight);
        }
        VoiceTransformation {
            emotions: Some(emotions),
            ..Default::default()
        }
    }

    #[test]
    fn empty_transformation_builds_nothing() {
        assert!(build_filter_program(&VoiceTransformation::default()).is_empty());
    }

    #[test]
    fn basic_stage_maps_pitch_speed_volume() {
        let t = VoiceTransformation {
            pitch: Some(20.0),
            speed: Some(1.5),
            volume: Some(-10.0),
            ..Default::default()
        };
        let program = build_filter_program(&t);
        assert_eq!(
            program.filters(),
            &[
                AudioFilter::Resample { factor: 1.2 },
                AudioFilter::Tempo { factor: 1.5 },
                AudioFilter::Gain { factor: 0.9 },
            ]
        );
    }

    #[test]
    fn identity_values_are_skipped() {
        let t = VoiceTransformation {
            pitch: Some(0.0),
            speed: Some(1.0),
            volume: Some(0.0),
            characteristics: Some(VoiceCharacteristics {
                age: Some(0.0),
                gender: Some(0.0),
                accent: None,
            }),
            ..Default::default()
        };
        assert!(build_filter_program(&t).is_empty());
    }

    #[test]
    fn happiness_wins_over_weaker_sadness() {
        let t = with_emotions(&[(Emotion::Happiness, 0.8), (Emotion::Sadness, 0.1)]);
        let program = build_filter_program(&t);
        assert_eq!(program.filters(), emotion_bundle(Emotion::Happiness).as_slice());
    }

    #[test]
    fn neutral_and_surprise_have_no_bundle() {
        let t = with_emotions(&[(Emotion::Surprise, 0.9)]);
        assert!(build_filter_program(&t).is_empty());
        let t = with_emotions(&[(Emotion::Neutral, 1.0)]);
        assert!(build_filter_program(&t).is_empty());
    }

    #[test]
    fn stages_run_in_fixed_order() {
        let mut t = with_emotions(&[(Emotion::Fear, 0.7)]);
        t.pitch = Some(10.0);
        t.characteristics = Some(VoiceCharacteristics {
            age: Some(25.0),
            gender: Some(50.0),
            accent: None,
        });
        t.effects = Some(VoiceEffects {
            chorus: Some(ChorusEffect { enabled: true }),
            ..Default::default()
        });

        // порядок аргумента не влияет на порядок стадий
        let program = build_stages(&t, &[ChainStage::Effects, ChainStage::Basic, ChainStage::Emotion]);
        assert_eq!(
            program.filters(),
            &[
                AudioFilter::Resample { factor: 1.1 },
                AudioFilter::Tremolo {
                    frequency: 6.0,
                    depth: 0.3
                },
                AudioFilter::Chorus,
            ]
        );

        let full = build_filter_program(&t);
        assert_eq!(
            &full.filters()[2..4],
            &[
                AudioFilter::Resample { factor: 0.5 },
                AudioFilter::Resample { factor: 1.25 },
            ]
        );
    }

    #[test]
    fn effects_use_user_parameters_and_fallbacks() {
        let t = VoiceTransformation {
            effects: Some(VoiceEffects {
                reverb: Some(ReverbEffect {
                    enabled: true,
                    decay: Some(0.0),
                }),
                echo: Some(EchoEffect {
                    enabled: true,
                    delay: Some(250.0),
                    feedback: Some(0.6),
                }),
                chorus: Some(ChorusEffect { enabled: false }),
            }),
            ..Default::default()
        };
        let program = build_filter_program(&t);
        assert_eq!(
            program.to_filter_graph(44100),
            "aecho=0.8:0.9:40:0.5,aecho=0.8:0.88:250:0.6"
        );
    }

    #[test]
    fn disabled_effects_are_ignored() {
        let t = VoiceTransformation {
            effects: Some(VoiceEffects {
                reverb: Some(ReverbEffect {
                    enabled: false,
                    decay: Some(50.0),
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(build_filter_program(&t).is_empty());
    }
}
