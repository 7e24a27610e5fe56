//! # Анализ обработанного голоса
//!
//! Все метрики производные и не авторитетные: это быстрые эвристики по
//! моно-сигналу, а не модель. Распознавание эмоций вынесено за трейт
//! [`EmotionClassifier`], чтобы эвристику можно было заменить.

use log::debug;

use super::decode::DecodedAudio;
use crate::models::{
    Emotion, EmotionalMarkers, EnergyProfile, PitchStats, QualityScores, TempoStats, VoiceAnalysis,
    VoiceEmotions,
};

const MIN_PITCH_HZ: f64 = 60.0;
const MAX_PITCH_HZ: f64 = 400.0;
/// Peaks within this share of the best correlation count as the period.
const PEAK_SHARE: f64 = 0.9;
const MIN_VOICED_CORRELATION: f64 = 0.3;
const MAX_PITCH_FRAMES: usize = 120;
const ENERGY_BUCKETS: usize = 10;
const CLIP_LEVEL: f32 = 0.999;
const MAX_SNR_DB: f64 = 60.0;
/// Syllables per word used to turn syllable rate into words per minute.
const SYLLABLES_PER_WORD: f64 = 1.5;

/// Prosodic features the emotion classifier works from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProsodyFeatures {
    pub pitch: PitchStats,
    pub tempo: TempoStats,
    pub energy: f64,
}

pub trait EmotionClassifier: Send + Sync {
    fn classify(&self, features: &ProsodyFeatures) -> EmotionalMarkers;
}

/// Weighted-feature heuristic over pitch level, pitch variability, rate and energy.
#[derive(Debug, Clone, Default)]
pub struct ProsodyClassifier;

fn unit(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

impl EmotionClassifier for ProsodyClassifier {
    fn classify(&self, features: &ProsodyFeatures) -> EmotionalMarkers {
        if features.pitch.mean <= 0.0 {
            return EmotionalMarkers::neutral();
        }

        let level = unit((features.pitch.mean - 100.0) / 200.0);
        let variability = unit(features.pitch.variability / 50.0);
        let rate = unit((features.tempo.words_per_minute - 100.0) / 100.0);
        let energy = unit(features.energy / 0.3);

        let raw = [
            (Emotion::Happiness, 0.4 * level + 0.3 * variability + 0.3 * rate),
            (Emotion::Sadness, 0.5 * (1.0 - level) + 0.3 * (1.0 - energy) + 0.2 * (1.0 - rate)),
            (Emotion::Anger, 0.5 * energy + 0.3 * rate + 0.2 * (1.0 - variability)),
            (Emotion::Fear, 0.5 * variability + 0.3 * rate + 0.2 * (1.0 - energy)),
            (Emotion::Surprise, 0.6 * variability + 0.4 * level),
            (Emotion::Neutral, 1.0 - variability),
        ];
        let total: f64 = raw.iter().map(|(_, score)| score).sum();

        let mut scores = VoiceEmotions::default();
        for (emotion, score) in raw {
            let share = if total > 0.0 { score / total * 100.0 } else { 0.0 };
            scores.set(emotion, (share * 10.0).round() / 10.0);
        }

        match scores.dominant() {
            Some((emotion, confidence)) => EmotionalMarkers {
                dominant_emotion: emotion,
                confidence,
                emotion_scores: scores,
            },
            None => EmotionalMarkers::neutral(),
        }
    }
}

fn rms(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|s| (*s as f64) * (*s as f64)).sum();
    (sum / samples.len() as f64).sqrt()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

/// Pitch estimate of one frame: `(f0 Hz, normalized correlation)`.
fn frame_pitch(frame: &[f32], sample_rate: u32) -> Option<(f64, f64)> {
    let min_lag = (sample_rate as f64 / MAX_PITCH_HZ).floor() as usize;
    let max_lag = (sample_rate as f64 / MIN_PITCH_HZ).ceil() as usize;
    if min_lag < 1 || max_lag + 1 >= frame.len() {
        return None;
    }

    let energy: f64 = frame.iter().map(|s| (*s as f64).powi(2)).sum();
    if energy <= f64::EPSILON {
        return None;
    }

    let correlations: Vec<f64> = (min_lag..=max_lag)
        .map(|lag| {
            let sum: f64 = frame
                .iter()
                .zip(&frame[lag..])
                .map(|(a, b)| (*a as f64) * (*b as f64))
                .sum();
            sum / energy
        })
        .collect();

    let best = correlations.iter().cloned().fold(f64::MIN, f64::max);
    if best < MIN_VOICED_CORRELATION {
        return None;
    }

    // первый локальный максимум, близкий к глобальному, чтобы не уйти в октаву ниже
    let threshold = best * PEAK_SHARE;
    let index = (0..correlations.len()).find(|&i| {
        let c = correlations[i];
        let left = if i == 0 { f64::MIN } else { correlations[i - 1] };
        let right = correlations.get(i + 1).copied().unwrap_or(f64::MIN);
        c >= threshold && c >= left && c >= right
    })?;

    let lag = min_lag + index;
    Some((sample_rate as f64 / lag as f64, correlations[index]))
}

struct FrameStats {
    pitches: Vec<f64>,
    correlations: Vec<f64>,
}

fn pitch_frames(audio: &DecodedAudio) -> FrameStats {
    let frame_len = (audio.sample_rate / 25) as usize;
    let hop = (frame_len / 2).max(1);
    let mut stats = FrameStats {
        pitches: Vec::new(),
        correlations: Vec::new(),
    };
    if frame_len == 0 || audio.samples.len() < frame_len {
        return stats;
    }

    let overall = rms(&audio.samples);
    let starts: Vec<usize> = (0..=audio.samples.len() - frame_len)
        .step_by(hop)
        .filter(|&start| rms(&audio.samples[start..start + frame_len]) > overall * 0.5)
        .collect();
    let stride = starts.len().div_ceil(MAX_PITCH_FRAMES).max(1);

    for start in starts.into_iter().step_by(stride) {
        if let Some((f0, correlation)) = frame_pitch(&audio.samples[start..start + frame_len], audio.sample_rate) {
            stats.pitches.push(f0);
            stats.correlations.push(correlation);
        }
    }
    stats
}

fn pitch_stats(pitches: &[f64]) -> PitchStats {
    if pitches.is_empty() {
        return PitchStats::default();
    }
    let min = pitches.iter().cloned().fold(f64::MAX, f64::min);
    let max = pitches.iter().cloned().fold(f64::MIN, f64::max);
    PitchStats {
        mean: mean(pitches),
        range: max - min,
        variability: std_dev(pitches),
    }
}

fn energy_profile(samples: &[f32]) -> EnergyProfile {
    let distribution = if samples.is_empty() {
        vec![0.0; ENERGY_BUCKETS]
    } else {
        let bucket = samples.len().div_ceil(ENERGY_BUCKETS);
        let mut values: Vec<f64> = samples.chunks(bucket).map(rms).collect();
        values.resize(ENERGY_BUCKETS, 0.0);
        values
    };
    EnergyProfile {
        overall: rms(samples),
        distribution,
    }
}

/// 10 ms RMS envelope.
fn envelope(audio: &DecodedAudio) -> Vec<f64> {
    let window = (audio.sample_rate / 100).max(1) as usize;
    audio.samples.chunks(window).map(rms).collect()
}

fn tempo_stats(audio: &DecodedAudio) -> TempoStats {
    let env = envelope(audio);
    let duration = audio.duration_secs();
    if env.len() < 3 || duration <= 0.0 {
        return TempoStats::default();
    }

    let threshold = mean(&env) * 1.2;
    let min_gap = 10; // 100 мс в окнах по 10 мс
    let mut peaks: Vec<usize> = Vec::new();
    for i in 1..env.len() - 1 {
        let is_peak = env[i] > threshold && env[i] >= env[i - 1] && env[i] > env[i + 1];
        let spaced = peaks.last().is_none_or(|last| i - last >= min_gap);
        if is_peak && spaced {
            peaks.push(i);
        }
    }

    let syllables_per_minute = peaks.len() as f64 / (duration / 60.0);
    let intervals: Vec<f64> = peaks.windows(2).map(|w| (w[1] - w[0]) as f64).collect();
    let regularity = if intervals.len() >= 2 && mean(&intervals) > 0.0 {
        unit(1.0 - std_dev(&intervals) / mean(&intervals))
    } else {
        0.0
    };

    TempoStats {
        words_per_minute: syllables_per_minute / SYLLABLES_PER_WORD,
        beat_regularity: regularity,
    }
}

fn quality_scores(audio: &DecodedAudio, correlations: &[f64]) -> QualityScores {
    let samples = &audio.samples;
    if samples.is_empty() {
        return QualityScores::default();
    }

    let mut frames = envelope(audio);
    frames.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let tenth = (frames.len() / 10).max(1);
    let noise = mean(&frames[..tenth]);
    let signal = mean(&frames[frames.len() - tenth..]);
    let snr = if signal <= 0.0 {
        0.0
    } else if noise <= f64::EPSILON {
        MAX_SNR_DB
    } else {
        (20.0 * (signal / noise).log10()).clamp(0.0, MAX_SNR_DB)
    };

    let clipped = samples.iter().filter(|s| s.abs() >= CLIP_LEVEL).count();

    QualityScores {
        clarity: unit(mean(correlations)) * 100.0,
        snr,
        distortion: clipped as f64 / samples.len() as f64 * 100.0,
    }
}

/// Full analysis of a decoded buffer.
pub fn analyze(audio: &DecodedAudio, classifier: &dyn EmotionClassifier) -> VoiceAnalysis {
    let frames = pitch_frames(audio);
    let pitch = pitch_stats(&frames.pitches);
    let tempo = tempo_stats(audio);
    let energy = energy_profile(&audio.samples);

    let features = ProsodyFeatures {
        pitch: pitch.clone(),
        tempo: tempo.clone(),
        energy: energy.overall,
    };
    let emotional_markers = classifier.classify(&features);
    let quality = quality_scores(audio, &frames.correlations);

    debug!(
        "Analysis: pitch {:.1} Hz over {} frames, {:.0} wpm, dominant {}",
        pitch.mean,
        frames.pitches.len(),
        tempo.words_per_minute,
        emotional_markers.dominant_emotion.as_str()
    );

    VoiceAnalysis {
        pitch,
        tempo,
        energy,
        emotional_markers,
        quality,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::audio::decode::tests::sine;

    fn audio(samples: Vec<f32>, sample_rate: u32) -> DecodedAudio {
        DecodedAudio {
            samples,
            sample_rate,
        }
    }

    #[test]
    fn sine_pitch_is_detected() {
        let decoded = audio(sine(200.0, 1.0, 16000, 0.5), 16000);
        let analysis = analyze(&decoded, &ProsodyClassifier);
        assert!((analysis.pitch.mean - 200.0).abs() < 5.0, "{}", analysis.pitch.mean);
        assert!(analysis.pitch.range < 10.0);
        assert!(analysis.quality.clarity > 80.0);
        assert_eq!(analysis.quality.distortion, 0.0);
    }

    #[test]
    fn silence_is_neutral_and_quiet() {
        let decoded = audio(vec![0.0; 16000], 16000);
        let analysis = analyze(&decoded, &ProsodyClassifier);
        assert_eq!(analysis.pitch, PitchStats::default());
        assert_eq!(analysis.emotional_markers, EmotionalMarkers::neutral());
        assert_eq!(analysis.energy.overall, 0.0);
        assert_eq!(analysis.energy.distribution.len(), ENERGY_BUCKETS);
        assert_eq!(analysis.quality.snr, 0.0);
    }

    #[test]
    fn energy_distribution_follows_loudness() {
        let mut samples = sine(150.0, 0.5, 8000, 0.1);
        samples.extend(sine(150.0, 0.5, 8000, 0.8));
        let profile = energy_profile(&samples);
        assert!(profile.distribution[9] > profile.distribution[0] * 4.0);
    }

    #[test]
    fn bursts_produce_regular_tempo() {
        // 12 слогов с паузами между ними, около 3 секунд
        let sample_rate = 8000;
        let mut samples = Vec::new();
        let gap = vec![0.0; (0.15 * sample_rate as f32) as usize];
        for _ in 0..12 {
            samples.extend(gap.iter().copied());
            samples.extend(sine(180.0, 0.1, sample_rate, 0.6));
        }
        samples.extend(gap.iter().copied());
        let tempo = tempo_stats(&audio(samples, sample_rate));
        assert!((tempo.words_per_minute - 240.0 / SYLLABLES_PER_WORD).abs() < 25.0, "{}", tempo.words_per_minute);
        assert!(tempo.beat_regularity > 0.8);
    }

    #[test]
    fn clipping_counts_as_distortion() {
        let samples = vec![1.0, -1.0, 0.2, 0.1];
        let q = quality_scores(&audio(samples, 8000), &[]);
        assert_eq!(q.distortion, 50.0);
    }

    #[test]
    fn classifier_scores_sum_to_hundred() {
        let features = ProsodyFeatures {
            pitch: PitchStats {
                mean: 260.0,
                range: 120.0,
                variability: 45.0,
            },
            tempo: TempoStats {
                words_per_minute: 190.0,
                beat_regularity: 0.5,
            },
            energy: 0.2,
        };
        let markers = ProsodyClassifier.classify(&features);
        let total: f64 = markers.emotion_scores.iter().map(|(_, s)| s).sum();
        assert!((total - 100.0).abs() < 0.5);
        assert_eq!(markers.emotion_scores.get(markers.dominant_emotion), Some(markers.confidence));
    }
}
