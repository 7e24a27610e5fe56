//! Описание фильтров ffmpeg в виде типизированной программы.
//!
//! Стадии цепочки строят [`FilterProgram`], а исполнитель превращает её в
//! строку `-af` только в самом конце.

use std::fmt::Write as _;

/// Dynamic range compressor settings, ffmpeg `acompressor` units.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressorSettings {
    pub threshold_db: f64,
    pub ratio: f64,
    pub attack_ms: f64,
    pub release_ms: f64,
}

impl Default for CompressorSettings {
    fn default() -> Self {
        Self {
            threshold_db: -24.0,
            ratio: 12.0,
            attack_ms: 3.0,
            release_ms: 250.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AudioFilter {
    /// Reinterpret the sample rate; shifts pitch and tempo together.
    Resample { factor: f64 },
    /// Tempo change without pitch change.
    Tempo { factor: f64 },
    /// Linear gain multiplier.
    Gain { factor: f64 },
    Compressor(CompressorSettings),
    Vibrato { frequency: f64, depth: f64 },
    Tremolo { frequency: f64, depth: f64 },
    Echo {
        in_gain: f64,
        out_gain: f64,
        delay_ms: f64,
        decay: f64,
    },
    Chorus,
    /// FFT noise reduction.
    Denoise,
}

// atempo принимает только 0.5..2.0, большие множители раскладываем в цепочку
const ATEMPO_MIN: f64 = 0.5;
const ATEMPO_MAX: f64 = 2.0;

fn tempo_factors(mut factor: f64) -> Vec<f64> {
    let mut factors = Vec::new();
    while factor > ATEMPO_MAX {
        factors.push(ATEMPO_MAX);
        factor /= ATEMPO_MAX;
    }
    while factor < ATEMPO_MIN {
        factors.push(ATEMPO_MIN);
        factor /= ATEMPO_MIN;
    }
    factors.push(factor);
    factors
}

impl AudioFilter {
    /// ffmpeg filter expression for this step.
    pub fn to_expression(&self, sample_rate: u32) -> String {
        match self {
            AudioFilter::Resample { factor } => {
                let rate = (sample_rate as f64 * factor).round().max(1.0) as u64;
                format!("asetrate={},aresample={}", rate, sample_rate)
            }
            AudioFilter::Tempo { factor } => tempo_factors(*factor)
                .iter()
                .map(|f| format!("atempo={}", f))
                .collect::<Vec<_>>()
                .join(","),
            AudioFilter::Gain { factor } => format!("volume={}", factor),
            AudioFilter::Compressor(settings) => format!(
                "acompressor=threshold={}dB:ratio={}:attack={}:release={}",
                settings.threshold_db, settings.ratio, settings.attack_ms, settings.release_ms
            ),
            AudioFilter::Vibrato { frequency, depth } => {
                format!("vibrato=f={}:d={}", frequency, depth)
            }
            AudioFilter::Tremolo { frequency, depth } => {
                format!("tremolo=f={}:d={}", frequency, depth)
            }
            AudioFilter::Echo {
                in_gain,
                out_gain,
                delay_ms,
                decay,
            } => format!("aecho={}:{}:{}:{}", in_gain, out_gain, delay_ms, decay),
            AudioFilter::Chorus => "chorus=0.5:0.9:50|60|40:0.4|0.32|0.3:0.25|0.4|0.3:2|2.3|1.3".to_string(),
            AudioFilter::Denoise => "afftdn".to_string(),
        }
    }
}

/// Ordered list of filters applied in one ffmpeg pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterProgram {
    filters: Vec<AudioFilter>,
}

impl FilterProgram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, filter: AudioFilter) {
        self.filters.push(filter);
    }

    pub fn extend(&mut self, other: FilterProgram) {
        self.filters.extend(other.filters);
    }

    pub fn filters(&self) -> &[AudioFilter] {
        &self.filters
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Comma-joined `-af` argument.
    pub fn to_filter_graph(&self, sample_rate: u32) -> String {
        let mut graph = String::new();
        for (i, filter) in self.filters.iter().enumerate() {
            if i > 0 {
                graph.push(',');
            }
            let _ = write!(graph, "{}", filter.to_expression(sample_rate));
        }
        graph
    }
}

impl From<Vec<AudioFilter>> for FilterProgram {
    fn from(filters: Vec<AudioFilter>) -> Self {
        Self { filters }
    }
}
