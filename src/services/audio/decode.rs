//! # Декодирование аудио
//!
//! Любой поддерживаемый формат (MP3, AAC, WAV) приводится к моно PCM f32.
//! WAV читается напрямую через `hound`, остальное через Symphonia.

use std::io::Cursor;

use hound::{SampleFormat, WavReader};
use log::{debug, warn};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::errors::{AppError, AppResult};

/// Mono PCM samples with their sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

fn is_wav(data: &[u8]) -> bool {
    data.len() > 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WAVE"
}

/// Decodes an encoded buffer, mixing all channels down to mono.
pub fn decode_audio(data: &[u8]) -> AppResult<DecodedAudio> {
    if is_wav(data) {
        match decode_wav(data) {
            Ok(decoded) => return Ok(decoded),
            // например, WAV с float64 или экзотическим заголовком
            Err(e) => warn!("hound could not read WAV, falling back to symphonia: {}", e),
        }
    }
    decode_with_symphonia(data)
}

fn decode_wav(data: &[u8]) -> AppResult<DecodedAudio> {
    let mut reader = WavReader::new(Cursor::new(data))
        .map_err(|e| AppError::AudioProcessing(format!("Invalid WAV data: {}", e)))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| AppError::AudioProcessing(format!("WAV read error: {}", e)))?,
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(|e| AppError::AudioProcessing(format!("WAV read error: {}", e)))?
        }
    };

    Ok(DecodedAudio {
        samples: mix_to_mono(&interleaved, channels),
        sample_rate: spec.sample_rate,
    })
}

fn mix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

fn decode_with_symphonia(data: &[u8]) -> AppResult<DecodedAudio> {
    let cursor = Cursor::new(data.to_vec());
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

    let format_opts = FormatOptions {
        enable_gapless: false,
        ..Default::default()
    };
    let probed = symphonia::default::get_probe()
        .format(&Hint::new(), mss, &format_opts, &MetadataOptions::default())
        .map_err(|e| AppError::AudioProcessing(format!("Unrecognized audio format: {}", e)))?;

    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AppError::AudioProcessing("No audio track found".to_string()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions { verify: false })
        .map_err(|e| AppError::AudioProcessing(format!("Unsupported codec: {}", e)))?;

    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => {
                return Err(AppError::AudioProcessing(format!("Failed to read packet: {}", e)));
            }
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                if sample_rate == 0 {
                    sample_rate = spec.rate;
                }
                let channels = spec.channels.count().max(1);
                let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buffer.copy_interleaved_ref(decoded);
                samples.extend(mix_to_mono(buffer.samples(), channels));
            }
            Err(SymphoniaError::DecodeError(e)) => {
                // битый пакет пропускаем
                warn!("Skipping undecodable packet: {}", e);
            }
            Err(e) => {
                return Err(AppError::AudioProcessing(format!("Decode failed: {}", e)));
            }
        }
    }

    if sample_rate == 0 {
        return Err(AppError::AudioProcessing("Unknown sample rate".to_string()));
    }
    debug!("Decoded {} samples at {} Hz", samples.len(), sample_rate);
    Ok(DecodedAudio {
        samples,
        sample_rate,
    })
}
