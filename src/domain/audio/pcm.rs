use super::format::AudioFormat;
use std::io::Cursor;
use std::time::Duration;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("unrecognized audio format")]
    UnknownFormat,
    #[error("wav error: {0}")]
    Wav(#[from] hound::Error),
    #[error("mp3 decode error: {0}")]
    Mp3(#[from] SymphoniaError),
    #[error("mp3 encode error: {0}")]
    Mp3Encode(String),
    #[error("no decodable audio track")]
    NoTrack,
    #[error("nothing to assemble")]
    NoInput,
}

/// Interleaved samples in [-1.0, 1.0]
#[derive(Debug, Clone, PartialEq)]
pub struct PcmAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl PcmAudio {
    pub fn silence(sample_rate: u32, channels: u16, duration: Duration) -> Self {
        let frames = frames_for(duration, sample_rate);
        Self {
            samples: vec![0.0; frames * channels as usize],
            sample_rate,
            channels,
        }
    }

    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Bring this audio to the given layout (downmix/upmix, linear resample)
    pub fn convert(self, sample_rate: u32, channels: u16) -> Self {
        let samples = if self.channels == channels {
            self.samples
        } else {
            remix(&self.samples, self.channels, channels)
        };

        let samples = if self.sample_rate == sample_rate {
            samples
        } else {
            resample_linear(&samples, channels, self.sample_rate, sample_rate)
        };

        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// Samples as 16-bit integers, clamped
    pub fn to_i16(&self) -> Vec<i16> {
        self.samples
            .iter()
            .map(|s| (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16)
            .collect()
    }
}

pub fn frames_for(duration: Duration, sample_rate: u32) -> usize {
    (duration.as_secs_f64() * sample_rate as f64).round() as usize
}

/// Decode a WAV or MP3 blob to PCM
pub fn decode(bytes: &[u8]) -> Result<PcmAudio, AudioError> {
    match AudioFormat::sniff(bytes) {
        Some(AudioFormat::Wav) => decode_wav(bytes),
        Some(AudioFormat::Mp3) => decode_mp3(bytes),
        None => Err(AudioError::UnknownFormat),
    }
}

fn decode_wav(bytes: &[u8]) -> Result<PcmAudio, AudioError> {
    let reader = hound::WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();

    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    Ok(PcmAudio {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

fn decode_mp3(bytes: &[u8]) -> Result<PcmAudio, AudioError> {
    let source = Cursor::new(bytes.to_vec());
    let mss = MediaSourceStream::new(Box::new(source), Default::default());

    let mut hint = Hint::new();
    hint.with_extension("mp3");

    let detected = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = detected.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(AudioError::NoTrack)?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(0);
    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate = spec.rate;
                channels = spec.channels.count() as u16;

                let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buffer.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buffer.samples());
            }
            // Corrupt frame: skip it, keep the rest of the stream
            Err(SymphoniaError::DecodeError(reason)) => {
                tracing::debug!(reason = reason, "Skipping undecodable mp3 frame");
            }
            Err(e) => return Err(e.into()),
        }
    }

    if samples.is_empty() || channels == 0 {
        return Err(AudioError::NoTrack);
    }

    Ok(PcmAudio {
        samples,
        sample_rate,
        channels,
    })
}

fn remix(samples: &[f32], from: u16, to: u16) -> Vec<f32> {
    let from = from.max(1) as usize;
    let to = to.max(1) as usize;

    samples
        .chunks(from)
        .flat_map(|frame| {
            let mean = frame.iter().sum::<f32>() / frame.len() as f32;
            std::iter::repeat(mean).take(to)
        })
        .collect()
}

fn resample_linear(samples: &[f32], channels: u16, from_rate: u32, to_rate: u32) -> Vec<f32> {
    let channels = channels.max(1) as usize;
    let frames_in = samples.len() / channels;
    if frames_in == 0 || from_rate == 0 || to_rate == 0 {
        return Vec::new();
    }

    let frames_out = (frames_in as u64 * to_rate as u64 / from_rate as u64) as usize;
    let step = from_rate as f64 / to_rate as f64;
    let mut out = Vec::with_capacity(frames_out * channels);

    for i in 0..frames_out {
        let position = i as f64 * step;
        let index = (position.floor() as usize).min(frames_in - 1);
        let next = (index + 1).min(frames_in - 1);
        let fraction = (position - index as f64) as f32;
        for c in 0..channels {
            let a = samples[index * channels + c];
            let b = samples[next * channels + c];
            out.push(a + (b - a) * fraction);
        }
    }

    out
}
