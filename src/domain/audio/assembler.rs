use super::format::AudioFormat;
use super::mp3::{encodable_channels, encodable_rate, Mp3Writer};
use super::pcm::{decode, AudioError, PcmAudio};
use serde::Serialize;
use std::time::Duration;

pub const DEFAULT_SILENCE_GAP: Duration = Duration::from_millis(150);

/// Single track ready for the presentation layer
#[derive(Debug, Clone, Serialize)]
pub struct AssembledAudio {
    #[serde(skip)]
    pub data: Vec<u8>,
    pub format: AudioFormat,
    pub sample_rate: u32,
    pub frames: usize,
    pub duration: Duration,
    pub chunk_count: usize,
    /// Set when merging failed and only the first chunk is returned
    pub degraded: bool,
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct AudioAssembler {
    silence_gap: Duration,
}

impl Default for AudioAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_SILENCE_GAP)
    }
}

impl AudioAssembler {
    pub fn new(silence_gap: Duration) -> Self {
        Self { silence_gap }
    }

    /// Concatenate chunk audio in order with a silence gap between chunks,
    /// encoded as MP3.
    ///
    /// A single MP3 blob is returned untouched. When any blob cannot be
    /// decoded or the result cannot be encoded, the first blob is returned
    /// alone and the result is flagged as degraded.
    pub fn assemble(&self, blobs: &[Vec<u8>]) -> Result<AssembledAudio, AudioError> {
        let first = blobs.first().ok_or(AudioError::NoInput)?;
        if blobs.len() == 1 && AudioFormat::sniff(first) == Some(AudioFormat::Mp3) {
            return Ok(passthrough(first, 1));
        }

        match self.merge(blobs) {
            Ok(assembled) => Ok(assembled),
            Err(e) => {
                let warning = format!(
                    "could not merge {} audio chunks ({}); returning the first chunk only",
                    blobs.len(),
                    e
                );
                tracing::warn!(
                    error = %e,
                    chunk_count = blobs.len(),
                    "Audio assembly failed, degrading to first chunk"
                );
                let mut degraded = passthrough(first, blobs.len());
                degraded.degraded = true;
                degraded.warning = Some(warning);
                Ok(degraded)
            }
        }
    }

    fn merge(&self, blobs: &[Vec<u8>]) -> Result<AssembledAudio, AudioError> {
        let mut decoded = blobs.iter().map(|blob| decode(blob));
        let first = decoded.next().ok_or(AudioError::NoInput)??;

        let mut writer = Mp3Writer::new(
            encodable_rate(first.sample_rate),
            encodable_channels(first.channels),
        )?;
        writer.write(first)?;

        for pcm in decoded {
            let pcm = pcm?;
            writer.write(PcmAudio::silence(
                writer.sample_rate(),
                writer.channels(),
                self.silence_gap,
            ))?;
            writer.write(pcm)?;
        }

        let sample_rate = writer.sample_rate();
        let frames = writer.frames();
        let data = writer.finish()?;

        tracing::debug!(
            chunk_count = blobs.len(),
            frames = frames,
            sample_rate = sample_rate,
            output_size = data.len(),
            "Audio chunks assembled"
        );

        Ok(AssembledAudio {
            data,
            format: AudioFormat::Mp3,
            sample_rate,
            frames,
            duration: Duration::from_secs_f64(frames as f64 / sample_rate as f64),
            chunk_count: blobs.len(),
            degraded: false,
            warning: None,
        })
    }
}

fn passthrough(blob: &[u8], chunk_count: usize) -> AssembledAudio {
    let format = AudioFormat::sniff(blob).unwrap_or(AudioFormat::Mp3);
    let pcm = decode(blob).ok();

    AssembledAudio {
        data: blob.to_vec(),
        format,
        sample_rate: pcm.as_ref().map(|p| p.sample_rate).unwrap_or(0),
        frames: pcm.as_ref().map(PcmAudio::frames).unwrap_or(0),
        duration: pcm.as_ref().map(PcmAudio::duration).unwrap_or_default(),
        chunk_count,
        degraded: false,
        warning: None,
    }
}
