use super::pcm::{AudioError, PcmAudio};
use mp3lame_encoder::{Bitrate, Builder, Encoder, FlushNoGap, InterleavedPcm, MonoPcm, Quality};

/// Sample rates LAME accepts as input without resampling
const SUPPORTED_RATES: [u32; 9] = [8000, 11025, 12000, 16000, 22050, 24000, 32000, 44100, 48000];

/// Closest rate LAME can encode that does not lose bandwidth
pub fn encodable_rate(sample_rate: u32) -> u32 {
    SUPPORTED_RATES
        .iter()
        .copied()
        .find(|rate| *rate >= sample_rate)
        .unwrap_or(48000)
}

/// LAME encodes mono or stereo only
pub fn encodable_channels(channels: u16) -> u16 {
    channels.clamp(1, 2)
}

/// Incremental MP3 encoder: PCM is pushed chunk by chunk so the whole
/// decoded track never has to sit in memory.
pub struct Mp3Writer {
    encoder: Encoder,
    sample_rate: u32,
    channels: u16,
    frames: usize,
    output: Vec<u8>,
}

impl Mp3Writer {
    pub fn new(sample_rate: u32, channels: u16) -> Result<Self, AudioError> {
        let mut builder = Builder::new()
            .ok_or_else(|| AudioError::Mp3Encode("could not allocate encoder".to_string()))?;
        builder
            .set_num_channels(channels as u8)
            .map_err(encode_error)?;
        builder.set_sample_rate(sample_rate).map_err(encode_error)?;
        builder.set_brate(Bitrate::Kbps64).map_err(encode_error)?;
        builder.set_quality(Quality::Good).map_err(encode_error)?;
        let encoder = builder.build().map_err(encode_error)?;

        Ok(Self {
            encoder,
            sample_rate,
            channels,
            frames: 0,
            output: Vec::new(),
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Frames written so far
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Encode `pcm`, converting it to the writer's layout first
    pub fn write(&mut self, pcm: PcmAudio) -> Result<(), AudioError> {
        let pcm = pcm.convert(self.sample_rate, self.channels);
        let samples = pcm.to_i16();
        if samples.is_empty() {
            return Ok(());
        }

        self.output
            .reserve(mp3lame_encoder::max_required_buffer_size(samples.len()));
        let encoded = if self.channels == 1 {
            self.encoder
                .encode_to_vec(MonoPcm(samples.as_slice()), &mut self.output)
        } else {
            self.encoder
                .encode_to_vec(InterleavedPcm(samples.as_slice()), &mut self.output)
        };
        encoded.map_err(encode_error)?;

        self.frames += pcm.frames();
        Ok(())
    }

    pub fn finish(mut self) -> Result<Vec<u8>, AudioError> {
        self.output
            .reserve(mp3lame_encoder::max_required_buffer_size(0));
        self.encoder
            .flush_to_vec::<FlushNoGap>(&mut self.output)
            .map_err(encode_error)?;
        Ok(self.output)
    }
}

fn encode_error(e: impl std::fmt::Debug) -> AudioError {
    AudioError::Mp3Encode(format!("{:?}", e))
}
