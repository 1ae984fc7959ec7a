pub mod assembler;
pub mod format;
pub mod mp3;
pub mod pcm;

pub use assembler::{AssembledAudio, AudioAssembler, DEFAULT_SILENCE_GAP};
pub use format::AudioFormat;
pub use pcm::{decode, AudioError, PcmAudio};
