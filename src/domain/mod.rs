pub mod audio;
pub mod backend;
pub mod playback;
pub mod text;
pub mod tts;
