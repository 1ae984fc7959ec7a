pub mod cache;
pub mod health;
pub mod playback;
pub mod tts;
