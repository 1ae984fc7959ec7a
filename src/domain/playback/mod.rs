pub mod model;
pub mod service;

pub use model::{PlaybackPosition, PositionRecord};
pub use service::PlaybackPositionStore;
