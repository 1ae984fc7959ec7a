pub mod chunker;
pub mod cleaner;

pub use chunker::{chunk_text, TextChunk, TextChunker};
pub use cleaner::{clean_text, html_to_speech_text};
