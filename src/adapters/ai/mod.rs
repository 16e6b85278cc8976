//! Extraction backend adapters.

mod gemini_extractor;
mod mock;

pub use gemini_extractor::{GeminiConfig, GeminiExtractor};
pub use mock::{MockExtractor, RecordedExtraction};
