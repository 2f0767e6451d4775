//! Speech recognition output.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One time-coded piece of recognized speech.
///
/// Offsets are seconds from the start of the media. Segments arrive in time
/// order from the speech model and are never re-sorted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CaptionSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl CaptionSegment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }
}

/// Full transcription of a source, plus auxiliary detection info.
///
/// `language` and `language_probability` are reported for logging only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Transcript {
    pub segments: Vec<CaptionSegment>,
    pub language: Option<String>,
    pub language_probability: Option<f32>,
}

impl Transcript {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}
