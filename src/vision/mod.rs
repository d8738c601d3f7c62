//! Vision service clients.
//!
//! Two capabilities over the same OpenAI-compatible vision chat API:
//! annotation (image → labels/entities/OCR text, done once at upload) and
//! relevance scoring (image + query → score in [0,1], used by the
//! vision-semantic ranking stage).

pub mod annotate;
pub mod score;

pub use annotate::{Annotator, HttpAnnotator};
pub use score::{HttpVisionScorer, VisionScorer};
