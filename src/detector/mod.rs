pub mod buffer;
pub mod labeler;
pub mod pipeline;
pub mod queue;

pub use buffer::{ScoreWindow, SequenceBuffer};
pub use labeler::AlertLabel;
pub use pipeline::{DetectionEvent, PipelineError, ViolenceDetector};
