// Audio module - real-time side of the pipeline
//
// Hardware blocks come in through an `AudioBackend`, are cut into analysis
// windows by the `FrameAccumulator` and analyzed inside the same callback by
// the `CapturePipeline`.

pub mod accumulator;
pub mod pipeline;

pub use accumulator::{FrameAccumulator, PushSummary};
pub use pipeline::CapturePipeline;
