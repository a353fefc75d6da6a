pub mod client;
pub mod prompts;
pub mod verdict;

pub use client::{is_local_model, OpenAiVision, VisionModel, VisionSettings};
pub use prompts::productivity_prompt;
pub use verdict::{parse_verdict, Verdict};
