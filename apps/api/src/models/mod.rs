pub mod patch;
pub mod resume;

pub use patch::{PatchCompletion, PatchRow};
pub use resume::{ResumeExtraction, ResumeRow};
