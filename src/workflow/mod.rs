pub mod subject_ctx;
pub mod subject_flow;

pub use subject_ctx::SubjectCtx;
pub use subject_flow::{FlowOptions, ProcessResult, SubjectFlow};
