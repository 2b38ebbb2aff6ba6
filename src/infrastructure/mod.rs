//! 基础设施层（Infrastructure）
//!
//! 持有外部能力，只暴露接口，不认识 batch / 编辑会话

pub mod detector;
pub mod publisher;
pub mod report;

pub use detector::{EventDetector, ThresholdPeakDetector};
pub use publisher::{write_atomic, StagingDir};
pub use report::{HtmlReportRenderer, ReportInput, ReportRenderer};
