//! 编辑层（Editor）
//!
//! 与 workflow 并列：读取已发布的 DerivativeBundle 和已有修正日志，
//! 只通过 `CorrectionStore` 写回修正结果。

pub mod session;

pub use session::{EditMode, EditOutcome, EditorSession, Selection};
