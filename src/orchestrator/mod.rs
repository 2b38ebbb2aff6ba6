//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量预处理器
//! - 管理应用生命周期（初始化、运行、统计）
//! - 惰性枚举记录（RecordingLocator）
//! - 控制并发数量（Semaphore）
//! - 取消时停止派发（CancellationToken）
//!
//! ### `batch_report` - 结果表
//! - 每个 key 一行：成功 / 跳过 / 失败原因
//! - 汇总有效记录的组平均特征
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<RecordingKey>)
//!     ↓
//! workflow::SubjectFlow (处理单条记录)
//!     ↓
//! services (能力层：locator / features / correction_store)
//!     ↓
//! infrastructure (基础设施：detector / report / publisher)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：batch_processor 管批量，SubjectFlow 管单个
//! 2. **命名空间隔离**：编排层只写派生数据，不写修正日志
//! 3. **向下依赖**：编排层 → workflow → services → infrastructure
//! 4. **无业务逻辑**：只做调度和统计

pub mod batch_processor;
pub mod batch_report;

// 重新导出主要类型
pub use batch_processor::{App, BatchOptions, BatchProcessor};
pub use batch_report::{BatchReport, KeyOutcome, Outcome};
