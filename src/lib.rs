//! # Systole Prep
//!
//! BIDS 生理数据（心电 / 光电容积 / 呼吸）批量预处理与人工修正工具
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构，外加一个与流程层并列的编辑层：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有外部能力，只暴露接口
//! - `EventDetector` - 峰值 / R 波检测能力
//! - `ReportRenderer` - HTML 报告渲染能力
//! - `StagingDir` / `write_atomic` - 原子发布
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单条记录
//! - `RecordingLocator` - 定位数据文件与 sidecar
//! - `CorrectionStore` - 修正日志的读写与叠加
//! - `features` - HRV / 呼吸特征
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一条记录"的完整处理流程
//! - `SubjectCtx` - 上下文封装（key + 序号）
//! - `SubjectFlow` - 流程编排（加载 → 检测 → 叠加修正 → 特征 → 报告 → 发布）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 批量预处理器，管理并发与取消
//! - `orchestrator/batch_report` - 每个 key 的结果表
//!
//! ### 编辑层（Editor）
//! - `editor/session` - 模式 × 选区状态机，只写修正命名空间
//!
//! ## 模块结构

pub mod config;
pub mod editor;
pub mod error;
pub mod infrastructure;
pub mod logger;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use editor::{EditMode, EditOutcome, EditorSession, Selection};
pub use error::{AppError, AppResult};
pub use models::{CorrectionLog, DatasetLayout, DerivativeBundle, RecordingKey, SignalKind};
pub use orchestrator::{App, BatchOptions, BatchProcessor, BatchReport, Outcome};
pub use services::{CorrectionStore, RecordingLocator};
pub use workflow::{ProcessResult, SubjectCtx, SubjectFlow};
