//! 批量预处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责批量记录的调度和统计。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：校验配置、初始化运行日志
//! 2. **惰性枚举**：通过 RecordingLocator 逐个 subject 定位记录
//! 3. **并发控制**：使用 Semaphore 限制同时运行的 worker 数量
//! 4. **覆盖策略**：委托 SubjectFlow 判断跳过 / 重建
//! 5. **失败隔离**：单个记录失败只记入结果表，不影响其他记录
//! 6. **优雅取消**：停止派发新记录，等待已派发的记录完成
//!
//! ## 设计特点
//!
//! - 每个 worker 返回自己的结果值，由调度方收集，没有共享的可变汇总
//! - 只写派生命名空间，从不触碰修正日志

use anyhow::Result;
use futures::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::infrastructure::{EventDetector, HtmlReportRenderer, ReportRenderer, ThresholdPeakDetector};
use crate::models::{DatasetLayout, Modality};
use crate::orchestrator::batch_report::{BatchReport, KeyOutcome, Outcome};
use crate::services::RecordingLocator;
use crate::utils::logging::{
    append_report, init_log_file, log_startup, print_final_stats, truncate_text,
};
use crate::workflow::{FlowOptions, ProcessResult, SubjectCtx, SubjectFlow};

/// batch 参数
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub root: PathBuf,
    pub session: String,
    pub modality: Modality,
    pub task_pattern: String,
    pub n_jobs: usize,
    pub overwrite: bool,
    pub html_reports: bool,
}

/// 批量预处理器
pub struct BatchProcessor {
    options: BatchOptions,
    flow: Arc<SubjectFlow>,
}

impl BatchProcessor {
    /// 使用默认的检测器和报告渲染器
    pub fn new(options: BatchOptions) -> Self {
        Self::with_capabilities(
            options,
            Arc::new(ThresholdPeakDetector::default()),
            Arc::new(HtmlReportRenderer),
        )
    }

    /// 注入外部检测 / 渲染能力
    pub fn with_capabilities(
        options: BatchOptions,
        detector: Arc<dyn EventDetector>,
        renderer: Arc<dyn ReportRenderer>,
    ) -> Self {
        let flow = SubjectFlow::new(
            DatasetLayout::new(&options.root),
            detector,
            renderer,
            FlowOptions {
                overwrite: options.overwrite,
                html_reports: options.html_reports,
            },
        );
        Self {
            options,
            flow: Arc::new(flow),
        }
    }

    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    /// 运行 batch
    ///
    /// 只有根目录不可用等全局错误会返回 Err，单个记录的错误都记入结果表
    pub async fn run(&self, cancel: CancellationToken) -> AppResult<BatchReport> {
        if self.options.n_jobs == 0 {
            return Err(AppError::Config("n_jobs 必须大于 0".to_string()));
        }

        let locator = RecordingLocator::new(
            &self.options.root,
            self.options.session.clone(),
            self.options.modality,
            self.options.task_pattern.clone(),
        );
        let semaphore = Arc::new(Semaphore::new(self.options.n_jobs));

        let mut outcomes: Vec<KeyOutcome> = Vec::new();
        let mut handles = Vec::new();
        let mut cancelled = false;

        info!("\n📁 正在扫描待处理的记录...");

        for (idx, located) in locator.locate()?.enumerate() {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let located = match located {
                Ok(located) => located,
                Err(failure) => {
                    error!(
                        "{} ❌ 定位失败: {}",
                        failure.key,
                        truncate_text(&failure.error.to_string(), 300)
                    );
                    outcomes.push(KeyOutcome::failed(failure.key, &failure.error));
                    continue;
                }
            };

            // 等待空闲 worker，期间收到取消则停止派发（取消优先）
            // locator 每个 subject 至多产出一项，同一 key 不会派发两次
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let ctx = SubjectCtx::new(located.key.clone(), idx + 1);
            let flow = self.flow.clone();
            let key = located.key.clone();
            let handle = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                flow.run(&located, &ctx)
            });
            handles.push((key, handle));
        }

        if cancelled {
            warn!("🛑 收到取消请求，停止派发，等待 {} 个已派发的记录完成", handles.len());
        }

        // 等待所有已派发的 worker
        let finished = join_all(
            handles
                .into_iter()
                .map(|(key, handle)| async move { (key, handle.await) }),
        )
        .await;

        for (key, joined) in finished {
            let outcome = match joined {
                Ok(Ok(ProcessResult::Success { files, features })) => KeyOutcome {
                    key,
                    outcome: Outcome::Success {
                        files: files.len(),
                        features,
                    },
                },
                Ok(Ok(ProcessResult::Skipped)) => KeyOutcome {
                    key,
                    outcome: Outcome::Skipped,
                },
                Ok(Err(e)) => {
                    error!("{} ❌ 处理过程中发生错误: {}", key, e);
                    KeyOutcome::failed(key, &e)
                }
                Err(e) => {
                    error!("{} ❌ worker 执行失败: {}", key, e);
                    KeyOutcome {
                        key,
                        outcome: Outcome::Failed {
                            kind: "Worker".to_string(),
                            reason: e.to_string(),
                        },
                    }
                }
            };
            outcomes.push(outcome);
        }

        Ok(BatchReport::new(outcomes, cancelled))
    }
}

/// 应用主结构
pub struct App {
    config: Config,
    processor: BatchProcessor,
}

impl App {
    /// 初始化应用
    pub fn initialize(config: Config) -> Result<Self> {
        let options = config.batch_options()?;

        // 初始化日志文件
        init_log_file(&config.output_log_file)?;

        log_startup(&options);

        Ok(Self {
            processor: BatchProcessor::new(options),
            config,
        })
    }

    /// 运行应用主逻辑
    pub async fn run(&self, cancel: CancellationToken) -> Result<BatchReport> {
        let report = self.processor.run(cancel).await?;

        if report.outcomes.is_empty() {
            warn!("⚠️ 没有找到匹配的记录，程序结束");
        }

        // 输出最终统计
        print_final_stats(&report, &self.config.output_log_file);
        append_report(&self.config.output_log_file, &report)?;

        Ok(report)
    }
}
