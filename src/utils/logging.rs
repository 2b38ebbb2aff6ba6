use anyhow::{Context, Result};
/// 日志工具模块
///
/// 提供运行日志文件和统计输出的辅助函数
use std::fs::{self, OpenOptions};
use std::io::Write;
use tracing::info;

use crate::models::SignalKind;
use crate::orchestrator::{BatchOptions, BatchReport};

/// 初始化运行日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n生理数据预处理日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)
        .with_context(|| format!("无法写入日志文件: {}", log_file_path))?;
    Ok(())
}

/// 追加结果表到运行日志文件
pub fn append_report(log_file_path: &str, report: &BatchReport) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)
        .with_context(|| format!("无法打开日志文件: {}", log_file_path))?;
    writeln!(
        file,
        "完成时间: {}\n{}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        report.to_table()
    )?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(options: &BatchOptions) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 多 worker 预处理模式");
    info!("📁 数据集: {}", options.root.display());
    info!(
        "🔎 session: {} | modality: {} | 模式: '{}'",
        options.session, options.modality, options.task_pattern
    );
    info!(
        "📊 worker 数: {} | 覆盖: {} | HTML 报告: {}",
        options.n_jobs, options.overwrite, options.html_reports
    );
    info!("{}", "=".repeat(60));
}

/// 打印最终统计信息
pub fn print_final_stats(report: &BatchReport, log_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", report.succeeded().len(), report.outcomes.len());
    info!("⏭️ 跳过: {}", report.skipped().len());
    info!("❌ 失败: {}", report.failed().len());
    if report.cancelled {
        info!("🛑 运行已被取消");
    }

    let aggregate = report.aggregate();
    for kind in SignalKind::ALL {
        let mean_rate = if kind.is_cardiac() {
            aggregate.get(kind, "mean_hr")
        } else {
            aggregate.get(kind, "respiration_rate")
        };
        if let Some(rate) = mean_rate {
            info!("📈 {} 组平均频率: {:.1} /min", kind, rate);
        }
    }
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
