use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use systole_prep::{logger, App, Config};

/// BIDS 生理数据批量预处理
#[derive(Parser, Debug)]
#[command(name = "systole-prep", version, about)]
struct Args {
    /// BIDS 数据集根目录
    #[arg(long = "bids_folder")]
    bids_folder: Option<PathBuf>,

    /// session 标识（不含 `ses-` 前缀）
    #[arg(long)]
    session: Option<String>,

    /// 任务名模式（文件名子串匹配）
    #[arg(long)]
    patterns: Option<String>,

    /// 数据类型目录（beh / func / ...）
    #[arg(long)]
    modality: Option<String>,

    /// 并发 worker 数量
    #[arg(long = "n_jobs")]
    n_jobs: Option<usize>,

    /// 覆盖已存在的派生数据（修正日志始终保留）
    #[arg(long)]
    overwrite: bool,

    /// 生成 HTML 报告
    #[arg(long = "html_reports")]
    html_reports: bool,

    /// TOML 配置文件；不指定时读取环境变量
    #[arg(long)]
    config: Option<PathBuf>,

    /// 显示详细日志
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn into_config(self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_toml_file(path)
                .with_context(|| format!("无法加载配置文件: {}", path.display()))?,
            None => Config::from_env(),
        };

        if let Some(v) = self.bids_folder {
            config.bids_folder = v;
        }
        if let Some(v) = self.session {
            config.session = v;
        }
        if let Some(v) = self.patterns {
            config.patterns = v;
        }
        if let Some(v) = self.modality {
            config.modality = v;
        }
        if let Some(v) = self.n_jobs {
            config.n_jobs = v;
        }
        config.overwrite |= self.overwrite;
        config.html_reports |= self.html_reports;
        config.verbose_logging |= self.verbose;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Args::parse().into_config()?;

    // 初始化日志
    logger::init(config.verbose_logging);

    // Ctrl-C 只停止派发，已派发的记录继续完成
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("🛑 收到 Ctrl-C，等待正在处理的记录完成...");
            on_signal.cancel();
        }
    });

    // 初始化并运行应用
    let app = App::initialize(config).context("初始化失败")?;
    let report = app.run(cancel).await?;

    if report.has_failures() {
        std::process::exit(1);
    }
    Ok(())
}
