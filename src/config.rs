use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};
use crate::models::Modality;
use crate::orchestrator::BatchOptions;

/// 程序配置
///
/// 优先级：命令行 > 环境变量 / 配置文件 > 默认值
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// BIDS 数据集根目录
    pub bids_folder: PathBuf,
    /// session 标识（不含 `ses-` 前缀）
    pub session: String,
    /// 任务名模式（文件名子串匹配）
    pub patterns: String,
    /// 数据类型目录
    pub modality: String,
    /// 并发 worker 数量
    pub n_jobs: usize,
    /// 是否覆盖已存在的派生数据
    pub overwrite: bool,
    /// 是否生成 HTML 报告
    pub html_reports: bool,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 运行日志文件
    pub output_log_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bids_folder: PathBuf::from("."),
            session: "session1".to_string(),
            patterns: "task".to_string(),
            modality: "beh".to_string(),
            n_jobs: 1,
            overwrite: false,
            html_reports: false,
            verbose_logging: false,
            output_log_file: "systole_prep.log".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            bids_folder: std::env::var("BIDS_FOLDER").map(PathBuf::from).unwrap_or(default.bids_folder),
            session: std::env::var("SESSION").unwrap_or(default.session),
            patterns: std::env::var("PATTERNS").unwrap_or(default.patterns),
            modality: std::env::var("MODALITY").unwrap_or(default.modality),
            n_jobs: std::env::var("N_JOBS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.n_jobs),
            overwrite: std::env::var("OVERWRITE").ok().and_then(|v| v.parse().ok()).unwrap_or(default.overwrite),
            html_reports: std::env::var("HTML_REPORTS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.html_reports),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
        }
    }

    /// 从 TOML 文件加载，缺省字段取默认值
    pub fn from_toml_file(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| AppError::io(path, e))?;
        toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("无法解析配置文件 {}: {}", path.display(), e)))
    }

    /// 检查配置是否可用
    pub fn validate(&self) -> AppResult<()> {
        if self.n_jobs == 0 {
            return Err(AppError::Config("n_jobs 必须大于 0".to_string()));
        }
        self.modality()?;
        if self.session.trim().is_empty() {
            return Err(AppError::Config("session 不能为空".to_string()));
        }
        Ok(())
    }

    pub fn modality(&self) -> AppResult<Modality> {
        Modality::from_dir_name(&self.modality)
            .ok_or_else(|| AppError::Config(format!("未知的 modality: {}", self.modality)))
    }

    /// 转换为 batch 参数
    pub fn batch_options(&self) -> AppResult<BatchOptions> {
        self.validate()?;
        Ok(BatchOptions {
            root: self.bids_folder.clone(),
            session: self.session.clone(),
            modality: self.modality()?,
            task_pattern: self.patterns.clone(),
            n_jobs: self.n_jobs,
            overwrite: self.overwrite,
            html_reports: self.html_reports,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.n_jobs = 0;
        assert!(matches!(config.validate(), Err(AppError::Config(_))));

        config.n_jobs = 2;
        config.modality = "anat".to_string();
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_from_toml_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "bids_folder = \"/data\"\nn_jobs = 4\nhtml_reports = true\n").unwrap();

        let config = Config::from_toml_file(&path).unwrap();
        assert_eq!(config.bids_folder, PathBuf::from("/data"));
        assert_eq!(config.n_jobs, 4);
        assert!(config.html_reports);
        assert_eq!(config.modality, "beh");

        let options = config.batch_options().unwrap();
        assert_eq!(options.modality, Modality::Beh);
        assert_eq!(options.task_pattern, "task");
    }

    #[test]
    fn test_from_toml_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "n_jobs = \"many\"").unwrap();
        assert!(matches!(
            Config::from_toml_file(&path),
            Err(AppError::Config(_))
        ));
    }
}
