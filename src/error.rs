use std::path::{Path, PathBuf};

use thiserror::Error;

/// 应用程序错误类型
///
/// 单个记录（RecordingKey）级别的错误在 Subject Preprocessor 边界被捕获，
/// 写入 BatchReport；Correction Store 的错误则直接返回给调用方。
#[derive(Debug, Error)]
pub enum AppError {
    /// 数据文件与 sidecar 配对缺失，或目录不存在
    #[error("文件不存在: {path}")]
    NotFound { path: PathBuf },

    /// 同一个 (subject, session, modality, pattern) 匹配到多个文件
    #[error("模式 '{pattern}' 匹配到多个文件: {}", display_paths(.candidates))]
    AmbiguousPattern {
        pattern: String,
        candidates: Vec<PathBuf>,
    },

    /// 元数据字段缺失或不合法
    #[error("元数据错误 ({path}): {reason}")]
    Metadata { path: PathBuf, reason: String },

    /// 外部检测能力失败
    #[error("事件检测失败 ({signal}): {reason}")]
    Detection { signal: String, reason: String },

    /// 文件系统读写失败
    #[error("IO错误 ({path}): {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 修正日志违反不变量
    #[error("修正日志不合法: {0}")]
    Correction(String),

    /// 编辑器在当前状态下不允许该操作
    #[error("编辑器错误: {0}")]
    Editor(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// JSON 序列化/解析失败
    #[error("JSON解析失败 ({path}): {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建文件不存在错误
    pub fn not_found(path: impl AsRef<Path>) -> Self {
        AppError::NotFound {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// 创建 IO 错误
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        AppError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// 创建元数据错误
    pub fn metadata(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        AppError::Metadata {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    /// 创建检测错误
    pub fn detection(signal: impl ToString, reason: impl Into<String>) -> Self {
        AppError::Detection {
            signal: signal.to_string(),
            reason: reason.into(),
        }
    }

    /// 创建 JSON 错误
    pub fn json(path: impl AsRef<Path>, source: serde_json::Error) -> Self {
        AppError::Json {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// 错误类别的简短名称（用于结果表）
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound { .. } => "NotFound",
            AppError::AmbiguousPattern { .. } => "AmbiguousPattern",
            AppError::Metadata { .. } => "Metadata",
            AppError::Detection { .. } => "Detection",
            AppError::Io { .. } => "IO",
            AppError::Correction(_) => "Correction",
            AppError::Editor(_) => "Editor",
            AppError::Config(_) => "Config",
            AppError::Json { .. } => "Json",
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
