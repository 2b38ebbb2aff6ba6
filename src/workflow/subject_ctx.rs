//! 记录处理上下文
//!
//! 封装"我正在处理第几条记录、它是谁"这一信息

use std::fmt::Display;

use crate::models::RecordingKey;

/// 记录处理上下文
#[derive(Debug, Clone)]
pub struct SubjectCtx {
    pub key: RecordingKey,

    /// 派发顺序（从1开始，仅用于日志显示）
    pub index: usize,
}

impl SubjectCtx {
    pub fn new(key: RecordingKey, index: usize) -> Self {
        Self { key, index }
    }
}

impl Display for SubjectCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[#{} {}]", self.index, self.key.stem())
    }
}
