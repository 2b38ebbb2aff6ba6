//! 修正日志存储 - 业务能力层
//!
//! 修正日志与自动派生数据分开存放在 `derivatives/systole/corrected/` 下，
//! 是人工验证结果的唯一来源。batch 流程只读取，从不写入。

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::infrastructure::write_atomic;
use crate::models::{CorrectionLog, CorrectionSet, DatasetLayout, DerivativeBundle, RecordingKey, SignalKind};

/// 修正日志存储
///
/// 一个 key 的所有信号类型共用一个文件，`save` 是读-改-写。
/// 串行化只在同一个实例内有效：同一数据集的多个编辑会话应借用同一个
/// `CorrectionStore`（`EditorSession::open` 接收 `&CorrectionStore`），
/// 不要各自创建实例，也不支持多个进程同时写同一个 key。
pub struct CorrectionStore {
    layout: DatasetLayout,
    /// 同一个 sidecar 里保存多个信号类型，写入需串行化，避免互相覆盖
    write_lock: Mutex<()>,
}

impl CorrectionStore {
    pub fn new(layout: DatasetLayout) -> Self {
        Self {
            layout,
            write_lock: Mutex::new(()),
        }
    }

    pub fn layout(&self) -> &DatasetLayout {
        &self.layout
    }

    pub fn path(&self, key: &RecordingKey) -> PathBuf {
        self.layout.correction_path(key)
    }

    /// 读取某个 key 的全部修正日志；从未编辑过时为空
    pub fn load_all(&self, key: &RecordingKey) -> AppResult<CorrectionSet> {
        let path = self.path(key);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(AppError::io(&path, e)),
        };
        let set: CorrectionSet =
            serde_json::from_str(&text).map_err(|e| AppError::json(&path, e))?;
        for log in set.values() {
            log.validate(None)?;
        }
        Ok(set)
    }

    /// 读取单个信号类型的修正日志
    pub fn load(&self, key: &RecordingKey, kind: SignalKind) -> AppResult<Option<CorrectionLog>> {
        Ok(self.load_all(key)?.remove(&kind))
    }

    /// 原子地整体替换该信号类型的修正日志，其他信号类型保持不变
    pub fn save(&self, key: &RecordingKey, kind: SignalKind, log: &CorrectionLog) -> AppResult<()> {
        log.validate(None)?;

        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| AppError::Correction("写锁已损坏".to_string()))?;

        let mut set = self.load_all(key)?;
        set.insert(kind, log.clone());

        let path = self.path(key);
        let mut raw = serde_json::to_vec_pretty(&set).map_err(|e| AppError::json(&path, e))?;
        raw.push(b'\n');
        write_atomic(&path, &raw)?;

        info!(
            "{} ✓ 修正日志已保存 ({}): {} 个事件, {} 个坏段",
            key,
            kind,
            log.corrected_peaks.len(),
            log.bad_segments.len()
        );
        Ok(())
    }
}

/// 将修正日志叠加到派生数据上
///
/// 纯函数：相同输入总是得到相同输出
pub fn apply_overlay(bundle: &DerivativeBundle, corrections: &CorrectionSet) -> DerivativeBundle {
    let mut out = bundle.clone();
    for (kind, track) in out.tracks.iter_mut() {
        if let Some(log) = corrections.get(kind) {
            debug!("{} 叠加 {} 修正日志", bundle.key, kind);
            track.events = log.overlay(&track.events);
            track.valid = log.valid;
        }
    }
    out
}
