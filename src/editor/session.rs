//! 交互式修正会话
//!
//! 编辑状态 = 模式 × 选区，所有操作都是这两个状态上的全函数：
//! 模式不对或没有选区时返回 `AppError::Editor`，不会静默忽略。
//!
//! 会话只修改内存中的修正日志，`save()` 是唯一的外部副作用。

use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::models::{CorrectionLog, DerivativeBundle, RecordingKey, SampleRange, SignalKind};
use crate::services::CorrectionStore;

/// 编辑模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditMode {
    /// 插入 / 删除事件
    Correction,
    /// 标记 / 取消坏段
    Rejection,
}

/// 当前选区
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Idle,
    SelectingRange(SampleRange),
}

/// 单次编辑的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    /// 删除了这些事件（可能为空）
    Deleted(Vec<usize>),
    Inserted(usize),
    /// 事件已存在，未做修改
    AlreadyPresent(usize),
    /// 候选位置落在坏段内，未插入
    RejectedBadSegment(usize),
    Labeled(SampleRange),
    Unlabeled(SampleRange),
    ValidityChanged(bool),
}

/// 单个 (RecordingKey, SignalKind) 的编辑会话
pub struct EditorSession<'a> {
    store: &'a CorrectionStore,
    key: RecordingKey,
    kind: SignalKind,
    samples: Vec<f64>,
    automated: Vec<usize>,
    log: CorrectionLog,
    history: Vec<CorrectionLog>,
    mode: EditMode,
    selection: Selection,
    dirty: bool,
}

impl<'a> EditorSession<'a> {
    /// 打开会话；没有修正日志时以自动检测结果为起点
    pub fn open(
        store: &'a CorrectionStore,
        bundle: &DerivativeBundle,
        kind: SignalKind,
    ) -> AppResult<Self> {
        let track = bundle.tracks.get(&kind).ok_or_else(|| {
            AppError::Editor(format!("{} 中没有 {} 信号", bundle.key, kind))
        })?;

        let log = match store.load(&bundle.key, kind)? {
            Some(log) => {
                log.validate(Some(track.samples.len()))?;
                debug!("{} 载入已有修正日志 ({})", bundle.key, kind);
                log
            }
            None => CorrectionLog::seeded(&track.events),
        };

        Ok(Self {
            store,
            key: bundle.key.clone(),
            kind,
            samples: track.samples.clone(),
            automated: track.events.clone(),
            log,
            history: Vec::new(),
            mode: EditMode::Correction,
            selection: Selection::Idle,
            dirty: false,
        })
    }

    pub fn key(&self) -> &RecordingKey {
        &self.key
    }

    pub fn kind(&self) -> SignalKind {
        self.kind
    }

    pub fn mode(&self) -> EditMode {
        self.mode
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn log(&self) -> &CorrectionLog {
        &self.log
    }

    /// 有未保存的修改
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_mode(&mut self, mode: EditMode) {
        self.mode = mode;
    }

    /// 选择半开区间 `[start, end)`，超出信号的部分被截掉
    pub fn select(&mut self, start: usize, end: usize) -> AppResult<SampleRange> {
        let end = end.min(self.samples.len());
        if start >= end {
            return Err(AppError::Editor(format!(
                "选区 [{}, {}) 为空或超出信号长度 {}",
                start,
                end,
                self.samples.len()
            )));
        }
        let range = SampleRange::new(start, end);
        self.selection = Selection::SelectingRange(range);
        Ok(range)
    }

    pub fn clear_selection(&mut self) {
        self.selection = Selection::Idle;
    }

    /// 删除选区内的全部有效事件
    pub fn delete_events(&mut self) -> AppResult<EditOutcome> {
        let range = self.take_selection(EditMode::Correction)?;
        let before = self.log.clone();
        let removed = self.log.delete_peaks_in(range, &self.automated);
        if self.log != before {
            self.commit(before);
        }
        debug!("{} 删除 {} 个事件 {:?}", self.key, removed.len(), range);
        Ok(EditOutcome::Deleted(removed))
    }

    /// 在选区内振幅最大的采样点插入事件（并列时取第一个）
    pub fn insert_event(&mut self) -> AppResult<EditOutcome> {
        let range = self.take_selection(EditMode::Correction)?;
        let idx = self.argmax(range).ok_or_else(|| {
            AppError::Editor(format!("选区 [{}, {}) 内没有有效采样点", range.start, range.end))
        })?;

        if self.log.in_bad_segment(idx) {
            return Ok(EditOutcome::RejectedBadSegment(idx));
        }
        if self.effective_events().binary_search(&idx).is_ok() {
            return Ok(EditOutcome::AlreadyPresent(idx));
        }

        let before = self.log.clone();
        self.log.insert_peak(idx);
        self.commit(before);
        debug!("{} 插入事件 {}", self.key, idx);
        Ok(EditOutcome::Inserted(idx))
    }

    pub fn label_segment(&mut self) -> AppResult<EditOutcome> {
        let range = self.take_selection(EditMode::Rejection)?;
        let before = self.log.clone();
        self.log.label_segment(range);
        self.commit(before);
        Ok(EditOutcome::Labeled(range))
    }

    pub fn unlabel_segment(&mut self) -> AppResult<EditOutcome> {
        let range = self.take_selection(EditMode::Rejection)?;
        let before = self.log.clone();
        self.log.unlabel_segment(range);
        if self.log != before {
            self.commit(before);
        }
        Ok(EditOutcome::Unlabeled(range))
    }

    /// 切换整条信号的可用标记，任意模式下都可用
    pub fn toggle_validity(&mut self) -> EditOutcome {
        let before = self.log.clone();
        self.log.valid = !self.log.valid;
        self.commit(before);
        EditOutcome::ValidityChanged(self.log.valid)
    }

    /// 撤销上一次修改；没有可撤销的修改时返回 false
    pub fn undo(&mut self) -> bool {
        match self.history.pop() {
            Some(previous) => {
                self.log = previous;
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    /// 预览叠加修正后的事件
    pub fn effective_events(&self) -> Vec<usize> {
        self.log.overlay(&self.automated)
    }

    /// 写入修正日志存储
    pub fn save(&mut self) -> AppResult<()> {
        self.log.validate(Some(self.samples.len()))?;
        self.store.save(&self.key, self.kind, &self.log)?;
        self.dirty = false;
        info!("{} 💾 {} 修正已保存", self.key, self.kind);
        Ok(())
    }

    fn take_selection(&mut self, required: EditMode) -> AppResult<SampleRange> {
        if self.mode != required {
            return Err(AppError::Editor(format!(
                "当前模式为 {:?}，该操作需要 {:?} 模式",
                self.mode, required
            )));
        }
        match self.selection {
            Selection::SelectingRange(range) => {
                self.selection = Selection::Idle;
                Ok(range)
            }
            Selection::Idle => Err(AppError::Editor("没有选中的区间".to_string())),
        }
    }

    /// 缺失值（NaN）不参与比较；全部缺失时为 None
    fn argmax(&self, range: SampleRange) -> Option<usize> {
        let mut best: Option<usize> = None;
        for idx in range.start..range.end {
            let v = self.samples[idx];
            if !v.is_finite() {
                continue;
            }
            match best {
                Some(b) if v <= self.samples[b] => {}
                _ => best = Some(idx),
            }
        }
        best
    }

    fn commit(&mut self, before: CorrectionLog) {
        self.history.push(before);
        self.dirty = true;
    }
}
