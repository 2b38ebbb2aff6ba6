//! 人工修正日志
//!
//! 与自动派生数据分开存放，只由编辑会话修改

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::key::SignalKind;
use crate::error::{AppError, AppResult};

/// 半开采样区间 `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BadSegment {
    pub start: usize,
    pub end: usize,
}

/// 编辑器中选中的采样区间，同样是半开区间
pub type SampleRange = BadSegment;

impl BadSegment {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, idx: usize) -> bool {
        self.start <= idx && idx < self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// 相交或首尾相接
    fn touches(&self, other: &BadSegment) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// 单个 (RecordingKey, SignalKind) 的修正记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionLog {
    #[serde(default = "default_valid")]
    pub valid: bool,

    #[serde(default)]
    pub corrected_peaks: Vec<usize>,

    #[serde(default)]
    pub bad_segments: Vec<BadSegment>,

    /// 被人工删除的自动事件
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deleted_peaks: Vec<usize>,
}

fn default_valid() -> bool {
    true
}

impl Default for CorrectionLog {
    fn default() -> Self {
        Self {
            valid: true,
            corrected_peaks: Vec::new(),
            bad_segments: Vec::new(),
            deleted_peaks: Vec::new(),
        }
    }
}

/// 一个 sidecar 中所有信号类型的修正记录
pub type CorrectionSet = BTreeMap<SignalKind, CorrectionLog>;

impl CorrectionLog {
    /// 以自动检测结果为起点创建
    pub fn seeded(automated: &[usize]) -> Self {
        let peaks: BTreeSet<usize> = automated.iter().copied().collect();
        Self {
            corrected_peaks: peaks.into_iter().collect(),
            ..Self::default()
        }
    }

    /// 检查不变量；`series_len` 未知时只检查顺序与区间形状
    pub fn validate(&self, series_len: Option<usize>) -> AppResult<()> {
        check_strictly_increasing("corrected_peaks", &self.corrected_peaks, series_len)?;
        check_strictly_increasing("deleted_peaks", &self.deleted_peaks, series_len)?;

        let mut prev_end: Option<usize> = None;
        for seg in &self.bad_segments {
            if seg.start >= seg.end {
                return Err(AppError::Correction(format!(
                    "bad_segment [{}, {}) 必须满足 start < end",
                    seg.start, seg.end
                )));
            }
            if let Some(len) = series_len {
                if seg.end > len {
                    return Err(AppError::Correction(format!(
                        "bad_segment [{}, {}) 超出信号长度 {}",
                        seg.start, seg.end, len
                    )));
                }
            }
            if let Some(end) = prev_end {
                if seg.start < end {
                    return Err(AppError::Correction(format!(
                        "bad_segment [{}, {}) 与前一个区间重叠或未排序",
                        seg.start, seg.end
                    )));
                }
            }
            prev_end = Some(seg.end);
        }
        Ok(())
    }

    /// 索引是否落在某个坏段内
    pub fn in_bad_segment(&self, idx: usize) -> bool {
        self.bad_segments.iter().any(|seg| seg.contains(idx))
    }

    /// 标记坏段，与重叠或相接的区间合并为一个
    pub fn label_segment(&mut self, range: SampleRange) {
        if range.is_empty() {
            return;
        }
        let mut merged = range;
        let mut kept = Vec::with_capacity(self.bad_segments.len() + 1);
        for seg in self.bad_segments.drain(..) {
            if seg.touches(&merged) {
                merged.start = merged.start.min(seg.start);
                merged.end = merged.end.max(seg.end);
            } else {
                kept.push(seg);
            }
        }
        kept.push(merged);
        kept.sort();
        self.bad_segments = kept;
    }

    /// 取消坏段标记，覆盖区间可能被拆成零、一或两段
    pub fn unlabel_segment(&mut self, range: SampleRange) {
        if range.is_empty() {
            return;
        }
        let mut kept = Vec::with_capacity(self.bad_segments.len() + 1);
        for seg in self.bad_segments.drain(..) {
            if seg.end <= range.start || seg.start >= range.end {
                kept.push(seg);
                continue;
            }
            if seg.start < range.start {
                kept.push(BadSegment::new(seg.start, range.start));
            }
            if seg.end > range.end {
                kept.push(BadSegment::new(range.end, seg.end));
            }
        }
        self.bad_segments = kept;
    }

    /// 插入事件，保持严格递增；已存在时返回 false
    pub fn insert_peak(&mut self, idx: usize) -> bool {
        if let Ok(pos) = self.deleted_peaks.binary_search(&idx) {
            self.deleted_peaks.remove(pos);
        }
        match self.corrected_peaks.binary_search(&idx) {
            Ok(_) => false,
            Err(pos) => {
                self.corrected_peaks.insert(pos, idx);
                true
            }
        }
    }

    /// 删除区间内的全部事件，记录到删除标记中，返回被删除的索引
    pub fn delete_peaks_in(&mut self, range: SampleRange, automated: &[usize]) -> Vec<usize> {
        let mut removed: BTreeSet<usize> = BTreeSet::new();
        self.corrected_peaks.retain(|&p| {
            if range.contains(p) {
                removed.insert(p);
                false
            } else {
                true
            }
        });
        removed.extend(automated.iter().copied().filter(|&p| range.contains(p)));

        let mut deleted: BTreeSet<usize> = self.deleted_peaks.iter().copied().collect();
        deleted.extend(removed.iter().copied());
        self.deleted_peaks = deleted.into_iter().collect();

        removed.into_iter().collect()
    }

    /// 叠加到自动事件上得到有效事件
    ///
    /// `(automated ∪ corrected_peaks) − deleted_peaks − 坏段内事件`
    pub fn overlay(&self, automated: &[usize]) -> Vec<usize> {
        let deleted: BTreeSet<usize> = self.deleted_peaks.iter().copied().collect();
        automated
            .iter()
            .chain(self.corrected_peaks.iter())
            .copied()
            .filter(|p| !deleted.contains(p) && !self.in_bad_segment(*p))
            .collect::<BTreeSet<usize>>()
            .into_iter()
            .collect()
    }
}

fn check_strictly_increasing(name: &str, values: &[usize], len: Option<usize>) -> AppResult<()> {
    for pair in values.windows(2) {
        if pair[0] >= pair[1] {
            return Err(AppError::Correction(format!(
                "{} 必须严格递增: {} 之后出现 {}",
                name, pair[0], pair[1]
            )));
        }
    }
    if let (Some(len), Some(&last)) = (len, values.last()) {
        if last >= len {
            return Err(AppError::Correction(format!(
                "{} 中的索引 {} 超出信号长度 {}",
                name, last, len
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_label_merges_overlapping() {
        let mut log = CorrectionLog::default();
        log.label_segment(SampleRange::new(10, 20));
        log.label_segment(SampleRange::new(15, 30));
        assert_eq!(log.bad_segments, vec![BadSegment::new(10, 30)]);

        log.label_segment(SampleRange::new(50, 60));
        log.label_segment(SampleRange::new(5, 55));
        assert_eq!(log.bad_segments, vec![BadSegment::new(5, 60)]);
        log.validate(Some(100)).unwrap();
    }

    #[test]
    fn test_unlabel_splits() {
        let mut log = CorrectionLog::default();
        log.label_segment(SampleRange::new(10, 50));

        log.unlabel_segment(SampleRange::new(20, 30));
        assert_eq!(
            log.bad_segments,
            vec![BadSegment::new(10, 20), BadSegment::new(30, 50)]
        );

        log.unlabel_segment(SampleRange::new(0, 25));
        assert_eq!(log.bad_segments, vec![BadSegment::new(30, 50)]);

        log.unlabel_segment(SampleRange::new(30, 50));
        assert!(log.bad_segments.is_empty());
    }

    #[test]
    fn test_overlay_union_minus_deleted_and_bad() {
        let log = CorrectionLog {
            valid: true,
            corrected_peaks: vec![15, 40],
            bad_segments: vec![BadSegment::new(35, 45)],
            deleted_peaks: vec![20],
        };
        let effective = log.overlay(&[10, 20, 30, 40]);
        assert_eq!(effective, vec![10, 15, 30]);
    }

    #[test]
    fn test_delete_then_insert_restores() {
        let automated = vec![10, 20, 30];
        let mut log = CorrectionLog::seeded(&automated);
        let removed = log.delete_peaks_in(SampleRange::new(15, 35), &automated);
        assert_eq!(removed, vec![20, 30]);
        assert_eq!(log.overlay(&automated), vec![10]);

        assert!(log.insert_peak(20));
        assert_eq!(log.overlay(&automated), vec![10, 20]);
        assert!(!log.insert_peak(20));
        log.validate(Some(40)).unwrap();
    }

    #[test]
    fn test_validate_rejects_unsorted_and_out_of_bounds() {
        let log = CorrectionLog {
            corrected_peaks: vec![5, 5],
            ..CorrectionLog::default()
        };
        assert!(log.validate(None).is_err());

        let log = CorrectionLog {
            corrected_peaks: vec![5, 100],
            ..CorrectionLog::default()
        };
        assert!(log.validate(Some(100)).is_err());

        let log = CorrectionLog {
            bad_segments: vec![BadSegment::new(10, 20), BadSegment::new(15, 25)],
            ..CorrectionLog::default()
        };
        assert!(log.validate(None).is_err());
    }

    #[test]
    fn test_json_schema() {
        let log: CorrectionLog = serde_json::from_value(json!({
            "valid": false,
            "corrected_peaks": [1, 2],
            "bad_segments": [{"start": 3, "end": 9}]
        }))
        .unwrap();
        assert!(!log.valid);
        assert!(log.deleted_peaks.is_empty());

        let back = serde_json::to_value(&log).unwrap();
        assert!(back.get("deleted_peaks").is_none());
        assert_eq!(back["bad_segments"][0]["end"], 9);

        let defaulted: CorrectionLog = serde_json::from_value(json!({})).unwrap();
        assert!(defaulted.valid);
    }
}
