//! 事件检测器 - 基础设施层
//!
//! 峰值/R 波检测属于外部能力，核心只依赖 `EventDetector` 接口

use crate::error::{AppError, AppResult};
use crate::models::SignalKind;

/// 外部检测能力：输入单通道信号，返回严格递增的事件采样索引
pub trait EventDetector: Send + Sync {
    fn detect(&self, series: &[f64], sfreq: f64, kind: SignalKind) -> AppResult<Vec<usize>>;
}

/// 默认检测器
///
/// 滑动窗口阈值（均值 + 标准差）+ 一阶差分由正转非正 + 不应期
#[derive(Debug, Clone)]
pub struct ThresholdPeakDetector {
    /// 阈值窗口长度（秒）
    pub window_secs: f64,
    /// 心脏信号不应期（秒）
    pub cardiac_distance_secs: f64,
    /// 呼吸信号不应期（秒）
    pub respiration_distance_secs: f64,
}

impl Default for ThresholdPeakDetector {
    fn default() -> Self {
        Self {
            window_secs: 1.0,
            cardiac_distance_secs: 0.2,
            respiration_distance_secs: 1.0,
        }
    }
}

impl ThresholdPeakDetector {
    fn min_distance(&self, sfreq: f64, kind: SignalKind) -> usize {
        let secs = if kind.is_cardiac() {
            self.cardiac_distance_secs
        } else {
            self.respiration_distance_secs
        };
        ((secs * sfreq).round() as usize).max(1)
    }
}

impl EventDetector for ThresholdPeakDetector {
    fn detect(&self, series: &[f64], sfreq: f64, kind: SignalKind) -> AppResult<Vec<usize>> {
        if !sfreq.is_finite() || sfreq <= 0.0 {
            return Err(AppError::detection(kind, format!("采样率不合法: {}", sfreq)));
        }
        if series.len() < 3 {
            return Err(AppError::detection(
                kind,
                format!("信号过短: {} 个采样点", series.len()),
            ));
        }
        if series.iter().all(|v| !v.is_finite()) {
            return Err(AppError::detection(kind, "信号全部为缺失值"));
        }

        let window = ((self.window_secs * sfreq).round() as usize).max(1);
        let thresholds = rolling_threshold(series, window);
        let distance = self.min_distance(sfreq, kind);

        let mut peaks: Vec<usize> = Vec::new();
        for i in 1..series.len() - 1 {
            let (prev, cur, next) = (series[i - 1], series[i], series[i + 1]);
            if !(prev.is_finite() && cur.is_finite() && next.is_finite()) {
                continue;
            }
            if cur <= thresholds[i] {
                continue;
            }
            // 差分由正转为非正
            if cur - prev > 0.0 && next - cur <= 0.0 {
                match peaks.last() {
                    Some(&last) if i - last < distance => {
                        // 不应期内保留幅值更大的那个
                        if cur > series[last] {
                            peaks.pop();
                            peaks.push(i);
                        }
                    }
                    _ => peaks.push(i),
                }
            }
        }
        Ok(peaks)
    }
}

/// 居中窗口的均值 + 标准差，忽略缺失值
fn rolling_threshold(series: &[f64], window: usize) -> Vec<f64> {
    let half = window / 2;
    let n = series.len();

    // 前缀和：值、平方、有效计数
    let mut sum = vec![0.0; n + 1];
    let mut sq = vec![0.0; n + 1];
    let mut cnt = vec![0usize; n + 1];
    for (i, &v) in series.iter().enumerate() {
        let (v, c) = if v.is_finite() { (v, 1) } else { (0.0, 0) };
        sum[i + 1] = sum[i] + v;
        sq[i + 1] = sq[i] + v * v;
        cnt[i + 1] = cnt[i] + c;
    }

    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half + 1).min(n);
            let c = (cnt[hi] - cnt[lo]) as f64;
            if c == 0.0 {
                return f64::INFINITY;
            }
            let mean = (sum[hi] - sum[lo]) / c;
            let var = ((sq[hi] - sq[lo]) / c - mean * mean).max(0.0);
            mean + var.sqrt()
        })
        .collect()
}
