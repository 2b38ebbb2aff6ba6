//! 特征计算服务 - 业务能力层
//!
//! 由事件序列和采样率计算心率变异性 / 呼吸变异性指标

use std::collections::BTreeMap;

use crate::models::{FeatureTable, RecordingKey, SignalKind};

/// 事件间期（毫秒）
pub fn intervals_ms(events: &[usize], sfreq: f64) -> Vec<f64> {
    events
        .windows(2)
        .map(|w| (w[1] - w[0]) as f64 / sfreq * 1000.0)
        .collect()
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// 样本标准差（ddof = 1）
fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

fn successive_diffs(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

fn rmssd(values: &[f64]) -> Option<f64> {
    let diffs = successive_diffs(values);
    mean(&diffs.iter().map(|d| d * d).collect::<Vec<_>>()).map(f64::sqrt)
}

/// 计算单个信号的特征并追加到表中
pub fn compute_features(
    table: &mut FeatureTable,
    kind: SignalKind,
    events: &[usize],
    sfreq: f64,
    valid: bool,
) {
    let intervals = intervals_ms(events, sfreq);
    table.push(kind, "valid", Some(if valid { 1.0 } else { 0.0 }));
    table.push(kind, "n_events", Some(events.len() as f64));

    if kind.is_cardiac() {
        let hr: Vec<f64> = intervals.iter().map(|rr| 60_000.0 / rr).collect();
        let diffs = successive_diffs(&intervals);
        let pnn50 = if diffs.is_empty() {
            None
        } else {
            let over = diffs.iter().filter(|d| d.abs() > 50.0).count();
            Some(over as f64 * 100.0 / diffs.len() as f64)
        };

        table.push(kind, "mean_rr", mean(&intervals));
        table.push(kind, "median_rr", median(&intervals));
        table.push(kind, "sdnn", std_dev(&intervals));
        table.push(kind, "rmssd", rmssd(&intervals));
        table.push(kind, "pnn50", pnn50);
        table.push(kind, "mean_hr", mean(&hr));
        table.push(kind, "min_hr", hr.iter().copied().reduce(f64::min));
        table.push(kind, "max_hr", hr.iter().copied().reduce(f64::max));
    } else {
        let mean_bi = mean(&intervals);
        table.push(kind, "mean_bi", mean_bi);
        table.push(kind, "sd_bi", std_dev(&intervals));
        table.push(kind, "rmssd_bi", rmssd(&intervals));
        table.push(kind, "respiration_rate", mean_bi.map(|bi| 60_000.0 / bi));
    }
}

/// 多条记录的组平均
///
/// valid 为 0 的信号不参与汇总，不论其事件内容如何
pub fn aggregate_features<'a>(
    entries: impl IntoIterator<Item = (&'a RecordingKey, &'a FeatureTable)>,
) -> FeatureTable {
    let mut acc: BTreeMap<(SignalKind, String), (f64, usize)> = BTreeMap::new();
    let mut order: Vec<(SignalKind, String)> = Vec::new();

    for (_key, table) in entries {
        for row in &table.rows {
            if row.metric == "valid" || table.get(row.signal, "valid") == Some(0.0) {
                continue;
            }
            let Some(value) = row.value else { continue };
            let slot = (row.signal, row.metric.clone());
            let entry = acc.entry(slot.clone()).or_insert_with(|| {
                order.push(slot);
                (0.0, 0)
            });
            entry.0 += value;
            entry.1 += 1;
        }
    }

    let mut out = FeatureTable::default();
    for slot in order {
        if let Some((sum, n)) = acc.get(&slot) {
            out.push(slot.0, &slot.1, Some(sum / *n as f64));
        }
    }
    out
}
