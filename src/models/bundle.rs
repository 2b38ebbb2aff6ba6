use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;
use std::fmt::Write as _;

use super::key::{RecordingKey, SignalKind};
use super::recording::PhysioMetadata;

/// 单个信号通道及其事件
#[derive(Debug, Clone, PartialEq)]
pub struct SignalTrack {
    pub samples: Vec<f64>,
    /// 自动检测（或叠加修正后）的事件索引，严格递增
    pub events: Vec<usize>,
    /// 对应修正日志的 valid 标记；false 时不参与汇总
    pub valid: bool,
}

/// 特征表中的一行
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub signal: SignalKind,
    pub metric: String,
    pub value: Option<f64>,
}

/// 特征表（长格式：signal / metric / value）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    pub rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub fn push(&mut self, signal: SignalKind, metric: &str, value: Option<f64>) {
        self.rows.push(FeatureRow {
            signal,
            metric: metric.to_string(),
            value: value.filter(|v| v.is_finite()),
        });
    }

    pub fn get(&self, signal: SignalKind, metric: &str) -> Option<f64> {
        self.rows
            .iter()
            .find(|r| r.signal == signal && r.metric == metric)
            .and_then(|r| r.value)
    }

    /// 序列化为 TSV，未定义的值写为 `n/a`
    pub fn to_tsv(&self) -> String {
        let mut out = String::from("signal\tmetric\tvalue\n");
        for row in &self.rows {
            let value = match row.value {
                Some(v) => format!("{}", v),
                None => "n/a".to_string(),
            };
            let _ = writeln!(out, "{}\t{}\t{}", row.signal, row.metric, value);
        }
        out
    }

    /// 从 TSV 解析；无法识别的行被忽略
    pub fn from_tsv(text: &str) -> Self {
        let mut table = FeatureTable::default();
        for line in text.lines().skip(1) {
            let mut parts = line.split('\t');
            let (Some(signal), Some(metric), Some(value)) = (parts.next(), parts.next(), parts.next())
            else {
                continue;
            };
            let Some(signal) = SignalKind::from_column(signal) else {
                continue;
            };
            table.push(signal, metric, value.parse::<f64>().ok());
        }
        table
    }
}

/// 一个 RecordingKey 的派生数据
#[derive(Debug, Clone)]
pub struct DerivativeBundle {
    pub key: RecordingKey,
    pub sfreq: f64,
    /// 输入 sidecar（派生 sidecar 在此基础上补充字段）
    pub metadata: PhysioMetadata,
    /// 原始的全部列（含非生理列，如触发通道）
    pub columns: Vec<(String, Vec<f64>)>,
    pub tracks: BTreeMap<SignalKind, SignalTrack>,
    pub features: FeatureTable,
    pub report: Option<String>,
}

impl DerivativeBundle {
    /// 采样点数
    pub fn len(&self) -> usize {
        self.columns.first().map(|(_, c)| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 派生 sidecar 的列名：原始列 + 每种信号一个事件列
    pub fn output_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = self.columns.iter().map(|(n, _)| n.clone()).collect();
        columns.extend(self.tracks.keys().map(|k| k.peaks_column()));
        columns
    }

    /// 派生数据按行展开（事件列为 0/1）
    pub fn output_rows(&self) -> Vec<Vec<f64>> {
        let n = self.len();
        let markers: Vec<Vec<f64>> = self
            .tracks
            .values()
            .map(|track| {
                let mut marker = vec![0.0; n];
                for &e in track.events.iter().filter(|&&e| e < n) {
                    marker[e] = 1.0;
                }
                marker
            })
            .collect();

        (0..n)
            .map(|i| {
                self.columns
                    .iter()
                    .map(|(_, c)| c[i])
                    .chain(markers.iter().map(|m| m[i]))
                    .collect()
            })
            .collect()
    }

    /// 派生 sidecar 内容
    pub fn output_metadata(&self) -> JsonValue {
        let mut meta = self.metadata.clone();
        meta.columns = self.output_columns();
        meta.sampling_frequency = Some(self.sfreq);

        let mut events = Map::new();
        for (kind, track) in &self.tracks {
            events.insert(kind.name().to_string(), JsonValue::from(track.events.clone()));
        }
        meta.extra.insert(
            "ProcessedSignals".to_string(),
            JsonValue::from(
                self.tracks
                    .keys()
                    .map(|k| k.name().to_string())
                    .collect::<Vec<_>>(),
            ),
        );
        meta.extra
            .insert("EventIndices".to_string(), JsonValue::Object(events));
        meta.extra.insert(
            "GeneratedBy".to_string(),
            serde_json::json!([{
                "Name": env!("CARGO_PKG_NAME"),
                "Version": env!("CARGO_PKG_VERSION"),
            }]),
        );

        serde_json::to_value(&meta).unwrap_or(JsonValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::key::Modality;

    fn bundle() -> DerivativeBundle {
        let mut tracks = BTreeMap::new();
        tracks.insert(
            SignalKind::Ppg,
            SignalTrack {
                samples: vec![0.0, 1.0, 0.0, 1.0],
                events: vec![1, 3],
                valid: true,
            },
        );
        DerivativeBundle {
            key: RecordingKey::new("0001", "s1", Modality::Beh, "t"),
            sfreq: 4.0,
            metadata: PhysioMetadata {
                sampling_frequency: Some(4.0),
                columns: vec!["cardiac".into(), "stim".into()],
                ..PhysioMetadata::default()
            },
            columns: vec![
                ("cardiac".into(), vec![0.0, 1.0, 0.0, 1.0]),
                ("stim".into(), vec![0.0, 0.0, 5.0, 0.0]),
            ],
            tracks,
            features: FeatureTable::default(),
            report: None,
        }
    }

    #[test]
    fn test_output_rows_add_marker_column() {
        let b = bundle();
        assert_eq!(b.output_columns(), vec!["cardiac", "stim", "ppg_peaks"]);
        let rows = b.output_rows();
        assert_eq!(rows[1], vec![1.0, 0.0, 1.0]);
        assert_eq!(rows[2], vec![0.0, 5.0, 0.0]);
    }

    #[test]
    fn test_output_metadata_lists_events() {
        let meta = bundle().output_metadata();
        assert_eq!(meta["EventIndices"]["ppg"], serde_json::json!([1, 3]));
        assert_eq!(meta["Columns"][2], "ppg_peaks");
    }

    #[test]
    fn test_feature_tsv_na() {
        let mut table = FeatureTable::default();
        table.push(SignalKind::Ecg, "mean_rr", Some(800.0));
        table.push(SignalKind::Ecg, "sdnn", None);
        table.push(SignalKind::Ecg, "rmssd", Some(f64::NAN));
        let tsv = table.to_tsv();
        assert!(tsv.starts_with("signal\tmetric\tvalue\n"));
        assert!(tsv.contains("ecg\tmean_rr\t800\n"));
        assert!(tsv.contains("ecg\tsdnn\tn/a\n"));
        assert!(tsv.contains("ecg\trmssd\tn/a\n"));

        let back = FeatureTable::from_tsv(&tsv);
        assert_eq!(back.get(SignalKind::Ecg, "mean_rr"), Some(800.0));
        assert_eq!(back.get(SignalKind::Ecg, "sdnn"), None);
    }
}
