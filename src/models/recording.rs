use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;
use std::path::Path;

use super::key::SignalKind;
use crate::error::{AppError, AppResult};

/// physio.json sidecar
///
/// 只解析必需字段，其余字段原样保留，写派生 sidecar 时一并输出
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PhysioMetadata {
    #[serde(rename = "SamplingFrequency", default, skip_serializing_if = "Option::is_none")]
    pub sampling_frequency: Option<f64>,

    #[serde(rename = "StartTime", default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<f64>,

    #[serde(rename = "Columns", default)]
    pub columns: Vec<String>,

    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl PhysioMetadata {
    /// 从 JSON 文本解析；格式错误视为元数据错误
    pub fn from_json(path: &Path, text: &str) -> AppResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| AppError::metadata(path, format!("sidecar 不是合法的 JSON: {}", e)))
    }

    /// 校验采样率与列定义，返回采样率
    pub fn validate(&self, path: &Path) -> AppResult<f64> {
        let sfreq = self
            .sampling_frequency
            .ok_or_else(|| AppError::metadata(path, "缺少 SamplingFrequency"))?;
        if !sfreq.is_finite() || sfreq <= 0.0 {
            return Err(AppError::metadata(
                path,
                format!("SamplingFrequency 必须为正数, 实际为 {}", sfreq),
            ));
        }

        if self.columns.is_empty() {
            return Err(AppError::metadata(path, "缺少 Columns"));
        }
        let mut seen = std::collections::HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.as_str()) {
                return Err(AppError::metadata(path, format!("列名重复: {}", column)));
            }
        }

        Ok(sfreq)
    }

    /// 信号类型 → 列索引
    ///
    /// 两列映射到同一种信号视为不一致；一列都识别不了也视为错误
    pub fn signal_columns(&self, path: &Path) -> AppResult<BTreeMap<SignalKind, usize>> {
        let mut mapping = BTreeMap::new();
        for (idx, column) in self.columns.iter().enumerate() {
            if let Some(kind) = SignalKind::from_column(column) {
                if let Some(prev) = mapping.insert(kind, idx) {
                    return Err(AppError::metadata(
                        path,
                        format!(
                            "列 '{}' 与 '{}' 都映射到 {}",
                            self.columns[prev], column, kind
                        ),
                    ));
                }
            }
        }

        if mapping.is_empty() {
            return Err(AppError::metadata(
                path,
                format!("Columns 中没有可识别的生理信号: {:?}", self.columns),
            ));
        }
        Ok(mapping)
    }
}

/// 一条已加载的生理记录
#[derive(Debug, Clone)]
pub struct Recording {
    pub sfreq: f64,
    pub metadata: PhysioMetadata,
    /// 每列一个通道，顺序与 `metadata.columns` 一致
    pub channels: Vec<Vec<f64>>,
    pub signals: BTreeMap<SignalKind, usize>,
}

impl Recording {
    /// 由 sidecar 和按行读出的数据构造，同时完成校验
    pub fn from_rows(
        sidecar_path: &Path,
        metadata: PhysioMetadata,
        rows: Vec<Vec<f64>>,
    ) -> AppResult<Self> {
        let sfreq = metadata.validate(sidecar_path)?;
        let signals = metadata.signal_columns(sidecar_path)?;

        let width = metadata.columns.len();
        let mut channels = vec![Vec::with_capacity(rows.len()); width];
        for (line, row) in rows.into_iter().enumerate() {
            if row.len() != width {
                return Err(AppError::metadata(
                    sidecar_path,
                    format!(
                        "第 {} 行有 {} 列, Columns 定义了 {} 列",
                        line + 1,
                        row.len(),
                        width
                    ),
                ));
            }
            for (channel, value) in channels.iter_mut().zip(row) {
                channel.push(value);
            }
        }

        Ok(Self {
            sfreq,
            metadata,
            channels,
            signals,
        })
    }

    /// 采样点数
    pub fn len(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 某种信号的通道
    pub fn signal(&self, kind: SignalKind) -> Option<&[f64]> {
        self.signals
            .get(&kind)
            .and_then(|&idx| self.channels.get(idx))
            .map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(value: JsonValue) -> PhysioMetadata {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_validate_rejects_bad_sfreq() {
        let path = Path::new("x.json");
        let m = meta(json!({"SamplingFrequency": 0, "Columns": ["cardiac"]}));
        assert!(matches!(m.validate(path), Err(AppError::Metadata { .. })));

        let m = meta(json!({"SamplingFrequency": -10.0, "Columns": ["cardiac"]}));
        assert!(matches!(m.validate(path), Err(AppError::Metadata { .. })));

        let m = meta(json!({"Columns": ["cardiac"]}));
        assert!(matches!(m.validate(path), Err(AppError::Metadata { .. })));

        let m = meta(json!({"SamplingFrequency": 1000, "Columns": ["cardiac"]}));
        assert_eq!(m.validate(path).unwrap(), 1000.0);
    }

    #[test]
    fn test_signal_columns_conflict() {
        let path = Path::new("x.json");
        let m = meta(json!({"SamplingFrequency": 100, "Columns": ["cardiac", "ppg"]}));
        assert!(matches!(m.signal_columns(path), Err(AppError::Metadata { .. })));

        let m = meta(json!({"SamplingFrequency": 100, "Columns": ["stim", "trigger"]}));
        assert!(matches!(m.signal_columns(path), Err(AppError::Metadata { .. })));

        let m = meta(json!({"SamplingFrequency": 100, "Columns": ["stim", "cardiac", "respiratory"]}));
        let mapping = m.signal_columns(path).unwrap();
        assert_eq!(mapping.get(&SignalKind::Ppg), Some(&1));
        assert_eq!(mapping.get(&SignalKind::Respiration), Some(&2));
    }

    #[test]
    fn test_extra_fields_preserved() {
        let m = meta(json!({
            "SamplingFrequency": 100,
            "Columns": ["cardiac"],
            "Manufacturer": "Nonin"
        }));
        let back = serde_json::to_value(&m).unwrap();
        assert_eq!(back["Manufacturer"], "Nonin");
        assert_eq!(back["SamplingFrequency"], 100.0);
    }

    #[test]
    fn test_from_rows_checks_width() {
        let path = Path::new("x.json");
        let m = meta(json!({"SamplingFrequency": 100, "Columns": ["cardiac", "stim"]}));
        let err = Recording::from_rows(path, m.clone(), vec![vec![1.0, 0.0], vec![2.0]]);
        assert!(matches!(err, Err(AppError::Metadata { .. })));

        let rec = Recording::from_rows(path, m, vec![vec![1.0, 0.0], vec![2.0, 1.0]]).unwrap();
        assert_eq!(rec.len(), 2);
        assert_eq!(rec.signal(SignalKind::Ppg), Some(&[1.0, 2.0][..]));
    }
}
