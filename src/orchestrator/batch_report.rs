//! 批量处理结果汇总

use std::fmt::Write as _;

use crate::error::AppError;
use crate::models::{FeatureTable, RecordingKey};
use crate::services::aggregate_features;

/// 单个 key 的处理结果
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success {
        files: usize,
        features: FeatureTable,
    },
    Skipped,
    Failed {
        kind: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyOutcome {
    pub key: RecordingKey,
    pub outcome: Outcome,
}

impl KeyOutcome {
    pub fn failed(key: RecordingKey, error: &AppError) -> Self {
        Self {
            key,
            outcome: Outcome::Failed {
                kind: error.kind().to_string(),
                reason: error.to_string(),
            },
        }
    }
}

/// 一次 batch 运行的结果表
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub outcomes: Vec<KeyOutcome>,
    /// 运行被取消，未派发的 key 不在结果表中
    pub cancelled: bool,
}

impl BatchReport {
    pub fn new(mut outcomes: Vec<KeyOutcome>, cancelled: bool) -> Self {
        outcomes.sort_by(|a, b| a.key.cmp(&b.key));
        Self {
            outcomes,
            cancelled,
        }
    }

    pub fn succeeded(&self) -> Vec<&RecordingKey> {
        self.filter(|o| matches!(o, Outcome::Success { .. }))
    }

    pub fn skipped(&self) -> Vec<&RecordingKey> {
        self.filter(|o| matches!(o, Outcome::Skipped))
    }

    pub fn failed(&self) -> Vec<&RecordingKey> {
        self.filter(|o| matches!(o, Outcome::Failed { .. }))
    }

    pub fn has_failures(&self) -> bool {
        self.outcomes
            .iter()
            .any(|o| matches!(o.outcome, Outcome::Failed { .. }))
    }

    pub fn outcome(&self, key: &RecordingKey) -> Option<&Outcome> {
        self.outcomes
            .iter()
            .find(|o| &o.key == key)
            .map(|o| &o.outcome)
    }

    fn filter(&self, pred: impl Fn(&Outcome) -> bool) -> Vec<&RecordingKey> {
        self.outcomes
            .iter()
            .filter(|o| pred(&o.outcome))
            .map(|o| &o.key)
            .collect()
    }

    /// 本次成功处理的记录的组平均特征（无效记录不计入）
    pub fn aggregate(&self) -> FeatureTable {
        aggregate_features(self.outcomes.iter().filter_map(|o| match &o.outcome {
            Outcome::Success { features, .. } => Some((&o.key, features)),
            _ => None,
        }))
    }

    /// 文本结果表
    pub fn to_table(&self) -> String {
        let mut out = String::new();
        for o in &self.outcomes {
            let status = match &o.outcome {
                Outcome::Success { files, .. } => format!("成功 ({} 个文件)", files),
                Outcome::Skipped => "跳过".to_string(),
                Outcome::Failed { kind, reason } => format!("失败 [{}] {}", kind, reason),
            };
            let _ = writeln!(out, "{}\t{}", o.key.stem(), status);
        }
        if self.cancelled {
            let _ = writeln!(out, "(运行已取消，部分记录未派发)");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Modality;

    fn key(s: &str) -> RecordingKey {
        RecordingKey::new(s, "s1", Modality::Beh, "t")
    }

    #[test]
    fn test_report_partitions_and_sorts() {
        let report = BatchReport::new(
            vec![
                KeyOutcome::failed(key("0003"), &AppError::not_found("x.json")),
                KeyOutcome {
                    key: key("0001"),
                    outcome: Outcome::Skipped,
                },
                KeyOutcome {
                    key: key("0002"),
                    outcome: Outcome::Success {
                        files: 3,
                        features: FeatureTable::default(),
                    },
                },
            ],
            false,
        );

        assert_eq!(report.outcomes[0].key.subject, "0001");
        assert_eq!(report.succeeded(), vec![&key("0002")]);
        assert_eq!(report.skipped(), vec![&key("0001")]);
        assert_eq!(report.failed(), vec![&key("0003")]);
        assert!(report.has_failures());

        let table = report.to_table();
        assert!(table.contains("sub-0003_ses-s1_task-t\t失败 [NotFound]"));
    }

    #[test]
    fn test_skips_are_not_failures() {
        let report = BatchReport::new(
            vec![KeyOutcome {
                key: key("0001"),
                outcome: Outcome::Skipped,
            }],
            false,
        );
        assert!(!report.has_failures());
    }
}
