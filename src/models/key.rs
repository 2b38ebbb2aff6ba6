use phf::phf_map;
use serde::{Deserialize, Serialize};
use std::fmt;

/// BIDS 数据类型目录
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    /// 行为数据
    Beh,
    /// 功能磁共振
    Func,
    /// 脑电
    Eeg,
    /// 脑磁
    Meg,
    /// 颅内脑电
    Ieeg,
    /// 独立的生理记录
    Physio,
}

static MODALITY_DIRS: phf::Map<&'static str, Modality> = phf_map! {
    "beh" => Modality::Beh,
    "func" => Modality::Func,
    "eeg" => Modality::Eeg,
    "meg" => Modality::Meg,
    "ieeg" => Modality::Ieeg,
    "physio" => Modality::Physio,
};

impl Modality {
    /// 获取目录名
    pub fn dir_name(self) -> &'static str {
        match self {
            Modality::Beh => "beh",
            Modality::Func => "func",
            Modality::Eeg => "eeg",
            Modality::Meg => "meg",
            Modality::Ieeg => "ieeg",
            Modality::Physio => "physio",
        }
    }

    /// 从目录名解析（忽略大小写）
    pub fn from_dir_name(s: &str) -> Option<Self> {
        MODALITY_DIRS.get(s.to_ascii_lowercase().as_str()).copied()
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

/// 生理信号类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Ecg,
    Ppg,
    Respiration,
}

/// 列名 → 信号类型
static SIGNAL_COLUMNS: phf::Map<&'static str, SignalKind> = phf_map! {
    "ecg" => SignalKind::Ecg,
    "ppg" => SignalKind::Ppg,
    "pleth" => SignalKind::Ppg,
    "cardiac" => SignalKind::Ppg,
    "respiratory" => SignalKind::Respiration,
    "respiration" => SignalKind::Respiration,
    "resp" => SignalKind::Respiration,
};

impl SignalKind {
    pub const ALL: [SignalKind; 3] = [SignalKind::Ecg, SignalKind::Ppg, SignalKind::Respiration];

    /// JSON / 列名中使用的名称
    pub fn name(self) -> &'static str {
        match self {
            SignalKind::Ecg => "ecg",
            SignalKind::Ppg => "ppg",
            SignalKind::Respiration => "respiration",
        }
    }

    /// 根据 sidecar 中的列名识别信号类型
    pub fn from_column(column: &str) -> Option<Self> {
        SIGNAL_COLUMNS
            .get(column.trim().to_ascii_lowercase().as_str())
            .copied()
    }

    /// 是否为心脏信号
    pub fn is_cardiac(self) -> bool {
        matches!(self, SignalKind::Ecg | SignalKind::Ppg)
    }

    /// 派生数据中事件列的列名
    pub fn peaks_column(self) -> String {
        format!("{}_peaks", self.name())
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 一条生理记录在数据集中的唯一标识
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordingKey {
    pub subject: String,
    pub session: String,
    pub modality: Modality,
    pub task: String,
}

impl RecordingKey {
    pub fn new(
        subject: impl Into<String>,
        session: impl Into<String>,
        modality: Modality,
        task: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            session: session.into(),
            modality,
            task: task.into(),
        }
    }

    /// 文件名前缀：`sub-<S>_ses-<Ses>_task-<T>`
    pub fn stem(&self) -> String {
        format!(
            "sub-{}_ses-{}_task-{}",
            self.subject, self.session, self.task
        )
    }

    /// 带后缀的文件名
    pub fn file_name(&self, suffix: &str) -> String {
        format!("{}_{}", self.stem(), suffix)
    }
}

impl fmt::Display for RecordingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.stem())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_file_names() {
        let key = RecordingKey::new("0001", "session1", Modality::Beh, "mytask");
        assert_eq!(key.stem(), "sub-0001_ses-session1_task-mytask");
        assert_eq!(
            key.file_name("physio.tsv.gz"),
            "sub-0001_ses-session1_task-mytask_physio.tsv.gz"
        );
        assert_eq!(key.to_string(), "[sub-0001_ses-session1_task-mytask]");
    }

    #[test]
    fn test_signal_kind_from_column() {
        assert_eq!(SignalKind::from_column("cardiac"), Some(SignalKind::Ppg));
        assert_eq!(SignalKind::from_column("ECG"), Some(SignalKind::Ecg));
        assert_eq!(
            SignalKind::from_column(" respiratory "),
            Some(SignalKind::Respiration)
        );
        assert_eq!(SignalKind::from_column("trigger"), None);
    }

    #[test]
    fn test_modality_dir_names() {
        assert_eq!(Modality::from_dir_name("BEH"), Some(Modality::Beh));
        assert_eq!(Modality::from_dir_name("anat"), None);
        assert_eq!(Modality::Func.dir_name(), "func");
    }

    #[test]
    fn test_signal_kind_serde_names() {
        let json = serde_json::to_string(&SignalKind::Respiration).unwrap();
        assert_eq!(json, "\"respiration\"");
    }
}
