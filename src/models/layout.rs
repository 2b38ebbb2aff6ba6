//! 数据集目录布局
//!
//! ```text
//! <root>/sub-<S>/ses-<Ses>/<modality>/<stem>_physio.tsv.gz (+ .json)
//! <root>/derivatives/systole/sub-<S>/ses-<Ses>/<modality>/<stem>_{physio.tsv.gz,physio.json,features.tsv,report.html}
//! <root>/derivatives/systole/corrected/sub-<S>/ses-<Ses>/<modality>/<stem>_physio.json
//! ```

use std::path::{Path, PathBuf};

use super::key::RecordingKey;

pub const PHYSIO_SUFFIX: &str = "physio.tsv.gz";
pub const SIDECAR_SUFFIX: &str = "physio.json";
pub const FEATURES_SUFFIX: &str = "features.tsv";
pub const REPORT_SUFFIX: &str = "report.html";

pub const DERIVATIVES_DIR: &str = "derivatives";
pub const PIPELINE_DIR: &str = "systole";
pub const CORRECTED_DIR: &str = "corrected";

/// 数据集根目录及其派生命名空间
#[derive(Debug, Clone)]
pub struct DatasetLayout {
    root: PathBuf,
}

/// 一个 DerivativeBundle 的四个文件路径
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundlePaths {
    pub physio: PathBuf,
    pub sidecar: PathBuf,
    pub features: PathBuf,
    pub report: PathBuf,
}

impl BundlePaths {
    pub fn dir(&self) -> &Path {
        self.physio.parent().unwrap_or_else(|| Path::new("."))
    }

    /// bundle 是否已经存在（以预处理后的时间序列为准）
    pub fn exists(&self) -> bool {
        self.physio.is_file()
    }
}

impl DatasetLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/derivatives/systole`
    pub fn derivatives_root(&self) -> PathBuf {
        self.root.join(DERIVATIVES_DIR).join(PIPELINE_DIR)
    }

    /// `<root>/derivatives/systole/corrected`
    pub fn corrected_root(&self) -> PathBuf {
        self.derivatives_root().join(CORRECTED_DIR)
    }

    fn relative_dir(key: &RecordingKey) -> PathBuf {
        PathBuf::from(format!("sub-{}", key.subject))
            .join(format!("ses-{}", key.session))
            .join(key.modality.dir_name())
    }

    /// 原始数据目录
    pub fn raw_dir(&self, key: &RecordingKey) -> PathBuf {
        self.root.join(Self::relative_dir(key))
    }

    /// 派生数据目录
    pub fn derivative_dir(&self, key: &RecordingKey) -> PathBuf {
        self.derivatives_root().join(Self::relative_dir(key))
    }

    pub fn bundle_paths(&self, key: &RecordingKey) -> BundlePaths {
        let dir = self.derivative_dir(key);
        BundlePaths {
            physio: dir.join(key.file_name(PHYSIO_SUFFIX)),
            sidecar: dir.join(key.file_name(SIDECAR_SUFFIX)),
            features: dir.join(key.file_name(FEATURES_SUFFIX)),
            report: dir.join(key.file_name(REPORT_SUFFIX)),
        }
    }

    /// 修正日志文件路径
    pub fn correction_path(&self, key: &RecordingKey) -> PathBuf {
        self.corrected_root()
            .join(Self::relative_dir(key))
            .join(key.file_name(SIDECAR_SUFFIX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::key::Modality;

    #[test]
    fn test_paths_follow_layout() {
        let layout = DatasetLayout::new("/data");
        let key = RecordingKey::new("0001", "session1", Modality::Beh, "mytask");

        let bundle = layout.bundle_paths(&key);
        assert_eq!(
            bundle.physio,
            PathBuf::from("/data/derivatives/systole/sub-0001/ses-session1/beh/sub-0001_ses-session1_task-mytask_physio.tsv.gz")
        );
        assert_eq!(
            bundle.report,
            PathBuf::from("/data/derivatives/systole/sub-0001/ses-session1/beh/sub-0001_ses-session1_task-mytask_report.html")
        );
        assert_eq!(
            layout.correction_path(&key),
            PathBuf::from("/data/derivatives/systole/corrected/sub-0001/ses-session1/beh/sub-0001_ses-session1_task-mytask_physio.json")
        );
        assert_eq!(
            layout.raw_dir(&key),
            PathBuf::from("/data/sub-0001/ses-session1/beh")
        );
    }

    #[test]
    fn test_bundle_and_corrections_are_disjoint() {
        let layout = DatasetLayout::new("/data");
        let key = RecordingKey::new("0001", "s", Modality::Beh, "t");
        let bundle = layout.bundle_paths(&key);
        assert!(!bundle.dir().starts_with(layout.corrected_root()));
    }
}
