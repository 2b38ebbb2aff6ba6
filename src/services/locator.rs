//! 记录定位服务 - 业务能力层
//!
//! 遍历数据集目录，按 subject / session / modality / task 模式匹配生理记录，
//! 并为每个数据文件配对 sidecar。只读，不产生任何副作用。

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{AppError, AppResult};
use crate::models::layout::{DERIVATIVES_DIR, PHYSIO_SUFFIX, SIDECAR_SUFFIX};
use crate::models::{Modality, RecordingKey};

/// 成功定位的一条记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedRecording {
    pub key: RecordingKey,
    pub data_path: PathBuf,
    pub sidecar_path: PathBuf,
}

/// 定位失败（该 key 不可处理，但不影响其他 subject）
#[derive(Debug)]
pub struct LocateFailure {
    pub key: RecordingKey,
    pub error: AppError,
}

pub type Located = Result<LocatedRecording, LocateFailure>;

/// 记录定位器
#[derive(Debug, Clone)]
pub struct RecordingLocator {
    root: PathBuf,
    session: String,
    modality: Modality,
    task_pattern: String,
}

fn task_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:^|_)task-([A-Za-z0-9]+)").expect("valid task regex"))
}

impl RecordingLocator {
    pub fn new(
        root: impl Into<PathBuf>,
        session: impl Into<String>,
        modality: Modality,
        task_pattern: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            session: session.into(),
            modality,
            task_pattern: task_pattern.into(),
        }
    }

    /// 惰性地逐个 subject 产出定位结果
    ///
    /// 根目录不存在时直接失败，这是整个 batch 的错误
    pub fn locate(&self) -> AppResult<impl Iterator<Item = Located> + '_> {
        if !self.root.is_dir() {
            return Err(AppError::not_found(&self.root));
        }
        let subjects = self.subject_dirs()?;
        debug!("发现 {} 个 subject 目录", subjects.len());
        Ok(subjects
            .into_iter()
            .filter_map(move |(subject, dir)| self.locate_subject(&subject, &dir)))
    }

    /// 根目录下的 `sub-*` 目录，按名称排序
    fn subject_dirs(&self) -> AppResult<Vec<(String, PathBuf)>> {
        let mut subjects = Vec::new();
        for entry in WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| self.root.clone());
                    return Err(AppError::io(
                        path,
                        e.into_io_error()
                            .unwrap_or_else(|| std::io::Error::other("walkdir loop")),
                    ));
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if name == DERIVATIVES_DIR {
                continue;
            }
            if let Some(subject) = name.strip_prefix("sub-") {
                subjects.push((subject.to_string(), entry.path().to_path_buf()));
            }
        }
        Ok(subjects)
    }

    fn locate_subject(&self, subject: &str, subject_dir: &Path) -> Option<Located> {
        let session_segment = format!("ses-{}", self.session);
        let modality_dir = self.modality.dir_name();

        let mut candidates: Vec<PathBuf> = WalkDir::new(subject_dir)
            .min_depth(1)
            .max_depth(3)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("⚠️ 无法访问 {}: {}", subject_dir.display(), e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| {
                let in_session = path
                    .components()
                    .any(|c| c.as_os_str().to_string_lossy() == session_segment);
                let in_modality = path
                    .parent()
                    .and_then(Path::file_name)
                    .map(|n| n.to_string_lossy() == modality_dir)
                    .unwrap_or(false);
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                in_session
                    && in_modality
                    && name.ends_with(&format!("_{}", PHYSIO_SUFFIX))
                    && name.contains(&self.task_pattern)
            })
            .collect();
        candidates.sort();

        let pattern_key = RecordingKey::new(
            subject,
            self.session.clone(),
            self.modality,
            self.task_pattern.clone(),
        );

        match candidates.len() {
            0 => {
                debug!("sub-{}: 没有匹配 '{}' 的记录", subject, self.task_pattern);
                None
            }
            1 => {
                let data_path = candidates.remove(0);
                let key = RecordingKey {
                    task: task_label(&data_path).unwrap_or_else(|| self.task_pattern.clone()),
                    ..pattern_key
                };
                let sidecar_path = sidecar_for(&data_path);
                if sidecar_path.is_file() {
                    Some(Ok(LocatedRecording {
                        key,
                        data_path,
                        sidecar_path,
                    }))
                } else {
                    Some(Err(LocateFailure {
                        key,
                        error: AppError::not_found(sidecar_path),
                    }))
                }
            }
            _ => Some(Err(LocateFailure {
                key: pattern_key,
                error: AppError::AmbiguousPattern {
                    pattern: self.task_pattern.clone(),
                    candidates,
                },
            })),
        }
    }
}

/// `..._physio.tsv.gz` → `..._physio.json`
pub fn sidecar_for(data_path: &Path) -> PathBuf {
    let name = data_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let stem = name.strip_suffix(PHYSIO_SUFFIX).unwrap_or(&name);
    data_path.with_file_name(format!("{}{}", stem, SIDECAR_SUFFIX))
}

/// 从文件名中读取 `task-<label>`
fn task_label(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_string_lossy();
    task_regex()
        .captures(&name)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    fn physio(root: &Path, sub: &str, task: &str, with_sidecar: bool) {
        let dir = root.join(format!("sub-{sub}/ses-session1/beh"));
        touch(&dir.join(format!("sub-{sub}_ses-session1_task-{task}_physio.tsv.gz")));
        if with_sidecar {
            touch(&dir.join(format!("sub-{sub}_ses-session1_task-{task}_physio.json")));
        }
    }

    fn collect(locator: &RecordingLocator) -> Vec<Located> {
        locator.locate().unwrap().collect()
    }

    #[test]
    fn test_locates_pairs_in_subject_order() {
        let dir = tempfile::tempdir().unwrap();
        physio(dir.path(), "0002", "mytask", true);
        physio(dir.path(), "0001", "mytask", true);
        physio(dir.path(), "0001", "other", true);

        let locator = RecordingLocator::new(dir.path(), "session1", Modality::Beh, "mytask");
        let found = collect(&locator);
        assert_eq!(found.len(), 2);

        let first = found[0].as_ref().unwrap();
        assert_eq!(first.key.subject, "0001");
        assert_eq!(first.key.task, "mytask");
        assert!(first
            .sidecar_path
            .ends_with("sub-0001_ses-session1_task-mytask_physio.json"));
    }

    #[test]
    fn test_missing_sidecar_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        physio(dir.path(), "0001", "mytask", false);

        let locator = RecordingLocator::new(dir.path(), "session1", Modality::Beh, "mytask");
        let found = collect(&locator);
        let failure = found[0].as_ref().unwrap_err();
        assert!(matches!(failure.error, AppError::NotFound { .. }));
        assert_eq!(failure.key.subject, "0001");
    }

    #[test]
    fn test_ambiguous_pattern() {
        let dir = tempfile::tempdir().unwrap();
        physio(dir.path(), "0001", "mytask", true);
        physio(dir.path(), "0001", "othertask", true);
        physio(dir.path(), "0002", "mytask", true);

        let locator = RecordingLocator::new(dir.path(), "session1", Modality::Beh, "task");
        let found = collect(&locator);
        assert_eq!(found.len(), 2);
        match &found[0] {
            Err(LocateFailure {
                error: AppError::AmbiguousPattern { candidates, .. },
                key,
            }) => {
                assert_eq!(candidates.len(), 2);
                assert_eq!(key.subject, "0001");
            }
            other => panic!("expected ambiguity, got {:?}", other),
        }
        assert!(found[1].is_ok());
    }

    #[test]
    fn test_ignores_other_session_modality_and_derivatives() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("sub-0001/ses-session2/beh/sub-0001_ses-session2_task-mytask_physio.tsv.gz"));
        touch(&dir.path().join("sub-0001/ses-session1/func/sub-0001_ses-session1_task-mytask_physio.tsv.gz"));
        touch(&dir.path().join("derivatives/systole/sub-0001/ses-session1/beh/sub-0001_ses-session1_task-mytask_physio.tsv.gz"));

        let locator = RecordingLocator::new(dir.path(), "session1", Modality::Beh, "mytask");
        assert!(collect(&locator).is_empty());
    }

    #[test]
    fn test_missing_root() {
        let locator = RecordingLocator::new("/definitely/not/here", "s", Modality::Beh, "t");
        assert!(matches!(locator.locate(), Err(AppError::NotFound { .. })));
    }

    #[test]
    fn test_sidecar_name() {
        assert_eq!(
            sidecar_for(Path::new("/a/sub-1_ses-2_task-x_physio.tsv.gz")),
            PathBuf::from("/a/sub-1_ses-2_task-x_physio.json")
        );
    }
}
