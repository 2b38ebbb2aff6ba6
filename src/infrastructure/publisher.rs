//! 原子写入 - 基础设施层
//!
//! 单文件：写临时文件再 rename；bundle：先全部写到同目录下的暂存目录，再逐个发布

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

use crate::error::{AppError, AppResult};

static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);

fn unique_suffix() -> String {
    format!(
        "{}-{}",
        std::process::id(),
        STAGING_SEQ.fetch_add(1, Ordering::Relaxed)
    )
}

/// 原子替换单个文件：读者要么看到旧内容，要么看到完整的新内容
pub fn write_atomic(path: &Path, contents: &[u8]) -> AppResult<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|e| AppError::io(parent, e))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let tmp_path = parent.join(format!(".{}.{}.tmp", file_name, unique_suffix()));

    if let Err(e) = fs::write(&tmp_path, contents) {
        let _ = fs::remove_file(&tmp_path);
        return Err(AppError::io(&tmp_path, e));
    }
    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(AppError::io(path, e));
    }
    Ok(())
}

/// 一个 bundle 的暂存目录
///
/// 未发布就被丢弃时自动清理
pub struct StagingDir {
    dir: PathBuf,
    target_dir: PathBuf,
    staged: Vec<(PathBuf, PathBuf)>,
}

impl StagingDir {
    /// 在目标目录下创建暂存目录（同一文件系统，rename 才是原子的）
    pub fn create(target_dir: &Path, label: &str) -> AppResult<Self> {
        fs::create_dir_all(target_dir).map_err(|e| AppError::io(target_dir, e))?;
        let dir = target_dir.join(format!(".staging-{}-{}", label, unique_suffix()));
        fs::create_dir(&dir).map_err(|e| AppError::io(&dir, e))?;
        Ok(Self {
            dir,
            target_dir: target_dir.to_path_buf(),
            staged: Vec::new(),
        })
    }

    /// 暂存文件路径，发布时移动到目标目录下同名文件
    pub fn path_for(&mut self, file_name: &str) -> PathBuf {
        let staged = self.dir.join(file_name);
        self.staged
            .push((staged.clone(), self.target_dir.join(file_name)));
        staged
    }

    /// 写入一个暂存文件
    pub fn write(&mut self, file_name: &str, contents: &[u8]) -> AppResult<()> {
        let path = self.path_for(file_name);
        fs::write(&path, contents).map_err(|e| AppError::io(&path, e))
    }

    /// 发布全部暂存文件，并删除目标目录中不再属于 bundle 的旧文件
    pub fn publish(mut self, stale: &[PathBuf]) -> AppResult<Vec<PathBuf>> {
        let staged = std::mem::take(&mut self.staged);
        let mut published = Vec::with_capacity(staged.len());
        for (from, to) in staged {
            fs::rename(&from, &to).map_err(|e| AppError::io(&to, e))?;
            debug!("已发布: {}", to.display());
            published.push(to);
        }
        for path in stale {
            match fs::remove_file(path) {
                Ok(()) => debug!("已删除旧文件: {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(AppError::io(path, e)),
            }
        }
        Ok(published)
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.dir) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("⚠️ 无法清理暂存目录 {}: {}", self.dir.display(), e);
            }
        }
    }
}
