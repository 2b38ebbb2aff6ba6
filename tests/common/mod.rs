//! 测试用的合成 BIDS 数据集

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use systole_prep::models::loaders::write_physio_rows;
use systole_prep::orchestrator::BatchOptions;
use systole_prep::models::Modality;

pub const SFREQ: f64 = 100.0;
pub const N_SAMPLES: usize = 3000;

/// 每 `period` 个采样点一个尖峰，峰值位于周期中点
pub fn spikes(n: usize, period: usize) -> Vec<f64> {
    (0..n)
        .map(|i| match i % period {
            p if p == period / 2 => 10.0,
            p if p == period / 2 - 1 || p == period / 2 + 1 => 4.0,
            _ => 0.0,
        })
        .collect()
}

pub struct Dataset {
    pub dir: tempfile::TempDir,
}

impl Dataset {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    fn beh_dir(&self, subject: &str) -> PathBuf {
        self.root().join(format!("sub-{subject}/ses-session1/beh"))
    }

    /// 写入一条包含 cardiac / respiratory / stim 三列的记录
    pub fn add_recording(&self, subject: &str, task: &str) -> PathBuf {
        let dir = self.beh_dir(subject);
        fs::create_dir_all(&dir).unwrap();
        let stem = format!("sub-{subject}_ses-session1_task-{task}");

        let cardiac = spikes(N_SAMPLES, 80);
        let resp = spikes(N_SAMPLES, 400);
        let rows: Vec<Vec<f64>> = (0..N_SAMPLES)
            .map(|i| vec![cardiac[i], resp[i], if i % 500 == 0 { 5.0 } else { 0.0 }])
            .collect();
        let data = dir.join(format!("{stem}_physio.tsv.gz"));
        write_physio_rows(&data, &rows).unwrap();

        fs::write(
            dir.join(format!("{stem}_physio.json")),
            serde_json::to_string_pretty(&serde_json::json!({
                "SamplingFrequency": SFREQ,
                "StartTime": 0.0,
                "Columns": ["cardiac", "respiratory", "stim"],
                "Manufacturer": "synthetic"
            }))
            .unwrap(),
        )
        .unwrap();
        data
    }

    /// 覆盖 sidecar 内容
    pub fn write_sidecar(&self, subject: &str, task: &str, json: serde_json::Value) {
        let path = self
            .beh_dir(subject)
            .join(format!("sub-{subject}_ses-session1_task-{task}_physio.json"));
        fs::write(path, json.to_string()).unwrap();
    }

    pub fn remove_sidecar(&self, subject: &str, task: &str) {
        let path = self
            .beh_dir(subject)
            .join(format!("sub-{subject}_ses-session1_task-{task}_physio.json"));
        fs::remove_file(path).unwrap();
    }

    pub fn options(&self, pattern: &str) -> BatchOptions {
        BatchOptions {
            root: self.root().to_path_buf(),
            session: "session1".to_string(),
            modality: Modality::Beh,
            task_pattern: pattern.to_string(),
            n_jobs: 2,
            overwrite: false,
            html_reports: false,
        }
    }
}

/// 目录下全部文件的内容和修改时间
pub fn snapshot(dir: &Path) -> BTreeMap<PathBuf, (Vec<u8>, std::time::SystemTime)> {
    walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let meta = e.metadata().unwrap();
            (
                e.path().to_path_buf(),
                (fs::read(e.path()).unwrap(), meta.modified().unwrap()),
            )
        })
        .collect()
}
