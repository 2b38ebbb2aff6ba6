//! 单条记录预处理流程 - 流程层
//!
//! 核心职责：定义"一条记录"的完整处理流程
//!
//! 流程顺序：
//! 1. 读取 sidecar 并校验 → 读取时间序列
//! 2. 每种信号调用外部检测能力
//! 3. 叠加已有的人工修正（只读）后计算特征
//! 4. 可选地渲染报告
//! 5. 暂存四个文件后统一发布

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::infrastructure::{EventDetector, ReportInput, ReportRenderer, StagingDir};
use crate::models::layout::{FEATURES_SUFFIX, PHYSIO_SUFFIX, REPORT_SUFFIX, SIDECAR_SUFFIX};
use crate::models::loaders::{load_recording, write_physio_rows};
use crate::models::{DatasetLayout, DerivativeBundle, FeatureTable, SignalTrack};
use crate::services::{apply_overlay, compute_features, CorrectionStore, LocatedRecording};
use crate::workflow::subject_ctx::SubjectCtx;

/// 记录处理结果
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessResult {
    /// 已生成并发布 bundle
    Success {
        files: Vec<PathBuf>,
        features: FeatureTable,
    },
    /// bundle 已存在且未开启覆盖
    Skipped,
}

/// 流程选项
#[derive(Debug, Clone, Copy, Default)]
pub struct FlowOptions {
    pub overwrite: bool,
    pub html_reports: bool,
}

/// 单条记录处理流程
///
/// - 不持有可变状态，可在多个 worker 中并发使用
/// - 只写派生命名空间，修正日志只读
pub struct SubjectFlow {
    layout: DatasetLayout,
    corrections: CorrectionStore,
    detector: Arc<dyn EventDetector>,
    renderer: Arc<dyn ReportRenderer>,
    options: FlowOptions,
}

impl SubjectFlow {
    pub fn new(
        layout: DatasetLayout,
        detector: Arc<dyn EventDetector>,
        renderer: Arc<dyn ReportRenderer>,
        options: FlowOptions,
    ) -> Self {
        Self {
            corrections: CorrectionStore::new(layout.clone()),
            layout,
            detector,
            renderer,
            options,
        }
    }

    /// 执行完整流程：覆盖策略 → 处理 → 发布
    pub fn run(&self, located: &LocatedRecording, ctx: &SubjectCtx) -> AppResult<ProcessResult> {
        let paths = self.layout.bundle_paths(&located.key);
        if !self.options.overwrite && paths.exists() {
            info!("{} ⏭️ 派生数据已存在，跳过", ctx);
            return Ok(ProcessResult::Skipped);
        }

        info!("{} 开始预处理: {}", ctx, located.data_path.display());
        let bundle = self.process(located)?;
        let files = self.publish(&bundle)?;
        info!("{} ✅ 已写入 {} 个文件", ctx, files.len());

        Ok(ProcessResult::Success {
            files,
            features: bundle.features,
        })
    }

    /// 由一条记录计算派生数据（不写磁盘）
    pub fn process(&self, located: &LocatedRecording) -> AppResult<DerivativeBundle> {
        let key = &located.key;
        let recording = load_recording(&located.data_path, &located.sidecar_path)?;
        debug!(
            "{} 采样率 {} Hz, {} 个采样点, 信号: {:?}",
            key,
            recording.sfreq,
            recording.len(),
            recording.signals.keys().collect::<Vec<_>>()
        );

        let n = recording.len();
        let mut tracks = BTreeMap::new();
        for (&kind, &column) in &recording.signals {
            let samples = recording.channels[column].clone();
            let mut events = self.detector.detect(&samples, recording.sfreq, kind)?;
            events.sort_unstable();
            events.dedup();
            let before = events.len();
            events.retain(|&e| e < n);
            if events.len() != before {
                warn!(
                    "{} ⚠️ 检测器返回了 {} 个越界事件，已丢弃",
                    key,
                    before - events.len()
                );
            }
            info!("{} ✓ {} 检测到 {} 个事件", key, kind, events.len());
            tracks.insert(
                kind,
                SignalTrack {
                    samples,
                    events,
                    valid: true,
                },
            );
        }

        let columns = recording
            .metadata
            .columns
            .iter()
            .cloned()
            .zip(recording.channels.iter().cloned())
            .collect();

        let mut bundle = DerivativeBundle {
            key: key.clone(),
            sfreq: recording.sfreq,
            metadata: recording.metadata,
            columns,
            tracks,
            features: FeatureTable::default(),
            report: None,
        };

        // 已有人工修正时，特征基于修正后的事件；派生数据本身仍保存自动结果
        let corrections = self.corrections.load_all(key)?;
        if !corrections.is_empty() {
            info!("{} 📝 发现已有修正日志，特征将基于修正后的事件", key);
        }
        let effective = apply_overlay(&bundle, &corrections);

        let mut features = FeatureTable::default();
        for (kind, track) in &effective.tracks {
            compute_features(&mut features, *kind, &track.events, bundle.sfreq, track.valid);
        }

        if self.options.html_reports {
            let input = ReportInput {
                key,
                sfreq: bundle.sfreq,
                tracks: effective.tracks.iter().map(|(k, t)| (*k, t)).collect(),
                features: &features,
                rejected_samples: corrections
                    .iter()
                    .map(|(k, log)| (*k, log.bad_segments.iter().map(|s| s.len()).sum()))
                    .collect(),
            };
            bundle.report = Some(self.renderer.render(&input)?);
        }

        bundle.features = features;
        Ok(bundle)
    }

    /// 原子发布 bundle 的全部文件
    pub fn publish(&self, bundle: &DerivativeBundle) -> AppResult<Vec<PathBuf>> {
        let key = &bundle.key;
        let paths = self.layout.bundle_paths(key);
        let mut staging = StagingDir::create(paths.dir(), &key.stem())?;

        let physio = staging.path_for(&key.file_name(PHYSIO_SUFFIX));
        write_physio_rows(&physio, &bundle.output_rows())?;

        let mut sidecar = serde_json::to_vec_pretty(&bundle.output_metadata())
            .map_err(|e| AppError::json(&paths.sidecar, e))?;
        sidecar.push(b'\n');
        staging.write(&key.file_name(SIDECAR_SUFFIX), &sidecar)?;

        staging.write(&key.file_name(FEATURES_SUFFIX), bundle.features.to_tsv().as_bytes())?;

        let mut stale = Vec::new();
        match &bundle.report {
            Some(html) => staging.write(&key.file_name(REPORT_SUFFIX), html.as_bytes())?,
            None => stale.push(paths.report.clone()),
        }

        staging.publish(&stale)
    }
}
