use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::{AppError, AppResult};
use crate::models::bundle::{DerivativeBundle, FeatureTable, SignalTrack};
use crate::models::key::{RecordingKey, SignalKind};
use crate::models::layout::BundlePaths;
use crate::models::recording::{PhysioMetadata, Recording};

const MISSING: &str = "n/a";

/// 读取 gzip 压缩、无表头的 TSV，`n/a` 读为 NaN
pub fn read_physio_rows(path: &Path) -> AppResult<Vec<Vec<f64>>> {
    let file = File::open(path).map_err(|e| AppError::io(path, e))?;
    let reader = BufReader::new(GzDecoder::new(file));

    let mut rows = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| AppError::io(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let row = line
            .split('\t')
            .map(|cell| parse_cell(cell.trim()))
            .collect::<Option<Vec<f64>>>()
            .ok_or_else(|| {
                AppError::metadata(path, format!("第 {} 行包含无法解析的数值", line_no + 1))
            })?;
        rows.push(row);
    }
    Ok(rows)
}

fn parse_cell(cell: &str) -> Option<f64> {
    if cell.eq_ignore_ascii_case(MISSING) || cell.eq_ignore_ascii_case("nan") {
        return Some(f64::NAN);
    }
    cell.parse::<f64>().ok()
}

/// 写出 gzip 压缩、无表头的 TSV
pub fn write_physio_rows(path: &Path, rows: &[Vec<f64>]) -> AppResult<()> {
    let file = File::create(path).map_err(|e| AppError::io(path, e))?;
    let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());

    for row in rows {
        let line = row
            .iter()
            .map(|v| {
                if v.is_nan() {
                    MISSING.to_string()
                } else {
                    v.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("\t");
        writeln!(encoder, "{}", line).map_err(|e| AppError::io(path, e))?;
    }

    let mut inner = encoder.finish().map_err(|e| AppError::io(path, e))?;
    inner.flush().map_err(|e| AppError::io(path, e))?;
    Ok(())
}

/// 读取 sidecar
pub fn read_metadata(path: &Path) -> AppResult<PhysioMetadata> {
    let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => AppError::not_found(path),
        _ => AppError::io(path, e),
    })?;
    PhysioMetadata::from_json(path, &text)
}

/// 加载一条原始记录（数据 + sidecar）
pub fn load_recording(data_path: &Path, sidecar_path: &Path) -> AppResult<Recording> {
    let metadata = read_metadata(sidecar_path)?;
    // 先校验元数据，避免读取大文件后才发现 sidecar 不可用
    metadata.validate(sidecar_path)?;
    metadata.signal_columns(sidecar_path)?;

    if !data_path.is_file() {
        return Err(AppError::not_found(data_path));
    }
    let rows = read_physio_rows(data_path)?;
    Recording::from_rows(sidecar_path, metadata, rows)
}

/// 从磁盘加载已发布的 DerivativeBundle（供编辑会话使用）
pub fn load_bundle(key: &RecordingKey, paths: &BundlePaths) -> AppResult<DerivativeBundle> {
    if !paths.exists() {
        return Err(AppError::not_found(&paths.physio));
    }
    let mut metadata = read_metadata(&paths.sidecar)?;
    let sfreq = metadata.validate(&paths.sidecar)?;
    let rows = read_physio_rows(&paths.physio)?;

    let width = metadata.columns.len();
    let mut channels: Vec<Vec<f64>> = vec![Vec::with_capacity(rows.len()); width];
    for row in rows {
        if row.len() != width {
            return Err(AppError::metadata(
                &paths.sidecar,
                format!("派生数据列数 {} 与 Columns ({}) 不一致", row.len(), width),
            ));
        }
        for (channel, value) in channels.iter_mut().zip(row) {
            channel.push(value);
        }
    }

    let named: Vec<(String, Vec<f64>)> = metadata.columns.iter().cloned().zip(channels).collect();
    let mut markers: BTreeMap<SignalKind, Vec<usize>> = BTreeMap::new();
    let mut columns = Vec::new();
    for (name, values) in named {
        match SignalKind::ALL.iter().find(|k| k.peaks_column() == name) {
            Some(kind) => {
                let events = values
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| **v > 0.5)
                    .map(|(i, _)| i)
                    .collect();
                markers.insert(*kind, events);
            }
            None => columns.push((name, values)),
        }
    }

    let mut tracks = BTreeMap::new();
    for (kind, events) in markers {
        let samples = columns
            .iter()
            .find(|(name, _)| SignalKind::from_column(name) == Some(kind))
            .map(|(_, values)| values.clone())
            .ok_or_else(|| {
                AppError::metadata(&paths.sidecar, format!("找不到 {} 对应的信号列", kind))
            })?;
        tracks.insert(
            kind,
            SignalTrack {
                samples,
                events,
                valid: true,
            },
        );
    }

    // 派生 sidecar 中的附加字段不回写到输入元数据
    metadata.columns = columns.iter().map(|(n, _)| n.clone()).collect();
    for field in ["ProcessedSignals", "EventIndices", "GeneratedBy"] {
        metadata.extra.remove(field);
    }

    let features = match std::fs::read_to_string(&paths.features) {
        Ok(text) => FeatureTable::from_tsv(&text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => FeatureTable::default(),
        Err(e) => return Err(AppError::io(&paths.features, e)),
    };
    let report = match std::fs::read_to_string(&paths.report) {
        Ok(text) => Some(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(AppError::io(&paths.report, e)),
    };

    Ok(DerivativeBundle {
        key: key.clone(),
        sfreq,
        metadata,
        columns,
        tracks,
        features,
        report,
    })
}
