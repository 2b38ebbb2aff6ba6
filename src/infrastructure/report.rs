//! 报告渲染器 - 基础设施层
//!
//! HTML 渲染细节属于外部能力，这里只提供一个独立的简单实现

use std::fmt::Write as _;

use crate::error::AppResult;
use crate::models::{FeatureTable, RecordingKey, SignalKind, SignalTrack};

/// 渲染报告所需的输入
pub struct ReportInput<'a> {
    pub key: &'a RecordingKey,
    pub sfreq: f64,
    pub tracks: Vec<(SignalKind, &'a SignalTrack)>,
    pub features: &'a FeatureTable,
    /// 各信号的坏段覆盖采样点数（来自已有修正日志）
    pub rejected_samples: Vec<(SignalKind, usize)>,
}

/// 外部渲染能力
pub trait ReportRenderer: Send + Sync {
    fn render(&self, input: &ReportInput<'_>) -> AppResult<String>;
}

/// 默认 HTML 报告
#[derive(Debug, Clone, Default)]
pub struct HtmlReportRenderer;

impl ReportRenderer for HtmlReportRenderer {
    fn render(&self, input: &ReportInput<'_>) -> AppResult<String> {
        let mut html = String::new();
        let title = escape(&input.key.stem());

        let _ = writeln!(html, "<!DOCTYPE html>");
        let _ = writeln!(html, "<html><head><meta charset=\"utf-8\"><title>{}</title></head><body>", title);
        let _ = writeln!(html, "<h1>{}</h1>", title);
        let _ = writeln!(
            html,
            "<p>Sampling frequency: {} Hz &middot; generated {}</p>",
            input.sfreq,
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        );

        let _ = writeln!(html, "<h2>Signal quality</h2><table>");
        let _ = writeln!(
            html,
            "<tr><th>signal</th><th>samples</th><th>duration (s)</th><th>missing (%)</th><th>events</th><th>rejected (%)</th></tr>"
        );
        for (kind, track) in &input.tracks {
            let n = track.samples.len();
            let missing = track.samples.iter().filter(|v| !v.is_finite()).count();
            let rejected = input
                .rejected_samples
                .iter()
                .find(|(k, _)| k == kind)
                .map(|(_, r)| *r)
                .unwrap_or(0);
            let _ = writeln!(
                html,
                "<tr><td>{}</td><td>{}</td><td>{:.1}</td><td>{:.1}</td><td>{}</td><td>{:.1}</td></tr>",
                kind,
                n,
                n as f64 / input.sfreq,
                percent(missing, n),
                track.events.len(),
                percent(rejected, n)
            );
        }
        let _ = writeln!(html, "</table>");

        let _ = writeln!(html, "<h2>Features</h2><table>");
        let _ = writeln!(html, "<tr><th>signal</th><th>metric</th><th>value</th></tr>");
        for row in &input.features.rows {
            let value = row
                .value
                .map(|v| format!("{:.3}", v))
                .unwrap_or_else(|| "n/a".to_string());
            let _ = writeln!(
                html,
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                row.signal,
                escape(&row.metric),
                value
            );
        }
        let _ = writeln!(html, "</table>");
        let _ = writeln!(html, "</body></html>");

        Ok(html)
    }
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Modality;

    #[test]
    fn test_render_contains_summary() {
        let key = RecordingKey::new("0001", "s1", Modality::Beh, "mytask");
        let track = SignalTrack {
            samples: vec![0.0, 1.0, f64::NAN, 1.0],
            events: vec![1, 3],
            valid: true,
        };
        let mut features = FeatureTable::default();
        features.push(SignalKind::Ppg, "mean_hr", Some(61.5));

        let input = ReportInput {
            key: &key,
            sfreq: 2.0,
            tracks: vec![(SignalKind::Ppg, &track)],
            features: &features,
            rejected_samples: vec![(SignalKind::Ppg, 1)],
        };
        let html = HtmlReportRenderer.render(&input).unwrap();
        assert!(html.contains("sub-0001_ses-s1_task-mytask"));
        assert!(html.contains("<td>ppg</td><td>4</td><td>2.0</td><td>25.0</td><td>2</td><td>25.0</td>"));
        assert!(html.contains("61.500"));
    }
}
